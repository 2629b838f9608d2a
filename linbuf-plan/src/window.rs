//! Output geometry of 1D/2D/3D windowing (im2col) operations.

use smallvec::SmallVec;

use linbuf_view::validate_shape_parameter;

use crate::{LinbufError, Result};

/// Padding applied to each spatial dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaddingMode {
    /// No padding: windows must fit entirely inside the input.
    #[default]
    None,
    /// Pad so that `output = ceil(input / stride)`.
    Same,
}

impl From<bool> for PaddingMode {
    fn from(padding: bool) -> Self {
        if padding {
            PaddingMode::Same
        } else {
            PaddingMode::None
        }
    }
}

/// Caller-supplied parameters of one spatial dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowParams {
    pub input: isize,
    pub kernel: isize,
    pub stride: isize,
    pub dilation: isize,
}

impl WindowParams {
    pub fn new(input: isize, kernel: isize, stride: isize, dilation: isize) -> Self {
        Self {
            input,
            kernel,
            stride,
            dilation,
        }
    }
}

/// Resolved geometry of one spatial dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimGeometry {
    pub input: usize,
    pub kernel: usize,
    pub stride: usize,
    pub dilation: usize,
    pub output: usize,
    /// Virtual zero elements in front of the input.
    pub pad_before: usize,
}

impl DimGeometry {
    /// `(kernel - 1) * dilation + 1`.
    pub fn effective_kernel(&self) -> usize {
        (self.kernel - 1) * self.dilation + 1
    }

    /// Input coordinate read by output position `out` and kernel tap `tap`,
    /// `None` when it falls in the padding.
    #[inline]
    pub fn source_index(&self, out: usize, tap: usize) -> Option<usize> {
        let pos = (out * self.stride + tap * self.dilation) as isize - self.pad_before as isize;
        if pos < 0 || pos as usize >= self.input {
            None
        } else {
            Some(pos as usize)
        }
    }
}

/// Resolve one spatial dimension.
pub fn resolve_dim(params: WindowParams, padding: PaddingMode) -> Result<DimGeometry> {
    let input = validate_shape_parameter("input", params.input)?;
    let kernel = validate_shape_parameter("filter", params.kernel)?;
    let stride = validate_shape_parameter("stride", params.stride)?;
    let dilation = validate_shape_parameter("dilation", params.dilation)?;

    let effective = (kernel as isize - 1)
        .checked_mul(dilation as isize)
        .and_then(|e| e.checked_add(1))
        .ok_or(LinbufError::InvalidShapeParameter {
            name: "dilation",
            value: params.dilation,
        })?;
    let input_i = input as isize;
    let stride_i = stride as isize;
    let (output, pad_before) = match padding {
        PaddingMode::None => {
            let span = input_i - effective;
            // floor division; a negative span means the window never fits
            let output = if span < 0 { 0 } else { span / stride_i + 1 };
            (output, 0)
        }
        PaddingMode::Same => {
            let output = (input_i - 1) / stride_i + 1;
            let pad = ((output - 1) * stride_i + effective - input_i) / 2;
            (output, pad.max(0))
        }
    };
    if output <= 0 {
        return Err(LinbufError::InvalidShapeParameter {
            name: "output",
            value: output,
        });
    }

    Ok(DimGeometry {
        input,
        kernel,
        stride,
        dilation,
        output: output as usize,
        pad_before: pad_before as usize,
    })
}

/// Output extent of one spatial dimension.
pub fn resolve_window_geometry(
    input: isize,
    kernel: isize,
    stride: isize,
    dilation: isize,
    padding: PaddingMode,
) -> Result<usize> {
    resolve_dim(WindowParams::new(input, kernel, stride, dilation), padding).map(|d| d.output)
}

/// Full geometry of a batched 1D/2D/3D windowing operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowGeometry {
    pub batches: usize,
    pub channels: usize,
    pub padding: PaddingMode,
    dims: SmallVec<[DimGeometry; 3]>,
}

impl WindowGeometry {
    pub fn new(
        batches: isize,
        channels: isize,
        spatial: &[WindowParams],
        padding: PaddingMode,
    ) -> Result<Self> {
        let batches = validate_shape_parameter("batches", batches)?;
        let channels = validate_shape_parameter("channels", channels)?;
        if spatial.is_empty() || spatial.len() > 3 {
            return Err(LinbufError::InvalidShapeParameter {
                name: "spatial rank",
                value: spatial.len() as isize,
            });
        }
        let dims = spatial
            .iter()
            .map(|&p| resolve_dim(p, padding))
            .collect::<Result<SmallVec<[DimGeometry; 3]>>>()?;
        Ok(Self {
            batches,
            channels,
            padding,
            dims,
        })
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[DimGeometry] {
        &self.dims
    }

    pub fn input_extents(&self) -> Vec<usize> {
        self.dims.iter().map(|d| d.input).collect()
    }

    pub fn output_extents(&self) -> Vec<usize> {
        self.dims.iter().map(|d| d.output).collect()
    }

    pub fn kernel_extents(&self) -> Vec<usize> {
        self.dims.iter().map(|d| d.kernel).collect()
    }

    /// `batches × Π input × channels`, saturating.
    pub fn image_len(&self) -> usize {
        self.dims
            .iter()
            .fold(self.batches.saturating_mul(self.channels), |acc, d| {
                acc.saturating_mul(d.input)
            })
    }

    /// `batches × Π output × Π kernel × channels`, saturating.
    pub fn cols_len(&self) -> usize {
        self.dims
            .iter()
            .fold(self.batches.saturating_mul(self.channels), |acc, d| {
                acc.saturating_mul(d.output).saturating_mul(d.kernel)
            })
    }

    /// Cross-check declared buffer sizes against the geometry.
    pub fn check_buffer_sizes(&self, images_size: usize, cols_size: usize) -> Result<()> {
        let expected = self.image_len();
        if images_size != expected {
            return Err(LinbufError::ImageBufferSizeMismatch {
                expected,
                actual: images_size,
            });
        }
        let expected = self.cols_len();
        if cols_size != expected {
            return Err(LinbufError::ColumnBufferSizeMismatch {
                expected,
                actual: cols_size,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_valid_padding() {
        assert_eq!(resolve_window_geometry(5, 3, 1, 1, PaddingMode::None).unwrap(), 3);
        assert_eq!(resolve_window_geometry(7, 3, 2, 1, PaddingMode::None).unwrap(), 3);
        // effective kernel 5
        assert_eq!(resolve_window_geometry(7, 3, 1, 2, PaddingMode::None).unwrap(), 3);
    }

    #[test]
    fn test_same_padding() {
        let d = resolve_dim(WindowParams::new(5, 3, 1, 1), PaddingMode::Same).unwrap();
        assert_eq!((d.output, d.pad_before), (5, 1));
        let d = resolve_dim(WindowParams::new(6, 3, 2, 1), PaddingMode::Same).unwrap();
        assert_eq!((d.output, d.pad_before), (3, 0));
        assert_eq!(d.source_index(2, 2), None);
    }

    #[test]
    fn test_window_larger_than_input() {
        let err = resolve_window_geometry(2, 3, 1, 1, PaddingMode::None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidShapeParameter);
        assert!(resolve_window_geometry(2, 3, 1, 1, PaddingMode::Same).is_ok());
    }

    #[test]
    fn test_non_positive_parameters() {
        for (i, k, s, d) in [(0, 1, 1, 1), (4, 0, 1, 1), (4, 1, 0, 1), (4, 1, 1, -1)] {
            let err = resolve_window_geometry(i, k, s, d, PaddingMode::None).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidShapeParameter);
        }
    }

    #[test]
    fn test_source_index_with_padding() {
        let d = resolve_dim(WindowParams::new(4, 3, 1, 1), PaddingMode::Same).unwrap();
        assert_eq!(d.pad_before, 1);
        assert_eq!(d.source_index(0, 0), None);
        assert_eq!(d.source_index(0, 1), Some(0));
        assert_eq!(d.source_index(3, 2), None);
    }

    #[test]
    fn test_buffer_cross_check() {
        let g = WindowGeometry::new(
            2,
            3,
            &[WindowParams::new(4, 3, 1, 1), WindowParams::new(5, 2, 1, 1)],
            PaddingMode::None,
        )
        .unwrap();
        assert_eq!(g.output_extents(), vec![2, 4]);
        assert_eq!(g.image_len(), 2 * 4 * 5 * 3);
        assert_eq!(g.cols_len(), 2 * 2 * 4 * 3 * 2 * 3);
        assert!(g.check_buffer_sizes(120, 288).is_ok());
        assert_eq!(
            g.check_buffer_sizes(119, 288).unwrap_err(),
            LinbufError::ImageBufferSizeMismatch {
                expected: 120,
                actual: 119
            }
        );
        assert_eq!(
            g.check_buffer_sizes(120, 287).unwrap_err().kind(),
            ErrorKind::ColumnBufferSizeMismatch
        );
    }

    #[test]
    fn test_spatial_rank_bounds() {
        let p = WindowParams::new(4, 1, 1, 1);
        assert!(WindowGeometry::new(1, 1, &[], PaddingMode::None).is_err());
        assert!(WindowGeometry::new(1, 1, &[p; 4], PaddingMode::None).is_err());
        assert_eq!(WindowGeometry::new(1, 1, &[p; 3], PaddingMode::None).unwrap().rank(), 3);
    }
}
