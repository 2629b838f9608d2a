//! Per-axis slice window resolution.

use linbuf_view::product;

use crate::{LinbufError, Result};

/// Maximum number of leading axes a slice window can restrict.
pub const MAX_SLICE_AXES: usize = 3;

/// One `(start, size)` request.
///
/// A negative `start` counts from the end of the axis. A negative `size`
/// resolves to `dim - start' + size + 1`, so `-1` means "through the end".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceSpec {
    pub start: isize,
    pub size: isize,
}

impl SliceSpec {
    pub fn new(start: isize, size: isize) -> Self {
        Self { start, size }
    }
}

impl From<(isize, isize)> for SliceSpec {
    fn from((start, size): (isize, isize)) -> Self {
        Self { start, size }
    }
}

/// Resolved window over a source viewed as `(m, n, k, item_size)`.
///
/// Axes the caller did not restrict have extent 1 and window `{0, 1}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceWindow {
    pub m: usize,
    pub n: usize,
    pub k: usize,
    /// Trailing elements copied whole for each `(i, j, l)` position.
    pub item_size: usize,
    pub starts: [usize; MAX_SLICE_AXES],
    pub sizes: [usize; MAX_SLICE_AXES],
    /// `sizes[..specs.len()] ++ trailing source dims`.
    pub window_shape: Vec<usize>,
}

impl SliceWindow {
    /// Elements in the source array.
    pub fn source_len(&self) -> usize {
        self.m * self.n * self.k * self.item_size
    }

    /// Elements in the window.
    pub fn window_len(&self) -> usize {
        self.sizes.iter().product::<usize>() * self.item_size
    }
}

fn resolve_axis(axis: usize, dim: usize, spec: SliceSpec) -> Result<(usize, usize)> {
    let idim = dim as isize;
    let start = if spec.start < 0 {
        idim + spec.start
    } else {
        spec.start
    };
    if start < 0 || start >= idim {
        return Err(LinbufError::InvalidSliceStart {
            axis,
            start: spec.start,
            dim,
        });
    }
    let size = if spec.size < 0 {
        idim - start + spec.size + 1
    } else {
        spec.size
    };
    // 0 <= start < idim, so the subtraction cannot overflow
    if size < 1 || size > idim - start {
        return Err(LinbufError::InvalidSliceSize {
            axis,
            size: spec.size,
            dim,
        });
    }
    Ok((start as usize, size as usize))
}

/// Resolve `specs` against the leading axes of `source`.
pub fn resolve_slice(source: &[usize], specs: &[SliceSpec]) -> Result<SliceWindow> {
    if let Some(&bad) = source.iter().find(|&&d| d == 0) {
        return Err(LinbufError::InvalidShapeParameter {
            name: "shape",
            value: bad as isize,
        });
    }
    product(source)?;
    let count = specs.len();
    if count == 0 || count > MAX_SLICE_AXES || count > source.len() {
        return Err(LinbufError::InvalidShapeParameter {
            name: "begin and size",
            value: count as isize,
        });
    }

    let mut extents = [1usize; MAX_SLICE_AXES];
    let mut starts = [0usize; MAX_SLICE_AXES];
    let mut sizes = [1usize; MAX_SLICE_AXES];
    for (axis, spec) in specs.iter().enumerate() {
        extents[axis] = source[axis];
        let (start, size) = resolve_axis(axis, source[axis], *spec)?;
        starts[axis] = start;
        sizes[axis] = size;
    }

    let trailing = &source[count..];
    let mut window_shape = sizes[..count].to_vec();
    window_shape.extend_from_slice(trailing);

    Ok(SliceWindow {
        m: extents[0],
        n: extents[1],
        k: extents[2],
        item_size: product(trailing)?,
        starts,
        sizes,
        window_shape,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_negative_size_through_end() {
        let w = resolve_slice(&[4], &[SliceSpec::new(1, -1)]).unwrap();
        assert_eq!(w.starts[0], 1);
        assert_eq!(w.sizes[0], 3);
        assert_eq!(w.window_shape, vec![3]);
        assert_eq!(w.window_len(), 3);
    }

    #[test]
    fn test_negative_start() {
        let w = resolve_slice(&[5, 2], &[SliceSpec::new(-2, 2)]).unwrap();
        assert_eq!((w.starts[0], w.sizes[0]), (3, 2));
        assert_eq!((w.m, w.n, w.k, w.item_size), (5, 1, 1, 2));
        assert_eq!(w.window_shape, vec![2, 2]);
    }

    #[test]
    fn test_three_axes_with_trailing_items() {
        let specs: [SliceSpec; 3] = [(0, 2).into(), (1, 2).into(), (-1, 1).into()];
        let w = resolve_slice(&[3, 4, 5, 6, 7], &specs).unwrap();
        assert_eq!((w.m, w.n, w.k, w.item_size), (3, 4, 5, 42));
        assert_eq!(w.starts, [0, 1, 4]);
        assert_eq!(w.sizes, [2, 2, 1]);
        assert_eq!(w.window_shape, vec![2, 2, 1, 6, 7]);
        assert_eq!(w.source_len(), 3 * 4 * 5 * 42);
    }

    #[test]
    fn test_start_out_of_range() {
        for start in [4, -5] {
            let err = resolve_slice(&[4], &[SliceSpec::new(start, 1)]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidSliceStart);
        }
    }

    #[test]
    fn test_size_out_of_range() {
        for (start, size) in [(1, 4), (1, 0), (3, -2)] {
            let err = resolve_slice(&[4], &[SliceSpec::new(start, size)]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidSliceSize, "({start},{size})");
        }
    }

    #[test]
    fn test_spec_count() {
        let spec = SliceSpec::new(0, 1);
        assert_eq!(
            resolve_slice(&[2, 2], &[]).unwrap_err().kind(),
            ErrorKind::InvalidShapeParameter
        );
        assert_eq!(
            resolve_slice(&[2], &[spec, spec]).unwrap_err().kind(),
            ErrorKind::InvalidShapeParameter
        );
        assert_eq!(
            resolve_slice(&[2, 2, 2, 2], &[spec; 4]).unwrap_err().kind(),
            ErrorKind::InvalidShapeParameter
        );
    }

    #[test]
    fn test_huge_size_rejected() {
        let err = resolve_slice(&[4], &[SliceSpec::new(1, isize::MAX)]).unwrap_err();
        assert_eq!(
            err,
            LinbufError::InvalidSliceSize {
                axis: 0,
                size: isize::MAX,
                dim: 4
            }
        );
        let err = resolve_slice(&[4, 2], &[SliceSpec::new(-1, isize::MAX)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSliceSize);
        let err = resolve_slice(&[4], &[SliceSpec::new(1, isize::MIN)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSliceSize);
    }

    #[test]
    fn test_overflowing_source_rejected() {
        let err = resolve_slice(&[usize::MAX, 2], &[SliceSpec::new(0, 1)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidShapeParameter);
    }
}
