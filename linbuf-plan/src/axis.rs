//! Axis decomposition for reductions, gather and scatter.

use linbuf_view::product;

use crate::{LinbufError, Result};

/// Normalize a possibly negative axis against `ndim`.
pub fn normalize_axis(axis: isize, ndim: usize) -> Result<usize> {
    let resolved = if axis < 0 { axis + ndim as isize } else { axis };
    if resolved < 0 || resolved >= ndim as isize {
        return Err(LinbufError::AxisOutOfRange { axis, ndim });
    }
    Ok(resolved as usize)
}

/// `(outer, axis_len, inner)` decomposition of a shape around one axis.
///
/// A row-major buffer of the source shape is read as an `(outer, axis_len,
/// inner)` array. `class_count` equals `axis_len`; gather and scatter kernels
/// use it as the bound for index values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisReductionPlan {
    /// Resolved axis, `None` for the flattened (axis-less) form.
    pub axis: Option<usize>,
    pub outer: usize,
    pub axis_len: usize,
    pub inner: usize,
    pub class_count: usize,
}

impl AxisReductionPlan {
    /// Elements in the source array.
    pub fn total(&self) -> usize {
        self.outer * self.axis_len * self.inner
    }

    /// Elements left after removing the axis.
    pub fn reduced_len(&self) -> usize {
        self.outer * self.inner
    }

    /// `shape` with the planned axis removed (the first axis when flattened).
    pub fn reduced_shape(&self, shape: &[usize]) -> Vec<usize> {
        let axis = self.axis.unwrap_or(0);
        shape
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != axis)
            .map(|(_, &d)| d)
            .collect()
    }

    /// Inverse of [`reduced_shape`](Self::reduced_shape): reinsert the class dimension.
    pub fn scattered_shape(&self, reduced: &[usize]) -> Vec<usize> {
        let axis = self.axis.unwrap_or(0).min(reduced.len());
        let mut shape = reduced.to_vec();
        shape.insert(axis, self.class_count);
        shape
    }
}

/// Decompose `shape` around `axis`.
///
/// `None` treats the first dimension as the class axis with `outer = 1`.
pub fn plan_axis_reduction(shape: &[usize], axis: Option<isize>) -> Result<AxisReductionPlan> {
    if let Some(&bad) = shape.iter().find(|&&d| d == 0) {
        return Err(LinbufError::InvalidShapeParameter {
            name: "shape",
            value: bad as isize,
        });
    }
    product(shape)?;
    let ndim = shape.len();
    let resolved = match axis {
        Some(a) => normalize_axis(a, ndim)?,
        None if ndim == 0 => return Err(LinbufError::AxisOutOfRange { axis: 0, ndim }),
        None => 0,
    };

    let axis_len = shape[resolved];
    Ok(AxisReductionPlan {
        axis: axis.map(|_| resolved),
        outer: product(&shape[..resolved])?,
        axis_len,
        inner: product(&shape[resolved + 1..])?,
        class_count: axis_len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_axis_zero_and_one() {
        let p = plan_axis_reduction(&[2, 3], Some(0)).unwrap();
        assert_eq!((p.outer, p.axis_len, p.inner), (1, 2, 3));
        let p = plan_axis_reduction(&[2, 3], Some(1)).unwrap();
        assert_eq!((p.outer, p.axis_len, p.inner), (2, 3, 1));
    }

    #[test]
    fn test_negative_axis() {
        let neg = plan_axis_reduction(&[4, 3], Some(-1)).unwrap();
        let pos = plan_axis_reduction(&[4, 3], Some(1)).unwrap();
        assert_eq!(neg, pos);
        assert_eq!((neg.outer, neg.axis_len, neg.inner), (4, 3, 1));
    }

    #[test]
    fn test_flattened_form() {
        let p = plan_axis_reduction(&[5, 2, 3], None).unwrap();
        assert_eq!(p.axis, None);
        assert_eq!((p.outer, p.axis_len, p.inner, p.class_count), (1, 5, 6, 5));
        assert_eq!(p.reduced_shape(&[5, 2, 3]), vec![2, 3]);
    }

    #[test]
    fn test_out_of_range() {
        for axis in [2, -3] {
            let err = plan_axis_reduction(&[4, 3], Some(axis)).unwrap_err();
            assert_eq!(err, LinbufError::AxisOutOfRange { axis, ndim: 2 });
        }
        assert_eq!(
            plan_axis_reduction(&[], None).unwrap_err().kind(),
            ErrorKind::AxisOutOfRange
        );
    }

    #[test]
    fn test_reduced_and_scattered_shapes() {
        let shape = [2, 3, 4];
        let p = plan_axis_reduction(&shape, Some(1)).unwrap();
        let reduced = p.reduced_shape(&shape);
        assert_eq!(reduced, vec![2, 4]);
        assert_eq!(p.scattered_shape(&reduced), shape.to_vec());
        assert_eq!(p.total(), 24);
        assert_eq!(p.reduced_len(), 8);
    }

    #[test]
    fn test_overflowing_shape_rejected() {
        let err = plan_axis_reduction(&[1 << 40, 3, 1 << 40], Some(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidShapeParameter);
    }
}
