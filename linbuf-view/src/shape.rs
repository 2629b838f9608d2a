//! Positive-dimension shapes.

use smallvec::SmallVec;

use crate::{LinbufError, Result};

/// Product of `dims`; `1` for an empty slice.
///
/// Fails with [`LinbufError::InvalidShapeParameter`] when the element count
/// does not fit in `isize`.
pub fn product(dims: &[usize]) -> Result<usize> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .filter(|&n| n <= isize::MAX as usize)
        .ok_or(LinbufError::InvalidShapeParameter {
            name: "shape",
            value: isize::MAX,
        })
}

/// Ordered sequence of positive dimensions.
///
/// Rank 0 is allowed and has size 1. A zero dimension is rejected: a flat
/// kernel call always addresses at least one element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape {
    dims: SmallVec<[usize; 6]>,
}

impl Shape {
    pub fn new(dims: &[usize]) -> Result<Self> {
        if let Some(&bad) = dims.iter().find(|&&d| d == 0) {
            return Err(LinbufError::InvalidShapeParameter {
                name: "shape",
                value: bad as isize,
            });
        }
        product(dims)?;
        Ok(Self {
            dims: SmallVec::from_slice(dims),
        })
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Number of elements.
    pub fn size(&self) -> usize {
        // bounded by `new`
        self.dims.iter().product()
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.dims.to_vec()
    }
}

impl AsRef<[usize]> for Shape {
    fn as_ref(&self) -> &[usize] {
        &self.dims
    }
}

impl TryFrom<&[usize]> for Shape {
    type Error = LinbufError;

    fn try_from(dims: &[usize]) -> Result<Self> {
        Shape::new(dims)
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.dims.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_shape_size() {
        let s = Shape::new(&[2, 3, 4]).unwrap();
        assert_eq!(s.ndim(), 3);
        assert_eq!(s.size(), 24);
        assert_eq!(s.to_string(), "[2, 3, 4]");
    }

    #[test]
    fn test_scalar_shape() {
        let s = Shape::new(&[]).unwrap();
        assert_eq!(s.ndim(), 0);
        assert_eq!(s.size(), 1);
    }

    #[test]
    fn test_product_overflow() {
        assert_eq!(product(&[2, 3, 4]).unwrap(), 24);
        assert_eq!(product(&[]).unwrap(), 1);
        let err = product(&[usize::MAX, 2]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidShapeParameter);
        let err = product(&[1 << 40, 1 << 40]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidShapeParameter);
        let err = Shape::new(&[usize::MAX, 2]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidShapeParameter);
    }

    #[test]
    fn test_zero_dim_rejected() {
        let err = Shape::new(&[2, 0, 4]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidShapeParameter);
    }
}
