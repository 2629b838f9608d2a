//! Vector-over-matrix broadcast resolution.

use linbuf_view::product;

use crate::{LinbufError, Result};

/// Dispatch parameters of a vector-over-matrix broadcast.
///
/// `rows`/`cols` are in the vector frame: the vector has `cols` elements and
/// is replicated `rows` times. `m()`/`n()` are the physical matrix dimensions
/// the kernel is called with, swapped when `trans` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastPlan {
    pub trans: bool,
    pub rows: usize,
    pub cols: usize,
}

impl BroadcastPlan {
    /// Physical row count of the matrix buffer.
    pub fn m(&self) -> usize {
        if self.trans {
            self.cols
        } else {
            self.rows
        }
    }

    /// Physical column count (and leading dimension) of the matrix buffer.
    pub fn n(&self) -> usize {
        if self.trans {
            self.rows
        } else {
            self.cols
        }
    }

    /// Number of elements the vector must hold.
    pub fn vector_len(&self) -> usize {
        self.cols
    }
}

/// Match `vector` against the trailing dimensions of `matrix`.
///
/// With `trans`, the matrix shape is reversed before matching, so the vector
/// lines up with the leading matrix dimensions.
pub fn resolve_broadcast(vector: &[usize], matrix: &[usize], trans: bool) -> Result<BroadcastPlan> {
    let mismatch = || LinbufError::BroadcastMismatch {
        vector: vector.to_vec(),
        matrix: matrix.to_vec(),
    };
    if let Some(&bad) = vector.iter().chain(matrix.iter()).find(|&&d| d == 0) {
        return Err(LinbufError::InvalidShapeParameter {
            name: "shape",
            value: bad as isize,
        });
    }
    if vector.len() > matrix.len() {
        return Err(mismatch());
    }

    let mut candidate: Vec<usize> = matrix.to_vec();
    if trans {
        candidate.reverse();
    }
    let mut remaining = vector;
    while let Some((&v, rest)) = remaining.split_last() {
        match candidate.pop() {
            Some(c) if c == v => remaining = rest,
            _ => return Err(mismatch()),
        }
    }

    let cols = product(vector)?;
    let rows = product(matrix)? / cols;
    Ok(BroadcastPlan { trans, rows, cols })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_plain_broadcast() {
        let plan = resolve_broadcast(&[3], &[2, 3], false).unwrap();
        assert_eq!((plan.rows, plan.cols), (2, 3));
        assert_eq!((plan.m(), plan.n()), (2, 3));
    }

    #[test]
    fn test_transposed_broadcast_matches_leading_dims() {
        let plan = resolve_broadcast(&[2], &[2, 3], true).unwrap();
        assert_eq!((plan.rows, plan.cols), (3, 2));
        assert_eq!((plan.m(), plan.n()), (2, 3));
    }

    #[test]
    fn test_multi_dim_vector() {
        let plan = resolve_broadcast(&[3, 4], &[5, 3, 4], false).unwrap();
        assert_eq!((plan.rows, plan.cols), (5, 12));

        // reversed matrix is [4, 3, 5]
        let plan = resolve_broadcast(&[3, 5], &[5, 3, 4], true).unwrap();
        assert_eq!((plan.rows, plan.cols), (4, 15));
        assert_eq!((plan.m(), plan.n()), (15, 4));
    }

    #[test]
    fn test_mismatch() {
        let err = resolve_broadcast(&[3], &[2, 4], false).unwrap_err();
        assert_eq!(
            err,
            LinbufError::BroadcastMismatch {
                vector: vec![3],
                matrix: vec![2, 4],
            }
        );
        assert_eq!(
            resolve_broadcast(&[2, 3], &[3], false).unwrap_err().kind(),
            ErrorKind::BroadcastMismatch
        );
        assert_eq!(
            resolve_broadcast(&[2], &[3, 2], true).unwrap_err().kind(),
            ErrorKind::BroadcastMismatch
        );
    }

    #[test]
    fn test_zero_dim_rejected() {
        assert_eq!(
            resolve_broadcast(&[3], &[0, 3], false).unwrap_err().kind(),
            ErrorKind::InvalidShapeParameter
        );
    }

    #[test]
    fn test_overflowing_matrix_rejected() {
        assert_eq!(
            resolve_broadcast(&[2], &[usize::MAX, 2], false).unwrap_err().kind(),
            ErrorKind::InvalidShapeParameter
        );
    }
}
