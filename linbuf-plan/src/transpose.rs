//! Permutation validation and transpose planning.

use linbuf_view::product;

use crate::{LinbufError, Result};

/// Invert a permutation: if `perm[i] = j`, then `result[j] = i`.
///
/// `perm` must already be a valid permutation.
pub fn inverse_permutation(perm: &[usize]) -> Vec<usize> {
    let mut inv = vec![0usize; perm.len()];
    for (i, &p) in perm.iter().enumerate() {
        inv[p] = i;
    }
    inv
}

/// A validated permutation of a source shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransposePlan {
    source: Vec<usize>,
    perm: Vec<usize>,
    dest: Vec<usize>,
}

impl TransposePlan {
    pub fn source_shape(&self) -> &[usize] {
        &self.source
    }

    pub fn perm(&self) -> &[usize] {
        &self.perm
    }

    /// `dest[i] = source[perm[i]]`.
    pub fn dest_shape(&self) -> &[usize] {
        &self.dest
    }

    pub fn ndim(&self) -> usize {
        self.source.len()
    }

    /// Element count of both source and destination.
    pub fn size(&self) -> usize {
        self.source.iter().product()
    }

    /// Plan that maps the destination shape back onto the source shape.
    pub fn inverse(&self) -> TransposePlan {
        TransposePlan {
            source: self.dest.clone(),
            perm: inverse_permutation(&self.perm),
            dest: self.source.clone(),
        }
    }
}

/// Validate `perm` against `source` and compute the destination shape.
///
/// Checks run in order: length, range, duplicates.
pub fn plan_transpose(source: &[usize], perm: &[isize]) -> Result<TransposePlan> {
    let ndim = source.len();
    if ndim == 0 {
        return Err(LinbufError::InvalidShapeParameter {
            name: "ndim",
            value: 0,
        });
    }
    if let Some(&bad) = source.iter().find(|&&d| d == 0) {
        return Err(LinbufError::InvalidShapeParameter {
            name: "shape",
            value: bad as isize,
        });
    }
    product(source)?;
    if perm.len() != ndim {
        return Err(LinbufError::PermSizeMismatch {
            perm: perm.len(),
            ndim,
        });
    }
    if let Some(&axis) = perm.iter().find(|&&p| p < 0 || p >= ndim as isize) {
        return Err(LinbufError::AxisOutOfRange { axis, ndim });
    }

    let mut seen = vec![false; ndim];
    let mut resolved = Vec::with_capacity(ndim);
    for &p in perm {
        let p = p as usize;
        if seen[p] {
            return Err(LinbufError::DuplicateAxis { axis: p });
        }
        seen[p] = true;
        resolved.push(p);
    }

    let dest = resolved.iter().map(|&p| source[p]).collect();
    Ok(TransposePlan {
        source: source.to_vec(),
        perm: resolved,
        dest,
    })
}
