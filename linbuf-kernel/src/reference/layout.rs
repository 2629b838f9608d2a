//! Copy kernels that only move elements: transpose, repeat and slice.

use linbuf_plan::SliceWindow;
use linbuf_view::{VectorView, VectorViewMut};
use smallvec::SmallVec;

use super::element::{KernelElement, Strided};
use crate::backend::RepeatCall;
use crate::status::{KernelResult, KernelStatus};

type Dims = SmallVec<[usize; 8]>;

/// Row-major strides of `shape`.
fn row_major_strides(shape: &[usize]) -> Dims {
    let mut strides: Dims = SmallVec::from_elem(1, shape.len());
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

fn check_permutation(shape: &[usize], perm: &[usize]) -> KernelResult<()> {
    let ndim = shape.len();
    if ndim == 0 || perm.len() != ndim || shape.iter().any(|&d| d == 0) {
        return Err(KernelStatus::InvalidShapeOrParam);
    }
    let mut seen: Dims = SmallVec::from_elem(0, ndim);
    for &p in perm {
        if p >= ndim {
            return Err(KernelStatus::PermOutOfRange);
        }
        if seen[p] != 0 {
            return Err(KernelStatus::DupAxis);
        }
        seen[p] = 1;
    }
    Ok(())
}

// ============================================================================
// Transpose
// ============================================================================

pub(super) fn transpose(
    shape: &[usize],
    perm: &[usize],
    a: &VectorView<'_>,
    b: &mut VectorViewMut<'_>,
) -> KernelResult<()> {
    check_permutation(shape, perm)?;
    let (la, lb) = (Strided::of(a), Strided::of_mut(b));
    dispatch_real2!(a.buffer(), b.buffer_mut(), src, dst => {
        permute(shape, perm, src, la, dst, lb);
        Ok(())
    })
}

/// Walk the destination in row-major order, tracking the source position.
fn permute<T: Copy>(
    shape: &[usize],
    perm: &[usize],
    src: &[T],
    la: Strided,
    dst: &mut [T],
    lb: Strided,
) {
    let ndim = shape.len();
    let src_strides = row_major_strides(shape);
    let dest_shape: Dims = perm.iter().map(|&p| shape[p]).collect();
    let step: Dims = perm.iter().map(|&p| src_strides[p]).collect();
    let total: usize = shape.iter().product();

    let mut index: Dims = SmallVec::from_elem(0, ndim);
    let mut source = 0usize;
    for out in 0..total {
        dst[lb.at(out)] = src[la.at(source)];
        // odometer increment over the destination index
        for axis in (0..ndim).rev() {
            index[axis] += 1;
            source += step[axis];
            if index[axis] < dest_shape[axis] {
                break;
            }
            source -= step[axis] * dest_shape[axis];
            index[axis] = 0;
        }
    }
}

// ============================================================================
// Repeat
// ============================================================================

pub(super) fn repeat(
    call: RepeatCall,
    a: &VectorView<'_>,
    b: &mut VectorViewMut<'_>,
) -> KernelResult<()> {
    let (la, lb) = (Strided::of(a), Strided::of_mut(b));
    let RepeatCall { m, k, repeats } = call;
    dispatch_real2!(a.buffer(), b.buffer_mut(), src, dst => {
        for i in 0..m {
            for r in 0..repeats {
                for j in 0..k {
                    dst[lb.at((i * repeats + r) * k + j)] = src[la.at(i * k + j)];
                }
            }
        }
        Ok(())
    })
}

// ============================================================================
// Slice
// ============================================================================

/// Pairs of `(source position, window position)` for every window element.
fn window_pairs(window: &SliceWindow) -> impl Iterator<Item = (usize, usize)> + '_ {
    let [s0, s1, s2] = window.starts;
    let [z0, z1, z2] = window.sizes;
    let (n, k, item) = (window.n, window.k, window.item_size);
    (0..z0).flat_map(move |i| {
        (0..z1).flat_map(move |j| {
            (0..z2).flat_map(move |l| {
                let src = (((s0 + i) * n + (s1 + j)) * k + (s2 + l)) * item;
                let dst = ((i * z1 + j) * z2 + l) * item;
                (0..item).map(move |e| (src + e, dst + e))
            })
        })
    })
}

#[inline]
fn store<T: KernelElement>(data: &mut [T], pos: usize, value: T, add_mode: bool) {
    data[pos] = if add_mode {
        data[pos].accumulate(value)
    } else {
        value
    };
}

/// Copy the window of `a` into `y` (or add it with `add_mode`).
pub(super) fn slice(
    window: &SliceWindow,
    add_mode: bool,
    a: &VectorView<'_>,
    y: &mut VectorViewMut<'_>,
) -> KernelResult<()> {
    let (la, ly) = (Strided::of(a), Strided::of_mut(y));
    dispatch_real2!(a.buffer(), y.buffer_mut(), src, dst => {
        for (s, d) in window_pairs(window) {
            store(dst, ly.at(d), src[la.at(s)], add_mode);
        }
        Ok(())
    })
}

/// Copy `y` back into the window of `a` (or add it with `add_mode`).
pub(super) fn slice_scatter(
    window: &SliceWindow,
    add_mode: bool,
    y: &VectorView<'_>,
    a: &mut VectorViewMut<'_>,
) -> KernelResult<()> {
    let (ly, la) = (Strided::of(y), Strided::of_mut(a));
    dispatch_real2!(y.buffer(), a.buffer_mut(), src, dst => {
        for (s, d) in window_pairs(window) {
            store(dst, la.at(s), src[ly.at(d)], add_mode);
        }
        Ok(())
    })
}
