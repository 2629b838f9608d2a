//! Matrix-vector kernels.

use num_traits::Float;

use linbuf_view::{MatrixView, MatrixViewMut, VectorView, VectorViewMut};

use super::element::{KernelElement, Rows, Strided};
use super::indexing::{load_indices, store_indices};
use crate::backend::{BandPartCall, BroadcastOp, TopKCall};
use crate::status::{KernelResult, KernelStatus};
use crate::threading::for_each_row;

// ============================================================================
// Broadcast and copy
// ============================================================================

pub(super) fn broadcast(
    op: BroadcastOp,
    trans: bool,
    x: &VectorView<'_>,
    a: &mut MatrixViewMut<'_>,
) -> KernelResult<()> {
    let lx = Strided::of(x);
    let la = Rows::of_mut(a);
    dispatch_float2!(x.buffer(), a.buffer_mut(), xs, data => {
        for_each_row(data, la.offset, la.ld, la.rows, la.cols, |r, row| {
            for (c, v) in row.iter_mut().enumerate() {
                let xv = xs[lx.at(if trans { r } else { c })];
                *v = broadcast_value(op, *v, xv);
            }
        });
        Ok(())
    })
}

#[inline]
fn broadcast_value<T: Float + KernelElement>(op: BroadcastOp, a: T, x: T) -> T {
    let flag = |b: bool| if b { T::ONE } else { T::ZERO };
    match op {
        BroadcastOp::Maximum => {
            if x > a || x.is_nan() {
                x
            } else {
                a
            }
        }
        BroadcastOp::Minimum => {
            if x < a || x.is_nan() {
                x
            } else {
                a
            }
        }
        BroadcastOp::Greater => flag(a > x),
        BroadcastOp::GreaterEqual => flag(a >= x),
        BroadcastOp::Less => flag(a < x),
        BroadcastOp::LessEqual => flag(a <= x),
        BroadcastOp::Multiply => a * x,
        BroadcastOp::Add { alpha } => T::of_f64(alpha) * x + a,
        BroadcastOp::Duplicate => x,
        BroadcastOp::Pow => a.powf(x),
    }
}

pub(super) fn matrixcopy(
    trans: bool,
    alpha: f64,
    a: &MatrixView<'_>,
    b: &mut MatrixViewMut<'_>,
) -> KernelResult<()> {
    let la = Rows::of(a);
    let lb = Rows::of_mut(b);
    dispatch_float2!(a.buffer(), b.buffer_mut(), src, dst => {
        copy_scaled(trans, alpha, src, la, dst, lb);
        Ok(())
    })
}

fn copy_scaled<T: Float + KernelElement>(
    trans: bool,
    alpha: f64,
    src: &[T],
    la: Rows,
    dst: &mut [T],
    lb: Rows,
) {
    let alpha = T::of_f64(alpha);
    for_each_row(dst, lb.offset, lb.ld, lb.rows, lb.cols, |i, row| {
        for (j, v) in row.iter_mut().enumerate() {
            let p = if trans { la.at(j, i) } else { la.at(i, j) };
            *v = alpha * src[p];
        }
    });
}

pub(super) fn softmax(a: &mut MatrixViewMut<'_>) -> KernelResult<()> {
    let la = Rows::of_mut(a);
    dispatch_float!(a.buffer_mut(), data => {
        for_each_row(data, la.offset, la.ld, la.rows, la.cols, |_, row| softmax_row(row));
        Ok(())
    })
}

fn softmax_row<T: Float>(row: &mut [T]) {
    let max = row.iter().copied().fold(T::neg_infinity(), T::max);
    let mut total = T::zero();
    for v in row.iter_mut() {
        *v = (*v - max).exp();
        total = total + *v;
    }
    for v in row.iter_mut() {
        *v = *v / total;
    }
}

// ============================================================================
// Index-producing and index-consuming kernels
// ============================================================================

pub(super) fn onehot(
    alpha: f64,
    x: &VectorView<'_>,
    y: &mut MatrixViewMut<'_>,
) -> KernelResult<()> {
    let ly = Rows::of_mut(y);
    let labels = load_indices(x)?;
    if labels.iter().any(|&l| l < 0 || l as usize >= ly.cols) {
        return Err(KernelStatus::PermOutOfRange);
    }
    dispatch_float!(y.buffer_mut(), data => {
        add_at_labels(alpha, &labels, data, ly);
        Ok(())
    })
}

fn add_at_labels<T: KernelElement>(alpha: f64, labels: &[i64], data: &mut [T], ly: Rows) {
    let alpha = T::of_f64(alpha);
    for (i, &label) in labels.iter().enumerate().take(ly.rows) {
        let p = ly.at(i, label as usize);
        data[p] = data[p].accumulate(alpha);
    }
}

pub(super) fn searchsorted(
    a: &MatrixView<'_>,
    x: &VectorView<'_>,
    right: bool,
    y: &mut VectorViewMut<'_>,
) -> KernelResult<()> {
    let la = Rows::of(a);
    let lx = Strided::of(x);
    let ly = Strided::of_mut(y);
    let found = dispatch_float2!(a.buffer(), x.buffer(), sorted, xs => {
        insertion_points(sorted, la, xs, lx, right)
    });
    store_indices(
        y.buffer_mut(),
        found.into_iter().enumerate().map(|(i, v)| (ly.at(i), v)),
    )
}

fn insertion_points<T: PartialOrd + Copy>(
    sorted: &[T],
    la: Rows,
    xs: &[T],
    lx: Strided,
    right: bool,
) -> Vec<i64> {
    (0..lx.len)
        .map(|i| {
            let start = la.at(i, 0);
            let row = &sorted[start..start + la.cols];
            let v = xs[lx.at(i)];
            let point = if right {
                row.partition_point(|&e| e <= v)
            } else {
                row.partition_point(|&e| e < v)
            };
            point as i64
        })
        .collect()
}

pub(super) fn topk(
    call: TopKCall,
    input: &MatrixView<'_>,
    values: &mut MatrixViewMut<'_>,
    indices: &mut MatrixViewMut<'_>,
) -> KernelResult<()> {
    let li = Rows::of(input);
    let lv = Rows::of_mut(values);
    let lk = Rows::of_mut(indices);
    let k = call.k;
    if k > li.cols {
        return Err(KernelStatus::InvalidShapeOrParam);
    }
    let picked = dispatch_float2!(input.buffer(), values.buffer_mut(), src, dst => {
        let mut picked = Vec::with_capacity(li.rows * k);
        for r in 0..li.rows {
            let start = li.at(r, 0);
            let row = &src[start..start + li.cols];
            let order = top_positions(row, k, call.sorted);
            for (j, &p) in order.iter().enumerate() {
                dst[lv.at(r, j)] = row[p];
            }
            picked.extend(order.iter().map(|&p| p as i64));
        }
        picked
    });
    let positions = (0..li.rows).flat_map(|r| (0..k).map(move |j| lk.at(r, j)));
    store_indices(indices.buffer_mut(), positions.zip(picked))
}

/// Positions of the `k` largest entries, largest first (ties keep the lower
/// position first). Unsorted requests come back in position order.
fn top_positions<T: KernelElement>(row: &[T], k: usize, sorted: bool) -> Vec<usize> {
    let mut order: Vec<usize> = (0..row.len()).collect();
    order.sort_by(|&a, &b| {
        row[b]
            .as_f64()
            .total_cmp(&row[a].as_f64())
            .then(a.cmp(&b))
    });
    order.truncate(k);
    if !sorted {
        order.sort_unstable();
    }
    order
}

// ============================================================================
// Band part
// ============================================================================

pub(super) fn bandpart(call: BandPartCall, a: &mut VectorViewMut<'_>) -> KernelResult<()> {
    let la = Strided::of_mut(a);
    dispatch_float!(a.buffer_mut(), data => {
        clear_outside_band(call, data, la);
        Ok(())
    })
}

fn clear_outside_band<T: KernelElement>(call: BandPartCall, data: &mut [T], la: Strided) {
    let BandPartCall {
        batches,
        rows,
        cols,
        lower,
        upper,
    } = call;
    for b in 0..batches {
        for i in 0..rows {
            for j in 0..cols {
                let below = i as isize - j as isize;
                let keep = (lower < 0 || below <= lower) && (upper < 0 || -below <= upper);
                if !keep {
                    data[la.at((b * rows + i) * cols + j)] = T::ZERO;
                }
            }
        }
    }
}
