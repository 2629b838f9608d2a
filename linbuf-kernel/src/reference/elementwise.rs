//! Vector reductions and elementwise kernels.

use linbuf_view::{FlatBuffer, VectorView, VectorViewMut};
use num_complex::{Complex32, Complex64};
use num_traits::Float;

use super::element::{cast, KernelElement, Strided};
use crate::backend::{CompareOp, CumsumCall, Scalar, UnaryOp};
use crate::status::KernelResult;

/// Which extreme `first_extreme` looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Extreme {
    Max,
    Min,
}

// ============================================================================
// Reductions
// ============================================================================

pub(super) fn sum(x: &VectorView<'_>) -> KernelResult<Scalar> {
    let l = Strided::of(x);
    dispatch_copyable!(x.buffer(), d => Ok(sum_strided(d, l)))
}

fn sum_strided<T: KernelElement>(data: &[T], l: Strided) -> Scalar {
    if T::IS_FLOAT {
        Scalar::Float((0..l.len).map(|i| data[l.at(i)].as_f64()).sum())
    } else {
        Scalar::Int(
            (0..l.len).fold(0i64, |acc, i| acc.wrapping_add(data[l.at(i)].as_i64())),
        )
    }
}

pub(super) fn first_extreme(x: &VectorView<'_>, which: Extreme) -> KernelResult<usize> {
    let l = Strided::of(x);
    dispatch_numeric!(x.buffer(), d => Ok(extreme_strided(d, l, which)))
}

fn extreme_strided<T: KernelElement>(data: &[T], l: Strided, which: Extreme) -> usize {
    let mut best = 0;
    let mut best_value = data[l.at(0)];
    for i in 1..l.len {
        let v = data[l.at(i)];
        let better = match which {
            Extreme::Max => v > best_value,
            Extreme::Min => v < best_value,
        };
        if better {
            best = i;
            best_value = v;
        }
    }
    best
}

// ============================================================================
// In-place elementwise
// ============================================================================

pub(super) fn unary(op: UnaryOp, x: &mut VectorViewMut<'_>) -> KernelResult<()> {
    let l = Strided::of_mut(x);
    dispatch_float!(x.buffer_mut(), d => {
        for i in 0..l.len {
            let p = l.at(i);
            d[p] = unary_value(op, d[p]);
        }
        Ok(())
    })
}

#[inline]
fn unary_value<T: Float + KernelElement>(op: UnaryOp, v: T) -> T {
    match op {
        UnaryOp::Increment { alpha, beta } => T::of_f64(alpha) * v + T::of_f64(beta),
        UnaryOp::Reciprocal { alpha, beta } => T::ONE / (T::of_f64(alpha) * v + T::of_f64(beta)),
        UnaryOp::Square => v * v,
        UnaryOp::Sqrt => v.sqrt(),
        UnaryOp::Rsqrt { alpha, beta } => {
            T::ONE / (T::of_f64(alpha) * v.sqrt() + T::of_f64(beta))
        }
        UnaryOp::Exp => v.exp(),
        UnaryOp::Log => v.ln(),
        UnaryOp::Tanh => v.tanh(),
        UnaryOp::Sin => v.sin(),
        UnaryOp::Cos => v.cos(),
        UnaryOp::Tan => v.tan(),
        UnaryOp::Nan2Num { value } => {
            if v.is_nan() {
                T::of_f64(value)
            } else {
                v
            }
        }
        UnaryOp::IsNan => {
            if v.is_nan() {
                T::ONE
            } else {
                T::ZERO
            }
        }
    }
}

fn set_all<T: Copy>(data: &mut [T], l: Strided, value: T) {
    for i in 0..l.len {
        data[l.at(i)] = value;
    }
}

fn set_zero<T: KernelElement>(data: &mut [T], l: Strided) {
    set_all(data, l, T::ZERO);
}

pub(super) fn zeros(x: &mut VectorViewMut<'_>) -> KernelResult<()> {
    let l = Strided::of_mut(x);
    match x.buffer_mut() {
        FlatBuffer::C64(d) => set_all(d, l, Complex32::new(0.0, 0.0)),
        FlatBuffer::C128(d) => set_all(d, l, Complex64::new(0.0, 0.0)),
        other => dispatch_real!(other, d => set_zero(d, l)),
    }
    Ok(())
}

pub(super) fn not(x: &mut VectorViewMut<'_>) -> KernelResult<()> {
    let l = Strided::of_mut(x);
    dispatch_copyable!(x.buffer_mut(), d => {
        logical_not(d, l);
        Ok(())
    })
}

fn logical_not<T: KernelElement>(data: &mut [T], l: Strided) {
    for i in 0..l.len {
        let p = l.at(i);
        data[p] = if data[p] == T::ZERO { T::ONE } else { T::ZERO };
    }
}

// ============================================================================
// Two-operand elementwise
// ============================================================================

pub(super) fn compare(
    op: CompareOp,
    x: &VectorView<'_>,
    y: &mut VectorViewMut<'_>,
) -> KernelResult<()> {
    let (lx, ly) = (Strided::of(x), Strided::of_mut(y));
    let want_equal = op == CompareOp::Equal;
    dispatch_real2!(x.buffer(), y.buffer_mut(), xs, ys => {
        compare_strided(xs, lx, ys, ly, want_equal);
        Ok(())
    })
}

fn compare_strided<T: KernelElement>(
    xs: &[T],
    lx: Strided,
    ys: &mut [T],
    ly: Strided,
    want_equal: bool,
) {
    for i in 0..lx.len {
        let q = ly.at(i);
        let equal = xs[lx.at(i)] == ys[q];
        ys[q] = if equal == want_equal { T::ONE } else { T::ZERO };
    }
}

pub(super) fn astype(x: &VectorView<'_>, y: &mut VectorViewMut<'_>) -> KernelResult<()> {
    let (lx, ly) = (Strided::of(x), Strided::of_mut(y));
    dispatch_real!(x.buffer(), xs => {
        dispatch_real!(y.buffer_mut(), ys => {
            convert(xs, lx, ys, ly);
            Ok(())
        })
    })
}

fn convert<S: KernelElement, D: KernelElement>(xs: &[S], lx: Strided, ys: &mut [D], ly: Strided) {
    for i in 0..lx.len {
        ys[ly.at(i)] = cast(xs[lx.at(i)]);
    }
}

pub(super) fn fill(value: &VectorView<'_>, x: &mut VectorViewMut<'_>) -> KernelResult<()> {
    let l = Strided::of_mut(x);
    let at = value.index(0);
    dispatch_any2!(value.buffer(), x.buffer_mut(), v, d => {
        set_all(d, l, v[at]);
        Ok(())
    })
}

pub(super) fn cumsum(
    call: CumsumCall,
    x: &VectorView<'_>,
    y: &mut VectorViewMut<'_>,
) -> KernelResult<()> {
    let (lx, ly) = (Strided::of(x), Strided::of_mut(y));
    dispatch_float2!(x.buffer(), y.buffer_mut(), xs, ys => {
        prefix_sum(call, xs, lx, ys, ly);
        Ok(())
    })
}

fn prefix_sum<T: KernelElement>(
    call: CumsumCall,
    xs: &[T],
    lx: Strided,
    ys: &mut [T],
    ly: Strided,
) {
    let n = lx.len;
    let mut acc = T::ZERO;
    for step in 0..n {
        let i = if call.reverse { n - 1 - step } else { step };
        let v = xs[lx.at(i)];
        if call.exclusive {
            ys[ly.at(i)] = acc;
            acc = acc.accumulate(v);
        } else {
            acc = acc.accumulate(v);
            ys[ly.at(i)] = acc;
        }
    }
}
