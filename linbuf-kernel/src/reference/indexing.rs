//! Gather/scatter and axis reductions.
//!
//! Index buffers may hold any integer type. An index outside its class count
//! is reported as [`KernelStatus::PermOutOfRange`] before anything is written.

use linbuf_view::{FlatBuffer, VectorView, VectorViewMut};
use num_traits::Float;

use super::element::{KernelElement, Strided};
use crate::backend::{GatherCall, ReduceCall, ReduceGatherCall, ReduceOp};
use crate::status::{KernelResult, KernelStatus};

// ============================================================================
// Index buffers
// ============================================================================

/// Read the logical elements of an integer view as `i64`.
pub(super) fn load_indices(x: &VectorView<'_>) -> KernelResult<Vec<i64>> {
    let l = Strided::of(x);
    dispatch_int!(x.buffer(), d => Ok(read_strided(d, l)))
}

fn read_strided<T: KernelElement>(data: &[T], l: Strided) -> Vec<i64> {
    (0..l.len).map(|i| data[l.at(i)].as_i64()).collect()
}

/// Write `(position, value)` pairs into an integer buffer.
pub(super) fn store_indices<I>(buffer: &mut FlatBuffer, entries: I) -> KernelResult<()>
where
    I: IntoIterator<Item = (usize, i64)>,
{
    dispatch_int!(buffer, d => {
        write_entries(d, entries);
        Ok(())
    })
}

fn write_entries<T, I>(data: &mut [T], entries: I)
where
    T: KernelElement,
    I: IntoIterator<Item = (usize, i64)>,
{
    for (pos, v) in entries {
        data[pos] = T::of_i64(v);
    }
}

/// Convert labels to class positions, rejecting any outside `0..num_class`.
fn checked_labels(labels: Vec<i64>, num_class: usize) -> KernelResult<Vec<usize>> {
    labels
        .into_iter()
        .map(|l| {
            if l < 0 || l as u64 >= num_class as u64 {
                Err(KernelStatus::PermOutOfRange)
            } else {
                Ok(l as usize)
            }
        })
        .collect()
}

#[inline]
fn put<T: KernelElement>(data: &mut [T], pos: usize, value: T, add_mode: bool) {
    data[pos] = if add_mode {
        data[pos].accumulate(value)
    } else {
        value
    };
}

// ============================================================================
// Gather / scatter
// ============================================================================

/// `B(i, j) := A(X(i), j)` for `i < n`, `j < k`.
pub(super) fn gather(
    call: GatherCall,
    x: &VectorView<'_>,
    a: &VectorView<'_>,
    b: &mut VectorViewMut<'_>,
) -> KernelResult<()> {
    let labels = checked_labels(load_indices(x)?, call.num_class)?;
    let (la, lb) = (Strided::of(a), Strided::of_mut(b));
    dispatch_real2!(a.buffer(), b.buffer_mut(), src, dst => {
        for (i, &label) in labels.iter().enumerate().take(call.n) {
            for j in 0..call.k {
                put(dst, lb.at(i * call.k + j), src[la.at(label * call.k + j)], call.add_mode);
            }
        }
        Ok(())
    })
}

/// `A(X(i), j) := B(i, j)` (or `+=`).
pub(super) fn scatter(
    call: GatherCall,
    x: &VectorView<'_>,
    b: &VectorView<'_>,
    a: &mut VectorViewMut<'_>,
) -> KernelResult<()> {
    let labels = checked_labels(load_indices(x)?, call.num_class)?;
    let (lb, la) = (Strided::of(b), Strided::of_mut(a));
    dispatch_real2!(b.buffer(), a.buffer_mut(), src, dst => {
        for (i, &label) in labels.iter().enumerate().take(call.n) {
            for j in 0..call.k {
                put(dst, la.at(label * call.k + j), src[lb.at(i * call.k + j)], call.add_mode);
            }
        }
        Ok(())
    })
}

/// `B(i, j) := A(i, X(i, j), j)` for `i < m`, `j < n`.
pub(super) fn reduce_gather(
    call: ReduceGatherCall,
    x: &VectorView<'_>,
    a: &VectorView<'_>,
    b: &mut VectorViewMut<'_>,
) -> KernelResult<()> {
    let labels = checked_labels(load_indices(x)?, call.num_class)?;
    let (la, lb) = (Strided::of(a), Strided::of_mut(b));
    let ReduceGatherCall {
        add_mode,
        m,
        n,
        num_class,
    } = call;
    dispatch_real2!(a.buffer(), b.buffer_mut(), src, dst => {
        for i in 0..m {
            for j in 0..n {
                let label = labels[i * n + j];
                let value = src[la.at((i * num_class + label) * n + j)];
                put(dst, lb.at(i * n + j), value, add_mode);
            }
        }
        Ok(())
    })
}

/// `A(i, X(i, j), j) := B(i, j)` (or `+=`).
pub(super) fn reduce_scatter(
    call: ReduceGatherCall,
    x: &VectorView<'_>,
    b: &VectorView<'_>,
    a: &mut VectorViewMut<'_>,
) -> KernelResult<()> {
    let labels = checked_labels(load_indices(x)?, call.num_class)?;
    let (lb, la) = (Strided::of(b), Strided::of_mut(a));
    let ReduceGatherCall {
        add_mode,
        m,
        n,
        num_class,
    } = call;
    dispatch_real2!(b.buffer(), a.buffer_mut(), src, dst => {
        for i in 0..m {
            for j in 0..n {
                let label = labels[i * n + j];
                let value = src[lb.at(i * n + j)];
                put(dst, la.at((i * num_class + label) * n + j), value, add_mode);
            }
        }
        Ok(())
    })
}

// ============================================================================
// Axis reductions
// ============================================================================

/// `B(i, l) := reduce_j A(i, j, l)` over an `(m, n, k)` array.
pub(super) fn reduce(
    call: ReduceCall,
    a: &VectorView<'_>,
    b: &mut VectorViewMut<'_>,
) -> KernelResult<()> {
    let (la, lb) = (Strided::of(a), Strided::of_mut(b));
    match call.op {
        ReduceOp::Sum | ReduceOp::Max => {
            dispatch_float2!(a.buffer(), b.buffer_mut(), src, dst => {
                reduce_values(call, src, la, dst, lb);
                Ok(())
            })
        }
        ReduceOp::ArgMax => {
            let found = dispatch_float!(a.buffer(), src => argmax_positions(call, src, la));
            store_indices(
                b.buffer_mut(),
                found.into_iter().enumerate().map(|(p, v)| (lb.at(p), v)),
            )
        }
    }
}

fn reduce_values<T: Float + KernelElement>(
    call: ReduceCall,
    src: &[T],
    la: Strided,
    dst: &mut [T],
    lb: Strided,
) {
    let ReduceCall { op, m, n, k } = call;
    for i in 0..m {
        for l in 0..k {
            let mut acc = src[la.at(i * n * k + l)];
            for j in 1..n {
                let v = src[la.at((i * n + j) * k + l)];
                acc = match op {
                    ReduceOp::Sum => acc + v,
                    _ => {
                        if v > acc || v.is_nan() {
                            v
                        } else {
                            acc
                        }
                    }
                };
            }
            dst[lb.at(i * k + l)] = acc;
        }
    }
}

fn argmax_positions<T: KernelElement>(call: ReduceCall, src: &[T], la: Strided) -> Vec<i64> {
    let ReduceCall { m, n, k, .. } = call;
    let mut found = Vec::with_capacity(m * k);
    for i in 0..m {
        for l in 0..k {
            let mut best = 0;
            let mut best_value = src[la.at(i * n * k + l)];
            for j in 1..n {
                let v = src[la.at((i * n + j) * k + l)];
                if v > best_value {
                    best = j;
                    best_value = v;
                }
            }
            found.push(best as i64);
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use linbuf_view::ElementTypeTag;

    fn view(buf: &FlatBuffer) -> VectorView<'_> {
        VectorView::contiguous("X", buf, buf.len() as isize, 0).unwrap()
    }

    #[test]
    fn test_load_and_store_indices() {
        let x = FlatBuffer::from(vec![7u16, 1, 9, 2]);
        let xv = VectorView::new("X", &x, 2, 0, 2).unwrap();
        assert_eq!(load_indices(&xv).unwrap(), vec![7, 9]);

        let f = FlatBuffer::from(vec![1.0f32]);
        assert_eq!(load_indices(&view(&f)), Err(KernelStatus::UnsupportedDataType));

        let mut y = FlatBuffer::zeros(ElementTypeTag::Int8, 3);
        store_indices(&mut y, vec![(2, 5), (0, -1)]).unwrap();
        assert_eq!(y.as_slice::<i8>().unwrap(), &[-1, 0, 5]);
    }

    #[test]
    fn test_gather_rows() {
        // A is 3 classes of 2
        let a = FlatBuffer::from(vec![0.0f32, 1.0, 10.0, 11.0, 20.0, 21.0]);
        let x = FlatBuffer::from(vec![2i32, 0]);
        let mut out = FlatBuffer::zeros(ElementTypeTag::Float32, 4);
        let mut b = VectorViewMut::contiguous("B", &mut out, 4, 0).unwrap();
        let call = GatherCall {
            add_mode: false,
            n: 2,
            k: 2,
            num_class: 3,
        };
        gather(call, &view(&x), &view(&a), &mut b).unwrap();
        assert_eq!(out.as_slice::<f32>().unwrap(), &[20.0, 21.0, 0.0, 1.0]);
    }

    #[test]
    fn test_gather_label_out_of_range() {
        let a = FlatBuffer::from(vec![1i64, 2, 3]);
        let x = FlatBuffer::from(vec![3i32]);
        let mut out = FlatBuffer::from(vec![0i64]);
        let mut b = VectorViewMut::contiguous("B", &mut out, 1, 0).unwrap();
        let call = GatherCall {
            add_mode: false,
            n: 1,
            k: 1,
            num_class: 3,
        };
        assert_eq!(
            gather(call, &view(&x), &view(&a), &mut b),
            Err(KernelStatus::PermOutOfRange)
        );
        assert_eq!(out.as_slice::<i64>().unwrap(), &[0]);
    }

    #[test]
    fn test_scatter_add_mode() {
        let b = FlatBuffer::from(vec![1.0f64, 2.0, 3.0]);
        let x = FlatBuffer::from(vec![1i64, 1, 0]);
        let mut out = FlatBuffer::from(vec![0.0f64, 0.0]);
        let mut a = VectorViewMut::contiguous("A", &mut out, 2, 0).unwrap();
        let call = GatherCall {
            add_mode: true,
            n: 3,
            k: 1,
            num_class: 2,
        };
        scatter(call, &view(&x), &view(&b), &mut a).unwrap();
        assert_eq!(out.as_slice::<f64>().unwrap(), &[3.0, 3.0]);
    }

    #[test]
    fn test_reduce_gather_and_scatter() {
        // A is (m=2, classes=3, n=1)
        let a = FlatBuffer::from(vec![1i32, 2, 3, 4, 5, 6]);
        let x = FlatBuffer::from(vec![2u8, 0]);
        let call = ReduceGatherCall {
            add_mode: false,
            m: 2,
            n: 1,
            num_class: 3,
        };
        let mut out = FlatBuffer::zeros(ElementTypeTag::Int32, 2);
        let mut b = VectorViewMut::contiguous("B", &mut out, 2, 0).unwrap();
        reduce_gather(call, &view(&x), &view(&a), &mut b).unwrap();
        assert_eq!(out.as_slice::<i32>().unwrap(), &[3, 4]);

        let mut back = FlatBuffer::zeros(ElementTypeTag::Int32, 6);
        let mut av = VectorViewMut::contiguous("A", &mut back, 6, 0).unwrap();
        reduce_scatter(call, &view(&x), &view(&out), &mut av).unwrap();
        assert_eq!(back.as_slice::<i32>().unwrap(), &[0, 0, 3, 4, 0, 0]);
    }

    #[test]
    fn test_reduce_middle_axis() {
        // (m=2, n=3, k=2)
        let a = FlatBuffer::from(vec![
            1.0f32, 6.0, 2.0, 5.0, 3.0, 4.0, //
            -1.0, 0.0, -2.0, 9.0, -3.0, 1.0,
        ]);
        let run = |op| {
            let mut out = FlatBuffer::zeros(ElementTypeTag::Float32, 4);
            let mut b = VectorViewMut::contiguous("B", &mut out, 4, 0).unwrap();
            reduce(ReduceCall { op, m: 2, n: 3, k: 2 }, &view(&a), &mut b).unwrap();
            out.as_slice::<f32>().unwrap().to_vec()
        };
        assert_eq!(run(ReduceOp::Sum), vec![6.0, 15.0, -6.0, 10.0]);
        assert_eq!(run(ReduceOp::Max), vec![3.0, 6.0, -1.0, 9.0]);

        let mut out = FlatBuffer::zeros(ElementTypeTag::Int32, 4);
        let mut b = VectorViewMut::contiguous("B", &mut out, 4, 0).unwrap();
        let call = ReduceCall {
            op: ReduceOp::ArgMax,
            m: 2,
            n: 3,
            k: 2,
        };
        reduce(call, &view(&a), &mut b).unwrap();
        assert_eq!(out.as_slice::<i32>().unwrap(), &[2, 0, 0, 1]);
    }
}
