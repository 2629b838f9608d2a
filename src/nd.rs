//! Shape-level operations over [`TensorRef`] / [`TensorMut`] handles.
//!
//! Each operation runs the matching planner on the handle shapes, checks the
//! caller's output shape against the planned one and forwards the flat
//! parameters to [`FlatOps`]. No buffer is touched before both have passed.

use linbuf_kernel::{BroadcastOp, KernelLibrary, ReduceOp};
use linbuf_plan::{
    plan_axis_reduction, plan_transpose, resolve_broadcast, resolve_slice, SliceSpec,
    WindowGeometry, WindowParams,
};
use linbuf_view::LinbufError;

use crate::operand::{Matrix, MatrixMut};
use crate::ops::{FlatOps, Im2ColOptions};
use crate::tensor::{expect_dims, TensorMut, TensorRef};
use crate::Result;

fn signed(name: &'static str, value: usize) -> Result<isize> {
    isize::try_from(value).map_err(|_| LinbufError::InvalidShapeParameter {
        name,
        value: isize::MAX,
    })
}

/// `(rows, last)` of a shape read as a matrix over its last axis.
fn rows_and_last(dims: &[usize]) -> (usize, usize) {
    let last = dims.last().copied().unwrap_or(1);
    (dims.iter().product::<usize>() / last, last)
}

/// Per-dimension filter, stride and dilation of a windowing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpec<'s> {
    pub filter: &'s [usize],
    pub strides: &'s [usize],
    pub dilation: &'s [usize],
}

/// Split an image shape into `(batches, channels, spatial)`.
fn image_layout(dims: &[usize], channels_first: bool) -> Result<(usize, usize, &[usize])> {
    if dims.len() < 3 || dims.len() > 5 {
        return Err(LinbufError::InvalidShapeParameter {
            name: "images rank",
            value: dims.len() as isize,
        });
    }
    let last = dims.len() - 1;
    Ok(if channels_first {
        (dims[0], dims[1], &dims[2..])
    } else {
        (dims[0], dims[last], &dims[1..last])
    })
}

fn window_params(spatial: &[usize], spec: &WindowSpec<'_>) -> Result<Vec<WindowParams>> {
    let rank = spatial.len();
    for (name, len) in [
        ("filter", spec.filter.len()),
        ("strides", spec.strides.len()),
        ("dilation", spec.dilation.len()),
    ] {
        if len != rank {
            return Err(LinbufError::InvalidShapeParameter {
                name,
                value: len as isize,
            });
        }
    }
    (0..rank)
        .map(|d| {
            Ok(WindowParams::new(
                signed("input", spatial[d])?,
                signed("filter", spec.filter[d])?,
                signed("stride", spec.strides[d])?,
                signed("dilation", spec.dilation[d])?,
            ))
        })
        .collect()
}

fn cols_dims(geometry: &WindowGeometry, cols_channels_first: bool) -> Vec<usize> {
    let mut dims = vec![geometry.batches];
    dims.extend(geometry.output_extents());
    if cols_channels_first {
        dims.push(geometry.channels);
        dims.extend(geometry.kernel_extents());
    } else {
        dims.extend(geometry.kernel_extents());
        dims.push(geometry.channels);
    }
    dims
}

/// Shape-level entry points, borrowed from a [`FlatOps`] with
/// [`FlatOps::nd`].
///
/// # Example
///
/// ```rust
/// use linbuf::{FlatBuffer, FlatOps, TensorMut, TensorRef};
///
/// let ops = FlatOps::reference();
/// let a = FlatBuffer::from(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]);
/// let mut b = FlatBuffer::from(vec![0.0f32; 3]);
/// ops.nd()
///     .reduce_sum(
///         &TensorRef::new(&a, 0, &[2, 3]).unwrap(),
///         0,
///         TensorMut::new(&mut b, 0, &[3]).unwrap(),
///     )
///     .unwrap();
/// assert_eq!(b.as_slice::<f32>().unwrap(), &[5.0, 7.0, 9.0]);
/// ```
#[derive(Debug)]
pub struct NdOps<'f, K: KernelLibrary> {
    ops: &'f FlatOps<K>,
}

impl<'f, K: KernelLibrary> NdOps<'f, K> {
    pub(crate) fn new(ops: &'f FlatOps<K>) -> Self {
        Self { ops }
    }

    // ========================================================================
    // Broadcast
    // ========================================================================

    /// `A := op(A, X)` with `X` matched against the trailing dimensions of
    /// `A`, or against the leading ones with `trans`.
    pub fn broadcast(
        &self,
        op: BroadcastOp,
        trans: bool,
        x: &TensorRef<'_>,
        a: TensorMut<'_>,
    ) -> Result<()> {
        let plan = resolve_broadcast(x.dims(), a.dims(), trans)?;
        let m = signed("m", plan.m())?;
        let n = signed("n", plan.n())?;
        let matrix = MatrixMut::new(a.buffer, a.offset, n);
        self.ops.broadcast(op, trans, m, n, x.vector(), matrix)
    }

    pub fn maximum(&self, x: &TensorRef<'_>, a: TensorMut<'_>) -> Result<()> {
        self.broadcast(BroadcastOp::Maximum, false, x, a)
    }

    pub fn minimum(&self, x: &TensorRef<'_>, a: TensorMut<'_>) -> Result<()> {
        self.broadcast(BroadcastOp::Minimum, false, x, a)
    }

    pub fn greater(&self, x: &TensorRef<'_>, a: TensorMut<'_>) -> Result<()> {
        self.broadcast(BroadcastOp::Greater, false, x, a)
    }

    pub fn greater_equal(&self, x: &TensorRef<'_>, a: TensorMut<'_>) -> Result<()> {
        self.broadcast(BroadcastOp::GreaterEqual, false, x, a)
    }

    pub fn less(&self, x: &TensorRef<'_>, a: TensorMut<'_>) -> Result<()> {
        self.broadcast(BroadcastOp::Less, false, x, a)
    }

    pub fn less_equal(&self, x: &TensorRef<'_>, a: TensorMut<'_>) -> Result<()> {
        self.broadcast(BroadcastOp::LessEqual, false, x, a)
    }

    pub fn multiply(&self, trans: bool, x: &TensorRef<'_>, a: TensorMut<'_>) -> Result<()> {
        self.broadcast(BroadcastOp::Multiply, trans, x, a)
    }

    pub fn add(
        &self,
        trans: bool,
        alpha: f64,
        x: &TensorRef<'_>,
        a: TensorMut<'_>,
    ) -> Result<()> {
        self.broadcast(BroadcastOp::Add { alpha }, trans, x, a)
    }

    pub fn duplicate(&self, trans: bool, x: &TensorRef<'_>, a: TensorMut<'_>) -> Result<()> {
        self.broadcast(BroadcastOp::Duplicate, trans, x, a)
    }

    pub fn pow(&self, trans: bool, x: &TensorRef<'_>, a: TensorMut<'_>) -> Result<()> {
        self.broadcast(BroadcastOp::Pow, trans, x, a)
    }

    /// `B := alpha * op(A)` for a rank-2 `A`.
    pub fn matrixcopy(
        &self,
        trans: bool,
        alpha: f64,
        a: &TensorRef<'_>,
        b: TensorMut<'_>,
    ) -> Result<()> {
        let [m, n] = match *a.dims() {
            [m, n] => [m, n],
            _ => {
                return Err(LinbufError::InvalidShapeParameter {
                    name: "ndim",
                    value: a.ndim() as isize,
                })
            }
        };
        let expected = if trans { [n, m] } else { [m, n] };
        b.expect_dims(&expected)?;
        let ldb = signed("ldb", expected[1])?;
        self.ops.matrixcopy(
            trans,
            signed("m", m)?,
            signed("n", n)?,
            alpha,
            Matrix::new(a.buffer, a.offset, signed("lda", n)?),
            MatrixMut::new(b.buffer, b.offset, ldb),
        )
    }

    // ========================================================================
    // Last-axis operations
    // ========================================================================

    /// Softmax over the last axis.
    pub fn softmax(&self, a: TensorMut<'_>) -> Result<()> {
        let (m, n) = rows_and_last(a.dims());
        let n = signed("n", n)?;
        self.ops
            .softmax(signed("m", m)?, n, MatrixMut::new(a.buffer, a.offset, n))
    }

    /// Top `k` of the last axis into `values` and `indices` of shape
    /// `input.dims()[..ndim-1] ++ [k]`.
    pub fn topk(
        &self,
        input: &TensorRef<'_>,
        k: usize,
        sorted: bool,
        values: TensorMut<'_>,
        indices: TensorMut<'_>,
    ) -> Result<()> {
        let (m, n) = rows_and_last(input.dims());
        if k == 0 || k > n {
            return Err(LinbufError::InvalidShapeParameter {
                name: "k",
                value: signed("k", k)?,
            });
        }
        let mut expected = input.dims()[..input.ndim().saturating_sub(1)].to_vec();
        expected.push(k);
        values.expect_dims(&expected)?;
        indices.expect_dims(&expected)?;
        let k = signed("k", k)?;
        self.ops.topk(
            signed("m", m)?,
            signed("n", n)?,
            k,
            sorted,
            Matrix::new(input.buffer, input.offset, signed("n", n)?),
            MatrixMut::new(values.buffer, values.offset, k),
            MatrixMut::new(indices.buffer, indices.offset, k),
        )
    }

    /// Insertion points of `x` into `sorted`.
    ///
    /// A rank-1 `sorted` is shared by every element of `x`; a rank-2
    /// `sorted` holds one sequence per element of the rank-1 `x`.
    pub fn searchsorted(
        &self,
        sorted: &TensorRef<'_>,
        x: &TensorRef<'_>,
        right: bool,
        y: TensorMut<'_>,
    ) -> Result<()> {
        let (m, n, ld) = match *sorted.dims() {
            [n] => (x.size(), n, 0),
            [m, n] => {
                expect_dims(&[m], x.dims())?;
                (m, n, n)
            }
            _ => {
                return Err(LinbufError::InvalidShapeParameter {
                    name: "ndim",
                    value: sorted.ndim() as isize,
                })
            }
        };
        y.expect_dims(x.dims())?;
        let a = Matrix::new(sorted.buffer, sorted.offset, signed("ld", ld)?);
        self.ops
            .searchsorted(signed("m", m)?, signed("n", n)?, a, x.vector(), right, y.vector())
    }

    // ========================================================================
    // Axis reductions
    // ========================================================================

    fn reduce(
        &self,
        op: ReduceOp,
        a: &TensorRef<'_>,
        axis: isize,
        b: TensorMut<'_>,
    ) -> Result<()> {
        let plan = plan_axis_reduction(a.dims(), Some(axis))?;
        b.expect_dims(&plan.reduced_shape(a.dims()))?;
        self.ops.reduce(
            op,
            signed("m", plan.outer)?,
            signed("n", plan.axis_len)?,
            signed("k", plan.inner)?,
            a.vector(),
            b.vector(),
        )
    }

    /// Sum over `axis`; `b` has `a`'s shape with that axis removed.
    pub fn reduce_sum(&self, a: &TensorRef<'_>, axis: isize, b: TensorMut<'_>) -> Result<()> {
        self.reduce(ReduceOp::Sum, a, axis, b)
    }

    pub fn reduce_max(&self, a: &TensorRef<'_>, axis: isize, b: TensorMut<'_>) -> Result<()> {
        self.reduce(ReduceOp::Max, a, axis, b)
    }

    pub fn reduce_argmax(&self, a: &TensorRef<'_>, axis: isize, b: TensorMut<'_>) -> Result<()> {
        self.reduce(ReduceOp::ArgMax, a, axis, b)
    }

    // ========================================================================
    // Gather / scatter
    // ========================================================================

    /// Select along `axis` of `params` by the class numbers in `indices`.
    ///
    /// Without an axis, `indices` picks whole rows of the first dimension
    /// and `out` is `indices.dims() ++ params.dims()[1..]`. With an axis,
    /// `indices` and `out` both have `params`' shape with that axis removed.
    pub fn gather(
        &self,
        params: &TensorRef<'_>,
        indices: &TensorRef<'_>,
        axis: Option<isize>,
        out: TensorMut<'_>,
    ) -> Result<()> {
        let plan = plan_axis_reduction(params.dims(), axis)?;
        let classes = signed("numClass", plan.class_count)?;
        match axis {
            None => {
                let mut expected = indices.dims().to_vec();
                expected.extend_from_slice(&params.dims()[1..]);
                out.expect_dims(&expected)?;
                self.ops.gather(
                    false,
                    signed("n", indices.size())?,
                    signed("k", plan.inner)?,
                    classes,
                    indices.vector(),
                    params.vector(),
                    out.vector(),
                )
            }
            Some(_) => {
                let reduced = plan.reduced_shape(params.dims());
                expect_dims(&reduced, indices.dims())?;
                out.expect_dims(&reduced)?;
                self.ops.reduce_gather(
                    false,
                    signed("m", plan.outer)?,
                    signed("n", plan.inner)?,
                    classes,
                    indices.vector(),
                    params.vector(),
                    out.vector(),
                )
            }
        }
    }

    /// Reverse of [`gather`](Self::gather): write `updates` into `out` at
    /// the class numbers in `indices`, adding with `add_mode`.
    pub fn scatter(
        &self,
        indices: &TensorRef<'_>,
        updates: &TensorRef<'_>,
        axis: Option<isize>,
        add_mode: bool,
        out: TensorMut<'_>,
    ) -> Result<()> {
        let plan = plan_axis_reduction(out.dims(), axis)?;
        let classes = signed("numClass", plan.class_count)?;
        match axis {
            None => {
                let mut expected = indices.dims().to_vec();
                expected.extend_from_slice(&out.dims()[1..]);
                expect_dims(&expected, updates.dims())?;
                self.ops.scatter(
                    add_mode,
                    signed("n", indices.size())?,
                    signed("k", plan.inner)?,
                    classes,
                    indices.vector(),
                    updates.vector(),
                    out.vector(),
                )
            }
            Some(_) => {
                let reduced = plan.reduced_shape(out.dims());
                expect_dims(&reduced, indices.dims())?;
                expect_dims(&reduced, updates.dims())?;
                self.ops.reduce_scatter(
                    add_mode,
                    signed("m", plan.outer)?,
                    signed("n", plan.inner)?,
                    classes,
                    indices.vector(),
                    updates.vector(),
                    out.vector(),
                )
            }
        }
    }

    // ========================================================================
    // Layout
    // ========================================================================

    /// `b` is `a` with its axes reordered by `perm`.
    pub fn transpose(&self, a: &TensorRef<'_>, perm: &[isize], b: TensorMut<'_>) -> Result<()> {
        let plan = plan_transpose(a.dims(), perm)?;
        b.expect_dims(plan.dest_shape())?;
        self.ops.transpose_planned(&plan, a.vector(), b.vector())
    }

    /// Copy a window of up to three leading axes of `a` into `y`.
    pub fn slice(&self, a: &TensorRef<'_>, specs: &[SliceSpec], y: TensorMut<'_>) -> Result<()> {
        let window = resolve_slice(a.dims(), specs)?;
        y.expect_dims(&window.window_shape)?;
        self.ops.slice_window(&window, false, a.vector(), y.vector())
    }

    /// Write `y` back into the window of `a`, adding with `add_mode`.
    pub fn slice_scatter(
        &self,
        y: &TensorRef<'_>,
        specs: &[SliceSpec],
        add_mode: bool,
        a: TensorMut<'_>,
    ) -> Result<()> {
        let window = resolve_slice(a.dims(), specs)?;
        expect_dims(&window.window_shape, y.dims())?;
        self.ops
            .scatter_window(&window, add_mode, y.vector(), a.vector())
    }

    // ========================================================================
    // Windowing
    // ========================================================================

    /// Unfold `images` into `cols`.
    ///
    /// The spatial rank is `images.ndim() - 2`. `cols` must have shape
    /// `(batches, out.., filter.., channels)`, or
    /// `(batches, out.., channels, filter..)` with `cols_channels_first`.
    pub fn im2col(
        &self,
        images: &TensorRef<'_>,
        spec: WindowSpec<'_>,
        options: Im2ColOptions,
        cols: TensorMut<'_>,
    ) -> Result<()> {
        let (batches, channels, spatial) = image_layout(images.dims(), options.channels_first)?;
        let params = window_params(spatial, &spec)?;
        let batches = signed("batches", batches)?;
        let channels = signed("channels", channels)?;
        let geometry = WindowGeometry::new(batches, channels, &params, options.padding)?;
        cols.expect_dims(&cols_dims(&geometry, options.cols_channels_first))?;
        self.ops.im2col(
            batches,
            channels,
            &params,
            options,
            images.region()?,
            cols.region()?,
        )
    }

    /// Accumulate `cols` back into `images`.
    pub fn col2im(
        &self,
        cols: &TensorRef<'_>,
        spec: WindowSpec<'_>,
        options: Im2ColOptions,
        images: TensorMut<'_>,
    ) -> Result<()> {
        let (batches, channels, spatial) = image_layout(images.dims(), options.channels_first)?;
        let params = window_params(spatial, &spec)?;
        let batches = signed("batches", batches)?;
        let channels = signed("channels", channels)?;
        let geometry = WindowGeometry::new(batches, channels, &params, options.padding)?;
        expect_dims(
            &cols_dims(&geometry, options.cols_channels_first),
            cols.dims(),
        )?;
        self.ops.col2im(
            batches,
            channels,
            &params,
            options,
            cols.region()?,
            images.region()?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_and_last() {
        assert_eq!(rows_and_last(&[2, 3, 4]), (6, 4));
        assert_eq!(rows_and_last(&[5]), (1, 5));
        assert_eq!(rows_and_last(&[]), (1, 1));
    }

    #[test]
    fn test_image_layout() {
        let (b, c, s) = image_layout(&[2, 5, 6, 3], false).unwrap();
        assert_eq!((b, c, s), (2, 3, &[5usize, 6][..]));
        let (b, c, s) = image_layout(&[2, 3, 5, 6], true).unwrap();
        assert_eq!((b, c, s), (2, 3, &[5usize, 6][..]));
        assert!(image_layout(&[2, 3], false).is_err());
    }

    #[test]
    fn test_window_params_rank_checked() {
        let spec = WindowSpec {
            filter: &[2, 2],
            strides: &[1],
            dilation: &[1, 1],
        };
        let err = window_params(&[4, 4], &spec).unwrap_err();
        assert_eq!(
            err,
            LinbufError::InvalidShapeParameter {
                name: "strides",
                value: 1
            }
        );
    }
}
