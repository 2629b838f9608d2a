//! Validated flat-buffer operations.
//!
//! [`FlatOps`] is the one place where caller-supplied counts, offsets and
//! strides meet a kernel. Each method checks, in order, its shape parameters,
//! every buffer view, type agreement between operands and the element type
//! against the operation's supported set. Only then does it make exactly one
//! call into the injected [`KernelLibrary`].

use tracing::{debug, trace};

use linbuf_kernel::{
    BandPartCall, BroadcastOp, CompareOp, CumsumCall, GatherCall, Im2ColCall, ImageCopyCall,
    KernelInfo, KernelLibrary, KernelResult, ParallelMode, ReduceCall,
    ReduceGatherCall, ReduceOp, ReferenceKernel, RepeatCall, Scalar, TopKCall, UnaryOp,
};
use linbuf_plan::{
    plan_transpose, resolve_slice, PaddingMode, SliceSpec, SliceWindow, TransposePlan,
    WindowGeometry, WindowParams,
};
use linbuf_view::{
    ensure_same_type, product, validate_shape_parameter, ElementTypeTag, FlatBuffer,
    LinbufError, MatrixView, VectorView,
};

use crate::nd::NdOps;
use crate::operand::{Matrix, MatrixMut, Region, RegionMut, Vector, VectorMut};
use crate::Result;

// ============================================================================
// Supported element types
// ============================================================================

type TagSet = fn(ElementTypeTag) -> bool;

fn float(t: ElementTypeTag) -> bool {
    t.is_float()
}

fn integer(t: ElementTypeTag) -> bool {
    t.is_integer()
}

/// Floats and integers, no `bool`.
fn numeric(t: ElementTypeTag) -> bool {
    t.is_float() || t.is_integer()
}

/// Floats, integers and `bool`.
fn plain(t: ElementTypeTag) -> bool {
    t.is_copyable()
}

fn not_complex(t: ElementTypeTag) -> bool {
    !t.is_complex()
}

fn require(op: &'static str, dtype: ElementTypeTag, supported: TagSet) -> Result<()> {
    if !supported(dtype) {
        return Err(LinbufError::UnsupportedElementType { op, dtype });
    }
    Ok(())
}

/// Surface a kernel status as an error of `op`.
fn surface<T>(op: &'static str, result: KernelResult<T>) -> Result<T> {
    result.map_err(|status| {
        debug!(op, code = status.code(), %status, "kernel reported failure");
        status.into_error(op)
    })
}

fn count(name: &'static str, value: isize) -> Result<usize> {
    validate_shape_parameter(name, value)
}

/// Product of counts that must also be addressable as a view length.
fn extent(name: &'static str, dims: &[usize]) -> Result<usize> {
    product(dims).map_err(|_| LinbufError::InvalidShapeParameter {
        name,
        value: isize::MAX,
    })
}

// ============================================================================
// Options
// ============================================================================

/// Layout flags of an im2col / col2im call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Im2ColOptions {
    pub padding: PaddingMode,
    /// Images are `(batches, channels, spatial..)` instead of `(batches, spatial.., channels)`.
    pub channels_first: bool,
    /// Columns keep channels ahead of the filter taps.
    pub cols_channels_first: bool,
}

/// Shift and flip applied by [`FlatOps::imagecopy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageTransform {
    pub channels_first: bool,
    pub height_shift: isize,
    pub width_shift: isize,
    pub vertical_flip: bool,
    pub horizontal_flip: bool,
    /// Reverse the first three channels.
    pub rgb_flip: bool,
}

// ============================================================================
// FlatOps
// ============================================================================

/// Validated entry points over an injected kernel library.
///
/// # Example
///
/// ```rust
/// use linbuf::{ErrorKind, FlatBuffer, FlatOps, Scalar, Vector};
///
/// let ops = FlatOps::reference();
/// let x = FlatBuffer::from(vec![100.0f32, -10.0, -1000.0]);
/// assert_eq!(ops.sum(3, Vector::new(&x, 0, 1)).unwrap(), Scalar::Float(-910.0));
///
/// let err = ops.sum(3, Vector::new(&x, 1, 1)).unwrap_err();
/// assert_eq!(err.kind(), ErrorKind::BufferTooSmall);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FlatOps<K: KernelLibrary = ReferenceKernel> {
    kernel: K,
}

impl FlatOps<ReferenceKernel> {
    /// Facade over the in-process [`ReferenceKernel`].
    pub fn reference() -> Self {
        Self::new(ReferenceKernel::new())
    }
}

impl<K: KernelLibrary> FlatOps<K> {
    pub fn new(kernel: K) -> Self {
        Self { kernel }
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Shape-level operations over tensor handles.
    pub fn nd(&self) -> NdOps<'_, K> {
        NdOps::new(self)
    }

    // ------------------------------------------------------------------------
    // Kernel information
    // ------------------------------------------------------------------------

    pub fn info(&self) -> KernelInfo {
        self.kernel.info()
    }

    pub fn num_threads(&self) -> usize {
        self.kernel.info().num_threads
    }

    pub fn num_procs(&self) -> usize {
        self.kernel.info().num_procs
    }

    pub fn parallel(&self) -> ParallelMode {
        self.kernel.info().parallel
    }

    pub fn version(&self) -> String {
        self.kernel.info().version
    }

    /// `"<name> <version>"` of the kernel library.
    pub fn config(&self) -> String {
        let info = self.kernel.info();
        format!("{} {}", info.name, info.version)
    }

    // ------------------------------------------------------------------------
    // Vector reductions
    // ------------------------------------------------------------------------

    /// `Σ X`. Integer and bool inputs sum to [`Scalar::Int`].
    pub fn sum(&self, n: isize, x: Vector<'_>) -> Result<Scalar> {
        let n = count("n", n)?;
        let xv = x.view("X", n)?;
        require("sum", xv.dtype(), plain)?;
        trace!(op = "sum", n, dtype = %xv.dtype(), "dispatch");
        surface("sum", self.kernel.sum(&xv))
    }

    /// Index of the first maximum of `X`.
    pub fn imax(&self, n: isize, x: Vector<'_>) -> Result<usize> {
        let n = count("n", n)?;
        let xv = x.view("X", n)?;
        require("imax", xv.dtype(), numeric)?;
        trace!(op = "imax", n, dtype = %xv.dtype(), "dispatch");
        surface("imax", self.kernel.imax(&xv))
    }

    /// Index of the first minimum of `X`.
    pub fn imin(&self, n: isize, x: Vector<'_>) -> Result<usize> {
        let n = count("n", n)?;
        let xv = x.view("X", n)?;
        require("imin", xv.dtype(), numeric)?;
        trace!(op = "imin", n, dtype = %xv.dtype(), "dispatch");
        surface("imin", self.kernel.imin(&xv))
    }

    // ------------------------------------------------------------------------
    // Elementwise, in place
    // ------------------------------------------------------------------------

    /// Apply a float [`UnaryOp`] to every element of `X`.
    ///
    /// INF and NaN results (`1/0`, `sqrt(-1)`, `log(0)`) are returned as is.
    pub fn unary(&self, op: UnaryOp, n: isize, x: VectorMut<'_>) -> Result<()> {
        let name = op.name();
        let n = count("n", n)?;
        let mut xv = x.view("X", n)?;
        require(name, xv.dtype(), float)?;
        trace!(op = name, n, dtype = %xv.dtype(), "dispatch");
        surface(name, self.kernel.unary(op, &mut xv))
    }

    /// `X := alpha*X + beta`
    pub fn increment(&self, n: isize, x: VectorMut<'_>, alpha: f64, beta: f64) -> Result<()> {
        self.unary(UnaryOp::Increment { alpha, beta }, n, x)
    }

    /// `X := 1 / (alpha*X + beta)`
    pub fn reciprocal(&self, n: isize, x: VectorMut<'_>, alpha: f64, beta: f64) -> Result<()> {
        self.unary(UnaryOp::Reciprocal { alpha, beta }, n, x)
    }

    pub fn square(&self, n: isize, x: VectorMut<'_>) -> Result<()> {
        self.unary(UnaryOp::Square, n, x)
    }

    pub fn sqrt(&self, n: isize, x: VectorMut<'_>) -> Result<()> {
        self.unary(UnaryOp::Sqrt, n, x)
    }

    /// `X := 1 / (alpha*sqrt(X) + beta)`
    pub fn rsqrt(&self, n: isize, x: VectorMut<'_>, alpha: f64, beta: f64) -> Result<()> {
        self.unary(UnaryOp::Rsqrt { alpha, beta }, n, x)
    }

    pub fn exp(&self, n: isize, x: VectorMut<'_>) -> Result<()> {
        self.unary(UnaryOp::Exp, n, x)
    }

    pub fn log(&self, n: isize, x: VectorMut<'_>) -> Result<()> {
        self.unary(UnaryOp::Log, n, x)
    }

    pub fn tanh(&self, n: isize, x: VectorMut<'_>) -> Result<()> {
        self.unary(UnaryOp::Tanh, n, x)
    }

    pub fn sin(&self, n: isize, x: VectorMut<'_>) -> Result<()> {
        self.unary(UnaryOp::Sin, n, x)
    }

    pub fn cos(&self, n: isize, x: VectorMut<'_>) -> Result<()> {
        self.unary(UnaryOp::Cos, n, x)
    }

    pub fn tan(&self, n: isize, x: VectorMut<'_>) -> Result<()> {
        self.unary(UnaryOp::Tan, n, x)
    }

    /// Replace NaN with `alpha`.
    pub fn nan2num(&self, n: isize, x: VectorMut<'_>, alpha: f64) -> Result<()> {
        self.unary(UnaryOp::Nan2Num { value: alpha }, n, x)
    }

    /// `X := isnan(X) ? 1 : 0`
    pub fn isnan(&self, n: isize, x: VectorMut<'_>) -> Result<()> {
        self.unary(UnaryOp::IsNan, n, x)
    }

    /// `X := 0` for any element type.
    pub fn zeros(&self, n: isize, x: VectorMut<'_>) -> Result<()> {
        let n = count("n", n)?;
        let mut xv = x.view("X", n)?;
        trace!(op = "zeros", n, dtype = %xv.dtype(), "dispatch");
        surface("zeros", self.kernel.zeros(&mut xv))
    }

    /// `X := (X == 0) ? 1 : 0`
    pub fn not(&self, n: isize, x: VectorMut<'_>) -> Result<()> {
        let n = count("n", n)?;
        let mut xv = x.view("X", n)?;
        require("not", xv.dtype(), plain)?;
        trace!(op = "not", n, dtype = %xv.dtype(), "dispatch");
        surface("not", self.kernel.not(&mut xv))
    }

    // ------------------------------------------------------------------------
    // Elementwise, two operands
    // ------------------------------------------------------------------------

    fn compare(&self, op: CompareOp, n: isize, x: Vector<'_>, y: VectorMut<'_>) -> Result<()> {
        let name = match op {
            CompareOp::Equal => "equal",
            CompareOp::NotEqual => "not_equal",
        };
        let n = count("n", n)?;
        let xv = x.view("X", n)?;
        let mut yv = y.view("Y", n)?;
        ensure_same_type(name, xv.dtype(), yv.dtype())?;
        require(name, xv.dtype(), plain)?;
        trace!(op = name, n, dtype = %xv.dtype(), "dispatch");
        surface(name, self.kernel.compare(op, &xv, &mut yv))
    }

    /// `Y := (X == Y) ? 1 : 0`
    pub fn equal(&self, n: isize, x: Vector<'_>, y: VectorMut<'_>) -> Result<()> {
        self.compare(CompareOp::Equal, n, x, y)
    }

    /// `Y := (X != Y) ? 1 : 0`
    pub fn not_equal(&self, n: isize, x: Vector<'_>, y: VectorMut<'_>) -> Result<()> {
        self.compare(CompareOp::NotEqual, n, x, y)
    }

    /// `Y := cast(X)` between any two non-complex element types.
    pub fn astype(&self, n: isize, x: Vector<'_>, y: VectorMut<'_>) -> Result<()> {
        let n = count("n", n)?;
        let xv = x.view("X", n)?;
        let mut yv = y.view("Y", n)?;
        require("astype", xv.dtype(), not_complex)?;
        require("astype", yv.dtype(), not_complex)?;
        trace!(op = "astype", n, from = %xv.dtype(), to = %yv.dtype(), "dispatch");
        surface("astype", self.kernel.astype(&xv, &mut yv))
    }

    /// Every element of `X` becomes `V[offset]`.
    pub fn fill(&self, n: isize, value: Vector<'_>, x: VectorMut<'_>) -> Result<()> {
        let n = count("n", n)?;
        let vv = value.view("V", 1)?;
        let mut xv = x.view("X", n)?;
        ensure_same_type("fill", vv.dtype(), xv.dtype())?;
        trace!(op = "fill", n, dtype = %xv.dtype(), "dispatch");
        surface("fill", self.kernel.fill(&vv, &mut xv))
    }

    /// Prefix sums of `X` into `Y`.
    pub fn cumsum(
        &self,
        n: isize,
        x: Vector<'_>,
        exclusive: bool,
        reverse: bool,
        y: VectorMut<'_>,
    ) -> Result<()> {
        let n = count("n", n)?;
        let xv = x.view("X", n)?;
        let mut yv = y.view("Y", n)?;
        ensure_same_type("cumsum", xv.dtype(), yv.dtype())?;
        require("cumsum", xv.dtype(), float)?;
        trace!(op = "cumsum", n, exclusive, reverse, dtype = %xv.dtype(), "dispatch");
        let call = CumsumCall { exclusive, reverse };
        surface("cumsum", self.kernel.cumsum(call, &xv, &mut yv))
    }

    // ------------------------------------------------------------------------
    // Matrix / vector
    // ------------------------------------------------------------------------

    /// `A(m,n) := op(A, X)`.
    ///
    /// `X` holds `n` elements and is applied to every row, or with `trans`
    /// holds `m` elements and `X(i)` is applied to all of row `i`.
    pub fn broadcast(
        &self,
        op: BroadcastOp,
        trans: bool,
        m: isize,
        n: isize,
        x: Vector<'_>,
        a: MatrixMut<'_>,
    ) -> Result<()> {
        let name = op.name();
        let m = count("m", m)?;
        let n = count("n", n)?;
        let xv = x.view("X", if trans { m } else { n })?;
        let mut av = a.view("A", m, n)?;
        ensure_same_type(name, xv.dtype(), av.dtype())?;
        require(name, av.dtype(), float)?;
        trace!(op = name, m, n, trans, dtype = %av.dtype(), "dispatch");
        surface(name, self.kernel.broadcast(op, trans, &xv, &mut av))
    }

    pub fn maximum(&self, m: isize, n: isize, x: Vector<'_>, a: MatrixMut<'_>) -> Result<()> {
        self.broadcast(BroadcastOp::Maximum, false, m, n, x, a)
    }

    pub fn minimum(&self, m: isize, n: isize, x: Vector<'_>, a: MatrixMut<'_>) -> Result<()> {
        self.broadcast(BroadcastOp::Minimum, false, m, n, x, a)
    }

    /// `A := (A > X) ? 1 : 0`
    pub fn greater(&self, m: isize, n: isize, x: Vector<'_>, a: MatrixMut<'_>) -> Result<()> {
        self.broadcast(BroadcastOp::Greater, false, m, n, x, a)
    }

    pub fn greater_equal(
        &self,
        m: isize,
        n: isize,
        x: Vector<'_>,
        a: MatrixMut<'_>,
    ) -> Result<()> {
        self.broadcast(BroadcastOp::GreaterEqual, false, m, n, x, a)
    }

    pub fn less(&self, m: isize, n: isize, x: Vector<'_>, a: MatrixMut<'_>) -> Result<()> {
        self.broadcast(BroadcastOp::Less, false, m, n, x, a)
    }

    pub fn less_equal(&self, m: isize, n: isize, x: Vector<'_>, a: MatrixMut<'_>) -> Result<()> {
        self.broadcast(BroadcastOp::LessEqual, false, m, n, x, a)
    }

    pub fn multiply(
        &self,
        trans: bool,
        m: isize,
        n: isize,
        x: Vector<'_>,
        a: MatrixMut<'_>,
    ) -> Result<()> {
        self.broadcast(BroadcastOp::Multiply, trans, m, n, x, a)
    }

    /// `A := alpha*X + A`
    pub fn add(
        &self,
        trans: bool,
        m: isize,
        n: isize,
        alpha: f64,
        x: Vector<'_>,
        a: MatrixMut<'_>,
    ) -> Result<()> {
        self.broadcast(BroadcastOp::Add { alpha }, trans, m, n, x, a)
    }

    /// `A := X`
    pub fn duplicate(
        &self,
        trans: bool,
        m: isize,
        n: isize,
        x: Vector<'_>,
        a: MatrixMut<'_>,
    ) -> Result<()> {
        self.broadcast(BroadcastOp::Duplicate, trans, m, n, x, a)
    }

    /// `A := A ** X`
    pub fn pow(
        &self,
        trans: bool,
        m: isize,
        n: isize,
        x: Vector<'_>,
        a: MatrixMut<'_>,
    ) -> Result<()> {
        self.broadcast(BroadcastOp::Pow, trans, m, n, x, a)
    }

    /// `B := alpha * op(A)` where `A` is `(m, n)` and `B` is `(n, m)` with `trans`.
    pub fn matrixcopy(
        &self,
        trans: bool,
        m: isize,
        n: isize,
        alpha: f64,
        a: Matrix<'_>,
        b: MatrixMut<'_>,
    ) -> Result<()> {
        let m = count("m", m)?;
        let n = count("n", n)?;
        let av = a.view("A", m, n)?;
        let (rows, cols) = if trans { (n, m) } else { (m, n) };
        let mut bv = b.view("B", rows, cols)?;
        ensure_same_type("matrixcopy", av.dtype(), bv.dtype())?;
        require("matrixcopy", av.dtype(), float)?;
        trace!(op = "matrixcopy", m, n, trans, dtype = %av.dtype(), "dispatch");
        surface("matrixcopy", self.kernel.matrixcopy(trans, alpha, &av, &mut bv))
    }

    /// Row-wise softmax of `A(m,n)`.
    pub fn softmax(&self, m: isize, n: isize, a: MatrixMut<'_>) -> Result<()> {
        let m = count("m", m)?;
        let n = count("n", n)?;
        let mut av = a.view("A", m, n)?;
        require("softmax", av.dtype(), float)?;
        trace!(op = "softmax", m, n, dtype = %av.dtype(), "dispatch");
        surface("softmax", self.kernel.softmax(&mut av))
    }

    /// `Y(i, X(i)) += alpha` for `i < m`; labels must lie in `0..n`.
    pub fn update_add_onehot(
        &self,
        m: isize,
        n: isize,
        alpha: f64,
        x: Vector<'_>,
        y: MatrixMut<'_>,
    ) -> Result<()> {
        let m = count("m", m)?;
        let n = count("n", n)?;
        let xv = x.view("X", m)?;
        let mut yv = y.view("Y", m, n)?;
        require("update_add_onehot", xv.dtype(), integer)?;
        require("update_add_onehot", yv.dtype(), float)?;
        trace!(op = "update_add_onehot", m, n, dtype = %yv.dtype(), "dispatch");
        surface("update_add_onehot", self.kernel.onehot(alpha, &xv, &mut yv))
    }

    /// `Y(i) :=` insertion point of `X(i)` in row `i` of `A(m,n)`.
    ///
    /// A leading dimension of 0 makes every row read the same sorted
    /// sequence.
    pub fn searchsorted(
        &self,
        m: isize,
        n: isize,
        a: Matrix<'_>,
        x: Vector<'_>,
        right: bool,
        y: VectorMut<'_>,
    ) -> Result<()> {
        let m = count("m", m)?;
        let n = count("n", n)?;
        let av = if a.ld == 0 {
            MatrixView::new_row_broadcast("A", a.buffer, m as isize, n as isize, a.offset)?
        } else {
            a.view("A", m, n)?
        };
        let xv = x.view("X", m)?;
        let mut yv = y.view("Y", m)?;
        ensure_same_type("searchsorted", av.dtype(), xv.dtype())?;
        require("searchsorted", av.dtype(), float)?;
        require("searchsorted", yv.dtype(), integer)?;
        trace!(op = "searchsorted", m, n, right, shared = a.ld == 0, "dispatch");
        surface("searchsorted", self.kernel.searchsorted(&av, &xv, right, &mut yv))
    }

    /// Per-row top `k` of `input(m,n)` into `values(m,k)` and `indices(m,k)`.
    #[allow(clippy::too_many_arguments)]
    pub fn topk(
        &self,
        m: isize,
        n: isize,
        k: isize,
        sorted: bool,
        input: Matrix<'_>,
        values: MatrixMut<'_>,
        indices: MatrixMut<'_>,
    ) -> Result<()> {
        let m = count("m", m)?;
        let n = count("n", n)?;
        let kk = count("k", k)?;
        if kk > n {
            return Err(LinbufError::InvalidShapeParameter { name: "k", value: k });
        }
        let iv = input.view("input", m, n)?;
        let mut vv = values.view("values", m, kk)?;
        let mut xv = indices.view("indices", m, kk)?;
        ensure_same_type("topk", iv.dtype(), vv.dtype())?;
        require("topk", iv.dtype(), float)?;
        require("topk", xv.dtype(), integer)?;
        trace!(op = "topk", m, n, k = kk, sorted, dtype = %iv.dtype(), "dispatch");
        let call = TopKCall { k: kk, sorted };
        surface("topk", self.kernel.topk(call, &iv, &mut vv, &mut xv))
    }

    /// Zero everything outside the band `[-lower, upper]` of `m` stacked
    /// `(n, k)` matrices. A negative bound keeps that whole triangle.
    pub fn bandpart(
        &self,
        m: isize,
        n: isize,
        k: isize,
        a: VectorMut<'_>,
        lower: isize,
        upper: isize,
    ) -> Result<()> {
        let batches = count("m", m)?;
        let rows = count("n", n)?;
        let cols = count("k", k)?;
        let len = extent("m*n*k", &[batches, rows, cols])?;
        let mut av = a.view("A", len)?;
        require("bandpart", av.dtype(), float)?;
        trace!(op = "bandpart", batches, rows, cols, lower, upper, "dispatch");
        let call = BandPartCall {
            batches,
            rows,
            cols,
            lower,
            upper,
        };
        surface("bandpart", self.kernel.bandpart(call, &mut av))
    }

    // ------------------------------------------------------------------------
    // Layout
    // ------------------------------------------------------------------------

    /// Permute the row-major array `A` of shape `shape` into `B`.
    ///
    /// `shape` and `perm` are `int32` buffers of equal length.
    pub fn transpose(
        &self,
        shape: &FlatBuffer,
        perm: &FlatBuffer,
        a: Vector<'_>,
        b: VectorMut<'_>,
    ) -> Result<()> {
        let dims = int32_values("transpose", shape)?;
        if dims.is_empty() {
            return Err(LinbufError::InvalidShapeParameter {
                name: "ndim",
                value: 0,
            });
        }
        let dims = dims
            .iter()
            .map(|&d| count("shape", d as isize))
            .collect::<Result<Vec<usize>>>()?;
        let axes: Vec<isize> = int32_values("transpose", perm)?
            .iter()
            .map(|&p| p as isize)
            .collect();
        let plan = plan_transpose(&dims, &axes)?;
        self.transpose_planned(&plan, a, b)
    }

    pub(crate) fn transpose_planned(
        &self,
        plan: &TransposePlan,
        a: Vector<'_>,
        b: VectorMut<'_>,
    ) -> Result<()> {
        let size = extent("shape", plan.source_shape())?;
        let av = a.view("A", size)?;
        let mut bv = b.view("B", size)?;
        ensure_same_type("transpose", av.dtype(), bv.dtype())?;
        require("transpose", av.dtype(), plain)?;
        trace!(op = "transpose", ndim = plan.ndim(), size, dtype = %av.dtype(), "dispatch");
        self.kernel
            .transpose(plan.source_shape(), plan.perm(), &av, &mut bv)
            .map_err(|status| {
                debug!(op = "transpose", code = status.code(), %status, "kernel failure");
                status.into_permutation_error("transpose")
            })
    }

    /// `B(m, repeats, k) := A(m, k)`.
    pub fn repeat(
        &self,
        m: isize,
        k: isize,
        repeats: isize,
        a: Vector<'_>,
        b: VectorMut<'_>,
    ) -> Result<()> {
        let m = count("m", m)?;
        let k = count("k", k)?;
        let repeats = count("repeats", repeats)?;
        let av = a.view("A", extent("m*k", &[m, k])?)?;
        let mut bv = b.view("B", extent("m*repeats*k", &[m, repeats, k])?)?;
        ensure_same_type("repeat", av.dtype(), bv.dtype())?;
        require("repeat", av.dtype(), not_complex)?;
        trace!(op = "repeat", m, k, repeats, dtype = %av.dtype(), "dispatch");
        let call = RepeatCall { m, k, repeats };
        surface("repeat", self.kernel.repeat(call, &av, &mut bv))
    }

    /// Copy the window `starts..starts+sizes` of `A(m, n, k, item)` into `Y`,
    /// or add it with `add_mode`.
    pub fn slice(
        &self,
        add_mode: bool,
        source: [isize; 4],
        a: Vector<'_>,
        y: VectorMut<'_>,
        starts: [isize; 3],
        sizes: [isize; 3],
    ) -> Result<()> {
        let window = flat_window(source, starts, sizes)?;
        self.slice_window(&window, add_mode, a, y)
    }

    /// Reverse of [`slice`](Self::slice): write `Y` back into the window of `A`.
    pub fn slice_scatter(
        &self,
        add_mode: bool,
        source: [isize; 4],
        y: Vector<'_>,
        a: VectorMut<'_>,
        starts: [isize; 3],
        sizes: [isize; 3],
    ) -> Result<()> {
        let window = flat_window(source, starts, sizes)?;
        self.scatter_window(&window, add_mode, y, a)
    }

    pub(crate) fn slice_window(
        &self,
        window: &SliceWindow,
        add_mode: bool,
        a: Vector<'_>,
        y: VectorMut<'_>,
    ) -> Result<()> {
        let av = a.view("A", window.source_len())?;
        let mut yv = y.view("Y", window.window_len())?;
        ensure_same_type("slice", av.dtype(), yv.dtype())?;
        require("slice", av.dtype(), not_complex)?;
        trace!(op = "slice", len = yv.len(), add_mode, dtype = %av.dtype(), "dispatch");
        surface("slice", self.kernel.slice(window, add_mode, &av, &mut yv))
    }

    pub(crate) fn scatter_window(
        &self,
        window: &SliceWindow,
        add_mode: bool,
        y: Vector<'_>,
        a: VectorMut<'_>,
    ) -> Result<()> {
        let yv = y.view("Y", window.window_len())?;
        let mut av = a.view("A", window.source_len())?;
        ensure_same_type("slice", av.dtype(), yv.dtype())?;
        require("slice", av.dtype(), not_complex)?;
        trace!(op = "slice_scatter", len = yv.len(), add_mode, dtype = %av.dtype(), "dispatch");
        surface("slice", self.kernel.slice_scatter(window, add_mode, &yv, &mut av))
    }

    // ------------------------------------------------------------------------
    // Indexing
    // ------------------------------------------------------------------------

    /// `B(n,k) := A(X(n),k)`; `A` holds `num_class` rows of `k` elements.
    #[allow(clippy::too_many_arguments)]
    pub fn gather(
        &self,
        add_mode: bool,
        n: isize,
        k: isize,
        num_class: isize,
        x: Vector<'_>,
        a: Vector<'_>,
        b: VectorMut<'_>,
    ) -> Result<()> {
        let call = gather_call(add_mode, n, k, num_class)?;
        let xv = x.view("X", call.n)?;
        let av = a.view("A", extent("numClass*k", &[call.num_class, call.k])?)?;
        let mut bv = b.view("B", extent("n*k", &[call.n, call.k])?)?;
        check_indexed("gather", &xv, av.dtype(), bv.dtype())?;
        trace!(op = "gather", n = call.n, k = call.k, num_class = call.num_class, "dispatch");
        surface("gather", self.kernel.gather(call, &xv, &av, &mut bv))
    }

    /// `A(X(n),k) := B(n,k)`, or `+=` with `add_mode`.
    #[allow(clippy::too_many_arguments)]
    pub fn scatter(
        &self,
        add_mode: bool,
        n: isize,
        k: isize,
        num_class: isize,
        x: Vector<'_>,
        b: Vector<'_>,
        a: VectorMut<'_>,
    ) -> Result<()> {
        let call = gather_call(add_mode, n, k, num_class)?;
        let xv = x.view("X", call.n)?;
        let bv = b.view("B", extent("n*k", &[call.n, call.k])?)?;
        let mut av = a.view("A", extent("numClass*k", &[call.num_class, call.k])?)?;
        check_indexed("gather", &xv, av.dtype(), bv.dtype())?;
        trace!(op = "scatter", n = call.n, k = call.k, num_class = call.num_class, "dispatch");
        surface("gather", self.kernel.scatter(call, &xv, &bv, &mut av))
    }

    /// `B(m,n) := A(m,X(m,n),n)`; `A` is `(m, num_class, n)`.
    #[allow(clippy::too_many_arguments)]
    pub fn reduce_gather(
        &self,
        add_mode: bool,
        m: isize,
        n: isize,
        num_class: isize,
        x: Vector<'_>,
        a: Vector<'_>,
        b: VectorMut<'_>,
    ) -> Result<()> {
        let call = reduce_gather_call(add_mode, m, n, num_class)?;
        let mn = extent("m*n", &[call.m, call.n])?;
        let xv = x.view("X", mn)?;
        let av = a.view("A", extent("m*numClass*n", &[call.m, call.num_class, call.n])?)?;
        let mut bv = b.view("B", mn)?;
        check_indexed("reduce_gather", &xv, av.dtype(), bv.dtype())?;
        trace!(op = "reduce_gather", m = call.m, n = call.n, classes = call.num_class, "dispatch");
        surface("reduce_gather", self.kernel.reduce_gather(call, &xv, &av, &mut bv))
    }

    /// `A(m,X(m,n),n) := B(m,n)`, or `+=` with `add_mode`.
    #[allow(clippy::too_many_arguments)]
    pub fn reduce_scatter(
        &self,
        add_mode: bool,
        m: isize,
        n: isize,
        num_class: isize,
        x: Vector<'_>,
        b: Vector<'_>,
        a: VectorMut<'_>,
    ) -> Result<()> {
        let call = reduce_gather_call(add_mode, m, n, num_class)?;
        let mn = extent("m*n", &[call.m, call.n])?;
        let xv = x.view("X", mn)?;
        let bv = b.view("B", mn)?;
        let mut av = a.view("A", extent("m*numClass*n", &[call.m, call.num_class, call.n])?)?;
        check_indexed("reduce_gather", &xv, av.dtype(), bv.dtype())?;
        trace!(op = "reduce_scatter", m = call.m, n = call.n, classes = call.num_class, "dispatch");
        surface("reduce_gather", self.kernel.reduce_scatter(call, &xv, &bv, &mut av))
    }

    // ------------------------------------------------------------------------
    // Axis reductions
    // ------------------------------------------------------------------------

    pub(crate) fn reduce(
        &self,
        op: ReduceOp,
        m: isize,
        n: isize,
        k: isize,
        a: Vector<'_>,
        b: VectorMut<'_>,
    ) -> Result<()> {
        let name = op.name();
        let m = count("m", m)?;
        let n = count("n", n)?;
        let k = count("k", k)?;
        let av = a.view("A", extent("m*n*k", &[m, n, k])?)?;
        let mut bv = b.view("B", extent("m*k", &[m, k])?)?;
        require(name, av.dtype(), float)?;
        match op {
            ReduceOp::ArgMax => require(name, bv.dtype(), integer)?,
            _ => ensure_same_type(name, av.dtype(), bv.dtype())?,
        }
        trace!(op = name, m, n, k, dtype = %av.dtype(), "dispatch");
        let call = ReduceCall { op, m, n, k };
        surface(name, self.kernel.reduce(call, &av, &mut bv))
    }

    /// `B(m,k) := Σ_n A(m,n,k)`
    pub fn reduce_sum(
        &self,
        m: isize,
        n: isize,
        k: isize,
        a: Vector<'_>,
        b: VectorMut<'_>,
    ) -> Result<()> {
        self.reduce(ReduceOp::Sum, m, n, k, a, b)
    }

    /// `B(m,k) := max_n A(m,n,k)`
    pub fn reduce_max(
        &self,
        m: isize,
        n: isize,
        k: isize,
        a: Vector<'_>,
        b: VectorMut<'_>,
    ) -> Result<()> {
        self.reduce(ReduceOp::Max, m, n, k, a, b)
    }

    /// `B(m,k) := argmax_n A(m,n,k)` into an integer buffer.
    pub fn reduce_argmax(
        &self,
        m: isize,
        n: isize,
        k: isize,
        a: Vector<'_>,
        b: VectorMut<'_>,
    ) -> Result<()> {
        self.reduce(ReduceOp::ArgMax, m, n, k, a, b)
    }

    // ------------------------------------------------------------------------
    // Random
    // ------------------------------------------------------------------------

    /// Floats in `[low, high)`, integers in `[low, high]`.
    pub fn random_uniform(
        &self,
        n: isize,
        x: VectorMut<'_>,
        low: Scalar,
        high: Scalar,
        seed: u64,
    ) -> Result<()> {
        let n = count("n", n)?;
        let mut xv = x.view("X", n)?;
        require("random_uniform", xv.dtype(), numeric)?;
        trace!(op = "random_uniform", n, seed, dtype = %xv.dtype(), "dispatch");
        surface(
            "random_uniform",
            self.kernel.random_uniform(&mut xv, low, high, seed),
        )
    }

    pub fn random_normal(
        &self,
        n: isize,
        x: VectorMut<'_>,
        mean: f64,
        scale: f64,
        seed: u64,
    ) -> Result<()> {
        let n = count("n", n)?;
        let mut xv = x.view("X", n)?;
        require("random_normal", xv.dtype(), float)?;
        trace!(op = "random_normal", n, seed, dtype = %xv.dtype(), "dispatch");
        surface(
            "random_normal",
            self.kernel.random_normal(&mut xv, mean, scale, seed),
        )
    }

    /// Fill `X` with a permutation of `0..n` whose first `size` entries are
    /// a uniform sample without replacement.
    pub fn random_sequence(
        &self,
        n: isize,
        size: isize,
        x: VectorMut<'_>,
        seed: u64,
    ) -> Result<()> {
        let n = count("n", n)?;
        let mut xv = x.view("X", n)?;
        if size < 1 || size as usize > n {
            return Err(LinbufError::InvalidShapeParameter {
                name: "size",
                value: size,
            });
        }
        require("random_sequence", xv.dtype(), integer)?;
        trace!(op = "random_sequence", n, size, seed, "dispatch");
        surface(
            "random_sequence",
            self.kernel.random_sequence(size as usize, &mut xv, seed),
        )
    }

    // ------------------------------------------------------------------------
    // Windowing
    // ------------------------------------------------------------------------

    /// Unfold 1D, 2D or 3D windows of `images` into `cols`.
    ///
    /// `spatial` holds one [`WindowParams`] per spatial dimension; its length
    /// selects the rank.
    pub fn im2col(
        &self,
        batches: isize,
        channels: isize,
        spatial: &[WindowParams],
        options: Im2ColOptions,
        images: Region<'_>,
        cols: RegionMut<'_>,
    ) -> Result<()> {
        let geometry = WindowGeometry::new(batches, channels, spatial, options.padding)?;
        let iv = images.view("images")?;
        let mut cv = cols.view("cols")?;
        check_window("im2col", &geometry, &iv, &cv.as_view())?;
        trace!(op = "im2col", rank = geometry.rank(), cols = cv.len(), "dispatch");
        let call = im2col_call(&geometry, options);
        surface("im2col", self.kernel.im2col(call, &iv, &mut cv))
    }

    /// Accumulate `cols` back into `images`; padded taps are dropped.
    pub fn col2im(
        &self,
        batches: isize,
        channels: isize,
        spatial: &[WindowParams],
        options: Im2ColOptions,
        cols: Region<'_>,
        images: RegionMut<'_>,
    ) -> Result<()> {
        let geometry = WindowGeometry::new(batches, channels, spatial, options.padding)?;
        let cv = cols.view("cols")?;
        let mut iv = images.view("images")?;
        check_window("im2col", &geometry, &iv.as_view(), &cv)?;
        trace!(op = "col2im", rank = geometry.rank(), cols = cv.len(), "dispatch");
        let call = im2col_call(&geometry, options);
        surface("col2im", self.kernel.col2im(call, &cv, &mut iv))
    }

    /// Shifted and flipped copy of one `(height, width, channels)` image.
    ///
    /// Positions shifted in from outside repeat the nearest edge pixel.
    pub fn imagecopy(
        &self,
        height: isize,
        width: isize,
        channels: isize,
        a: Vector<'_>,
        b: VectorMut<'_>,
        transform: ImageTransform,
    ) -> Result<()> {
        let height = count("height", height)?;
        let width = count("width", width)?;
        let channels = count("channels", channels)?;
        let len = extent("height*width*channels", &[height, width, channels])?;
        let av = a.view("A", len)?;
        let mut bv = b.view("B", len)?;
        ensure_same_type("imagecopy", av.dtype(), bv.dtype())?;
        require("imagecopy", av.dtype(), |t| {
            t.is_float() || t == ElementTypeTag::Uint8
        })?;
        trace!(op = "imagecopy", height, width, channels, dtype = %av.dtype(), "dispatch");
        let call = ImageCopyCall {
            height,
            width,
            channels,
            channels_first: transform.channels_first,
            height_shift: transform.height_shift,
            width_shift: transform.width_shift,
            vertical_flip: transform.vertical_flip,
            horizontal_flip: transform.horizontal_flip,
            rgb_flip: transform.rgb_flip,
        };
        surface("imagecopy", self.kernel.imagecopy(call, &av, &mut bv))
    }
}

// ============================================================================
// Call builders
// ============================================================================

fn int32_values<'a>(op: &'static str, buffer: &'a FlatBuffer) -> Result<&'a [i32]> {
    buffer
        .as_slice::<i32>()
        .ok_or(LinbufError::UnsupportedElementType {
            op,
            dtype: buffer.dtype(),
        })
}

/// Window over a flat `(m, n, k, item)` source. Starts and sizes are
/// absolute here; negative values are rejected rather than resolved.
fn flat_window(source: [isize; 4], starts: [isize; 3], sizes: [isize; 3]) -> Result<SliceWindow> {
    let [m, n, k, item] = source;
    let dims = [
        count("m", m)?,
        count("n", n)?,
        count("k", k)?,
        count("size", item)?,
    ];
    for axis in 0..3 {
        if starts[axis] < 0 {
            return Err(LinbufError::InvalidSliceStart {
                axis,
                start: starts[axis],
                dim: dims[axis],
            });
        }
        if sizes[axis] < 1 {
            return Err(LinbufError::InvalidSliceSize {
                axis,
                size: sizes[axis],
                dim: dims[axis],
            });
        }
    }
    extent("m*n*k*size", &dims)?;
    let specs: [SliceSpec; 3] = std::array::from_fn(|i| SliceSpec::new(starts[i], sizes[i]));
    resolve_slice(&dims, &specs)
}

fn gather_call(add_mode: bool, n: isize, k: isize, num_class: isize) -> Result<GatherCall> {
    Ok(GatherCall {
        add_mode,
        n: count("n", n)?,
        k: count("k", k)?,
        num_class: count("numClass", num_class)?,
    })
}

fn reduce_gather_call(
    add_mode: bool,
    m: isize,
    n: isize,
    num_class: isize,
) -> Result<ReduceGatherCall> {
    Ok(ReduceGatherCall {
        add_mode,
        m: count("m", m)?,
        n: count("n", n)?,
        num_class: count("numClass", num_class)?,
    })
}

/// Index buffer must be integer, data buffers must agree and not be complex.
fn check_indexed(
    op: &'static str,
    x: &VectorView<'_>,
    a: ElementTypeTag,
    b: ElementTypeTag,
) -> Result<()> {
    ensure_same_type(op, a, b)?;
    require(op, x.dtype(), integer)?;
    require(op, a, not_complex)
}

fn check_window(
    op: &'static str,
    geometry: &WindowGeometry,
    images: &VectorView<'_>,
    cols: &VectorView<'_>,
) -> Result<()> {
    ensure_same_type(op, images.dtype(), cols.dtype())?;
    require(op, images.dtype(), float)?;
    geometry.check_buffer_sizes(images.len(), cols.len())
}

fn im2col_call(geometry: &WindowGeometry, options: Im2ColOptions) -> Im2ColCall<'_> {
    Im2ColCall {
        geometry,
        channels_first: options.channels_first,
        cols_channels_first: options.cols_channels_first,
    }
}
