//! The kernel library boundary.
//!
//! This module defines the [`KernelLibrary`] trait, the operation selectors
//! passed to its methods and the small call structs that bundle plain
//! dimension counts. Every view handed to a kernel has already been validated
//! by `linbuf-view`, and every count by `linbuf-plan`: a kernel trusts its
//! inputs and only reports the closed [`KernelStatus`](crate::KernelStatus) set.

use linbuf_plan::{SliceWindow, WindowGeometry};
use linbuf_view::{MatrixView, MatrixViewMut, VectorView, VectorViewMut};

use crate::status::KernelResult;

// ---------------------------------------------------------------------------
// Kernel information
// ---------------------------------------------------------------------------

/// How the kernel library executes work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParallelMode {
    Sequential,
    Thread,
    OpenMP,
}

impl ParallelMode {
    /// Code used on the kernel side of the boundary.
    pub fn code(self) -> i32 {
        match self {
            ParallelMode::Sequential => 0,
            ParallelMode::Thread => 1,
            ParallelMode::OpenMP => 2,
        }
    }
}

/// Static information about a kernel library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelInfo {
    pub name: String,
    pub version: String,
    pub num_threads: usize,
    pub num_procs: usize,
    pub parallel: ParallelMode,
}

// ---------------------------------------------------------------------------
// Operation selectors
// ---------------------------------------------------------------------------

/// Scalar produced by a reduction or consumed by a random generator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Float(f64),
    Int(i64),
}

impl Scalar {
    pub fn as_f64(self) -> f64 {
        match self {
            Scalar::Float(v) => v,
            Scalar::Int(v) => v as f64,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            Scalar::Float(v) => v as i64,
            Scalar::Int(v) => v,
        }
    }
}

/// In-place elementwise float operations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    /// `x := alpha*x + beta`
    Increment { alpha: f64, beta: f64 },
    /// `x := 1 / (alpha*x + beta)`
    Reciprocal { alpha: f64, beta: f64 },
    Square,
    Sqrt,
    /// `x := 1 / (alpha*sqrt(x) + beta)`
    Rsqrt { alpha: f64, beta: f64 },
    Exp,
    Log,
    Tanh,
    Sin,
    Cos,
    Tan,
    /// NaN becomes `value`.
    Nan2Num { value: f64 },
    /// `x := isnan(x) ? 1 : 0`
    IsNan,
}

impl UnaryOp {
    pub fn name(self) -> &'static str {
        match self {
            UnaryOp::Increment { .. } => "increment",
            UnaryOp::Reciprocal { .. } => "reciprocal",
            UnaryOp::Square => "square",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Rsqrt { .. } => "rsqrt",
            UnaryOp::Exp => "exp",
            UnaryOp::Log => "log",
            UnaryOp::Tanh => "tanh",
            UnaryOp::Sin => "sin",
            UnaryOp::Cos => "cos",
            UnaryOp::Tan => "tan",
            UnaryOp::Nan2Num { .. } => "nan2num",
            UnaryOp::IsNan => "isnan",
        }
    }
}

/// `y := (x op y) ? 1 : 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
}

/// Matrix-vector broadcast operations `A(m,n) := f(A(m,n), X(n))`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BroadcastOp {
    Maximum,
    Minimum,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Multiply,
    /// `A := alpha*X + A`
    Add { alpha: f64 },
    /// `A := X`
    Duplicate,
    /// `A := A ** X`
    Pow,
}

impl BroadcastOp {
    pub fn name(self) -> &'static str {
        match self {
            BroadcastOp::Maximum => "maximum",
            BroadcastOp::Minimum => "minimum",
            BroadcastOp::Greater => "greater",
            BroadcastOp::GreaterEqual => "greater_equal",
            BroadcastOp::Less => "less",
            BroadcastOp::LessEqual => "less_equal",
            BroadcastOp::Multiply => "multiply",
            BroadcastOp::Add { .. } => "add",
            BroadcastOp::Duplicate => "duplicate",
            BroadcastOp::Pow => "pow",
        }
    }
}

/// Reductions over the middle axis of an `(m, n, k)` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Max,
    ArgMax,
}

impl ReduceOp {
    pub fn name(self) -> &'static str {
        match self {
            ReduceOp::Sum => "reduce_sum",
            ReduceOp::Max => "reduce_max",
            ReduceOp::ArgMax => "reduce_argmax",
        }
    }
}

// ---------------------------------------------------------------------------
// Call parameters
// ---------------------------------------------------------------------------

/// `B(m,k) := reduce_n A(m,n,k)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReduceCall {
    pub op: ReduceOp,
    pub m: usize,
    pub n: usize,
    pub k: usize,
}

/// `B(n,k) := A(X(n),k)`; `A` holds `num_class` rows of `k` elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatherCall {
    pub add_mode: bool,
    pub n: usize,
    pub k: usize,
    pub num_class: usize,
}

/// `B(m,n) := A(m,X(m,n),n)`; `A` is `(m, num_class, n)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReduceGatherCall {
    pub add_mode: bool,
    pub m: usize,
    pub n: usize,
    pub num_class: usize,
}

/// `B(m,repeats,k) := A(m,k)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatCall {
    pub m: usize,
    pub k: usize,
    pub repeats: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CumsumCall {
    pub exclusive: bool,
    pub reverse: bool,
}

/// Zero everything outside the band `[-lower, upper]` of `batches` matrices
/// of shape `(rows, cols)`. A negative bound keeps that whole triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandPartCall {
    pub batches: usize,
    pub rows: usize,
    pub cols: usize,
    pub lower: isize,
    pub upper: isize,
}

/// Per-row top `k` of an `(m, n)` input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopKCall {
    pub k: usize,
    pub sorted: bool,
}

/// Shifted and flipped copy of one `(height, width, channels)` image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageCopyCall {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    pub channels_first: bool,
    pub height_shift: isize,
    pub width_shift: isize,
    pub vertical_flip: bool,
    pub horizontal_flip: bool,
    pub rgb_flip: bool,
}

/// Layout of an im2col/col2im call.
///
/// Images are `(batches, spatial.., channels)` or, with `channels_first`,
/// `(batches, channels, spatial..)`. Columns are
/// `(batches, out.., filter.., channels)` or, with `cols_channels_first`,
/// `(batches, out.., channels, filter..)`.
#[derive(Debug, Clone, Copy)]
pub struct Im2ColCall<'g> {
    pub geometry: &'g WindowGeometry,
    pub channels_first: bool,
    pub cols_channels_first: bool,
}

// ---------------------------------------------------------------------------
// KernelLibrary
// ---------------------------------------------------------------------------

/// A library of numeric kernels over validated flat-buffer views.
///
/// One method per operation family. Reversible families are split into a
/// forward and a reverse method so that the written buffer is always the one
/// passed mutably. Implementations must not assume any check beyond the view
/// invariants; element-type support is re-checked with a single `match` and
/// reported as [`KernelStatus::UnsupportedDataType`](crate::KernelStatus).
pub trait KernelLibrary: Send + Sync {
    fn info(&self) -> KernelInfo;

    // ---- reductions over a vector ----

    fn sum(&self, x: &VectorView<'_>) -> KernelResult<Scalar>;
    /// Index of the first maximum.
    fn imax(&self, x: &VectorView<'_>) -> KernelResult<usize>;
    /// Index of the first minimum.
    fn imin(&self, x: &VectorView<'_>) -> KernelResult<usize>;

    // ---- elementwise ----

    fn unary(&self, op: UnaryOp, x: &mut VectorViewMut<'_>) -> KernelResult<()>;
    fn zeros(&self, x: &mut VectorViewMut<'_>) -> KernelResult<()>;
    /// `x := (x == 0) ? 1 : 0`
    fn not(&self, x: &mut VectorViewMut<'_>) -> KernelResult<()>;
    fn compare(
        &self,
        op: CompareOp,
        x: &VectorView<'_>,
        y: &mut VectorViewMut<'_>,
    ) -> KernelResult<()>;
    /// `y := cast(x)` between any two non-complex types.
    fn astype(&self, x: &VectorView<'_>, y: &mut VectorViewMut<'_>) -> KernelResult<()>;
    /// Every element of `x` becomes `value[0]`.
    fn fill(&self, value: &VectorView<'_>, x: &mut VectorViewMut<'_>) -> KernelResult<()>;
    fn cumsum(
        &self,
        call: CumsumCall,
        x: &VectorView<'_>,
        y: &mut VectorViewMut<'_>,
    ) -> KernelResult<()>;

    // ---- matrix / vector ----

    /// `A(m,n) := op(A, X)`; with `trans`, `X` runs down the columns.
    fn broadcast(
        &self,
        op: BroadcastOp,
        trans: bool,
        x: &VectorView<'_>,
        a: &mut MatrixViewMut<'_>,
    ) -> KernelResult<()>;
    /// `B := alpha * op(A)`.
    fn matrixcopy(
        &self,
        trans: bool,
        alpha: f64,
        a: &MatrixView<'_>,
        b: &mut MatrixViewMut<'_>,
    ) -> KernelResult<()>;
    fn softmax(&self, a: &mut MatrixViewMut<'_>) -> KernelResult<()>;
    /// `Y(i, X(i)) += alpha`.
    fn onehot(
        &self,
        alpha: f64,
        x: &VectorView<'_>,
        y: &mut MatrixViewMut<'_>,
    ) -> KernelResult<()>;
    /// `Y(i) := insertion index of X(i) in row i of A`.
    fn searchsorted(
        &self,
        a: &MatrixView<'_>,
        x: &VectorView<'_>,
        right: bool,
        y: &mut VectorViewMut<'_>,
    ) -> KernelResult<()>;
    fn topk(
        &self,
        call: TopKCall,
        input: &MatrixView<'_>,
        values: &mut MatrixViewMut<'_>,
        indices: &mut MatrixViewMut<'_>,
    ) -> KernelResult<()>;
    fn bandpart(&self, call: BandPartCall, a: &mut VectorViewMut<'_>) -> KernelResult<()>;

    // ---- layout ----

    /// Row-major N-d transpose of `a` (shape `shape`) into `b`.
    fn transpose(
        &self,
        shape: &[usize],
        perm: &[usize],
        a: &VectorView<'_>,
        b: &mut VectorViewMut<'_>,
    ) -> KernelResult<()>;
    fn repeat(
        &self,
        call: RepeatCall,
        a: &VectorView<'_>,
        b: &mut VectorViewMut<'_>,
    ) -> KernelResult<()>;
    fn slice(
        &self,
        window: &SliceWindow,
        add_mode: bool,
        a: &VectorView<'_>,
        y: &mut VectorViewMut<'_>,
    ) -> KernelResult<()>;
    /// Reverse of [`slice`](Self::slice): write `y` back into the window of `a`.
    fn slice_scatter(
        &self,
        window: &SliceWindow,
        add_mode: bool,
        y: &VectorView<'_>,
        a: &mut VectorViewMut<'_>,
    ) -> KernelResult<()>;

    // ---- indexing ----

    fn gather(
        &self,
        call: GatherCall,
        x: &VectorView<'_>,
        a: &VectorView<'_>,
        b: &mut VectorViewMut<'_>,
    ) -> KernelResult<()>;
    /// `A(X(n),k) := B(n,k)` (or `+=` with `add_mode`).
    fn scatter(
        &self,
        call: GatherCall,
        x: &VectorView<'_>,
        b: &VectorView<'_>,
        a: &mut VectorViewMut<'_>,
    ) -> KernelResult<()>;
    fn reduce_gather(
        &self,
        call: ReduceGatherCall,
        x: &VectorView<'_>,
        a: &VectorView<'_>,
        b: &mut VectorViewMut<'_>,
    ) -> KernelResult<()>;
    fn reduce_scatter(
        &self,
        call: ReduceGatherCall,
        x: &VectorView<'_>,
        b: &VectorView<'_>,
        a: &mut VectorViewMut<'_>,
    ) -> KernelResult<()>;
    fn reduce(
        &self,
        call: ReduceCall,
        a: &VectorView<'_>,
        b: &mut VectorViewMut<'_>,
    ) -> KernelResult<()>;

    // ---- random ----

    /// Floats in `[low, high)`, integers in `[low, high]`.
    fn random_uniform(
        &self,
        x: &mut VectorViewMut<'_>,
        low: Scalar,
        high: Scalar,
        seed: u64,
    ) -> KernelResult<()>;
    fn random_normal(
        &self,
        x: &mut VectorViewMut<'_>,
        mean: f64,
        scale: f64,
        seed: u64,
    ) -> KernelResult<()>;
    /// `x` holds a permutation of `0..x.len()` whose first `size` entries are
    /// a uniform sample without replacement.
    fn random_sequence(&self, size: usize, x: &mut VectorViewMut<'_>, seed: u64)
        -> KernelResult<()>;

    // ---- windowing ----

    fn im2col(
        &self,
        call: Im2ColCall<'_>,
        images: &VectorView<'_>,
        cols: &mut VectorViewMut<'_>,
    ) -> KernelResult<()>;
    /// Accumulate columns back into images (`+=`); padded taps are dropped.
    fn col2im(
        &self,
        call: Im2ColCall<'_>,
        cols: &VectorView<'_>,
        images: &mut VectorViewMut<'_>,
    ) -> KernelResult<()>;
    fn imagecopy(
        &self,
        call: ImageCopyCall,
        a: &VectorView<'_>,
        b: &mut VectorViewMut<'_>,
    ) -> KernelResult<()>;
}
