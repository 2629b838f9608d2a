//! Pure-Rust implementation of every kernel family.
//!
//! [`ReferenceKernel`] is the default kernel injected into the facade. Each
//! method selects the typed implementation with a single `match` over the
//! buffer variants and trusts the view invariants it is handed.

use linbuf_plan::SliceWindow;
use linbuf_view::{MatrixView, MatrixViewMut, VectorView, VectorViewMut};

use crate::backend::{
    BandPartCall, BroadcastOp, CompareOp, CumsumCall, GatherCall, Im2ColCall, ImageCopyCall,
    KernelInfo, KernelLibrary, ReduceCall, ReduceGatherCall, RepeatCall, Scalar, TopKCall,
    UnaryOp,
};
use crate::status::KernelResult;
use crate::threading;

use elementwise::Extreme;

// ============================================================================
// Typed dispatch
// ============================================================================

/// `float32` and `float64`.
macro_rules! dispatch_float {
    ($buf:expr, $d:ident => $body:expr) => {
        match $buf {
            ::linbuf_view::FlatBuffer::F32($d) => $body,
            ::linbuf_view::FlatBuffer::F64($d) => $body,
            _ => return Err($crate::status::KernelStatus::UnsupportedDataType),
        }
    };
}

/// Two buffers of the same float type.
macro_rules! dispatch_float2 {
    ($a:expr, $b:expr, $x:ident, $y:ident => $body:expr) => {
        match ($a, $b) {
            (::linbuf_view::FlatBuffer::F32($x), ::linbuf_view::FlatBuffer::F32($y)) => $body,
            (::linbuf_view::FlatBuffer::F64($x), ::linbuf_view::FlatBuffer::F64($y)) => $body,
            _ => return Err($crate::status::KernelStatus::UnsupportedDataType),
        }
    };
}

/// Signed and unsigned integers, without `bool`.
macro_rules! dispatch_int {
    ($buf:expr, $d:ident => $body:expr) => {
        match $buf {
            ::linbuf_view::FlatBuffer::I8($d) => $body,
            ::linbuf_view::FlatBuffer::U8($d) => $body,
            ::linbuf_view::FlatBuffer::I16($d) => $body,
            ::linbuf_view::FlatBuffer::U16($d) => $body,
            ::linbuf_view::FlatBuffer::I32($d) => $body,
            ::linbuf_view::FlatBuffer::U32($d) => $body,
            ::linbuf_view::FlatBuffer::I64($d) => $body,
            ::linbuf_view::FlatBuffer::U64($d) => $body,
            _ => return Err($crate::status::KernelStatus::UnsupportedDataType),
        }
    };
}

/// Integers and `float32`/`float64`.
macro_rules! dispatch_numeric {
    ($buf:expr, $d:ident => $body:expr) => {
        match $buf {
            ::linbuf_view::FlatBuffer::I8($d) => $body,
            ::linbuf_view::FlatBuffer::U8($d) => $body,
            ::linbuf_view::FlatBuffer::I16($d) => $body,
            ::linbuf_view::FlatBuffer::U16($d) => $body,
            ::linbuf_view::FlatBuffer::I32($d) => $body,
            ::linbuf_view::FlatBuffer::U32($d) => $body,
            ::linbuf_view::FlatBuffer::I64($d) => $body,
            ::linbuf_view::FlatBuffer::U64($d) => $body,
            ::linbuf_view::FlatBuffer::F32($d) => $body,
            ::linbuf_view::FlatBuffer::F64($d) => $body,
            _ => return Err($crate::status::KernelStatus::UnsupportedDataType),
        }
    };
}

/// `bool`, integers and `float32`/`float64`.
macro_rules! dispatch_copyable {
    ($buf:expr, $d:ident => $body:expr) => {
        match $buf {
            ::linbuf_view::FlatBuffer::Bool($d) => $body,
            ::linbuf_view::FlatBuffer::I8($d) => $body,
            ::linbuf_view::FlatBuffer::U8($d) => $body,
            ::linbuf_view::FlatBuffer::I16($d) => $body,
            ::linbuf_view::FlatBuffer::U16($d) => $body,
            ::linbuf_view::FlatBuffer::I32($d) => $body,
            ::linbuf_view::FlatBuffer::U32($d) => $body,
            ::linbuf_view::FlatBuffer::I64($d) => $body,
            ::linbuf_view::FlatBuffer::U64($d) => $body,
            ::linbuf_view::FlatBuffer::F32($d) => $body,
            ::linbuf_view::FlatBuffer::F64($d) => $body,
            _ => return Err($crate::status::KernelStatus::UnsupportedDataType),
        }
    };
}

/// Every non-complex type, `float16` included.
macro_rules! dispatch_real {
    ($buf:expr, $d:ident => $body:expr) => {
        match $buf {
            ::linbuf_view::FlatBuffer::Bool($d) => $body,
            ::linbuf_view::FlatBuffer::I8($d) => $body,
            ::linbuf_view::FlatBuffer::U8($d) => $body,
            ::linbuf_view::FlatBuffer::I16($d) => $body,
            ::linbuf_view::FlatBuffer::U16($d) => $body,
            ::linbuf_view::FlatBuffer::I32($d) => $body,
            ::linbuf_view::FlatBuffer::U32($d) => $body,
            ::linbuf_view::FlatBuffer::I64($d) => $body,
            ::linbuf_view::FlatBuffer::U64($d) => $body,
            ::linbuf_view::FlatBuffer::F16($d) => $body,
            ::linbuf_view::FlatBuffer::F32($d) => $body,
            ::linbuf_view::FlatBuffer::F64($d) => $body,
            _ => return Err($crate::status::KernelStatus::UnsupportedDataType),
        }
    };
}

/// Two buffers of the same non-complex type.
macro_rules! dispatch_real2 {
    ($a:expr, $b:expr, $x:ident, $y:ident => $body:expr) => {
        match ($a, $b) {
            (::linbuf_view::FlatBuffer::Bool($x), ::linbuf_view::FlatBuffer::Bool($y)) => $body,
            (::linbuf_view::FlatBuffer::I8($x), ::linbuf_view::FlatBuffer::I8($y)) => $body,
            (::linbuf_view::FlatBuffer::U8($x), ::linbuf_view::FlatBuffer::U8($y)) => $body,
            (::linbuf_view::FlatBuffer::I16($x), ::linbuf_view::FlatBuffer::I16($y)) => $body,
            (::linbuf_view::FlatBuffer::U16($x), ::linbuf_view::FlatBuffer::U16($y)) => $body,
            (::linbuf_view::FlatBuffer::I32($x), ::linbuf_view::FlatBuffer::I32($y)) => $body,
            (::linbuf_view::FlatBuffer::U32($x), ::linbuf_view::FlatBuffer::U32($y)) => $body,
            (::linbuf_view::FlatBuffer::I64($x), ::linbuf_view::FlatBuffer::I64($y)) => $body,
            (::linbuf_view::FlatBuffer::U64($x), ::linbuf_view::FlatBuffer::U64($y)) => $body,
            (::linbuf_view::FlatBuffer::F16($x), ::linbuf_view::FlatBuffer::F16($y)) => $body,
            (::linbuf_view::FlatBuffer::F32($x), ::linbuf_view::FlatBuffer::F32($y)) => $body,
            (::linbuf_view::FlatBuffer::F64($x), ::linbuf_view::FlatBuffer::F64($y)) => $body,
            _ => return Err($crate::status::KernelStatus::UnsupportedDataType),
        }
    };
}

/// Two buffers of the same type, complex included.
macro_rules! dispatch_any2 {
    ($a:expr, $b:expr, $x:ident, $y:ident => $body:expr) => {
        match ($a, $b) {
            (::linbuf_view::FlatBuffer::C64($x), ::linbuf_view::FlatBuffer::C64($y)) => $body,
            (::linbuf_view::FlatBuffer::C128($x), ::linbuf_view::FlatBuffer::C128($y)) => $body,
            (a, b) => dispatch_real2!(a, b, $x, $y => $body),
        }
    };
}

mod element;
mod elementwise;
mod indexing;
mod layout;
mod matrix;
mod random;
mod window;

// ============================================================================
// ReferenceKernel
// ============================================================================

/// In-process kernel library written against the view types.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceKernel;

impl ReferenceKernel {
    pub const NAME: &'static str = "linbuf-reference";

    pub fn new() -> Self {
        ReferenceKernel
    }
}

impl KernelLibrary for ReferenceKernel {
    fn info(&self) -> KernelInfo {
        KernelInfo {
            name: Self::NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            num_threads: threading::num_threads(),
            num_procs: std::thread::available_parallelism().map_or(1, |n| n.get()),
            parallel: threading::mode(),
        }
    }

    fn sum(&self, x: &VectorView<'_>) -> KernelResult<Scalar> {
        elementwise::sum(x)
    }

    fn imax(&self, x: &VectorView<'_>) -> KernelResult<usize> {
        elementwise::first_extreme(x, Extreme::Max)
    }

    fn imin(&self, x: &VectorView<'_>) -> KernelResult<usize> {
        elementwise::first_extreme(x, Extreme::Min)
    }

    fn unary(&self, op: UnaryOp, x: &mut VectorViewMut<'_>) -> KernelResult<()> {
        elementwise::unary(op, x)
    }

    fn zeros(&self, x: &mut VectorViewMut<'_>) -> KernelResult<()> {
        elementwise::zeros(x)
    }

    fn not(&self, x: &mut VectorViewMut<'_>) -> KernelResult<()> {
        elementwise::not(x)
    }

    fn compare(
        &self,
        op: CompareOp,
        x: &VectorView<'_>,
        y: &mut VectorViewMut<'_>,
    ) -> KernelResult<()> {
        elementwise::compare(op, x, y)
    }

    fn astype(&self, x: &VectorView<'_>, y: &mut VectorViewMut<'_>) -> KernelResult<()> {
        elementwise::astype(x, y)
    }

    fn fill(&self, value: &VectorView<'_>, x: &mut VectorViewMut<'_>) -> KernelResult<()> {
        elementwise::fill(value, x)
    }

    fn cumsum(
        &self,
        call: CumsumCall,
        x: &VectorView<'_>,
        y: &mut VectorViewMut<'_>,
    ) -> KernelResult<()> {
        elementwise::cumsum(call, x, y)
    }

    fn broadcast(
        &self,
        op: BroadcastOp,
        trans: bool,
        x: &VectorView<'_>,
        a: &mut MatrixViewMut<'_>,
    ) -> KernelResult<()> {
        matrix::broadcast(op, trans, x, a)
    }

    fn matrixcopy(
        &self,
        trans: bool,
        alpha: f64,
        a: &MatrixView<'_>,
        b: &mut MatrixViewMut<'_>,
    ) -> KernelResult<()> {
        matrix::matrixcopy(trans, alpha, a, b)
    }

    fn softmax(&self, a: &mut MatrixViewMut<'_>) -> KernelResult<()> {
        matrix::softmax(a)
    }

    fn onehot(
        &self,
        alpha: f64,
        x: &VectorView<'_>,
        y: &mut MatrixViewMut<'_>,
    ) -> KernelResult<()> {
        matrix::onehot(alpha, x, y)
    }

    fn searchsorted(
        &self,
        a: &MatrixView<'_>,
        x: &VectorView<'_>,
        right: bool,
        y: &mut VectorViewMut<'_>,
    ) -> KernelResult<()> {
        matrix::searchsorted(a, x, right, y)
    }

    fn topk(
        &self,
        call: TopKCall,
        input: &MatrixView<'_>,
        values: &mut MatrixViewMut<'_>,
        indices: &mut MatrixViewMut<'_>,
    ) -> KernelResult<()> {
        matrix::topk(call, input, values, indices)
    }

    fn bandpart(&self, call: BandPartCall, a: &mut VectorViewMut<'_>) -> KernelResult<()> {
        matrix::bandpart(call, a)
    }

    fn transpose(
        &self,
        shape: &[usize],
        perm: &[usize],
        a: &VectorView<'_>,
        b: &mut VectorViewMut<'_>,
    ) -> KernelResult<()> {
        layout::transpose(shape, perm, a, b)
    }

    fn repeat(
        &self,
        call: RepeatCall,
        a: &VectorView<'_>,
        b: &mut VectorViewMut<'_>,
    ) -> KernelResult<()> {
        layout::repeat(call, a, b)
    }

    fn slice(
        &self,
        window: &SliceWindow,
        add_mode: bool,
        a: &VectorView<'_>,
        y: &mut VectorViewMut<'_>,
    ) -> KernelResult<()> {
        layout::slice(window, add_mode, a, y)
    }

    fn slice_scatter(
        &self,
        window: &SliceWindow,
        add_mode: bool,
        y: &VectorView<'_>,
        a: &mut VectorViewMut<'_>,
    ) -> KernelResult<()> {
        layout::slice_scatter(window, add_mode, y, a)
    }

    fn gather(
        &self,
        call: GatherCall,
        x: &VectorView<'_>,
        a: &VectorView<'_>,
        b: &mut VectorViewMut<'_>,
    ) -> KernelResult<()> {
        indexing::gather(call, x, a, b)
    }

    fn scatter(
        &self,
        call: GatherCall,
        x: &VectorView<'_>,
        b: &VectorView<'_>,
        a: &mut VectorViewMut<'_>,
    ) -> KernelResult<()> {
        indexing::scatter(call, x, b, a)
    }

    fn reduce_gather(
        &self,
        call: ReduceGatherCall,
        x: &VectorView<'_>,
        a: &VectorView<'_>,
        b: &mut VectorViewMut<'_>,
    ) -> KernelResult<()> {
        indexing::reduce_gather(call, x, a, b)
    }

    fn reduce_scatter(
        &self,
        call: ReduceGatherCall,
        x: &VectorView<'_>,
        b: &VectorView<'_>,
        a: &mut VectorViewMut<'_>,
    ) -> KernelResult<()> {
        indexing::reduce_scatter(call, x, b, a)
    }

    fn reduce(
        &self,
        call: ReduceCall,
        a: &VectorView<'_>,
        b: &mut VectorViewMut<'_>,
    ) -> KernelResult<()> {
        indexing::reduce(call, a, b)
    }

    fn random_uniform(
        &self,
        x: &mut VectorViewMut<'_>,
        low: Scalar,
        high: Scalar,
        seed: u64,
    ) -> KernelResult<()> {
        random::uniform(x, low, high, seed)
    }

    fn random_normal(
        &self,
        x: &mut VectorViewMut<'_>,
        mean: f64,
        scale: f64,
        seed: u64,
    ) -> KernelResult<()> {
        random::normal(x, mean, scale, seed)
    }

    fn random_sequence(
        &self,
        size: usize,
        x: &mut VectorViewMut<'_>,
        seed: u64,
    ) -> KernelResult<()> {
        random::sequence(size, x, seed)
    }

    fn im2col(
        &self,
        call: Im2ColCall<'_>,
        images: &VectorView<'_>,
        cols: &mut VectorViewMut<'_>,
    ) -> KernelResult<()> {
        window::im2col(call, images, cols)
    }

    fn col2im(
        &self,
        call: Im2ColCall<'_>,
        cols: &VectorView<'_>,
        images: &mut VectorViewMut<'_>,
    ) -> KernelResult<()> {
        window::col2im(call, cols, images)
    }

    fn imagecopy(
        &self,
        call: ImageCopyCall,
        a: &VectorView<'_>,
        b: &mut VectorViewMut<'_>,
    ) -> KernelResult<()> {
        window::imagecopy(call, a, b)
    }
}
