//! Validated shape planning and flat-buffer dispatch for tensor kernels.
//!
//! Numeric kernels in linbuf run behind a [`KernelLibrary`] that trusts its
//! inputs completely. This crate is the layer in front of it: every offset,
//! stride, leading dimension, element count, axis and permutation is checked
//! here, and a kernel is called only once all of them hold.
//!
//! # Core Types
//!
//! - [`FlatBuffer`]: type-tagged linear storage ([`ElementTypeTag`])
//! - [`Vector`] / [`Matrix`] / [`Region`] (and `*Mut`): operand descriptors
//!   for the flat entry points
//! - [`TensorRef`] / [`TensorMut`]: `{buffer, offset, shape}` handles for the
//!   shape-level entry points
//! - [`LinbufError`] / [`ErrorKind`]: the shared error taxonomy
//!
//! # Primary API
//!
//! ## Flat operations
//!
//! [`FlatOps`] exposes one validated method per kernel operation, taking the
//! same `(n, buffer, offset, increment)` style arguments a BLAS-like library
//! does: [`sum`](FlatOps::sum), [`exp`](FlatOps::exp),
//! [`maximum`](FlatOps::maximum), [`gather`](FlatOps::gather),
//! [`transpose`](FlatOps::transpose), [`im2col`](FlatOps::im2col) and so on.
//!
//! ## Shape-level operations
//!
//! [`NdOps`], obtained with [`FlatOps::nd`], takes tensor handles, runs the
//! planners of `linbuf-plan` and forwards the flat parameters:
//!
//! - broadcast ops via [`resolve_broadcast`]
//! - axis reductions and gather/scatter via [`plan_axis_reduction`]
//! - transpose via [`plan_transpose`]
//! - slicing via [`resolve_slice`]
//! - im2col/col2im via [`WindowGeometry`]
//!
//! # Example
//!
//! ```rust
//! use linbuf::{FlatBuffer, FlatOps, TensorMut, TensorRef};
//!
//! let ops = FlatOps::reference();
//!
//! // Add a row vector to every row of a 3x2 matrix.
//! let x = FlatBuffer::from(vec![10.0f64, 20.0]);
//! let mut a = FlatBuffer::from(vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! ops.nd()
//!     .add(
//!         false,
//!         1.0,
//!         &TensorRef::new(&x, 0, &[2]).unwrap(),
//!         TensorMut::new(&mut a, 0, &[3, 2]).unwrap(),
//!     )
//!     .unwrap();
//! assert_eq!(
//!     a.as_slice::<f64>().unwrap(),
//!     &[11.0, 22.0, 13.0, 24.0, 15.0, 26.0]
//! );
//! ```
//!
//! # Logging
//!
//! Each kernel dispatch emits a `tracing` event at `TRACE` level, and each
//! kernel-reported failure one at `DEBUG` level. Install a subscriber to see
//! them.
//!
//! # Features
//!
//! - `parallel`: row-parallel execution in the reference kernel.

mod operand;

pub mod nd;
pub mod ops;
pub mod tensor;

// ============================================================================
// Entry points
// ============================================================================
pub use nd::{NdOps, WindowSpec};
pub use operand::{Matrix, MatrixMut, Region, RegionMut, Vector, VectorMut};
pub use ops::{FlatOps, Im2ColOptions, ImageTransform};
pub use tensor::{TensorMut, TensorRef};

// ============================================================================
// Kernel boundary
// ============================================================================
pub use linbuf_kernel::{
    BroadcastOp, KernelInfo, KernelLibrary, KernelStatus, ParallelMode, ReferenceKernel, Scalar,
    UnaryOp,
};

// ============================================================================
// Planners
// ============================================================================
pub use linbuf_plan::{
    plan_axis_reduction, plan_transpose, resolve_broadcast, resolve_slice,
    resolve_window_geometry, AxisReductionPlan, BroadcastPlan, PaddingMode, SliceSpec,
    SliceWindow, TransposePlan, WindowGeometry, WindowParams,
};

// ============================================================================
// Buffers, views and errors
// ============================================================================
pub use linbuf_view::{
    validate_matrix, validate_region, validate_vector, ElementTypeTag, ErrorKind, ErrorTier,
    FlatBuffer, LinbufError, Result, Shape,
};
