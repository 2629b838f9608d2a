//! Kernel library boundary for linbuf.
//!
//! The facade in `linbuf` validates every view and count and then makes a
//! single call into a [`KernelLibrary`]. This crate holds that trait, the
//! closed [`KernelStatus`] set a kernel may report, and [`ReferenceKernel`],
//! a pure-Rust implementation of every kernel family.
//!
//! # Example
//!
//! ```rust
//! use linbuf_kernel::{KernelLibrary, ReferenceKernel, Scalar};
//! use linbuf_view::{FlatBuffer, VectorView};
//!
//! let buf = FlatBuffer::from(vec![100.0f32, -10.0, -1000.0]);
//! let x = VectorView::new("X", &buf, 3, 0, 1).unwrap();
//! assert_eq!(ReferenceKernel::new().sum(&x), Ok(Scalar::Float(-910.0)));
//! ```
//!
//! # Features
//!
//! - `parallel`: split row-wise work of [`ReferenceKernel`] with rayon.

pub mod backend;
pub mod reference;
pub mod status;
mod threading;

// ============================================================================
// Kernel boundary
// ============================================================================
pub use backend::{
    BandPartCall, BroadcastOp, CompareOp, CumsumCall, GatherCall, Im2ColCall, ImageCopyCall,
    KernelInfo, KernelLibrary, ParallelMode, ReduceCall, ReduceGatherCall, ReduceOp, RepeatCall,
    Scalar, TopKCall, UnaryOp,
};
pub use reference::ReferenceKernel;
pub use status::{KernelResult, KernelStatus, STATUS_SUCCESS};

// ============================================================================
// Shared types
// ============================================================================
pub use linbuf_view::{ErrorKind, LinbufError, Result};
