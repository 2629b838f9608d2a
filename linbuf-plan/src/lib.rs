//! Shape planners that turn N-dimensional requests into flat kernel parameters.
//!
//! Every planner is a pure function over shapes and small integer arguments.
//! Each either returns a plan holding the exact counts a kernel call needs or
//! fails with a [`LinbufError`] before any buffer is touched.
//!
//! - [`resolve_broadcast`]: vector-over-matrix broadcast with optional transpose
//! - [`plan_axis_reduction`]: `(outer, axis_len, inner, class_count)` for an axis
//! - [`plan_transpose`]: permutation validation and destination shape
//! - [`resolve_slice`]: up to three `(start, size)` windows with negative indexing
//! - [`resolve_window_geometry`] / [`WindowGeometry`]: im2col output extents and buffer sizes

pub mod axis;
pub mod broadcast;
pub mod slice;
pub mod transpose;
pub mod window;


// ============================================================================
// Planners
// ============================================================================
pub use axis::{normalize_axis, plan_axis_reduction, AxisReductionPlan};
pub use broadcast::{resolve_broadcast, BroadcastPlan};
pub use slice::{resolve_slice, SliceSpec, SliceWindow};
pub use transpose::{inverse_permutation, plan_transpose, TransposePlan};
pub use window::{
    resolve_dim, resolve_window_geometry, DimGeometry, PaddingMode, WindowGeometry, WindowParams,
};

// ============================================================================
// Shared types
// ============================================================================
pub use linbuf_view::{ErrorKind, LinbufError, Result};
