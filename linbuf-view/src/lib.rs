//! Element type tags, flat buffers and bounds-validated buffer views.
//!
//! Every kernel call in linbuf reads and writes flat, homogeneously typed
//! buffers through `(offset, stride)` or `(offset, leading dimension)` pairs.
//! This crate owns the pieces that make those pairs safe to hand to a kernel:
//!
//! - [`ElementTypeTag`]: closed set of element types and their kernel codes
//! - [`FlatBuffer`] / [`LinearBuffer`] / [`Element`]: type-tagged linear storage
//! - [`VectorView`] / [`VectorViewMut`]: validated `{length, offset, stride}` views
//! - [`MatrixView`] / [`MatrixViewMut`]: validated row-major `{rows, cols, offset, ld}` views
//! - [`Shape`]: positive-dimension shape with `size()`
//! - [`LinbufError`] / [`ErrorKind`]: the error taxonomy shared by all linbuf crates
//!
//! # Example
//!
//! ```rust
//! use linbuf_view::{validate_vector, ErrorKind, FlatBuffer};
//!
//! let x = FlatBuffer::from(vec![100.0f32, -10.0, -1000.0]);
//! assert!(validate_vector("X", &x, 3, 0, 1).is_ok());
//!
//! let err = validate_vector("X", &x, 3, 1, 1).unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::BufferTooSmall);
//! ```

pub mod buffer;
pub mod dtype;
pub mod shape;
pub mod view;

// ============================================================================
// Buffers and element types
// ============================================================================
pub use buffer::{Element, FlatBuffer, LinearBuffer};
pub use dtype::ElementTypeTag;

// ============================================================================
// Shapes and views
// ============================================================================
pub use shape::{product, Shape};
pub use view::{
    ensure_same_type, validate_matrix, validate_region, validate_shape_parameter, validate_vector,
    MatrixView, MatrixViewMut, VectorView, VectorViewMut,
};

// ============================================================================
// Error types
// ============================================================================

/// Errors raised while validating or dispatching flat-buffer operations.
///
/// Structural variants are raised by the validators and planners before any
/// kernel call. [`LinbufError::Kernel`] carries a status the kernel library
/// reported after the call was dispatched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinbufError {
    /// A dimension or count argument was below 1.
    #[error("argument {name} must be greater than 0, got {value}")]
    InvalidShapeParameter { name: &'static str, value: isize },

    /// A view offset was negative.
    #[error("offset of {name} must be greater than or equal to 0, got {offset}")]
    InvalidOffset { name: &'static str, offset: isize },

    /// A view stride or leading dimension was below 1.
    #[error("stride of {name} must be greater than 0, got {stride}")]
    InvalidStride { name: &'static str, stride: isize },

    /// The highest addressed element lies outside the buffer.
    #[error("buffer {name} is too small: needs {required} elements, holds {len}")]
    BufferTooSmall {
        name: &'static str,
        required: usize,
        len: usize,
    },

    /// Two buffers that must share an element type do not.
    #[error("unmatched data type for {context}: {left} vs {right}")]
    TypeMismatch {
        context: &'static str,
        left: ElementTypeTag,
        right: ElementTypeTag,
    },

    /// The operation does not support this element type.
    #[error("unsupported data type {dtype} for {op}")]
    UnsupportedElementType {
        op: &'static str,
        dtype: ElementTypeTag,
    },

    /// Vector and matrix shapes do not match on their trailing dimensions.
    #[error("unmatched shape of matrix and vector: vector {vector:?}, matrix {matrix:?}")]
    BroadcastMismatch {
        vector: Vec<usize>,
        matrix: Vec<usize>,
    },

    /// Axis (or permutation entry) outside `[-ndim, ndim)`.
    #[error("axis {axis} is out of range for rank {ndim}")]
    AxisOutOfRange { axis: isize, ndim: usize },

    /// Permutation length differs from the source rank.
    #[error("permutation has {perm} entries but the shape has rank {ndim}")]
    PermSizeMismatch { perm: usize, ndim: usize },

    /// A permutation names the same axis twice.
    #[error("duplicate axis {axis} in permutation")]
    DuplicateAxis { axis: usize },

    /// Slice start outside `[-dim, dim)`.
    #[error("start {start} of axis {axis} is out of range for dimension {dim}")]
    InvalidSliceStart { axis: usize, start: isize, dim: usize },

    /// Slice size that resolves to an empty or overflowing window.
    #[error("size {size} of axis {axis} is out of range for dimension {dim}")]
    InvalidSliceSize { axis: usize, size: isize, dim: usize },

    /// Declared column buffer size disagrees with the window geometry.
    #[error("unmatched cols buffer size: expected {expected}, got {actual}")]
    ColumnBufferSizeMismatch { expected: usize, actual: usize },

    /// Declared image buffer size disagrees with the window geometry.
    #[error("unmatched images buffer size: expected {expected}, got {actual}")]
    ImageBufferSizeMismatch { expected: usize, actual: usize },

    /// A caller-supplied output shape disagrees with the planned one.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Status surfaced by the kernel library after dispatch.
    #[error("{op}: {kind} (kernel status {code})")]
    Kernel {
        op: &'static str,
        kind: ErrorKind,
        code: i32,
    },
}

/// Fieldless discriminant of [`LinbufError`], for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidShapeParameter,
    InvalidOffset,
    InvalidStride,
    BufferTooSmall,
    TypeMismatch,
    UnsupportedElementType,
    BroadcastMismatch,
    AxisOutOfRange,
    PermSizeMismatch,
    DuplicateAxis,
    InvalidSliceStart,
    InvalidSliceSize,
    ColumnBufferSizeMismatch,
    ImageBufferSizeMismatch,
    ShapeMismatch,
    LabelOutOfBounds,
    KernelAllocationFailure,
    UnknownKernelStatus,
    ImagesOutOfRange,
    ColsOutOfRange,
}

impl ErrorKind {
    fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidShapeParameter => "invalid shape or parameter",
            ErrorKind::InvalidOffset => "invalid offset",
            ErrorKind::InvalidStride => "invalid stride",
            ErrorKind::BufferTooSmall => "buffer too small",
            ErrorKind::TypeMismatch => "unmatched data type",
            ErrorKind::UnsupportedElementType => "unsupported data type",
            ErrorKind::BroadcastMismatch => "unmatched broadcast shape",
            ErrorKind::AxisOutOfRange => "axis out of range",
            ErrorKind::PermSizeMismatch => "permutation size mismatch",
            ErrorKind::DuplicateAxis => "duplicate axis",
            ErrorKind::InvalidSliceStart => "invalid slice start",
            ErrorKind::InvalidSliceSize => "invalid slice size",
            ErrorKind::ColumnBufferSizeMismatch => "unmatched cols buffer size",
            ErrorKind::ImageBufferSizeMismatch => "unmatched images buffer size",
            ErrorKind::ShapeMismatch => "shape mismatch",
            ErrorKind::LabelOutOfBounds => "label number is out of bounds",
            ErrorKind::KernelAllocationFailure => "memory allocation failure",
            ErrorKind::UnknownKernelStatus => "unknown error",
            ErrorKind::ImagesOutOfRange => "images data out of range",
            ErrorKind::ColsOutOfRange => "cols data out of range",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the kernel boundary raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorTier {
    /// Raised locally, before the kernel was called.
    Structural,
    /// Reported by the kernel library.
    Kernel,
}

impl LinbufError {
    /// Fieldless kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LinbufError::InvalidShapeParameter { .. } => ErrorKind::InvalidShapeParameter,
            LinbufError::InvalidOffset { .. } => ErrorKind::InvalidOffset,
            LinbufError::InvalidStride { .. } => ErrorKind::InvalidStride,
            LinbufError::BufferTooSmall { .. } => ErrorKind::BufferTooSmall,
            LinbufError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            LinbufError::UnsupportedElementType { .. } => ErrorKind::UnsupportedElementType,
            LinbufError::BroadcastMismatch { .. } => ErrorKind::BroadcastMismatch,
            LinbufError::AxisOutOfRange { .. } => ErrorKind::AxisOutOfRange,
            LinbufError::PermSizeMismatch { .. } => ErrorKind::PermSizeMismatch,
            LinbufError::DuplicateAxis { .. } => ErrorKind::DuplicateAxis,
            LinbufError::InvalidSliceStart { .. } => ErrorKind::InvalidSliceStart,
            LinbufError::InvalidSliceSize { .. } => ErrorKind::InvalidSliceSize,
            LinbufError::ColumnBufferSizeMismatch { .. } => ErrorKind::ColumnBufferSizeMismatch,
            LinbufError::ImageBufferSizeMismatch { .. } => ErrorKind::ImageBufferSizeMismatch,
            LinbufError::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
            LinbufError::Kernel { kind, .. } => *kind,
        }
    }

    /// Whether the error was raised locally or reported by the kernel.
    pub fn tier(&self) -> ErrorTier {
        match self {
            LinbufError::Kernel { .. } => ErrorTier::Kernel,
            _ => ErrorTier::Structural,
        }
    }
}

/// Result type for linbuf operations.
pub type Result<T> = std::result::Result<T, LinbufError>;
