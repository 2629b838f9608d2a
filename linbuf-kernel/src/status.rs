//! Kernel status codes and their mapping onto [`LinbufError`].

use linbuf_view::{ErrorKind, LinbufError};

/// Result type of every [`KernelLibrary`](crate::KernelLibrary) method.
pub type KernelResult<T> = std::result::Result<T, KernelStatus>;

/// Code the kernel library returns on success.
pub const STATUS_SUCCESS: i32 = 0;

/// Closed set of failure codes a kernel can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum KernelStatus {
    #[error("memory allocation failure")]
    MemAllocFailure,
    #[error("permutation or index out of range")]
    PermOutOfRange,
    #[error("duplicate axis")]
    DupAxis,
    #[error("unsupported data type")]
    UnsupportedDataType,
    #[error("unmatched images buffer size")]
    UnmatchImageBufferSize,
    #[error("unmatched cols buffer size")]
    UnmatchColsBufferSize,
    #[error("invalid shape or parameters")]
    InvalidShapeOrParam,
    #[error("images data out of range")]
    ImagesOutOfRange,
    #[error("cols data out of range")]
    ColsOutOfRange,
    #[error("unknown kernel status {0}")]
    Unknown(i32),
}

impl KernelStatus {
    pub fn code(self) -> i32 {
        match self {
            KernelStatus::MemAllocFailure => -101,
            KernelStatus::PermOutOfRange => -102,
            KernelStatus::DupAxis => -103,
            KernelStatus::UnsupportedDataType => -104,
            KernelStatus::UnmatchImageBufferSize => -105,
            KernelStatus::UnmatchColsBufferSize => -106,
            KernelStatus::InvalidShapeOrParam => -107,
            KernelStatus::ImagesOutOfRange => -108,
            KernelStatus::ColsOutOfRange => -109,
            KernelStatus::Unknown(code) => code,
        }
    }

    /// Status for a raw code; `None` for [`STATUS_SUCCESS`].
    pub fn from_code(code: i32) -> Option<Self> {
        let status = match code {
            STATUS_SUCCESS => return None,
            -101 => KernelStatus::MemAllocFailure,
            -102 => KernelStatus::PermOutOfRange,
            -103 => KernelStatus::DupAxis,
            -104 => KernelStatus::UnsupportedDataType,
            -105 => KernelStatus::UnmatchImageBufferSize,
            -106 => KernelStatus::UnmatchColsBufferSize,
            -107 => KernelStatus::InvalidShapeOrParam,
            -108 => KernelStatus::ImagesOutOfRange,
            -109 => KernelStatus::ColsOutOfRange,
            other => KernelStatus::Unknown(other),
        };
        Some(status)
    }

    /// Turn a raw return code into a [`KernelResult`].
    pub fn check(code: i32) -> KernelResult<()> {
        match Self::from_code(code) {
            None => Ok(()),
            Some(status) => Err(status),
        }
    }

    /// Error kind for index families (gather, scatter, onehot, ...), where
    /// `PermOutOfRange` means an index value exceeded its class count.
    pub fn kind(self) -> ErrorKind {
        match self {
            KernelStatus::MemAllocFailure => ErrorKind::KernelAllocationFailure,
            KernelStatus::PermOutOfRange => ErrorKind::LabelOutOfBounds,
            KernelStatus::DupAxis => ErrorKind::DuplicateAxis,
            KernelStatus::UnsupportedDataType => ErrorKind::UnsupportedElementType,
            KernelStatus::UnmatchImageBufferSize => ErrorKind::ImageBufferSizeMismatch,
            KernelStatus::UnmatchColsBufferSize => ErrorKind::ColumnBufferSizeMismatch,
            KernelStatus::InvalidShapeOrParam => ErrorKind::InvalidShapeParameter,
            KernelStatus::ImagesOutOfRange => ErrorKind::ImagesOutOfRange,
            KernelStatus::ColsOutOfRange => ErrorKind::ColsOutOfRange,
            KernelStatus::Unknown(_) => ErrorKind::UnknownKernelStatus,
        }
    }

    /// Error kind for transpose, where `PermOutOfRange` is an axis error.
    pub fn permutation_kind(self) -> ErrorKind {
        match self {
            KernelStatus::PermOutOfRange => ErrorKind::AxisOutOfRange,
            other => other.kind(),
        }
    }

    /// Surface this status as an error of operation `op`.
    pub fn into_error(self, op: &'static str) -> LinbufError {
        LinbufError::Kernel {
            op,
            kind: self.kind(),
            code: self.code(),
        }
    }

    /// Like [`into_error`](Self::into_error), with transpose semantics.
    pub fn into_permutation_error(self, op: &'static str) -> LinbufError {
        LinbufError::Kernel {
            op,
            kind: self.permutation_kind(),
            code: self.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linbuf_view::ErrorTier;

    #[test]
    fn test_code_round_trip() {
        for code in -109..=-101 {
            let status = KernelStatus::from_code(code).unwrap();
            assert_eq!(status.code(), code);
            assert!(!matches!(status, KernelStatus::Unknown(_)));
        }
        assert_eq!(KernelStatus::from_code(0), None);
        assert_eq!(KernelStatus::from_code(-1), Some(KernelStatus::Unknown(-1)));
        assert_eq!(KernelStatus::check(-104), Err(KernelStatus::UnsupportedDataType));
        assert_eq!(KernelStatus::check(STATUS_SUCCESS), Ok(()));
    }

    #[test]
    fn test_perm_out_of_range_depends_on_family() {
        let status = KernelStatus::PermOutOfRange;
        assert_eq!(status.into_error("gather").kind(), ErrorKind::LabelOutOfBounds);
        assert_eq!(
            status.into_permutation_error("transpose").kind(),
            ErrorKind::AxisOutOfRange
        );
    }

    #[test]
    fn test_errors_are_kernel_tier() {
        let err = KernelStatus::Unknown(-7).into_error("sum");
        assert_eq!(err.kind(), ErrorKind::UnknownKernelStatus);
        assert_eq!(err.tier(), ErrorTier::Kernel);
        assert_eq!(
            KernelStatus::ColsOutOfRange.into_error("im2col2d").kind(),
            ErrorKind::ColsOutOfRange
        );
    }
}
