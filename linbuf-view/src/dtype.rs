//! Element type tags.

use std::fmt;

/// Closed set of element types a [`FlatBuffer`](crate::FlatBuffer) can hold.
///
/// The integer code of each tag is the one the kernel library uses on its side
/// of the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementTypeTag {
    Bool,
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float16,
    Float32,
    Float64,
    Complex64,
    Complex128,
}

impl ElementTypeTag {
    /// Every tag, in code order.
    pub const ALL: [ElementTypeTag; 14] = [
        ElementTypeTag::Bool,
        ElementTypeTag::Int8,
        ElementTypeTag::Int16,
        ElementTypeTag::Int32,
        ElementTypeTag::Int64,
        ElementTypeTag::Uint8,
        ElementTypeTag::Uint16,
        ElementTypeTag::Uint32,
        ElementTypeTag::Uint64,
        ElementTypeTag::Float16,
        ElementTypeTag::Float32,
        ElementTypeTag::Float64,
        ElementTypeTag::Complex64,
        ElementTypeTag::Complex128,
    ];

    /// Kernel-boundary code.
    pub fn code(self) -> i32 {
        match self {
            ElementTypeTag::Bool => 1,
            ElementTypeTag::Int8 => 2,
            ElementTypeTag::Int16 => 3,
            ElementTypeTag::Int32 => 4,
            ElementTypeTag::Int64 => 5,
            ElementTypeTag::Uint8 => 6,
            ElementTypeTag::Uint16 => 7,
            ElementTypeTag::Uint32 => 8,
            ElementTypeTag::Uint64 => 9,
            ElementTypeTag::Float16 => 11,
            ElementTypeTag::Float32 => 12,
            ElementTypeTag::Float64 => 13,
            ElementTypeTag::Complex64 => 16,
            ElementTypeTag::Complex128 => 17,
        }
    }

    /// Inverse of [`code`](Self::code).
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|tag| tag.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementTypeTag::Bool => "bool",
            ElementTypeTag::Int8 => "int8",
            ElementTypeTag::Uint8 => "uint8",
            ElementTypeTag::Int16 => "int16",
            ElementTypeTag::Uint16 => "uint16",
            ElementTypeTag::Int32 => "int32",
            ElementTypeTag::Uint32 => "uint32",
            ElementTypeTag::Int64 => "int64",
            ElementTypeTag::Uint64 => "uint64",
            ElementTypeTag::Float16 => "float16",
            ElementTypeTag::Float32 => "float32",
            ElementTypeTag::Float64 => "float64",
            ElementTypeTag::Complex64 => "complex64",
            ElementTypeTag::Complex128 => "complex128",
        }
    }

    /// Size of one element in bytes.
    pub fn size_in_bytes(self) -> usize {
        match self {
            ElementTypeTag::Bool | ElementTypeTag::Int8 | ElementTypeTag::Uint8 => 1,
            ElementTypeTag::Int16 | ElementTypeTag::Uint16 | ElementTypeTag::Float16 => 2,
            ElementTypeTag::Int32 | ElementTypeTag::Uint32 | ElementTypeTag::Float32 => 4,
            ElementTypeTag::Int64
            | ElementTypeTag::Uint64
            | ElementTypeTag::Float64
            | ElementTypeTag::Complex64 => 8,
            ElementTypeTag::Complex128 => 16,
        }
    }

    pub fn is_bool(self) -> bool {
        self == ElementTypeTag::Bool
    }

    /// Signed or unsigned integer. `Bool` is not an integer.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ElementTypeTag::Int8
                | ElementTypeTag::Uint8
                | ElementTypeTag::Int16
                | ElementTypeTag::Uint16
                | ElementTypeTag::Int32
                | ElementTypeTag::Uint32
                | ElementTypeTag::Int64
                | ElementTypeTag::Uint64
        )
    }

    /// The two float types the numeric kernels implement (`float32`, `float64`).
    pub fn is_float(self) -> bool {
        matches!(self, ElementTypeTag::Float32 | ElementTypeTag::Float64)
    }

    pub fn is_complex(self) -> bool {
        matches!(self, ElementTypeTag::Complex64 | ElementTypeTag::Complex128)
    }

    /// Tags accepted by the generic copy families (gather, slice, transpose, ...).
    pub fn is_copyable(self) -> bool {
        self.is_bool() || self.is_integer() || self.is_float()
    }
}

impl fmt::Display for ElementTypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for tag in ElementTypeTag::ALL {
            assert_eq!(ElementTypeTag::from_code(tag.code()), Some(tag));
        }
        assert_eq!(ElementTypeTag::from_code(10), None);
        assert_eq!(ElementTypeTag::Float32.code(), 12);
        assert_eq!(ElementTypeTag::Uint8.code(), 6);
    }

    #[test]
    fn test_classification() {
        assert!(!ElementTypeTag::Bool.is_integer());
        assert!(ElementTypeTag::Uint64.is_integer());
        assert!(!ElementTypeTag::Float16.is_float());
        assert!(!ElementTypeTag::Complex64.is_copyable());
        assert!(ElementTypeTag::Bool.is_copyable());
        assert_eq!(ElementTypeTag::Complex128.size_in_bytes(), 16);
    }
}
