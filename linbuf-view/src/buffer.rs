//! Type-tagged flat buffers.

use half::f16;
use num_complex::{Complex32, Complex64};

use crate::dtype::ElementTypeTag;

/// What the validators need to know about a backing buffer.
pub trait LinearBuffer {
    /// Number of elements (not bytes).
    fn element_count(&self) -> usize;
    fn type_tag(&self) -> ElementTypeTag;
}

/// A homogeneously typed, fixed-length linear store.
///
/// `C64` holds `complex64` (two `f32`), `C128` holds `complex128`.
#[derive(Debug, Clone, PartialEq)]
pub enum FlatBuffer {
    Bool(Vec<bool>),
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F16(Vec<f16>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    C64(Vec<Complex32>),
    C128(Vec<Complex64>),
}

macro_rules! each_variant {
    ($buf:expr, $data:ident => $body:expr) => {
        match $buf {
            FlatBuffer::Bool($data) => $body,
            FlatBuffer::I8($data) => $body,
            FlatBuffer::U8($data) => $body,
            FlatBuffer::I16($data) => $body,
            FlatBuffer::U16($data) => $body,
            FlatBuffer::I32($data) => $body,
            FlatBuffer::U32($data) => $body,
            FlatBuffer::I64($data) => $body,
            FlatBuffer::U64($data) => $body,
            FlatBuffer::F16($data) => $body,
            FlatBuffer::F32($data) => $body,
            FlatBuffer::F64($data) => $body,
            FlatBuffer::C64($data) => $body,
            FlatBuffer::C128($data) => $body,
        }
    };
}

impl FlatBuffer {
    /// Zero-filled buffer of `len` elements.
    pub fn zeros(dtype: ElementTypeTag, len: usize) -> Self {
        match dtype {
            ElementTypeTag::Bool => FlatBuffer::Bool(vec![false; len]),
            ElementTypeTag::Int8 => FlatBuffer::I8(vec![0; len]),
            ElementTypeTag::Uint8 => FlatBuffer::U8(vec![0; len]),
            ElementTypeTag::Int16 => FlatBuffer::I16(vec![0; len]),
            ElementTypeTag::Uint16 => FlatBuffer::U16(vec![0; len]),
            ElementTypeTag::Int32 => FlatBuffer::I32(vec![0; len]),
            ElementTypeTag::Uint32 => FlatBuffer::U32(vec![0; len]),
            ElementTypeTag::Int64 => FlatBuffer::I64(vec![0; len]),
            ElementTypeTag::Uint64 => FlatBuffer::U64(vec![0; len]),
            ElementTypeTag::Float16 => FlatBuffer::F16(vec![f16::ZERO; len]),
            ElementTypeTag::Float32 => FlatBuffer::F32(vec![0.0; len]),
            ElementTypeTag::Float64 => FlatBuffer::F64(vec![0.0; len]),
            ElementTypeTag::Complex64 => FlatBuffer::C64(vec![Complex32::new(0.0, 0.0); len]),
            ElementTypeTag::Complex128 => FlatBuffer::C128(vec![Complex64::new(0.0, 0.0); len]),
        }
    }

    pub fn len(&self) -> usize {
        each_variant!(self, data => data.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> ElementTypeTag {
        match self {
            FlatBuffer::Bool(_) => ElementTypeTag::Bool,
            FlatBuffer::I8(_) => ElementTypeTag::Int8,
            FlatBuffer::U8(_) => ElementTypeTag::Uint8,
            FlatBuffer::I16(_) => ElementTypeTag::Int16,
            FlatBuffer::U16(_) => ElementTypeTag::Uint16,
            FlatBuffer::I32(_) => ElementTypeTag::Int32,
            FlatBuffer::U32(_) => ElementTypeTag::Uint32,
            FlatBuffer::I64(_) => ElementTypeTag::Int64,
            FlatBuffer::U64(_) => ElementTypeTag::Uint64,
            FlatBuffer::F16(_) => ElementTypeTag::Float16,
            FlatBuffer::F32(_) => ElementTypeTag::Float32,
            FlatBuffer::F64(_) => ElementTypeTag::Float64,
            FlatBuffer::C64(_) => ElementTypeTag::Complex64,
            FlatBuffer::C128(_) => ElementTypeTag::Complex128,
        }
    }

    /// Typed view of the whole buffer, `None` when `T` is not the stored type.
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::slice(self)
    }

    pub fn as_mut_slice<T: Element>(&mut self) -> Option<&mut [T]> {
        T::slice_mut(self)
    }
}

impl LinearBuffer for FlatBuffer {
    fn element_count(&self) -> usize {
        self.len()
    }

    fn type_tag(&self) -> ElementTypeTag {
        self.dtype()
    }
}

/// Rust types that can live in a [`FlatBuffer`].
pub trait Element: Copy + Send + Sync + 'static {
    const TYPE_TAG: ElementTypeTag;

    fn slice(buffer: &FlatBuffer) -> Option<&[Self]>;
    fn slice_mut(buffer: &mut FlatBuffer) -> Option<&mut [Self]>;
    fn into_buffer(data: Vec<Self>) -> FlatBuffer;
}

macro_rules! impl_element {
    ($t:ty, $variant:ident, $tag:ident) => {
        impl Element for $t {
            const TYPE_TAG: ElementTypeTag = ElementTypeTag::$tag;

            fn slice(buffer: &FlatBuffer) -> Option<&[Self]> {
                match buffer {
                    FlatBuffer::$variant(data) => Some(data.as_slice()),
                    _ => None,
                }
            }

            fn slice_mut(buffer: &mut FlatBuffer) -> Option<&mut [Self]> {
                match buffer {
                    FlatBuffer::$variant(data) => Some(data.as_mut_slice()),
                    _ => None,
                }
            }

            fn into_buffer(data: Vec<Self>) -> FlatBuffer {
                FlatBuffer::$variant(data)
            }
        }

        impl From<Vec<$t>> for FlatBuffer {
            fn from(data: Vec<$t>) -> Self {
                FlatBuffer::$variant(data)
            }
        }
    };
}

impl_element!(bool, Bool, Bool);
impl_element!(i8, I8, Int8);
impl_element!(u8, U8, Uint8);
impl_element!(i16, I16, Int16);
impl_element!(u16, U16, Uint16);
impl_element!(i32, I32, Int32);
impl_element!(u32, U32, Uint32);
impl_element!(i64, I64, Int64);
impl_element!(u64, U64, Uint64);
impl_element!(f16, F16, Float16);
impl_element!(f32, F32, Float32);
impl_element!(f64, F64, Float64);
impl_element!(Complex32, C64, Complex64);
impl_element!(Complex64, C128, Complex128);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros_dtype_and_len() {
        for tag in ElementTypeTag::ALL {
            let buf = FlatBuffer::zeros(tag, 5);
            assert_eq!(buf.dtype(), tag);
            assert_eq!(buf.element_count(), 5);
        }
    }

    #[test]
    fn test_typed_slices() {
        let mut buf = FlatBuffer::from(vec![1.0f32, 2.0, 3.0]);
        assert_eq!(buf.as_slice::<f32>(), Some(&[1.0f32, 2.0, 3.0][..]));
        assert!(buf.as_slice::<f64>().is_none());
        if let Some(data) = buf.as_mut_slice::<f32>() {
            data[1] = 7.0;
        }
        assert_eq!(buf, FlatBuffer::F32(vec![1.0, 7.0, 3.0]));
    }

    #[test]
    fn test_complex_tags() {
        let buf = <Complex32 as Element>::into_buffer(vec![Complex32::new(1.0, 2.0)]);
        assert_eq!(buf.type_tag(), ElementTypeTag::Complex64);
        let buf = FlatBuffer::from(vec![Complex64::new(1.0, 2.0)]);
        assert_eq!(buf.type_tag(), ElementTypeTag::Complex128);
    }
}
