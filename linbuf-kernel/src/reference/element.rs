//! Element arithmetic shared by the reference kernels.

use half::f16;
use linbuf_view::{Element, MatrixView, MatrixViewMut, VectorView, VectorViewMut};

/// Arithmetic the copy, reduction and cast kernels need from an element.
///
/// Method names avoid `num_traits` names so that `T: KernelElement + Float`
/// bounds stay unambiguous.
pub(crate) trait KernelElement: Element + PartialEq + PartialOrd {
    const ZERO: Self;
    const ONE: Self;
    const IS_FLOAT: bool;

    /// `self + other`; wrapping for integers, logical or for `bool`.
    fn accumulate(self, other: Self) -> Self;
    fn as_f64(self) -> f64;
    fn of_f64(v: f64) -> Self;
    fn as_i64(self) -> i64;
    fn of_i64(v: i64) -> Self;
}

macro_rules! impl_int_element {
    ($($t:ty),*) => {$(
        impl KernelElement for $t {
            const ZERO: Self = 0;
            const ONE: Self = 1;
            const IS_FLOAT: bool = false;

            #[inline]
            fn accumulate(self, other: Self) -> Self {
                self.wrapping_add(other)
            }
            #[inline]
            fn as_f64(self) -> f64 {
                self as f64
            }
            #[inline]
            fn of_f64(v: f64) -> Self {
                v as $t
            }
            #[inline]
            fn as_i64(self) -> i64 {
                self as i64
            }
            #[inline]
            fn of_i64(v: i64) -> Self {
                v as $t
            }
        }
    )*};
}

impl_int_element!(i8, u8, i16, u16, i32, u32, i64, u64);

macro_rules! impl_float_element {
    ($($t:ty),*) => {$(
        impl KernelElement for $t {
            const ZERO: Self = 0.0;
            const ONE: Self = 1.0;
            const IS_FLOAT: bool = true;

            #[inline]
            fn accumulate(self, other: Self) -> Self {
                self + other
            }
            #[inline]
            fn as_f64(self) -> f64 {
                self as f64
            }
            #[inline]
            fn of_f64(v: f64) -> Self {
                v as $t
            }
            #[inline]
            fn as_i64(self) -> i64 {
                self as i64
            }
            #[inline]
            fn of_i64(v: i64) -> Self {
                v as $t
            }
        }
    )*};
}

impl_float_element!(f32, f64);

impl KernelElement for f16 {
    const ZERO: Self = f16::ZERO;
    const ONE: Self = f16::ONE;
    const IS_FLOAT: bool = true;

    fn accumulate(self, other: Self) -> Self {
        f16::from_f32(self.to_f32() + other.to_f32())
    }
    fn as_f64(self) -> f64 {
        self.to_f64()
    }
    fn of_f64(v: f64) -> Self {
        f16::from_f64(v)
    }
    fn as_i64(self) -> i64 {
        self.to_f64() as i64
    }
    fn of_i64(v: i64) -> Self {
        f16::from_f64(v as f64)
    }
}

impl KernelElement for bool {
    const ZERO: Self = false;
    const ONE: Self = true;
    const IS_FLOAT: bool = false;

    fn accumulate(self, other: Self) -> Self {
        self || other
    }
    fn as_f64(self) -> f64 {
        if self {
            1.0
        } else {
            0.0
        }
    }
    fn of_f64(v: f64) -> Self {
        v != 0.0
    }
    fn as_i64(self) -> i64 {
        self as i64
    }
    fn of_i64(v: i64) -> Self {
        v != 0
    }
}

/// Value conversion used by `astype`.
#[inline]
pub(crate) fn cast<S: KernelElement, D: KernelElement>(value: S) -> D {
    if S::IS_FLOAT || D::IS_FLOAT {
        D::of_f64(value.as_f64())
    } else {
        D::of_i64(value.as_i64())
    }
}

// ---------------------------------------------------------------------------
// Layouts
// ---------------------------------------------------------------------------

/// Copy of a vector view's addressing, detached from the buffer borrow.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Strided {
    pub offset: usize,
    pub stride: usize,
    pub len: usize,
}

impl Strided {
    pub fn of(v: &VectorView<'_>) -> Self {
        Self {
            offset: v.offset(),
            stride: v.stride(),
            len: v.len(),
        }
    }

    pub fn of_mut(v: &VectorViewMut<'_>) -> Self {
        Self {
            offset: v.offset(),
            stride: v.stride(),
            len: v.len(),
        }
    }

    #[inline]
    pub fn at(&self, i: usize) -> usize {
        self.offset + i * self.stride
    }
}

/// Copy of a matrix view's addressing.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Rows {
    pub offset: usize,
    pub ld: usize,
    pub rows: usize,
    pub cols: usize,
}

impl Rows {
    pub fn of(a: &MatrixView<'_>) -> Self {
        Self {
            offset: a.offset(),
            ld: a.leading_dim(),
            rows: a.rows(),
            cols: a.cols(),
        }
    }

    pub fn of_mut(a: &MatrixViewMut<'_>) -> Self {
        Self {
            offset: a.offset(),
            ld: a.leading_dim(),
            rows: a.rows(),
            cols: a.cols(),
        }
    }

    #[inline]
    pub fn at(&self, r: usize, c: usize) -> usize {
        self.offset + r * self.ld + c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_paths() {
        assert_eq!(cast::<f32, i32>(-2.7), -2);
        assert_eq!(cast::<i32, u8>(300), 44);
        assert!(cast::<i64, bool>(5));
        assert_eq!(cast::<bool, f64>(true), 1.0);
        assert_eq!(cast::<u64, u64>(u64::MAX), u64::MAX);
        assert_eq!(cast::<f64, f16>(0.5), f16::from_f32(0.5));
    }

    #[test]
    fn test_accumulate() {
        assert_eq!(i8::MAX.accumulate(1), i8::MIN);
        assert!(false.accumulate(true));
        assert_eq!(1.5f32.accumulate(2.0), 3.5);
    }
}
