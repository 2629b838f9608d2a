//! Bounds-validated vector and matrix views over flat buffers.
//!
//! A view is only ever constructed through the validators below, so every
//! view that reaches a kernel addresses elements strictly inside its buffer.

use crate::buffer::{Element, FlatBuffer, LinearBuffer};
use crate::dtype::ElementTypeTag;
use crate::{LinbufError, Result};

// ============================================================================
// Validation helpers
// ============================================================================

/// Require `value >= 1` and return it as `usize`.
pub fn validate_shape_parameter(name: &'static str, value: isize) -> Result<usize> {
    if value < 1 {
        return Err(LinbufError::InvalidShapeParameter { name, value });
    }
    Ok(value as usize)
}

fn validate_offset(name: &'static str, offset: isize) -> Result<usize> {
    if offset < 0 {
        return Err(LinbufError::InvalidOffset { name, offset });
    }
    Ok(offset as usize)
}

fn validate_stride(name: &'static str, stride: isize) -> Result<usize> {
    if stride < 1 {
        return Err(LinbufError::InvalidStride { name, stride });
    }
    Ok(stride as usize)
}

/// Fail unless `last < len`. An overflowed `last` (`None`) is also too small.
fn check_last_index(name: &'static str, last: Option<usize>, len: usize) -> Result<()> {
    match last {
        Some(last) if last < len => Ok(()),
        Some(last) => Err(LinbufError::BufferTooSmall {
            name,
            required: last.saturating_add(1),
            len,
        }),
        None => Err(LinbufError::BufferTooSmall {
            name,
            required: usize::MAX,
            len,
        }),
    }
}

/// Validate a `{length, offset, stride}` view.
///
/// Rules, first failure wins: `length >= 1`, `offset >= 0`, `stride >= 1`,
/// `offset + (length-1)*stride < element_count`.
pub fn validate_vector<B: LinearBuffer + ?Sized>(
    name: &'static str,
    buffer: &B,
    length: isize,
    offset: isize,
    stride: isize,
) -> Result<()> {
    vector_extent(name, buffer, length, offset, stride).map(|_| ())
}

fn vector_extent<B: LinearBuffer + ?Sized>(
    name: &'static str,
    buffer: &B,
    length: isize,
    offset: isize,
    stride: isize,
) -> Result<(usize, usize, usize)> {
    let length = validate_shape_parameter("n", length)?;
    let offset = validate_offset(name, offset)?;
    let stride = validate_stride(name, stride)?;
    let last = (length - 1)
        .checked_mul(stride)
        .and_then(|span| span.checked_add(offset));
    check_last_index(name, last, buffer.element_count())?;
    Ok((length, offset, stride))
}

/// Validate a row-major `{rows, cols, offset, leading_dim}` view.
///
/// The highest addressed element is `offset + (rows-1)*leading_dim + (cols-1)`.
pub fn validate_matrix<B: LinearBuffer + ?Sized>(
    name: &'static str,
    buffer: &B,
    rows: isize,
    cols: isize,
    offset: isize,
    leading_dim: isize,
) -> Result<()> {
    matrix_extent(name, buffer, rows, cols, offset, leading_dim).map(|_| ())
}

fn matrix_extent<B: LinearBuffer + ?Sized>(
    name: &'static str,
    buffer: &B,
    rows: isize,
    cols: isize,
    offset: isize,
    leading_dim: isize,
) -> Result<(usize, usize, usize, usize)> {
    let rows = validate_shape_parameter("m", rows)?;
    let cols = validate_shape_parameter("n", cols)?;
    let offset = validate_offset(name, offset)?;
    let ld = validate_stride(name, leading_dim)?;
    let last = (rows - 1)
        .checked_mul(ld)
        .and_then(|span| span.checked_add(cols - 1))
        .and_then(|span| span.checked_add(offset));
    check_last_index(name, last, buffer.element_count())?;
    Ok((rows, cols, offset, ld))
}

/// Validate a contiguous `(offset, size)` region.
pub fn validate_region<B: LinearBuffer + ?Sized>(
    name: &'static str,
    buffer: &B,
    offset: isize,
    size: isize,
) -> Result<()> {
    let size = validate_shape_parameter("size", size)?;
    let offset = validate_offset(name, offset)?;
    let end = offset.checked_add(size);
    let len = buffer.element_count();
    match end {
        Some(end) if end <= len => Ok(()),
        _ => Err(LinbufError::BufferTooSmall {
            name,
            required: end.unwrap_or(usize::MAX),
            len,
        }),
    }
}

/// `TypeMismatch` unless both tags are equal.
pub fn ensure_same_type(
    context: &'static str,
    left: ElementTypeTag,
    right: ElementTypeTag,
) -> Result<()> {
    if left != right {
        return Err(LinbufError::TypeMismatch {
            context,
            left,
            right,
        });
    }
    Ok(())
}

// ============================================================================
// VectorView
// ============================================================================

/// Shared `{length, offset, stride}` view; element `i` lives at `offset + i*stride`.
#[derive(Clone, Copy)]
pub struct VectorView<'a> {
    buffer: &'a FlatBuffer,
    len: usize,
    offset: usize,
    stride: usize,
}

impl std::fmt::Debug for VectorView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorView")
            .field("dtype", &self.buffer.dtype())
            .field("len", &self.len)
            .field("offset", &self.offset)
            .field("stride", &self.stride)
            .finish()
    }
}

impl<'a> VectorView<'a> {
    /// Validate and create a view.
    pub fn new(
        name: &'static str,
        buffer: &'a FlatBuffer,
        len: isize,
        offset: isize,
        stride: isize,
    ) -> Result<Self> {
        let (len, offset, stride) = vector_extent(name, buffer, len, offset, stride)?;
        Ok(Self {
            buffer,
            len,
            offset,
            stride,
        })
    }

    /// Unit-stride view.
    pub fn contiguous(
        name: &'static str,
        buffer: &'a FlatBuffer,
        len: isize,
        offset: isize,
    ) -> Result<Self> {
        Self::new(name, buffer, len, offset, 1)
    }

    pub fn buffer(&self) -> &'a FlatBuffer {
        self.buffer
    }

    pub fn dtype(&self) -> ElementTypeTag {
        self.buffer.dtype()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Always `false`: a validated view has at least one element.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Buffer position of logical element `i`.
    #[inline]
    pub fn index(&self, i: usize) -> usize {
        self.offset + i * self.stride
    }

    /// Typed access to the whole backing buffer.
    pub fn data<T: Element>(&self) -> Option<&'a [T]> {
        self.buffer.as_slice::<T>()
    }

    /// Copy the logical elements out.
    pub fn to_vec<T: Element>(&self) -> Option<Vec<T>> {
        let data = self.data::<T>()?;
        Some((0..self.len).map(|i| data[self.index(i)]).collect())
    }
}

// ============================================================================
// VectorViewMut
// ============================================================================

/// Exclusive `{length, offset, stride}` view.
pub struct VectorViewMut<'a> {
    buffer: &'a mut FlatBuffer,
    len: usize,
    offset: usize,
    stride: usize,
}

impl std::fmt::Debug for VectorViewMut<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorViewMut")
            .field("dtype", &self.buffer.dtype())
            .field("len", &self.len)
            .field("offset", &self.offset)
            .field("stride", &self.stride)
            .finish()
    }
}

impl<'a> VectorViewMut<'a> {
    pub fn new(
        name: &'static str,
        buffer: &'a mut FlatBuffer,
        len: isize,
        offset: isize,
        stride: isize,
    ) -> Result<Self> {
        let (len, offset, stride) = vector_extent(name, &*buffer, len, offset, stride)?;
        Ok(Self {
            buffer,
            len,
            offset,
            stride,
        })
    }

    pub fn contiguous(
        name: &'static str,
        buffer: &'a mut FlatBuffer,
        len: isize,
        offset: isize,
    ) -> Result<Self> {
        Self::new(name, buffer, len, offset, 1)
    }

    pub fn dtype(&self) -> ElementTypeTag {
        self.buffer.dtype()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn index(&self, i: usize) -> usize {
        self.offset + i * self.stride
    }

    pub fn buffer(&self) -> &FlatBuffer {
        &*self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut FlatBuffer {
        &mut *self.buffer
    }

    pub fn data_mut<T: Element>(&mut self) -> Option<&mut [T]> {
        self.buffer.as_mut_slice::<T>()
    }

    /// Reborrow as a shared view.
    pub fn as_view(&self) -> VectorView<'_> {
        VectorView {
            buffer: &*self.buffer,
            len: self.len,
            offset: self.offset,
            stride: self.stride,
        }
    }
}

// ============================================================================
// MatrixView
// ============================================================================

/// Shared row-major `{rows, cols, offset, leading_dim}` view.
///
/// Element `(r, c)` lives at `offset + r*leading_dim + c`.
#[derive(Clone, Copy)]
pub struct MatrixView<'a> {
    buffer: &'a FlatBuffer,
    rows: usize,
    cols: usize,
    offset: usize,
    ld: usize,
}

impl std::fmt::Debug for MatrixView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatrixView")
            .field("dtype", &self.buffer.dtype())
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("offset", &self.offset)
            .field("ld", &self.ld)
            .finish()
    }
}

impl<'a> MatrixView<'a> {
    pub fn new(
        name: &'static str,
        buffer: &'a FlatBuffer,
        rows: isize,
        cols: isize,
        offset: isize,
        leading_dim: isize,
    ) -> Result<Self> {
        let (rows, cols, offset, ld) = matrix_extent(name, buffer, rows, cols, offset, leading_dim)?;
        Ok(Self {
            buffer,
            rows,
            cols,
            offset,
            ld,
        })
    }

    /// Every row reads the same `cols` elements (`leading_dim = 0`).
    pub fn new_row_broadcast(
        name: &'static str,
        buffer: &'a FlatBuffer,
        rows: isize,
        cols: isize,
        offset: isize,
    ) -> Result<Self> {
        let rows = validate_shape_parameter("m", rows)?;
        let (cols, offset, _) = vector_extent(name, buffer, cols, offset, 1)?;
        Ok(Self {
            buffer,
            rows,
            cols,
            offset,
            ld: 0,
        })
    }

    pub fn buffer(&self) -> &'a FlatBuffer {
        self.buffer
    }

    pub fn dtype(&self) -> ElementTypeTag {
        self.buffer.dtype()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn leading_dim(&self) -> usize {
        self.ld
    }

    #[inline]
    pub fn index(&self, r: usize, c: usize) -> usize {
        self.offset + r * self.ld + c
    }

    pub fn data<T: Element>(&self) -> Option<&'a [T]> {
        self.buffer.as_slice::<T>()
    }

    /// Row `r` as a typed slice.
    pub fn row<T: Element>(&self, r: usize) -> Option<&'a [T]> {
        let start = self.index(r, 0);
        self.data::<T>().map(|data| &data[start..start + self.cols])
    }
}

// ============================================================================
// MatrixViewMut
// ============================================================================

/// Exclusive row-major matrix view.
pub struct MatrixViewMut<'a> {
    buffer: &'a mut FlatBuffer,
    rows: usize,
    cols: usize,
    offset: usize,
    ld: usize,
}

impl std::fmt::Debug for MatrixViewMut<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatrixViewMut")
            .field("dtype", &self.buffer.dtype())
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("offset", &self.offset)
            .field("ld", &self.ld)
            .finish()
    }
}

impl<'a> MatrixViewMut<'a> {
    pub fn new(
        name: &'static str,
        buffer: &'a mut FlatBuffer,
        rows: isize,
        cols: isize,
        offset: isize,
        leading_dim: isize,
    ) -> Result<Self> {
        let (rows, cols, offset, ld) =
            matrix_extent(name, &*buffer, rows, cols, offset, leading_dim)?;
        Ok(Self {
            buffer,
            rows,
            cols,
            offset,
            ld,
        })
    }

    pub fn dtype(&self) -> ElementTypeTag {
        self.buffer.dtype()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn leading_dim(&self) -> usize {
        self.ld
    }

    #[inline]
    pub fn index(&self, r: usize, c: usize) -> usize {
        self.offset + r * self.ld + c
    }

    pub fn buffer(&self) -> &FlatBuffer {
        &*self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut FlatBuffer {
        &mut *self.buffer
    }

    pub fn data_mut<T: Element>(&mut self) -> Option<&mut [T]> {
        self.buffer.as_mut_slice::<T>()
    }

    pub fn as_view(&self) -> MatrixView<'_> {
        MatrixView {
            buffer: &*self.buffer,
            rows: self.rows,
            cols: self.cols,
            offset: self.offset,
            ld: self.ld,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn f32_buf(len: usize) -> FlatBuffer {
        FlatBuffer::from(vec![0.0f32; len])
    }

    #[test]
    fn test_vector_rules_in_order() {
        let buf = f32_buf(3);
        let kind = |r: Result<()>| r.unwrap_err().kind();
        assert_eq!(
            kind(validate_vector("X", &buf, 0, -1, 0)),
            ErrorKind::InvalidShapeParameter
        );
        assert_eq!(
            kind(validate_vector("X", &buf, 1, -1, 0)),
            ErrorKind::InvalidOffset
        );
        assert_eq!(
            kind(validate_vector("X", &buf, 1, 0, 0)),
            ErrorKind::InvalidStride
        );
        assert_eq!(
            kind(validate_vector("X", &buf, 2, 0, 3)),
            ErrorKind::BufferTooSmall
        );
        assert!(validate_vector("X", &buf, 2, 0, 2).is_ok());
        assert!(validate_vector("X", &buf, 1, 2, 100).is_ok());
    }

    #[test]
    fn test_vector_overflow_is_buffer_too_small() {
        let buf = f32_buf(3);
        let err = validate_vector("X", &buf, isize::MAX, 0, isize::MAX).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BufferTooSmall);
    }

    #[test]
    fn test_buffer_too_small_reports_requirement() {
        let buf = f32_buf(3);
        let err = validate_vector("X", &buf, 3, 1, 1).unwrap_err();
        assert_eq!(
            err,
            LinbufError::BufferTooSmall {
                name: "X",
                required: 4,
                len: 3
            }
        );
    }

    #[test]
    fn test_matrix_bounds() {
        let buf = f32_buf(12);
        assert!(validate_matrix("A", &buf, 3, 4, 0, 4).is_ok());
        // ld larger than cols: last element at 2*5+3 = 13
        assert_eq!(
            validate_matrix("A", &buf, 3, 4, 0, 5).unwrap_err().kind(),
            ErrorKind::BufferTooSmall
        );
        assert!(validate_matrix("A", &buf, 2, 4, 1, 5).is_ok());
        assert_eq!(
            validate_matrix("A", &buf, 2, 4, 0, 0).unwrap_err().kind(),
            ErrorKind::InvalidStride
        );
    }

    #[test]
    fn test_row_broadcast_matrix() {
        let buf = FlatBuffer::from(vec![1.0f64, 2.0, 3.0]);
        let a = MatrixView::new_row_broadcast("A", &buf, 5, 3, 0).unwrap();
        assert_eq!(a.leading_dim(), 0);
        assert_eq!(a.index(4, 2), 2);
        assert_eq!(a.row::<f64>(3), Some(&[1.0, 2.0, 3.0][..]));
        assert!(MatrixView::new_row_broadcast("A", &buf, 5, 3, 1).is_err());
    }

    #[test]
    fn test_region() {
        let buf = f32_buf(8);
        assert!(validate_region("images", &buf, 2, 6).is_ok());
        assert_eq!(
            validate_region("images", &buf, 3, 6).unwrap_err().kind(),
            ErrorKind::BufferTooSmall
        );
        assert_eq!(
            validate_region("images", &buf, 0, 0).unwrap_err().kind(),
            ErrorKind::InvalidShapeParameter
        );
    }

    #[test]
    fn test_vector_view_to_vec() {
        let buf = FlatBuffer::from(vec![0i32, 1, 2, 3, 4, 5, 6]);
        let v = VectorView::new("X", &buf, 3, 1, 2).unwrap();
        assert_eq!(v.to_vec::<i32>(), Some(vec![1, 3, 5]));
        assert_eq!(v.to_vec::<f32>(), None);
    }

    #[test]
    fn test_view_mut_reborrow() {
        let mut buf = f32_buf(4);
        let mut v = VectorViewMut::contiguous("Y", &mut buf, 4, 0).unwrap();
        let i = v.index(2);
        v.data_mut::<f32>().unwrap()[i] = 5.0;
        assert_eq!(v.as_view().to_vec::<f32>(), Some(vec![0.0, 0.0, 5.0, 0.0]));
    }

    #[test]
    fn test_ensure_same_type() {
        assert!(ensure_same_type("X and Y", ElementTypeTag::Float32, ElementTypeTag::Float32).is_ok());
        assert_eq!(
            ensure_same_type("X and Y", ElementTypeTag::Float32, ElementTypeTag::Float64)
                .unwrap_err()
                .kind(),
            ErrorKind::TypeMismatch
        );
    }
}
