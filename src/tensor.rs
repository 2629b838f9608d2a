//! Tensor handles: a flat buffer, an offset and a row-major shape.

use linbuf_view::{ElementTypeTag, FlatBuffer, LinbufError, Shape};

use crate::operand::{Region, RegionMut, Vector, VectorMut};
use crate::Result;

/// Shared row-major tensor stored contiguously from `offset`.
#[derive(Debug, Clone)]
pub struct TensorRef<'a> {
    pub(crate) buffer: &'a FlatBuffer,
    pub(crate) offset: isize,
    pub(crate) shape: Shape,
}

impl<'a> TensorRef<'a> {
    /// Handle over `buffer[offset..offset + product(dims)]`.
    ///
    /// Only the shape is checked here; the buffer extent is checked when an
    /// operation turns the handle into a view.
    pub fn new(buffer: &'a FlatBuffer, offset: isize, dims: &[usize]) -> Result<Self> {
        Ok(Self {
            buffer,
            offset,
            shape: Shape::new(dims)?,
        })
    }

    /// Whole buffer as a rank-1 tensor.
    pub fn from_buffer(buffer: &'a FlatBuffer) -> Result<Self> {
        Self::new(buffer, 0, &[buffer.len()])
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    pub fn size(&self) -> usize {
        self.shape.size()
    }

    pub fn dtype(&self) -> ElementTypeTag {
        self.buffer.dtype()
    }

    pub fn offset(&self) -> isize {
        self.offset
    }

    pub fn buffer(&self) -> &'a FlatBuffer {
        self.buffer
    }

    pub(crate) fn vector(&self) -> Vector<'a> {
        Vector::at(self.buffer, self.offset)
    }

    pub(crate) fn region(&self) -> Result<Region<'a>> {
        Ok(Region::new(self.buffer, self.offset, signed_size(&self.shape)?))
    }
}

/// Exclusive row-major tensor stored contiguously from `offset`.
#[derive(Debug)]
pub struct TensorMut<'a> {
    pub(crate) buffer: &'a mut FlatBuffer,
    pub(crate) offset: isize,
    pub(crate) shape: Shape,
}

impl<'a> TensorMut<'a> {
    pub fn new(buffer: &'a mut FlatBuffer, offset: isize, dims: &[usize]) -> Result<Self> {
        Ok(Self {
            buffer,
            offset,
            shape: Shape::new(dims)?,
        })
    }

    pub fn from_buffer(buffer: &'a mut FlatBuffer) -> Result<Self> {
        let len = buffer.len();
        Self::new(buffer, 0, &[len])
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    pub fn size(&self) -> usize {
        self.shape.size()
    }

    pub fn dtype(&self) -> ElementTypeTag {
        self.buffer.dtype()
    }

    pub fn offset(&self) -> isize {
        self.offset
    }

    /// Shared handle over the same elements.
    pub fn as_shared(&self) -> TensorRef<'_> {
        TensorRef {
            buffer: &*self.buffer,
            offset: self.offset,
            shape: self.shape.clone(),
        }
    }

    /// Fail with [`LinbufError::ShapeMismatch`] unless the shape is `expected`.
    pub(crate) fn expect_dims(&self, expected: &[usize]) -> Result<()> {
        expect_dims(expected, self.dims())
    }

    pub(crate) fn vector(self) -> VectorMut<'a> {
        VectorMut::at(self.buffer, self.offset)
    }

    pub(crate) fn region(self) -> Result<RegionMut<'a>> {
        let size = signed_size(&self.shape)?;
        Ok(RegionMut::new(self.buffer, self.offset, size))
    }
}

pub(crate) fn expect_dims(expected: &[usize], actual: &[usize]) -> Result<()> {
    if expected != actual {
        return Err(LinbufError::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        });
    }
    Ok(())
}

fn signed_size(shape: &Shape) -> Result<isize> {
    shape
        .dims()
        .iter()
        .try_fold(1isize, |acc, &d| acc.checked_mul(isize::try_from(d).ok()?))
        .ok_or(LinbufError::InvalidShapeParameter {
            name: "shape",
            value: isize::MAX,
        })
}
