//! Unvalidated operand descriptors accepted by [`FlatOps`](crate::FlatOps).
//!
//! A descriptor only pairs a buffer with its addressing parameters. It turns
//! into a [`VectorView`] or [`MatrixView`] once the operation knows the
//! logical extent, which is where the bounds check happens.

use std::fmt;

use linbuf_view::{
    validate_region, ElementTypeTag, FlatBuffer, MatrixView, MatrixViewMut, VectorView,
    VectorViewMut,
};

use crate::Result;

/// `(buffer, offset, increment)` of a vector operand.
#[derive(Clone, Copy)]
pub struct Vector<'a> {
    pub buffer: &'a FlatBuffer,
    pub offset: isize,
    pub inc: isize,
}

impl<'a> Vector<'a> {
    pub fn new(buffer: &'a FlatBuffer, offset: isize, inc: isize) -> Self {
        Self {
            buffer,
            offset,
            inc,
        }
    }

    /// Unit-stride operand starting at `offset`.
    pub fn at(buffer: &'a FlatBuffer, offset: isize) -> Self {
        Self::new(buffer, offset, 1)
    }

    pub fn dtype(&self) -> ElementTypeTag {
        self.buffer.dtype()
    }

    pub(crate) fn view(self, name: &'static str, n: usize) -> Result<VectorView<'a>> {
        VectorView::new(name, self.buffer, n as isize, self.offset, self.inc)
    }
}

impl fmt::Debug for Vector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vector")
            .field("dtype", &self.dtype())
            .field("len", &self.buffer.len())
            .field("offset", &self.offset)
            .field("inc", &self.inc)
            .finish()
    }
}

/// Exclusive `(buffer, offset, increment)` of a written vector operand.
pub struct VectorMut<'a> {
    pub buffer: &'a mut FlatBuffer,
    pub offset: isize,
    pub inc: isize,
}

impl<'a> VectorMut<'a> {
    pub fn new(buffer: &'a mut FlatBuffer, offset: isize, inc: isize) -> Self {
        Self {
            buffer,
            offset,
            inc,
        }
    }

    pub fn at(buffer: &'a mut FlatBuffer, offset: isize) -> Self {
        Self::new(buffer, offset, 1)
    }

    pub fn dtype(&self) -> ElementTypeTag {
        self.buffer.dtype()
    }

    pub(crate) fn view(self, name: &'static str, n: usize) -> Result<VectorViewMut<'a>> {
        VectorViewMut::new(name, self.buffer, n as isize, self.offset, self.inc)
    }
}

impl fmt::Debug for VectorMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorMut")
            .field("dtype", &self.dtype())
            .field("len", &self.buffer.len())
            .field("offset", &self.offset)
            .field("inc", &self.inc)
            .finish()
    }
}

/// `(buffer, offset, leading dimension)` of a row-major matrix operand.
#[derive(Clone, Copy)]
pub struct Matrix<'a> {
    pub buffer: &'a FlatBuffer,
    pub offset: isize,
    pub ld: isize,
}

impl<'a> Matrix<'a> {
    pub fn new(buffer: &'a FlatBuffer, offset: isize, ld: isize) -> Self {
        Self { buffer, offset, ld }
    }

    pub fn dtype(&self) -> ElementTypeTag {
        self.buffer.dtype()
    }

    pub(crate) fn view(self, name: &'static str, m: usize, n: usize) -> Result<MatrixView<'a>> {
        MatrixView::new(name, self.buffer, m as isize, n as isize, self.offset, self.ld)
    }
}

impl fmt::Debug for Matrix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matrix")
            .field("dtype", &self.dtype())
            .field("len", &self.buffer.len())
            .field("offset", &self.offset)
            .field("ld", &self.ld)
            .finish()
    }
}

/// Exclusive `(buffer, offset, leading dimension)` of a written matrix operand.
pub struct MatrixMut<'a> {
    pub buffer: &'a mut FlatBuffer,
    pub offset: isize,
    pub ld: isize,
}

impl<'a> MatrixMut<'a> {
    pub fn new(buffer: &'a mut FlatBuffer, offset: isize, ld: isize) -> Self {
        Self { buffer, offset, ld }
    }

    pub fn dtype(&self) -> ElementTypeTag {
        self.buffer.dtype()
    }

    pub(crate) fn view(self, name: &'static str, m: usize, n: usize) -> Result<MatrixViewMut<'a>> {
        MatrixViewMut::new(name, self.buffer, m as isize, n as isize, self.offset, self.ld)
    }
}

impl fmt::Debug for MatrixMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatrixMut")
            .field("dtype", &self.dtype())
            .field("len", &self.buffer.len())
            .field("offset", &self.offset)
            .field("ld", &self.ld)
            .finish()
    }
}

/// Contiguous `(buffer, offset, size)` region, as used by the windowing
/// operations whose extent is declared by the caller.
#[derive(Debug, Clone, Copy)]
pub struct Region<'a> {
    pub buffer: &'a FlatBuffer,
    pub offset: isize,
    pub size: isize,
}

impl<'a> Region<'a> {
    pub fn new(buffer: &'a FlatBuffer, offset: isize, size: isize) -> Self {
        Self {
            buffer,
            offset,
            size,
        }
    }

    pub(crate) fn view(self, name: &'static str) -> Result<VectorView<'a>> {
        validate_region(name, self.buffer, self.offset, self.size)?;
        VectorView::contiguous(name, self.buffer, self.size, self.offset)
    }
}

/// Exclusive contiguous region.
#[derive(Debug)]
pub struct RegionMut<'a> {
    pub buffer: &'a mut FlatBuffer,
    pub offset: isize,
    pub size: isize,
}

impl<'a> RegionMut<'a> {
    pub fn new(buffer: &'a mut FlatBuffer, offset: isize, size: isize) -> Self {
        Self {
            buffer,
            offset,
            size,
        }
    }

    pub(crate) fn view(self, name: &'static str) -> Result<VectorViewMut<'a>> {
        validate_region(name, &*self.buffer, self.offset, self.size)?;
        VectorViewMut::contiguous(name, self.buffer, self.size, self.offset)
    }
}
