//! Window unfolding (im2col / col2im) and image copy.

use linbuf_view::{VectorView, VectorViewMut};
use smallvec::SmallVec;

use super::element::{KernelElement, Strided};
use crate::backend::{Im2ColCall, ImageCopyCall};
use crate::status::{KernelResult, KernelStatus};

type Extents = SmallVec<[usize; 3]>;

/// Call `f` with every multi-index of `extents` in row-major order.
fn odometer(extents: &[usize], mut f: impl FnMut(&[usize])) {
    let total: usize = extents.iter().product();
    let mut index: Extents = SmallVec::from_elem(0, extents.len());
    for _ in 0..total {
        f(&index);
        for axis in (0..extents.len()).rev() {
            index[axis] += 1;
            if index[axis] < extents[axis] {
                break;
            }
            index[axis] = 0;
        }
    }
}

/// Visit every column element in column-buffer order with the image
/// position it reads, `None` for padded taps.
fn for_each_tap(call: &Im2ColCall<'_>, mut visit: impl FnMut(usize, Option<usize>)) {
    let g = call.geometry;
    let dims = g.dims();
    let outputs: Extents = dims.iter().map(|d| d.output).collect();
    let kernels: Extents = dims.iter().map(|d| d.kernel).collect();
    let spatial: usize = dims.iter().map(|d| d.input).product();
    let channels = g.channels;
    let channels_first = call.channels_first;

    let image_pos = |b: usize, out: &[usize], tap: &[usize], c: usize| -> Option<usize> {
        let mut linear = 0;
        for (axis, d) in dims.iter().enumerate() {
            linear = linear * d.input + d.source_index(out[axis], tap[axis])?;
        }
        Some(if channels_first {
            (b * channels + c) * spatial + linear
        } else {
            (b * spatial + linear) * channels + c
        })
    };

    let mut col = 0;
    for b in 0..g.batches {
        odometer(&outputs, |out| {
            if call.cols_channels_first {
                for c in 0..channels {
                    odometer(&kernels, |tap| {
                        visit(col, image_pos(b, out, tap, c));
                        col += 1;
                    });
                }
            } else {
                odometer(&kernels, |tap| {
                    for c in 0..channels {
                        visit(col, image_pos(b, out, tap, c));
                        col += 1;
                    }
                });
            }
        });
    }
}

fn check_sizes(call: &Im2ColCall<'_>, images: usize, cols: usize) -> KernelResult<()> {
    if images != call.geometry.image_len() {
        return Err(KernelStatus::UnmatchImageBufferSize);
    }
    if cols != call.geometry.cols_len() {
        return Err(KernelStatus::UnmatchColsBufferSize);
    }
    Ok(())
}

pub(super) fn im2col(
    call: Im2ColCall<'_>,
    images: &VectorView<'_>,
    cols: &mut VectorViewMut<'_>,
) -> KernelResult<()> {
    check_sizes(&call, images.len(), cols.len())?;
    let (li, lc) = (Strided::of(images), Strided::of_mut(cols));
    dispatch_float2!(images.buffer(), cols.buffer_mut(), src, dst => {
        unfold(&call, src, li, dst, lc);
        Ok(())
    })
}

fn unfold<T: KernelElement>(
    call: &Im2ColCall<'_>,
    src: &[T],
    li: Strided,
    dst: &mut [T],
    lc: Strided,
) {
    for_each_tap(call, |col, image| {
        dst[lc.at(col)] = image.map_or(T::ZERO, |p| src[li.at(p)]);
    });
}

pub(super) fn col2im(
    call: Im2ColCall<'_>,
    cols: &VectorView<'_>,
    images: &mut VectorViewMut<'_>,
) -> KernelResult<()> {
    check_sizes(&call, images.len(), cols.len())?;
    let (lc, li) = (Strided::of(cols), Strided::of_mut(images));
    dispatch_float2!(cols.buffer(), images.buffer_mut(), src, dst => {
        fold(&call, src, lc, dst, li);
        Ok(())
    })
}

fn fold<T: KernelElement>(
    call: &Im2ColCall<'_>,
    src: &[T],
    lc: Strided,
    dst: &mut [T],
    li: Strided,
) {
    for_each_tap(call, |col, image| {
        if let Some(p) = image {
            let q = li.at(p);
            dst[q] = dst[q].accumulate(src[lc.at(col)]);
        }
    });
}

// ============================================================================
// Image copy
// ============================================================================

/// Source coordinate for destination `pos` along an axis of `len`.
///
/// Shifted-in positions repeat the nearest edge.
fn source_coord(pos: usize, len: usize, shift: isize, flip: bool) -> usize {
    let pos = if flip { len - 1 - pos } else { pos };
    (pos as isize).saturating_sub(shift).clamp(0, len as isize - 1) as usize
}

pub(super) fn imagecopy(
    call: ImageCopyCall,
    a: &VectorView<'_>,
    b: &mut VectorViewMut<'_>,
) -> KernelResult<()> {
    let (la, lb) = (Strided::of(a), Strided::of_mut(b));
    match (a.buffer(), b.buffer_mut()) {
        (linbuf_view::FlatBuffer::U8(src), linbuf_view::FlatBuffer::U8(dst)) => {
            copy_image(call, src, la, dst, lb)
        }
        (a, b) => dispatch_float2!(a, b, src, dst => copy_image(call, src, la, dst, lb)),
    }
    Ok(())
}

fn copy_image<T: Copy>(
    call: ImageCopyCall,
    src: &[T],
    la: Strided,
    dst: &mut [T],
    lb: Strided,
) {
    let ImageCopyCall {
        height,
        width,
        channels,
        channels_first,
        height_shift,
        width_shift,
        vertical_flip,
        horizontal_flip,
        rgb_flip,
    } = call;
    let offset_of = |y: usize, x: usize, c: usize| {
        if channels_first {
            (c * height + y) * width + x
        } else {
            (y * width + x) * channels + c
        }
    };
    for y in 0..height {
        let sy = source_coord(y, height, height_shift, vertical_flip);
        for x in 0..width {
            let sx = source_coord(x, width, width_shift, horizontal_flip);
            for c in 0..channels {
                let sc = if rgb_flip && c < 3 && channels >= 3 { 2 - c } else { c };
                dst[lb.at(offset_of(y, x, c))] = src[la.at(offset_of(sy, sx, sc))];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linbuf_plan::{PaddingMode, WindowGeometry, WindowParams};
    use linbuf_view::{ElementTypeTag, FlatBuffer};

    fn view(buf: &FlatBuffer) -> VectorView<'_> {
        VectorView::contiguous("images", buf, buf.len() as isize, 0).unwrap()
    }

    fn call(geometry: &WindowGeometry) -> Im2ColCall<'_> {
        Im2ColCall {
            geometry,
            channels_first: false,
            cols_channels_first: false,
        }
    }

    #[test]
    fn test_odometer_order() {
        let mut seen = Vec::new();
        odometer(&[2, 2], |i| seen.push(i.to_vec()));
        assert_eq!(seen, vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]);
    }

    #[test]
    fn test_im2col_1d_valid() {
        // 1 batch, width 4, kernel 2, stride 1, 1 channel: 3 windows
        let g = WindowGeometry::new(1, 1, &[WindowParams::new(4, 2, 1, 1)], PaddingMode::None)
            .unwrap();
        let images = FlatBuffer::from(vec![1.0f32, 2.0, 3.0, 4.0]);
        let mut out = FlatBuffer::zeros(ElementTypeTag::Float32, g.cols_len());
        let mut cols = VectorViewMut::contiguous("cols", &mut out, 6, 0).unwrap();
        im2col(call(&g), &view(&images), &mut cols).unwrap();
        assert_eq!(
            out.as_slice::<f32>().unwrap(),
            &[1.0, 2.0, 2.0, 3.0, 3.0, 4.0]
        );
    }

    #[test]
    fn test_im2col_same_padding_zero_fills() {
        // width 3, kernel 3, same padding: pad_before 1
        let g = WindowGeometry::new(1, 1, &[WindowParams::new(3, 3, 1, 1)], PaddingMode::Same)
            .unwrap();
        let images = FlatBuffer::from(vec![1.0f64, 2.0, 3.0]);
        let mut out = FlatBuffer::zeros(ElementTypeTag::Float64, 9);
        let mut cols = VectorViewMut::contiguous("cols", &mut out, 9, 0).unwrap();
        im2col(call(&g), &view(&images), &mut cols).unwrap();
        assert_eq!(
            out.as_slice::<f64>().unwrap(),
            &[0.0, 1.0, 2.0, 1.0, 2.0, 3.0, 2.0, 3.0, 0.0]
        );
    }

    #[test]
    fn test_col2im_accumulates_overlaps() {
        let g = WindowGeometry::new(1, 1, &[WindowParams::new(4, 2, 1, 1)], PaddingMode::None)
            .unwrap();
        let cols = FlatBuffer::from(vec![1.0f32; 6]);
        let mut out = FlatBuffer::zeros(ElementTypeTag::Float32, 4);
        let mut images = VectorViewMut::contiguous("images", &mut out, 4, 0).unwrap();
        col2im(call(&g), &view(&cols), &mut images).unwrap();
        assert_eq!(out.as_slice::<f32>().unwrap(), &[1.0, 2.0, 2.0, 1.0]);
    }

    #[test]
    fn test_im2col_2d_channels() {
        // 2x2 image, 2 channels, 2x2 kernel: one window holding the whole image
        let g = WindowGeometry::new(
            1,
            2,
            &[WindowParams::new(2, 2, 1, 1), WindowParams::new(2, 2, 1, 1)],
            PaddingMode::None,
        )
        .unwrap();
        let images = FlatBuffer::from((0..8).map(|v| v as f32).collect::<Vec<_>>());
        let mut out = FlatBuffer::zeros(ElementTypeTag::Float32, 8);
        let mut cols = VectorViewMut::contiguous("cols", &mut out, 8, 0).unwrap();
        let c = Im2ColCall {
            geometry: &g,
            channels_first: false,
            cols_channels_first: true,
        };
        im2col(c, &view(&images), &mut cols).unwrap();
        // channel 0 taps, then channel 1 taps
        assert_eq!(
            out.as_slice::<f32>().unwrap(),
            &[0.0, 2.0, 4.0, 6.0, 1.0, 3.0, 5.0, 7.0]
        );
    }

    #[test]
    fn test_im2col_size_mismatch() {
        let g = WindowGeometry::new(1, 1, &[WindowParams::new(4, 2, 1, 1)], PaddingMode::None)
            .unwrap();
        let images = FlatBuffer::from(vec![0.0f32; 5]);
        let mut out = FlatBuffer::zeros(ElementTypeTag::Float32, 6);
        let mut cols = VectorViewMut::contiguous("cols", &mut out, 6, 0).unwrap();
        assert_eq!(
            im2col(call(&g), &view(&images), &mut cols),
            Err(KernelStatus::UnmatchImageBufferSize)
        );
    }

    #[test]
    fn test_source_coord_clamps_extreme_shifts() {
        assert_eq!(source_coord(0, 3, isize::MIN, false), 2);
        assert_eq!(source_coord(2, 3, isize::MAX, false), 0);
        assert_eq!(source_coord(0, 3, isize::MIN, true), 2);
        assert_eq!(source_coord(1, 3, -1, false), 2);
    }

    #[test]
    fn test_imagecopy_shift_and_flip() {
        // 1x3 image, 1 channel
        let a = FlatBuffer::from(vec![1u8, 2, 3]);
        let base = ImageCopyCall {
            height: 1,
            width: 3,
            channels: 1,
            channels_first: false,
            height_shift: 0,
            width_shift: 1,
            vertical_flip: false,
            horizontal_flip: false,
            rgb_flip: false,
        };
        let mut out = FlatBuffer::zeros(ElementTypeTag::Uint8, 3);
        let mut b = VectorViewMut::contiguous("B", &mut out, 3, 0).unwrap();
        imagecopy(base, &view(&a), &mut b).unwrap();
        assert_eq!(out.as_slice::<u8>().unwrap(), &[1, 1, 2]);

        let flipped = ImageCopyCall {
            width_shift: 0,
            horizontal_flip: true,
            ..base
        };
        let mut b = VectorViewMut::contiguous("B", &mut out, 3, 0).unwrap();
        imagecopy(flipped, &view(&a), &mut b).unwrap();
        assert_eq!(out.as_slice::<u8>().unwrap(), &[3, 2, 1]);
    }

    #[test]
    fn test_imagecopy_rgb_flip() {
        let a = FlatBuffer::from(vec![0.1f32, 0.2, 0.3, 1.0]);
        let c = ImageCopyCall {
            height: 1,
            width: 1,
            channels: 4,
            channels_first: false,
            height_shift: 0,
            width_shift: 0,
            vertical_flip: false,
            horizontal_flip: false,
            rgb_flip: true,
        };
        let mut out = FlatBuffer::zeros(ElementTypeTag::Float32, 4);
        let mut b = VectorViewMut::contiguous("B", &mut out, 4, 0).unwrap();
        imagecopy(c, &view(&a), &mut b).unwrap();
        assert_eq!(out.as_slice::<f32>().unwrap(), &[0.3, 0.2, 0.1, 1.0]);
    }
}
