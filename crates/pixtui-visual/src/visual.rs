#![forbid(unsafe_code)]

//! The [`Visual`]: a pixel buffer plus optional decoder state.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use pixtui_core::geometry::Dims;
use pixtui_render::cell::PackedRgba;

use crate::backend::VisualBackend;
use crate::error::VisualError;
use crate::pixels::{BPP, PixelBuffer};
use crate::transform::{self, BoundingBox};

/// An RGBA raster, possibly backed by a decoder.
///
/// `details` belongs to whichever [`VisualBackend`] produced the visual. After
/// any operation that replaces the frame, the backend's
/// [`seed`](VisualBackend::seed) hook is called so it can resynchronize.
pub struct Visual {
    frame: PixelBuffer,
    details: Option<Box<dyn Any + Send>>,
}

impl fmt::Debug for Visual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Visual")
            .field("rows", &self.frame.rows())
            .field("cols", &self.frame.cols())
            .field("stride", &self.frame.stride())
            .field("owned", &self.frame.is_owned())
            .field("details", &self.details.is_some())
            .finish()
    }
}

/// Convert `rows` source rows of `in_bpp`-byte pixels into a padded RGBA frame.
fn convert_rows(
    data: &[u8],
    rows: u32,
    cols: u32,
    stride: usize,
    in_bpp: usize,
    mut px: impl FnMut(&[u8]) -> [u8; 4],
) -> Result<PixelBuffer, VisualError> {
    let row_bytes = cols as usize * in_bpp;
    let needed = match rows {
        0 => 0,
        r => stride * (r as usize - 1) + row_bytes,
    };
    if stride < row_bytes || data.len() < needed {
        return Err(VisualError::InvalidStride {
            stride,
            cols,
            bpp: in_bpp,
        });
    }
    let mut frame = PixelBuffer::new(rows, cols);
    for y in 0..rows {
        let src = &data[y as usize * stride..y as usize * stride + row_bytes];
        if let Some(dst) = frame.row_mut(y) {
            for (d, s) in dst.chunks_exact_mut(BPP).zip(src.chunks_exact(in_bpp)) {
                d.copy_from_slice(&px(s));
            }
        }
    }
    Ok(frame)
}

fn check_word_stride(stride: usize, cols: u32) -> Result<(), VisualError> {
    if stride % BPP != 0 {
        return Err(VisualError::InvalidStride {
            stride,
            cols,
            bpp: BPP,
        });
    }
    Ok(())
}

impl Visual {
    /// Copy packed RGBA rows. `stride` must be a multiple of four.
    pub fn from_rgba(data: &[u8], rows: u32, cols: u32, stride: usize) -> Result<Self, VisualError> {
        check_word_stride(stride, cols)?;
        let frame = convert_rows(data, rows, cols, stride, BPP, |s| [s[0], s[1], s[2], s[3]])?;
        Ok(Self::from_buffer(frame))
    }

    /// Copy BGRA rows, swapping to RGBA and keeping alpha.
    pub fn from_bgra(data: &[u8], rows: u32, cols: u32, stride: usize) -> Result<Self, VisualError> {
        check_word_stride(stride, cols)?;
        let frame = convert_rows(data, rows, cols, stride, BPP, |s| [s[2], s[1], s[0], s[3]])?;
        Ok(Self::from_buffer(frame))
    }

    /// Copy packed 3-byte RGB rows, giving every pixel `alpha`.
    pub fn from_rgb_packed(
        data: &[u8],
        rows: u32,
        cols: u32,
        stride: usize,
        alpha: u8,
    ) -> Result<Self, VisualError> {
        let frame = convert_rows(data, rows, cols, stride, 3, |s| [s[0], s[1], s[2], alpha])?;
        Ok(Self::from_buffer(frame))
    }

    /// Copy 4-byte RGBx rows, replacing the fourth byte with `alpha`.
    pub fn from_rgb_loose(
        data: &[u8],
        rows: u32,
        cols: u32,
        stride: usize,
        alpha: u8,
    ) -> Result<Self, VisualError> {
        check_word_stride(stride, cols)?;
        let frame = convert_rows(data, rows, cols, stride, BPP, |s| [s[0], s[1], s[2], alpha])?;
        Ok(Self::from_buffer(frame))
    }

    /// Wrap an existing buffer.
    pub fn from_buffer(frame: PixelBuffer) -> Self {
        Self {
            frame,
            details: None,
        }
    }

    /// Wrap shared RGBA bytes without copying.
    pub fn from_shared(data: Arc<[u8]>, rows: u32, cols: u32, stride: usize) -> Result<Self, VisualError> {
        Ok(Self::from_buffer(PixelBuffer::from_shared(data, rows, cols, stride)?))
    }

    #[inline]
    pub const fn rows(&self) -> u32 {
        self.frame.rows()
    }

    #[inline]
    pub const fn cols(&self) -> u32 {
        self.frame.cols()
    }

    #[inline]
    pub const fn dims(&self) -> Dims {
        self.frame.dims()
    }

    pub fn frame(&self) -> &PixelBuffer {
        &self.frame
    }

    pub fn frame_mut(&mut self) -> &mut PixelBuffer {
        &mut self.frame
    }

    /// Swap in a new frame, returning the old one.
    pub fn replace_frame(&mut self, frame: PixelBuffer) -> PixelBuffer {
        std::mem::replace(&mut self.frame, frame)
    }

    /// Backend state, if a backend produced this visual.
    pub fn details(&self) -> Option<&(dyn Any + Send + 'static)> {
        self.details.as_deref()
    }

    pub fn details_mut(&mut self) -> Option<&mut (dyn Any + Send + 'static)> {
        self.details.as_deref_mut()
    }

    pub fn set_details(&mut self, details: Box<dyn Any + Send>) {
        self.details = Some(details);
    }

    pub fn take_details(&mut self) -> Option<Box<dyn Any + Send>> {
        self.details.take()
    }

    /// Pixel at `(y, x)`.
    pub fn at(&self, y: u32, x: u32) -> Result<PackedRgba, VisualError> {
        self.frame
            .pixel(y, x)
            .map(PackedRgba::from_bytes)
            .ok_or(VisualError::OutOfBounds {
                y,
                x,
                dims: self.dims(),
            })
    }

    /// Overwrite the pixel at `(y, x)`.
    pub fn set(&mut self, y: u32, x: u32, color: PackedRgba) -> Result<(), VisualError> {
        if self.frame.set_pixel(y, x, color.to_bytes()) {
            Ok(())
        } else {
            Err(VisualError::OutOfBounds {
                y,
                x,
                dims: self.dims(),
            })
        }
    }

    /// Smallest rectangle holding every non-zero pixel.
    pub fn bounding_box(&self) -> BoundingBox {
        transform::bounding_box(&self.frame)
    }

    /// Rotate by `rads` radians about the canvas center.
    pub fn rotate(&mut self, rads: f64, backend: &dyn VisualBackend) -> Result<(), VisualError> {
        transform::rotate(self, rads, backend)
    }

    /// Flood fill from `(y, x)`; returns the number of pixels changed.
    pub fn polyfill(&mut self, y: u32, x: u32, color: PackedRgba) -> Result<usize, VisualError> {
        transform::polyfill(self, y, x, color)
    }

    /// Resize through the backend.
    pub fn resize(&mut self, rows: u32, cols: u32, backend: &dyn VisualBackend) -> Result<(), VisualError> {
        transform::resize(self, rows, cols, backend)
    }

    /// Nearest-neighbor resize that never interpolates.
    pub fn resize_noninterpolative(&mut self, rows: u32, cols: u32) -> Result<(), VisualError> {
        transform::resize_noninterpolative(self, rows, cols)
    }

    /// Enlarge by an integer factor without interpolation.
    pub fn inflate(&mut self, scale: u32) -> Result<(), VisualError> {
        transform::inflate(self, scale)
    }
}
