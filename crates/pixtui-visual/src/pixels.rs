#![forbid(unsafe_code)]

//! Owned or shared RGBA pixel storage.
//!
//! [`PixelBuffer`] keeps the bytes and their geometry together: rows, columns
//! and a row stride in bytes that may exceed `4 * cols`. Pixels are stored in
//! memory order `[r, g, b, a]`.
//!
//! Shared storage (`Arc<[u8]>`) is never written. The first mutation copies it
//! into owned storage, so a buffer handed in by a decoder is released only by
//! its last holder.

use std::sync::Arc;

use pixtui_core::geometry::{Dims, Window};

use crate::error::VisualError;

/// Bytes per RGBA pixel.
pub const BPP: usize = 4;

/// Row alignment, in bytes, of buffers allocated here.
pub const ROW_ALIGN: usize = 64;

/// Stride for `cols` pixels, padded to [`ROW_ALIGN`].
#[inline]
pub const fn pad_stride(cols: u32) -> usize {
    (cols as usize * BPP).next_multiple_of(ROW_ALIGN)
}

#[derive(Debug, Clone)]
enum Storage {
    Owned(Vec<u8>),
    Shared(Arc<[u8]>),
}

impl Storage {
    fn as_slice(&self) -> &[u8] {
        match self {
            Self::Owned(v) => v,
            Self::Shared(a) => a,
        }
    }

    fn make_mut(&mut self) -> &mut Vec<u8> {
        if let Self::Shared(a) = self {
            *self = Self::Owned(a.to_vec());
        }
        match self {
            Self::Owned(v) => v,
            Self::Shared(_) => unreachable!("shared storage converted above"),
        }
    }
}

/// An RGBA raster with its geometry.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    storage: Storage,
    rows: u32,
    cols: u32,
    stride: usize,
}

impl PixelBuffer {
    /// Zeroed (fully transparent) buffer with a padded stride.
    pub fn new(rows: u32, cols: u32) -> Self {
        let stride = pad_stride(cols);
        Self {
            storage: Storage::Owned(vec![0; stride * rows as usize]),
            rows,
            cols,
            stride,
        }
    }

    /// Zeroed buffer with a tight stride of `4 * cols`.
    pub fn tight(rows: u32, cols: u32) -> Self {
        let stride = cols as usize * BPP;
        Self {
            storage: Storage::Owned(vec![0; stride * rows as usize]),
            rows,
            cols,
            stride,
        }
    }

    /// Take ownership of `data`.
    pub fn from_owned(data: Vec<u8>, rows: u32, cols: u32, stride: usize) -> Result<Self, VisualError> {
        check_layout(data.len(), rows, cols, stride)?;
        Ok(Self {
            storage: Storage::Owned(data),
            rows,
            cols,
            stride,
        })
    }

    /// Borrow shared bytes; they are copied on first mutation.
    pub fn from_shared(data: Arc<[u8]>, rows: u32, cols: u32, stride: usize) -> Result<Self, VisualError> {
        check_layout(data.len(), rows, cols, stride)?;
        Ok(Self {
            storage: Storage::Shared(data),
            rows,
            cols,
            stride,
        })
    }

    #[inline]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    #[inline]
    pub const fn cols(&self) -> u32 {
        self.cols
    }

    #[inline]
    pub const fn dims(&self) -> Dims {
        Dims::new(self.rows, self.cols)
    }

    /// Bytes per row.
    #[inline]
    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// True while the buffer owns its bytes.
    pub fn is_owned(&self) -> bool {
        matches!(self.storage, Storage::Owned(_))
    }

    /// Raw bytes, padding included.
    pub fn as_bytes(&self) -> &[u8] {
        self.storage.as_slice()
    }

    /// Pixels of row `y`, without padding.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.rows {
            return None;
        }
        let start = y as usize * self.stride;
        Some(&self.as_bytes()[start..start + self.cols as usize * BPP])
    }

    /// Mutable pixels of row `y`, without padding.
    pub fn row_mut(&mut self, y: u32) -> Option<&mut [u8]> {
        if y >= self.rows {
            return None;
        }
        let start = y as usize * self.stride;
        let len = self.cols as usize * BPP;
        Some(&mut self.storage.make_mut()[start..start + len])
    }

    #[inline]
    fn offset(&self, y: u32, x: u32) -> Option<usize> {
        (y < self.rows && x < self.cols).then(|| y as usize * self.stride + x as usize * BPP)
    }

    /// Pixel at `(y, x)` in memory order.
    #[inline]
    pub fn pixel(&self, y: u32, x: u32) -> Option<[u8; 4]> {
        let off = self.offset(y, x)?;
        let px = &self.as_bytes()[off..off + BPP];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Overwrite the pixel at `(y, x)`; returns false when out of bounds.
    #[inline]
    pub fn set_pixel(&mut self, y: u32, x: u32, px: [u8; 4]) -> bool {
        match self.offset(y, x) {
            Some(off) => {
                self.storage.make_mut()[off..off + BPP].copy_from_slice(&px);
                true
            }
            None => false,
        }
    }

    /// Copy `window` into a new tightly packed buffer.
    ///
    /// The window is clipped to the raster.
    pub fn crop(&self, window: Window) -> Self {
        let y0 = window.y.min(self.rows);
        let x0 = window.x.min(self.cols);
        let rows = window.rows.min(self.rows - y0);
        let cols = window.cols.min(self.cols - x0);
        let mut out = Self::tight(rows, cols);
        let len = cols as usize * BPP;
        let src = self.as_bytes();
        if let Storage::Owned(dst) = &mut out.storage {
            for r in 0..rows as usize {
                let s = (y0 as usize + r) * self.stride + x0 as usize * BPP;
                dst[r * len..(r + 1) * len].copy_from_slice(&src[s..s + len]);
            }
        }
        out
    }
}

fn check_layout(len: usize, rows: u32, cols: u32, stride: usize) -> Result<(), VisualError> {
    let row_bytes = cols as usize * BPP;
    let needed = match rows {
        0 => 0,
        r => stride * (r as usize - 1) + row_bytes,
    };
    if stride < row_bytes || len < needed {
        return Err(VisualError::InvalidStride {
            stride,
            cols,
            bpp: BPP,
        });
    }
    Ok(())
}
