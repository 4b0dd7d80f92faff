#![forbid(unsafe_code)]

//! Emitters: prepared rasters into cells or bitmap payloads.
//!
//! Both emitters receive a raster already cropped and scaled to the display
//! size. [`CellEmitter`]s write glyphs into a plane; [`PixelEmitter`]s stage
//! a bitmap payload and classify the cells it covers.

use pixtui_core::geometry::{CellPixels, Dims};
use pixtui_render::cell::{Cell, PackedRgba};
use pixtui_render::plane::Plane;

use crate::blitter::BlitSet;
use crate::error::VisualError;
use crate::pixels::PixelBuffer;
use crate::sprixel::Bitmap;
use crate::tam::{CellState, is_visible};

const UPPER_HALF: char = '\u{2580}';
const LOWER_HALF: char = '\u{2584}';

/// Alpha applied to glyph colors under [`EmitOptions::blend`].
const BLEND_ALPHA: u8 = 128;

/// Per-render emitter settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmitOptions {
    /// Mix colors with what the plane already holds.
    pub blend: bool,
    /// Pixels of this color are treated as transparent.
    pub transcolor: Option<PackedRgba>,
}

impl EmitOptions {
    #[inline]
    fn is_visible(&self, px: [u8; 4]) -> bool {
        if !is_visible(px[3]) {
            return false;
        }
        !self
            .transcolor
            .is_some_and(|t| t.same_rgb(PackedRgba::from_bytes(px)))
    }
}

/// Writes a raster into plane cells.
pub trait CellEmitter: Send {
    /// Draw `raster` with its top-left cell at `at` (plane-relative).
    ///
    /// Cells outside the plane are skipped. Returns the number written.
    fn emit(
        &self,
        plane: &mut Plane,
        blitset: &BlitSet,
        raster: &PixelBuffer,
        at: (i32, i32),
        opts: &EmitOptions,
    ) -> Result<usize, VisualError>;
}

/// Two-tone emitter: each cell block becomes at most two colors.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlyphEmitter;

#[derive(Default)]
struct Average {
    sum: [u64; 3],
    count: u64,
}

impl Average {
    fn add(&mut self, px: [u8; 4]) {
        for (s, c) in self.sum.iter_mut().zip(px) {
            *s += u64::from(c);
        }
        self.count += 1;
    }

    fn color(&self) -> Option<PackedRgba> {
        if self.count == 0 {
            return None;
        }
        let ch = |i: usize| ((self.sum[i] + self.count / 2) / self.count) as u8;
        Some(PackedRgba::rgb(ch(0), ch(1), ch(2)))
    }
}

impl GlyphEmitter {
    /// Average colors of the upper and lower halves of a block.
    fn halves(
        raster: &PixelBuffer,
        (y0, x0): (u32, u32),
        (sy, sx): (u32, u32),
        opts: &EmitOptions,
    ) -> (Option<PackedRgba>, Option<PackedRgba>) {
        let split = sy / 2;
        let (mut top, mut bottom) = (Average::default(), Average::default());
        for dy in 0..sy {
            for dx in 0..sx {
                let Some(px) = raster.pixel(y0 + dy, x0 + dx) else {
                    continue;
                };
                if !opts.is_visible(px) {
                    continue;
                }
                if dy < split {
                    top.add(px);
                } else {
                    bottom.add(px);
                }
            }
        }
        (top.color(), bottom.color())
    }

    fn glyph(top: Option<PackedRgba>, bottom: Option<PackedRgba>) -> Option<Cell> {
        match (top, bottom) {
            (None, None) => None,
            (Some(t), Some(b)) if t == b => Some(Cell::new(' ', t, t)),
            (Some(t), Some(b)) => Some(Cell::new(UPPER_HALF, t, b)),
            (Some(t), None) => Some(Cell::new(UPPER_HALF, t, PackedRgba::TRANSPARENT)),
            (None, Some(b)) => Some(Cell::new(LOWER_HALF, b, PackedRgba::TRANSPARENT)),
        }
    }
}

impl CellEmitter for GlyphEmitter {
    fn emit(
        &self,
        plane: &mut Plane,
        blitset: &BlitSet,
        raster: &PixelBuffer,
        at: (i32, i32),
        opts: &EmitOptions,
    ) -> Result<usize, VisualError> {
        let (sy, sx) = (blitset.rows_per_cell.max(1), blitset.cols_per_cell.max(1));
        let cells = Dims::new(raster.rows().div_ceil(sy), raster.cols().div_ceil(sx));
        let mut written = 0;
        for cy in 0..cells.rows {
            let Ok(py) = u32::try_from(i64::from(at.0) + i64::from(cy)) else {
                continue;
            };
            if py >= plane.rows() {
                break;
            }
            for cx in 0..cells.cols {
                let Ok(px) = u32::try_from(i64::from(at.1) + i64::from(cx)) else {
                    continue;
                };
                if px >= plane.cols() {
                    break;
                }
                let (top, bottom) = Self::halves(raster, (cy * sy, cx * sx), (sy, sx), opts);
                let Some(mut cell) = Self::glyph(top, bottom) else {
                    continue;
                };
                let Some(existing) = plane.get_mut(py, px) else {
                    continue;
                };
                if opts.blend {
                    cell.fg = cell.fg.with_alpha(BLEND_ALPHA).over(existing.bg);
                    if cell.bg.a() != 0 {
                        cell.bg = cell.bg.with_alpha(BLEND_ALPHA).over(existing.bg);
                    }
                }
                *existing = cell;
                written += 1;
            }
        }
        Ok(written)
    }
}

/// A staged bitmap and the TAM states of the cells it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBitmap {
    pub bitmap: Bitmap,
    /// Row-major, one per cell.
    pub states: Vec<CellState>,
}

/// Encodes a raster as a sprixel payload.
pub trait PixelEmitter: Send {
    /// Stage `raster` as an `out_rows`-tall payload covering `cells`.
    ///
    /// Rows past the raster's bottom are transparent.
    fn encode(
        &self,
        raster: &PixelBuffer,
        out_rows: u32,
        cp: CellPixels,
        cells: Dims,
        transcolor: Option<PackedRgba>,
    ) -> Result<EncodedBitmap, VisualError>;
}

/// Stages tightly packed RGBA.
#[derive(Debug, Clone, Copy, Default)]
pub struct StagedRgbaEmitter;

impl PixelEmitter for StagedRgbaEmitter {
    fn encode(
        &self,
        raster: &PixelBuffer,
        out_rows: u32,
        cp: CellPixels,
        cells: Dims,
        transcolor: Option<PackedRgba>,
    ) -> Result<EncodedBitmap, VisualError> {
        if out_rows == 0 || raster.cols() == 0 {
            return Err(VisualError::Emit("empty bitmap".into()));
        }
        let opts = EmitOptions {
            blend: false,
            transcolor,
        };
        let cols = raster.cols() as usize;
        let mut payload = vec![0u8; out_rows as usize * cols * 4];
        for (y, dst) in payload.chunks_exact_mut(cols * 4).enumerate() {
            let Some(src) = raster.row(y as u32) else {
                break;
            };
            for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                let px = [s[0], s[1], s[2], s[3]];
                if opts.is_visible(px) {
                    d.copy_from_slice(&px);
                } else {
                    d.copy_from_slice(&[px[0], px[1], px[2], 0]);
                }
            }
        }
        let bitmap = Bitmap::new(payload, Dims::new(out_rows, raster.cols()));
        let states = (0..cells.rows)
            .flat_map(|y| (0..cells.cols).map(move |x| (y, x)))
            .map(|(y, x)| bitmap.cell_state(cp, y, x))
            .collect();
        Ok(EncodedBitmap { bitmap, states })
    }
}
