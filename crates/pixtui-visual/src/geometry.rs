#![forbid(unsafe_code)]

//! Render options and the geometry resolver.
//!
//! [`resolve`] is the only place crop and scale math happens. Given the source
//! raster size, the caller's [`VisualOptions`] and a [`Destination`], it picks
//! a blitter and computes:
//!
//! - the source window to read,
//! - the display size in pixels after scaling,
//! - the cell footprint,
//! - where the output lands.
//!
//! It never touches pixels, and on failure it produces nothing.
//!
//! # Bitmap geometry
//!
//! Bitmaps are measured in pixels and rounded up to whole cells. Terminals
//! may cap bitmap size ([`TerminalCapabilities::max_bitmap`]) and Sixel
//! encodes six rows per band, so the payload height (`out_rows`) can exceed
//! the display height. See [`clamp_to_bitmap_max`].

use pixtui_core::geometry::{Dims, Window};
use pixtui_core::terminal_capabilities::TerminalCapabilities;
use pixtui_core::{error, warn};
use pixtui_render::cell::PackedRgba;
use pixtui_render::plane::{Align, PlaneId};

use crate::blitter::{BlitSet, Blitter, Scaling};
use crate::error::{Axis, GeometryError};

bitflags::bitflags! {
    /// Render option flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VisualFlags: u64 {
        /// Fail instead of degrading an unsupported blitter.
        const NODEGRADE     = 1 << 0;
        /// Blend glyph colors with what is already on the plane.
        const BLEND         = 1 << 1;
        /// `x` is an [`Align`] code, not a column.
        const HORALIGNED    = 1 << 2;
        /// `y` is an [`Align`] code, not a row.
        const VERALIGNED    = 1 << 3;
        /// Treat pixels matching the transparent color as transparent.
        const ADDALPHA      = 1 << 4;
        /// Create a new plane as a child of the supplied plane.
        const CHILDPLANE    = 1 << 5;
        /// Resample with nearest neighbor instead of the backend.
        const NOINTERPOLATE = 1 << 6;
    }
}

/// Options for one render call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VisualOptions {
    /// Plane to draw into, or the parent with [`VisualFlags::CHILDPLANE`].
    /// `None` creates a new plane under the standard plane.
    pub plane: Option<PlaneId>,
    pub scaling: Scaling,
    /// Row, or an [`Align`] code with [`VisualFlags::VERALIGNED`].
    pub y: i32,
    /// Column, or an [`Align`] code with [`VisualFlags::HORALIGNED`].
    pub x: i32,
    /// Crop origin row.
    pub begy: u32,
    /// Crop origin column.
    pub begx: u32,
    /// Crop height; 0 runs to the bottom edge.
    pub leny: u32,
    /// Crop width; 0 runs to the right edge.
    pub lenx: u32,
    pub blitter: Blitter,
    pub flags: VisualFlags,
    /// Color treated as transparent with [`VisualFlags::ADDALPHA`].
    pub transcolor: PackedRgba,
}

impl VisualOptions {
    /// Default options: new plane, native size, default blitter.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn plane(mut self, plane: PlaneId) -> Self {
        self.plane = Some(plane);
        self
    }

    #[must_use]
    pub fn scaling(mut self, scaling: Scaling) -> Self {
        self.scaling = scaling;
        self
    }

    #[must_use]
    pub fn blitter(mut self, blitter: Blitter) -> Self {
        self.blitter = blitter;
        self
    }

    /// Place at `(y, x)`.
    #[must_use]
    pub fn at(mut self, y: i32, x: i32) -> Self {
        self.y = y;
        self.x = x;
        self
    }

    /// Align on both axes.
    #[must_use]
    pub fn align(mut self, valign: Align, halign: Align) -> Self {
        self.y = valign as i32;
        self.x = halign as i32;
        self.flags |= VisualFlags::VERALIGNED | VisualFlags::HORALIGNED;
        self
    }

    /// Crop the source to `leny × lenx` at `(begy, begx)`.
    #[must_use]
    pub fn crop(mut self, begy: u32, begx: u32, leny: u32, lenx: u32) -> Self {
        self.begy = begy;
        self.begx = begx;
        self.leny = leny;
        self.lenx = lenx;
        self
    }

    #[must_use]
    pub fn flags(mut self, flags: VisualFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set flags from raw bits; unknown bits are dropped with a warning.
    #[must_use]
    pub fn raw_flags(mut self, bits: u64) -> Self {
        let flags = VisualFlags::from_bits_truncate(bits);
        let unknown = bits & !VisualFlags::all().bits();
        if unknown != 0 {
            warn!(unknown, "ignoring unknown visual flags");
        }
        self.flags = flags;
        self
    }

    /// Treat `color` as transparent (sets [`VisualFlags::ADDALPHA`]).
    #[must_use]
    pub fn transcolor(mut self, color: PackedRgba) -> Self {
        self.transcolor = color;
        self.flags |= VisualFlags::ADDALPHA;
        self
    }
}

/// Where a render lands, as the resolver sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    /// The caller's plane when drawing into it directly; `None` when a new
    /// plane will be created.
    pub plane: Option<Dims>,
    /// Parent of the output plane: the new plane's parent, or the parent of
    /// the caller's plane.
    pub parent: Dims,
    /// Terminal size.
    pub term: Dims,
}

impl Destination {
    /// A new plane under `parent`.
    pub const fn new_plane(parent: Dims, term: Dims) -> Self {
        Self {
            plane: None,
            parent,
            term,
        }
    }

    /// The caller's existing plane of `plane` cells under `parent`.
    pub const fn existing(plane: Dims, parent: Dims, term: Dims) -> Self {
        Self {
            plane: Some(plane),
            parent,
            term,
        }
    }
}

/// Output of [`resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedGeometry {
    pub blitset: BlitSet,
    /// Source pixels read.
    pub source: Window,
    /// Pixels produced after scaling.
    pub display: Dims,
    /// Payload rows for bitmaps (band-rounded); equals `display.rows` for
    /// glyph output.
    pub out_rows: u32,
    /// Cell footprint.
    pub cells: Dims,
    /// New plane: requested coordinates. Existing plane, glyph output: the
    /// offset drawn at. Existing plane, bitmap: the aligned position within
    /// the parent (only meaningful on aligned axes).
    pub y: i32,
    pub x: i32,
    pub valign: Align,
    pub halign: Align,
    /// True when the render creates its own plane.
    pub create_plane: bool,
}

impl ResolvedGeometry {
    /// The parts callers need to size their own planes.
    pub const fn blitter_geometry(&self) -> BlitterGeometry {
        BlitterGeometry {
            pixels: self.display,
            scale_y: self.blitset.rows_per_cell,
            scale_x: self.blitset.cols_per_cell,
            blitter: self.blitset.blitter,
        }
    }
}

/// Blitter and sizes a render would use, without rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlitterGeometry {
    /// Pixels that would be drawn.
    pub pixels: Dims,
    /// Source pixel rows per cell.
    pub scale_y: u32,
    /// Source pixel columns per cell.
    pub scale_x: u32,
    pub blitter: Blitter,
}

fn reject(e: GeometryError) -> GeometryError {
    error!(error = %e, "visual geometry rejected");
    e
}

#[inline]
fn nonneg(v: i32) -> u32 {
    v.max(0) as u32
}

/// Resolve blitter, windows and placement for one render.
pub fn resolve(
    caps: &TerminalCapabilities,
    source: Dims,
    opts: &VisualOptions,
    dest: &Destination,
) -> Result<ResolvedGeometry, GeometryError> {
    let flags = opts.flags;
    if flags.contains(VisualFlags::CHILDPLANE) && opts.plane.is_none() {
        return Err(reject(GeometryError::ChildPlaneWithoutParent));
    }
    let window = crop_window(source, opts)?;
    let blitset = BlitSet::select(
        caps,
        opts.blitter,
        opts.scaling,
        flags.contains(VisualFlags::NODEGRADE),
    )?;

    if blitset.is_pixel()
        && let Some(plane) = dest.plane
    {
        if opts.y != 0 && !flags.contains(VisualFlags::VERALIGNED) {
            return Err(reject(GeometryError::NonOriginPlacement {
                axis: Axis::Vertical,
                value: opts.y,
            }));
        }
        if opts.x != 0 && !flags.contains(VisualFlags::HORALIGNED) {
            return Err(reject(GeometryError::NonOriginPlacement {
                axis: Axis::Horizontal,
                value: opts.x,
            }));
        }
        if opts.scaling.is_none() {
            let cells = caps
                .cell_pixels
                .cells_for(window.dims())
                .unwrap_or_default();
            if !cells.fits_within(plane) {
                return Err(reject(GeometryError::BitmapTooLarge { cells, plane }));
            }
        }
    }

    let valign = alignment(flags.contains(VisualFlags::VERALIGNED), opts.y, Axis::Vertical)?;
    let halign = alignment(flags.contains(VisualFlags::HORALIGNED), opts.x, Axis::Horizontal)?;

    if blitset.is_pixel() {
        resolve_bitmap(caps, blitset, window, opts, dest, valign, halign)
    } else {
        resolve_cells(blitset, window, opts, dest, valign, halign)
    }
}

fn crop_window(source: Dims, opts: &VisualOptions) -> Result<Window, GeometryError> {
    if opts.begy >= source.rows || opts.begx >= source.cols {
        return Err(reject(GeometryError::CropOrigin {
            y: opts.begy,
            x: opts.begx,
            source,
        }));
    }
    let rows = match opts.leny {
        0 => source.rows - opts.begy,
        n => n,
    };
    let cols = match opts.lenx {
        0 => source.cols - opts.begx,
        n => n,
    };
    let window = Window::new(opts.begy, opts.begx, rows, cols);
    if window.is_empty() {
        return Err(reject(GeometryError::ZeroArea));
    }
    if !window.fits_within(source) {
        return Err(reject(GeometryError::CropPastEdge { window, source }));
    }
    Ok(window)
}

fn alignment(aligned: bool, value: i32, axis: Axis) -> Result<Align, GeometryError> {
    if !aligned {
        return Ok(Align::Unaligned);
    }
    Align::try_from(value).map_err(|value| reject(GeometryError::BadAlignment { axis, value }))
}

fn resolve_cells(
    blitset: BlitSet,
    window: Window,
    opts: &VisualOptions,
    dest: &Destination,
    valign: Align,
    halign: Align,
) -> Result<ResolvedGeometry, GeometryError> {
    let (sy, sx) = (blitset.rows_per_cell, blitset.cols_per_cell);
    let len = window.dims();
    let create = dest.plane.is_none();

    let display = if opts.scaling.is_none() {
        len
    } else {
        let avail = dest.plane.unwrap_or(dest.parent);
        let mut rows = avail.rows.saturating_mul(sy);
        let mut cols = avail.cols.saturating_mul(sx);
        if !create {
            if valign == Align::Unaligned {
                rows = rows.saturating_sub(nonneg(opts.y).saturating_mul(sy));
            }
            if halign == Align::Unaligned {
                cols = cols.saturating_sub(nonneg(opts.x).saturating_mul(sx));
            }
        }
        let disp = Dims::new(rows, cols);
        if opts.scaling.is_fit() {
            scale_to_fit(len, disp)
        } else {
            disp
        }
    };
    if display.is_empty() {
        return Err(reject(GeometryError::ZeroArea));
    }

    let cells = Dims::new(display.rows.div_ceil(sy), display.cols.div_ceil(sx));
    let (y, x) = match dest.plane {
        Some(plane) => (
            valign.place(plane.rows, cells.rows).unwrap_or(opts.y),
            halign.place(plane.cols, cells.cols).unwrap_or(opts.x),
        ),
        None => (opts.y, opts.x),
    };
    Ok(ResolvedGeometry {
        blitset,
        source: window,
        display,
        out_rows: display.rows,
        cells,
        y,
        x,
        valign,
        halign,
        create_plane: create,
    })
}

fn resolve_bitmap(
    caps: &TerminalCapabilities,
    blitset: BlitSet,
    window: Window,
    opts: &VisualOptions,
    dest: &Destination,
    valign: Align,
    halign: Align,
) -> Result<ResolvedGeometry, GeometryError> {
    let cp = caps.cell_pixels;
    let len = window.dims();
    let scaling = opts.scaling;
    let fit = |disp: Dims, out: u32| {
        if scaling.is_fit() {
            clamp_to_bitmap_max(caps, scale_to_fit(len, disp), scaling)
        } else {
            (disp, out)
        }
    };

    let (display, out_rows) = match dest.plane {
        None if scaling.is_none() => clamp_to_bitmap_max(caps, len, scaling),
        None => {
            let mut rows = dest.parent.rows.min(dest.term.rows);
            let mut cols = dest.parent.cols;
            if valign == Align::Unaligned {
                rows = rows.saturating_sub(nonneg(opts.y));
            }
            if halign == Align::Unaligned {
                cols = cols.saturating_sub(nonneg(opts.x));
            }
            let (disp, out) = clamp_to_bitmap_max(caps, cp.pixels_for(Dims::new(rows, cols)), scaling);
            fit(disp, out)
        }
        Some(plane) => {
            let (mut disp, mut out) = if scaling.is_none() {
                clamp_to_bitmap_max(caps, len, scaling)
            } else {
                let (disp, out) = clamp_to_bitmap_max(caps, cp.pixels_for(plane), scaling);
                fit(disp, out)
            };
            let band = caps.pixel_protocol.band_height().max(1);
            while out.div_ceil(cp.height) > plane.rows && out > band {
                out -= band;
            }
            disp.rows = disp.rows.min(out);
            (disp, out)
        }
    };
    if display.is_empty() || out_rows == 0 {
        return Err(reject(GeometryError::ZeroArea));
    }

    let cells = Dims::new(out_rows.div_ceil(cp.height), display.cols.div_ceil(cp.width));
    let (y, x) = match dest.plane {
        Some(_) => (
            bitmap_align_offset(valign, Axis::Vertical, dest.parent.rows, cp.height, out_rows)?
                .unwrap_or(opts.y),
            bitmap_align_offset(halign, Axis::Horizontal, dest.parent.cols, cp.width, display.cols)?
                .unwrap_or(opts.x),
        ),
        None => (opts.y, opts.x),
    };
    Ok(ResolvedGeometry {
        blitset,
        source: window,
        display,
        out_rows,
        cells,
        y,
        x,
        valign,
        halign,
        create_plane: dest.plane.is_none(),
    })
}

/// Scale `src` to the largest size inside `disp` with the same aspect ratio.
///
/// Scales up as well as down. The result is truncated, so it never exceeds
/// `disp` on either axis.
pub fn scale_to_fit(src: Dims, disp: Dims) -> Dims {
    if src.is_empty() {
        return Dims::default();
    }
    let (rows, cols) = (f64::from(src.rows), f64::from(src.cols));
    let xratio = f64::from(disp.cols) / cols;
    let ratio = if xratio * rows > f64::from(disp.rows) {
        f64::from(disp.rows) / rows
    } else {
        xratio
    };
    Dims::new((ratio * rows) as u32, (ratio * cols) as u32)
}

/// Clamp a bitmap to the terminal's maximum and round its height to the
/// protocol band.
///
/// Returns the clamped display size and the payload height. The payload
/// height is the display height rounded up to a whole band, stepped back a
/// band at a time while it exceeds the maximum. The display height takes the
/// payload height when stretching, or when rounding had to cut below it.
pub fn clamp_to_bitmap_max(caps: &TerminalCapabilities, disp: Dims, scaling: Scaling) -> (Dims, u32) {
    let band = caps.pixel_protocol.band_height().max(1);
    let max = caps.max_bitmap.unwrap_or(Dims::new(u32::MAX, u32::MAX));
    let mut disp = Dims::new(disp.rows.min(max.rows.max(1)), disp.cols.min(max.cols.max(1)));
    if disp.rows % band == 0 {
        return (disp, disp.rows);
    }
    let mut out = disp
        .rows
        .checked_next_multiple_of(band)
        .unwrap_or(disp.rows - disp.rows % band);
    while out > max.rows && out > band {
        out -= band;
    }
    if scaling == Scaling::Stretch || disp.rows > out {
        disp.rows = out;
    }
    (disp, out)
}

/// Cell offset of an aligned bitmap of `disp_px` pixels inside `parent_cells`.
///
/// `Ok(None)` when the axis is unaligned. A bitmap wider than its parent
/// cannot be centered or right-aligned.
pub fn bitmap_align_offset(
    align: Align,
    axis: Axis,
    parent_cells: u32,
    cell_px: u32,
    disp_px: u32,
) -> Result<Option<i32>, GeometryError> {
    let cell_px = i64::from(cell_px.max(1));
    let avail = i64::from(parent_cells) * cell_px;
    let slack = avail - i64::from(disp_px);
    let off = match align {
        Align::Unaligned => return Ok(None),
        Align::Left => 0,
        Align::Center => slack / 2 / cell_px,
        Align::Right => slack / cell_px,
    };
    if off < 0 {
        return Err(reject(GeometryError::AlignOverflow {
            axis,
            len: disp_px,
            avail: avail.clamp(0, i64::from(u32::MAX)) as u32,
        }));
    }
    Ok(Some(off as i32))
}
