#![forbid(unsafe_code)]

//! Raster transforms on a visual's frame.
//!
//! - [`bounding_box`]: smallest rectangle holding every non-zero pixel.
//! - [`rotate`]: nearest-neighbor rotation about the canvas center, cropped to
//!   the rotated content.
//! - [`polyfill`]: 4-connected flood fill with an explicit work stack.
//! - [`resize`] / [`resize_noninterpolative`] / [`inflate`]: resampling.
//!
//! A pixel is "content" when any of its four bytes is non-zero, so a fully
//! transparent black pixel is empty but a transparent colored one is not.
//! Operations that replace the frame release the old one on every path and
//! leave the visual untouched on failure.

use pixtui_render::cell::PackedRgba;

use crate::backend::VisualBackend;
use crate::error::{GeometryError, VisualError};
use crate::pixels::PixelBuffer;
use crate::visual::Visual;

/// Content rectangle of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BoundingBox {
    pub rows: u32,
    pub cols: u32,
    /// First content row.
    pub off_y: u32,
    /// First content column.
    pub off_x: u32,
}

impl BoundingBox {
    #[inline]
    pub const fn area(&self) -> u64 {
        self.rows as u64 * self.cols as u64
    }
}

#[inline]
fn is_content(frame: &PixelBuffer, y: u32, x: u32) -> bool {
    frame.pixel(y, x).is_some_and(|px| px != [0; 4])
}

/// Find the content rectangle.
///
/// Scans top-down for the first content row (taking its leftmost and
/// rightmost content columns), then bottom-up for the last content row
/// (widening the columns), then only the columns outside the known span on
/// the rows in between. An empty raster yields an all-zero box.
pub fn bounding_box(frame: &PixelBuffer) -> BoundingBox {
    let (rows, cols) = (frame.rows(), frame.cols());

    let mut top = None;
    'rows: for y in 0..rows {
        for x in 0..cols {
            if is_content(frame, y, x) {
                let right = (x..cols).rev().find(|&rx| is_content(frame, y, rx)).unwrap_or(x);
                top = Some((y, x, right));
                break 'rows;
            }
        }
    }
    let Some((top, mut left, mut right)) = top else {
        return BoundingBox::default();
    };

    let mut bottom = top;
    for y in (top + 1..rows).rev() {
        if let Some(x) = (0..cols).find(|&x| is_content(frame, y, x)) {
            left = left.min(x);
            if let Some(rx) = (right + 1..cols).rev().find(|&rx| is_content(frame, y, rx)) {
                right = rx;
            }
            bottom = y;
            break;
        }
    }

    for y in top + 1..bottom {
        if let Some(x) = (0..left).find(|&x| is_content(frame, y, x)) {
            left = x;
        }
        if let Some(x) = (right + 1..cols).rev().find(|&x| is_content(frame, y, x)) {
            right = x;
        }
    }

    BoundingBox {
        rows: bottom - top + 1,
        cols: right - left + 1,
        off_y: top,
        off_x: left,
    }
}

/// Center of an extent of `len` pixels.
///
/// Even extents take the top/left of the two middle pixels.
#[inline]
pub const fn center(len: u32) -> i64 {
    (len as i64 - 1) / 2
}

/// Rotate `(y, x)` about `(cy, cx)`; the result is relative to the center.
#[inline]
pub fn rotate_point(y: i64, x: i64, sin: f64, cos: f64, cy: i64, cx: i64) -> (i64, i64) {
    let (dy, dx) = ((y - cy) as f64, (x - cx) as f64);
    let rx = (dx * cos - dy * sin).round() as i64;
    let ry = (dx * sin + dy * cos).round() as i64;
    (ry, rx)
}

/// A rectangle in center-relative coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Extent {
    top: i64,
    left: i64,
    rows: i64,
    cols: i64,
}

/// Rotate the corners of `bb` and take their enclosing rectangle.
fn rotate_bounding_box(bb: &BoundingBox, sin: f64, cos: f64, cy: i64, cx: i64) -> Extent {
    let (t, l) = (i64::from(bb.off_y), i64::from(bb.off_x));
    let (b, r) = (t + i64::from(bb.rows) - 1, l + i64::from(bb.cols) - 1);
    let corners = [(t, l), (t, r), (b, l), (b, r)].map(|(y, x)| rotate_point(y, x, sin, cos, cy, cx));
    let (mut top, mut left, mut bottom, mut right) = (i64::MAX, i64::MAX, i64::MIN, i64::MIN);
    for (y, x) in corners {
        top = top.min(y);
        bottom = bottom.max(y);
        left = left.min(x);
        right = right.max(x);
    }
    Extent {
        top,
        left,
        rows: bottom - top + 1,
        cols: right - left + 1,
    }
}

/// Rotate the visual by `rads` radians.
///
/// Every content pixel of the canvas is mapped about the canvas center into
/// a new frame sized to the rotated content box. The mapping is
/// nearest-neighbor and forward-only, so non-quarter turns leave gaps. Empty
/// pixels are not mapped; the new frame starts empty and they would only
/// overwrite content landing on the same target.
pub fn rotate(visual: &mut Visual, rads: f64, backend: &dyn VisualBackend) -> Result<(), VisualError> {
    backend.ensure_rgba(visual)?;
    let (sin, cos) = (-rads).sin_cos();
    let frame = visual.frame();
    let bb = bounding_box(frame);
    if bb.area() == 0 {
        return Err(GeometryError::ZeroArea.into());
    }
    let (cy, cx) = (center(frame.rows()), center(frame.cols()));
    let ext = rotate_bounding_box(&bb, sin, cos, cy, cx);
    let (Ok(rows), Ok(cols)) = (u32::try_from(ext.rows), u32::try_from(ext.cols)) else {
        return Err(GeometryError::ZeroArea.into());
    };
    if rows == 0 || cols == 0 {
        return Err(GeometryError::ZeroArea.into());
    }

    let mut out = PixelBuffer::tight(rows, cols);
    for y in 0..frame.rows() {
        for x in 0..frame.cols() {
            let (ty, tx) = rotate_point(i64::from(y), i64::from(x), sin, cos, cy, cx);
            let (dy, dx) = (ty - ext.top, tx - ext.left);
            if (0..ext.rows).contains(&dy)
                && (0..ext.cols).contains(&dx)
                && let Some(px) = frame.pixel(y, x)
                && px != [0; 4]
            {
                out.set_pixel(dy as u32, dx as u32, px);
            }
        }
    }
    visual.replace_frame(out);
    backend.seed(visual);
    Ok(())
}

/// Flood fill the 4-connected region containing `(y, x)` with `color`.
///
/// Returns the number of pixels changed; zero when the region already has
/// the fill color.
pub fn polyfill(visual: &mut Visual, y: u32, x: u32, color: PackedRgba) -> Result<usize, VisualError> {
    let dims = visual.dims();
    let frame = visual.frame_mut();
    let target = frame
        .pixel(y, x)
        .ok_or(VisualError::OutOfBounds { y, x, dims })?;
    let fill = color.to_bytes();
    if target == fill {
        return Ok(0);
    }

    let mut changed = 0;
    let mut stack = vec![(y, x)];
    while let Some((y, x)) = stack.pop() {
        if frame.pixel(y, x) != Some(target) {
            continue;
        }
        frame.set_pixel(y, x, fill);
        changed += 1;
        if y > 0 {
            stack.push((y - 1, x));
        }
        if y + 1 < dims.rows {
            stack.push((y + 1, x));
        }
        if x > 0 {
            stack.push((y, x - 1));
        }
        if x + 1 < dims.cols {
            stack.push((y, x + 1));
        }
    }
    Ok(changed)
}

/// Nearest-neighbor resample of `frame` to `rows × cols`.
pub fn resample_nearest(frame: &PixelBuffer, rows: u32, cols: u32) -> PixelBuffer {
    let mut out = PixelBuffer::new(rows, cols);
    if frame.dims().is_empty() {
        return out;
    }
    for y in 0..rows {
        let sy = (u64::from(y) * u64::from(frame.rows()) / u64::from(rows)) as u32;
        for x in 0..cols {
            let sx = (u64::from(x) * u64::from(frame.cols()) / u64::from(cols)) as u32;
            if let Some(px) = frame.pixel(sy, sx) {
                out.set_pixel(y, x, px);
            }
        }
    }
    out
}

/// Resize through `backend`; a no-op when the size already matches.
pub fn resize(visual: &mut Visual, rows: u32, cols: u32, backend: &dyn VisualBackend) -> Result<(), VisualError> {
    if rows == 0 || cols == 0 {
        return Err(GeometryError::ZeroArea.into());
    }
    if visual.rows() == rows && visual.cols() == cols {
        return Ok(());
    }
    let out = backend.resize(visual.frame(), rows, cols)?;
    visual.replace_frame(out);
    backend.seed(visual);
    Ok(())
}

/// Nearest-neighbor resize that bypasses the backend.
pub fn resize_noninterpolative(visual: &mut Visual, rows: u32, cols: u32) -> Result<(), VisualError> {
    if rows == 0 || cols == 0 {
        return Err(GeometryError::ZeroArea.into());
    }
    if visual.rows() == rows && visual.cols() == cols {
        return Ok(());
    }
    let out = resample_nearest(visual.frame(), rows, cols);
    visual.replace_frame(out);
    Ok(())
}

/// Enlarge by an integer factor, repeating each pixel `scale × scale` times.
pub fn inflate(visual: &mut Visual, scale: u32) -> Result<(), VisualError> {
    if scale == 0 {
        return Err(VisualError::InvalidScale(scale));
    }
    let (Some(rows), Some(cols)) = (
        visual.rows().checked_mul(scale),
        visual.cols().checked_mul(scale),
    ) else {
        return Err(VisualError::InvalidScale(scale));
    };
    resize_noninterpolative(visual, rows, cols)
}
