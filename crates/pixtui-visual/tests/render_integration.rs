//! End-to-end render scenarios through `VisualContext`.

use pixtui_core::geometry::{Dims, Window};
use pixtui_core::terminal_capabilities::{PixelProtocol, TerminalCapabilities};
use pixtui_render::cell::PackedRgba;
use pixtui_render::plane::{Align, Pile, PlaneOptions};
use pixtui_visual::emit::{EncodedBitmap, PixelEmitter};
use pixtui_visual::error::{GeometryError, SprixelError, VisualError};
use pixtui_visual::geometry::{Destination, resolve};
use pixtui_visual::pixels::PixelBuffer;
use pixtui_visual::sprixel::{Bitmap, SprixelState};
use pixtui_visual::tam::CellState;
use pixtui_visual::{Blitter, Scaling, Visual, VisualContext, VisualFlags, VisualOptions};

fn solid(rows: u32, cols: u32, px: [u8; 4]) -> Visual {
    let data: Vec<u8> = std::iter::repeat_n(px, (rows * cols) as usize)
        .flatten()
        .collect();
    Visual::from_rgba(&data, rows, cols, cols as usize * 4).unwrap()
}

fn kitty() -> VisualContext {
    VisualContext::new(Pile::new(24, 80), TerminalCapabilities::kitty())
}

/// Pixel emitter that always fails.
struct BrokenEmitter;

impl PixelEmitter for BrokenEmitter {
    fn encode(
        &self,
        _raster: &PixelBuffer,
        _out_rows: u32,
        _cp: pixtui_core::geometry::CellPixels,
        _cells: Dims,
        _transcolor: Option<PackedRgba>,
    ) -> Result<EncodedBitmap, VisualError> {
        Err(VisualError::Emit("broken".into()))
    }
}

/// Pixel emitter whose bitmap never matches the requested cells.
struct OneCellEmitter;

impl PixelEmitter for OneCellEmitter {
    fn encode(
        &self,
        _raster: &PixelBuffer,
        _out_rows: u32,
        _cp: pixtui_core::geometry::CellPixels,
        _cells: Dims,
        _transcolor: Option<PackedRgba>,
    ) -> Result<EncodedBitmap, VisualError> {
        Ok(EncodedBitmap {
            bitmap: Bitmap::new(vec![255; 4], Dims::new(1, 1)),
            states: vec![CellState::Opaque],
        })
    }
}

// ── Resolver scenario ───────────────────────────────────────────────────

#[test]
fn crop_under_none_scaling_keeps_size() {
    let caps = TerminalCapabilities::modern();
    let term = Dims::new(24, 80);
    let dest = Destination::new_plane(term, term);
    let opts = VisualOptions::new().blitter(Blitter::Half).crop(10, 0, 20, 0);
    let g = resolve(&caps, Dims::new(40, 40), &opts, &dest).unwrap();
    assert_eq!(g.source, Window::new(10, 0, 20, 40));
    assert_eq!(g.display, Dims::new(20, 40));
    assert_eq!(g.cells, Dims::new(10, 40));

    let opts = VisualOptions::new().crop(41, 0, 0, 0);
    assert!(matches!(
        resolve(&caps, Dims::new(40, 40), &opts, &dest),
        Err(GeometryError::CropOrigin { y: 41, .. })
    ));
}

// ── Cell path ───────────────────────────────────────────────────────────

#[test]
fn cell_render_draws_cropped_window() {
    let mut ctx = VisualContext::new(Pile::new(24, 80), TerminalCapabilities::modern());
    let v = solid(40, 40, [0, 128, 255, 255]);
    let opts = VisualOptions::new().blitter(Blitter::Half).crop(10, 0, 20, 0);
    let plane = ctx.render(&v, &opts).unwrap();
    let p = ctx.pile().get(plane).unwrap();
    assert_eq!(p.dims(), Dims::new(10, 40));
    assert!(
        p.cells()
            .iter()
            .all(|c| c.ch == ' ' && c.bg == PackedRgba::rgb(0, 128, 255))
    );
}

#[test]
fn cell_render_into_existing_plane_at_offset() {
    let mut ctx = VisualContext::new(Pile::new(24, 80), TerminalCapabilities::modern());
    let std = ctx.pile().std_plane();
    let plane = ctx
        .pile_mut()
        .create(std, &PlaneOptions::new(0, 0, 4, 4))
        .unwrap();
    let v = solid(2, 2, [255, 255, 255, 255]);
    let opts = VisualOptions::new()
        .plane(plane)
        .blitter(Blitter::Half)
        .at(1, 2);
    assert_eq!(ctx.render(&v, &opts).unwrap(), plane);
    let p = ctx.pile().get(plane).unwrap();
    assert!(p.get(0, 0).unwrap().is_blank());
    assert!(!p.get(1, 2).unwrap().is_blank());
    assert!(!p.get(1, 3).unwrap().is_blank());
    assert!(p.get(2, 2).unwrap().is_blank());
}

#[test]
fn aligned_cell_render_centers_new_plane() {
    let mut ctx = VisualContext::new(Pile::new(24, 80), TerminalCapabilities::modern());
    let v = solid(4, 10, [1, 1, 1, 255]);
    let opts = VisualOptions::new()
        .blitter(Blitter::Half)
        .align(Align::Center, Align::Center);
    let plane = ctx.render(&v, &opts).unwrap();
    let p = ctx.pile().get(plane).unwrap();
    assert_eq!(p.dims(), Dims::new(2, 10));
    assert_eq!(p.yx(), (11, 35));
}

#[test]
fn fit_scaling_resamples_without_interpolation() {
    let mut ctx = VisualContext::new(Pile::new(10, 10), TerminalCapabilities::modern());
    let v = solid(4, 4, [9, 9, 9, 255]);
    let opts = VisualOptions::new()
        .blitter(Blitter::Half)
        .scaling(Scaling::Fit)
        .flags(VisualFlags::NOINTERPOLATE);
    let plane = ctx.render(&v, &opts).unwrap();
    // 10×10 cells of half blocks hold 20×10 pixels; a square fits 10×10.
    assert_eq!(ctx.pile().dims(plane).unwrap(), Dims::new(5, 10));
}

#[test]
fn transparent_color_is_not_drawn() {
    let mut ctx = VisualContext::new(Pile::new(24, 80), TerminalCapabilities::modern());
    let v = solid(2, 2, [0, 255, 0, 255]);
    let opts = VisualOptions::new()
        .blitter(Blitter::Half)
        .transcolor(PackedRgba::rgb(0, 255, 0));
    let plane = ctx.render(&v, &opts).unwrap();
    assert!(ctx.pile().get(plane).unwrap().cells().iter().all(|c| c.is_blank()));
}

// ── Bitmap path ─────────────────────────────────────────────────────────

#[test]
fn bitmap_render_loads_piled_sprixel() {
    let mut ctx = kitty();
    let v = solid(30, 25, [200, 10, 10, 255]);
    let plane = ctx
        .render(&v, &VisualOptions::new().blitter(Blitter::Pixel).at(3, 4))
        .unwrap();
    let p = ctx.pile().get(plane).unwrap();
    assert_eq!(p.dims(), Dims::new(2, 3));
    assert_eq!(p.yx(), (3, 4));
    let h = ctx.sprixel_for(plane).unwrap();
    let s = ctx.sprixels().get(h).unwrap();
    assert!(s.is_piled());
    assert_eq!(s.pixels(), Dims::new(30, 25));
    assert_eq!(s.state(), SprixelState::Invalidated);
    // The right column of cells is half covered, the bottom row too.
    assert_eq!(s.tam().state(0, 0), Some(CellState::Opaque));
    assert_eq!(s.tam().state(0, 2), Some(CellState::Mixed));
    assert_eq!(s.tam().state(1, 0), Some(CellState::Mixed));
}

#[test]
fn bitmap_onto_standard_plane_is_refused() {
    let mut ctx = kitty();
    let std = ctx.pile().std_plane();
    let err = ctx
        .render(
            &solid(20, 10, [1, 2, 3, 255]),
            &VisualOptions::new().plane(std).blitter(Blitter::Pixel),
        )
        .unwrap_err();
    assert!(matches!(err, VisualError::StandardPlane));
}

#[test]
fn child_plane_under_std_is_allowed() {
    let mut ctx = kitty();
    let std = ctx.pile().std_plane();
    let opts = VisualOptions::new()
        .plane(std)
        .blitter(Blitter::Pixel)
        .flags(VisualFlags::CHILDPLANE);
    let plane = ctx.render(&solid(20, 10, [1, 2, 3, 255]), &opts).unwrap();
    assert_ne!(plane, std);
    assert_eq!(ctx.pile().get(plane).unwrap().parent(), Some(std));
}

#[test]
fn failed_bitmap_render_destroys_created_plane() {
    let mut ctx = kitty().with_pixel_emitter(Box::new(BrokenEmitter));
    let err = ctx
        .render(&solid(20, 10, [1, 2, 3, 255]), &VisualOptions::new().blitter(Blitter::Pixel))
        .unwrap_err();
    assert!(matches!(err, VisualError::Emit(_)));
    assert_eq!(ctx.pile().len(), 1);
    assert!(ctx.sprixels().is_empty());
}

#[test]
fn failed_render_keeps_caller_plane() {
    let mut ctx = kitty().with_pixel_emitter(Box::new(BrokenEmitter));
    let std = ctx.pile().std_plane();
    let plane = ctx
        .pile_mut()
        .create(std, &PlaneOptions::new(0, 0, 1, 1))
        .unwrap();
    let opts = VisualOptions::new().plane(plane).blitter(Blitter::Pixel);
    assert!(ctx.render(&solid(20, 10, [1, 2, 3, 255]), &opts).is_err());
    assert!(ctx.pile().contains(plane));
}

#[test]
fn failed_rerender_keeps_existing_bitmap() {
    let mut ctx = kitty();
    let v = solid(40, 20, [5, 5, 5, 255]);
    let plane = ctx
        .render(&v, &VisualOptions::new().blitter(Blitter::Pixel))
        .unwrap();
    let first = ctx.sprixel_for(plane).unwrap();

    let mut ctx = ctx.with_pixel_emitter(Box::new(OneCellEmitter));
    let err = ctx
        .render(&v, &VisualOptions::new().plane(plane).blitter(Blitter::Pixel))
        .unwrap_err();
    assert!(matches!(
        err,
        VisualError::Sprixel(SprixelError::InconsistentGeometry { .. })
    ));
    assert_eq!(ctx.sprixel_for(plane), Some(first));
    assert_eq!(
        ctx.sprixels().get(first).map(|s| s.state()),
        Some(SprixelState::Invalidated)
    );
    assert_eq!(ctx.sprixels().len(), 1);
    assert_eq!(ctx.pile().dims(plane).unwrap(), Dims::new(2, 2));
}

#[test]
fn sixel_rerender_updates_in_place() {
    let mut ctx = VisualContext::new(Pile::new(24, 80), TerminalCapabilities::sixel());
    let v = solid(40, 20, [5, 5, 5, 255]);
    let plane = ctx
        .render(&v, &VisualOptions::new().blitter(Blitter::Pixel))
        .unwrap();
    let first = ctx.sprixel_for(plane).unwrap();
    ctx.render(&v, &VisualOptions::new().plane(plane).blitter(Blitter::Pixel))
        .unwrap();
    assert_eq!(ctx.sprixel_for(plane), Some(first));
    assert_eq!(ctx.protocol().map(|p| p.kind()), Some(PixelProtocol::Sixel));
}

#[test]
fn glyph_terminal_degrades_pixel_requests() {
    let mut ctx = VisualContext::new(Pile::new(24, 80), TerminalCapabilities::modern());
    let v = solid(6, 4, [7, 7, 7, 255]);
    let plane = ctx
        .render(&v, &VisualOptions::new().blitter(Blitter::Pixel))
        .unwrap();
    assert!(ctx.sprixel_for(plane).is_none());
    // Sextants: 3×2 pixels per cell.
    assert_eq!(ctx.pile().dims(plane).unwrap(), Dims::new(2, 2));

    let err = ctx
        .render(
            &v,
            &VisualOptions::new()
                .blitter(Blitter::Pixel)
                .flags(VisualFlags::NODEGRADE),
        )
        .unwrap_err();
    assert!(matches!(err, VisualError::Geometry(GeometryError::NoBlitter { .. })));
}
