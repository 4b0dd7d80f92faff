#![forbid(unsafe_code)]

//! Render orchestration.
//!
//! [`VisualContext`] owns the pile, the sprixel store and the collaborators a
//! render needs, and [`VisualContext::render`] runs one call:
//!
//! ```text
//!   resolve ──► pixel blitter? ──no──► cell path:   create/reuse plane, emit glyphs
//!                     │
//!                    yes ──► std plane? ──► StandardPlane
//!                     │
//!                     └────► bitmap path: create/reuse plane, encode,
//!                                         alloc/recycle sprixel, load
//! ```
//!
//! A failed render destroys any plane it created and hides any sprixel it
//! allocated. Planes supplied by the caller are never destroyed.

use std::io::{self, Write};
use std::path::Path;

use pixtui_core::geometry::Window;
use pixtui_core::logging::SpanExt;
use pixtui_core::terminal_capabilities::TerminalCapabilities;
use pixtui_core::{debug, warn};
use pixtui_render::plane::{Align, Pile, PlaneError, PlaneId, PlaneOptions};

use crate::backend::{DecodeStatus, VisualBackend, default_backend};
use crate::emit::{CellEmitter, EmitOptions, GlyphEmitter, PixelEmitter, StagedRgbaEmitter};
use crate::error::{ProtocolError, SprixelError, VisualError};
use crate::geometry::{BlitterGeometry, Destination, ResolvedGeometry, VisualFlags, VisualOptions, resolve};
use crate::pixels::PixelBuffer;
use crate::protocol::{self, BitmapProtocol};
use crate::sprixel::{SprixelHandle, SprixelStore, WipeOutcome};
use crate::tam::CellState;
use crate::transform;
use crate::visual::Visual;

/// A caller plane's absolute origin and, when aligned, its new position.
#[derive(Debug, Clone, Copy)]
struct Placement {
    from: (i32, i32),
    to: Option<(i32, i32)>,
}

/// Everything a render call touches.
pub struct VisualContext {
    pile: Pile,
    sprixels: SprixelStore,
    caps: TerminalCapabilities,
    backend: Box<dyn VisualBackend>,
    protocol: Option<Box<dyn BitmapProtocol>>,
    cell_emitter: Box<dyn CellEmitter>,
    pixel_emitter: Box<dyn PixelEmitter>,
}

impl std::fmt::Debug for VisualContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualContext")
            .field("pile", &self.pile)
            .field("sprixels", &self.sprixels.len())
            .field("caps", &self.caps)
            .field("backend", &self.backend.name())
            .field("protocol", &self.protocol.as_ref().map(|p| p.kind()))
            .finish_non_exhaustive()
    }
}

impl VisualContext {
    /// Context with the default backend and the protocol `caps` advertises.
    pub fn new(pile: Pile, caps: TerminalCapabilities) -> Self {
        Self {
            pile,
            sprixels: SprixelStore::new(),
            protocol: protocol::for_protocol(caps.pixel_protocol),
            caps,
            backend: default_backend(),
            cell_emitter: Box::new(GlyphEmitter),
            pixel_emitter: Box::new(StagedRgbaEmitter),
        }
    }

    #[must_use]
    pub fn with_backend(mut self, backend: Box<dyn VisualBackend>) -> Self {
        self.backend = backend;
        self
    }

    #[must_use]
    pub fn with_protocol(mut self, protocol: Option<Box<dyn BitmapProtocol>>) -> Self {
        self.protocol = protocol;
        self
    }

    #[must_use]
    pub fn with_cell_emitter(mut self, emitter: Box<dyn CellEmitter>) -> Self {
        self.cell_emitter = emitter;
        self
    }

    #[must_use]
    pub fn with_pixel_emitter(mut self, emitter: Box<dyn PixelEmitter>) -> Self {
        self.pixel_emitter = emitter;
        self
    }

    pub fn pile(&self) -> &Pile {
        &self.pile
    }

    pub fn pile_mut(&mut self) -> &mut Pile {
        &mut self.pile
    }

    pub fn sprixels(&self) -> &SprixelStore {
        &self.sprixels
    }

    pub fn sprixels_mut(&mut self) -> &mut SprixelStore {
        &mut self.sprixels
    }

    pub fn caps(&self) -> &TerminalCapabilities {
        &self.caps
    }

    pub fn backend(&self) -> &dyn VisualBackend {
        self.backend.as_ref()
    }

    pub fn protocol(&self) -> Option<&dyn BitmapProtocol> {
        self.protocol.as_deref()
    }

    /// Sprixel bound to `plane`, if any.
    pub fn sprixel_for(&self, plane: PlaneId) -> Option<SprixelHandle> {
        self.sprixels.for_plane(plane)
    }

    fn destination(&self, opts: &VisualOptions) -> Result<Destination, VisualError> {
        let term = self.pile.term_dims();
        let Some(plane) = opts.plane else {
            return Ok(Destination::new_plane(self.pile.dims(self.pile.std_plane())?, term));
        };
        let dims = self.pile.dims(plane)?;
        if opts.flags.contains(VisualFlags::CHILDPLANE) {
            return Ok(Destination::new_plane(dims, term));
        }
        let parent = match self.pile.get(plane).and_then(|p| p.parent()) {
            Some(parent) => self.pile.dims(parent)?,
            None => term,
        };
        Ok(Destination::existing(dims, parent, term))
    }

    fn geometry(&self, visual: &Visual, opts: &VisualOptions) -> Result<ResolvedGeometry, VisualError> {
        let dest = self.destination(opts)?;
        Ok(resolve(&self.caps, visual.dims(), opts, &dest)?)
    }

    /// Blitter and pixel size `render` would use, without drawing.
    pub fn blitter_geometry(&self, visual: &Visual, opts: &VisualOptions) -> Result<BlitterGeometry, VisualError> {
        Ok(self.geometry(visual, opts)?.blitter_geometry())
    }

    /// Draw `visual`, returning the plane it landed on.
    pub fn render(&mut self, visual: &Visual, opts: &VisualOptions) -> Result<PlaneId, VisualError> {
        let _span =
            pixtui_core::debug_span!("visual_render", rows = visual.rows(), cols = visual.cols())
                .entered_or_noop();
        let geom = self.geometry(visual, opts)?;
        if geom.blitset.is_pixel() {
            if let Some(plane) = opts.plane
                && !opts.flags.contains(VisualFlags::CHILDPLANE)
                && self.pile.is_std(plane)
            {
                warn!("bitmap render onto the standard plane");
                return Err(VisualError::StandardPlane);
            }
            debug!(blitter = geom.blitset.blitter.name(), create = geom.create_plane, "bitmap path");
            self.render_bitmap(visual, opts, &geom)
        } else {
            debug!(blitter = geom.blitset.blitter.name(), create = geom.create_plane, "cell path");
            self.render_cells(visual, opts, &geom)
        }
    }

    /// Output plane: a new child sized to the footprint, or the caller's.
    fn target_plane(
        &mut self,
        opts: &VisualOptions,
        geom: &ResolvedGeometry,
    ) -> Result<(PlaneId, bool), VisualError> {
        if !geom.create_plane
            && let Some(plane) = opts.plane
        {
            return Ok((plane, false));
        }
        let parent = opts.plane.unwrap_or(self.pile.std_plane());
        let popts = PlaneOptions::new(geom.y, geom.x, geom.cells.rows, geom.cells.cols)
            .valign(geom.valign)
            .halign(geom.halign);
        let plane = self
            .pile
            .create(parent, &popts)
            .map_err(VisualError::PlaneCreate)?;
        Ok((plane, true))
    }

    /// Crop the source window and bring it to the display size.
    ///
    /// Native-size renders crop when clamping shrank the display; the other
    /// policies resample, through the backend unless `NOINTERPOLATE` is set.
    fn prepare_raster(
        &self,
        visual: &Visual,
        opts: &VisualOptions,
        geom: &ResolvedGeometry,
    ) -> Result<PixelBuffer, VisualError> {
        let (src, disp) = (geom.source, geom.display);
        if opts.scaling.is_none() {
            let window = Window::new(src.y, src.x, src.rows.min(disp.rows), src.cols.min(disp.cols));
            return Ok(visual.frame().crop(window));
        }
        let cropped = visual.frame().crop(src);
        if cropped.dims() == disp {
            return Ok(cropped);
        }
        if opts.flags.contains(VisualFlags::NOINTERPOLATE) {
            return Ok(transform::resample_nearest(&cropped, disp.rows, disp.cols));
        }
        Ok(self.backend.resize(&cropped, disp.rows, disp.cols)?)
    }

    fn render_cells(
        &mut self,
        visual: &Visual,
        opts: &VisualOptions,
        geom: &ResolvedGeometry,
    ) -> Result<PlaneId, VisualError> {
        let raster = self.prepare_raster(visual, opts, geom)?;
        let (plane, created) = self.target_plane(opts, geom)?;
        let at = if created { (0, 0) } else { (geom.y, geom.x) };
        let emit_opts = EmitOptions {
            blend: opts.flags.contains(VisualFlags::BLEND),
            transcolor: opts.flags.contains(VisualFlags::ADDALPHA).then_some(opts.transcolor),
        };
        let written = match self.pile.get_mut(plane) {
            Some(p) => self.cell_emitter.emit(p, &geom.blitset, &raster, at, &emit_opts),
            None => Err(VisualError::Plane(PlaneError::Stale(plane))),
        };
        match written {
            Ok(_n) => {
                debug!(cells = _n, "glyphs emitted");
                Ok(plane)
            }
            Err(e) => {
                if created {
                    self.discard_plane(plane);
                }
                Err(e)
            }
        }
    }

    fn render_bitmap(
        &mut self,
        visual: &Visual,
        opts: &VisualOptions,
        geom: &ResolvedGeometry,
    ) -> Result<PlaneId, VisualError> {
        if self.protocol.is_none() {
            return Err(ProtocolError::Unsupported("pixel graphics").into());
        }
        let raster = self.prepare_raster(visual, opts, geom)?;
        let (plane, created) = self.target_plane(opts, geom)?;
        let mut fresh = None;
        match self.attach_bitmap(&raster, opts, geom, plane, created, &mut fresh) {
            Ok(()) => Ok(plane),
            Err(e) => {
                if let Some(h) = fresh
                    && self.sprixels.hide(&self.pile, h).is_err()
                {
                    warn!("could not hide sprixel after failed render");
                }
                if created {
                    self.discard_plane(plane);
                }
                Err(e)
            }
        }
    }

    /// Encode, bind and load a bitmap on `plane`.
    ///
    /// `fresh` receives any sprixel allocated here, for cleanup on failure.
    /// Everything that can fail is checked before the plane's current
    /// sprixel is hidden or recycled.
    fn attach_bitmap(
        &mut self,
        raster: &PixelBuffer,
        opts: &VisualOptions,
        geom: &ResolvedGeometry,
        plane: PlaneId,
        created: bool,
        fresh: &mut Option<SprixelHandle>,
    ) -> Result<(), VisualError> {
        let protocol = self
            .protocol
            .as_deref()
            .ok_or(ProtocolError::Unsupported("pixel graphics"))?;
        let cp = self.caps.cell_pixels;
        let transcolor = opts.flags.contains(VisualFlags::ADDALPHA).then_some(opts.transcolor);
        let encoded = self
            .pixel_emitter
            .encode(raster, geom.out_rows, cp, geom.cells, transcolor)?;
        let piled = self.pile.is_managed();
        let pixels = encoded.bitmap.pixels();
        if piled && cp.cells_for(pixels) != Some(geom.cells) {
            return Err(SprixelError::InconsistentGeometry {
                pixels,
                cells: geom.cells,
                cell_pixels: cp,
            }
            .into());
        }
        let placement = if created {
            None
        } else {
            Some(self.placement(plane, geom)?)
        };

        let handle = match self.sprixels.for_plane(plane) {
            Some(h) if self.sprixels.get(h).is_some_and(|s| s.cells() == geom.cells) => {
                let h2 = self.sprixels.recycle(&self.pile, h, protocol)?;
                if h2 != h {
                    *fresh = Some(h2);
                }
                h2
            }
            existing => {
                if let Some(h) = existing {
                    self.sprixels.hide(&self.pile, h)?;
                }
                let h = self.sprixels.alloc(plane, geom.cells, cp, piled);
                *fresh = Some(h);
                h
            }
        };
        self.sprixels.load(handle, encoded.bitmap, &encoded.states)?;

        if let Some(placement) = placement {
            self.pile.resize(plane, geom.cells.rows, geom.cells.cols)?;
            if let Some((y, x)) = placement.to {
                self.pile.move_to(plane, y, x)?;
                self.sprixels.move_from(handle, placement.from)?;
            }
        }
        Ok(())
    }

    /// Where a caller's plane goes for a bitmap of `geom`.
    ///
    /// Fails for the same reasons the later resize and move would.
    fn placement(&self, plane: PlaneId, geom: &ResolvedGeometry) -> Result<Placement, VisualError> {
        if geom.cells.is_empty() {
            return Err(PlaneError::ZeroSize.into());
        }
        let (py, px) = self
            .pile
            .get(plane)
            .map(|p| p.yx())
            .ok_or(PlaneError::Stale(plane))?;
        let from = self.pile.abs_yx(plane)?;
        let y = if geom.valign == Align::Unaligned { py } else { geom.y };
        let x = if geom.halign == Align::Unaligned { px } else { geom.x };
        if (y, x) == (py, px) {
            return Ok(Placement { from, to: None });
        }
        if self.pile.is_std(plane) {
            return Err(PlaneError::StandardPlane.into());
        }
        Ok(Placement {
            from,
            to: Some((y, x)),
        })
    }

    fn discard_plane(&mut self, plane: PlaneId) {
        if let Err(_e) = self.destroy_plane(plane) {
            warn!(error = %_e, "could not destroy plane after failed render");
        }
    }

    /// Destroy `plane` and its descendants, hiding their sprixels first.
    pub fn destroy_plane(&mut self, plane: PlaneId) -> Result<(), VisualError> {
        for id in self.pile.subtree(plane)? {
            if let Some(h) = self.sprixels.for_plane(id) {
                self.sprixels.hide(&self.pile, h)?;
            }
        }
        self.pile.destroy(plane)?;
        Ok(())
    }

    /// Wipe cell `(y, x)` of the bitmap on `plane`.
    pub fn wipe_cell(&mut self, plane: PlaneId, y: u32, x: u32) -> Result<WipeOutcome, VisualError> {
        let protocol = self
            .protocol
            .as_deref()
            .ok_or(ProtocolError::Unsupported("pixel graphics"))?;
        let handle = self.sprixels.for_plane(plane).ok_or(SprixelError::Stale)?;
        Ok(self.sprixels.wipe_cell(handle, protocol, y, x)?)
    }

    /// Restore cell `(y, x)` of the bitmap on `plane`.
    pub fn restore_cell(&mut self, plane: PlaneId, y: u32, x: u32) -> Result<CellState, VisualError> {
        let protocol = self
            .protocol
            .as_deref()
            .ok_or(ProtocolError::Unsupported("pixel graphics"))?;
        let handle = self.sprixels.for_plane(plane).ok_or(SprixelError::Stale)?;
        Ok(self.sprixels.restore_cell(handle, protocol, y, x)?)
    }

    /// Open a media file with the backend.
    pub fn from_file(&self, path: &Path) -> Result<Visual, VisualError> {
        Ok(self.backend.from_file(path)?)
    }

    /// Advance `visual` to its next frame.
    pub fn decode(&self, visual: &mut Visual) -> Result<DecodeStatus, VisualError> {
        Ok(self.backend.decode(visual)?)
    }

    /// Rotate `visual` by `rads`, reseeding the backend.
    pub fn rotate(&self, visual: &mut Visual, rads: f64) -> Result<(), VisualError> {
        transform::rotate(visual, rads, self.backend.as_ref())
    }

    /// Resize `visual` through the backend.
    pub fn resize(&self, visual: &mut Visual, rows: u32, cols: u32) -> Result<(), VisualError> {
        transform::resize(visual, rows, cols, self.backend.as_ref())
    }

    /// Free hidden sprixels; returns how many.
    pub fn reap_hidden(&mut self) -> usize {
        self.sprixels.reap_hidden()
    }

    /// Write the protocol's erase-all sequence.
    pub fn clear_all_bitmaps(&self, out: &mut dyn Write) -> io::Result<()> {
        match &self.protocol {
            Some(p) => p.clear_all(out),
            None => Ok(()),
        }
    }

    /// Release terminal-side bitmap state and every sprixel.
    pub fn shutdown(&mut self, out: &mut dyn Write) -> io::Result<()> {
        let handles: Vec<_> = self.sprixels.cache().collect();
        for h in handles {
            // Stale cache entries are expected here.
            let _ = self.sprixels.hide(&self.pile, h);
        }
        self.sprixels.reap_hidden();
        match &self.protocol {
            Some(p) => p.shutdown(out),
            None => Ok(()),
        }
    }
}
