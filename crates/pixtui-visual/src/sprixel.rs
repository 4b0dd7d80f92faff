#![forbid(unsafe_code)]

//! Sprixels: terminal bitmaps bound to planes.
//!
//! A sprixel owns an encoded bitmap, the [`Tam`] describing each covered
//! cell, and a lifecycle state the render loop acts on:
//!
//! ```text
//!   alloc ──► Quiescent ──load──► Invalidated ──flush──► Quiescent
//!                 │                    ▲                     │
//!                 │ move_from          │ invalidate,         │
//!                 ▼                    │ wipe_cell           │
//!               Moved ─────────────────┴─────────────────────┘
//!                 │
//!   hide ──► Hidden ──reap_hidden / immediate when unpiled──► freed
//! ```
//!
//! # Invariants
//!
//! 1. A sprixel is bound to a plane unless it is hidden.
//! 2. Identifiers are never 0 and stay below [`SPRIXEL_ID_CEILING`].
//! 3. A cell stays annihilated until reload or [`SprixelStore::restore_cell`];
//!    a transparent cell is annihilated at most once per load.
//! 4. When piled, loaded pixel geometry covers exactly the sprixel's cells.
//!
//! Sprixels live in a generation-checked slot arena. The store's cache lists
//! piled sprixels most-recent first; it holds handles, so entries for freed
//! sprixels go stale rather than dangle, and [`SprixelStore::reap_hidden`]
//! sweeps them.

use std::collections::{HashMap, VecDeque};

use pixtui_core::geometry::{CellPixels, Dims};
use pixtui_core::trace;
use pixtui_render::plane::{Pile, PlaneId};

use crate::error::{ProtocolError, SprixelError};
use crate::protocol::BitmapProtocol;
use crate::tam::{CellState, Tam};

/// Identifiers wrap back to 1 on reaching this value.
pub const SPRIXEL_ID_CEILING: u32 = 0x0100_0000;

/// Wrapping sprixel id source.
#[derive(Debug, Clone, Default)]
pub struct SprixelIds {
    last: u32,
}

impl SprixelIds {
    pub const fn new() -> Self {
        Self { last: 0 }
    }

    /// Source whose next id follows `last`.
    pub const fn starting_after(last: u32) -> Self {
        Self { last }
    }

    /// Next id; never 0.
    pub fn next_id(&mut self) -> u32 {
        let mut id = self.last.wrapping_add(1);
        if id == 0 || id >= SPRIXEL_ID_CEILING {
            id = 1;
        }
        self.last = id;
        id
    }
}

/// Generation-checked handle to a sprixel in a [`SprixelStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SprixelHandle {
    index: u32,
    generation: u32,
}

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SprixelState {
    /// On screen and up to date.
    #[default]
    Quiescent,
    /// Needs redrawing.
    Invalidated,
    /// Needs redrawing at a new position; the old one is in `moved_from`.
    Moved,
    /// Detached from its plane, awaiting removal from the screen.
    Hidden,
}

/// An encoded bitmap payload.
///
/// The payload is RGBA, four bytes per pixel, `pixels.cols` pixels per row
/// with no padding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitmap {
    payload: Vec<u8>,
    pixels: Dims,
    parse_start: usize,
}

impl Bitmap {
    pub fn new(payload: Vec<u8>, pixels: Dims) -> Self {
        Self {
            payload,
            pixels,
            parse_start: 0,
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.payload
    }

    #[inline]
    pub const fn pixels(&self) -> Dims {
        self.pixels
    }

    /// Payload offset where an incremental resend resumes.
    #[inline]
    pub const fn parse_start(&self) -> usize {
        self.parse_start
    }

    pub fn set_parse_start(&mut self, offset: usize) {
        self.parse_start = offset.min(self.payload.len());
    }

    /// Bytes the payload must hold for its pixel geometry.
    pub fn required_len(&self) -> usize {
        self.pixels.area() as usize * 4
    }

    /// Check the payload covers its pixel geometry.
    pub fn check_len(&self) -> Result<(), ProtocolError> {
        let needed = self.required_len();
        if self.payload.len() < needed {
            return Err(ProtocolError::PayloadTooShort {
                needed,
                len: self.payload.len(),
            });
        }
        Ok(())
    }

    /// Offset of the alpha byte of pixel `i` (row-major) of cell `(y, x)`.
    ///
    /// `None` when that pixel lies past the bitmap's edge.
    pub fn alpha_offset(&self, cp: CellPixels, y: u32, x: u32, i: usize) -> Option<usize> {
        let width = cp.width.max(1) as usize;
        let py = y as u64 * u64::from(cp.height) + (i / width) as u64;
        let px = x as u64 * u64::from(cp.width) + (i % width) as u64;
        if py >= u64::from(self.pixels.rows) || px >= u64::from(self.pixels.cols) {
            return None;
        }
        Some((py as usize * self.pixels.cols as usize + px as usize) * 4 + 3)
    }

    /// Classify cell `(y, x)` from the payload; pixels past the edge count
    /// as transparent.
    pub fn cell_state(&self, cp: CellPixels, y: u32, x: u32) -> CellState {
        CellState::classify((0..cp.area()).map(|i| {
            self.alpha_offset(cp, y, x, i)
                .and_then(|o| self.payload.get(o).copied())
                .unwrap_or(0)
        }))
    }
}

/// A terminal bitmap and its per-cell state.
#[derive(Debug, Clone)]
pub struct Sprixel {
    id: u32,
    plane: Option<PlaneId>,
    cells: Dims,
    cell_pixels: CellPixels,
    bitmap: Option<Bitmap>,
    state: SprixelState,
    moved_from: Option<(i32, i32)>,
    tam: Tam,
    piled: bool,
}

impl Sprixel {
    #[inline]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Owning plane; `None` once hidden.
    #[inline]
    pub const fn plane(&self) -> Option<PlaneId> {
        self.plane
    }

    /// Cell footprint.
    #[inline]
    pub const fn cells(&self) -> Dims {
        self.cells
    }

    /// Cell pixel geometry at creation.
    #[inline]
    pub const fn cell_pixels(&self) -> CellPixels {
        self.cell_pixels
    }

    /// Pixel size of the loaded bitmap, or of the cell footprint before load.
    pub fn pixels(&self) -> Dims {
        match &self.bitmap {
            Some(b) => b.pixels(),
            None => self.cell_pixels.pixels_for(self.cells),
        }
    }

    pub fn bitmap(&self) -> Option<&Bitmap> {
        self.bitmap.as_ref()
    }

    #[inline]
    pub const fn state(&self) -> SprixelState {
        self.state
    }

    /// Absolute position last occupied, while a move or hide is pending.
    #[inline]
    pub const fn moved_from(&self) -> Option<(i32, i32)> {
        self.moved_from
    }

    pub fn tam(&self) -> &Tam {
        &self.tam
    }

    /// True when owned by a managed pile.
    #[inline]
    pub const fn is_piled(&self) -> bool {
        self.piled
    }

    fn check_cell(&self, y: u32, x: u32) -> Result<(), SprixelError> {
        if self.cells.contains(y, x) {
            Ok(())
        } else {
            Err(SprixelError::BadCell {
                y,
                x,
                cells: self.cells,
            })
        }
    }

    fn wipe(&mut self, protocol: &dyn BitmapProtocol, y: u32, x: u32) -> Result<WipeOutcome, SprixelError> {
        if self.state == SprixelState::Hidden {
            return Ok(WipeOutcome::Skipped);
        }
        self.check_cell(y, x)?;
        let cp = self.cell_pixels;
        let Some(entry) = self.tam.get_mut(y, x) else {
            return Err(SprixelError::BadCell {
                y,
                x,
                cells: self.cells,
            });
        };
        match entry.state {
            CellState::Annihilated | CellState::AnnihilatedTrans => Ok(WipeOutcome::AlreadyWiped),
            CellState::Transparent => {
                entry.state = CellState::AnnihilatedTrans;
                if entry.aux.is_none() {
                    entry.aux = Some(protocol.transparent_aux(cp));
                }
                Ok(WipeOutcome::Wiped)
            }
            CellState::Opaque | CellState::Mixed => {
                entry.state = CellState::Annihilated;
                let wiped = match self.bitmap.as_mut() {
                    Some(bitmap) => protocol.wipe_cell(bitmap, cp, y, x),
                    None => Err(ProtocolError::PayloadTooShort { needed: 1, len: 0 }),
                };
                match wiped {
                    Ok(aux) => {
                        entry.aux = Some(aux);
                        self.state = SprixelState::Invalidated;
                        Ok(WipeOutcome::Wiped)
                    }
                    Err(e) => Err(SprixelError::WipeFailed(e)),
                }
            }
        }
    }

    fn restore(&mut self, protocol: &dyn BitmapProtocol, y: u32, x: u32) -> Result<CellState, SprixelError> {
        if self.state == SprixelState::Hidden {
            return Err(SprixelError::Hidden);
        }
        self.check_cell(y, x)?;
        let cp = self.cell_pixels;
        let Some(entry) = self.tam.get_mut(y, x) else {
            return Err(SprixelError::BadCell {
                y,
                x,
                cells: self.cells,
            });
        };
        match entry.state {
            CellState::AnnihilatedTrans => {
                entry.state = CellState::Transparent;
                Ok(CellState::Transparent)
            }
            CellState::Annihilated => {
                let Some(bitmap) = self.bitmap.as_mut() else {
                    return Err(SprixelError::RestoreFailed(ProtocolError::PayloadTooShort {
                        needed: 1,
                        len: 0,
                    }));
                };
                let aux = entry.aux.take();
                match protocol.rebuild_cell(bitmap, cp, y, x, aux.as_deref().unwrap_or(&[])) {
                    Ok(state) => {
                        entry.state = state;
                        self.state = SprixelState::Invalidated;
                        Ok(state)
                    }
                    Err(e) => {
                        entry.aux = aux;
                        Err(SprixelError::RestoreFailed(e))
                    }
                }
            }
            other => Ok(other),
        }
    }
}

/// Result of [`SprixelStore::wipe_cell`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WipeOutcome {
    /// The cell was annihilated by this call.
    Wiped,
    /// The cell was already annihilated.
    AlreadyWiped,
    /// The sprixel is hidden; nothing to wipe.
    Skipped,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    sprixel: Option<Sprixel>,
}

/// Arena of sprixels with the pile's cache list.
#[derive(Debug, Clone, Default)]
pub struct SprixelStore {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    cache: VecDeque<SprixelHandle>,
    by_plane: HashMap<PlaneId, SprixelHandle>,
    ids: SprixelIds,
}

impl SprixelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose first id follows `last`.
    pub fn with_ids(ids: SprixelIds) -> Self {
        Self {
            ids,
            ..Self::default()
        }
    }

    /// Live sprixels.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, handle: SprixelHandle) -> Option<&Sprixel> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.sprixel.as_ref())
    }

    fn sprixel_mut(&mut self, handle: SprixelHandle) -> Result<&mut Sprixel, SprixelError> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.sprixel.as_mut())
            .ok_or(SprixelError::Stale)
    }

    /// Sprixel bound to `plane`.
    pub fn for_plane(&self, plane: PlaneId) -> Option<SprixelHandle> {
        self.by_plane.get(&plane).copied()
    }

    /// Cached handles, most recent first. May include stale handles until
    /// the next [`reap_hidden`](Self::reap_hidden).
    pub fn cache(&self) -> impl Iterator<Item = SprixelHandle> + '_ {
        self.cache.iter().copied()
    }

    /// Find a cached sprixel by id.
    pub fn by_id(&self, id: u32) -> Option<SprixelHandle> {
        self.cache
            .iter()
            .copied()
            .find(|h| self.get(*h).is_some_and(|s| s.id == id))
    }

    /// Create a sprixel of `cells` bound to `plane`.
    ///
    /// Piled sprixels are linked at the head of the cache.
    pub fn alloc(&mut self, plane: PlaneId, cells: Dims, cell_pixels: CellPixels, piled: bool) -> SprixelHandle {
        let id = self.ids.next_id();
        let sprixel = Sprixel {
            id,
            plane: Some(plane),
            cells,
            cell_pixels,
            bitmap: None,
            state: SprixelState::Quiescent,
            moved_from: None,
            tam: Tam::new(cells),
            piled,
        };
        let handle = match self.free_list.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.sprixel = Some(sprixel);
                SprixelHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    sprixel: Some(sprixel),
                });
                SprixelHandle {
                    index,
                    generation: 0,
                }
            }
        };
        if piled {
            self.cache.push_front(handle);
        }
        self.by_plane.insert(plane, handle);
        trace!(id, rows = cells.rows, cols = cells.cols, piled, "sprixel allocated");
        handle
    }

    /// Prepare a sprixel for a new bitmap.
    ///
    /// Protocols that update in place keep the sprixel. Otherwise it is
    /// hidden and a fresh one with the same geometry takes its plane.
    pub fn recycle(
        &mut self,
        pile: &Pile,
        handle: SprixelHandle,
        protocol: &dyn BitmapProtocol,
    ) -> Result<SprixelHandle, SprixelError> {
        let s = self.get(handle).ok_or(SprixelError::Stale)?;
        if protocol.updates_in_place() {
            return Ok(handle);
        }
        let plane = s.plane.ok_or(SprixelError::Hidden)?;
        let (cells, cell_pixels, piled) = (s.cells, s.cell_pixels, s.piled);
        self.hide(pile, handle)?;
        Ok(self.alloc(plane, cells, cell_pixels, piled))
    }

    /// Install a freshly encoded bitmap and its per-cell states.
    ///
    /// When piled, the bitmap must cover exactly the sprixel's cells; on
    /// mismatch the previous bitmap is kept.
    pub fn load(&mut self, handle: SprixelHandle, bitmap: Bitmap, states: &[CellState]) -> Result<(), SprixelError> {
        let s = self.sprixel_mut(handle)?;
        if s.piled && s.cell_pixels.cells_for(bitmap.pixels()) != Some(s.cells) {
            return Err(SprixelError::InconsistentGeometry {
                pixels: bitmap.pixels(),
                cells: s.cells,
                cell_pixels: s.cell_pixels,
            });
        }
        s.bitmap = Some(bitmap);
        s.tam = Tam::from_states(s.cells, states);
        s.state = SprixelState::Invalidated;
        Ok(())
    }

    /// Record that the sprixel left absolute position `from`.
    ///
    /// Ignored while hidden or while an earlier move is pending.
    pub fn move_from(&mut self, handle: SprixelHandle, from: (i32, i32)) -> Result<(), SprixelError> {
        let s = self.sprixel_mut(handle)?;
        if matches!(s.state, SprixelState::Hidden | SprixelState::Moved) {
            return Ok(());
        }
        s.state = SprixelState::Moved;
        s.moved_from = Some(from);
        Ok(())
    }

    /// Detach from the plane.
    ///
    /// Unpiled sprixels are freed at once; piled ones wait for
    /// [`reap_hidden`](Self::reap_hidden) so the render loop can erase them.
    pub fn hide(&mut self, pile: &Pile, handle: SprixelHandle) -> Result<(), SprixelError> {
        let s = self.get(handle).ok_or(SprixelError::Stale)?;
        if !s.piled {
            self.destroy(handle)?;
            return Ok(());
        }
        if s.state == SprixelState::Hidden {
            return Ok(());
        }
        let plane = s.plane;
        let abs = plane.and_then(|p| pile.abs_yx(p).ok());
        if let Some(p) = plane
            && self.by_plane.get(&p) == Some(&handle)
        {
            self.by_plane.remove(&p);
        }
        let s = self.sprixel_mut(handle)?;
        s.state = SprixelState::Hidden;
        if abs.is_some() {
            s.moved_from = abs;
        }
        s.plane = None;
        trace!(id = s.id, "sprixel hidden");
        Ok(())
    }

    /// Mark for redraw; no effect while hidden.
    pub fn invalidate(&mut self, handle: SprixelHandle) -> Result<(), SprixelError> {
        let s = self.sprixel_mut(handle)?;
        if s.state != SprixelState::Hidden {
            s.state = SprixelState::Invalidated;
        }
        Ok(())
    }

    /// Note that absolute screen cell `(y, x)` was drawn over.
    ///
    /// A quiescent sprixel showing pixels in that cell is invalidated.
    /// Returns whether it was. Points outside the sprixel's footprint, and
    /// sprixels without a live plane, are ignored.
    pub fn invalidate_at(
        &mut self,
        pile: &Pile,
        handle: SprixelHandle,
        y: i32,
        x: i32,
    ) -> Result<bool, SprixelError> {
        let s = self.sprixel_mut(handle)?;
        if s.state != SprixelState::Quiescent {
            return Ok(false);
        }
        let Some((oy, ox)) = s.plane.and_then(|p| pile.abs_yx(p).ok()) else {
            return Ok(false);
        };
        let local = |abs: i32, origin: i32| u32::try_from(i64::from(abs) - i64::from(origin));
        let (Ok(ly), Ok(lx)) = (local(y, oy), local(x, ox)) else {
            return Ok(false);
        };
        if s.tam.state(ly, lx).is_some_and(CellState::is_drawn) {
            s.state = SprixelState::Invalidated;
            return Ok(true);
        }
        Ok(false)
    }

    /// Remove the bitmap from cell `(y, x)` so glyphs can show there.
    ///
    /// Transparent cells are annihilated without touching the payload.
    /// Drawn cells are wiped by the protocol and marked annihilated even if
    /// that fails; the failure is reported as [`SprixelError::WipeFailed`].
    pub fn wipe_cell(
        &mut self,
        handle: SprixelHandle,
        protocol: &dyn BitmapProtocol,
        y: u32,
        x: u32,
    ) -> Result<WipeOutcome, SprixelError> {
        let s = self.sprixel_mut(handle)?;
        let outcome = s.wipe(protocol, y, x);
        trace!(id = s.id, y, x, ?outcome, "sprixel cell wipe");
        outcome
    }

    /// Bring an annihilated cell back; returns its new state.
    pub fn restore_cell(
        &mut self,
        handle: SprixelHandle,
        protocol: &dyn BitmapProtocol,
        y: u32,
        x: u32,
    ) -> Result<CellState, SprixelError> {
        self.sprixel_mut(handle)?.restore(protocol, y, x)
    }

    /// The render loop drew the sprixel; clear pending work.
    pub fn mark_quiescent(&mut self, handle: SprixelHandle) -> Result<(), SprixelError> {
        let s = self.sprixel_mut(handle)?;
        if s.state != SprixelState::Hidden {
            s.state = SprixelState::Quiescent;
            s.moved_from = None;
        }
        Ok(())
    }

    /// Free a sprixel. Its cache entry goes stale.
    pub fn destroy(&mut self, handle: SprixelHandle) -> Result<Sprixel, SprixelError> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .ok_or(SprixelError::Stale)?;
        let sprixel = slot.sprixel.take().ok_or(SprixelError::Stale)?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index);
        if let Some(p) = sprixel.plane
            && self.by_plane.get(&p) == Some(&handle)
        {
            self.by_plane.remove(&p);
        }
        trace!(id = sprixel.id, "sprixel destroyed");
        Ok(sprixel)
    }

    /// Free hidden sprixels and drop stale cache entries.
    ///
    /// Returns the number of sprixels freed.
    pub fn reap_hidden(&mut self) -> usize {
        let mut reaped = 0;
        let cache = std::mem::take(&mut self.cache);
        for handle in cache {
            match self.get(handle).map(Sprixel::state) {
                Some(SprixelState::Hidden) => {
                    if self.destroy(handle).is_ok() {
                        reaped += 1;
                    }
                }
                Some(_) => self.cache.push_back(handle),
                None => {}
            }
        }
        reaped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{KittyProtocol, SixelProtocol};
    use pixtui_render::plane::PlaneOptions;

    const CP: CellPixels = CellPixels::new(2, 2);

    fn pile_with_plane(managed: bool) -> (Pile, PlaneId) {
        let mut pile = if managed {
            Pile::new(10, 10)
        } else {
            Pile::direct(10, 10)
        };
        let std = pile.std_plane();
        let plane = pile.create(std, &PlaneOptions::new(3, 4, 1, 2)).unwrap();
        (pile, plane)
    }

    /// 2×4 pixel bitmap: left cell opaque, right cell transparent.
    fn half_opaque() -> (Bitmap, Vec<CellState>) {
        let mut payload = Vec::new();
        for _ in 0..2 {
            payload.extend_from_slice(&[255, 0, 0, 255, 255, 0, 0, 255, 0, 0, 0, 0, 0, 0, 0, 0]);
        }
        let bitmap = Bitmap::new(payload, Dims::new(2, 4));
        (bitmap, vec![CellState::Opaque, CellState::Transparent])
    }

    #[test]
    fn ids_skip_zero_and_wrap() {
        let mut ids = SprixelIds::starting_after(SPRIXEL_ID_CEILING - 2);
        assert_eq!(ids.next_id(), SPRIXEL_ID_CEILING - 1);
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
        let mut ids = SprixelIds::starting_after(u32::MAX);
        assert_eq!(ids.next_id(), 1);
    }

    #[test]
    fn alloc_links_piled_sprixels_most_recent_first() {
        let (_pile, plane) = pile_with_plane(true);
        let mut store = SprixelStore::new();
        let a = store.alloc(plane, Dims::new(1, 2), CP, true);
        let b = store.alloc(plane, Dims::new(1, 2), CP, true);
        let c = store.alloc(plane, Dims::new(1, 2), CP, false);
        assert_eq!(store.cache().collect::<Vec<_>>(), vec![b, a]);
        assert_eq!(store.for_plane(plane), Some(c));
        let id = store.get(a).unwrap().id();
        assert_eq!(store.by_id(id), Some(a));
        assert_eq!(store.by_id(store.get(c).unwrap().id()), None);
    }

    #[test]
    fn load_marks_invalidated_and_builds_tam() {
        let (_pile, plane) = pile_with_plane(true);
        let mut store = SprixelStore::new();
        let h = store.alloc(plane, Dims::new(1, 2), CP, true);
        let (bitmap, states) = half_opaque();
        store.load(h, bitmap, &states).unwrap();
        let s = store.get(h).unwrap();
        assert_eq!(s.state(), SprixelState::Invalidated);
        assert_eq!(s.tam().state(0, 1), Some(CellState::Transparent));
        assert_eq!(s.pixels(), Dims::new(2, 4));
    }

    #[test]
    fn inconsistent_geometry_keeps_previous_bitmap() {
        let (_pile, plane) = pile_with_plane(true);
        let mut store = SprixelStore::new();
        let h = store.alloc(plane, Dims::new(1, 2), CP, true);
        let (bitmap, states) = half_opaque();
        store.load(h, bitmap.clone(), &states).unwrap();
        let wrong = Bitmap::new(vec![0; 6 * 4 * 4], Dims::new(6, 4));
        assert!(matches!(
            store.load(h, wrong, &[]),
            Err(SprixelError::InconsistentGeometry { .. })
        ));
        assert_eq!(store.get(h).unwrap().bitmap(), Some(&bitmap));
    }

    #[test]
    fn move_from_records_once() {
        let (_pile, plane) = pile_with_plane(true);
        let mut store = SprixelStore::new();
        let h = store.alloc(plane, Dims::new(1, 2), CP, true);
        store.move_from(h, (1, 1)).unwrap();
        store.move_from(h, (5, 5)).unwrap();
        let s = store.get(h).unwrap();
        assert_eq!(s.state(), SprixelState::Moved);
        assert_eq!(s.moved_from(), Some((1, 1)));
        store.mark_quiescent(h).unwrap();
        assert_eq!(store.get(h).unwrap().moved_from(), None);
    }

    #[test]
    fn hide_detaches_piled_and_frees_unpiled() {
        let (pile, plane) = pile_with_plane(true);
        let mut store = SprixelStore::new();
        let h = store.alloc(plane, Dims::new(1, 2), CP, true);
        store.hide(&pile, h).unwrap();
        let s = store.get(h).unwrap();
        assert_eq!(s.state(), SprixelState::Hidden);
        assert_eq!(s.plane(), None);
        assert_eq!(s.moved_from(), Some((3, 4)));
        assert_eq!(store.for_plane(plane), None);
        // Hidden sprixels ignore moves and invalidation.
        store.move_from(h, (0, 0)).unwrap();
        store.invalidate(h).unwrap();
        assert_eq!(store.get(h).unwrap().state(), SprixelState::Hidden);
        assert_eq!(store.reap_hidden(), 1);
        assert!(store.get(h).is_none());
        assert_eq!(store.cache().count(), 0);

        let (pile, plane) = pile_with_plane(false);
        let h = store.alloc(plane, Dims::new(1, 2), CP, false);
        store.hide(&pile, h).unwrap();
        assert!(store.get(h).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn invalidate_at_needs_drawn_cell() {
        // The plane sits at absolute (3, 4).
        let (pile, plane) = pile_with_plane(true);
        let mut store = SprixelStore::new();
        let h = store.alloc(plane, Dims::new(1, 2), CP, true);
        let (bitmap, states) = half_opaque();
        store.load(h, bitmap, &states).unwrap();
        store.mark_quiescent(h).unwrap();
        assert!(!store.invalidate_at(&pile, h, 3, 5).unwrap());
        assert!(!store.invalidate_at(&pile, h, 0, 0).unwrap());
        assert!(!store.invalidate_at(&pile, h, 4, 4).unwrap());
        assert!(store.invalidate_at(&pile, h, 3, 4).unwrap());
        assert_eq!(store.get(h).unwrap().state(), SprixelState::Invalidated);
        // Already invalidated: nothing more to do.
        assert!(!store.invalidate_at(&pile, h, 3, 4).unwrap());
    }

    #[test]
    fn invalidate_at_maps_screen_position_through_nested_planes() {
        let mut pile = Pile::new(24, 80);
        let std = pile.std_plane();
        let outer = pile.create(std, &PlaneOptions::new(2, 3, 10, 10)).unwrap();
        let plane = pile.create(outer, &PlaneOptions::new(3, 4, 2, 2)).unwrap();
        let mut store = SprixelStore::new();
        let h = store.alloc(plane, Dims::new(2, 2), CP, true);
        let bitmap = Bitmap::new(vec![255; 4 * 4 * 4], Dims::new(4, 4));
        store.load(h, bitmap, &[CellState::Opaque; 4]).unwrap();
        store.mark_quiescent(h).unwrap();

        // Local (1, 1) is absolute (6, 8).
        assert!(!store.invalidate_at(&pile, h, 1, 1).unwrap());
        assert!(!store.invalidate_at(&pile, h, 7, 8).unwrap());
        assert_eq!(store.get(h).unwrap().state(), SprixelState::Quiescent);
        assert!(store.invalidate_at(&pile, h, 6, 8).unwrap());
        assert_eq!(store.get(h).unwrap().state(), SprixelState::Invalidated);
    }

    #[test]
    fn invalidate_at_ignores_hidden_sprixels() {
        let (pile, plane) = pile_with_plane(true);
        let mut store = SprixelStore::new();
        let h = store.alloc(plane, Dims::new(1, 2), CP, true);
        let (bitmap, states) = half_opaque();
        store.load(h, bitmap, &states).unwrap();
        store.hide(&pile, h).unwrap();
        assert!(!store.invalidate_at(&pile, h, 3, 4).unwrap());
        assert_eq!(store.get(h).unwrap().state(), SprixelState::Hidden);
    }

    #[test]
    fn kitty_wipe_and_restore_round_trip() {
        let (_pile, plane) = pile_with_plane(true);
        let mut store = SprixelStore::new();
        let h = store.alloc(plane, Dims::new(1, 2), CP, true);
        let (bitmap, states) = half_opaque();
        store.load(h, bitmap, &states).unwrap();
        store.mark_quiescent(h).unwrap();

        let kitty = KittyProtocol;
        assert_eq!(store.wipe_cell(h, &kitty, 0, 0), Ok(WipeOutcome::Wiped));
        let s = store.get(h).unwrap();
        assert_eq!(s.state(), SprixelState::Invalidated);
        assert_eq!(s.tam().state(0, 0), Some(CellState::Annihilated));
        assert_eq!(s.bitmap().unwrap().payload()[3], 0);
        assert_eq!(store.wipe_cell(h, &kitty, 0, 0), Ok(WipeOutcome::AlreadyWiped));

        assert_eq!(store.restore_cell(h, &kitty, 0, 0), Ok(CellState::Opaque));
        assert_eq!(store.get(h).unwrap().bitmap().unwrap().payload()[3], 255);
    }

    #[test]
    fn transparent_cells_annihilate_in_place() {
        let (_pile, plane) = pile_with_plane(true);
        let mut store = SprixelStore::new();
        let h = store.alloc(plane, Dims::new(1, 2), CP, true);
        let (bitmap, states) = half_opaque();
        store.load(h, bitmap, &states).unwrap();
        store.mark_quiescent(h).unwrap();

        assert_eq!(store.wipe_cell(h, &SixelProtocol, 0, 1), Ok(WipeOutcome::Wiped));
        let s = store.get(h).unwrap();
        assert_eq!(s.tam().state(0, 1), Some(CellState::AnnihilatedTrans));
        assert_eq!(s.state(), SprixelState::Quiescent);
        assert_eq!(store.restore_cell(h, &SixelProtocol, 0, 1), Ok(CellState::Transparent));
    }

    #[test]
    fn sixel_wipe_failure_still_annihilates() {
        let (_pile, plane) = pile_with_plane(true);
        let mut store = SprixelStore::new();
        let h = store.alloc(plane, Dims::new(1, 2), CP, true);
        let (bitmap, states) = half_opaque();
        store.load(h, bitmap, &states).unwrap();
        assert!(matches!(
            store.wipe_cell(h, &SixelProtocol, 0, 0),
            Err(SprixelError::WipeFailed(ProtocolError::Unsupported(_)))
        ));
        assert_eq!(
            store.get(h).unwrap().tam().state(0, 0),
            Some(CellState::Annihilated)
        );
        assert_eq!(store.wipe_cell(h, &SixelProtocol, 0, 0), Ok(WipeOutcome::AlreadyWiped));
        // Sixel never touched the payload, so the cell restores from it.
        assert_eq!(store.restore_cell(h, &SixelProtocol, 0, 0), Ok(CellState::Opaque));
    }

    #[test]
    fn wipe_rejects_bad_cells_and_skips_hidden() {
        let (pile, plane) = pile_with_plane(true);
        let mut store = SprixelStore::new();
        let h = store.alloc(plane, Dims::new(1, 2), CP, true);
        assert!(matches!(
            store.wipe_cell(h, &KittyProtocol, 1, 0),
            Err(SprixelError::BadCell { y: 1, x: 0, .. })
        ));
        store.hide(&pile, h).unwrap();
        assert_eq!(store.wipe_cell(h, &KittyProtocol, 5, 5), Ok(WipeOutcome::Skipped));
    }

    #[test]
    fn recycle_depends_on_protocol() {
        let (pile, plane) = pile_with_plane(true);
        let mut store = SprixelStore::new();
        let h = store.alloc(plane, Dims::new(1, 2), CP, true);
        assert_eq!(store.recycle(&pile, h, &SixelProtocol), Ok(h));

        let fresh = store.recycle(&pile, h, &KittyProtocol).unwrap();
        assert_ne!(fresh, h);
        assert_eq!(store.get(h).unwrap().state(), SprixelState::Hidden);
        let s = store.get(fresh).unwrap();
        assert_eq!(s.plane(), Some(plane));
        assert_eq!(s.cells(), Dims::new(1, 2));
        assert_eq!(store.for_plane(plane), Some(fresh));
    }

    #[test]
    fn destroy_leaves_stale_cache_entry() {
        let (_pile, plane) = pile_with_plane(true);
        let mut store = SprixelStore::new();
        let h = store.alloc(plane, Dims::new(1, 2), CP, true);
        let s = store.destroy(h).unwrap();
        assert_eq!(s.plane(), Some(plane));
        assert_eq!(store.cache().collect::<Vec<_>>(), vec![h]);
        assert_eq!(store.for_plane(plane), None);
        assert!(matches!(store.destroy(h), Err(SprixelError::Stale)));
        assert_eq!(store.reap_hidden(), 0);
        assert_eq!(store.cache().count(), 0);
    }

    #[test]
    fn cell_state_counts_pixels_past_edge_as_transparent() {
        // 1×3 bitmap, 2×2 cells: cell (0, 1) covers one real pixel.
        let bitmap = Bitmap::new(vec![255; 12], Dims::new(1, 3));
        assert_eq!(bitmap.cell_state(CP, 0, 0), CellState::Mixed);
        assert_eq!(bitmap.cell_state(CP, 0, 1), CellState::Mixed);
        assert_eq!(bitmap.alpha_offset(CP, 0, 1, 0), Some(11));
        assert_eq!(bitmap.alpha_offset(CP, 0, 1, 1), None);
    }
}
