#![forbid(unsafe_code)]

//! Planes and the pile that owns them.
//!
//! A [`Pile`] is a tree of [`Plane`]s rooted at the standard plane, which is
//! sized to the terminal. Every plane holds a row-major cell grid and a
//! position relative to its parent. Planes are addressed by [`PlaneId`], a
//! generation-checked handle: destroying a plane bumps its slot's generation
//! so stale handles are rejected instead of aliasing a later plane.
//!
//! # Invariants
//!
//! 1. `cells.len() == rows * cols` for every plane.
//! 2. The standard plane exists for the pile's whole lifetime.
//! 3. A plane's children are destroyed with it.
//! 4. A handle resolves only while its slot generation matches.
//!
//! A pile is *managed* when it backs a full render loop and *direct* when
//! output goes straight to the terminal; the visual layer frees bitmap state
//! eagerly in direct mode.

use pixtui_core::geometry::Dims;
use smallvec::SmallVec;

use crate::cell::Cell;

/// Generation-checked handle to a plane in a [`Pile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaneId {
    index: u32,
    generation: u32,
}

/// Placement of a plane along one axis of its parent.
///
/// Vertical placement reuses the same variants: [`Align::TOP`] and
/// [`Align::BOTTOM`] alias `Left` and `Right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Align {
    /// Use the explicit coordinate.
    #[default]
    Unaligned = 0,
    /// Flush with the parent's left (or top) edge.
    Left = 1,
    /// Centered in the parent.
    Center = 2,
    /// Flush with the parent's right (or bottom) edge.
    Right = 3,
}

impl Align {
    /// Top alignment on the vertical axis.
    pub const TOP: Self = Self::Left;
    /// Bottom alignment on the vertical axis.
    pub const BOTTOM: Self = Self::Right;

    /// Offset of an extent of `len` inside `avail` under this alignment.
    ///
    /// Returns `None` for [`Align::Unaligned`]. The result is negative when
    /// `len` exceeds `avail` and the alignment is not `Left`.
    pub fn place(self, avail: u32, len: u32) -> Option<i32> {
        let slack = i64::from(avail) - i64::from(len);
        let off = match self {
            Self::Unaligned => return None,
            Self::Left => 0,
            Self::Center => slack.div_euclid(2),
            Self::Right => slack,
        };
        Some(off.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32)
    }
}

impl TryFrom<i32> for Align {
    type Error = i32;

    /// Interpret a raw alignment code, returning it unchanged if out of range.
    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Unaligned),
            1 => Ok(Self::Left),
            2 => Ok(Self::Center),
            3 => Ok(Self::Right),
            other => Err(other),
        }
    }
}

/// Options for [`Pile::create`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaneOptions {
    /// Row relative to the parent; ignored when `valign` is set.
    pub y: i32,
    /// Column relative to the parent; ignored when `halign` is set.
    pub x: i32,
    /// Height in cells.
    pub rows: u32,
    /// Width in cells.
    pub cols: u32,
    /// Horizontal placement.
    pub halign: Align,
    /// Vertical placement.
    pub valign: Align,
}

impl PlaneOptions {
    /// Options for an unaligned plane at `(y, x)`.
    pub fn new(y: i32, x: i32, rows: u32, cols: u32) -> Self {
        Self {
            y,
            x,
            rows,
            cols,
            ..Self::default()
        }
    }

    /// Set horizontal alignment.
    #[must_use]
    pub fn halign(mut self, align: Align) -> Self {
        self.halign = align;
        self
    }

    /// Set vertical alignment.
    #[must_use]
    pub fn valign(mut self, align: Align) -> Self {
        self.valign = align;
        self
    }

}

/// Errors from pile operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneError {
    /// The handle refers to a destroyed plane.
    Stale(PlaneId),
    /// The standard plane cannot be destroyed or moved.
    StandardPlane,
    /// Planes must have at least one row and one column.
    ZeroSize,
}

impl std::fmt::Display for PlaneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stale(id) => write!(f, "stale plane handle {}:{}", id.index, id.generation),
            Self::StandardPlane => write!(f, "operation not permitted on the standard plane"),
            Self::ZeroSize => write!(f, "plane dimensions must be nonzero"),
        }
    }
}

impl std::error::Error for PlaneError {}

/// A rectangular grid of cells placed relative to its parent.
#[derive(Debug, Clone)]
pub struct Plane {
    parent: Option<PlaneId>,
    children: SmallVec<[PlaneId; 4]>,
    y: i32,
    x: i32,
    rows: u32,
    cols: u32,
    cells: Vec<Cell>,
}

impl Plane {
    fn new(parent: Option<PlaneId>, y: i32, x: i32, opts: &PlaneOptions) -> Self {
        let len = opts.rows as usize * opts.cols as usize;
        Self {
            parent,
            children: SmallVec::new(),
            y,
            x,
            rows: opts.rows,
            cols: opts.cols,
            cells: vec![Cell::default(); len],
        }
    }

    /// Height in cells.
    #[inline]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Width in cells.
    #[inline]
    pub const fn cols(&self) -> u32 {
        self.cols
    }

    /// Dimensions in cells.
    #[inline]
    pub const fn dims(&self) -> Dims {
        Dims::new(self.rows, self.cols)
    }

    /// Position relative to the parent.
    #[inline]
    pub const fn yx(&self) -> (i32, i32) {
        (self.y, self.x)
    }

    /// Parent plane; `None` only for the standard plane.
    #[inline]
    pub const fn parent(&self) -> Option<PlaneId> {
        self.parent
    }

    /// Child planes, oldest first.
    pub fn children(&self) -> &[PlaneId] {
        &self.children
    }

    #[inline]
    fn index(&self, y: u32, x: u32) -> Option<usize> {
        (y < self.rows && x < self.cols).then(|| y as usize * self.cols as usize + x as usize)
    }

    /// Cell at `(y, x)`.
    pub fn get(&self, y: u32, x: u32) -> Option<&Cell> {
        self.index(y, x).map(|i| &self.cells[i])
    }

    /// Mutable cell at `(y, x)`.
    pub fn get_mut(&mut self, y: u32, x: u32) -> Option<&mut Cell> {
        self.index(y, x).map(|i| &mut self.cells[i])
    }

    /// Overwrite the cell at `(y, x)`; returns false when out of bounds.
    pub fn set(&mut self, y: u32, x: u32, cell: Cell) -> bool {
        match self.get_mut(y, x) {
            Some(slot) => {
                *slot = cell;
                true
            }
            None => false,
        }
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    fn resize_cells(&mut self, rows: u32, cols: u32) {
        let mut cells = vec![Cell::default(); rows as usize * cols as usize];
        let keep_rows = rows.min(self.rows) as usize;
        let keep_cols = cols.min(self.cols) as usize;
        for y in 0..keep_rows {
            let src = y * self.cols as usize;
            let dst = y * cols as usize;
            cells[dst..dst + keep_cols].copy_from_slice(&self.cells[src..src + keep_cols]);
        }
        self.rows = rows;
        self.cols = cols;
        self.cells = cells;
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    plane: Option<Plane>,
}

/// A tree of planes rooted at the standard plane.
#[derive(Debug, Clone)]
pub struct Pile {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    std: PlaneId,
    managed: bool,
}

impl Pile {
    /// Create a managed pile whose standard plane is `rows × cols`.
    ///
    /// Zero dimensions are raised to one.
    pub fn new(rows: u32, cols: u32) -> Self {
        Self::with_mode(rows, cols, true)
    }

    /// Create a direct-mode pile (no render loop, no deferred cleanup).
    pub fn direct(rows: u32, cols: u32) -> Self {
        Self::with_mode(rows, cols, false)
    }

    fn with_mode(rows: u32, cols: u32, managed: bool) -> Self {
        let opts = PlaneOptions::new(0, 0, rows.max(1), cols.max(1));
        let std = PlaneId {
            index: 0,
            generation: 0,
        };
        Self {
            slots: vec![Slot {
                generation: 0,
                plane: Some(Plane::new(None, 0, 0, &opts)),
            }],
            free_list: Vec::new(),
            std,
            managed,
        }
    }

    /// True for a managed pile, false in direct mode.
    #[inline]
    pub const fn is_managed(&self) -> bool {
        self.managed
    }

    /// Handle of the standard plane.
    #[inline]
    pub const fn std_plane(&self) -> PlaneId {
        self.std
    }

    /// True if `id` is the standard plane.
    #[inline]
    pub fn is_std(&self, id: PlaneId) -> bool {
        id == self.std
    }

    /// Terminal dimensions (those of the standard plane).
    pub fn term_dims(&self) -> Dims {
        self.get(self.std).map(Plane::dims).unwrap_or_default()
    }

    /// Number of live planes, the standard plane included.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    /// A pile always holds at least the standard plane.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// True if `id` refers to a live plane.
    pub fn contains(&self, id: PlaneId) -> bool {
        self.get(id).is_some()
    }

    /// Resolve a handle.
    pub fn get(&self, id: PlaneId) -> Option<&Plane> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.plane.as_ref())
    }

    /// Resolve a handle mutably.
    pub fn get_mut(&mut self, id: PlaneId) -> Option<&mut Plane> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.plane.as_mut())
    }

    fn plane(&self, id: PlaneId) -> Result<&Plane, PlaneError> {
        self.get(id).ok_or(PlaneError::Stale(id))
    }

    fn plane_mut(&mut self, id: PlaneId) -> Result<&mut Plane, PlaneError> {
        self.get_mut(id).ok_or(PlaneError::Stale(id))
    }

    /// Create a child of `parent`.
    ///
    /// Alignment, when set, overrides the explicit coordinate on its axis.
    pub fn create(&mut self, parent: PlaneId, opts: &PlaneOptions) -> Result<PlaneId, PlaneError> {
        if opts.rows == 0 || opts.cols == 0 {
            return Err(PlaneError::ZeroSize);
        }
        let pdims = self.plane(parent)?.dims();
        let y = opts.valign.place(pdims.rows, opts.rows).unwrap_or(opts.y);
        let x = opts.halign.place(pdims.cols, opts.cols).unwrap_or(opts.x);
        let plane = Plane::new(Some(parent), y, x, opts);

        let id = match self.free_list.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.plane = Some(plane);
                PlaneId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    plane: Some(plane),
                });
                PlaneId {
                    index,
                    generation: 0,
                }
            }
        };
        self.plane_mut(parent)?.children.push(id);
        #[cfg(feature = "tracing")]
        tracing::trace!(index = id.index, y, x, rows = opts.rows, cols = opts.cols, "plane created");
        Ok(id)
    }

    /// Destroy a plane and all of its descendants.
    ///
    /// Returns every destroyed handle, `id` first, so callers can release
    /// state keyed by them.
    pub fn destroy(&mut self, id: PlaneId) -> Result<Vec<PlaneId>, PlaneError> {
        if self.is_std(id) {
            return Err(PlaneError::StandardPlane);
        }
        let parent = self.plane(id)?.parent;
        if let Some(parent) = parent.and_then(|p| self.get_mut(p)) {
            parent.children.retain(|c| *c != id);
        }

        let mut destroyed = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            let slot = &mut self.slots[cur.index as usize];
            if let Some(plane) = slot.plane.take() {
                stack.extend(plane.children.iter().copied());
                slot.generation = slot.generation.wrapping_add(1);
                self.free_list.push(cur.index);
                destroyed.push(cur);
            }
        }
        Ok(destroyed)
    }

    /// A plane and all of its descendants, `id` first.
    pub fn subtree(&self, id: PlaneId) -> Result<Vec<PlaneId>, PlaneError> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            let plane = self.plane(cur)?;
            stack.extend(plane.children.iter().rev().copied());
            out.push(cur);
        }
        Ok(out)
    }

    /// Move a plane to `(y, x)` relative to its parent.
    pub fn move_to(&mut self, id: PlaneId, y: i32, x: i32) -> Result<(), PlaneError> {
        if self.is_std(id) {
            return Err(PlaneError::StandardPlane);
        }
        let plane = self.plane_mut(id)?;
        plane.y = y;
        plane.x = x;
        Ok(())
    }

    /// Resize a plane, keeping the overlapping top-left region of its cells.
    pub fn resize(&mut self, id: PlaneId, rows: u32, cols: u32) -> Result<(), PlaneError> {
        if rows == 0 || cols == 0 {
            return Err(PlaneError::ZeroSize);
        }
        let plane = self.plane_mut(id)?;
        if plane.rows != rows || plane.cols != cols {
            plane.resize_cells(rows, cols);
        }
        Ok(())
    }

    /// Dimensions of a plane in cells.
    pub fn dims(&self, id: PlaneId) -> Result<Dims, PlaneError> {
        Ok(self.plane(id)?.dims())
    }

    /// Absolute position of a plane's origin on the terminal.
    pub fn abs_yx(&self, id: PlaneId) -> Result<(i32, i32), PlaneError> {
        let mut plane = self.plane(id)?;
        let (mut y, mut x) = (plane.y, plane.x);
        while let Some(parent) = plane.parent {
            plane = self.plane(parent)?;
            y = y.saturating_add(plane.y);
            x = x.saturating_add(plane.x);
        }
        Ok((y, x))
    }
}
