#![forbid(unsafe_code)]

//! Transparency/annihilation matrix.
//!
//! One entry per cell covered by a sprixel. Loading a bitmap classifies each
//! cell by the alpha of its pixels:
//!
//! | State              | Meaning                                              |
//! |--------------------|------------------------------------------------------|
//! | `Opaque`           | every pixel visible                                  |
//! | `Mixed`            | some pixels visible                                  |
//! | `Transparent`      | no pixel visible                                     |
//! | `Annihilated`      | wiped for glyph output; aux holds what was removed   |
//! | `AnnihilatedTrans` | a transparent cell wiped; nothing to restore         |
//!
//! Annihilation persists until the sprixel is reloaded or the cell restored.
//! The aux vector is protocol-specific: saved alphas for Kitty, palette
//! indices for Sixel.

use pixtui_core::geometry::Dims;

/// Pixels with alpha below this are transparent.
pub const TRANSPARENCY_THRESHOLD: u8 = 192;

/// True if a pixel with alpha `a` is drawn.
#[inline]
pub const fn is_visible(a: u8) -> bool {
    a >= TRANSPARENCY_THRESHOLD
}

/// Per-cell transparency state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CellState {
    #[default]
    Opaque,
    Mixed,
    Transparent,
    Annihilated,
    AnnihilatedTrans,
}

impl CellState {
    /// True for either annihilated state.
    #[inline]
    pub const fn is_annihilated(self) -> bool {
        matches!(self, Self::Annihilated | Self::AnnihilatedTrans)
    }

    /// True when the bitmap shows something in this cell.
    #[inline]
    pub const fn is_drawn(self) -> bool {
        matches!(self, Self::Opaque | Self::Mixed)
    }

    /// Classify a cell from its pixels' alphas.
    pub fn classify(alphas: impl IntoIterator<Item = u8>) -> Self {
        let (mut seen, mut visible) = (0usize, 0usize);
        for a in alphas {
            seen += 1;
            if is_visible(a) {
                visible += 1;
            }
        }
        match visible {
            0 => Self::Transparent,
            v if v == seen => Self::Opaque,
            _ => Self::Mixed,
        }
    }
}

/// One TAM cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TamEntry {
    pub state: CellState,
    /// Data saved by a wipe, used to restore the cell.
    pub aux: Option<Box<[u8]>>,
}

/// Row-major matrix of [`TamEntry`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tam {
    dims: Dims,
    entries: Vec<TamEntry>,
}

impl Tam {
    /// All-opaque matrix for `dims` cells.
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            entries: vec![TamEntry::default(); dims.area() as usize],
        }
    }

    /// Matrix from per-cell states, row-major. Missing states are opaque.
    pub fn from_states(dims: Dims, states: &[CellState]) -> Self {
        let mut tam = Self::new(dims);
        for (entry, state) in tam.entries.iter_mut().zip(states) {
            entry.state = *state;
        }
        tam
    }

    #[inline]
    pub const fn dims(&self) -> Dims {
        self.dims
    }

    #[inline]
    fn index(&self, y: u32, x: u32) -> Option<usize> {
        self.dims
            .contains(y, x)
            .then(|| y as usize * self.dims.cols as usize + x as usize)
    }

    pub fn get(&self, y: u32, x: u32) -> Option<&TamEntry> {
        self.index(y, x).map(|i| &self.entries[i])
    }

    pub fn get_mut(&mut self, y: u32, x: u32) -> Option<&mut TamEntry> {
        self.index(y, x).map(|i| &mut self.entries[i])
    }

    /// State at `(y, x)`.
    pub fn state(&self, y: u32, x: u32) -> Option<CellState> {
        self.get(y, x).map(|e| e.state)
    }

    /// Entries in row-major order.
    pub fn entries(&self) -> &[TamEntry] {
        &self.entries
    }

    /// Number of cells in an annihilated state.
    pub fn annihilated(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.state.is_annihilated())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_uses_threshold() {
        assert_eq!(CellState::classify([255, 192]), CellState::Opaque);
        assert_eq!(CellState::classify([255, 191]), CellState::Mixed);
        assert_eq!(CellState::classify([0, 191]), CellState::Transparent);
        assert_eq!(CellState::classify([]), CellState::Transparent);
    }

    #[test]
    fn states_fill_row_major() {
        let states = [CellState::Transparent, CellState::Mixed, CellState::Opaque];
        let tam = Tam::from_states(Dims::new(2, 2), &states);
        assert_eq!(tam.state(0, 0), Some(CellState::Transparent));
        assert_eq!(tam.state(0, 1), Some(CellState::Mixed));
        assert_eq!(tam.state(1, 0), Some(CellState::Opaque));
        assert_eq!(tam.state(1, 1), Some(CellState::Opaque));
        assert_eq!(tam.state(2, 0), None);
    }

    #[test]
    fn annihilated_counts() {
        let mut tam = Tam::new(Dims::new(1, 3));
        tam.get_mut(0, 0).unwrap().state = CellState::Annihilated;
        tam.get_mut(0, 2).unwrap().state = CellState::AnnihilatedTrans;
        assert_eq!(tam.annihilated(), 2);
        assert!(CellState::Mixed.is_drawn());
        assert!(!CellState::AnnihilatedTrans.is_drawn());
    }
}
