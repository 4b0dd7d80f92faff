//! Property-based invariant tests for geometry primitives (Dims, Window, CellPixels).
//!
//! 1. A window fits within a raster iff its far edges do.
//! 2. `contains` agrees with the window's edges.
//! 3. Covering cells hold at least the pixels they cover, and one cell fewer
//!    on either axis would not.
//! 4. `pixels_for(cells_for(p))` is never smaller than `p`.
//! 5. Area is rows × cols without overflow.

use pixtui_core::geometry::{CellPixels, Dims, Window};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

fn dims_strategy() -> impl Strategy<Value = Dims> {
    (0u32..=4096, 0u32..=4096).prop_map(|(r, c)| Dims::new(r, c))
}

fn window_strategy() -> impl Strategy<Value = Window> {
    (0u32..=4096, 0u32..=4096, 0u32..=4096, 0u32..=4096)
        .prop_map(|(y, x, r, c)| Window::new(y, x, r, c))
}

fn cell_pixels_strategy() -> impl Strategy<Value = CellPixels> {
    (1u32..=64, 1u32..=64).prop_map(|(h, w)| CellPixels::new(h, w))
}

// ═════════════════════════════════════════════════════════════════════════
// 1. fits_within matches edge arithmetic
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn fits_within_matches_edges(w in window_strategy(), d in dims_strategy()) {
        let expected = w.y as u64 + w.rows as u64 <= d.rows as u64
            && w.x as u64 + w.cols as u64 <= d.cols as u64;
        prop_assert_eq!(w.fits_within(d), expected, "window={:?} dims={:?}", w, d);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. contains agrees with edges
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn contains_agrees_with_edges(w in window_strategy(), y in 0u32..=8192, x in 0u32..=8192) {
        let inside = y >= w.y && (y as u64) < w.bottom() && x >= w.x && (x as u64) < w.right();
        prop_assert_eq!(w.contains(y, x), inside);
        if w.is_empty() {
            prop_assert!(!w.contains(y, x));
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Covering cells are minimal
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn covering_cells_are_minimal(p in dims_strategy(), cp in cell_pixels_strategy()) {
        let cells = cp.cells_for(p).expect("known geometry");
        prop_assert!(cells.rows as u64 * cp.height as u64 >= p.rows as u64);
        prop_assert!(cells.cols as u64 * cp.width as u64 >= p.cols as u64);
        if cells.rows > 0 {
            prop_assert!(((cells.rows - 1) as u64 * cp.height as u64) < p.rows as u64);
        }
        if cells.cols > 0 {
            prop_assert!(((cells.cols - 1) as u64 * cp.width as u64) < p.cols as u64);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Round trip through cells never shrinks
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn cells_then_pixels_covers_input(p in dims_strategy(), cp in cell_pixels_strategy()) {
        let cells = cp.cells_for(p).expect("known geometry");
        let back = cp.pixels_for(cells);
        prop_assert!(p.fits_within(back), "p={:?} back={:?}", p, back);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Area
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn area_is_product(r in any::<u32>(), c in any::<u32>()) {
        prop_assert_eq!(Dims::new(r, c).area(), r as u64 * c as u64);
        prop_assert_eq!(Window::new(0, 0, r, c).area(), r as u64 * c as u64);
    }
}
