#![forbid(unsafe_code)]

//! Pixel and cell geometry primitives.
//!
//! Rasters are addressed `(y, x)` with the origin at the top-left, rows first,
//! matching the way both pixel buffers and cell grids are stored.

/// Rows × columns of a raster or a cell grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dims {
    /// Number of rows.
    pub rows: u32,
    /// Number of columns.
    pub cols: u32,
}

impl Dims {
    /// Create new dimensions.
    #[inline]
    pub const fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }

    /// Total element count.
    #[inline]
    pub const fn area(&self) -> u64 {
        self.rows as u64 * self.cols as u64
    }

    /// True if either axis is zero.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// True if `(y, x)` addresses an element.
    #[inline]
    pub const fn contains(&self, y: u32, x: u32) -> bool {
        y < self.rows && x < self.cols
    }

    /// True if both axes are no larger than `other`'s.
    #[inline]
    pub const fn fits_within(&self, other: Dims) -> bool {
        self.rows <= other.rows && self.cols <= other.cols
    }
}

/// A rectangular window into a pixel raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Window {
    /// Top row (inclusive).
    pub y: u32,
    /// Left column (inclusive).
    pub x: u32,
    /// Height in pixels.
    pub rows: u32,
    /// Width in pixels.
    pub cols: u32,
}

impl Window {
    /// Create a new window.
    #[inline]
    pub const fn new(y: u32, x: u32, rows: u32, cols: u32) -> Self {
        Self { y, x, rows, cols }
    }

    /// Window covering all of `dims`.
    #[inline]
    pub const fn full(dims: Dims) -> Self {
        Self::new(0, 0, dims.rows, dims.cols)
    }

    /// Extent of the window.
    #[inline]
    pub const fn dims(&self) -> Dims {
        Dims::new(self.rows, self.cols)
    }

    /// Bottom edge (exclusive), widened to avoid overflow.
    #[inline]
    pub const fn bottom(&self) -> u64 {
        self.y as u64 + self.rows as u64
    }

    /// Right edge (exclusive), widened to avoid overflow.
    #[inline]
    pub const fn right(&self) -> u64 {
        self.x as u64 + self.cols as u64
    }

    /// Area in pixels.
    #[inline]
    pub const fn area(&self) -> u64 {
        self.rows as u64 * self.cols as u64
    }

    /// Check if the window has zero area.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Check if a pixel lies inside the window.
    #[inline]
    pub const fn contains(&self, y: u32, x: u32) -> bool {
        y >= self.y && (y as u64) < self.bottom() && x >= self.x && (x as u64) < self.right()
    }

    /// True if the whole window lies inside a raster of `dims`.
    #[inline]
    pub const fn fits_within(&self, dims: Dims) -> bool {
        self.bottom() <= dims.rows as u64 && self.right() <= dims.cols as u64
    }
}

/// Pixel geometry of a single terminal cell.
///
/// Zero in either axis means the terminal did not report it, which rules out
/// pixel-protocol output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CellPixels {
    /// Pixel rows per cell.
    pub height: u32,
    /// Pixel columns per cell.
    pub width: u32,
}

impl CellPixels {
    /// Create a new cell geometry.
    #[inline]
    pub const fn new(height: u32, width: u32) -> Self {
        Self { height, width }
    }

    /// True if both axes were reported.
    #[inline]
    pub const fn is_known(&self) -> bool {
        self.height != 0 && self.width != 0
    }

    /// Number of cells needed to cover `pixels`, rounding partial cells up.
    ///
    /// Returns `None` when the cell geometry is unknown.
    #[inline]
    pub const fn cells_for(&self, pixels: Dims) -> Option<Dims> {
        if !self.is_known() {
            return None;
        }
        Some(Dims::new(
            pixels.rows.div_ceil(self.height),
            pixels.cols.div_ceil(self.width),
        ))
    }

    /// Pixel extent of a `cells` grid.
    #[inline]
    pub const fn pixels_for(&self, cells: Dims) -> Dims {
        Dims::new(
            cells.rows.saturating_mul(self.height),
            cells.cols.saturating_mul(self.width),
        )
    }

    /// Pixels in one cell.
    #[inline]
    pub const fn area(&self) -> usize {
        self.height as usize * self.width as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dims_area_and_emptiness() {
        assert_eq!(Dims::new(4, 5).area(), 20);
        assert!(Dims::new(0, 5).is_empty());
        assert!(Dims::new(5, 0).is_empty());
        assert!(!Dims::new(1, 1).is_empty());
    }

    #[test]
    fn dims_contains_is_exclusive() {
        let d = Dims::new(2, 3);
        assert!(d.contains(1, 2));
        assert!(!d.contains(2, 0));
        assert!(!d.contains(0, 3));
    }

    #[test]
    fn window_edges_do_not_overflow() {
        let w = Window::new(u32::MAX, u32::MAX, u32::MAX, 1);
        assert_eq!(w.bottom(), u32::MAX as u64 * 2);
        assert_eq!(w.right(), u32::MAX as u64 + 1);
    }

    #[test]
    fn window_fits_within_raster() {
        let raster = Dims::new(40, 40);
        assert!(Window::new(10, 0, 20, 40).fits_within(raster));
        assert!(Window::new(20, 0, 20, 40).fits_within(raster));
        assert!(!Window::new(21, 0, 20, 40).fits_within(raster));
        assert!(!Window::new(0, 1, 1, 40).fits_within(raster));
    }

    #[test]
    fn window_contains() {
        let w = Window::new(2, 3, 4, 5);
        assert!(w.contains(2, 3));
        assert!(w.contains(5, 7));
        assert!(!w.contains(6, 7));
        assert!(!w.contains(2, 8));
        assert!(!w.contains(1, 3));
    }

    #[test]
    fn full_window_matches_dims() {
        let d = Dims::new(7, 9);
        let w = Window::full(d);
        assert_eq!(w.dims(), d);
        assert_eq!((w.y, w.x), (0, 0));
    }

    #[test]
    fn cells_round_partial_cells_up() {
        let cp = CellPixels::new(20, 10);
        assert_eq!(cp.cells_for(Dims::new(40, 40)), Some(Dims::new(2, 4)));
        assert_eq!(cp.cells_for(Dims::new(41, 1)), Some(Dims::new(3, 1)));
        assert_eq!(cp.cells_for(Dims::new(0, 0)), Some(Dims::new(0, 0)));
    }

    #[test]
    fn unknown_cell_geometry_yields_none() {
        assert_eq!(CellPixels::default().cells_for(Dims::new(4, 4)), None);
        assert_eq!(CellPixels::new(0, 8).cells_for(Dims::new(4, 4)), None);
    }

    #[test]
    fn pixels_for_saturates() {
        let cp = CellPixels::new(u32::MAX, 2);
        assert_eq!(cp.pixels_for(Dims::new(2, 3)), Dims::new(u32::MAX, 6));
        assert_eq!(CellPixels::new(20, 10).area(), 200);
    }
}
