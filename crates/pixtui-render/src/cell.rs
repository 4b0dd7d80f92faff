#![forbid(unsafe_code)]

//! Colors and terminal cells.

/// A compact RGBA color.
///
/// - **Layout:** `0xRRGGBBAA` (R in bits 31..24, A in bits 7..0).
/// - **Alpha:** straight, not pre-multiplied.
///
/// Pixel buffers store the same channels in memory order `[r, g, b, a]`; use
/// [`from_bytes`](Self::from_bytes) and [`to_bytes`](Self::to_bytes) at that
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(transparent)]
pub struct PackedRgba(pub u32);

impl PackedRgba {
    /// Fully transparent (alpha = 0).
    pub const TRANSPARENT: Self = Self(0);
    /// Opaque black.
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    /// Opaque white.
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    /// Create an opaque RGB color (alpha = 255).
    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    /// Create an RGBA color with explicit alpha.
    #[inline]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self(((r as u32) << 24) | ((g as u32) << 16) | ((b as u32) << 8) | (a as u32))
    }

    /// Build from a pixel in memory order.
    #[inline]
    pub const fn from_bytes(px: [u8; 4]) -> Self {
        Self::rgba(px[0], px[1], px[2], px[3])
    }

    /// Pixel in memory order.
    #[inline]
    pub const fn to_bytes(self) -> [u8; 4] {
        [self.r(), self.g(), self.b(), self.a()]
    }

    /// Red channel.
    #[inline]
    pub const fn r(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Green channel.
    #[inline]
    pub const fn g(self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// Blue channel.
    #[inline]
    pub const fn b(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Alpha channel.
    #[inline]
    pub const fn a(self) -> u8 {
        self.0 as u8
    }

    /// Same color with a different alpha.
    #[inline]
    pub const fn with_alpha(self, a: u8) -> Self {
        Self((self.0 & 0xFFFF_FF00) | a as u32)
    }

    /// True if the color ignoring alpha equals `other` ignoring alpha.
    #[inline]
    pub const fn same_rgb(self, other: Self) -> bool {
        (self.0 >> 8) == (other.0 >> 8)
    }

    #[inline]
    const fn div_round_u8(numer: u64, denom: u64) -> u8 {
        let v = (numer + (denom / 2)) / denom;
        if v > 255 { 255 } else { v as u8 }
    }

    /// Porter-Duff SourceOver: `src over dst`, rounded once at the end.
    #[inline]
    pub fn over(self, dst: Self) -> Self {
        let s_a = self.a() as u64;
        if s_a == 255 {
            return self;
        }
        if s_a == 0 {
            return dst;
        }

        let d_a = dst.a() as u64;
        let inv_s_a = 255 - s_a;
        let numer_a = 255 * s_a + d_a * inv_s_a;
        let out_a = Self::div_round_u8(numer_a, 255);

        let blend = |s: u8, d: u8| {
            Self::div_round_u8(
                (s as u64) * s_a * 255 + (d as u64) * d_a * inv_s_a,
                numer_a,
            )
        };
        Self::rgba(
            blend(self.r(), dst.r()),
            blend(self.g(), dst.g()),
            blend(self.b(), dst.b()),
            out_a,
        )
    }
}

/// A single terminal cell: one glyph with foreground and background colors.
///
/// The default cell is a space with white foreground and transparent
/// background, which the compositor treats as "nothing drawn here".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    /// Glyph.
    pub ch: char,
    /// Foreground color.
    pub fg: PackedRgba,
    /// Background color.
    pub bg: PackedRgba,
}

impl Cell {
    /// Create a cell from a glyph and its colors.
    #[inline]
    pub const fn new(ch: char, fg: PackedRgba, bg: PackedRgba) -> Self {
        Self { ch, fg, bg }
    }

    /// Create a cell from a single character with default colors.
    #[inline]
    pub const fn from_char(ch: char) -> Self {
        Self::new(ch, PackedRgba::WHITE, PackedRgba::TRANSPARENT)
    }

    /// True if nothing visible was drawn into the cell.
    #[inline]
    pub const fn is_blank(&self) -> bool {
        self.ch == ' ' && self.bg.a() == 0
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::from_char(' ')
    }
}
