#![forbid(unsafe_code)]

//! Blitters: how many source pixels become one cell.
//!
//! | Blitter    | Pixels per cell (rows × cols) | Needs                     |
//! |------------|-------------------------------|---------------------------|
//! | `Ascii`    | 1 × 1                         | nothing                   |
//! | `Half`     | 2 × 1                         | UTF-8                     |
//! | `Quadrant` | 2 × 2                         | UTF-8, quadrant glyphs    |
//! | `Sextant`  | 3 × 2                         | UTF-8, sextant glyphs     |
//! | `Braille`  | 4 × 2                         | UTF-8, braille glyphs     |
//! | `Pixel`    | cell pixel geometry           | bitmap protocol           |
//!
//! An unsupported request degrades along
//! `Pixel → Sextant → Quadrant → Half → Ascii` (braille falls straight to
//! `Ascii`) unless degradation is disabled.

use std::fmt;
use std::str::FromStr;

use pixtui_core::terminal_capabilities::TerminalCapabilities;
use pixtui_core::{debug, error};

use crate::error::GeometryError;

/// Scaling policy for a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scaling {
    /// Draw at native size.
    #[default]
    None,
    /// Native size, preferring a higher-resolution blitter.
    NoneHiRes,
    /// Fit the destination, preserving aspect ratio.
    Fit,
    /// Fit, preferring a higher-resolution blitter.
    FitHiRes,
    /// Fill the destination, ignoring aspect ratio.
    Stretch,
}

impl Scaling {
    /// True for the native-size policies.
    #[inline]
    pub const fn is_none(self) -> bool {
        matches!(self, Self::None | Self::NoneHiRes)
    }

    /// True for the aspect-preserving fit policies.
    #[inline]
    pub const fn is_fit(self) -> bool {
        matches!(self, Self::Fit | Self::FitHiRes)
    }
}

/// Glyph family used to draw a visual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Blitter {
    /// Pick from capabilities and scaling.
    #[default]
    Default,
    /// One pixel per cell, drawn as a colored space.
    Ascii,
    /// Upper/lower half blocks.
    Half,
    /// 2×2 quadrant blocks.
    Quadrant,
    /// 2×3 sextants.
    Sextant,
    /// 2×4 braille dots.
    Braille,
    /// Raw pixels through the terminal's bitmap protocol.
    Pixel,
}

impl Blitter {
    /// Name used in logs and options.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Ascii => "ascii",
            Self::Half => "half",
            Self::Quadrant => "quadrant",
            Self::Sextant => "sextant",
            Self::Braille => "braille",
            Self::Pixel => "pixel",
        }
    }

    /// True if the terminal can draw this blitter.
    pub const fn is_supported(self, caps: &TerminalCapabilities) -> bool {
        match self {
            Self::Default | Self::Ascii => true,
            Self::Half => caps.can_halfblock(),
            Self::Quadrant => caps.can_quadrant(),
            Self::Sextant => caps.can_sextant(),
            Self::Braille => caps.can_braille(),
            Self::Pixel => caps.can_pixel(),
        }
    }

    /// Next blitter to try when this one is unsupported.
    pub const fn degrade(self) -> Option<Self> {
        match self {
            Self::Pixel => Some(Self::Sextant),
            Self::Sextant => Some(Self::Quadrant),
            Self::Quadrant => Some(Self::Half),
            Self::Half | Self::Braille | Self::Default => Some(Self::Ascii),
            Self::Ascii => None,
        }
    }

    /// Blitter chosen when none is requested.
    ///
    /// Native-size and plain fit renders use half blocks to keep the aspect
    /// ratio square; the high-resolution and stretch policies take the densest
    /// block glyphs available.
    pub const fn default_for(caps: &TerminalCapabilities, scaling: Scaling) -> Self {
        if !caps.utf8 {
            return Self::Ascii;
        }
        match scaling {
            Scaling::None | Scaling::Fit => Self::Half,
            Scaling::NoneHiRes | Scaling::FitHiRes | Scaling::Stretch => {
                if caps.can_sextant() {
                    Self::Sextant
                } else {
                    Self::Quadrant
                }
            }
        }
    }
}

impl fmt::Display for Blitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Blitter {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" | "" => Ok(Self::Default),
            "ascii" | "1x1" => Ok(Self::Ascii),
            "half" | "2x1" => Ok(Self::Half),
            "quadrant" | "2x2" => Ok(Self::Quadrant),
            "sextant" | "3x2" => Ok(Self::Sextant),
            "braille" | "4x2" => Ok(Self::Braille),
            "pixel" => Ok(Self::Pixel),
            _ => Err(()),
        }
    }
}

/// A resolved blitter with its per-cell pixel scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlitSet {
    pub blitter: Blitter,
    /// Source pixel rows per cell.
    pub rows_per_cell: u32,
    /// Source pixel columns per cell.
    pub cols_per_cell: u32,
}

impl BlitSet {
    /// Scale of a drawable blitter. `Default` must be resolved first.
    fn for_blitter(blitter: Blitter, caps: &TerminalCapabilities) -> Self {
        let (rows_per_cell, cols_per_cell) = match blitter {
            Blitter::Default | Blitter::Ascii => (1, 1),
            Blitter::Half => (2, 1),
            Blitter::Quadrant => (2, 2),
            Blitter::Sextant => (3, 2),
            Blitter::Braille => (4, 2),
            Blitter::Pixel => (caps.cell_pixels.height, caps.cell_pixels.width),
        };
        Self {
            blitter,
            rows_per_cell,
            cols_per_cell,
        }
    }

    /// True when output goes through the bitmap protocol.
    #[inline]
    pub const fn is_pixel(&self) -> bool {
        matches!(self.blitter, Blitter::Pixel)
    }

    /// Select a drawable blitter for `requested`.
    pub fn select(
        caps: &TerminalCapabilities,
        requested: Blitter,
        scaling: Scaling,
        nodegrade: bool,
    ) -> Result<Self, GeometryError> {
        let mut blitter = match requested {
            Blitter::Default => Blitter::default_for(caps, scaling),
            b => b,
        };
        while !blitter.is_supported(caps) {
            let next = match blitter.degrade() {
                Some(next) if !nodegrade => next,
                _ => {
                    error!(requested = requested.name(), "no usable blitter");
                    return Err(GeometryError::NoBlitter {
                        requested: requested.name(),
                    });
                }
            };
            debug!(from = blitter.name(), to = next.name(), "degrading blitter");
            blitter = next;
        }
        Ok(Self::for_blitter(blitter, caps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_blitter_follows_scaling() {
        let modern = TerminalCapabilities::modern();
        assert_eq!(Blitter::default_for(&modern, Scaling::None), Blitter::Half);
        assert_eq!(Blitter::default_for(&modern, Scaling::Fit), Blitter::Half);
        assert_eq!(
            Blitter::default_for(&modern, Scaling::Stretch),
            Blitter::Sextant
        );
        let sixel = TerminalCapabilities::sixel();
        assert_eq!(
            Blitter::default_for(&sixel, Scaling::FitHiRes),
            Blitter::Quadrant
        );
        let dumb = TerminalCapabilities::dumb();
        assert_eq!(
            Blitter::default_for(&dumb, Scaling::Stretch),
            Blitter::Ascii
        );
    }

    #[test]
    fn scales_per_blitter() {
        let caps = TerminalCapabilities::kitty();
        let s = BlitSet::select(&caps, Blitter::Braille, Scaling::None, false).unwrap();
        assert_eq!((s.rows_per_cell, s.cols_per_cell), (4, 2));
        let s = BlitSet::select(&caps, Blitter::Pixel, Scaling::None, false).unwrap();
        assert!(s.is_pixel());
        assert_eq!((s.rows_per_cell, s.cols_per_cell), (20, 10));
    }

    #[test]
    fn pixel_degrades_on_glyph_terminals() {
        let modern = TerminalCapabilities::modern();
        let s = BlitSet::select(&modern, Blitter::Pixel, Scaling::None, false).unwrap();
        assert_eq!(s.blitter, Blitter::Sextant);

        let linux = TerminalCapabilities::linux_console();
        let s = BlitSet::select(&linux, Blitter::Pixel, Scaling::None, false).unwrap();
        assert_eq!(s.blitter, Blitter::Half);

        let dumb = TerminalCapabilities::dumb();
        let s = BlitSet::select(&dumb, Blitter::Braille, Scaling::None, false).unwrap();
        assert_eq!(s.blitter, Blitter::Ascii);
    }

    #[test]
    fn nodegrade_rejects_unsupported_blitters() {
        let modern = TerminalCapabilities::modern();
        assert_eq!(
            BlitSet::select(&modern, Blitter::Pixel, Scaling::None, true),
            Err(GeometryError::NoBlitter { requested: "pixel" })
        );
        assert!(BlitSet::select(&modern, Blitter::Sextant, Scaling::None, true).is_ok());
    }

    #[test]
    fn pixel_needs_known_cell_geometry() {
        let caps = TerminalCapabilities::builder()
            .utf8(true)
            .pixel_protocol(pixtui_core::terminal_capabilities::PixelProtocol::Kitty)
            .build();
        assert!(!Blitter::Pixel.is_supported(&caps));
    }

    #[test]
    fn names_parse_back() {
        for b in [
            Blitter::Default,
            Blitter::Ascii,
            Blitter::Half,
            Blitter::Quadrant,
            Blitter::Sextant,
            Blitter::Braille,
            Blitter::Pixel,
        ] {
            assert_eq!(b.to_string().parse::<Blitter>(), Ok(b));
        }
        assert_eq!("3x2".parse::<Blitter>(), Ok(Blitter::Sextant));
        assert!("octant".parse::<Blitter>().is_err());
    }
}
