#![forbid(unsafe_code)]

//! Terminal graphics capability model.
//!
//! Describes what a terminal can draw: which multi-pixel glyph families it
//! renders, whether it speaks a bitmap protocol, and the pixel geometry of a
//! cell. The visual layer consults this when choosing a blitter and when
//! sizing bitmaps.
//!
//! # Predefined Profiles
//!
//! | Profile | Description |
//! |---------|-------------|
//! | `modern()` | UTF-8 terminal with every glyph family, no bitmaps |
//! | `kitty()` | Kitty graphics protocol, 10×20 cells |
//! | `sixel()` | Sixel with 256 color registers, 1000×1000 bitmap ceiling |
//! | `linux_console()` | UTF-8 but only half blocks and braille |
//! | `dumb()` | ASCII only |
//!
//! ```
//! use pixtui_core::terminal_capabilities::{PixelProtocol, TerminalCapabilities};
//!
//! let caps = TerminalCapabilities::builder()
//!     .utf8(true)
//!     .pixel_protocol(PixelProtocol::Kitty)
//!     .cell_pixels(20, 10)
//!     .build();
//! assert!(caps.can_pixel());
//! ```
//!
//! # Detection Strategy
//!
//! Detection reads only the environment, so it is deterministic for a given
//! set of variables:
//! - `TERM`, `TERM_PROGRAM`, `KITTY_WINDOW_ID`: terminal identification
//! - `LC_ALL`, `LC_CTYPE`, `LANG`: UTF-8 locale
//! - `PIXTUI_PIXEL_PROTOCOL`: force `kitty`, `sixel` or `none`
//! - `PIXTUI_CELL_PIXELS`: cell size as `WIDTHxHEIGHT`
//!
//! Cell pixel geometry cannot be learned from the environment alone; without
//! the override it stays unknown and bitmap output is unavailable.
//! `NO_COLOR` does not affect graphics geometry and is not consulted.

use std::env;

use crate::geometry::{CellPixels, Dims};

#[derive(Debug, Clone, Default)]
struct DetectInputs {
    term: String,
    term_program: String,
    locale: String,
    kitty_window_id: bool,
    pixel_protocol_override: Option<String>,
    cell_pixels_override: Option<String>,
}

impl DetectInputs {
    fn from_env() -> Self {
        let locale = ["LC_ALL", "LC_CTYPE", "LANG"]
            .iter()
            .filter_map(|k| env::var(k).ok())
            .find(|v| !v.is_empty())
            .unwrap_or_default();
        Self {
            term: env::var("TERM").unwrap_or_default(),
            term_program: env::var("TERM_PROGRAM").unwrap_or_default(),
            locale,
            kitty_window_id: env::var("KITTY_WINDOW_ID").is_ok(),
            pixel_protocol_override: env::var("PIXTUI_PIXEL_PROTOCOL").ok(),
            cell_pixels_override: env::var("PIXTUI_CELL_PIXELS").ok(),
        }
    }
}

/// Terminal programs known to implement the Kitty graphics protocol.
const KITTY_GRAPHICS_TERMINALS: &[&str] = &["kitty", "WezTerm", "ghostty"];

/// Terminal programs known to implement Sixel.
const SIXEL_TERMINALS: &[&str] = &["foot", "mlterm", "contour", "iTerm.app"];

/// Terminal programs whose fonts carry the Unicode 13 sextant glyphs.
const SEXTANT_TERMINALS: &[&str] = &["kitty", "WezTerm", "foot", "contour", "ghostty"];

/// Largest bitmap xterm-style Sixel implementations accept by default.
const SIXEL_MAX_BITMAP: Dims = Dims::new(1000, 1000);

/// Out-of-band bitmap protocol spoken by the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelProtocol {
    /// No bitmap support.
    #[default]
    None,
    /// Kitty graphics protocol.
    Kitty,
    /// DEC Sixel.
    Sixel,
}

impl PixelProtocol {
    /// Protocol name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Kitty => "kitty",
            Self::Sixel => "sixel",
        }
    }

    /// Pixel rows the protocol emits as one unit.
    ///
    /// Sixel encodes six rows per band; bitmap heights are rounded to it.
    #[must_use]
    pub const fn band_height(&self) -> u32 {
        match self {
            Self::Sixel => 6,
            Self::None | Self::Kitty => 1,
        }
    }
}

impl std::str::FromStr for PixelProtocol {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "off" | "" => Ok(Self::None),
            "kitty" => Ok(Self::Kitty),
            "sixel" => Ok(Self::Sixel),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for PixelProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal graphics capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalCapabilities {
    /// UTF-8 output; required by every non-ASCII glyph family.
    pub utf8: bool,
    /// Quadrant block glyphs (2×2).
    pub quadrants: bool,
    /// Sextant glyphs (2×3).
    pub sextants: bool,
    /// Braille patterns (2×4).
    pub braille: bool,
    /// Bitmap protocol, if any.
    pub pixel_protocol: PixelProtocol,
    /// Pixel geometry of one cell.
    pub cell_pixels: CellPixels,
    /// Largest bitmap the terminal accepts, `None` when unbounded.
    pub max_bitmap: Option<Dims>,
    /// Sixel color registers (0 when not applicable).
    pub color_registers: u32,
}

impl Default for TerminalCapabilities {
    fn default() -> Self {
        Self::basic()
    }
}

// ============================================================================
// Predefined Capability Profiles
// ============================================================================

impl TerminalCapabilities {
    /// UTF-8 terminal drawing every glyph family, without bitmaps.
    #[must_use]
    pub const fn modern() -> Self {
        Self {
            utf8: true,
            quadrants: true,
            sextants: true,
            braille: true,
            pixel_protocol: PixelProtocol::None,
            cell_pixels: CellPixels::new(0, 0),
            max_bitmap: None,
            color_registers: 0,
        }
    }

    /// Kitty with its graphics protocol and a 10×20 pixel cell.
    #[must_use]
    pub const fn kitty() -> Self {
        Self {
            utf8: true,
            quadrants: true,
            sextants: true,
            braille: true,
            pixel_protocol: PixelProtocol::Kitty,
            cell_pixels: CellPixels::new(20, 10),
            max_bitmap: None,
            color_registers: 0,
        }
    }

    /// xterm with Sixel enabled.
    ///
    /// xterm's fonts usually lack sextants; bitmaps are capped at its default
    /// 1000×1000 maximum graphic size.
    #[must_use]
    pub const fn sixel() -> Self {
        Self {
            utf8: true,
            quadrants: true,
            sextants: false,
            braille: true,
            pixel_protocol: PixelProtocol::Sixel,
            cell_pixels: CellPixels::new(20, 10),
            max_bitmap: Some(SIXEL_MAX_BITMAP),
            color_registers: 256,
        }
    }

    /// Linux virtual console: UTF-8 half blocks and braille only.
    #[must_use]
    pub const fn linux_console() -> Self {
        Self {
            utf8: true,
            quadrants: false,
            sextants: false,
            braille: true,
            pixel_protocol: PixelProtocol::None,
            cell_pixels: CellPixels::new(0, 0),
            max_bitmap: None,
            color_registers: 0,
        }
    }

    /// Dumb terminal; the same as [`basic()`](Self::basic).
    #[must_use]
    pub const fn dumb() -> Self {
        Self::basic()
    }

    /// Create a builder for custom capability profiles.
    ///
    /// Start with all capabilities disabled and enable what you need.
    #[must_use]
    pub fn builder() -> CapabilityProfileBuilder {
        CapabilityProfileBuilder::new()
    }

    /// Create a minimal fallback capability set: ASCII, no bitmaps.
    #[must_use]
    pub const fn basic() -> Self {
        Self {
            utf8: false,
            quadrants: false,
            sextants: false,
            braille: false,
            pixel_protocol: PixelProtocol::None,
            cell_pixels: CellPixels::new(0, 0),
            max_bitmap: None,
            color_registers: 0,
        }
    }

    /// True if bitmaps can be drawn: a protocol is present and the cell
    /// pixel geometry is known.
    #[must_use]
    #[inline]
    pub const fn can_pixel(&self) -> bool {
        !matches!(self.pixel_protocol, PixelProtocol::None) && self.cell_pixels.is_known()
    }

    /// Half-block glyphs (1×2) are available with any UTF-8 output.
    #[must_use]
    #[inline]
    pub const fn can_halfblock(&self) -> bool {
        self.utf8
    }

    /// Quadrant glyphs (2×2) are available.
    #[must_use]
    #[inline]
    pub const fn can_quadrant(&self) -> bool {
        self.utf8 && self.quadrants
    }

    /// Sextant glyphs (2×3) are available.
    #[must_use]
    #[inline]
    pub const fn can_sextant(&self) -> bool {
        self.utf8 && self.sextants
    }

    /// Braille glyphs (2×4) are available.
    #[must_use]
    #[inline]
    pub const fn can_braille(&self) -> bool {
        self.utf8 && self.braille
    }
}

// ============================================================================
// Capability Profile Builder
// ============================================================================

/// Builder for custom terminal capability profiles.
///
/// ```
/// use pixtui_core::terminal_capabilities::{CapabilityProfileBuilder, PixelProtocol};
///
/// let caps = CapabilityProfileBuilder::new()
///     .utf8(true)
///     .sextants(true)
///     .pixel_protocol(PixelProtocol::Sixel)
///     .cell_pixels(16, 8)
///     .max_bitmap(600, 800)
///     .build();
///
/// assert!(caps.can_sextant());
/// assert_eq!(caps.max_bitmap.map(|d| d.rows), Some(600));
/// ```
#[derive(Debug, Clone)]
pub struct CapabilityProfileBuilder {
    caps: TerminalCapabilities,
}

impl Default for CapabilityProfileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityProfileBuilder {
    /// Create a new builder with all capabilities disabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            caps: TerminalCapabilities::basic(),
        }
    }

    /// Start from an existing capability set.
    #[must_use]
    pub const fn starting_from(caps: TerminalCapabilities) -> Self {
        Self { caps }
    }

    /// Build the final capability set.
    #[must_use]
    pub fn build(self) -> TerminalCapabilities {
        self.caps
    }

    // ── Glyph Families ─────────────────────────────────────────────────

    /// Set UTF-8 output support.
    #[must_use]
    pub const fn utf8(mut self, enabled: bool) -> Self {
        self.caps.utf8 = enabled;
        self
    }

    /// Set quadrant glyph support.
    #[must_use]
    pub const fn quadrants(mut self, enabled: bool) -> Self {
        self.caps.quadrants = enabled;
        self
    }

    /// Set sextant glyph support.
    #[must_use]
    pub const fn sextants(mut self, enabled: bool) -> Self {
        self.caps.sextants = enabled;
        self
    }

    /// Set braille glyph support.
    #[must_use]
    pub const fn braille(mut self, enabled: bool) -> Self {
        self.caps.braille = enabled;
        self
    }

    // ── Bitmaps ────────────────────────────────────────────────────────

    /// Set the bitmap protocol.
    #[must_use]
    pub const fn pixel_protocol(mut self, protocol: PixelProtocol) -> Self {
        self.caps.pixel_protocol = protocol;
        self
    }

    /// Set the pixel geometry of one cell.
    #[must_use]
    pub const fn cell_pixels(mut self, height: u32, width: u32) -> Self {
        self.caps.cell_pixels = CellPixels::new(height, width);
        self
    }

    /// Set the largest accepted bitmap.
    #[must_use]
    pub const fn max_bitmap(mut self, rows: u32, cols: u32) -> Self {
        self.caps.max_bitmap = Some(Dims::new(rows, cols));
        self
    }

    /// Set the number of Sixel color registers.
    #[must_use]
    pub const fn color_registers(mut self, registers: u32) -> Self {
        self.caps.color_registers = registers;
        self
    }
}

impl TerminalCapabilities {
    /// Detect graphics capabilities from the environment.
    ///
    /// When in doubt, capabilities are disabled.
    #[must_use]
    pub fn detect() -> Self {
        let env = DetectInputs::from_env();
        Self::detect_from_inputs(&env)
    }

    fn detect_from_inputs(env: &DetectInputs) -> Self {
        let term = env.term.as_str();
        let term_program = env.term_program.as_str();
        let is_dumb = term == "dumb" || term.is_empty();
        let is_linux = term == "linux";

        let matches_any = |list: &[&str]| {
            list.iter()
                .any(|t| term_program.contains(t) || term.contains(&t.to_lowercase()))
        };

        let locale = env.locale.to_lowercase();
        let utf8 = !is_dumb && (locale.contains("utf-8") || locale.contains("utf8"));

        let is_kitty = env.kitty_window_id || term.contains("kitty");
        let quadrants = utf8 && !is_linux;
        let sextants = utf8 && (is_kitty || matches_any(SEXTANT_TERMINALS));
        let braille = utf8;

        let detected_protocol = if is_dumb {
            PixelProtocol::None
        } else if is_kitty || matches_any(KITTY_GRAPHICS_TERMINALS) {
            PixelProtocol::Kitty
        } else if term.contains("sixel") || matches_any(SIXEL_TERMINALS) {
            PixelProtocol::Sixel
        } else {
            PixelProtocol::None
        };
        let pixel_protocol = env
            .pixel_protocol_override
            .as_deref()
            .and_then(|v| v.parse().ok())
            .unwrap_or(detected_protocol);

        let cell_pixels = env
            .cell_pixels_override
            .as_deref()
            .and_then(parse_cell_pixels)
            .unwrap_or_default();

        let (max_bitmap, color_registers) = match pixel_protocol {
            PixelProtocol::Sixel => (Some(SIXEL_MAX_BITMAP), 256),
            PixelProtocol::Kitty | PixelProtocol::None => (None, 0),
        };

        Self {
            utf8,
            quadrants,
            sextants,
            braille,
            pixel_protocol,
            cell_pixels,
            max_bitmap,
            color_registers,
        }
    }
}

/// Parse `WIDTHxHEIGHT` into a cell geometry; both axes must be nonzero.
fn parse_cell_pixels(s: &str) -> Option<CellPixels> {
    let (w, h) = s.trim().split_once(['x', 'X'])?;
    let width: u32 = w.trim().parse().ok()?;
    let height: u32 = h.trim().parse().ok()?;
    let cp = CellPixels::new(height, width);
    cp.is_known().then_some(cp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_env(term: &str, term_program: &str, locale: &str) -> DetectInputs {
        DetectInputs {
            term: term.to_string(),
            term_program: term_program.to_string(),
            locale: locale.to_string(),
            ..DetectInputs::default()
        }
    }

    #[test]
    fn basic_draws_ascii_only() {
        let caps = TerminalCapabilities::basic();
        assert!(!caps.utf8);
        assert!(!caps.can_halfblock());
        assert!(!caps.can_pixel());
        assert_eq!(caps.pixel_protocol, PixelProtocol::None);
        assert_eq!(TerminalCapabilities::dumb(), caps);
    }

    #[test]
    fn default_caps_are_basic() {
        assert_eq!(TerminalCapabilities::default(), TerminalCapabilities::basic());
    }

    #[test]
    fn detect_reads_live_environment() {
        let _ = TerminalCapabilities::detect();
    }

    #[test]
    fn dumb_term_gets_no_graphics() {
        let caps = TerminalCapabilities::detect_from_inputs(&make_env("dumb", "", "en_US.UTF-8"));
        assert!(!caps.utf8);
        assert!(!caps.can_braille());
        assert_eq!(caps.pixel_protocol, PixelProtocol::None);
    }

    #[test]
    fn empty_term_gets_no_utf8() {
        let caps = TerminalCapabilities::detect_from_inputs(&make_env("", "", "C.UTF-8"));
        assert!(!caps.utf8);
    }

    #[test]
    fn detect_utf8_from_locale() {
        let caps =
            TerminalCapabilities::detect_from_inputs(&make_env("xterm-256color", "", "en_US.utf8"));
        assert!(caps.utf8);
        assert!(caps.can_quadrant());
        assert!(!caps.can_sextant());
        assert_eq!(caps.pixel_protocol, PixelProtocol::None);
    }

    #[test]
    fn detect_posix_locale_is_ascii() {
        let caps = TerminalCapabilities::detect_from_inputs(&make_env("xterm", "", "POSIX"));
        assert!(!caps.utf8);
        assert!(!caps.can_halfblock());
    }

    #[test]
    fn kitty_window_id_enables_kitty_graphics() {
        let mut env = make_env("xterm-256color", "", "en_US.UTF-8");
        env.kitty_window_id = true;
        let caps = TerminalCapabilities::detect_from_inputs(&env);
        assert_eq!(caps.pixel_protocol, PixelProtocol::Kitty);
        assert!(caps.can_sextant());
        assert_eq!(caps.max_bitmap, None);
    }

    #[test]
    fn detect_kitty_by_term() {
        let caps =
            TerminalCapabilities::detect_from_inputs(&make_env("xterm-kitty", "", "en_US.UTF-8"));
        assert_eq!(caps.pixel_protocol, PixelProtocol::Kitty);
    }

    #[test]
    fn detect_wezterm_speaks_kitty_graphics() {
        let caps = TerminalCapabilities::detect_from_inputs(&make_env(
            "xterm-256color",
            "WezTerm",
            "en_US.UTF-8",
        ));
        assert_eq!(caps.pixel_protocol, PixelProtocol::Kitty);
        assert!(caps.can_sextant());
    }

    #[test]
    fn detect_foot_speaks_sixel() {
        let caps = TerminalCapabilities::detect_from_inputs(&make_env("foot", "", "en_US.UTF-8"));
        assert_eq!(caps.pixel_protocol, PixelProtocol::Sixel);
        assert_eq!(caps.max_bitmap, Some(SIXEL_MAX_BITMAP));
        assert_eq!(caps.color_registers, 256);
    }

    #[test]
    fn detect_sixel_term_suffix() {
        let caps =
            TerminalCapabilities::detect_from_inputs(&make_env("xterm-sixel", "", "en_US.UTF-8"));
        assert_eq!(caps.pixel_protocol, PixelProtocol::Sixel);
    }

    #[test]
    fn detect_linux_console() {
        let caps = TerminalCapabilities::detect_from_inputs(&make_env("linux", "", "en_US.UTF-8"));
        assert!(caps.can_halfblock());
        assert!(!caps.can_quadrant());
        assert!(!caps.can_sextant());
    }

    #[test]
    fn pixel_protocol_override_wins() {
        let mut env = make_env("xterm-kitty", "", "en_US.UTF-8");
        env.pixel_protocol_override = Some("none".into());
        let caps = TerminalCapabilities::detect_from_inputs(&env);
        assert_eq!(caps.pixel_protocol, PixelProtocol::None);

        env.pixel_protocol_override = Some("SIXEL".into());
        let caps = TerminalCapabilities::detect_from_inputs(&env);
        assert_eq!(caps.pixel_protocol, PixelProtocol::Sixel);
    }

    #[test]
    fn unparseable_protocol_override_is_ignored() {
        let mut env = make_env("xterm-kitty", "", "en_US.UTF-8");
        env.pixel_protocol_override = Some("iterm2".into());
        let caps = TerminalCapabilities::detect_from_inputs(&env);
        assert_eq!(caps.pixel_protocol, PixelProtocol::Kitty);
    }

    #[test]
    fn cell_pixels_require_override() {
        let mut env = make_env("xterm-kitty", "", "en_US.UTF-8");
        let caps = TerminalCapabilities::detect_from_inputs(&env);
        assert!(!caps.cell_pixels.is_known());
        assert!(!caps.can_pixel());

        env.cell_pixels_override = Some("10x20".into());
        let caps = TerminalCapabilities::detect_from_inputs(&env);
        assert_eq!(caps.cell_pixels, CellPixels::new(20, 10));
        assert!(caps.can_pixel());
    }

    #[test]
    fn parse_cell_pixels_rejects_garbage() {
        assert_eq!(parse_cell_pixels("8X16"), Some(CellPixels::new(16, 8)));
        assert_eq!(parse_cell_pixels(" 9 x 18 "), Some(CellPixels::new(18, 9)));
        assert_eq!(parse_cell_pixels("0x16"), None);
        assert_eq!(parse_cell_pixels("16"), None);
        assert_eq!(parse_cell_pixels("ax16"), None);
    }

    #[test]
    fn band_heights() {
        assert_eq!(PixelProtocol::Sixel.band_height(), 6);
        assert_eq!(PixelProtocol::Kitty.band_height(), 1);
        assert_eq!(PixelProtocol::None.band_height(), 1);
    }

    #[test]
    fn protocol_from_str_and_display() {
        for p in [PixelProtocol::None, PixelProtocol::Kitty, PixelProtocol::Sixel] {
            assert_eq!(p.to_string().parse::<PixelProtocol>(), Ok(p));
        }
        assert!("iterm2".parse::<PixelProtocol>().is_err());
    }

    #[test]
    fn profile_kitty_can_pixel() {
        let caps = TerminalCapabilities::kitty();
        assert!(caps.can_pixel());
        assert!(caps.can_sextant());
    }

    #[test]
    fn profile_sixel_is_bounded() {
        let caps = TerminalCapabilities::sixel();
        assert!(caps.can_pixel());
        assert!(!caps.can_sextant());
        assert_eq!(caps.max_bitmap, Some(Dims::new(1000, 1000)));
    }

    #[test]
    fn profile_modern_has_glyphs_but_no_bitmaps() {
        let caps = TerminalCapabilities::modern();
        assert!(caps.can_sextant() && caps.can_braille() && caps.can_quadrant());
        assert!(!caps.can_pixel());
    }

    #[test]
    fn glyph_predicates_require_utf8() {
        let caps = TerminalCapabilities::builder()
            .quadrants(true)
            .sextants(true)
            .braille(true)
            .build();
        assert!(!caps.can_quadrant());
        assert!(!caps.can_sextant());
        assert!(!caps.can_braille());
    }

    #[test]
    fn builder_starts_from_basic() {
        let caps = CapabilityProfileBuilder::new().build();
        assert!(!caps.utf8);
        assert_eq!(caps.pixel_protocol, PixelProtocol::None);
    }

    #[test]
    fn builder_adjusts_existing_caps() {
        let caps = CapabilityProfileBuilder::starting_from(TerminalCapabilities::kitty())
            .cell_pixels(16, 8)
            .build();
        assert_eq!(caps.pixel_protocol, PixelProtocol::Kitty);
        assert!(caps.can_sextant());
        assert_eq!(caps.cell_pixels, CellPixels::new(16, 8));
    }

    #[test]
    fn builder_sets_sixel_limits() {
        let caps = CapabilityProfileBuilder::default()
            .utf8(true)
            .pixel_protocol(PixelProtocol::Sixel)
            .cell_pixels(12, 6)
            .max_bitmap(120, 240)
            .color_registers(1024)
            .build();
        assert!(caps.can_pixel());
        assert_eq!(caps.max_bitmap, Some(Dims::new(120, 240)));
        assert_eq!(caps.color_registers, 1024);
    }
}
