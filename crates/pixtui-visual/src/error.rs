#![forbid(unsafe_code)]

//! Error types for visual rendering.
//!
//! Each layer has its own enum; [`VisualError`] unifies them for the public
//! entry points. Failures abort the current call only and leave previously
//! committed state untouched.

use std::fmt;

use pixtui_core::geometry::{CellPixels, Dims, Window};
use pixtui_render::plane::PlaneError;

/// Axis named in placement and alignment errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Rows.
    Vertical,
    /// Columns.
    Horizontal,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vertical => "y",
            Self::Horizontal => "x",
        })
    }
}

/// Crop, scale and placement failures from the geometry resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    /// The crop origin lies outside the source raster.
    CropOrigin { y: u32, x: u32, source: Dims },
    /// An explicit crop length runs past the source raster's edge.
    CropPastEdge { window: Window, source: Dims },
    /// The resolved window or display has no area.
    ZeroArea,
    /// An aligned axis was given a value outside `0..=3`.
    BadAlignment { axis: Axis, value: i32 },
    /// `CHILDPLANE` was requested without a parent plane.
    ChildPlaneWithoutParent,
    /// An unscaled bitmap does not fit the supplied plane.
    BitmapTooLarge { cells: Dims, plane: Dims },
    /// Bitmaps must be placed at the plane origin unless aligned.
    NonOriginPlacement { axis: Axis, value: i32 },
    /// An aligned bitmap is larger than the space it is aligned in.
    AlignOverflow { axis: Axis, len: u32, avail: u32 },
    /// No blitter the terminal can draw satisfies the request.
    NoBlitter { requested: &'static str },
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CropOrigin { y, x, source } => write!(
                f,
                "crop origin {y}/{x} outside {}x{} source",
                source.rows, source.cols
            ),
            Self::CropPastEdge { window, source } => write!(
                f,
                "crop {}x{}+{}+{} exceeds {}x{} source",
                window.rows, window.cols, window.y, window.x, source.rows, source.cols
            ),
            Self::ZeroArea => write!(f, "zero-area geometry"),
            Self::BadAlignment { axis, value } => {
                write!(f, "bad {axis} alignment {value}")
            }
            Self::ChildPlaneWithoutParent => write!(f, "child plane requested without a parent"),
            Self::BitmapTooLarge { cells, plane } => write!(
                f,
                "bitmap needs {}x{} cells, plane is {}x{}",
                cells.rows, cells.cols, plane.rows, plane.cols
            ),
            Self::NonOriginPlacement { axis, value } => {
                write!(f, "non-origin {axis} placement {value} for bitmap")
            }
            Self::AlignOverflow { axis, len, avail } => {
                write!(f, "aligned {axis} extent {len}px exceeds {avail}px")
            }
            Self::NoBlitter { requested } => write!(f, "no usable blitter for {requested}"),
        }
    }
}

impl std::error::Error for GeometryError {}

/// Bitmap protocol failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The protocol cannot perform this operation.
    Unsupported(&'static str),
    /// The staged payload is shorter than its pixel geometry requires.
    PayloadTooShort { needed: usize, len: usize },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported(op) => write!(f, "protocol does not support {op}"),
            Self::PayloadTooShort { needed, len } => {
                write!(f, "payload has {len} bytes, needs {needed}")
            }
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Sprixel lifecycle failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SprixelError {
    /// The handle refers to a freed sprixel.
    Stale,
    /// The sprixel is hidden and no longer bound to a plane.
    Hidden,
    /// Cell coordinate outside the sprixel.
    BadCell { y: u32, x: u32, cells: Dims },
    /// Payload pixel geometry disagrees with the sprixel's cell geometry.
    InconsistentGeometry {
        pixels: Dims,
        cells: Dims,
        cell_pixels: CellPixels,
    },
    /// The protocol failed to wipe a cell; the cell is marked annihilated anyway.
    WipeFailed(ProtocolError),
    /// The protocol failed to rebuild an annihilated cell; it stays annihilated.
    RestoreFailed(ProtocolError),
}

impl fmt::Display for SprixelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stale => write!(f, "stale sprixel handle"),
            Self::Hidden => write!(f, "sprixel is hidden"),
            Self::BadCell { y, x, cells } => write!(
                f,
                "cell {y}/{x} outside {}x{} sprixel",
                cells.rows, cells.cols
            ),
            Self::InconsistentGeometry {
                pixels,
                cells,
                cell_pixels,
            } => write!(
                f,
                "{}x{} pixels do not cover {}x{} cells of {}x{} pixels",
                pixels.rows,
                pixels.cols,
                cells.rows,
                cells.cols,
                cell_pixels.height,
                cell_pixels.width
            ),
            Self::WipeFailed(e) => write!(f, "cell wipe failed: {e}"),
            Self::RestoreFailed(e) => write!(f, "cell restore failed: {e}"),
        }
    }
}

impl std::error::Error for SprixelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::WipeFailed(e) | Self::RestoreFailed(e) => Some(e),
            _ => None,
        }
    }
}

/// Decode backend failures.
#[derive(Debug)]
pub enum BackendError {
    /// The backend was built without this capability.
    CapabilityAbsent(&'static str),
    /// Decoding failed.
    Decode(String),
    /// Resampling failed.
    Resize(String),
    /// I/O error while reading media.
    Io(std::io::Error),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapabilityAbsent(what) => write!(f, "backend cannot {what}"),
            Self::Decode(msg) => write!(f, "decode error: {msg}"),
            Self::Resize(msg) => write!(f, "resize error: {msg}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Top-level error for visual operations.
#[derive(Debug)]
pub enum VisualError {
    /// Geometry resolution failed.
    Geometry(GeometryError),
    /// Sprixel lifecycle failure.
    Sprixel(SprixelError),
    /// Bitmap protocol failure.
    Protocol(ProtocolError),
    /// Decode backend failure.
    Backend(BackendError),
    /// Plane operation on an existing plane failed.
    Plane(PlaneError),
    /// Bitmaps cannot be drawn onto the standard plane.
    StandardPlane,
    /// The output plane could not be created.
    PlaneCreate(PlaneError),
    /// The emitter failed.
    Emit(String),
    /// Pixel coordinate outside the visual.
    OutOfBounds { y: u32, x: u32, dims: Dims },
    /// Row stride unusable for the given width and pixel size.
    InvalidStride { stride: usize, cols: u32, bpp: usize },
    /// Scale factor must be at least one.
    InvalidScale(u32),
}

impl fmt::Display for VisualError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Geometry(e) => write!(f, "geometry: {e}"),
            Self::Sprixel(e) => write!(f, "sprixel: {e}"),
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Backend(e) => write!(f, "backend: {e}"),
            Self::Plane(e) => write!(f, "plane: {e}"),
            Self::StandardPlane => write!(f, "won't draw bitmaps to the standard plane"),
            Self::PlaneCreate(e) => write!(f, "couldn't create output plane: {e}"),
            Self::Emit(msg) => write!(f, "emit: {msg}"),
            Self::OutOfBounds { y, x, dims } => write!(
                f,
                "pixel {y}/{x} outside {}x{} visual",
                dims.rows, dims.cols
            ),
            Self::InvalidStride { stride, cols, bpp } => write!(
                f,
                "stride {stride} invalid for {cols} columns of {bpp} bytes"
            ),
            Self::InvalidScale(s) => write!(f, "invalid scale {s}"),
        }
    }
}

impl std::error::Error for VisualError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Geometry(e) => Some(e),
            Self::Sprixel(e) => Some(e),
            Self::Protocol(e) => Some(e),
            Self::Backend(e) => Some(e),
            Self::Plane(e) | Self::PlaneCreate(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GeometryError> for VisualError {
    fn from(e: GeometryError) -> Self {
        Self::Geometry(e)
    }
}

impl From<SprixelError> for VisualError {
    fn from(e: SprixelError) -> Self {
        Self::Sprixel(e)
    }
}

impl From<ProtocolError> for VisualError {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

impl From<BackendError> for VisualError {
    fn from(e: BackendError) -> Self {
        Self::Backend(e)
    }
}

impl From<PlaneError> for VisualError {
    fn from(e: PlaneError) -> Self {
        Self::Plane(e)
    }
}
