#![forbid(unsafe_code)]

//! Visuals: RGBA rasters rendered to terminal planes.
//!
//! A [`Visual`](visual::Visual) is drawn either as glyph cells (half blocks and
//! friends) or, on terminals with a bitmap protocol, as a *sprixel*: a native
//! bitmap bound to a plane whose per-cell transparency is tracked so text can
//! be drawn over it without retransmitting the image.
//!
//! The entry point is [`VisualContext::render`](render::VisualContext::render).

pub mod backend;
pub mod blitter;
pub mod emit;
pub mod error;
pub mod geometry;
pub mod pixels;
pub mod protocol;
pub mod render;
pub mod sprixel;
pub mod tam;
pub mod transform;
pub mod visual;

pub use blitter::{Blitter, Scaling};
pub use error::VisualError;
pub use geometry::{VisualFlags, VisualOptions};
pub use render::VisualContext;
pub use visual::Visual;
