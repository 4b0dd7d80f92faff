#![forbid(unsafe_code)]

//! Render kernel: colors, cells, and the plane pile images are drawn into.

pub mod cell;
pub mod plane;
