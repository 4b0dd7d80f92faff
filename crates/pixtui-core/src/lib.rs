#![forbid(unsafe_code)]

//! Core: pixel/cell geometry, terminal graphics capabilities, and logging.

pub mod geometry;
pub mod logging;
pub mod terminal_capabilities;

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{
    debug, debug_span, error, error_span, info, info_span, trace, trace_span, warn, warn_span,
};
