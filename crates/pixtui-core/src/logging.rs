#![forbid(unsafe_code)]

//! Logging facade.
//!
//! With the `tracing` feature the usual `tracing` macros are re-exported here
//! and at the crate root. Without it, macros of the same names expand to
//! nothing (span macros expand to [`NoopSpan`]), so call sites compile
//! identically in both configurations:
//!
//! ```
//! use pixtui_core::logging::SpanExt;
//!
//! let _span = pixtui_core::debug_span!("visual_render", rows = 4).entered_or_noop();
//! pixtui_core::debug!(blitter = "half", "selected blitter");
//! ```
//!
//! The `tracing-json` feature adds [`init_json_subscriber`], which installs a
//! global JSON formatter filtered by `RUST_LOG`.

#[cfg(feature = "tracing")]
pub use tracing::{
    debug, debug_span, error, error_span, info, info_span, trace, trace_span, warn, warn_span,
};

#[cfg(not(feature = "tracing"))]
mod noop_macros {
    /// No-op `trace!` when tracing is disabled.
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }

    /// No-op `debug!` when tracing is disabled.
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {};
    }

    /// No-op `info!` when tracing is disabled.
    #[macro_export]
    macro_rules! info {
        ($($arg:tt)*) => {};
    }

    /// No-op `warn!` when tracing is disabled.
    #[macro_export]
    macro_rules! warn {
        ($($arg:tt)*) => {};
    }

    /// No-op `error!` when tracing is disabled.
    #[macro_export]
    macro_rules! error {
        ($($arg:tt)*) => {};
    }

    /// No-op `trace_span!`.
    #[macro_export]
    macro_rules! trace_span {
        ($($arg:tt)*) => {
            $crate::logging::NoopSpan
        };
    }

    /// No-op `debug_span!`.
    #[macro_export]
    macro_rules! debug_span {
        ($($arg:tt)*) => {
            $crate::logging::NoopSpan
        };
    }

    /// No-op `info_span!`.
    #[macro_export]
    macro_rules! info_span {
        ($($arg:tt)*) => {
            $crate::logging::NoopSpan
        };
    }

    /// No-op `warn_span!`.
    #[macro_export]
    macro_rules! warn_span {
        ($($arg:tt)*) => {
            $crate::logging::NoopSpan
        };
    }

    /// No-op `error_span!`.
    #[macro_export]
    macro_rules! error_span {
        ($($arg:tt)*) => {
            $crate::logging::NoopSpan
        };
    }
}

/// Uniform way to enter a span whether or not tracing is compiled in.
///
/// `tracing::Span::entered` and [`NoopSpan::entered`] have different return
/// types; this trait gives call sites one spelling for both.
pub trait SpanExt {
    /// Guard returned by [`entered_or_noop`](Self::entered_or_noop).
    type Guard;

    /// Enter the span, returning a guard that exits it on drop.
    fn entered_or_noop(self) -> Self::Guard;
}

#[cfg(feature = "tracing")]
impl SpanExt for tracing::Span {
    type Guard = tracing::span::EnteredSpan;

    fn entered_or_noop(self) -> Self::Guard {
        self.entered()
    }
}

/// Span stand-in used when tracing is disabled.
#[cfg(not(feature = "tracing"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSpan;

#[cfg(not(feature = "tracing"))]
impl NoopSpan {
    /// Enter the span (does nothing).
    pub fn enter(&self) -> NoopGuard {
        NoopGuard
    }

    /// Enter the span by value (does nothing).
    pub fn entered(self) -> NoopGuard {
        NoopGuard
    }
}

#[cfg(not(feature = "tracing"))]
impl SpanExt for NoopSpan {
    type Guard = NoopGuard;

    fn entered_or_noop(self) -> Self::Guard {
        NoopGuard
    }
}

/// Guard returned by entering a [`NoopSpan`].
#[cfg(not(feature = "tracing"))]
#[derive(Debug)]
pub struct NoopGuard;

/// Error returned when a global subscriber is already installed.
#[cfg(feature = "tracing-json")]
#[derive(Debug)]
pub struct SubscriberInitError(String);

#[cfg(feature = "tracing-json")]
impl std::fmt::Display for SubscriberInitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to install JSON subscriber: {}", self.0)
    }
}

#[cfg(feature = "tracing-json")]
impl std::error::Error for SubscriberInitError {}

/// Install a global JSON subscriber filtered by `RUST_LOG` (default `info`).
///
/// Fails if another global subscriber was installed first.
#[cfg(feature = "tracing-json")]
pub fn init_json_subscriber() -> Result<(), SubscriberInitError> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(true)
        .try_init()
        .map_err(|e| SubscriberInitError(e.to_string()))
}
