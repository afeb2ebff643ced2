//! Lightweight structured logging for the gatefs workspace.
//!
//! Emission is controlled by the `GATEFS_LOG` environment variable:
//! `off` (default), `error`, `warn`, `info`, or `debug`.

use std::sync::Once;

// Re-export emit so the macros below expand inside dependent crates.
pub use emit;

static INIT: Once = Once::new();

fn parse_level(s: &str) -> Option<emit::Level> {
    match s {
        "debug" => Some(emit::Level::Debug),
        "info" => Some(emit::Level::Info),
        "warn" => Some(emit::Level::Warn),
        "error" => Some(emit::Level::Error),
        _ => None,
    }
}

/// Initialize diagnostics from `GATEFS_LOG`.
///
/// Safe to call more than once; only the first call takes effect.
pub fn init_diagnostics() {
    INIT.call_once(|| {
        let setting = std::env::var("GATEFS_LOG").unwrap_or_else(|_| "off".to_string());
        if setting == "off" {
            return;
        }
        let level = parse_level(&setting).unwrap_or(emit::Level::Info);
        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(level))
            .init();
        // The runtime must outlive every emitting call site.
        std::mem::forget(rt);
    });
}

/// Log routine operations (resolutions, cache loads, constructions).
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log detailed internals (cache hits, expiry decisions, stripped paths).
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log recoverable conditions (fallbacks, not-found conversions).
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Log failures that abort the current operation.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}
