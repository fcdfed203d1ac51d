//! Tracing/logging initialization.
//!
//! JSON lines on stdout, filtered by `RUST_LOG` or the configured level. A
//! panic hook routes panics through the same pipeline so a crashing request
//! task is logged instead of only printed to stderr.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static PANIC_HOOK: Once = Once::new();

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();

    install_panic_hook();
}

fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let location = info
                .location()
                .map(|l| format!("{}:{}", l.file(), l.line()))
                .unwrap_or_default();
            ::tracing::error!(panic = %info, location = %location, "unhandled panic");
            previous(info);
        }));
    });
}
