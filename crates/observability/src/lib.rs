//! Tracing/logging setup shared by every binary.

/// Tracing configuration (filters, layers, panic reporting).
pub mod tracing;

/// Initialize process-wide observability with the default `info` level.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init("info");
}

/// Initialize process-wide observability; `RUST_LOG` wins over `default_level`.
pub fn init_with_level(default_level: &str) {
    tracing::init(default_level);
}
