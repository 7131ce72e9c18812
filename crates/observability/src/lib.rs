//! Logging setup shared by every binary in the workspace.

/// Tracing subscriber configuration.
pub mod tracing;

pub use crate::tracing::LogFormat;

/// Initialize process-wide JSON logging at `info` unless `RUST_LOG` says otherwise.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    crate::tracing::init(LogFormat::Json, "info");
}

/// Initialize with an explicit output format and fallback filter.
pub fn init_with(format: LogFormat, default_filter: &str) {
    crate::tracing::init(format, default_filter);
}
