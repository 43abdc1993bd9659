//! Process-wide tracing/logging setup shared by the binaries.

/// Initialize process-wide observability with JSON output.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    self::tracing::init_with(self::tracing::LogFormat::Json);
}

/// Tracing configuration (filters, output format).
pub mod tracing;
