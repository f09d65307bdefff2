//! Process-wide tracing setup shared by the coachgate binaries.

/// Tracing configuration (filters, formats).
pub mod tracing;

pub use self::tracing::LogFormat;

/// Initialize process-wide tracing.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init(format: LogFormat) {
    self::tracing::init(format);
}

/// Initialize with the format selected by `LOG_FORMAT`.
pub fn init_from_env() {
    init(LogFormat::from_env());
}
