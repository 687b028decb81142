//! Logging setup shared by the binaries.

/// Subscriber configuration (format, filter).
pub mod logging;

pub use logging::LogFormat;

/// Initialize process-wide logging from the environment.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    logging::init(LogFormat::from_env());
}
