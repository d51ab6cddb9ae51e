//! Process-wide tracing setup.

/// Initialize tracing/logging in the given output format.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init(format: LogFormat) {
    tracing::init(format);
}

/// Subscriber construction (filters, formatters).
pub mod tracing;

pub use tracing::{LogFormat, ParseLogFormatError};
