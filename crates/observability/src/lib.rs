//! Process-wide tracing setup.

pub mod subscriber;

pub use subscriber::{LogFormat, LogSettings};

/// Install the default subscriber: JSON lines, filtered by `RUST_LOG`
/// (falling back to `info`).
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    subscriber::install(&LogSettings::default());
}

/// Install a subscriber built from explicit settings. No-op if one is already set.
pub fn init_with(settings: &LogSettings) {
    subscriber::install(settings);
}
