//! Logging setup
//!
//! Installs a `tracing` subscriber for host processes and tests. The
//! library itself only emits `tracing` events; hosts that already have a
//! subscriber can skip this entirely.

use tracing_subscriber::EnvFilter;

/// Initialize logging (WARN level by default, use RUST_LOG=info for more).
///
/// Safe to call more than once; later calls are ignored.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .try_init();
}
