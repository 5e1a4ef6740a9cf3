//! Shared test plumbing.

use std::sync::Once;

static INIT: Once = Once::new();

/// Install the tracing subscriber once per test binary.
///
/// Honors `RUST_LOG`; output goes through the test writer so it interleaves
/// with the harness capture instead of spamming the terminal.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
