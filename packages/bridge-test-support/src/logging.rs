//! Test logging bootstrap

use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Install a test-friendly subscriber once per test binary.
///
/// Level precedence: `TEST_LOG`, then `RUST_LOG`, then `warn`. Output goes
/// through the test writer so cargo captures it per test. Safe to call from
/// every test; only the first call does anything.
pub fn init() {
    INITIALIZED.get_or_init(|| {
        let filter = std::env::var("TEST_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .map(EnvFilter::new)
            .unwrap_or_else(|_| EnvFilter::new("warn"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .without_time()
            .try_init()
            .ok();
    });
}
