use erk::{AnyError, Kind, set_strict_mode, unset_strict_mode};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct Example;

impl Kind for Example {}

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct Other;

impl Kind for Other {}

#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .with_test_writer()
        .try_init();
}

/// Runs `check` with the strict gate forced to `enabled`, then resets it.
#[allow(dead_code)]
pub fn with_strict_mode<F, T>(enabled: bool, check: F) -> T
where
    F: FnOnce() -> T,
{
    struct Reset;

    impl Drop for Reset {
        fn drop(&mut self) {
            unset_strict_mode();
        }
    }

    init_tracing();
    set_strict_mode(enabled);
    let _reset = Reset;
    check()
}

#[allow(dead_code)]
pub fn msg(message: &str) -> AnyError {
    AnyError::msg(message)
}
