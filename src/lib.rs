pub mod analysis;
pub mod commands;
pub mod error;
pub mod models;

pub use error::{GhostError, Result};

/// Install the process-wide logger. `RUST_LOG` overrides the default `info`
/// level. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .try_init();
}
