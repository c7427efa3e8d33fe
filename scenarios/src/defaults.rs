use tracing_subscriber::{EnvFilter, fmt};

/// Install the fmt subscriber with `RUST_LOG` filtering, defaulting to info.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}
