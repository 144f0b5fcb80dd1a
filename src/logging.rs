// Logging setup
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins over the debug flag.
pub fn init(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A subscriber may already be set (tests, embedding)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(debug)
        .try_init();

    if debug {
        tracing::debug!("Extensive logging enabled");
    }
}
