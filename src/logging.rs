use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber. `RUST_LOG` takes precedence over `verbosity`
/// (0 warn, 1 info, 2+ debug). Safe to call more than once.
pub fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
