use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the stderr subscriber. `RUST_LOG` wins over `--verbose`.
///
/// Library crates log through the `log` facade; the subscriber's log bridge
/// picks those records up.
pub fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let default_filter = format!(
        "critsim={level},critsim_core={level},critsim_validate={level},critsim_sweep={level}"
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));

    let result = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .with_thread_names(verbose),
        )
        .try_init();
    if let Err(e) = result {
        eprintln!("Warning: logging already initialized: {e}");
    }
}
