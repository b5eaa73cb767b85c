use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays parseable; `verbose` lowers the default level to debug.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
