/// Log output setup for the command-line tools.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a stderr subscriber, filtered by `RUST_LOG` (default `info`).
pub fn init_logging() {
  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
  tracing_subscriber::registry()
    .with(env_filter)
    .with(fmt_layer)
    .init();
}
