//! # Logging Setup
//!
//! Installs a `tracing` subscriber printing compact lines to `stderr`. The
//! `RUST_LOG` environment variable takes precedence over the verbosity flag.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// The filter for a number of `-v` flags
#[must_use]
pub fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn,ilpconv=info",
        1 => "info,ilpconv=debug",
        _ => "debug",
    }
}

/// Initializes logging for a command line tool
pub fn init_cli_logger(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn filters_parse() {
        for verbosity in 0..3 {
            assert!(
                tracing_subscriber::EnvFilter::try_new(super::default_filter(verbosity)).is_ok()
            );
        }
    }
}
