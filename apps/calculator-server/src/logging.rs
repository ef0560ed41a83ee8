//! Subscriber installation for the binary.

use anyhow::Context;
use calculator::LoggingConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Filter directive for `-v` counts; `None` when no flag was given.
fn verbosity_directive(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

/// Pick the filter: `RUST_LOG`, then `-v`, then the configured level.
fn resolve_filter(config: &LoggingConfig, verbose: u8) -> anyhow::Result<EnvFilter> {
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return EnvFilter::try_from_default_env().context("invalid RUST_LOG directive");
    }
    let directive = verbosity_directive(verbose).unwrap_or(config.level.as_str());
    EnvFilter::try_new(directive)
        .with_context(|| format!("invalid logging level '{directive}'"))
}

/// Install the global subscriber. Logs go to stderr so that stdout stays
/// reserved for command output.
///
/// # Errors
/// Fails on an invalid filter directive or if a subscriber is already set.
pub fn init(config: &LoggingConfig, verbose: u8) -> anyhow::Result<()> {
    let filter = resolve_filter(config, verbose)?;
    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(verbosity_directive(0), None);
        assert_eq!(verbosity_directive(1), Some("info"));
        assert_eq!(verbosity_directive(2), Some("debug"));
        assert_eq!(verbosity_directive(7), Some("trace"));
    }
}
