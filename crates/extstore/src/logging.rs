//! Subscriber setup for binaries. Library crates only emit events.

use extstore_error::{ExtError, Result};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Overrides [`LoggingConfig::level`] when set.
pub const LOG_ENV: &str = "EXTSTORE_LOG";

/// Install the global subscriber, writing to stderr.
///
/// Fails if a subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|err| ExtError::config(format!("invalid log filter: {err}")))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|err| ExtError::internal(format!("tracing subscriber: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_refused() {
        let config = LoggingConfig {
            level: "warn".to_owned(),
            json: true,
        };
        init(&config).expect("first init");
        tracing::warn!(check = true, "subscriber installed");
        assert!(matches!(init(&config), Err(ExtError::Internal(_))));
    }
}
