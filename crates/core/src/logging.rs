//! Logging setup
//!
//! Everything logs through `tracing`. A host calls [`init`] once at startup;
//! later calls leave the installed subscriber in place.

use tracing_subscriber::EnvFilter;

use crate::config::CoreConfig;

/// Environment variable holding an `EnvFilter` directive
pub const LOG_ENV: &str = "METAPLUG_LOG";

/// Filter directive used when `METAPLUG_LOG` is unset or invalid
pub fn default_directive(config: &CoreConfig) -> &'static str {
    if config.debug {
        "debug"
    } else {
        "info"
    }
}

fn env_filter(config: &CoreConfig) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directive(config)))
}

/// Install the fmt subscriber
///
/// Returns false if a global subscriber was already set.
pub fn init(config: &CoreConfig) -> bool {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_thread_names(true)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!("Logging initialized ({})", default_directive(config));
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_follows_debug_flag() {
        let mut config = CoreConfig::default();
        assert_eq!(default_directive(&config), "info");
        config.debug = true;
        assert_eq!(default_directive(&config), "debug");
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = CoreConfig::default();
        init(&config);
        assert!(!init(&config));
    }
}
