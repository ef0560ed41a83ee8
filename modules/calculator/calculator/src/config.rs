use serde::{Deserialize, Serialize};

/// Default listen address of the calculator service.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:9494";

/// Calculator service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalculatorConfig {
    /// `host:port` the session manager listens on.
    pub listen_addr: String,
    /// Log every protocol message of every session.
    pub debug_transport: bool,
    pub logging: LoggingConfig,
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_owned(),
            debug_transport: true,
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive used when neither `RUST_LOG` nor `-v` is given.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            json: false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = CalculatorConfig::default();
        assert_eq!(config.listen_addr, "127.0.0.1:9494");
        assert!(config.debug_transport);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: CalculatorConfig =
            serde_json::from_value(serde_json::json!({ "debug_transport": false })).unwrap();
        assert_eq!(config.listen_addr, DEFAULT_LISTEN_ADDR);
        assert!(!config.debug_transport);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<CalculatorConfig, _> =
            serde_json::from_value(serde_json::json!({ "listen": "0.0.0.0:1" }));
        assert!(result.is_err());
    }
}
