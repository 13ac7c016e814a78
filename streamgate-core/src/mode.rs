//! Runtime mode configuration for Streamgate.

use serde::{Deserialize, Serialize};

/// Runtime mode for Streamgate services.
///
/// Controls whether files are served from the Telegram storage channel or
/// from an in-memory simulated backend seeded from a local directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RuntimeMode {
    /// Production mode - Telegram Bot API backend and ingestion
    Production,
    /// Development mode - simulated backend for offline development
    #[default]
    Development,
}

impl RuntimeMode {
    /// Whether files come from Telegram and the update poller must run.
    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Production => write!(f, "PRODUCTION"),
            Self::Development => write!(f, "DEVELOPMENT"),
        }
    }
}

impl std::str::FromStr for RuntimeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            _ => Err(format!(
                "Invalid runtime mode: '{s}'. Valid options are: production, development"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        assert_eq!("prod".parse::<RuntimeMode>(), Ok(RuntimeMode::Production));
        assert_eq!(
            "Development".parse::<RuntimeMode>(),
            Ok(RuntimeMode::Development)
        );
        assert!("staging".parse::<RuntimeMode>().is_err());
    }

    #[test]
    fn test_default_is_development() {
        assert_eq!(RuntimeMode::default(), RuntimeMode::Development);
        assert!(!RuntimeMode::default().is_production());
        assert!(RuntimeMode::Production.is_production());
    }
}
