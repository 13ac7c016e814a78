//! Centralized configuration for Streamgate.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::time::Duration;

use crate::mode::RuntimeMode;
use crate::{GatewayError, Result};

/// Baseline size of chunks written to clients.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024; // 8 KiB

/// Largest file the public Bot API lets a bot download.
pub const DEFAULT_MAX_DOWNLOAD_BYTES: u64 = 20 * 1024 * 1024; // 20 MiB

/// Central configuration for all Streamgate components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub streaming: StreamingConfig,
    pub telegram: TelegramConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Externally reachable base URL used in links handed to users
    pub public_base_url: Option<String>,
    /// How long in-flight streams may keep running after shutdown starts
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            public_base_url: None,
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    /// Base URL for user-facing links, without a trailing slash.
    ///
    /// Falls back to `http://<host>:<port>` when no public URL is configured.
    pub fn public_base_url(&self) -> String {
        match &self.public_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.host, self.port),
        }
    }
}

/// What to do with a `Range` header that is present but not understood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedRangePolicy {
    /// Ignore the header and serve the whole object with 200
    #[default]
    Lenient,
    /// Answer 400 Bad Request
    Reject,
}

/// Streaming and backend fetch configuration.
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Upper bound on the size of each chunk written to a client
    pub chunk_size: usize,
    /// Bound on backend open plus first chunk before headers are sent
    pub backend_timeout: Duration,
    /// Handling of unparseable `Range` headers
    pub malformed_range: MalformedRangePolicy,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            backend_timeout: Duration::from_secs(30),
            malformed_range: MalformedRangePolicy::Lenient,
        }
    }
}

/// Telegram Bot API configuration.
///
/// Only required in production mode.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Bot token issued by BotFather
    pub bot_token: Option<String>,
    /// Private channel the bot forwards files into for storage
    pub storage_channel_id: Option<i64>,
    /// Bot API server base URL
    pub api_base_url: String,
    /// Long-poll timeout for `getUpdates`
    pub poll_timeout: Duration,
    /// Timeout for non-streaming Bot API calls
    pub request_timeout: Duration,
    /// Files above this size are refused at ingest. A self-hosted Bot API
    /// server lifts the public 20 MiB download cap.
    pub max_download_bytes: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            storage_channel_id: None,
            api_base_url: "https://api.telegram.org".to_string(),
            poll_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
            max_download_bytes: DEFAULT_MAX_DOWNLOAD_BYTES,
        }
    }
}

impl GatewayConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Server configuration overrides
        if let Ok(host) = std::env::var("STREAMGATE_HOST") {
            config.server.host = host;
        }

        // Hosting platforms hand out the port through PORT
        for key in ["PORT", "STREAMGATE_PORT"] {
            if let Ok(port) = std::env::var(key)
                && let Ok(port) = port.parse::<u16>()
            {
                config.server.port = port;
            }
        }

        if let Ok(grace) = std::env::var("STREAMGATE_SHUTDOWN_GRACE")
            && let Ok(seconds) = grace.parse::<u64>()
        {
            config.server.shutdown_grace = Duration::from_secs(seconds);
        }

        if let Ok(url) = std::env::var("STREAMGATE_PUBLIC_URL") {
            config.server.public_base_url = Some(url);
        } else if let Ok(domain) = std::env::var("VERCEL_URL") {
            config.server.public_base_url = Some(format!("https://{domain}"));
        }

        // Streaming configuration overrides
        if let Ok(size) = std::env::var("STREAMGATE_CHUNK_SIZE")
            && let Ok(size) = size.parse::<usize>()
        {
            config.streaming.chunk_size = size;
        }

        if let Ok(timeout) = std::env::var("STREAMGATE_BACKEND_TIMEOUT")
            && let Ok(seconds) = timeout.parse::<u64>()
        {
            config.streaming.backend_timeout = Duration::from_secs(seconds);
        }

        if let Ok(strict) = std::env::var("STREAMGATE_STRICT_RANGES")
            && strict.parse().unwrap_or(false)
        {
            config.streaming.malformed_range = MalformedRangePolicy::Reject;
        }

        // Telegram configuration overrides
        if let Ok(token) = std::env::var("STREAMGATE_BOT_TOKEN") {
            config.telegram.bot_token = Some(token);
        }

        if let Ok(channel) = std::env::var("STREAMGATE_STORAGE_CHANNEL")
            && let Ok(channel_id) = channel.parse::<i64>()
        {
            config.telegram.storage_channel_id = Some(channel_id);
        }

        if let Ok(api) = std::env::var("STREAMGATE_TELEGRAM_API") {
            config.telegram.api_base_url = api;
        }

        if let Ok(limit) = std::env::var("STREAMGATE_MAX_DOWNLOAD_BYTES")
            && let Ok(bytes) = limit.parse::<u64>()
        {
            config.telegram.max_download_bytes = bytes;
        }

        config
    }

    /// Creates a configuration optimized for testing.
    ///
    /// Small chunks and a short backend timeout keep tests fast while
    /// still exercising multi-chunk responses.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                public_base_url: Some("http://streamgate.test".to_string()),
                shutdown_grace: Duration::from_millis(200),
            },
            streaming: StreamingConfig {
                chunk_size: 1024,
                backend_timeout: Duration::from_secs(2),
                malformed_range: MalformedRangePolicy::Lenient,
            },
            telegram: TelegramConfig::default(),
        }
    }

    /// Checks that the configuration can run in `mode`.
    ///
    /// # Errors
    /// - `GatewayError::Configuration` - Zero chunk size or timeout, or
    ///   missing Telegram credentials in production mode
    pub fn validate(&self, mode: RuntimeMode) -> Result<()> {
        if self.streaming.chunk_size == 0 {
            return Err(GatewayError::Configuration {
                reason: "chunk size must be greater than zero".to_string(),
            });
        }
        if self.streaming.backend_timeout.is_zero() {
            return Err(GatewayError::Configuration {
                reason: "backend timeout must be greater than zero".to_string(),
            });
        }

        if mode.is_production() {
            if self.telegram.bot_token.is_none() {
                return Err(GatewayError::Configuration {
                    reason: "STREAMGATE_BOT_TOKEN is required in production mode".to_string(),
                });
            }
            if self.telegram.storage_channel_id.is_none() {
                return Err(GatewayError::Configuration {
                    reason: "STREAMGATE_STORAGE_CHANNEL is required in production mode"
                        .to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = GatewayConfig::default();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.streaming.chunk_size, 8192);
        assert_eq!(config.streaming.backend_timeout, Duration::from_secs(30));
        assert_eq!(
            config.streaming.malformed_range,
            MalformedRangePolicy::Lenient
        );
        assert_eq!(config.telegram.api_base_url, "https://api.telegram.org");
        assert!(config.telegram.bot_token.is_none());
        assert_eq!(config.telegram.max_download_bytes, 20 * 1024 * 1024);
        assert_eq!(config.server.shutdown_grace, Duration::from_secs(10));
    }

    #[test]
    fn test_public_base_url() {
        let mut server = ServerConfig::default();
        assert_eq!(server.public_base_url(), "http://0.0.0.0:8080");

        server.public_base_url = Some("https://files.example.com/".to_string());
        assert_eq!(server.public_base_url(), "https://files.example.com");
    }

    #[test]
    fn test_validate() {
        let config = GatewayConfig::default();
        assert!(config.validate(RuntimeMode::Development).is_ok());
        assert!(config.validate(RuntimeMode::Production).is_err());

        let mut production = GatewayConfig::default();
        production.telegram.bot_token = Some("123:abc".to_string());
        production.telegram.storage_channel_id = Some(-1001234567890);
        assert!(production.validate(RuntimeMode::Production).is_ok());

        let mut zero_chunks = GatewayConfig::for_testing();
        zero_chunks.streaming.chunk_size = 0;
        assert!(zero_chunks.validate(RuntimeMode::Development).is_err());
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("STREAMGATE_PORT", "9191");
            std::env::set_var("STREAMGATE_CHUNK_SIZE", "16384");
            std::env::set_var("STREAMGATE_BACKEND_TIMEOUT", "5");
            std::env::set_var("STREAMGATE_STRICT_RANGES", "true");
            std::env::set_var("STREAMGATE_STORAGE_CHANNEL", "-1001234567890");
            std::env::set_var("STREAMGATE_PUBLIC_URL", "https://gate.example.com");
            std::env::set_var("STREAMGATE_MAX_DOWNLOAD_BYTES", "2000000000");
            std::env::set_var("STREAMGATE_SHUTDOWN_GRACE", "3");
        }

        let config = GatewayConfig::from_env();

        assert_eq!(config.server.port, 9191);
        assert_eq!(config.streaming.chunk_size, 16384);
        assert_eq!(config.streaming.backend_timeout, Duration::from_secs(5));
        assert_eq!(config.streaming.malformed_range, MalformedRangePolicy::Reject);
        assert_eq!(config.telegram.storage_channel_id, Some(-1001234567890));
        assert_eq!(
            config.server.public_base_url.as_deref(),
            Some("https://gate.example.com")
        );
        assert_eq!(config.telegram.max_download_bytes, 2_000_000_000);
        assert_eq!(config.server.shutdown_grace, Duration::from_secs(3));

        // Cleanup
        unsafe {
            std::env::remove_var("STREAMGATE_PORT");
            std::env::remove_var("STREAMGATE_CHUNK_SIZE");
            std::env::remove_var("STREAMGATE_BACKEND_TIMEOUT");
            std::env::remove_var("STREAMGATE_STRICT_RANGES");
            std::env::remove_var("STREAMGATE_STORAGE_CHANNEL");
            std::env::remove_var("STREAMGATE_PUBLIC_URL");
            std::env::remove_var("STREAMGATE_MAX_DOWNLOAD_BYTES");
            std::env::remove_var("STREAMGATE_SHUTDOWN_GRACE");
        }
    }
}
