//! Application settings and configuration structures.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Database configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// Redis configuration (cache + relay)
    pub redis: RedisSettings,

    /// JWT authentication settings
    pub jwt: JwtSettings,

    /// Cross-instance relay settings
    pub relay: RelaySettings,

    /// Message page cache settings
    pub cache: CacheSettings,

    /// WebSocket session settings
    pub websocket: WebSocketSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL
    pub url: String,

    /// Optional key prefix, for sharing one Redis between deployments
    #[serde(default)]
    pub key_prefix: Option<String>,
}

/// JWT authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key for validating tokens issued by the identity provider
    pub secret: String,
}

/// Cross-instance relay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RelaySettings {
    /// Pub/sub topic every instance publishes to and subscribes on
    pub topic: String,

    /// Delay before resubscribing after a dropped subscription, in seconds
    pub reconnect_delay_secs: u64,
}

/// Message page cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// TTL for cached message pages in seconds (default: 300)
    pub message_ttl_secs: u64,
}

/// WebSocket session configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketSettings {
    /// Maximum inbound message size in bytes.
    /// Protects against DoS via oversized frames.
    pub max_message_size: usize,

    /// Maximum inbound frame size in bytes
    pub max_frame_size: usize,

    /// Outbound mailbox capacity per connection; a full mailbox marks
    /// the connection as a slow consumer and disconnects it
    pub mailbox_capacity: usize,

    /// Read deadline in seconds; a silent socket past this is dead
    pub read_deadline_secs: u64,

    /// Write deadline in seconds for a single outbound send
    pub write_deadline_secs: u64,
}

impl WebSocketSettings {
    pub fn read_deadline(&self) -> Duration {
        Duration::from_secs(self.read_deadline_secs)
    }

    pub fn write_deadline(&self) -> Duration {
        Duration::from_secs(self.write_deadline_secs)
    }

    /// Keepalive probe interval: 9/10 of the read deadline, so a pong
    /// always has a chance to arrive before the deadline expires.
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.read_deadline_secs * 900)
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins (comma-separated in env)
    pub allowed_origins: Vec<String>,
}

/// Minimum required length for JWT secret (256 bits = 32 bytes)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. built-in defaults
    /// 2. config/default.toml (base configuration)
    /// 3. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 4. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or
    /// parsed, or if the JWT secret is too short.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        // Determine the running environment
        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("relay.topic", "chat:messages")?
            .set_default("relay.reconnect_delay_secs", 1)?
            .set_default("cache.message_ttl_secs", 300)?
            // WebSocket settings - limits bound all per-connection resources
            .set_default("websocket.max_message_size", 65536_i64)? // 64KB
            .set_default("websocket.max_frame_size", 16384_i64)? // 16KB
            .set_default("websocket.mailbox_capacity", 256_i64)?
            .set_default("websocket.read_deadline_secs", 60_i64)?
            .set_default("websocket.write_deadline_secs", 10_i64)?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            // Load from config files
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Load from environment variables
            // APP__SERVER__PORT=3000 -> server.port = 3000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            // Map simple environment variables
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("redis.url", std::env::var("REDIS_URL").ok())?
            .set_override_option("jwt.secret", std::env::var("JWT_SECRET").ok())?
            .set_override_option("relay.topic", std::env::var("RELAY_TOPIC").ok())?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| {
                if settings.jwt.secret.len() < MIN_JWT_SECRET_LENGTH {
                    return Err(ConfigError::Message(format!(
                        "JWT secret must be at least {} characters for security. Current length: {}",
                        MIN_JWT_SECRET_LENGTH,
                        settings.jwt.secret.len()
                    )));
                }
                Ok(settings)
            })
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_interval_is_a_fraction_of_the_read_deadline() {
        let ws = WebSocketSettings {
            max_message_size: 65536,
            max_frame_size: 16384,
            mailbox_capacity: 256,
            read_deadline_secs: 60,
            write_deadline_secs: 10,
        };
        assert_eq!(ws.probe_interval(), Duration::from_secs(54));
        assert!(ws.probe_interval() < ws.read_deadline());
    }

    #[test]
    fn server_addr_joins_configured_host_and_port() {
        let settings = Settings {
            server: ServerSettings {
                host: "127.0.0.1".into(),
                port: 8080,
            },
            database: DatabaseSettings {
                url: "postgres://localhost/chat".into(),
                max_connections: 10,
                min_connections: 2,
                acquire_timeout: 30,
            },
            redis: RedisSettings {
                url: "redis://localhost".into(),
                key_prefix: None,
            },
            jwt: JwtSettings {
                secret: "x".repeat(MIN_JWT_SECRET_LENGTH),
            },
            relay: RelaySettings {
                topic: "chat:messages".into(),
                reconnect_delay_secs: 1,
            },
            cache: CacheSettings {
                message_ttl_secs: 300,
            },
            websocket: WebSocketSettings {
                max_message_size: 65536,
                max_frame_size: 16384,
                mailbox_capacity: 256,
                read_deadline_secs: 60,
                write_deadline_secs: 10,
            },
            cors: CorsSettings {
                allowed_origins: vec![],
            },
            environment: "test".into(),
        };

        assert_eq!(settings.server_addr(), "127.0.0.1:8080");
    }
}
