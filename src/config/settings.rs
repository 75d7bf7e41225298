//! Application settings and configuration structures.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::domain::entities::RoomSettings;
use crate::domain::value_objects::ResourceClass;
use crate::retention::CronSchedule;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Database configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// Redis configuration (cross-instance notification fan-out)
    pub redis: RedisSettings,

    /// Blob storage configuration
    pub storage: StorageSettings,

    /// Snowflake ID generator settings
    pub snowflake: SnowflakeSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// Log output configuration
    pub telemetry: TelemetrySettings,

    /// Quota and TTL values given to newly created rooms
    pub room_defaults: RoomDefaults,

    /// Retention sweep configuration
    pub retention: RetentionSettings,

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
    /// Publish lifecycle events to Redis for other instances
    pub enabled: bool,

    /// Redis connection URL
    pub url: String,
}

/// Blob storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Root directory of the filesystem blob store
    pub root: String,

    /// Per-call timeout for blob uploads and deletes in milliseconds
    pub timeout_ms: u64,
}

impl StorageSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Snowflake ID generator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SnowflakeSettings {
    /// Machine/worker ID (0-1023)
    pub machine_id: u16,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins (comma-separated in env)
    pub allowed_origins: Vec<String>,
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    /// Emit JSON log lines instead of human-readable ones
    pub json: bool,
}

/// Process-wide defaults for new rooms.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RoomDefaults {
    pub total_bytes_allowed: i64,
    pub single_file_bytes_allowed: i64,
    pub max_channels: i64,
    pub max_users: i64,
    /// 0 disables file retention
    pub file_days_to_live: i32,
    /// 0 disables message retention
    pub message_days_to_live: i32,
}

impl RoomDefaults {
    /// Settings a new room starts with.
    pub fn to_room_settings(&self) -> RoomSettings {
        RoomSettings {
            total_bytes_allowed: self.total_bytes_allowed,
            single_file_bytes_allowed: self.single_file_bytes_allowed,
            max_channels: self.max_channels,
            max_users: self.max_users,
            file_days_to_live: Some(self.file_days_to_live).filter(|d| *d > 0),
            message_days_to_live: Some(self.message_days_to_live).filter(|d| *d > 0),
        }
    }
}

impl Default for RoomDefaults {
    fn default() -> Self {
        Self {
            total_bytes_allowed: 1_073_741_824, // 1 GiB
            single_file_bytes_allowed: 26_214_400, // 25 MiB
            max_channels: 50,
            max_users: 500,
            file_days_to_live: 0,
            message_days_to_live: 0,
        }
    }
}

/// Schedule of one sweep class.
#[derive(Debug, Clone, Deserialize)]
pub struct SweepSchedule {
    pub enabled: bool,

    /// Cron expression: "seconds minutes hours day month weekday"
    pub schedule: String,
}

/// Retention sweep configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RetentionSettings {
    /// Master switch for both sweep workers
    pub enabled: bool,

    /// IANA timezone the schedules are evaluated in
    pub timezone: String,

    /// Rooms fetched per room batch
    pub room_batch: i64,

    /// Expired resources fetched per page
    pub resource_batch: i64,

    /// Pause after each room batch in milliseconds
    pub batch_delay_ms: u64,

    /// Per-call metadata store timeout in milliseconds
    pub store_timeout_ms: u64,

    /// Attempts per store call before the room is skipped for the cycle
    pub max_attempts: u32,

    /// Concurrent blob deletions after a page commits
    pub blob_concurrency: usize,

    pub files: SweepSchedule,

    pub messages: SweepSchedule,
}

impl RetentionSettings {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Schedule block for a resource class.
    pub fn schedule_for(&self, class: ResourceClass) -> &SweepSchedule {
        match class {
            ResourceClass::Files => &self.files,
            ResourceClass::Messages => &self.messages,
        }
    }

    /// Check batch sizes, attempts, timezone and cron expressions.
    pub fn validate(&self) -> Result<(), String> {
        if self.room_batch <= 0 || self.resource_batch <= 0 {
            return Err("retention batch sizes must be positive".into());
        }
        if self.max_attempts == 0 {
            return Err("retention.max_attempts must be at least 1".into());
        }
        if self.blob_concurrency == 0 {
            return Err("retention.blob_concurrency must be at least 1".into());
        }
        for class in ResourceClass::ALL {
            let block = self.schedule_for(class);
            CronSchedule::parse(&block.schedule, &self.timezone)
                .map_err(|e| format!("retention.{}: {}", class, e))?;
        }
        Ok(())
    }
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            timezone: "UTC".into(),
            room_batch: 10,
            resource_batch: 10,
            batch_delay_ms: 5_000,
            store_timeout_ms: 10_000,
            max_attempts: 3,
            blob_concurrency: 4,
            files: SweepSchedule {
                enabled: true,
                schedule: "0 0 3 * * *".into(),
            },
            messages: SweepSchedule {
                enabled: true,
                schedule: "0 30 3 * * *".into(),
            },
        }
    }
}

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if the room defaults or retention settings are inconsistent.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());
        let room = RoomDefaults::default();
        let retention = RetentionSettings::default();

        Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("redis.enabled", false)?
            .set_default("redis.url", "redis://127.0.0.1:6379")?
            .set_default("storage.root", "./data/blobs")?
            .set_default("storage.timeout_ms", 30_000_i64)?
            .set_default("snowflake.machine_id", 1)?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            .set_default("telemetry.json", false)?
            .set_default("room_defaults.total_bytes_allowed", room.total_bytes_allowed)?
            .set_default("room_defaults.single_file_bytes_allowed", room.single_file_bytes_allowed)?
            .set_default("room_defaults.max_channels", room.max_channels)?
            .set_default("room_defaults.max_users", room.max_users)?
            .set_default("room_defaults.file_days_to_live", room.file_days_to_live)?
            .set_default("room_defaults.message_days_to_live", room.message_days_to_live)?
            .set_default("retention.enabled", retention.enabled)?
            .set_default("retention.timezone", retention.timezone.clone())?
            .set_default("retention.room_batch", retention.room_batch)?
            .set_default("retention.resource_batch", retention.resource_batch)?
            .set_default("retention.batch_delay_ms", retention.batch_delay_ms)?
            .set_default("retention.store_timeout_ms", retention.store_timeout_ms)?
            .set_default("retention.max_attempts", retention.max_attempts as i64)?
            .set_default("retention.blob_concurrency", retention.blob_concurrency as i64)?
            .set_default("retention.files.enabled", retention.files.enabled)?
            .set_default("retention.files.schedule", retention.files.schedule.clone())?
            .set_default("retention.messages.enabled", retention.messages.enabled)?
            .set_default("retention.messages.schedule", retention.messages.schedule.clone())?
            // Load from config files
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__RETENTION__ROOM_BATCH=20 -> retention.room_batch = 20
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("redis.url", std::env::var("REDIS_URL").ok())?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| {
                settings.validate().map_err(ConfigError::Message)?;
                Ok(settings)
            })
    }

    /// Cross-field checks that the deserializer cannot express.
    pub fn validate(&self) -> Result<(), String> {
        self.room_defaults
            .to_room_settings()
            .validate()
            .map_err(|e| format!("room_defaults: {}", e))?;
        self.retention.validate()
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
