use serde::Deserialize;
use std::env;
use std::time::Duration;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub booking: BookingConfig,
    pub features: FeatureFlags,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    // Origin фронтенда для CORS
    pub client_url: String,
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
    pub acquire_timeout_secs: u64,
}

// Настройки бронирования
#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    /// Сколько ждать блокировку события, прежде чем ответить Busy.
    pub lock_timeout_ms: u64,
    /// Каноническое смещение от UTC, в котором считается "сегодня".
    pub utc_offset_minutes: i32,
}

impl BookingConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

// Feature flags для включения/выключения функциональности
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureFlags {
    pub seed_demo_data: bool,
}

// Привычные имена переменных окружения поверх BOOKING__*
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("HOST", "app.host"),
    ("PORT", "app.port"),
    ("ENVIRONMENT", "app.environment"),
    ("RUST_LOG", "app.rust_log"),
    ("CLIENT_URL", "app.client_url"),
    ("DATABASE_URL", "database.url"),
    ("DB_POOL_SIZE", "database.pool_size"),
    ("BOOKING_LOCK_TIMEOUT_MS", "booking.lock_timeout_ms"),
    ("BOOKING_UTC_OFFSET_MINUTES", "booking.utc_offset_minutes"),
    ("SEED_DEMO_DATA", "features.seed_demo_data"),
];

impl Config {
    /// Собрать конфигурацию: значения по умолчанию, затем `BOOKING__SECTION__KEY`,
    /// затем привычные имена (`DATABASE_URL`, `PORT`, ...).
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(|key| env::var(key).ok())
    }

    pub fn from_source<F>(lookup: F) -> Result<Self, config::ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = config::Config::builder()
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 8000)?
            .set_default("app.environment", "development")?
            .set_default("app.rust_log", "event_booking=debug,tower_http=debug")?
            .set_default("app.client_url", "http://localhost:3000")?
            .set_default("database.pool_size", 20)?
            .set_default("database.acquire_timeout_secs", 5)?
            .set_default("booking.lock_timeout_ms", 2000)?
            .set_default("booking.utc_offset_minutes", 0)?
            .set_default("features.seed_demo_data", false)?
            .add_source(
                config::Environment::with_prefix("BOOKING")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        for (var, key) in ENV_OVERRIDES {
            builder = builder.set_override_option(*key, lookup(var))?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        config.booking.validate()?;
        Ok(config)
    }
}

impl BookingConfig {
    // Postgres трактует lock_timeout = 0 как "ждать вечно", а значение
    // хранит в int миллисекунд
    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.lock_timeout_ms == 0 || self.lock_timeout_ms > i32::MAX as u64 {
            return Err(config::ConfigError::Message(format!(
                "booking.lock_timeout_ms must be between 1 and {}, got {}",
                i32::MAX,
                self.lock_timeout_ms
            )));
        }
        Ok(())
    }
}
