use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::DEFAULT_UTC_OFFSET_MINUTES;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub telegram: TelegramConfig,
    pub server: ServerConfig,
    pub schedule: ScheduleConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    /// Shared secret Telegram echoes back in the
    /// `X-Telegram-Bot-Api-Secret-Token` header on every webhook delivery.
    pub webhook_secret: SecretString,
    /// Base URL of the account-linking page offered by `/start`.
    pub connect_base_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ScheduleConfig {
    /// Operating-timezone offset from UTC, in minutes. All same-day
    /// decisions (undo eligibility, "today" lookups) use this calendar.
    pub utc_offset_minutes: i32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub bot_token: Option<String>,
    pub webhook_secret: Option<String>,
    pub connect_base_url: Option<String>,
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://rollcall.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            telegram: TelegramConfig {
                bot_token: String::new().into(),
                webhook_secret: String::new().into(),
                connect_base_url: None,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            schedule: ScheduleConfig { utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("rollcall.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(telegram) = patch.telegram {
            if let Some(bot_token_value) = telegram.bot_token {
                self.telegram.bot_token = secret_value(bot_token_value);
            }
            if let Some(webhook_secret_value) = telegram.webhook_secret {
                self.telegram.webhook_secret = secret_value(webhook_secret_value);
            }
            if let Some(connect_base_url) = telegram.connect_base_url {
                self.telegram.connect_base_url = Some(connect_base_url);
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(schedule) = patch.schedule {
            if let Some(utc_offset_minutes) = schedule.utc_offset_minutes {
                self.schedule.utc_offset_minutes = utc_offset_minutes;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("ROLLCALL_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("ROLLCALL_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("ROLLCALL_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("ROLLCALL_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("ROLLCALL_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ROLLCALL_TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("ROLLCALL_TELEGRAM_WEBHOOK_SECRET") {
            self.telegram.webhook_secret = secret_value(value);
        }
        if let Some(value) = read_env("ROLLCALL_TELEGRAM_CONNECT_BASE_URL") {
            self.telegram.connect_base_url = Some(value);
        }

        if let Some(value) = read_env("ROLLCALL_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("ROLLCALL_SERVER_PORT") {
            self.server.port = parse_u16("ROLLCALL_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("ROLLCALL_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("ROLLCALL_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("ROLLCALL_SCHEDULE_UTC_OFFSET_MINUTES") {
            self.schedule.utc_offset_minutes =
                parse_i32("ROLLCALL_SCHEDULE_UTC_OFFSET_MINUTES", &value)?;
        }

        let log_level =
            read_env("ROLLCALL_LOGGING_LEVEL").or_else(|| read_env("ROLLCALL_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ROLLCALL_LOGGING_FORMAT").or_else(|| read_env("ROLLCALL_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bot_token) = overrides.bot_token {
            self.telegram.bot_token = secret_value(bot_token);
        }
        if let Some(webhook_secret) = overrides.webhook_secret {
            self.telegram.webhook_secret = secret_value(webhook_secret);
        }
        if let Some(connect_base_url) = overrides.connect_base_url {
            self.telegram.connect_base_url = Some(connect_base_url);
        }
        if let Some(utc_offset_minutes) = overrides.utc_offset_minutes {
            self.schedule.utc_offset_minutes = utc_offset_minutes;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_telegram(&self.telegram)?;
        validate_server(&self.server)?;
        validate_schedule(&self.schedule)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("rollcall.toml"), PathBuf::from("config/rollcall.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_telegram(telegram: &TelegramConfig) -> Result<(), ConfigError> {
    let bot_token = telegram.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "telegram.bot_token is required. Get it from @BotFather".to_string(),
        ));
    }
    let token_shape = bot_token
        .split_once(':')
        .map(|(bot_id, rest)| {
            !bot_id.is_empty() && bot_id.bytes().all(|b| b.is_ascii_digit()) && !rest.is_empty()
        })
        .unwrap_or(false);
    if !token_shape {
        return Err(ConfigError::Validation(
            "telegram.bot_token must look like `<bot-id>:<secret>` as issued by @BotFather"
                .to_string(),
        ));
    }

    let webhook_secret = telegram.webhook_secret.expose_secret();
    if webhook_secret.is_empty() {
        return Err(ConfigError::Validation(
            "telegram.webhook_secret is required; it authenticates webhook deliveries".to_string(),
        ));
    }
    let secret_shape = webhook_secret.len() <= 256
        && webhook_secret.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if !secret_shape {
        return Err(ConfigError::Validation(
            "telegram.webhook_secret must be 1..=256 characters of [A-Za-z0-9_-]".to_string(),
        ));
    }

    if let Some(base_url) = &telegram.connect_base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "telegram.connect_base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation(
            "server.port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_schedule(schedule: &ScheduleConfig) -> Result<(), ConfigError> {
    if crate::clock::OperatingTz::from_offset_minutes(schedule.utc_offset_minutes).is_err() {
        return Err(ConfigError::Validation(format!(
            "schedule.utc_offset_minutes does not describe a valid timezone: {}",
            schedule.utc_offset_minutes
        )));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_i32(key: &str, value: &str) -> Result<i32, ConfigError> {
    value.parse::<i32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    telegram: Option<TelegramPatch>,
    server: Option<ServerPatch>,
    schedule: Option<SchedulePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramPatch {
    bot_token: Option<String>,
    webhook_secret: Option<String>,
    connect_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SchedulePatch {
    utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_ROLLCALL_BOT_TOKEN", "12345:from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("rollcall.toml");
            fs::write(
                &path,
                r#"
[telegram]
bot_token = "${TEST_ROLLCALL_BOT_TOKEN}"
webhook_secret = "hook-secret"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.telegram.bot_token.expose_secret() == "12345:from-env",
                "bot token should be interpolated from environment",
            )
        })();

        clear_vars(&["TEST_ROLLCALL_BOT_TOKEN"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ROLLCALL_TELEGRAM_BOT_TOKEN", "12345:test-token");
        env::set_var("ROLLCALL_TELEGRAM_WEBHOOK_SECRET", "hook-secret");
        env::set_var("ROLLCALL_LOG_LEVEL", "warn");
        env::set_var("ROLLCALL_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "log level should come from the env alias")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "log format should come from the env alias",
            )
        })();

        clear_vars(&[
            "ROLLCALL_TELEGRAM_BOT_TOKEN",
            "ROLLCALL_TELEGRAM_WEBHOOK_SECRET",
            "ROLLCALL_LOG_LEVEL",
            "ROLLCALL_LOG_FORMAT",
        ]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ROLLCALL_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("ROLLCALL_TELEGRAM_BOT_TOKEN", "12345:from-env");
        env::set_var("ROLLCALL_TELEGRAM_WEBHOOK_SECRET", "hook-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("rollcall.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[telegram]
bot_token = "12345:from-file"
webhook_secret = "hook-from-file"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "override log level should win")?;
            ensure(
                config.telegram.bot_token.expose_secret() == "12345:from-env",
                "env bot token should win over file and defaults",
            )
        })();

        clear_vars(&[
            "ROLLCALL_DATABASE_URL",
            "ROLLCALL_TELEGRAM_BOT_TOKEN",
            "ROLLCALL_TELEGRAM_WEBHOOK_SECRET",
        ]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ROLLCALL_TELEGRAM_BOT_TOKEN", "not-a-token");
        env::set_var("ROLLCALL_TELEGRAM_WEBHOOK_SECRET", "hook-secret");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("telegram.bot_token")
            );
            ensure(has_message, "validation failure should mention telegram.bot_token")
        })();

        clear_vars(&["ROLLCALL_TELEGRAM_BOT_TOKEN", "ROLLCALL_TELEGRAM_WEBHOOK_SECRET"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ROLLCALL_TELEGRAM_BOT_TOKEN", "12345:secret-value");
        env::set_var("ROLLCALL_TELEGRAM_WEBHOOK_SECRET", "hook-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("secret-value"), "debug output should not contain secrets")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )
        })();

        clear_vars(&["ROLLCALL_TELEGRAM_BOT_TOKEN", "ROLLCALL_TELEGRAM_WEBHOOK_SECRET"]);
        result
    }

    #[test]
    fn rejects_invalid_timezone_offset() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ROLLCALL_TELEGRAM_BOT_TOKEN", "12345:token");
        env::set_var("ROLLCALL_TELEGRAM_WEBHOOK_SECRET", "hook-secret");
        env::set_var("ROLLCALL_SCHEDULE_UTC_OFFSET_MINUTES", "100000");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected offset validation failure".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::Validation(ref message)
                        if message.contains("utc_offset_minutes")
                ),
                "validation failure should mention the offset",
            )
        })();

        clear_vars(&[
            "ROLLCALL_TELEGRAM_BOT_TOKEN",
            "ROLLCALL_TELEGRAM_WEBHOOK_SECRET",
            "ROLLCALL_SCHEDULE_UTC_OFFSET_MINUTES",
        ]);
        result
    }
}
