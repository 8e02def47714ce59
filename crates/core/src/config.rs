use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub sheets: SheetsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub api_key: Option<SecretString>,
    pub range: String,
    pub timeout_secs: u64,
    pub refresh_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
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
    pub spreadsheet_id: Option<String>,
    pub sheets_api_key: Option<String>,
    pub server_port: Option<u16>,
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
                url: "sqlite://tenderdeck.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            sheets: SheetsConfig {
                spreadsheet_id: String::new(),
                api_key: None,
                range: "A:Z".to_string(),
                timeout_secs: 30,
                refresh_interval_secs: 300,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("tenderdeck.toml"));
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

        if let Some(sheets) = patch.sheets {
            if let Some(spreadsheet_id) = sheets.spreadsheet_id {
                self.sheets.spreadsheet_id = spreadsheet_id;
            }
            if let Some(api_key_value) = sheets.api_key {
                self.sheets.api_key = Some(api_key_value.into());
            }
            if let Some(range) = sheets.range {
                self.sheets.range = range;
            }
            if let Some(timeout_secs) = sheets.timeout_secs {
                self.sheets.timeout_secs = timeout_secs;
            }
            if let Some(refresh_interval_secs) = sheets.refresh_interval_secs {
                self.sheets.refresh_interval_secs = refresh_interval_secs;
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
        if let Some(value) = read_env("TENDERDECK_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("TENDERDECK_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("TENDERDECK_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("TENDERDECK_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("TENDERDECK_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TENDERDECK_SHEETS_SPREADSHEET_ID") {
            self.sheets.spreadsheet_id = value;
        }
        if let Some(value) = read_env("TENDERDECK_SHEETS_API_KEY") {
            self.sheets.api_key = Some(value.into());
        }
        if let Some(value) = read_env("TENDERDECK_SHEETS_RANGE") {
            self.sheets.range = value;
        }
        if let Some(value) = read_env("TENDERDECK_SHEETS_TIMEOUT_SECS") {
            self.sheets.timeout_secs = parse_u64("TENDERDECK_SHEETS_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("TENDERDECK_SHEETS_REFRESH_INTERVAL_SECS") {
            self.sheets.refresh_interval_secs =
                parse_u64("TENDERDECK_SHEETS_REFRESH_INTERVAL_SECS", &value)?;
        }

        if let Some(value) = read_env("TENDERDECK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("TENDERDECK_SERVER_PORT") {
            self.server.port = parse_u16("TENDERDECK_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("TENDERDECK_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("TENDERDECK_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("TENDERDECK_LOGGING_LEVEL").or_else(|| read_env("TENDERDECK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("TENDERDECK_LOGGING_FORMAT").or_else(|| read_env("TENDERDECK_LOG_FORMAT"));
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
        if let Some(spreadsheet_id) = overrides.spreadsheet_id {
            self.sheets.spreadsheet_id = spreadsheet_id;
        }
        if let Some(api_key) = overrides.sheets_api_key {
            self.sheets.api_key = Some(api_key.into());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_sheets(&self.sheets)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("tenderdeck.toml"), PathBuf::from("config/tenderdeck.toml")]
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

fn validate_sheets(sheets: &SheetsConfig) -> Result<(), ConfigError> {
    if sheets.spreadsheet_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "sheets.spreadsheet_id is required. Use the id from the sheet URL, between /d/ and /edit".to_string(),
        ));
    }

    if let Some(api_key) = &sheets.api_key {
        if api_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "sheets.api_key must not be blank when set".to_string(),
            ));
        }
    }

    if sheets.timeout_secs == 0 || sheets.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "sheets.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if sheets.refresh_interval_secs < 30 {
        return Err(ConfigError::Validation(
            "sheets.refresh_interval_secs must be at least 30".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
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

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    sheets: Option<SheetsPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SheetsPatch {
    spreadsheet_id: Option<String>,
    api_key: Option<String>,
    range: Option<String>,
    timeout_secs: Option<u64>,
    refresh_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
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
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    const VARS: [&str; 6] = [
        "TENDERDECK_DATABASE_URL",
        "TENDERDECK_SHEETS_SPREADSHEET_ID",
        "TENDERDECK_SHEETS_API_KEY",
        "TENDERDECK_SERVER_PORT",
        "TENDERDECK_LOGGING_FORMAT",
        "SHEETS_KEY_FROM_ENV",
    ];

    fn clear_vars() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn defaults_fail_validation_without_a_spreadsheet_id() {
        let _guard = env_lock().lock().unwrap();
        clear_vars();

        let result = AppConfig::load(LoadOptions::default());
        assert!(matches!(result, Err(ConfigError::Validation(ref message))
            if message.contains("spreadsheet_id")));
    }

    #[test]
    fn file_patch_env_override_and_cli_override_layer_in_order() {
        let _guard = env_lock().lock().unwrap();
        clear_vars();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tenderdeck.toml");
        fs::write(
            &path,
            r#"
[sheets]
spreadsheet_id = "sheet-from-file"
api_key = "${SHEETS_KEY_FROM_ENV}"

[logging]
format = "json"
"#,
        )
        .unwrap();

        env::set_var("SHEETS_KEY_FROM_ENV", "key-123");
        env::set_var("TENDERDECK_SERVER_PORT", "9090");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(path),
            require_file: true,
            overrides: ConfigOverrides {
                spreadsheet_id: Some("sheet-from-cli".to_string()),
                ..Default::default()
            },
        })
        .unwrap();

        assert_eq!(config.sheets.spreadsheet_id, "sheet-from-cli");
        assert_eq!(config.sheets.api_key.unwrap().expose_secret(), "key-123");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.logging.format, LogFormat::Json);

        clear_vars();
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let _guard = env_lock().lock().unwrap();
        clear_vars();

        let dir = TempDir::new().unwrap();
        let result = AppConfig::load(LoadOptions {
            config_path: Some(dir.path().join("absent.toml")),
            require_file: true,
            overrides: ConfigOverrides::default(),
        });

        assert!(matches!(result, Err(ConfigError::MissingConfigFile(_))));
    }

    #[test]
    fn invalid_env_override_is_rejected() {
        let _guard = env_lock().lock().unwrap();
        clear_vars();

        env::set_var("TENDERDECK_SERVER_PORT", "not-a-port");
        let result = AppConfig::load(LoadOptions::default());
        clear_vars();

        assert!(matches!(result, Err(ConfigError::InvalidEnvOverride { ref key, .. })
            if key == "TENDERDECK_SERVER_PORT"));
    }
}
