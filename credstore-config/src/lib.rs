use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Pre-compiled regex for hostname validation (compiled once at first use)
static HOSTNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][-a-zA-Z0-9\.]*[a-zA-Z0-9]$").unwrap());

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "CREDSTORE";

#[derive(Debug, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub logging: Option<LoggingSection>,
    #[serde(default)]
    pub database: Option<DatabaseSection>,
    #[serde(default)]
    pub uploads: Option<UploadsSection>,
    #[serde(default)]
    pub auth: Option<AuthSection>,
    #[serde(default)]
    pub admin: Option<AdminSection>,
}

#[derive(Debug, Deserialize)]
pub struct ServerSection {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub static_dir: Option<String>,
    #[serde(default)]
    pub max_body_bytes: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub json: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSection {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub max_connections: Option<u32>,
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct UploadsSection {
    #[serde(default)]
    pub directory: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AuthSection {
    #[serde(default)]
    pub password_scheme: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdminSection {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Load a RawConfigFile from a path. The format is inferred from the extension: .toml, .yaml/.yml, .json
pub fn load_raw_from_file<P: AsRef<Path>>(path: P) -> Result<RawConfigFile, ConfigError> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());
    parse_config_str(&s, ext.as_deref())
}

/// Parse configuration from a string with optional format hint
#[inline]
fn parse_config_str(s: &str, ext: Option<&str>) -> Result<RawConfigFile, ConfigError> {
    match ext {
        #[cfg(feature = "toml")]
        Some("toml") => toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        #[cfg(feature = "yaml")]
        Some("yaml" | "yml") => {
            serde_yaml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
        }
        #[cfg(feature = "json")]
        Some("json") => serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        _ => parse_config_auto(s),
    }
}

/// Try to parse config by attempting each enabled format
#[inline]
fn parse_config_auto(s: &str) -> Result<RawConfigFile, ConfigError> {
    #[cfg(feature = "toml")]
    if let Ok(cfg) = toml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "json")]
    if let Ok(cfg) = serde_json::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "yaml")]
    if let Ok(cfg) = serde_yaml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(any(feature = "yaml", feature = "toml", feature = "json"))]
    {
        Err(ConfigError::Parse(
            "failed to parse config as any supported format".into(),
        ))
    }

    #[cfg(not(any(feature = "yaml", feature = "toml", feature = "json")))]
    {
        let _ = s;
        Err(ConfigError::Parse("no config format enabled".into()))
    }
}

/// Concrete application configuration with defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub uploads: UploadsConfig,
    pub auth: AuthConfig,
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Site root served for every path that is not an endpoint.
    pub static_dir: String,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseConfig {
    /// SQLite file path or full `sqlite:` URL.
    pub path: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadsConfig {
    pub directory: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthConfig {
    /// `sha256` or `argon2id`.
    pub password_scheme: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminConfig {
    /// Bearer token guarding the user dump. `None` disables the endpoint.
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                static_dir: "var/www/html".to_string(),
                max_body_bytes: 1024 * 1024,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
            database: DatabaseConfig {
                path: "var/www/users.db".to_string(),
                max_connections: 10,
                connect_timeout_secs: 30,
            },
            uploads: UploadsConfig {
                directory: "var/www/upload".to_string(),
            },
            auth: AuthConfig {
                password_scheme: "sha256".to_string(),
            },
            admin: AdminConfig { token: None },
        }
    }
}

#[inline]
fn parse_bool(s: &str) -> Result<bool, ()> {
    match s.as_bytes() {
        b"1" | b"true" | b"TRUE" | b"True" | b"yes" | b"YES" | b"Yes" | b"y" | b"Y" => Ok(true),
        b"0" | b"false" | b"FALSE" | b"False" | b"no" | b"NO" | b"No" | b"n" | b"N" => Ok(false),
        _ => match s.to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" => Ok(true),
            "false" | "no" | "n" => Ok(false),
            _ => Err(()),
        },
    }
}

/// Helper macro to apply optional value if present
macro_rules! apply_opt {
    ($target:expr, $source:expr) => {
        if let Some(v) = $source {
            $target = v;
        }
    };
    ($target:expr, $source:expr, wrap) => {
        if let Some(v) = $source {
            $target = Some(v);
        }
    };
}

/// Load concrete `Config` from optional file and environment variables.
/// Environment variables take precedence over file values and defaults.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<Config, ConfigError> {
    load_config_with_env(path, |key| env::var(key).ok())
}

/// Same as [`load_config`] but resolves overrides through `lookup` instead of
/// the process environment.
pub fn load_config_with_env<P, F>(path: Option<P>, lookup: F) -> Result<Config, ConfigError>
where
    P: AsRef<Path>,
    F: Fn(&str) -> Option<String>,
{
    let mut cfg = Config::default();

    if let Some(p) = path {
        let raw = load_raw_from_file(p)?;
        apply_raw(&mut cfg, raw);
    }

    apply_env_overrides(&mut cfg, &lookup)?;
    validate_config(&cfg)?;

    Ok(cfg)
}

fn apply_raw(cfg: &mut Config, raw: RawConfigFile) {
    if let Some(server) = raw.server {
        apply_opt!(cfg.server.host, server.host);
        apply_opt!(cfg.server.port, server.port);
        apply_opt!(cfg.server.static_dir, server.static_dir);
        apply_opt!(cfg.server.max_body_bytes, server.max_body_bytes);
    }
    if let Some(logging) = raw.logging {
        apply_opt!(cfg.logging.level, logging.level);
        apply_opt!(cfg.logging.json, logging.json);
    }
    if let Some(db) = raw.database {
        apply_opt!(cfg.database.path, db.path);
        apply_opt!(cfg.database.max_connections, db.max_connections);
        apply_opt!(cfg.database.connect_timeout_secs, db.connect_timeout_secs);
    }
    if let Some(uploads) = raw.uploads {
        apply_opt!(cfg.uploads.directory, uploads.directory);
    }
    if let Some(auth) = raw.auth {
        apply_opt!(cfg.auth.password_scheme, auth.password_scheme);
    }
    if let Some(admin) = raw.admin {
        // An empty token disables the dump, as with CREDSTORE_ADMIN_TOKEN.
        apply_opt!(
            cfg.admin.token,
            admin.token.filter(|t| !t.trim().is_empty()),
            wrap
        );
    }
}

fn env_key(suffix: &str) -> String {
    format!("{ENV_PREFIX}_{suffix}")
}

/// Helper to parse env var as a specific type
#[inline]
fn env_parse<T, F>(lookup: &F, suffix: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let key = env_key(suffix);
    match lookup(&key) {
        Some(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Parse(format!("invalid {}: {}", key, e))),
        None => Ok(None),
    }
}

#[inline]
fn env_bool<F>(lookup: &F, suffix: &str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let key = env_key(suffix);
    match lookup(&key) {
        Some(v) => parse_bool(v.trim())
            .map(Some)
            .map_err(|_| ConfigError::Parse(format!("invalid {}", key))),
        None => Ok(None),
    }
}

#[inline]
fn env_str<F>(lookup: &F, suffix: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(&env_key(suffix))
}

fn apply_env_overrides<F>(cfg: &mut Config, lookup: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    // Server
    apply_opt!(cfg.server.host, env_str(lookup, "SERVER_HOST"));
    apply_opt!(cfg.server.port, env_parse::<u16, _>(lookup, "SERVER_PORT")?);
    apply_opt!(cfg.server.static_dir, env_str(lookup, "STATIC_DIR"));
    apply_opt!(
        cfg.server.max_body_bytes,
        env_parse::<usize, _>(lookup, "MAX_BODY_BYTES")?
    );

    // Logging
    apply_opt!(cfg.logging.level, env_str(lookup, "LOG_LEVEL"));
    apply_opt!(cfg.logging.json, env_bool(lookup, "LOG_JSON")?);

    // Database
    apply_opt!(cfg.database.path, env_str(lookup, "DATABASE_PATH"));
    apply_opt!(
        cfg.database.max_connections,
        env_parse::<u32, _>(lookup, "DB_MAX_CONNECTIONS")?
    );
    apply_opt!(
        cfg.database.connect_timeout_secs,
        env_parse::<u64, _>(lookup, "DB_CONNECT_TIMEOUT_SECS")?
    );

    // Uploads
    apply_opt!(cfg.uploads.directory, env_str(lookup, "UPLOADS_DIRECTORY"));

    // Auth
    apply_opt!(cfg.auth.password_scheme, env_str(lookup, "PASSWORD_SCHEME"));

    // Admin; an empty value disables the dump endpoint
    if let Some(v) = env_str(lookup, "ADMIN_TOKEN") {
        cfg.admin.token = if v.trim().is_empty() { None } else { Some(v) };
    }

    Ok(())
}

/// Validate higher-level constraints on the resolved configuration.
pub fn validate_config(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.server.port == 0 {
        return Err(ConfigError::Validation("server.port must be > 0".into()));
    }
    let host_ok = cfg.server.host.parse::<std::net::IpAddr>().is_ok()
        || HOSTNAME_REGEX.is_match(&cfg.server.host);
    if !host_ok {
        return Err(ConfigError::Validation(format!(
            "invalid server.host: {}",
            cfg.server.host
        )));
    }
    if cfg.server.max_body_bytes == 0 {
        return Err(ConfigError::Validation(
            "server.max_body_bytes must be > 0".into(),
        ));
    }

    if cfg.database.path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database.path must not be empty".into(),
        ));
    }
    if cfg.database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be > 0".into(),
        ));
    }

    match cfg.auth.password_scheme.as_str() {
        "sha256" | "argon2id" => {}
        other => {
            return Err(ConfigError::Validation(format!(
                "unsupported auth.password_scheme: {}",
                other
            )))
        }
    }

    if let Some(token) = &cfg.admin.token {
        if token.len() < 16 {
            return Err(ConfigError::Validation(
                "admin.token must be at least 16 characters".into(),
            ));
        }
    }

    Ok(())
}
