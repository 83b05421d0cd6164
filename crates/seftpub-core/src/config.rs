//! Configuration module for the SEFT publisher.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, environment overrides, validation, defaults, and a builder
//! pattern for programmatic use.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for the publisher.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ftp: FtpConfig,
    pub broker: BrokerConfig,
    pub transfer: TransferConfig,
    pub keys: KeysConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Remote drop directory (FTP) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Drop directory. Backslash-separated paths are accepted; only the
    /// last component is used.
    pub working_directory: String,
    /// Connect timeout in seconds.
    pub timeout_secs: u64,
    /// Only names ending in one of these suffixes are picked up. Empty means all.
    pub file_suffixes: Vec<String>,
}

/// Message broker (AMQP) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Full AMQP URI; when set it wins over host/port/user/password.
    pub amqp_url: Option<String>,
    pub exchange: String,
    pub queue: String,
    pub routing_key: String,
    /// Seconds to wait before reconnecting after a lost connection.
    pub reconnect_delay_secs: u64,
    /// Seconds allowed for connect plus topology setup.
    pub connect_timeout_secs: u64,
    /// Management API port used by the health probe.
    pub healthcheck_port: u16,
    pub monitoring_user: String,
    pub monitoring_password: String,
}

/// Transfer cycle scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Milliseconds between transfer cycles.
    pub interval_ms: u64,
    /// Seconds after startup before the first cycle.
    pub initial_delay_secs: u64,
    /// Seconds a registry entry is kept. Defaults to twice the interval.
    pub retention_secs: Option<u64>,
    /// Seconds between dependency health probes.
    pub health_check_interval_secs: u64,
}

/// Key material settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// File holding the recipient's base64 X25519 public key.
    pub recipient_public_key: PathBuf,
}

/// HTTP status server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind, e.g. `"0.0.0.0:8087"`.
    pub bind: String,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise start from [`Config::default`].
    ///
    /// A file that exists but cannot be parsed is an error: running with
    /// silently ignored settings is worse than not starting.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/seftpub/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("seftpub")
            .join("config.yaml")
    }

    /// Applies overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`, which maps a variable name to its value.
    ///
    /// Recognised variables keep the names the service has always been
    /// deployed with (`SEFT_FTP_HOST`, `SEFT_RABBITMQ_HOST`, ...). A value
    /// that cannot be parsed is an error.
    pub fn apply_overrides_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<()> {
        let string = |key: &str, target: &mut String| {
            if let Some(value) = lookup(key) {
                *target = value;
            }
        };
        string("SEFT_FTP_HOST", &mut self.ftp.host);
        string("SEFT_FTP_USER", &mut self.ftp.user);
        string("SEFT_FTP_PASS", &mut self.ftp.password);
        string("SEFT_PUBLISHER_FTP_FOLDER", &mut self.ftp.working_directory);
        string("SEFT_RABBITMQ_HOST", &mut self.broker.host);
        string("SEFT_RABBITMQ_DEFAULT_USER", &mut self.broker.user);
        string("SEFT_RABBITMQ_DEFAULT_PASS", &mut self.broker.password);
        string("SEFT_RABBITMQ_MONITORING_USER", &mut self.broker.monitoring_user);
        string("SEFT_RABBITMQ_MONITORING_PASS", &mut self.broker.monitoring_password);
        string("LOGGING_LEVEL", &mut self.logging.level);

        if let Some(value) = lookup("SEFT_FTP_PORT") {
            self.ftp.port = parse_env("SEFT_FTP_PORT", &value)?;
        }
        if let Some(value) = lookup("SEFT_RABBITMQ_PORT") {
            self.broker.port = parse_env("SEFT_RABBITMQ_PORT", &value)?;
        }
        if let Some(value) = lookup("SEFT_RABBITMQ_HEALTHCHECK_PORT") {
            self.broker.healthcheck_port = parse_env("SEFT_RABBITMQ_HEALTHCHECK_PORT", &value)?;
        }
        if let Some(value) = lookup("SEFT_FTP_INTERVAL_MS") {
            self.transfer.interval_ms = parse_env("SEFT_FTP_INTERVAL_MS", &value)?;
        }
        if let Some(value) = lookup("SDX_SEFT_PUBLISHER_PORT") {
            let port: u16 = parse_env("SDX_SEFT_PUBLISHER_PORT", &value)?;
            self.server.set_port(port);
        }
        if let Some(value) = lookup("VCAP_SERVICES") {
            self.apply_vcap_services(&value)?;
        }

        // Normalise after all sources are applied.
        self.logging.level = self.logging.level.to_lowercase();
        Ok(())
    }

    /// Reads the AMQP URI from a Cloud Foundry `VCAP_SERVICES` document.
    ///
    /// Only `rabbitmq[0].credentials.protocols.amqp.uri` is consulted; a
    /// document without it leaves the broker settings unchanged.
    pub fn apply_vcap_services(&mut self, json: &str) -> anyhow::Result<()> {
        let services: serde_json::Value =
            serde_json::from_str(json).context("VCAP_SERVICES is not valid JSON")?;
        if let Some(uri) = services
            .pointer("/rabbitmq/0/credentials/protocols/amqp/uri")
            .and_then(serde_json::Value::as_str)
        {
            self.broker.amqp_url = Some(uri.to_string());
        }
        Ok(())
    }

    /// Time between transfer cycles.
    pub fn transfer_interval(&self) -> Duration {
        Duration::from_millis(self.transfer.interval_ms)
    }

    /// How long a registry entry is retained before forced eviction.
    pub fn retention_window(&self) -> Duration {
        match self.transfer.retention_secs {
            Some(secs) => Duration::from_secs(secs),
            None => self.transfer_interval() * 2,
        }
    }
}

impl FtpConfig {
    /// Directory to change into after login.
    ///
    /// Windows-style settings such as `"\\drop\\seft"` are reduced to their
    /// last component (`"seft"`); `"/"` and empty settings stay at the login
    /// directory root.
    pub fn normalized_working_directory(&self) -> String {
        let raw = self.working_directory.replace('\\', "/");
        let last = raw
            .split('/')
            .filter(|part| !part.is_empty() && *part != ".")
            .last();
        match last {
            Some(dir) => dir.to_string(),
            None => "/".to_string(),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl BrokerConfig {
    /// The AMQP URI to connect to.
    pub fn amqp_uri(&self) -> String {
        match &self.amqp_url {
            Some(url) => url.clone(),
            None => format!(
                "amqp://{}:{}@{}:{}/%2f",
                self.user, self.password, self.host, self.port
            ),
        }
    }

    /// Management API endpoint probed for broker health.
    pub fn healthcheck_url(&self) -> String {
        format!(
            "http://{}:{}/api/healthchecks/node",
            self.host, self.healthcheck_port
        )
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> anyhow::Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{key} has an invalid value: {value:?}"))
}

impl ServerConfig {
    /// Keeps the bind host and replaces the port.
    pub fn set_port(&mut self, port: u16) {
        let host = self.bind.rsplit_once(':').map_or("0.0.0.0", |(host, _)| host);
        self.bind = format!("{host}:{port}");
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

/// Default transfer interval: ten minutes.
pub const DEFAULT_INTERVAL_MS: u64 = 10 * 60 * 1000;

impl Default for FtpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 2021,
            user: "ons".to_string(),
            password: "ons".to_string(),
            working_directory: "/".to_string(),
            timeout_secs: 30,
            file_suffixes: Vec::new(),
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5672,
            user: "guest".to_string(),
            password: "guest".to_string(),
            amqp_url: None,
            exchange: "message".to_string(),
            queue: "Seft.CollectionInstruments".to_string(),
            routing_key: "JWT".to_string(),
            reconnect_delay_secs: 5,
            connect_timeout_secs: 30,
            healthcheck_port: 15672,
            monitoring_user: "monitor".to_string(),
            monitoring_password: "monitor".to_string(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            initial_delay_secs: 6,
            retention_secs: None,
            health_check_interval_secs: 5 * 60,
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            recipient_public_key: PathBuf::from("keys").join("recipient.pub"),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8087".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"transfer.interval_ms"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut require = |ok: bool, field: &str, message: &str| {
            if !ok {
                errors.push(ValidationError {
                    field: field.into(),
                    message: message.into(),
                });
            }
        };

        // --- ftp ---
        require(!self.ftp.host.trim().is_empty(), "ftp.host", "must not be empty");
        require(self.ftp.port != 0, "ftp.port", "must be greater than 0");
        require(self.ftp.timeout_secs > 0, "ftp.timeout_secs", "must be greater than 0");

        // --- broker ---
        require(
            self.broker.amqp_url.is_some() || !self.broker.host.trim().is_empty(),
            "broker.host",
            "must not be empty",
        );
        require(!self.broker.exchange.is_empty(), "broker.exchange", "must not be empty");
        require(!self.broker.queue.is_empty(), "broker.queue", "must not be empty");
        require(
            self.broker.reconnect_delay_secs > 0,
            "broker.reconnect_delay_secs",
            "must be greater than 0",
        );
        require(
            self.broker.connect_timeout_secs > 0,
            "broker.connect_timeout_secs",
            "must be greater than 0",
        );
        if let Some(url) = &self.broker.amqp_url {
            require(
                url.starts_with("amqp://") || url.starts_with("amqps://"),
                "broker.amqp_url",
                "must start with amqp:// or amqps://",
            );
        }

        // --- transfer ---
        require(
            self.transfer.interval_ms > 0,
            "transfer.interval_ms",
            "must be greater than 0",
        );
        require(
            self.transfer.retention_secs != Some(0),
            "transfer.retention_secs",
            "must be greater than 0",
        );
        require(
            self.transfer.health_check_interval_secs > 0,
            "transfer.health_check_interval_secs",
            "must be greater than 0",
        );

        // --- keys ---
        require(
            !self.keys.recipient_public_key.as_os_str().is_empty(),
            "keys.recipient_public_key",
            "must not be empty",
        );

        // --- server ---
        require(
            self.server.bind.parse::<SocketAddr>().is_ok(),
            "server.bind",
            "must be a socket address such as 0.0.0.0:8087",
        );

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust
/// use seftpub_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .ftp_host("ftp.internal")
///     .transfer_interval_ms(60_000)
///     .logging_level("debug")
///     .build();
/// assert_eq!(config.retention_window().as_secs(), 120);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- ftp ---

    pub fn ftp_host(mut self, host: impl Into<String>) -> Self {
        self.config.ftp.host = host.into();
        self
    }

    pub fn ftp_port(mut self, port: u16) -> Self {
        self.config.ftp.port = port;
        self
    }

    pub fn ftp_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.ftp.user = user.into();
        self.config.ftp.password = password.into();
        self
    }

    pub fn ftp_working_directory(mut self, dir: impl Into<String>) -> Self {
        self.config.ftp.working_directory = dir.into();
        self
    }

    pub fn ftp_file_suffixes(mut self, suffixes: Vec<String>) -> Self {
        self.config.ftp.file_suffixes = suffixes;
        self
    }

    // --- broker ---

    pub fn broker_amqp_url(mut self, url: impl Into<String>) -> Self {
        self.config.broker.amqp_url = Some(url.into());
        self
    }

    pub fn broker_queue(mut self, queue: impl Into<String>) -> Self {
        self.config.broker.queue = queue.into();
        self
    }

    // --- transfer ---

    pub fn transfer_interval_ms(mut self, ms: u64) -> Self {
        self.config.transfer.interval_ms = ms;
        self
    }

    pub fn transfer_initial_delay_secs(mut self, secs: u64) -> Self {
        self.config.transfer.initial_delay_secs = secs;
        self
    }

    pub fn transfer_retention_secs(mut self, secs: u64) -> Self {
        self.config.transfer.retention_secs = Some(secs);
        self
    }

    // --- keys ---

    pub fn recipient_public_key(mut self, path: PathBuf) -> Self {
        self.config.keys.recipient_public_key = path;
        self
    }

    // --- server ---

    pub fn server_bind(mut self, bind: impl Into<String>) -> Self {
        self.config.server.bind = bind.into();
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
