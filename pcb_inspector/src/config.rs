use serde::Deserialize;
use std::path::PathBuf;
use yolo_detector::config::{LabelsConfig, ModelConfig, Validatable};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    pub model: ModelConfig,
    pub labels: LabelsConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.try_into().map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl ServerConfig {
    pub fn get_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Where annotated images are written and how long they are kept.
#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("static")
}

fn default_url_prefix() -> String {
    "/static".to_string()
}

fn default_retention_secs() -> u64 {
    3600
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            url_prefix: default_url_prefix(),
            retention_secs: default_retention_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl OutputConfig {
    /// The prefix normalised to `/segment` form, as axum expects for nesting.
    pub fn get_url_prefix(&self) -> String {
        let trimmed = self.url_prefix.trim_matches('/');
        if trimmed.is_empty() {
            default_url_prefix()
        } else {
            format!("/{}", trimmed)
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            other => Err(format!(
                "{} is not a supported minimum log level. Use either `debug` or `info`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let base_path = std::env::current_dir().map_err(|e| {
        config::ConfigError::Message(format!("Failed to determine the current directory: {}", e))
    })?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    let settings = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(config::File::from(
            configuration_directory.join(format!("{}.yaml", environment.as_str())),
        ))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let settings: Config = settings.try_deserialize::<Config>()?;

    for validation in [settings.model.validate(), settings.labels.validate()] {
        if let Err(e) = validation {
            tracing::error!("Configuration validation failed: {}", e);
            return Err(config::ConfigError::Message(e));
        }
    }

    Ok(settings)
}
