use crate::error::MigrateError;
use crate::migrate::{MigrationSettings, RetryPolicy};
use crate::s3::{Addressing, ListingStyle, UploadHeaders};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

const DEFAULT_REGION: &str = "us-east-1";

/// One side of the migration: where the bucket lives and how to sign for it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BucketConfig {
    /// Host, URL, or (destination only) a bare AWS region name
    pub endpoint: String,

    pub accesskeyid: String,

    pub accesskeysecret: String,

    pub bucketname: String,

    /// SigV4 signing region
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Session token for temporary credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Listing dialect (v1: marker, v2: continuation token)
    #[serde(default)]
    pub listing: ListingStyle,

    /// Address the bucket in the path instead of the host name
    #[serde(default)]
    pub path_style: bool,
}

/// Endpoint URL with its scheme plus the region to sign with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub url: String,
    pub region: String,
}

fn has_scheme(endpoint: &str) -> bool {
    endpoint.contains("://")
}

/// A bare AWS region such as `ap-southeast-1` or `us-gov-west-1`: lowercase
/// words joined by hyphens, ending in a number
fn is_bare_region(endpoint: &str) -> bool {
    let mut parts = endpoint.rsplit('-');
    let Some(number) = parts.next() else {
        return false;
    };

    let mut words = 0;
    for word in parts {
        if word.is_empty() || !word.chars().all(|c| c.is_ascii_lowercase()) {
            return false;
        }
        words += 1;
    }

    words >= 2 && !number.is_empty() && number.chars().all(|c| c.is_ascii_digit())
}

impl BucketConfig {
    pub fn addressing(&self) -> Addressing {
        if self.path_style {
            Addressing::Path
        } else {
            Addressing::VirtualHosted
        }
    }

    /// Source endpoint: a scheme-less host is reached over plain `http://`.
    pub fn source_endpoint(&self) -> ResolvedEndpoint {
        let endpoint = self.endpoint.trim().trim_end_matches('/');
        let url = if has_scheme(endpoint) {
            endpoint.to_string()
        } else {
            format!("http://{}", endpoint)
        };

        ResolvedEndpoint {
            url,
            region: self.region.clone().unwrap_or_else(|| DEFAULT_REGION.to_string()),
        }
    }

    /// Destination endpoint: a bare region name maps to the regional AWS
    /// endpoint and becomes the signing region; a scheme-less host gets
    /// `https://`.
    pub fn destination_endpoint(&self) -> ResolvedEndpoint {
        let endpoint = self.endpoint.trim().trim_end_matches('/');

        if is_bare_region(endpoint) {
            return ResolvedEndpoint {
                url: format!("https://s3.{}.amazonaws.com", endpoint),
                region: self.region.clone().unwrap_or_else(|| endpoint.to_string()),
            };
        }

        let url = if has_scheme(endpoint) {
            endpoint.to_string()
        } else {
            format!("https://{}", endpoint)
        };

        ResolvedEndpoint {
            url,
            region: self.region.clone().unwrap_or_else(|| DEFAULT_REGION.to_string()),
        }
    }

    fn validate(&self, side: &str) -> std::result::Result<(), MigrateError> {
        let required = [
            ("endpoint", &self.endpoint),
            ("accesskeyid", &self.accesskeyid),
            ("accesskeysecret", &self.accesskeysecret),
            ("bucketname", &self.bucketname),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(MigrateError::Config(format!("{}.{} must not be empty", side, field)));
            }
        }
        Ok(())
    }
}

/// Retry, timeout and throughput settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferConfig {
    /// Attempts per object and per listing page, the first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_jitter")]
    pub jitter: bool,

    /// Deadline for opening and for uploading an object (0 = none)
    #[serde(default)]
    pub attempt_timeout_secs: u64,

    /// Deadline for response headers of list and GET requests; uploads have none
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Log a checkpoint line every N copied objects
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: u64,

    /// Disable TLS certificate verification
    #[serde(default)]
    pub insecure_tls: bool,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

fn default_jitter() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    300
}

fn default_workers() -> usize {
    1
}

fn default_page_size() -> u32 {
    1000
}

fn default_checkpoint_interval() -> u64 {
    1000
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter: default_jitter(),
            attempt_timeout_secs: 0,
            request_timeout_secs: default_request_timeout(),
            workers: default_workers(),
            page_size: default_page_size(),
            checkpoint_interval: default_checkpoint_interval(),
            insecure_tls: false,
        }
    }
}

impl TransferConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(self.max_attempts)
            .with_initial_backoff(Duration::from_millis(self.initial_backoff_ms))
            .with_max_backoff(Duration::from_millis(self.max_backoff_ms))
            .with_jitter(self.jitter)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn migration_settings(&self) -> MigrationSettings {
        MigrationSettings {
            retry: self.retry_policy(),
            attempt_timeout: (self.attempt_timeout_secs > 0)
                .then(|| Duration::from_secs(self.attempt_timeout_secs)),
            workers: self.workers,
            page_size: self.page_size,
            checkpoint_interval: self.checkpoint_interval,
        }
    }
}

/// Headers set on every uploaded object; an empty string leaves one out
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadConfig {
    #[serde(default = "default_content_disposition")]
    pub content_disposition: String,

    #[serde(default = "default_server_side_encryption")]
    pub server_side_encryption: String,

    #[serde(default = "default_storage_class")]
    pub storage_class: String,
}

fn default_content_disposition() -> String {
    "attachment".to_string()
}

fn default_server_side_encryption() -> String {
    "AES256".to_string()
}

fn default_storage_class() -> String {
    "STANDARD".to_string()
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            content_disposition: default_content_disposition(),
            server_side_encryption: default_server_side_encryption(),
            storage_class: default_storage_class(),
        }
    }
}

impl UploadConfig {
    pub fn headers(&self) -> UploadHeaders {
        let non_empty = |value: &str| {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        };

        UploadHeaders {
            content_disposition: non_empty(&self.content_disposition),
            server_side_encryption: non_empty(&self.server_side_encryption),
            storage_class: non_empty(&self.storage_class),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Source bucket
    pub oss: BucketConfig,

    /// Destination bucket
    pub s3: BucketConfig,

    #[serde(default)]
    pub transfer: TransferConfig,

    /// Destination object headers
    #[serde(default)]
    pub upload: UploadConfig,
}

/// Command-line values that take precedence over the loaded configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub workers: Option<usize>,
    pub max_attempts: Option<u32>,
    pub insecure_tls: bool,
}

impl Config {
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(workers) = overrides.workers {
            self.transfer.workers = workers;
        }
        if let Some(max_attempts) = overrides.max_attempts {
            self.transfer.max_attempts = max_attempts;
        }
        if overrides.insecure_tls {
            self.transfer.insecure_tls = true;
        }
    }

    pub fn validate(&self) -> std::result::Result<(), MigrateError> {
        self.oss.validate("oss")?;
        self.s3.validate("s3")?;

        let transfer = &self.transfer;
        if transfer.max_attempts == 0 {
            return Err(MigrateError::Config("transfer.max_attempts must be at least 1".to_string()));
        }
        if transfer.workers == 0 {
            return Err(MigrateError::Config("transfer.workers must be at least 1".to_string()));
        }
        if !(1..=1000).contains(&transfer.page_size) {
            return Err(MigrateError::Config(format!(
                "transfer.page_size must be between 1 and 1000, got {}",
                transfer.page_size
            )));
        }
        if transfer.checkpoint_interval == 0 {
            return Err(MigrateError::Config(
                "transfer.checkpoint_interval must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .context(format!("Failed to read config file: {:?}", path.as_ref()))?;

    let config: Config = serde_yaml::from_str(&content)
        .context("Failed to parse YAML configuration")?;

    Ok(config)
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name).context(format!("{} environment variable not set", name))
}

fn bucket_from_env(prefix: &str) -> Result<BucketConfig> {
    let optional = |suffix: &str| {
        std::env::var(format!("{}_{}", prefix, suffix))
            .ok()
            .filter(|v| !v.is_empty())
    };

    Ok(BucketConfig {
        endpoint: required_var(&format!("{}_ENDPOINT", prefix))?,
        accesskeyid: required_var(&format!("{}_ACCESS_KEY_ID", prefix))?,
        accesskeysecret: required_var(&format!("{}_ACCESS_KEY_SECRET", prefix))?,
        bucketname: required_var(&format!("{}_BUCKET", prefix))?,
        region: optional("REGION"),
        token: optional("TOKEN"),
        listing: ListingStyle::default(),
        path_style: false,
    })
}

/// Load configuration from environment variables
///
/// - OSS_ENDPOINT, OSS_ACCESS_KEY_ID, OSS_ACCESS_KEY_SECRET, OSS_BUCKET
/// - S3_ENDPOINT, S3_ACCESS_KEY_ID, S3_ACCESS_KEY_SECRET, S3_BUCKET
/// - OSS_REGION / S3_REGION, OSS_TOKEN / S3_TOKEN (optional)
///
/// A `.env` file in the working directory is read first if present.
pub fn load_from_env() -> Result<Config> {
    let _ = dotenvy::dotenv();

    Ok(Config {
        oss: bucket_from_env("OSS")?,
        s3: bucket_from_env("S3")?,
        transfer: TransferConfig::default(),
        upload: UploadConfig::default(),
    })
}

/// Load configuration.
///
/// Uses `config_path` if given, then `./config.yaml` if it exists, then the
/// environment. The result is not validated; call [`Config::validate`] once
/// command-line overrides are applied.
pub fn load_config(config_path: Option<&str>) -> Result<Config> {
    match config_path {
        Some(path) => load_from_yaml(path),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => load_from_yaml(DEFAULT_CONFIG_FILE),
        None => load_from_env(),
    }
}
