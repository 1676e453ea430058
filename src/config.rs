use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::{Environment, Service};
use crate::error::DeliveryError;
use crate::submit::RetryPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "delivery.json";
pub const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub environment: Option<Environment>,
    #[serde(default)]
    pub endpoints: EndpointOverrides,
    #[serde(default)]
    pub retry: Option<RetryEntry>,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub report_dir: Option<String>,
    #[serde(default)]
    pub credentials: Option<CredentialKind>,
    #[serde(default)]
    pub invite_users_not_found: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct EndpointOverrides {
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub datarepo: Option<String>,
    #[serde(default)]
    pub storage: Option<String>,
    #[serde(default)]
    pub warehouse: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RetryEntry {
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub delay_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialKind {
    #[default]
    Gcloud,
    Env,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub workspace: String,
    pub datarepo: String,
    pub storage: String,
    pub warehouse: String,
}

impl Endpoints {
    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Prod => Self {
                workspace: "https://api.firecloud.org".to_string(),
                datarepo: "https://data.terra.bio".to_string(),
                storage: "https://storage.googleapis.com".to_string(),
                warehouse: "https://bigquery.googleapis.com".to_string(),
            },
            Environment::Dev => Self {
                workspace: "https://firecloud-orchestration.dsde-dev.broadinstitute.org"
                    .to_string(),
                datarepo: "https://jade.datarepo-dev.broadinstitute.org".to_string(),
                storage: "https://storage.googleapis.com".to_string(),
                warehouse: "https://bigquery.googleapis.com".to_string(),
            },
        }
    }

    pub fn base(&self, service: Service) -> &str {
        match service {
            Service::Workspace => &self.workspace,
            Service::Datarepo => &self.datarepo,
            Service::Storage => &self.storage,
            Service::Warehouse => &self.warehouse,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub environment: Environment,
    pub endpoints: Endpoints,
    pub retry: RetryPolicy,
    pub batch_size: usize,
    pub report_dir: Utf8PathBuf,
    pub credentials: CredentialKind,
    pub invite_users_not_found: bool,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Prod,
            endpoints: Endpoints::for_environment(Environment::Prod),
            retry: RetryPolicy::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            report_dir: Utf8PathBuf::from("reports"),
            credentials: CredentialKind::Gcloud,
            invite_users_not_found: false,
        }
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub environment: Option<Environment>,
    pub report_dir: Option<String>,
    pub max_retries: Option<u32>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, DeliveryError> {
        Self::resolve_with(path, ConfigOverrides::default())
    }

    pub fn resolve_with(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, DeliveryError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let mut config = if path.is_none() && !config_path.exists() {
            tracing::debug!("no {DEFAULT_CONFIG_FILE} found, using defaults");
            Config::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| DeliveryError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content)
                .map_err(|err| DeliveryError::ConfigParse(err.to_string()))?
        };

        if let Some(environment) = overrides.environment {
            config.environment = Some(environment);
        }
        if let Some(report_dir) = overrides.report_dir {
            config.report_dir = Some(report_dir);
        }
        if let Some(max_retries) = overrides.max_retries {
            let retry = config.retry.get_or_insert(RetryEntry {
                max_retries: None,
                delay_secs: None,
            });
            retry.max_retries = Some(max_retries);
        }

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, DeliveryError> {
        let defaults = ResolvedConfig::default();
        let environment = config.environment.unwrap_or_default();
        let base = Endpoints::for_environment(environment);
        let overrides = config.endpoints;

        let endpoints = Endpoints {
            workspace: endpoint(overrides.workspace, base.workspace)?,
            datarepo: endpoint(overrides.datarepo, base.datarepo)?,
            storage: endpoint(overrides.storage, base.storage)?,
            warehouse: endpoint(overrides.warehouse, base.warehouse)?,
        };

        let retry = match config.retry {
            Some(entry) => RetryPolicy {
                max_retries: entry.max_retries.unwrap_or(defaults.retry.max_retries),
                delay: entry
                    .delay_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.retry.delay),
            },
            None => defaults.retry,
        };

        let batch_size = config.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            return Err(DeliveryError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            environment,
            endpoints,
            retry,
            batch_size,
            report_dir: config
                .report_dir
                .map(Utf8PathBuf::from)
                .unwrap_or(defaults.report_dir),
            credentials: config.credentials.unwrap_or_default(),
            invite_users_not_found: config.invite_users_not_found.unwrap_or(false),
        })
    }
}

fn endpoint(value: Option<String>, default: String) -> Result<String, DeliveryError> {
    let value = value.unwrap_or(default);
    let trimmed = value.trim().trim_end_matches('/');
    if !(trimmed.starts_with("https://") || trimmed.starts_with("http://")) {
        return Err(DeliveryError::InvalidConfig(format!(
            "endpoint must be an http(s) URL: {value}"
        )));
    }
    Ok(trimmed.to_string())
}
