use crate::error::ConfigError;
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const DEFAULT_USER_AGENT: &str = "thread-harvest/0.1 (comment export)";
pub const DEFAULT_OUTPUT_DIR: &str = "./downloaded-comments";
pub const MAX_CONCURRENCY: usize = 8;

/// Settings for one harvesting run. Credentials are never written back out.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub user_agent: String,
    pub concurrency: usize,
    /// Number of leading records used to infer the column set; 0 means all.
    pub column_sample: usize,
    pub output_dir: PathBuf,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            concurrency: 1,
            column_sample: 2,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl std::fmt::Debug for HarvestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarvestConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .field("user_agent", &self.user_agent)
            .field("concurrency", &self.concurrency)
            .field("column_sample", &self.column_sample)
            .field("output_dir", &self.output_dir)
            .finish()
    }
}

impl HarvestConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => ConfigError::Io(e),
        })?;
        Self::from_toml_str(&raw)
    }

    /// Loads the optional file, then applies environment overrides and validates.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies `REDDIT_*` / `HARVEST_*` overrides from `lookup`, then validates.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup("REDDIT_CLIENT_ID") {
            self.client_id = Some(id);
        }
        if let Some(secret) = lookup("REDDIT_CLIENT_SECRET") {
            self.client_secret = Some(secret);
        }
        if let Some(agent) = lookup("REDDIT_USER_AGENT") {
            self.user_agent = agent;
        }
        if let Some(raw) = lookup("HARVEST_CONCURRENCY") {
            self.concurrency = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: "concurrency".to_string(),
                value: raw.clone(),
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::InvalidValue {
                field: "concurrency".to_string(),
                value: self.concurrency.to_string(),
            });
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "user_agent".to_string(),
                value: self.user_agent.clone(),
            });
        }
        Ok(())
    }

    /// Returns `(client_id, client_secret)` or names the missing one.
    pub fn credentials(&self) -> Result<(&str, &str), ConfigError> {
        let id = non_empty(&self.client_id).ok_or_else(|| ConfigError::MissingField {
            field: "client_id".to_string(),
        })?;
        let secret = non_empty(&self.client_secret).ok_or_else(|| ConfigError::MissingField {
            field: "client_secret".to_string(),
        })?;
        Ok((id, secret))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
