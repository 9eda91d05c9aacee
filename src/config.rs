use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_REQUIRED_STAGE: &str = "953048614";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub servicem8_api_key: String,
    pub hubspot_api_token: String,
    pub servicem8_base_url: String,
    pub hubspot_base_url: String,
    pub request_timeout_secs: u64,
    pub stage_gate: StageGate,
    pub include_job_address: bool,
    pub job_id_property: String,
}

/// Only deals sitting in `required_stage` get a job when the gate is enabled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StageGate {
    pub enabled: bool,
    pub required_stage: String,
}

impl Default for StageGate {
    fn default() -> Self {
        Self {
            enabled: true,
            required_stage: DEFAULT_REQUIRED_STAGE.to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            servicem8_api_key: String::new(),
            hubspot_api_token: String::new(),
            servicem8_base_url: "https://api.servicem8.com".to_string(),
            hubspot_base_url: "https://api.hubapi.com".to_string(),
            request_timeout_secs: 30,
            stage_gate: StageGate::default(),
            include_job_address: true,
            job_id_property: "sm8_job_id".to_string(),
        }
    }
}

impl AppConfig {
    /// Reads the config file (if any), applies environment overrides and
    /// validates the result.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("DEAL_JOB_SYNC_CONFIG")
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .or_else(default_config_path);

        let mut config = match path {
            Some(ref path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// A missing file is not an error; it just means defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Environment values win over the file. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = var("SERVICEM8_API_KEY") {
            self.servicem8_api_key = key;
        }
        if let Some(token) = var("HUBSPOT_API_TOKEN") {
            self.hubspot_api_token = token;
        }
        if let Some(stage) = var("REQUIRED_DEAL_STAGE_ID") {
            self.stage_gate.required_stage = stage;
        }
        if let Some(flag) = var("DEAL_STAGE_GATE") {
            match parse_flag(&flag) {
                Some(enabled) => self.stage_gate.enabled = enabled,
                None => log::warn!("Ignoring DEAL_STAGE_GATE={flag}: expected on/off"),
            }
        }
        if let Some(secs) = var("JOB_REQUEST_TIMEOUT_SECS") {
            match secs.trim().parse() {
                Ok(secs) => self.request_timeout_secs = secs,
                Err(_) => log::warn!("Ignoring JOB_REQUEST_TIMEOUT_SECS={secs}: not a number"),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.servicem8_api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential("SERVICEM8_API_KEY"));
        }
        if self.hubspot_api_token.trim().is_empty() {
            return Err(ConfigError::MissingCredential("HUBSPOT_API_TOKEN"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("deal-job-sync").join("config.json"))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}
