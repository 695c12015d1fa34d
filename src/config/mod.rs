#[cfg(feature = "cli")]
pub mod cli;
pub mod reload;

use crate::core::template::{render, TemplateContext};
use crate::core::watcher::WatcherConfig;
use crate::domain::model::{Port, RequestStep, ServiceGroup, ServiceMap};
use crate::utils::error::{Result, SyncError};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_required_field,
    validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Searched in order when no configuration file is given explicitly.
pub const DEFAULT_CONFIG_LOCATIONS: &[&str] = &["/etc/gluetun-sync/config.toml", "config.toml"];

fn default_debounce_ms() -> u64 {
    1000
}

fn default_retry_interval_ms() -> u64 {
    10_000
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default, alias = "port-file")]
    pub port_file: Option<String>,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Delay used when events keep arriving while a debounce is pending.
    #[serde(default)]
    pub debounce_rearm_ms: Option<u64>,
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default, alias = "requests")]
    pub services: ServiceMap,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port_file: None,
            debounce_ms: default_debounce_ms(),
            debounce_rearm_ms: None,
            retry_interval_ms: default_retry_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            services: ServiceMap::new(),
        }
    }
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SyncError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Loads and validates the services of a configuration file, leaving the
    /// scalar settings unchecked.
    pub fn load_services<P: AsRef<Path>>(path: P) -> Result<ServiceMap> {
        let config = Self::from_file(path)?;
        validate_services(&config.services)?;
        Ok(config.services)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| SyncError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${QBIT_PASSWORD})，找不到的變數保持原樣
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        use std::sync::OnceLock;

        static ENV_VAR: OnceLock<Regex> = OnceLock::new();
        let re = ENV_VAR.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var regex"));

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
    }

    /// Resolves the configuration file to load.
    pub fn locate(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }

        DEFAULT_CONFIG_LOCATIONS
            .iter()
            .map(PathBuf::from)
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| SyncError::MissingConfigError {
                field: format!("config (searched {})", DEFAULT_CONFIG_LOCATIONS.join(", ")),
            })
    }

    pub fn port_file_path(&self) -> Result<PathBuf> {
        validate_required_field("port_file", &self.port_file).map(PathBuf::from)
    }

    pub fn watcher_config(&self) -> WatcherConfig {
        let debounce = Duration::from_millis(self.debounce_ms);
        let rearm = self
            .debounce_rearm_ms
            .map(Duration::from_millis)
            .unwrap_or(debounce);
        WatcherConfig::new(debounce).with_rearm(rearm)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        let port_file = validate_required_field("port_file", &self.port_file)?;
        validate_path("port_file", port_file)?;

        validate_positive_number("debounce_ms", self.debounce_ms, 1)?;
        if let Some(rearm) = self.debounce_rearm_ms {
            validate_positive_number("debounce_rearm_ms", rearm, 1)?;
        }
        validate_positive_number("retry_interval_ms", self.retry_interval_ms, 1)?;
        validate_positive_number("request_timeout_secs", self.request_timeout_secs, 1)?;

        validate_services(&self.services)
    }
}

/// Checks every request against the invariants the dispatcher relies on.
pub fn validate_services(services: &ServiceMap) -> Result<()> {
    for (name, group) in services {
        validate_non_empty_string("services", name)?;
        validate_service(name, group)?;
    }
    Ok(())
}

fn validate_service(name: &str, group: &ServiceGroup) -> Result<()> {
    let sample = TemplateContext::for_group(Port::MIN, &group.credentials);

    for (index, request) in group.requests.iter().enumerate() {
        let field = format!("services.{}.requests[{}]", name, index);
        validate_request(&field, request, &sample)?;
    }
    Ok(())
}

fn validate_request(field: &str, request: &RequestStep, sample: &TemplateContext) -> Result<()> {
    let url_field = format!("{}.url", field);
    validate_non_empty_string(&url_field, &request.url)?;

    let rendered = render(&request.url, sample).map_err(|e| SyncError::InvalidConfigValueError {
        field: url_field.clone(),
        value: request.url.clone(),
        reason: e.to_string(),
    })?;
    validate_url(&url_field, &rendered).map_err(|_| SyncError::InvalidConfigValueError {
        field: url_field.clone(),
        value: request.url.clone(),
        reason: "must render to a valid http(s) URL".to_string(),
    })?;

    // Empty strings count as unset, as in the dispatcher.
    let content_type = request.content_type.as_deref().filter(|c| !c.is_empty());
    let body = request.body.as_deref().filter(|b| !b.is_empty());
    match (content_type, body) {
        (Some(_), Some(body)) => {
            render(body, sample).map_err(|e| SyncError::InvalidConfigValueError {
                field: format!("{}.body", field),
                value: body.to_string(),
                reason: e.to_string(),
            })?;
            Ok(())
        }
        (None, None) => Ok(()),
        _ => Err(SyncError::ConfigMismatchError {
            message: format!("{}: content_type and body must be set together", field),
        }),
    }
}
