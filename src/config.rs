use crate::cli::CliArgs;
use crate::intent::DEFAULT_NAMESPACE;
use crate::router::DEFAULT_LOG_TAIL_LINES;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const FALLBACK_API_KEY_ENV: &str = "API_KEY";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_SERVICES: [&str; 10] = [
    "recommendationservice",
    "emailservice",
    "productcatalogservice",
    "adservice",
    "shippingservice",
    "frontend",
    "cartservice",
    "currencyservice",
    "paymentservice",
    "checkoutservice",
];

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RuntimeConfig {
    pub source: Option<String>,
    pub services: Vec<String>,
    pub overview_namespace: String,
    pub model: String,
    pub api_key_env: String,
    pub log_tail_lines: i64,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct KubepromptConfigFile {
    #[serde(default, alias = "catalog")]
    services: Vec<String>,
    #[serde(default, alias = "namespace")]
    overview_namespace: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    api_key_env: Option<String>,
    #[serde(default, alias = "tail_lines")]
    log_tail_lines: Option<i64>,
    #[serde(default, alias = "timeout_secs", alias = "timeout")]
    request_timeout_secs: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            source: None,
            services: DEFAULT_SERVICES.iter().map(|name| name.to_string()).collect(),
            overview_namespace: DEFAULT_NAMESPACE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            log_tail_lines: DEFAULT_LOG_TAIL_LINES,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl RuntimeConfig {
    /// Loads the explicit file when given, otherwise the first discovered one.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    bail!("config file {} does not exist", path.display());
                }
                Some(path.to_path_buf())
            }
            None => discover_config_path(),
        };
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read runtime config {}", path.display()))?;
        Self::from_yaml(&raw, &path.display().to_string())
    }

    pub fn from_yaml(raw: &str, source: &str) -> Result<Self> {
        let parsed: KubepromptConfigFile = if raw.trim().is_empty() {
            KubepromptConfigFile::default()
        } else {
            serde_yaml::from_str(raw)
                .with_context(|| format!("failed to parse runtime config {source}"))?
        };

        let defaults = Self::default();
        let services = normalize_services(parsed.services);
        let log_tail_lines = match parsed.log_tail_lines {
            Some(lines) if lines < 1 => {
                bail!("log_tail_lines in {source} must be at least 1, got {lines}")
            }
            Some(lines) => lines,
            None => defaults.log_tail_lines,
        };
        let request_timeout = match parsed.request_timeout_secs {
            Some(0) => bail!("request_timeout_secs in {source} must be at least 1"),
            Some(secs) => Duration::from_secs(secs),
            None => defaults.request_timeout,
        };

        Ok(Self {
            source: Some(source.to_string()),
            services: if services.is_empty() {
                defaults.services
            } else {
                services
            },
            overview_namespace: non_blank(parsed.overview_namespace)
                .unwrap_or(defaults.overview_namespace),
            model: non_blank(parsed.model).unwrap_or(defaults.model),
            api_key_env: non_blank(parsed.api_key_env).unwrap_or(defaults.api_key_env),
            log_tail_lines,
            request_timeout,
        })
    }

    pub fn apply_cli(&mut self, cli: &CliArgs) {
        if let Some(model) = cli.model.as_deref().map(str::trim)
            && !model.is_empty()
        {
            self.model = model.to_string();
        }
    }

    /// Reads the configured key variable, then the generic fallback.
    pub fn resolve_api_key(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
        [self.api_key_env.as_str(), FALLBACK_API_KEY_ENV]
            .into_iter()
            .find_map(|name| lookup(name).filter(|value| !value.trim().is_empty()))
            .map(|value| value.trim().to_string())
            .with_context(|| {
                format!(
                    "no language model API key: set {} (or {FALLBACK_API_KEY_ENV})",
                    self.api_key_env
                )
            })
    }
}

fn normalize_services(services: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(services.len());
    for service in services {
        let service = service.trim();
        if !service.is_empty() && !normalized.iter().any(|known| known == service) {
            normalized.push(service.to_string());
        }
    }
    normalized
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("KUBEPROMPT_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [
        PathBuf::from("kubeprompt.yaml"),
        PathBuf::from("kubeprompt.yml"),
        PathBuf::from(".kubeprompt.yaml"),
    ];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let user_candidates = [
            PathBuf::from(&home).join(".config/kubeprompt/config.yaml"),
            PathBuf::from(&home).join(".config/kubeprompt/config.yml"),
        ];
        for candidate in user_candidates {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}
