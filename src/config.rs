use crate::error::{AppError, Result};
use crate::model::Variant;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub narrative: NarrativeConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub search: Option<SearchConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_api_timeout", deserialize_with = "deserialize_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub endpoints: Endpoints,
}

fn default_api_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

/// Endpoint paths relative to `api.base_url`. `{id}` is replaced by the
/// point identifier.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Endpoints {
    pub groundwater_catalog: String,
    pub water_quality_catalog: String,
    pub monthly_series: String,
    pub daily_series: String,
    pub inspection_photos: String,
    pub water_quality_collection: String,
    pub water_quality_history: String,
    pub narrative_feedback: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            groundwater_catalog: "/piezometros/filtro".to_string(),
            water_quality_catalog: "/qualidade-agua/pontos".to_string(),
            monthly_series: "/relatorios/piezometro/{id}/filtro-com-historico".to_string(),
            daily_series: "/relatorios/piezometro/{id}/diario".to_string(),
            inspection_photos: "/piezometros/{id}/fotos-inspecao".to_string(),
            water_quality_collection: "/qualidade-agua/{id}/coleta-completa".to_string(),
            water_quality_history: "/qualidade-agua/{id}/historico-completo".to_string(),
            narrative_feedback: "/avaliacoes-analise-ia-qualidade-agua".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NarrativeConfig {
    pub groundwater_url: String,
    pub water_quality_url: String,
    #[serde(
        default = "default_narrative_timeout",
        deserialize_with = "deserialize_seconds"
    )]
    pub timeout_seconds: u64,
}

fn default_narrative_timeout() -> u64 {
    1000 // AI webhooks routinely take minutes
}

/// Custom deserializer that handles a duration in seconds as both number and string
///
/// Accepts:
/// - `timeout_seconds: 30` (number)
/// - `timeout_seconds: "30"` (string that parses to number)
/// - `timeout_seconds: ${API_TIMEOUT}` (env var substituted to either)
fn deserialize_seconds<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SecondsValue {
        Number(u64),
        String(String),
    }

    match SecondsValue::deserialize(deserializer)? {
        SecondsValue::Number(n) => Ok(n),
        SecondsValue::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| serde::de::Error::custom(format!("Invalid number of seconds: '{}'", s))),
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
        }
    }
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".piezo-monitor")
}

/// Search issued by the command-line driver.
#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    pub variant: Variant,
    #[serde(default)]
    pub entities: Vec<i64>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    #[serde(default)]
    pub daily: bool,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_status")]
    pub status: Option<String>,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub auto_apply: bool,
}

fn default_status() -> Option<String> {
    Some("A".to_string())
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AppError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // Substitute environment variables
        let expanded = expand_env_vars(content)?;

        let config: Config = serde_yaml::from_str(&expanded)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    ///
    /// Checks for:
    /// - Well-formed http(s) URLs
    /// - Positive timeouts
    /// - Status codes the catalog understands
    fn validate(&self) -> Result<()> {
        let urls = [
            ("api.base_url", &self.api.base_url),
            ("narrative.groundwater_url", &self.narrative.groundwater_url),
            ("narrative.water_quality_url", &self.narrative.water_quality_url),
        ];

        for (field_name, value) in &urls {
            validate_url(field_name, value)?;
        }

        if self.api.timeout_seconds == 0 {
            return Err(AppError::Config(
                "api.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.narrative.timeout_seconds == 0 {
            return Err(AppError::Config(
                "narrative.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.api.max_retries > 10 {
            return Err(AppError::Config(format!(
                "api.max_retries {} seems too high, maximum recommended is 10",
                self.api.max_retries
            )));
        }

        if let Some(search) = &self.search {
            if let Some(status) = &search.status {
                if crate::model::Status::from_code(status).is_none() {
                    return Err(AppError::Config(format!(
                        "search.status '{}' must be 'A' (active) or 'I' (inactive)",
                        status
                    )));
                }
            }

            if search.daily && search.variant == Variant::WaterQuality {
                tracing::warn!("search.daily is ignored for water quality searches");
            }
        }

        Ok(())
    }
}

fn validate_url(field_name: &str, value: &str) -> Result<()> {
    if value.contains("${") {
        return Err(AppError::Config(format!(
            "{} references an environment variable that is not set. \
             Please set it or create a .env file.",
            field_name
        )));
    }

    let parsed = url::Url::parse(value)
        .map_err(|e| AppError::Config(format!("Invalid {} '{}': {}", field_name, value, e)))?;

    if parsed.scheme() != "https" && parsed.scheme() != "http" {
        return Err(AppError::Config(format!(
            "{} must use http or https, got: {}",
            field_name,
            parsed.scheme()
        )));
    }

    Ok(())
}

/// Replaces each `${NAME}` with the value of `NAME`. Every unset name is
/// reported at once, sorted.
fn expand_env_vars(content: &str) -> Result<String> {
    let placeholder = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| AppError::Config(format!("Invalid placeholder pattern: {}", e)))?;

    let mut unset = Vec::new();
    let expanded = placeholder.replace_all(content, |caps: &regex_lite::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_else(|_| {
            unset.push(caps[1].to_string());
            String::new()
        })
    });

    if unset.is_empty() {
        return Ok(expanded.into_owned());
    }
    unset.sort();
    unset.dedup();
    Err(AppError::Config(format!(
        "config references unset variable(s) {}; define them in .env (see .env.example) or the environment",
        unset.join(", ")
    )))
}
