//! Engine configuration.
//!
//! Every threshold that steers classification, the acquisition cascade and
//! scoring lives here so it can be tuned without code changes. Values load
//! from a TOML file and can be overridden from the environment.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ExtractionMethod;

/// Default config filename under the user config directory.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "FINSCAN_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// Classifier thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Minimum non-whitespace native characters for a page to count as native.
    pub min_native_chars: usize,
    /// Share of pages that must agree for a native/image document verdict.
    pub majority_ratio: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_native_chars: 100,
            majority_ratio: 0.9,
        }
    }
}

/// Text acquisition cascade settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Minimum yield quality for native text to be accepted.
    pub native_min_yield: f64,
    /// Minimum yield quality for local OCR to be accepted.
    pub local_min_yield: f64,
    /// Minimum yield quality for cloud OCR to count as a success.
    pub cloud_min_yield: f64,
    /// Characters per page at which the volume component of yield saturates.
    pub chars_per_page_target: usize,
    /// Render resolution for rasterizing pages.
    pub render_dpi: u32,
    /// OCR language (Tesseract code).
    pub language: String,
    /// Timeout applied to each recognition call.
    pub attempt_timeout_secs: u64,
    /// Retries per page per tier before the tier gives up on that page.
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries.
    pub backoff_base_ms: u64,
    /// Run the image preprocessor before local OCR.
    pub preprocess: bool,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            native_min_yield: 0.6,
            local_min_yield: 0.5,
            cloud_min_yield: 0.4,
            chars_per_page_target: 100,
            render_dpi: 300,
            language: "eng".to_string(),
            attempt_timeout_secs: 120,
            max_retries: 3,
            backoff_base_ms: 500,
            preprocess: true,
        }
    }
}

impl AcquisitionConfig {
    /// Configured minimum yield for a tier.
    pub fn min_yield(&self, method: ExtractionMethod) -> f64 {
        match method {
            ExtractionMethod::NativeText => self.native_min_yield,
            ExtractionMethod::LocalOcr => self.local_min_yield,
            ExtractionMethod::CloudOcr => self.cloud_min_yield,
        }
    }
}

/// Confidence and completeness scoring weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub native_weight: f64,
    pub local_ocr_weight: f64,
    pub cloud_ocr_weight: f64,
    /// Weight of required fields in the aggregate mean (optional fields weigh 1).
    pub required_weight: f64,
    /// Specificity lost per position down a field's rule list.
    pub rule_decay: f64,
    /// Fraction of confidence removed when a later rule disagrees.
    pub conflict_penalty: f64,
    /// Completeness percentage under which high confidence is suspicious.
    pub completeness_floor_pct: f64,
    /// Aggregate confidence regarded as "high".
    pub high_confidence: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            native_weight: 1.0,
            local_ocr_weight: 0.8,
            cloud_ocr_weight: 0.9,
            required_weight: 2.0,
            rule_decay: 0.1,
            conflict_penalty: 0.25,
            completeness_floor_pct: 50.0,
            high_confidence: 0.8,
        }
    }
}

impl ScoringConfig {
    /// Reliability weight of text produced by a tier.
    pub fn tier_weight(&self, method: ExtractionMethod) -> f64 {
        match method {
            ExtractionMethod::NativeText => self.native_weight,
            ExtractionMethod::LocalOcr => self.local_ocr_weight,
            ExtractionMethod::CloudOcr => self.cloud_ocr_weight,
        }
    }
}

/// Date bounds used by schema range checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub earliest_date: NaiveDate,
    pub latest_date: NaiveDate,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            earliest_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or(NaiveDate::MIN),
            latest_date: NaiveDate::from_ymd_opt(2100, 12, 31).unwrap_or(NaiveDate::MAX),
        }
    }
}

/// Cloud recognition allotment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Pages of cloud recognition available to this process.
    pub cloud_pages: u64,
}

/// Output record options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Include attempt timestamps and per-stage timings. Off by default so that
    /// identical input yields byte-identical output.
    pub include_timings: bool,
}

/// Cloud OCR backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Ordered backend names tried within the cloud tier (e.g. ["groq", "gemini"]).
    pub backends: Vec<String>,
    /// Model override, applied to every cloud backend.
    pub model: Option<String>,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            backends: vec!["gemini".to_string()],
            model: None,
        }
    }
}

/// Worker-pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub workers: usize,
    /// Attempts at fetching raw bytes before the item is failed back to the queue.
    pub fetch_retries: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            fetch_retries: 3,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub classifier: ClassifierConfig,
    pub acquisition: AcquisitionConfig,
    pub scoring: ScoringConfig,
    pub validation: ValidationConfig,
    pub budget: BudgetConfig,
    pub cloud: CloudConfig,
    pub output: OutputConfig,
    pub service: ServiceConfig,
}

impl EngineConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: origin.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&content, path)
    }

    /// Resolve the config file: explicit path, then `$FINSCAN_CONFIG`, then the
    /// user config directory. Falls back to defaults when nothing is found, then
    /// applies environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match Self::discover(explicit) {
            Some(path) => {
                tracing::debug!("Loading config from {}", path.display());
                Self::from_file(&path)?
            }
            None => {
                tracing::debug!("No config file found, using defaults");
                Self::default()
            }
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn discover(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        dirs::config_dir()
            .map(|d| d.join("finscan").join(CONFIG_FILENAME))
            .filter(|p| p.exists())
    }

    /// Apply `FINSCAN_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(pages) = env_parse::<u64>("FINSCAN_CLOUD_BUDGET")? {
            self.budget.cloud_pages = pages;
        }
        if let Some(workers) = env_parse::<usize>("FINSCAN_WORKERS")? {
            self.service.workers = workers;
        }
        if let Ok(lang) = std::env::var("FINSCAN_OCR_LANGUAGE") {
            if !lang.trim().is_empty() {
                self.acquisition.language = lang.trim().to_string();
            }
        }
        Ok(())
    }

    /// Reject values that would break scoring invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = |key: &str, v: f64| -> Result<(), ConfigError> {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    key: key.to_string(),
                    reason: format!("{} is outside 0.0..=1.0", v),
                })
            }
        };
        unit("classifier.majority_ratio", self.classifier.majority_ratio)?;
        unit("acquisition.native_min_yield", self.acquisition.native_min_yield)?;
        unit("acquisition.local_min_yield", self.acquisition.local_min_yield)?;
        unit("acquisition.cloud_min_yield", self.acquisition.cloud_min_yield)?;
        unit("scoring.rule_decay", self.scoring.rule_decay)?;
        unit("scoring.conflict_penalty", self.scoring.conflict_penalty)?;
        unit("scoring.high_confidence", self.scoring.high_confidence)?;

        for (key, weight) in [
            ("scoring.native_weight", self.scoring.native_weight),
            ("scoring.local_ocr_weight", self.scoring.local_ocr_weight),
            ("scoring.cloud_ocr_weight", self.scoring.cloud_ocr_weight),
        ] {
            if weight <= 0.0 || weight > 1.0 {
                return Err(ConfigError::Invalid {
                    key: key.to_string(),
                    reason: format!("{} must be in (0.0, 1.0]", weight),
                });
            }
        }
        if self.scoring.required_weight < 1.0 {
            return Err(ConfigError::Invalid {
                key: "scoring.required_weight".to_string(),
                reason: "must be at least 1.0".to_string(),
            });
        }
        if self.acquisition.chars_per_page_target == 0 {
            return Err(ConfigError::Invalid {
                key: "acquisition.chars_per_page_target".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.validation.earliest_date > self.validation.latest_date {
            return Err(ConfigError::Invalid {
                key: "validation.earliest_date".to_string(),
                reason: "must not be after validation.latest_date".to_string(),
            });
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| ConfigError::Invalid {
                    key: key.to_string(),
                    reason: format!("cannot parse '{}'", raw),
                })
        }
        _ => Ok(None),
    }
}
