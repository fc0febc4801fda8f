//! Engine configuration
//!
//! Holds the thresholds used by the heuristic components and the per-analysis
//! timeouts for the remote model.
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/fintel/config/engine.toml)
//! 2. Fall back to embedded defaults (compiled into binary)

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/engine.toml");

/// Fewest same-description transactions that can form a recurring pattern
pub const MIN_RECURRING_OCCURRENCES: usize = 3;

/// The four analysis requests the engine can serve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisKind {
    CategorizeTransactions,
    IdentifyPatterns,
    DetectAnomalies,
    GeneratePredictions,
}

impl AnalysisKind {
    /// Get the config/activity key for this analysis
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CategorizeTransactions => "categorize_transactions",
            Self::IdentifyPatterns => "identify_patterns",
            Self::DetectAnomalies => "detect_anomalies",
            Self::GeneratePredictions => "generate_predictions",
        }
    }

    pub fn all() -> &'static [AnalysisKind] {
        &[
            Self::CategorizeTransactions,
            Self::IdentifyPatterns,
            Self::DetectAnomalies,
            Self::GeneratePredictions,
        ]
    }
}

impl std::str::FromStr for AnalysisKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "categorize_transactions" => Ok(Self::CategorizeTransactions),
            "identify_patterns" => Ok(Self::IdentifyPatterns),
            "detect_anomalies" => Ok(Self::DetectAnomalies),
            "generate_predictions" => Ok(Self::GeneratePredictions),
            _ => Err(format!("Unknown analysis kind: {}", s)),
        }
    }
}

impl std::fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Remote model settings
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteConfig {
    /// Whether to try the remote model at all
    pub enabled: bool,
    /// Timeout when no per-analysis override exists
    pub default_timeout: Duration,
    /// Per-analysis timeouts
    pub timeouts: HashMap<AnalysisKind, Duration>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_timeout: Duration::from_secs(20),
            timeouts: HashMap::new(),
        }
    }
}

impl RemoteConfig {
    /// Get the timeout for an analysis
    pub fn timeout_for(&self, kind: AnalysisKind) -> Duration {
        self.timeouts
            .get(&kind)
            .copied()
            .unwrap_or(self.default_timeout)
    }
}

/// Pattern detection thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct PatternConfig {
    /// Minimum members of a description group to call it recurring
    pub min_occurrences: usize,
    /// Maximum change between successive gaps (days)
    pub gap_tolerance_days: i64,
    /// Confidence attached to recurring patterns
    pub recurring_confidence: f64,
    /// R² a trend line must exceed
    pub trend_min_r_squared: f64,
    /// Consecutive months that must move in the slope's direction
    pub trend_min_consecutive_months: usize,
    /// Minimum uplift over the yearly baseline (0.2 = 20%)
    pub seasonal_min_uplift: f64,
    /// Maximum coefficient of variation of the yearly uplifts
    pub seasonal_max_cv: f64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            min_occurrences: MIN_RECURRING_OCCURRENCES,
            gap_tolerance_days: 3,
            recurring_confidence: 0.95,
            trend_min_r_squared: 0.6,
            trend_min_consecutive_months: 3,
            seasonal_min_uplift: 0.2,
            seasonal_max_cv: 0.25,
        }
    }
}

/// How far back the unusual-merchant check looks for prior occurrences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MerchantHistoryWindow {
    /// Any earlier transaction in the set counts
    AllTime,
    /// Only earlier transactions within this many days count
    RollingDays(i64),
}

/// Anomaly detection thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyConfig {
    /// Threshold = mean + sigma_multiplier × σ
    pub sigma_multiplier: f64,
    /// Severity is high at or above threshold × this factor
    pub high_severity_factor: f64,
    /// Duplicates must be strictly closer than this
    pub duplicate_window: chrono::Duration,
    /// Duplicates must differ by strictly less than this amount
    pub duplicate_amount_tolerance: f64,
    pub merchant_history: MerchantHistoryWindow,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            sigma_multiplier: 2.0,
            high_severity_factor: 1.5,
            duplicate_window: chrono::Duration::hours(24),
            duplicate_amount_tolerance: 0.01,
            merchant_history: MerchantHistoryWindow::AllTime,
        }
    }
}

/// Forecasting settings
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastConfig {
    /// Trailing months of history used for averages
    pub lookback_months: u32,
    /// Spend/budget ratio at which a category becomes at risk
    pub at_risk_ratio: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            lookback_months: 3,
            at_risk_ratio: 0.8,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineConfig {
    pub remote: RemoteConfig,
    pub patterns: PatternConfig,
    pub anomalies: AnomalyConfig,
    pub forecast: ForecastConfig,
}

impl EngineConfig {
    /// Load from the default override location, falling back to embedded defaults
    pub fn load() -> Result<Self> {
        match default_config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::embedded(),
        }
    }

    /// Load from a specific override path (embedded defaults if it does not exist)
    ///
    /// Keys present in the override replace the embedded values; everything
    /// else keeps its embedded value.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::embedded()?;
        if path.exists() {
            let content = fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;
            apply_config(&mut config, &content)?;
        }
        Ok(config)
    }

    /// The embedded default configuration
    pub fn embedded() -> Result<Self> {
        parse_config(DEFAULT_CONFIG)
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        parse_config(content)
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("fintel").join("config").join("engine.toml"))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    remote: Option<RawRemote>,
    patterns: Option<RawPatterns>,
    anomalies: Option<RawAnomalies>,
    forecast: Option<RawForecast>,
}

#[derive(Debug, Deserialize)]
struct RawRemote {
    enabled: Option<bool>,
    timeout_secs: Option<u64>,
    tasks: Option<HashMap<String, RawTask>>,
}

#[derive(Debug, Deserialize)]
struct RawTask {
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawPatterns {
    min_occurrences: Option<usize>,
    gap_tolerance_days: Option<i64>,
    recurring_confidence: Option<f64>,
    trend_min_r_squared: Option<f64>,
    trend_min_consecutive_months: Option<usize>,
    seasonal_min_uplift: Option<f64>,
    seasonal_max_cv: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawAnomalies {
    sigma_multiplier: Option<f64>,
    high_severity_factor: Option<f64>,
    duplicate_window_hours: Option<i64>,
    duplicate_amount_tolerance: Option<f64>,
    merchant_history: Option<String>,
    merchant_history_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawForecast {
    lookback_months: Option<u32>,
    at_risk_ratio: Option<f64>,
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<EngineConfig> {
    let mut config = EngineConfig::default();
    apply_config(&mut config, content)?;
    Ok(config)
}

/// Overlay the keys of a TOML document onto `config`
fn apply_config(config: &mut EngineConfig, content: &str) -> Result<()> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    if let Some(remote) = raw.remote {
        if let Some(enabled) = remote.enabled {
            config.remote.enabled = enabled;
        }
        if let Some(timeout) = remote.timeout_secs {
            config.remote.default_timeout = Duration::from_secs(timeout);
        }
        if let Some(tasks) = remote.tasks {
            for (name, task) in tasks {
                let kind: AnalysisKind = match name.parse() {
                    Ok(kind) => kind,
                    Err(_) => {
                        tracing::warn!(task = %name, "Ignoring unknown analysis in config");
                        continue;
                    }
                };
                if let Some(timeout) = task.timeout_secs {
                    config
                        .remote
                        .timeouts
                        .insert(kind, Duration::from_secs(timeout));
                }
            }
        }
    }

    if let Some(p) = raw.patterns {
        let c = &mut config.patterns;
        if let Some(v) = p.min_occurrences {
            c.min_occurrences = v.max(MIN_RECURRING_OCCURRENCES);
        }
        if let Some(v) = p.gap_tolerance_days {
            c.gap_tolerance_days = v;
        }
        if let Some(v) = p.recurring_confidence {
            c.recurring_confidence = v.clamp(0.0, 1.0);
        }
        if let Some(v) = p.trend_min_r_squared {
            c.trend_min_r_squared = v;
        }
        if let Some(v) = p.trend_min_consecutive_months {
            c.trend_min_consecutive_months = v.max(2);
        }
        if let Some(v) = p.seasonal_min_uplift {
            c.seasonal_min_uplift = v;
        }
        if let Some(v) = p.seasonal_max_cv {
            c.seasonal_max_cv = v;
        }
    }

    if let Some(a) = raw.anomalies {
        let c = &mut config.anomalies;
        if let Some(v) = a.sigma_multiplier {
            c.sigma_multiplier = v;
        }
        if let Some(v) = a.high_severity_factor {
            c.high_severity_factor = v;
        }
        if let Some(v) = a.duplicate_window_hours {
            c.duplicate_window = chrono::TimeDelta::try_hours(v)
                .filter(|w| *w > chrono::TimeDelta::zero())
                .ok_or_else(|| {
                    Error::Config(format!("duplicate_window_hours out of range: {}", v))
                })?;
        }
        if let Some(v) = a.duplicate_amount_tolerance {
            c.duplicate_amount_tolerance = v;
        }
        let days = a.merchant_history_days.unwrap_or(90);
        if days < 0 || chrono::TimeDelta::try_days(days).is_none() {
            return Err(Error::Config(format!(
                "merchant_history_days out of range: {}",
                days
            )));
        }
        match a.merchant_history.as_deref() {
            None => {}
            Some("all_time") => c.merchant_history = MerchantHistoryWindow::AllTime,
            Some("rolling") => c.merchant_history = MerchantHistoryWindow::RollingDays(days),
            Some(other) => {
                return Err(Error::Config(format!(
                    "Unknown merchant_history '{}': expected all_time or rolling",
                    other
                )))
            }
        }
    }

    if let Some(f) = raw.forecast {
        if let Some(v) = f.lookback_months {
            config.forecast.lookback_months = v.max(1);
        }
        if let Some(v) = f.at_risk_ratio {
            config.forecast.at_risk_ratio = v;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_config() {
        let config = parse_config(DEFAULT_CONFIG).unwrap();
        assert!(config.remote.enabled);
        assert_eq!(config.patterns, PatternConfig::default());
        assert_eq!(config.anomalies, AnomalyConfig::default());
        assert_eq!(config.forecast, ForecastConfig::default());
    }

    #[test]
    fn test_timeout_for_task() {
        let config = parse_config(DEFAULT_CONFIG).unwrap();
        assert_eq!(
            config.remote.timeout_for(AnalysisKind::GeneratePredictions),
            Duration::from_secs(30)
        );
        assert_eq!(
            config.remote.timeout_for(AnalysisKind::DetectAnomalies),
            Duration::from_secs(20)
        );
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = parse_config(
            r#"
[anomalies]
merchant_history = "rolling"
merchant_history_days = 30

[forecast]
lookback_months = 6
"#,
        )
        .unwrap();

        assert_eq!(
            config.anomalies.merchant_history,
            MerchantHistoryWindow::RollingDays(30)
        );
        assert_eq!(config.anomalies.sigma_multiplier, 2.0);
        assert_eq!(config.forecast.lookback_months, 6);
        assert_eq!(config.patterns.min_occurrences, 3);
    }

    #[test]
    fn test_min_occurrences_never_below_three() {
        let config = parse_config("[patterns]\nmin_occurrences = 2\n").unwrap();
        assert_eq!(config.patterns.min_occurrences, 3);

        let config = parse_config("[patterns]\nmin_occurrences = 5\n").unwrap();
        assert_eq!(config.patterns.min_occurrences, 5);
    }

    #[test]
    fn test_out_of_range_durations_rejected() {
        let err = parse_config("[anomalies]\nduplicate_window_hours = 9223372036854775807\n")
            .unwrap_err();
        assert!(err.to_string().contains("duplicate_window_hours"));

        assert!(parse_config("[anomalies]\nduplicate_window_hours = -1\n").is_err());

        let err = parse_config(
            "[anomalies]\nmerchant_history = \"rolling\"\nmerchant_history_days = 9223372036854775807\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("merchant_history_days"));
    }

    #[test]
    fn test_unknown_merchant_history_rejected() {
        let err = parse_config("[anomalies]\nmerchant_history = \"weekly\"\n").unwrap_err();
        assert!(err.to_string().contains("merchant_history"));
    }

    #[test]
    fn test_unknown_task_ignored() {
        let config = parse_config("[remote.tasks.summarize]\ntimeout_secs = 5\n").unwrap();
        assert!(config.remote.timeouts.is_empty());
    }

    #[test]
    fn test_load_from_missing_path_uses_embedded() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load_from(&dir.path().join("engine.toml")).unwrap();
        assert_eq!(config, EngineConfig::embedded().unwrap());
    }

    #[test]
    fn test_load_from_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        fs::write(&path, "[remote]\nenabled = false\n").unwrap();
        let config = EngineConfig::load_from(&path).unwrap();
        assert!(!config.remote.enabled);
        // Embedded per-analysis timeouts survive a partial override
        assert_eq!(
            config.remote.timeout_for(AnalysisKind::CategorizeTransactions),
            Duration::from_secs(15)
        );
    }

    #[test]
    fn test_analysis_kind_roundtrip() {
        for kind in AnalysisKind::all() {
            assert_eq!(kind.as_str().parse::<AnalysisKind>().unwrap(), *kind);
        }
    }
}
