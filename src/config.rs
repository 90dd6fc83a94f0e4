use std::collections::HashSet;
use std::path::Path;

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::indicator::bundle::{IndicatorBundle, IndicatorSettings};
use crate::market::VALID_RANGES;
use crate::market::yahoo::YAHOO_BASE_URL;
use crate::model::Interval;
use crate::projection::{MethodKind, ProjectionSettings, Projector};
use crate::ranker::{RankingRequest, SortDirection, SortKey};
use crate::series::InvalidBarPolicy;

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_refresh_secs() -> u64 {
    300
}

fn default_base_url() -> String {
    YAHOO_BASE_URL.into()
}

fn default_requests_per_second() -> u32 {
    5
}

fn default_symbol_suffix() -> String {
    ".JK".into()
}

fn default_watchlist_symbols() -> Vec<String> {
    [
        "BBRI", "TLKM", "ASII", "ADRO", "GOTO", "BMRI", "BBNI", "UNTR", "AMRT", "BRIS",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_watchlist_range() -> String {
    "5d".into()
}

fn default_analysis_range() -> String {
    "1y".into()
}

fn default_interval() -> String {
    "1d".into()
}

fn default_sort_key() -> String {
    "percent_change".into()
}

fn default_direction() -> String {
    "descending".into()
}

fn default_invalid_bars() -> String {
    "reject".into()
}

fn default_method() -> String {
    "weighted_momentum".into()
}

fn default_horizon() -> usize {
    10
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub watchlist: WatchlistConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub indicators: IndicatorsConfig,
    #[serde(default)]
    pub projection: ProjectionConfig,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Seconds between refreshes in `watch` mode.
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct MarketConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    /// Appended to every symbol when fetching, stripped for display.
    #[serde(default = "default_symbol_suffix")]
    pub symbol_suffix: String,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            requests_per_second: default_requests_per_second(),
            symbol_suffix: default_symbol_suffix(),
        }
    }
}

impl MarketConfig {
    /// Tickers are upper-cased before the suffix is appended.
    pub fn fetch_symbol(&self, symbol: &str) -> String {
        let symbol = symbol.trim().to_uppercase();
        if self.symbol_suffix.is_empty() || symbol.ends_with(&self.symbol_suffix) {
            return symbol;
        }
        format!("{symbol}{}", self.symbol_suffix)
    }

    pub fn display_symbol<'a>(&self, symbol: &'a str) -> &'a str {
        if self.symbol_suffix.is_empty() {
            return symbol;
        }
        symbol.strip_suffix(self.symbol_suffix.as_str()).unwrap_or(symbol)
    }
}

#[derive(Debug, Deserialize)]
pub struct WatchlistConfig {
    #[serde(default = "default_watchlist_symbols")]
    pub symbols: Vec<String>,
    #[serde(default = "default_watchlist_range")]
    pub range: String,
    #[serde(default = "default_interval")]
    pub interval: String,
    /// Accepted values: `"percent_change"` | `"last_price"` | `"symbol"`
    #[serde(default = "default_sort_key")]
    pub sort_key: String,
    /// Accepted values: `"ascending"` | `"descending"`
    #[serde(default = "default_direction")]
    pub direction: String,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub limit: Option<usize>,
}

impl Default for WatchlistConfig {
    fn default() -> Self {
        Self {
            symbols: default_watchlist_symbols(),
            range: default_watchlist_range(),
            interval: default_interval(),
            sort_key: default_sort_key(),
            direction: default_direction(),
            min_price: None,
            max_price: None,
            limit: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_analysis_range")]
    pub range: String,
    #[serde(default = "default_interval")]
    pub interval: String,
    /// Accepted values: `"reject"` | `"drop"`
    #[serde(default = "default_invalid_bars")]
    pub invalid_bars: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            range: default_analysis_range(),
            interval: default_interval(),
            invalid_bars: default_invalid_bars(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IndicatorsConfig {
    pub ma_window: usize,
    pub bollinger_window: usize,
    pub bollinger_k: f64,
    pub rsi_window: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub stoch_window: usize,
    pub stoch_smoothing: usize,
}

impl Default for IndicatorsConfig {
    fn default() -> Self {
        let d = IndicatorSettings::default();
        Self {
            ma_window: d.ma_window,
            bollinger_window: d.bollinger_window,
            bollinger_k: d.bollinger_k,
            rsi_window: d.rsi_window,
            macd_fast: d.macd_fast,
            macd_slow: d.macd_slow,
            macd_signal: d.macd_signal,
            stoch_window: d.stoch_window,
            stoch_smoothing: d.stoch_smoothing,
        }
    }
}

impl IndicatorsConfig {
    pub fn settings(&self) -> IndicatorSettings {
        IndicatorSettings {
            ma_window: self.ma_window,
            bollinger_window: self.bollinger_window,
            bollinger_k: self.bollinger_k,
            rsi_window: self.rsi_window,
            macd_fast: self.macd_fast,
            macd_slow: self.macd_slow,
            macd_signal: self.macd_signal,
            stoch_window: self.stoch_window,
            stoch_smoothing: self.stoch_smoothing,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProjectionConfig {
    /// Accepted values: `"weighted_momentum"` | `"regression"` | `"volume_weighted"`
    #[serde(default = "default_method")]
    pub method: String,
    /// Defaults to 40 bars, 20 for `regression`.
    pub lookback: Option<usize>,
    #[serde(default = "default_horizon")]
    pub horizon: usize,
    pub decay_rate: Option<f64>,
    pub noise_scale: Option<f64>,
    pub noise_window: Option<usize>,
    pub mean_reversion: Option<f64>,
    pub rsi_window: Option<usize>,
    pub rsi_reversal: Option<f64>,
    /// Pins the noise term; fresh entropy per run when absent.
    pub seed: Option<u64>,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            method: default_method(),
            lookback: None,
            horizon: default_horizon(),
            decay_rate: None,
            noise_scale: None,
            noise_window: None,
            mean_reversion: None,
            rsi_window: None,
            rsi_reversal: None,
            seed: None,
        }
    }
}

impl ProjectionConfig {
    pub fn settings(&self) -> Result<ProjectionSettings, Report<ConfigError>> {
        let method = MethodKind::from_str(&self.method).ok_or_else(|| {
            Report::new(ConfigError::Validation {
                field: format!("projection.method \"{}\" is not valid", self.method),
            })
        })?;
        let d = ProjectionSettings::default();
        let default_lookback = match method {
            MethodKind::Regression => 20,
            MethodKind::WeightedMomentum | MethodKind::VolumeWeighted => d.lookback,
        };
        Ok(ProjectionSettings {
            method,
            lookback: self.lookback.unwrap_or(default_lookback),
            decay_rate: self.decay_rate.unwrap_or(d.decay_rate),
            noise_scale: self.noise_scale.unwrap_or(d.noise_scale),
            noise_window: self.noise_window.unwrap_or(d.noise_window),
            mean_reversion: self.mean_reversion.unwrap_or(d.mean_reversion),
            rsi_window: self.rsi_window.unwrap_or(d.rsi_window),
            rsi_reversal: self.rsi_reversal.unwrap_or(d.rsi_reversal),
        })
    }
}

impl WatchlistConfig {
    pub fn ranking_request(&self) -> Result<RankingRequest, Report<ConfigError>> {
        let sort_key = SortKey::from_str(&self.sort_key).ok_or_else(|| {
            Report::new(ConfigError::Validation {
                field: format!("watchlist.sort_key \"{}\" is not valid", self.sort_key),
            })
        })?;
        let direction = SortDirection::from_str(&self.direction).ok_or_else(|| {
            Report::new(ConfigError::Validation {
                field: format!("watchlist.direction \"{}\" is not valid", self.direction),
            })
        })?;
        Ok(RankingRequest {
            sort_key,
            direction,
            min_price: self.min_price,
            max_price: self.max_price,
            limit: self.limit,
        })
    }
}

pub fn parse_interval(value: &str, field: &str) -> Result<Interval, Report<ConfigError>> {
    Interval::from_str(value).ok_or_else(|| {
        Report::new(ConfigError::Validation {
            field: format!("{field}: unknown interval \"{value}\""),
        })
    })
}

pub fn parse_invalid_bars(value: &str) -> Result<InvalidBarPolicy, Report<ConfigError>> {
    InvalidBarPolicy::from_str(value).ok_or_else(|| {
        Report::new(ConfigError::Validation {
            field: format!("analysis.invalid_bars \"{value}\" is not valid"),
        })
    })
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_general(config)?;
    validate_market(config)?;
    validate_watchlist(config)?;
    validate_analysis(config)?;
    validate_indicators(config)?;
    validate_projection(config)?;
    Ok(())
}

fn invalid(field: String) -> Report<ConfigError> {
    Report::new(ConfigError::Validation { field })
}

fn validate_general(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let general = &config.general;
    if !VALID_LOG_FORMATS.contains(&general.log_format.as_str()) {
        return Err(invalid(format!(
            "general.log_format \"{}\" is not valid",
            general.log_format
        )));
    }
    if general.refresh_secs == 0 {
        return Err(invalid("general.refresh_secs must be > 0".into()));
    }
    Ok(())
}

fn validate_market(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if config.market.requests_per_second == 0 {
        return Err(invalid("market.requests_per_second must be > 0".into()));
    }
    if config.market.base_url.trim().is_empty() {
        return Err(invalid("market.base_url must not be empty".into()));
    }
    Ok(())
}

fn validate_range(value: &str, field: &str) -> Result<(), Report<ConfigError>> {
    if !VALID_RANGES.contains(&value) {
        return Err(invalid(format!("{field}: unknown range \"{value}\"")));
    }
    Ok(())
}

fn validate_watchlist(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let watchlist = &config.watchlist;
    if watchlist.symbols.is_empty() {
        return Err(invalid("watchlist.symbols must not be empty".into()));
    }

    let mut seen = HashSet::new();
    for symbol in &watchlist.symbols {
        if symbol.trim().is_empty() {
            return Err(invalid("watchlist.symbols: empty symbol".into()));
        }
        if !seen.insert(symbol.as_str()) {
            return Err(invalid(format!("watchlist.symbols: duplicate \"{symbol}\"")));
        }
    }

    validate_range(&watchlist.range, "watchlist.range")?;
    parse_interval(&watchlist.interval, "watchlist.interval")?;
    watchlist.ranking_request()?;

    if let (Some(min), Some(max)) = (watchlist.min_price, watchlist.max_price)
        && min > max
    {
        return Err(invalid(format!(
            "watchlist.min_price ({min}) must not exceed max_price ({max})"
        )));
    }
    if watchlist.limit == Some(0) {
        return Err(invalid("watchlist.limit must be > 0".into()));
    }
    Ok(())
}

fn validate_analysis(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_range(&config.analysis.range, "analysis.range")?;
    parse_interval(&config.analysis.interval, "analysis.interval")?;
    parse_invalid_bars(&config.analysis.invalid_bars)?;
    Ok(())
}

fn validate_indicators(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    IndicatorBundle::required_bars(&config.indicators.settings()).change_context(
        ConfigError::Validation {
            field: "indicators".into(),
        },
    )?;
    Ok(())
}

fn validate_projection(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if config.projection.horizon == 0 {
        return Err(invalid("projection.horizon must be > 0".into()));
    }
    Projector::new(config.projection.settings()?).change_context(ConfigError::Validation {
        field: "projection".into(),
    })?;
    Ok(())
}
