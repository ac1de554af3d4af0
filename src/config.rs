//! Scan configuration: per-request filters and engine-wide tuning
//!
//! [`ScanFilters`] is the per-request view (what the caller asks for);
//! [`ScanConfig`] carries the engine constants (limits, weights, thresholds).
//! Both deserialize with defaults for every missing key.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::indicators::IndicatorConfig;
use crate::pattern::MIN_PATTERN_LEN;
use crate::signals::SignalId;
use crate::similarity::DtwConfig;
use crate::{MatchError, Result};

// ============================================================
// MARKET CAP
// ============================================================

/// Market-cap bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CapBucket {
    Small,
    Mid,
    Large,
}

impl CapBucket {
    /// Case-insensitive parse of `SMALL`/`MID`/`LARGE`
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SMALL" => Some(CapBucket::Small),
            "MID" => Some(CapBucket::Mid),
            "LARGE" => Some(CapBucket::Large),
            _ => None,
        }
    }
}

/// Bucket boundaries in the caller's cap unit.
///
/// `cap < low` is SMALL, `low <= cap <= high` is MID, `cap > high` is LARGE.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapThresholds {
    pub low: f64,
    pub high: f64,
}

impl Default for CapThresholds {
    fn default() -> Self {
        Self {
            low: 50.0,
            high: 200.0,
        }
    }
}

impl CapThresholds {
    pub fn classify(&self, cap: f64) -> Option<CapBucket> {
        if !cap.is_finite() {
            return None;
        }
        Some(if cap < self.low {
            CapBucket::Small
        } else if cap > self.high {
            CapBucket::Large
        } else {
            CapBucket::Mid
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.low.is_finite() && self.high.is_finite() && self.low <= self.high) {
            return Err(MatchError::InvalidConfig(format!(
                "cap thresholds must satisfy low <= high, got {} / {}",
                self.low, self.high
            )));
        }
        Ok(())
    }
}

// ============================================================
// BOUNDS / LOGIC
// ============================================================

/// Inclusive range with optional ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Bounds {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    /// NaN is never contained
    pub fn contains(&self, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        self.min.map_or(true, |m| value >= m) && self.max.map_or(true, |m| value <= m)
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// How required strategy signals combine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StrategyLogic {
    /// Every required signal must fire
    #[default]
    And,
    /// At least one must fire
    Or,
}

// ============================================================
// SCAN FILTERS
// ============================================================

/// Per-request screening filters.
///
/// Deserialization goes through [`ScanFilters::from_loose`], so request
/// bodies with empty or unparsable values fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanFilters {
    pub min_score: f64,
    pub market_cap: Option<CapBucket>,
    pub sector: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_open: Option<f64>,
    pub max_open: Option<f64>,
    pub min_close: Option<f64>,
    pub max_close: Option<f64>,
    /// Signal tags or labels that must fire on the latest bar
    pub strategies: Vec<String>,
    pub logic: StrategyLogic,
}

impl Default for ScanFilters {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            market_cap: None,
            sector: None,
            min_price: None,
            max_price: None,
            min_open: None,
            max_open: None,
            min_close: None,
            max_close: None,
            strategies: Vec::new(),
            logic: StrategyLogic::And,
        }
    }
}

fn default_min_score() -> f64 {
    60.0
}

impl<'de> Deserialize<'de> for ScanFilters {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_loose(&value))
    }
}

impl ScanFilters {
    /// Price range checked against the latest close
    pub fn price_bounds(&self) -> Bounds {
        Bounds::new(self.min_price, self.max_price)
    }

    pub fn open_bounds(&self) -> Bounds {
        Bounds::new(self.min_open, self.max_open)
    }

    pub fn close_bounds(&self) -> Bounds {
        Bounds::new(self.min_close, self.max_close)
    }

    /// Required strategies resolved to rule ids; `None` marks an unknown tag
    pub fn required_signals(&self) -> Vec<Option<SignalId>> {
        self.strategies
            .iter()
            .map(|tag| SignalId::from_tag(tag))
            .collect()
    }

    /// Build filters from loosely-typed request JSON.
    ///
    /// Numbers may arrive as strings, empty strings mean "not set", and
    /// strategies may be a list or a comma-separated string. Values that
    /// cannot be coerced are dropped with a warning.
    pub fn from_loose(value: &Value) -> Self {
        let mut filters = Self::default();
        let Some(obj) = value.as_object() else {
            if !value.is_null() {
                tracing::warn!("scan filters are not an object, using defaults");
            }
            return filters;
        };

        if let Some(score) = loose_number(obj.get("minScore"), "minScore") {
            filters.min_score = score;
        }
        filters.market_cap = obj.get("marketCap").and_then(|v| match loose_string(v) {
            Some(s) => {
                let bucket = CapBucket::parse(&s);
                if bucket.is_none() {
                    tracing::warn!(value = %s, "ignoring unknown market cap bucket");
                }
                bucket
            }
            None => None,
        });
        filters.sector = obj.get("sector").and_then(loose_string);
        filters.min_price = loose_number(obj.get("minPrice"), "minPrice");
        filters.max_price = loose_number(obj.get("maxPrice"), "maxPrice");
        filters.min_open = loose_number(obj.get("minOpen"), "minOpen");
        filters.max_open = loose_number(obj.get("maxOpen"), "maxOpen");
        filters.min_close = loose_number(obj.get("minClose"), "minClose");
        filters.max_close = loose_number(obj.get("maxClose"), "maxClose");

        filters.strategies = match obj.get("strategies") {
            Some(Value::Array(items)) => items.iter().filter_map(loose_string).collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                tracing::warn!(value = %other, "ignoring malformed strategies");
                Vec::new()
            }
        };

        filters.logic = match obj.get("logic").and_then(loose_string) {
            Some(s) if s.eq_ignore_ascii_case("or") => StrategyLogic::Or,
            Some(s) if s.eq_ignore_ascii_case("and") => StrategyLogic::And,
            Some(s) => {
                tracing::warn!(value = %s, "unknown strategy logic, using AND");
                StrategyLogic::And
            }
            None => StrategyLogic::And,
        };

        filters
    }
}

/// Non-empty trimmed string, or a number rendered as one
fn loose_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn loose_number(value: Option<&Value>, key: &str) -> Option<f64> {
    let parsed = match value? {
        Value::Null => return None,
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => return None,
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Some(v),
        _ => {
            tracing::warn!(key, "ignoring non-numeric filter value");
            None
        }
    }
}

// ============================================================
// SCORING WEIGHTS
// ============================================================

/// Score adjustment per fired signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub ma_gold: f64,
    pub macd_gold: f64,
    pub ma_bull: f64,
    pub rsi_oversold: f64,
    pub ma_dead: f64,
    pub macd_dead: f64,
    pub ma_bear: f64,
    pub rsi_overbought: f64,
    pub dark_cloud: f64,
    pub shooting_star: f64,
    pub guillotine: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            ma_gold: 10.0,
            macd_gold: 10.0,
            ma_bull: 5.0,
            rsi_oversold: 5.0,
            ma_dead: -10.0,
            macd_dead: -10.0,
            ma_bear: -5.0,
            rsi_overbought: -5.0,
            dark_cloud: -20.0,
            shooting_star: -20.0,
            guillotine: -20.0,
        }
    }
}

impl ScoringWeights {
    pub fn weight(&self, id: SignalId) -> f64 {
        match id {
            SignalId::MA_GOLD => self.ma_gold,
            SignalId::MACD_GOLD => self.macd_gold,
            SignalId::MA_BULL => self.ma_bull,
            SignalId::RSI_OVERSOLD => self.rsi_oversold,
            SignalId::MA_DEAD => self.ma_dead,
            SignalId::MACD_DEAD => self.macd_dead,
            SignalId::MA_BEAR => self.ma_bear,
            SignalId::RSI_OVERBOUGHT => self.rsi_overbought,
            SignalId::DARK_CLOUD => self.dark_cloud,
            SignalId::SHOOTING_STAR => self.shooting_star,
            SignalId::GUILLOTINE => self.guillotine,
            _ => 0.0,
        }
    }

    fn validate(&self) -> Result<()> {
        if SignalId::ALL.iter().any(|id| !self.weight(*id).is_finite()) {
            return Err(MatchError::InvalidConfig("scoring weights must be finite".into()));
        }
        Ok(())
    }
}

// ============================================================
// SCAN CONFIG
// ============================================================

/// Engine-wide scan settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Maximum results returned
    pub result_limit: usize,
    /// Trailing bars loaded per instrument
    pub lookback: usize,
    /// Minimum bars for an instrument to be evaluated at all
    pub min_history: usize,
    /// Shortest pattern accepted
    pub min_pattern_len: usize,
    /// Extra bars required beyond the pattern length
    pub pattern_margin: usize,
    /// Score used when no pattern is given, and the confidence midpoint
    pub baseline_score: f64,
    pub confidence_factor: f64,
    /// Confidence bonus when the latest close is above the long MA
    pub trend_bonus: f64,
    pub cap_thresholds: CapThresholds,
    pub weights: ScoringWeights,
    pub indicators: IndicatorConfig,
    pub dtw: DtwConfig,
    /// Scan deadline in milliseconds; instruments not started by then are skipped
    pub deadline_ms: Option<u64>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            result_limit: 10,
            lookback: 60,
            min_history: 20,
            min_pattern_len: MIN_PATTERN_LEN,
            pattern_margin: 5,
            baseline_score: 60.0,
            confidence_factor: 1.0,
            trend_bonus: 10.0,
            cap_thresholds: CapThresholds::default(),
            weights: ScoringWeights::default(),
            indicators: IndicatorConfig::default(),
            dtw: DtwConfig::default(),
            deadline_ms: None,
        }
    }
}

impl ScanConfig {
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    /// Load from JSON, filling missing keys with defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| MatchError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.result_limit == 0 {
            return Err(MatchError::InvalidConfig("result_limit must be > 0".into()));
        }
        if self.min_history < 2 {
            return Err(MatchError::InvalidConfig("min_history must be >= 2".into()));
        }
        if self.lookback < self.min_history {
            return Err(MatchError::InvalidConfig(format!(
                "lookback ({}) must be >= min_history ({})",
                self.lookback, self.min_history
            )));
        }
        if self.min_pattern_len < 2 {
            return Err(MatchError::InvalidConfig("min_pattern_len must be >= 2".into()));
        }
        for (name, value) in [
            ("baseline_score", self.baseline_score),
            ("confidence_factor", self.confidence_factor),
            ("trend_bonus", self.trend_bonus),
        ] {
            if !value.is_finite() {
                return Err(MatchError::InvalidConfig(format!("{name} must be finite")));
            }
        }
        if !(self.indicators.kdj_com.is_finite() && self.indicators.kdj_com >= 0.0) {
            return Err(MatchError::InvalidConfig("kdj_com must be >= 0".into()));
        }
        self.cap_thresholds.validate()?;
        self.weights.validate()
    }
}

// ============================================================
// TESTS
// ============================================================
