//! # shapescan - shape-similarity stock screening
//!
//! Ranks a universe of instruments by how closely their recent price shape
//! matches a user-drawn pattern, combined with technical-indicator signals
//! (MA, MACD, RSI, KDJ) and fundamental filters (market cap, sector, price).
//!
//! ## Quick Start
//!
//! ```rust
//! use shapescan::prelude::*;
//!
//! // A hand-drawn five point uptrend
//! let pattern = Pattern::trend(vec![10.0, 12.0, 11.0, 15.0, 14.0]);
//!
//! // Instruments come from your own history/metadata providers
//! let universe: Vec<Instrument> = Vec::new();
//! let results = scan_market(Some(&pattern), &ScanFilters::default(), &universe);
//! assert!(results.is_empty());
//!
//! // Shapes are compared after z-score normalization
//! let score = score_similarity(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]);
//! assert!(score > 99.99);
//! ```

pub mod backtest;
pub mod catalog;
pub mod config;
pub mod indicators;
pub mod normalize;
pub mod pattern;
pub mod scanner;
pub mod signals;
pub mod similarity;

pub mod prelude {
    pub use crate::{
        // Backtests
        backtest::{
            run_ma_backtest, run_pattern_backtest, verify_signals, BacktestReport,
            MaBacktestConfig, PatternBacktestConfig, StrategyBacktest,
        },
        // Catalog
        catalog::{PatternCatalog, PatternDef},
        // Configuration
        config::{
            Bounds, CapBucket, CapThresholds, ScanConfig, ScanFilters, ScoringWeights,
            StrategyLogic,
        },
        // Indicators
        indicators::{
            compute_indicators, IndicatorCache, IndicatorConfig, IndicatorRow, Indicators,
        },
        // Normalizer
        normalize::normalize,
        // Patterns
        pattern::{CandleShape, Pattern},
        // Pipeline
        scanner::{
            load_universe, scan_market, CancelToken, HistoryProvider, Instrument, InstrumentMeta,
            MatchResult, MemoryProvider, MetadataProvider, ScanError, ScanReport, Scanner,
            ScannerBuilder, Stage,
        },
        // Signals
        signals::{
            detect_signals, BuiltinRule, DetectMode, DetectorBuilder, Signal, SignalDetector,
            SignalId, SignalRule,
        },
        // Similarity
        similarity::{distance_to_score, dtw_distance, score_similarity, DtwConfig, PreparedPattern},
        // Types
        Direction,
        // Errors
        MatchError,
        OHLCVExt,
        Period,
        PricePoint,
        Result,
        SignalKind,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, MatchError>;

/// Errors that can occur while preparing or scoring a scan
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MatchError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Insufficient data: need {need} bars, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("Invalid OHLCV at index {index}: {reason}")]
    InvalidOHLCV { index: usize, reason: &'static str },

    #[error("Pattern too short: need {need} points, got {got}")]
    PatternTooShort { need: usize, got: usize },

    #[error("Unknown pattern: {0}")]
    UnknownPattern(String),
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Indicator window length (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(MatchError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;

    fn date(&self) -> Option<chrono::NaiveDate> {
        None
    }
}

impl<T: OHLCV + ?Sized> OHLCV for &T {
    fn open(&self) -> f64 {
        (**self).open()
    }

    fn high(&self) -> f64 {
        (**self).high()
    }

    fn low(&self) -> f64 {
        (**self).low()
    }

    fn close(&self) -> f64 {
        (**self).close()
    }

    fn volume(&self) -> f64 {
        (**self).volume()
    }

    fn date(&self) -> Option<chrono::NaiveDate> {
        (**self).date()
    }
}

/// Extension trait with computed candle geometry
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn body(&self) -> f64 {
        (self.close() - self.open()).abs()
    }

    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn upper_shadow(&self) -> f64 {
        self.high() - self.open().max(self.close())
    }

    #[inline]
    fn lower_shadow(&self) -> f64 {
        self.open().min(self.close()) - self.low()
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }

    /// Midpoint of the real body
    #[inline]
    fn body_mid(&self) -> f64 {
        (self.open() + self.close()) / 2.0
    }

    /// Reject values the indicator math cannot digest.
    ///
    /// High/low consistency is deliberately not checked: vendors ship rows
    /// where high < close and the rules must cope with them.
    fn validate(&self) -> Result<()> {
        let values = [self.open(), self.high(), self.low(), self.close()];
        if values.iter().any(|v| v.is_nan()) {
            return Err(MatchError::InvalidOHLCV {
                index: 0,
                reason: "NaN in OHLCV",
            });
        }
        if values.iter().any(|v| v.is_infinite()) {
            return Err(MatchError::InvalidOHLCV {
                index: 0,
                reason: "Infinite value in OHLCV",
            });
        }
        if self.close() <= 0.0 {
            return Err(MatchError::InvalidOHLCV {
                index: 0,
                reason: "non-positive close",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV + ?Sized> OHLCVExt for T {}

/// Validate a run of bars, reporting the offending index
pub fn validate_bars<T: OHLCV>(bars: &[T]) -> Result<()> {
    for (i, bar) in bars.iter().enumerate() {
        bar.validate().map_err(|e| match e {
            MatchError::InvalidOHLCV { reason, .. } => {
                MatchError::InvalidOHLCV { index: i, reason }
            }
            other => other,
        })?;
    }
    Ok(())
}

// ============================================================
// PRICE POINT
// ============================================================

/// One daily bar of an instrument
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PricePoint {
    pub date: chrono::NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl PricePoint {
    pub fn new(
        date: chrono::NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl OHLCV for PricePoint {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn date(&self) -> Option<chrono::NaiveDate> {
        Some(self.date)
    }
}

// ============================================================
// SIGNAL KIND / DIRECTION
// ============================================================

/// Action a signal suggests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalKind {
    Buy,
    Sell,
}

impl SignalKind {
    #[inline]
    pub fn is_buy(self) -> bool {
        matches!(self, SignalKind::Buy)
    }

    #[inline]
    pub fn is_sell(self) -> bool {
        matches!(self, SignalKind::Sell)
    }
}

/// Overall bias of a match, from the sign of its signal adjustments
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    Bullish,
    Neutral,
    Bearish,
}

impl Direction {
    pub fn from_net(net: f64) -> Self {
        if net > 0.0 {
            Direction::Bullish
        } else if net < 0.0 {
            Direction::Bearish
        } else {
            Direction::Neutral
        }
    }

    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Direction::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Direction::Bearish)
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_period_validation() {
        assert!(Period::new(1).is_ok());
        assert!(Period::new(100).is_ok());
        assert!(Period::new(0).is_err());
    }

    #[test]
    fn test_period_serde() {
        let p: Period = serde_json::from_str("14").unwrap();
        assert_eq!(p.get(), 14);
        assert!(serde_json::from_str::<Period>("0").is_err());
    }

    #[test]
    fn test_ohlcv_ext() {
        let bar = PricePoint::new(day(1), 100.0, 110.0, 90.0, 105.0, 1000.0);
        assert_eq!(bar.body(), 5.0);
        assert_eq!(bar.range(), 20.0);
        assert_eq!(bar.upper_shadow(), 5.0);
        assert_eq!(bar.lower_shadow(), 10.0);
        assert_eq!(bar.body_mid(), 102.5);
        assert!(bar.is_bullish());
        assert!(!bar.is_bearish());
    }

    #[test]
    fn test_validate_tolerates_inconsistent_high_low() {
        // high below close is sloppy but usable
        let bar = PricePoint::new(day(1), 10.0, 9.0, 9.5, 10.5, 0.0);
        assert!(bar.validate().is_ok());
    }

    #[test]
    fn test_validate_bars_reports_index() {
        let bars = vec![
            PricePoint::new(day(1), 10.0, 11.0, 9.0, 10.5, 0.0),
            PricePoint::new(day(2), 10.0, 11.0, 9.0, f64::NAN, 0.0),
        ];
        assert_eq!(
            validate_bars(&bars),
            Err(MatchError::InvalidOHLCV {
                index: 1,
                reason: "NaN in OHLCV"
            })
        );

        let zero = vec![PricePoint::new(day(1), 1.0, 1.0, 1.0, 0.0, 0.0)];
        assert!(validate_bars(&zero).is_err());
    }

    #[test]
    fn test_direction_from_net() {
        assert_eq!(Direction::from_net(10.0), Direction::Bullish);
        assert_eq!(Direction::from_net(-5.0), Direction::Bearish);
        assert_eq!(Direction::from_net(0.0), Direction::Neutral);
    }

    #[test]
    fn test_signal_kind_serde() {
        assert_eq!(serde_json::to_string(&SignalKind::Buy).unwrap(), "\"BUY\"");
        let k: SignalKind = serde_json::from_str("\"SELL\"").unwrap();
        assert!(k.is_sell());
    }
}
