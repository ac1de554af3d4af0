//! Market scan pipeline
//!
//! Each instrument flows through a fixed funnel:
//!
//! 1. **HardFilter**: market-cap bucket, sector, latest price/open/close bounds
//! 2. **DataSufficiency**: enough history for the pattern and indicators
//! 3. **Strategy**: required signals fire on the latest bar
//! 4. **Similarity**: DTW score of the trailing window against the pattern
//! 5. **Threshold**: adjusted score at or above `min_score`
//!
//! Survivors are ranked by score (ties by code) and truncated to the
//! configured limit. Instruments are evaluated in parallel with rayon; a
//! failing instrument becomes a [`ScanError`] and never aborts the scan.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{CapBucket, ScanConfig, ScanFilters, StrategyLogic};
use crate::indicators::{compute_indicators_with, Column, IndicatorCache, Indicators};
use crate::pattern::Pattern;
use crate::signals::{Signal, SignalDetector, SignalId};
use crate::similarity::PreparedPattern;
use crate::{validate_bars, Direction, MatchError, PricePoint, Result, OHLCV};

// ============================================================
// INSTRUMENTS
// ============================================================

/// Static facts about an instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentMeta {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub market_cap: Option<f64>,
}

impl InstrumentMeta {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            sector: None,
            market_cap: None,
        }
    }

    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }

    pub fn with_market_cap(mut self, cap: f64) -> Self {
        self.market_cap = Some(cap);
        self
    }
}

/// An instrument with its bars, oldest first
#[derive(Debug, Clone)]
pub struct Instrument<T = PricePoint> {
    pub meta: InstrumentMeta,
    pub bars: Vec<T>,
}

impl<T> Instrument<T> {
    pub fn new(meta: InstrumentMeta, bars: Vec<T>) -> Self {
        Self { meta, bars }
    }
}

// ============================================================
// PROVIDERS
// ============================================================

/// Source of daily bars
pub trait HistoryProvider {
    /// Bars for `code`, oldest first; `trailing` limits to the most recent N
    fn history(&self, code: &str, trailing: Option<usize>) -> Option<Vec<PricePoint>>;
}

/// Source of instrument metadata
pub trait MetadataProvider {
    fn instruments(&self) -> Vec<InstrumentMeta>;
}

/// Join metadata with history. Instruments without history are dropped.
pub fn load_universe<H, M>(history: &H, metadata: &M, trailing: Option<usize>) -> Vec<Instrument>
where
    H: HistoryProvider + ?Sized,
    M: MetadataProvider + ?Sized,
{
    let metas = metadata.instruments();
    let total = metas.len();
    let universe: Vec<Instrument> = metas
        .into_iter()
        .filter_map(|meta| {
            let bars = history.history(&meta.code, trailing)?;
            Some(Instrument::new(meta, bars))
        })
        .collect();
    tracing::debug!(total, loaded = universe.len(), "universe loaded");
    universe
}

/// In-memory provider for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    metas: Vec<InstrumentMeta>,
    bars: HashMap<String, Vec<PricePoint>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instrument; bars are stored sorted by date
    pub fn insert(&mut self, meta: InstrumentMeta, mut bars: Vec<PricePoint>) {
        bars.sort_by_key(|b| b.date);
        self.metas.retain(|m| m.code != meta.code);
        self.bars.insert(meta.code.clone(), bars);
        self.metas.push(meta);
    }

    pub fn len(&self) -> usize {
        self.metas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }
}

impl HistoryProvider for MemoryProvider {
    fn history(&self, code: &str, trailing: Option<usize>) -> Option<Vec<PricePoint>> {
        let bars = self.bars.get(code)?;
        let start = trailing.map_or(0, |n| bars.len().saturating_sub(n));
        Some(bars[start..].to_vec())
    }
}

impl MetadataProvider for MemoryProvider {
    fn instruments(&self) -> Vec<InstrumentMeta> {
        self.metas.clone()
    }
}

// ============================================================
// RESULTS
// ============================================================

/// Funnel stage at which an instrument was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Stage {
    HardFilter,
    DataSufficiency,
    Strategy,
    Similarity,
    Threshold,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::HardFilter => "hard_filter",
            Stage::DataSufficiency => "data_sufficiency",
            Stage::Strategy => "strategy",
            Stage::Similarity => "similarity",
            Stage::Threshold => "threshold",
        };
        f.write_str(name)
    }
}

/// Scoring breakdown kept alongside a result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchMetadata {
    /// DTW distance, when a pattern was given
    pub distance: Option<f64>,
    /// Score before signal adjustments
    pub base_score: f64,
    /// Sum of signal weights
    pub adjustment: f64,
    pub market_cap: Option<f64>,
    pub cap_bucket: Option<CapBucket>,
    pub bars_used: usize,
}

/// One ranked instrument
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub code: String,
    pub name: String,
    pub sector: Option<String>,
    /// Latest close
    pub price: f64,
    pub date: Option<chrono::NaiveDate>,
    /// Final adjusted score
    pub score: f64,
    /// Raw similarity, when a pattern was given
    pub similarity: Option<f64>,
    pub confidence: f64,
    pub signals: Vec<Signal>,
    /// Trailing closes compared against the pattern
    pub matched_segment: Vec<f64>,
    pub direction: Direction,
    pub metadata: MatchMetadata,
}

/// Error from evaluating a single instrument
#[derive(Debug, Clone, PartialEq)]
pub struct ScanError {
    pub code: String,
    pub error: MatchError,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.error)
    }
}

/// Outcome of a full scan
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Ranked and truncated results
    pub results: Vec<MatchResult>,
    /// Instruments submitted
    pub total: usize,
    /// Instruments that passed every stage, before truncation
    pub matched: usize,
    pub rejected: BTreeMap<Stage, usize>,
    pub errors: Vec<ScanError>,
    /// Instruments never evaluated because of cancellation or the deadline
    pub skipped: usize,
    pub cancelled: bool,
    pub timed_out: bool,
    pub elapsed: Duration,
}

impl ScanReport {
    pub fn rejected_at(&self, stage: Stage) -> usize {
        self.rejected.get(&stage).copied().unwrap_or(0)
    }

    /// Scan stopped before every instrument was evaluated
    pub fn is_partial(&self) -> bool {
        self.skipped > 0
    }
}

// ============================================================
// CANCELLATION
// ============================================================

/// Cooperative cancellation shared between the caller and a running scan
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ============================================================
// SCANNER
// ============================================================

enum Outcome {
    Matched(MatchResult),
    Rejected(Stage),
    Failed(ScanError),
    Cancelled,
    TimedOut,
}

/// Per-scan state shared by every instrument
struct ScanContext<'a> {
    filters: &'a ScanFilters,
    pattern: Option<PreparedPattern>,
    required: Vec<Option<SignalId>>,
    required_bars: usize,
    sector: Option<String>,
}

impl ScanContext<'_> {
    /// Case-insensitive substring match; unknown sectors fail an active filter
    fn sector_passes(&self, sector: Option<&str>) -> bool {
        match &self.sector {
            None => true,
            Some(wanted) => sector.is_some_and(|s| s.to_lowercase().contains(wanted.as_str())),
        }
    }

    fn strategies_pass(&self, signals: &[Signal]) -> bool {
        if self.required.is_empty() {
            return true;
        }
        let fired = |id: &Option<SignalId>| id.is_some_and(|id| signals.iter().any(|s| s.id == id));
        match self.filters.logic {
            StrategyLogic::And => self.required.iter().all(fired),
            StrategyLogic::Or => self.required.iter().any(fired),
        }
    }
}

/// Screens instruments against a pattern and filters
#[derive(Debug, Clone)]
pub struct Scanner {
    config: ScanConfig,
    detector: SignalDetector,
    cache: Option<Arc<IndicatorCache>>,
}

impl Default for Scanner {
    fn default() -> Self {
        Self {
            config: ScanConfig::default(),
            detector: SignalDetector::default(),
            cache: None,
        }
    }
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Result<Self> {
        ScannerBuilder::new().config(config).build()
    }

    pub fn builder() -> ScannerBuilder {
        ScannerBuilder::new()
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn detector(&self) -> &SignalDetector {
        &self.detector
    }

    /// Scan, surfacing pattern problems as errors
    pub fn try_scan<T: OHLCV + Sync>(
        &self,
        pattern: Option<&Pattern>,
        filters: &ScanFilters,
        universe: &[Instrument<T>],
    ) -> Result<ScanReport> {
        self.try_scan_with_cancel(pattern, filters, universe, &CancelToken::new())
    }

    pub fn try_scan_with_cancel<T: OHLCV + Sync>(
        &self,
        pattern: Option<&Pattern>,
        filters: &ScanFilters,
        universe: &[Instrument<T>],
        cancel: &CancelToken,
    ) -> Result<ScanReport> {
        let prepared = pattern
            .map(|p| PreparedPattern::from_pattern(p, self.config.min_pattern_len, self.config.dtw))
            .transpose()?;
        Ok(self.run(prepared, filters, universe, cancel))
    }

    /// Scan; an unusable pattern yields an empty report
    pub fn scan<T: OHLCV + Sync>(
        &self,
        pattern: Option<&Pattern>,
        filters: &ScanFilters,
        universe: &[Instrument<T>],
    ) -> ScanReport {
        self.scan_with_cancel(pattern, filters, universe, &CancelToken::new())
    }

    pub fn scan_with_cancel<T: OHLCV + Sync>(
        &self,
        pattern: Option<&Pattern>,
        filters: &ScanFilters,
        universe: &[Instrument<T>],
        cancel: &CancelToken,
    ) -> ScanReport {
        match self.try_scan_with_cancel(pattern, filters, universe, cancel) {
            Ok(report) => report,
            Err(error) => {
                tracing::warn!(%error, "pattern rejected, returning no results");
                ScanReport {
                    total: universe.len(),
                    ..ScanReport::default()
                }
            }
        }
    }

    fn run<T: OHLCV + Sync>(
        &self,
        pattern: Option<PreparedPattern>,
        filters: &ScanFilters,
        universe: &[Instrument<T>],
        cancel: &CancelToken,
    ) -> ScanReport {
        let started = Instant::now();
        let required_bars = match &pattern {
            Some(p) => self.config.min_history.max(p.len() + self.config.pattern_margin),
            None => self.config.min_history,
        };
        let ctx = ScanContext {
            filters,
            required: filters.required_signals(),
            pattern,
            required_bars,
            sector: filters.sector.as_ref().map(|s| s.to_lowercase()),
        };
        if ctx.required.iter().any(Option::is_none) {
            tracing::warn!(strategies = ?filters.strategies, "unknown strategy tags never match");
        }
        tracing::info!(
            instruments = universe.len(),
            with_pattern = ctx.pattern.is_some(),
            required_bars,
            "scan started"
        );

        let deadline = self.config.deadline();
        let outcomes: Vec<Outcome> = universe
            .par_iter()
            .map(|instrument| {
                if cancel.is_cancelled() {
                    return Outcome::Cancelled;
                }
                if deadline.is_some_and(|d| started.elapsed() >= d) {
                    return Outcome::TimedOut;
                }
                self.evaluate(&ctx, instrument)
            })
            .collect();

        let mut report = ScanReport {
            total: universe.len(),
            ..ScanReport::default()
        };
        for outcome in outcomes {
            match outcome {
                Outcome::Matched(result) => report.results.push(result),
                Outcome::Rejected(stage) => *report.rejected.entry(stage).or_insert(0) += 1,
                Outcome::Failed(error) => report.errors.push(error),
                Outcome::Cancelled => {
                    report.cancelled = true;
                    report.skipped += 1;
                }
                Outcome::TimedOut => {
                    report.timed_out = true;
                    report.skipped += 1;
                }
            }
        }

        rank(&mut report.results);
        report.matched = report.results.len();
        report.results.truncate(self.config.result_limit);
        report.elapsed = started.elapsed();

        if report.is_partial() {
            tracing::warn!(
                skipped = report.skipped,
                cancelled = report.cancelled,
                timed_out = report.timed_out,
                "scan stopped early, results are partial"
            );
        }
        tracing::info!(
            total = report.total,
            matched = report.matched,
            returned = report.results.len(),
            errors = report.errors.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "scan finished"
        );
        report
    }

    fn indicators<T: OHLCV>(&self, code: &str, window: &[T]) -> Arc<Indicators> {
        match &self.cache {
            Some(cache) => cache.get_or_compute(code, window),
            None => Arc::new(compute_indicators_with(window, &self.config.indicators)),
        }
    }

    fn evaluate<T: OHLCV>(&self, ctx: &ScanContext<'_>, instrument: &Instrument<T>) -> Outcome {
        let meta = &instrument.meta;
        let reject = |stage: Stage| {
            tracing::debug!(code = %meta.code, %stage, "rejected");
            Outcome::Rejected(stage)
        };
        let fail = |error: MatchError| {
            tracing::warn!(code = %meta.code, %error, "instrument skipped");
            Outcome::Failed(ScanError {
                code: meta.code.clone(),
                error,
            })
        };

        // 1. metadata filters
        let cap_bucket = meta
            .market_cap
            .and_then(|cap| self.config.cap_thresholds.classify(cap));
        if let Some(wanted) = ctx.filters.market_cap {
            if cap_bucket != Some(wanted) {
                return reject(Stage::HardFilter);
            }
        }
        if !ctx.sector_passes(meta.sector.as_deref()) {
            return reject(Stage::HardFilter);
        }

        // 1b. latest-bar price filters
        let Some(last) = instrument.bars.last() else {
            return reject(Stage::DataSufficiency);
        };
        if !ctx.filters.price_bounds().contains(last.close())
            || !ctx.filters.open_bounds().contains(last.open())
            || !ctx.filters.close_bounds().contains(last.close())
        {
            return reject(Stage::HardFilter);
        }

        // 2. history
        let bars = &instrument.bars;
        if bars.len() < ctx.required_bars {
            return reject(Stage::DataSufficiency);
        }
        let window_len = self.config.lookback.max(ctx.required_bars).min(bars.len());
        let window = &bars[bars.len() - window_len..];
        if let Err(error) = validate_bars(window) {
            return fail(error);
        }

        // 3. signals on the latest bar
        let ind = self.indicators(&meta.code, window);
        let signals = self.detector.latest(window, &ind);
        if !ctx.strategies_pass(&signals) {
            return reject(Stage::Strategy);
        }

        // 4. similarity
        let closes: Vec<f64> = window.iter().map(|b| b.close()).collect();
        let (base_score, similarity, distance, segment_len) = match &ctx.pattern {
            Some(pattern) => match pattern.compare_tail(&closes) {
                Some(sim) => (sim.score, Some(sim.score), Some(sim.distance), pattern.len()),
                None => return reject(Stage::Similarity),
            },
            None => (self.config.baseline_score, None, None, self.config.min_history),
        };

        // 5. adjusted score
        let adjustment: f64 = signals
            .iter()
            .map(|s| self.config.weights.weight(s.id))
            .sum();
        let score = base_score + adjustment;
        if !score.is_finite() {
            return fail(MatchError::InvalidValue("non-finite score"));
        }
        if score < ctx.filters.min_score {
            return reject(Stage::Threshold);
        }

        let last_index = window.len() - 1;
        let price = closes[last_index];
        let above_trend =
            ind.is_ready(Column::MaLong, last_index) && price > ind.ma_long[last_index];
        let confidence = confidence(&self.config, score, above_trend);
        let segment_start = closes.len().saturating_sub(segment_len);

        Outcome::Matched(MatchResult {
            code: meta.code.clone(),
            name: meta.name.clone(),
            sector: meta.sector.clone(),
            price,
            date: window[last_index].date(),
            score,
            similarity,
            confidence,
            direction: Direction::from_net(adjustment),
            signals,
            matched_segment: closes[segment_start..].to_vec(),
            metadata: MatchMetadata {
                distance,
                base_score,
                adjustment,
                market_cap: meta.market_cap,
                cap_bucket,
                bars_used: window.len(),
            },
        })
    }
}

/// `50 + (score - baseline) * factor`, plus the trend bonus, clamped to [10, 99]
fn confidence(config: &ScanConfig, score: f64, above_trend: bool) -> f64 {
    let bonus = if above_trend { config.trend_bonus } else { 0.0 };
    (50.0 + (score - config.baseline_score) * config.confidence_factor + bonus).clamp(10.0, 99.0)
}

/// Score descending, then code ascending
fn rank(results: &mut [MatchResult]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.code.cmp(&b.code)));
}

/// Scan with default settings and return the ranked results
pub fn scan_market<T: OHLCV + Sync>(
    pattern: Option<&Pattern>,
    filters: &ScanFilters,
    universe: &[Instrument<T>],
) -> Vec<MatchResult> {
    Scanner::default().scan(pattern, filters, universe).results
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for Scanner instances
#[derive(Debug, Clone, Default)]
pub struct ScannerBuilder {
    config: ScanConfig,
    detector: Option<SignalDetector>,
    cache: Option<Arc<IndicatorCache>>,
}

impl ScannerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    pub fn result_limit(mut self, limit: usize) -> Self {
        self.config.result_limit = limit;
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.config.deadline_ms = Some(deadline.as_millis() as u64);
        self
    }

    pub fn detector(mut self, detector: SignalDetector) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Share an indicator cache across scans
    pub fn indicator_cache(mut self, cache: Arc<IndicatorCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> Result<Scanner> {
        self.config.validate()?;
        if let Some(cache) = &self.cache {
            if cache.config() != &self.config.indicators {
                return Err(MatchError::InvalidConfig(
                    "indicator cache uses a different indicator config".into(),
                ));
            }
        }
        Ok(Scanner {
            config: self.config,
            detector: self.detector.unwrap_or_default(),
            cache: self.cache,
        })
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::IndicatorConfig;
    use chrono::{Days, NaiveDate};

    fn bars_from_closes(closes: &[f64]) -> Vec<PricePoint> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let date = start.checked_add_days(Days::new(i as u64)).unwrap();
                PricePoint::new(date, c, c, c, c, 1000.0)
            })
            .collect()
    }

    fn flat(code: &str, len: usize, price: f64) -> Instrument {
        Instrument::new(InstrumentMeta::new(code, code), bars_from_closes(&vec![price; len]))
    }

    /// Flat bars read RSI 100 and lose 5 points, so accept any score
    fn any_score() -> ScanFilters {
        ScanFilters {
            min_score: 0.0,
            ..ScanFilters::default()
        }
    }

    #[test]
    fn test_confidence_clamped() {
        let cfg = ScanConfig::default();
        assert_eq!(confidence(&cfg, 60.0, false), 50.0);
        assert_eq!(confidence(&cfg, 60.0, true), 60.0);
        assert_eq!(confidence(&cfg, 500.0, true), 99.0);
        assert_eq!(confidence(&cfg, -500.0, false), 10.0);
    }

    #[test]
    fn test_rank_ties_by_code() {
        let mut universe = vec![flat("B", 30, 10.0), flat("A", 30, 10.0)];
        universe.push(flat("C", 30, 10.0));
        let report = Scanner::default().scan(None, &any_score(), &universe);
        let codes: Vec<&str> = report.results.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["A", "B", "C"]);
        assert!(report.results.iter().all(|r| r.score == 55.0));
        assert!(report.results.iter().all(|r| r.direction == Direction::Bearish));
    }

    #[test]
    fn test_short_history_rejected() {
        let empty = Instrument::new(InstrumentMeta::new("EMPTY", "e"), vec![]);
        let universe = vec![flat("SHORT", 10, 10.0), empty];
        let report = Scanner::default().scan(None, &ScanFilters::default(), &universe);
        assert!(report.results.is_empty());
        assert_eq!(report.rejected_at(Stage::DataSufficiency), 2);
    }

    #[test]
    fn test_bad_bar_becomes_error() {
        let mut bars = bars_from_closes(&[10.0; 30]);
        bars[25].close = f64::NAN;
        let universe = vec![
            Instrument::new(InstrumentMeta::new("BAD", "bad"), bars),
            flat("GOOD", 30, 10.0),
        ];
        let report = Scanner::default().scan(None, &any_score(), &universe);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code, "BAD");
        assert_eq!(report.results.len(), 1);
    }

    #[test]
    fn test_builder_rejects_mismatched_cache() {
        let cfg = IndicatorConfig {
            kdj_com: 3.0,
            ..IndicatorConfig::default()
        };
        let cache = Arc::new(IndicatorCache::with_config(16, cfg));
        assert!(ScannerBuilder::new().indicator_cache(cache).build().is_err());
        assert!(ScannerBuilder::new().result_limit(0).build().is_err());
    }

    #[test]
    fn test_cancelled_scan_is_partial() {
        let universe: Vec<Instrument> = (0..8).map(|i| flat(&format!("S{i}"), 30, 10.0)).collect();
        let token = CancelToken::new();
        token.cancel();
        let report =
            Scanner::default().scan_with_cancel(None, &ScanFilters::default(), &universe, &token);
        assert!(report.cancelled);
        assert_eq!(report.skipped, 8);
        assert!(report.results.is_empty());
    }

    #[test]
    fn test_memory_provider_roundtrip() {
        let mut provider = MemoryProvider::new();
        let mut bars = bars_from_closes(&[1.0, 2.0, 3.0, 4.0]);
        bars.reverse();
        provider.insert(InstrumentMeta::new("X", "x"), bars);
        let tail = provider.history("X", Some(2)).unwrap();
        assert_eq!(tail.iter().map(|b| b.close).collect::<Vec<_>>(), vec![3.0, 4.0]);
        assert!(provider.history("Y", None).is_none());

        let universe = load_universe(&provider, &provider, None);
        assert_eq!(universe.len(), 1);
        assert_eq!(universe[0].bars.len(), 4);
    }
}
