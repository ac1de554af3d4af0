//! Historical evaluation: pattern recurrence, MA-crossover strategy, signal hit rates

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::indicators::{compute_indicators, sma};
use crate::pattern::{Pattern, MIN_PATTERN_LEN};
use crate::scanner::Instrument;
use crate::signals::{detect_signals, DetectMode, Signal};
use crate::similarity::{DtwConfig, PreparedPattern};
use crate::{validate_bars, MatchError, Period, Result, OHLCV};

/// Percent change from `from` to `to`
#[inline]
fn pct(from: f64, to: f64) -> f64 {
    (to - from) / from * 100.0
}

// ============================================================
// PATTERN BACKTEST
// ============================================================

/// Settings for [`run_pattern_backtest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternBacktestConfig {
    /// Bars held after the pattern completes
    pub hold_days: usize,
    /// Minimum similarity score for a window to count.
    ///
    /// Scores use the scanner's `100 / (1 + d)` mapping, so the default 75
    /// admits only windows with a DTW distance of at most 1/3 between the
    /// normalized series. Lower it to accept looser resemblance.
    pub threshold: f64,
    /// Stop collecting after this many matches
    pub limit_matches: usize,
    /// Matches included in the report
    pub report_limit: usize,
    /// Window stride; defaults to a quarter of the pattern length
    pub step: Option<usize>,
    pub min_pattern_len: usize,
    pub dtw: DtwConfig,
}

impl Default for PatternBacktestConfig {
    fn default() -> Self {
        Self {
            hold_days: 10,
            threshold: 75.0,
            limit_matches: 100,
            report_limit: 20,
            step: None,
            min_pattern_len: MIN_PATTERN_LEN,
            dtw: DtwConfig::default(),
        }
    }
}

/// A past window that resembled the pattern, with what happened next
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalMatch {
    pub code: String,
    pub date: Option<chrono::NaiveDate>,
    /// Index of the last bar of the matched window
    pub end_index: usize,
    pub score: f64,
    /// Close-to-close return over the hold period, percent
    pub return_pct: f64,
    pub max_gain_pct: f64,
    pub max_drawdown_pct: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BacktestMetrics {
    pub count: usize,
    /// Share of matches with a positive return, percent
    pub win_rate: f64,
    pub avg_return: f64,
    pub best_match: Option<HistoricalMatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BacktestReport {
    pub metrics: BacktestMetrics,
    /// Highest-scoring matches, best first
    pub matches: Vec<HistoricalMatch>,
}

/// Slide `pattern` over every instrument's history and measure forward returns.
///
/// Instruments with invalid bars are skipped with a warning.
pub fn run_pattern_backtest<T: OHLCV + Sync>(
    pattern: &Pattern,
    universe: &[Instrument<T>],
    config: &PatternBacktestConfig,
) -> Result<BacktestReport> {
    if config.hold_days == 0 {
        return Err(MatchError::InvalidConfig("hold_days must be > 0".into()));
    }
    let prepared = PreparedPattern::from_pattern(pattern, config.min_pattern_len, config.dtw)?;
    let window = prepared.len();
    let step = config.step.unwrap_or(window / 4).max(1);

    let per_instrument: Vec<Vec<HistoricalMatch>> = universe
        .par_iter()
        .map(|instrument| scan_history(&prepared, instrument, window, step, config))
        .collect();

    let mut found: Vec<HistoricalMatch> = per_instrument.into_iter().flatten().collect();
    found.truncate(config.limit_matches);

    let metrics = if found.is_empty() {
        BacktestMetrics::default()
    } else {
        let count = found.len();
        let wins = found.iter().filter(|m| m.return_pct > 0.0).count();
        BacktestMetrics {
            count,
            win_rate: wins as f64 / count as f64 * 100.0,
            avg_return: found.iter().map(|m| m.return_pct).sum::<f64>() / count as f64,
            best_match: found
                .iter()
                .max_by(|a, b| a.score.total_cmp(&b.score))
                .cloned(),
        }
    };

    found.sort_by(|a, b| b.score.total_cmp(&a.score));
    found.truncate(config.report_limit);
    tracing::info!(
        instruments = universe.len(),
        matches = metrics.count,
        win_rate = metrics.win_rate,
        "pattern backtest finished"
    );
    Ok(BacktestReport {
        metrics,
        matches: found,
    })
}

fn scan_history<T: OHLCV>(
    prepared: &PreparedPattern,
    instrument: &Instrument<T>,
    window: usize,
    step: usize,
    config: &PatternBacktestConfig,
) -> Vec<HistoricalMatch> {
    let bars = &instrument.bars;
    let hold = config.hold_days;
    if bars.len() < window + hold {
        return Vec::new();
    }
    if let Err(error) = validate_bars(bars) {
        tracing::warn!(code = %instrument.meta.code, %error, "skipping instrument");
        return Vec::new();
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close()).collect();
    let mut matches = Vec::new();
    for start in (0..=closes.len() - window - hold).step_by(step) {
        let Some(sim) = prepared.compare(&closes[start..start + window]) else {
            continue;
        };
        if sim.score < config.threshold {
            continue;
        }
        let end = start + window - 1;
        let entry = closes[end];
        let future = &closes[end + 1..=end + hold];
        let highest = future.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let lowest = future.iter().copied().fold(f64::INFINITY, f64::min);
        matches.push(HistoricalMatch {
            code: instrument.meta.code.clone(),
            date: bars[end].date(),
            end_index: end,
            score: sim.score,
            return_pct: pct(entry, closes[end + hold]),
            max_gain_pct: pct(entry, highest),
            max_drawdown_pct: pct(entry, lowest),
        });
        if matches.len() >= config.limit_matches {
            break;
        }
    }
    matches
}

// ============================================================
// MA CROSSOVER BACKTEST
// ============================================================

/// Settings for [`run_ma_backtest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaBacktestConfig {
    pub short: Period,
    pub long: Period,
    pub initial_cash: f64,
    pub min_bars: usize,
}

impl Default for MaBacktestConfig {
    fn default() -> Self {
        Self {
            short: Period::new_const(5),
            long: Period::new_const(20),
            initial_cash: 100_000.0,
            min_bars: 120,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EquityPoint {
    pub date: Option<chrono::NaiveDate>,
    pub value: f64,
}

/// Outcome of the MA-crossover strategy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyBacktest {
    pub equity: Vec<EquityPoint>,
    /// Percent
    pub total_return: f64,
    /// Largest peak-to-trough equity decline, percent (>= 0)
    pub max_drawdown: f64,
    /// Share of closed trades that made money, percent
    pub win_rate: f64,
    /// Closed round trips
    pub trades: usize,
}

/// All-in long while the short MA is above the long MA, cash otherwise
pub fn run_ma_backtest<T: OHLCV>(
    bars: &[T],
    config: &MaBacktestConfig,
) -> Result<StrategyBacktest> {
    if bars.len() < config.min_bars.max(config.long.get()) {
        return Err(MatchError::InsufficientData {
            need: config.min_bars.max(config.long.get()),
            got: bars.len(),
        });
    }
    if !(config.initial_cash.is_finite() && config.initial_cash > 0.0) {
        return Err(MatchError::InvalidConfig("initial_cash must be > 0".into()));
    }
    validate_bars(bars)?;

    let closes: Vec<f64> = bars.iter().map(|b| b.close()).collect();
    let short = sma(&closes, config.short.get());
    let long = sma(&closes, config.long.get());
    let first = config.short.get().max(config.long.get()) - 1;

    let mut cash = config.initial_cash;
    let mut shares = 0.0;
    let mut entry = 0.0;
    let (mut trades, mut wins) = (0usize, 0usize);
    let mut equity = Vec::with_capacity(bars.len() - first);

    for i in first..bars.len() {
        let price = closes[i];
        let long_signal = short[i] > long[i];
        if long_signal && shares == 0.0 {
            shares = cash / price;
            cash = 0.0;
            entry = price;
        } else if !long_signal && shares > 0.0 {
            cash = shares * price;
            shares = 0.0;
            trades += 1;
            if price > entry {
                wins += 1;
            }
        }
        equity.push(EquityPoint {
            date: bars[i].date(),
            value: cash + shares * price,
        });
    }

    let last = equity.last().map_or(config.initial_cash, |p| p.value);
    let mut peak = f64::NEG_INFINITY;
    let mut max_drawdown: f64 = 0.0;
    for point in &equity {
        peak = peak.max(point.value);
        max_drawdown = max_drawdown.max((peak - point.value) / peak * 100.0);
    }

    tracing::debug!(trades, wins, "ma backtest finished");
    Ok(StrategyBacktest {
        total_return: pct(config.initial_cash, last),
        max_drawdown,
        win_rate: if trades == 0 {
            0.0
        } else {
            wins as f64 / trades as f64 * 100.0
        },
        trades,
        equity,
    })
}

// ============================================================
// SIGNAL VERIFICATION
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalOutcome {
    pub signal: Signal,
    pub entry: f64,
    pub exit: f64,
    pub return_pct: f64,
    /// BUY followed by a rise, or SELL followed by a fall
    pub hit: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SignalVerification {
    pub outcomes: Vec<SignalOutcome>,
    pub hits: usize,
    /// Percent of evaluated signals that hit
    pub hit_rate: f64,
}

/// Check each signal against the close `hold_days` later.
///
/// Signals without enough forward data are left out.
pub fn verify_signals<T: OHLCV>(
    bars: &[T],
    signals: &[Signal],
    hold_days: usize,
) -> SignalVerification {
    let hold = hold_days.max(1);
    let outcomes: Vec<SignalOutcome> = signals
        .iter()
        .filter(|s| s.index + hold < bars.len())
        .filter_map(|signal| {
            let entry = bars[signal.index].close();
            let exit = bars[signal.index + hold].close();
            if !(entry.is_finite() && exit.is_finite() && entry > 0.0) {
                return None;
            }
            let return_pct = pct(entry, exit);
            let hit = if signal.kind.is_buy() {
                return_pct > 0.0
            } else {
                return_pct < 0.0
            };
            Some(SignalOutcome {
                signal: *signal,
                entry,
                exit,
                return_pct,
                hit,
            })
        })
        .collect();

    let hits = outcomes.iter().filter(|o| o.hit).count();
    let hit_rate = if outcomes.is_empty() {
        0.0
    } else {
        hits as f64 / outcomes.len() as f64 * 100.0
    };
    SignalVerification {
        outcomes,
        hits,
        hit_rate,
    }
}

/// Detect history-mode signals with the default rules and verify them
pub fn verify_history<T: OHLCV>(bars: &[T], hold_days: usize) -> SignalVerification {
    let ind = compute_indicators(bars);
    let signals = detect_signals(bars, &ind, DetectMode::History);
    verify_signals(bars, &signals, hold_days)
}

// ============================================================
// TESTS
// ============================================================
