//! Technical indicators computed column-wise over a bar series
//!
//! Every column is index-aligned with the input bars. Rows that fall inside
//! an indicator's warm-up window are filled with `0.0`; use
//! [`Indicators::is_ready`] before trusting them.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

use serde::{Deserialize, Serialize};

use crate::{Period, OHLCV};

// ============================================================
// CONFIG
// ============================================================

/// Window lengths for the indicator set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub ma_short: Period,
    pub ma_mid: Period,
    pub ma_long: Period,
    pub macd_fast: Period,
    pub macd_slow: Period,
    pub macd_signal: Period,
    pub rsi_period: Period,
    pub kdj_period: Period,
    /// KDJ smoothing expressed as EMA center of mass (alpha = 1 / (1 + com))
    pub kdj_com: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ma_short: Period::new_const(5),
            ma_mid: Period::new_const(10),
            ma_long: Period::new_const(20),
            macd_fast: Period::new_const(12),
            macd_slow: Period::new_const(26),
            macd_signal: Period::new_const(9),
            rsi_period: Period::new_const(14),
            kdj_period: Period::new_const(9),
            kdj_com: 2.0,
        }
    }
}

// ============================================================
// INDICATOR COLUMNS
// ============================================================

/// Indicator family, used for warm-up checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    MaShort,
    MaMid,
    MaLong,
    Macd,
    Rsi,
    Kdj,
}

/// Indicator values at a single row
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct IndicatorRow {
    pub ma_short: f64,
    pub ma_mid: f64,
    pub ma_long: f64,
    pub dif: f64,
    pub dea: f64,
    pub macd: f64,
    pub rsi: f64,
    pub k: f64,
    pub d: f64,
    pub j: f64,
}

/// Indicator columns aligned with a bar series
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Indicators {
    pub ma_short: Vec<f64>,
    pub ma_mid: Vec<f64>,
    pub ma_long: Vec<f64>,
    pub dif: Vec<f64>,
    pub dea: Vec<f64>,
    /// MACD histogram: 2 * (DIF - DEA)
    pub macd: Vec<f64>,
    pub rsi: Vec<f64>,
    pub k: Vec<f64>,
    pub d: Vec<f64>,
    pub j: Vec<f64>,
    first_ready: FirstReady,
}

/// First row index at which each column carries a real value
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct FirstReady {
    ma_short: usize,
    ma_mid: usize,
    ma_long: usize,
    rsi: usize,
    kdj: usize,
}

impl Indicators {
    #[inline]
    pub fn len(&self) -> usize {
        self.ma_short.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ma_short.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<IndicatorRow> {
        if index >= self.len() {
            return None;
        }
        Some(IndicatorRow {
            ma_short: self.ma_short[index],
            ma_mid: self.ma_mid[index],
            ma_long: self.ma_long[index],
            dif: self.dif[index],
            dea: self.dea[index],
            macd: self.macd[index],
            rsi: self.rsi[index],
            k: self.k[index],
            d: self.d[index],
            j: self.j[index],
        })
    }

    /// Last row, if any
    pub fn last(&self) -> Option<IndicatorRow> {
        self.len().checked_sub(1).and_then(|i| self.row(i))
    }

    /// True once `column` has left its zero-filled warm-up at `index`
    pub fn is_ready(&self, column: Column, index: usize) -> bool {
        if index >= self.len() {
            return false;
        }
        let first = match column {
            Column::MaShort => self.first_ready.ma_short,
            Column::MaMid => self.first_ready.ma_mid,
            Column::MaLong => self.first_ready.ma_long,
            Column::Macd => 0,
            Column::Rsi => self.first_ready.rsi,
            Column::Kdj => self.first_ready.kdj,
        };
        index >= first
    }
}

// ============================================================
// PRIMITIVES
// ============================================================

/// Simple moving average; the first `period - 1` rows are 0
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![0.0; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    for (i, window) in values.windows(period).enumerate() {
        out[i + period - 1] = window.iter().sum::<f64>() / period as f64;
    }
    out
}

/// Recursive EMA seeded with the first value, no bias adjustment
pub fn ema(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut prev = match values.first() {
        Some(&v) => v,
        None => return out,
    };
    out.push(prev);
    for &v in &values[1..] {
        prev = alpha * v + (1.0 - alpha) * prev;
        out.push(prev);
    }
    out
}

/// EMA parameterized by span (alpha = 2 / (span + 1))
#[inline]
pub fn ema_span(values: &[f64], span: usize) -> Vec<f64> {
    ema(values, 2.0 / (span as f64 + 1.0))
}

/// MACD lines: (DIF, DEA, histogram)
pub fn macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let fast_ema = ema_span(closes, fast);
    let slow_ema = ema_span(closes, slow);
    let dif: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let dea = ema_span(&dif, signal);
    let hist = dif.iter().zip(&dea).map(|(a, b)| 2.0 * (a - b)).collect();
    (dif, dea, hist)
}

/// RSI from simple averages of gains and losses over `period` rows.
///
/// The first delta counts as zero, so values start at row `period - 1`.
/// A window without losses reads 100, including a perfectly flat one.
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![0.0; closes.len()];
    if period == 0 || closes.len() < period {
        return out;
    }

    let deltas: Vec<f64> = std::iter::once(0.0)
        .chain(closes.windows(2).map(|w| w[1] - w[0]))
        .collect();

    for end in period - 1..closes.len() {
        let window = &deltas[end + 1 - period..=end];
        let gain = window.iter().filter(|d| **d > 0.0).sum::<f64>() / period as f64;
        let loss = -window.iter().filter(|d| **d < 0.0).sum::<f64>() / period as f64;
        out[end] = if loss == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + gain / loss)
        };
    }
    out
}

/// KDJ stochastic: (K, D, J), zero before the window fills
pub fn kdj<T: OHLCV>(bars: &[T], period: usize, com: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let n = bars.len();
    let mut k = vec![0.0; n];
    let mut d = vec![0.0; n];
    let mut j = vec![0.0; n];
    if period == 0 || n < period {
        return (k, d, j);
    }

    let rsv: Vec<f64> = (period - 1..n)
        .map(|i| {
            let window = &bars[i + 1 - period..=i];
            let low = window.iter().map(|b| b.low()).fold(f64::INFINITY, f64::min);
            let high = window.iter().map(|b| b.high()).fold(f64::NEG_INFINITY, f64::max);
            let range = high - low;
            if range > 0.0 {
                (bars[i].close() - low) / range * 100.0
            } else {
                50.0
            }
        })
        .collect();

    let alpha = 1.0 / (1.0 + com);
    let k_line = ema(&rsv, alpha);
    let d_line = ema(&k_line, alpha);
    for (offset, (kv, dv)) in k_line.iter().zip(&d_line).enumerate() {
        let i = offset + period - 1;
        k[i] = *kv;
        d[i] = *dv;
        j[i] = 3.0 * kv - 2.0 * dv;
    }
    (k, d, j)
}

// ============================================================
// ENGINE
// ============================================================

/// Compute the full indicator set with default windows
pub fn compute_indicators<T: OHLCV>(bars: &[T]) -> Indicators {
    compute_indicators_with(bars, &IndicatorConfig::default())
}

/// Compute the full indicator set with explicit windows
pub fn compute_indicators_with<T: OHLCV>(bars: &[T], config: &IndicatorConfig) -> Indicators {
    let closes: Vec<f64> = bars.iter().map(|b| b.close()).collect();

    let (dif, dea, hist) = macd(
        &closes,
        config.macd_fast.get(),
        config.macd_slow.get(),
        config.macd_signal.get(),
    );
    let (k, d, j) = kdj(bars, config.kdj_period.get(), config.kdj_com);

    Indicators {
        ma_short: sma(&closes, config.ma_short.get()),
        ma_mid: sma(&closes, config.ma_mid.get()),
        ma_long: sma(&closes, config.ma_long.get()),
        dif,
        dea,
        macd: hist,
        rsi: rsi(&closes, config.rsi_period.get()),
        k,
        d,
        j,
        first_ready: FirstReady {
            ma_short: config.ma_short.get() - 1,
            ma_mid: config.ma_mid.get() - 1,
            ma_long: config.ma_long.get() - 1,
            rsi: config.rsi_period.get() - 1,
            kdj: config.kdj_period.get() - 1,
        },
    }
}

// ============================================================
// CACHE
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    code: String,
    last_date: Option<chrono::NaiveDate>,
    len: usize,
    first_close: u64,
    last_close: u64,
}

impl CacheKey {
    fn new<T: OHLCV>(code: &str, bars: &[T]) -> Self {
        Self {
            code: code.to_string(),
            last_date: bars.last().and_then(|b| b.date()),
            len: bars.len(),
            first_close: bars.first().map_or(0, |b| b.close().to_bits()),
            last_close: bars.last().map_or(0, |b| b.close().to_bits()),
        }
    }
}

/// Memoizes indicator columns per (instrument, window) across scans.
///
/// Entries are keyed by code, last bar date, window length and the
/// boundary closes; a revised bar inside the window is not detected.
/// When full the least recently used entry is evicted.
#[derive(Debug)]
pub struct IndicatorCache {
    config: IndicatorConfig,
    entries: Mutex<LruCache<CacheKey, Arc<Indicators>>>,
}

impl IndicatorCache {
    pub fn new(capacity: usize) -> Self {
        Self::with_config(capacity, IndicatorConfig::default())
    }

    pub fn with_config(capacity: usize, config: IndicatorConfig) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().map(|e| e.cap().get()).unwrap_or(0)
    }

    /// Cached indicators for `bars`, computing them on a miss
    pub fn get_or_compute<T: OHLCV>(&self, code: &str, bars: &[T]) -> Arc<Indicators> {
        let key = CacheKey::new(code, bars);

        if let Ok(mut entries) = self.entries.lock() {
            if let Some(hit) = entries.get(&key) {
                return Arc::clone(hit);
            }
        }

        let computed = Arc::new(compute_indicators_with(bars, &self.config));
        if let Ok(mut entries) = self.entries.lock() {
            if let Some((evicted, _)) = entries.push(key, Arc::clone(&computed)) {
                tracing::trace!(code = %evicted.code, "indicator cache evicted entry");
            }
        }
        computed
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

// ============================================================
// TESTS
// ============================================================
