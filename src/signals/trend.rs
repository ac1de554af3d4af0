//! Indicator-driven rules: moving-average and MACD crosses, MA alignment, RSI levels

use super::{crossed_above, crossed_below, pair, SignalId, SignalRule};
use crate::indicators::{Column, Indicators};
use crate::{MatchError, Result, SignalKind, OHLCV};

impl_with_defaults!(
    MaGoldenCrossRule,
    MaDeathCrossRule,
    MacdGoldenCrossRule,
    MacdDeathCrossRule,
    BullishAlignmentRule,
    BearishAlignmentRule,
    RsiOversoldRule,
    RsiOverboughtRule,
);

/// Both MA lines are out of warm-up at `index - 1` (and hence at `index`)
fn mas_ready(ind: &Indicators, index: usize) -> bool {
    index >= 1
        && index < ind.len()
        && ind.is_ready(Column::MaShort, index - 1)
        && ind.is_ready(Column::MaMid, index - 1)
}

fn rsi_threshold(value: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&value) {
        return Err(MatchError::InvalidConfig(format!(
            "RSI threshold {value} outside [0, 100]"
        )));
    }
    Ok(())
}

// ============================================================
// MOVING AVERAGE CROSSES
// ============================================================

/// Short MA crosses above the mid MA
#[derive(Debug, Clone, Default)]
pub struct MaGoldenCrossRule;

impl SignalRule for MaGoldenCrossRule {
    fn id(&self) -> SignalId {
        SignalId::MA_GOLD
    }

    fn kind(&self) -> SignalKind {
        SignalKind::Buy
    }

    fn check<T: OHLCV>(&self, _bars: &[T], ind: &Indicators, index: usize) -> bool {
        if !mas_ready(ind, index) {
            return false;
        }
        crossed_above(
            ind.ma_short[index - 1],
            ind.ma_mid[index - 1],
            ind.ma_short[index],
            ind.ma_mid[index],
        )
    }
}

/// Short MA crosses below the mid MA
#[derive(Debug, Clone, Default)]
pub struct MaDeathCrossRule;

impl SignalRule for MaDeathCrossRule {
    fn id(&self) -> SignalId {
        SignalId::MA_DEAD
    }

    fn kind(&self) -> SignalKind {
        SignalKind::Sell
    }

    fn check<T: OHLCV>(&self, _bars: &[T], ind: &Indicators, index: usize) -> bool {
        if !mas_ready(ind, index) {
            return false;
        }
        crossed_below(
            ind.ma_short[index - 1],
            ind.ma_mid[index - 1],
            ind.ma_short[index],
            ind.ma_mid[index],
        )
    }
}

// ============================================================
// MACD CROSSES
// ============================================================

/// DIF crosses above DEA
#[derive(Debug, Clone, Default)]
pub struct MacdGoldenCrossRule;

impl SignalRule for MacdGoldenCrossRule {
    fn id(&self) -> SignalId {
        SignalId::MACD_GOLD
    }

    fn kind(&self) -> SignalKind {
        SignalKind::Buy
    }

    fn check<T: OHLCV>(&self, _bars: &[T], ind: &Indicators, index: usize) -> bool {
        if index < 1 || index >= ind.len() {
            return false;
        }
        crossed_above(ind.dif[index - 1], ind.dea[index - 1], ind.dif[index], ind.dea[index])
    }
}

/// DIF crosses below DEA
#[derive(Debug, Clone, Default)]
pub struct MacdDeathCrossRule;

impl SignalRule for MacdDeathCrossRule {
    fn id(&self) -> SignalId {
        SignalId::MACD_DEAD
    }

    fn kind(&self) -> SignalKind {
        SignalKind::Sell
    }

    fn check<T: OHLCV>(&self, _bars: &[T], ind: &Indicators, index: usize) -> bool {
        if index < 1 || index >= ind.len() {
            return false;
        }
        crossed_below(ind.dif[index - 1], ind.dea[index - 1], ind.dif[index], ind.dea[index])
    }
}

// ============================================================
// MA ALIGNMENT
// ============================================================

/// close > MA short > MA mid, optionally > MA long
#[derive(Debug, Clone, Default)]
pub struct BullishAlignmentRule {
    pub require_long_ma: bool,
}

impl SignalRule for BullishAlignmentRule {
    fn id(&self) -> SignalId {
        SignalId::MA_BULL
    }

    fn kind(&self) -> SignalKind {
        SignalKind::Buy
    }

    fn check<T: OHLCV>(&self, bars: &[T], ind: &Indicators, index: usize) -> bool {
        let Some((_, curr)) = pair(bars, index) else {
            return false;
        };
        if !ind.is_ready(Column::MaMid, index) {
            return false;
        }
        let (short, mid) = (ind.ma_short[index], ind.ma_mid[index]);
        if !(curr.close() > short && short > mid) {
            return false;
        }
        if self.require_long_ma {
            return ind.is_ready(Column::MaLong, index) && mid > ind.ma_long[index];
        }
        true
    }
}

/// close < MA short < MA mid
#[derive(Debug, Clone, Default)]
pub struct BearishAlignmentRule;

impl SignalRule for BearishAlignmentRule {
    fn id(&self) -> SignalId {
        SignalId::MA_BEAR
    }

    fn kind(&self) -> SignalKind {
        SignalKind::Sell
    }

    fn check<T: OHLCV>(&self, bars: &[T], ind: &Indicators, index: usize) -> bool {
        let Some((_, curr)) = pair(bars, index) else {
            return false;
        };
        if !ind.is_ready(Column::MaMid, index) {
            return false;
        }
        let (short, mid) = (ind.ma_short[index], ind.ma_mid[index]);
        curr.close() < short && short < mid
    }
}

// ============================================================
// RSI
// ============================================================

/// RSI climbs back above the oversold line
#[derive(Debug, Clone)]
pub struct RsiOversoldRule {
    pub threshold: f64,
}

impl Default for RsiOversoldRule {
    fn default() -> Self {
        Self { threshold: 30.0 }
    }
}

impl SignalRule for RsiOversoldRule {
    fn id(&self) -> SignalId {
        SignalId::RSI_OVERSOLD
    }

    fn kind(&self) -> SignalKind {
        SignalKind::Buy
    }

    fn check<T: OHLCV>(&self, _bars: &[T], ind: &Indicators, index: usize) -> bool {
        if index < 1 || !ind.is_ready(Column::Rsi, index - 1) || !ind.is_ready(Column::Rsi, index) {
            return false;
        }
        ind.rsi[index - 1] < self.threshold && ind.rsi[index] > self.threshold
    }

    fn validate_config(&self) -> Result<()> {
        rsi_threshold(self.threshold)
    }
}

/// RSI above the overbought line
#[derive(Debug, Clone)]
pub struct RsiOverboughtRule {
    pub threshold: f64,
}

impl Default for RsiOverboughtRule {
    fn default() -> Self {
        Self { threshold: 70.0 }
    }
}

impl SignalRule for RsiOverboughtRule {
    fn id(&self) -> SignalId {
        SignalId::RSI_OVERBOUGHT
    }

    fn kind(&self) -> SignalKind {
        SignalKind::Sell
    }

    fn check<T: OHLCV>(&self, _bars: &[T], ind: &Indicators, index: usize) -> bool {
        ind.is_ready(Column::Rsi, index) && ind.rsi[index] > self.threshold
    }

    fn validate_config(&self) -> Result<()> {
        rsi_threshold(self.threshold)
    }
}

// ============================================================
// TESTS
// ============================================================
