//! Candle-shape rules: dark-cloud cover, shooting star, guillotine

use super::{pair, SignalId, SignalRule};
use crate::indicators::{Column, Indicators};
use crate::{MatchError, OHLCVExt, Result, SignalKind, OHLCV};

impl_with_defaults!(DarkCloudCoverRule, ShootingStarRule, GuillotineRule);

// ============================================================
// DARK-CLOUD COVER
// ============================================================

/// Bearish candle opens above a bullish candle's close and closes below
/// the midpoint of its body
#[derive(Debug, Clone, Default)]
pub struct DarkCloudCoverRule;

impl SignalRule for DarkCloudCoverRule {
    fn id(&self) -> SignalId {
        SignalId::DARK_CLOUD
    }

    fn kind(&self) -> SignalKind {
        SignalKind::Sell
    }

    fn check<T: OHLCV>(&self, bars: &[T], _ind: &Indicators, index: usize) -> bool {
        let Some((prev, curr)) = pair(bars, index) else {
            return false;
        };
        prev.is_bullish()
            && curr.is_bearish()
            && curr.open() > prev.close()
            && curr.close() < prev.body_mid()
    }
}

// ============================================================
// SHOOTING STAR
// ============================================================

/// Long upper shadow over a real body with little lower shadow
#[derive(Debug, Clone)]
pub struct ShootingStarRule {
    /// Upper shadow must exceed both body and lower shadow by this factor
    pub shadow_factor: f64,
}

impl Default for ShootingStarRule {
    fn default() -> Self {
        Self { shadow_factor: 2.0 }
    }
}

impl SignalRule for ShootingStarRule {
    fn id(&self) -> SignalId {
        SignalId::SHOOTING_STAR
    }

    fn kind(&self) -> SignalKind {
        SignalKind::Sell
    }

    fn check<T: OHLCV>(&self, bars: &[T], _ind: &Indicators, index: usize) -> bool {
        // evaluated like every other rule: needs a previous row
        let Some((_, bar)) = pair(bars, index) else {
            return false;
        };
        let body = bar.body();
        let upper = bar.upper_shadow();
        let lower = bar.lower_shadow();
        body > 0.0 && upper > self.shadow_factor * body && upper > self.shadow_factor * lower
    }

    fn validate_config(&self) -> Result<()> {
        if !(self.shadow_factor.is_finite() && self.shadow_factor > 0.0) {
            return Err(MatchError::InvalidConfig(
                "shooting star shadow_factor must be > 0".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================
// GUILLOTINE
// ============================================================

/// Bearish candle opening above all three MAs and closing below all of them
#[derive(Debug, Clone, Default)]
pub struct GuillotineRule;

impl SignalRule for GuillotineRule {
    fn id(&self) -> SignalId {
        SignalId::GUILLOTINE
    }

    fn kind(&self) -> SignalKind {
        SignalKind::Sell
    }

    fn check<T: OHLCV>(&self, bars: &[T], ind: &Indicators, index: usize) -> bool {
        let Some((_, curr)) = pair(bars, index) else {
            return false;
        };
        if !ind.is_ready(Column::MaLong, index) || !curr.is_bearish() {
            return false;
        }
        let mas = [ind.ma_short[index], ind.ma_mid[index], ind.ma_long[index]];
        let top = mas.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let bottom = mas.iter().copied().fold(f64::INFINITY, f64::min);
        curr.open() > top && curr.close() < bottom
    }
}

// ============================================================
// TESTS
// ============================================================
