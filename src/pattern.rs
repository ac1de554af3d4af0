//! User-submitted shapes: a bare trend line or a sequence of candles

use serde::{Deserialize, Serialize};

use crate::{MatchError, Result};

/// Shortest shape the default scanner, backtest and catalog accept
pub const MIN_PATTERN_LEN: usize = 5;

/// One constructed candle of a pattern.
///
/// Deserializes from `{"open":..,"close":..,"low":..,"high":..}` or from the
/// chart-library tuple order `[open, close, low, high]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandleShape {
    pub open: f64,
    pub close: f64,
    pub low: f64,
    pub high: f64,
}

impl CandleShape {
    pub fn new(open: f64, close: f64, low: f64, high: f64) -> Self {
        Self {
            open,
            close,
            low,
            high,
        }
    }
}

/// A shape to match against instrument history. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Pattern {
    /// Hand-drawn trend, one value per step
    Trend(Vec<f64>),
    /// Constructed candles, matched on their closes
    Candles(Vec<CandleShape>),
}

impl Pattern {
    pub fn trend(points: impl Into<Vec<f64>>) -> Self {
        Pattern::Trend(points.into())
    }

    pub fn candles(candles: impl Into<Vec<CandleShape>>) -> Self {
        Pattern::Candles(candles.into())
    }

    pub fn len(&self) -> usize {
        match self {
            Pattern::Trend(points) => points.len(),
            Pattern::Candles(candles) => candles.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The sequence used for matching
    pub fn closes(&self) -> Vec<f64> {
        match self {
            Pattern::Trend(points) => points.clone(),
            Pattern::Candles(candles) => candles.iter().map(|c| c.close).collect(),
        }
    }

    /// Closes, provided the pattern is long enough and finite
    pub fn checked_closes(&self, min_len: usize) -> Result<Vec<f64>> {
        if self.len() < min_len {
            return Err(MatchError::PatternTooShort {
                need: min_len,
                got: self.len(),
            });
        }
        let closes = self.closes();
        if closes.iter().any(|v| !v.is_finite()) {
            return Err(MatchError::InvalidValue("pattern contains non-finite values"));
        }
        Ok(closes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_from_json() {
        let p: Pattern = serde_json::from_str("[0.1, 0.5, 0.8, 0.2]").unwrap();
        assert_eq!(p, Pattern::trend(vec![0.1, 0.5, 0.8, 0.2]));
    }

    #[test]
    fn test_candles_from_tuples_and_objects() {
        let p: Pattern = serde_json::from_str("[[10, 12, 9, 13], [12, 11, 10.5, 12.5]]").unwrap();
        assert_eq!(p.closes(), vec![12.0, 11.0]);

        let p: Pattern =
            serde_json::from_str(r#"[{"open": 1, "close": 2, "low": 0.5, "high": 2.5}]"#).unwrap();
        assert!(matches!(p, Pattern::Candles(_)));
        assert_eq!(p.closes(), vec![2.0]);
    }

    #[test]
    fn test_checked_closes() {
        let p = Pattern::trend(vec![1.0, 2.0]);
        assert_eq!(
            p.checked_closes(5),
            Err(MatchError::PatternTooShort { need: 5, got: 2 })
        );
        let p = Pattern::trend(vec![1.0, f64::NAN, 3.0]);
        assert!(p.checked_closes(3).is_err());
        let p = Pattern::candles(vec![CandleShape::new(1.0, 2.0, 0.5, 2.5); 3]);
        assert_eq!(p.checked_closes(3).unwrap(), vec![2.0; 3]);
    }
}
