//! Preset pattern library
//!
//! A [`PatternCatalog`] is built once (from the builtin table or JSON) and
//! then shared read-only; there is no way to mutate it in place.
//!
//! ```rust
//! use shapescan::catalog::PatternCatalog;
//! use shapescan::SignalKind;
//!
//! let catalog = PatternCatalog::builtin();
//! let w = catalog.get("w_bottom").unwrap();
//! assert_eq!(w.class, SignalKind::Buy);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::pattern::{CandleShape, Pattern, MIN_PATTERN_LEN};
use crate::{MatchError, Result, SignalKind};

/// A named canonical shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternDef {
    pub id: String,
    pub label: String,
    pub shape: Pattern,
    /// Signal class the shape usually implies
    pub class: SignalKind,
}

/// Immutable id -> pattern lookup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternCatalog {
    entries: BTreeMap<String, PatternDef>,
}

impl PatternCatalog {
    /// Build a catalog, rejecting duplicate ids and degenerate shapes
    pub fn from_defs(defs: impl IntoIterator<Item = PatternDef>) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for def in defs {
            def.shape.checked_closes(MIN_PATTERN_LEN).map_err(|e| {
                MatchError::InvalidConfig(format!("pattern {}: {e}", def.id))
            })?;
            if entries.contains_key(&def.id) {
                return Err(MatchError::InvalidConfig(format!(
                    "duplicate pattern id: {}",
                    def.id
                )));
            }
            entries.insert(def.id.clone(), def);
        }
        Ok(Self { entries })
    }

    /// Load from a JSON array of pattern definitions
    pub fn from_json(json: &str) -> Result<Self> {
        let defs: Vec<PatternDef> =
            serde_json::from_str(json).map_err(|e| MatchError::InvalidConfig(e.to_string()))?;
        Self::from_defs(defs)
    }

    /// A new catalog with `extra` added on top of this one
    pub fn merged(&self, extra: impl IntoIterator<Item = PatternDef>) -> Result<Self> {
        Self::from_defs(self.entries.values().cloned().chain(extra))
    }

    pub fn get(&self, id: &str) -> Option<&PatternDef> {
        self.entries.get(id)
    }

    /// Like [`get`](Self::get) but as an error for unknown ids
    pub fn require(&self, id: &str) -> Result<&PatternDef> {
        self.get(id)
            .ok_or_else(|| MatchError::UnknownPattern(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PatternDef> {
        self.entries.values()
    }

    pub fn by_class(&self, class: SignalKind) -> impl Iterator<Item = &PatternDef> {
        self.entries.values().filter(move |d| d.class == class)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The builtin preset library
    pub fn builtin() -> Self {
        let mut entries = BTreeMap::new();
        for &(id, label, class, points) in TREND_PRESETS {
            entries.insert(id.to_string(), def(id, label, class, Pattern::trend(points)));
            if let Some((mid, mlabel)) = mirror_of(id) {
                let flipped: Vec<f64> = points.iter().map(|v| 1.0 - v).collect();
                let class = match class {
                    SignalKind::Buy => SignalKind::Sell,
                    SignalKind::Sell => SignalKind::Buy,
                };
                entries.insert(mid.to_string(), def(mid, mlabel, class, Pattern::trend(flipped)));
            }
        }
        for &(id, label, class, candles) in CANDLE_PRESETS {
            let shape = Pattern::candles(
                candles
                    .iter()
                    .map(|&(o, c, l, h)| CandleShape::new(o, c, l, h))
                    .collect::<Vec<_>>(),
            );
            entries.insert(id.to_string(), def(id, label, class, shape));
        }
        Self { entries }
    }
}

fn def(id: &str, label: &str, class: SignalKind, shape: Pattern) -> PatternDef {
    PatternDef {
        id: id.to_string(),
        label: label.to_string(),
        shape,
        class,
    }
}

// ============================================================
// BUILTIN TABLE
// ============================================================

type TrendPreset = (&'static str, &'static str, SignalKind, &'static [f64]);
type CandlePreset = (&'static str, &'static str, SignalKind, &'static [(f64, f64, f64, f64)]);

/// Shapes drawn on a 0..1 scale; mirrored twins come from `mirror_of`
const TREND_PRESETS: &[TrendPreset] = &[
    (
        "w_bottom",
        "W bottom",
        SignalKind::Buy,
        &[0.8, 0.5, 0.2, 0.45, 0.6, 0.45, 0.2, 0.5, 0.8, 0.95],
    ),
    (
        "head_shoulders_bottom",
        "Inverse head and shoulders",
        SignalKind::Buy,
        &[0.7, 0.4, 0.55, 0.1, 0.55, 0.4, 0.7, 0.9],
    ),
    ("v_reversal", "V reversal", SignalKind::Buy, &[0.9, 0.7, 0.5, 0.3, 0.1, 0.3, 0.5, 0.7, 0.9]),
    (
        "rounding_bottom",
        "Rounding bottom",
        SignalKind::Buy,
        &[0.9, 0.6, 0.4, 0.25, 0.2, 0.25, 0.4, 0.6, 0.9],
    ),
    (
        "ascending_triangle",
        "Ascending triangle",
        SignalKind::Buy,
        &[0.2, 0.8, 0.4, 0.8, 0.55, 0.8, 0.7, 0.8, 0.95],
    ),
    (
        "bull_flag",
        "Bull flag",
        SignalKind::Buy,
        &[0.1, 0.4, 0.7, 0.9, 0.85, 0.8, 0.75, 0.7, 0.85, 1.0],
    ),
    ("triple_bottom", "Triple bottom", SignalKind::Buy, &[0.8, 0.2, 0.6, 0.2, 0.6, 0.2, 0.6, 0.9]),
    (
        "breakout",
        "Consolidation breakout",
        SignalKind::Buy,
        &[0.5, 0.55, 0.5, 0.55, 0.5, 0.55, 0.5, 0.8, 1.0],
    ),
    (
        "steady_uptrend",
        "Steady uptrend",
        SignalKind::Buy,
        &[0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9],
    ),
    (
        "falling_wedge",
        "Falling wedge",
        SignalKind::Buy,
        &[0.9, 0.6, 0.75, 0.5, 0.6, 0.42, 0.5, 0.38, 0.6, 0.8],
    ),
    (
        "cup_handle",
        "Cup with handle",
        SignalKind::Buy,
        &[0.9, 0.6, 0.35, 0.3, 0.35, 0.6, 0.9, 0.8, 0.75, 0.85, 1.0],
    ),
    ("five_waves", "Five-wave advance", SignalKind::Buy, &[0.1, 0.4, 0.25, 0.75, 0.6, 0.95]),
    (
        "dead_cat_bounce",
        "Dead-cat bounce",
        SignalKind::Sell,
        &[0.9, 0.5, 0.2, 0.4, 0.3, 0.15, 0.05],
    ),
];

/// Bearish twin of a bullish preset, drawn upside down
fn mirror_of(id: &str) -> Option<(&'static str, &'static str)> {
    match id {
        "w_bottom" => Some(("m_top", "M top")),
        "head_shoulders_bottom" => Some(("head_shoulders_top", "Head and shoulders top")),
        "v_reversal" => Some(("inverted_v", "Inverted V")),
        "rounding_bottom" => Some(("rounding_top", "Rounding top")),
        "ascending_triangle" => Some(("descending_triangle", "Descending triangle")),
        "bull_flag" => Some(("bear_flag", "Bear flag")),
        "triple_bottom" => Some(("triple_top", "Triple top")),
        "breakout" => Some(("breakdown", "Consolidation breakdown")),
        "steady_uptrend" => Some(("steady_downtrend", "Steady downtrend")),
        "falling_wedge" => Some(("rising_wedge", "Rising wedge")),
        _ => None,
    }
}

/// (open, close, low, high)
const CANDLE_PRESETS: &[CandlePreset] = &[
    (
        "morning_star",
        "Morning star",
        SignalKind::Buy,
        &[
            (10.5, 10.0, 9.9, 10.6),
            (10.0, 9.6, 9.5, 10.1),
            (9.6, 8.4, 8.3, 9.7),
            (8.3, 8.35, 8.1, 8.5),
            (8.5, 9.5, 8.4, 9.6),
        ],
    ),
    (
        "evening_star",
        "Evening star",
        SignalKind::Sell,
        &[
            (7.6, 8.0, 7.5, 8.1),
            (8.0, 8.4, 7.9, 8.5),
            (8.4, 9.6, 8.3, 9.7),
            (9.7, 9.65, 9.5, 9.9),
            (9.5, 8.5, 8.4, 9.6),
        ],
    ),
    (
        "three_white_soldiers",
        "Three white soldiers",
        SignalKind::Buy,
        &[
            (10.4, 10.0, 9.9, 10.5),
            (10.0, 10.1, 9.9, 10.2),
            (10.1, 10.8, 10.0, 10.9),
            (10.7, 11.5, 10.6, 11.6),
            (11.4, 12.2, 11.3, 12.3),
        ],
    ),
];

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_size_and_lookup() {
        let catalog = PatternCatalog::builtin();
        assert!(catalog.len() >= 20);
        assert_eq!(catalog.get("m_top").unwrap().class, SignalKind::Sell);
        assert_eq!(catalog.get("head_shoulders_top").unwrap().label, "Head and shoulders top");
        assert!(catalog.get("nope").is_none());
        assert_eq!(
            catalog.require("nope"),
            Err(MatchError::UnknownPattern("nope".into()))
        );
    }

    #[test]
    fn test_builtin_shapes_are_usable() {
        let catalog = PatternCatalog::builtin();
        for def in catalog.iter() {
            assert!(def.shape.checked_closes(MIN_PATTERN_LEN).is_ok(), "{}", def.id);
        }
        assert!(catalog.by_class(SignalKind::Buy).count() > 5);
        assert!(catalog.by_class(SignalKind::Sell).count() > 5);
    }

    #[test]
    fn test_mirror_is_flipped() {
        let catalog = PatternCatalog::builtin();
        let w = catalog.get("w_bottom").unwrap().shape.closes();
        let m = catalog.get("m_top").unwrap().shape.closes();
        for (a, b) in w.iter().zip(&m) {
            assert!((a + b - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_from_json_and_merge() {
        let json = r#"[
            {"id": "saw", "label": "Saw", "shape": [1, 3, 1, 3, 1], "class": "BUY"},
            {"id": "stairs", "label": "Stairs", "class": "SELL", "shape": [
                [1, 2, 0.5, 2.5], [2, 3, 1.5, 3.5], [3, 4, 2.5, 4.5],
                [4, 5, 3.5, 5.5], [5, 6, 4.5, 6.5]
            ]}
        ]"#;
        let catalog = PatternCatalog::from_json(json).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("stairs").unwrap().shape.closes(), vec![2.0, 3.0, 4.0, 5.0, 6.0]);

        let merged = PatternCatalog::builtin().merged(catalog.iter().cloned()).unwrap();
        assert_eq!(merged.len(), PatternCatalog::builtin().len() + 2);
    }

    #[test]
    fn test_rejects_duplicates_and_short_shapes() {
        let dup = PatternCatalog::builtin().merged(PatternCatalog::builtin().iter().cloned());
        assert!(dup.is_err());

        let short = PatternCatalog::from_json(
            r#"[{"id": "x", "label": "X", "shape": [1, 2], "class": "BUY"}]"#,
        );
        assert!(matches!(short, Err(MatchError::InvalidConfig(_))));
    }
}
