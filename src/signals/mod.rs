//! Rule-based technical signal detection
//!
//! Rules look at a row (`curr`) and its predecessor (`prev`) of an
//! indicator-augmented series and fire discrete BUY/SELL events.
//!
//! # Rule Families
//!
//! - **Trend (8)**: MA and MACD golden/death crosses, MA alignment, RSI levels
//! - **Candles (3)**: Dark-cloud cover, shooting star, guillotine

use serde::{Deserialize, Serialize};

use crate::indicators::Indicators;
use crate::{MatchError, Result, SignalKind, OHLCV};

/// Generate `with_defaults()` -> `Self::default()` for multiple rule types.
macro_rules! impl_with_defaults {
  ($($rule:ty),* $(,)?) => {
    $(impl $rule {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod candles;
pub mod trend;

pub use candles::*;
pub use trend::*;

// ============================================================
// SIGNAL IDS
// ============================================================

/// Stable tag identifying a rule, e.g. `"MACD_GOLD"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId(pub &'static str);

impl SignalId {
    pub const MA_GOLD: SignalId = SignalId("MA_GOLD");
    pub const MA_DEAD: SignalId = SignalId("MA_DEAD");
    pub const MACD_GOLD: SignalId = SignalId("MACD_GOLD");
    pub const MACD_DEAD: SignalId = SignalId("MACD_DEAD");
    pub const MA_BULL: SignalId = SignalId("MA_BULL");
    pub const MA_BEAR: SignalId = SignalId("MA_BEAR");
    pub const RSI_OVERSOLD: SignalId = SignalId("RSI_OVERSOLD");
    pub const RSI_OVERBOUGHT: SignalId = SignalId("RSI_OVERBOUGHT");
    pub const DARK_CLOUD: SignalId = SignalId("DARK_CLOUD");
    pub const SHOOTING_STAR: SignalId = SignalId("SHOOTING_STAR");
    pub const GUILLOTINE: SignalId = SignalId("GUILLOTINE");

    pub const ALL: [SignalId; 11] = [
        Self::MA_GOLD,
        Self::MA_DEAD,
        Self::MACD_GOLD,
        Self::MACD_DEAD,
        Self::MA_BULL,
        Self::MA_BEAR,
        Self::RSI_OVERSOLD,
        Self::RSI_OVERBOUGHT,
        Self::DARK_CLOUD,
        Self::SHOOTING_STAR,
        Self::GUILLOTINE,
    ];

    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.0
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self.0 {
            "MA_GOLD" => "MA golden cross",
            "MA_DEAD" => "MA death cross",
            "MACD_GOLD" => "MACD golden cross",
            "MACD_DEAD" => "MACD death cross",
            "MA_BULL" => "Bullish MA alignment",
            "MA_BEAR" => "Bearish MA alignment",
            "RSI_OVERSOLD" => "RSI oversold recovery",
            "RSI_OVERBOUGHT" => "RSI overbought",
            "DARK_CLOUD" => "Dark-cloud cover",
            "SHOOTING_STAR" => "Shooting star",
            "GUILLOTINE" => "Guillotine",
            other => other,
        }
    }

    /// Resolve a tag or label, ignoring case and separators
    pub fn from_tag(tag: &str) -> Option<SignalId> {
        let wanted = squash(tag);
        if wanted.is_empty() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|id| squash(id.0) == wanted || squash(id.label()) == wanted)
    }
}

fn squash(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

impl std::fmt::Display for SignalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl Serialize for SignalId {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(self.0)
    }
}

impl<'de> Deserialize<'de> for SignalId {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let tag = String::deserialize(d)?;
        SignalId::from_tag(&tag)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown signal tag: {tag}")))
    }
}

/// A rule hit at a specific row
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Signal {
    pub index: usize,
    pub kind: SignalKind,
    pub id: SignalId,
    pub label: &'static str,
}

// ============================================================
// RULE TRAIT
// ============================================================

/// A single signal rule evaluated at `index` against `index - 1`
pub trait SignalRule: Send + Sync {
    fn id(&self) -> SignalId;
    fn kind(&self) -> SignalKind;
    fn check<T: OHLCV>(&self, bars: &[T], ind: &Indicators, index: usize) -> bool;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }
}

/// `(prev, curr)` bars at `index`, `None` at the first row or out of range
#[inline]
pub(crate) fn pair<T: OHLCV>(bars: &[T], index: usize) -> Option<(&T, &T)> {
    if index < 1 {
        return None;
    }
    Some((bars.get(index - 1)?, bars.get(index)?))
}

/// Fast line moves from below to above the slow line
#[inline]
pub fn crossed_above(prev_fast: f64, prev_slow: f64, curr_fast: f64, curr_slow: f64) -> bool {
    prev_fast < prev_slow && curr_fast > curr_slow
}

/// Fast line moves from above to below the slow line
#[inline]
pub fn crossed_below(prev_fast: f64, prev_slow: f64, curr_fast: f64, curr_slow: f64) -> bool {
    prev_fast > prev_slow && curr_fast < curr_slow
}

// ============================================================
// BUILTIN RULES - generated via macro
// ============================================================

/// Macro to generate BuiltinRule enum without boilerplate
macro_rules! define_builtin_rules {
    (
        $(
            $variant:ident($rule:ty)
        ),* $(,)?
    ) => {
        /// All builtin rules - enum dispatch
        #[derive(Debug, Clone)]
        pub enum BuiltinRule {
            $($variant($rule)),*
        }

        impl BuiltinRule {
            #[inline]
            pub fn check<T: OHLCV>(&self, bars: &[T], ind: &Indicators, index: usize) -> bool {
                match self {
                    $(Self::$variant(r) => SignalRule::check(r, bars, ind, index)),*
                }
            }

            #[inline]
            pub fn id(&self) -> SignalId {
                match self {
                    $(Self::$variant(r) => SignalRule::id(r)),*
                }
            }

            #[inline]
            pub fn kind(&self) -> SignalKind {
                match self {
                    $(Self::$variant(r) => SignalRule::kind(r)),*
                }
            }

            pub fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(r) => SignalRule::validate_config(r)),*
                }
            }
        }
    };
}

define_builtin_rules! {
    // Trend (8)
    MaGoldenCross(MaGoldenCrossRule),
    MaDeathCross(MaDeathCrossRule),
    MacdGoldenCross(MacdGoldenCrossRule),
    MacdDeathCross(MacdDeathCrossRule),
    BullishAlignment(BullishAlignmentRule),
    BearishAlignment(BearishAlignmentRule),
    RsiOversold(RsiOversoldRule),
    RsiOverbought(RsiOverboughtRule),

    // Candles (3)
    DarkCloudCover(DarkCloudCoverRule),
    ShootingStar(ShootingStarRule),
    Guillotine(GuillotineRule),
}

/// Generate an array of `BuiltinRule` variants using `Default::default()` for each inner type.
macro_rules! builtin_defaults {
  ($($variant:ident),* $(,)?) => {
    [$(BuiltinRule::$variant(Default::default())),*]
  };
}

// ============================================================
// DETECTOR
// ============================================================

/// Which rows to evaluate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DetectMode {
    /// Last row only ("today")
    #[default]
    Latest,
    /// Every row from index 2 on
    History,
}

impl DetectMode {
    /// Rows required before anything is evaluated
    pub fn min_rows(self) -> usize {
        match self {
            DetectMode::Latest => 2,
            DetectMode::History => 5,
        }
    }
}

/// Evaluates a fixed rule set over indicator-augmented bars
#[derive(Debug, Clone)]
pub struct SignalDetector {
    rules: Vec<BuiltinRule>,
}

impl Default for SignalDetector {
    fn default() -> Self {
        Self {
            rules: DetectorBuilder::new().with_all_defaults().rules,
        }
    }
}

impl SignalDetector {
    pub fn rules(&self) -> &[BuiltinRule] {
        &self.rules
    }

    /// Evaluate every rule at one row
    pub fn scan_at<T: OHLCV>(&self, bars: &[T], ind: &Indicators, index: usize) -> Vec<Signal> {
        self.rules
            .iter()
            .filter(|rule| rule.check(bars, ind, index))
            .map(|rule| {
                let id = rule.id();
                Signal {
                    index,
                    kind: rule.kind(),
                    id,
                    label: id.label(),
                }
            })
            .collect()
    }

    /// Signals on the most recent row
    pub fn latest<T: OHLCV>(&self, bars: &[T], ind: &Indicators) -> Vec<Signal> {
        let n = bars.len().min(ind.len());
        if n < DetectMode::Latest.min_rows() {
            return Vec::new();
        }
        self.scan_at(bars, ind, n - 1)
    }

    /// Signals on every row, oldest first
    pub fn history<T: OHLCV>(&self, bars: &[T], ind: &Indicators) -> Vec<Signal> {
        let n = bars.len().min(ind.len());
        if n < DetectMode::History.min_rows() {
            return Vec::new();
        }
        (2..n).flat_map(|i| self.scan_at(bars, ind, i)).collect()
    }

    pub fn detect<T: OHLCV>(&self, bars: &[T], ind: &Indicators, mode: DetectMode) -> Vec<Signal> {
        match mode {
            DetectMode::Latest => self.latest(bars, ind),
            DetectMode::History => self.history(bars, ind),
        }
    }
}

/// Detect signals with the default rule set
pub fn detect_signals<T: OHLCV>(bars: &[T], ind: &Indicators, mode: DetectMode) -> Vec<Signal> {
    SignalDetector::default().detect(bars, ind, mode)
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for SignalDetector instances
#[derive(Debug, Clone, Default)]
pub struct DetectorBuilder {
    rules: Vec<BuiltinRule>,
    only: Option<Vec<SignalId>>,
}

impl DetectorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every builtin rule with default configuration
    pub fn with_all_defaults(self) -> Self {
        self.with_trend_defaults().with_candle_defaults()
    }

    /// Add indicator-driven rules (8)
    pub fn with_trend_defaults(mut self) -> Self {
        self.rules.extend(builtin_defaults![
            MaGoldenCross,
            MaDeathCross,
            MacdGoldenCross,
            MacdDeathCross,
            BullishAlignment,
            BearishAlignment,
            RsiOversold,
            RsiOverbought,
        ]);
        self
    }

    /// Add candle-shape rules (3)
    pub fn with_candle_defaults(mut self) -> Self {
        self.rules
            .extend(builtin_defaults![DarkCloudCover, ShootingStar, Guillotine]);
        self
    }

    /// Add a single rule
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, rule: BuiltinRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Keep only the listed rules
    pub fn only(mut self, ids: impl IntoIterator<Item = SignalId>) -> Self {
        self.only = Some(ids.into_iter().collect());
        self
    }

    pub fn build(self) -> Result<SignalDetector> {
        let mut rules = self.rules;
        if let Some(only) = self.only {
            rules.retain(|r| only.contains(&r.id()));
        }
        if rules.is_empty() {
            return Err(MatchError::InvalidConfig("detector has no rules".into()));
        }
        for rule in &rules {
            rule.validate_config()?;
        }
        Ok(SignalDetector { rules })
    }
}

// ============================================================
// TESTS
// ============================================================
