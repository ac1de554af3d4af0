//! Dynamic-time-warping shape similarity
//!
//! Both sequences are z-score normalized, aligned with DTW under an
//! absolute-difference cost, and the path cost is mapped to a `(0, 100]`
//! score with `100 / (1 + d)`.

use serde::{Deserialize, Serialize};

use crate::normalize::normalize;
use crate::pattern::Pattern;
use crate::{MatchError, Result};

/// DTW alignment options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DtwConfig {
    /// Sakoe-Chiba band half-width. `None` aligns without a band. The band
    /// is widened to at least the length difference so the end is reachable.
    pub window: Option<usize>,
}

/// Minimum cumulative cost of aligning `a` with `b`.
///
/// Returns `None` when either sequence is empty.
pub fn dtw_distance(a: &[f64], b: &[f64], config: &DtwConfig) -> Option<f64> {
    let (n, m) = (a.len(), b.len());
    if n == 0 || m == 0 {
        return None;
    }
    let band = config.window.map(|w| w.max(n.abs_diff(m)));

    let mut prev = vec![f64::INFINITY; m + 1];
    let mut curr = vec![f64::INFINITY; m + 1];
    prev[0] = 0.0;

    for i in 1..=n {
        curr.fill(f64::INFINITY);
        let (lo, hi) = match band {
            Some(w) => (i.saturating_sub(w).max(1), (i + w).min(m)),
            None => (1, m),
        };
        for j in lo..=hi {
            let cost = (a[i - 1] - b[j - 1]).abs();
            let best = prev[j].min(curr[j - 1]).min(prev[j - 1]);
            curr[j] = cost + best;
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    Some(prev[m])
}

/// Map a DTW distance onto `(0, 100]`; identical shapes score exactly 100
#[inline]
pub fn distance_to_score(distance: f64) -> f64 {
    if distance == 0.0 {
        return 100.0;
    }
    if !distance.is_finite() || distance < 0.0 {
        return 0.0;
    }
    100.0 / (1.0 + distance)
}

/// Shape similarity of two raw sequences on a 0-100 scale.
///
/// Scale and offset invariant. Empty input scores 0.
pub fn score_similarity(pattern: &[f64], candidate: &[f64]) -> f64 {
    let p = normalize(pattern);
    let c = normalize(candidate);
    dtw_distance(&p, &c, &DtwConfig::default()).map_or(0.0, distance_to_score)
}

/// Distance and score of one comparison
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Similarity {
    pub distance: f64,
    pub score: f64,
}

/// A pattern normalized once and compared against many windows
#[derive(Debug, Clone)]
pub struct PreparedPattern {
    normalized: Vec<f64>,
    config: DtwConfig,
}

impl PreparedPattern {
    pub fn new(points: &[f64], min_len: usize, config: DtwConfig) -> Result<Self> {
        if points.len() < min_len.max(1) {
            return Err(MatchError::PatternTooShort {
                need: min_len.max(1),
                got: points.len(),
            });
        }
        if points.iter().any(|v| !v.is_finite()) {
            return Err(MatchError::InvalidValue("pattern contains non-finite values"));
        }
        Ok(Self {
            normalized: normalize(points),
            config,
        })
    }

    pub fn from_pattern(pattern: &Pattern, min_len: usize, config: DtwConfig) -> Result<Self> {
        let closes = pattern.checked_closes(min_len)?;
        Self::new(&closes, min_len, config)
    }

    pub fn len(&self) -> usize {
        self.normalized.len()
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }

    pub fn normalized(&self) -> &[f64] {
        &self.normalized
    }

    /// Compare against a window as-is
    pub fn compare(&self, window: &[f64]) -> Option<Similarity> {
        let candidate = normalize(window);
        let distance = dtw_distance(&self.normalized, &candidate, &self.config)?;
        Some(Similarity {
            distance,
            score: distance_to_score(distance),
        })
    }

    /// Compare against the trailing `len()` values of `closes`
    pub fn compare_tail(&self, closes: &[f64]) -> Option<Similarity> {
        if closes.len() < self.len() {
            return None;
        }
        self.compare(&closes[closes.len() - self.len()..])
    }
}
