//! Integration tests for the market scan pipeline.
//!
//! These exercise the public API end to end: universe loading, filters,
//! strategies, similarity ranking and partial scans.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate};
use serde_json::json;
use shapescan::prelude::*;

const SHAPE: [f64; 5] = [10.0, 12.0, 11.0, 15.0, 14.0];

fn bars(closes: &[f64]) -> Vec<PricePoint> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let date = start.checked_add_days(Days::new(i as u64)).unwrap();
            PricePoint::new(date, c, c, c, c, 10_000.0)
        })
        .collect()
}

fn instrument(code: &str, closes: &[f64]) -> Instrument {
    Instrument::new(InstrumentMeta::new(code, format!("{code} Corp")), bars(closes))
}

/// Some unremarkable history, then SHAPE scaled by `factor`
fn ends_with_shape(factor: f64) -> Vec<f64> {
    let mut closes: Vec<f64> = (0..25).map(|i| 20.0 + (i % 3) as f64).collect();
    closes.extend(SHAPE.iter().map(|v| v * factor));
    closes
}

/// Same history, then SHAPE reversed
fn ends_with_reversed_shape() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..25).map(|i| 20.0 + (i % 3) as f64).collect();
    closes.extend(SHAPE.iter().rev().map(|v| v * 3.0));
    closes
}

/// Steady decline with a sharp rally on the final bar (MACD golden cross)
fn decline_then_jump() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..45).map(|i| 100.0 - i as f64).collect();
    closes.push(closes[44] + 30.0);
    closes
}

/// Accept any adjusted score, even a negative one
fn any_score() -> ScanFilters {
    ScanFilters {
        min_score: f64::MIN,
        ..ScanFilters::default()
    }
}

// ============================================================
// END-TO-END SCENARIOS
// ============================================================

#[test]
fn test_scaled_shape_ranks_first() {
    let universe = vec![
        instrument("REV", &ends_with_reversed_shape()),
        instrument("MATCH", &ends_with_shape(3.0)),
        instrument("FLAT", &[25.0; 30]),
    ];
    let pattern = Pattern::trend(SHAPE.to_vec());
    let results = scan_market(Some(&pattern), &ScanFilters::default(), &universe);

    assert!(!results.is_empty());
    let top = &results[0];
    assert_eq!(top.code, "MATCH");
    assert!(top.similarity.unwrap() > 99.99);
    assert_eq!(top.matched_segment, SHAPE.iter().map(|v| v * 3.0).collect::<Vec<_>>());
    assert_eq!(top.price, 42.0);
    assert_eq!(top.date, NaiveDate::from_ymd_opt(2024, 1, 30));
    assert!((10.0..=99.0).contains(&top.confidence));
    // reversed and flat shapes cannot reach the default threshold
    assert_eq!(results.len(), 1);
}

#[test]
fn test_large_cap_filter_with_no_large_caps() {
    let universe: Vec<Instrument> = [("A", 10.0), ("B", 120.0), ("C", 199.0)]
        .iter()
        .map(|&(code, cap)| {
            let mut inst = instrument(code, &ends_with_shape(2.0));
            inst.meta.market_cap = Some(cap);
            inst
        })
        .collect();
    let filters = ScanFilters::from_loose(&json!({"marketCap": "LARGE", "minScore": 90}));
    let pattern = Pattern::trend(SHAPE.to_vec());
    let report = Scanner::default().scan(Some(&pattern), &filters, &universe);

    assert!(report.results.is_empty());
    assert_eq!(report.rejected_at(Stage::HardFilter), 3);
}

#[test]
fn test_flat_candidate_excluded() {
    assert_eq!(normalize(&[7.0; 5]), vec![7.0; 5]);

    let universe = vec![instrument("FLAT", &[7.0; 30])];
    let pattern = Pattern::trend(SHAPE.to_vec());
    let report = Scanner::default().scan(Some(&pattern), &ScanFilters::default(), &universe);
    assert!(report.results.is_empty());
    assert_eq!(report.rejected_at(Stage::Threshold), 1);

    let loose = Scanner::default().scan(Some(&pattern), &any_score(), &universe);
    assert!(loose.results[0].similarity.unwrap() < 5.0);
}

#[test]
fn test_required_macd_cross() {
    let declining: Vec<f64> = (0..46).map(|i| 100.0 - i as f64).collect();
    let universe = vec![
        instrument("CROSS", &decline_then_jump()),
        instrument("NOCROSS", &declining),
    ];
    let filters = ScanFilters {
        strategies: vec!["MACD_GOLD".into()],
        logic: StrategyLogic::And,
        ..any_score()
    };
    // the pattern is a perfect fit for NOCROSS, which must still be excluded
    let pattern = Pattern::trend(declining[41..].to_vec());
    let report = Scanner::default().scan(Some(&pattern), &filters, &universe);

    let codes: Vec<&str> = report.results.iter().map(|r| r.code.as_str()).collect();
    assert_eq!(codes, vec!["CROSS"]);
    assert_eq!(report.rejected_at(Stage::Strategy), 1);
    let hit = &report.results[0];
    assert!(hit.signals.iter().any(|s| s.id == SignalId::MACD_GOLD));
    assert!(hit.metadata.adjustment >= 5.0);
}

// ============================================================
// FILTERS AND STRATEGIES
// ============================================================

#[test]
fn test_or_logic_accepts_any_signal() {
    let universe = vec![instrument("CROSS", &decline_then_jump())];
    let filters = ScanFilters {
        strategies: vec!["MA_GOLD".into(), "MACD golden cross".into()],
        logic: StrategyLogic::Or,
        ..any_score()
    };
    assert_eq!(scan_market(None, &filters, &universe).len(), 1);

    let and = ScanFilters {
        strategies: vec!["MACD_GOLD".into(), "NOT_A_SIGNAL".into()],
        ..any_score()
    };
    assert!(scan_market(None, &and, &universe).is_empty());
}

#[test]
fn test_sector_and_unknown_cap() {
    let mut tech = instrument("TECH", &ends_with_shape(2.0));
    tech.meta = tech.meta.clone().with_sector("Technology").with_market_cap(500.0);
    let mut bank = instrument("BANK", &ends_with_shape(2.0));
    bank.meta = bank.meta.clone().with_sector("Banking").with_market_cap(500.0);
    let unknown = instrument("UNKNOWN", &ends_with_shape(2.0));
    let universe = vec![tech, bank, unknown];
    let pattern = Pattern::trend(SHAPE.to_vec());

    let filters = ScanFilters {
        sector: Some("Technology".into()),
        ..any_score()
    };
    let results = scan_market(Some(&pattern), &filters, &universe);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].code, "TECH");

    let filters = ScanFilters {
        market_cap: Some(CapBucket::Large),
        ..any_score()
    };
    let results = scan_market(Some(&pattern), &filters, &universe);
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.metadata.cap_bucket == Some(CapBucket::Large)));
}

#[test]
fn test_sector_matches_substring_ignoring_case() {
    let mut tech = instrument("TECH", &ends_with_shape(2.0));
    tech.meta = tech.meta.clone().with_sector("Technology");
    let mut biotech = instrument("BIO", &ends_with_shape(2.0));
    biotech.meta = biotech.meta.clone().with_sector("Biotech Research");
    let mut bank = instrument("BANK", &ends_with_shape(2.0));
    bank.meta = bank.meta.clone().with_sector("Banking");
    let unknown = instrument("UNKNOWN", &ends_with_shape(2.0));
    let universe = vec![tech, biotech, bank, unknown];
    let pattern = Pattern::trend(SHAPE.to_vec());

    for (wanted, expected) in [
        ("Tech", vec!["BIO", "TECH"]),
        ("tech", vec!["BIO", "TECH"]),
        ("technology", vec!["TECH"]),
        ("BANK", vec!["BANK"]),
        ("energy", vec![]),
    ] {
        let filters = ScanFilters {
            sector: Some(wanted.into()),
            ..any_score()
        };
        let mut codes: Vec<String> = scan_market(Some(&pattern), &filters, &universe)
            .into_iter()
            .map(|r| r.code)
            .collect();
        codes.sort();
        assert_eq!(codes, expected, "sector filter {wanted:?}");
    }
}

#[test]
fn test_price_bounds_use_latest_bar() {
    let universe = vec![
        instrument("CHEAP", &ends_with_shape(1.0)),
        instrument("PRICEY", &ends_with_shape(10.0)),
    ];
    let filters = ScanFilters {
        max_price: Some(50.0),
        ..any_score()
    };
    let results = scan_market(Some(&Pattern::trend(SHAPE.to_vec())), &filters, &universe);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].code, "CHEAP");
}

// ============================================================
// RANKING
// ============================================================

#[test]
fn test_results_sorted_and_truncated() {
    let universe: Vec<Instrument> = (0..15)
        .map(|i| {
            if i % 2 == 0 {
                instrument(&format!("S{i:02}"), &ends_with_shape(1.0 + i as f64))
            } else {
                instrument(&format!("S{i:02}"), &ends_with_reversed_shape())
            }
        })
        .collect();
    let pattern = Pattern::trend(SHAPE.to_vec());
    let report = Scanner::default().scan(Some(&pattern), &any_score(), &universe);

    assert_eq!(report.total, 15);
    assert_eq!(report.matched, 15);
    assert_eq!(report.results.len(), 10);
    assert!(report.results.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn test_catalog_pattern_scan() {
    let catalog = PatternCatalog::builtin();
    let v = catalog.require("v_reversal").unwrap();
    let closes = v.shape.closes();

    let mut history: Vec<f64> = (0..20).map(|i| 30.0 + (i % 4) as f64).collect();
    history.extend(closes.iter().map(|p| 20.0 + p * 10.0));
    let universe = vec![instrument("VEE", &history)];

    let report = Scanner::default().scan(Some(&v.shape), &any_score(), &universe);
    assert!(report.results[0].similarity.unwrap() > 99.0);
    assert!(catalog.require("no_such_shape").is_err());
}

#[test]
fn test_every_builtin_preset_scans_with_defaults() {
    let scanner = Scanner::default();
    for def in PatternCatalog::builtin().iter() {
        let mut history: Vec<f64> = (0..20).map(|i| 30.0 + (i % 4) as f64).collect();
        history.extend(def.shape.closes().iter().map(|p| 20.0 + p * 10.0));
        let universe = vec![instrument("SELF", &history)];

        let report = scanner
            .try_scan(Some(&def.shape), &any_score(), &universe)
            .unwrap_or_else(|e| panic!("{}: {e}", def.id));
        assert!(report.results[0].similarity.unwrap() > 99.0, "{}", def.id);
    }
}

#[test]
fn test_long_history_uses_trailing_lookback() {
    let mut closes: Vec<f64> = (0..154).map(|i| 60.0 + (i as f64 * 0.3).sin() * 5.0).collect();
    closes.extend(decline_then_jump());
    assert_eq!(closes.len(), 200);
    let universe = vec![instrument("LONG", &closes)];

    let report = Scanner::default().scan(None, &any_score(), &universe);
    let hit = &report.results[0];
    assert_eq!(hit.metadata.bars_used, 60);
    assert_eq!(hit.date, Some(universe[0].bars[199].date));

    let tail = &universe[0].bars[140..];
    let expected = detect_signals(tail, &compute_indicators(tail), DetectMode::Latest);
    assert_eq!(hit.signals, expected);
    assert!(hit.signals.iter().all(|s| s.index == 59));

    let config = ScanConfig {
        lookback: 100,
        ..ScanConfig::default()
    };
    let wide = ScannerBuilder::new().config(config).build().unwrap();
    let report = wide.scan(None, &any_score(), &universe);
    assert_eq!(report.results[0].metadata.bars_used, 100);
}

// ============================================================
// RESILIENCE
// ============================================================

#[test]
fn test_bad_rows_do_not_abort_scan() {
    let mut broken = instrument("BROKEN", &ends_with_shape(2.0));
    broken.bars[27].close = f64::NAN;
    let mut negative = instrument("NEGATIVE", &ends_with_shape(2.0));
    negative.bars[10].close = -1.0;
    let universe = vec![broken, instrument("OK", &ends_with_shape(2.0)), negative];

    let pattern = Pattern::trend(SHAPE.to_vec());
    let report = Scanner::default().scan(Some(&pattern), &any_score(), &universe);
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].code, "OK");

    let mut failed: Vec<&str> = report.errors.iter().map(|e| e.code.as_str()).collect();
    failed.sort_unstable();
    assert_eq!(failed, vec!["BROKEN", "NEGATIVE"]);
    assert!(matches!(report.errors[0].error, MatchError::InvalidOHLCV { .. }));
}

#[test]
fn test_short_pattern() {
    let universe = vec![instrument("MATCH", &ends_with_shape(3.0))];
    let pattern = Pattern::trend(vec![1.0, 2.0, 3.0]);

    let scanner = Scanner::default();
    assert_eq!(
        scanner.try_scan(Some(&pattern), &ScanFilters::default(), &universe).err(),
        Some(MatchError::PatternTooShort { need: 5, got: 3 })
    );
    assert!(scanner.scan(Some(&pattern), &ScanFilters::default(), &universe).results.is_empty());
}

#[test]
fn test_empty_universe() {
    let universe: Vec<Instrument> = Vec::new();
    let report = Scanner::default().scan(None, &ScanFilters::default(), &universe);
    assert_eq!(report.total, 0);
    assert!(report.results.is_empty());
    assert!(!report.is_partial());
}

#[test]
fn test_zero_deadline_skips_everything() {
    let universe = vec![instrument("MATCH", &ends_with_shape(3.0))];
    let scanner = ScannerBuilder::new().deadline(Duration::ZERO).build().unwrap();
    let report = scanner.scan(None, &any_score(), &universe);
    assert!(report.timed_out);
    assert_eq!(report.skipped, 1);
    assert!(report.results.is_empty());
}

#[test]
fn test_cancel_token_shared_across_clones() {
    let token = CancelToken::new();
    let handle = token.clone();
    handle.cancel();
    assert!(token.is_cancelled());

    let universe = vec![instrument("MATCH", &ends_with_shape(3.0))];
    let report = Scanner::default().scan_with_cancel(None, &any_score(), &universe, &token);
    assert!(report.cancelled);
    assert!(report.is_partial());
}

// ============================================================
// CACHING AND PROVIDERS
// ============================================================

#[test]
fn test_shared_indicator_cache() {
    let cache = Arc::new(IndicatorCache::new(64));
    let scanner = ScannerBuilder::new()
        .indicator_cache(Arc::clone(&cache))
        .build()
        .unwrap();
    let universe = vec![
        instrument("A", &ends_with_shape(2.0)),
        instrument("B", &ends_with_shape(3.0)),
    ];
    let pattern = Pattern::trend(SHAPE.to_vec());

    let first = scanner.scan(Some(&pattern), &any_score(), &universe);
    assert_eq!(cache.len(), 2);
    let second = scanner.scan(Some(&pattern), &any_score(), &universe);
    assert_eq!(cache.len(), 2);
    assert_eq!(first.results, second.results);
}

#[test]
fn test_load_universe_from_providers() {
    let mut provider = MemoryProvider::new();
    provider.insert(
        InstrumentMeta::new("MATCH", "Match Corp").with_market_cap(80.0),
        bars(&ends_with_shape(3.0)),
    );
    provider.insert(InstrumentMeta::new("REV", "Rev Corp"), bars(&ends_with_reversed_shape()));

    let universe = load_universe(&provider, &provider, Some(25));
    assert_eq!(universe.len(), 2);
    assert!(universe.iter().all(|i| i.bars.len() == 25));

    let pattern = Pattern::trend(SHAPE.to_vec());
    let results = scan_market(Some(&pattern), &ScanFilters::default(), &universe);
    assert_eq!(results[0].code, "MATCH");
    assert_eq!(results[0].metadata.cap_bucket, Some(CapBucket::Mid));
}

#[test]
fn test_results_serialize() {
    let universe = vec![instrument("MATCH", &ends_with_shape(3.0))];
    let pattern = Pattern::trend(SHAPE.to_vec());
    let results = scan_market(Some(&pattern), &ScanFilters::default(), &universe);
    let value = serde_json::to_value(&results).unwrap();
    assert_eq!(value[0]["code"], "MATCH");
    assert_eq!(value[0]["date"], "2024-01-30");
    assert!(value[0]["signals"].is_array());
}
