//! Z-score normalization so shapes at different price levels compare.

/// Arithmetic mean, 0 for an empty slice
#[inline]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation, 0 for an empty slice
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Z-score transform `(x - mean) / stddev`.
///
/// A constant sequence has zero deviation and is returned unchanged, so a
/// flat candidate keeps its price level and scores far from any real shape.
pub fn normalize(series: &[f64]) -> Vec<f64> {
    let sd = std_dev(series);
    if sd == 0.0 {
        return series.to_vec();
    }
    let m = mean(series);
    series.iter().map(|x| (x - m) / sd).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_moments() {
        let z = normalize(&[10.0, 12.0, 11.0, 15.0, 14.0]);
        assert!(mean(&z).abs() < 1e-12);
        assert!((std_dev(&z) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_constant_is_identity() {
        let flat = vec![50.0; 6];
        assert_eq!(normalize(&flat), flat);
    }

    #[test]
    fn test_normalize_scale_invariant() {
        let a = normalize(&[10.0, 12.0, 11.0, 15.0, 14.0]);
        let b = normalize(&[30.0, 36.0, 33.0, 45.0, 42.0]);
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    fn test_normalize_edge_lengths() {
        assert!(normalize(&[]).is_empty());
        assert_eq!(normalize(&[7.0]), vec![7.0]);
    }
}
