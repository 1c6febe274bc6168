// ── Percentile helper ─────────────────────────────────────────────────────────

/// Compute the `p`-th percentile of a **sorted** slice using linear
/// interpolation between closest ranks (NumPy's default method).
///
/// Returns `0.0` for an empty slice.
pub fn percentile(sorted_data: &[f64], p: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }
    let len = sorted_data.len();
    if len == 1 {
        return sorted_data[0];
    }
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (len as f64 - 1.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted_data[lo];
    }
    let frac = rank - lo as f64;
    sorted_data[lo] + frac * (sorted_data[hi] - sorted_data[lo])
}

/// Sort a copy of `values` ascending, ignoring NaN ordering issues.
pub fn sorted(values: impl IntoIterator<Item = f64>) -> Vec<f64> {
    let mut v: Vec<f64> = values.into_iter().collect();
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

// ── Trends ────────────────────────────────────────────────────────────────────

/// Average change per step between the first and last value:
/// `(last - first) / max(1, n - 1)`. `0.0` for fewer than two values.
pub fn endpoint_slope(values: &[f64]) -> f64 {
    match (values.first(), values.last()) {
        (Some(first), Some(last)) if values.len() >= 2 => (last - first) / (values.len() - 1) as f64,
        _ => 0.0,
    }
}

// ── Rounding ──────────────────────────────────────────────────────────────────

/// Round `value` to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10_f64.powi(decimals as i32);
    (value * factor).round() / factor
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_empty_returns_zero() {
        assert_eq!(percentile(&[], 80.0), 0.0);
    }

    #[test]
    fn test_percentile_single_element() {
        assert_eq!(percentile(&[42.0], 80.0), 42.0);
    }

    #[test]
    fn test_percentile_p50_even() {
        let data = vec![1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&data, 50.0) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_percentile_p80_five_elements() {
        // rank = 0.8 * 4 = 3.2 → 4 + 0.2 * (5 - 4)
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((percentile(&data, 80.0) - 4.2).abs() < 1e-9);
    }

    #[test]
    fn test_percentile_bounds() {
        let data = vec![10.0, 20.0, 30.0];
        assert_eq!(percentile(&data, 0.0), 10.0);
        assert_eq!(percentile(&data, 100.0), 30.0);
        assert_eq!(percentile(&data, 150.0), 30.0);
    }

    #[test]
    fn test_sorted() {
        assert_eq!(sorted([3.0, 1.0, 2.0]), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_endpoint_slope() {
        assert_eq!(endpoint_slope(&[]), 0.0);
        assert_eq!(endpoint_slope(&[4.0]), 0.0);
        assert_eq!(endpoint_slope(&[10.0, 14.0]), 4.0);
        // middle values do not matter
        assert_eq!(endpoint_slope(&[10.0, 50.0, 0.0, 16.0]), 2.0);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(33.333_33, 1), 33.3);
        assert_eq!(round_to(66.66, 1), 66.7);
        assert_eq!(round_to(12.0, 0), 12.0);
    }
}
