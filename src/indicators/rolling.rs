// =============================================================================
// Rolling-window helpers
// =============================================================================
//
// Output vectors are aligned 1:1 with the input.  A point whose window is not
// fully available is `None`; it is never filled with a partial mean.

/// Trailing arithmetic mean over `window` values.
///
/// Each mean sums its own window slice; there is no running total.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                None
            } else {
                let slice = &values[i + 1 - window..=i];
                Some(slice.iter().sum::<f64>() / window as f64)
            }
        })
        .collect()
}

/// Shift a series forward by `lag` points: `out[i] = values[i - lag]`.
pub fn lag<T: Copy>(values: &[Option<T>], lag: usize) -> Vec<Option<T>> {
    (0..values.len())
        .map(|i| if i >= lag { values[i - lag] } else { None })
        .collect()
}

/// Percent change over `lookback` points: `100 * (v[i] / v[i - lookback] - 1)`.
pub fn pct_change(values: &[Option<f64>], lookback: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if i < lookback {
                return None;
            }
            match (values[i], values[i - lookback]) {
                (Some(cur), Some(prev)) => Some(100.0 * (cur / prev - 1.0)),
                _ => None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_undefined_until_window_filled() {
        let m = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(m[0], None);
        assert_eq!(m[1], None);
        assert!((m[2].unwrap() - 2.0).abs() < 1e-12);
        assert!((m[3].unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn mean_window_longer_than_series() {
        assert!(rolling_mean(&[1.0, 2.0], 5).iter().all(Option::is_none));
    }

    #[test]
    fn zero_window_is_all_undefined() {
        assert!(rolling_mean(&[1.0, 2.0], 0).iter().all(Option::is_none));
    }

    #[test]
    fn lag_shifts_forward() {
        let v = [Some(1.0), None, Some(3.0)];
        assert_eq!(lag(&v, 1), vec![None, Some(1.0), None]);
        assert_eq!(lag(&v, 0), v.to_vec());
    }

    #[test]
    fn pct_change_over_lookback() {
        let v = [Some(100.0), Some(110.0), None, Some(121.0)];
        let p = pct_change(&v, 1);
        assert_eq!(p[0], None);
        assert!((p[1].unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(p[2], None);
        assert_eq!(p[3], None);
        let p2 = pct_change(&v, 2);
        assert!((p2[3].unwrap() - 10.0).abs() < 1e-9);
    }
}
