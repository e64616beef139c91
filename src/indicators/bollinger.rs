// =============================================================================
// Bollinger Bands on the typical price
// =============================================================================
//
// TP     = (low + high + close) / 3
// middle = rolling mean of TP over 20 bars
// std    = rolling population standard deviation of TP (denominator N)
// upper  = middle + dev * std
// lower  = middle - dev * std
// width  = (upper - lower) / middle * 100   (Bollinger Band Width)
//
// The window is fixed at 20 bars regardless of the moving-average windows
// used elsewhere in the view.  The upper and lower bands are classified as
// two independent trend series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::indicators::frame::IndicatorFrame;
use crate::indicators::trend::{classify, TrendPoint};
use crate::market_data::Bar;

/// Rolling window of the bands, in bars.
pub const BOLLINGER_WINDOW: usize = 20;
/// Default band multiplier.
pub const DEFAULT_DEV: f64 = 2.0;

/// Result of a Bollinger Band calculation over one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerResult {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub std_dev: f64,
    pub width: f64,
}

/// Calculate Bollinger Bands over the last `period` entries of `values`.
///
/// Returns `None` only when `period` is zero or fewer than `period` values
/// are available.  A zero middle band is not guarded: `width` is then
/// non-finite and is passed through unchanged.
pub fn calculate_bollinger(values: &[f64], period: usize, num_std: f64) -> Option<BollingerResult> {
    if period == 0 || values.len() < period {
        return None;
    }

    let window = &values[values.len() - period..];
    let n = period as f64;
    let middle = window.iter().sum::<f64>() / n;
    let variance = window.iter().map(|x| (x - middle).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    let upper = middle + num_std * std_dev;
    let lower = middle - num_std * std_dev;
    let width = (upper - lower) / middle * 100.0;

    Some(BollingerResult {
        upper,
        middle,
        lower,
        std_dev,
        width,
    })
}

/// One row of the Bollinger frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerRow {
    pub date: NaiveDate,
    pub close: f64,
    pub typical_price: f64,
    pub middle: Option<f64>,
    pub std_dev: Option<f64>,
    pub upper: Option<f64>,
    pub lower: Option<f64>,
    pub width: Option<f64>,
    pub upper_trend: TrendPoint,
    pub lower_trend: TrendPoint,
}

pub type BollingerFrame = IndicatorFrame<BollingerRow>;

/// Compute the Bollinger frame of `bars` with band multiplier `dev`.
pub fn compute_bollinger(bars: &[Bar], dev: f64) -> BollingerFrame {
    let tp: Vec<f64> = bars.iter().map(Bar::typical_price).collect();

    let bands: Vec<Option<BollingerResult>> = (0..tp.len())
        .map(|i| calculate_bollinger(&tp[..=i], BOLLINGER_WINDOW, dev))
        .collect();

    let upper: Vec<Option<f64>> = bands.iter().map(|b| b.map(|b| b.upper)).collect();
    let lower: Vec<Option<f64>> = bands.iter().map(|b| b.map(|b| b.lower)).collect();
    let upper_trend = classify(&upper);
    let lower_trend = classify(&lower);

    let rows = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| BollingerRow {
            date: bar.date,
            close: bar.close,
            typical_price: tp[i],
            middle: bands[i].map(|b| b.middle),
            std_dev: bands[i].map(|b| b.std_dev),
            upper: upper[i],
            lower: lower[i],
            width: bands[i].map(|b| b.width),
            upper_trend: upper_trend[i],
            lower_trend: lower_trend[i],
        })
        .collect();

    IndicatorFrame::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::trend::TrendLabel;

    fn bars_from(prices: &[(f64, f64, f64)]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &(high, low, close))| {
                Bar::new(
                    start + chrono::Duration::days(i as i64),
                    close,
                    high,
                    low,
                    close,
                )
            })
            .collect()
    }

    #[test]
    fn bollinger_basic() {
        let closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        let bb = calculate_bollinger(&closes, 20, 2.0).unwrap();
        assert!(bb.upper > bb.middle);
        assert!(bb.lower < bb.middle);
        assert!(bb.width > 0.0);
    }

    #[test]
    fn bollinger_insufficient_data() {
        let closes = vec![1.0, 2.0, 3.0];
        assert!(calculate_bollinger(&closes, 20, 2.0).is_none());
        assert!(calculate_bollinger(&closes, 0, 2.0).is_none());
    }

    #[test]
    fn bollinger_flat() {
        let bb = calculate_bollinger(&[100.0; 20], 20, 2.0).unwrap();
        assert!((bb.width - 0.0).abs() < 1e-10);
        assert_eq!(bb.std_dev, 0.0);
    }

    #[test]
    fn zero_middle_is_passed_through() {
        let bb = calculate_bollinger(&[0.0; 20], 20, 2.0).unwrap();
        assert_eq!(bb.middle, 0.0);
        assert!(bb.width.is_nan());
    }

    #[test]
    fn constant_series_collapses_bands() {
        let bars = bars_from(&[(50.0, 50.0, 50.0); 30]);
        let frame = compute_bollinger(&bars, DEFAULT_DEV);
        for (i, row) in frame.rows.iter().enumerate() {
            if i < BOLLINGER_WINDOW - 1 {
                assert!(row.upper.is_none() && row.lower.is_none() && row.middle.is_none());
            } else {
                assert_eq!(row.std_dev, Some(0.0));
                assert_eq!(row.upper, row.middle);
                assert_eq!(row.lower, row.middle);
                assert_eq!(row.middle, Some(50.0));
            }
        }
    }

    #[test]
    fn bands_use_typical_price_and_population_std() {
        let prices: Vec<(f64, f64, f64)> = (0..20)
            .map(|i| {
                let c = 100.0 + (i % 5) as f64;
                (c + 2.0, c - 1.0, c)
            })
            .collect();
        let bars = bars_from(&prices);
        let frame = compute_bollinger(&bars, 2.0);
        let row = frame.last().unwrap();

        let tp: Vec<f64> = bars.iter().map(|b| (b.low + b.high + b.close) / 3.0).collect();
        let mean = tp.iter().sum::<f64>() / 20.0;
        let var = tp.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / 20.0;
        let std = var.sqrt();

        assert!((row.middle.unwrap() - mean).abs() < 1e-9);
        assert!((row.std_dev.unwrap() - std).abs() < 1e-9);
        assert!((row.upper.unwrap() - (mean + 2.0 * std)).abs() < 1e-9);
        assert!((row.lower.unwrap() - (mean - 2.0 * std)).abs() < 1e-9);
    }

    #[test]
    fn bands_are_classified_independently() {
        // Quiet first, then a widening swing: the upper band rises while the
        // lower band falls.
        let mut prices: Vec<(f64, f64, f64)> = vec![(100.0, 100.0, 100.0); 20];
        for i in 0..6 {
            let amp = 2.0 * (i + 1) as f64;
            let c = if i % 2 == 0 { 100.0 + amp } else { 100.0 - amp };
            prices.push((c, c, c));
        }
        let bars = bars_from(&prices);
        let frame = compute_bollinger(&bars, 2.0);

        let row = frame.rows[22];
        assert_eq!(row.upper_trend.label, Some(TrendLabel::Rising));
        assert_eq!(row.lower_trend.label, Some(TrendLabel::Falling));
        assert!(row.upper_trend.signals.up);
        assert!(row.lower_trend.signals.dn);
    }
}
