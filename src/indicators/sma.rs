// =============================================================================
// Simple Moving Average (SMA) with trend and proximity fields
// =============================================================================
//
// Per bar:
//   sma       = mean close over the trailing `window` bars
//   trend     = Trend Classifier applied to `sma`
//   dist_low  = 100 * (low / sma - 1)    how far the low sits above the SMA
//   dist_high = 100 * (sma / high - 1)   how far the high sits below the SMA
//   slope     = 100 * (sma[i] / sma[i - k] - 1)
//
// The slope lookback k is 1 bar for short averages (window <= 5) and 5 bars
// otherwise.  The threshold is an empirical setting, not a law of the
// domain.
// =============================================================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::indicators::error::IndicatorError;
use crate::indicators::frame::IndicatorFrame;
use crate::indicators::rolling::{pct_change, rolling_mean};
use crate::indicators::trend::{classify, TrendPoint};
use crate::market_data::Bar;

/// Largest window that still uses the short slope lookback.
pub const SLOPE_SHORT_WINDOW_MAX: usize = 5;
/// Slope lookback (bars) for windows up to `SLOPE_SHORT_WINDOW_MAX`.
pub const SLOPE_SHORT_LOOKBACK: usize = 1;
/// Slope lookback (bars) for longer windows.
pub const SLOPE_LONG_LOOKBACK: usize = 5;

/// One row of the moving-average frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmaRow {
    pub date: NaiveDate,
    pub close: f64,
    pub sma: Option<f64>,
    #[serde(flatten)]
    pub trend: TrendPoint,
    #[serde(default, with = "crate::indicators::non_finite")]
    pub dist_low: Option<f64>,
    #[serde(default, with = "crate::indicators::non_finite")]
    pub dist_high: Option<f64>,
    #[serde(default, with = "crate::indicators::non_finite")]
    pub slope: Option<f64>,
}

pub type SmaFrame = IndicatorFrame<SmaRow>;

/// Slope lookback used for a given SMA window.
pub fn slope_lookback(window: usize) -> usize {
    if window <= SLOPE_SHORT_WINDOW_MAX {
        SLOPE_SHORT_LOOKBACK
    } else {
        SLOPE_LONG_LOOKBACK
    }
}

/// Compute the SMA frame of `bars` for a trailing `window`.
///
/// Returns `Err(InvalidWindow)` for `window == 0`.  A series shorter than the
/// window is not an error: every `sma` is `None`.
pub fn compute_sma(bars: &[Bar], window: usize) -> Result<SmaFrame, IndicatorError> {
    if window == 0 {
        return Err(IndicatorError::InvalidWindow);
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let sma = rolling_mean(&closes, window);
    let trend = classify(&sma);
    let slope = pct_change(&sma, slope_lookback(window));

    let rows = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let avg = sma[i];
            SmaRow {
                date: bar.date,
                close: bar.close,
                sma: avg,
                trend: trend[i],
                dist_low: avg.map(|m| 100.0 * (bar.low / m - 1.0)),
                dist_high: avg.map(|m| 100.0 * (m / bar.high - 1.0)),
                slope: slope[i],
            }
        })
        .collect();

    Ok(IndicatorFrame::new(rows))
}
