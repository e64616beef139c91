// =============================================================================
// Parabolic SAR (Stop And Reverse)
// =============================================================================
//
// Computed over the trailing 52 bars only.  The recurrence is origin
// sensitive (another start bar gives another trajectory), so the window is
// fixed rather than "all available history".
//
// Initialisation on the first two bars of the window:
//   extreme = high[0], trend = up, stop[0] = low[0], stop[1] = min(low[0], low[1])
//
// Uptrend step:
//   extreme = max(extreme, high)
//   stop[i-1] > low  -> flip down: af = start, stop = extreme, extreme = low
//   otherwise        -> af grows (capped) when the extreme extended,
//                       stop += af * (extreme - stop),
//                       stop = min(stop, low[i], low[i-1])
// Downtrend step: mirror image.
//
// Output is lagged one bar: proximity is judged with yesterday's stop
// against today's close.
// =============================================================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::indicators::error::IndicatorError;
use crate::indicators::frame::IndicatorFrame;
use crate::indicators::rolling::lag;
use crate::market_data::bar_series::tail;
use crate::market_data::Bar;

/// Number of trailing bars the recurrence runs over.
pub const PSAR_LOOKBACK: usize = 52;

/// Bars needed to initialise the recurrence.
const MIN_BARS: usize = 2;

/// Acceleration settings of the recurrence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SarParams {
    pub af_start: f64,
    pub af_step: f64,
    pub af_max: f64,
    pub lookback: usize,
}

impl Default for SarParams {
    fn default() -> Self {
        Self {
            af_start: 0.02,
            af_step: 0.02,
            af_max: 0.2,
            lookback: PSAR_LOOKBACK,
        }
    }
}

/// Direction of the trailing stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SarTrend {
    Up,
    Down,
}

impl std::fmt::Display for SarTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "UP"),
            Self::Down => write!(f, "DOWN"),
        }
    }
}

/// Recurrence state after one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SarState {
    pub trend: SarTrend,
    /// Highest high of the uptrend, or lowest low of the downtrend.
    pub extreme: f64,
    /// Acceleration factor.
    pub af: f64,
    /// Trailing stop value (the SAR).
    pub stop: f64,
}

impl SarState {
    /// States of the first two bars.
    pub fn initial(first: &Bar, second: &Bar, params: &SarParams) -> [SarState; 2] {
        let s0 = SarState {
            trend: SarTrend::Up,
            extreme: first.high,
            af: params.af_start,
            stop: first.low,
        };
        let s1 = SarState {
            stop: first.low.min(second.low),
            ..s0
        };
        [s0, s1]
    }

    /// Advance the recurrence by one bar.  `prev_bar` is the bar the current
    /// state was computed on.
    pub fn step(&self, bar: &Bar, prev_bar: &Bar, params: &SarParams) -> SarState {
        match self.trend {
            SarTrend::Up => {
                let extreme = self.extreme.max(bar.high);
                if self.stop > bar.low {
                    return SarState {
                        trend: SarTrend::Down,
                        extreme: bar.low,
                        af: params.af_start,
                        stop: extreme,
                    };
                }
                let af = self.grown_af(extreme > self.extreme, params);
                let stop = (self.stop + af * (extreme - self.stop))
                    .min(bar.low)
                    .min(prev_bar.low);
                SarState {
                    trend: SarTrend::Up,
                    extreme,
                    af,
                    stop,
                }
            }
            SarTrend::Down => {
                let extreme = self.extreme.min(bar.low);
                if self.stop < bar.high {
                    return SarState {
                        trend: SarTrend::Up,
                        extreme: bar.high,
                        af: params.af_start,
                        stop: extreme,
                    };
                }
                let af = self.grown_af(extreme < self.extreme, params);
                let stop = (self.stop + af * (extreme - self.stop))
                    .max(bar.high)
                    .max(prev_bar.high);
                SarState {
                    trend: SarTrend::Down,
                    extreme,
                    af,
                    stop,
                }
            }
        }
    }

    fn grown_af(&self, extended: bool, params: &SarParams) -> f64 {
        if extended && self.af < params.af_max {
            (self.af + params.af_step).min(params.af_max)
        } else {
            self.af
        }
    }
}

/// One row of the SAR frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PsarRow {
    pub date: NaiveDate,
    pub close: f64,
    pub trend: SarTrend,
    pub extreme: f64,
    pub af: f64,
    pub psar: f64,
    pub psar_bull: Option<f64>,
    pub psar_bear: Option<f64>,
    /// Previous bar's values.
    pub psar_prev: Option<f64>,
    pub psar_bull_prev: Option<f64>,
    pub psar_bear_prev: Option<f64>,
    /// `100 * (close / psar_prev - 1)`.
    #[serde(default, with = "crate::indicators::non_finite")]
    pub dist_psar: Option<f64>,
}

pub type PsarFrame = IndicatorFrame<PsarRow>;

/// Run the recurrence over all of `window` (no trimming).
pub fn sar_states(window: &[Bar], params: &SarParams) -> Result<Vec<SarState>, IndicatorError> {
    if window.len() < MIN_BARS {
        return Err(IndicatorError::InsufficientHistory {
            needed: MIN_BARS,
            got: window.len(),
        });
    }

    let mut states = Vec::with_capacity(window.len());
    states.extend(SarState::initial(&window[0], &window[1], params));
    for pair in window[1..].windows(2) {
        let prev = states[states.len() - 1];
        states.push(prev.step(&pair[1], &pair[0], params));
    }
    Ok(states)
}

/// Compute the SAR frame over the trailing `params.lookback` bars.
///
/// The frame is aligned with that trailing window, not with the whole input.
/// Fewer than two bars is an error; callers typically skip SAR for that
/// timeframe.
pub fn compute_psar(bars: &[Bar], params: &SarParams) -> Result<PsarFrame, IndicatorError> {
    let window = tail(bars, params.lookback);
    let states = sar_states(window, params)?;

    let psar: Vec<Option<f64>> = states.iter().map(|s| Some(s.stop)).collect();
    let bull: Vec<Option<f64>> = states
        .iter()
        .map(|s| (s.trend == SarTrend::Up).then_some(s.stop))
        .collect();
    let bear: Vec<Option<f64>> = states
        .iter()
        .map(|s| (s.trend == SarTrend::Down).then_some(s.stop))
        .collect();

    let psar_prev = lag(&psar, 1);
    let bull_prev = lag(&bull, 1);
    let bear_prev = lag(&bear, 1);

    let rows = window
        .iter()
        .zip(&states)
        .enumerate()
        .map(|(i, (bar, state))| PsarRow {
            date: bar.date,
            close: bar.close,
            trend: state.trend,
            extreme: state.extreme,
            af: state.af,
            psar: state.stop,
            psar_bull: bull[i],
            psar_bear: bear[i],
            psar_prev: psar_prev[i],
            psar_bull_prev: bull_prev[i],
            psar_bear_prev: bear_prev[i],
            dist_psar: psar_prev[i].map(|p| 100.0 * (bar.close / p - 1.0)),
        })
        .collect();

    Ok(IndicatorFrame::new(rows))
}
