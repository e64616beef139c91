// =============================================================================
// Multi-Timeframe View
// =============================================================================
//
// For each configured timeframe:
//   1. resample the daily bars
//   2. keep the last `history_limit` bars
//   3. compute SMA fast/slow, Bollinger and (optionally) the SAR
//   4. decide level signals unless the view is plain
//   5. trim every frame to the last `view_rows` rows for display
//
// Each step is timed; durations go to `debug` logs and to an optional hook.
// =============================================================================

use std::time::{Duration, Instant};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::indicators::bollinger::{compute_bollinger, BollingerFrame, BollingerRow};
use crate::indicators::psar::{compute_psar, PsarFrame, PsarRow};
use crate::indicators::sma::{compute_sma, SmaFrame, SmaRow};
use crate::indicators::IndicatorError;
use crate::levels::{self, LevelInputs, LevelReport};
use crate::market_data::bar_series::tail;
use crate::market_data::{resample, Bar, BarSeries};
use crate::runtime_config::RuntimeConfig;
use crate::timeframe::Period;

/// Callback receiving the name and duration of each computation step.
pub type DurationHook<'a> = &'a (dyn Fn(&str, Duration) + Send + Sync);

/// Indicators and level decisions for one timeframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodView {
    pub period: Period,
    pub distance_pct: f64,
    /// Display window of the resampled bars.
    pub bars: Vec<Bar>,
    pub sma_fast_window: usize,
    pub sma_fast: SmaFrame,
    pub sma_slow_window: usize,
    pub sma_slow: SmaFrame,
    pub bollinger: BollingerFrame,
    /// `None` when the SAR is disabled or the timeframe has too few bars.
    pub psar: Option<PsarFrame>,
    /// `None` in plain mode.
    pub levels: Option<LevelReport>,
}

/// Latest row of every frame of one timeframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodLatest {
    pub period: Period,
    pub bar: Option<Bar>,
    pub sma_fast: Option<SmaRow>,
    pub sma_slow: Option<SmaRow>,
    pub bollinger: Option<BollingerRow>,
    pub psar: Option<PsarRow>,
    pub levels: Option<LevelReport>,
}

impl PeriodView {
    pub fn latest(&self) -> PeriodLatest {
        PeriodLatest {
            period: self.period,
            bar: self.bars.last().copied(),
            sma_fast: self.sma_fast.last().copied(),
            sma_slow: self.sma_slow.last().copied(),
            bollinger: self.bollinger.last().copied(),
            psar: self.psar.as_ref().and_then(|f| f.last().copied()),
            levels: self.levels.clone(),
        }
    }
}

/// Complete view of one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtsView {
    pub symbol: String,
    pub last_date: Option<NaiveDate>,
    pub plain: bool,
    pub periods: Vec<PeriodView>,
}

impl AtsView {
    pub fn period(&self, period: Period) -> Option<&PeriodView> {
        self.periods.iter().find(|v| v.period == period)
    }

    pub fn latest(&self) -> Vec<PeriodLatest> {
        self.periods.iter().map(PeriodView::latest).collect()
    }
}

struct StepTimer<'a> {
    symbol: &'a str,
    hook: Option<DurationHook<'a>>,
}

impl StepTimer<'_> {
    fn time<T>(&self, step: &str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        let elapsed = start.elapsed();
        debug!(symbol = self.symbol, step, elapsed_us = elapsed.as_micros() as u64, "step done");
        if let Some(hook) = self.hook {
            hook(step, elapsed);
        }
        out
    }
}

/// Build the multi-timeframe view of `series`.
///
/// Fails only on an invalid moving-average window.  A timeframe with too
/// little history for the SAR is kept without it.
pub fn build_view(
    symbol: &str,
    series: &BarSeries,
    config: &RuntimeConfig,
    hook: Option<DurationHook<'_>>,
) -> Result<AtsView, IndicatorError> {
    let timer = StepTimer { symbol, hook };

    let periods = config
        .periods
        .iter()
        .map(|&period| build_period(&timer, series.bars(), period, config))
        .collect::<Result<Vec<_>, _>>()?;

    let view = AtsView {
        symbol: symbol.to_string(),
        last_date: series.last().map(|b| b.date),
        plain: config.plain,
        periods,
    };

    info!(
        symbol,
        bars = series.len(),
        periods = view.periods.len(),
        last_date = ?view.last_date,
        "view built"
    );
    Ok(view)
}

fn build_period(
    timer: &StepTimer<'_>,
    daily: &[Bar],
    period: Period,
    config: &RuntimeConfig,
) -> Result<PeriodView, IndicatorError> {
    let resampled = timer.time(&format!("resample:{}", period), || resample(daily, period));
    let bars = tail(&resampled, config.history_limit);
    let distance_pct = config.distance_for(period);

    let sma_fast = timer.time(&format!("sma{}:{}", config.sma_fast, period), || {
        compute_sma(bars, config.sma_fast)
    })?;
    let sma_slow = timer.time(&format!("sma{}:{}", config.sma_slow, period), || {
        compute_sma(bars, config.sma_slow)
    })?;
    let bollinger = timer.time(&format!("bollinger:{}", period), || {
        compute_bollinger(bars, config.bollinger_dev)
    });

    let psar = if config.enable_psar {
        match timer.time(&format!("psar:{}", period), || compute_psar(bars, &config.psar)) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(symbol = timer.symbol, period = %period, error = %e, "SAR skipped");
                None
            }
        }
    } else {
        None
    };

    let levels = if config.plain {
        None
    } else {
        let report = levels::evaluate(&LevelInputs {
            bars,
            sma_fast: (&sma_fast, config.sma_fast),
            sma_slow: (&sma_slow, config.sma_slow),
            psar: psar.as_ref(),
            distance_pct,
        });
        log_levels(timer.symbol, period, &report);
        Some(report)
    };

    let rows = config.view_rows;
    Ok(PeriodView {
        period,
        distance_pct,
        bars: tail(bars, rows).to_vec(),
        sma_fast_window: config.sma_fast,
        sma_fast: sma_fast.into_tail(rows),
        sma_slow_window: config.sma_slow,
        sma_slow: sma_slow.into_tail(rows),
        bollinger: bollinger.into_tail(rows),
        psar: psar.map(|f| f.into_tail(rows)),
        levels,
    })
}

fn log_levels(symbol: &str, period: Period, report: &LevelReport) {
    for s in &report.signals {
        info!(
            symbol,
            period = %period,
            source = %s.source,
            kind = %s.kind,
            value = s.value,
            distance_pct = s.distance_pct,
            marker = s.marker_price,
            "level signal"
        );
    }
    for p in report.active_pivots() {
        info!(
            symbol,
            period = %period,
            pivot = p.kind.code(),
            first = p.first.price,
            second = p.second.price,
            last = p.last_close,
            "close between pivot lines"
        );
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn daily_walk(seed: u64, days: usize) -> BarSeries {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut close: f64 = 5000.0;
        let bars = (0..days)
            .map(|i| {
                let open = close;
                close *= 1.0 + rng.gen_range(-0.02..0.02);
                let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.005));
                let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.005));
                Bar::new(start + chrono::Duration::days(i as i64), open, high, low, close)
            })
            .collect();
        BarSeries::new(bars).unwrap()
    }

    #[test]
    fn builds_every_configured_period() {
        let series = daily_walk(1, 1500);
        let config = RuntimeConfig::default();
        let view = build_view("CAC40", &series, &config, None).unwrap();

        assert_eq!(view.symbol, "CAC40");
        assert_eq!(view.last_date, series.last().map(|b| b.date));
        assert_eq!(view.periods.len(), Period::ALL.len());

        for pv in &view.periods {
            assert!(pv.bars.len() <= config.view_rows);
            assert_eq!(pv.sma_fast.len(), pv.bars.len());
            assert_eq!(pv.sma_slow.len(), pv.bars.len());
            assert_eq!(pv.bollinger.len(), pv.bars.len());
            assert!(pv.levels.is_some());
            // Every timeframe ends on the latest trading day.
            assert_eq!(pv.bars.last().map(|b| b.date), view.last_date);
            assert_eq!(pv.distance_pct, config.distance_for(pv.period));
        }

        let day = view.period(Period::Day).unwrap();
        assert_eq!(day.bars.len(), 25);
        assert_eq!(day.bars[..], series.bars()[1500 - 25..]);
        let psar = day.psar.as_ref().unwrap();
        assert_eq!(psar.len(), 25);
        assert_eq!(psar.last().unwrap().date, day.bars[24].date);
    }

    #[test]
    fn indicators_use_the_history_limit() {
        let series = daily_walk(2, 600);
        let mut config = RuntimeConfig::default();
        config.periods = vec![Period::Day];
        config.history_limit = 30;
        config.view_rows = 100;

        let view = build_view("X", &series, &config, None).unwrap();
        let day = &view.periods[0];
        assert_eq!(day.bars.len(), 30);
        // SMA-20 warms up within the trimmed history.
        assert!(day.sma_slow.rows[18].sma.is_none());
        assert!(day.sma_slow.rows[19].sma.is_some());
    }

    #[test]
    fn plain_mode_skips_levels() {
        let series = daily_walk(3, 200);
        let config = RuntimeConfig {
            plain: true,
            ..RuntimeConfig::default()
        };
        let view = build_view("X", &series, &config, None).unwrap();
        assert!(view.plain);
        assert!(view.periods.iter().all(|p| p.levels.is_none()));
    }

    #[test]
    fn short_timeframes_drop_the_sar_only() {
        // Six weeks of data: a single yearly bar.
        let series = daily_walk(4, 42);
        let config = RuntimeConfig::default();
        let view = build_view("X", &series, &config, None).unwrap();

        let year = view.period(Period::Year).unwrap();
        assert_eq!(year.bars.len(), 1);
        assert!(year.psar.is_none());
        assert!(year.sma_fast.rows[0].sma.is_none());

        assert!(view.period(Period::Day).unwrap().psar.is_some());
    }

    #[test]
    fn sar_can_be_disabled() {
        let series = daily_walk(5, 100);
        let config = RuntimeConfig {
            enable_psar: false,
            ..RuntimeConfig::default()
        };
        let view = build_view("X", &series, &config, None).unwrap();
        assert!(view.periods.iter().all(|p| p.psar.is_none()));
    }

    #[test]
    fn invalid_window_is_an_error() {
        let series = daily_walk(6, 50);
        let config = RuntimeConfig {
            sma_fast: 0,
            ..RuntimeConfig::default()
        };
        assert_eq!(
            build_view("X", &series, &config, None).unwrap_err(),
            IndicatorError::InvalidWindow
        );
    }

    #[test]
    fn empty_series_builds_empty_frames() {
        let series = BarSeries::default();
        let view = build_view("X", &series, &RuntimeConfig::default(), None).unwrap();
        assert_eq!(view.last_date, None);
        for pv in &view.periods {
            assert!(pv.bars.is_empty());
            assert!(pv.psar.is_none());
            assert_eq!(pv.levels.as_ref().map(|l| l.signals.len()), Some(0));
        }
    }

    #[test]
    fn hook_receives_every_step() {
        let series = daily_walk(7, 100);
        let mut config = RuntimeConfig::default();
        config.periods = vec![Period::Day, Period::Week];

        let steps: Mutex<Vec<String>> = Mutex::new(Vec::new());
        let hook = |step: &str, _elapsed: Duration| steps.lock().push(step.to_string());
        build_view("X", &series, &config, Some(&hook)).unwrap();

        let steps = steps.into_inner();
        assert_eq!(steps.len(), 10);
        assert!(steps.contains(&"resample:D".to_string()));
        assert!(steps.contains(&"sma7:W".to_string()));
        assert!(steps.contains(&"sma20:D".to_string()));
        assert!(steps.contains(&"bollinger:W".to_string()));
        assert!(steps.contains(&"psar:W".to_string()));
    }

    #[test]
    fn latest_rows_per_period() {
        let series = daily_walk(8, 300);
        let view = build_view("X", &series, &RuntimeConfig::default(), None).unwrap();
        let latest = view.latest();
        assert_eq!(latest.len(), view.periods.len());
        for (l, pv) in latest.iter().zip(&view.periods) {
            assert_eq!(l.period, pv.period);
            assert_eq!(l.bar, pv.bars.last().copied());
            assert_eq!(l.sma_fast.map(|r| r.date), l.bar.map(|b| b.date));
        }
    }
}
