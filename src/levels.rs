// =============================================================================
// Support / Resistance Level Signals
// =============================================================================
//
// Decides which support and resistance markers apply to one timeframe.  No
// rendering happens here; callers receive the marker price and a short label.
//
// Moving averages:
//   support     = trend `up` at the last classified row
//                 AND |dist_low|  < distance at the latest row
//   resistance  = trend `dn` at the last classified row
//                 AND |dist_high| < distance at the latest row
//
// Parabolic SAR:
//   support     = psar_bull_prev defined AND |dist_psar| < distance
//
// Pivot lines ("O" = closes 8 and 7 bars back, "J" = 21 and 20 bars back)
// are active when the latest close sits strictly between the two closes.
//
// Marker prices sit `distance` percent beyond the level: below it for
// support, above it for resistance.
// =============================================================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::indicators::psar::PsarFrame;
use crate::indicators::sma::SmaFrame;
use crate::market_data::Bar;

/// Which side of price a level sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LevelKind {
    Support,
    Resistance,
}

impl std::fmt::Display for LevelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Support => write!(f, "support"),
            Self::Resistance => write!(f, "resistance"),
        }
    }
}

/// Indicator a level comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelSource {
    Sma { window: usize },
    Psar,
}

impl std::fmt::Display for LevelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sma { window } => write!(f, "M{}", window),
            Self::Psar => write!(f, "P"),
        }
    }
}

/// A support or resistance marker for the latest bar of a timeframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSignal {
    pub source: LevelSource,
    pub kind: LevelKind,
    pub date: NaiveDate,
    /// Indicator value the level sits on.
    pub value: f64,
    /// Measured distance (percent) that passed the tolerance.
    pub distance_pct: f64,
    /// Tolerance (percent) of the timeframe.
    pub tolerance_pct: f64,
    /// Where the marker is drawn.
    pub marker_price: f64,
    pub label: Option<String>,
}

/// Named pivot pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PivotKind {
    #[serde(rename = "O")]
    Oggy,
    #[serde(rename = "J")]
    Jack,
}

impl PivotKind {
    pub const ALL: [PivotKind; 2] = [PivotKind::Oggy, PivotKind::Jack];

    /// How many bars back (counting the latest as 1) the first close of the
    /// pair sits.  The second close is one bar later.
    pub fn lookback(&self) -> usize {
        match self {
            Self::Oggy => 8,
            Self::Jack => 21,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Oggy => "O",
            Self::Jack => "J",
        }
    }
}

/// One horizontal line, drawn from `from` up to the latest bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotLine {
    pub from: NaiveDate,
    pub price: f64,
}

/// A pivot pair and whether the latest close sits between its two closes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotPair {
    pub kind: PivotKind,
    pub first: PivotLine,
    pub second: PivotLine,
    pub last_close: f64,
    pub active: bool,
}

/// All level decisions for one timeframe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelReport {
    pub signals: Vec<LevelSignal>,
    pub pivots: Vec<PivotPair>,
}

impl LevelReport {
    pub fn supports(&self) -> impl Iterator<Item = &LevelSignal> {
        self.signals.iter().filter(|s| s.kind == LevelKind::Support)
    }

    pub fn resistances(&self) -> impl Iterator<Item = &LevelSignal> {
        self.signals.iter().filter(|s| s.kind == LevelKind::Resistance)
    }

    pub fn active_pivots(&self) -> impl Iterator<Item = &PivotPair> {
        self.pivots.iter().filter(|p| p.active)
    }
}

/// Price a marker is drawn at for a level `value`.
pub fn marker_price(value: f64, kind: LevelKind, distance_pct: f64) -> f64 {
    match kind {
        LevelKind::Support => value * (1.0 - distance_pct / 100.0),
        LevelKind::Resistance => value * (1.0 + distance_pct / 100.0),
    }
}

/// Support/resistance on a moving average of `window` bars.
pub fn sma_levels(frame: &SmaFrame, window: usize, distance_pct: f64) -> Vec<LevelSignal> {
    let mut out = Vec::new();
    let (Some(gate), Some(latest)) = (frame.last_classified(), frame.last()) else {
        return out;
    };
    let Some(sma) = latest.sma else {
        return out;
    };

    let candidates = [
        (gate.trend.signals.up, latest.dist_low, LevelKind::Support),
        (gate.trend.signals.dn, latest.dist_high, LevelKind::Resistance),
    ];
    for (gated, dist, kind) in candidates {
        let Some(dist) = dist else { continue };
        if gated && dist.abs() < distance_pct {
            out.push(LevelSignal {
                source: LevelSource::Sma { window },
                kind,
                date: latest.date,
                value: sma,
                distance_pct: dist,
                tolerance_pct: distance_pct,
                marker_price: marker_price(sma, kind, distance_pct),
                label: None,
            });
        }
    }
    out
}

/// Support on the previous bar's bullish SAR.
pub fn psar_support(frame: &PsarFrame, distance_pct: f64) -> Option<LevelSignal> {
    let latest = frame.last()?;
    let bull = latest.psar_bull_prev?;
    let dist = latest.dist_psar?;
    if dist.abs() >= distance_pct {
        return None;
    }
    Some(LevelSignal {
        source: LevelSource::Psar,
        kind: LevelKind::Support,
        date: latest.date,
        value: bull,
        distance_pct: dist,
        tolerance_pct: distance_pct,
        marker_price: marker_price(bull, LevelKind::Support, distance_pct),
        label: Some(format!("P {:.1}%", dist)),
    })
}

/// Pivot pair of `kind`, or `None` when `bars` is too short.
pub fn pivot_pair(bars: &[Bar], kind: PivotKind) -> Option<PivotPair> {
    let n = bars.len();
    let back = kind.lookback();
    if n < back {
        return None;
    }
    let a = &bars[n - back];
    let b = &bars[n - back + 1];
    let last = bars[n - 1].close;

    let (lo, hi) = (a.close.min(b.close), a.close.max(b.close));
    Some(PivotPair {
        kind,
        first: PivotLine {
            from: a.date,
            price: a.close,
        },
        second: PivotLine {
            from: b.date,
            price: b.close,
        },
        last_close: last,
        active: lo < last && last < hi,
    })
}

/// Inputs for one timeframe.
pub struct LevelInputs<'a> {
    pub bars: &'a [Bar],
    pub sma_fast: (&'a SmaFrame, usize),
    pub sma_slow: (&'a SmaFrame, usize),
    pub psar: Option<&'a PsarFrame>,
    pub distance_pct: f64,
}

/// Evaluate every level rule for one timeframe.
pub fn evaluate(inputs: &LevelInputs<'_>) -> LevelReport {
    let mut signals = Vec::new();
    for (frame, window) in [inputs.sma_fast, inputs.sma_slow] {
        signals.extend(sma_levels(frame, window, inputs.distance_pct));
    }
    if let Some(frame) = inputs.psar {
        signals.extend(psar_support(frame, inputs.distance_pct));
    }

    let pivots = PivotKind::ALL
        .iter()
        .filter_map(|&kind| pivot_pair(inputs.bars, kind))
        .collect();

    LevelReport { signals, pivots }
}
