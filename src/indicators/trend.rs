// =============================================================================
// Trend Classifier
// =============================================================================
//
// Shared by the moving-average and Bollinger indicators.  Given any series
// V (a moving average, a band boundary) each point gets:
//
//   label[i] = Rising  if V[i] > V[i-1]
//              Falling otherwise (ties included)
//
// and, using the labels one step before (prev) and after (next):
//
//   up     = label Rising  AND (prev Rising  OR next Rising)
//   dn     = label Falling AND (prev Falling OR next Falling)
//   up_rev = (label Falling AND next Rising)  OR (label Rising  AND prev Falling)
//   dn_rev = (label Rising  AND next Falling) OR (label Falling AND prev Rising)
//
// `next` is a look-ahead: the last point of any series has no successor yet
// and is always left unclassified.  Consumers wanting the "current" state
// must read the last classified point, one before the end.
// =============================================================================

use serde::{Deserialize, Serialize};

/// Direction of a value relative to its immediate predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrendLabel {
    Rising,
    Falling,
}

impl std::fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rising => write!(f, "RISING"),
            Self::Falling => write!(f, "FALLING"),
        }
    }
}

/// Single role of a point within its local trend segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentRole {
    ContinuationUp,
    ContinuationDown,
    ReversalUp,
    ReversalDown,
    #[default]
    None,
}

/// The four gating flags used by the annotation layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendSignals {
    pub up: bool,
    pub dn: bool,
    pub up_rev: bool,
    pub dn_rev: bool,
}

impl TrendSignals {
    pub fn any(&self) -> bool {
        self.up || self.dn || self.up_rev || self.dn_rev
    }
}

/// Classification of one point of a series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub label: Option<TrendLabel>,
    #[serde(flatten)]
    pub signals: TrendSignals,
    /// The flags collapsed into a single role.
    #[serde(default)]
    pub role: SegmentRole,
}

impl TrendPoint {
    pub fn new(label: Option<TrendLabel>, signals: TrendSignals) -> Self {
        Self {
            label,
            signals,
            role: role_of(label, signals),
        }
    }
}

/// Collapse the flags into at most one role.
///
/// Reversals take precedence over continuations.  When both reversal
/// flags hold (a one-point spike or dip) the point itself is the
/// extremum: a Falling point is a trough, a Rising point a peak.
fn role_of(label: Option<TrendLabel>, s: TrendSignals) -> SegmentRole {
    match (s.up_rev, s.dn_rev) {
        (true, true) => match label {
            Some(TrendLabel::Falling) => SegmentRole::ReversalUp,
            Some(TrendLabel::Rising) => SegmentRole::ReversalDown,
            None => SegmentRole::None,
        },
        (true, false) => SegmentRole::ReversalUp,
        (false, true) => SegmentRole::ReversalDown,
        (false, false) if s.up => SegmentRole::ContinuationUp,
        (false, false) if s.dn => SegmentRole::ContinuationDown,
        _ => SegmentRole::None,
    }
}

/// Label each point against its predecessor.
///
/// Undefined at index 0 and wherever either value is undefined.
pub fn label_series(values: &[Option<f64>]) -> Vec<Option<TrendLabel>> {
    (0..values.len())
        .map(|i| {
            if i == 0 {
                return None;
            }
            match (values[i], values[i - 1]) {
                (Some(cur), Some(prev)) if cur > prev => Some(TrendLabel::Rising),
                (Some(_), Some(_)) => Some(TrendLabel::Falling),
                _ => None,
            }
        })
        .collect()
}

/// Classify every point of `values`.  The output is aligned 1:1 with the
/// input.
pub fn classify(values: &[Option<f64>]) -> Vec<TrendPoint> {
    let labels = label_series(values);
    let n = labels.len();

    (0..n)
        .map(|i| {
            let label = labels[i];
            // No successor: the look-ahead is unknown.
            if i + 1 >= n {
                return TrendPoint::new(label, TrendSignals::default());
            }
            let prev = if i > 0 { labels[i - 1] } else { None };
            let next = labels[i + 1];
            TrendPoint::new(label, signals_for(label, prev, next))
        })
        .collect()
}

fn signals_for(
    label: Option<TrendLabel>,
    prev: Option<TrendLabel>,
    next: Option<TrendLabel>,
) -> TrendSignals {
    use TrendLabel::{Falling, Rising};

    let Some(label) = label else {
        return TrendSignals::default();
    };
    let rising = label == Rising;
    let falling = label == Falling;

    TrendSignals {
        up: rising && (prev == Some(Rising) || next == Some(Rising)),
        dn: falling && (prev == Some(Falling) || next == Some(Falling)),
        up_rev: (falling && next == Some(Rising)) || (rising && prev == Some(Falling)),
        dn_rev: (rising && next == Some(Falling)) || (falling && prev == Some(Rising)),
    }
}

/// Index of the most recent point that can carry a classification (the
/// point before the last), if any.
pub fn last_classified_index(len: usize) -> Option<usize> {
    len.checked_sub(2)
}
