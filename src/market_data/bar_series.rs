use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single daily (or resampled) OHLC bar.
///
/// `high >= max(open, close)` and `low <= min(open, close)` are assumed to
/// hold for market data; nothing in the engine enforces it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
        }
    }

    /// Typical price: `(low + high + close) / 3`.
    pub fn typical_price(&self) -> f64 {
        (self.low + self.high + self.close) / 3.0
    }
}

/// Rejection reasons for a bar sequence that is not strictly ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesError {
    /// `bars[index].date` is not strictly after `bars[index - 1].date`.
    NotAscending { index: usize, date: NaiveDate },
}

impl std::fmt::Display for SeriesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAscending { index, date } => write!(
                f,
                "bar {index} dated {date} is not strictly after its predecessor"
            ),
        }
    }
}

impl std::error::Error for SeriesError {}

// ---------------------------------------------------------------------------
// BarSeries -- validated, immutable, date-ascending sequence
// ---------------------------------------------------------------------------

/// An ordered OHLC series, strictly increasing by date with no duplicates.
///
/// The series is owned by the caller; indicators borrow it as `&[Bar]` and
/// build their own output, so the same series can feed several indicators
/// (or several threads) at once.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Build a series, rejecting any bar that is not strictly after the
    /// previous one.
    pub fn new(bars: Vec<Bar>) -> Result<Self, SeriesError> {
        for (index, pair) in bars.windows(2).enumerate() {
            if pair[1].date <= pair[0].date {
                return Err(SeriesError::NotAscending {
                    index: index + 1,
                    date: pair[1].date,
                });
            }
        }
        Ok(Self { bars })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Close prices in series order.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

/// The most recent `count` items of a slice (oldest-first order).
pub fn tail<T>(items: &[T], count: usize) -> &[T] {
    let start = items.len().saturating_sub(count);
    &items[start..]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
