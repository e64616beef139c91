// =============================================================================
// Chart periods (timeframes)
// =============================================================================
//
// The multi-timeframe view is built from a single daily series resampled into
// coarser periods.  Each period knows the calendar boundary that closes it;
// the resampler groups daily bars by that boundary.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Chart period, from the raw daily series up to yearly bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "D")]
    Day,
    #[serde(rename = "W")]
    Week,
    #[serde(rename = "1M")]
    Month,
    #[serde(rename = "Q")]
    Quarter,
    /// Calendar half-year, January to June and July to December.
    #[serde(rename = "2Q")]
    HalfYear,
    #[serde(rename = "Y")]
    Year,
}

/// Error parsing a period code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePeriodError(pub String);

impl std::fmt::Display for ParsePeriodError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid period '{}' (expected D, W, 1M, Q, 2Q or Y)", self.0)
    }
}

impl std::error::Error for ParsePeriodError {}

impl std::str::FromStr for Period {
    type Err = ParsePeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "D" | "1D" => Ok(Self::Day),
            "W" | "1W" => Ok(Self::Week),
            "M" | "1M" => Ok(Self::Month),
            "Q" | "1Q" => Ok(Self::Quarter),
            "2Q" => Ok(Self::HalfYear),
            "Y" | "1Y" => Ok(Self::Year),
            _ => Err(ParsePeriodError(s.to_string())),
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl Period {
    /// Every period, in display order.
    pub const ALL: [Period; 6] = [
        Period::Day,
        Period::Week,
        Period::Month,
        Period::Quarter,
        Period::HalfYear,
        Period::Year,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::Day => "D",
            Self::Week => "W",
            Self::Month => "1M",
            Self::Quarter => "Q",
            Self::HalfYear => "2Q",
            Self::Year => "Y",
        }
    }

    /// Default proximity tolerance (percent) used when judging whether price
    /// sits close enough to an indicator to mark a support or resistance.
    pub fn default_distance_pct(&self) -> f64 {
        match self {
            Self::Day => 0.3,
            Self::Week => 0.5,
            Self::Month | Self::Quarter | Self::HalfYear => 1.0,
            Self::Year => 5.0,
        }
    }

    /// Calendar date closing the period that contains `date`.
    ///
    /// Weeks run Monday to Sunday and close on Sunday; half-years close on
    /// 30 June and 31 December.
    ///
    /// All boundaries are calendar-anchored and independent of where the
    /// history starts.  In particular half-years do not shift to Mar/Sep
    /// when the first bar falls in Q1 or Q3, unlike a two-quarter resampler
    /// anchored on the first quarter end of the data.
    pub fn bucket_end(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Self::Day => date,
            Self::Week => {
                let to_sunday = 6 - date.weekday().num_days_from_monday() as i64;
                date + Duration::days(to_sunday)
            }
            Self::Month => month_end(date.year(), date.month()),
            Self::Quarter => {
                let last_month = ((date.month() - 1) / 3 + 1) * 3;
                month_end(date.year(), last_month)
            }
            Self::HalfYear => {
                let last_month = if date.month() <= 6 { 6 } else { 12 };
                month_end(date.year(), last_month)
            }
            Self::Year => month_end(date.year(), 12),
        }
    }
}

/// Last calendar day of `month` in `year`.
fn month_end(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}
