// =============================================================================
// Resampler: daily bars into coarser periods
// =============================================================================
//
// open = first open, high = max high, low = min low, close = last close.
// Buckets are right-closed on the period's calendar boundary and each output
// bar carries the date of the last daily bar in its bucket.

use tracing::trace;

use crate::market_data::Bar;
use crate::timeframe::Period;

/// Aggregate `bars` (date-ascending) into one bar per `period`.
///
/// `Period::Day` returns a copy of the input. An empty input yields an empty
/// output; calendar gaps simply produce no bar for the missing periods.
pub fn resample(bars: &[Bar], period: Period) -> Vec<Bar> {
    if period == Period::Day {
        return bars.to_vec();
    }

    let mut out: Vec<Bar> = Vec::new();
    let mut current_end = None;

    for bar in bars {
        let end = period.bucket_end(bar.date);
        match out.last_mut() {
            Some(agg) if current_end == Some(end) => {
                agg.high = agg.high.max(bar.high);
                agg.low = agg.low.min(bar.low);
                agg.close = bar.close;
                agg.date = bar.date;
            }
            _ => {
                out.push(*bar);
                current_end = Some(end);
            }
        }
    }

    trace!(
        period = %period,
        input = bars.len(),
        output = out.len(),
        "resampled series"
    );
    out
}
