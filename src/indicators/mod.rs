// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free indicator computations over daily or resampled bars.
// Every frame is aligned 1:1 with the bars it was computed on; values that
// cannot be computed yet (warm-up, missing history) are `None`.

pub mod error;
pub mod frame;
pub mod non_finite;
pub mod rolling;
pub mod trend;
pub mod sma;
pub mod bollinger;
pub mod psar;

pub use error::IndicatorError;
pub use frame::IndicatorFrame;
pub use trend::{SegmentRole, TrendLabel, TrendPoint, TrendSignals};
