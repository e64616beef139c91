// =============================================================================
// Indicator errors
// =============================================================================
//
// Insufficient history inside a rolling window is NOT an error: those fields
// are simply `None`.  These variants cover the cases where an indicator cannot
// produce any output at all.

/// Failure to compute an indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorError {
    /// The recurrence needs `needed` bars to initialise, only `got` were given.
    InsufficientHistory { needed: usize, got: usize },
    /// A rolling window of zero bars was requested.
    InvalidWindow,
}

impl std::fmt::Display for IndicatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientHistory { needed, got } => {
                write!(f, "insufficient history: need {needed} bars, got {got}")
            }
            Self::InvalidWindow => write!(f, "window must be at least 1 bar"),
        }
    }
}

impl std::error::Error for IndicatorError {}
