pub mod bar_series;
pub mod loader;
pub mod resample;

// Re-export the bar types for convenient access (e.g. `use crate::market_data::Bar`).
pub use bar_series::{Bar, BarSeries, SeriesError};
pub use loader::load_csv;
pub use resample::resample;
