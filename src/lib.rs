// =============================================================================
// ATS View: multi-timeframe technical indicator engine
// =============================================================================
//
// Daily OHLC bars are resampled to weekly, monthly, quarterly, half-yearly
// and yearly bars; each timeframe gets moving averages, Bollinger bands and
// a Parabolic SAR with trend and proximity signals, plus the support and
// resistance decisions derived from them.
// =============================================================================

pub mod api;
pub mod app_state;
pub mod ats_view;
pub mod indicators;
pub mod levels;
pub mod market_data;
pub mod runtime_config;
pub mod timeframe;
