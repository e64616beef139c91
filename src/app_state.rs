// =============================================================================
// Central Application State
// =============================================================================
//
// Shared by the precompute tasks and the REST API via `Arc<AppState>`.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock for the config and the view cache.
//   - Views are stored behind `Arc` so readers never clone a full view while
//     holding the lock.
//   - Each cached view remembers the modification time and length of its CSV
//     file; a lookup that finds the file changed rebuilds the view.
// =============================================================================

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ats_view::{build_view, AtsView};
use crate::indicators::IndicatorError;
use crate::market_data::load_csv;
use crate::runtime_config::RuntimeConfig;

// =============================================================================
// Error Record
// =============================================================================

/// A recorded error event for the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    pub symbol: Option<String>,
    /// ISO 8601 timestamp.
    pub at: String,
}

// =============================================================================
// ViewError
// =============================================================================

/// Why a view could not be produced for a symbol.
#[derive(Debug)]
pub enum ViewError {
    /// No data file exists for the symbol.
    NotFound(String),
    /// The data file exists but could not be read or parsed.
    Load(anyhow::Error),
    /// The configured indicator settings are invalid.
    Indicator(IndicatorError),
}

impl std::fmt::Display for ViewError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(symbol) => write!(f, "no data for symbol {}", symbol),
            Self::Load(e) => write!(f, "failed to load data: {:#}", e),
            Self::Indicator(e) => write!(f, "indicator error: {}", e),
        }
    }
}

impl std::error::Error for ViewError {}

impl From<IndicatorError> for ViewError {
    fn from(e: IndicatorError) -> Self {
        Self::Indicator(e)
    }
}

// =============================================================================
// Cached views
// =============================================================================

/// Identity of a data file at the moment its view was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SourceStamp {
    modified: Option<SystemTime>,
    len: u64,
}

impl SourceStamp {
    fn of(path: &Path) -> Option<Self> {
        let meta = std::fs::metadata(path).ok()?;
        Some(Self {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }
}

pub struct CachedView {
    pub view: Arc<AtsView>,
    source: Option<SourceStamp>,
}

// =============================================================================
// AppState
// =============================================================================

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

pub struct AppState {
    /// Incremented on every view update.
    pub state_version: AtomicU64,

    pub runtime_config: Arc<RwLock<RuntimeConfig>>,

    /// Latest full (non-plain) view per symbol.
    pub views: RwLock<HashMap<String, CachedView>>,

    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    /// Instant when the service was started. Used for uptime calculations.
    pub start_time: std::time::Instant,
}

/// Payload of the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub state_version: u64,
    pub symbols_loaded: Vec<String>,
    pub recent_errors: Vec<ErrorRecord>,
    pub server_time: i64,
}

impl AppState {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            runtime_config: Arc::new(RwLock::new(config)),
            views: RwLock::new(HashMap::new()),
            recent_errors: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an error message.  The ring buffer is capped at
    /// [`MAX_RECENT_ERRORS`]; oldest entries are evicted first.
    pub fn push_error(&self, msg: String, symbol: Option<&str>) {
        let record = ErrorRecord {
            message: msg,
            symbol: symbol.map(str::to_string),
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
    }

    // ── Views ───────────────────────────────────────────────────────────

    fn store_view(&self, view: AtsView, source: Option<SourceStamp>) -> Arc<AtsView> {
        let view = Arc::new(view);
        self.views.write().insert(
            view.symbol.clone(),
            CachedView {
                view: Arc::clone(&view),
                source,
            },
        );
        self.increment_version();
        view
    }

    pub fn cached_view(&self, symbol: &str) -> Option<Arc<AtsView>> {
        self.views.read().get(symbol).map(|c| Arc::clone(&c.view))
    }

    /// Cached view of `symbol`, if its data file is unchanged since it was built.
    fn fresh_view(&self, symbol: &str, path: &Path) -> Option<Arc<AtsView>> {
        let current = SourceStamp::of(path)?;
        let views = self.views.read();
        let cached = views.get(symbol)?;
        if cached.source == Some(current) {
            Some(Arc::clone(&cached.view))
        } else {
            debug!(symbol, "data file changed, view is stale");
            None
        }
    }

    /// Load `symbol` from disk and build its view with `config`.
    ///
    /// Blocking: call from `spawn_blocking` inside async code.
    pub fn compute_view(config: &RuntimeConfig, symbol: &str) -> Result<AtsView, ViewError> {
        let path = config.data_path(symbol);
        if !path.is_file() {
            return Err(ViewError::NotFound(symbol.to_string()));
        }
        let series = load_csv(&path).map_err(ViewError::Load)?;
        Ok(build_view(symbol, &series, config, None)?)
    }

    /// Rebuild and cache the full view of `symbol`.  Failures are recorded
    /// in the error log as well as returned.
    pub fn refresh_symbol(&self, symbol: &str) -> Result<Arc<AtsView>, ViewError> {
        let config = {
            let mut cfg = self.runtime_config.read().clone();
            cfg.plain = false;
            cfg
        };
        // Stamp before reading so a write racing the load is seen next time.
        let source = SourceStamp::of(&config.data_path(symbol));
        match Self::compute_view(&config, symbol) {
            Ok(view) => {
                info!(symbol, periods = view.periods.len(), "view cached");
                Ok(self.store_view(view, source))
            }
            Err(e) => {
                warn!(symbol, error = %e, "view refresh failed");
                if matches!(e, ViewError::NotFound(_))
                    && self.views.write().remove(symbol).is_some()
                {
                    self.increment_version();
                }
                self.push_error(e.to_string(), Some(symbol));
                Err(e)
            }
        }
    }

    /// Full view from the cache, rebuilt on first request and whenever the
    /// symbol's data file has changed since it was cached.  Plain views are
    /// computed on demand and never cached.
    pub fn view_for(&self, symbol: &str, plain: bool) -> Result<Arc<AtsView>, ViewError> {
        if plain {
            let config = RuntimeConfig {
                plain: true,
                ..self.runtime_config.read().clone()
            };
            return Self::compute_view(&config, symbol).map(Arc::new);
        }
        let path = self.runtime_config.read().data_path(symbol);
        match self.fresh_view(symbol, &path) {
            Some(view) => Ok(view),
            None => self.refresh_symbol(symbol),
        }
    }

    pub fn health(&self) -> HealthSnapshot {
        let mut symbols_loaded: Vec<String> = self.views.read().keys().cloned().collect();
        symbols_loaded.sort();
        HealthSnapshot {
            status: "ok",
            uptime_secs: self.start_time.elapsed().as_secs(),
            state_version: self.current_state_version(),
            symbols_loaded,
            recent_errors: self.recent_errors.read().clone(),
            server_time: Utc::now().timestamp_millis(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &std::path::Path, symbol: &str, days: usize) {
        let mut file = std::fs::File::create(dir.join(format!("{}.csv", symbol))).unwrap();
        writeln!(file, "Date,Open,High,Low,Close,Volume").unwrap();
        let start = chrono::NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        for i in 0..days {
            let date = start + chrono::Duration::days(i as i64);
            let c = 100.0 + (i % 9) as f64;
            writeln!(file, "{},{},{},{},{},0", date, c, c + 1.0, c - 1.0, c).unwrap();
        }
    }

    fn state_with(dir: &std::path::Path) -> AppState {
        AppState::new(RuntimeConfig {
            data_dir: dir.to_path_buf(),
            symbols: vec!["AAA".to_string()],
            ..RuntimeConfig::default()
        })
    }

    #[test]
    fn refresh_caches_full_view() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "AAA", 120);
        let state = state_with(dir.path());

        let v0 = state.current_state_version();
        let view = state.refresh_symbol("AAA").unwrap();
        assert_eq!(view.symbol, "AAA");
        assert!(!view.plain);
        assert_eq!(state.current_state_version(), v0 + 1);
        assert!(state.cached_view("AAA").is_some());
        assert_eq!(state.health().symbols_loaded, vec!["AAA"]);
    }

    #[test]
    fn plain_views_are_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "AAA", 60);
        let state = state_with(dir.path());

        let view = state.view_for("AAA", true).unwrap();
        assert!(view.plain);
        assert!(view.periods.iter().all(|p| p.levels.is_none()));
        assert!(state.cached_view("AAA").is_none());

        let full = state.view_for("AAA", false).unwrap();
        assert!(!full.plain);
        assert!(state.cached_view("AAA").is_some());
    }

    #[test]
    fn rewritten_file_invalidates_cached_view() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "AAA", 60);
        let state = state_with(dir.path());

        let first = state.view_for("AAA", false).unwrap();
        let again = state.view_for("AAA", false).unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        write_csv(dir.path(), "AAA", 90);
        let second = state.view_for("AAA", false).unwrap();
        assert_ne!(second.last_date, first.last_date);
        assert_eq!(second.last_date, state.view_for("AAA", true).unwrap().last_date);
        assert!(Arc::ptr_eq(&second, &state.cached_view("AAA").unwrap()));
    }

    #[test]
    fn deleted_file_drops_to_not_found() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "AAA", 60);
        let state = state_with(dir.path());
        state.view_for("AAA", false).unwrap();

        std::fs::remove_file(dir.path().join("AAA.csv")).unwrap();
        assert!(matches!(
            state.view_for("AAA", false),
            Err(ViewError::NotFound(_))
        ));
        assert!(state.cached_view("AAA").is_none());
    }

    #[test]
    fn missing_symbol_is_not_found_and_logged() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(dir.path());

        let err = state.refresh_symbol("NOPE").unwrap_err();
        assert!(matches!(err, ViewError::NotFound(ref s) if s == "NOPE"));
        let health = state.health();
        assert_eq!(health.recent_errors.len(), 1);
        assert_eq!(health.recent_errors[0].symbol.as_deref(), Some("NOPE"));
    }

    #[test]
    fn unreadable_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("BAD.csv"), "Date,Open\n2024-01-01,1\n").unwrap();
        let state = state_with(dir.path());
        assert!(matches!(state.refresh_symbol("BAD"), Err(ViewError::Load(_))));
    }

    #[test]
    fn error_log_is_capped() {
        let state = AppState::new(RuntimeConfig::default());
        for i in 0..(MAX_RECENT_ERRORS + 5) {
            state.push_error(format!("e{}", i), None);
        }
        let errors = state.recent_errors.read();
        assert_eq!(errors.len(), MAX_RECENT_ERRORS);
        assert_eq!(errors[0].message, "e5");
    }
}
