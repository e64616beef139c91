// =============================================================================
// Runtime Configuration: view settings with atomic save
// =============================================================================
//
// Every tunable of the multi-timeframe view lives here: which symbols to
// load, which timeframes to build, proximity tolerances per timeframe and the
// indicator windows.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// =============================================================================

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::indicators::bollinger::DEFAULT_DEV;
use crate::indicators::psar::SarParams;
use crate::timeframe::Period;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_symbols() -> Vec<String> {
    vec!["CAC40".to_string()]
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_periods() -> Vec<Period> {
    Period::ALL.to_vec()
}

fn default_distances() -> BTreeMap<Period, f64> {
    Period::ALL
        .iter()
        .map(|p| (*p, p.default_distance_pct()))
        .collect()
}

fn default_history_limit() -> usize {
    400
}

fn default_view_rows() -> usize {
    25
}

fn default_sma_fast() -> usize {
    7
}

fn default_sma_slow() -> usize {
    20
}

fn default_bollinger_dev() -> f64 {
    DEFAULT_DEV
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

// =============================================================================
// RuntimeConfig
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Symbols to load; each maps to `<data_dir>/<symbol>.csv`.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Timeframes to build, in display order.
    #[serde(default = "default_periods")]
    pub periods: Vec<Period>,

    /// Proximity tolerance (percent) per timeframe.
    #[serde(default = "default_distances")]
    pub distances: BTreeMap<Period, f64>,

    /// Bars kept per timeframe before computing indicators.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Rows kept per frame for display consumers.
    #[serde(default = "default_view_rows")]
    pub view_rows: usize,

    #[serde(default = "default_sma_fast")]
    pub sma_fast: usize,

    #[serde(default = "default_sma_slow")]
    pub sma_slow: usize,

    /// Bollinger band multiplier.
    #[serde(default = "default_bollinger_dev")]
    pub bollinger_dev: f64,

    #[serde(default = "default_true")]
    pub enable_psar: bool,

    #[serde(default)]
    pub psar: SarParams,

    /// Skip level signals entirely.
    #[serde(default)]
    pub plain: bool,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            data_dir: default_data_dir(),
            periods: default_periods(),
            distances: default_distances(),
            history_limit: default_history_limit(),
            view_rows: default_view_rows(),
            sma_fast: default_sma_fast(),
            sma_slow: default_sma_slow(),
            bollinger_dev: default_bollinger_dev(),
            enable_psar: true,
            psar: SarParams::default(),
            plain: false,
            bind_addr: default_bind_addr(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            periods = ?config.periods,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Apply `ATS_SYMBOLS`, `ATS_DATA_DIR` and `ATS_BIND_ADDR` through a
    /// lookup function (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("ATS_SYMBOLS") {
            let symbols: Vec<String> = raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if symbols.is_empty() {
                warn!(value = %raw, "ATS_SYMBOLS is empty, keeping configured symbols");
            } else {
                self.symbols = symbols;
            }
        }
        if let Some(dir) = lookup("ATS_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(addr) = lookup("ATS_BIND_ADDR") {
            self.bind_addr = addr;
        }
    }

    /// Tolerance (percent) for `period`, falling back to the built-in table
    /// when the config omits it.
    pub fn distance_for(&self, period: Period) -> f64 {
        self.distances
            .get(&period)
            .copied()
            .unwrap_or_else(|| period.default_distance_pct())
    }

    /// CSV path of `symbol`.
    pub fn data_path(&self, symbol: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", symbol))
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.periods, Period::ALL.to_vec());
        assert_eq!(cfg.history_limit, 400);
        assert_eq!(cfg.view_rows, 25);
        assert_eq!(cfg.sma_fast, 7);
        assert_eq!(cfg.sma_slow, 20);
        assert!((cfg.bollinger_dev - 2.0).abs() < f64::EPSILON);
        assert!(cfg.enable_psar);
        assert!(!cfg.plain);
        assert!((cfg.distance_for(Period::Day) - 0.3).abs() < f64::EPSILON);
        assert!((cfg.distance_for(Period::Week) - 0.5).abs() < f64::EPSILON);
        assert!((cfg.distance_for(Period::Year) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, RuntimeConfig::default());
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "symbols": ["DAX"], "periods": ["D", "W"], "distances": { "D": 0.8 } }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.symbols, vec!["DAX"]);
        assert_eq!(cfg.periods, vec![Period::Day, Period::Week]);
        assert!((cfg.distance_for(Period::Day) - 0.8).abs() < f64::EPSILON);
        // Missing entries fall back to the built-in table.
        assert!((cfg.distance_for(Period::Quarter) - 1.0).abs() < f64::EPSILON);
        assert_eq!(cfg.history_limit, 400);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtime_config.json");

        let mut cfg = RuntimeConfig::default();
        cfg.symbols = vec!["SPX".to_string()];
        cfg.plain = true;
        cfg.save(&path).unwrap();

        assert!(!path.with_extension("json.tmp").exists());
        let loaded = RuntimeConfig::load(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn load_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RuntimeConfig::load(dir.path().join("nope.json")).is_err());
    }

    #[test]
    fn environment_overrides() {
        let mut cfg = RuntimeConfig::default();
        cfg.apply_overrides(|key| match key {
            "ATS_SYMBOLS" => Some("CAC40, DAX ,,SPX".to_string()),
            "ATS_DATA_DIR" => Some("/srv/quotes".to_string()),
            _ => None,
        });
        assert_eq!(cfg.symbols, vec!["CAC40", "DAX", "SPX"]);
        assert_eq!(cfg.data_dir, PathBuf::from("/srv/quotes"));
        assert_eq!(cfg.bind_addr, "0.0.0.0:3000");
        assert_eq!(cfg.data_path("DAX"), PathBuf::from("/srv/quotes/DAX.csv"));
    }

    #[test]
    fn blank_symbol_override_is_ignored() {
        let mut cfg = RuntimeConfig::default();
        cfg.apply_overrides(|key| (key == "ATS_SYMBOLS").then(|| " , ".to_string()));
        assert_eq!(cfg.symbols, default_symbols());
    }
}
