// =============================================================================
// ATS View: Main Entry Point
// =============================================================================
//
// Loads the configured symbols, precomputes their multi-timeframe views in
// parallel and serves them over the REST API until Ctrl+C.
// =============================================================================

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ats_view::api;
use ats_view::app_state::AppState;
use ats_view::runtime_config::RuntimeConfig;

const CONFIG_PATH: &str = "runtime_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("ATS View starting up");

    let mut config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    config.apply_overrides(|key| std::env::var(key).ok());

    info!(
        symbols = ?config.symbols,
        data_dir = %config.data_dir.display(),
        periods = ?config.periods,
        plain = config.plain,
        "Configured symbols"
    );

    // ── 2. Build shared state ────────────────────────────────────────────
    let bind_addr = config.bind_addr.clone();
    let symbols = config.symbols.clone();
    let state = Arc::new(AppState::new(config));

    // ── 3. Precompute views, one blocking task per symbol ────────────────
    let mut tasks = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let st = state.clone();
        tasks.push(tokio::task::spawn_blocking(move || {
            let result = st.refresh_symbol(&symbol);
            (symbol, result)
        }));
    }

    let mut ready = 0usize;
    for task in tasks {
        match task.await {
            Ok((symbol, Ok(view))) => {
                ready += 1;
                let signals: usize = view
                    .periods
                    .iter()
                    .filter_map(|p| p.levels.as_ref())
                    .map(|l| l.signals.len())
                    .sum();
                info!(symbol = %symbol, last_date = ?view.last_date, signals, "View ready");
            }
            Ok((symbol, Err(e))) => {
                error!(symbol = %symbol, error = %e, "View precompute failed");
            }
            Err(e) => {
                error!(error = %e, "Precompute task panicked");
            }
        }
    }
    info!(ready, "Precompute finished");

    // ── 4. Start the API server ──────────────────────────────────────────
    let app = api::rest::router(state.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {}", bind_addr))?;
    info!(addr = %bind_addr, "API server listening. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl+C");
            }
            warn!("Shutdown signal received, stopping gracefully");
        })
        .await
        .context("API server failed")?;

    info!("ATS View shut down complete.");
    Ok(())
}
