//! Theta Engine - Main Entry Point
//!
//! Runs decision cycles against the market snapshot on an interval and
//! writes every cycle's decisions to the output directory.

use theta_engine::*;
use theta_engine::{
    calendar::CachedCalendar,
    feeds::SnapshotFeed,
    orchestrator::{CycleRunner, CycleSources},
    storage::JsonlDecisionSink,
    utils::SessionStats,
};
use anyhow::Result;
use chrono::Local;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let config = CONFIG.clone();

    // Initialize logging
    let _logging_guard = utils::setup_logging(&config.output_dir)?;
    utils::setup_output_directories(&config.output_dir)?;

    info!("🧭 Theta Engine v{} - Regime-Aware Option Premium Lifecycle", env!("CARGO_PKG_VERSION"));
    info!("📋 Configuration:");
    info!("   Symbols: {}", config.symbols.join(", "));
    info!("   Sides: {}", config.sides().iter().map(|s| s.label()).collect::<Vec<_>>().join("/"));
    info!("   VIX thresholds: low {} / high {} / pause {}",
        config.regime.low_vol_threshold,
        config.regime.high_vol_threshold,
        config.regime.pause_threshold
    );
    info!("   Profit target: {}% | Roll at {} DTE | Target {} DTE",
        config.policy.profit_target_ratio * rust_decimal_macros::dec!(100),
        config.policy.roll_dte_threshold,
        config.policy.target_dte
    );
    info!("   Base delta: {:.2} | Base cap: {} contracts", config.policy.base_delta, config.policy.base_position_cap);
    info!("   Snapshot: {} (max age {}s)", config.snapshot_path, config.max_snapshot_age_secs);
    info!("   Cycle interval: {}s", config.cycle_interval_secs);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("❌ {}", e);
        return Err(e.into());
    }

    // Initialize components
    let feed = Arc::new(
        SnapshotFeed::new(&config.snapshot_path)
            .with_max_age(Duration::from_secs(config.max_snapshot_age_secs)),
    );
    let calendar = Arc::new(CachedCalendar::new(feed.clone()));
    let sources = CycleSources {
        market: feed.clone(),
        calendar: calendar.clone(),
        chains: feed.clone(),
        positions: feed.clone(),
    };
    let runner = CycleRunner::from_config(&config, sources);
    let sink = JsonlDecisionSink::new(&config.output_dir);
    let circuit_breaker = errors::CircuitBreaker::from_config(&config);

    let start_time = Instant::now();
    let mut stats = SessionStats::default();

    info!("\n🚀 Starting decision loop...\n");

    let mut interval = time::interval(Duration::from_secs(config.cycle_interval_secs));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = circuit_breaker.ensure_closed().await {
                    warn!("⚡ {}", e);
                    continue;
                }

                let today = Local::now().date_naive();
                let evicted = calendar.evict_passed(today).await;
                if evicted > 0 {
                    info!("🗓️  Dropped {} passed earnings windows", evicted);
                }

                match run_decision_cycle(&feed, &runner, &sink, today).await {
                    Ok(report) => {
                        circuit_breaker.record_success().await;
                        utils::print_cycle_report(&report);
                        stats.record(&report);
                    }
                    Err(e) => {
                        error!("Decision cycle error: {:#}", e);
                        stats.record_failure();
                        if circuit_breaker.record_error().await {
                            error!("Circuit breaker activated due to repeated cycle failures");
                        }
                    }
                }

                if stats.cycles > 0 && stats.cycles % 60 == 0 {
                    utils::print_session_stats(start_time, &stats, &circuit_breaker).await;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("\n📛 Received shutdown signal (Ctrl+C)...");
                break;
            }
        }
    }

    info!("\n🛑 Shutting down gracefully...");
    info!("   Total runtime: {:?}", start_time.elapsed());
    utils::print_session_stats(start_time, &stats, &circuit_breaker).await;

    Ok(())
}

async fn run_decision_cycle(
    feed: &SnapshotFeed,
    runner: &CycleRunner,
    sink: &JsonlDecisionSink,
    today: chrono::NaiveDate,
) -> Result<CycleReport> {
    // The previous snapshot keeps serving until it ages out, so a failed reload only warns
    if let Err(e) = feed.refresh().await {
        warn!("Using previous snapshot: {}", e);
    }
    runner.run_and_emit(sink, today).await
}
