//! Pipeline ingestion - single async worker draining the swap channel
//!
//! The worker owns the `PipelineEngine` by value, so events are applied
//! strictly in channel order and no lock guards the store. A failing event
//! stops the worker; the error is returned to the runtime.

use super::engine::PipelineEngine;
use super::error::PipelineError;
use super::types::SwapEvent;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};

/// Stats interval in seconds
const STATS_INTERVAL_SECS: u64 = 10;

/// Totals for one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionStats {
    pub events: u64,
    pub candles_written: u64,
    pub compositions: u64,
    pub skipped_compositions: u64,
}

/// Start pipeline ingestion from the swap event channel
///
/// Runs until the sender side is dropped (returns the totals) or an event
/// fails (returns that error, later events stay unprocessed).
///
/// Arguments:
/// - `rx`: Receiver end of the swap event channel
/// - `engine`: Engine owning the entity store
/// - `channel_capacity`: Buffer size, for utilization logging only
pub async fn start_pipeline_ingestion(
    mut rx: mpsc::Receiver<SwapEvent>,
    mut engine: PipelineEngine,
    channel_capacity: usize,
) -> Result<IngestionStats, PipelineError> {
    log::info!("🚀 Starting pipeline ingestion");
    log::info!("   ├─ Backend: {}", engine.backend_type());
    log::info!("   └─ Waiting for swaps...");

    let mut stats_timer = interval(Duration::from_secs(STATS_INTERVAL_SECS));
    let mut stats = IngestionStats::default();
    let mut window_events = 0u64;
    let mut last_log_time = Instant::now();
    let channel_capacity = channel_capacity.max(1);

    loop {
        tokio::select! {
            maybe_event = rx.recv() => {
                let Some(event) = maybe_event else {
                    log::info!("📭 Swap channel closed, stopping ingestion");
                    break;
                };

                let height = event.height;
                let outcome = match engine.process_swap(&event) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        log::error!("❌ Swap at height {} failed, stopping ingestion: {}", height, e);
                        return Err(e);
                    }
                };

                stats.events += 1;
                stats.candles_written += outcome.candles_written as u64;
                stats.compositions += outcome.pricing.len() as u64;
                stats.skipped_compositions += outcome.skipped_compositions() as u64;
                window_events += 1;
            }

            _ = stats_timer.tick() => {
                let elapsed = last_log_time.elapsed().as_secs_f64();
                if window_events > 0 && elapsed > 0.0 {
                    log::info!(
                        "📊 Ingestion rate: {:.1} swaps/sec (total: {}, skipped USD compositions: {})",
                        window_events as f64 / elapsed,
                        stats.events,
                        stats.skipped_compositions
                    );
                }
                last_log_time = Instant::now();
                window_events = 0;

                let channel_usage = rx.len();
                if channel_usage > channel_capacity / 2 {
                    log::warn!(
                        "⚠️  Channel usage high: {}/{} ({}%)",
                        channel_usage,
                        channel_capacity,
                        (channel_usage * 100) / channel_capacity
                    );
                }
            }
        }
    }

    log::info!(
        "✅ Pipeline ingestion stopped: {} swaps, {} candle updates, {}/{} USD compositions skipped",
        stats.events,
        stats.candles_written,
        stats.skipped_compositions,
        stats.compositions
    );
    Ok(stats)
}
