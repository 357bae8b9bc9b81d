//! Pipeline Runtime - swap events in, tokens/pairs/swaps/candles out
//!
//! - Applies SQL migrations and opens the entity store
//! - Spawns the JSONL event source and the single ingestion worker
//! - Exits non-zero if any event fails
//!
//! Usage:
//!   cargo run --release --bin pipeline_runtime [-- --backend sqlite|memory]
//!
//! Environment variables: see `PipelineConfig::from_env`.

use candleflow::pipeline::{
    start_pipeline_ingestion, BackendType, DenomRegistry, EntityStore, MemoryEntityStore,
    PipelineConfig, PipelineEngine, PricingMode, SqliteEntityStore,
};
use candleflow::source::{run_event_source, JsonlSwapReader};
use dotenv::dotenv;
use log::{error, info, warn};
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::init();

    info!("🚀 Candleflow pipeline runtime");

    let config = PipelineConfig::from_env()?;
    let backend = BackendType::parse_backend_from_args();

    info!("✅ Configuration loaded");
    info!("   ├─ Backend: {:?}", backend);
    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Events: {} (follow: {})", config.events_path, config.follow_events);
    info!("   ├─ Channel buffer: {} swaps", config.channel_buffer);
    match &config.pricing.mode {
        PricingMode::Intermediate { intermediate } => {
            info!("   └─ USD pricing: via {}", intermediate)
        }
        PricingMode::WhitelistedPools { pools, .. } => {
            info!("   └─ USD pricing: ATOM via whitelisted pools {:?}", pools)
        }
    }

    let mut registry = DenomRegistry::osmosis();
    if let Some(path) = &config.denom_registry_path {
        registry = registry.with_overrides_from_file(path)?;
    }

    let store: Box<dyn EntityStore + Send> = match backend {
        BackendType::Sqlite => {
            info!("🔧 Initializing database...");
            Box::new(SqliteEntityStore::open_with_schema(&config.db_path, &config.schema_dir)?)
        }
        BackendType::Memory => {
            warn!("⚠️  Memory backend: results are discarded on exit");
            Box::new(MemoryEntityStore::new())
        }
    };

    let engine = PipelineEngine::new(store, registry, config.pricing.clone());
    let (tx, rx) = mpsc::channel(config.channel_buffer);

    let mut reader = JsonlSwapReader::new(&config.events_path);
    if config.follow_events {
        reader = reader.follow(Duration::from_millis(config.poll_interval_ms));
    }
    let source = tokio::spawn(run_event_source(reader, tx));
    let mut ingestion = tokio::spawn(start_pipeline_ingestion(rx, engine, config.channel_buffer));

    info!("🔄 Press CTRL+C to shutdown gracefully");

    let result = tokio::select! {
        joined = &mut ingestion => joined?,
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                error!("❌ Failed to listen for CTRL+C: {}", err);
            }
            info!("⚠️  Shutting down, draining buffered swaps...");
            // Dropping the source closes the channel; the worker drains what is left
            source.abort();
            ingestion.await?
        }
    };

    // A following source never finishes on its own
    source.abort();
    let source_result = source.await;

    let stats = match result {
        Ok(stats) => stats,
        Err(e) => {
            error!("❌ Ingestion aborted: {}", e);
            return Err(e.into());
        }
    };

    match source_result {
        Ok(Err(e)) => {
            error!("❌ Event source failed: {}", e);
            return Err(e.into());
        }
        Err(join) if !join.is_cancelled() => return Err(join.into()),
        _ => {}
    }

    info!(
        "✅ Pipeline runtime stopped: {} swaps, {} candle updates",
        stats.events, stats.candles_written
    );
    Ok(())
}
