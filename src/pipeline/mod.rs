//! # Swap Candle Pipeline
//!
//! Turns AMM swap events into four persisted entity kinds:
//! - `tokens` - one row per denom, display metadata and latest USD price
//! - `pairs` - forward (per pool) and reverse pair rows
//! - `swaps` - raw swap log keyed `{height}-{sender}`
//! - `candles` - OHLCV per pool at 8 resolutions, plus synthetic `calc-`
//!   USD series composed through an intermediate asset
//!
//! ## Architecture
//!
//! ```text
//! SwapEventSource → mpsc → start_pipeline_ingestion → PipelineEngine → EntityStore
//! ```
//!
//! A single worker owns the engine and applies events in arrival order.
//! Candles are updated incrementally and never rebuilt: a late event mutates
//! whatever bucket it lands in.
//!
//! ## Module Organization
//!
//! - `denom` - `<amount><denom>` string parsing
//! - `registry` - static denom display table
//! - `resolution` - calendar bucket flooring and the 8 resolutions
//! - `tokens` / `swaps` / `candles` - entity upserts
//! - `pricing` - synthetic USD composition
//! - `engine` - per-event orchestration inside a store transaction
//! - `ingestion` - async channel worker
//! - `store` / `db` - persistence trait, in-memory and SQLite backends

pub mod candles;
pub mod config;
pub mod db;
pub mod denom;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod pricing;
pub mod registry;
pub mod resolution;
pub mod store;
pub mod swaps;
pub mod tokens;
pub mod types;

// Re-export commonly used types
pub use config::{BackendType, PipelineConfig, PricingConfig, PricingMode};
pub use db::{run_schema_migrations, SqliteEntityStore};
pub use engine::{PipelineEngine, SwapOutcome};
pub use error::{PipelineError, StoreError};
pub use ingestion::{start_pipeline_ingestion, IngestionStats};
pub use pricing::{CompositionOutcome, SkipReason, UsdPricingComposer};
pub use registry::DenomRegistry;
pub use resolution::{Resolution, ResolutionTable, Timeframe};
pub use store::{EntityStore, MemoryEntityStore};
pub use types::{Candle, CandleFilter, Pair, PairFilter, Swap, SwapEvent, Token, TokenFilter};
