//! candleflow - AMM swap indexer producing token/pair registries, a raw swap
//! log and multi-resolution OHLCV candles with a synthetic USD pricing layer.

pub mod pipeline;
pub mod source;
pub mod sqlite_pragma;
