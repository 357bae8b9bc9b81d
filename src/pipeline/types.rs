//! Entity and event types shared across the pipeline
//!
//! Four persisted entities (Token, Pair, Swap, Candle) plus the inbound
//! `SwapEvent` and the field-equality filters used by queries.

use super::error::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const ATTR_SENDER: &str = "sender";
pub const ATTR_POOL_ID: &str = "pool_id";
pub const ATTR_TOKENS_IN: &str = "tokens_in";
pub const ATTR_TOKENS_OUT: &str = "tokens_out";

/// Decimal precision assumed for every token until metadata says otherwise
pub const DEFAULT_DECIMALS: &str = "6";

/// Scope tag stored in `Candle::pool_id` for synthetic series
pub const CALC_SCOPE: &str = "calc";

/// One swap event as delivered by the chain subscription layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapEvent {
    pub height: u64,
    pub block_time: DateTime<Utc>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl SwapEvent {
    /// Look up a required attribute
    ///
    /// Absence is fatal to the event (no defaulting).
    pub fn attribute(&self, key: &str) -> Result<&str, PipelineError> {
        self.attributes
            .get(key)
            .map(|v| v.as_str())
            .ok_or_else(|| PipelineError::MissingAttribute(key.to_string()))
    }

    /// Block time as UTC seconds
    pub fn timestamp(&self) -> i64 {
        self.block_time.timestamp()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Identity: chain-native or IBC denom
    pub denom: String,
    pub name: String,
    pub symbol: String,
    pub decimals: String,
    /// Latest derived USD price, not historical
    pub usd_price: Option<String>,
}

impl Token {
    pub fn new(denom: &str) -> Self {
        Self {
            denom: denom.to_string(),
            name: denom.to_string(),
            symbol: denom.to_string(),
            decimals: DEFAULT_DECIMALS.to_string(),
            usd_price: None,
        }
    }

    /// Decimal precision as an exponent, falling back to 6 when unset or unparsable
    pub fn decimals_or_default(&self) -> i32 {
        self.decimals.trim().parse().unwrap_or(6)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pair {
    /// `{base}-{quote}-{pool}` for the traded direction, `{quote}-{base}` for the reverse
    pub id: String,
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub name: String,
    pub pool_id: String,
}

/// Append-only swap log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Swap {
    /// `{height}-{sender}`
    pub id: String,
    pub height: u64,
    pub sender: String,
    pub pool_id: String,
    pub token_in: String,
    pub token_out: String,
    pub token_in_amount: u128,
    pub token_out_amount: u128,
}

/// OHLCV aggregate for one (pair, scope, resolution, bucket)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub id: String,
    /// Pool id for real candles, `calc` for synthetic ones
    pub pool_id: String,
    pub base: String,
    pub quote: String,
    pub interval: String,
    /// Bucket start, UTC seconds
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn is_synthetic(&self) -> bool {
        self.pool_id == CALC_SCOPE
    }
}

/// Field-equality filter over tokens
#[derive(Debug, Clone, Default)]
pub struct TokenFilter {
    pub symbol: Option<String>,
}

impl TokenFilter {
    pub fn matches(&self, token: &Token) -> bool {
        self.symbol.as_ref().map_or(true, |s| &token.symbol == s)
    }
}

/// Field-equality filter over pairs
#[derive(Debug, Clone, Default)]
pub struct PairFilter {
    pub symbol: Option<String>,
    pub pool_id: Option<String>,
    pub base_asset: Option<String>,
    pub quote_asset: Option<String>,
}

impl PairFilter {
    pub fn matches(&self, pair: &Pair) -> bool {
        self.symbol.as_ref().map_or(true, |v| &pair.symbol == v)
            && self.pool_id.as_ref().map_or(true, |v| &pair.pool_id == v)
            && self.base_asset.as_ref().map_or(true, |v| &pair.base_asset == v)
            && self.quote_asset.as_ref().map_or(true, |v| &pair.quote_asset == v)
    }
}

/// Field-equality filter over candles
///
/// Results are ordered by (timestamp, pool_id) ascending.
#[derive(Debug, Clone, Default)]
pub struct CandleFilter {
    pub pool_id: Option<String>,
    pub base: Option<String>,
    pub quote: Option<String>,
    pub interval: Option<String>,
    pub timestamp: Option<i64>,
}

impl CandleFilter {
    pub fn pair(base: &str, quote: &str) -> Self {
        Self {
            base: Some(base.to_string()),
            quote: Some(quote.to_string()),
            ..Default::default()
        }
    }

    pub fn interval(mut self, interval: &str) -> Self {
        self.interval = Some(interval.to_string());
        self
    }

    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn pool(mut self, pool_id: &str) -> Self {
        self.pool_id = Some(pool_id.to_string());
        self
    }

    pub fn matches(&self, candle: &Candle) -> bool {
        self.pool_id.as_ref().map_or(true, |v| &candle.pool_id == v)
            && self.base.as_ref().map_or(true, |v| &candle.base == v)
            && self.quote.as_ref().map_or(true, |v| &candle.quote == v)
            && self.interval.as_ref().map_or(true, |v| &candle.interval == v)
            && self.timestamp.map_or(true, |v| candle.timestamp == v)
    }
}
