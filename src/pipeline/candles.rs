//! Incremental OHLCV candle aggregation
//!
//! ## Identity
//!
//! ```text
//! real:      {pool_id}-{bucket_start}-{quote}-{interval}
//! synthetic: calc-{base}-{bucket_start}-{quote}-{interval}
//! ```
//!
//! ## Update rule
//!
//! First trade into a bucket sets open = high = low = close = rate.
//! Later trades: high = max, low = min, close = rate (processing order,
//! not chronology), volume += delta. Buckets never close; any later event
//! with the same id mutates them again.

use super::error::StoreError;
use super::resolution::ResolutionTable;
use super::store::EntityStore;
use super::types::{Candle, Token, CALC_SCOPE};

/// Which key scheme a candle belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandleScope<'a> {
    /// Real trades in one pool
    Pool(&'a str),
    /// Derived pricing series, no trade volume
    Calc,
}

impl CandleScope<'_> {
    /// Value stored in `Candle::pool_id`
    pub fn tag(&self) -> &str {
        match self {
            CandleScope::Pool(pool_id) => pool_id,
            CandleScope::Calc => CALC_SCOPE,
        }
    }
}

pub fn candle_id(
    scope: CandleScope<'_>,
    base: &str,
    bucket_start: i64,
    quote: &str,
    interval: &str,
) -> String {
    match scope {
        CandleScope::Pool(pool_id) => {
            format!("{}-{}-{}-{}", pool_id, bucket_start, quote, interval)
        }
        CandleScope::Calc => {
            format!("{}-{}-{}-{}-{}", CALC_SCOPE, base, bucket_start, quote, interval)
        }
    }
}

/// Fold one rate/volume observation into the candle for its bucket
///
/// Reads before writing; nothing is cached between calls. Non-finite rates
/// are stored unchanged.
#[allow(clippy::too_many_arguments)]
pub fn apply_trade(
    store: &mut dyn EntityStore,
    scope: CandleScope<'_>,
    bucket_start: i64,
    rate: f64,
    volume_delta: f64,
    base: &str,
    quote: &str,
    interval: &str,
) -> Result<Candle, StoreError> {
    let id = candle_id(scope, base, bucket_start, quote, interval);

    let candle = match store.get_candle(&id)? {
        Some(mut candle) => {
            candle.high = candle.high.max(rate);
            candle.low = candle.low.min(rate);
            candle.close = rate;
            candle.volume += volume_delta;
            candle
        }
        None => Candle {
            id,
            pool_id: scope.tag().to_string(),
            base: base.to_string(),
            quote: quote.to_string(),
            interval: interval.to_string(),
            timestamp: bucket_start,
            open: rate,
            high: rate,
            low: rate,
            close: rate,
            volume: volume_delta,
        },
    };

    store.save_candle(&candle)?;
    Ok(candle)
}

/// A swap reduced to what the real candles need
#[derive(Debug, Clone)]
pub struct SwapTrade<'a> {
    pub pool_id: &'a str,
    /// Traded-in token (candle base)
    pub token_in: &'a Token,
    /// Traded-out token (candle quote)
    pub token_out: &'a Token,
    pub amount_in: u128,
    pub amount_out: u128,
    /// Block time, UTC seconds
    pub timestamp: i64,
}

impl SwapTrade<'_> {
    /// Quote-per-base price from raw amounts; zero in-amount yields inf/NaN
    pub fn rate(&self) -> f64 {
        self.amount_out as f64 / self.amount_in as f64
    }

    /// Out-amount in human quote units
    pub fn quote_volume(&self) -> f64 {
        self.amount_out as f64 / 10f64.powi(self.token_out.decimals_or_default())
    }
}

/// Update the swap's real candle in every resolution
///
/// Returns the number of candles written.
pub fn update_swap_candles(
    store: &mut dyn EntityStore,
    resolutions: &ResolutionTable,
    trade: &SwapTrade<'_>,
) -> Result<usize, StoreError> {
    let rate = trade.rate();
    let volume = trade.quote_volume();
    let mut written = 0;

    for resolution in resolutions.iter() {
        let bucket = resolution.bucket_start(trade.timestamp);
        let candle = apply_trade(
            store,
            CandleScope::Pool(trade.pool_id),
            bucket,
            rate,
            volume,
            &trade.token_in.denom,
            &trade.token_out.denom,
            resolution.label,
        )?;
        log::debug!(
            "🕯️  {} o={} h={} l={} c={} v={}",
            candle.id,
            candle.open,
            candle.high,
            candle.low,
            candle.close,
            candle.volume
        );
        written += 1;
    }

    Ok(written)
}
