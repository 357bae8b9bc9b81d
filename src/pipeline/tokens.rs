//! Token and pair registry upserts

use super::denom::extract_denom;
use super::error::StoreError;
use super::registry::DenomRegistry;
use super::store::EntityStore;
use super::types::{Pair, Token};

/// Load-or-create the token named by a `<amount><denom>` string
///
/// Name and symbol are reassigned from the registry on every call, so
/// existing tokens pick up registry changes. Decimals and USD price are kept.
pub fn upsert_token(
    store: &mut dyn EntityStore,
    registry: &DenomRegistry,
    amount_with_denom: &str,
) -> Result<Token, StoreError> {
    let denom = extract_denom(amount_with_denom);
    let mut token = match store.get_token(&denom)? {
        Some(existing) => existing,
        None => {
            log::debug!("🆕 New token: {}", denom);
            Token::new(&denom)
        }
    };

    let (name, symbol) = registry.lookup(&denom);
    token.name = name;
    token.symbol = symbol;

    store.save_token(&token)?;
    Ok(token)
}

/// Upsert the traded pair and its reverse
///
/// Forward id is `{base}-{quote}-{pool}`, reverse id is `{quote}-{base}`
/// without the pool. Both rows are overwritten on every call. Returns the
/// forward pair.
pub fn upsert_pair(
    store: &mut dyn EntityStore,
    base: &Token,
    quote: &Token,
    pool_id: &str,
) -> Result<Pair, StoreError> {
    let forward_id = format!("{}-{}-{}", base.denom, quote.denom, pool_id);
    let forward = write_pair(store, forward_id, base, quote, pool_id)?;

    let reverse_id = format!("{}-{}", quote.denom, base.denom);
    write_pair(store, reverse_id, quote, base, pool_id)?;

    Ok(forward)
}

fn write_pair(
    store: &mut dyn EntityStore,
    id: String,
    base: &Token,
    quote: &Token,
    pool_id: &str,
) -> Result<Pair, StoreError> {
    let mut pair = match store.get_pair(&id)? {
        Some(existing) => existing,
        None => Pair {
            id,
            symbol: String::new(),
            base_asset: String::new(),
            quote_asset: String::new(),
            name: String::new(),
            pool_id: String::new(),
        },
    };

    pair.symbol = format!("{}-{}", base.symbol, quote.symbol);
    pair.base_asset = base.denom.clone();
    pair.quote_asset = quote.denom.clone();
    pair.name = format!("{} / {}", base.name, quote.name);
    pair.pool_id = pool_id.to_string();

    store.save_pair(&pair)?;
    Ok(pair)
}
