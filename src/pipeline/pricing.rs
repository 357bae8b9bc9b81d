//! Synthetic USD pricing through an intermediate asset
//!
//! A token's USD price is the product of two daily closes sharing one asset:
//!
//! ```text
//! price(T -> USDC) = close(T -> OSMO, 1d) * close(OSMO -> USDC, 1d)
//! ```
//!
//! Both legs must have a real `1d` candle in the current day bucket. If
//! either is missing the token is skipped for this event: no token update,
//! no synthetic candle. Successful compositions write `calc-` candles for
//! `T -> USDC` and `USDC -> T` at every resolution with zero volume.
//!
//! Leg lookup accepts either orientation of a pool's candle (`A -> B` close
//! as is, `B -> A` close inverted) and prefers the highest-volume pool, ties
//! going to the lowest pool id.

use super::candles::{apply_trade, CandleScope};
use super::config::{PricingConfig, PricingMode};
use super::error::StoreError;
use super::resolution::{ResolutionTable, DAILY};
use super::store::EntityStore;
use super::types::{Candle, CandleFilter, Token};

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// No daily candle for `base -> quote` (either orientation) at `timestamp`
    MissingLeg {
        base: String,
        quote: String,
        timestamp: i64,
    },
}

/// Result of one USD derivation attempt
#[derive(Debug, Clone, PartialEq)]
pub enum CompositionOutcome {
    /// Price persisted onto the token and synthetic candles written
    Composed { denom: String, price_usd: f64 },
    /// Token is USDC itself; price fixed at 1, no synthetic candles
    Terminal { denom: String },
    /// Dependency missing; nothing written
    Skipped(SkipReason),
    /// Swap does not feed the configured composition
    NotApplicable,
}

impl CompositionOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, CompositionOutcome::Skipped(_))
    }
}

/// Swap context the composer needs
#[derive(Debug, Clone, Copy)]
pub struct PricingInput<'a> {
    pub pool_id: &'a str,
    pub token_in: &'a Token,
    pub token_out: &'a Token,
    /// Block time, UTC seconds
    pub timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct UsdPricingComposer {
    config: PricingConfig,
}

impl UsdPricingComposer {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Run the configured composition for one swap
    ///
    /// Intermediate mode prices the in-token and then the out-token;
    /// whitelisted mode yields a single ATOM outcome.
    pub fn compose_for_swap(
        &self,
        store: &mut dyn EntityStore,
        resolutions: &ResolutionTable,
        input: &PricingInput<'_>,
    ) -> Result<Vec<CompositionOutcome>, StoreError> {
        match &self.config.mode {
            PricingMode::Intermediate { intermediate } => {
                let mut outcomes = Vec::with_capacity(2);
                outcomes.push(self.price_via_intermediate(
                    store,
                    resolutions,
                    &input.token_in.denom,
                    intermediate,
                    input.timestamp,
                )?);
                if input.token_out.denom != input.token_in.denom {
                    outcomes.push(self.price_via_intermediate(
                        store,
                        resolutions,
                        &input.token_out.denom,
                        intermediate,
                        input.timestamp,
                    )?);
                }
                Ok(outcomes)
            }
            PricingMode::WhitelistedPools { atom, osmo, pools } => Ok(vec![self.price_whitelisted(
                store,
                resolutions,
                input,
                atom,
                osmo,
                pools,
            )?]),
        }
    }

    fn price_via_intermediate(
        &self,
        store: &mut dyn EntityStore,
        resolutions: &ResolutionTable,
        denom: &str,
        intermediate: &str,
        timestamp: i64,
    ) -> Result<CompositionOutcome, StoreError> {
        let usdc = self.config.usdc_denom.as_str();
        let day = DAILY.bucket_start(timestamp);

        if denom == usdc {
            set_usd_price(store, denom, 1.0)?;
            return Ok(CompositionOutcome::Terminal {
                denom: denom.to_string(),
            });
        }

        let to_intermediate = if denom == intermediate {
            Some(1.0)
        } else {
            find_leg(store, denom, intermediate, day, None)?
        };
        let Some(to_intermediate) = to_intermediate else {
            return Ok(missing_leg(denom, intermediate, day));
        };

        let Some(intermediate_usd) = find_leg(store, intermediate, usdc, day, None)? else {
            return Ok(missing_leg(intermediate, usdc, day));
        };

        let price_usd = to_intermediate * intermediate_usd;
        self.publish(store, resolutions, denom, price_usd, timestamp)?;

        Ok(CompositionOutcome::Composed {
            denom: denom.to_string(),
            price_usd,
        })
    }

    fn price_whitelisted(
        &self,
        store: &mut dyn EntityStore,
        resolutions: &ResolutionTable,
        input: &PricingInput<'_>,
        atom: &str,
        osmo: &str,
        pools: &[String],
    ) -> Result<CompositionOutcome, StoreError> {
        let usdc = self.config.usdc_denom.as_str();

        if !pools.iter().any(|p| p == input.pool_id) {
            return Ok(CompositionOutcome::NotApplicable);
        }

        let traded = (input.token_in.denom.as_str(), input.token_out.denom.as_str());
        let is_leg = |a: &str, b: &str| traded == (a, b) || traded == (b, a);
        if !is_leg(atom, osmo) && !is_leg(osmo, usdc) {
            return Ok(CompositionOutcome::NotApplicable);
        }

        let day = DAILY.bucket_start(input.timestamp);

        let Some(atom_osmo) = find_leg(store, atom, osmo, day, Some(pools))? else {
            return Ok(missing_leg(atom, osmo, day));
        };
        let Some(osmo_usdc) = find_leg(store, osmo, usdc, day, Some(pools))? else {
            return Ok(missing_leg(osmo, usdc, day));
        };

        let price_usd = atom_osmo * osmo_usdc;
        self.publish(store, resolutions, atom, price_usd, input.timestamp)?;

        Ok(CompositionOutcome::Composed {
            denom: atom.to_string(),
            price_usd,
        })
    }

    /// Persist the price onto the token and write both synthetic series
    fn publish(
        &self,
        store: &mut dyn EntityStore,
        resolutions: &ResolutionTable,
        denom: &str,
        price_usd: f64,
        timestamp: i64,
    ) -> Result<(), StoreError> {
        let usdc = self.config.usdc_denom.as_str();
        set_usd_price(store, denom, price_usd)?;

        for resolution in resolutions.iter() {
            let bucket = resolution.bucket_start(timestamp);
            apply_trade(store, CandleScope::Calc, bucket, price_usd, 0.0, denom, usdc, resolution.label)?;
            apply_trade(
                store,
                CandleScope::Calc,
                bucket,
                1.0 / price_usd,
                0.0,
                usdc,
                denom,
                resolution.label,
            )?;
        }

        log::debug!("💵 {} = {} USD", denom, price_usd);
        Ok(())
    }
}

fn missing_leg(base: &str, quote: &str, timestamp: i64) -> CompositionOutcome {
    log::debug!(
        "⏭️  USD pricing skipped: no 1d candle {} -> {} at {}",
        base,
        quote,
        timestamp
    );
    CompositionOutcome::Skipped(SkipReason::MissingLeg {
        base: base.to_string(),
        quote: quote.to_string(),
        timestamp,
    })
}

fn set_usd_price(store: &mut dyn EntityStore, denom: &str, price_usd: f64) -> Result<(), StoreError> {
    let mut token = store.get_token(denom)?.unwrap_or_else(|| Token::new(denom));
    token.usd_price = Some(price_usd.to_string());
    store.save_token(&token)
}

/// Daily `from -> to` rate from real candles, trying the reverse orientation second
fn find_leg(
    store: &dyn EntityStore,
    from: &str,
    to: &str,
    day: i64,
    pools: Option<&[String]>,
) -> Result<Option<f64>, StoreError> {
    if let Some(candle) = best_oracle(store, from, to, day, pools)? {
        return Ok(Some(candle.close));
    }
    if let Some(candle) = best_oracle(store, to, from, day, pools)? {
        return Ok(Some(1.0 / candle.close));
    }
    Ok(None)
}

fn best_oracle(
    store: &dyn EntityStore,
    base: &str,
    quote: &str,
    day: i64,
    pools: Option<&[String]>,
) -> Result<Option<Candle>, StoreError> {
    let filter = CandleFilter::pair(base, quote).interval(DAILY.label).at(day);
    let candidates = store.find_candles(&filter)?;

    let mut best: Option<Candle> = None;
    for candle in candidates {
        if candle.is_synthetic() {
            continue;
        }
        if let Some(allowed) = pools {
            if !allowed.iter().any(|p| *p == candle.pool_id) {
                continue;
            }
        }
        let better = match &best {
            None => true,
            Some(current) => {
                candle.volume > current.volume
                    || (candle.volume == current.volume && pool_order(&candle, current))
            }
        };
        if better {
            best = Some(candle);
        }
    }
    Ok(best)
}

/// Numeric pool ids compare numerically, anything else lexically
fn pool_order(candidate: &Candle, current: &Candle) -> bool {
    match (candidate.pool_id.parse::<u64>(), current.pool_id.parse::<u64>()) {
        (Ok(a), Ok(b)) => a < b,
        _ => candidate.pool_id < current.pool_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::store::MemoryEntityStore;

    const DAY: i64 = 1_704_067_200; // 2024-01-01T00:00:00Z
    const NOON: i64 = DAY + 12 * 3_600;

    fn daily(store: &mut MemoryEntityStore, pool: &str, base: &str, quote: &str, close: f64, volume: f64) {
        apply_trade(store, CandleScope::Pool(pool), DAY, close, volume, base, quote, "1d").unwrap();
    }

    fn input<'a>(pool_id: &'a str, token_in: &'a Token, token_out: &'a Token) -> PricingInput<'a> {
        PricingInput {
            pool_id,
            token_in,
            token_out,
            timestamp: NOON,
        }
    }

    fn composer() -> UsdPricingComposer {
        UsdPricingComposer::new(PricingConfig::intermediate("uusdc", "uosmo"))
    }

    #[test]
    fn test_composes_through_intermediate() {
        let mut store = MemoryEntityStore::new();
        daily(&mut store, "1", "uatom", "uosmo", 12.5, 10.0);
        daily(&mut store, "678", "uosmo", "uusdc", 0.5, 10.0);

        let atom = Token::new("uatom");
        let osmo = Token::new("uosmo");
        let outcomes = composer()
            .compose_for_swap(&mut store, &ResolutionTable::standard(), &input("1", &atom, &osmo))
            .unwrap();

        assert_eq!(
            outcomes[0],
            CompositionOutcome::Composed {
                denom: "uatom".to_string(),
                price_usd: 6.25
            }
        );
        // OSMO priced too, its first leg being the identity
        assert_eq!(
            outcomes[1],
            CompositionOutcome::Composed {
                denom: "uosmo".to_string(),
                price_usd: 0.5
            }
        );

        assert_eq!(store.get_token("uatom").unwrap().unwrap().usd_price.as_deref(), Some("6.25"));
        let fwd = store.get_candle(&format!("calc-uatom-{}-uusdc-1d", DAY)).unwrap().unwrap();
        assert_eq!(fwd.close, 6.25);
        assert_eq!(fwd.volume, 0.0);
        let inv = store.get_candle(&format!("calc-uusdc-{}-uatom-1d", DAY)).unwrap().unwrap();
        assert_eq!(inv.close, 0.16);
        let noon_4h = store.get_candle(&format!("calc-uatom-{}-uusdc-4h", NOON)).unwrap();
        assert!(noon_4h.is_some());
    }

    #[test]
    fn test_missing_leg_skips_without_writes() {
        let mut store = MemoryEntityStore::new();
        daily(&mut store, "1", "uatom", "uosmo", 12.5, 10.0);
        let before = store.candle_count();

        let atom = Token::new("uatom");
        let juno = Token::new("ujuno");
        let outcomes = composer()
            .compose_for_swap(&mut store, &ResolutionTable::standard(), &input("3", &atom, &juno))
            .unwrap();

        assert_eq!(
            outcomes[0],
            CompositionOutcome::Skipped(SkipReason::MissingLeg {
                base: "uosmo".to_string(),
                quote: "uusdc".to_string(),
                timestamp: DAY,
            })
        );
        assert!(outcomes[1].is_skipped());
        assert_eq!(store.candle_count(), before);
        assert!(store.get_token("uatom").unwrap().is_none());
    }

    #[test]
    fn test_usdc_is_terminal() {
        let mut store = MemoryEntityStore::new();
        let usdc = Token::new("uusdc");
        let osmo = Token::new("uosmo");
        let outcomes = composer()
            .compose_for_swap(&mut store, &ResolutionTable::standard(), &input("678", &usdc, &osmo))
            .unwrap();

        assert_eq!(
            outcomes[0],
            CompositionOutcome::Terminal {
                denom: "uusdc".to_string()
            }
        );
        assert_eq!(store.get_token("uusdc").unwrap().unwrap().usd_price.as_deref(), Some("1"));
        assert_eq!(store.candle_count(), 0);
    }

    #[test]
    fn test_reverse_orientation_leg_is_inverted() {
        let mut store = MemoryEntityStore::new();
        daily(&mut store, "1", "uosmo", "uatom", 0.08, 1.0);
        daily(&mut store, "678", "uusdc", "uosmo", 2.0, 1.0);

        let atom = Token::new("uatom");
        let outcome = composer()
            .price_via_intermediate(&mut store, &ResolutionTable::standard(), "uatom", "uosmo", NOON)
            .unwrap();
        assert_eq!(
            outcome,
            CompositionOutcome::Composed {
                denom: atom.denom.clone(),
                price_usd: (1.0 / 0.08) * (1.0 / 2.0)
            }
        );
    }

    #[test]
    fn test_highest_volume_pool_wins() {
        let mut store = MemoryEntityStore::new();
        daily(&mut store, "5", "uatom", "uosmo", 11.0, 1.0);
        daily(&mut store, "1", "uatom", "uosmo", 12.0, 50.0);
        daily(&mut store, "2", "uatom", "uosmo", 13.0, 50.0);
        // Synthetic series are never oracles
        apply_trade(&mut store, CandleScope::Calc, DAY, 99.0, 1_000.0, "uatom", "uosmo", "1d").unwrap();

        let leg = find_leg(&store, "uatom", "uosmo", DAY, None).unwrap();
        assert_eq!(leg, Some(12.0));

        let pools = vec!["5".to_string()];
        let leg = find_leg(&store, "uatom", "uosmo", DAY, Some(pools.as_slice())).unwrap();
        assert_eq!(leg, Some(11.0));
    }

    #[test]
    fn test_previous_day_candle_not_used() {
        let mut store = MemoryEntityStore::new();
        apply_trade(&mut store, CandleScope::Pool("1"), DAY - 86_400, 12.0, 1.0, "uatom", "uosmo", "1d").unwrap();
        daily(&mut store, "678", "uosmo", "uusdc", 0.5, 1.0);

        let outcome = composer()
            .price_via_intermediate(&mut store, &ResolutionTable::standard(), "uatom", "uosmo", NOON)
            .unwrap();
        assert!(outcome.is_skipped());
    }

    fn whitelisted() -> UsdPricingComposer {
        UsdPricingComposer::new(PricingConfig::whitelisted("uusdc", "uatom", "uosmo", &["1", "678"]))
    }

    #[test]
    fn test_whitelist_composes_atom() {
        let mut store = MemoryEntityStore::new();
        daily(&mut store, "1", "uatom", "uosmo", 10.0, 1.0);
        daily(&mut store, "678", "uosmo", "uusdc", 0.75, 1.0);

        let osmo = Token::new("uosmo");
        let usdc = Token::new("uusdc");
        let outcomes = whitelisted()
            .compose_for_swap(&mut store, &ResolutionTable::standard(), &input("678", &osmo, &usdc))
            .unwrap();

        assert_eq!(
            outcomes,
            vec![CompositionOutcome::Composed {
                denom: "uatom".to_string(),
                price_usd: 7.5
            }]
        );
        assert!(store.get_candle(&format!("calc-uatom-{}-uusdc-1d", DAY)).unwrap().is_some());
        assert!(store.get_candle(&format!("calc-uusdc-{}-uatom-1d", DAY)).unwrap().is_some());
    }

    #[test]
    fn test_whitelist_ignores_other_pools_and_pairs() {
        let mut store = MemoryEntityStore::new();
        let atom = Token::new("uatom");
        let osmo = Token::new("uosmo");
        let juno = Token::new("ujuno");
        let resolutions = ResolutionTable::standard();

        let outcomes = whitelisted()
            .compose_for_swap(&mut store, &resolutions, &input("2", &atom, &osmo))
            .unwrap();
        assert_eq!(outcomes, vec![CompositionOutcome::NotApplicable]);

        let outcomes = whitelisted()
            .compose_for_swap(&mut store, &resolutions, &input("1", &juno, &osmo))
            .unwrap();
        assert_eq!(outcomes, vec![CompositionOutcome::NotApplicable]);
    }

    #[test]
    fn test_whitelist_legs_restricted_to_whitelisted_pools() {
        let mut store = MemoryEntityStore::new();
        daily(&mut store, "1", "uatom", "uosmo", 10.0, 1.0);
        // OSMO/USDC only in a non-whitelisted pool
        daily(&mut store, "9", "uosmo", "uusdc", 0.75, 1.0);

        let atom = Token::new("uatom");
        let osmo = Token::new("uosmo");
        let outcomes = whitelisted()
            .compose_for_swap(&mut store, &ResolutionTable::standard(), &input("1", &atom, &osmo))
            .unwrap();
        assert!(outcomes[0].is_skipped());
    }
}
