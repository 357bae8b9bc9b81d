//! Pipeline Engine - per-event orchestration
//!
//! ## Flow
//!
//! ```text
//! SwapEvent
//!     ↓
//! upsert_token (in, out) → upsert_pair (forward + reverse)
//!     ↓
//! record_swap
//!     ↓
//! update_swap_candles (8 resolutions)
//!     ↓
//! UsdPricingComposer::compose_for_swap (calc- candles)
//! ```
//!
//! Each event runs inside one store transaction. Any error rolls the event
//! back and is returned to the caller; the engine keeps no state between
//! events beyond what the store holds.

use super::candles::{update_swap_candles, SwapTrade};
use super::config::PricingConfig;
use super::denom::parse_amount;
use super::error::PipelineError;
use super::pricing::{CompositionOutcome, PricingInput, UsdPricingComposer};
use super::registry::DenomRegistry;
use super::resolution::ResolutionTable;
use super::store::EntityStore;
use super::swaps::record_swap;
use super::tokens::{upsert_pair, upsert_token};
use super::types::{Swap, SwapEvent, ATTR_POOL_ID, ATTR_SENDER, ATTR_TOKENS_IN, ATTR_TOKENS_OUT};

/// What one event produced
#[derive(Debug, Clone)]
pub struct SwapOutcome {
    pub swap: Swap,
    pub candles_written: usize,
    pub pricing: Vec<CompositionOutcome>,
}

impl SwapOutcome {
    pub fn skipped_compositions(&self) -> usize {
        self.pricing.iter().filter(|o| o.is_skipped()).count()
    }
}

/// Owns the store and the immutable lookup tables
pub struct PipelineEngine {
    store: Box<dyn EntityStore + Send>,
    resolutions: ResolutionTable,
    registry: DenomRegistry,
    composer: UsdPricingComposer,
}

impl PipelineEngine {
    pub fn new(
        store: Box<dyn EntityStore + Send>,
        registry: DenomRegistry,
        pricing: PricingConfig,
    ) -> Self {
        Self::with_resolutions(store, ResolutionTable::standard(), registry, pricing)
    }

    pub fn with_resolutions(
        store: Box<dyn EntityStore + Send>,
        resolutions: ResolutionTable,
        registry: DenomRegistry,
        pricing: PricingConfig,
    ) -> Self {
        Self {
            store,
            resolutions,
            registry,
            composer: UsdPricingComposer::new(pricing),
        }
    }

    pub fn store(&self) -> &dyn EntityStore {
        self.store.as_ref()
    }

    pub fn backend_type(&self) -> &'static str {
        self.store.backend_type()
    }

    /// Apply one swap event atomically
    ///
    /// Missing attributes abort the event before anything is written.
    pub fn process_swap(&mut self, event: &SwapEvent) -> Result<SwapOutcome, PipelineError> {
        let sender = event.attribute(ATTR_SENDER)?;
        let pool_id = event.attribute(ATTR_POOL_ID)?;
        let tokens_in = event.attribute(ATTR_TOKENS_IN)?;
        let tokens_out = event.attribute(ATTR_TOKENS_OUT)?;

        self.store.begin()?;
        let result = self
            .apply(event, sender, pool_id, tokens_in, tokens_out)
            .and_then(|outcome| {
                self.store.commit()?;
                Ok(outcome)
            });

        if result.is_err() {
            if let Err(rollback_err) = self.store.rollback() {
                log::error!("❌ Rollback failed at height {}: {}", event.height, rollback_err);
            }
        }
        result
    }

    fn apply(
        &mut self,
        event: &SwapEvent,
        sender: &str,
        pool_id: &str,
        tokens_in: &str,
        tokens_out: &str,
    ) -> Result<SwapOutcome, PipelineError> {
        let store: &mut dyn EntityStore = self.store.as_mut();

        let token_in = upsert_token(store, &self.registry, tokens_in)?;
        let token_out = upsert_token(store, &self.registry, tokens_out)?;
        upsert_pair(store, &token_in, &token_out, pool_id)?;

        let swap = record_swap(
            store,
            &token_in,
            &token_out,
            event.height,
            sender,
            pool_id,
            tokens_in,
            tokens_out,
        )?;

        let timestamp = event.timestamp();
        let trade = SwapTrade {
            pool_id,
            token_in: &token_in,
            token_out: &token_out,
            amount_in: parse_amount(tokens_in),
            amount_out: parse_amount(tokens_out),
            timestamp,
        };
        let candles_written = update_swap_candles(store, &self.resolutions, &trade)?;

        let pricing = self.composer.compose_for_swap(
            store,
            &self.resolutions,
            &PricingInput {
                pool_id,
                token_in: &token_in,
                token_out: &token_out,
                timestamp,
            },
        )?;

        log::debug!(
            "🔄 Swap {} pool {}: {} -> {} ({} candles)",
            swap.id,
            pool_id,
            token_in.symbol,
            token_out.symbol,
            candles_written
        );

        Ok(SwapOutcome {
            swap,
            candles_written,
            pricing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::registry::{ATOM_DENOM, USDC_DENOM, UOSMO};
    use crate::pipeline::error::StoreError;
    use crate::pipeline::store::MemoryEntityStore;
    use crate::pipeline::types::{Candle, CandleFilter, Pair, PairFilter, Token, TokenFilter};
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    /// Memory store that fails after `candle_budget` candle writes, or on commit
    struct FailingStore {
        inner: MemoryEntityStore,
        candle_budget: Option<usize>,
        fail_commit: bool,
    }

    impl FailingStore {
        fn new(candle_budget: Option<usize>, fail_commit: bool) -> Self {
            Self {
                inner: MemoryEntityStore::new(),
                candle_budget,
                fail_commit,
            }
        }
    }

    impl EntityStore for FailingStore {
        fn get_token(&self, denom: &str) -> Result<Option<Token>, StoreError> {
            self.inner.get_token(denom)
        }
        fn save_token(&mut self, token: &Token) -> Result<(), StoreError> {
            self.inner.save_token(token)
        }
        fn get_pair(&self, id: &str) -> Result<Option<Pair>, StoreError> {
            self.inner.get_pair(id)
        }
        fn save_pair(&mut self, pair: &Pair) -> Result<(), StoreError> {
            self.inner.save_pair(pair)
        }
        fn get_swap(&self, id: &str) -> Result<Option<Swap>, StoreError> {
            self.inner.get_swap(id)
        }
        fn save_swap(&mut self, swap: &Swap) -> Result<(), StoreError> {
            self.inner.save_swap(swap)
        }
        fn get_candle(&self, id: &str) -> Result<Option<Candle>, StoreError> {
            self.inner.get_candle(id)
        }
        fn save_candle(&mut self, candle: &Candle) -> Result<(), StoreError> {
            if let Some(budget) = self.candle_budget.as_mut() {
                if *budget == 0 {
                    return Err(StoreError::Database("disk full".to_string()));
                }
                *budget -= 1;
            }
            self.inner.save_candle(candle)
        }
        fn find_tokens(&self, filter: &TokenFilter) -> Result<Vec<Token>, StoreError> {
            self.inner.find_tokens(filter)
        }
        fn find_pairs(&self, filter: &PairFilter) -> Result<Vec<Pair>, StoreError> {
            self.inner.find_pairs(filter)
        }
        fn find_candles(&self, filter: &CandleFilter) -> Result<Vec<Candle>, StoreError> {
            self.inner.find_candles(filter)
        }
        fn begin(&mut self) -> Result<(), StoreError> {
            self.inner.begin()
        }
        fn commit(&mut self) -> Result<(), StoreError> {
            if self.fail_commit {
                return Err(StoreError::Database("commit refused".to_string()));
            }
            self.inner.commit()
        }
        fn rollback(&mut self) -> Result<(), StoreError> {
            self.inner.rollback()
        }
        fn backend_type(&self) -> &'static str {
            "Failing"
        }
    }

    fn assert_event_left_no_trace(engine: &PipelineEngine) {
        let store = engine.store();
        assert!(store.get_token(UOSMO).unwrap().is_none());
        assert!(store.get_token("uion").unwrap().is_none());
        assert!(store.get_pair("uosmo-uion-1").unwrap().is_none());
        assert!(store.get_pair("uion-uosmo").unwrap().is_none());
        assert!(store.get_swap("1-X").unwrap().is_none());
        assert!(store.find_candles(&CandleFilter::default()).unwrap().is_empty());
    }

    fn make_event(height: u64, sender: &str, pool: &str, tokens_in: &str, tokens_out: &str) -> SwapEvent {
        let mut attributes = HashMap::new();
        attributes.insert(ATTR_SENDER.to_string(), sender.to_string());
        attributes.insert(ATTR_POOL_ID.to_string(), pool.to_string());
        attributes.insert(ATTR_TOKENS_IN.to_string(), tokens_in.to_string());
        attributes.insert(ATTR_TOKENS_OUT.to_string(), tokens_out.to_string());
        SwapEvent {
            height,
            block_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 3, 0).unwrap(),
            attributes,
        }
    }

    fn make_engine() -> PipelineEngine {
        PipelineEngine::new(
            Box::new(MemoryEntityStore::new()),
            DenomRegistry::osmosis(),
            PricingConfig::default(),
        )
    }

    #[test]
    fn test_process_swap_writes_all_entities() {
        let mut engine = make_engine();
        let event = make_event(100, "X", "1", "1000000uosmo", &format!("50000{}", ATOM_DENOM));

        let outcome = engine.process_swap(&event).unwrap();
        assert_eq!(outcome.swap.id, "100-X");
        assert_eq!(outcome.candles_written, 8);

        let store = engine.store();
        assert!(store.get_token(UOSMO).unwrap().is_some());
        assert_eq!(store.get_token(ATOM_DENOM).unwrap().unwrap().symbol, "ATOM");
        assert!(store.get_pair(&format!("uosmo-{}-1", ATOM_DENOM)).unwrap().is_some());
        assert!(store.get_pair(&format!("{}-uosmo", ATOM_DENOM)).unwrap().is_some());

        let candle = store
            .get_candle(&format!("1-1704067200-{}-5m", ATOM_DENOM))
            .unwrap()
            .unwrap();
        assert_eq!(candle.open, 0.05);
        assert_eq!(candle.close, 0.05);
        assert_eq!(candle.volume, 0.05);
    }

    #[test]
    fn test_pricing_skipped_without_oracle_candles() {
        let mut engine = make_engine();
        let event = make_event(100, "X", "1", "1000000uosmo", &format!("50000{}", ATOM_DENOM));

        let outcome = engine.process_swap(&event).unwrap();
        // No OSMO/USDC daily candle yet for either token
        assert_eq!(outcome.skipped_compositions(), 2);
        assert!(engine.store().get_token(UOSMO).unwrap().unwrap().usd_price.is_none());
    }

    #[test]
    fn test_pricing_composes_once_oracle_exists() {
        let mut engine = make_engine();
        // 1 OSMO buys 0.5 USDC
        engine
            .process_swap(&make_event(99, "Y", "678", "2000000uosmo", &format!("1000000{}", USDC_DENOM)))
            .unwrap();

        let outcome = engine
            .process_swap(&make_event(100, "X", "1", "1000000uosmo", &format!("50000{}", ATOM_DENOM)))
            .unwrap();

        assert_eq!(
            outcome.pricing[0],
            CompositionOutcome::Composed {
                denom: UOSMO.to_string(),
                price_usd: 0.5
            }
        );
        // ATOM -> OSMO only observed as OSMO -> ATOM at 0.05, inverted
        assert_eq!(
            outcome.pricing[1],
            CompositionOutcome::Composed {
                denom: ATOM_DENOM.to_string(),
                price_usd: 10.0
            }
        );
        let atom = engine.store().get_token(ATOM_DENOM).unwrap().unwrap();
        assert_eq!(atom.usd_price.as_deref(), Some("10"));
    }

    #[test]
    fn test_missing_attribute_writes_nothing() {
        let mut engine = make_engine();
        let mut event = make_event(1, "X", "1", "1uosmo", "1uion");
        event.attributes.remove(ATTR_TOKENS_OUT);

        let err = engine.process_swap(&event).unwrap_err();
        assert!(matches!(err, PipelineError::MissingAttribute(ref k) if k == ATTR_TOKENS_OUT));
        assert!(engine.store().get_token(UOSMO).unwrap().is_none());
        assert!(engine.store().get_swap("1-X").unwrap().is_none());
    }

    #[test]
    fn test_zero_in_amount_still_recorded() {
        let mut engine = make_engine();
        let event = make_event(7, "Z", "1", "0uosmo", "10uion");

        let outcome = engine.process_swap(&event).unwrap();
        assert_eq!(outcome.swap.token_in_amount, 0);
        let candle = engine.store().get_candle("1-1704067200-uion-5m").unwrap().unwrap();
        assert!(candle.close.is_infinite());
    }

    #[test]
    fn test_store_failure_mid_event_rolls_back() {
        // Three candles land before the fourth write fails
        let store = FailingStore::new(Some(3), false);
        let mut engine = PipelineEngine::new(Box::new(store), DenomRegistry::osmosis(), PricingConfig::default());

        let err = engine
            .process_swap(&make_event(1, "X", "1", "100uosmo", "10uion"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Store(StoreError::Database(_))));
        assert!(engine.store().get_candle("1-1704067200-uion-5m").unwrap().is_none());
        assert_event_left_no_trace(&engine);
    }

    #[test]
    fn test_commit_failure_rolls_back() {
        let store = FailingStore::new(None, true);
        let mut engine = PipelineEngine::new(Box::new(store), DenomRegistry::osmosis(), PricingConfig::default());

        let err = engine
            .process_swap(&make_event(1, "X", "1", "100uosmo", "10uion"))
            .unwrap_err();
        assert!(err.to_string().contains("commit refused"));
        assert_event_left_no_trace(&engine);
    }
}
