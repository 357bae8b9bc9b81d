//! Entity persistence contract
//!
//! The pipeline treats persistence as a synchronous key-value store with
//! get/save per entity plus field-equality queries. Every event runs between
//! `begin` and `commit`; a failed event is rolled back.

use super::error::StoreError;
use super::types::{Candle, CandleFilter, Pair, PairFilter, Swap, Token, TokenFilter};
use std::collections::BTreeMap;

pub trait EntityStore {
    fn get_token(&self, denom: &str) -> Result<Option<Token>, StoreError>;
    fn save_token(&mut self, token: &Token) -> Result<(), StoreError>;

    fn get_pair(&self, id: &str) -> Result<Option<Pair>, StoreError>;
    fn save_pair(&mut self, pair: &Pair) -> Result<(), StoreError>;

    fn get_swap(&self, id: &str) -> Result<Option<Swap>, StoreError>;
    /// Create-only semantics; an existing id is overwritten
    fn save_swap(&mut self, swap: &Swap) -> Result<(), StoreError>;

    fn get_candle(&self, id: &str) -> Result<Option<Candle>, StoreError>;
    fn save_candle(&mut self, candle: &Candle) -> Result<(), StoreError>;

    fn find_tokens(&self, filter: &TokenFilter) -> Result<Vec<Token>, StoreError>;
    fn find_pairs(&self, filter: &PairFilter) -> Result<Vec<Pair>, StoreError>;
    /// Ordered by (timestamp, pool_id) ascending
    fn find_candles(&self, filter: &CandleFilter) -> Result<Vec<Candle>, StoreError>;

    fn begin(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Backend name for logging
    fn backend_type(&self) -> &'static str;
}

#[derive(Debug)]
enum Undo {
    Token(String, Option<Token>),
    Pair(String, Option<Pair>),
    Swap(String, Option<Swap>),
    Candle(String, Option<Candle>),
}

/// In-process store backed by ordered maps
///
/// Used by `--backend memory` dry runs and unit tests. Rollback replays an
/// undo journal recorded since `begin`.
#[derive(Debug, Default)]
pub struct MemoryEntityStore {
    tokens: BTreeMap<String, Token>,
    pairs: BTreeMap<String, Pair>,
    swaps: BTreeMap<String, Swap>,
    candles: BTreeMap<String, Candle>,
    journal: Option<Vec<Undo>>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn candle_count(&self) -> usize {
        self.candles.len()
    }

    pub fn swap_count(&self) -> usize {
        self.swaps.len()
    }

    fn record(&mut self, undo: Undo) {
        if let Some(journal) = self.journal.as_mut() {
            journal.push(undo);
        }
    }
}

impl EntityStore for MemoryEntityStore {
    fn get_token(&self, denom: &str) -> Result<Option<Token>, StoreError> {
        Ok(self.tokens.get(denom).cloned())
    }

    fn save_token(&mut self, token: &Token) -> Result<(), StoreError> {
        let previous = self.tokens.insert(token.denom.clone(), token.clone());
        self.record(Undo::Token(token.denom.clone(), previous));
        Ok(())
    }

    fn get_pair(&self, id: &str) -> Result<Option<Pair>, StoreError> {
        Ok(self.pairs.get(id).cloned())
    }

    fn save_pair(&mut self, pair: &Pair) -> Result<(), StoreError> {
        let previous = self.pairs.insert(pair.id.clone(), pair.clone());
        self.record(Undo::Pair(pair.id.clone(), previous));
        Ok(())
    }

    fn get_swap(&self, id: &str) -> Result<Option<Swap>, StoreError> {
        Ok(self.swaps.get(id).cloned())
    }

    fn save_swap(&mut self, swap: &Swap) -> Result<(), StoreError> {
        let previous = self.swaps.insert(swap.id.clone(), swap.clone());
        self.record(Undo::Swap(swap.id.clone(), previous));
        Ok(())
    }

    fn get_candle(&self, id: &str) -> Result<Option<Candle>, StoreError> {
        Ok(self.candles.get(id).cloned())
    }

    fn save_candle(&mut self, candle: &Candle) -> Result<(), StoreError> {
        let previous = self.candles.insert(candle.id.clone(), candle.clone());
        self.record(Undo::Candle(candle.id.clone(), previous));
        Ok(())
    }

    fn find_tokens(&self, filter: &TokenFilter) -> Result<Vec<Token>, StoreError> {
        Ok(self
            .tokens
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    fn find_pairs(&self, filter: &PairFilter) -> Result<Vec<Pair>, StoreError> {
        Ok(self
            .pairs
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    fn find_candles(&self, filter: &CandleFilter) -> Result<Vec<Candle>, StoreError> {
        let mut candles: Vec<Candle> = self
            .candles
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        candles.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.pool_id.cmp(&b.pool_id))
        });
        Ok(candles)
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        self.journal = Some(Vec::new());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.journal = None;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        let Some(journal) = self.journal.take() else {
            return Ok(());
        };

        for undo in journal.into_iter().rev() {
            match undo {
                Undo::Token(key, Some(prev)) => {
                    self.tokens.insert(key, prev);
                }
                Undo::Token(key, None) => {
                    self.tokens.remove(&key);
                }
                Undo::Pair(key, Some(prev)) => {
                    self.pairs.insert(key, prev);
                }
                Undo::Pair(key, None) => {
                    self.pairs.remove(&key);
                }
                Undo::Swap(key, Some(prev)) => {
                    self.swaps.insert(key, prev);
                }
                Undo::Swap(key, None) => {
                    self.swaps.remove(&key);
                }
                Undo::Candle(key, Some(prev)) => {
                    self.candles.insert(key, prev);
                }
                Undo::Candle(key, None) => {
                    self.candles.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "Memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_after_save() {
        let mut store = MemoryEntityStore::new();
        assert!(store.get_token("uosmo").unwrap().is_none());

        store.save_token(&Token::new("uosmo")).unwrap();
        assert_eq!(store.get_token("uosmo").unwrap().unwrap().denom, "uosmo");
    }

    #[test]
    fn test_rollback_restores_previous_state() {
        let mut store = MemoryEntityStore::new();
        store.save_token(&Token::new("uosmo")).unwrap();

        store.begin().unwrap();
        let mut updated = Token::new("uosmo");
        updated.usd_price = Some("0.5".to_string());
        store.save_token(&updated).unwrap();
        store.save_token(&Token::new("uatom")).unwrap();
        store.rollback().unwrap();

        assert_eq!(store.get_token("uosmo").unwrap().unwrap().usd_price, None);
        assert!(store.get_token("uatom").unwrap().is_none());
    }

    #[test]
    fn test_commit_keeps_writes() {
        let mut store = MemoryEntityStore::new();
        store.begin().unwrap();
        store.save_token(&Token::new("uatom")).unwrap();
        store.commit().unwrap();
        store.rollback().unwrap(); // no open journal: no-op

        assert!(store.get_token("uatom").unwrap().is_some());
    }

    #[test]
    fn test_find_tokens_by_symbol() {
        let mut store = MemoryEntityStore::new();
        let mut osmo = Token::new("uosmo");
        osmo.symbol = "OSMO".to_string();
        store.save_token(&osmo).unwrap();
        store.save_token(&Token::new("uatom")).unwrap();

        let found = store
            .find_tokens(&TokenFilter {
                symbol: Some("OSMO".to_string()),
            })
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].denom, "uosmo");
    }
}
