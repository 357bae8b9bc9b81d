//! Append-only swap log

use super::denom::parse_amount;
use super::error::StoreError;
use super::store::EntityStore;
use super::types::{Swap, Token};

/// Persist one swap keyed `{height}-{sender}`
///
/// No read-before-write: a repeated key silently replaces the earlier row.
/// Malformed amount strings record as 0.
#[allow(clippy::too_many_arguments)]
pub fn record_swap(
    store: &mut dyn EntityStore,
    token_in: &Token,
    token_out: &Token,
    height: u64,
    sender: &str,
    pool_id: &str,
    raw_in: &str,
    raw_out: &str,
) -> Result<Swap, StoreError> {
    let swap = Swap {
        id: format!("{}-{}", height, sender),
        height,
        sender: sender.to_string(),
        pool_id: pool_id.to_string(),
        token_in: token_in.denom.clone(),
        token_out: token_out.denom.clone(),
        token_in_amount: parse_amount(raw_in),
        token_out_amount: parse_amount(raw_out),
    };

    store.save_swap(&swap)?;
    Ok(swap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::store::MemoryEntityStore;

    #[test]
    fn test_record_swap() {
        let mut store = MemoryEntityStore::new();
        let swap = record_swap(
            &mut store,
            &Token::new("uosmo"),
            &Token::new("uatom"),
            100,
            "X",
            "1",
            "1000000uosmo",
            "50000uatom",
        )
        .unwrap();

        assert_eq!(swap.id, "100-X");
        assert_eq!(swap.token_in_amount, 1_000_000);
        assert_eq!(swap.token_out_amount, 50_000);
        assert_eq!(store.get_swap("100-X").unwrap().unwrap(), swap);
    }

    #[test]
    fn test_malformed_amount_records_zero() {
        let mut store = MemoryEntityStore::new();
        let swap = record_swap(
            &mut store,
            &Token::new("uosmo"),
            &Token::new("uatom"),
            1,
            "X",
            "1",
            "uosmo",
            "",
        )
        .unwrap();

        assert_eq!(swap.token_in_amount, 0);
        assert_eq!(swap.token_out_amount, 0);
    }

    #[test]
    fn test_duplicate_key_last_write_wins() {
        let mut store = MemoryEntityStore::new();
        let osmo = Token::new("uosmo");
        let atom = Token::new("uatom");
        record_swap(&mut store, &osmo, &atom, 5, "X", "1", "10uosmo", "1uatom").unwrap();
        record_swap(&mut store, &atom, &osmo, 5, "X", "2", "3uatom", "30uosmo").unwrap();

        let stored = store.get_swap("5-X").unwrap().unwrap();
        assert_eq!(stored.pool_id, "2");
        assert_eq!(stored.token_in, "uatom");
        assert_eq!(store.swap_count(), 1);
    }
}
