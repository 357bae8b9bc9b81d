//! Candle Query - read-only JSON dumps of the entity tables
//!
//! Usage:
//!   candle_query tokens  [--symbol OSMO]
//!   candle_query pairs   [--symbol OSMO-ATOM] [--pool 1] [--base uosmo] [--quote uion]
//!   candle_query candles [--pool 1] [--base uosmo] [--quote uion] [--interval 1h] [--timestamp 1704067200]
//!   candle_query swap    --id 100-X
//!
//! Reads `CANDLEFLOW_DB_PATH` (default: data/candleflow.db).

use candleflow::pipeline::{CandleFilter, EntityStore, PairFilter, SqliteEntityStore, TokenFilter};
use dotenv::dotenv;
use std::env;

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|x| x == flag)
        .and_then(|idx| args.get(idx + 1))
        .cloned()
}

fn usage() -> Box<dyn std::error::Error> {
    "usage: candle_query <tokens|pairs|candles|swap> [--symbol S] [--pool P] [--base B] [--quote Q] [--interval I] [--timestamp T] [--id ID]".into()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).ok_or_else(usage)?;

    let db_path = env::var("CANDLEFLOW_DB_PATH").unwrap_or_else(|_| "data/candleflow.db".to_string());
    let store = SqliteEntityStore::open_read_only(&db_path)?;
    log::debug!("📖 Querying {}", db_path);

    let output = match command {
        "tokens" => {
            let filter = TokenFilter {
                symbol: arg_value(&args, "--symbol"),
            };
            serde_json::to_string_pretty(&store.find_tokens(&filter)?)?
        }
        "pairs" => {
            let filter = PairFilter {
                symbol: arg_value(&args, "--symbol"),
                pool_id: arg_value(&args, "--pool"),
                base_asset: arg_value(&args, "--base"),
                quote_asset: arg_value(&args, "--quote"),
            };
            serde_json::to_string_pretty(&store.find_pairs(&filter)?)?
        }
        "candles" => {
            let timestamp = match arg_value(&args, "--timestamp") {
                Some(raw) => Some(raw.parse::<i64>()?),
                None => None,
            };
            let filter = CandleFilter {
                pool_id: arg_value(&args, "--pool"),
                base: arg_value(&args, "--base"),
                quote: arg_value(&args, "--quote"),
                interval: arg_value(&args, "--interval"),
                timestamp,
            };
            serde_json::to_string_pretty(&store.find_candles(&filter)?)?
        }
        "swap" => {
            let id = arg_value(&args, "--id").ok_or_else(usage)?;
            serde_json::to_string_pretty(&store.get_swap(&id)?)?
        }
        _ => return Err(usage()),
    };

    println!("{}", output);
    Ok(())
}
