//! SQLite persistence for tokens, pairs, swaps and candles
//!
//! Schema lives in `sql/*.sql` and is applied by [`run_schema_migrations`].
//! [`SqliteEntityStore`] implements [`EntityStore`] on a single connection
//! owned by the ingestion worker.

use super::error::StoreError;
use super::store::EntityStore;
use super::types::{Candle, CandleFilter, Pair, PairFilter, Swap, Token, TokenFilter};
use crate::sqlite_pragma::apply_optimized_pragmas;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, Row};
use std::fs;
use std::path::Path;

const TOKEN_COLUMNS: &str = "denom, name, symbol, decimals, usd_price";
const PAIR_COLUMNS: &str = "id, symbol, base_asset, quote_asset, name, pool_id";
const SWAP_COLUMNS: &str =
    "id, height, sender, pool_id, token_in, token_out, token_in_amount, token_out_amount";
const CANDLE_COLUMNS: &str =
    "id, pool_id, base, quote, interval, timestamp, open, high, low, close, volume";

/// Run schema migrations from SQL files
///
/// Executes every `.sql` file in `schema_dir` in filename order
/// (`01_`, `02_`, ...). Files must be idempotent (`IF NOT EXISTS`).
pub fn run_schema_migrations(conn: &mut Connection, schema_dir: &str) -> Result<(), StoreError> {
    let schema_path = Path::new(schema_dir);

    if !schema_path.exists() {
        return Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Schema directory not found: {}", schema_dir),
        )));
    }

    let mut sql_files: Vec<_> = fs::read_dir(schema_path)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().and_then(|s| s.to_str()) == Some("sql"))
        .collect();

    sql_files.sort_by_key(|entry| entry.file_name());

    log::info!("🔧 Running schema migrations from: {}", schema_dir);

    for entry in sql_files {
        let path = entry.path();
        let filename = entry.file_name().to_string_lossy().to_string();

        log::info!("   ├─ Executing: {}", filename);
        let sql_content = fs::read_to_string(&path)?;
        conn.execute_batch(&sql_content)?;
    }

    log::info!("✅ All schema migrations completed successfully");

    Ok(())
}

/// SQLite implementation of [`EntityStore`]
pub struct SqliteEntityStore {
    conn: Connection,
    in_transaction: bool,
}

impl SqliteEntityStore {
    /// Open (creating parent directories) a database that already has the schema
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        apply_optimized_pragmas(&conn)?;

        Ok(Self {
            conn,
            in_transaction: false,
        })
    }

    /// Open an existing database for queries only
    ///
    /// Never creates the file or its directory; writes fail at the SQLite level.
    pub fn open_read_only(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch("PRAGMA query_only = ON")?;

        Ok(Self {
            conn,
            in_transaction: false,
        })
    }

    /// Open, migrate from `schema_dir`, and return the store
    pub fn open_with_schema(db_path: impl AsRef<Path>, schema_dir: &str) -> Result<Self, StoreError> {
        let mut store = Self::open(db_path)?;
        run_schema_migrations(&mut store.conn, schema_dir)?;
        Ok(store)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Nullable REAL column; NULL reads back as NaN
fn real(row: &Row, idx: usize) -> rusqlite::Result<f64> {
    Ok(row.get::<_, Option<f64>>(idx)?.unwrap_or(f64::NAN))
}

fn amount(row: &Row, idx: usize) -> rusqlite::Result<u128> {
    let text: String = row.get(idx)?;
    text.parse::<u128>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn token_from_row(row: &Row) -> rusqlite::Result<Token> {
    Ok(Token {
        denom: row.get(0)?,
        name: row.get(1)?,
        symbol: row.get(2)?,
        decimals: row.get(3)?,
        usd_price: row.get(4)?,
    })
}

fn pair_from_row(row: &Row) -> rusqlite::Result<Pair> {
    Ok(Pair {
        id: row.get(0)?,
        symbol: row.get(1)?,
        base_asset: row.get(2)?,
        quote_asset: row.get(3)?,
        name: row.get(4)?,
        pool_id: row.get(5)?,
    })
}

fn swap_from_row(row: &Row) -> rusqlite::Result<Swap> {
    Ok(Swap {
        id: row.get(0)?,
        height: row.get::<_, i64>(1)? as u64,
        sender: row.get(2)?,
        pool_id: row.get(3)?,
        token_in: row.get(4)?,
        token_out: row.get(5)?,
        token_in_amount: amount(row, 6)?,
        token_out_amount: amount(row, 7)?,
    })
}

fn candle_from_row(row: &Row) -> rusqlite::Result<Candle> {
    Ok(Candle {
        id: row.get(0)?,
        pool_id: row.get(1)?,
        base: row.get(2)?,
        quote: row.get(3)?,
        interval: row.get(4)?,
        timestamp: row.get(5)?,
        open: real(row, 6)?,
        high: real(row, 7)?,
        low: real(row, 8)?,
        close: real(row, 9)?,
        volume: real(row, 10)?,
    })
}

/// Build ` WHERE a = ? AND b = ?` from (column, value) pairs
fn where_clause(conditions: &[(&str, Value)]) -> String {
    if conditions.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = conditions
        .iter()
        .map(|(column, _)| format!("{} = ?", column))
        .collect();
    format!(" WHERE {}", parts.join(" AND "))
}

fn text(value: &Option<String>) -> Option<Value> {
    value.as_ref().map(|v| Value::Text(v.clone()))
}

impl SqliteEntityStore {
    fn query_filtered<T>(
        &self,
        table: &str,
        columns: &str,
        conditions: Vec<(&str, Value)>,
        order_by: &str,
        map: fn(&Row) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY {}",
            columns,
            table,
            where_clause(&conditions),
            order_by
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params_from_iter(conditions.iter().map(|(_, v)| v)), map)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

impl EntityStore for SqliteEntityStore {
    fn get_token(&self, denom: &str) -> Result<Option<Token>, StoreError> {
        let sql = format!("SELECT {} FROM tokens WHERE denom = ?1", TOKEN_COLUMNS);
        let mut stmt = self.conn.prepare_cached(&sql)?;
        Ok(stmt.query_row(params![denom], token_from_row).optional()?)
    }

    fn save_token(&mut self, token: &Token) -> Result<(), StoreError> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            INSERT INTO tokens (denom, name, symbol, decimals, usd_price)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(denom) DO UPDATE SET
                name = excluded.name,
                symbol = excluded.symbol,
                decimals = excluded.decimals,
                usd_price = excluded.usd_price
            "#,
        )?;
        stmt.execute(params![
            token.denom,
            token.name,
            token.symbol,
            token.decimals,
            token.usd_price,
        ])?;
        Ok(())
    }

    fn get_pair(&self, id: &str) -> Result<Option<Pair>, StoreError> {
        let sql = format!("SELECT {} FROM pairs WHERE id = ?1", PAIR_COLUMNS);
        let mut stmt = self.conn.prepare_cached(&sql)?;
        Ok(stmt.query_row(params![id], pair_from_row).optional()?)
    }

    fn save_pair(&mut self, pair: &Pair) -> Result<(), StoreError> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            INSERT INTO pairs (id, symbol, base_asset, quote_asset, name, pool_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                symbol = excluded.symbol,
                base_asset = excluded.base_asset,
                quote_asset = excluded.quote_asset,
                name = excluded.name,
                pool_id = excluded.pool_id
            "#,
        )?;
        stmt.execute(params![
            pair.id,
            pair.symbol,
            pair.base_asset,
            pair.quote_asset,
            pair.name,
            pair.pool_id,
        ])?;
        Ok(())
    }

    fn get_swap(&self, id: &str) -> Result<Option<Swap>, StoreError> {
        let sql = format!("SELECT {} FROM swaps WHERE id = ?1", SWAP_COLUMNS);
        let mut stmt = self.conn.prepare_cached(&sql)?;
        Ok(stmt.query_row(params![id], swap_from_row).optional()?)
    }

    fn save_swap(&mut self, swap: &Swap) -> Result<(), StoreError> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            INSERT OR REPLACE INTO swaps
                (id, height, sender, pool_id, token_in, token_out, token_in_amount, token_out_amount)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )?;
        stmt.execute(params![
            swap.id,
            swap.height as i64,
            swap.sender,
            swap.pool_id,
            swap.token_in,
            swap.token_out,
            swap.token_in_amount.to_string(),
            swap.token_out_amount.to_string(),
        ])?;
        Ok(())
    }

    fn get_candle(&self, id: &str) -> Result<Option<Candle>, StoreError> {
        let sql = format!("SELECT {} FROM candles WHERE id = ?1", CANDLE_COLUMNS);
        let mut stmt = self.conn.prepare_cached(&sql)?;
        Ok(stmt.query_row(params![id], candle_from_row).optional()?)
    }

    fn save_candle(&mut self, candle: &Candle) -> Result<(), StoreError> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            INSERT INTO candles
                (id, pool_id, base, quote, interval, timestamp, open, high, low, close, volume)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(id) DO UPDATE SET
                high = excluded.high,
                low = excluded.low,
                close = excluded.close,
                volume = excluded.volume
            "#,
        )?;
        stmt.execute(params![
            candle.id,
            candle.pool_id,
            candle.base,
            candle.quote,
            candle.interval,
            candle.timestamp,
            candle.open,
            candle.high,
            candle.low,
            candle.close,
            candle.volume,
        ])?;
        Ok(())
    }

    fn find_tokens(&self, filter: &TokenFilter) -> Result<Vec<Token>, StoreError> {
        let conditions: Vec<(&str, Value)> = [("symbol", text(&filter.symbol))]
            .into_iter()
            .filter_map(|(c, v)| v.map(|v| (c, v)))
            .collect();
        self.query_filtered("tokens", TOKEN_COLUMNS, conditions, "denom ASC", token_from_row)
    }

    fn find_pairs(&self, filter: &PairFilter) -> Result<Vec<Pair>, StoreError> {
        let conditions: Vec<(&str, Value)> = [
            ("symbol", text(&filter.symbol)),
            ("pool_id", text(&filter.pool_id)),
            ("base_asset", text(&filter.base_asset)),
            ("quote_asset", text(&filter.quote_asset)),
        ]
        .into_iter()
        .filter_map(|(c, v)| v.map(|v| (c, v)))
        .collect();
        self.query_filtered("pairs", PAIR_COLUMNS, conditions, "id ASC", pair_from_row)
    }

    fn find_candles(&self, filter: &CandleFilter) -> Result<Vec<Candle>, StoreError> {
        let conditions: Vec<(&str, Value)> = [
            ("pool_id", text(&filter.pool_id)),
            ("base", text(&filter.base)),
            ("quote", text(&filter.quote)),
            ("interval", text(&filter.interval)),
            ("timestamp", filter.timestamp.map(Value::Integer)),
        ]
        .into_iter()
        .filter_map(|(c, v)| v.map(|v| (c, v)))
        .collect();
        self.query_filtered(
            "candles",
            CANDLE_COLUMNS,
            conditions,
            "timestamp ASC, pool_id ASC",
            candle_from_row,
        )
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        if self.in_transaction {
            self.conn.execute_batch("COMMIT")?;
            self.in_transaction = false;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        if self.in_transaction {
            self.conn.execute_batch("ROLLBACK")?;
            self.in_transaction = false;
        }
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}
