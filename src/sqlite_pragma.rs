//! Shared SQLite connection tuning

use rusqlite::Connection;

/// Apply the PRAGMAs used by every candleflow connection
///
/// - WAL journal so `candle_query` can read while the runtime writes
/// - NORMAL sync (durable at checkpoint, fast per-event commits)
/// - in-memory temp store, 256MB mmap, ~64MB page cache
/// - autocheckpoint every 1000 pages
pub fn apply_optimized_pragmas(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.pragma_update(None, "mmap_size", 268_435_456i64)?;
    conn.pragma_update(None, "cache_size", -64_000i64)?;
    conn.pragma_update(None, "wal_autocheckpoint", 1000)?;
    Ok(())
}
