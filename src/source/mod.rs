//! Inbound swap event sources
//!
//! A source yields `SwapEvent`s in chain order. `run_event_source` pumps one
//! into the ingestion channel.

pub mod jsonl_reader;

pub use jsonl_reader::JsonlSwapReader;

use crate::pipeline::types::SwapEvent;
use async_trait::async_trait;
use tokio::sync::mpsc;

#[derive(Debug)]
pub enum SourceError {
    Io(std::io::Error),
    Parse {
        line: u64,
        source: serde_json::Error,
    },
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        SourceError::Io(err)
    }
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Io(e) => write!(f, "IO error: {}", e),
            SourceError::Parse { line, source } => {
                write!(f, "Parse error on line {}: {}", line, source)
            }
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::Io(e) => Some(e),
            SourceError::Parse { source, .. } => Some(source),
        }
    }
}

/// Producer side of the ingestion channel
#[async_trait]
pub trait SwapEventSource: Send {
    /// Next event, or `None` once the source is exhausted
    async fn next_event(&mut self) -> Result<Option<SwapEvent>, SourceError>;

    /// Source name for logging
    fn source_type(&self) -> &'static str;
}

/// Forward every event from `source` into `tx`
///
/// Stops when the source is exhausted or the receiver is gone. Returns the
/// number of events sent.
pub async fn run_event_source<S>(mut source: S, tx: mpsc::Sender<SwapEvent>) -> Result<u64, SourceError>
where
    S: SwapEventSource,
{
    log::info!("📡 Event source started: {}", source.source_type());
    let mut sent = 0u64;

    while let Some(event) = source.next_event().await? {
        if tx.send(event).await.is_err() {
            log::warn!("⚠️  Ingestion channel closed, stopping {} source", source.source_type());
            break;
        }
        sent += 1;
    }

    log::info!("✅ Event source finished: {} events sent", sent);
    Ok(sent)
}
