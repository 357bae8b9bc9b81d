//! JSONL swap event reader with optional follow mode
//!
//! Replays the file from the first line. In follow mode EOF means "wait":
//! the reader polls for appended lines and reopens the file from the start
//! when its inode changes (rotation). Unparseable lines are skipped with a
//! warning.

use super::{SourceError, SwapEventSource};
use crate::pipeline::types::SwapEvent;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::sleep;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

pub struct JsonlSwapReader {
    path: PathBuf,
    file: Option<BufReader<File>>,
    inode: Option<u64>,
    follow: bool,
    poll_interval: Duration,
    /// Bytes of a line whose newline has not arrived yet
    pending: String,
    line_no: u64,
    skipped_lines: u64,
}

impl JsonlSwapReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            inode: None,
            follow: false,
            poll_interval: Duration::from_millis(500),
            pending: String::new(),
            line_no: 0,
            skipped_lines: 0,
        }
    }

    /// Keep polling for appended lines instead of ending at EOF
    pub fn follow(mut self, poll_interval: Duration) -> Self {
        self.follow = true;
        self.poll_interval = poll_interval;
        self
    }

    /// Lines dropped because they did not parse
    pub fn skipped_lines(&self) -> u64 {
        self.skipped_lines
    }

    async fn open(&mut self) -> std::io::Result<()> {
        let file = File::open(&self.path).await?;

        #[cfg(unix)]
        {
            let metadata = file.metadata().await?;
            self.inode = Some(metadata.ino());
        }

        self.file = Some(BufReader::new(file));
        self.pending.clear();
        log::info!("📖 Reading swap events: {}", self.path.display());
        Ok(())
    }

    async fn detect_rotation(&self) -> std::io::Result<bool> {
        #[cfg(unix)]
        {
            // Between unlink and recreate the path is briefly absent
            let metadata = match tokio::fs::metadata(&self.path).await {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
                Err(e) => return Err(e),
            };
            Ok(self.inode.is_some_and(|old| old != metadata.ino()))
        }

        #[cfg(not(unix))]
        {
            Ok(false)
        }
    }

    /// Next complete, non-blank line
    async fn read_line(&mut self) -> Result<Option<String>, SourceError> {
        if self.file.is_none() {
            self.open().await?;
        }

        loop {
            let Some(reader) = self.file.as_mut() else {
                return Ok(None);
            };

            let mut chunk = String::new();
            let read = reader.read_line(&mut chunk).await?;

            if read == 0 {
                if !self.follow {
                    // Last line without a trailing newline
                    if self.pending.trim().is_empty() {
                        return Ok(None);
                    }
                    self.line_no += 1;
                    return Ok(Some(std::mem::take(&mut self.pending)));
                }

                if self.detect_rotation().await? {
                    log::info!("🔄 File rotation detected, reopening: {}", self.path.display());
                    self.open().await?;
                    continue;
                }
                sleep(self.poll_interval).await;
                continue;
            }

            self.pending.push_str(&chunk);
            if !self.pending.ends_with('\n') {
                continue;
            }

            self.line_no += 1;
            let line = std::mem::take(&mut self.pending);
            if !line.trim().is_empty() {
                return Ok(Some(line));
            }
        }
    }
}

/// Parse one JSONL line into a swap event
pub fn parse_line(line: &str, line_no: u64) -> Result<SwapEvent, SourceError> {
    serde_json::from_str(line.trim()).map_err(|source| SourceError::Parse {
        line: line_no,
        source,
    })
}

#[async_trait]
impl SwapEventSource for JsonlSwapReader {
    async fn next_event(&mut self) -> Result<Option<SwapEvent>, SourceError> {
        while let Some(line) = self.read_line().await? {
            match parse_line(&line, self.line_no) {
                Ok(event) => return Ok(Some(event)),
                Err(e) => {
                    self.skipped_lines += 1;
                    log::warn!("⚠️  Skipping malformed swap event: {}", e);
                }
            }
        }
        Ok(None)
    }

    fn source_type(&self) -> &'static str {
        "JSONL"
    }
}
