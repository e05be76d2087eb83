//! Streaming line-processing pipeline.
//!
//! Consumes an ordered stream of comma-delimited address lines, verifies
//! each record through the active provider, and emits one output line per
//! input line, in input order. The first line is treated as a column header
//! and passed through verbatim.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::AppError;
use crate::provider::{LookupResult, Provider};
use crate::retry;

// ─────────────────────────────────────────────────────────────────────────────
// Record
// ─────────────────────────────────────────────────────────────────────────────

/// One three-field address record parsed from an input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub street: String,
    pub city: String,
    pub postal_code: String,
}

impl Record {
    /// Parses a comma-delimited line into a record.
    ///
    /// Returns `None` unless the line splits into exactly three fields.
    /// Fields are taken as-is — no trimming; malformed field contents are
    /// the provider's to reject.
    pub fn parse(line: &str) -> Option<Record> {
        let mut fields = line.split(',');
        match (fields.next(), fields.next(), fields.next(), fields.next()) {
            (Some(street), Some(city), Some(postal_code), None) => Some(Record {
                street: street.to_string(),
                city: city.to_string(),
                postal_code: postal_code.to_string(),
            }),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline
// ─────────────────────────────────────────────────────────────────────────────

/// Sequences the line processor over a full input stream.
pub struct Pipeline {
    /// The active provider, shared read-only across all records.
    provider: Arc<dyn Provider>,
}

impl Pipeline {
    /// Creates a pipeline around the given provider.
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    /// Processes the input stream to completion.
    ///
    /// The first line is passed through unchanged. Every subsequent line is
    /// fully processed — including any rate-limit waits — before the next
    /// line is read, so output order always matches input order. Each output
    /// line is flushed as soon as it is produced.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the input or output stream itself fails.
    /// Per-record verification failures never abort the run.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<(), AppError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut header_seen = false;
        let mut processed: u64 = 0;

        while let Some(line) = lines.next_line().await? {
            let output = if header_seen {
                processed += 1;
                self.process_line(&line).await
            } else {
                // The first line is the column header — never submitted for
                // verification.
                header_seen = true;
                line
            };

            writer.write_all(output.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }

        debug!("Input stream exhausted after {} records", processed);
        Ok(())
    }

    /// Turns one raw record line into one output line.
    async fn process_line(&self, line: &str) -> String {
        let result = match Record::parse(line) {
            Some(record) => {
                retry::verify_with_retry(
                    || {
                        self.provider
                            .lookup(&record.street, &record.city, &record.postal_code)
                    },
                    self.provider.rate_limit_status(),
                    self.provider.rate_limit_ceiling(),
                )
                .await
            }
            // Lines that do not split into exactly three fields never reach
            // the provider.
            None => LookupResult::Unresolvable,
        };

        format!("{} -> {}", line, result)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
