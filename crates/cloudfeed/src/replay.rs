//! Replay of an NDJSON change stream into a sink.
//!
//! Each input line is either a row event
//!
//! ```json
//! {"topic": "orders", "schema_version": 1, "updated": "1546300800000000000.0000000000", "value": {"id": 1}}
//! ```
//!
//! or a resolved timestamp event, `{"resolved": "1546300800000000000.0000000000"}`.
//! A resolved event flushes every open buffer before its marker is written,
//! so a marker never precedes the data files it covers.

use clap::Parser;
use serde::Deserialize;
use snafu::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cloudfeed_core::shutdown_signal;

use crate::config::SinkConfig;
use crate::encoder::JsonEncoder;
use crate::error::{ConfigError, SinkError};
use crate::frontier::{Span, SpanFrontier};
use crate::hlc::Timestamp;
use crate::sink::CloudStorageSink;

#[derive(Parser, Debug)]
#[command(version, about = "Replay an NDJSON changefeed from stdin into cloud storage")]
pub struct CliArgs {
    /// Path to the sink configuration file
    #[arg(short, long)]
    pub config: PathBuf,
}

/// Errors that end a replay.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ReplayError {
    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Sink error.
    #[snafu(display("Sink error: {source}"))]
    Sink { source: SinkError },

    /// Reading the input failed.
    #[snafu(display("Failed to read input: {source}"))]
    ReadInput { source: std::io::Error },

    /// An input line is not a valid event.
    #[snafu(display("Invalid event on line {line}: {source}"))]
    ParseEvent {
        line: usize,
        source: serde_json::Error,
    },

    /// A row value could not be serialized.
    #[snafu(display("Failed to serialize row on line {line}: {source}"))]
    EncodeRow {
        line: usize,
        source: serde_json::Error,
    },

    /// A shutdown signal arrived before the input was exhausted.
    #[snafu(display("Replay interrupted"))]
    Interrupted,
}

impl From<SinkError> for ReplayError {
    fn from(source: SinkError) -> Self {
        ReplayError::Sink { source }
    }
}

impl From<ConfigError> for ReplayError {
    fn from(source: ConfigError) -> Self {
        ReplayError::Config { source }
    }
}

/// One line of replay input.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ReplayEvent {
    Resolved {
        resolved: Timestamp,
    },
    Row {
        topic: String,
        #[serde(default)]
        schema_version: u32,
        updated: Timestamp,
        value: serde_json::Value,
    },
}

/// Counts of events applied by [`replay`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub rows: u64,
    pub resolved: u64,
}

/// Feed every event in `input` to `sink`, then flush.
///
/// Resolved events forward `frontier` over the whole key space, flush the
/// sink and write a marker, in that order.
pub async fn replay<R>(
    sink: &mut CloudStorageSink,
    frontier: &SpanFrontier,
    input: R,
    cancel: &CancellationToken,
) -> Result<ReplayStats, ReplayError>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = ReplayStats::default();
    let mut lines = input.lines();
    let mut line_number: usize = 0;

    loop {
        let line = tokio::select! {
            biased;

            _ = cancel.cancelled() => return InterruptedSnafu.fail(),

            line = lines.next_line() => line.context(ReadInputSnafu)?,
        };
        let Some(line) = line else {
            break;
        };
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }

        let event: ReplayEvent = serde_json::from_str(&line).context(ParseEventSnafu {
            line: line_number,
        })?;

        match event {
            ReplayEvent::Row {
                topic,
                schema_version,
                updated,
                value,
            } => {
                let value = serde_json::to_vec(&value).context(EncodeRowSnafu {
                    line: line_number,
                })?;
                sink.emit_row(cancel, &topic, schema_version, &value, updated)
                    .await?;
                stats.rows += 1;
            }
            ReplayEvent::Resolved { resolved } => {
                if frontier.forward(&Span::all(), resolved) {
                    debug!(frontier = %resolved, "Frontier advanced");
                }
                sink.flush(cancel).await?;
                sink.emit_resolved_timestamp(cancel, &JsonEncoder, resolved)
                    .await?;
                stats.resolved += 1;
            }
        }
    }

    sink.flush(cancel).await?;
    Ok(stats)
}

/// Run the replay tool: load the config, replay stdin, close the sink.
pub async fn run(args: CliArgs) -> Result<ReplayStats, ReplayError> {
    let config = SinkConfig::from_file(&args.config)?;
    info!(uri = %config.uri, session_id = %config.session_id, "Loaded sink config");

    let frontier = Arc::new(SpanFrontier::new([Span::all()]));
    let mut sink = CloudStorageSink::new(&config, frontier.clone()).await?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        match shutdown_signal().await {
            Ok(()) => signal_cancel.cancel(),
            Err(e) => warn!(error = %e, "Failed to install signal handlers"),
        }
    });

    let result = replay(
        &mut sink,
        &frontier,
        BufReader::new(tokio::io::stdin()),
        &cancel,
    )
    .await;

    // Close regardless; unflushed rows from a failed replay are discarded.
    let closed = sink.close().await;
    let stats = result?;
    closed?;
    Ok(stats)
}
