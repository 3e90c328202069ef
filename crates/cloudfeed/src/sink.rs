//! Cloud storage sink controller.
//!
//! Rows are accumulated per (topic, schema version) and cut into files once a
//! buffer grows past the target size or the caller flushes. Resolved
//! timestamps are written as separate marker files. Both kinds of file are
//! named so that listing the output location lexicographically yields them in
//! timestamp order (see [`crate::naming`]).
//!
//! A sink never retries a failed write. A buffer is only dropped once its file
//! is confirmed written, so after an error the caller can flush again.

use bytes::{Bytes, BytesMut};
use object_store::path::Path;
use snafu::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use cloudfeed_core::emit;
use cloudfeed_core::metrics::events::{
    DataFileWritten, FlushFailed, OpenBuffers, ResolvedFileWritten, RowsEmitted, RowsSuppressed,
};
use cloudfeed_core::{ExternalStorage, StorageProvider};

use crate::buffer::{BufferTable, FileBuffer, SinkKey};
use crate::config::{OutputFormat, SinkConfig};
use crate::encoder::Encoder;
use crate::error::{CancelledSnafu, ClosedSnafu, ConfigSnafu, SinkError, StorageSnafu, WriteSnafu};
use crate::frontier::Frontier;
use crate::hlc::Timestamp;
use crate::naming::{DataFileName, build_resolved_path};

/// Process-wide source of sink identities. Never reset.
static SINK_ID_ALLOCATOR: AtomicI64 = AtomicI64::new(0);

fn next_sink_id() -> i64 {
    SINK_ID_ALLOCATOR.fetch_add(1, Ordering::Relaxed) + 1
}

/// Emits changefeed rows and resolved timestamps as files in cloud storage.
///
/// All operations take `&mut self`; a sink is driven by a single task.
/// Several sinks may write to the same location concurrently, since every file
/// name carries the node, sink and session identities.
pub struct CloudStorageSink {
    target: String,
    node_id: i32,
    sink_id: i64,
    session_id: String,
    next_file_id: i64,
    target_file_size: usize,
    initial_high_water: Timestamp,
    format: OutputFormat,
    buffers: BufferTable,
    frontier: Arc<dyn Frontier>,
    storage: Arc<dyn ExternalStorage>,
    closed: bool,
}

impl std::fmt::Debug for CloudStorageSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudStorageSink")
            .field("target", &self.target)
            .field("node_id", &self.node_id)
            .field("sink_id", &self.sink_id)
            .field("open_buffers", &self.buffers.len())
            .field("closed", &self.closed)
            .finish()
    }
}

impl CloudStorageSink {
    /// Validate `config` and open the storage location it points at.
    pub async fn new(config: &SinkConfig, frontier: Arc<dyn Frontier>) -> Result<Self, SinkError> {
        config.validate().context(ConfigSnafu)?;

        debug!(
            target = %config.uri,
            storage_options = ?config.storage_options.keys().collect::<Vec<_>>(),
            "Creating cloud storage sink"
        );
        let storage =
            StorageProvider::for_url_with_options(&config.uri, config.storage_options.clone())
                .await
                .context(StorageSnafu)?;

        Self::with_storage(config, frontier, Arc::new(storage))
    }

    /// Build a sink writing through an already opened storage backend.
    pub fn with_storage(
        config: &SinkConfig,
        frontier: Arc<dyn Frontier>,
        storage: Arc<dyn ExternalStorage>,
    ) -> Result<Self, SinkError> {
        let format = config.validate().context(ConfigSnafu)?;
        let sink_id = next_sink_id();

        info!(
            target = %config.uri,
            node_id = config.node_id,
            sink_id,
            session_id = %config.session_id,
            target_file_size = config.target_file_size,
            "Opened cloud storage sink"
        );

        Ok(Self {
            target: config.uri.clone(),
            node_id: config.node_id,
            sink_id,
            session_id: config.session_id.clone(),
            next_file_id: 0,
            target_file_size: config.target_file_size,
            initial_high_water: config.initial_high_water,
            format,
            buffers: BufferTable::new(),
            frontier,
            storage,
            closed: false,
        })
    }

    /// Buffer one serialized row.
    ///
    /// Rows older than the watermark of their buffer were already covered by
    /// an earlier resolved timestamp and are dropped without error. If the
    /// buffer grows past the target size it is written out before returning.
    pub async fn emit_row(
        &mut self,
        cancel: &CancellationToken,
        topic: &str,
        schema_version: u32,
        value: &[u8],
        updated: Timestamp,
    ) -> Result<(), SinkError> {
        ensure!(!self.closed, ClosedSnafu { operation: "emit row" });

        let key = SinkKey::new(topic, schema_version);
        let frontier = &self.frontier;
        let initial_high_water = self.initial_high_water;
        let buffer = self
            .buffers
            .get_or_open(key.clone(), || frontier.frontier().max(initial_high_water));

        if updated < buffer.least_resolved {
            trace!(
                target = %self.target,
                key = %key,
                updated = %updated,
                least_resolved = %buffer.least_resolved,
                "Suppressed row below buffer watermark"
            );
            emit!(RowsSuppressed {
                count: 1,
                topic: key.topic,
            });
            return Ok(());
        }

        buffer.append(value, self.format.delimiter);
        let size = buffer.len();
        emit!(RowsEmitted {
            count: 1,
            topic: topic.to_string(),
        });

        if size > self.target_file_size {
            self.flush_file(cancel, &key).await?;
            self.report_buffers();
        }
        Ok(())
    }

    /// Write a marker file recording that every row at or below `resolved`
    /// has been emitted.
    ///
    /// Open buffers are left alone. Callers must [`flush`](Self::flush) first
    /// so that files covered by the marker exist before it does.
    pub async fn emit_resolved_timestamp(
        &mut self,
        cancel: &CancellationToken,
        encoder: &dyn Encoder,
        resolved: Timestamp,
    ) -> Result<(), SinkError> {
        ensure!(
            !self.closed,
            ClosedSnafu {
                operation: "emit resolved timestamp"
            }
        );

        let payload = encoder.encode_resolved_timestamp("", resolved)?;
        let path = build_resolved_path(resolved);
        self.write(cancel, &path, Bytes::from(payload)).await?;

        emit!(ResolvedFileWritten);
        info!(
            target = %self.target,
            path = %path,
            resolved = %resolved,
            "Wrote resolved timestamp"
        );
        Ok(())
    }

    /// Write every open buffer to its own file.
    ///
    /// Stops at the first failed write. Buffers written before the failure
    /// are gone from the table; the failed one and the rest remain.
    pub async fn flush(&mut self, cancel: &CancellationToken) -> Result<(), SinkError> {
        ensure!(!self.closed, ClosedSnafu { operation: "flush" });

        for key in self.buffers.keys() {
            if let Err(err) = self.flush_file(cancel, &key).await {
                self.report_buffers();
                return Err(err);
            }
        }

        self.report_buffers();
        Ok(())
    }

    /// Close the sink and release the storage backend.
    ///
    /// Buffered rows that were not flushed are discarded.
    pub async fn close(&mut self) -> Result<(), SinkError> {
        ensure!(!self.closed, ClosedSnafu { operation: "close" });
        self.closed = true;

        if !self.buffers.is_empty() {
            debug!(
                target = %self.target,
                open_buffers = self.buffers.len(),
                bytes = self.buffers.buffered_bytes(),
                "Discarding unflushed buffers on close"
            );
        }
        self.buffers.clear();
        self.report_buffers();

        self.storage.close().await.context(StorageSnafu)
    }

    pub fn node_id(&self) -> i32 {
        self.node_id
    }

    pub fn sink_id(&self) -> i64 {
        self.sink_id
    }

    /// Total bytes held in open buffers.
    pub fn buffered_bytes(&self) -> usize {
        self.buffers.buffered_bytes()
    }

    pub fn open_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    async fn flush_file(
        &mut self,
        cancel: &CancellationToken,
        key: &SinkKey,
    ) -> Result<(), SinkError> {
        let Some(buffer) = self.buffers.take(key) else {
            return Ok(());
        };
        // Nothing to persist. Dropping the buffer lets the next row reseed its
        // watermark from the current frontier.
        if buffer.is_empty() {
            return Ok(());
        }

        // Consumed even if the write fails.
        let file_id = self.next_file_id;
        self.next_file_id += 1;

        let path = DataFileName {
            least_resolved: buffer.least_resolved,
            topic: &key.topic,
            schema_version: key.schema_version,
            node_id: self.node_id,
            sink_id: self.sink_id,
            file_id,
            session_id: &self.session_id,
            extension: self.format.extension,
        }
        .to_path();

        let FileBuffer {
            least_resolved,
            content,
            records,
        } = buffer;
        let payload = content.freeze();
        let bytes = payload.len();

        if let Err(err) = self.write(cancel, &path, payload.clone()).await {
            warn!(
                target = %self.target,
                path = %path,
                key = %key,
                error = %err,
                "Failed to flush buffer, keeping it for retry"
            );
            emit!(FlushFailed {
                topic: key.topic.clone(),
            });
            self.buffers.restore(
                key.clone(),
                FileBuffer {
                    least_resolved,
                    content: BytesMut::from(payload.as_ref()),
                    records,
                },
            );
            return Err(err);
        }

        emit!(DataFileWritten {
            bytes: bytes as u64,
            records,
            topic: key.topic.clone(),
        });
        debug!(
            target = %self.target,
            path = %path,
            size = bytes,
            records,
            "Wrote data file"
        );
        Ok(())
    }

    async fn write(
        &self,
        cancel: &CancellationToken,
        path: &Path,
        payload: Bytes,
    ) -> Result<(), SinkError> {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => CancelledSnafu { path: path.to_string() }.fail(),

            result = self.storage.write_file(path, payload) => {
                result.context(WriteSnafu { path: path.to_string() })
            }
        }
    }

    fn report_buffers(&self) {
        emit!(OpenBuffers {
            count: self.buffers.len(),
            bytes: self.buffers.buffered_bytes(),
        });
    }
}
