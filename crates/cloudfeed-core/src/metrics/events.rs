//! Internal events for cloudfeed metrics emission.
//!
//! Each event struct represents a measurable occurrence in the sink.
//! Events implement the `InternalEvent` trait which emits the corresponding
//! metric through the `metrics` facade; whichever recorder the host process
//! installs receives them.
//!
//! ## Topic Labels
//!
//! Row and file metrics carry a `topic` label (one per watched table).

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted when a row is appended to a file buffer.
pub struct RowsEmitted {
    pub count: u64,
    pub topic: String,
}

impl InternalEvent for RowsEmitted {
    fn emit(self) {
        trace!(count = self.count, topic = %self.topic, "Rows emitted");
        counter!("cloudfeed_rows_emitted_total", "topic" => self.topic).increment(self.count);
    }
}

/// Event emitted when a row is dropped because it is below the buffer watermark.
pub struct RowsSuppressed {
    pub count: u64,
    pub topic: String,
}

impl InternalEvent for RowsSuppressed {
    fn emit(self) {
        trace!(count = self.count, topic = %self.topic, "Rows suppressed");
        counter!("cloudfeed_rows_suppressed_total", "topic" => self.topic).increment(self.count);
    }
}

/// Event emitted when a data file has been persisted.
pub struct DataFileWritten {
    pub bytes: u64,
    pub records: u64,
    pub topic: String,
}

impl InternalEvent for DataFileWritten {
    fn emit(self) {
        trace!(
            bytes = self.bytes,
            records = self.records,
            topic = %self.topic,
            "Data file written"
        );
        counter!("cloudfeed_data_files_written_total", "topic" => self.topic.clone()).increment(1);
        counter!("cloudfeed_bytes_written_total", "topic" => self.topic).increment(self.bytes);
    }
}

/// Event emitted when a resolved timestamp marker has been persisted.
pub struct ResolvedFileWritten;

impl InternalEvent for ResolvedFileWritten {
    fn emit(self) {
        trace!("Resolved file written");
        counter!("cloudfeed_resolved_files_written_total").increment(1);
    }
}

/// Event emitted when a flush fails and the buffer is retained for retry.
pub struct FlushFailed {
    pub topic: String,
}

impl InternalEvent for FlushFailed {
    fn emit(self) {
        trace!(topic = %self.topic, "Flush failed");
        counter!("cloudfeed_flush_failures_total", "topic" => self.topic).increment(1);
    }
}

/// Gauge of currently open file buffers and their total size.
pub struct OpenBuffers {
    pub count: usize,
    pub bytes: usize,
}

impl InternalEvent for OpenBuffers {
    fn emit(self) {
        trace!(count = self.count, bytes = self.bytes, "Open buffers");
        gauge!("cloudfeed_open_buffers").set(self.count as f64);
        gauge!("cloudfeed_buffered_bytes").set(self.bytes as f64);
    }
}

// ============================================================================
// Storage operation events
// ============================================================================

/// Storage operation types.
#[derive(Debug, Clone, Copy)]
pub enum StorageOperation {
    Get,
    Put,
    List,
}

impl StorageOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageOperation::Get => "get",
            StorageOperation::Put => "put",
            StorageOperation::List => "list",
        }
    }
}

/// Status of a storage request.
#[derive(Debug, Clone, Copy)]
pub enum RequestStatus {
    Success,
    Error,
}

impl RequestStatus {
    pub fn from_result<T, E>(result: &Result<T, E>) -> Self {
        if result.is_ok() {
            RequestStatus::Success
        } else {
            RequestStatus::Error
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::Error => "error",
        }
    }
}

/// Event emitted when a storage request completes.
pub struct StorageRequest {
    pub operation: StorageOperation,
    pub status: RequestStatus,
}

impl InternalEvent for StorageRequest {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            status = self.status.as_str(),
            "Storage request"
        );
        counter!(
            "cloudfeed_storage_requests_total",
            "operation" => self.operation.as_str(),
            "status" => self.status.as_str()
        )
        .increment(1);
    }
}

/// Event emitted when a storage request completes with duration.
pub struct StorageRequestDuration {
    pub operation: StorageOperation,
    pub duration: Duration,
}

impl InternalEvent for StorageRequestDuration {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            duration_ms = self.duration.as_millis(),
            "Storage request duration"
        );
        histogram!(
            "cloudfeed_storage_request_duration_seconds",
            "operation" => self.operation.as_str()
        )
        .record(self.duration.as_secs_f64());
    }
}
