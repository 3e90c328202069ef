//! cloudfeed: a changefeed sink that writes to cloud object storage.
//!
//! Rows are buffered per (topic, schema version) and written as
//! newline-delimited JSON files. Resolved timestamps are written as
//! `.RESOLVED` marker files. File names sort in timestamp order, so a reader
//! can tell which files are complete from a plain listing.
//!
//! - `sink` - The sink controller
//! - `naming` - Timestamp and file name encoding
//! - `buffer` - Per-key file buffers
//! - `frontier` - Resolved frontier providers
//! - `encoder` - Resolved timestamp payloads
//! - `listing` - Finalized file listing for readers
//! - `replay` - The `cloudfeed` command line tool

pub mod buffer;
pub mod config;
pub mod encoder;
pub mod error;
pub mod frontier;
pub mod hlc;
pub mod listing;
pub mod naming;
pub mod replay;
pub mod sink;

pub use buffer::SinkKey;
pub use cloudfeed_core::init_tracing;
pub use config::{OutputFormat, SinkConfig};
pub use encoder::{Encoder, JsonEncoder};
pub use error::SinkError;
pub use frontier::{FixedFrontier, Frontier, Span, SpanFrontier};
pub use hlc::Timestamp;
pub use listing::{FinalizedFiles, list_finalized_files};
pub use replay::{CliArgs, ReplayError, ReplayStats, replay, run};
pub use sink::CloudStorageSink;
