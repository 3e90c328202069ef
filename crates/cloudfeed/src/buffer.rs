//! In-memory file buffers, one per (topic, schema version).

use bytes::BytesMut;
use std::collections::HashMap;
use std::fmt;

use crate::hlc::Timestamp;

/// Identifies a change stream whose rows all share one schema.
///
/// A schema change produces a new key, so no file ever mixes schemas.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SinkKey {
    pub topic: String,
    pub schema_version: u32,
}

impl SinkKey {
    pub fn new(topic: impl Into<String>, schema_version: u32) -> Self {
        Self {
            topic: topic.into(),
            schema_version,
        }
    }
}

impl fmt::Display for SinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@v{}", self.topic, self.schema_version)
    }
}

/// Delimited records waiting to be written as one file.
#[derive(Debug)]
pub struct FileBuffer {
    /// Watermark fixed when the buffer was opened. Every row in `content` has
    /// an update timestamp at or above it.
    pub least_resolved: Timestamp,
    pub content: BytesMut,
    pub records: u64,
}

impl FileBuffer {
    pub fn new(least_resolved: Timestamp) -> Self {
        Self {
            least_resolved,
            content: BytesMut::new(),
            records: 0,
        }
    }

    /// Append `record` followed by `delimiter`.
    pub fn append(&mut self, record: &[u8], delimiter: u8) {
        self.content.reserve(record.len() + 1);
        self.content.extend_from_slice(record);
        self.content.extend_from_slice(&[delimiter]);
        self.records += 1;
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Open buffers keyed by [`SinkKey`]. At most one buffer exists per key.
#[derive(Debug, Default)]
pub struct BufferTable {
    buffers: HashMap<SinkKey, FileBuffer>,
}

impl BufferTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer for `key`, opened with `least_resolved()` if absent.
    pub fn get_or_open(
        &mut self,
        key: SinkKey,
        least_resolved: impl FnOnce() -> Timestamp,
    ) -> &mut FileBuffer {
        self.buffers
            .entry(key)
            .or_insert_with(|| FileBuffer::new(least_resolved()))
    }

    pub fn get(&self, key: &SinkKey) -> Option<&FileBuffer> {
        self.buffers.get(key)
    }

    /// Take the buffer for `key` out of the table.
    pub fn take(&mut self, key: &SinkKey) -> Option<FileBuffer> {
        self.buffers.remove(key)
    }

    /// Put a buffer back after a failed write.
    pub fn restore(&mut self, key: SinkKey, buffer: FileBuffer) {
        self.buffers.insert(key, buffer);
    }

    /// Snapshot of the open keys.
    pub fn keys(&self) -> Vec<SinkKey> {
        self.buffers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Total bytes held across all buffers.
    pub fn buffered_bytes(&self) -> usize {
        self.buffers.values().map(FileBuffer::len).sum()
    }

    /// Drop every buffer.
    pub fn clear(&mut self) {
        self.buffers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_adds_delimiter() {
        let mut buffer = FileBuffer::new(Timestamp::MIN);
        assert!(buffer.is_empty());
        buffer.append(b"{\"a\":1}", b'\n');
        buffer.append(b"{\"a\":2}", b'\n');
        assert_eq!(&buffer.content[..], b"{\"a\":1}\n{\"a\":2}\n");
        assert_eq!(buffer.records, 2);
        assert_eq!(buffer.len(), 16);
    }

    #[test]
    fn test_get_or_open_seeds_watermark_once() {
        let mut table = BufferTable::new();
        let key = SinkKey::new("orders", 1);

        let mut calls = 0;
        table.get_or_open(key.clone(), || {
            calls += 1;
            Timestamp::new(5, 0)
        });
        table.get_or_open(key.clone(), || {
            calls += 1;
            Timestamp::new(9, 0)
        });

        assert_eq!(calls, 1);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&key).unwrap().least_resolved, Timestamp::new(5, 0));
    }

    #[test]
    fn test_schema_version_is_part_of_key() {
        let mut table = BufferTable::new();
        table
            .get_or_open(SinkKey::new("orders", 1), || Timestamp::MIN)
            .append(b"a", b'\n');
        table
            .get_or_open(SinkKey::new("orders", 2), || Timestamp::MIN)
            .append(b"bb", b'\n');

        assert_eq!(table.len(), 2);
        assert_eq!(table.buffered_bytes(), 5);
    }

    #[test]
    fn test_take_and_restore() {
        let mut table = BufferTable::new();
        let key = SinkKey::new("orders", 1);
        table
            .get_or_open(key.clone(), || Timestamp::MIN)
            .append(b"x", b'\n');

        let buffer = table.take(&key).unwrap();
        assert!(table.is_empty());
        assert!(table.take(&key).is_none());

        table.restore(key.clone(), buffer);
        assert_eq!(&table.get(&key).unwrap().content[..], b"x\n");

        table.clear();
        assert!(table.is_empty());
    }

    #[test]
    fn test_sink_key_display() {
        assert_eq!(SinkKey::new("orders", 3).to_string(), "orders@v3");
    }
}
