//! Frontier providers.
//!
//! A frontier is the lowest timestamp known to be fully resolved across every
//! watched key range. The sink reads it when it opens a new file buffer so
//! that rows at or below an already-resolved timestamp are not written again.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use std::sync::{Arc, PoisonError, RwLock};

use crate::hlc::Timestamp;

/// Source of the current resolved frontier. Never decreases.
pub trait Frontier: Send + Sync {
    fn frontier(&self) -> Timestamp;
}

impl<F: Frontier + ?Sized> Frontier for Arc<F> {
    fn frontier(&self) -> Timestamp {
        (**self).frontier()
    }
}

/// A frontier pinned to a single value.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedFrontier(pub Timestamp);

impl Frontier for FixedFrontier {
    fn frontier(&self) -> Timestamp {
        self.0
    }
}

/// A half-open key range `[start, end)`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: Vec<u8>,
    pub end: Vec<u8>,
}

impl Span {
    pub fn new(start: impl Into<Vec<u8>>, end: impl Into<Vec<u8>>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// A span covering every key used by the replay tool.
    pub fn all() -> Self {
        Self::new(Vec::new(), vec![0xff; 2])
    }

    fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.escape_ascii(),
            self.end.escape_ascii()
        )
    }
}

/// Resolved timestamps tracked per key range.
///
/// Entries are keyed by start key and never overlap. `forward` splits entries
/// at the edges of the forwarded span, so the map always holds the finest
/// partition seen so far. Keys outside the initial spans are not tracked.
#[derive(Debug, Default)]
pub struct SpanFrontier {
    entries: RwLock<BTreeMap<Vec<u8>, (Vec<u8>, Timestamp)>>,
}

impl SpanFrontier {
    /// Track `spans`, each starting at [`Timestamp::MIN`].
    pub fn new(spans: impl IntoIterator<Item = Span>) -> Self {
        let mut entries = BTreeMap::new();
        for span in spans.into_iter().filter(|span| !span.is_empty()) {
            entries.insert(span.start, (span.end, Timestamp::MIN));
        }
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Raise the resolved timestamp of every tracked key in `span` to at least
    /// `ts`. Returns true if the overall frontier moved.
    pub fn forward(&self, span: &Span, ts: Timestamp) -> bool {
        if span.is_empty() {
            return false;
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = min_timestamp(&entries);

        let overlapping: Vec<Vec<u8>> = entries
            .range::<[u8], _>((Bound::Unbounded, Bound::Excluded(span.end.as_slice())))
            .filter(|(_, (end, _))| end.as_slice() > span.start.as_slice())
            .map(|(start, _)| start.clone())
            .collect();

        for start in overlapping {
            let Some((end, current)) = entries.remove(&start) else {
                continue;
            };

            let mid_start = start.clone().max(span.start.clone());
            let mid_end = end.clone().min(span.end.clone());

            if start < mid_start {
                entries.insert(start, (mid_start.clone(), current));
            }
            if mid_end < end {
                entries.insert(mid_end.clone(), (end, current));
            }
            entries.insert(mid_start, (mid_end, current.max(ts)));
        }

        min_timestamp(&entries) > before
    }

    /// Number of tracked sub-ranges.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Frontier for SpanFrontier {
    fn frontier(&self) -> Timestamp {
        min_timestamp(&self.entries.read().unwrap_or_else(PoisonError::into_inner))
    }
}

fn min_timestamp(entries: &BTreeMap<Vec<u8>, (Vec<u8>, Timestamp)>) -> Timestamp {
    entries
        .values()
        .map(|(_, ts)| *ts)
        .min()
        .unwrap_or(Timestamp::MIN)
}
