//! Consumer-side listing of completed output.
//!
//! Because data files and resolved markers are named so that lexicographic
//! order is timestamp order, a reader can find every file that is guaranteed
//! complete with a single sorted listing: everything before the newest
//! `.RESOLVED` marker.

use futures::StreamExt;
use snafu::prelude::*;
use tracing::debug;

use cloudfeed_core::StorageProvider;
use cloudfeed_core::error::{ObjectStoreSnafu, StorageError};

use crate::hlc::Timestamp;
use crate::naming::{RESOLVED_SUFFIX, resolved_timestamp_of};

/// Data files covered by the newest resolved marker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalizedFiles {
    /// Timestamp of the newest marker, if one has been written.
    pub resolved: Option<Timestamp>,
    /// Data file paths relative to the storage root, sorted.
    pub files: Vec<String>,
}

/// List the data files that sort before the newest resolved marker.
///
/// Files after the marker may still be joined by late files from other sinks
/// and are left out. With no marker, nothing is finalized.
pub async fn list_finalized_files(
    storage: &StorageProvider,
) -> Result<FinalizedFiles, StorageError> {
    let mut paths = Vec::new();
    let mut stream = storage.list(true).await?;
    while let Some(result) = stream.next().await {
        paths.push(result.context(ObjectStoreSnafu)?.to_string());
    }
    paths.sort();

    let finalized = split_at_last_marker(paths);
    debug!(
        target = %storage.canonical_url(),
        resolved = ?finalized.resolved.map(|ts| ts.to_string()),
        count = finalized.files.len(),
        "Listed finalized files"
    );
    Ok(finalized)
}

fn split_at_last_marker(sorted: Vec<String>) -> FinalizedFiles {
    let Some((index, resolved)) = sorted
        .iter()
        .enumerate()
        .rev()
        .find_map(|(i, path)| resolved_timestamp_of(path).map(|ts| (i, ts)))
    else {
        return FinalizedFiles::default();
    };

    let files = sorted
        .into_iter()
        .take(index)
        .filter(|path| !path.ends_with(RESOLVED_SUFFIX))
        .collect();

    FinalizedFiles {
        resolved: Some(resolved),
        files,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(items: &[&str]) -> Vec<String> {
        let mut items: Vec<String> = items.iter().map(|s| s.to_string()).collect();
        items.sort();
        items
    }

    #[test]
    fn test_no_marker_means_nothing_finalized() {
        let finalized = split_at_last_marker(paths(&[
            "2019-01-01/201901010000000000000000000000000_orders_1_1_1_000000000000_s.ndjson",
        ]));
        assert_eq!(finalized, FinalizedFiles::default());
    }

    #[test]
    fn test_files_before_last_marker() {
        let finalized = split_at_last_marker(paths(&[
            "2019-01-01/201901010000000000000000000000000_orders_1_1_1_000000000000_s.ndjson",
            "2019-01-01/201901010000000000000500000000000.RESOLVED",
            "2019-01-01/201901010000000000000500000000000_orders_1_1_1_000000000001_s.ndjson",
            "2019-01-01/201901010000000000001000000000000.RESOLVED",
            "2019-01-01/201901010000000000001000000000000_orders_1_1_1_000000000002_s.ndjson",
        ]));

        assert_eq!(
            finalized.resolved,
            Some(Timestamp::new(1_546_300_800_000_000_100, 0))
        );
        assert_eq!(
            finalized.files,
            vec![
                "2019-01-01/201901010000000000000000000000000_orders_1_1_1_000000000000_s.ndjson",
                "2019-01-01/201901010000000000000500000000000_orders_1_1_1_000000000001_s.ndjson",
            ]
        );
    }

    #[test]
    fn test_unrelated_files_are_listed_like_data() {
        let finalized = split_at_last_marker(paths(&[
            "2019-01-01/201901010000000000000000000000000.RESOLVED",
            "2018-12-31/notes.txt",
        ]));
        assert_eq!(finalized.files, vec!["2018-12-31/notes.txt"]);
    }
}
