//! Invariant checks for index documents.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, instrument};

use collection_index_shared::{CollectionIndex, IndexError, Result};

use crate::assembler::read_index;

/// Check that an index is internally consistent.
///
/// - collection ids are unique
/// - every collection has at least one version
/// - versions are sorted newest first
/// - the index `created` is no later than any collection's `created`
/// - the index `modified` is no earlier than any version's `modified`
pub fn validate_index(index: &CollectionIndex) -> Result<()> {
    if index.collections.is_empty() {
        return Err(IndexError::validation("index lists no collections"));
    }

    let mut seen = HashSet::new();
    for record in &index.collections {
        if !seen.insert(record.id.as_str()) {
            return Err(IndexError::validation(format!(
                "collection {} is listed more than once",
                record.id
            )));
        }

        if record.versions.is_empty() {
            return Err(IndexError::validation(format!(
                "collection {} has no versions",
                record.id
            )));
        }

        if let Some(pair) = record
            .versions
            .windows(2)
            .find(|pair| pair[0].modified < pair[1].modified)
        {
            return Err(IndexError::validation(format!(
                "collection {}: version {} ({}) is listed before newer version {} ({})",
                record.id, pair[0].version, pair[0].modified, pair[1].version, pair[1].modified
            )));
        }

        if record.created < index.created {
            return Err(IndexError::validation(format!(
                "collection {} was created at {}, before the index created time {}",
                record.id, record.created, index.created
            )));
        }

        if let Some(version) = record
            .versions
            .iter()
            .find(|v| v.modified > index.modified)
        {
            return Err(IndexError::validation(format!(
                "collection {} version {} was modified at {}, after the index modified time {}",
                record.id, version.version, version.modified, index.modified
            )));
        }
    }

    Ok(())
}

/// Read an index file and check its invariants.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn validate_index_file(path: &Path) -> Result<CollectionIndex> {
    let index = read_index(path)?;
    validate_index(&index)?;
    debug!(collections = index.collections.len(), "index file is valid");
    Ok(index)
}
