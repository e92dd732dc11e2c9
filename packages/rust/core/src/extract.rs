//! Collection extraction.
//!
//! Folds the collection objects of each bundle into an identity-keyed table.
//! Identities keep first-seen order, and every collection's version list is
//! kept sorted newest first after each insertion.

use indexmap::IndexMap;
use indexmap::map::Entry;
use tracing::{debug, instrument};

use collection_index_shared::{Bundle, CollectionObject, IndexError, Result, Timestamp};

/// A version as collected, still carrying the labels used to name its collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingVersion {
    pub version: String,
    pub url: String,
    pub modified: Timestamp,
    pub name: String,
    pub description: String,
}

/// One collection identity and the versions seen for it so far.
#[derive(Debug, Clone)]
pub struct TableEntry {
    id: String,
    created: Timestamp,
    versions: Vec<PendingVersion>,
}

impl TableEntry {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// `created` of the first object seen with this identity.
    pub fn created(&self) -> &Timestamp {
        &self.created
    }

    /// Versions sorted descending by `modified`; ties keep insertion order.
    pub fn versions(&self) -> &[PendingVersion] {
        &self.versions
    }

    pub(crate) fn into_parts(self) -> (String, Timestamp, Vec<PendingVersion>) {
        (self.id, self.created, self.versions)
    }

    fn sort_versions(&mut self) {
        // `sort_by` is stable, which keeps equal timestamps in insertion order.
        self.versions.sort_by(|a, b| b.modified.cmp(&a.modified));
    }
}

/// Identity-keyed table of collections, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct CollectionTable {
    entries: IndexMap<String, TableEntry>,
}

impl CollectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&TableEntry> {
        self.entries.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableEntry> {
        self.entries.values()
    }

    pub(crate) fn into_entries(self) -> impl Iterator<Item = TableEntry> {
        self.entries.into_values()
    }

    /// Fold every collection object of `bundle` into the table, attributing
    /// each version to `url`.
    ///
    /// All collection objects are read before the table is touched, so a
    /// malformed object leaves the table exactly as it was.
    #[instrument(skip_all, fields(source = %source_name, url = %url))]
    pub fn extract(&mut self, bundle: &Bundle, url: &str, source_name: &str) -> Result<()> {
        let objects = bundle
            .collection_objects()
            .map(|value| {
                serde_json::from_value::<CollectionObject>(value.clone()).map_err(|e| {
                    IndexError::malformed(source_name, format!("invalid collection object: {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let found = objects.len();
        for object in objects {
            self.insert(object, url);
        }

        debug!(found, collections = self.len(), "bundle extracted");
        Ok(())
    }

    /// Fold a partial table built from later sources into this one.
    ///
    /// Equivalent to having extracted the other table's sources into this
    /// table directly, in the same order.
    pub fn merge(&mut self, other: CollectionTable) {
        for (id, incoming) in other.entries {
            match self.entries.entry(id) {
                Entry::Occupied(mut slot) => {
                    let entry = slot.get_mut();
                    entry.versions.extend(incoming.versions);
                    entry.sort_versions();
                }
                Entry::Vacant(slot) => {
                    slot.insert(incoming);
                }
            }
        }
    }

    fn insert(&mut self, object: CollectionObject, url: &str) {
        let CollectionObject {
            id,
            created,
            modified,
            version,
            name,
            description,
        } = object;

        let entry = self.entries.entry(id.clone()).or_insert_with(|| TableEntry {
            id,
            created,
            versions: Vec::new(),
        });

        entry.versions.push(PendingVersion {
            version,
            url: url.to_string(),
            modified,
            name,
            description,
        });
        entry.sort_versions();
    }
}
