//! Index assembler.
//!
//! Finalizes a populated [`CollectionTable`] into a [`CollectionIndex`]:
//! labels each collection, drops the per-version labels, derives the
//! index-wide timestamps, and assigns a fresh identifier. Also reads and
//! writes index files.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, instrument};

use collection_index_shared::{
    CollectionIndex, CollectionRecord, CollectionVersion, IndexError, IndexId, LabelSource,
    Result, Timestamp,
};

use crate::extract::{CollectionTable, TableEntry};

/// Configuration for index assembly.
#[derive(Debug, Clone)]
pub struct AssembleConfig {
    /// Index name.
    pub name: String,
    /// Index description.
    pub description: String,
    /// Which version names each collection.
    pub label_source: LabelSource,
}

/// Build the index from a fully populated table.
///
/// Fails with [`IndexError::NoCollectionsFound`] when the table is empty.
#[instrument(skip_all, fields(name = %config.name, collections = table.len()))]
pub fn assemble(table: CollectionTable, config: &AssembleConfig) -> Result<CollectionIndex> {
    let mut index_created: Option<Timestamp> = None;
    let mut index_modified: Option<Timestamp> = None;
    let mut collections = Vec::with_capacity(table.len());

    for entry in table.into_entries() {
        let record = finalize_record(entry, config.label_source)?;

        index_created = match index_created {
            Some(current) if current < record.created => Some(current),
            _ => Some(record.created.clone()),
        };
        for version in &record.versions {
            index_modified = match index_modified {
                Some(current) if current > version.modified => Some(current),
                _ => Some(version.modified.clone()),
            };
        }

        collections.push(record);
    }

    let (Some(created), Some(modified)) = (index_created, index_modified) else {
        return Err(IndexError::no_collections());
    };

    let index = CollectionIndex {
        id: IndexId::new(),
        name: config.name.clone(),
        description: config.description.clone(),
        created,
        modified,
        collections,
    };

    info!(
        id = %index.id,
        collections = index.collections.len(),
        created = %index.created,
        modified = %index.modified,
        "index assembled"
    );

    Ok(index)
}

/// Label a table entry and strip its versions down to their output form.
fn finalize_record(entry: TableEntry, label_source: LabelSource) -> Result<CollectionRecord> {
    let (id, created, versions) = entry.into_parts();

    let label = match label_source {
        LabelSource::Oldest => versions.last(),
        LabelSource::Newest => versions.first(),
    }
    .ok_or_else(|| IndexError::validation(format!("collection {id} has no versions")))?;

    let name = label.name.clone();
    let description = label.description.clone();

    let versions = versions
        .into_iter()
        .map(|v| CollectionVersion {
            version: v.version,
            url: v.url,
            modified: v.modified,
        })
        .collect();

    Ok(CollectionRecord {
        id,
        created,
        name,
        description,
        versions,
    })
}

// ---------------------------------------------------------------------------
// Index files
// ---------------------------------------------------------------------------

/// Write an index as four-space indented JSON.
///
/// The file is written to a temporary sibling first and then renamed into place.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn write_index(path: &Path, index: &CollectionIndex) -> Result<()> {
    let json = to_pretty_json(index)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| IndexError::io(parent, e))?;
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| IndexError::validation(format!("{} is not a file path", path.display())))?;
    let temp = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

    std::fs::write(&temp, json).map_err(|e| IndexError::io(&temp, e))?;
    if let Err(e) = std::fs::rename(&temp, path) {
        let _ = std::fs::remove_file(&temp);
        return Err(IndexError::io(path, e));
    }

    debug!("wrote index file");
    Ok(())
}

/// Read an index file from disk.
pub fn read_index(path: &Path) -> Result<CollectionIndex> {
    let content = std::fs::read_to_string(path).map_err(|e| IndexError::io(path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| IndexError::validation(format!("invalid index {}: {e}", path.display())))
}

fn to_pretty_json<T: Serialize>(data: &T) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    data.serialize(&mut serializer)
        .map_err(|e| IndexError::validation(format!("JSON serialization failed: {e}")))?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use collection_index_shared::Bundle;
    use serde_json::json;

    fn temp_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("ci-assembler-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn config(label_source: LabelSource) -> AssembleConfig {
        AssembleConfig {
            name: "Test index".into(),
            description: "An index for tests".into(),
            label_source,
        }
    }

    fn source(id: &str, created: &str, modified: &str, name: &str) -> Bundle {
        serde_json::from_value(json!({
            "type": "bundle",
            "objects": [{
                "type": "x-mitre-collection",
                "id": id,
                "created": created,
                "modified": modified,
                "x_mitre_version": "1.0",
                "name": name,
                "description": format!("{name} description"),
            }]
        }))
        .unwrap()
    }

    /// Source A then source B, both for collection `X`.
    fn alpha_beta_table() -> CollectionTable {
        let mut table = CollectionTable::new();
        let a = source("X", "2020-01-01T00:00:00Z", "2020-02-01T00:00:00Z", "Alpha");
        let b = source("X", "2020-01-01T00:00:00Z", "2021-01-01T00:00:00Z", "Beta");
        table.extract(&a, "https://example.com/a.json", "a").unwrap();
        table.extract(&b, "https://example.com/b.json", "b").unwrap();
        table
    }

    fn mixed_table() -> CollectionTable {
        let mut table = alpha_beta_table();
        let c = source("Y", "2019-05-01T00:00:00Z", "2019-06-01T00:00:00Z", "Gamma");
        let d = source("Z", "2020-06-01T00:00:00Z", "2022-03-01T00:00:00Z", "Delta");
        table.extract(&c, "https://example.com/c.json", "c").unwrap();
        table.extract(&d, "https://example.com/d.json", "d").unwrap();
        table
    }

    #[test]
    fn alpha_beta_scenario() {
        let index = assemble(alpha_beta_table(), &config(LabelSource::Oldest)).unwrap();

        assert_eq!(index.collections.len(), 1);
        let record = &index.collections[0];
        assert_eq!(record.created.as_str(), "2020-01-01T00:00:00Z");
        let modified: Vec<&str> = record.versions.iter().map(|v| v.modified.as_str()).collect();
        assert_eq!(modified, vec!["2021-01-01T00:00:00Z", "2020-02-01T00:00:00Z"]);
        assert_eq!(record.name, "Alpha");
        assert_eq!(record.description, "Alpha description");
    }

    #[test]
    fn newest_label_source_takes_first_version() {
        let index = assemble(alpha_beta_table(), &config(LabelSource::Newest)).unwrap();
        assert_eq!(index.collections[0].name, "Beta");
        assert_eq!(index.collections[0].description, "Beta description");
    }

    #[test]
    fn index_timestamps_are_min_created_and_max_modified() {
        let index = assemble(mixed_table(), &config(LabelSource::Oldest)).unwrap();

        assert_eq!(index.created.as_str(), "2019-05-01T00:00:00Z");
        assert_eq!(index.modified.as_str(), "2022-03-01T00:00:00Z");
        for record in &index.collections {
            assert!(index.created <= record.created);
            for version in &record.versions {
                assert!(index.modified >= version.modified);
            }
        }

        let ids: Vec<&str> = index.collections.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["X", "Y", "Z"]);
    }

    #[test]
    fn empty_table_is_no_collections_found() {
        let err = assemble(CollectionTable::new(), &config(LabelSource::Oldest)).unwrap_err();
        assert!(matches!(err, IndexError::NoCollectionsFound { .. }));
    }

    #[test]
    fn repeated_runs_differ_only_in_id() {
        let first = assemble(mixed_table(), &config(LabelSource::Oldest)).unwrap();
        let second = assemble(mixed_table(), &config(LabelSource::Oldest)).unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(first.name, second.name);
        assert_eq!(first.description, second.description);
        assert_eq!(first.created.as_str(), second.created.as_str());
        assert_eq!(first.modified.as_str(), second.modified.as_str());
        assert_eq!(
            serde_json::to_string(&first.collections).unwrap(),
            serde_json::to_string(&second.collections).unwrap()
        );
    }

    #[test]
    fn output_versions_carry_no_labels() {
        let index = assemble(alpha_beta_table(), &config(LabelSource::Oldest)).unwrap();
        let json = serde_json::to_value(&index).unwrap();
        for version in json["collections"][0]["versions"].as_array().unwrap() {
            let keys: Vec<&str> = version.as_object().unwrap().keys().map(String::as_str).collect();
            assert_eq!(keys.len(), 3);
            assert!(keys.contains(&"version"));
            assert!(keys.contains(&"url"));
            assert!(keys.contains(&"modified"));
        }
    }

    #[test]
    fn write_and_read_index_file() {
        let tmp = temp_dir();
        let index = assemble(mixed_table(), &config(LabelSource::Oldest)).unwrap();
        let path = tmp.join("out").join("index.json");

        write_index(&path, &index).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("{\n    \"id\""));

        let read = read_index(&path).unwrap();
        assert_eq!(read.id, index.id);
        assert_eq!(read.collections, index.collections);

        for entry in std::fs::read_dir(path.parent().unwrap()).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().to_string();
            assert!(!name.starts_with('.'), "temp file left behind: {name}");
        }

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn failed_rename_removes_temp_file() {
        let tmp = temp_dir();
        let index = assemble(alpha_beta_table(), &config(LabelSource::Oldest)).unwrap();
        // A directory at the target path makes the final rename fail.
        let path = tmp.join("index.json");
        std::fs::create_dir_all(path.join("occupied")).unwrap();

        let err = write_index(&path, &index).unwrap_err();
        assert!(matches!(err, IndexError::Io { .. }));
        assert!(!tmp.join(".index.json.tmp").exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn read_index_fixture() {
        let index = read_index(Path::new("../../../fixtures/json/index.fixture.json")).unwrap();
        assert_eq!(index.collections.len(), 2);
        assert_eq!(index.collections[0].versions.len(), 2);
        assert_eq!(index.modified.as_str(), "2021-04-29T14:49:39.188Z");
    }
}
