//! Core domain types: input bundles, collection objects, and the index document.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Object `type` marking a collection inside a bundle.
pub const COLLECTION_TYPE: &str = "x-mitre-collection";

/// URL attributed to versions that came from an in-memory bundle rather than a file.
pub const IMPORTED_URL: &str = "Imported";

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// An ISO-8601 instant that remembers the text it was parsed from.
///
/// Ordering and equality use the parsed instant; serialization writes the
/// original text back unchanged.
#[derive(Debug, Clone)]
pub struct Timestamp {
    instant: DateTime<Utc>,
    raw: String,
}

impl Timestamp {
    /// Parse an RFC 3339 timestamp, an offset-less one, or a bare date.
    ///
    /// Offset-less values are read as UTC and bare dates as midnight UTC.
    pub fn parse(raw: &str) -> std::result::Result<Self, chrono::ParseError> {
        let instant = match DateTime::parse_from_rfc3339(raw) {
            Ok(dt) => dt.with_timezone(&Utc),
            Err(rfc_err) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| naive.and_utc())
                .or_else(|_| {
                    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
                })
                .map_err(|_| rfc_err)?,
        };
        Ok(Self {
            instant,
            raw: raw.to_string(),
        })
    }

    /// The text this timestamp was parsed from.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl std::str::FromStr for Timestamp {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.instant == other.instant
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.instant.cmp(&other.instant)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .map_err(|e| serde::de::Error::custom(format!("invalid timestamp '{raw}': {e}")))
    }
}

// ---------------------------------------------------------------------------
// IndexId
// ---------------------------------------------------------------------------

/// A random UUID identifying one generated index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexId(pub Uuid);

impl IndexId {
    /// Generate a fresh index identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for IndexId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for IndexId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for IndexId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// Kind of an object inside a bundle, as far as indexing is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Collection,
    Other,
}

impl ObjectKind {
    /// Classify a raw bundle object by its `type` field.
    pub fn of(object: &serde_json::Value) -> Self {
        match object.get("type").and_then(serde_json::Value::as_str) {
            Some(COLLECTION_TYPE) => Self::Collection,
            _ => Self::Other,
        }
    }
}

/// A container document of typed objects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bundle {
    /// Bundle identifier, when the document carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Document type (normally `bundle`).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// The objects held by this bundle, kept as raw JSON.
    pub objects: Vec<serde_json::Value>,
}

impl Bundle {
    /// Objects in this bundle that are collections, in document order.
    pub fn collection_objects(&self) -> impl Iterator<Item = &serde_json::Value> {
        self.objects
            .iter()
            .filter(|o| ObjectKind::of(o) == ObjectKind::Collection)
    }

    /// Whether the bundle holds at least one collection object.
    pub fn has_collection(&self) -> bool {
        self.collection_objects().next().is_some()
    }
}

/// The fields of a collection object that indexing reads.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionObject {
    pub id: String,
    pub created: Timestamp,
    pub modified: Timestamp,
    #[serde(rename = "x_mitre_version")]
    pub version: String,
    pub name: String,
    pub description: String,
}

// ---------------------------------------------------------------------------
// Index document
// ---------------------------------------------------------------------------

/// One revision of a collection as listed in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionVersion {
    pub version: String,
    /// Where this revision's document lives.
    pub url: String,
    pub modified: Timestamp,
}

/// One distinct collection and its version history, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub id: String,
    /// Taken from the first occurrence of this collection and never updated.
    pub created: Timestamp,
    pub name: String,
    pub description: String,
    pub versions: Vec<CollectionVersion>,
}

/// The generated index document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionIndex {
    pub id: IndexId,
    pub name: String,
    pub description: String,
    /// Earliest `created` over all collections.
    pub created: Timestamp,
    /// Latest `modified` over all versions of all collections.
    pub modified: Timestamp,
    pub collections: Vec<CollectionRecord>,
}

/// Which end of a collection's version history supplies its name and description.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelSource {
    /// The version with the earliest `modified` (last in the list).
    #[default]
    Oldest,
    /// The version with the latest `modified` (first in the list).
    Newest,
}

/// What to do when a source cannot be read or parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MalformedPolicy {
    /// Abort the whole run.
    #[default]
    FailFast,
    /// Skip the source, record a diagnostic, and continue.
    SkipAndWarn,
}
