//! Input normalization.
//!
//! Resolves the caller's input mode (explicit files, directory scan, or
//! pre-parsed bundles) into an ordered list of sources, each paired with the
//! URL its versions will be attributed to.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use collection_index_shared::{Bundle, IMPORTED_URL, IndexError, Result};

/// Matches versioned collection filenames such as `enterprise-attack-8.2.json`.
static VERSIONED_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([\w&]+-)+(\d+\.?)+\.json$").expect("valid regex"));

// ---------------------------------------------------------------------------
// Input selection
// ---------------------------------------------------------------------------

/// What the caller supplied. At most one field may be non-empty.
#[derive(Debug, Clone, Default)]
pub struct InputSelection {
    /// Explicit bundle files.
    pub files: Option<Vec<PathBuf>>,
    /// Directories to scan for versioned bundle files.
    pub folders: Option<Vec<PathBuf>>,
    /// Bundles already parsed by the caller.
    pub bundles: Option<Vec<Bundle>>,
}

impl InputSelection {
    pub fn files(files: Vec<PathBuf>) -> Self {
        Self {
            files: Some(files),
            ..Self::default()
        }
    }

    pub fn folders(folders: Vec<PathBuf>) -> Self {
        Self {
            folders: Some(folders),
            ..Self::default()
        }
    }

    pub fn bundles(bundles: Vec<Bundle>) -> Self {
        Self {
            bundles: Some(bundles),
            ..Self::default()
        }
    }
}

/// The single input mode chosen for a run.
#[derive(Debug, Clone)]
pub enum InputMode {
    Files(Vec<PathBuf>),
    Folders(Vec<PathBuf>),
    Bundles(Vec<Bundle>),
}

impl InputMode {
    fn label(&self) -> &'static str {
        match self {
            Self::Files(_) => "files",
            Self::Folders(_) => "folders",
            Self::Bundles(_) => "bundles",
        }
    }
}

/// Where a source's bundle comes from.
#[derive(Debug, Clone)]
pub enum BundleSource {
    /// A JSON file still to be read.
    File(PathBuf),
    /// A bundle supplied in memory.
    Inline(Bundle),
}

/// A source ready for extraction, with the URL its versions are attributed to.
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    pub source: BundleSource,
    pub url: String,
}

impl ResolvedSource {
    /// Human-readable name used in diagnostics and errors.
    pub fn name(&self) -> String {
        match &self.source {
            BundleSource::File(path) => path.display().to_string(),
            BundleSource::Inline(bundle) => bundle
                .id
                .clone()
                .unwrap_or_else(|| "inline bundle".to_string()),
        }
    }
}

/// Options controlling how file-backed sources are resolved.
#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    /// Prefix for every file-backed version URL.
    pub root_url: String,
    /// Sort each directory's matches by filename. Filesystem order otherwise.
    pub sort_directory_entries: bool,
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Pick the single input mode from a selection.
///
/// Empty lists count as not supplied. Returns `Ok(None)` when nothing was
/// supplied, and [`IndexError::UsageConflict`] when more than one mode was.
/// No I/O happens here.
pub fn resolve_mode(selection: InputSelection) -> Result<Option<InputMode>> {
    let InputSelection {
        files,
        folders,
        bundles,
    } = selection;

    let mut modes: Vec<InputMode> = [
        files.filter(|f| !f.is_empty()).map(InputMode::Files),
        folders.filter(|f| !f.is_empty()).map(InputMode::Folders),
        bundles.filter(|b| !b.is_empty()).map(InputMode::Bundles),
    ]
    .into_iter()
    .flatten()
    .collect();

    if modes.len() > 1 {
        let labels: Vec<&str> = modes.iter().map(InputMode::label).collect();
        return Err(IndexError::usage_conflict(format!(
            "cannot use {} at the same time, please supply only one input mode",
            labels.join(" and ")
        )));
    }

    Ok(modes.pop())
}

/// Turn an input mode into ordered sources.
///
/// Bundle mode expects bundles that already went through
/// [`crate::filter::filter_bundles`].
#[instrument(skip_all, fields(mode = mode.label()))]
pub fn normalize(mode: InputMode, opts: &NormalizeOptions) -> Result<Vec<ResolvedSource>> {
    let sources: Vec<ResolvedSource> = match mode {
        InputMode::Files(files) => files
            .into_iter()
            .map(|path| file_source(&opts.root_url, path))
            .collect(),
        InputMode::Folders(folders) => {
            let mut sources = Vec::new();
            for folder in &folders {
                for path in scan_directory(folder, opts.sort_directory_entries)? {
                    sources.push(file_source(&opts.root_url, path));
                }
            }
            sources
        }
        InputMode::Bundles(bundles) => bundles
            .into_iter()
            .map(|bundle| ResolvedSource {
                source: BundleSource::Inline(bundle),
                url: IMPORTED_URL.to_string(),
            })
            .collect(),
    };

    debug!(count = sources.len(), "sources resolved");
    Ok(sources)
}

/// List the versioned bundle files directly inside `dir`.
///
/// Returned paths are `dir` joined with each matching filename. Order is the
/// filesystem's unless `sort` is set.
pub fn scan_directory(dir: &Path, sort: bool) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| IndexError::io(dir, e))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| IndexError::io(dir, e))?;
        if entry.file_type().is_ok_and(|t| t.is_dir()) {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(String::from) else {
            debug!(dir = %dir.display(), "skipping non-UTF-8 filename");
            continue;
        };
        if is_versioned_filename(&name) {
            names.push(name);
        }
    }

    if sort {
        names.sort();
    }

    debug!(dir = %dir.display(), matched = names.len(), "directory scanned");
    Ok(names.into_iter().map(|name| dir.join(name)).collect())
}

/// Whether a filename looks like `<segment>-...-<dotted version>.json`.
pub fn is_versioned_filename(name: &str) -> bool {
    VERSIONED_FILE_RE.is_match(name)
}

/// Join `root_url` and a relative path, adding `/` only when `root_url` lacks one.
pub fn source_url(root_url: &str, path: &Path) -> String {
    let path = path.to_string_lossy();
    if root_url.ends_with('/') {
        format!("{root_url}{path}")
    } else {
        format!("{root_url}/{path}")
    }
}

fn file_source(root_url: &str, path: PathBuf) -> ResolvedSource {
    let url = source_url(root_url, &path);
    ResolvedSource {
        source: BundleSource::File(path),
        url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ci-input-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), "{}").unwrap();
    }

    #[test]
    fn files_and_folders_conflict() {
        let selection = InputSelection {
            files: Some(vec!["a-1.0.json".into()]),
            folders: Some(vec!["/does/not/exist".into()]),
            bundles: None,
        };
        let err = resolve_mode(selection).unwrap_err();
        assert!(matches!(err, IndexError::UsageConflict { .. }));
        assert!(err.to_string().contains("files and folders"));
    }

    #[test]
    fn bundles_with_files_conflict() {
        let selection = InputSelection {
            files: Some(vec!["a-1.0.json".into()]),
            folders: None,
            bundles: Some(vec![Bundle::default()]),
        };
        assert!(matches!(
            resolve_mode(selection),
            Err(IndexError::UsageConflict { .. })
        ));
    }

    #[test]
    fn empty_lists_are_not_supplied() {
        let selection = InputSelection {
            files: Some(vec![]),
            folders: Some(vec!["collections".into()]),
            bundles: None,
        };
        let mode = resolve_mode(selection).unwrap();
        assert!(matches!(mode, Some(InputMode::Folders(f)) if f.len() == 1));

        assert!(resolve_mode(InputSelection::default()).unwrap().is_none());
    }

    #[test]
    fn versioned_filenames() {
        assert!(is_versioned_filename("foo-1.0.json"));
        assert!(is_versioned_filename("enterprise-attack-8.2.json"));
        assert!(is_versioned_filename("att&ck-data-8.2.json"));
        assert!(is_versioned_filename("ics-attack-10.1.json"));
        assert!(is_versioned_filename("foo-1.json"));
        assert!(!is_versioned_filename("readme.md"));
        assert!(!is_versioned_filename("index.json"));
        assert!(!is_versioned_filename("foo-1.0.json.bak"));
        assert!(!is_versioned_filename("foo-1.0xjson"));
        assert!(!is_versioned_filename("foo-beta.json"));
    }

    #[test]
    fn scan_keeps_only_versioned_json() {
        let tmp = temp_dir();
        touch(&tmp, "foo-1.0.json");
        touch(&tmp, "foo-1.1.json");
        touch(&tmp, "readme.md");
        std::fs::create_dir_all(tmp.join("bar-2.0.json")).unwrap();

        let found = scan_directory(&tmp, true).unwrap();
        assert_eq!(found, vec![tmp.join("foo-1.0.json"), tmp.join("foo-1.1.json")]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn scan_missing_directory_is_io_error() {
        let missing = std::env::temp_dir().join(format!("ci-missing-{}", uuid::Uuid::new_v4()));
        let err = scan_directory(&missing, false).unwrap_err();
        assert!(matches!(err, IndexError::Io { .. }));
    }

    #[test]
    fn url_separator_inserted_once() {
        let path = Path::new("collections/foo-1.0.json");
        assert_eq!(
            source_url("https://example.com", path),
            "https://example.com/collections/foo-1.0.json"
        );
        assert_eq!(
            source_url("https://example.com/", path),
            "https://example.com/collections/foo-1.0.json"
        );
    }

    #[test]
    fn normalize_files_keeps_order_and_urls() {
        let opts = NormalizeOptions {
            root_url: "https://example.com/".into(),
            sort_directory_entries: false,
        };
        let sources = normalize(
            InputMode::Files(vec!["b-2.0.json".into(), "a-1.0.json".into()]),
            &opts,
        )
        .unwrap();

        let urls: Vec<&str> = sources.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://example.com/b-2.0.json", "https://example.com/a-1.0.json"]
        );
        assert_eq!(sources[0].name(), "b-2.0.json");
    }

    #[test]
    fn normalize_folders_joins_directory() {
        let tmp = temp_dir();
        touch(&tmp, "foo-1.0.json");
        touch(&tmp, "notes.txt");

        let opts = NormalizeOptions {
            root_url: "https://example.com".into(),
            sort_directory_entries: true,
        };
        let sources = normalize(InputMode::Folders(vec![tmp.clone()]), &opts).unwrap();
        assert_eq!(sources.len(), 1);
        assert!(matches!(&sources[0].source, BundleSource::File(p) if *p == tmp.join("foo-1.0.json")));
        assert_eq!(
            sources[0].url,
            format!("https://example.com/{}", tmp.join("foo-1.0.json").display())
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn normalize_bundles_use_imported_url() {
        let bundle = Bundle {
            id: Some("bundle--1".into()),
            ..Bundle::default()
        };
        let sources =
            normalize(InputMode::Bundles(vec![bundle]), &NormalizeOptions::default()).unwrap();
        assert_eq!(sources[0].url, IMPORTED_URL);
        assert_eq!(sources[0].name(), "bundle--1");
    }
}
