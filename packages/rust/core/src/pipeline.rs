//! End-to-end `generate` pipeline: inputs → filter → read → extract → assemble → index.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use collection_index_shared::{
    Bundle, CollectionIndex, Diagnostic, IndexError, LabelSource, MalformedPolicy, Result,
};

use crate::assembler::{self, AssembleConfig};
use crate::extract::CollectionTable;
use crate::filter;
use crate::input::{self, BundleSource, InputMode, InputSelection, NormalizeOptions, ResolvedSource};

/// Configuration for the `generate_index` pipeline.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    /// Index name.
    pub name: String,
    /// Index description.
    pub description: String,
    /// Prefix for file-backed version URLs.
    pub root_url: String,
    /// Which version names each collection.
    pub label_source: LabelSource,
    /// Behavior on unreadable or malformed sources.
    pub on_malformed: MalformedPolicy,
    /// Maximum number of files read at once.
    pub read_concurrency: usize,
    /// Sort directory matches by filename.
    pub sort_directory_entries: bool,
}

impl GenerateConfig {
    /// A config with default policies for the given index metadata.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        root_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            root_url: root_url.into(),
            label_source: LabelSource::default(),
            on_malformed: MalformedPolicy::default(),
            read_concurrency: 8,
            sort_directory_entries: false,
        }
    }

    fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            root_url: self.root_url.clone(),
            sort_directory_entries: self.sort_directory_entries,
        }
    }

    fn assemble_config(&self) -> AssembleConfig {
        AssembleConfig {
            name: self.name.clone(),
            description: self.description.clone(),
            label_source: self.label_source,
        }
    }
}

/// Result of the `generate_index` pipeline.
#[derive(Debug)]
pub struct IndexOutcome {
    /// The assembled index.
    pub index: CollectionIndex,
    /// Non-fatal findings, in the order they occurred.
    pub diagnostics: Vec<Diagnostic>,
    /// Number of sources successfully extracted.
    pub sources_read: usize,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each source has been extracted or skipped.
    fn source_loaded(&self, name: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, outcome: &IndexOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn source_loaded(&self, _name: &str, _current: usize, _total: usize) {}
    fn done(&self, _outcome: &IndexOutcome) {}
}

/// A source whose bundle has been read (or failed to be).
struct LoadedSource {
    name: String,
    url: String,
    bundle: Result<Bundle>,
}

/// Run the full `generate` pipeline.
///
/// 1. Resolve the input mode (conflicts fail before any I/O)
/// 2. Filter pre-parsed bundles
/// 3. Read file-backed sources concurrently
/// 4. Extract collections, one source at a time in input order
/// 5. Assemble the index
#[instrument(skip_all, fields(name = %config.name, root_url = %config.root_url))]
pub async fn generate_index(
    config: &GenerateConfig,
    selection: InputSelection,
    progress: &dyn ProgressReporter,
) -> Result<IndexOutcome> {
    let start = Instant::now();

    progress.phase("Resolving inputs");
    let mode = input::resolve_mode(selection)?;
    let (sources, mut diagnostics) = resolve_sources(mode, config)?;

    info!(sources = sources.len(), "starting index generation");

    progress.phase("Reading collections");
    let loaded = load_sources(sources, config.read_concurrency.max(1)).await;

    let (index, sources_read) = finish(config, loaded, &mut diagnostics, progress)?;

    let outcome = IndexOutcome {
        index,
        diagnostics,
        sources_read,
        elapsed: start.elapsed(),
    };
    progress.done(&outcome);
    Ok(outcome)
}

/// Build an index from bundles already held in memory, without a runtime.
#[instrument(skip_all, fields(name = %config.name, bundles = bundles.len()))]
pub fn build_index(config: &GenerateConfig, bundles: Vec<Bundle>) -> Result<IndexOutcome> {
    let start = Instant::now();

    let mode = (!bundles.is_empty()).then_some(InputMode::Bundles(bundles));
    let (sources, mut diagnostics) = resolve_sources(mode, config)?;

    let loaded = sources.into_iter().map(loaded_inline).collect();
    let (index, sources_read) = finish(config, loaded, &mut diagnostics, &SilentProgress)?;

    Ok(IndexOutcome {
        index,
        diagnostics,
        sources_read,
        elapsed: start.elapsed(),
    })
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

fn resolve_sources(
    mode: Option<InputMode>,
    config: &GenerateConfig,
) -> Result<(Vec<ResolvedSource>, Vec<Diagnostic>)> {
    let opts = config.normalize_options();
    match mode {
        None => Ok((Vec::new(), Vec::new())),
        Some(InputMode::Bundles(bundles)) => {
            let filtered = filter::filter_bundles(bundles);
            let sources = input::normalize(InputMode::Bundles(filtered.bundles), &opts)?;
            Ok((sources, filtered.diagnostics))
        }
        Some(mode) => Ok((input::normalize(mode, &opts)?, Vec::new())),
    }
}

/// A source whose read may still be in flight.
enum PendingSource {
    Ready(Bundle),
    Reading(JoinHandle<Result<Bundle>>),
}

/// Read every file-backed source, at most `concurrency` at a time.
///
/// The returned list is in the same order as `sources` regardless of which
/// reads finish first.
async fn load_sources(sources: Vec<ResolvedSource>, concurrency: usize) -> Vec<LoadedSource> {
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut pending = Vec::with_capacity(sources.len());

    for source in sources {
        let name = source.name();
        let state = match source.source {
            BundleSource::Inline(bundle) => PendingSource::Ready(bundle),
            BundleSource::File(path) => {
                let sem = semaphore.clone();
                PendingSource::Reading(tokio::spawn(async move {
                    let _permit = sem.acquire_owned().await.map_err(|e| {
                        IndexError::malformed(
                            path.display().to_string(),
                            format!("read not scheduled: {e}"),
                        )
                    })?;
                    read_bundle(path).await
                }))
            }
        };
        pending.push((name, source.url, state));
    }

    let mut loaded = Vec::with_capacity(pending.len());
    for (name, url, state) in pending {
        let bundle = match state {
            PendingSource::Ready(bundle) => Ok(bundle),
            PendingSource::Reading(handle) => match handle.await {
                Ok(result) => result,
                Err(e) => Err(IndexError::malformed(&name, format!("read task failed: {e}"))),
            },
        };
        loaded.push(LoadedSource { name, url, bundle });
    }
    loaded
}

async fn read_bundle(path: PathBuf) -> Result<Bundle> {
    let content = tokio::fs::read(&path)
        .await
        .map_err(|e| IndexError::io(&path, e))?;
    serde_json::from_slice(&content)
        .map_err(|e| IndexError::malformed(path.display().to_string(), e.to_string()))
}

fn loaded_inline(source: ResolvedSource) -> LoadedSource {
    let name = source.name();
    let bundle = match source.source {
        BundleSource::Inline(bundle) => Ok(bundle),
        BundleSource::File(path) => Err(IndexError::malformed(
            path.display().to_string(),
            "file sources need the async pipeline",
        )),
    };
    LoadedSource {
        name,
        url: source.url,
        bundle,
    }
}

/// Extract every loaded source in order, then assemble.
///
/// Returns the index and the number of sources extracted.
fn finish(
    config: &GenerateConfig,
    loaded: Vec<LoadedSource>,
    diagnostics: &mut Vec<Diagnostic>,
    progress: &dyn ProgressReporter,
) -> Result<(CollectionIndex, usize)> {
    progress.phase("Extracting collections");

    let mut table = CollectionTable::new();
    let total = loaded.len();
    let mut sources_read = 0;

    for (i, source) in loaded.into_iter().enumerate() {
        let result = source
            .bundle
            .and_then(|bundle| table.extract(&bundle, &source.url, &source.name));

        match result {
            Ok(()) => sources_read += 1,
            Err(e)
                if e.is_source_scoped() && config.on_malformed == MalformedPolicy::SkipAndWarn =>
            {
                warn!(source = %source.name, error = %e, "skipping source");
                diagnostics.push(Diagnostic::SkippedSource {
                    source_name: source.name.clone(),
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }

        progress.source_loaded(&source.name, i + 1, total);
    }

    progress.phase("Assembling index");
    let index = assembler::assemble(table, &config.assemble_config()).map_err(|e| match e {
        IndexError::NoCollectionsFound { .. } => IndexError::NoCollectionsFound {
            diagnostics: diagnostics.clone(),
        },
        other => other,
    })?;

    info!(
        collections = index.collections.len(),
        sources_read,
        diagnostics = diagnostics.len(),
        "index generation complete"
    );

    Ok((index, sources_read))
}
