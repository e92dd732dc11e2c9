//! Bundle filter for pre-parsed inputs.
//!
//! Keeps only bundles that carry a collection object and strips everything
//! else out of them.

use tracing::{instrument, warn};

use collection_index_shared::{Bundle, Diagnostic, ObjectKind};

/// Bundles that survived filtering, plus a diagnostic for each one dropped.
#[derive(Debug, Default)]
pub struct FilteredBundles {
    pub bundles: Vec<Bundle>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Narrow each bundle to its collection objects, dropping bundles without any.
#[instrument(skip_all, fields(candidates = bundles.len()))]
pub fn filter_bundles(bundles: Vec<Bundle>) -> FilteredBundles {
    let mut out = FilteredBundles::default();

    for (position, mut bundle) in bundles.into_iter().enumerate() {
        if !bundle.has_collection() {
            let diagnostic = Diagnostic::InvalidBundle {
                position,
                bundle_id: bundle.id.clone(),
            };
            warn!(%diagnostic, "dropping bundle");
            out.diagnostics.push(diagnostic);
            continue;
        }

        bundle
            .objects
            .retain(|object| ObjectKind::of(object) == ObjectKind::Collection);
        out.bundles.push(bundle);
    }

    out
}
