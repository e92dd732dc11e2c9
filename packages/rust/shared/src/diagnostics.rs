//! Non-fatal findings collected during a run.

use std::fmt;

/// Something the pipeline skipped without aborting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A pre-parsed bundle held no collection object and was dropped.
    InvalidBundle {
        /// Position of the bundle in the caller's list.
        position: usize,
        bundle_id: Option<String>,
    },
    /// A source could not be read or parsed and was skipped under the
    /// skip-and-warn policy.
    SkippedSource { source_name: String, reason: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBundle {
                bundle_id: Some(id),
                ..
            } => write!(f, "cannot use bundle {id} due to lack of collection object"),
            Self::InvalidBundle {
                position,
                bundle_id: None,
            } => write!(
                f,
                "cannot use bundle #{position} due to lack of collection object"
            ),
            Self::SkippedSource {
                source_name,
                reason,
            } => write!(f, "skipped {source_name}: {reason}"),
        }
    }
}
