//! Error kinds and warnings produced by the ingestion pipeline.
//!
//! [`IngestError`] is returned for a single item and decides whether the
//! item was skipped (not a LIDIA annotation, unreadable payload) or failed
//! (storage constraint, id conflict). Neither aborts the run; both are
//! turned into an [`IngestWarning`] and accumulated in the run report.

use thiserror::Error;

/// Per-item error raised while reconciling one raw item.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The comment does not carry the LIDIA sentinel.
    #[error("not a LIDIA annotation")]
    NotLidia,

    /// The payload after the sentinel could not be decoded as a mapping.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A decoded field has a value outside its allowed set.
    #[error("invalid value for '{field}': {value}")]
    InvalidField { field: &'static str, value: String },

    /// The `lidia_id` is already taken by the other annotation variant.
    #[error("lidia id {lidia_id} already exists as {existing}")]
    KindConflict { lidia_id: String, existing: String },

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl IngestError {
    /// Skipped items are expected input noise; everything else is a failure.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            IngestError::NotLidia
                | IngestError::MalformedPayload(_)
                | IngestError::InvalidField { .. }
        )
    }
}

/// Non-fatal outcome reported to the operator after a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestWarning {
    SkippedItem { zotero_id: String, reason: String },
    FailedItem { zotero_id: String, reason: String },
    MissingAttachment { zotero_id: String },
    UnknownPublication { lidia_id: String, attachment_id: String },
    OrphanedContinuation { lidia_id: String },
    RelationToContinuation { lidia_id: String, target: String },
    UnresolvedPlaceholders { count: usize },
}

impl std::fmt::Display for IngestWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestWarning::SkippedItem { zotero_id, reason } => {
                write!(f, "skipped {}: {}", zotero_id, reason)
            }
            IngestWarning::FailedItem { zotero_id, reason } => {
                write!(f, "failed {}: {}", zotero_id, reason)
            }
            IngestWarning::MissingAttachment { zotero_id } => {
                write!(f, "publication {} has no attachment link", zotero_id)
            }
            IngestWarning::UnknownPublication {
                lidia_id,
                attachment_id,
            } => write!(
                f,
                "annotation {} refers to unknown attachment {}",
                lidia_id, attachment_id
            ),
            IngestWarning::OrphanedContinuation { lidia_id } => {
                write!(f, "orphaned continuation {} removed", lidia_id)
            }
            IngestWarning::RelationToContinuation { lidia_id, target } => write!(
                f,
                "annotation {} relates to continuation {}; relation dropped",
                lidia_id, target
            ),
            IngestWarning::UnresolvedPlaceholders { count } => {
                write!(f, "{} unresolved placeholder annotation(s) removed", count)
            }
        }
    }
}
