//! Pipeline outcomes.
//!
//! Every invocation exits with an [`Outcome`], never a panic or an error
//! thrown past the pipeline boundary. Skips are expected control flow;
//! resource failures surface as [`crate::error::SyncError`] wrapped in
//! [`Outcome::Failed`] so the lock-release path stays uniform.

use std::fmt;

use crate::error::SyncError;

/// Why an invocation declined to act
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    // Policy rejections: expected, silent unless manually invoked
    NotMarkdown,
    Excluded,
    PropertyDisabled,
    Safeword,
    NotHeading,
    SelfReferential,
    EmptyContentRetained,

    // Contention rejections: expected under concurrent triggers, always silent
    AlreadyProcessing,
    TimeRateLimited,
    GlobalRateLimited,
    FootnotePopoverEdit,
    RecentlyRenamed,

    // Resource conditions handled as quiet abandonment
    FileNotFound,
    ReadError,

    // Invariant-violation guard, logged loudly
    MaxConflictsExceeded,
}

impl SkipReason {
    /// Whether this is contention between concurrent triggers rather than a
    /// policy decision
    pub fn is_contention(&self) -> bool {
        matches!(
            self,
            SkipReason::AlreadyProcessing
                | SkipReason::TimeRateLimited
                | SkipReason::GlobalRateLimited
                | SkipReason::FootnotePopoverEdit
                | SkipReason::RecentlyRenamed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NotMarkdown => "not-markdown",
            SkipReason::Excluded => "excluded",
            SkipReason::PropertyDisabled => "property-disabled",
            SkipReason::Safeword => "safeword",
            SkipReason::NotHeading => "not-heading",
            SkipReason::SelfReferential => "self-referential",
            SkipReason::EmptyContentRetained => "empty-content-retained",
            SkipReason::AlreadyProcessing => "already-processing",
            SkipReason::TimeRateLimited => "time-rate-limited",
            SkipReason::GlobalRateLimited => "global-rate-limited",
            SkipReason::FootnotePopoverEdit => "footnote-popover-edit",
            SkipReason::RecentlyRenamed => "recently-renamed",
            SkipReason::FileNotFound => "file-not-found",
            SkipReason::ReadError => "read-error",
            SkipReason::MaxConflictsExceeded => "max-conflicts-exceeded",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one pipeline invocation
#[derive(Debug)]
pub enum Outcome {
    /// The document was renamed (alias reconciled as part of the operation)
    Renamed { from: String, to: String },
    /// Filename already correct; only the alias entry was updated
    AliasOnly,
    /// Nothing to do
    Unchanged,
    /// Declined to act
    Skipped(SkipReason),
    /// Resource failure mid-pipeline (IO, unreadable store)
    Failed(SyncError),
}

// SyncError wraps io::Error, so equality goes through the rendered message
impl PartialEq for Outcome {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Outcome::Renamed { from: a, to: b },
                Outcome::Renamed { from: c, to: d },
            ) => a == c && b == d,
            (Outcome::AliasOnly, Outcome::AliasOnly)
            | (Outcome::Unchanged, Outcome::Unchanged) => true,
            (Outcome::Skipped(a), Outcome::Skipped(b)) => a == b,
            (Outcome::Failed(a), Outcome::Failed(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

impl Outcome {
    pub fn changed(&self) -> bool {
        matches!(self, Outcome::Renamed { .. } | Outcome::AliasOnly)
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Outcome::Skipped(reason) => Some(*reason),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_reason_display_is_kebab_case() {
        assert_eq!(SkipReason::AlreadyProcessing.to_string(), "already-processing");
        assert_eq!(SkipReason::EmptyContentRetained.to_string(), "empty-content-retained");
        assert_eq!(SkipReason::MaxConflictsExceeded.to_string(), "max-conflicts-exceeded");
    }

    #[test]
    fn contention_classification() {
        assert!(SkipReason::TimeRateLimited.is_contention());
        assert!(SkipReason::RecentlyRenamed.is_contention());
        assert!(!SkipReason::Safeword.is_contention());
        assert!(!SkipReason::MaxConflictsExceeded.is_contention());
    }
}
