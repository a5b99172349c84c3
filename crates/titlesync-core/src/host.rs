//! Host collaborator contracts.
//!
//! The engine never owns documents. The surrounding application supplies a
//! [`DocumentStore`] (resolve, read, rename, frontmatter read-modify-write)
//! and a [`Notifier`]; the engine receives them at construction and issues
//! every mutation through them. Paths are store-relative with `/` separators;
//! the path is the only stable identity a document has.

pub mod memory;

use serde_yaml::Mapping;

use crate::error::Result;

/// How a document is currently presented by the host, if at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    /// Open in a primary edit view; follow-up rechecks are reliable here
    Primary,
    /// Open only in an ephemeral preview/hover editor; host sync lags behind
    Popover,
    /// Not visible in any editing surface
    Background,
}

/// Result of scanning ephemeral preview editors for a document's buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewScan {
    /// No preview editor holds this document
    None,
    /// Exactly one preview editor holds it; its content is trustworthy even
    /// if the editor's reported path lags a just-completed rename
    Unique(String),
    /// More than one candidate; no reliable way to disambiguate
    Ambiguous,
}

/// Document store contract supplied by the host application.
///
/// The store is the sole writer of the underlying documents; the engine
/// re-resolves by path immediately before every mutating call.
pub trait DocumentStore: Send + Sync {
    /// Whether a document currently exists at `path`
    fn exists(&self, path: &str) -> bool;

    /// Read through the host's cache. May lag an open edit buffer by one
    /// debounce interval.
    fn read_cached(&self, path: &str) -> Result<String>;

    /// Forced fresh read from the backing store. Can be stale immediately
    /// after a just-completed rename.
    fn read_fresh(&self, path: &str) -> Result<String>;

    /// Text of the active edit buffer for `path`, when one is open
    fn open_buffer_text(&self, path: &str) -> Option<String>;

    /// Scan other open editing surfaces (hover previews) for this document
    fn scan_preview_editors(&self, path: &str) -> PreviewScan;

    /// How the document is currently presented
    fn view_kind(&self, path: &str) -> ViewKind;

    /// Paths of all loaded documents, for case-insensitive conflict scanning
    fn list_paths(&self) -> Vec<String>;

    /// Atomic rename. Fails when the destination already exists.
    fn rename(&self, old_path: &str, new_path: &str) -> Result<()>;

    /// Funnel a read-modify-write mutation through the host's frontmatter
    /// primitive. Returns whether anything changed.
    fn update_frontmatter(
        &self,
        path: &str,
        mutator: &mut dyn FnMut(&mut Mapping),
    ) -> Result<bool>;

    /// Targeted in-place substitution in the open edit buffer, replacing the
    /// first occurrence of `old` with `new`. Returns false when no buffer is
    /// open or the text cannot be found; the caller then falls back to
    /// [`DocumentStore::update_frontmatter`].
    fn replace_in_buffer(&self, path: &str, old: &str, new: &str) -> Result<bool>;
}

/// User-visible notification sink. Pure side effect, no feedback into the
/// engine.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Notifier that drops everything
#[derive(Debug, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _message: &str) {}
}
