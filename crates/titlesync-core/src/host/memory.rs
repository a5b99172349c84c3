//! In-memory host implementation.
//!
//! Backs the engine's test suite and doubles as a reference for embedders
//! implementing [`DocumentStore`]. Records every rename and frontmatter write
//! so tests can assert on the exact mutation sequence.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_yaml::Mapping;

use crate::error::{Result, SyncError};
use crate::frontmatter;
use crate::host::{DocumentStore, Notifier, PreviewScan, ViewKind};

#[derive(Debug, Default)]
struct Inner {
    files: HashMap<String, String>,
    /// Overrides for read_cached, simulating a lagging host cache
    stale_cache: HashMap<String, String>,
    buffers: HashMap<String, String>,
    previews: Vec<(String, String)>,
    views: HashMap<String, ViewKind>,
    failing_reads: Vec<String>,
    renames: Vec<(String, String)>,
    frontmatter_writes: Vec<String>,
    buffer_edits: Vec<String>,
}

/// In-memory [`DocumentStore`] with operation recording
#[derive(Debug, Default)]
pub struct MemoryHost {
    inner: Mutex<Inner>,
}

impl MemoryHost {
    pub fn new() -> Self {
        MemoryHost::default()
    }

    /// Create a document
    pub fn insert(&self, path: &str, content: &str) {
        self.lock().files.insert(path.into(), content.into());
    }

    /// Current stored content of a document
    pub fn content(&self, path: &str) -> Option<String> {
        self.lock().files.get(path).cloned()
    }

    /// Open an edit buffer holding `text` for the document
    pub fn open_buffer(&self, path: &str, text: &str) {
        self.lock().buffers.insert(path.into(), text.into());
    }

    /// Make read_cached return lagging content for this path
    pub fn set_stale_cache(&self, path: &str, text: &str) {
        self.lock().stale_cache.insert(path.into(), text.into());
    }

    /// Attach an ephemeral preview editor holding `text`
    pub fn add_preview(&self, path: &str, text: &str) {
        self.lock().previews.push((path.into(), text.into()));
    }

    pub fn set_view(&self, path: &str, kind: ViewKind) {
        self.lock().views.insert(path.into(), kind);
    }

    /// Make every read of `path` fail
    pub fn fail_reads(&self, path: &str) {
        self.lock().failing_reads.push(path.into());
    }

    /// Renames performed, in order
    pub fn renames(&self) -> Vec<(String, String)> {
        self.lock().renames.clone()
    }

    /// Paths whose frontmatter went through the slow mutation path
    pub fn frontmatter_writes(&self) -> Vec<String> {
        self.lock().frontmatter_writes.clone()
    }

    /// Paths whose alias was updated via the in-place buffer edit
    pub fn buffer_edits(&self) -> Vec<String> {
        self.lock().buffer_edits.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_readable(inner: &Inner, path: &str) -> Result<()> {
        if inner.failing_reads.iter().any(|p| p == path) {
            return Err(SyncError::ReadFailed { path: path.into() });
        }
        if !inner.files.contains_key(path) {
            return Err(SyncError::DocumentNotFound { path: path.into() });
        }
        Ok(())
    }
}

impl DocumentStore for MemoryHost {
    fn exists(&self, path: &str) -> bool {
        self.lock().files.contains_key(path)
    }

    fn read_cached(&self, path: &str) -> Result<String> {
        let inner = self.lock();
        Self::check_readable(&inner, path)?;
        if let Some(stale) = inner.stale_cache.get(path) {
            return Ok(stale.clone());
        }
        Ok(inner.files[path].clone())
    }

    fn read_fresh(&self, path: &str) -> Result<String> {
        let inner = self.lock();
        Self::check_readable(&inner, path)?;
        Ok(inner.files[path].clone())
    }

    fn open_buffer_text(&self, path: &str) -> Option<String> {
        self.lock().buffers.get(path).cloned()
    }

    fn scan_preview_editors(&self, path: &str) -> PreviewScan {
        let inner = self.lock();
        let mut matches = inner.previews.iter().filter(|(p, _)| p == path);
        match (matches.next(), matches.next()) {
            (None, _) => PreviewScan::None,
            (Some((_, text)), None) => PreviewScan::Unique(text.clone()),
            (Some(_), Some(_)) => PreviewScan::Ambiguous,
        }
    }

    fn view_kind(&self, path: &str) -> ViewKind {
        *self.lock().views.get(path).unwrap_or(&ViewKind::Background)
    }

    fn list_paths(&self) -> Vec<String> {
        self.lock().files.keys().cloned().collect()
    }

    fn rename(&self, old_path: &str, new_path: &str) -> Result<()> {
        let mut inner = self.lock();
        let Some(content) = inner.files.remove(old_path) else {
            return Err(SyncError::DocumentNotFound {
                path: old_path.into(),
            });
        };
        if inner.files.contains_key(new_path) {
            inner.files.insert(old_path.into(), content);
            return Err(SyncError::RenameTargetExists {
                path: new_path.into(),
            });
        }
        inner.files.insert(new_path.into(), content);
        if let Some(buffer) = inner.buffers.remove(old_path) {
            inner.buffers.insert(new_path.into(), buffer);
        }
        if let Some(stale) = inner.stale_cache.remove(old_path) {
            inner.stale_cache.insert(new_path.into(), stale);
        }
        if let Some(view) = inner.views.remove(old_path) {
            inner.views.insert(new_path.into(), view);
        }
        inner.renames.push((old_path.into(), new_path.into()));
        Ok(())
    }

    fn update_frontmatter(
        &self,
        path: &str,
        mutator: &mut dyn FnMut(&mut Mapping),
    ) -> Result<bool> {
        let mut inner = self.lock();
        Self::check_readable(&inner, path)?;
        let content = inner.files[path].clone();
        let Some(updated) = frontmatter::edit(&content, path, |m| mutator(m))? else {
            return Ok(false);
        };
        inner.files.insert(path.into(), updated.clone());
        if inner.buffers.contains_key(path) {
            inner.buffers.insert(path.into(), updated);
        }
        inner.stale_cache.remove(path);
        inner.frontmatter_writes.push(path.into());
        Ok(true)
    }

    fn replace_in_buffer(&self, path: &str, old: &str, new: &str) -> Result<bool> {
        let mut inner = self.lock();
        let Some(buffer) = inner.buffers.get(path).cloned() else {
            return Ok(false);
        };
        if !buffer.contains(old) {
            return Ok(false);
        }
        let updated = buffer.replacen(old, new, 1);
        inner.buffers.insert(path.into(), updated.clone());
        // The host applies buffer edits through to the store
        inner.files.insert(path.into(), updated);
        inner.stale_cache.remove(path);
        inner.buffer_edits.push(path.into());
        Ok(true)
    }
}

/// Notifier capturing messages for assertions
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        RecordingNotifier::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}
