//! Content source selection.
//!
//! Three sources of current text exist (open edit buffer, host cache, fresh
//! disk read) plus an opportunistic scan of ephemeral preview editors. Each
//! can lag reality in a different way; the reader picks the source least
//! likely to reflect a transient state for the operation at hand. A total
//! miss is an error the caller must treat as "abort this invocation", never
//! as empty content.

use std::sync::Arc;

use crate::config::ReadStrategy;
use crate::error::{Result, SyncError};
use crate::host::{DocumentStore, PreviewScan};

/// Which source ultimately produced the text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    /// Text carried on the triggering event itself
    Supplied,
    /// The active edit buffer
    Buffer,
    /// A uniquely identified preview editor
    Preview,
    /// The host's (possibly lagging) cache
    Cache,
    /// Forced fresh disk read
    Disk,
}

impl ReadSource {
    /// Sources that can be stale immediately after a just-completed rename
    pub fn may_lag_rename(&self) -> bool {
        matches!(self, ReadSource::Cache | ReadSource::Disk)
    }
}

/// Text plus provenance
#[derive(Debug, Clone)]
pub struct ReadText {
    pub text: String,
    pub source: ReadSource,
}

/// Per-call source preferences
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Text supplied by an active edit event; trusted unconditionally
    pub supplied_text: Option<String>,
    /// Scan other open editing surfaces for this document's buffer
    pub scan_previews: bool,
    /// Fallback strategy when nothing fresher is available
    pub strategy: ReadStrategy,
}

/// Reads document text from the most trustworthy available source
pub struct ContentReader {
    store: Arc<dyn DocumentStore>,
}

impl ContentReader {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        ContentReader { store }
    }

    pub fn read(&self, path: &str, options: &ReadOptions) -> Result<ReadText> {
        if let Some(text) = &options.supplied_text {
            return Ok(ReadText {
                text: text.clone(),
                source: ReadSource::Supplied,
            });
        }

        if options.scan_previews {
            // A unique preview editor is trustworthy even if its reported
            // path lags a just-completed rename; with more than one there is
            // no way to disambiguate, so the optimization is skipped.
            match self.store.scan_preview_editors(path) {
                PreviewScan::Unique(text) => {
                    return Ok(ReadText {
                        text,
                        source: ReadSource::Preview,
                    });
                }
                PreviewScan::None | PreviewScan::Ambiguous => {}
            }
        }

        match options.strategy {
            ReadStrategy::PreferBuffer => {
                if let Some(text) = self.store.open_buffer_text(path) {
                    return Ok(ReadText {
                        text,
                        source: ReadSource::Buffer,
                    });
                }
                self.cached_then_disk(path)
            }
            ReadStrategy::PreferCache => self.cached_then_disk(path),
            ReadStrategy::PreferDisk => match self.store.read_fresh(path) {
                Ok(text) => Ok(ReadText {
                    text,
                    source: ReadSource::Disk,
                }),
                Err(_) => self.fail(path),
            },
        }
    }

    fn cached_then_disk(&self, path: &str) -> Result<ReadText> {
        if let Ok(text) = self.store.read_cached(path) {
            return Ok(ReadText {
                text,
                source: ReadSource::Cache,
            });
        }
        match self.store.read_fresh(path) {
            Ok(text) => Ok(ReadText {
                text,
                source: ReadSource::Disk,
            }),
            Err(_) => self.fail(path),
        }
    }

    fn fail(&self, path: &str) -> Result<ReadText> {
        Err(SyncError::ReadFailed {
            path: path.to_string(),
        })
    }
}
