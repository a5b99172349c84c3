//! Per-path locks and in-memory bookkeeping shared across pipeline runs.
//!
//! All tables are process-lifetime, keyed by document path, and rekeyed (not
//! dropped) when a rename changes the path out from under them. Nothing here
//! is persisted; wholesale reset on shutdown is safe.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

/// Snapshot of the text that determines a document's title, used to
/// short-circuit reprocessing when an edit didn't touch the title region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleRegion {
    pub first_non_empty_line: String,
    pub title_source_line: String,
    pub last_updated_ms: u64,
}

#[derive(Debug, Default)]
struct Inner {
    locks: HashSet<String>,
    content: HashMap<String, String>,
    reserved: HashSet<String>,
    pending_recheck: HashSet<String>,
    recently_renamed: HashMap<String, u64>,
    title_regions: HashMap<String, TitleRegion>,
}

/// Lock & state cache wrapping every engine invocation.
///
/// Invariant: at most one in-flight invocation per path. A second concurrent
/// trigger must be rejected by [`StateCache::try_lock`], never queued.
#[derive(Debug, Default)]
pub struct StateCache {
    inner: Mutex<Inner>,
}

impl StateCache {
    pub fn new() -> Self {
        StateCache::default()
    }

    /// Atomic test-and-set. Returns false if the path is already locked; the
    /// caller must abandon, not retry synchronously.
    pub fn try_lock(&self, path: &str) -> bool {
        self.lock().locks.insert(path.to_string())
    }

    /// Release the per-path lock. Idempotent.
    pub fn unlock(&self, path: &str) {
        self.lock().locks.remove(path);
    }

    pub fn is_locked(&self, path: &str) -> bool {
        self.lock().locks.contains(path)
    }

    /// Record the last-processed content for a path. Distinguishes "content
    /// became empty" from "was always empty" on later runs.
    pub fn set_content(&self, path: &str, text: &str) {
        self.lock()
            .content
            .insert(path.to_string(), text.to_string());
    }

    pub fn get_content(&self, path: &str) -> Option<String> {
        self.lock().content.get(path).cloned()
    }

    /// Claim a destination path before the host rename completes, so a
    /// concurrently resolving conflict check cannot pick the same destination.
    pub fn reserve_path(&self, path: &str) -> bool {
        self.lock().reserved.insert(path.to_string())
    }

    pub fn release_path(&self, path: &str) {
        self.lock().reserved.remove(path);
    }

    pub fn is_reserved(&self, path: &str) -> bool {
        self.lock().reserved.contains(path)
    }

    /// Flag a path whose content changed while an operation was in flight
    pub fn mark_pending_recheck(&self, path: &str) {
        self.lock().pending_recheck.insert(path.to_string());
    }

    pub fn has_pending_recheck(&self, path: &str) -> bool {
        self.lock().pending_recheck.contains(path)
    }

    /// Consume the pending-recheck flag, returning whether it was set.
    /// Consumption guarantees exactly one follow-up per burst of changes.
    pub fn take_pending_recheck(&self, path: &str) -> bool {
        self.lock().pending_recheck.remove(path)
    }

    /// Mark a path as just renamed, to suppress stale create/read events the
    /// host may still be delivering.
    pub fn mark_recently_renamed(&self, path: &str, now_ms: u64) {
        self.lock()
            .recently_renamed
            .insert(path.to_string(), now_ms);
    }

    pub fn renamed_within(&self, path: &str, now_ms: u64, window_ms: u64) -> bool {
        self.lock()
            .recently_renamed
            .get(path)
            .is_some_and(|t| now_ms.saturating_sub(*t) <= window_ms)
    }

    pub fn set_title_region(&self, path: &str, region: TitleRegion) {
        self.lock().title_regions.insert(path.to_string(), region);
    }

    pub fn title_region(&self, path: &str) -> Option<TitleRegion> {
        self.lock().title_regions.get(path).cloned()
    }

    /// Invalidate the title-region snapshot. Required after an external
    /// rename: the title text is unchanged but the filename no longer
    /// matches it, so the short-circuit must not apply.
    pub fn clear_title_region(&self, path: &str) {
        self.lock().title_regions.remove(path);
    }

    /// Rekey every per-path table from old to new path after a rename
    pub fn notify_file_renamed(&self, old_path: &str, new_path: &str) {
        let mut inner = self.lock();
        if inner.locks.remove(old_path) {
            inner.locks.insert(new_path.to_string());
        }
        if let Some(content) = inner.content.remove(old_path) {
            inner.content.insert(new_path.to_string(), content);
        }
        if inner.reserved.remove(old_path) {
            inner.reserved.insert(new_path.to_string());
        }
        if inner.pending_recheck.remove(old_path) {
            inner.pending_recheck.insert(new_path.to_string());
        }
        if let Some(ts) = inner.recently_renamed.remove(old_path) {
            inner.recently_renamed.insert(new_path.to_string(), ts);
        }
        if let Some(region) = inner.title_regions.remove(old_path) {
            inner.title_regions.insert(new_path.to_string(), region);
        }
    }

    /// Drop all state for a deleted document
    pub fn forget(&self, path: &str) {
        let mut inner = self.lock();
        inner.locks.remove(path);
        inner.content.remove(path);
        inner.reserved.remove(path);
        inner.pending_recheck.remove(path);
        inner.recently_renamed.remove(path);
        inner.title_regions.remove(path);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_lock_is_test_and_set() {
        let state = StateCache::new();
        assert!(state.try_lock("a.md"));
        assert!(!state.try_lock("a.md"));
        state.unlock("a.md");
        assert!(state.try_lock("a.md"));
    }

    #[test]
    fn unlock_is_idempotent() {
        let state = StateCache::new();
        state.unlock("a.md");
        assert!(state.try_lock("a.md"));
        state.unlock("a.md");
        state.unlock("a.md");
        assert!(state.try_lock("a.md"));
    }

    #[test]
    fn pending_recheck_consumed_once() {
        let state = StateCache::new();
        state.mark_pending_recheck("a.md");
        state.mark_pending_recheck("a.md");
        assert!(state.take_pending_recheck("a.md"));
        assert!(!state.take_pending_recheck("a.md"));
    }

    #[test]
    fn recently_renamed_window() {
        let state = StateCache::new();
        state.mark_recently_renamed("a.md", 1000);
        assert!(state.renamed_within("a.md", 1100, 200));
        assert!(!state.renamed_within("a.md", 1300, 200));
        assert!(!state.renamed_within("b.md", 1000, 200));
    }

    #[test]
    fn rename_rekeys_all_tables() {
        let state = StateCache::new();
        state.set_content("old.md", "body");
        state.mark_pending_recheck("old.md");
        state.mark_recently_renamed("old.md", 5);
        state.set_title_region(
            "old.md",
            TitleRegion {
                first_non_empty_line: "# T".into(),
                title_source_line: "# T".into(),
                last_updated_ms: 5,
            },
        );

        state.notify_file_renamed("old.md", "new.md");

        assert_eq!(state.get_content("old.md"), None);
        assert_eq!(state.get_content("new.md").as_deref(), Some("body"));
        assert!(state.take_pending_recheck("new.md"));
        assert!(state.renamed_within("new.md", 10, 100));
        assert!(state.title_region("new.md").is_some());
        assert!(state.title_region("old.md").is_none());
    }

    #[test]
    fn forget_drops_everything() {
        let state = StateCache::new();
        state.set_content("a.md", "x");
        state.mark_pending_recheck("a.md");
        assert!(state.try_lock("a.md"));

        state.forget("a.md");
        assert_eq!(state.get_content("a.md"), None);
        assert!(!state.take_pending_recheck("a.md"));
        assert!(state.try_lock("a.md"));
    }

    #[test]
    fn reserve_path_claims_destination() {
        let state = StateCache::new();
        assert!(state.reserve_path("Title.md"));
        assert!(!state.reserve_path("Title.md"));
        assert!(state.is_reserved("Title.md"));
        state.release_path("Title.md");
        assert!(!state.is_reserved("Title.md"));
    }
}
