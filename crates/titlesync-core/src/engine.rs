//! The rename pipeline.
//!
//! One invocation per trigger: resolve and gate, lock, read, derive the
//! title, resolve naming conflicts, rename exactly once, reconcile the alias.
//! Overlapping triggers for the same document are rejected (never queued) and
//! coalesced into a single follow-up recheck after the in-flight operation
//! releases the lock. Every exit path returns an [`Outcome`]; the lock is
//! released across all of them.

use std::collections::HashSet;
use std::sync::Arc;

use crate::alias::AliasManager;
use crate::clock::Clock;
use crate::config::{EngineConfig, ScopeStrategy, TransformOrder};
use crate::error::SyncError;
use crate::frontmatter::{self, PropertyValue};
use crate::host::{DocumentStore, Notifier, ViewKind};
use crate::limiter::RateLimiter;
use crate::outcome::{Outcome, SkipReason};
use crate::reader::{ContentReader, ReadOptions, ReadSource, ReadText};
use crate::state::{StateCache, TitleRegion};
use crate::tasks::{Task, TaskKind, TaskQueue};
use crate::title;

/// What caused a pipeline invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Keystroke-level change event, optionally carrying the buffer text
    Edit { supplied_text: Option<String> },
    /// Save event
    Save,
    /// Document-created event
    Create,
    /// Explicit user command; the only trigger that surfaces notifications
    Manual,
    /// One item of a user-initiated bulk operation
    Batch,
}

impl Trigger {
    fn is_batch(&self) -> bool {
        matches!(self, Trigger::Batch)
    }

    /// Automatic triggers may short-circuit on an unchanged title region
    fn is_automatic(&self) -> bool {
        matches!(self, Trigger::Edit { .. } | Trigger::Save | Trigger::Create)
    }
}

/// Per-call overrides
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOptions {
    /// Skip the inclusion/exclusion policy; used by bulk operations that
    /// already pre-filtered their target set. The disable-property check is
    /// never skipped.
    pub skip_scope_check: bool,
}

enum ConflictResolution {
    Target(String),
    NoRenameNeeded,
    Exceeded,
}

struct Derived {
    /// Filename stem the document should have
    stem: String,
    /// Alias to write, `None` when the title carries no meaning
    alias: Option<String>,
    /// Title-region snapshot for the short-circuit cache
    region: Option<TitleRegion>,
}

/// The rename-and-alias synchronization engine
pub struct RenameEngine {
    store: Arc<dyn DocumentStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: Arc<EngineConfig>,
    limiter: RateLimiter,
    state: StateCache,
    reader: ContentReader,
    alias: AliasManager,
    tasks: TaskQueue,
}

impl RenameEngine {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let config = Arc::new(config);
        let limiter = RateLimiter::new(
            Arc::clone(&clock),
            config.limits.window_ms,
            config.limits.max_per_key,
            config.limits.max_global,
        );
        RenameEngine {
            reader: ContentReader::new(Arc::clone(&store)),
            alias: AliasManager::new(Arc::clone(&store), Arc::clone(&config)),
            notifier,
            clock,
            limiter,
            state: StateCache::new(),
            tasks: TaskQueue::new(),
            config,
            store,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the pipeline once for one document
    pub fn process(&self, path: &str, trigger: Trigger, options: ProcessOptions) -> Outcome {
        if let Some(reason) = self.gate_before_lock(path, &trigger, options) {
            return self.finish(path, &trigger, Outcome::Skipped(reason));
        }

        // Concurrent triggers are coalesced by rejection: the loser flags a
        // pending recheck instead of queuing behind stale intent.
        if !self.state.try_lock(path) {
            self.state.mark_pending_recheck(path);
            return self.finish(path, &trigger, Outcome::Skipped(SkipReason::AlreadyProcessing));
        }

        let outcome = match self.run_locked(path, &trigger, options) {
            Ok(outcome) => outcome,
            Err(SyncError::DocumentNotFound { .. }) => Outcome::Skipped(SkipReason::FileNotFound),
            Err(SyncError::ReadFailed { .. }) => Outcome::Skipped(SkipReason::ReadError),
            Err(error) => {
                tracing::error!(path, %error, "pipeline failure");
                Outcome::Failed(error)
            }
        };

        let current = match &outcome {
            Outcome::Renamed { to, .. } => to.clone(),
            _ => path.to_string(),
        };
        // Structured cleanup: unlock and pending-recheck consumption happen
        // regardless of which exit path was taken.
        self.state.unlock(path);
        self.state.unlock(&current);
        if self.state.take_pending_recheck(&current) {
            self.schedule_recheck(&current);
        }
        self.finish(&current, &trigger, outcome)
    }

    /// Host hook: a view/focus change. Consumes a deferred recheck once the
    /// document reaches a primary edit view.
    pub fn on_view_changed(&self, path: &str) {
        if self.store.view_kind(path) == ViewKind::Primary
            && self.state.has_pending_recheck(path)
            && self.state.take_pending_recheck(path)
        {
            self.tasks.schedule(
                TaskKind::AliasRecheck,
                path,
                self.clock.now_ms() + self.config.read.recheck_delay_ms,
            );
        }
    }

    /// Host hook: an externally initiated rename. Rekeys all per-path state
    /// and schedules a settle-delayed re-run so the title can win again.
    pub fn on_file_renamed(&self, old_path: &str, new_path: &str) {
        self.state.notify_file_renamed(old_path, new_path);
        self.state.clear_title_region(new_path);
        self.limiter.rename_key(old_path, new_path);
        self.tasks.rekey(old_path, new_path);
        self.tasks.schedule(
            TaskKind::SettleDelay,
            new_path,
            self.clock.now_ms() + self.config.read.recheck_delay_ms,
        );
    }

    /// Host hook: a document was deleted
    pub fn on_file_deleted(&self, path: &str) {
        self.state.forget(path);
        self.limiter.clear_key(path);
        self.tasks.cancel(TaskKind::AliasRecheck, path);
        self.tasks.cancel(TaskKind::SettleDelay, path);
    }

    /// Run every deferred task that has come due
    pub fn run_due_tasks(&self) -> Vec<(Task, Outcome)> {
        self.tasks
            .take_due(self.clock.now_ms())
            .into_iter()
            .map(|task| {
                let outcome = self.process(&task.path, Trigger::Save, ProcessOptions::default());
                (task, outcome)
            })
            .collect()
    }

    /// Earliest pending deferred task, for host scheduling
    pub fn next_task_due(&self) -> Option<u64> {
        self.tasks.next_due()
    }

    fn gate_before_lock(
        &self,
        path: &str,
        trigger: &Trigger,
        options: ProcessOptions,
    ) -> Option<SkipReason> {
        if !path.to_lowercase().ends_with(".md") {
            return Some(SkipReason::NotMarkdown);
        }
        if !self.store.exists(path) {
            return Some(SkipReason::FileNotFound);
        }
        // The host may still deliver create events for a path we just renamed
        if matches!(trigger, Trigger::Create)
            && self.state.renamed_within(
                path,
                self.clock.now_ms(),
                self.config.read.recently_renamed_ms,
            )
        {
            return Some(SkipReason::RecentlyRenamed);
        }
        if !options.skip_scope_check && !self.path_in_scope(path) {
            return Some(SkipReason::Excluded);
        }
        None
    }

    fn run_locked(
        &self,
        path: &str,
        trigger: &Trigger,
        options: ProcessOptions,
    ) -> Result<Outcome, SyncError> {
        // Re-validate existence now that we hold the lock; the document can
        // vanish between suspension points.
        if !self.store.exists(path) {
            return Ok(Outcome::Skipped(SkipReason::FileNotFound));
        }

        let read = self.reader.read(path, &self.read_options(trigger))?;
        if let Some(reason) = self.partial_edit_guard(path, &read) {
            return Ok(Outcome::Skipped(reason));
        }

        let previous_content = self.state.get_content(path);

        if !self.limiter.check(path) {
            return Ok(Outcome::Skipped(SkipReason::TimeRateLimited));
        }
        if !trigger.is_batch() && !self.limiter.check_global() {
            return Ok(Outcome::Skipped(SkipReason::GlobalRateLimited));
        }

        let mapping = frontmatter::parse(&read.text, path)?;
        if self.is_disabled(&mapping) {
            return Ok(Outcome::Skipped(SkipReason::PropertyDisabled));
        }
        if !options.skip_scope_check && !self.content_in_scope(path, &mapping) {
            return Ok(Outcome::Skipped(SkipReason::Excluded));
        }

        // Only invocations that reach derivation move the last-processed
        // baseline; a gated glimpse of emptied content must not become the
        // "was always empty" reference for the next run.
        self.state.set_content(path, &read.text);

        match self.derive(path, trigger, &read.text, previous_content.as_deref()) {
            Ok(Some(derived)) => self.commit(path, trigger, &read, derived),
            Ok(None) => Ok(Outcome::Unchanged),
            Err(reason) => Ok(Outcome::Skipped(reason)),
        }
    }

    /// Derive the target filename stem and alias from content.
    ///
    /// `Ok(None)` means the title region is unchanged since the last
    /// consistent run, so the whole invocation is a no-op. `Err` carries the
    /// skip reason when a policy gate fires.
    fn derive(
        &self,
        path: &str,
        trigger: &Trigger,
        content: &str,
        previous_content: Option<&str>,
    ) -> Result<Option<Derived>, SkipReason> {
        let body = frontmatter::body(content);
        let Some(first_line) = title::first_non_empty_line(body) else {
            let had_content = previous_content
                .map(|prev| title::first_non_empty_line(frontmatter::body(prev)).is_some())
                .unwrap_or(false);
            if !had_content {
                // Always-empty documents are left alone so in-progress
                // external templating is not disturbed
                return Err(SkipReason::EmptyContentRetained);
            }
            return Ok(Some(Derived {
                stem: self.config.title.placeholder.clone(),
                alias: None,
                region: None,
            }));
        };

        let source = title::resolve_title_source(body, &self.config.title)
            .unwrap_or_else(|| first_line.trim().to_string());

        let region = TitleRegion {
            first_non_empty_line: first_line.trim().to_string(),
            title_source_line: source.clone(),
            last_updated_ms: self.clock.now_ms(),
        };
        if trigger.is_automatic()
            && self
                .state
                .title_region(path)
                .is_some_and(|cached| cached.first_non_empty_line == region.first_non_empty_line
                    && cached.title_source_line == region.title_source_line)
        {
            // The text that determines the title did not change
            return Ok(None);
        }

        if self.config.title.headings_only && !title::is_heading(first_line) {
            return Err(SkipReason::NotHeading);
        }
        if title::matches_safeword(&source, &self.config.safewords) {
            return Err(SkipReason::Safeword);
        }
        // Renaming would desynchronize a link pointing at this document
        if title::is_self_referential(&source, path) {
            return Err(SkipReason::SelfReferential);
        }

        let display = self.transform(&source);
        let meaningful = !display.is_empty();
        let stem = if meaningful {
            title::sanitize_filename(&display, &self.config.chars, &self.config.title)
        } else {
            self.config.title.placeholder.clone()
        };
        Ok(Some(Derived {
            stem,
            alias: meaningful.then_some(display),
            region: Some(region),
        }))
    }

    fn transform(&self, source: &str) -> String {
        let stripped = match self.config.title.transform_order {
            TransformOrder::ReplaceThenStrip => {
                let replaced = title::apply_replacements(source, &self.config.replacements);
                self.strip(&replaced)
            }
            TransformOrder::StripThenReplace => {
                let stripped = self.strip(source);
                title::apply_replacements(&stripped, &self.config.replacements)
            }
        };
        title::collapse_whitespace(&stripped)
    }

    fn strip(&self, line: &str) -> String {
        if self.config.title.strip_markup {
            title::strip_markup(line, &self.config.title)
        } else {
            line.trim().to_string()
        }
    }

    /// Steps 10-14: conflict resolution, stale-read guard, alias, rename,
    /// post-rename bookkeeping.
    fn commit(
        &self,
        path: &str,
        trigger: &Trigger,
        read: &ReadText,
        derived: Derived,
    ) -> Result<Outcome, SyncError> {
        let dir = match path.rfind('/') {
            Some(idx) => &path[..=idx],
            None => "",
        };

        let target = match self.resolve_conflict(path, dir, &derived.stem) {
            ConflictResolution::NoRenameNeeded => {
                // Filename already correct; the alias may still be stale
                let changed = self.reconcile_alias(path, read, &derived, trigger);
                if let Some(region) = derived.region {
                    self.state.set_title_region(path, region);
                }
                return Ok(if changed {
                    Outcome::AliasOnly
                } else {
                    Outcome::Unchanged
                });
            }
            ConflictResolution::Exceeded => {
                tracing::warn!(
                    path,
                    stem = %derived.stem,
                    "conflict suffix ceiling exceeded; pathological input or bug"
                );
                return Ok(Outcome::Skipped(SkipReason::MaxConflictsExceeded));
            }
            ConflictResolution::Target(target) => target,
        };

        // A disk or cache read can be stale immediately after a rename
        if read.source.may_lag_rename()
            && self.state.renamed_within(
                path,
                self.clock.now_ms(),
                self.config.read.recently_renamed_ms,
            )
        {
            return Ok(Outcome::Skipped(SkipReason::RecentlyRenamed));
        }

        self.state.reserve_path(&target);
        // Alias first, against pre-rename content with the new title; a
        // failed alias update never fails the rename that triggered it
        self.reconcile_alias(path, read, &derived, trigger);

        if !self.store.exists(path) {
            self.state.release_path(&target);
            return Ok(Outcome::Skipped(SkipReason::FileNotFound));
        }
        let rename_result = self.store.rename(path, &target);
        self.state.release_path(&target);
        match rename_result {
            Ok(()) => {}
            Err(SyncError::DocumentNotFound { .. }) => {
                return Ok(Outcome::Skipped(SkipReason::FileNotFound));
            }
            Err(error) => return Err(error),
        }

        let now = self.clock.now_ms();
        self.state.notify_file_renamed(path, &target);
        self.limiter.rename_key(path, &target);
        self.tasks.rekey(path, &target);
        self.state.mark_recently_renamed(path, now);
        self.state.mark_recently_renamed(&target, now);
        if let Some(region) = derived.region {
            self.state.set_title_region(&target, region);
        }
        tracing::info!(from = path, to = %target, "renamed");
        Ok(Outcome::Renamed {
            from: path.to_string(),
            to: target,
        })
    }

    /// Alias failures are logged and swallowed: the rename is the primary
    /// user-visible contract, the alias is best-effort metadata.
    fn reconcile_alias(
        &self,
        path: &str,
        read: &ReadText,
        derived: &Derived,
        trigger: &Trigger,
    ) -> bool {
        match self.alias.reconcile(
            path,
            &read.text,
            derived.alias.as_deref(),
            &derived.stem,
            trigger.is_batch(),
        ) {
            Ok(changed) => changed,
            Err(error) => {
                tracing::warn!(path, %error, "alias update failed");
                false
            }
        }
    }

    fn resolve_conflict(&self, current: &str, dir: &str, stem: &str) -> ConflictResolution {
        let current_lower = current.to_lowercase();
        // The underlying store may be case-insensitive regardless of the
        // case it displays
        let existing: HashSet<String> = self
            .store
            .list_paths()
            .into_iter()
            .map(|p| p.to_lowercase())
            .collect();

        for attempt in 0..self.config.limits.max_conflict_attempts {
            let candidate = if attempt == 0 {
                format!("{dir}{stem}.md")
            } else {
                format!("{dir}{stem} {attempt}.md")
            };
            let candidate_lower = candidate.to_lowercase();
            if candidate_lower == current_lower {
                return ConflictResolution::NoRenameNeeded;
            }
            if existing.contains(&candidate_lower) || self.state.is_reserved(&candidate) {
                continue;
            }
            return ConflictResolution::Target(candidate);
        }
        ConflictResolution::Exceeded
    }

    fn read_options(&self, trigger: &Trigger) -> ReadOptions {
        let mut options = ReadOptions {
            strategy: self.config.read.strategy,
            ..Default::default()
        };
        if let Trigger::Edit { supplied_text } = trigger {
            options.supplied_text = supplied_text.clone();
            options.scan_previews = true;
        }
        options
    }

    /// An edit event that carries only a small nested region (a footnote body
    /// edited in a popover) must not drive the title, or renames ping-pong
    /// between the fragment and the real first line.
    fn partial_edit_guard(&self, path: &str, read: &ReadText) -> Option<SkipReason> {
        if read.source != ReadSource::Supplied {
            return None;
        }
        let full_len = self
            .store
            .read_cached(path)
            .map(|text| text.len())
            .unwrap_or(0);
        if full_len == 0 || read.text.len() >= full_len {
            return None;
        }
        let threshold = self.config.read.partial_edit_threshold_pct as usize;
        if read.text.len() * 100 < full_len * threshold {
            return Some(SkipReason::FootnotePopoverEdit);
        }
        None
    }

    fn is_disabled(&self, mapping: &serde_yaml::Mapping) -> bool {
        let value = PropertyValue::from_mapping(mapping, &self.config.scope.disable_property_key);
        value
            .normalize()
            .iter()
            .any(|v| v == &self.config.scope.disable_property_value)
    }

    /// Path-only scope gate, before content is available. Tag/property rules
    /// cannot be decided here; exclude-all-except defers to the content gate.
    fn path_in_scope(&self, path: &str) -> bool {
        match self.config.scope.strategy {
            ScopeStrategy::OnlyExclude => !self.folder_matches(path),
            ScopeStrategy::ExcludeAllExcept => true,
        }
    }

    /// Frontmatter-aware scope gate
    fn content_in_scope(&self, path: &str, mapping: &serde_yaml::Mapping) -> bool {
        let matched = self.folder_matches(path)
            || self.tag_matches(mapping)
            || self.property_matches(mapping);
        match self.config.scope.strategy {
            ScopeStrategy::OnlyExclude => !matched,
            ScopeStrategy::ExcludeAllExcept => matched,
        }
    }

    fn folder_matches(&self, path: &str) -> bool {
        self.config.scope.folders.iter().any(|folder| {
            let prefix = folder.trim_end_matches('/');
            path.strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    fn tag_matches(&self, mapping: &serde_yaml::Mapping) -> bool {
        let tags = PropertyValue::from_mapping(mapping, "tags").normalize();
        self.config.scope.tags.iter().any(|wanted| {
            let wanted = wanted.trim_start_matches('#');
            tags.iter()
                .any(|tag| tag.trim_start_matches('#').eq_ignore_ascii_case(wanted))
        })
    }

    fn property_matches(&self, mapping: &serde_yaml::Mapping) -> bool {
        self.config.scope.properties.iter().any(|key| {
            PropertyValue::from_mapping(mapping, key) != PropertyValue::Absent
        })
    }

    fn schedule_recheck(&self, path: &str) {
        match self.store.view_kind(path) {
            ViewKind::Primary => self.tasks.schedule(
                TaskKind::AliasRecheck,
                path,
                self.clock.now_ms() + self.config.read.recheck_delay_ms,
            ),
            // Popovers cannot reliably recheck (host sync lag); defer until a
            // primary view context is detected
            ViewKind::Popover | ViewKind::Background => self.state.mark_pending_recheck(path),
        }
    }

    fn finish(&self, path: &str, trigger: &Trigger, outcome: Outcome) -> Outcome {
        match &outcome {
            Outcome::Skipped(reason) if reason.is_contention() => {
                tracing::debug!(path, reason = %reason, "skipped")
            }
            Outcome::Skipped(reason) => tracing::debug!(path, reason = %reason, "not processed"),
            Outcome::Unchanged => tracing::trace!(path, "unchanged"),
            _ => {}
        }
        if matches!(trigger, Trigger::Manual) {
            self.notify_manual(&outcome);
        }
        outcome
    }

    fn notify_manual(&self, outcome: &Outcome) {
        use crate::config::NotificationMode;
        let mode = self.config.notifications;
        if mode == NotificationMode::Never {
            return;
        }
        let message = match outcome {
            Outcome::Renamed { to, .. } => Some(format!("Renamed to {to}")),
            Outcome::AliasOnly => Some("Alias updated".to_string()),
            Outcome::Unchanged if mode == NotificationMode::Always => {
                Some("No change".to_string())
            }
            Outcome::Skipped(reason) if mode == NotificationMode::Always => {
                Some(format!("Skipped: {reason}"))
            }
            Outcome::Failed(error) if mode == NotificationMode::Always => {
                Some(format!("Failed: {error}"))
            }
            _ => None,
        };
        if let Some(message) = message {
            self.notifier.notify(&message);
        }
    }
}

#[cfg(test)]
mod tests;
