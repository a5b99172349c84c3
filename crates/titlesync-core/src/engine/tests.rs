use std::sync::Arc;

use super::*;
use crate::clock::ManualClock;
use crate::config::NotificationMode;
use crate::host::memory::{MemoryHost, RecordingNotifier};

struct Fixture {
    host: Arc<MemoryHost>,
    clock: Arc<ManualClock>,
    notifier: Arc<RecordingNotifier>,
    engine: RenameEngine,
}

impl Fixture {
    fn config_recheck_delay(&self) -> u64 {
        self.engine.config().read.recheck_delay_ms
    }
}

fn fixture() -> Fixture {
    fixture_with(EngineConfig::default())
}

fn fixture_with(config: EngineConfig) -> Fixture {
    let host = Arc::new(MemoryHost::new());
    let clock = ManualClock::new();
    let notifier = Arc::new(RecordingNotifier::new());
    let engine = RenameEngine::new(
        Arc::clone(&host) as Arc<dyn DocumentStore>,
        Arc::clone(&notifier) as Arc<dyn Notifier>,
        Arc::clone(&clock) as Arc<dyn Clock>,
        config,
    );
    Fixture {
        host,
        clock,
        notifier,
        engine,
    }
}

fn manual(f: &Fixture, path: &str) -> Outcome {
    f.engine
        .process(path, Trigger::Manual, ProcessOptions::default())
}

fn save(f: &Fixture, path: &str) -> Outcome {
    f.engine
        .process(path, Trigger::Save, ProcessOptions::default())
}

#[test]
fn title_drives_rename_and_alias() {
    let f = fixture();
    f.host.insert("note.md", "# Hello World\n");

    let outcome = manual(&f, "note.md");
    assert_eq!(
        outcome,
        Outcome::Renamed {
            from: "note.md".into(),
            to: "Hello World.md".into(),
        }
    );

    let content = f.host.content("Hello World.md").unwrap();
    assert!(content.contains("aliases:"));
    assert!(content.contains('\u{200B}'));
    // Alias is written against the pre-rename path, then the rename happens
    assert_eq!(f.host.frontmatter_writes(), vec!["note.md".to_string()]);
    assert_eq!(
        f.host.renames(),
        vec![("note.md".to_string(), "Hello World.md".to_string())]
    );
}

#[test]
fn reprocessing_is_idempotent() {
    let f = fixture();
    f.host.insert("note.md", "# Hello World\n");

    manual(&f, "note.md");
    let second = manual(&f, "Hello World.md");

    assert_eq!(second, Outcome::Unchanged);
    assert_eq!(f.host.renames().len(), 1);
    assert_eq!(f.host.frontmatter_writes().len(), 1);
}

#[test]
fn non_markdown_and_missing_files_are_skipped() {
    let f = fixture();
    f.host.insert("notes.txt", "# Hello\n");

    assert_eq!(
        manual(&f, "notes.txt"),
        Outcome::Skipped(SkipReason::NotMarkdown)
    );
    assert_eq!(
        manual(&f, "ghost.md"),
        Outcome::Skipped(SkipReason::FileNotFound)
    );
}

#[test]
fn concurrent_trigger_rejected_and_coalesced() {
    let f = fixture();
    f.host.insert("Busy.md", "# Busy\n");

    assert!(f.engine.state.try_lock("Busy.md"));
    assert_eq!(
        manual(&f, "Busy.md"),
        Outcome::Skipped(SkipReason::AlreadyProcessing)
    );
    assert!(f.engine.state.has_pending_recheck("Busy.md"));
    f.engine.state.unlock("Busy.md");

    // The flag is consumed by the next completed run and turned into one
    // deferred recheck when the document sits in a primary view
    f.host.set_view("Busy.md", ViewKind::Primary);
    assert_eq!(manual(&f, "Busy.md"), Outcome::AliasOnly);
    assert!(!f.engine.state.has_pending_recheck("Busy.md"));
    assert_eq!(
        f.engine.next_task_due(),
        Some(f.config_recheck_delay())
    );

    f.clock.advance(f.config_recheck_delay() + 1);
    let ran = f.engine.run_due_tasks();
    assert_eq!(ran.len(), 1);
    assert_eq!(ran[0].1, Outcome::Unchanged);
}

#[test]
fn conflict_allocates_first_free_suffix() {
    let f = fixture();
    f.host.insert("current.md", "# Title\n");
    f.host.insert("Title.md", "existing\n");
    // Case differences still count as taken
    f.host.insert("title 1.md", "existing\n");
    f.host.insert("Title 2.md", "existing\n");

    assert_eq!(
        manual(&f, "current.md"),
        Outcome::Renamed {
            from: "current.md".into(),
            to: "Title 3.md".into(),
        }
    );
}

#[test]
fn conflict_ceiling_aborts() {
    let mut config = EngineConfig::default();
    config.limits.max_conflict_attempts = 2;
    let f = fixture_with(config);
    f.host.insert("current.md", "# Title\n");
    f.host.insert("Title.md", "existing\n");
    f.host.insert("Title 1.md", "existing\n");

    assert_eq!(
        manual(&f, "current.md"),
        Outcome::Skipped(SkipReason::MaxConflictsExceeded)
    );
    assert!(f.host.renames().is_empty());
}

#[test]
fn case_only_difference_needs_no_rename() {
    let f = fixture();
    f.host.insert("hello world.md", "# Hello World\n");

    assert_eq!(manual(&f, "hello world.md"), Outcome::AliasOnly);
    assert!(f.host.renames().is_empty());
}

#[test]
fn self_referential_title_left_alone() {
    let f = fixture();
    f.host.insert("note.md", "# [[note]]\n");

    assert_eq!(
        manual(&f, "note.md"),
        Outcome::Skipped(SkipReason::SelfReferential)
    );
    assert!(f.host.renames().is_empty());
}

#[test]
fn emptied_document_gets_placeholder_exactly_once() {
    let f = fixture();
    f.host.insert("empty.md", "");

    // Never had content: leave it for whatever is still writing it
    assert_eq!(
        manual(&f, "empty.md"),
        Outcome::Skipped(SkipReason::EmptyContentRetained)
    );

    f.host.insert("empty.md", "# Real\n");
    assert_eq!(
        manual(&f, "empty.md"),
        Outcome::Renamed {
            from: "empty.md".into(),
            to: "Real.md".into(),
        }
    );

    f.clock.advance(1000);
    f.host.insert("Real.md", "");
    assert_eq!(
        manual(&f, "Real.md"),
        Outcome::Renamed {
            from: "Real.md".into(),
            to: "Untitled.md".into(),
        }
    );

    f.clock.advance(1000);
    assert_eq!(
        manual(&f, "Untitled.md"),
        Outcome::Skipped(SkipReason::EmptyContentRetained)
    );
}

#[test]
fn per_key_rate_limit_boundary() {
    let f = fixture();
    f.host.insert("Note.md", "# Note\n");

    assert_eq!(manual(&f, "Note.md"), Outcome::AliasOnly);
    for _ in 1..15 {
        assert_eq!(manual(&f, "Note.md"), Outcome::Unchanged);
    }
    assert_eq!(
        manual(&f, "Note.md"),
        Outcome::Skipped(SkipReason::TimeRateLimited)
    );

    f.clock.advance(501);
    assert_eq!(manual(&f, "Note.md"), Outcome::Unchanged);
}

#[test]
fn emptying_edit_survives_a_rate_limited_trigger() {
    let f = fixture();
    f.host.insert("Note.md", "# Note\n");

    assert_eq!(manual(&f, "Note.md"), Outcome::AliasOnly);
    for _ in 1..15 {
        assert_eq!(manual(&f, "Note.md"), Outcome::Unchanged);
    }

    // The emptying edit lands while the window is exhausted; the rejected
    // trigger must not update the last-processed baseline
    f.host.insert("Note.md", "");
    assert_eq!(
        manual(&f, "Note.md"),
        Outcome::Skipped(SkipReason::TimeRateLimited)
    );

    f.clock.advance(501);
    assert_eq!(
        manual(&f, "Note.md"),
        Outcome::Renamed {
            from: "Note.md".into(),
            to: "Untitled.md".into(),
        }
    );
}

#[test]
fn global_rate_limit_spares_batches() {
    let mut config = EngineConfig::default();
    config.limits.max_global = 2;
    let f = fixture_with(config);
    f.host.insert("A.md", "# A\n");
    f.host.insert("B.md", "# B\n");
    f.host.insert("C.md", "# C\n");

    assert_eq!(manual(&f, "A.md"), Outcome::AliasOnly);
    assert_eq!(manual(&f, "B.md"), Outcome::AliasOnly);
    assert_eq!(
        manual(&f, "C.md"),
        Outcome::Skipped(SkipReason::GlobalRateLimited)
    );
    // Bulk items still respect the per-key budget but not the global one
    assert_eq!(
        f.engine
            .process("C.md", Trigger::Batch, ProcessOptions::default()),
        Outcome::AliasOnly
    );
}

#[test]
fn partial_edit_fragment_does_not_drive_title() {
    let f = fixture();
    let full = format!("# Long Title\n\n{}\n", "x".repeat(400));
    f.host.insert("long.md", &full);

    let outcome = f.engine.process(
        "long.md",
        Trigger::Edit {
            supplied_text: Some("[^1]: tweaked footnote".into()),
        },
        ProcessOptions::default(),
    );
    assert_eq!(outcome, Outcome::Skipped(SkipReason::FootnotePopoverEdit));

    let outcome = f.engine.process(
        "long.md",
        Trigger::Edit {
            supplied_text: Some(full),
        },
        ProcessOptions::default(),
    );
    assert!(matches!(outcome, Outcome::Renamed { .. }));
}

#[test]
fn create_event_suppressed_right_after_rename() {
    let f = fixture();
    f.host.insert("note.md", "# Fresh\n");
    manual(&f, "note.md");

    assert_eq!(
        f.engine
            .process("Fresh.md", Trigger::Create, ProcessOptions::default()),
        Outcome::Skipped(SkipReason::RecentlyRenamed)
    );

    // Past the window the event processes normally; the unchanged title
    // region short-circuits it
    f.clock.advance(701);
    assert_eq!(
        f.engine
            .process("Fresh.md", Trigger::Create, ProcessOptions::default()),
        Outcome::Unchanged
    );
}

#[test]
fn stale_cache_read_cannot_rename_inside_window() {
    let f = fixture();
    f.host.insert("a.md", "# One\n");
    manual(&f, "a.md");

    f.host.insert("One.md", "# Two\n");
    assert_eq!(
        save(&f, "One.md"),
        Outcome::Skipped(SkipReason::RecentlyRenamed)
    );

    f.clock.advance(701);
    assert_eq!(
        save(&f, "One.md"),
        Outcome::Renamed {
            from: "One.md".into(),
            to: "Two.md".into(),
        }
    );
}

#[test]
fn external_rename_resynchronizes_after_settle_delay() {
    let f = fixture();
    f.host.insert("note.md", "# Proper Title\n");
    manual(&f, "note.md");
    f.clock.advance(1000);

    f.host.rename("Proper Title.md", "Wrong.md").unwrap();
    f.engine.on_file_renamed("Proper Title.md", "Wrong.md");

    f.clock.advance(f.config_recheck_delay() + 1);
    let ran = f.engine.run_due_tasks();
    assert_eq!(ran.len(), 1);
    assert_eq!(
        ran[0].1,
        Outcome::Renamed {
            from: "Wrong.md".into(),
            to: "Proper Title.md".into(),
        }
    );
}

#[test]
fn excluded_folder_skipped_unless_scope_check_disabled() {
    let mut config = EngineConfig::default();
    config.scope.folders = vec!["drafts".into()];
    let f = fixture_with(config);
    f.host.insert("drafts/x.md", "# Drafted Thing\n");

    assert_eq!(
        manual(&f, "drafts/x.md"),
        Outcome::Skipped(SkipReason::Excluded)
    );
    assert_eq!(
        f.engine.process(
            "drafts/x.md",
            Trigger::Manual,
            ProcessOptions {
                skip_scope_check: true,
            },
        ),
        Outcome::Renamed {
            from: "drafts/x.md".into(),
            to: "drafts/Drafted Thing.md".into(),
        }
    );
}

#[test]
fn exclude_all_except_requires_a_match() {
    let mut config = EngineConfig::default();
    config.scope.strategy = ScopeStrategy::ExcludeAllExcept;
    config.scope.tags = vec!["keep".into()];
    let f = fixture_with(config);
    f.host.insert("a.md", "# A\n");
    f.host
        .insert("b.md", "---\ntags:\n  - keep\n---\n# B Note\n");

    assert_eq!(manual(&f, "a.md"), Outcome::Skipped(SkipReason::Excluded));
    assert_eq!(
        manual(&f, "b.md"),
        Outcome::Renamed {
            from: "b.md".into(),
            to: "B Note.md".into(),
        }
    );
}

#[test]
fn disable_property_wins_even_when_scope_check_is_skipped() {
    let f = fixture();
    f.host
        .insert("t.md", "---\ntitlesync: off\n---\n# T\n");

    assert_eq!(
        f.engine.process(
            "t.md",
            Trigger::Manual,
            ProcessOptions {
                skip_scope_check: true,
            },
        ),
        Outcome::Skipped(SkipReason::PropertyDisabled)
    );
}

#[test]
fn only_manual_triggers_notify() {
    let f = fixture();
    f.host.insert("a.md", "# A Title\n");
    f.host.insert("b.md", "# B Title\n");

    save(&f, "a.md");
    assert!(f.notifier.messages().is_empty());

    manual(&f, "b.md");
    assert_eq!(f.notifier.messages(), vec!["Renamed to B Title.md"]);

    // on-change mode stays quiet for no-ops
    manual(&f, "B Title.md");
    assert_eq!(f.notifier.messages().len(), 1);
}

#[test]
fn always_mode_reports_no_ops_too() {
    let mut config = EngineConfig::default();
    config.notifications = NotificationMode::Always;
    let f = fixture_with(config);
    f.host.insert("Note.md", "# Note\n");

    manual(&f, "Note.md");
    manual(&f, "Note.md");
    assert_eq!(
        f.notifier.messages(),
        vec!["Alias updated".to_string(), "No change".to_string()]
    );
}

#[test]
fn deletion_drops_all_state() {
    let f = fixture();
    f.host.insert("d.md", "# D Title\n");
    manual(&f, "d.md");
    f.engine.state.mark_pending_recheck("D Title.md");

    f.engine.on_file_deleted("D Title.md");
    assert!(!f.engine.state.has_pending_recheck("D Title.md"));
    assert_eq!(f.engine.state.get_content("D Title.md"), None);
    assert!(f.engine.next_task_due().is_none());
}
