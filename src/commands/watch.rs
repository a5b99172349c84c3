//! Filesystem watch loop.
//!
//! Debounced change events feed the engine; the loop also drains the
//! engine's deferred task queue (settle delays, alias rechecks) on a short
//! tick so renames observed from outside still resynchronize.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;

use titlesync_core::engine::{ProcessOptions, Trigger};
use titlesync_core::error::{Result, SyncError};
use titlesync_core::host::DocumentStore;
use titlesync_core::outcome::Outcome;

use super::Context;

const TICK_MS: u64 = 100;

pub fn run(ctx: &Context, debounce_ms: u64) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let mut debouncer = new_debouncer(Duration::from_millis(debounce_ms), tx)
        .map_err(|e| SyncError::Other(format!("failed to start watcher: {e}")))?;
    debouncer
        .watcher()
        .watch(ctx.host.root(), RecursiveMode::Recursive)
        .map_err(|e| SyncError::Other(format!("failed to watch root: {e}")))?;

    let running = Arc::new(AtomicBool::new(true));
    let handle = Arc::clone(&running);
    ctrlc::set_handler(move || handle.store(false, Ordering::SeqCst))
        .map_err(|e| SyncError::Other(format!("failed to install signal handler: {e}")))?;

    if !ctx.quiet {
        eprintln!(
            "watching {} (ctrl-c to stop)",
            ctx.host.root().display()
        );
    }

    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(Duration::from_millis(TICK_MS)) {
            Ok(Ok(events)) => {
                for event in events {
                    handle_event(ctx, &event.path);
                }
            }
            Ok(Err(error)) => tracing::warn!(%error, "watch error"),
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }

        for (task, outcome) in ctx.engine.run_due_tasks() {
            if outcome.changed() {
                ctx.report(&task.path, &outcome);
            }
        }
    }

    Ok(())
}

fn handle_event(ctx: &Context, path: &std::path::Path) {
    let Some(rel) = ctx.host.relativize(path) else {
        return;
    };
    if !rel.to_lowercase().ends_with(".md") {
        return;
    }
    // A watcher sees a rename as a delete plus a create. When the path is
    // gone, drop its per-path state instead of feeding it to the pipeline,
    // or the content cache and rate windows grow for the process lifetime.
    if !ctx.host.exists(&rel) {
        ctx.engine.on_file_deleted(&rel);
        return;
    }
    // The watcher cannot distinguish our own renames from external ones;
    // the engine's recently-renamed suppression handles the echo.
    let outcome = ctx
        .engine
        .process(&rel, Trigger::Save, ProcessOptions::default());
    if outcome.changed() || matches!(outcome, Outcome::Failed(_)) {
        ctx.report(&rel, &outcome);
    }
}
