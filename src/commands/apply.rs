//! Bulk synchronization across the vault

use std::sync::Arc;

use titlesync_core::clock::SystemClock;
use titlesync_core::engine::{ProcessOptions, RenameEngine, Trigger};
use titlesync_core::error::{Result, SyncError};
use titlesync_core::host::memory::MemoryHost;
use titlesync_core::host::{DocumentStore, NullNotifier};
use titlesync_core::outcome::Outcome;

use crate::cli::OutputFormat;

use super::{outcome_json, Context};

#[derive(Debug, Default)]
struct Totals {
    renamed: usize,
    alias_only: usize,
    unchanged: usize,
    skipped: usize,
    failed: usize,
}

impl Totals {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Renamed { .. } => self.renamed += 1,
            Outcome::AliasOnly => self.alias_only += 1,
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }
}

pub fn run(ctx: &Context, ignore_scope: bool, dry_run: bool) -> Result<()> {
    let mut paths = ctx.host.list_paths();
    paths.sort();

    if dry_run {
        return preview(ctx, &paths, ignore_scope);
    }

    let options = ProcessOptions {
        skip_scope_check: ignore_scope,
    };
    let mut totals = Totals::default();

    for path in &paths {
        let outcome = ctx.engine.process(path, Trigger::Batch, options);
        totals.record(&outcome);
        ctx.report(path, &outcome);
    }

    summarize(ctx, paths.len(), &totals);

    if totals.failed > 0 {
        return Err(SyncError::Other(format!(
            "{} of {} documents failed",
            totals.failed,
            paths.len()
        )));
    }
    Ok(())
}

/// Run the batch against an in-memory copy of the vault, reporting the
/// outcomes without mutating anything on disk.
fn preview(ctx: &Context, paths: &[String], ignore_scope: bool) -> Result<()> {
    let shadow = Arc::new(MemoryHost::new());
    for path in paths {
        shadow.insert(path, &ctx.host.read_fresh(path)?);
    }
    let engine = RenameEngine::new(
        Arc::clone(&shadow) as Arc<dyn DocumentStore>,
        Arc::new(NullNotifier),
        Arc::new(SystemClock::new()),
        ctx.config.clone(),
    );

    let options = ProcessOptions {
        skip_scope_check: ignore_scope,
    };
    let mut totals = Totals::default();

    for path in paths {
        let outcome = engine.process(path, Trigger::Batch, options);
        totals.record(&outcome);
        report_preview(ctx, path, &outcome);
    }

    summarize(ctx, paths.len(), &totals);
    Ok(())
}

fn report_preview(ctx: &Context, path: &str, outcome: &Outcome) {
    match ctx.format {
        OutputFormat::Json => {
            let mut line = outcome_json(path, outcome);
            line["dry_run"] = serde_json::Value::Bool(true);
            println!("{line}");
        }
        OutputFormat::Human => match outcome {
            Outcome::Renamed { from, to } => println!("would rename {from} -> {to}"),
            Outcome::AliasOnly => println!("would update alias {path}"),
            Outcome::Unchanged => {
                if !ctx.quiet {
                    println!("unchanged {path}");
                }
            }
            Outcome::Skipped(reason) => {
                if !ctx.quiet {
                    println!("skipped {path} ({reason})");
                }
            }
            Outcome::Failed(error) => eprintln!("failed {path}: {error}"),
        },
    }
}

fn summarize(ctx: &Context, total: usize, totals: &Totals) {
    match ctx.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "summary": {
                    "total": total,
                    "renamed": totals.renamed,
                    "alias_only": totals.alias_only,
                    "unchanged": totals.unchanged,
                    "skipped": totals.skipped,
                    "failed": totals.failed,
                }
            })
        ),
        OutputFormat::Human => {
            if !ctx.quiet {
                println!(
                    "{} documents: {} renamed, {} alias-only, {} unchanged, {} skipped, {} failed",
                    total,
                    totals.renamed,
                    totals.alias_only,
                    totals.unchanged,
                    totals.skipped,
                    totals.failed
                );
            }
        }
    }
}
