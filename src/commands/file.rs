//! Single-document synchronization

use titlesync_core::engine::{ProcessOptions, Trigger};
use titlesync_core::error::{Result, SyncError};
use titlesync_core::outcome::{Outcome, SkipReason};

use super::Context;

pub fn run(ctx: &Context, path: &str) -> Result<()> {
    let path = normalize(path);
    let outcome = ctx
        .engine
        .process(&path, Trigger::Manual, ProcessOptions::default());

    // A user explicitly named this document, so a missing file is an error
    // rather than a quiet abandonment
    if outcome.skip_reason() == Some(SkipReason::FileNotFound) {
        return Err(SyncError::DocumentNotFound { path });
    }

    ctx.report(&path, &outcome);
    match outcome {
        Outcome::Failed(error) => Err(error),
        _ => Ok(()),
    }
}

fn normalize(path: &str) -> String {
    path.trim_start_matches("./").replace('\\', "/")
}
