//! The `lingua enter` command.

use anyhow::Result;

use lingua_core::access::AccessGatekeeper;

use super::{print_json, Session};
use crate::GlobalOpts;

pub async fn execute(global: &GlobalOpts, lesson: i64) -> Result<()> {
    let session = Session::open(global)?;
    let progress = AccessGatekeeper::new(session.services.clone())
        .enter_lesson(global.user, lesson)
        .await?;
    session.save().await?;

    if global.json {
        return print_json(&progress);
    }
    println!(
        "Lesson {}: {} (score {}%)",
        progress.lesson_id,
        progress.status,
        progress.percent()
    );
    Ok(())
}
