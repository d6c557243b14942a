//! The `lingua stats` command.

use anyhow::Result;
use comfy_table::{Cell, Table};
use serde::Serialize;

use lingua_core::statistics::{Analytics, LessonReport, UserOverview};

use super::{print_json, Session};
use crate::GlobalOpts;

#[derive(Serialize)]
struct StatsOutput {
    overview: UserOverview,
    #[serde(skip_serializing_if = "Option::is_none")]
    lesson: Option<LessonReport>,
}

pub async fn execute(global: &GlobalOpts, lesson: Option<i64>) -> Result<()> {
    let session = Session::open(global)?;
    let analytics = Analytics::new(session.services.clone());
    let overview = analytics.user_overview(global.user).await?;
    let lesson = match lesson {
        Some(id) => Some(analytics.lesson_report(global.user, id).await?),
        None => None,
    };

    if global.json {
        return print_json(&StatsOutput { overview, lesson });
    }

    println!(
        "User {}: level {} ({} XP)",
        overview.user_id, overview.level, overview.total_xp
    );
    println!(
        "Lessons: {} completed, {} in progress, average score {:.1}%, {} attempt(s)",
        overview.lessons_completed,
        overview.lessons_in_progress,
        overview.average_score,
        overview.attempts
    );

    if !overview.levels.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Level", "Lessons", "Completed", "%"]);
        for row in &overview.levels {
            table.add_row(vec![
                Cell::new(&row.level),
                Cell::new(row.lessons),
                Cell::new(row.completed),
                Cell::new(format!("{:.0}", row.ratio() * 100.0)),
            ]);
        }
        println!("{table}");
    }

    let srs = &overview.srs;
    println!(
        "Cards: {} total, {} new, {} learning, {} mature, {} due now; {} word(s) mastered; accuracy {:.1}%",
        srs.total, srs.new, srs.learning, srs.mature, srs.due_now, srs.mastered_words, srs.accuracy
    );

    if let Some(report) = lesson {
        let stats = &report.stats;
        println!(
            "\nLesson {}: {} attempt(s), best {:.1}%, average {:.1}%, last {:.1}%, pass rate {:.0}%",
            report.lesson_id,
            stats.attempts,
            stats.best_score,
            stats.average_score,
            stats.last_score,
            stats.pass_rate * 100.0
        );
        if let Some(n) = stats.first_pass {
            println!("First passed on attempt #{n}");
        }
        if !report.mistakes.is_empty() {
            let mut table = Table::new();
            table.set_header(vec!["Exercise", "Times missed"]);
            for m in &report.mistakes {
                table.add_row(vec![Cell::new(&m.index), Cell::new(m.count)]);
            }
            println!("{table}");
        }
    }
    Ok(())
}
