//! The `lingua grade` command.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use comfy_table::{Cell, Table};
use serde_json::Value;

use lingua_core::grader::{Answers, SubmissionGrader};

use super::{print_json, Session};
use crate::GlobalOpts;

pub async fn execute(
    global: &GlobalOpts,
    lesson: i64,
    answers: Option<String>,
    answers_file: Option<PathBuf>,
) -> Result<()> {
    let text = match (answers, answers_file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read answers: {}", path.display()))?,
        (None, None) => bail!("either --answers or --answers-file is required"),
    };
    let value: Value = serde_json::from_str(&text).context("answers are not valid JSON")?;
    let answers = Answers::from_value(value)?;

    let session = Session::open(global)?;
    let response = SubmissionGrader::new(session.services.clone())
        .grade(lesson, global.user, answers)
        .await?;
    session.save().await?;

    if global.json {
        return print_json(&response);
    }
    if !response.success {
        bail!(
            "lesson {lesson} cannot be graded: {}",
            response.error.unwrap_or_default()
        );
    }

    let mut table = Table::new();
    table.set_header(vec!["#", "Result", "Your answer", "Correct answer"]);
    for (index, feedback) in &response.feedback {
        table.add_row(vec![
            Cell::new(index),
            Cell::new(if feedback.is_correct() { "correct" } else { "incorrect" }),
            Cell::new(display(&feedback.user_answer)),
            Cell::new(display(&feedback.correct_answer)),
        ]);
    }
    if !response.feedback.is_empty() {
        println!("{table}");
    }

    for section in &response.sections {
        println!(
            "  {}: {}% ({}/{})",
            section.name, section.score, section.correct_count, section.total_count
        );
    }

    println!(
        "Score: {}% ({}/{}){}",
        response.score,
        response.correct_count,
        response.total_count,
        if response.completed { ", lesson completed" } else { "" }
    );
    if let Some(n) = response.attempt_number {
        println!("Attempt #{n}");
    }
    Ok(())
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}
