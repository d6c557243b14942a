//! The `lingua validate` command.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use serde_json::Value;

use lingua_core::import::{load_import_directory, load_import_file};
use lingua_core::model::LessonKind;
use lingua_core::schema::validate_content;

pub fn execute(path: PathBuf, kind: Option<String>) -> Result<()> {
    match kind {
        Some(kind) => validate_lesson_file(path, &kind),
        None => validate_imports(path),
    }
}

fn validate_lesson_file(path: PathBuf, kind: &str) -> Result<()> {
    let kind: LessonKind = kind.parse().map_err(|e: String| anyhow!(e))?;
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw: Value = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse JSON: {}", path.display()))?;
    validate_content(kind, &raw)?;
    println!("Valid {kind} content: {}", path.display());
    Ok(())
}

fn validate_imports(path: PathBuf) -> Result<()> {
    let modules = if path.is_dir() {
        load_import_directory(&path)?
    } else {
        vec![load_import_file(&path)?]
    };

    let mut total_warnings = 0;

    for module in &modules {
        println!(
            "Module: {} ({}, {} lessons)",
            module.title,
            module.level,
            module.lessons.len()
        );
        for w in &module.warnings {
            let prefix = w
                .lesson
                .as_ref()
                .map(|title| format!("  [{title}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += module.warnings.len();
    }

    if total_warnings == 0 {
        println!("All modules valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
