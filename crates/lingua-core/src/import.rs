//! Loading module documents into the store.
//!
//! An import file holds one module:
//!
//! ```json
//! { "module": { "id": 1, "title": "Greetings", "level": "A1",
//!               "lessons": [ { "order": 1, "title": "Hello", "type": "flashcards", "content": {} } ] } }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::content::{CardWord, LessonContent, VocabularyItem};
use crate::error::CoreError;
use crate::model::{cefr_catalogue, Lesson, LessonKind, Module, ModuleId, Prerequisite, Word};
use crate::schema::validate_content;
use crate::traits::{Sequence, Store};

// ---------------------------------------------------------------------------
// Raw document
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ImportFile {
    module: ModuleFile,
}

#[derive(Debug, Deserialize)]
struct ModuleFile {
    #[serde(default)]
    id: Option<ModuleId>,
    #[serde(default)]
    number: Option<u32>,
    title: String,
    level: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    prerequisites: Vec<Prerequisite>,
    #[serde(default)]
    lessons: Vec<LessonFile>,
}

#[derive(Debug, Deserialize)]
struct LessonFile {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    order: Option<i32>,
    #[serde(default)]
    number: Option<u32>,
    title: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Value,
    #[serde(default)]
    min_cards_required: Option<u32>,
    #[serde(default)]
    min_accuracy_required: Option<u32>,
}

// ---------------------------------------------------------------------------
// Parsed import
// ---------------------------------------------------------------------------

/// A module ready to be written to the store.
#[derive(Debug, Clone)]
pub struct ModuleImport {
    /// File the module came from.
    pub source: PathBuf,
    /// `None` when the document did not fix an id; one is allocated on apply.
    pub id: Option<ModuleId>,
    pub level: String,
    /// Position within the level.
    pub number: u32,
    pub title: String,
    pub description: String,
    pub prerequisites: Vec<Prerequisite>,
    pub lessons: Vec<LessonImport>,
    /// The document as read.
    pub raw: Value,
    pub warnings: Vec<ImportWarning>,
}

#[derive(Debug, Clone)]
pub struct LessonImport {
    pub id: Option<i64>,
    pub number: u32,
    pub order: i32,
    pub kind: LessonKind,
    pub title: String,
    pub content: Value,
    /// Canonical content, when validation succeeded.
    pub canonical: Option<LessonContent>,
    pub min_cards_required: Option<u32>,
    pub min_accuracy_required: Option<u32>,
}

/// A problem found while reading an import that did not stop it.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportWarning {
    /// Lesson title, when the warning concerns one lesson.
    pub lesson: Option<String>,
    pub message: String,
}

/// What [`apply_import`] wrote.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSummary {
    pub module_id: ModuleId,
    pub lessons: usize,
    pub words: usize,
}

/// Parse an import document from a file.
pub fn load_import_file(path: &Path) -> Result<ModuleImport> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read import file: {}", path.display()))?;
    parse_import_str(&content, path)
}

/// Parse an import document from a string.
pub fn parse_import_str(content: &str, source: &Path) -> Result<ModuleImport> {
    let raw: Value = serde_json::from_str(content)
        .with_context(|| format!("failed to parse import JSON: {}", source.display()))?;
    let file: ImportFile = serde_json::from_value(raw.clone())
        .with_context(|| format!("invalid import document: {}", source.display()))?;
    let module = file.module;

    let level = module.level.trim().to_uppercase();
    if !cefr_catalogue().iter().any(|l| l.code == level) {
        anyhow::bail!("{}: unknown CEFR level '{}'", source.display(), module.level);
    }

    let mut warnings = Vec::new();
    let mut lessons = Vec::new();
    let mut seen_numbers = HashSet::new();

    for (i, entry) in module.lessons.into_iter().enumerate() {
        let kind = match entry.kind.parse::<LessonKind>() {
            Ok(kind) => kind,
            Err(message) => {
                warnings.push(ImportWarning {
                    lesson: Some(entry.title.clone()),
                    message: format!("{message}; lesson skipped"),
                });
                continue;
            }
        };

        let position = i as u32 + 1;
        let number = entry
            .number
            .or_else(|| entry.order.and_then(|o| u32::try_from(o).ok()))
            .unwrap_or(position);
        if !seen_numbers.insert(number) {
            warnings.push(ImportWarning {
                lesson: Some(entry.title.clone()),
                message: format!("duplicate lesson number {number}"),
            });
        }

        let canonical = match validate_content(kind, &entry.content) {
            Ok(content) => Some(content),
            Err(err) => {
                warnings.push(ImportWarning {
                    lesson: Some(entry.title.clone()),
                    message: err.to_string(),
                });
                None
            }
        };

        lessons.push(LessonImport {
            id: entry.id,
            number,
            order: entry.order.unwrap_or(number as i32),
            kind,
            title: entry.title,
            content: entry.content,
            canonical,
            min_cards_required: entry.min_cards_required,
            min_accuracy_required: entry.min_accuracy_required,
        });
    }

    if lessons.is_empty() {
        warnings.push(ImportWarning {
            lesson: None,
            message: "module has no importable lessons".into(),
        });
    }

    Ok(ModuleImport {
        source: source.to_path_buf(),
        id: module.id,
        level,
        number: module
            .number
            .or_else(|| module.id.and_then(|id| u32::try_from(id).ok()))
            .unwrap_or(1),
        title: module.title,
        description: module.description,
        prerequisites: module.prerequisites,
        lessons,
        raw,
        warnings,
    })
}

/// Load every `*.json` import under `dir`, recursively. Unreadable files are
/// skipped with a warning.
pub fn load_import_directory(dir: &Path) -> Result<Vec<ModuleImport>> {
    let mut imports = Vec::new();

    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?;

    let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    paths.sort();

    for path in paths {
        if path.is_dir() {
            imports.extend(load_import_directory(&path)?);
        } else if path.extension().and_then(|e| e.to_str()) == Some("json") {
            match load_import_file(&path) {
                Ok(import) => imports.push(import),
                Err(e) => {
                    tracing::warn!("skipping {}: {e:#}", path.display());
                }
            }
        }
    }

    Ok(imports)
}

// ---------------------------------------------------------------------------
// Applying
// ---------------------------------------------------------------------------

/// Write an import to the store: its level, the module, its lessons and the
/// words its vocabulary and card lessons introduce.
///
/// Lessons whose content failed validation are still stored so an author can
/// fix them in place; they cannot be graded until they validate.
pub async fn apply_import(
    store: &dyn Store,
    import: &ModuleImport,
) -> Result<ImportSummary, CoreError> {
    let level = cefr_catalogue()
        .into_iter()
        .find(|l| l.code == import.level)
        .ok_or_else(|| CoreError::not_found("level", &import.level))?;
    store.put_level(level).await?;

    let module_id = match import.id {
        Some(id) => id,
        None => store.next_id(Sequence::Module).await?,
    };
    store
        .put_module(Module {
            id: module_id,
            level: import.level.clone(),
            number: import.number,
            title: import.title.clone(),
            description: import.description.clone(),
            prerequisites: import.prerequisites.clone(),
            raw_content: Some(import.raw.clone()),
        })
        .await?;

    let mut words = 0;
    for lesson in &import.lessons {
        let id = match lesson.id {
            Some(id) => id,
            None => store.next_id(Sequence::Lesson).await?,
        };
        let content = match &lesson.canonical {
            Some(canonical) => {
                words += register_words(store, canonical).await?;
                canonical.to_value()
            }
            None => lesson.content.clone(),
        };
        store
            .put_lesson(Lesson {
                id,
                module_id,
                number: lesson.number,
                order: lesson.order,
                kind: lesson.kind,
                title: lesson.title.clone(),
                content,
                min_cards_required: lesson.min_cards_required,
                min_accuracy_required: lesson.min_accuracy_required,
            })
            .await?;
    }

    tracing::info!(
        module = module_id,
        level = %import.level,
        lessons = import.lessons.len(),
        words,
        "module imported"
    );

    Ok(ImportSummary {
        module_id,
        lessons: import.lessons.len(),
        words,
    })
}

async fn register_words(store: &dyn Store, content: &LessonContent) -> Result<usize, CoreError> {
    let items: Vec<&VocabularyItem> = match content {
        LessonContent::Vocabulary(v) => v.words.iter().collect(),
        LessonContent::Card(c) => c
            .words
            .iter()
            .filter_map(|w| match w {
                CardWord::Item(item) => Some(item),
                CardWord::Id(_) => None,
            })
            .collect(),
        _ => return Ok(0),
    };

    let mut count = 0;
    for item in items {
        let Some(russian) = item.translation.as_deref().filter(|t| !t.trim().is_empty()) else {
            tracing::debug!(word = %item.word, "no translation, not registered");
            continue;
        };
        store
            .put_word(Word {
                id: item.word_id.unwrap_or(0),
                english: item.word.trim().to_string(),
                russian: russian.trim().to_string(),
                audio: item.audio.clone(),
                examples: item.example.iter().cloned().collect(),
            })
            .await?;
        count += 1;
    }
    Ok(count)
}
