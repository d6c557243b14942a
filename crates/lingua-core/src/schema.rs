//! Per-kind structural validation of lesson content.
//!
//! Authors write content in several historical shapes. Validation collapses
//! every accepted alias onto one canonical field, so the grader never has to
//! branch on spelling. Fields the validator does not know are preserved.

use serde_json::{Map, Value};

use crate::content::{
    CardContent, CardWord, FinalTestContent, GrammarContent, LessonContent, MatchingContent, Pair,
    Question, QuestionKind, QuizContent, Section, SectionKind, TextContent, VocabularyContent,
    VocabularyItem,
};
use crate::error::{CoreError, Result};
use crate::model::{Lesson, LessonKind};

type Object = Map<String, Value>;

const VOCABULARY_CONTAINERS: &[&str] = &["words", "items", "cards", "vocabulary"];
const QUESTION_CONTAINERS: &[&str] = &["questions", "exercises"];
const PROMPT_KEYS: &[&str] = &[
    "question",
    "prompt",
    "statement",
    "instruction",
    "sentence",
    "russian",
];
const ANSWER_KEYS: &[&str] = &["correct", "correct_index", "correct_answer", "answer"];
const ALTERNATIVE_KEYS: &[&str] = &[
    "alternatives",
    "alternative_answers",
    "acceptable_answers",
    "accepted_answers",
];
const PASSING_KEYS: &[&str] = &["passing_score", "passing_score_percent"];

/// Validate the content of a stored lesson.
pub fn validate_lesson(lesson: &Lesson) -> Result<LessonContent> {
    validate_content(lesson.kind, &lesson.content)
}

/// Validate `raw` as content for a lesson of `kind` and return its canonical form.
pub fn validate_content(kind: LessonKind, raw: &Value) -> Result<LessonContent> {
    let parsed = match kind {
        LessonKind::Vocabulary => vocabulary(raw).map(LessonContent::Vocabulary),
        LessonKind::Grammar => grammar(raw).map(LessonContent::Grammar),
        LessonKind::Quiz => quiz(raw).map(LessonContent::Quiz),
        LessonKind::Matching => matching(raw).map(LessonContent::Matching),
        LessonKind::Text => text(raw).map(LessonContent::Text),
        LessonKind::Card => card(raw).map(LessonContent::Card),
        LessonKind::FinalTest => final_test(raw).map(LessonContent::FinalTest),
    };
    parsed.map_err(|message| {
        tracing::debug!(%kind, %message, "content rejected");
        CoreError::ContentSchemaInvalid(format!("{kind}: {message}"))
    })
}

// ---------------------------------------------------------------------------
// Lesson kinds
// ---------------------------------------------------------------------------

fn vocabulary(raw: &Value) -> Result<VocabularyContent, String> {
    let mut obj = object_or_list(raw, "words", "vocabulary content must be an object or a list")?;
    let items = take_list(&mut obj, VOCABULARY_CONTAINERS)
        .ok_or("needs a non-empty 'words' (or 'items'/'cards'/'vocabulary') list")?;
    let words = items
        .iter()
        .enumerate()
        .map(|(i, item)| vocabulary_item(item, &format!("words[{i}]")))
        .collect::<Result<Vec<_>, _>>()?;
    let exercises = optional_questions(&mut obj)?;
    Ok(VocabularyContent {
        words,
        exercises,
        extra: obj,
    })
}

fn grammar(raw: &Value) -> Result<GrammarContent, String> {
    let mut obj = match raw {
        Value::Object(map) => map.clone(),
        Value::String(s) if !s.trim().is_empty() => {
            let mut map = Object::new();
            map.insert("content".into(), Value::String(s.clone()));
            map
        }
        _ => return Err("grammar content must be an object".into()),
    };
    let structured_body = ["content", "rule", "text"]
        .iter()
        .any(|k| matches!(obj.get(*k), Some(Value::Object(_) | Value::Array(_))));
    // A structured `content` block owns the key; text aliases then stay as extras.
    let explanation = if matches!(obj.get("content"), Some(Value::Object(_) | Value::Array(_))) {
        None
    } else {
        take_text(
            &mut obj,
            &["content", "rule", "text", "grammar_explanation", "description"],
        )
    };
    let title = take_text(&mut obj, &["title"]);
    if explanation.is_none() && title.is_none() && !structured_body {
        return Err(
            "needs one of 'content', 'rule', 'text', 'title', 'description', 'grammar_explanation'"
                .into(),
        );
    }
    let exercises = optional_questions(&mut obj)?;
    Ok(GrammarContent {
        explanation,
        title,
        exercises,
        extra: obj,
    })
}

fn quiz(raw: &Value) -> Result<QuizContent, String> {
    let mut obj = object_or_list(raw, "questions", "quiz content must be an object or a list")?;
    let list = take_list(&mut obj, QUESTION_CONTAINERS)
        .ok_or("needs a non-empty 'questions' (or 'exercises') list")?;
    let questions = question_list(&list, "questions")?;
    let passing_score = passing_score(&mut obj)?;
    Ok(QuizContent {
        questions,
        passing_score,
        extra: obj,
    })
}

fn matching(raw: &Value) -> Result<MatchingContent, String> {
    let mut obj = object_or_list(raw, "pairs", "matching content must be an object or a list")?;
    let list = take_list(&mut obj, &["pairs", "items", "words"])
        .ok_or("needs a non-empty 'pairs' list")?;
    let pairs = pair_list(&list, "pairs")?;
    Ok(MatchingContent { pairs, extra: obj })
}

fn text(raw: &Value) -> Result<TextContent, String> {
    let mut obj = match raw {
        Value::Object(map) => map.clone(),
        Value::String(s) => {
            let mut map = Object::new();
            map.insert("content".into(), Value::String(s.clone()));
            map
        }
        _ => return Err("text content must be an object".into()),
    };
    if matches!(obj.get("content"), Some(Value::Object(_) | Value::Array(_))) {
        return Err("'content' must be the text body".into());
    }
    let body = take_text(&mut obj, &["content", "text"]).ok_or("needs 'content' or 'text'")?;
    let questions = optional_questions(&mut obj)?;
    Ok(TextContent {
        body,
        questions,
        extra: obj,
    })
}

fn card(raw: &Value) -> Result<CardContent, String> {
    let mut obj = match raw {
        Value::Null => Object::new(),
        _ => object_or_list(raw, "words", "card content must be an object or a list")?,
    };
    let words = match take_list(&mut obj, VOCABULARY_CONTAINERS) {
        Some(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| card_word(item, i))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };
    Ok(CardContent { words, extra: obj })
}

fn card_word(item: &Value, index: usize) -> Result<CardWord, String> {
    match item {
        Value::Number(n) => n
            .as_i64()
            .filter(|id| *id > 0)
            .map(CardWord::Id)
            .ok_or_else(|| format!("words[{index}] is not a valid word id")),
        Value::String(s) if !s.trim().is_empty() => Ok(CardWord::Item(VocabularyItem {
            word: s.trim().to_string(),
            translation: None,
            transcription: None,
            example: None,
            audio: None,
            word_id: None,
            extra: Object::new(),
        })),
        Value::Object(map) => {
            let has_form = ["word", "front", "english"]
                .iter()
                .any(|k| map.contains_key(*k));
            match map.get("word_id").and_then(Value::as_i64) {
                Some(id) if !has_form => Ok(CardWord::Id(id)),
                _ => vocabulary_item(item, &format!("words[{index}]")).map(CardWord::Item),
            }
        }
        _ => Err(format!("words[{index}] must be a word id or an object")),
    }
}

fn final_test(raw: &Value) -> Result<FinalTestContent, String> {
    let mut obj = object_or_list(raw, "questions", "final test content must be an object or a list")?;
    let passing_score = passing_score(&mut obj)?;

    let mut sections = Vec::new();
    if let Some(list) = take_list(&mut obj, &["sections"]) {
        for (i, value) in list.iter().enumerate() {
            sections.push(section(value, &format!("section_{}", i + 1), SectionKind::Quiz, i)?);
        }
    } else {
        for (key, kind) in [("quiz", SectionKind::Quiz), ("grammar", SectionKind::Grammar)] {
            if let Some(value) = obj.remove(key) {
                sections.push(section(&value, key, kind, sections.len())?);
            }
        }
        if sections.is_empty() {
            if let Some(list) = take_list(&mut obj, QUESTION_CONTAINERS) {
                sections.push(Section {
                    name: "quiz".into(),
                    kind: SectionKind::Quiz,
                    questions: question_list(&list, "questions")?,
                    weight: 1.0,
                });
            }
        }
    }

    if sections.is_empty() {
        return Err("needs 'sections', 'quiz'/'grammar' or a 'questions' list".into());
    }
    Ok(FinalTestContent {
        sections,
        passing_score,
        extra: obj,
    })
}

fn section(
    value: &Value,
    default_name: &str,
    default_kind: SectionKind,
    index: usize,
) -> Result<Section, String> {
    let mut obj = object_or_list(
        value,
        "questions",
        &format!("sections[{index}] must be an object or a list"),
    )?;
    let name = take_text(&mut obj, &["name", "title"]).unwrap_or_else(|| default_name.to_string());
    let kind = match take_text(&mut obj, &["type", "kind"]).as_deref() {
        Some("grammar") => SectionKind::Grammar,
        Some(_) => SectionKind::Quiz,
        None => default_kind,
    };
    let list = take_list(&mut obj, QUESTION_CONTAINERS)
        .ok_or_else(|| format!("section '{name}' needs a non-empty 'questions' list"))?;
    let weight = match take(&mut obj, &["weight"]) {
        Some(v) => v
            .as_f64()
            .filter(|w| w.is_finite() && *w > 0.0)
            .ok_or_else(|| format!("section '{name}' has an invalid weight"))?,
        None => 1.0,
    };
    Ok(Section {
        questions: question_list(&list, &name)?,
        name,
        kind,
        weight,
    })
}

// ---------------------------------------------------------------------------
// Items, pairs and questions
// ---------------------------------------------------------------------------

fn vocabulary_item(value: &Value, label: &str) -> Result<VocabularyItem, String> {
    let Value::Object(map) = value else {
        return Err(format!("{label} must be an object"));
    };
    let mut obj = map.clone();
    let word = take_text(&mut obj, &["word", "front", "english"])
        .ok_or_else(|| format!("{label} is missing 'word' (or 'front'/'english')"))?;
    Ok(VocabularyItem {
        word,
        translation: take_text(&mut obj, &["translation", "russian", "back", "meaning"]),
        transcription: take_text(&mut obj, &["transcription", "pronunciation"]),
        example: take_text(&mut obj, &["example", "example_sentence"]),
        audio: take_text(&mut obj, &["audio", "audio_url"]),
        word_id: match obj.get("word_id").and_then(Value::as_i64) {
            Some(id) => {
                obj.remove("word_id");
                Some(id)
            }
            None => None,
        },
        extra: obj,
    })
}

fn pair_list(list: &[Value], label: &str) -> Result<Vec<Pair>, String> {
    list.iter()
        .enumerate()
        .map(|(i, value)| {
            let Value::Object(map) = value else {
                return Err(format!("{label}[{i}] must be an object"));
            };
            let mut obj = map.clone();
            let left = take_text(&mut obj, &["left", "english"]);
            let right = take_text(&mut obj, &["right", "russian"]);
            match (left, right) {
                (Some(left), Some(right)) => Ok(Pair { left, right }),
                _ => Err(format!(
                    "{label}[{i}] needs 'left'/'right' or 'english'/'russian'"
                )),
            }
        })
        .collect()
}

fn optional_questions(obj: &mut Object) -> Result<Vec<Question>, String> {
    match take_list(obj, QUESTION_CONTAINERS) {
        Some(list) => question_list(&list, "exercises"),
        None => Ok(Vec::new()),
    }
}

fn question_list(list: &[Value], label: &str) -> Result<Vec<Question>, String> {
    list.iter()
        .enumerate()
        .map(|(i, value)| parse_question(value).map_err(|e| format!("{label}[{i}]: {e}")))
        .collect()
}

/// Parse one exercise, whatever container it came from.
pub fn parse_question(value: &Value) -> Result<Question, String> {
    let Value::Object(map) = value else {
        return Err("must be an object".into());
    };
    let mut obj = map.clone();
    let declared = take(&mut obj, &["type", "question_type", "exercise_type"])
        .and_then(|t| scalar_string(&t))
        .map(|t| t.trim().to_lowercase());
    let kind_name = match declared {
        Some(name) => name,
        None => infer_type(&obj).to_string(),
    };

    let kind = match kind_name.as_str() {
        "multiple_choice" | "mc" | "choice" | "single_choice" => multiple_choice(&mut obj)?,
        "true_false" | "tf" | "true_or_false" | "boolean" => {
            let answer = take(&mut obj, ANSWER_KEYS).ok_or("true_false needs an answer")?;
            let correct = coerce_bool(&answer)
                .ok_or_else(|| format!("true_false answer {answer} is not a boolean"))?;
            QuestionKind::TrueFalse { correct }
        }
        "fill_blank" | "fill_in_blank" | "fill_in_the_blank" | "short_answer" => {
            QuestionKind::FillBlank {
                answers: answer_set(&mut obj, &[ANSWER_KEYS, &["answers"]].concat())?,
            }
        }
        "translation" | "translate" => QuestionKind::Translation {
            answers: answer_set(&mut obj, &[ANSWER_KEYS, &["answers"]].concat())?,
        },
        "reorder" | "ordering" | "word_order" => {
            let words = take(&mut obj, &["words"])
                .and_then(|v| string_list(&v))
                .filter(|w| !w.is_empty())
                .ok_or("reorder needs a 'words' list")?;
            let correct_answer = take(&mut obj, &["correct_answer", "answer", "correct"])
                .and_then(|v| match v {
                    Value::Array(_) => string_list(&v).map(|w| w.join(" ")),
                    other => scalar_string(&other),
                })
                .filter(|s| !s.trim().is_empty())
                .ok_or("reorder needs a 'correct_answer' string")?;
            QuestionKind::Reorder {
                words,
                correct_answer,
            }
        }
        "matching" | "match" => {
            let list = take_list(&mut obj, &["pairs"]).ok_or("matching needs a 'pairs' list")?;
            QuestionKind::Matching {
                pairs: pair_list(&list, "pairs")?,
            }
        }
        "sentence_builder" => {
            let correct_order = take(&mut obj, &["correct_order", "correct_answer", "answer"])
                .and_then(|v| match v {
                    Value::String(s) => Some(s.split_whitespace().map(str::to_string).collect()),
                    other => string_list(&other),
                })
                .filter(|w: &Vec<String>| !w.is_empty())
                .ok_or("sentence_builder needs a 'correct_order' list")?;
            let words = take(&mut obj, &["words"])
                .and_then(|v| string_list(&v))
                .unwrap_or_else(|| correct_order.clone());
            QuestionKind::SentenceBuilder {
                words,
                correct_order,
            }
        }
        "error_correction" => {
            let sentence = take_text(&mut obj, &["sentence", "incorrect", "text"])
                .ok_or("error_correction needs the 'sentence' to correct")?;
            let answers = answer_set(
                &mut obj,
                &["correct_answer", "correction", "answer", "correct", "answers"],
            )?;
            QuestionKind::ErrorCorrection { sentence, answers }
        }
        other => return Err(format!("unknown question type '{other}'")),
    };

    let prompt = take_text(&mut obj, PROMPT_KEYS);
    if prompt.is_none() && matches!(kind, QuestionKind::MultipleChoice { .. }) {
        return Err("multiple_choice needs a 'question' or 'prompt'".into());
    }
    let explanation = take_text(&mut obj, &["explanation", "hint"]);
    Ok(Question {
        prompt,
        explanation,
        kind,
        extra: obj,
    })
}

fn infer_type(obj: &Object) -> &'static str {
    if obj.contains_key("options") || obj.contains_key("choices") {
        "multiple_choice"
    } else if obj.contains_key("pairs") {
        "matching"
    } else if obj.contains_key("correct_order") {
        "sentence_builder"
    } else if obj.contains_key("words") && obj.contains_key("correct_answer") {
        "reorder"
    } else if ANSWER_KEYS
        .iter()
        .any(|k| matches!(obj.get(*k), Some(Value::Bool(_))))
    {
        "true_false"
    } else {
        "fill_blank"
    }
}

fn multiple_choice(obj: &mut Object) -> Result<QuestionKind, String> {
    let options = take(obj, &["options", "choices"])
        .and_then(|v| string_list(&v))
        .ok_or("multiple_choice needs an 'options' list")?;
    if !(2..=6).contains(&options.len()) {
        return Err(format!(
            "multiple_choice needs 2-6 options, got {}",
            options.len()
        ));
    }
    let answer = take(obj, ANSWER_KEYS).ok_or("multiple_choice needs a correct answer")?;
    let correct = match &answer {
        Value::Number(n) => match n.as_u64() {
            Some(i) if (i as usize) < options.len() => i as usize,
            _ => {
                return Err(format!(
                    "correct index {n} is out of range for {} options",
                    options.len()
                ))
            }
        },
        Value::String(s) => option_index(&options, s)
            .or_else(|| {
                s.trim()
                    .parse::<usize>()
                    .ok()
                    .filter(|i| *i < options.len())
            })
            .ok_or_else(|| format!("correct answer '{s}' matches no option"))?,
        other => return Err(format!("correct answer {other} is not an index or option")),
    };
    Ok(QuestionKind::MultipleChoice { options, correct })
}

fn answer_set(obj: &mut Object, keys: &[&str]) -> Result<Vec<String>, String> {
    let mut answers = take(obj, keys)
        .and_then(|v| string_list(&v))
        .unwrap_or_default();
    if let Some(alternatives) = take(obj, ALTERNATIVE_KEYS).and_then(|v| string_list(&v)) {
        answers.extend(alternatives);
    }
    answers.retain(|a| !a.trim().is_empty());
    answers.dedup();
    if answers.is_empty() {
        return Err("needs an answer ('correct_answer', 'answer' or 'correct')".into());
    }
    Ok(answers)
}

fn passing_score(obj: &mut Object) -> Result<Option<f64>, String> {
    match take(obj, PASSING_KEYS) {
        Some(v) => v
            .as_f64()
            .filter(|s| (0.0..=100.0).contains(s))
            .map(Some)
            .ok_or_else(|| format!("passing score {v} must be a number in 0..=100")),
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Value helpers
// ---------------------------------------------------------------------------

/// Index of the option matching `text`: exact after trimming, then case-insensitive.
pub fn option_index(options: &[String], text: &str) -> Option<usize> {
    let wanted = text.trim();
    options
        .iter()
        .position(|o| o.trim() == wanted)
        .or_else(|| {
            let lowered = wanted.to_lowercase();
            options
                .iter()
                .position(|o| o.trim().to_lowercase() == lowered)
        })
}

/// Boolean coercion shared by validation and evaluation.
pub fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => items.iter().map(scalar_string).collect(),
        other => scalar_string(other).map(|s| vec![s]),
    }
}

fn object_or_list(raw: &Value, list_key: &str, message: &str) -> Result<Object, String> {
    match raw {
        Value::Object(map) => Ok(map.clone()),
        Value::Array(items) => {
            let mut map = Object::new();
            map.insert(list_key.to_string(), Value::Array(items.clone()));
            Ok(map)
        }
        _ => Err(message.to_string()),
    }
}

/// Remove every alias in `keys`; return the first non-null value in key order.
fn take(obj: &mut Object, keys: &[&str]) -> Option<Value> {
    let mut found = None;
    for key in keys {
        if let Some(value) = obj.remove(*key) {
            if found.is_none() && !value.is_null() {
                found = Some(value);
            }
        }
    }
    found
}

/// Remove scalar aliases in `keys`; return the first non-blank one, trimmed.
/// Structured values under those keys stay in place as extension data.
fn take_text(obj: &mut Object, keys: &[&str]) -> Option<String> {
    let mut found = None;
    for key in keys {
        let Some(text) = obj.get(*key).and_then(scalar_string) else {
            continue;
        };
        obj.remove(*key);
        if found.is_none() && !text.trim().is_empty() {
            found = Some(text.trim().to_string());
        }
    }
    found
}

/// Remove list aliases in `keys`; return the first non-empty list.
fn take_list(obj: &mut Object, keys: &[&str]) -> Option<Vec<Value>> {
    let mut found = None;
    for key in keys {
        if let Some(Value::Array(items)) = obj.get(*key) {
            let items = items.clone();
            obj.remove(*key);
            if found.is_none() && !items.is_empty() {
                found = Some(items);
            }
        }
    }
    found
}
