//! Exercise evaluation.
//!
//! Every exercise yields one [`Feedback`] record. An answer that cannot be
//! interpreted is logged as a coercion failure and marked incorrect; it never
//! aborts grading.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::content::{Pair, Question, QuestionKind};
use crate::error::CoreError;
use crate::normalize::{normalize, sentences_match, tokens};
use crate::schema::{coerce_bool, option_index, scalar_string, string_list};

/// Short canonical answers match by containment up to this many tokens.
const SHORT_ANSWER_TOKENS: usize = 3;
/// Share of canonical tokens a long answer must contain.
const OVERLAP_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerStatus {
    Correct,
    Incorrect,
}

/// Per-exercise evaluation result, as returned to the learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub status: AnswerStatus,
    pub user_answer: Value,
    pub correct_answer: Value,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl Feedback {
    pub fn is_correct(&self) -> bool {
        self.status == AnswerStatus::Correct
    }

    fn new(outcome: Outcome, user_answer: Option<&Value>, correct_answer: Value) -> Self {
        let (status, message) = match outcome {
            Outcome::Correct => (AnswerStatus::Correct, "Correct!".to_string()),
            Outcome::Incorrect => (
                AnswerStatus::Incorrect,
                format!("Incorrect. The correct answer is: {}", display(&correct_answer)),
            ),
            Outcome::Missing => (AnswerStatus::Incorrect, "No answer given.".to_string()),
            Outcome::Unreadable(reason) => (
                AnswerStatus::Incorrect,
                format!("Answer could not be read: {reason}"),
            ),
        };
        Self {
            status,
            user_answer: user_answer.cloned().unwrap_or(Value::Null),
            correct_answer,
            message,
            explanation: None,
        }
    }
}

enum Outcome {
    Correct,
    Incorrect,
    Missing,
    Unreadable(String),
}

impl From<bool> for Outcome {
    fn from(correct: bool) -> Self {
        if correct {
            Outcome::Correct
        } else {
            Outcome::Incorrect
        }
    }
}

/// Evaluate the answer to exercise `index`.
pub fn evaluate(index: usize, question: &Question, answer: Option<&Value>) -> Feedback {
    let outcome = match answer {
        None | Some(Value::Null) => Outcome::Missing,
        Some(answer) => match check(&question.kind, answer) {
            Ok(correct) => Outcome::from(correct),
            Err(reason) => {
                let err = CoreError::AnswerCoercionFailed {
                    index,
                    reason: reason.clone(),
                };
                debug!(error = %err, kind = question.kind.name(), "answer marked incorrect");
                Outcome::Unreadable(reason)
            }
        },
    };
    let mut feedback = Feedback::new(outcome, answer, question.correct_answer());
    feedback.explanation = question.explanation.clone();
    feedback
}

/// Evaluate one pair of a matching lesson. The answer names the right-hand
/// side by index or by text.
pub fn evaluate_pair(index: usize, pair: &Pair, answer: Option<&Value>) -> Feedback {
    let outcome = match answer {
        None | Some(Value::Null) => Outcome::Missing,
        Some(answer) => Outcome::from(pair_answer_matches(index, pair, answer)),
    };
    Feedback::new(outcome, answer, Value::String(pair.right.clone()))
}

fn check(kind: &QuestionKind, answer: &Value) -> Result<bool, String> {
    match kind {
        QuestionKind::MultipleChoice { options, correct } => {
            let chosen = choice_index(options, answer)
                .ok_or_else(|| format!("{} is not one of the options", display(answer)))?;
            Ok(chosen == *correct)
        }
        QuestionKind::TrueFalse { correct } => {
            let given = coerce_bool(answer)
                .ok_or_else(|| format!("{} is not true or false", display(answer)))?;
            Ok(given == *correct)
        }
        QuestionKind::FillBlank { answers } | QuestionKind::Translation { answers } => {
            let given = text_answer(answer)?;
            Ok(text_matches(&given, answers))
        }
        QuestionKind::Reorder { correct_answer, .. } => {
            let given = match answer {
                Value::Array(_) => string_list(answer)
                    .map(|words| words.join(" "))
                    .ok_or("word list contains non-text items")?,
                other => text_answer(other)?,
            };
            Ok(sentences_match(&given, correct_answer))
        }
        QuestionKind::Matching { pairs } => pairs_match(pairs, answer),
        QuestionKind::SentenceBuilder { correct_order, .. } => {
            let given = match answer {
                Value::String(s) => s.split_whitespace().map(str::to_string).collect(),
                other => string_list(other).ok_or("expected a list of words")?,
            };
            Ok(given.len() == correct_order.len()
                && given
                    .iter()
                    .zip(correct_order)
                    .all(|(g, c)| normalize(g) == normalize(c)))
        }
        QuestionKind::ErrorCorrection { answers, .. } => {
            let given = normalize(&text_answer(answer)?);
            Ok(answers.iter().any(|a| normalize(a) == given))
        }
    }
}

/// Resolve a multiple-choice submission to an option index: option text
/// first, then an integer or numeric-string index.
pub fn choice_index(options: &[String], answer: &Value) -> Option<usize> {
    let in_range = |i: usize| (i < options.len()).then_some(i);
    match answer {
        Value::Number(n) => n.as_u64().and_then(|i| in_range(i as usize)),
        Value::String(s) => option_index(options, s)
            .or_else(|| s.trim().parse::<usize>().ok().and_then(in_range)),
        _ => None,
    }
}

/// Tolerant free-text comparison against every accepted answer.
pub fn text_matches(given: &str, accepted: &[String]) -> bool {
    let given_norm = normalize(given);
    if given_norm.is_empty() {
        return false;
    }
    let given_tokens = tokens(given);

    accepted.iter().any(|candidate| {
        let canonical = normalize(candidate);
        if canonical.is_empty() {
            return false;
        }
        if given_norm == canonical {
            return true;
        }
        let mut canonical_tokens = tokens(candidate);
        if canonical_tokens.len() <= SHORT_ANSWER_TOKENS {
            return given_norm.contains(&canonical);
        }
        canonical_tokens.sort();
        canonical_tokens.dedup();
        let common = canonical_tokens
            .iter()
            .filter(|t| given_tokens.contains(t))
            .count();
        common as f64 >= OVERLAP_THRESHOLD * canonical_tokens.len() as f64
    })
}

/// Check every pair assignment. The answer is an object keyed by left index
/// or left text, or a list whose position is the left index.
fn pairs_match(pairs: &[Pair], answer: &Value) -> Result<bool, String> {
    match answer {
        Value::Object(map) => Ok(pairs.iter().enumerate().all(|(i, pair)| {
            let assigned = map.get(&i.to_string()).or_else(|| {
                map.iter()
                    .find(|(left, _)| normalize(left) == normalize(&pair.left))
                    .map(|(_, v)| v)
            });
            assigned.is_some_and(|v| pair_answer_matches(i, pair, v))
        })),
        Value::Array(items) => Ok(items.len() == pairs.len()
            && pairs
                .iter()
                .enumerate()
                .all(|(i, pair)| pair_answer_matches(i, pair, &items[i]))),
        other => Err(format!(
            "expected pair assignments, got {}",
            display(other)
        )),
    }
}

fn pair_answer_matches(index: usize, pair: &Pair, assigned: &Value) -> bool {
    match assigned {
        Value::Number(n) => n.as_u64() == Some(index as u64),
        Value::String(s) => {
            normalize(s) == normalize(&pair.right)
                || s.trim().parse::<usize>().is_ok_and(|i| i == index)
        }
        _ => false,
    }
}

fn text_answer(answer: &Value) -> Result<String, String> {
    match answer {
        Value::Array(_) => string_list(answer)
            .map(|parts| parts.join(" "))
            .ok_or_else(|| "expected text".to_string()),
        other => scalar_string(other).ok_or_else(|| format!("expected text, got {other}")),
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "nothing".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mc() -> Question {
        Question::new(QuestionKind::MultipleChoice {
            options: vec!["3".into(), "4".into(), "5".into()],
            correct: 1,
        })
        .with_prompt("2+2?")
    }

    fn fill(answers: &[&str]) -> Question {
        Question::new(QuestionKind::FillBlank {
            answers: answers.iter().map(|a| a.to_string()).collect(),
        })
    }

    #[test]
    fn multiple_choice_by_index_and_text() {
        assert!(evaluate(0, &mc(), Some(&json!(1))).is_correct());
        assert!(evaluate(0, &mc(), Some(&json!("4"))).is_correct());
        assert!(evaluate(0, &mc(), Some(&json!(" 4 "))).is_correct());
        assert!(!evaluate(0, &mc(), Some(&json!(0))).is_correct());
    }

    #[test]
    fn multiple_choice_text_wins_over_numeric_index() {
        let feedback = evaluate(0, &mc(), Some(&json!("3")));
        assert!(!feedback.is_correct());
        let options = vec!["1".to_string(), "0".to_string()];
        assert_eq!(choice_index(&options, &json!("0")), Some(1));
        assert_eq!(choice_index(&options, &json!(0)), Some(0));
    }

    #[test]
    fn unresolvable_choice_is_incorrect_with_reason() {
        let feedback = evaluate(2, &mc(), Some(&json!("seven")));
        assert_eq!(feedback.status, AnswerStatus::Incorrect);
        assert!(feedback.message.contains("could not be read"));
        assert_eq!(feedback.correct_answer, json!("4"));
    }

    #[test]
    fn missing_answer_is_incorrect() {
        let feedback = evaluate(0, &mc(), None);
        assert_eq!(feedback.status, AnswerStatus::Incorrect);
        assert_eq!(feedback.user_answer, Value::Null);
    }

    #[test]
    fn true_false_coerces_strings() {
        let q = Question::new(QuestionKind::TrueFalse { correct: true });
        assert!(evaluate(0, &q, Some(&json!("true"))).is_correct());
        assert!(evaluate(0, &q, Some(&json!(true))).is_correct());
        assert!(!evaluate(0, &q, Some(&json!("false"))).is_correct());
    }

    #[test]
    fn fill_blank_exact_and_alternatives() {
        let q = fill(&["am", "'m"]);
        assert!(evaluate(0, &q, Some(&json!("AM"))).is_correct());
        assert!(evaluate(0, &q, Some(&json!("m"))).is_correct());
        assert!(!evaluate(0, &q, Some(&json!("is"))).is_correct());
    }

    #[test]
    fn short_answer_substring_containment() {
        let q = fill(&["black cat"]);
        assert!(evaluate(0, &q, Some(&json!("It is a black cat."))).is_correct());
        assert!(!evaluate(0, &q, Some(&json!("a black dog"))).is_correct());
    }

    #[test]
    fn long_answer_overlap_fallback() {
        let q = fill(&["I go to school every morning"]);
        assert!(evaluate(0, &q, Some(&json!("I walk to school every morning"))).is_correct());
        assert!(!evaluate(0, &q, Some(&json!("I sleep at home"))).is_correct());
    }

    #[test]
    fn reorder_case_insensitive_fallback() {
        let q = Question::new(QuestionKind::Reorder {
            words: vec!["am".into(), "I".into(), "student".into(), "a".into()],
            correct_answer: "I am a student".into(),
        });
        assert!(evaluate(0, &q, Some(&json!("i am a student"))).is_correct());
        assert!(evaluate(0, &q, Some(&json!(["I", "am", "a", "student"]))).is_correct());
        assert!(!evaluate(0, &q, Some(&json!("am I a student"))).is_correct());
    }

    #[test]
    fn matching_by_index_and_value() {
        let q = Question::new(QuestionKind::Matching {
            pairs: vec![
                Pair { left: "cat".into(), right: "кошка".into() },
                Pair { left: "dog".into(), right: "собака".into() },
            ],
        });
        assert!(evaluate(0, &q, Some(&json!({ "0": 0, "1": "1" }))).is_correct());
        assert!(evaluate(0, &q, Some(&json!({ "cat": "кошка", "dog": "собака" }))).is_correct());
        assert!(!evaluate(0, &q, Some(&json!({ "0": 1, "1": 0 }))).is_correct());
        assert!(!evaluate(0, &q, Some(&json!({ "0": 0 }))).is_correct());
    }

    #[test]
    fn matching_completed_sentinel_is_not_trusted() {
        let q = Question::new(QuestionKind::Matching {
            pairs: vec![Pair { left: "a".into(), right: "b".into() }],
        });
        assert!(!evaluate(0, &q, Some(&json!("completed"))).is_correct());
    }

    #[test]
    fn sentence_builder_elementwise() {
        let q = Question::new(QuestionKind::SentenceBuilder {
            words: vec![],
            correct_order: vec!["She".into(), "is".into(), "happy".into()],
        });
        assert!(evaluate(0, &q, Some(&json!(["she", "is", "happy"]))).is_correct());
        assert!(!evaluate(0, &q, Some(&json!(["is", "she", "happy"]))).is_correct());
        assert!(!evaluate(0, &q, Some(&json!(["she", "is"]))).is_correct());
    }

    #[test]
    fn error_correction_normalised() {
        let q = Question::new(QuestionKind::ErrorCorrection {
            sentence: "He go to work".into(),
            answers: vec!["He goes to work.".into()],
        });
        assert!(evaluate(0, &q, Some(&json!("he goes to work"))).is_correct());
        assert!(!evaluate(0, &q, Some(&json!("He go to work"))).is_correct());
    }

    #[test]
    fn pair_evaluation() {
        let pair = Pair { left: "cat".into(), right: "кошка".into() };
        assert!(evaluate_pair(2, &pair, Some(&json!(2))).is_correct());
        assert!(evaluate_pair(2, &pair, Some(&json!("Кошка"))).is_correct());
        assert!(!evaluate_pair(2, &pair, Some(&json!(1))).is_correct());
    }

    #[test]
    fn feedback_serialises_lowercase_status() {
        let feedback = evaluate(0, &mc(), Some(&json!(1)));
        let value = serde_json::to_value(&feedback).unwrap();
        assert_eq!(value["status"], "correct");
        assert!(value.get("explanation").is_none());
    }
}
