//! Lenient structured-output parsing.
//!
//! Model replies are supposed to be schema-conforming JSON, but in practice
//! arrive wrapped in code fences, prefixed with chatter, or with a field
//! missing here and there. [`extract_json`] digs the JSON value out of the
//! reply; the per-artifact parsers then map each item to a typed value and
//! drop the ones that cannot be made valid.
//!
//! List parsers are total: a reply that cannot be read yields an empty
//! list. [`parse_grade`] is the exception and returns a [`ParseError`],
//! because a grade has no safe empty default.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::models::{
    Flashcard, ProveItGrade, ProveItGradeItem, ProveItQuestion, ProveItQuestionType,
    QuizQuestion,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("no JSON found in response (starts with: {preview})")]
    NoJson { preview: String },
    #[error("unexpected response shape: {0}")]
    Shape(String),
}

/// Maximum number of candidate start positions tried by the bracket scan.
const MAX_SCAN_STARTS: usize = 32;

/// Pull a JSON value out of a model reply.
///
/// Tries, in order: the whole reply, the contents of the first code
/// fence, and the first balanced `{…}` or `[…]` block that parses.
///
/// ```rust
/// use study_forge_core::parse::extract_json;
///
/// let v = extract_json("Sure! ```json\n[{\"a\": 1}]\n``` Hope that helps.").unwrap();
/// assert_eq!(v[0]["a"], 1);
/// ```
pub fn extract_json(reply: &str) -> Result<Value, ParseError> {
    let trimmed = reply.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    if let Some(fenced) = fenced_block(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(fenced) {
            return Ok(value);
        }
        if let Some(value) = first_balanced_value(fenced) {
            return Ok(value);
        }
    }

    if let Some(value) = first_balanced_value(trimmed) {
        return Ok(value);
    }

    Err(ParseError::NoJson {
        preview: trimmed.chars().take(120).collect(),
    })
}

/// Contents of the first ``` fence, without the language tag line.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")? + 3;
    let rest = &text[start..];
    let body_start = match rest.find('\n') {
        Some(nl) if rest[..nl].trim().chars().all(|c| c.is_ascii_alphanumeric()) => nl + 1,
        _ => 0,
    };
    let body = &rest[body_start..];
    let end = body.find("```").unwrap_or(body.len());
    Some(body[..end].trim())
}

fn first_balanced_value(text: &str) -> Option<Value> {
    text.char_indices()
        .filter(|(_, c)| *c == '{' || *c == '[')
        .take(MAX_SCAN_STARTS)
        .find_map(|(start, _)| {
            let end = balanced_end(&text[start..])?;
            serde_json::from_str(&text[start..start + end]).ok()
        })
}

/// Byte length of the bracketed block at the start of `text`, skipping
/// brackets inside string literals.
fn balanced_end(text: &str) -> Option<usize> {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(ch) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(i + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

/// The list of item objects in a reply: a top-level array, an array under
/// one of `wrapper_keys`, or a lone object.
fn items(value: Value, wrapper_keys: &[&str]) -> Vec<Map<String, Value>> {
    let list = match value {
        Value::Array(list) => list,
        Value::Object(mut obj) => {
            let key = wrapper_keys
                .iter()
                .find(|k| obj.get(**k).is_some_and(Value::is_array));
            match key {
                Some(key) => match obj.remove(*key) {
                    Some(Value::Array(list)) => list,
                    _ => Vec::new(),
                },
                None => vec![Value::Object(obj)],
            }
        }
        _ => Vec::new(),
    };
    list.into_iter()
        .filter_map(|item| match item {
            Value::Object(obj) => Some(obj),
            _ => None,
        })
        .collect()
}

fn text_field(obj: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match obj.get(*name)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn number_field(obj: &Map<String, Value>, names: &[&str]) -> Option<f64> {
    names.iter().find_map(|name| {
        let n = match obj.get(*name)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }?;
        n.is_finite().then_some(n)
    })
}

fn bool_field(obj: &Map<String, Value>, names: &[&str]) -> Option<bool> {
    names.iter().find_map(|name| match obj.get(*name)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "correct" => Some(true),
            "false" | "no" | "incorrect" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

fn string_list(obj: &Map<String, Value>, names: &[&str]) -> Vec<String> {
    names
        .iter()
        .find_map(|name| obj.get(*name)?.as_array())
        .map(|list| {
            list.iter()
                .filter_map(|v| match v {
                    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Flashcards from a reply; cards missing a question or answer are dropped.
pub fn parse_flashcards(reply: &str, limit: usize) -> Vec<Flashcard> {
    let Ok(value) = extract_json(reply) else {
        return Vec::new();
    };
    items(value, &["flashcards", "cards"])
        .iter()
        .filter_map(|obj| {
            Some(Flashcard {
                question: text_field(obj, &["question", "front", "q"])?,
                answer: text_field(obj, &["answer", "back", "a"])?,
                source: text_field(obj, &["source"]),
            })
        })
        .take(limit)
        .collect()
}

/// Match the stated answer to one of the options: exact, then
/// case-insensitive, then a bare option letter (`"B"`, `"b)"`, `"C."`).
fn resolve_correct_answer(stated: &str, options: &[String]) -> Option<String> {
    if let Some(exact) = options.iter().find(|o| o.as_str() == stated) {
        return Some(exact.clone());
    }
    let lower = stated.to_lowercase();
    if let Some(found) = options.iter().find(|o| o.to_lowercase() == lower) {
        return Some(found.clone());
    }
    let letter = lower.trim_end_matches(&[')', '.', ':'][..]);
    let mut chars = letter.chars();
    match (chars.next(), chars.next()) {
        (Some(c @ 'a'..='d'), None) => options.get((c as u8 - b'a') as usize).cloned(),
        _ => None,
    }
}

/// Quiz questions from a reply; anything without exactly four options and
/// a correct answer among them is dropped.
pub fn parse_quiz(reply: &str, limit: usize) -> Vec<QuizQuestion> {
    let Ok(value) = extract_json(reply) else {
        return Vec::new();
    };
    items(value, &["questions", "quiz"])
        .iter()
        .filter_map(|obj| {
            let question = text_field(obj, &["question"])?;
            let options = string_list(obj, &["options", "choices"]);
            if options.len() != QuizQuestion::OPTION_COUNT {
                return None;
            }
            let stated = text_field(obj, &["correctAnswer", "correct_answer", "answer"])?;
            let correct_answer = resolve_correct_answer(&stated, &options)?;
            Some(QuizQuestion {
                question,
                options,
                correct_answer,
                explanation: text_field(obj, &["explanation"]).unwrap_or_default(),
            })
        })
        .take(limit)
        .collect()
}

/// Prove-it questions from a reply. Entries without an id, question,
/// answer key, or at least one source card id are dropped, as are repeats
/// of an id already kept; an unknown type label reads as `short`. The
/// limit applies after filtering.
pub fn parse_prove_it_questions(reply: &str, limit: usize) -> Vec<ProveItQuestion> {
    let Ok(value) = extract_json(reply) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    items(value, &["questions"])
        .iter()
        .filter_map(|obj| {
            let source_card_ids = string_list(obj, &["sourceCardIds", "source_card_ids"]);
            if source_card_ids.is_empty() {
                return None;
            }
            let kind = match text_field(obj, &["type"]).as_deref().map(str::to_lowercase) {
                Some(t) if t.contains("scenario") => ProveItQuestionType::Scenario,
                _ => ProveItQuestionType::Short,
            };
            Some(ProveItQuestion {
                id: text_field(obj, &["id"])?,
                kind,
                question: text_field(obj, &["question"])?,
                answer_key: text_field(obj, &["answerKey", "answer_key"])?,
                source_card_ids,
            })
        })
        .filter(|q| seen.insert(q.id.clone()))
        .take(limit)
        .collect()
}

fn default_follow_up(question: &ProveItQuestion, first_missing_idea: &str) -> String {
    if first_missing_idea.is_empty() {
        format!("Try again in your own words: {}", question.question)
    } else {
        format!(
            "How does \"{}\" fit into your answer to: {}",
            first_missing_idea, question.question
        )
    }
}

/// Grade from a reply, normalized against the questions that were asked.
///
/// Items for unknown or repeated ids are dropped, scores are clamped to
/// `[0, 1]`, follow-ups exist exactly for incorrect items, `maxScore`
/// defaults to the question count, and `totalScore` (defaulting to the sum
/// of item scores) never exceeds `maxScore`.
pub fn parse_grade(reply: &str, questions: &[ProveItQuestion]) -> Result<ProveItGrade, ParseError> {
    let value = extract_json(reply)?;
    let obj = match value {
        Value::Object(obj) => obj,
        Value::Array(results) => {
            let mut obj = Map::new();
            obj.insert("results".to_string(), Value::Array(results));
            obj
        }
        other => {
            return Err(ParseError::Shape(format!(
                "expected a grade object, got {}",
                other
            )))
        }
    };

    let raw_results = obj
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| ParseError::Shape("grade is missing a results array".to_string()))?;

    let mut results: Vec<ProveItGradeItem> = Vec::new();
    for raw in raw_results {
        let Some(item) = raw.as_object() else {
            continue;
        };
        let Some(id) = text_field(item, &["id", "questionId"]) else {
            continue;
        };
        let Some(question) = questions.iter().find(|q| q.id == id) else {
            continue;
        };
        if results.iter().any(|r| r.id == id) {
            continue;
        }

        let score_raw = number_field(item, &["score"]);
        let correct = bool_field(item, &["correct", "isCorrect"])
            .unwrap_or_else(|| score_raw.is_some_and(|s| s >= 1.0));
        let score = score_raw
            .unwrap_or(if correct { 1.0 } else { 0.0 })
            .clamp(0.0, 1.0);
        let first_missing_idea =
            text_field(item, &["firstMissingIdea", "first_missing_idea"]).unwrap_or_default();
        let follow_up_question = if correct {
            None
        } else {
            Some(
                text_field(item, &["followUpQuestion", "follow_up_question"])
                    .unwrap_or_else(|| default_follow_up(question, &first_missing_idea)),
            )
        };

        results.push(ProveItGradeItem {
            id,
            correct,
            score,
            feedback: text_field(item, &["feedback"]).unwrap_or_default(),
            first_missing_idea,
            follow_up_question,
        });
    }

    if results.is_empty() {
        return Err(ParseError::Shape(
            "grade has no results for the submitted questions".to_string(),
        ));
    }

    let max_score = number_field(&obj, &["maxScore", "max_score"])
        .filter(|m| *m > 0.0)
        .unwrap_or(questions.len() as f64);
    let total_score = number_field(&obj, &["totalScore", "total_score"])
        .unwrap_or_else(|| results.iter().map(|r| r.score).sum())
        .clamp(0.0, max_score);

    Ok(ProveItGrade {
        total_score,
        max_score,
        results,
    })
}
