//! Response schemas for structured output.
//!
//! Schemas use the OpenAPI subset the completion service accepts
//! (upper-case type names, `required` lists, `nullable`). They are passed
//! as `responseSchema` alongside `responseMimeType: application/json`.

use serde_json::{json, Value};

/// Array of `{question, answer, source?}`.
pub fn flashcard_list() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "question": { "type": "STRING" },
                "answer": { "type": "STRING" },
                "source": { "type": "STRING" }
            },
            "required": ["question", "answer"]
        }
    })
}

/// Array of `{question, options[4], correctAnswer, explanation}`.
pub fn quiz_list() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "question": { "type": "STRING" },
                "options": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" },
                    "minItems": 4,
                    "maxItems": 4
                },
                "correctAnswer": { "type": "STRING" },
                "explanation": { "type": "STRING" }
            },
            "required": ["question", "options", "correctAnswer", "explanation"]
        }
    })
}

/// Array of prove-it questions.
pub fn prove_it_questions() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "id": { "type": "STRING" },
                "type": { "type": "STRING", "enum": ["short", "scenario"] },
                "question": { "type": "STRING" },
                "answerKey": { "type": "STRING" },
                "sourceCardIds": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" }
                }
            },
            "required": ["id", "type", "question", "answerKey", "sourceCardIds"]
        }
    })
}

/// Grade object with per-question results.
pub fn prove_it_grade() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "totalScore": { "type": "NUMBER" },
            "maxScore": { "type": "NUMBER" },
            "results": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "id": { "type": "STRING" },
                        "correct": { "type": "BOOLEAN" },
                        "score": { "type": "NUMBER" },
                        "feedback": { "type": "STRING" },
                        "firstMissingIdea": { "type": "STRING" },
                        "followUpQuestion": { "type": "STRING", "nullable": true }
                    },
                    "required": ["id", "correct", "score", "feedback", "firstMissingIdea"]
                }
            }
        },
        "required": ["totalScore", "maxScore", "results"]
    })
}
