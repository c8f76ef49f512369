//! Prompt templates.
//!
//! Summaries use one of three fixed templates chosen by [`SynthesisMode`].
//! All three embed [`FORMATTING_RULES`] so the prose comes back plain and
//! uniformly structured. Token budgets grow with the mode:
//! tldr < bullet < detailed, for both output and thinking.
//!
//! The artifact prompts (flashcards, quiz, prove-it) are paired with a
//! response schema from [`crate::schema`] by the caller.

use crate::models::{Difficulty, Flashcard, ProveItQuestion, QuizQuestion, QuizStyle, SynthesisMode};

/// Formatting constraints shared by every summary template.
pub const FORMATTING_RULES: &str = "\
FORMATTING RULES (follow exactly):
1. Plain text only. Do not use Markdown, asterisks, pound signs, underscores, backticks, tables, or HTML.
2. Structure content only with numbers (1., 2., 3.) and lowercase letters (a., b., c.).
3. Write every section header in CAPITAL LETTERS on its own line, ending with a colon.
4. Leave exactly one blank line between sections.
5. Do not add greetings, preambles, or closing remarks outside the requested sections.";

const TLDR_TEMPLATE: &str = "\
You are an expert study assistant. Write a TL;DR summary of the document for a student who needs the essentials fast.

Use exactly this structure:

OVERVIEW:
One paragraph of two or three sentences stating what the document covers and why it matters.

TAKEAWAYS:
Exactly 5 numbered takeaways (1. to 5.), one sentence each, each a distinct fact or idea from the document.

CONCLUSION:
One sentence tying the takeaways together.

LENGTH: between 120 and 180 words in total. Do not exceed 180 words.";

const BULLET_TEMPLATE: &str = "\
You are an expert study assistant. Write a structured study summary of the document.

Use exactly these 5 sections, in this order:

MAIN TOPIC:
Two or three sentences naming the subject and scope of the document.

KEY CONCEPTS:
Numbered list of the core concepts. For each concept give its name followed by a one or two sentence explanation. Use lettered sub-points (a., b.) for important details.

IMPORTANT DETAILS:
Numbered list of specific facts, figures, dates, definitions, and formulas stated in the document.

EXAMPLES AND APPLICATIONS:
Numbered list of examples, cases, or applications the document gives. Write \"None given.\" if there are none.

KEY TAKEAWAYS:
Numbered list of 3 to 6 points a student must remember for an exam.

LENGTH: roughly 350 to 600 words.";

const DETAILED_TEMPLATE: &str = "\
You are an expert study assistant. Write a detailed, section-by-section study guide of the document.

Use this structure:

OVERVIEW:
One paragraph describing the purpose, scope, and organisation of the document.

Then one section per major section of the source document, in source order. Title each section header with the source section's name in capital letters. Inside each section:
1. Summarise the main argument or content.
2. List key terms with definitions (use a., b., c.).
3. Note any data, examples, or evidence given.

COMPARATIVE ANALYSIS:
Numbered points comparing and contrasting the ideas, methods, or positions across the sections above.

SYNTHESIS:
One or two paragraphs integrating the sections into a coherent picture, including open questions the document raises.

KEY TAKEAWAYS:
Numbered list of the most important points to remember.

Be thorough. Cover every section of the source; do not skip material.";

/// Instructions plus the budgets to call the model with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSpec {
    pub mode: SynthesisMode,
    pub instructions: String,
    pub max_output_tokens: u32,
    pub thinking_budget: u32,
}

/// Build the summary prompt for a mode.
pub fn build(mode: SynthesisMode) -> PromptSpec {
    let (template, max_output_tokens, thinking_budget) = match mode {
        SynthesisMode::Tldr => (TLDR_TEMPLATE, 1024, 512),
        SynthesisMode::Bullet => (BULLET_TEMPLATE, 4096, 1024),
        SynthesisMode::Detailed => (DETAILED_TEMPLATE, 8192, 4096),
    };
    PromptSpec {
        mode,
        instructions: format!("{}\n\n{}", template, FORMATTING_RULES),
        max_output_tokens,
        thinking_budget,
    }
}

/// Normalize a free-form mode label and build its prompt.
pub fn build_for_label(label: &str) -> PromptSpec {
    build(SynthesisMode::normalize(label))
}

/// Output budget for flashcard generation.
pub const FLASHCARD_MAX_TOKENS: u32 = 4096;
/// Output budget for quiz generation.
pub const QUIZ_MAX_TOKENS: u32 = 4096;
/// Output budget for prove-it question generation.
pub const PROVE_IT_MAX_TOKENS: u32 = 2048;
/// Output budget for prove-it grading.
pub const GRADING_MAX_TOKENS: u32 = 2048;

/// Flashcards drawn only from facts in existing notes (usually a summary).
pub fn flashcards_from_notes(notes: &str, count: usize) -> String {
    format!(
        "\
Create exactly {count} flashcards for active recall from the study notes below.

Rules:
1. Use only facts that are stated in the notes. Do not add outside knowledge.
2. Each question tests a single idea and can be answered without seeing the other cards.
3. Answers are concise: one or two sentences, or a short phrase.
4. Cover the notes broadly instead of repeating one topic.

Return a JSON array of exactly {count} objects with the fields \"question\" and \"answer\".

STUDY NOTES:
{notes}"
    )
}

/// Flashcards straight from a document. With `text`, the extracted text is
/// embedded; without it, the raw document is attached as a separate part.
pub fn flashcards_from_document(count: usize, difficulty: Difficulty, text: Option<&str>) -> String {
    let level = match difficulty {
        Difficulty::Easy => "EASY: definitions and basic recall of key terms and facts.",
        Difficulty::Medium => {
            "MEDIUM: understanding of concepts, relationships between ideas, and cause and effect."
        }
        Difficulty::Hard => {
            "HARD: application, analysis, edge cases, and comparisons that require reasoning."
        }
    };
    let source = match text {
        Some(text) => format!("DOCUMENT TEXT:\n{text}"),
        None => "The document is attached. Read all of it, including figures and tables.".to_string(),
    };
    format!(
        "\
Create exactly {count} flashcards for active recall from the document.

Difficulty: {level}

Rules:
1. Every card must be grounded in the document's content.
2. Each question tests a single idea; answers are concise and self-contained.
3. Set \"source\" to the section, heading, or page the fact comes from when it is identifiable.
4. Spread the cards across the whole document.

Return a JSON array of exactly {count} objects with the fields \"question\", \"answer\", and optionally \"source\".

{source}"
    )
}

/// Multiple-choice quiz built strictly from the given cards.
pub fn quiz(cards: &[&Flashcard], style: QuizStyle, count: usize) -> String {
    let style_rule = match style {
        QuizStyle::Standard => "Mix recall and understanding questions.",
        QuizStyle::Scenario => {
            "Frame every question as a short realistic scenario that requires applying a card's fact."
        }
        QuizStyle::Basic => "Ask straightforward definition and term-recognition questions.",
    };
    let mut listing = String::new();
    for (i, card) in cards.iter().enumerate() {
        listing.push_str(&format!(
            "{}. Q: {}\n   A: {}\n",
            i + 1,
            card.question.trim(),
            card.answer.trim()
        ));
    }
    format!(
        "\
Write a multiple-choice quiz of exactly {count} questions using only the flashcards below.

Rules:
1. Every question and every correct answer must come from the flashcards. Do not use outside facts.
2. Each question has exactly {options} options.
3. \"correctAnswer\" must be copied character for character from one of the options.
4. Wrong options are plausible but clearly wrong given the flashcards.
5. \"explanation\" says in one or two sentences why the correct answer is right.
6. {style_rule}

Return a JSON array of exactly {count} objects with the fields \"question\", \"options\", \"correctAnswer\", and \"explanation\".

FLASHCARDS:
{listing}",
        options = QuizQuestion::OPTION_COUNT,
    )
}

/// Three free-response questions (two short, one scenario) over labelled cards.
pub fn prove_it_questions<'a, I>(cards: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a Flashcard)>,
{
    let mut listing = String::new();
    for (id, card) in cards {
        listing.push_str(&format!(
            "[{}] Q: {}\n     A: {}\n",
            id,
            card.question.trim(),
            card.answer.trim()
        ));
    }
    format!(
        "\
The student just reviewed the flashcards below. Write a short \"prove it\" check of exactly 3 free-response questions:
1. Two questions of type \"short\" that need a one or two sentence answer explaining an idea in the student's own words.
2. One question of type \"scenario\" that asks the student to apply the ideas to a concrete situation.

Rules:
1. Give the questions the ids \"q1\", \"q2\", \"q3\".
2. \"sourceCardIds\" lists the bracketed ids of every card the question draws on; at least one.
3. \"answerKey\" is a model answer naming the essential ideas a correct response must contain.
4. Use only the flashcards' content.

Return a JSON array of 3 objects with the fields \"id\", \"type\", \"question\", \"answerKey\", and \"sourceCardIds\".

FLASHCARDS:
{listing}"
    )
}

/// Grading request for answered prove-it questions.
pub fn prove_it_grading(items: &[(&ProveItQuestion, &str)]) -> String {
    let mut listing = String::new();
    for (question, answer) in items {
        listing.push_str(&format!(
            "ID: {}\nTYPE: {}\nQUESTION: {}\nANSWER KEY: {}\nSTUDENT ANSWER: {}\n\n",
            question.id,
            match question.kind {
                crate::models::ProveItQuestionType::Short => "short",
                crate::models::ProveItQuestionType::Scenario => "scenario",
            },
            question.question.trim(),
            question.answer_key.trim(),
            answer.trim()
        ));
    }
    format!(
        "\
Grade the student's answers against the answer keys. Be strict but fair: accept paraphrases and different wording when the essential ideas are present; reject answers that miss or contradict an essential idea.

For each question return:
1. \"id\": the question id.
2. \"correct\": true or false.
3. \"score\": a number from 0 to 1 for how much of the answer key the student covered.
4. \"feedback\": one or two sentences addressed to the student.
5. \"firstMissingIdea\": the first essential idea the answer missed, or an empty string when nothing is missing.
6. \"followUpQuestion\": when \"correct\" is false, exactly one targeted question that leads the student to the missing idea; when \"correct\" is true, null.

Also return \"totalScore\" (sum of scores) and \"maxScore\" ({max}).

Return one JSON object with the fields \"totalScore\", \"maxScore\", and \"results\".

ANSWERS:
{listing}",
        max = items.len()
    )
}
