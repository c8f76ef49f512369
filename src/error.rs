use study_forge_core::completion::CompletionError;
use study_forge_core::parse::ParseError;

/// Errors surfaced by the synthesis pipeline and the prove-it session.
///
/// List-shaped artifacts (flashcards, quizzes, prove-it questions) never
/// return these; they degrade to an empty list instead. Only summaries and
/// grading fail loudly.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    /// The completion service failed fatally or ran out of retries.
    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("the completion service returned an empty summary")]
    EmptySummary,

    #[error("could not read structured output: {0}")]
    Parse(#[from] ParseError),

    #[error("question {id} has no answer")]
    MissingAnswer { id: String },

    #[error("no question with id {id}")]
    UnknownQuestion { id: String },

    #[error("cannot {action} while the session is {state}")]
    InvalidState { action: &'static str, state: String },

    #[error("no configured model accepts this request")]
    NoModel,

    #[error("operation cancelled")]
    Cancelled,
}

impl SynthesisError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SynthesisError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, SynthesisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_message_is_preserved() {
        let err: SynthesisError = CompletionError::fatal("API key not valid").into();
        assert_eq!(err.to_string(), "API key not valid");
    }

    #[test]
    fn invalid_state_names_action_and_state() {
        let err = SynthesisError::InvalidState {
            action: "grade",
            state: "collecting-questions".into(),
        };
        assert_eq!(
            err.to_string(),
            "cannot grade while the session is collecting-questions"
        );
    }
}
