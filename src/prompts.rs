//! Prompts sent alongside the composite page image.
//!
//! Callers can pass their own prompt to [`crate::convert::prepare_quiz`] or
//! the CLI's `--prompt-file`; the constant here is used only when no
//! override is provided.

/// Default prompt asking for three multiple-choice questions with answers.
pub const DEFAULT_QUIZ_PROMPT: &str = "You are an expert quiz creator. preparing a quiz for students based on the content of the image provided. the quiz should consist of multiple-choice questions that test comprehension and critical thinking skills. Each question should have four options, labeled A, B, C, and D, with one correct answer. Ensure that the questions cover key concepts and details from the image. provide the expected answers after each question. limit to only 3 questions.";

/// The prompt to send: `custom` when it has content, otherwise the default.
pub fn effective_prompt(custom: Option<&str>) -> &str {
    match custom {
        Some(p) if !p.trim().is_empty() => p,
        _ => DEFAULT_QUIZ_PROMPT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prompt_asks_for_three_lettered_questions() {
        assert!(DEFAULT_QUIZ_PROMPT.contains("multiple-choice"));
        assert!(DEFAULT_QUIZ_PROMPT.contains("A, B, C, and D"));
        assert!(DEFAULT_QUIZ_PROMPT.contains("expected answers"));
        assert!(DEFAULT_QUIZ_PROMPT.ends_with("limit to only 3 questions."));
    }

    #[test]
    fn blank_override_falls_back_to_default() {
        assert_eq!(effective_prompt(None), DEFAULT_QUIZ_PROMPT);
        assert_eq!(effective_prompt(Some("  \n")), DEFAULT_QUIZ_PROMPT);
        assert_eq!(effective_prompt(Some("Two questions.")), "Two questions.");
    }
}
