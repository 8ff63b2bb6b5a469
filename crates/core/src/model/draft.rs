//! Authoring-time quiz drafts and the structural rules they must satisfy
//! before anything is written to storage.

use std::fmt;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Number of choices every question must carry.
pub const CHOICES_PER_QUESTION: usize = 4;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// A single structural problem found in a draft.
///
/// Question and choice numbers are 1-based, matching what the author sees.
/// `Display` renders the stable error code consumed by front ends.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DraftError {
    #[error("TITLE_EMPTY")]
    TitleEmpty,

    #[error("NO_QUESTIONS")]
    NoQuestions,

    #[error("Q#{question}_TEXT_EMPTY")]
    QuestionTextEmpty { question: usize },

    #[error("Q#{question}_CHOICES_NEED_4")]
    ChoicesNeedFour { question: usize },

    #[error("Q#{question}_CHOICE_{choice}_EMPTY")]
    ChoiceEmpty { question: usize, choice: usize },

    #[error("Q#{question}_NO_CORRECT")]
    NoCorrect { question: usize },
}

impl DraftError {
    /// The wire code for this error, e.g. `Q#2_CHOICE_3_EMPTY`.
    #[must_use]
    pub fn code(&self) -> String {
        self.to_string()
    }
}

/// Every problem found in a rejected draft, in evaluation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftErrors(Vec<DraftError>);

impl DraftErrors {
    #[must_use]
    pub fn as_slice(&self) -> &[DraftError] {
        &self.0
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<DraftError> {
        self.0
    }

    #[must_use]
    pub fn codes(&self) -> Vec<String> {
        self.0.iter().map(DraftError::code).collect()
    }
}

impl fmt::Display for DraftErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid quiz draft: ")?;
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for DraftErrors {}

//
// ─── DRAFTS ────────────────────────────────────────────────────────────────────
//

/// An in-progress quiz as typed into the editor. Never persisted as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QuizDraft {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    pub description: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub questions: Vec<QuestionDraft>,
}

/// One question of a draft.
///
/// `correct_index` is signed so out-of-range input from a form or JSON
/// reaches validation instead of failing to parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QuestionDraft {
    #[serde(deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(deserialize_with = "choices_allowing_null")]
    pub choices: Vec<String>,
    pub correct_index: Option<i64>,
    pub explanation: Option<String>,
}

/// `null` reads as the empty value, so it reaches validation as blank.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn choices_allowing_null<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let choices: Option<Vec<Option<String>>> = Option::deserialize(deserializer)?;
    Ok(choices
        .unwrap_or_default()
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect())
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

impl QuestionDraft {
    pub fn new(
        text: impl Into<String>,
        choices: impl IntoIterator<Item = impl Into<String>>,
        correct_index: Option<i64>,
    ) -> Self {
        Self {
            text: text.into(),
            choices: choices.into_iter().map(Into::into).collect(),
            correct_index,
            explanation: None,
        }
    }

    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    fn correct_slot(&self) -> Option<usize> {
        self.correct_index
            .and_then(|i| usize::try_from(i).ok())
            .filter(|i| *i < CHOICES_PER_QUESTION)
    }

    fn collect_errors(&self, number: usize, errors: &mut Vec<DraftError>) {
        if is_blank(&self.text) {
            errors.push(DraftError::QuestionTextEmpty { question: number });
        }

        if self.choices.len() == CHOICES_PER_QUESTION {
            for (i, choice) in self.choices.iter().enumerate() {
                if is_blank(choice) {
                    errors.push(DraftError::ChoiceEmpty {
                        question: number,
                        choice: i + 1,
                    });
                }
            }
        } else {
            errors.push(DraftError::ChoicesNeedFour { question: number });
        }

        if self.correct_slot().is_none() {
            errors.push(DraftError::NoCorrect { question: number });
        }
    }
}

impl QuizDraft {
    pub fn new(title: impl Into<String>, questions: Vec<QuestionDraft>) -> Self {
        Self {
            title: title.into(),
            description: None,
            questions,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Check the draft against the authoring rules.
    ///
    /// Rules run in a fixed order: title, presence of questions (stops here
    /// when there are none), then each question in order: text, choice
    /// count (or each choice when there are exactly four), correct index.
    /// An empty result means the draft is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<DraftError> {
        let mut errors = Vec::new();

        if is_blank(&self.title) {
            errors.push(DraftError::TitleEmpty);
        }

        if self.questions.is_empty() {
            errors.push(DraftError::NoQuestions);
            return errors;
        }

        for (i, question) in self.questions.iter().enumerate() {
            question.collect_errors(i + 1, &mut errors);
        }

        errors
    }

    /// Validate and normalize the draft into a shape ready for storage.
    ///
    /// # Errors
    ///
    /// Returns every rule violation as `DraftErrors` if the draft is invalid.
    pub fn into_valid(self) -> Result<ValidDraft, DraftErrors> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(DraftErrors(errors));
        }

        let mut questions = Vec::with_capacity(self.questions.len());
        for (i, question) in self.questions.into_iter().enumerate() {
            let correct = question
                .correct_slot()
                .ok_or(DraftErrors(vec![DraftError::NoCorrect { question: i + 1 }]))?;
            let choices: [String; CHOICES_PER_QUESTION] = question
                .choices
                .into_iter()
                .map(|c| c.trim().to_owned())
                .collect::<Vec<_>>()
                .try_into()
                .map_err(|_| DraftErrors(vec![DraftError::ChoicesNeedFour { question: i + 1 }]))?;

            questions.push(ValidQuestion {
                text: question.text.trim().to_owned(),
                choices,
                correct,
                explanation: normalize_optional(question.explanation),
            });
        }

        Ok(ValidDraft {
            title: self.title.trim().to_owned(),
            description: normalize_optional(self.description),
            questions,
        })
    }
}

//
// ─── VALIDATED SHAPE ───────────────────────────────────────────────────────────
//

/// A draft that passed validation, with text trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidDraft {
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<ValidQuestion>,
}

/// A validated question: exactly four choices and an in-range correct index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidQuestion {
    pub text: String,
    pub choices: [String; CHOICES_PER_QUESTION],
    pub correct: usize,
    pub explanation: Option<String>,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn good_question() -> QuestionDraft {
        QuestionDraft::new("What is 2 + 2?", ["3", "4", "5", "22"], Some(1))
    }

    fn codes(draft: &QuizDraft) -> Vec<String> {
        draft.validate().iter().map(DraftError::code).collect()
    }

    #[test]
    fn valid_draft_has_no_errors() {
        let draft = QuizDraft::new("Arithmetic", vec![good_question(), good_question()]);
        assert!(draft.validate().is_empty());
    }

    #[test]
    fn blank_title_reported_once() {
        let draft = QuizDraft::new("   ", vec![good_question(), QuestionDraft::default()]);
        let codes = codes(&draft);
        assert_eq!(codes.iter().filter(|c| *c == "TITLE_EMPTY").count(), 1);
        assert_eq!(codes[0], "TITLE_EMPTY");
    }

    #[test]
    fn no_questions_short_circuits() {
        let draft = QuizDraft::new("Quiz", Vec::new());
        assert_eq!(draft.validate(), vec![DraftError::NoQuestions]);
    }

    #[test]
    fn blank_title_and_no_questions() {
        let draft = QuizDraft::new("", Vec::new());
        assert_eq!(codes(&draft), vec!["TITLE_EMPTY", "NO_QUESTIONS"]);
    }

    #[test]
    fn wrong_choice_count_suppresses_choice_checks() {
        let three = QuestionDraft::new("Q", ["", "", ""], Some(0));
        let five = QuestionDraft::new("Q", ["a", "", "c", "d", "e"], Some(0));
        let draft = QuizDraft::new("Quiz", vec![three, five]);

        assert_eq!(codes(&draft), vec!["Q#1_CHOICES_NEED_4", "Q#2_CHOICES_NEED_4"]);
    }

    #[test]
    fn blank_choices_reported_by_position() {
        let question = QuestionDraft::new("Q", ["A", "", "C", "  "], Some(0));
        let draft = QuizDraft::new("Quiz", vec![question]);

        assert_eq!(codes(&draft), vec!["Q#1_CHOICE_2_EMPTY", "Q#1_CHOICE_4_EMPTY"]);
    }

    #[test]
    fn correct_index_out_of_range_or_missing() {
        let missing = QuestionDraft::new("Q", ["a", "b", "c", "d"], None);
        let negative = QuestionDraft::new("Q", ["a", "b", "c", "d"], Some(-1));
        let too_big = QuestionDraft::new("Q", ["a", "b", "c", "d"], Some(4));
        let last = QuestionDraft::new("Q", ["a", "b", "c", "d"], Some(3));
        let draft = QuizDraft::new("Quiz", vec![missing, negative, too_big, last]);

        assert_eq!(
            codes(&draft),
            vec!["Q#1_NO_CORRECT", "Q#2_NO_CORRECT", "Q#3_NO_CORRECT"]
        );
    }

    #[test]
    fn errors_collected_across_questions_in_order() {
        let q1 = QuestionDraft::new(" ", ["a", "b"], None);
        let q2 = QuestionDraft::new("ok", ["", "b", "c", "d"], Some(2));
        let draft = QuizDraft::new("", vec![q1, q2]);

        assert_eq!(
            draft.validate(),
            vec![
                DraftError::TitleEmpty,
                DraftError::QuestionTextEmpty { question: 1 },
                DraftError::ChoicesNeedFour { question: 1 },
                DraftError::NoCorrect { question: 1 },
                DraftError::ChoiceEmpty {
                    question: 2,
                    choice: 1
                },
            ]
        );
    }

    #[test]
    fn into_valid_trims_and_keeps_correct_index() {
        let question = QuestionDraft::new(" Pick b ", [" a", "b ", "c", "d"], Some(1))
            .with_explanation("  ");
        let draft = QuizDraft::new("  Letters ", vec![question]).with_description(" abc ");

        let valid = draft.into_valid().unwrap();
        assert_eq!(valid.title, "Letters");
        assert_eq!(valid.description.as_deref(), Some("abc"));
        assert_eq!(valid.questions[0].text, "Pick b");
        assert_eq!(valid.questions[0].choices[0], "a");
        assert_eq!(valid.questions[0].correct, 1);
        assert_eq!(valid.questions[0].explanation, None);
    }

    #[test]
    fn into_valid_returns_all_codes() {
        let err = QuizDraft::new("", Vec::new()).into_valid().unwrap_err();
        assert_eq!(err.codes(), vec!["TITLE_EMPTY", "NO_QUESTIONS"]);
        assert_eq!(err.to_string(), "invalid quiz draft: TITLE_EMPTY, NO_QUESTIONS");
    }

    #[test]
    fn deserializes_with_missing_fields_as_null() {
        let json = r#"{"title":"T","questions":[{"text":"Q","choices":["a","b","c","d"]}]}"#;
        let draft: QuizDraft = serde_json::from_str(json).unwrap();
        assert_eq!(codes(&draft), vec!["Q#1_NO_CORRECT"]);
    }

    #[test]
    fn explicit_nulls_read_as_blank() {
        let draft: QuizDraft = serde_json::from_str(r#"{"title":null}"#).unwrap();
        assert_eq!(codes(&draft), vec!["TITLE_EMPTY", "NO_QUESTIONS"]);

        let draft: QuizDraft = serde_json::from_str(r#"{"title":"T","questions":null}"#).unwrap();
        assert_eq!(codes(&draft), vec!["NO_QUESTIONS"]);

        let json = r#"{"title":"T","questions":[
            {"text":null,"choices":["A",null,"C","D"],"correct_index":0}
        ]}"#;
        let draft: QuizDraft = serde_json::from_str(json).unwrap();
        assert_eq!(codes(&draft), vec!["Q#1_TEXT_EMPTY", "Q#1_CHOICE_2_EMPTY"]);

        let json = r#"{"title":"T","questions":[{"text":"Q","choices":null,"correct_index":1}]}"#;
        let draft: QuizDraft = serde_json::from_str(json).unwrap();
        assert_eq!(codes(&draft), vec!["Q#1_CHOICES_NEED_4"]);
    }
}
