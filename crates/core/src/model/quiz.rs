use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::ids::{OptionId, QuestionId, QuizId, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz title cannot be empty")]
    EmptyTitle,
}

//
// ─── QUIZ ──────────────────────────────────────────────────────────────────────
//

/// Quiz metadata as persisted by its author.
///
/// Questions are stored and fetched separately; hiding is a soft flag and
/// never removes the quiz.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quiz {
    id: QuizId,
    title: String,
    description: Option<String>,
    author_id: UserId,
    hidden: bool,
    created_at: DateTime<Utc>,
}

impl Quiz {
    /// Rebuild a quiz from stored values.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::EmptyTitle` if the title is empty or whitespace-only.
    pub fn from_persisted(
        id: QuizId,
        title: impl Into<String>,
        description: Option<String>,
        author_id: UserId,
        hidden: bool,
        created_at: DateTime<Utc>,
    ) -> Result<Self, QuizError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(QuizError::EmptyTitle);
        }

        let description = description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty());

        Ok(Self {
            id,
            title: title.trim().to_owned(),
            description,
            author_id,
            hidden,
            created_at,
        })
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> QuizId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn author_id(&self) -> UserId {
        self.author_id
    }

    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn is_authored_by(&self, user: UserId) -> bool {
        self.author_id == user
    }

    /// Returns a copy with the hidden flag changed.
    #[must_use]
    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }
}

//
// ─── QUESTIONS & OPTIONS ───────────────────────────────────────────────────────
//

/// A stored question; its options live in their own store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    pub id: QuestionId,
    pub quiz_id: QuizId,
    pub text: String,
    pub explanation: Option<String>,
}

/// One selectable answer of a question.
///
/// Exactly one option per question is correct when authored; this is not
/// re-checked on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerOption {
    pub id: OptionId,
    pub question_id: QuestionId,
    pub text: String,
    pub is_correct: bool,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
