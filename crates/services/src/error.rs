//! Shared error types for the services crate.

use std::fmt::Display;

use thiserror::Error;

use quiz_core::model::{AttemptId, DraftErrors, OptionId, QuestionId, QuizId, UserId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// A storage call that failed, tagged with the operation and the ids involved.
#[derive(Debug, Error)]
#[error("{operation} failed for {target}")]
pub struct StoreFailure {
    pub operation: &'static str,
    pub target: String,
    #[source]
    pub source: StorageError,
}

/// Attach operation context to a raw storage result.
pub(crate) trait StorageContext<T> {
    fn context(self, operation: &'static str, target: impl Display) -> Result<T, StoreFailure>;
}

impl<T> StorageContext<T> for Result<T, StorageError> {
    fn context(self, operation: &'static str, target: impl Display) -> Result<T, StoreFailure> {
        self.map_err(|source| {
            let target = target.to_string();
            tracing::warn!(operation, %target, error = %source, "storage call failed");
            StoreFailure {
                operation,
                target,
                source,
            }
        })
    }
}

/// Errors emitted by `ResultAssembler`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResultError {
    #[error("quiz {0} not found")]
    QuizNotFound(QuizId),
    #[error(transparent)]
    Storage(#[from] StoreFailure),
}

/// Errors emitted by `HiddenSet`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HiddenSetError {
    #[error("hidden-quiz scope belongs to user {active}, not {expected}")]
    ScopeMismatch { active: UserId, expected: UserId },
    #[error(transparent)]
    Storage(#[from] StoreFailure),
}

/// Errors emitted by `QuizService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServiceError {
    #[error("user {user} may not {action}")]
    Forbidden { user: UserId, action: &'static str },
    #[error(transparent)]
    Invalid(#[from] DraftErrors),
    #[error("quiz {0} not found")]
    QuizNotFound(QuizId),
    #[error("hidden-quiz scope belongs to user {active}, not {caller}")]
    ScopeMismatch { active: UserId, caller: UserId },
    #[error(transparent)]
    HiddenSet(#[from] HiddenSetError),
    #[error(transparent)]
    Storage(#[from] StoreFailure),
}

/// Errors emitted by `AttemptService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AttemptServiceError {
    #[error("user {user} may not {action}")]
    Forbidden { user: UserId, action: &'static str },
    #[error("quiz {0} not found")]
    QuizNotFound(QuizId),
    #[error("attempt {0} not found")]
    AttemptNotFound(AttemptId),
    #[error("question {question} does not belong to quiz {quiz}")]
    UnknownQuestion { quiz: QuizId, question: QuestionId },
    #[error("option {option} is not a choice of question {question}")]
    UnknownOption { question: QuestionId, option: OptionId },
    #[error(transparent)]
    Result(#[from] ResultError),
    #[error(transparent)]
    Storage(#[from] StoreFailure),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    HiddenSet(#[from] HiddenSetError),
}

impl QuizServiceError {
    /// True when the request referred to something that does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::QuizNotFound(_))
    }
}

impl AttemptServiceError {
    /// True when the request referred to something that does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::QuizNotFound(_)
                | Self::AttemptNotFound(_)
                | Self::Result(ResultError::QuizNotFound(_))
        )
    }
}
