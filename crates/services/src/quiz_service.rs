use std::sync::Arc;

use quiz_core::model::{Caller, Quiz, QuizDraft, QuizId};
use storage::repository::{NewOptionRecord, NewQuestionRecord, NewQuizRecord, QuizRepository};

use crate::Clock;
use crate::error::{HiddenSetError, QuizServiceError, StorageContext};
use crate::hidden_set::HiddenSet;

/// A quiz as shown in its author's dashboard.
#[derive(Clone, Debug, PartialEq)]
pub struct QuizListing {
    pub quiz: Quiz,
    /// Hidden either globally (store flag) or in the caller's own set.
    pub hidden: bool,
}

/// Authoring, listing and hiding of quizzes.
#[derive(Clone)]
pub struct QuizService {
    clock: Clock,
    quizzes: Arc<dyn QuizRepository>,
}

impl QuizService {
    #[must_use]
    pub fn new(clock: Clock, quizzes: Arc<dyn QuizRepository>) -> Self {
        Self { clock, quizzes }
    }

    /// Validate a draft and, if it is well formed, store it as a new quiz
    /// authored by `caller`.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Forbidden` if the caller is not a teacher.
    /// Returns `QuizServiceError::Invalid` with every rule violation.
    /// Returns `QuizServiceError::Storage` if persistence fails.
    pub async fn create_quiz(
        &self,
        caller: &Caller,
        draft: QuizDraft,
    ) -> Result<QuizId, QuizServiceError> {
        if !caller.is_teacher() {
            return Err(QuizServiceError::Forbidden {
                user: caller.user_id,
                action: "author quizzes",
            });
        }

        let draft = draft.into_valid()?;
        let record = NewQuizRecord {
            title: draft.title,
            description: draft.description,
            author_id: caller.user_id,
            created_at: self.clock.now(),
            questions: draft
                .questions
                .into_iter()
                .map(|question| NewQuestionRecord {
                    text: question.text,
                    explanation: question.explanation,
                    options: question
                        .choices
                        .into_iter()
                        .enumerate()
                        .map(|(i, text)| NewOptionRecord {
                            text,
                            is_correct: i == question.correct,
                        })
                        .collect(),
                })
                .collect(),
        };
        let questions = record.questions.len();

        let quiz_id = self
            .quizzes
            .insert_new_quiz(record)
            .await
            .context("insert_new_quiz", format!("author {}", caller.user_id))?;
        tracing::info!(%quiz_id, author = %caller.user_id, questions, "quiz created");
        Ok(quiz_id)
    }

    /// Fetch a quiz by ID.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::QuizNotFound` if it does not exist.
    /// Returns `QuizServiceError::Storage` if repository access fails.
    pub async fn get_quiz(&self, quiz_id: QuizId) -> Result<Quiz, QuizServiceError> {
        self.quizzes
            .get_quiz(quiz_id)
            .await
            .context("get_quiz", format!("quiz {quiz_id}"))?
            .ok_or(QuizServiceError::QuizNotFound(quiz_id))
    }

    /// The caller's own quizzes, flagged with their hidden state.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::ScopeMismatch` if `hidden` is scoped to
    /// another user.
    /// Returns `QuizServiceError::Storage` if repository access fails.
    pub async fn list_authored(
        &self,
        caller: &Caller,
        hidden: &HiddenSet,
    ) -> Result<Vec<QuizListing>, QuizServiceError> {
        ensure_scope(caller, hidden).await?;
        let mine = self
            .quizzes
            .list_by_author(caller.user_id)
            .await
            .context("list_by_author", format!("author {}", caller.user_id))?;

        let hidden_ids = hidden.snapshot().await;
        Ok(mine
            .into_iter()
            .map(|quiz| {
                let hidden = quiz.is_hidden() || hidden_ids.contains(&quiz.id());
                QuizListing { quiz, hidden }
            })
            .collect())
    }

    /// Quizzes open for taking: not hidden in the store and not in the
    /// active hidden set.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` if repository access fails.
    pub async fn list_available(&self, hidden: &HiddenSet) -> Result<Vec<Quiz>, QuizServiceError> {
        let visible = self
            .quizzes
            .list_visible()
            .await
            .context("list_visible", "all quizzes")?;

        let hidden_ids = hidden.snapshot().await;
        Ok(visible
            .into_iter()
            .filter(|quiz| !hidden_ids.contains(&quiz.id()))
            .collect())
    }

    /// Soft-hide a quiz the caller wrote.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::QuizNotFound` if the quiz does not exist.
    /// Returns `QuizServiceError::Forbidden` if the caller is not its author.
    /// Returns `QuizServiceError::ScopeMismatch` if `hidden` belongs to
    /// someone else.
    /// Returns `QuizServiceError::Storage` or `QuizServiceError::HiddenSet`
    /// if persistence fails.
    pub async fn hide_quiz(
        &self,
        caller: &Caller,
        quiz_id: QuizId,
        hidden: &HiddenSet,
    ) -> Result<(), QuizServiceError> {
        self.set_hidden(caller, quiz_id, hidden, true).await
    }

    /// Undo `hide_quiz`.
    ///
    /// # Errors
    ///
    /// Same as `hide_quiz`.
    pub async fn unhide_quiz(
        &self,
        caller: &Caller,
        quiz_id: QuizId,
        hidden: &HiddenSet,
    ) -> Result<(), QuizServiceError> {
        self.set_hidden(caller, quiz_id, hidden, false).await
    }

    async fn set_hidden(
        &self,
        caller: &Caller,
        quiz_id: QuizId,
        hidden: &HiddenSet,
        hide: bool,
    ) -> Result<(), QuizServiceError> {
        ensure_scope(caller, hidden).await?;
        let quiz = self.get_quiz(quiz_id).await?;
        if !caller.is_teacher() || !quiz.is_authored_by(caller.user_id) {
            return Err(QuizServiceError::Forbidden {
                user: caller.user_id,
                action: "change visibility of this quiz",
            });
        }

        self.quizzes
            .set_hidden(quiz_id, hide)
            .await
            .context("set_hidden", format!("quiz {quiz_id}"))?;
        let scoped = if hide {
            hidden.hide_for(caller.user_id, quiz_id).await
        } else {
            hidden.unhide_for(caller.user_id, quiz_id).await
        };
        if let Err(err) = scoped {
            // Roll the store flag back to match the untouched hidden set.
            if let Err(restore) = self.quizzes.set_hidden(quiz_id, quiz.is_hidden()).await {
                tracing::warn!(%quiz_id, error = %restore, "could not restore hidden flag");
            }
            return Err(match err {
                HiddenSetError::ScopeMismatch { active, expected } => {
                    QuizServiceError::ScopeMismatch {
                        active,
                        caller: expected,
                    }
                }
                other => other.into(),
            });
        }

        tracing::info!(%quiz_id, user = %caller.user_id, hidden = hide, "quiz visibility changed");
        Ok(())
    }
}

async fn ensure_scope(caller: &Caller, hidden: &HiddenSet) -> Result<(), QuizServiceError> {
    let active = hidden.scope().await;
    if active != caller.user_id {
        return Err(QuizServiceError::ScopeMismatch {
            active,
            caller: caller.user_id,
        });
    }
    Ok(())
}
