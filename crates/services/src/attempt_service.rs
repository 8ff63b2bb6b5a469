use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use quiz_core::model::{
    AttemptId, Caller, OptionId, QuestionId, Quiz, QuizId, ResultDetail, Score, UserId,
};
use storage::repository::{
    NewAttemptRecord, OptionRepository, QuestionRepository, QuizRepository, ResponseRepository,
    Storage,
};

use crate::Clock;
use crate::error::{AttemptServiceError, StorageContext};
use crate::result_assembler::ResultAssembler;

/// One line of an author's review table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReviewRow {
    pub attempt_id: AttemptId,
    pub student_id: UserId,
    pub submitted_at: DateTime<Utc>,
    pub score: Score,
}

/// Records attempts and turns them into graded results.
#[derive(Clone)]
pub struct AttemptService {
    clock: Clock,
    quizzes: Arc<dyn QuizRepository>,
    questions: Arc<dyn QuestionRepository>,
    options: Arc<dyn OptionRepository>,
    responses: Arc<dyn ResponseRepository>,
    assembler: ResultAssembler,
}

impl AttemptService {
    #[must_use]
    pub fn new(clock: Clock, storage: &Storage) -> Self {
        Self {
            clock,
            quizzes: Arc::clone(&storage.quizzes),
            questions: Arc::clone(&storage.questions),
            options: Arc::clone(&storage.options),
            responses: Arc::clone(&storage.responses),
            assembler: ResultAssembler::from_storage(storage),
        }
    }

    /// Record a student's answers to a quiz. Questions left out of
    /// `responses` count as unanswered.
    ///
    /// # Errors
    ///
    /// Returns `AttemptServiceError::Forbidden` if the caller is not a student.
    /// Returns `AttemptServiceError::QuizNotFound` if the quiz does not exist.
    /// Returns `AttemptServiceError::UnknownQuestion` or `UnknownOption` if a
    /// response does not fit the quiz.
    /// Returns `AttemptServiceError::Storage` if persistence fails.
    pub async fn submit(
        &self,
        caller: &Caller,
        quiz_id: QuizId,
        responses: BTreeMap<QuestionId, OptionId>,
    ) -> Result<AttemptId, AttemptServiceError> {
        if caller.is_teacher() {
            return Err(AttemptServiceError::Forbidden {
                user: caller.user_id,
                action: "submit attempts",
            });
        }
        self.require_quiz(quiz_id).await?;
        self.check_responses(quiz_id, &responses).await?;

        let answered = responses.len();
        let attempt_id = self
            .responses
            .insert_attempt(NewAttemptRecord {
                quiz_id,
                student_id: caller.user_id,
                responses,
                submitted_at: self.clock.now(),
            })
            .await
            .context("insert_attempt", format!("quiz {quiz_id}"))?;

        tracing::info!(
            %attempt_id,
            %quiz_id,
            student = %caller.user_id,
            answered,
            "attempt submitted"
        );
        Ok(attempt_id)
    }

    /// The graded report for one attempt.
    ///
    /// # Errors
    ///
    /// Returns `AttemptServiceError::AttemptNotFound` if the attempt does not
    /// exist, or `AttemptServiceError::Result` if assembly fails.
    pub async fn result(&self, attempt_id: AttemptId) -> Result<ResultDetail, AttemptServiceError> {
        let attempt = self
            .responses
            .get_attempt(attempt_id)
            .await
            .context("get_attempt", format!("attempt {attempt_id}"))?
            .ok_or(AttemptServiceError::AttemptNotFound(attempt_id))?;

        Ok(self.assembler.assemble(attempt.id, attempt.quiz_id).await?)
    }

    /// Every attempt at a quiz with its score, oldest first. Only the quiz
    /// author may look.
    ///
    /// # Errors
    ///
    /// Returns `AttemptServiceError::QuizNotFound` if the quiz does not exist.
    /// Returns `AttemptServiceError::Forbidden` if the caller did not write it.
    /// Returns `AttemptServiceError::Result` or `Storage` on store failures.
    pub async fn review(
        &self,
        caller: &Caller,
        quiz_id: QuizId,
    ) -> Result<Vec<ReviewRow>, AttemptServiceError> {
        let quiz = self.require_quiz(quiz_id).await?;
        if !quiz.is_authored_by(caller.user_id) {
            return Err(AttemptServiceError::Forbidden {
                user: caller.user_id,
                action: "review attempts at this quiz",
            });
        }

        let attempts = self
            .responses
            .attempts_for_quiz(quiz_id)
            .await
            .context("attempts_for_quiz", format!("quiz {quiz_id}"))?;

        let mut rows = Vec::with_capacity(attempts.len());
        for attempt in attempts {
            let detail = self.assembler.assemble(attempt.id, quiz_id).await?;
            rows.push(ReviewRow {
                attempt_id: attempt.id,
                student_id: attempt.student_id,
                submitted_at: attempt.submitted_at,
                score: detail.score(),
            });
        }
        Ok(rows)
    }

    async fn require_quiz(&self, quiz_id: QuizId) -> Result<Quiz, AttemptServiceError> {
        self.quizzes
            .get_quiz(quiz_id)
            .await
            .context("get_quiz", format!("quiz {quiz_id}"))?
            .ok_or(AttemptServiceError::QuizNotFound(quiz_id))
    }

    async fn check_responses(
        &self,
        quiz_id: QuizId,
        responses: &BTreeMap<QuestionId, OptionId>,
    ) -> Result<(), AttemptServiceError> {
        if responses.is_empty() {
            return Ok(());
        }

        let questions = self
            .questions
            .questions_for_quiz(quiz_id)
            .await
            .context("questions_for_quiz", format!("quiz {quiz_id}"))?;

        for (&question, &option) in responses {
            if !questions.iter().any(|q| q.id == question) {
                return Err(AttemptServiceError::UnknownQuestion {
                    quiz: quiz_id,
                    question,
                });
            }
            let options = self
                .options
                .options_for_question(question)
                .await
                .context("options_for_question", format!("question {question}"))?;
            if !options.iter().any(|o| o.id == option) {
                return Err(AttemptServiceError::UnknownOption { question, option });
            }
        }
        Ok(())
    }
}
