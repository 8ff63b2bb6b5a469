use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::{
    AnswerOption, Attempt, AttemptId, OptionId, Question, QuestionId, Quiz, QuizId, UserId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// Insert shape for a quiz together with its questions and options.
///
/// Ids are assigned by the repository; order of `questions` and of each
/// question's `options` is the stored order.
#[derive(Debug, Clone)]
pub struct NewQuizRecord {
    pub title: String,
    pub description: Option<String>,
    pub author_id: UserId,
    pub created_at: DateTime<Utc>,
    pub questions: Vec<NewQuestionRecord>,
}

#[derive(Debug, Clone)]
pub struct NewQuestionRecord {
    pub text: String,
    pub explanation: Option<String>,
    pub options: Vec<NewOptionRecord>,
}

#[derive(Debug, Clone)]
pub struct NewOptionRecord {
    pub text: String,
    pub is_correct: bool,
}

/// Insert shape for a submitted attempt.
#[derive(Debug, Clone)]
pub struct NewAttemptRecord {
    pub quiz_id: QuizId,
    pub student_id: UserId,
    pub responses: BTreeMap<QuestionId, OptionId>,
    pub submitted_at: DateTime<Utc>,
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait QuizRepository: Send + Sync {
    /// Insert a quiz with all of its questions and options as one unit.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the quiz cannot be stored.
    async fn insert_new_quiz(&self, quiz: NewQuizRecord) -> Result<QuizId, StorageError>;

    /// Fetch a quiz by ID, `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_quiz(&self, id: QuizId) -> Result<Option<Quiz>, StorageError>;

    /// All quizzes written by `author`, hidden ones included, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_by_author(&self, author: UserId) -> Result<Vec<Quiz>, StorageError>;

    /// All quizzes whose hidden flag is off, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_visible(&self) -> Result<Vec<Quiz>, StorageError>;

    /// Set the soft-hide flag.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the quiz does not exist.
    async fn set_hidden(&self, id: QuizId, hidden: bool) -> Result<(), StorageError>;
}

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Questions of a quiz in stored order; empty if there are none.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn questions_for_quiz(&self, quiz_id: QuizId) -> Result<Vec<Question>, StorageError>;
}

#[async_trait]
pub trait OptionRepository: Send + Sync {
    /// Options of a question in stored order; empty if there are none.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn options_for_question(
        &self,
        question_id: QuestionId,
    ) -> Result<Vec<AnswerOption>, StorageError>;
}

#[async_trait]
pub trait ResponseRepository: Send + Sync {
    /// Record a submitted attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be stored.
    async fn insert_attempt(&self, attempt: NewAttemptRecord) -> Result<AttemptId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_attempt(&self, id: AttemptId) -> Result<Option<Attempt>, StorageError>;

    /// Attempts recorded for a quiz, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn attempts_for_quiz(&self, quiz_id: QuizId) -> Result<Vec<Attempt>, StorageError>;

    /// The option chosen in `attempt` for `question`, `None` if unanswered.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn chosen_option(
        &self,
        attempt: AttemptId,
        question: QuestionId,
    ) -> Result<Option<OptionId>, StorageError>;
}

/// Small string key-value store for per-user preferences.
#[async_trait]
pub trait PreferenceRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_preference(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn put_preference(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct Tables {
    next_id: u64,
    quizzes: BTreeMap<QuizId, Quiz>,
    questions: Vec<Question>,
    options: Vec<AnswerOption>,
    attempts: BTreeMap<AttemptId, Attempt>,
    preferences: HashMap<String, String>,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StorageError> {
        self.tables
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    /// Store a fully formed quiz under its own id. Useful for fixtures.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn put_quiz(&self, quiz: Quiz) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.next_id = guard.next_id.max(quiz.id().value());
        guard.quizzes.insert(quiz.id(), quiz);
        Ok(())
    }

    /// Append a question (and its options) after any existing ones.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn put_question(
        &self,
        question: Question,
        options: Vec<AnswerOption>,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let highest = options
            .iter()
            .map(|o| o.id.value())
            .chain([question.id.value(), guard.next_id])
            .max()
            .unwrap_or_default();
        guard.next_id = highest;
        guard.questions.push(question);
        guard.options.extend(options);
        Ok(())
    }
}

#[async_trait]
impl QuizRepository for InMemoryRepository {
    async fn insert_new_quiz(&self, quiz: NewQuizRecord) -> Result<QuizId, StorageError> {
        let mut guard = self.lock()?;
        let quiz_id = QuizId::new(guard.next_id());
        let stored = Quiz::from_persisted(
            quiz_id,
            quiz.title,
            quiz.description,
            quiz.author_id,
            false,
            quiz.created_at,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
        guard.quizzes.insert(quiz_id, stored);

        for question in quiz.questions {
            let question_id = QuestionId::new(guard.next_id());
            guard.questions.push(Question {
                id: question_id,
                quiz_id,
                text: question.text,
                explanation: question.explanation,
            });
            for option in question.options {
                let option_id = OptionId::new(guard.next_id());
                guard.options.push(AnswerOption {
                    id: option_id,
                    question_id,
                    text: option.text,
                    is_correct: option.is_correct,
                });
            }
        }

        Ok(quiz_id)
    }

    async fn get_quiz(&self, id: QuizId) -> Result<Option<Quiz>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.quizzes.get(&id).cloned())
    }

    async fn list_by_author(&self, author: UserId) -> Result<Vec<Quiz>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .quizzes
            .values()
            .filter(|q| q.is_authored_by(author))
            .cloned()
            .collect())
    }

    async fn list_visible(&self) -> Result<Vec<Quiz>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .quizzes
            .values()
            .filter(|q| !q.is_hidden())
            .cloned()
            .collect())
    }

    async fn set_hidden(&self, id: QuizId, hidden: bool) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let quiz = guard.quizzes.remove(&id).ok_or(StorageError::NotFound)?;
        guard.quizzes.insert(id, quiz.with_hidden(hidden));
        Ok(())
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn questions_for_quiz(&self, quiz_id: QuizId) -> Result<Vec<Question>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .questions
            .iter()
            .filter(|q| q.quiz_id == quiz_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OptionRepository for InMemoryRepository {
    async fn options_for_question(
        &self,
        question_id: QuestionId,
    ) -> Result<Vec<AnswerOption>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .options
            .iter()
            .filter(|o| o.question_id == question_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ResponseRepository for InMemoryRepository {
    async fn insert_attempt(&self, attempt: NewAttemptRecord) -> Result<AttemptId, StorageError> {
        let mut guard = self.lock()?;
        let id = AttemptId::new(guard.next_id());
        guard.attempts.insert(
            id,
            Attempt {
                id,
                quiz_id: attempt.quiz_id,
                student_id: attempt.student_id,
                responses: attempt.responses,
                submitted_at: attempt.submitted_at,
            },
        );
        Ok(id)
    }

    async fn get_attempt(&self, id: AttemptId) -> Result<Option<Attempt>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.attempts.get(&id).cloned())
    }

    async fn attempts_for_quiz(&self, quiz_id: QuizId) -> Result<Vec<Attempt>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .attempts
            .values()
            .filter(|a| a.quiz_id == quiz_id)
            .cloned()
            .collect())
    }

    async fn chosen_option(
        &self,
        attempt: AttemptId,
        question: QuestionId,
    ) -> Result<Option<OptionId>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .attempts
            .get(&attempt)
            .and_then(|a| a.chosen_option(question)))
    }
}

#[async_trait]
impl PreferenceRepository for InMemoryRepository {
    async fn get_preference(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.preferences.get(key).cloned())
    }

    async fn put_preference(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.preferences.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub quizzes: Arc<dyn QuizRepository>,
    pub questions: Arc<dyn QuestionRepository>,
    pub options: Arc<dyn OptionRepository>,
    pub responses: Arc<dyn ResponseRepository>,
    pub preferences: Arc<dyn PreferenceRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Use one repository value for every store.
    #[must_use]
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: QuizRepository
            + QuestionRepository
            + OptionRepository
            + ResponseRepository
            + PreferenceRepository
            + Clone
            + 'static,
    {
        Self {
            quizzes: Arc::new(repo.clone()),
            questions: Arc::new(repo.clone()),
            options: Arc::new(repo.clone()),
            responses: Arc::new(repo.clone()),
            preferences: Arc::new(repo),
        }
    }
}
