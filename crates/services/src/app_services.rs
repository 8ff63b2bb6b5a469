use std::sync::Arc;

use quiz_core::model::UserId;
use storage::repository::Storage;

use crate::Clock;
use crate::attempt_service::AttemptService;
use crate::error::AppServicesError;
use crate::hidden_set::HiddenSet;
use crate::quiz_service::QuizService;

/// Wires every service to one storage backend and loads the hidden-quiz
/// set for the signed-in user.
#[derive(Clone)]
pub struct AppServices {
    quiz_service: Arc<QuizService>,
    attempt_service: Arc<AttemptService>,
    hidden: Arc<HiddenSet>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or loading the
    /// user's hidden set fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        user: UserId,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::from_storage(&storage, clock, user).await
    }

    /// Build services over a fresh in-memory store.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the hidden set cannot be loaded.
    pub async fn in_memory(clock: Clock, user: UserId) -> Result<Self, AppServicesError> {
        Self::from_storage(&Storage::in_memory(), clock, user).await
    }

    /// # Errors
    ///
    /// Returns `AppServicesError` if the hidden set cannot be loaded.
    pub async fn from_storage(
        storage: &Storage,
        clock: Clock,
        user: UserId,
    ) -> Result<Self, AppServicesError> {
        let hidden = HiddenSet::load(Arc::clone(&storage.preferences), user).await?;

        Ok(Self {
            quiz_service: Arc::new(QuizService::new(clock, Arc::clone(&storage.quizzes))),
            attempt_service: Arc::new(AttemptService::new(clock, storage)),
            hidden: Arc::new(hidden),
        })
    }

    #[must_use]
    pub fn quiz_service(&self) -> Arc<QuizService> {
        Arc::clone(&self.quiz_service)
    }

    #[must_use]
    pub fn attempt_service(&self) -> Arc<AttemptService> {
        Arc::clone(&self.attempt_service)
    }

    #[must_use]
    pub fn hidden(&self) -> Arc<HiddenSet> {
        Arc::clone(&self.hidden)
    }
}
