use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::ids::{AttemptId, OptionId, QuestionId, QuizId, UserId};

/// A student's recorded submission for one quiz. Never modified once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attempt {
    pub id: AttemptId,
    pub quiz_id: QuizId,
    pub student_id: UserId,
    pub responses: BTreeMap<QuestionId, OptionId>,
    pub submitted_at: DateTime<Utc>,
}

impl Attempt {
    /// The option the student picked for `question`, if any.
    #[must_use]
    pub fn chosen_option(&self, question: QuestionId) -> Option<OptionId> {
        self.responses.get(&question).copied()
    }
}
