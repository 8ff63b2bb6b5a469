use quiz_core::model::{AnswerOption, Question, QuestionId, QuizId};

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_option_row, map_question_row};
use crate::repository::{OptionRepository, QuestionRepository, StorageError};

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn questions_for_quiz(&self, quiz_id: QuizId) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, quiz_id, text, explanation
            FROM questions
            WHERE quiz_id = ?1
            ORDER BY position ASC, id ASC
            ",
        )
        .bind(id_to_i64("quiz_id", quiz_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_question_row).collect()
    }
}

#[async_trait::async_trait]
impl OptionRepository for SqliteRepository {
    async fn options_for_question(
        &self,
        question_id: QuestionId,
    ) -> Result<Vec<AnswerOption>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, question_id, text, is_correct
            FROM options
            WHERE question_id = ?1
            ORDER BY position ASC, id ASC
            ",
        )
        .bind(id_to_i64("question_id", question_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_option_row).collect()
    }
}
