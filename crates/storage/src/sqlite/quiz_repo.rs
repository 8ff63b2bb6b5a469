use quiz_core::model::{Quiz, QuizId, UserId};

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_quiz_row, quiz_id_from_i64};
use crate::repository::{NewQuizRecord, QuizRepository, StorageError};

#[async_trait::async_trait]
impl QuizRepository for SqliteRepository {
    async fn insert_new_quiz(&self, quiz: NewQuizRecord) -> Result<QuizId, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let res = sqlx::query(
            r"
            INSERT INTO quizzes (title, description, author_id, hidden, created_at)
            VALUES (?1, ?2, ?3, 0, ?4)
            ",
        )
        .bind(quiz.title)
        .bind(quiz.description)
        .bind(id_to_i64("author_id", quiz.author_id.value())?)
        .bind(quiz.created_at)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;
        let quiz_id = res.last_insert_rowid();

        for (position, question) in (0_i64..).zip(quiz.questions) {
            let res = sqlx::query(
                r"
                INSERT INTO questions (quiz_id, position, text, explanation)
                VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(quiz_id)
            .bind(position)
            .bind(question.text)
            .bind(question.explanation)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
            let question_id = res.last_insert_rowid();

            for (position, option) in (0_i64..).zip(question.options) {
                sqlx::query(
                    r"
                    INSERT INTO options (question_id, position, text, is_correct)
                    VALUES (?1, ?2, ?3, ?4)
                    ",
                )
                .bind(question_id)
                .bind(position)
                .bind(option.text)
                .bind(i64::from(option.is_correct))
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
            }
        }

        tx.commit().await.map_err(conn)?;
        quiz_id_from_i64(quiz_id)
    }

    async fn get_quiz(&self, id: QuizId) -> Result<Option<Quiz>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, title, description, author_id, hidden, created_at
            FROM quizzes WHERE id = ?1
            ",
        )
        .bind(id_to_i64("quiz_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_quiz_row).transpose()
    }

    async fn list_by_author(&self, author: UserId) -> Result<Vec<Quiz>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, title, description, author_id, hidden, created_at
            FROM quizzes
            WHERE author_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(id_to_i64("author_id", author.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_quiz_row).collect()
    }

    async fn list_visible(&self) -> Result<Vec<Quiz>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, title, description, author_id, hidden, created_at
            FROM quizzes
            WHERE hidden = 0
            ORDER BY id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_quiz_row).collect()
    }

    async fn set_hidden(&self, id: QuizId, hidden: bool) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE quizzes SET hidden = ?1 WHERE id = ?2")
            .bind(i64::from(hidden))
            .bind(id_to_i64("quiz_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
