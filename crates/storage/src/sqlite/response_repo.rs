use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use quiz_core::model::{Attempt, AttemptId, OptionId, QuestionId, QuizId, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{
    attempt_id_from_i64, conn, id_to_i64, option_id_from_i64, question_id_from_i64,
    quiz_id_from_i64, ser, user_id_from_i64,
};
use crate::repository::{NewAttemptRecord, ResponseRepository, StorageError};

/// Attempt columns before its responses are attached.
struct AttemptHeader {
    id: AttemptId,
    quiz_id: QuizId,
    student_id: UserId,
    submitted_at: DateTime<Utc>,
}

fn header_from_row(row: &SqliteRow) -> Result<AttemptHeader, StorageError> {
    Ok(AttemptHeader {
        id: attempt_id_from_i64(row.try_get("id").map_err(ser)?)?,
        quiz_id: quiz_id_from_i64(row.try_get("quiz_id").map_err(ser)?)?,
        student_id: user_id_from_i64(row.try_get("student_id").map_err(ser)?)?,
        submitted_at: row.try_get("submitted_at").map_err(ser)?,
    })
}

impl SqliteRepository {
    async fn with_responses(&self, header: AttemptHeader) -> Result<Attempt, StorageError> {
        let rows = sqlx::query("SELECT question_id, option_id FROM responses WHERE attempt_id = ?1")
            .bind(id_to_i64("attempt_id", header.id.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut responses = BTreeMap::new();
        for row in &rows {
            responses.insert(
                question_id_from_i64(row.try_get("question_id").map_err(ser)?)?,
                option_id_from_i64(row.try_get("option_id").map_err(ser)?)?,
            );
        }

        Ok(Attempt {
            id: header.id,
            quiz_id: header.quiz_id,
            student_id: header.student_id,
            responses,
            submitted_at: header.submitted_at,
        })
    }
}

#[async_trait::async_trait]
impl ResponseRepository for SqliteRepository {
    async fn insert_attempt(&self, attempt: NewAttemptRecord) -> Result<AttemptId, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let res = sqlx::query(
            r"
            INSERT INTO attempts (quiz_id, student_id, submitted_at)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(id_to_i64("quiz_id", attempt.quiz_id.value())?)
        .bind(id_to_i64("student_id", attempt.student_id.value())?)
        .bind(attempt.submitted_at)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;
        let attempt_id = res.last_insert_rowid();

        for (question_id, option_id) in attempt.responses {
            sqlx::query(
                r"
                INSERT INTO responses (attempt_id, question_id, option_id)
                VALUES (?1, ?2, ?3)
                ",
            )
            .bind(attempt_id)
            .bind(id_to_i64("question_id", question_id.value())?)
            .bind(id_to_i64("option_id", option_id.value())?)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        attempt_id_from_i64(attempt_id)
    }

    async fn get_attempt(&self, id: AttemptId) -> Result<Option<Attempt>, StorageError> {
        let header = sqlx::query(
            "SELECT id, quiz_id, student_id, submitted_at FROM attempts WHERE id = ?1",
        )
        .bind(id_to_i64("attempt_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .as_ref()
        .map(header_from_row)
        .transpose()?;

        match header {
            Some(header) => self.with_responses(header).await.map(Some),
            None => Ok(None),
        }
    }

    async fn attempts_for_quiz(&self, quiz_id: QuizId) -> Result<Vec<Attempt>, StorageError> {
        let headers = sqlx::query(
            r"
            SELECT id, quiz_id, student_id, submitted_at
            FROM attempts
            WHERE quiz_id = ?1
            ORDER BY submitted_at ASC, id ASC
            ",
        )
        .bind(id_to_i64("quiz_id", quiz_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?
        .iter()
        .map(header_from_row)
        .collect::<Result<Vec<_>, _>>()?;

        let mut attempts = Vec::with_capacity(headers.len());
        for header in headers {
            attempts.push(self.with_responses(header).await?);
        }
        Ok(attempts)
    }

    async fn chosen_option(
        &self,
        attempt: AttemptId,
        question: QuestionId,
    ) -> Result<Option<OptionId>, StorageError> {
        let raw: Option<i64> = sqlx::query(
            "SELECT option_id FROM responses WHERE attempt_id = ?1 AND question_id = ?2",
        )
        .bind(id_to_i64("attempt_id", attempt.value())?)
        .bind(id_to_i64("question_id", question.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .map(|row| row.try_get("option_id").map_err(ser))
        .transpose()?;

        raw.map(option_id_from_i64).transpose()
    }
}
