use std::sync::Arc;

use quiz_core::model::{AttemptId, QuizId, ResultDetail, ResultQuestion};
use storage::repository::{
    OptionRepository, QuestionRepository, QuizRepository, ResponseRepository, Storage,
};

use crate::error::{ResultError, StorageContext};

/// Rebuilds a graded view of one attempt from the normalized stores.
///
/// Read-only: it never writes, and an unanswered question or a question
/// without options is ordinary data, not an error.
#[derive(Clone)]
pub struct ResultAssembler {
    quizzes: Arc<dyn QuizRepository>,
    questions: Arc<dyn QuestionRepository>,
    options: Arc<dyn OptionRepository>,
    responses: Arc<dyn ResponseRepository>,
}

impl ResultAssembler {
    #[must_use]
    pub fn new(
        quizzes: Arc<dyn QuizRepository>,
        questions: Arc<dyn QuestionRepository>,
        options: Arc<dyn OptionRepository>,
        responses: Arc<dyn ResponseRepository>,
    ) -> Self {
        Self {
            quizzes,
            questions,
            options,
            responses,
        }
    }

    #[must_use]
    pub fn from_storage(storage: &Storage) -> Self {
        Self::new(
            Arc::clone(&storage.quizzes),
            Arc::clone(&storage.questions),
            Arc::clone(&storage.options),
            Arc::clone(&storage.responses),
        )
    }

    /// Combine a quiz, its questions and options, and the answers recorded
    /// for `attempt_id` into one report, keeping the stored question order.
    ///
    /// # Errors
    ///
    /// Returns `ResultError::QuizNotFound` if the quiz does not exist.
    /// Returns `ResultError::Storage` if any store call fails.
    pub async fn assemble(
        &self,
        attempt_id: AttemptId,
        quiz_id: QuizId,
    ) -> Result<ResultDetail, ResultError> {
        let quiz = self
            .quizzes
            .get_quiz(quiz_id)
            .await
            .context("get_quiz", format!("quiz {quiz_id}"))?
            .ok_or(ResultError::QuizNotFound(quiz_id))?;

        let questions = self
            .questions
            .questions_for_quiz(quiz_id)
            .await
            .context("questions_for_quiz", format!("quiz {quiz_id}"))?;

        let mut assembled = Vec::with_capacity(questions.len());
        for question in questions {
            let options = self
                .options
                .options_for_question(question.id)
                .await
                .context("options_for_question", format!("question {}", question.id))?;
            let chosen = self
                .responses
                .chosen_option(attempt_id, question.id)
                .await
                .context(
                    "chosen_option",
                    format!("attempt {attempt_id}, question {}", question.id),
                )?;

            assembled.push(ResultQuestion {
                question,
                options,
                chosen,
            });
        }

        tracing::debug!(
            %quiz_id,
            %attempt_id,
            questions = assembled.len(),
            "assembled attempt result"
        );

        Ok(ResultDetail {
            quiz,
            questions: assembled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use quiz_core::model::{
        AnswerOption, OptionId, Question, QuestionId, Quiz, Score, UserId,
    };
    use quiz_core::time::fixed_now;
    use storage::repository::{
        InMemoryRepository, NewAttemptRecord, NewOptionRecord, NewQuestionRecord, NewQuizRecord,
        StorageError,
    };

    fn record(questions: usize) -> NewQuizRecord {
        NewQuizRecord {
            title: "Capitals".into(),
            description: None,
            author_id: UserId::new(1),
            created_at: fixed_now(),
            questions: (0..questions)
                .map(|i| NewQuestionRecord {
                    text: format!("Q{i}"),
                    explanation: Some(format!("because {i}")),
                    options: (0..4)
                        .map(|n| NewOptionRecord {
                            text: format!("choice {n}"),
                            is_correct: n == 0,
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn assembles_every_question_in_stored_order() {
        let repo = InMemoryRepository::new();
        let quiz_id = repo.insert_new_quiz(record(3)).await.unwrap();
        let questions = repo.questions_for_quiz(quiz_id).await.unwrap();
        let first_options = repo.options_for_question(questions[0].id).await.unwrap();

        let attempt_id = repo
            .insert_attempt(NewAttemptRecord {
                quiz_id,
                student_id: UserId::new(5),
                responses: BTreeMap::from([(questions[0].id, first_options[0].id)]),
                submitted_at: fixed_now(),
            })
            .await
            .unwrap();

        let assembler = ResultAssembler::from_storage(&Storage::from_repository(repo));
        let result = assembler.assemble(attempt_id, quiz_id).await.unwrap();

        assert_eq!(result.quiz.id(), quiz_id);
        let ids: Vec<_> = result.questions.iter().map(|q| q.question.id).collect();
        let expected: Vec<_> = questions.iter().map(|q| q.id).collect();
        assert_eq!(ids, expected);
        assert!(result.questions.iter().all(|q| q.options.len() == 4));
        assert_eq!(result.questions[0].chosen, Some(first_options[0].id));
        assert_eq!(result.questions[1].chosen, None);
        assert_eq!(result.score(), Score { correct: 1, total: 3 });
    }

    #[tokio::test]
    async fn quiz_without_questions_yields_empty_result() {
        let repo = InMemoryRepository::new();
        let quiz_id = repo.insert_new_quiz(record(0)).await.unwrap();

        let assembler = ResultAssembler::from_storage(&Storage::from_repository(repo));
        let result = assembler.assemble(AttemptId::new(1), quiz_id).await.unwrap();

        assert!(result.questions.is_empty());
        assert_eq!(result.score(), Score { correct: 0, total: 0 });
    }

    #[tokio::test]
    async fn question_without_options_is_kept() {
        let repo = InMemoryRepository::new();
        let quiz = Quiz::from_persisted(
            QuizId::new(10),
            "Sparse",
            None,
            UserId::new(1),
            false,
            fixed_now(),
        )
        .unwrap();
        repo.put_quiz(quiz).unwrap();
        repo.put_question(
            Question {
                id: QuestionId::new(11),
                quiz_id: QuizId::new(10),
                text: "no options yet".into(),
                explanation: None,
            },
            Vec::new(),
        )
        .unwrap();
        repo.put_question(
            Question {
                id: QuestionId::new(12),
                quiz_id: QuizId::new(10),
                text: "two correct".into(),
                explanation: None,
            },
            vec![
                AnswerOption {
                    id: OptionId::new(13),
                    question_id: QuestionId::new(12),
                    text: "a".into(),
                    is_correct: true,
                },
                AnswerOption {
                    id: OptionId::new(14),
                    question_id: QuestionId::new(12),
                    text: "b".into(),
                    is_correct: true,
                },
            ],
        )
        .unwrap();

        let assembler = ResultAssembler::from_storage(&Storage::from_repository(repo));
        let result = assembler
            .assemble(AttemptId::new(99), QuizId::new(10))
            .await
            .unwrap();

        assert_eq!(result.questions.len(), 2);
        assert!(result.questions[0].options.is_empty());
        assert_eq!(
            result.questions[1].correct_option().map(|o| o.id),
            Some(OptionId::new(13))
        );
    }

    #[tokio::test]
    async fn missing_quiz_is_not_found() {
        let assembler = ResultAssembler::from_storage(&Storage::in_memory());
        let err = assembler
            .assemble(AttemptId::new(1), QuizId::new(404))
            .await
            .unwrap_err();
        assert!(matches!(err, ResultError::QuizNotFound(id) if id == QuizId::new(404)));
    }

    struct BrokenOptions;

    #[async_trait]
    impl OptionRepository for BrokenOptions {
        async fn options_for_question(
            &self,
            _question_id: QuestionId,
        ) -> Result<Vec<AnswerOption>, StorageError> {
            Err(StorageError::Connection("socket closed".into()))
        }
    }

    #[tokio::test]
    async fn storage_failure_carries_operation_and_ids() {
        let repo = InMemoryRepository::new();
        let quiz_id = repo.insert_new_quiz(record(1)).await.unwrap();
        let question_id = repo.questions_for_quiz(quiz_id).await.unwrap()[0].id;

        let assembler = ResultAssembler::new(
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(BrokenOptions),
            Arc::new(repo),
        );
        let err = assembler
            .assemble(AttemptId::new(1), quiz_id)
            .await
            .unwrap_err();

        let failure = match err {
            ResultError::Storage(failure) => failure,
            other => panic!("expected storage failure, got {other:?}"),
        };
        assert_eq!(failure.operation, "options_for_question");
        assert_eq!(failure.target, format!("question {question_id}"));
        assert!(matches!(failure.source, StorageError::Connection(_)));
    }
}
