use std::collections::BTreeMap;

use quiz_core::model::{AttemptId, QuizId, UserId};
use quiz_core::time::fixed_now;
use storage::repository::{
    NewAttemptRecord, NewOptionRecord, NewQuestionRecord, NewQuizRecord, OptionRepository,
    PreferenceRepository, QuestionRepository, QuizRepository, ResponseRepository, StorageError,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn four_choices(correct: usize) -> Vec<NewOptionRecord> {
    ["alpha", "beta", "gamma", "delta"]
        .iter()
        .enumerate()
        .map(|(i, text)| NewOptionRecord {
            text: (*text).to_string(),
            is_correct: i == correct,
        })
        .collect()
}

fn quiz_record(author: u64, title: &str, questions: &[&str]) -> NewQuizRecord {
    NewQuizRecord {
        title: title.to_string(),
        description: Some("seeded".into()),
        author_id: UserId::new(author),
        created_at: fixed_now(),
        questions: questions
            .iter()
            .map(|text| NewQuestionRecord {
                text: (*text).to_string(),
                explanation: None,
                options: four_choices(2),
            })
            .collect(),
    }
}

#[tokio::test]
async fn sqlite_roundtrip_preserves_question_and_option_order() {
    let repo = connect("memdb_quiz_order").await;

    let quiz_id = repo
        .insert_new_quiz(quiz_record(1, "Greek letters", &["third", "first", "second"]))
        .await
        .expect("insert quiz");

    let quiz = repo.get_quiz(quiz_id).await.unwrap().expect("quiz exists");
    assert_eq!(quiz.title(), "Greek letters");
    assert_eq!(quiz.description(), Some("seeded"));
    assert!(!quiz.is_hidden());
    assert_eq!(quiz.created_at(), fixed_now());

    let questions = repo.questions_for_quiz(quiz_id).await.unwrap();
    let texts: Vec<_> = questions.iter().map(|q| q.text.as_str()).collect();
    assert_eq!(texts, ["third", "first", "second"]);

    let options = repo.options_for_question(questions[0].id).await.unwrap();
    let texts: Vec<_> = options.iter().map(|o| o.text.as_str()).collect();
    assert_eq!(texts, ["alpha", "beta", "gamma", "delta"]);
    assert_eq!(options.iter().filter(|o| o.is_correct).count(), 1);
    assert!(options[2].is_correct);
}

#[tokio::test]
async fn sqlite_missing_rows_are_none_or_empty() {
    let repo = connect("memdb_missing").await;

    assert!(repo.get_quiz(QuizId::new(77)).await.unwrap().is_none());
    assert!(repo.questions_for_quiz(QuizId::new(77)).await.unwrap().is_empty());
    assert!(repo.get_attempt(AttemptId::new(5)).await.unwrap().is_none());

    let err = repo.set_hidden(QuizId::new(77), true).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_hidden_flag_filters_visible_listing() {
    let repo = connect("memdb_hidden").await;

    let a = repo.insert_new_quiz(quiz_record(1, "A", &["q"])).await.unwrap();
    let b = repo.insert_new_quiz(quiz_record(2, "B", &["q"])).await.unwrap();
    repo.set_hidden(a, true).await.unwrap();

    let visible: Vec<_> = repo.list_visible().await.unwrap().iter().map(|q| q.id()).collect();
    assert_eq!(visible, vec![b]);

    let authored = repo.list_by_author(UserId::new(1)).await.unwrap();
    assert_eq!(authored.len(), 1);
    assert!(authored[0].is_hidden());

    repo.set_hidden(a, false).await.unwrap();
    assert_eq!(repo.list_visible().await.unwrap().len(), 2);
}

#[tokio::test]
async fn sqlite_attempt_records_responses() {
    let repo = connect("memdb_attempts").await;

    let quiz_id = repo
        .insert_new_quiz(quiz_record(1, "Attempted", &["one", "two"]))
        .await
        .unwrap();
    let questions = repo.questions_for_quiz(quiz_id).await.unwrap();
    let options = repo.options_for_question(questions[0].id).await.unwrap();

    let attempt_id = repo
        .insert_attempt(NewAttemptRecord {
            quiz_id,
            student_id: UserId::new(42),
            responses: BTreeMap::from([(questions[0].id, options[1].id)]),
            submitted_at: fixed_now(),
        })
        .await
        .unwrap();

    assert_eq!(
        repo.chosen_option(attempt_id, questions[0].id).await.unwrap(),
        Some(options[1].id)
    );
    assert_eq!(repo.chosen_option(attempt_id, questions[1].id).await.unwrap(), None);

    let attempt = repo.get_attempt(attempt_id).await.unwrap().expect("attempt");
    assert_eq!(attempt.student_id, UserId::new(42));
    assert_eq!(attempt.responses.len(), 1);

    let all = repo.attempts_for_quiz(quiz_id).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, attempt_id);
}

#[tokio::test]
async fn sqlite_preferences_upsert() {
    let repo = connect("memdb_prefs").await;

    assert_eq!(repo.get_preference("hidden_quizzes.1").await.unwrap(), None);
    repo.put_preference("hidden_quizzes.1", "3,5").await.unwrap();
    repo.put_preference("hidden_quizzes.1", "3,5,8").await.unwrap();
    assert_eq!(
        repo.get_preference("hidden_quizzes.1").await.unwrap().as_deref(),
        Some("3,5,8")
    );
}
