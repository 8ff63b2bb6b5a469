mod attempt;
pub mod draft;
mod ids;
mod quiz;
mod result;
mod user;

pub use attempt::Attempt;
pub use draft::{DraftError, DraftErrors, QuestionDraft, QuizDraft, ValidDraft, ValidQuestion};
pub use ids::{AttemptId, OptionId, ParseIdError, QuestionId, QuizId, UserId};
pub use quiz::{AnswerOption, Question, Quiz, QuizError};
pub use result::{ResultDetail, ResultQuestion, Score, score};
pub use user::{Caller, Role};
