use serde::Serialize;

use crate::model::ids::OptionId;
use crate::model::quiz::{AnswerOption, Question, Quiz};

/// One question of a graded attempt, with its options and the student's pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultQuestion {
    pub question: Question,
    pub options: Vec<AnswerOption>,
    /// `None` when the student left the question unanswered.
    pub chosen: Option<OptionId>,
}

impl ResultQuestion {
    /// The option flagged correct. If several are flagged, the first wins.
    #[must_use]
    pub fn correct_option(&self) -> Option<&AnswerOption> {
        self.options.iter().find(|o| o.is_correct)
    }

    #[must_use]
    pub fn chosen_option(&self) -> Option<&AnswerOption> {
        let chosen = self.chosen?;
        self.options.iter().find(|o| o.id == chosen)
    }

    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.chosen.is_some()
    }

    /// True only when the chosen id matches the correct option's id.
    #[must_use]
    pub fn is_correct(&self) -> bool {
        match (self.chosen, self.correct_option()) {
            (Some(chosen), Some(correct)) => chosen == correct.id,
            _ => false,
        }
    }
}

/// A quiz together with one attempt's answers, in question order.
///
/// Built per request and never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultDetail {
    pub quiz: Quiz,
    pub questions: Vec<ResultQuestion>,
}

impl ResultDetail {
    #[must_use]
    pub fn score(&self) -> Score {
        score(self)
    }
}

/// Correct answers out of the number of questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Score {
    pub correct: u32,
    pub total: u32,
}

impl Score {
    /// Percentage in `0.0..=100.0`; an empty quiz scores 0.
    #[must_use]
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        f64::from(self.correct) * 100.0 / f64::from(self.total)
    }

    #[must_use]
    pub fn is_perfect(&self) -> bool {
        self.correct == self.total
    }
}

/// Count correctly answered questions. No partial credit.
#[must_use]
pub fn score(result: &ResultDetail) -> Score {
    let correct = result.questions.iter().filter(|q| q.is_correct()).count();
    Score {
        correct: u32::try_from(correct).unwrap_or(u32::MAX),
        total: u32::try_from(result.questions.len()).unwrap_or(u32::MAX),
    }
}
