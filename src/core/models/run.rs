use crate::core::models::question::QuestionWithOptions;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One attempt of a respondent at a survey. Active while `finished_at`
/// is null; at most one active run exists per (user, survey).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Run {
    pub id: i32,
    pub user_id: i32,
    pub survey_id: i32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Run {
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnswerSubmit {
    pub question_id: i32,
    pub option_id: i32,
}

#[derive(Debug, Serialize)]
pub struct NextQuestion {
    pub run_id: i32,
    pub question: QuestionWithOptions,
}

#[derive(Debug, Serialize)]
pub struct AnswerResult {
    pub run_id: i32,
    pub completed: bool,
    pub question: Option<QuestionWithOptions>,
}
