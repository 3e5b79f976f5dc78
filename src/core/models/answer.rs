use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserAnswer {
    pub id: i32,
    pub run_id: i32,
    pub question_id: i32,
    pub selected_option_id: i32,
    pub created_at: DateTime<Utc>,
}

pub struct Insert {
    pub run_id: i32,
    pub question_id: i32,
    pub selected_option_id: i32,
}

/// One row of the grouped per-option answer counts for a survey.
#[derive(Debug, Clone, FromRow)]
pub struct OptionTally {
    pub question_id: i32,
    pub option_id: i32,
    pub text: String,
    pub position: i32,
    pub answers_count: i64,
}
