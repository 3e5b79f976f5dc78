use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AnswerOption {
    pub id: i32,
    #[serde(skip_serializing)]
    pub question_id: i32,
    pub text: String,
    pub position: i32,
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Create {
    pub text: String,
    pub position: i32,
}

pub struct Insert {
    pub question_id: i32,
    pub text: String,
    pub position: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Patch {
    pub text: Option<String>,
    pub position: Option<i32>,
}
