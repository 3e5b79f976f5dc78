use crate::core::models::question::QuestionWithOptions;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Survey {
    pub id: i32,
    pub title: String,
    pub author_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Create {
    pub title: String,
}

pub struct Insert {
    pub title: String,
    pub author_id: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub title: String,
}

/// Survey with its questions and their options nested, ordered by position.
#[derive(Debug, Serialize)]
pub struct SurveyDetail {
    pub id: i32,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub questions: Vec<QuestionWithOptions>,
}
