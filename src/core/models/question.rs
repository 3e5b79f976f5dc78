use crate::core::models::option::AnswerOption;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Question {
    pub id: i32,
    pub survey_id: i32,
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
    pub survey_id: i32,
    pub text: String,
    pub position: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Patch {
    pub text: Option<String>,
    pub position: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct QuestionWithOptions {
    pub id: i32,
    pub text: String,
    pub position: i32,
    pub options: Vec<AnswerOption>,
}

impl QuestionWithOptions {
    pub fn new(question: Question, options: Vec<AnswerOption>) -> Self {
        Self {
            id: question.id,
            text: question.text,
            position: question.position,
            options,
        }
    }
}
