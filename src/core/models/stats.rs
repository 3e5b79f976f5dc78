use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct AnswerOptionStats {
    pub option_id: i32,
    pub text: String,
    pub answers_count: i64,
}

#[derive(Debug, Serialize)]
pub struct QuestionStats {
    pub question_id: i32,
    pub text: String,
    pub options: Vec<AnswerOptionStats>,
    pub top_option_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct SurveyStats {
    pub total_runs: i64,
    pub avg_duration_seconds: Option<f64>,
    pub questions: Vec<QuestionStats>,
}
