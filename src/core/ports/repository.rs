use crate::core::models::{
    answer::{Insert as AnswerInsert, OptionTally, UserAnswer},
    option::{AnswerOption, Insert as OptionInsert, Patch as OptionPatch},
    question::{Insert as QuestionInsert, Patch as QuestionPatch, Question},
    run::Run,
    survey::{Insert as SurveyInsert, Survey},
};
use crate::error::Error;
use crate::request::Pagination;

pub trait SurveyStore {
    async fn insert(&mut self, data: SurveyInsert) -> Result<i32, Error>;
    async fn get(&mut self, id: i32) -> Result<Option<Survey>, Error>;
    async fn get_owned(&mut self, id: i32, author_id: i32) -> Result<Option<Survey>, Error>;
    async fn query_by_author(&mut self, author_id: i32, pagination: Option<Pagination>) -> Result<Vec<Survey>, Error>;
    async fn count_by_author(&mut self, author_id: i32) -> Result<i64, Error>;
    async fn update_title(&mut self, id: i32, title: &str) -> Result<(), Error>;
    async fn delete(&mut self, id: i32) -> Result<(), Error>;
    async fn has_runs(&mut self, id: i32) -> Result<bool, Error>;
}

pub trait QuestionStore {
    async fn insert(&mut self, data: QuestionInsert) -> Result<i32, Error>;
    async fn get(&mut self, id: i32) -> Result<Option<Question>, Error>;
    async fn get_in_survey(&mut self, id: i32, survey_id: i32) -> Result<Option<Question>, Error>;
    /// Questions of a survey ordered by position ascending.
    async fn query_by_survey(&mut self, survey_id: i32) -> Result<Vec<Question>, Error>;
    async fn count_by_survey(&mut self, survey_id: i32) -> Result<i64, Error>;
    async fn exists_position(&mut self, survey_id: i32, position: i32, exclude: Option<i32>) -> Result<bool, Error>;
    async fn update(&mut self, id: i32, patch: QuestionPatch) -> Result<(), Error>;
    async fn delete(&mut self, id: i32) -> Result<(), Error>;
    async fn has_answers(&mut self, id: i32) -> Result<bool, Error>;
}

pub trait OptionStore {
    async fn insert(&mut self, data: OptionInsert) -> Result<i32, Error>;
    async fn get(&mut self, id: i32) -> Result<Option<AnswerOption>, Error>;
    async fn get_in_question(&mut self, id: i32, question_id: i32) -> Result<Option<AnswerOption>, Error>;
    /// Options of a question ordered by position ascending.
    async fn query_by_question(&mut self, question_id: i32) -> Result<Vec<AnswerOption>, Error>;
    /// Options of every question of a survey, ordered by question position
    /// then option position.
    async fn query_by_survey(&mut self, survey_id: i32) -> Result<Vec<AnswerOption>, Error>;
    async fn exists_position(&mut self, question_id: i32, position: i32, exclude: Option<i32>) -> Result<bool, Error>;
    async fn update(&mut self, id: i32, patch: OptionPatch) -> Result<(), Error>;
    async fn delete(&mut self, id: i32) -> Result<(), Error>;
    async fn has_answers(&mut self, id: i32) -> Result<bool, Error>;
}

pub trait RunStore {
    async fn get_active(&mut self, survey_id: i32, user_id: i32) -> Result<Option<Run>, Error>;
    /// The respondent's most recently finished run for the survey, if any.
    async fn get_last_finished(&mut self, survey_id: i32, user_id: i32) -> Result<Option<Run>, Error>;
    /// Insert-if-absent keyed on the partial uniqueness constraint
    /// "one unfinished run per (user, survey)". Returns None when a
    /// concurrent writer already holds the active run.
    async fn insert_active(&mut self, survey_id: i32, user_id: i32) -> Result<Option<Run>, Error>;
    /// Sets finished_at once; a no-op for runs already finished.
    async fn mark_finished(&mut self, run_id: i32) -> Result<(), Error>;
    async fn count_finished(&mut self, survey_id: i32) -> Result<i64, Error>;
    async fn avg_duration_seconds(&mut self, survey_id: i32) -> Result<Option<f64>, Error>;
}

pub trait AnswerStore {
    /// Fails with `Error::AlreadyAnswered` when the run already holds an
    /// answer for the question (unique (run_id, question_id)).
    async fn insert(&mut self, data: AnswerInsert) -> Result<UserAnswer, Error>;
    async fn answered_question_ids(&mut self, run_id: i32) -> Result<Vec<i32>, Error>;
    async fn count_by_run(&mut self, run_id: i32) -> Result<i64, Error>;
    async fn exists(&mut self, run_id: i32, question_id: i32) -> Result<bool, Error>;
    async fn option_tallies(&mut self, survey_id: i32) -> Result<Vec<OptionTally>, Error>;
}

pub trait Store: SurveyStore + QuestionStore + OptionStore + RunStore + AnswerStore {}

pub trait TxStore: Store {
    async fn commit(self) -> Result<(), Error>;
    async fn rollback(self) -> Result<(), Error>;
}
