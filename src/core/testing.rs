//! In-memory store used by the service tests. Mirrors the constraint
//! behavior of the real schema: cascade deletes, the partial "one active
//! run" uniqueness, and the unique (run, question) answer index.

use crate::core::models::{
    answer::{Insert as AnswerInsert, OptionTally, UserAnswer},
    option::{AnswerOption, Insert as OptionInsert, Patch as OptionPatch},
    question::{Insert as QuestionInsert, Patch as QuestionPatch, Question},
    run::Run,
    survey::{Insert as SurveyInsert, Survey},
};
use crate::core::ports::repository::{AnswerStore, OptionStore, QuestionStore, RunStore, Store, SurveyStore, TxStore};
use crate::error::Error;
use crate::request::Pagination;
use chrono::{Duration, Utc};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Default)]
struct Inner {
    next_id: i32,
    surveys: Vec<Survey>,
    questions: Vec<Question>,
    options: Vec<AnswerOption>,
    runs: Vec<Run>,
    answers: Vec<UserAnswer>,
    race_next_insert: bool,
}

impl Inner {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn push_active_run(&mut self, survey_id: i32, user_id: i32) -> Run {
        let run = Run {
            id: self.next_id(),
            user_id,
            survey_id,
            started_at: Utc::now(),
            finished_at: None,
        };
        self.runs.push(run.clone());
        run
    }
}

/// Clones share state, so a test can keep a handle while services consume
/// the store by value.
#[derive(Clone, Default)]
pub struct MemStore {
    inner: Rc<RefCell<Inner>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_survey(&self, title: &str, author_id: i32) -> i32 {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id();
        let now = Utc::now();
        inner.surveys.push(Survey {
            id,
            title: title.to_owned(),
            author_id,
            created_at: now,
            updated_at: now,
        });
        id
    }

    pub fn add_question(&self, survey_id: i32, text: &str, position: i32) -> i32 {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id();
        let now = Utc::now();
        inner.questions.push(Question {
            id,
            survey_id,
            text: text.to_owned(),
            position,
            created_at: now,
            updated_at: now,
        });
        id
    }

    pub fn add_option(&self, question_id: i32, text: &str, position: i32) -> i32 {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id();
        let now = Utc::now();
        inner.options.push(AnswerOption {
            id,
            question_id,
            text: text.to_owned(),
            position,
            created_at: now,
            updated_at: now,
        });
        id
    }

    /// A run started `started_secs_ago` seconds ago, finished after
    /// `duration_secs` when given.
    pub fn add_run(&self, survey_id: i32, user_id: i32, started_secs_ago: i64, duration_secs: Option<i64>) -> i32 {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id();
        let started_at = Utc::now() - Duration::seconds(started_secs_ago);
        inner.runs.push(Run {
            id,
            user_id,
            survey_id,
            started_at,
            finished_at: duration_secs.map(|d| started_at + Duration::seconds(d)),
        });
        id
    }

    /// Makes the next active-run insert lose its race: the row appears as
    /// if written by a concurrent request and the insert reports conflict.
    pub fn race_next_active_insert(&self) {
        self.inner.borrow_mut().race_next_insert = true;
    }

    pub fn survey(&self, id: i32) -> Option<Survey> {
        self.inner.borrow().surveys.iter().find(|s| s.id == id).cloned()
    }

    pub fn run(&self, id: i32) -> Run {
        self.inner.borrow().runs.iter().find(|r| r.id == id).cloned().expect("run exists")
    }

    pub fn active_run_count(&self, survey_id: i32, user_id: i32) -> usize {
        self.inner
            .borrow()
            .runs
            .iter()
            .filter(|r| r.survey_id == survey_id && r.user_id == user_id && r.finished_at.is_none())
            .count()
    }

    pub fn answer_count(&self, run_id: i32) -> usize {
        self.inner.borrow().answers.iter().filter(|a| a.run_id == run_id).count()
    }

    pub fn survey_answer_count(&self, survey_id: i32) -> usize {
        let inner = self.inner.borrow();
        inner
            .answers
            .iter()
            .filter(|a| inner.questions.iter().any(|q| q.id == a.question_id && q.survey_id == survey_id))
            .count()
    }

    pub fn question_count(&self, survey_id: i32) -> usize {
        self.inner.borrow().questions.iter().filter(|q| q.survey_id == survey_id).count()
    }

    pub fn option_count(&self, question_id: i32) -> usize {
        self.inner.borrow().options.iter().filter(|o| o.question_id == question_id).count()
    }
}

impl SurveyStore for MemStore {
    async fn insert(&mut self, data: SurveyInsert) -> Result<i32, Error> {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id();
        let now = Utc::now();
        inner.surveys.push(Survey {
            id,
            title: data.title,
            author_id: data.author_id,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn get(&mut self, id: i32) -> Result<Option<Survey>, Error> {
        Ok(self.inner.borrow().surveys.iter().find(|s| s.id == id).cloned())
    }

    async fn get_owned(&mut self, id: i32, author_id: i32) -> Result<Option<Survey>, Error> {
        Ok(self
            .inner
            .borrow()
            .surveys
            .iter()
            .find(|s| s.id == id && s.author_id == author_id)
            .cloned())
    }

    async fn query_by_author(&mut self, author_id: i32, pagination: Option<Pagination>) -> Result<Vec<Survey>, Error> {
        let mut surveys: Vec<Survey> = self.inner.borrow().surveys.iter().filter(|s| s.author_id == author_id).cloned().collect();
        surveys.sort_by_key(|s| s.id);
        if let Some(p) = pagination {
            let offset = ((p.page - 1) * p.size).max(0) as usize;
            surveys = surveys.into_iter().skip(offset).take(p.size.max(0) as usize).collect();
        }
        Ok(surveys)
    }

    async fn count_by_author(&mut self, author_id: i32) -> Result<i64, Error> {
        Ok(self.inner.borrow().surveys.iter().filter(|s| s.author_id == author_id).count() as i64)
    }

    async fn update_title(&mut self, id: i32, title: &str) -> Result<(), Error> {
        let mut inner = self.inner.borrow_mut();
        if let Some(survey) = inner.surveys.iter_mut().find(|s| s.id == id) {
            survey.title = title.to_owned();
            survey.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete(&mut self, id: i32) -> Result<(), Error> {
        let mut inner = self.inner.borrow_mut();
        let question_ids: Vec<i32> = inner.questions.iter().filter(|q| q.survey_id == id).map(|q| q.id).collect();
        inner.options.retain(|o| !question_ids.contains(&o.question_id));
        inner.questions.retain(|q| q.survey_id != id);
        inner.surveys.retain(|s| s.id != id);
        Ok(())
    }

    async fn has_runs(&mut self, id: i32) -> Result<bool, Error> {
        Ok(self.inner.borrow().runs.iter().any(|r| r.survey_id == id))
    }
}

impl QuestionStore for MemStore {
    async fn insert(&mut self, data: QuestionInsert) -> Result<i32, Error> {
        let mut inner = self.inner.borrow_mut();
        if inner.questions.iter().any(|q| q.survey_id == data.survey_id && q.position == data.position) {
            return Err(Error::DuplicatePosition);
        }
        let id = inner.next_id();
        let now = Utc::now();
        inner.questions.push(Question {
            id,
            survey_id: data.survey_id,
            text: data.text,
            position: data.position,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn get(&mut self, id: i32) -> Result<Option<Question>, Error> {
        Ok(self.inner.borrow().questions.iter().find(|q| q.id == id).cloned())
    }

    async fn get_in_survey(&mut self, id: i32, survey_id: i32) -> Result<Option<Question>, Error> {
        Ok(self
            .inner
            .borrow()
            .questions
            .iter()
            .find(|q| q.id == id && q.survey_id == survey_id)
            .cloned())
    }

    async fn query_by_survey(&mut self, survey_id: i32) -> Result<Vec<Question>, Error> {
        let mut questions: Vec<Question> = self.inner.borrow().questions.iter().filter(|q| q.survey_id == survey_id).cloned().collect();
        questions.sort_by_key(|q| q.position);
        Ok(questions)
    }

    async fn count_by_survey(&mut self, survey_id: i32) -> Result<i64, Error> {
        Ok(self.inner.borrow().questions.iter().filter(|q| q.survey_id == survey_id).count() as i64)
    }

    async fn exists_position(&mut self, survey_id: i32, position: i32, exclude: Option<i32>) -> Result<bool, Error> {
        Ok(self
            .inner
            .borrow()
            .questions
            .iter()
            .any(|q| q.survey_id == survey_id && q.position == position && exclude.map_or(true, |e| q.id != e)))
    }

    async fn update(&mut self, id: i32, patch: QuestionPatch) -> Result<(), Error> {
        let mut inner = self.inner.borrow_mut();
        if let Some(question) = inner.questions.iter_mut().find(|q| q.id == id) {
            if let Some(text) = patch.text {
                question.text = text;
            }
            if let Some(position) = patch.position {
                question.position = position;
            }
            question.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete(&mut self, id: i32) -> Result<(), Error> {
        let mut inner = self.inner.borrow_mut();
        if inner.answers.iter().any(|a| a.question_id == id) {
            return Err(Error::Dependent("question"));
        }
        inner.options.retain(|o| o.question_id != id);
        inner.questions.retain(|q| q.id != id);
        Ok(())
    }

    async fn has_answers(&mut self, id: i32) -> Result<bool, Error> {
        Ok(self.inner.borrow().answers.iter().any(|a| a.question_id == id))
    }
}

impl OptionStore for MemStore {
    async fn insert(&mut self, data: OptionInsert) -> Result<i32, Error> {
        let mut inner = self.inner.borrow_mut();
        if inner.options.iter().any(|o| o.question_id == data.question_id && o.position == data.position) {
            return Err(Error::DuplicatePosition);
        }
        let id = inner.next_id();
        let now = Utc::now();
        inner.options.push(AnswerOption {
            id,
            question_id: data.question_id,
            text: data.text,
            position: data.position,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn get(&mut self, id: i32) -> Result<Option<AnswerOption>, Error> {
        Ok(self.inner.borrow().options.iter().find(|o| o.id == id).cloned())
    }

    async fn get_in_question(&mut self, id: i32, question_id: i32) -> Result<Option<AnswerOption>, Error> {
        Ok(self
            .inner
            .borrow()
            .options
            .iter()
            .find(|o| o.id == id && o.question_id == question_id)
            .cloned())
    }

    async fn query_by_question(&mut self, question_id: i32) -> Result<Vec<AnswerOption>, Error> {
        let mut options: Vec<AnswerOption> = self.inner.borrow().options.iter().filter(|o| o.question_id == question_id).cloned().collect();
        options.sort_by_key(|o| o.position);
        Ok(options)
    }

    async fn query_by_survey(&mut self, survey_id: i32) -> Result<Vec<AnswerOption>, Error> {
        let inner = self.inner.borrow();
        let mut questions: Vec<&Question> = inner.questions.iter().filter(|q| q.survey_id == survey_id).collect();
        questions.sort_by_key(|q| q.position);
        let mut options = Vec::new();
        for question in questions {
            let mut of_question: Vec<AnswerOption> = inner.options.iter().filter(|o| o.question_id == question.id).cloned().collect();
            of_question.sort_by_key(|o| o.position);
            options.extend(of_question);
        }
        Ok(options)
    }

    async fn exists_position(&mut self, question_id: i32, position: i32, exclude: Option<i32>) -> Result<bool, Error> {
        Ok(self
            .inner
            .borrow()
            .options
            .iter()
            .any(|o| o.question_id == question_id && o.position == position && exclude.map_or(true, |e| o.id != e)))
    }

    async fn update(&mut self, id: i32, patch: OptionPatch) -> Result<(), Error> {
        let mut inner = self.inner.borrow_mut();
        if let Some(option) = inner.options.iter_mut().find(|o| o.id == id) {
            if let Some(text) = patch.text {
                option.text = text;
            }
            if let Some(position) = patch.position {
                option.position = position;
            }
            option.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete(&mut self, id: i32) -> Result<(), Error> {
        let mut inner = self.inner.borrow_mut();
        if inner.answers.iter().any(|a| a.selected_option_id == id) {
            return Err(Error::Dependent("option"));
        }
        inner.options.retain(|o| o.id != id);
        Ok(())
    }

    async fn has_answers(&mut self, id: i32) -> Result<bool, Error> {
        Ok(self.inner.borrow().answers.iter().any(|a| a.selected_option_id == id))
    }
}

impl RunStore for MemStore {
    async fn get_active(&mut self, survey_id: i32, user_id: i32) -> Result<Option<Run>, Error> {
        Ok(self
            .inner
            .borrow()
            .runs
            .iter()
            .find(|r| r.survey_id == survey_id && r.user_id == user_id && r.finished_at.is_none())
            .cloned())
    }

    async fn get_last_finished(&mut self, survey_id: i32, user_id: i32) -> Result<Option<Run>, Error> {
        Ok(self
            .inner
            .borrow()
            .runs
            .iter()
            .filter(|r| r.survey_id == survey_id && r.user_id == user_id && r.finished_at.is_some())
            .max_by_key(|r| r.finished_at)
            .cloned())
    }

    async fn insert_active(&mut self, survey_id: i32, user_id: i32) -> Result<Option<Run>, Error> {
        let mut inner = self.inner.borrow_mut();
        if inner.race_next_insert {
            inner.race_next_insert = false;
            inner.push_active_run(survey_id, user_id);
            return Ok(None);
        }
        if inner
            .runs
            .iter()
            .any(|r| r.survey_id == survey_id && r.user_id == user_id && r.finished_at.is_none())
        {
            return Ok(None);
        }
        Ok(Some(inner.push_active_run(survey_id, user_id)))
    }

    async fn mark_finished(&mut self, run_id: i32) -> Result<(), Error> {
        let mut inner = self.inner.borrow_mut();
        if let Some(run) = inner.runs.iter_mut().find(|r| r.id == run_id) {
            if run.finished_at.is_none() {
                run.finished_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn count_finished(&mut self, survey_id: i32) -> Result<i64, Error> {
        Ok(self
            .inner
            .borrow()
            .runs
            .iter()
            .filter(|r| r.survey_id == survey_id && r.finished_at.is_some())
            .count() as i64)
    }

    async fn avg_duration_seconds(&mut self, survey_id: i32) -> Result<Option<f64>, Error> {
        let inner = self.inner.borrow();
        let durations: Vec<f64> = inner
            .runs
            .iter()
            .filter(|r| r.survey_id == survey_id)
            .filter_map(|r| r.finished_at.map(|f| (f - r.started_at).num_milliseconds() as f64 / 1000.0))
            .collect();
        if durations.is_empty() {
            return Ok(None);
        }
        Ok(Some(durations.iter().sum::<f64>() / durations.len() as f64))
    }
}

impl AnswerStore for MemStore {
    async fn insert(&mut self, data: AnswerInsert) -> Result<UserAnswer, Error> {
        let mut inner = self.inner.borrow_mut();
        if inner.answers.iter().any(|a| a.run_id == data.run_id && a.question_id == data.question_id) {
            return Err(Error::AlreadyAnswered);
        }
        let answer = UserAnswer {
            id: inner.next_id(),
            run_id: data.run_id,
            question_id: data.question_id,
            selected_option_id: data.selected_option_id,
            created_at: Utc::now(),
        };
        inner.answers.push(answer.clone());
        Ok(answer)
    }

    async fn answered_question_ids(&mut self, run_id: i32) -> Result<Vec<i32>, Error> {
        Ok(self
            .inner
            .borrow()
            .answers
            .iter()
            .filter(|a| a.run_id == run_id)
            .map(|a| a.question_id)
            .collect())
    }

    async fn count_by_run(&mut self, run_id: i32) -> Result<i64, Error> {
        Ok(self.inner.borrow().answers.iter().filter(|a| a.run_id == run_id).count() as i64)
    }

    async fn exists(&mut self, run_id: i32, question_id: i32) -> Result<bool, Error> {
        Ok(self
            .inner
            .borrow()
            .answers
            .iter()
            .any(|a| a.run_id == run_id && a.question_id == question_id))
    }

    async fn option_tallies(&mut self, survey_id: i32) -> Result<Vec<OptionTally>, Error> {
        let inner = self.inner.borrow();
        let mut questions: Vec<&Question> = inner.questions.iter().filter(|q| q.survey_id == survey_id).collect();
        questions.sort_by_key(|q| q.position);
        let mut tallies = Vec::new();
        for question in questions {
            let mut options: Vec<&AnswerOption> = inner.options.iter().filter(|o| o.question_id == question.id).collect();
            options.sort_by_key(|o| o.position);
            for option in options {
                tallies.push(OptionTally {
                    question_id: question.id,
                    option_id: option.id,
                    text: option.text.clone(),
                    position: option.position,
                    answers_count: inner.answers.iter().filter(|a| a.selected_option_id == option.id).count() as i64,
                });
            }
        }
        Ok(tallies)
    }
}

impl Store for MemStore {}

impl TxStore for MemStore {
    async fn commit(self) -> Result<(), Error> {
        Ok(())
    }

    async fn rollback(self) -> Result<(), Error> {
        Ok(())
    }
}
