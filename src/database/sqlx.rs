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
use sqlx::pool::PoolConnection;
use sqlx::{query, query_as, query_scalar, Executor, PgPool, Postgres, QueryBuilder, Transaction};

pub struct PgSqlx<E>
where
    for<'e> &'e mut E: Executor<'e, Database = Postgres>,
{
    executor: E,
}

impl<E> PgSqlx<E>
where
    for<'e> &'e mut E: Executor<'e, Database = Postgres>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }
}

fn pg_code(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(e) => e.code().map(|c| c.into_owned()),
        _ => None,
    }
}

/// Unique-index violations are recoverable conflicts, surfaced as the
/// corresponding domain error.
fn map_unique(err: sqlx::Error, conflict: Error) -> Error {
    match pg_code(&err).as_deref() {
        Some("23505") => conflict,
        _ => Error::Database(err),
    }
}

/// Backstop for deletes racing the pre-checks: RESTRICT references report
/// the domain error instead of a raw foreign-key failure.
fn map_restrict(err: sqlx::Error, dependent: Error) -> Error {
    match pg_code(&err).as_deref() {
        Some("23503") => dependent,
        _ => Error::Database(err),
    }
}

impl<E> SurveyStore for PgSqlx<E>
where
    for<'e> &'e mut E: Executor<'e, Database = Postgres>,
{
    async fn insert(&mut self, data: SurveyInsert) -> Result<i32, Error> {
        let id = query_scalar("INSERT INTO surveys (title, author_id) VALUES ($1, $2) RETURNING id")
            .bind(data.title)
            .bind(data.author_id)
            .fetch_one(&mut self.executor)
            .await?;
        Ok(id)
    }

    async fn get(&mut self, id: i32) -> Result<Option<Survey>, Error> {
        let survey = query_as("SELECT * FROM surveys WHERE id = $1").bind(id).fetch_optional(&mut self.executor).await?;
        Ok(survey)
    }

    async fn get_owned(&mut self, id: i32, author_id: i32) -> Result<Option<Survey>, Error> {
        let survey = query_as("SELECT * FROM surveys WHERE id = $1 AND author_id = $2")
            .bind(id)
            .bind(author_id)
            .fetch_optional(&mut self.executor)
            .await?;
        Ok(survey)
    }

    async fn query_by_author(&mut self, author_id: i32, pagination: Option<Pagination>) -> Result<Vec<Survey>, Error> {
        let mut stmt = QueryBuilder::new("SELECT * FROM surveys WHERE author_id = ");
        stmt.push_bind(author_id);
        stmt.push(" ORDER BY id");
        if let Some(p) = pagination {
            stmt.push(" LIMIT ").push_bind(p.size);
            stmt.push(" OFFSET ").push_bind((p.page - 1) * p.size);
        }
        let surveys = stmt.build_query_as().fetch_all(&mut self.executor).await?;
        Ok(surveys)
    }

    async fn count_by_author(&mut self, author_id: i32) -> Result<i64, Error> {
        let total = query_scalar("SELECT COUNT(*) FROM surveys WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(&mut self.executor)
            .await?;
        Ok(total)
    }

    async fn update_title(&mut self, id: i32, title: &str) -> Result<(), Error> {
        query("UPDATE surveys SET title = $1, updated_at = NOW() WHERE id = $2")
            .bind(title)
            .bind(id)
            .execute(&mut self.executor)
            .await?;
        Ok(())
    }

    async fn delete(&mut self, id: i32) -> Result<(), Error> {
        query("DELETE FROM surveys WHERE id = $1")
            .bind(id)
            .execute(&mut self.executor)
            .await
            .map_err(|e| map_restrict(e, Error::Dependent("survey")))?;
        Ok(())
    }

    async fn has_runs(&mut self, id: i32) -> Result<bool, Error> {
        let exists = query_scalar("SELECT EXISTS(SELECT 1 FROM survey_runs WHERE survey_id = $1)")
            .bind(id)
            .fetch_one(&mut self.executor)
            .await?;
        Ok(exists)
    }
}

impl<E> QuestionStore for PgSqlx<E>
where
    for<'e> &'e mut E: Executor<'e, Database = Postgres>,
{
    async fn insert(&mut self, data: QuestionInsert) -> Result<i32, Error> {
        let id = query_scalar("INSERT INTO survey_questions (survey_id, text, position) VALUES ($1, $2, $3) RETURNING id")
            .bind(data.survey_id)
            .bind(data.text)
            .bind(data.position)
            .fetch_one(&mut self.executor)
            .await
            .map_err(|e| map_unique(e, Error::DuplicatePosition))?;
        Ok(id)
    }

    async fn get(&mut self, id: i32) -> Result<Option<Question>, Error> {
        let question = query_as("SELECT * FROM survey_questions WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut self.executor)
            .await?;
        Ok(question)
    }

    async fn get_in_survey(&mut self, id: i32, survey_id: i32) -> Result<Option<Question>, Error> {
        let question = query_as("SELECT * FROM survey_questions WHERE id = $1 AND survey_id = $2")
            .bind(id)
            .bind(survey_id)
            .fetch_optional(&mut self.executor)
            .await?;
        Ok(question)
    }

    async fn query_by_survey(&mut self, survey_id: i32) -> Result<Vec<Question>, Error> {
        let questions = query_as("SELECT * FROM survey_questions WHERE survey_id = $1 ORDER BY position")
            .bind(survey_id)
            .fetch_all(&mut self.executor)
            .await?;
        Ok(questions)
    }

    async fn count_by_survey(&mut self, survey_id: i32) -> Result<i64, Error> {
        let total = query_scalar("SELECT COUNT(*) FROM survey_questions WHERE survey_id = $1")
            .bind(survey_id)
            .fetch_one(&mut self.executor)
            .await?;
        Ok(total)
    }

    async fn exists_position(&mut self, survey_id: i32, position: i32, exclude: Option<i32>) -> Result<bool, Error> {
        let exists = query_scalar(
            "SELECT EXISTS(
                SELECT 1 FROM survey_questions
                WHERE survey_id = $1 AND position = $2 AND ($3::INT4 IS NULL OR id <> $3))",
        )
        .bind(survey_id)
        .bind(position)
        .bind(exclude)
        .fetch_one(&mut self.executor)
        .await?;
        Ok(exists)
    }

    async fn update(&mut self, id: i32, patch: QuestionPatch) -> Result<(), Error> {
        query(
            "UPDATE survey_questions
            SET text = COALESCE($1, text), position = COALESCE($2, position), updated_at = NOW()
            WHERE id = $3",
        )
        .bind(patch.text)
        .bind(patch.position)
        .bind(id)
        .execute(&mut self.executor)
        .await
        .map_err(|e| map_unique(e, Error::DuplicatePosition))?;
        Ok(())
    }

    async fn delete(&mut self, id: i32) -> Result<(), Error> {
        query("DELETE FROM survey_questions WHERE id = $1")
            .bind(id)
            .execute(&mut self.executor)
            .await
            .map_err(|e| map_restrict(e, Error::Dependent("question")))?;
        Ok(())
    }

    async fn has_answers(&mut self, id: i32) -> Result<bool, Error> {
        let exists = query_scalar("SELECT EXISTS(SELECT 1 FROM survey_answers WHERE question_id = $1)")
            .bind(id)
            .fetch_one(&mut self.executor)
            .await?;
        Ok(exists)
    }
}

impl<E> OptionStore for PgSqlx<E>
where
    for<'e> &'e mut E: Executor<'e, Database = Postgres>,
{
    async fn insert(&mut self, data: OptionInsert) -> Result<i32, Error> {
        let id = query_scalar("INSERT INTO survey_answer_options (question_id, text, position) VALUES ($1, $2, $3) RETURNING id")
            .bind(data.question_id)
            .bind(data.text)
            .bind(data.position)
            .fetch_one(&mut self.executor)
            .await
            .map_err(|e| map_unique(e, Error::DuplicatePosition))?;
        Ok(id)
    }

    async fn get(&mut self, id: i32) -> Result<Option<AnswerOption>, Error> {
        let option = query_as("SELECT * FROM survey_answer_options WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut self.executor)
            .await?;
        Ok(option)
    }

    async fn get_in_question(&mut self, id: i32, question_id: i32) -> Result<Option<AnswerOption>, Error> {
        let option = query_as("SELECT * FROM survey_answer_options WHERE id = $1 AND question_id = $2")
            .bind(id)
            .bind(question_id)
            .fetch_optional(&mut self.executor)
            .await?;
        Ok(option)
    }

    async fn query_by_question(&mut self, question_id: i32) -> Result<Vec<AnswerOption>, Error> {
        let options = query_as("SELECT * FROM survey_answer_options WHERE question_id = $1 ORDER BY position")
            .bind(question_id)
            .fetch_all(&mut self.executor)
            .await?;
        Ok(options)
    }

    async fn query_by_survey(&mut self, survey_id: i32) -> Result<Vec<AnswerOption>, Error> {
        let options = query_as(
            "SELECT o.*
            FROM survey_answer_options AS o
            JOIN survey_questions AS q ON o.question_id = q.id
            WHERE q.survey_id = $1
            ORDER BY q.position, o.position",
        )
        .bind(survey_id)
        .fetch_all(&mut self.executor)
        .await?;
        Ok(options)
    }

    async fn exists_position(&mut self, question_id: i32, position: i32, exclude: Option<i32>) -> Result<bool, Error> {
        let exists = query_scalar(
            "SELECT EXISTS(
                SELECT 1 FROM survey_answer_options
                WHERE question_id = $1 AND position = $2 AND ($3::INT4 IS NULL OR id <> $3))",
        )
        .bind(question_id)
        .bind(position)
        .bind(exclude)
        .fetch_one(&mut self.executor)
        .await?;
        Ok(exists)
    }

    async fn update(&mut self, id: i32, patch: OptionPatch) -> Result<(), Error> {
        query(
            "UPDATE survey_answer_options
            SET text = COALESCE($1, text), position = COALESCE($2, position), updated_at = NOW()
            WHERE id = $3",
        )
        .bind(patch.text)
        .bind(patch.position)
        .bind(id)
        .execute(&mut self.executor)
        .await
        .map_err(|e| map_unique(e, Error::DuplicatePosition))?;
        Ok(())
    }

    async fn delete(&mut self, id: i32) -> Result<(), Error> {
        query("DELETE FROM survey_answer_options WHERE id = $1")
            .bind(id)
            .execute(&mut self.executor)
            .await
            .map_err(|e| map_restrict(e, Error::Dependent("option")))?;
        Ok(())
    }

    async fn has_answers(&mut self, id: i32) -> Result<bool, Error> {
        let exists = query_scalar("SELECT EXISTS(SELECT 1 FROM survey_answers WHERE selected_option_id = $1)")
            .bind(id)
            .fetch_one(&mut self.executor)
            .await?;
        Ok(exists)
    }
}

impl<E> RunStore for PgSqlx<E>
where
    for<'e> &'e mut E: Executor<'e, Database = Postgres>,
{
    async fn get_active(&mut self, survey_id: i32, user_id: i32) -> Result<Option<Run>, Error> {
        let run = query_as("SELECT * FROM survey_runs WHERE survey_id = $1 AND user_id = $2 AND finished_at IS NULL")
            .bind(survey_id)
            .bind(user_id)
            .fetch_optional(&mut self.executor)
            .await?;
        Ok(run)
    }

    async fn get_last_finished(&mut self, survey_id: i32, user_id: i32) -> Result<Option<Run>, Error> {
        let run = query_as(
            "SELECT * FROM survey_runs
            WHERE survey_id = $1 AND user_id = $2 AND finished_at IS NOT NULL
            ORDER BY finished_at DESC
            LIMIT 1",
        )
        .bind(survey_id)
        .bind(user_id)
        .fetch_optional(&mut self.executor)
        .await?;
        Ok(run)
    }

    async fn insert_active(&mut self, survey_id: i32, user_id: i32) -> Result<Option<Run>, Error> {
        let run = query_as(
            "INSERT INTO survey_runs (user_id, survey_id) VALUES ($1, $2)
            ON CONFLICT (user_id, survey_id) WHERE finished_at IS NULL DO NOTHING
            RETURNING *",
        )
        .bind(user_id)
        .bind(survey_id)
        .fetch_optional(&mut self.executor)
        .await?;
        Ok(run)
    }

    async fn mark_finished(&mut self, run_id: i32) -> Result<(), Error> {
        query("UPDATE survey_runs SET finished_at = NOW() WHERE id = $1 AND finished_at IS NULL")
            .bind(run_id)
            .execute(&mut self.executor)
            .await?;
        Ok(())
    }

    async fn count_finished(&mut self, survey_id: i32) -> Result<i64, Error> {
        let total = query_scalar("SELECT COUNT(*) FROM survey_runs WHERE survey_id = $1 AND finished_at IS NOT NULL")
            .bind(survey_id)
            .fetch_one(&mut self.executor)
            .await?;
        Ok(total)
    }

    async fn avg_duration_seconds(&mut self, survey_id: i32) -> Result<Option<f64>, Error> {
        let avg = query_scalar(
            "SELECT AVG(EXTRACT(EPOCH FROM (finished_at - started_at)))::FLOAT8
            FROM survey_runs
            WHERE survey_id = $1 AND finished_at IS NOT NULL",
        )
        .bind(survey_id)
        .fetch_one(&mut self.executor)
        .await?;
        Ok(avg)
    }
}

impl<E> AnswerStore for PgSqlx<E>
where
    for<'e> &'e mut E: Executor<'e, Database = Postgres>,
{
    async fn insert(&mut self, data: AnswerInsert) -> Result<UserAnswer, Error> {
        let answer = query_as("INSERT INTO survey_answers (run_id, question_id, selected_option_id) VALUES ($1, $2, $3) RETURNING *")
            .bind(data.run_id)
            .bind(data.question_id)
            .bind(data.selected_option_id)
            .fetch_one(&mut self.executor)
            .await
            .map_err(|e| map_unique(e, Error::AlreadyAnswered))?;
        Ok(answer)
    }

    async fn answered_question_ids(&mut self, run_id: i32) -> Result<Vec<i32>, Error> {
        let ids = query_scalar("SELECT question_id FROM survey_answers WHERE run_id = $1")
            .bind(run_id)
            .fetch_all(&mut self.executor)
            .await?;
        Ok(ids)
    }

    async fn count_by_run(&mut self, run_id: i32) -> Result<i64, Error> {
        let total = query_scalar("SELECT COUNT(*) FROM survey_answers WHERE run_id = $1")
            .bind(run_id)
            .fetch_one(&mut self.executor)
            .await?;
        Ok(total)
    }

    async fn exists(&mut self, run_id: i32, question_id: i32) -> Result<bool, Error> {
        let exists = query_scalar("SELECT EXISTS(SELECT 1 FROM survey_answers WHERE run_id = $1 AND question_id = $2)")
            .bind(run_id)
            .bind(question_id)
            .fetch_one(&mut self.executor)
            .await?;
        Ok(exists)
    }

    async fn option_tallies(&mut self, survey_id: i32) -> Result<Vec<OptionTally>, Error> {
        let tallies = query_as(
            "SELECT q.id AS question_id, o.id AS option_id, o.text AS text, o.position AS position, COUNT(a.id) AS answers_count
            FROM survey_questions AS q
            JOIN survey_answer_options AS o ON q.id = o.question_id
            LEFT JOIN survey_answers AS a ON o.id = a.selected_option_id
            WHERE q.survey_id = $1
            GROUP BY q.id, q.position, o.id, o.text, o.position
            ORDER BY q.position, o.position",
        )
        .bind(survey_id)
        .fetch_all(&mut self.executor)
        .await?;
        Ok(tallies)
    }
}

impl Store for PgSqlx<PoolConnection<Postgres>> {}
impl<'a> Store for PgSqlx<Transaction<'a, Postgres>> {}

impl<'a> TxStore for PgSqlx<Transaction<'a, Postgres>> {
    async fn commit(self) -> Result<(), Error> {
        self.executor.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), Error> {
        self.executor.rollback().await?;
        Ok(())
    }
}

pub struct PgSqlxManager {
    pool: PgPool,
}

impl PgSqlxManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A plain connection for read paths.
    pub async fn db(&self) -> Result<PgSqlx<PoolConnection<Postgres>>, Error> {
        let conn = self.pool.acquire().await?;
        Ok(PgSqlx::new(conn))
    }

    /// A transaction; dropping it without commit rolls back.
    pub async fn tx(&self) -> Result<PgSqlx<Transaction<'static, Postgres>>, Error> {
        let tx = self.pool.begin().await?;
        Ok(PgSqlx::new(tx))
    }
}
