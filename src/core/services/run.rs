use crate::core::models::{
    answer::{Insert as AnswerInsert, UserAnswer},
    question::QuestionWithOptions,
    run::{AnswerResult, AnswerSubmit, NextQuestion, Run},
};
use crate::core::ports::repository::{AnswerStore, OptionStore, QuestionStore, RunStore, Store, SurveyStore, TxStore};
use crate::error::Error;

/// Returns the respondent's unfinished run for the survey, creating one if
/// none exists. The insert is keyed on the partial uniqueness constraint
/// "one active run per (user, survey)"; losing that race means another
/// request just created the run, so it is re-read once.
pub async fn get_or_create_active_run<S>(store: &mut S, survey_id: i32, user_id: i32) -> Result<Run, Error>
where
    S: Store,
{
    if let Some(run) = RunStore::get_active(store, survey_id, user_id).await? {
        return Ok(run);
    }
    if let Some(run) = RunStore::insert_active(store, survey_id, user_id).await? {
        return Ok(run);
    }
    log::debug!("lost active-run insert race for user {} on survey {}", user_id, survey_id);
    RunStore::get_active(store, survey_id, user_id).await?.ok_or(Error::NotFound("run"))
}

/// The run the respondent's request operates on: the active run when one
/// exists, the already-finished run when the respondent has completed the
/// survey (completion is terminal, runs are never reopened or restarted),
/// and a freshly created run otherwise.
async fn current_or_new_run<S>(store: &mut S, survey_id: i32, user_id: i32) -> Result<Run, Error>
where
    S: Store,
{
    if let Some(run) = RunStore::get_active(store, survey_id, user_id).await? {
        return Ok(run);
    }
    if let Some(run) = RunStore::get_last_finished(store, survey_id, user_id).await? {
        return Ok(run);
    }
    get_or_create_active_run(store, survey_id, user_id).await
}

/// The lowest-position question of the run's survey without a recorded
/// answer, with its options. None once every question is answered.
pub async fn next_question<S>(store: &mut S, run: &Run) -> Result<Option<QuestionWithOptions>, Error>
where
    S: Store,
{
    let answered = AnswerStore::answered_question_ids(store, run.id).await?;
    let questions = QuestionStore::query_by_survey(store, run.survey_id).await?;
    match questions.into_iter().find(|q| !answered.contains(&q.id)) {
        None => Ok(None),
        Some(question) => {
            let options = OptionStore::query_by_question(store, question.id).await?;
            Ok(Some(QuestionWithOptions::new(question, options)))
        }
    }
}

pub async fn is_completed<S>(store: &mut S, run: &Run) -> Result<bool, Error>
where
    S: Store,
{
    let total = QuestionStore::count_by_survey(store, run.survey_id).await?;
    let answered = AnswerStore::count_by_run(store, run.id).await?;
    Ok(answered >= total)
}

pub async fn submit_answer<S>(store: &mut S, run: &Run, question_id: i32, option_id: i32) -> Result<UserAnswer, Error>
where
    S: Store,
{
    let question = QuestionStore::get(store, question_id).await?.ok_or(Error::NotFound("question"))?;
    let option = OptionStore::get(store, option_id).await?.ok_or(Error::NotFound("option"))?;
    if option.question_id != question.id {
        return Err(Error::OptionMismatch);
    }
    if question.survey_id != run.survey_id {
        return Err(Error::QuestionNotInSurvey);
    }
    if AnswerStore::exists(store, run.id, question.id).await? {
        return Err(Error::AlreadyAnswered);
    }
    AnswerStore::insert(
        store,
        AnswerInsert {
            run_id: run.id,
            question_id: question.id,
            selected_option_id: option.id,
        },
    )
    .await
}

/// Respondent flow behind GET runs/next-question: reuse or create the run,
/// hand out the next question, or finish the run and report completion
/// (None). Finishing is idempotent, so re-detecting completion on a run
/// whose finishing write was lost repairs the stored state.
pub async fn advance<T>(mut store: T, user_id: i32, survey_id: i32) -> Result<Option<NextQuestion>, Error>
where
    T: TxStore,
{
    SurveyStore::get(&mut store, survey_id).await?.ok_or(Error::NotFound("survey"))?;
    let run = current_or_new_run(&mut store, survey_id, user_id).await?;
    let out = if run.is_finished() {
        None
    } else {
        match next_question(&mut store, &run).await? {
            Some(question) => Some(NextQuestion { run_id: run.id, question }),
            None => {
                RunStore::mark_finished(&mut store, run.id).await?;
                None
            }
        }
    };
    store.commit().await?;
    Ok(out)
}

/// Respondent flow behind POST runs/answer: record the answer, then
/// finish the run when no unanswered question remains.
pub async fn submit<T>(mut store: T, user_id: i32, survey_id: i32, submission: AnswerSubmit) -> Result<AnswerResult, Error>
where
    T: TxStore,
{
    SurveyStore::get(&mut store, survey_id).await?.ok_or(Error::NotFound("survey"))?;
    let run = current_or_new_run(&mut store, survey_id, user_id).await?;
    if run.is_finished() {
        return Err(Error::AlreadyAnswered);
    }
    submit_answer(&mut store, &run, submission.question_id, submission.option_id).await?;
    let question = next_question(&mut store, &run).await?;
    let completed = is_completed(&mut store, &run).await?;
    if completed {
        RunStore::mark_finished(&mut store, run.id).await?;
        log::debug!("user {} finished survey {} (run {})", user_id, survey_id, run.id);
    }
    store.commit().await?;
    Ok(AnswerResult {
        run_id: run.id,
        completed,
        question,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::MemStore;

    fn survey_with_two_questions(store: &MemStore) -> (i32, i32, i32, i32, i32, i32, i32) {
        let survey_id = store.add_survey("lunch poll", 1);
        let q1 = store.add_question(survey_id, "soup or salad?", 1);
        let q2 = store.add_question(survey_id, "still hungry?", 2);
        let a = store.add_option(q1, "soup", 1);
        let b = store.add_option(q1, "salad", 2);
        let c = store.add_option(q2, "yes", 1);
        let d = store.add_option(q2, "no", 2);
        (survey_id, q1, q2, a, b, c, d)
    }

    #[tokio::test]
    async fn active_run_is_reused() {
        let mut store = MemStore::new();
        let survey_id = store.add_survey("poll", 1);
        let first = get_or_create_active_run(&mut store, survey_id, 7).await.unwrap();
        let second = get_or_create_active_run(&mut store, survey_id, 7).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.active_run_count(survey_id, 7), 1);
    }

    #[tokio::test]
    async fn lost_insert_race_returns_the_winners_run() {
        let mut store = MemStore::new();
        let survey_id = store.add_survey("poll", 1);
        store.race_next_active_insert();
        let run = get_or_create_active_run(&mut store, survey_id, 7).await.unwrap();
        assert_eq!(run.user_id, 7);
        assert_eq!(store.active_run_count(survey_id, 7), 1);
    }

    #[tokio::test]
    async fn next_question_is_lowest_unanswered_position() {
        let mut store = MemStore::new();
        let (survey_id, q1, q2, a, _, _, _) = survey_with_two_questions(&store);
        let run = get_or_create_active_run(&mut store, survey_id, 7).await.unwrap();

        let next = next_question(&mut store, &run).await.unwrap().unwrap();
        assert_eq!(next.id, q1);
        assert_eq!(next.options.len(), 2);

        submit_answer(&mut store, &run, q1, a).await.unwrap();
        let next = next_question(&mut store, &run).await.unwrap().unwrap();
        assert_eq!(next.id, q2);
    }

    #[tokio::test]
    async fn submit_rejects_option_of_another_question() {
        let mut store = MemStore::new();
        let (survey_id, q1, _, _, _, c, _) = survey_with_two_questions(&store);
        let run = get_or_create_active_run(&mut store, survey_id, 7).await.unwrap();
        let err = submit_answer(&mut store, &run, q1, c).await.unwrap_err();
        assert!(matches!(err, Error::OptionMismatch));
    }

    #[tokio::test]
    async fn submit_rejects_question_of_another_survey() {
        let mut store = MemStore::new();
        let (survey_id, ..) = survey_with_two_questions(&store);
        let other_survey = store.add_survey("other", 1);
        let foreign_q = store.add_question(other_survey, "foreign", 1);
        let foreign_opt = store.add_option(foreign_q, "yes", 1);
        let run = get_or_create_active_run(&mut store, survey_id, 7).await.unwrap();
        let err = submit_answer(&mut store, &run, foreign_q, foreign_opt).await.unwrap_err();
        assert!(matches!(err, Error::QuestionNotInSurvey));
    }

    #[tokio::test]
    async fn answering_twice_fails_and_keeps_a_single_row() {
        let mut store = MemStore::new();
        let (survey_id, q1, _, a, b, _, _) = survey_with_two_questions(&store);
        let run = get_or_create_active_run(&mut store, survey_id, 7).await.unwrap();
        submit_answer(&mut store, &run, q1, a).await.unwrap();
        let err = submit_answer(&mut store, &run, q1, b).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyAnswered));
        assert_eq!(store.answer_count(run.id), 1);
    }

    #[tokio::test]
    async fn walkthrough_finishes_the_run() {
        let store = MemStore::new();
        let (survey_id, q1, q2, a, _, _, d) = survey_with_two_questions(&store);

        let next = advance(store.clone(), 7, survey_id).await.unwrap().unwrap();
        assert_eq!(next.question.id, q1);

        let result = submit(store.clone(), 7, survey_id, AnswerSubmit { question_id: q1, option_id: a })
            .await
            .unwrap();
        assert!(!result.completed);
        assert_eq!(result.question.as_ref().unwrap().id, q2);

        let result = submit(store.clone(), 7, survey_id, AnswerSubmit { question_id: q2, option_id: d })
            .await
            .unwrap();
        assert!(result.completed);
        assert!(result.question.is_none());
        assert!(store.run(result.run_id).finished_at.is_some());

        let after = advance(store.clone(), 7, survey_id).await.unwrap();
        assert!(after.is_none());
    }

    #[tokio::test]
    async fn submitting_after_completion_is_rejected() {
        let store = MemStore::new();
        let (survey_id, q1, q2, a, _, c, _) = survey_with_two_questions(&store);
        submit(store.clone(), 7, survey_id, AnswerSubmit { question_id: q1, option_id: a })
            .await
            .unwrap();
        submit(store.clone(), 7, survey_id, AnswerSubmit { question_id: q2, option_id: c })
            .await
            .unwrap();
        let err = submit(store.clone(), 7, survey_id, AnswerSubmit { question_id: q1, option_id: a })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyAnswered));
    }

    #[tokio::test]
    async fn is_completed_tracks_answered_count() {
        let mut store = MemStore::new();
        let (survey_id, q1, q2, a, _, c, _) = survey_with_two_questions(&store);
        let run = get_or_create_active_run(&mut store, survey_id, 7).await.unwrap();
        assert!(!is_completed(&mut store, &run).await.unwrap());
        submit_answer(&mut store, &run, q1, a).await.unwrap();
        assert!(!is_completed(&mut store, &run).await.unwrap());
        submit_answer(&mut store, &run, q2, c).await.unwrap();
        assert!(is_completed(&mut store, &run).await.unwrap());
    }

    #[tokio::test]
    async fn submitting_against_missing_survey_is_not_found() {
        let store = MemStore::new();
        let err = submit(store, 7, 999, AnswerSubmit { question_id: 1, option_id: 1 }).await.unwrap_err();
        assert!(matches!(err, Error::NotFound("survey")));
    }

    #[tokio::test]
    async fn runs_of_different_respondents_do_not_interfere() {
        let store = MemStore::new();
        let (survey_id, q1, _, a, b, _, _) = survey_with_two_questions(&store);
        submit(store.clone(), 7, survey_id, AnswerSubmit { question_id: q1, option_id: a })
            .await
            .unwrap();
        let other = submit(store.clone(), 8, survey_id, AnswerSubmit { question_id: q1, option_id: b })
            .await
            .unwrap();
        assert!(!other.completed);
        assert_eq!(store.active_run_count(survey_id, 7), 1);
        assert_eq!(store.active_run_count(survey_id, 8), 1);
    }
}
