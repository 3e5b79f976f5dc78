use crate::core::models::answer::OptionTally;
use crate::core::models::stats::{AnswerOptionStats, QuestionStats, SurveyStats};
use crate::core::ports::repository::{AnswerStore, QuestionStore, RunStore, Store, SurveyStore};
use crate::error::Error;
use itertools::Itertools;
use std::cmp::Reverse;

/// Aggregate statistics for the author's survey: finished-run count,
/// average duration, and per-option answer tallies.
pub async fn collect<S>(store: &mut S, uid: i32, survey_id: i32) -> Result<SurveyStats, Error>
where
    S: Store,
{
    SurveyStore::get_owned(store, survey_id, uid).await?.ok_or(Error::NotFound("survey"))?;
    let total_runs = RunStore::count_finished(store, survey_id).await?;
    let avg_duration_seconds = RunStore::avg_duration_seconds(store, survey_id).await?;
    let questions = QuestionStore::query_by_survey(store, survey_id).await?;
    let tallies = AnswerStore::option_tallies(store, survey_id).await?;
    let mut by_question = tallies.into_iter().map(|t| (t.question_id, t)).into_group_map();
    let questions = questions
        .into_iter()
        .map(|q| {
            let tallies = by_question.remove(&q.id).unwrap_or_default();
            let top_option_id = top_option(&tallies);
            let options = tallies
                .into_iter()
                .map(|t| AnswerOptionStats {
                    option_id: t.option_id,
                    text: t.text,
                    answers_count: t.answers_count,
                })
                .collect();
            QuestionStats {
                question_id: q.id,
                text: q.text,
                options,
                top_option_id,
            }
        })
        .collect();
    Ok(SurveyStats {
        total_runs,
        avg_duration_seconds,
        questions,
    })
}

/// The option with the highest nonzero tally; ties break to the lowest
/// position. None when no option of the question was ever selected.
fn top_option(tallies: &[OptionTally]) -> Option<i32> {
    tallies
        .iter()
        .filter(|t| t.answers_count > 0)
        .min_by_key(|t| (Reverse(t.answers_count), t.position))
        .map(|t| t.option_id)
}
