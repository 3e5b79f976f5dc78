use crate::core::models::{
    question::QuestionWithOptions,
    survey::{Create as SurveyCreate, Insert as SurveyInsert, Survey, SurveyDetail, Update as SurveyUpdate},
};
use crate::core::ports::repository::{OptionStore, QuestionStore, Store, SurveyStore, TxStore};
use crate::error::Error;
use crate::request::Pagination;
use itertools::Itertools;

fn validate_title(title: &str) -> Result<(), Error> {
    if title.trim().is_empty() {
        return Err(Error::Validation("title must not be empty".into()));
    }
    Ok(())
}

pub async fn create_survey<T>(mut store: T, uid: i32, data: SurveyCreate) -> Result<Survey, Error>
where
    T: TxStore,
{
    validate_title(&data.title)?;
    let id = SurveyStore::insert(&mut store, SurveyInsert { title: data.title, author_id: uid }).await?;
    let survey = SurveyStore::get(&mut store, id).await?.ok_or(Error::NotFound("survey"))?;
    store.commit().await?;
    log::info!("user {} created survey {}", uid, survey.id);
    Ok(survey)
}

pub async fn survey_list<S>(store: &mut S, uid: i32, pagination: Pagination) -> Result<(Vec<Survey>, i64), Error>
where
    S: Store,
{
    let total = SurveyStore::count_by_author(store, uid).await?;
    let surveys = SurveyStore::query_by_author(store, uid, Some(pagination)).await?;
    Ok((surveys, total))
}

pub async fn survey_detail<S>(store: &mut S, uid: i32, id: i32) -> Result<SurveyDetail, Error>
where
    S: Store,
{
    let survey = SurveyStore::get_owned(store, id, uid).await?.ok_or(Error::NotFound("survey"))?;
    let questions = QuestionStore::query_by_survey(store, id).await?;
    let options = OptionStore::query_by_survey(store, id).await?;
    let mut grouped = options.into_iter().map(|o| (o.question_id, o)).into_group_map();
    let questions = questions
        .into_iter()
        .map(|q| {
            let options = grouped.remove(&q.id).unwrap_or_default();
            QuestionWithOptions::new(q, options)
        })
        .collect();
    Ok(SurveyDetail {
        id: survey.id,
        title: survey.title,
        created_at: survey.created_at,
        updated_at: survey.updated_at,
        questions,
    })
}

pub async fn update_survey<T>(mut store: T, uid: i32, id: i32, data: SurveyUpdate) -> Result<Survey, Error>
where
    T: TxStore,
{
    validate_title(&data.title)?;
    SurveyStore::get_owned(&mut store, id, uid).await?.ok_or(Error::NotFound("survey"))?;
    SurveyStore::update_title(&mut store, id, &data.title).await?;
    let survey = SurveyStore::get(&mut store, id).await?.ok_or(Error::NotFound("survey"))?;
    store.commit().await?;
    Ok(survey)
}

/// Deleting a survey is refused while any run references it.
pub async fn delete_survey<T>(mut store: T, uid: i32, id: i32) -> Result<(), Error>
where
    T: TxStore,
{
    SurveyStore::get_owned(&mut store, id, uid).await?.ok_or(Error::NotFound("survey"))?;
    if SurveyStore::has_runs(&mut store, id).await? {
        return Err(Error::Dependent("survey"));
    }
    SurveyStore::delete(&mut store, id).await?;
    store.commit().await?;
    log::info!("user {} deleted survey {}", uid, id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::run::AnswerSubmit;
    use crate::core::services::run::submit;
    use crate::core::testing::MemStore;

    const AUTHOR: i32 = 1;

    fn page() -> Pagination {
        Pagination { page: 1, size: 20 }
    }

    #[tokio::test]
    async fn created_survey_is_listed_for_its_author_only() {
        let store = MemStore::new();
        let survey = create_survey(store.clone(), AUTHOR, SurveyCreate { title: "food habits".into() })
            .await
            .unwrap();
        assert_eq!(survey.title, "food habits");

        let mut store = store;
        let (mine, total) = survey_list(&mut store, AUTHOR, page()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(mine[0].id, survey.id);

        let (others, total) = survey_list(&mut store, 2, page()).await.unwrap();
        assert_eq!(total, 0);
        assert!(others.is_empty());
    }

    #[tokio::test]
    async fn blank_title_is_rejected() {
        let store = MemStore::new();
        let err = create_survey(store.clone(), AUTHOR, SurveyCreate { title: "   ".into() }).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn detail_nests_questions_and_options_in_position_order() {
        let mut store = MemStore::new();
        let survey_id = store.add_survey("poll", AUTHOR);
        let q2 = store.add_question(survey_id, "second", 2);
        let q1 = store.add_question(survey_id, "first", 1);
        store.add_option(q1, "b", 2);
        store.add_option(q1, "a", 1);
        store.add_option(q2, "c", 1);

        let detail = survey_detail(&mut store, AUTHOR, survey_id).await.unwrap();
        assert_eq!(detail.questions.len(), 2);
        assert_eq!(detail.questions[0].id, q1);
        assert_eq!(detail.questions[1].id, q2);
        let texts: Vec<&str> = detail.questions[0].options.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, ["a", "b"]);
    }

    #[tokio::test]
    async fn foreign_survey_detail_is_not_found() {
        let mut store = MemStore::new();
        let survey_id = store.add_survey("poll", AUTHOR);
        let err = survey_detail(&mut store, 2, survey_id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound("survey")));
    }

    #[tokio::test]
    async fn update_replaces_the_title() {
        let store = MemStore::new();
        let survey_id = store.add_survey("poll", AUTHOR);
        let survey = update_survey(store.clone(), AUTHOR, survey_id, SurveyUpdate { title: "renamed".into() })
            .await
            .unwrap();
        assert_eq!(survey.title, "renamed");
    }

    #[tokio::test]
    async fn delete_is_refused_while_runs_exist() {
        let store = MemStore::new();
        let survey_id = store.add_survey("poll", AUTHOR);
        let q1 = store.add_question(survey_id, "q", 1);
        let a = store.add_option(q1, "a", 1);
        submit(store.clone(), 7, survey_id, AnswerSubmit { question_id: q1, option_id: a })
            .await
            .unwrap();

        let err = delete_survey(store.clone(), AUTHOR, survey_id).await.unwrap_err();
        assert!(matches!(err, Error::Dependent("survey")));
        assert!(store.survey(survey_id).is_some());
    }

    #[tokio::test]
    async fn delete_removes_an_untaken_survey_with_its_questions() {
        let store = MemStore::new();
        let survey_id = store.add_survey("poll", AUTHOR);
        let q1 = store.add_question(survey_id, "q", 1);
        store.add_option(q1, "a", 1);
        delete_survey(store.clone(), AUTHOR, survey_id).await.unwrap();
        assert!(store.survey(survey_id).is_none());
        assert_eq!(store.question_count(survey_id), 0);
    }
}
