use crate::core::models::option::{AnswerOption, Create as OptionCreate, Insert as OptionInsert, Patch as OptionPatch};
use crate::core::ports::repository::{OptionStore, QuestionStore, Store, SurveyStore, TxStore};
use crate::error::Error;

async fn validate_position<S>(store: &mut S, question_id: i32, position: i32, exclude: Option<i32>) -> Result<(), Error>
where
    S: Store,
{
    if position <= 0 {
        return Err(Error::InvalidPosition);
    }
    if OptionStore::exists_position(store, question_id, position, exclude).await? {
        return Err(Error::DuplicatePosition);
    }
    Ok(())
}

/// Resolves the question through the author's survey; a miss at either
/// level reads as not-found so nothing leaks across authors.
async fn owned_question<S>(store: &mut S, uid: i32, survey_id: i32, question_id: i32) -> Result<i32, Error>
where
    S: Store,
{
    SurveyStore::get_owned(store, survey_id, uid).await?.ok_or(Error::NotFound("survey"))?;
    let question = QuestionStore::get_in_survey(store, question_id, survey_id)
        .await?
        .ok_or(Error::NotFound("question"))?;
    Ok(question.id)
}

pub async fn create_option<T>(mut store: T, uid: i32, survey_id: i32, question_id: i32, data: OptionCreate) -> Result<AnswerOption, Error>
where
    T: TxStore,
{
    let question_id = owned_question(&mut store, uid, survey_id, question_id).await?;
    if data.text.trim().is_empty() {
        return Err(Error::Validation("text must not be empty".into()));
    }
    validate_position(&mut store, question_id, data.position, None).await?;
    let id = OptionStore::insert(
        &mut store,
        OptionInsert {
            question_id,
            text: data.text,
            position: data.position,
        },
    )
    .await?;
    let option = OptionStore::get(&mut store, id).await?.ok_or(Error::NotFound("option"))?;
    store.commit().await?;
    Ok(option)
}

pub async fn update_option<T>(mut store: T, uid: i32, survey_id: i32, question_id: i32, option_id: i32, patch: OptionPatch) -> Result<AnswerOption, Error>
where
    T: TxStore,
{
    let question_id = owned_question(&mut store, uid, survey_id, question_id).await?;
    let option = OptionStore::get_in_question(&mut store, option_id, question_id)
        .await?
        .ok_or(Error::NotFound("option"))?;
    if let Some(text) = &patch.text {
        if text.trim().is_empty() {
            return Err(Error::Validation("text must not be empty".into()));
        }
    }
    if let Some(position) = patch.position {
        validate_position(&mut store, question_id, position, Some(option.id)).await?;
    }
    OptionStore::update(&mut store, option.id, patch).await?;
    let option = OptionStore::get(&mut store, option.id).await?.ok_or(Error::NotFound("option"))?;
    store.commit().await?;
    Ok(option)
}

pub async fn delete_option<T>(mut store: T, uid: i32, survey_id: i32, question_id: i32, option_id: i32) -> Result<(), Error>
where
    T: TxStore,
{
    let question_id = owned_question(&mut store, uid, survey_id, question_id).await?;
    let option = OptionStore::get_in_question(&mut store, option_id, question_id)
        .await?
        .ok_or(Error::NotFound("option"))?;
    if OptionStore::has_answers(&mut store, option.id).await? {
        return Err(Error::Dependent("option"));
    }
    OptionStore::delete(&mut store, option.id).await?;
    store.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::run::AnswerSubmit;
    use crate::core::services::run::submit;
    use crate::core::testing::MemStore;

    const AUTHOR: i32 = 1;

    fn seeded(store: &MemStore) -> (i32, i32) {
        let survey_id = store.add_survey("poll", AUTHOR);
        let q1 = store.add_question(survey_id, "q", 1);
        (survey_id, q1)
    }

    #[tokio::test]
    async fn create_validates_position_bounds_and_uniqueness() {
        let store = MemStore::new();
        let (survey_id, q1) = seeded(&store);
        store.add_option(q1, "a", 1);

        let err = create_option(store.clone(), AUTHOR, survey_id, q1, OptionCreate { text: "x".into(), position: 0 })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPosition));

        let err = create_option(store.clone(), AUTHOR, survey_id, q1, OptionCreate { text: "x".into(), position: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicatePosition));

        let option = create_option(store.clone(), AUTHOR, survey_id, q1, OptionCreate { text: "x".into(), position: 2 })
            .await
            .unwrap();
        assert_eq!(option.position, 2);
    }

    #[tokio::test]
    async fn update_excludes_itself_from_the_uniqueness_check() {
        let store = MemStore::new();
        let (survey_id, q1) = seeded(&store);
        let a = store.add_option(q1, "a", 1);
        let b = store.add_option(q1, "b", 2);

        let option = update_option(
            store.clone(),
            AUTHOR,
            survey_id,
            q1,
            a,
            OptionPatch {
                text: Some("kept".into()),
                position: Some(1),
            },
        )
        .await
        .unwrap();
        assert_eq!(option.text, "kept");

        let err = update_option(store.clone(), AUTHOR, survey_id, q1, b, OptionPatch { text: None, position: Some(1) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicatePosition));
    }

    #[tokio::test]
    async fn options_of_a_foreign_question_are_not_found() {
        let store = MemStore::new();
        let (survey_id, q1) = seeded(&store);
        let other_survey = store.add_survey("other", AUTHOR);
        let err = create_option(store.clone(), AUTHOR, other_survey, q1, OptionCreate { text: "x".into(), position: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound("question")));
        let err = create_option(store.clone(), 2, survey_id, q1, OptionCreate { text: "x".into(), position: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound("survey")));
    }

    #[tokio::test]
    async fn selected_options_cannot_be_deleted() {
        let store = MemStore::new();
        let (survey_id, q1) = seeded(&store);
        let a = store.add_option(q1, "a", 1);
        submit(store.clone(), 7, survey_id, AnswerSubmit { question_id: q1, option_id: a })
            .await
            .unwrap();

        let err = delete_option(store.clone(), AUTHOR, survey_id, q1, a).await.unwrap_err();
        assert!(matches!(err, Error::Dependent("option")));
        assert_eq!(store.option_count(q1), 1);
    }

    #[tokio::test]
    async fn unselected_options_are_deleted() {
        let store = MemStore::new();
        let (survey_id, q1) = seeded(&store);
        let a = store.add_option(q1, "a", 1);
        delete_option(store.clone(), AUTHOR, survey_id, q1, a).await.unwrap();
        assert_eq!(store.option_count(q1), 0);
    }
}
