use crate::core::models::question::{Create as QuestionCreate, Insert as QuestionInsert, Patch as QuestionPatch, Question};
use crate::core::ports::repository::{QuestionStore, Store, SurveyStore, TxStore};
use crate::error::Error;

/// Positions are positive and unique within the survey; `exclude` skips
/// the question being updated.
async fn validate_position<S>(store: &mut S, survey_id: i32, position: i32, exclude: Option<i32>) -> Result<(), Error>
where
    S: Store,
{
    if position <= 0 {
        return Err(Error::InvalidPosition);
    }
    if QuestionStore::exists_position(store, survey_id, position, exclude).await? {
        return Err(Error::DuplicatePosition);
    }
    Ok(())
}

pub async fn create_question<T>(mut store: T, uid: i32, survey_id: i32, data: QuestionCreate) -> Result<Question, Error>
where
    T: TxStore,
{
    SurveyStore::get_owned(&mut store, survey_id, uid).await?.ok_or(Error::NotFound("survey"))?;
    if data.text.trim().is_empty() {
        return Err(Error::Validation("text must not be empty".into()));
    }
    validate_position(&mut store, survey_id, data.position, None).await?;
    let id = QuestionStore::insert(
        &mut store,
        QuestionInsert {
            survey_id,
            text: data.text,
            position: data.position,
        },
    )
    .await?;
    let question = QuestionStore::get(&mut store, id).await?.ok_or(Error::NotFound("question"))?;
    store.commit().await?;
    Ok(question)
}

pub async fn update_question<T>(mut store: T, uid: i32, survey_id: i32, question_id: i32, patch: QuestionPatch) -> Result<Question, Error>
where
    T: TxStore,
{
    SurveyStore::get_owned(&mut store, survey_id, uid).await?.ok_or(Error::NotFound("survey"))?;
    let question = QuestionStore::get_in_survey(&mut store, question_id, survey_id)
        .await?
        .ok_or(Error::NotFound("question"))?;
    if let Some(text) = &patch.text {
        if text.trim().is_empty() {
            return Err(Error::Validation("text must not be empty".into()));
        }
    }
    if let Some(position) = patch.position {
        validate_position(&mut store, survey_id, position, Some(question.id)).await?;
    }
    QuestionStore::update(&mut store, question.id, patch).await?;
    let question = QuestionStore::get(&mut store, question.id).await?.ok_or(Error::NotFound("question"))?;
    store.commit().await?;
    Ok(question)
}

/// Questions with recorded answers are protected and cannot be deleted.
pub async fn delete_question<T>(mut store: T, uid: i32, survey_id: i32, question_id: i32) -> Result<(), Error>
where
    T: TxStore,
{
    SurveyStore::get_owned(&mut store, survey_id, uid).await?.ok_or(Error::NotFound("survey"))?;
    let question = QuestionStore::get_in_survey(&mut store, question_id, survey_id)
        .await?
        .ok_or(Error::NotFound("question"))?;
    if QuestionStore::has_answers(&mut store, question.id).await? {
        return Err(Error::Dependent("question"));
    }
    QuestionStore::delete(&mut store, question.id).await?;
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

    #[tokio::test]
    async fn create_rejects_non_positive_positions() {
        let store = MemStore::new();
        let survey_id = store.add_survey("poll", AUTHOR);
        for position in [0, -3] {
            let err = create_question(store.clone(), AUTHOR, survey_id, QuestionCreate { text: "q".into(), position })
                .await
                .unwrap_err();
            assert!(matches!(err, Error::InvalidPosition));
        }
    }

    #[tokio::test]
    async fn create_rejects_a_taken_position() {
        let store = MemStore::new();
        let survey_id = store.add_survey("poll", AUTHOR);
        store.add_question(survey_id, "first", 1);
        let err = create_question(store.clone(), AUTHOR, survey_id, QuestionCreate { text: "dup".into(), position: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicatePosition));
    }

    #[tokio::test]
    async fn same_position_is_free_in_another_survey() {
        let store = MemStore::new();
        let survey_id = store.add_survey("poll", AUTHOR);
        let other = store.add_survey("other", AUTHOR);
        store.add_question(other, "first", 1);
        let question = create_question(store.clone(), AUTHOR, survey_id, QuestionCreate { text: "q".into(), position: 1 })
            .await
            .unwrap();
        assert_eq!(question.position, 1);
    }

    #[tokio::test]
    async fn update_may_keep_its_own_position() {
        let store = MemStore::new();
        let survey_id = store.add_survey("poll", AUTHOR);
        let q1 = store.add_question(survey_id, "q", 1);
        let question = update_question(
            store.clone(),
            AUTHOR,
            survey_id,
            q1,
            QuestionPatch {
                text: Some("reworded".into()),
                position: Some(1),
            },
        )
        .await
        .unwrap();
        assert_eq!(question.text, "reworded");
        assert_eq!(question.position, 1);
    }

    #[tokio::test]
    async fn update_cannot_steal_a_position() {
        let store = MemStore::new();
        let survey_id = store.add_survey("poll", AUTHOR);
        store.add_question(survey_id, "first", 1);
        let q2 = store.add_question(survey_id, "second", 2);
        let err = update_question(store.clone(), AUTHOR, survey_id, q2, QuestionPatch { text: None, position: Some(1) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicatePosition));
    }

    #[tokio::test]
    async fn authoring_a_foreign_survey_is_not_found() {
        let store = MemStore::new();
        let survey_id = store.add_survey("poll", AUTHOR);
        let err = create_question(store.clone(), 2, survey_id, QuestionCreate { text: "q".into(), position: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound("survey")));
    }

    #[tokio::test]
    async fn answered_questions_cannot_be_deleted() {
        let store = MemStore::new();
        let survey_id = store.add_survey("poll", AUTHOR);
        let q1 = store.add_question(survey_id, "q", 1);
        let a = store.add_option(q1, "a", 1);
        submit(store.clone(), 7, survey_id, AnswerSubmit { question_id: q1, option_id: a })
            .await
            .unwrap();

        let err = delete_question(store.clone(), AUTHOR, survey_id, q1).await.unwrap_err();
        assert!(matches!(err, Error::Dependent("question")));
        assert_eq!(store.question_count(survey_id), 1);
        assert_eq!(store.survey_answer_count(survey_id), 1);
    }

    #[tokio::test]
    async fn unanswered_questions_are_deleted_with_their_options() {
        let store = MemStore::new();
        let survey_id = store.add_survey("poll", AUTHOR);
        let q1 = store.add_question(survey_id, "q", 1);
        store.add_option(q1, "a", 1);
        delete_question(store.clone(), AUTHOR, survey_id, q1).await.unwrap();
        assert_eq!(store.question_count(survey_id), 0);
        assert_eq!(store.option_count(q1), 0);
    }
}
