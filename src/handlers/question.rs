use actix_web::http::StatusCode;
use actix_web::web::{Data, Json, Path};
use actix_web::HttpResponse;

use crate::context::UserInfo;
use crate::core::models::question::{Create as QuestionCreate, Patch as QuestionPatch, Question};
use crate::core::services;
use crate::database::sqlx::PgSqlxManager;
use crate::error::Error;

pub async fn create(
    user_info: UserInfo,
    path: Path<(i32,)>,
    Json(body): Json<QuestionCreate>,
    manager: Data<PgSqlxManager>,
) -> Result<HttpResponse, Error> {
    let (survey_id,) = path.into_inner();
    let store = manager.tx().await?;
    let question = services::question::create_question(store, user_info.id, survey_id, body).await?;
    Ok(HttpResponse::build(StatusCode::CREATED).json(question))
}

pub async fn update(
    user_info: UserInfo,
    path: Path<(i32, i32)>,
    Json(body): Json<QuestionPatch>,
    manager: Data<PgSqlxManager>,
) -> Result<Json<Question>, Error> {
    let (survey_id, question_id) = path.into_inner();
    let store = manager.tx().await?;
    let question = services::question::update_question(store, user_info.id, survey_id, question_id, body).await?;
    Ok(Json(question))
}

pub async fn delete_question(
    user_info: UserInfo,
    path: Path<(i32, i32)>,
    manager: Data<PgSqlxManager>,
) -> Result<HttpResponse, Error> {
    let (survey_id, question_id) = path.into_inner();
    let store = manager.tx().await?;
    services::question::delete_question(store, user_info.id, survey_id, question_id).await?;
    Ok(HttpResponse::build(StatusCode::NO_CONTENT).finish())
}
