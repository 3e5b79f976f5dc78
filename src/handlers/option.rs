use actix_web::http::StatusCode;
use actix_web::web::{Data, Json, Path};
use actix_web::HttpResponse;

use crate::context::UserInfo;
use crate::core::models::option::{AnswerOption, Create as OptionCreate, Patch as OptionPatch};
use crate::core::services;
use crate::database::sqlx::PgSqlxManager;
use crate::error::Error;

pub async fn create(
    user_info: UserInfo,
    path: Path<(i32, i32)>,
    Json(body): Json<OptionCreate>,
    manager: Data<PgSqlxManager>,
) -> Result<HttpResponse, Error> {
    let (survey_id, question_id) = path.into_inner();
    let store = manager.tx().await?;
    let option = services::option::create_option(store, user_info.id, survey_id, question_id, body).await?;
    Ok(HttpResponse::build(StatusCode::CREATED).json(option))
}

pub async fn update(
    user_info: UserInfo,
    path: Path<(i32, i32, i32)>,
    Json(body): Json<OptionPatch>,
    manager: Data<PgSqlxManager>,
) -> Result<Json<AnswerOption>, Error> {
    let (survey_id, question_id, option_id) = path.into_inner();
    let store = manager.tx().await?;
    let option = services::option::update_option(store, user_info.id, survey_id, question_id, option_id, body).await?;
    Ok(Json(option))
}

pub async fn delete_option(
    user_info: UserInfo,
    path: Path<(i32, i32, i32)>,
    manager: Data<PgSqlxManager>,
) -> Result<HttpResponse, Error> {
    let (survey_id, question_id, option_id) = path.into_inner();
    let store = manager.tx().await?;
    services::option::delete_option(store, user_info.id, survey_id, question_id, option_id).await?;
    Ok(HttpResponse::build(StatusCode::NO_CONTENT).finish())
}
