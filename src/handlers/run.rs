use actix_web::http::StatusCode;
use actix_web::web::{Data, Json, Path};
use actix_web::HttpResponse;

use crate::context::UserInfo;
use crate::core::models::run::{AnswerResult, AnswerSubmit};
use crate::core::services;
use crate::database::sqlx::PgSqlxManager;
use crate::error::Error;

pub async fn next_question(user_info: UserInfo, path: Path<(i32,)>, manager: Data<PgSqlxManager>) -> Result<HttpResponse, Error> {
    let (survey_id,) = path.into_inner();
    let store = manager.tx().await?;
    match services::run::advance(store, user_info.id, survey_id).await? {
        Some(next) => Ok(HttpResponse::build(StatusCode::OK).json(next)),
        None => Ok(HttpResponse::build(StatusCode::NO_CONTENT).finish()),
    }
}

pub async fn submit_answer(
    user_info: UserInfo,
    path: Path<(i32,)>,
    Json(body): Json<AnswerSubmit>,
    manager: Data<PgSqlxManager>,
) -> Result<Json<AnswerResult>, Error> {
    let (survey_id,) = path.into_inner();
    let store = manager.tx().await?;
    let result = services::run::submit(store, user_info.id, survey_id, body).await?;
    Ok(Json(result))
}
