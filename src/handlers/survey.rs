use actix_web::http::StatusCode;
use actix_web::web::{Data, Json, Path, Query};
use actix_web::HttpResponse;

use crate::context::UserInfo;
use crate::core::models::stats::SurveyStats;
use crate::core::models::survey::{Create as SurveyCreate, Survey, SurveyDetail, Update as SurveyUpdate};
use crate::core::services;
use crate::database::sqlx::PgSqlxManager;
use crate::error::Error;
use crate::request::Pagination;
use crate::response::List;

pub async fn list(user_info: UserInfo, Query(pagination): Query<Pagination>, manager: Data<PgSqlxManager>) -> Result<Json<List<Survey>>, Error> {
    let mut store = manager.db().await?;
    let (surveys, total) = services::survey::survey_list(&mut store, user_info.id, pagination).await?;
    Ok(Json(List::new(surveys, total)))
}

pub async fn create(user_info: UserInfo, Json(body): Json<SurveyCreate>, manager: Data<PgSqlxManager>) -> Result<HttpResponse, Error> {
    let store = manager.tx().await?;
    let survey = services::survey::create_survey(store, user_info.id, body).await?;
    Ok(HttpResponse::build(StatusCode::CREATED).json(survey))
}

pub async fn detail(user_info: UserInfo, path: Path<(i32,)>, manager: Data<PgSqlxManager>) -> Result<Json<SurveyDetail>, Error> {
    let (survey_id,) = path.into_inner();
    let mut store = manager.db().await?;
    let detail = services::survey::survey_detail(&mut store, user_info.id, survey_id).await?;
    Ok(Json(detail))
}

pub async fn update(
    user_info: UserInfo,
    path: Path<(i32,)>,
    Json(body): Json<SurveyUpdate>,
    manager: Data<PgSqlxManager>,
) -> Result<Json<Survey>, Error> {
    let (survey_id,) = path.into_inner();
    let store = manager.tx().await?;
    let survey = services::survey::update_survey(store, user_info.id, survey_id, body).await?;
    Ok(Json(survey))
}

pub async fn delete_survey(user_info: UserInfo, path: Path<(i32,)>, manager: Data<PgSqlxManager>) -> Result<HttpResponse, Error> {
    let (survey_id,) = path.into_inner();
    let store = manager.tx().await?;
    services::survey::delete_survey(store, user_info.id, survey_id).await?;
    Ok(HttpResponse::build(StatusCode::NO_CONTENT).finish())
}

pub async fn stats(user_info: UserInfo, path: Path<(i32,)>, manager: Data<PgSqlxManager>) -> Result<Json<SurveyStats>, Error> {
    let (survey_id,) = path.into_inner();
    let mut store = manager.db().await?;
    let stats = services::stats::collect(&mut store, user_info.id, survey_id).await?;
    Ok(Json(stats))
}
