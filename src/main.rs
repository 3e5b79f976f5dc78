#![allow(async_fn_in_trait)]

mod context;
mod core;
mod database;
mod error;
mod handlers;
mod middlewares;
mod request;
mod response;

use actix_web::web::{delete, get, post, put, scope, Data};
use actix_web::HttpServer;
use anyhow::Context;
use database::sqlx::PgSqlxManager;
use middlewares::jwt::Jwt;
use sqlx::postgres::PgPoolOptions;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info,actix_web=info");
    }
    env_logger::init();
    let database_url = dotenv::var("DATABASE_URL").context("environment variable DATABASE_URL not been set")?;
    let secret = dotenv::var("JWT_SECRET").context("environment variable JWT_SECRET not been set")?;
    let bind_addr = dotenv::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_owned());
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")?;
    sqlx::migrate!().run(&pool).await.context("failed to run migrations")?;
    log::info!("listening on {}", bind_addr);
    HttpServer::new(move || {
        actix_web::App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(Data::new(PgSqlxManager::new(pool.clone())))
            .service(
                scope("surveys")
                    .wrap(Jwt::new(secret.as_bytes().to_owned()))
                    .route("", get().to(handlers::survey::list))
                    .route("", post().to(handlers::survey::create))
                    .service(
                        scope("{survey_id}")
                            .route("", get().to(handlers::survey::detail))
                            .route("", put().to(handlers::survey::update))
                            .route("", delete().to(handlers::survey::delete_survey))
                            .route("stats", get().to(handlers::survey::stats))
                            .service(
                                scope("questions")
                                    .route("", post().to(handlers::question::create))
                                    .service(
                                        scope("{question_id}")
                                            .route("", put().to(handlers::question::update))
                                            .route("", delete().to(handlers::question::delete_question))
                                            .service(
                                                scope("options")
                                                    .route("", post().to(handlers::option::create))
                                                    .route("{option_id}", put().to(handlers::option::update))
                                                    .route("{option_id}", delete().to(handlers::option::delete_option)),
                                            ),
                                    ),
                            )
                            .service(
                                scope("runs")
                                    .route("next-question", get().to(handlers::run::next_question))
                                    .route("answer", post().to(handlers::run::submit_answer)),
                            ),
                    ),
            )
    })
    .bind(&bind_addr)?
    .run()
    .await?;
    Ok(())
}
