use actix_web::http::StatusCode;
use actix_web::ResponseError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("position must be a positive integer")]
    InvalidPosition,

    #[error("position is already taken")]
    DuplicatePosition,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("cannot delete {0}: dependent records exist")]
    Dependent(&'static str),

    #[error("option does not belong to the question")]
    OptionMismatch,

    #[error("question does not belong to the survey")]
    QuestionNotInSurvey,

    #[error("question is already answered in this run")]
    AlreadyAnswered,
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) | Error::InvalidPosition | Error::OptionMismatch | Error::QuestionNotInSurvey => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::DuplicatePosition | Error::Dependent(_) | Error::AlreadyAnswered => StatusCode::CONFLICT,
            Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
