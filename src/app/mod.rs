pub mod config;

use std::num::ParseIntError;

use actix_web::error::BlockingError;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use diesel::r2d2::PoolError;
use diesel::sqlite::SqliteConnection;
use serde_json::json;
use thiserror::Error;

use crate::database::db_utils::DbPool;
use crate::database::validation::Errors;
use crate::database::ModelError;

/** Used for storing the database connections when handling requests */
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
}

impl AppState {
    pub fn new(pool: DbPool) -> Self {
        AppState { pool }
    }

    /// Runs blocking database work on the actix blocking pool with a pooled
    /// connection.
    pub async fn run<F, T>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, AppError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        web::block(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await?
    }
}

/** Holds the errors we will used during request processing */
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request")]
    BadRequest,
    #[error("Forbidden")]
    Forbidden,
    #[error("Not found")]
    NotFound,
    #[error("Unprocessable entity: {0}")]
    Invalid(Errors),
    #[error("Internal server error")]
    InternalServerError,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest => StatusCode::BAD_REQUEST,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::Invalid(errors) => HttpResponse::build(self.status_code())
                .json(json!({ "errors": errors.full_messages() })),
            _ => HttpResponse::new(self.status_code()),
        }
    }
}

impl From<diesel::result::Error> for AppError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => AppError::NotFound,
            diesel::result::Error::InvalidCString(_) => AppError::BadRequest,
            err => {
                log::error!("database error: {err}");
                AppError::InternalServerError
            }
        }
    }
}

impl From<ModelError> for AppError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Invalid(errors) => AppError::Invalid(errors),
            ModelError::Database(err) => err.into(),
            err @ ModelError::MalformedSetting { .. } => {
                log::error!("{err}");
                AppError::InternalServerError
            }
        }
    }
}

impl From<PoolError> for AppError {
    fn from(err: PoolError) -> Self {
        log::error!("could not check out a database connection: {err}");
        AppError::InternalServerError
    }
}

impl From<BlockingError> for AppError {
    fn from(_: BlockingError) -> Self {
        log::error!("blocking task was canceled");
        AppError::InternalServerError
    }
}

impl From<ParseIntError> for AppError {
    fn from(_: ParseIntError) -> Self {
        Self::BadRequest
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        match err.classify() {
            serde_json::error::Category::Io => AppError::InternalServerError,
            _ => AppError::BadRequest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::BadRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::InternalServerError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_conversions() {
        assert!(matches!(
            AppError::from(diesel::result::Error::NotFound),
            AppError::NotFound
        ));
        assert!(matches!(
            AppError::from("x".parse::<i32>().unwrap_err()),
            AppError::BadRequest
        ));
        assert!(matches!(
            AppError::from(serde_json::from_str::<i32>("{").unwrap_err()),
            AppError::BadRequest
        ));
        assert!(matches!(
            AppError::from(ModelError::Database(diesel::result::Error::RollbackTransaction)),
            AppError::InternalServerError
        ));
    }

    #[actix_rt::test]
    async fn test_invalid_lists_messages() {
        let mut errors = Errors::new();
        errors.add("name", crate::database::validation::BLANK);
        let err = AppError::from(ModelError::Invalid(errors));

        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({ "errors": ["Name can't be blank"] }));
    }
}
