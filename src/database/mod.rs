pub mod db_utils;
pub mod models;
pub mod validation;

#[cfg(test)]
pub mod factories;

use thiserror::Error;

use validation::Errors;

/** Errors raised by the model layer */
#[derive(Debug, Error)]
pub enum ModelError {
    /// The record failed validation and nothing was written
    #[error("validation failed: {0}")]
    Invalid(Errors),
    #[error(transparent)]
    Database(#[from] diesel::result::Error),
    #[error("setting `{name}` holds a malformed value: {source}")]
    MalformedSetting {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type ModelResult<T> = Result<T, ModelError>;

impl ModelError {
    /// Validation errors, if this is a validation failure
    pub fn errors(&self) -> Option<&Errors> {
        match self {
            ModelError::Invalid(errors) => Some(errors),
            _ => None,
        }
    }
}
