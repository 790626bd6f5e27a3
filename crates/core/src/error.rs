use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unknown {category} code: {code}")]
    UnknownCode {
        category: &'static str,
        code: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}
