use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] gatechat_db::DbError),
    #[error("internal error: {0}")]
    Internal(String),
}
