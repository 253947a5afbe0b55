use serenity::model::id::UserId;
use thiserror::Error;

/// Failures surfaced by the queue engine and the template store.
///
/// Everything except [`QueueError::Storage`] and [`QueueError::Pool`] is an
/// expected, user-facing condition that is detected before any row is
/// written.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("user {0} is already in the queue")]
    AlreadyQueued(UserId),

    #[error("user {0} is not in the queue")]
    NotQueued(UserId),

    #[error("{0} is not a valid queue position")]
    InvalidPosition(i64),

    #[error("no one left in the queue")]
    EmptyQueue,

    #[error("template \"{0}\" not found")]
    TemplateNotFound(String),

    #[error("template name \"{0}\" is already taken")]
    TemplateNameTaken(String),

    #[error("could not generate an unused template name")]
    NameSpaceExhausted,

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

impl QueueError {
    pub fn is_storage(&self) -> bool {
        matches!(self, QueueError::Storage(_) | QueueError::Pool(_))
    }

    /// Busy or locked database: the caller may retry the whole operation.
    pub fn is_transient(&self) -> bool {
        match self {
            QueueError::Storage(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

pub type QueueResult<T> = std::result::Result<T, QueueError>;
