use rollcall_core::UserId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Registration collision; reported to the caller, never retried.
    #[error("a user with roll number {0} is already registered")]
    DuplicateIdentity(String),
    /// Internal consistency fault: a caller passed a user id that does not
    /// reference a registered user.
    #[error("user id {0} does not reference a registered user")]
    ForeignKey(UserId),
    #[error("feature vector for user {user_id}: {source}")]
    Features {
        user_id: UserId,
        source: serde_json::Error,
    },
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
