use thiserror::Error;

/// Structured error kinds for every store operation.
///
/// Domain rejections carry the human-readable reason the client shows;
/// storage faults keep their source instead of collapsing to a string.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Username already exists")]
    DuplicateUsername,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Cannot target yourself")]
    SelfTarget,

    #[error("Already friends")]
    AlreadyFriends,

    #[error("Friend request already sent")]
    DuplicateRequest,

    #[error("You must be friends to send messages")]
    NotFriends,

    #[error("Cannot send message: user is blocked")]
    Blocked,

    #[error("User already blocked")]
    AlreadyBlocked,

    #[error("User is already a member")]
    AlreadyMember,

    #[error("Invitation already sent")]
    DuplicateInvite,

    #[error("You are not a member of this group")]
    NotMember,

    #[error("Only admins can do that")]
    PermissionDenied,

    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    #[error("storage fault: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("internal: {0}")]
    Internal(String),
}

impl StoreError {
    /// True for rejections the caller caused, as opposed to storage faults.
    pub fn is_domain(&self) -> bool {
        !matches!(
            self,
            Self::Sqlite(_) | Self::Internal(_) | Self::PasswordHash(_)
        )
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
