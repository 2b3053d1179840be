/// Errors returned by forum operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForumError {
    Validation(&'static str),
    /// The named resource does not exist
    NotFound(&'static str),
    /// Caller is neither the author nor an admin
    NotAuthorized,
    /// The identity service did not answer in time
    DeadlineExceeded,
    Internal(String),
}

impl std::fmt::Display for ForumError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "validation error: {}", msg),
            Self::NotFound(what) => write!(f, "{} not found", what),
            Self::NotAuthorized => write!(f, "user not authorized"),
            Self::DeadlineExceeded => write!(f, "identity service deadline exceeded"),
            Self::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for ForumError {}
