use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Session expired or missing, log in again")]
    Unauthorized,

    #[error("Backend returned {status}: {message}")]
    Status { status: StatusCode, message: String },

    /// Mutation refused by the backend; the message is shown verbatim.
    #[error("{0}")]
    Rejected(String),

    #[error("Unexpected response shape: {0}")]
    Decode(String),

    #[error("{0} not found")]
    NotFound(String),
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Client-side form failures, rendered inline before anything is submitted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("Password must be at least {0} characters")]
    PasswordTooShort(usize),

    #[error("Password must mix upper and lower case letters, a digit and a symbol")]
    PasswordTooWeak,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("New password must differ from the current one")]
    PasswordUnchanged,

    #[error("Employee already holds {current}; choose a higher role than that")]
    WrongRole { current: String },

    #[error("Expiry must be in the future")]
    ExpiryInPast,

    #[error("Temporary access cannot exceed {0} days")]
    ExpiryTooFar(i64),
}

#[derive(Error, Debug)]
pub enum AccessError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Incorrect password")]
    SecondFactorFailed,
}
