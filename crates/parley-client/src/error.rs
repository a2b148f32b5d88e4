use thiserror::Error;

use parley_net::ApiError;

/// Failures of the session layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Not logged in")]
    NotAuthenticated,

    /// Refresh failed or was impossible; the user has to log in again.
    #[error("Session expired. Please log in again.")]
    SessionInvalid,

    #[error("Login response carried no usable access token")]
    MissingSubject,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("{0}")]
    Auth(#[from] AuthError),

    /// Input rejected before any request was sent.
    #[error("{0}")]
    Validation(String),
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
