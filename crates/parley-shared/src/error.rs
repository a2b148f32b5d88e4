use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token must have three dot-separated segments")]
    Malformed,

    #[error("Token payload is not valid base64")]
    Encoding,

    #[error("Token payload is not a JSON object")]
    Payload,

    #[error("Token carries no subject")]
    MissingSubject,
}
