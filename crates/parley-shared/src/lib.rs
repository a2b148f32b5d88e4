//! # parley-shared
//!
//! Types shared by every Parley crate: the backend's wire models, identifier
//! newtypes, broker destination names, bearer token inspection and timestamp
//! helpers. Nothing in here performs I/O.

pub mod constants;
pub mod destinations;
pub mod error;
pub mod models;
pub mod time;
pub mod token;
pub mod types;

pub use error::{SharedError, TokenError};
pub use token::Credential;
