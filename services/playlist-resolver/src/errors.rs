//!
//! src/errors.rs
//!
//! Defines the error enum shared by the resolver core, the provider
//! clients and the batch caller, plus conversions from library errors
//!

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("config error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("http status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("provider error {code}: {message}")]
    Provider { code: i64, message: String },
    #[error("no catalog identifier resolvable for entry {0:?}")]
    MissingIdentifier(String),
    #[error("no search match for {0:?}")]
    NoMatch(String),
    #[error("cancelled before resolution")]
    Cancelled,
    #[error("task failed: {0}")]
    Task(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error)
}

impl From<reqwest::Error> for ResolverError {
    fn from(e: reqwest::Error) -> Self { ResolverError::Http(e.to_string()) }
}

impl From<serde_json::Error> for ResolverError {
    fn from(e: serde_json::Error) -> Self { ResolverError::Parse(e.to_string()) }
}
