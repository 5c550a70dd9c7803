pub mod booking;
pub mod chat;
pub mod events;
pub mod live;
pub mod repository;
pub mod ride;
pub mod search;
pub mod user;

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;
