use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// A planner invariant was violated. The running transaction is still
    /// committed, then the planner terminates for external supervision.
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// A robot or external collaborator sent something outside the protocol
    /// (e.g. an unknown job status string).
    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DomainError {
    pub fn not_found(entity: &'static str, field: &'static str, value: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            field,
            value: value.into(),
        }
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    /// Whether the tick loop must terminate on this error instead of
    /// logging and carrying on with the next tick.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Invariant(_) | Self::Protocol(_))
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
