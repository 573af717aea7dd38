use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("pool '{pool}' is not configured")]
    PoolNotFound { pool: String },

    #[error("pool '{pool}' is outside its activity window")]
    PoolInactive { pool: String },

    #[error("draw count must be positive, got {count}")]
    InvalidCount { count: i64 },

    #[error("not enough tickets: owned {owned}, needed {needed}")]
    InsufficientTickets { owned: i64, needed: i64 },

    #[error("event '{event}' is not configured")]
    EventNotFound { event: String },

    #[error("event '{event}' is disabled or outside its activity window")]
    EventClosed { event: String },

    #[error("participation limit reached for '{key}'")]
    LimitReached { key: String },

    #[error("reward table nesting exceeds {max} levels")]
    CyclicConfig { max: usize },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
