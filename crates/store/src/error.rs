use common::ProductId;
use domain::Version;
use thiserror::Error;

/// Errors that can occur when interacting with a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A conditional stock decrement found fewer units than requested.
    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// A write was made against a stale version.
    #[error(
        "Concurrency conflict for {entity} {id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        entity: &'static str,
        id: String,
        expected: Version,
        actual: Version,
    },

    /// A unique key (order id or idempotency key) is already taken.
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    /// The backend refused or could not serve the request.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A persisted record violates a domain invariant.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn already_exists(entity: &'static str, id: impl ToString) -> Self {
        StoreError::AlreadyExists {
            entity,
            id: id.to_string(),
        }
    }

    /// Builds an optimistic-concurrency failure and records it.
    pub fn conflict(
        entity: &'static str,
        id: impl ToString,
        expected: Version,
        actual: Version,
    ) -> Self {
        let id = id.to_string();
        tracing::debug!(entity, %id, %expected, %actual, "version conflict");
        metrics::counter!("store_concurrency_conflicts_total", "entity" => entity).increment(1);
        StoreError::ConcurrencyConflict {
            entity,
            id,
            expected,
            actual,
        }
    }

    /// Returns true for an optimistic-concurrency failure worth retrying.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::ConcurrencyConflict { .. })
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
