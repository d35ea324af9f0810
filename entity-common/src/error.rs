use uuid::Uuid;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("table error: {0}")]
    Table(#[from] sqlx::Error),

    #[error("table migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("storage error: {0}")]
    Storage(#[from] opendal::Error),

    #[error("queue error: {0}")]
    Queue(String),

    /// The stored row does not describe a valid entity.
    #[error("corrupted entity {id}: {reason}")]
    Corrupted { id: Uuid, reason: String },

    #[error("entity {0} has already been processed")]
    AlreadyProcessed(Uuid),
}
