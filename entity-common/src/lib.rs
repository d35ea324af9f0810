//! Shared building blocks of the Keyper services: the entity model and the
//! clients of the managed table, blob store and queue.

pub mod config;
pub mod entity;
pub mod error;
pub mod queue;
pub mod storage;
pub mod table;

pub use entity::{AnalysisResult, Entity, EntityResponse, EntityStatus, ErrorBody};
pub use error::{Error, Result};
pub use queue::{JetStreamQueue, PhotoQueue, QueueConfig};
pub use storage::{S3Config, Storage};
pub use table::{EntityTable, PostgresEntityTable};

#[cfg(any(test, feature = "test-utils"))]
pub use queue::MemoryQueue;
#[cfg(any(test, feature = "test-utils"))]
pub use table::MemoryEntityTable;
