use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    entity::{AnalysisResult, Entity},
    error::{Error, Result},
};

/// The table holding one row per entity, keyed by the entity ID.
#[async_trait::async_trait]
pub trait EntityTable: Send + Sync {
    /// Get the entity with such ID, if any.
    async fn get(&self, id: Uuid) -> Result<Option<Entity>>;

    /// Insert the entity, or replace the stored status and results.
    async fn upsert(&self, entity: &Entity) -> Result<()>;
}

#[derive(Clone)]
pub struct PostgresEntityTable {
    pool: sqlx::PgPool,
}

impl PostgresEntityTable {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = sqlx::PgPool::connect(url).await?;

        Ok(Self { pool })
    }

    /// Create the entity table if it does not exist yet.
    pub async fn ensure(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct EntityRow {
    id: Uuid,
    status: String,
    results: Json<Vec<AnalysisResult>>,
}

impl TryFrom<EntityRow> for Entity {
    type Error = Error;

    fn try_from(row: EntityRow) -> Result<Self> {
        let status = row.status.parse().map_err(|reason| Error::Corrupted {
            id: row.id,
            reason,
        })?;

        Ok(Entity {
            id: row.id,
            status,
            results: row.results.0,
        })
    }
}

#[async_trait::async_trait]
impl EntityTable for PostgresEntityTable {
    #[tracing::instrument(skip(self))]
    async fn get(&self, id: Uuid) -> Result<Option<Entity>> {
        let row = sqlx::query_as::<_, EntityRow>(
            r#"
            SELECT id, status, results FROM entities WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Entity::try_from).transpose()
    }

    #[tracing::instrument(skip(self, entity), fields(id = %entity.id, status = %entity.status))]
    async fn upsert(&self, entity: &Entity) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO entities (id, status, results)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET status = EXCLUDED.status, results = EXCLUDED.results, updated_at = NOW()
            "#,
        )
        .bind(entity.id)
        .bind(entity.status.as_str())
        .bind(Json(&entity.results))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryEntityTable;

#[cfg(any(test, feature = "test-utils"))]
mod memory {
    use std::collections::HashMap;

    use tokio::sync::RwLock;
    use uuid::Uuid;

    use super::EntityTable;
    use crate::{entity::Entity, error::Result};

    /// An entity table kept in memory, for tests.
    #[derive(Default)]
    pub struct MemoryEntityTable {
        entities: RwLock<HashMap<Uuid, Entity>>,
    }

    impl MemoryEntityTable {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn len(&self) -> usize {
            self.entities.read().await.len()
        }

        pub async fn is_empty(&self) -> bool {
            self.entities.read().await.is_empty()
        }
    }

    #[async_trait::async_trait]
    impl EntityTable for MemoryEntityTable {
        async fn get(&self, id: Uuid) -> Result<Option<Entity>> {
            Ok(self.entities.read().await.get(&id).cloned())
        }

        async fn upsert(&self, entity: &Entity) -> Result<()> {
            self.entities
                .write()
                .await
                .insert(entity.id, entity.clone());

            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityStatus;

    #[tokio::test]
    async fn test_memory_table_upsert_replaces() {
        let table = MemoryEntityTable::new();
        let id = Uuid::new_v4();

        assert!(table.get(id).await.unwrap().is_none());

        let mut entity = Entity::uploaded(id);
        table.upsert(&entity).await.unwrap();
        assert_eq!(
            table.get(id).await.unwrap().unwrap().status,
            EntityStatus::Uploaded
        );

        entity
            .process(vec![AnalysisResult::tag("keys", 0.7)])
            .unwrap();
        table.upsert(&entity).await.unwrap();

        assert_eq!(table.len().await, 1);
        assert_eq!(table.get(id).await.unwrap().unwrap(), entity);
    }

    #[test]
    fn test_row_with_unknown_status_is_corrupted() {
        let id = Uuid::new_v4();
        let row = EntityRow {
            id,
            status: "archived".to_string(),
            results: Json(Vec::new()),
        };

        let err = Entity::try_from(row).unwrap_err();
        assert!(matches!(err, Error::Corrupted { id: corrupted, .. } if corrupted == id));
    }

    #[test]
    fn test_row_converts_to_entity() {
        let id = Uuid::new_v4();
        let row = EntityRow {
            id,
            status: "processed".to_string(),
            results: Json(vec![AnalysisResult::tag("key", 0.4)]),
        };

        let entity = Entity::try_from(row).unwrap();
        assert_eq!(entity.status, EntityStatus::Processed);
        assert_eq!(entity.results.len(), 1);
    }
}
