use entity_common::EntityResponse;
use poem::{
    handler,
    web::{Data, Json, Path},
};
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

/// Get an entity, including the recognition results once it is processed.
///
/// The URL of the photo is signed again on every request.
#[handler]
pub async fn get_entity(
    Data(state): Data<&AppState>,
    Path(id): Path<String>,
) -> poem::Result<Json<EntityResponse>> {
    let id = Uuid::parse_str(&id).map_err(|_| ApiError::EntityNotFound)?;

    let entity = state
        .table
        .get(id)
        .await
        .map_err(ApiError::storage("Unable to read entities from the entity table"))?
        .ok_or(ApiError::EntityNotFound)?;

    tracing::debug!(%id, status = %entity.status, "Found the entity");

    let url = state
        .storage
        .photo_url(entity.id)
        .await
        .map_err(ApiError::storage("Unable to sign the photo URL"))?;

    Ok(Json(EntityResponse::new(entity, url)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use entity_common::{
        AnalysisResult, Entity, EntityStatus, EntityTable, ErrorBody, MemoryEntityTable,
        MemoryQueue, Storage,
    };
    use poem::{http::StatusCode, test::TestClient};

    use super::*;
    use crate::app;

    fn client(table: Arc<MemoryEntityTable>, storage: Storage) -> TestClient<poem::endpoint::BoxEndpoint<'static>> {
        TestClient::new(app(
            AppState {
                table,
                storage: Arc::new(storage),
                queue: Arc::new(MemoryQueue::new()),
            },
            &[],
        ))
    }

    fn public_storage() -> Storage {
        Storage::memory()
            .unwrap()
            .with_public_base_url(Some("https://photos.example".to_string()))
    }

    #[tokio::test]
    async fn test_get_uploaded_entity() {
        let table = Arc::new(MemoryEntityTable::new());
        let entity = Entity::uploaded(Uuid::new_v4());
        table.upsert(&entity).await.unwrap();

        let response = client(table, public_storage())
            .get(format!("/api/entities/{}", entity.id))
            .send()
            .await;
        response.assert_status_is_ok();

        let body: EntityResponse = response.0.into_body().into_json().await.unwrap();
        assert_eq!(body.id, entity.id);
        assert_eq!(body.status, EntityStatus::Uploaded);
        assert!(body.results.is_empty());
        assert_eq!(body.url, format!("https://photos.example/{}", entity.id));
    }

    #[tokio::test]
    async fn test_get_processed_entity() {
        let table = Arc::new(MemoryEntityTable::new());
        let mut entity = Entity::uploaded(Uuid::new_v4());
        let results = vec![
            AnalysisResult {
                x: 532,
                y: 97,
                w: 3609,
                h: 2485,
                label: "a desk with keys and a cord".to_string(),
                confidence: 0.58,
            },
            AnalysisResult::tag("keys", 0.91),
        ];
        entity.process(results.clone()).unwrap();
        table.upsert(&entity).await.unwrap();

        let response = client(table, public_storage())
            .get(format!("/api/entities/{}", entity.id))
            .send()
            .await;
        response.assert_status_is_ok();

        let body: EntityResponse = response.0.into_body().into_json().await.unwrap();
        assert_eq!(body.status, EntityStatus::Processed);
        assert_eq!(body.results, results);
    }

    #[tokio::test]
    async fn test_get_missing_entity_is_not_found() {
        let response = client(Arc::new(MemoryEntityTable::new()), public_storage())
            .get(format!("/api/entities/{}", Uuid::new_v4()))
            .send()
            .await;
        response.assert_status(StatusCode::NOT_FOUND);

        let body: ErrorBody = response.0.into_body().into_json().await.unwrap();
        assert_eq!(body.reason, "No entity with such id exists.");
    }

    #[tokio::test]
    async fn test_get_malformed_id_is_not_found() {
        let response = client(Arc::new(MemoryEntityTable::new()), public_storage())
            .get("/api/entities/not-a-uuid")
            .send()
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_table_failure_is_internal_error() {
        let client = TestClient::new(app(
            AppState {
                table: Arc::new(crate::mutation::tests::OfflineTable),
                storage: Arc::new(public_storage()),
                queue: Arc::new(MemoryQueue::new()),
            },
            &[],
        ));

        let response = client
            .get(format!("/api/entities/{}", Uuid::new_v4()))
            .send()
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

        let body: ErrorBody = response.0.into_body().into_json().await.unwrap();
        assert_eq!(body.status, "error");
        assert_eq!(body.reason, "Unable to read entities from the entity table");
    }

    #[tokio::test]
    async fn test_get_unsigned_url_is_internal_error() {
        let table = Arc::new(MemoryEntityTable::new());
        let entity = Entity::uploaded(Uuid::new_v4());
        table.upsert(&entity).await.unwrap();

        // the memory backend cannot presign
        let response = client(table, Storage::memory().unwrap())
            .get(format!("/api/entities/{}", entity.id))
            .send()
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    }
}
