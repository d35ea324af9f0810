use bytes::Bytes;
use entity_common::{Entity, EntityResponse};
use image::ImageFormat;
use poem::{
    handler,
    web::{Data, Field, Json, Multipart},
};
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

/// The media types a photo can be uploaded as.
const ACCEPTED_MEDIA_TYPES: [&str; 2] = ["image/png", "image/jpeg"];

/// Upload a photo and queue it for recognition.
///
/// The photo is the first file attached to the multipart body. The response
/// is the new entity, which stays `uploaded` until the recognition worker
/// processes it. Poll `GET /api/entities/:id` for the results.
#[handler]
pub async fn create_entity(
    Data(state): Data<&AppState>,
    multipart: poem::Result<Multipart>,
) -> poem::Result<Json<EntityResponse>> {
    tracing::info!("Uploading a photo and creating an entity");

    let multipart = multipart.map_err(|_| ApiError::NoImage)?;
    let field = first_file(multipart).await?;

    if !field.content_type().is_some_and(is_accepted_media_type) {
        return Err(ApiError::UnsupportedMedia.into());
    }

    let photo = field
        .bytes()
        .await
        .map(Bytes::from)
        .map_err(|_| ApiError::UnreadableImage)?;
    if photo.is_empty() {
        return Err(ApiError::NoImage.into());
    }

    // the declared type is not trusted, so check the content as well
    let content_type = sniff_media_type(&photo).ok_or(ApiError::UnsupportedMedia)?;

    let entity = Entity::uploaded(Uuid::new_v4());
    tracing::info!(id = %entity.id, content_type, "Accepted a photo");

    state
        .storage
        .put_photo(entity.id, photo, content_type)
        .await
        .map_err(ApiError::storage("Unable to upload image to storage"))?;

    state
        .table
        .upsert(&entity)
        .await
        .map_err(ApiError::storage("Unable to create an entry in the entity table"))?;

    state
        .queue
        .enqueue(entity.id)
        .await
        .map_err(ApiError::storage("Unable to add a message to the queue"))?;

    let url = state
        .storage
        .photo_url(entity.id)
        .await
        .map_err(ApiError::storage("Unable to sign the photo URL"))?;

    Ok(Json(EntityResponse::new(entity, url)))
}

/// Find the first field of the form that is a file.
async fn first_file(mut multipart: Multipart) -> Result<Field, ApiError> {
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.file_name().is_some() => return Ok(field),
            Ok(Some(_)) => continue,
            Ok(None) => return Err(ApiError::NoImage),
            Err(err) => {
                tracing::warn!("Failed to parse the multipart body: {err}");
                return Err(ApiError::UnreadableImage);
            }
        }
    }
}

fn is_accepted_media_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    ACCEPTED_MEDIA_TYPES.contains(&essence.as_str())
}

/// The media type of the photo, judging by its content.
fn sniff_media_type(photo: &[u8]) -> Option<&'static str> {
    match image::guess_format(photo) {
        Ok(format @ (ImageFormat::Png | ImageFormat::Jpeg)) => Some(format.to_mime_type()),
        _ => None,
    }
}
