use entity_common::ErrorBody;
use poem::{IntoResponse, Response, error::ResponseError, http::StatusCode, web::Json};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("No image was attached. Attach an image to request.")]
    NoImage,

    #[error("Unable to read the image from the request body")]
    UnreadableImage,

    #[error("Invalid file was attached. Only PNG and JPEG images are accepted")]
    UnsupportedMedia,

    #[error("No entity with such id exists.")]
    EntityNotFound,

    /// The table, the storage or the queue failed.
    #[error("{message}")]
    Storage {
        message: &'static str,
        #[source]
        source: entity_common::Error,
    },
}

impl ApiError {
    /// Wrap a failure of the managed services, logging its cause.
    pub fn storage(message: &'static str) -> impl FnOnce(entity_common::Error) -> Self {
        move |source| {
            tracing::error!("{message}: {source}");
            Self::Storage { message, source }
        }
    }
}

impl ResponseError for ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NoImage | ApiError::UnreadableImage => StatusCode::BAD_REQUEST,
            ApiError::UnsupportedMedia => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::EntityNotFound => StatusCode::NOT_FOUND,
            ApiError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn as_response(&self) -> Response
    where
        Self: std::error::Error + Send + Sync + 'static,
    {
        (self.status(), Json(ErrorBody::new(self.to_string()))).into_response()
    }
}
