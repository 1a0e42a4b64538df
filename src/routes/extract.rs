use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::AppError;

/// `Json` whose rejections answer with the usual `{error}` body instead of axum's
/// plain-text ones.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => {
                debug!(error = %rejection.body_text(), "rejected request body");
                Err(rejection_to_error(rejection))
            }
        }
    }
}

fn rejection_to_error(rejection: JsonRejection) -> AppError {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            AppError::bad_request("Content-Type must be application/json")
        }
        JsonRejection::JsonSyntaxError(_) => AppError::bad_request("Malformed JSON"),
        JsonRejection::JsonDataError(_) => AppError::bad_request("Invalid JSON body"),
        // Body read failures such as an oversized upload keep their own status.
        other => AppError::new(other.status(), other.body_text()),
    }
}
