//! Request body extraction with the service's error shape.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use tracing::debug;

use crate::errors::{Error, Result};

/// Client-facing message for any body that is not the expected JSON.
pub const INVALID_BODY: &str = "invalid request body";

/// [`Json`] whose rejection is a 400 `{"message"}` instead of axum's plain-text rejection.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            debug!("Rejected request body: {rejection}");
            Error::bad_request(INVALID_BODY)
        })?;
        Ok(Self(value))
    }
}
