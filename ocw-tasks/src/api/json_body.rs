//! JSON request body extractor
//!
//! Wraps `axum::Json` so malformed bodies are rejected as
//! `TaskError::InvalidRequest` and rendered with the standard
//! `{"error":{code,message}}` envelope.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::TaskError;

pub struct JsonBody<T>(pub T);

impl From<JsonRejection> for TaskError {
    fn from(rejection: JsonRejection) -> Self {
        TaskError::InvalidRequest(rejection.body_text())
    }
}

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = TaskError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}
