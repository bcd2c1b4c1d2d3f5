//! Request extractors that reject with the API error body.
//!
//! axum's own `Json` and `Query` reject with a plain-text body. These keep
//! the rejection's status but answer `{"success": false, "code":
//! "INVALID_PARAMETER", "error": ...}` like every other failure.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;

use super::response::{ApiError, error_codes};

/// JSON body extractor
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
            ApiError::new(
                e.status(),
                error_codes::INVALID_PARAMETER,
                format!("Invalid JSON: {}", e.body_text()),
            )
        })?;
        Ok(Self(value))
    }
}

/// Query string extractor
#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| {
                ApiError::new(
                    e.status(),
                    error_codes::INVALID_PARAMETER,
                    format!("Invalid query: {}", e.body_text()),
                )
            })?;
        Ok(Self(value))
    }
}
