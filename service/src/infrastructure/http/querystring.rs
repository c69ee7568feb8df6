use std::ops::Deref;

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use serde_querystring::ParseMode;

use crate::infrastructure::http::api::ApiError;

/// Query string extractor, rejects malformed parameters with a JSON error body
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryString<T>(pub T);

impl<T, S> FromRequestParts<S> for QueryString<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let query = parts.uri.query().unwrap_or_default();
        let value = serde_querystring::from_str(query, ParseMode::UrlEncoded).map_err(|e| {
            ApiError::BadRequest(format!("Failed to deserialize query string: {}", e))
                .into_response()
        })?;
        Ok(QueryString(value))
    }
}

impl<T> Deref for QueryString<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
