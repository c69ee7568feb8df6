use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cmdr_common::ItemError;
use serde::Serialize;

use crate::domain::repository::RepositoryError;
use crate::domain::service::ServiceError;

// ApiSuccess is a wrapper around a response that includes a status code.

#[derive(Debug, Clone)]
pub struct ApiSuccess<T: Serialize>(StatusCode, Json<T>);

impl<T: Serialize> ApiSuccess<T> {
    pub(crate) fn new(status: StatusCode, data: T) -> Self {
        ApiSuccess(status, Json(data))
    }
}

impl<T: Serialize> IntoResponse for ApiSuccess<T> {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}

// ApiError is a wrapper around a response that includes a status code.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    InternalServerError(String),
    BadRequest(String),
    UnprocessableEntity(String),
    ConflictWithServerState(String),
    NotFound(String),
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::InternalServerError(e.to_string())
    }
}

impl From<RepositoryError> for ApiError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound => Self::NotFound(value.to_string()),
            RepositoryError::UniqueViolation(_) | RepositoryError::ConcurrentModification(_) => {
                Self::ConflictWithServerState(value.to_string())
            }
            RepositoryError::DatabaseError(cause) => {
                tracing::error!("{:?}", cause);
                Self::InternalServerError("Database server error".to_string())
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::NotFound(_) => Self::NotFound(value.to_string()),
            ServiceError::AlreadyExists(message) => Self::ConflictWithServerState(message),
            ServiceError::InvalidReference(message) => Self::UnprocessableEntity(message),
            ServiceError::Validation(cause) => Self::UnprocessableEntity(cause.to_string()),
            ServiceError::Item(ItemError::Metadata(cause)) => {
                Self::InternalServerError(cause.to_string())
            }
            ServiceError::Item(cause) => Self::BadRequest(cause.to_string()),
            ServiceError::Repository(cause) => cause.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use ApiError::*;

        let (status, message) = match self {
            InternalServerError(e) => {
                tracing::error!("{}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            UnprocessableEntity(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
            ConflictWithServerState(message) => (StatusCode::CONFLICT, message),
            NotFound(message) => (StatusCode::NOT_FOUND, message),
        };

        (status, Json(ApiResponseBody::new_error(status, message))).into_response()
    }
}

// Generic response structure shared by all API responses.

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponseBody<T: Serialize + PartialEq> {
    pub status_code: u16,
    pub data: T,
}

impl ApiResponseBody<ApiErrorData> {
    pub fn new_error(status_code: StatusCode, message: String) -> Self {
        Self {
            status_code: status_code.as_u16(),
            data: ApiErrorData { message },
        }
    }
}

/// The response data format for all error responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiErrorData {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use cmdr_common::{InvalidTransitionError, ItemUid, LibraryItemStatus, ObjectAction, Version};

    use super::*;

    #[test]
    fn invalid_transition_is_a_bad_request() {
        let error = ServiceError::Item(ItemError::InvalidTransition(InvalidTransitionError {
            action: ObjectAction::Approve,
            status: LibraryItemStatus::Final,
            version: Version::new(1, 0),
        }));

        assert!(matches!(ApiError::from(error), ApiError::BadRequest(_)));
    }

    #[test]
    fn stale_write_is_a_conflict() {
        let uid = ItemUid::try_new("Compound_000001").unwrap();
        let error = ServiceError::Repository(RepositoryError::ConcurrentModification(uid));

        assert!(matches!(
            ApiError::from(error),
            ApiError::ConflictWithServerState(_)
        ));
    }

    #[test]
    fn database_details_are_not_exposed() {
        let error = ApiError::from(RepositoryError::DatabaseError("password leaked".to_string()));

        assert_eq!(
            error,
            ApiError::InternalServerError("Database server error".to_string())
        );
    }
}
