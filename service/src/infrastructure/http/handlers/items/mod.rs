use std::str::FromStr;

use crate::domain::AppState;
use crate::domain::repository::query::{DEFAULT_PAGE_SIZE, ItemQuery};
use crate::domain::service::VersionSelector;
use crate::infrastructure::http::api::{ApiError, ApiSuccess};
use crate::infrastructure::http::handlers::items::dto::{
    CreateItemRequest, EditItemRequest, ItemResponse, ListParams, ManyItemsResponse,
    NewVersionRequest, ReadParams, TransitionRequest,
};
use crate::infrastructure::http::querystring::QueryString;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::Json;
use chrono::{DateTime, Utc};
use cmdr_common::{
    AuthorId, ItemTypeId, ItemUid, LibraryItemStatus, LibraryName, ObjectAction, Version,
};

mod dto;

pub const AUTHOR_HEADER: &str = "x-author-id";
pub const UNKNOWN_AUTHOR: &str = "unknown-user";

/// Author of a change, taken from the `X-Author-Id` header
#[derive(Debug, Clone)]
pub struct Author(pub AuthorId);

impl<S: Send + Sync> FromRequestParts<S> for Author {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let author = match parts.headers.get(AUTHOR_HEADER) {
            Some(header) => header
                .to_str()
                .map_err(|err| ApiError::BadRequest(err.to_string()))?,
            None => UNKNOWN_AUTHOR,
        };
        AuthorId::try_new(author)
            .map(Author)
            .map_err(|err| ApiError::UnprocessableEntity(err.to_string()))
    }
}

pub async fn list_items<S: AppState>(
    Path(item_type): Path<String>,
    QueryString(params): QueryString<ListParams>,
    State(state): State<S>,
) -> Result<ApiSuccess<ManyItemsResponse>, ApiError> {
    let item_type = parse_item_type(item_type)?;

    let mut query = ItemQuery::new().paginate(
        params.page.unwrap_or(1),
        params.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    );
    if let Some(status) = params.status {
        query = query.with_status(parse::<LibraryItemStatus>(&status)?);
    }
    if let Some(library) = params.library {
        let library = LibraryName::try_new(library)
            .map_err(|err| ApiError::UnprocessableEntity(err.to_string()))?;
        query = query.with_library(library);
    }

    let items = state.service().list(&item_type, &query).await?;
    let total = state.service().count(&item_type, &query).await?;
    let data: Vec<ItemResponse> = items.iter().map(ItemResponse::from).collect();

    Ok(ApiSuccess::new(
        StatusCode::OK,
        ManyItemsResponse::new(data, total),
    ))
}

pub async fn create_item<S: AppState>(
    Path(item_type): Path<String>,
    State(state): State<S>,
    Author(author): Author,
    Json(request): Json<CreateItemRequest>,
) -> Result<ApiSuccess<ItemResponse>, ApiError> {
    let item_type = parse_item_type(item_type)?;
    let library = LibraryName::try_new(request.library)
        .map_err(|err| ApiError::UnprocessableEntity(err.to_string()))?;

    let item = state
        .service()
        .create(&item_type, &library, &request.value, author)
        .await?;

    Ok(ApiSuccess::new(StatusCode::CREATED, (&item).into()))
}

pub async fn get_item<S: AppState>(
    Path((item_type, uid)): Path<(String, String)>,
    QueryString(params): QueryString<ReadParams>,
    State(state): State<S>,
) -> Result<ApiSuccess<ItemResponse>, ApiError> {
    let (item_type, uid) = parse_path(item_type, uid)?;
    let selector = match (params.version, params.status, params.at) {
        (None, None, None) => VersionSelector::Latest,
        (Some(version), None, None) => VersionSelector::Version(parse::<Version>(&version)?),
        (None, Some(status), None) => VersionSelector::Status(parse::<LibraryItemStatus>(&status)?),
        (None, None, Some(at)) => VersionSelector::At(parse_instant(&at)?),
        _ => {
            return Err(ApiError::BadRequest(
                "only one of version, status and at can be given".to_string(),
            ));
        }
    };

    let item = state.service().get(&item_type, &uid, selector).await?;

    Ok(ApiSuccess::new(StatusCode::OK, (&item).into()))
}

pub async fn edit_item<S: AppState>(
    Path((item_type, uid)): Path<(String, String)>,
    State(state): State<S>,
    Author(author): Author,
    Json(request): Json<EditItemRequest>,
) -> Result<ApiSuccess<ItemResponse>, ApiError> {
    let (item_type, uid) = parse_path(item_type, uid)?;

    let item = state
        .service()
        .edit(
            &item_type,
            &uid,
            &request.value,
            request.change_description,
            author,
        )
        .await?;

    Ok(ApiSuccess::new(StatusCode::OK, (&item).into()))
}

pub async fn delete_item<S: AppState>(
    Path((item_type, uid)): Path<(String, String)>,
    State(state): State<S>,
) -> Result<StatusCode, ApiError> {
    let (item_type, uid) = parse_path(item_type, uid)?;

    state.service().delete(&item_type, &uid).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn item_versions<S: AppState>(
    Path((item_type, uid)): Path<(String, String)>,
    State(state): State<S>,
) -> Result<ApiSuccess<Vec<ItemResponse>>, ApiError> {
    let (item_type, uid) = parse_path(item_type, uid)?;

    let history = state.service().versions(&item_type, &uid).await?;

    Ok(ApiSuccess::new(
        StatusCode::OK,
        history.iter().map(ItemResponse::from).collect(),
    ))
}

pub async fn possible_actions<S: AppState>(
    Path((item_type, uid)): Path<(String, String)>,
    State(state): State<S>,
) -> Result<ApiSuccess<Vec<ObjectAction>>, ApiError> {
    let (item_type, uid) = parse_path(item_type, uid)?;

    let actions = state.service().possible_actions(&item_type, &uid).await?;

    Ok(ApiSuccess::new(StatusCode::OK, actions.into_iter().collect()))
}

pub async fn approve_item<S: AppState>(
    Path((item_type, uid)): Path<(String, String)>,
    State(state): State<S>,
    Author(author): Author,
    request: Option<Json<TransitionRequest>>,
) -> Result<ApiSuccess<ItemResponse>, ApiError> {
    let (item_type, uid) = parse_path(item_type, uid)?;
    let request = request.map(|Json(request)| request).unwrap_or_default();

    let item = state
        .service()
        .approve(&item_type, &uid, request.change_description, author)
        .await?;

    Ok(ApiSuccess::new(StatusCode::CREATED, (&item).into()))
}

pub async fn new_item_version<S: AppState>(
    Path((item_type, uid)): Path<(String, String)>,
    State(state): State<S>,
    Author(author): Author,
    request: Option<Json<NewVersionRequest>>,
) -> Result<ApiSuccess<ItemResponse>, ApiError> {
    let (item_type, uid) = parse_path(item_type, uid)?;
    let request = request.map(|Json(request)| request).unwrap_or_default();

    let item = state
        .service()
        .new_version(
            &item_type,
            &uid,
            request.value.as_ref(),
            request.change_description,
            author,
        )
        .await?;

    Ok(ApiSuccess::new(StatusCode::CREATED, (&item).into()))
}

pub async fn inactivate_item<S: AppState>(
    Path((item_type, uid)): Path<(String, String)>,
    State(state): State<S>,
    Author(author): Author,
    request: Option<Json<TransitionRequest>>,
) -> Result<ApiSuccess<ItemResponse>, ApiError> {
    let (item_type, uid) = parse_path(item_type, uid)?;
    let request = request.map(|Json(request)| request).unwrap_or_default();

    let item = state
        .service()
        .inactivate(&item_type, &uid, request.change_description, author)
        .await?;

    Ok(ApiSuccess::new(StatusCode::OK, (&item).into()))
}

pub async fn reactivate_item<S: AppState>(
    Path((item_type, uid)): Path<(String, String)>,
    State(state): State<S>,
    Author(author): Author,
    request: Option<Json<TransitionRequest>>,
) -> Result<ApiSuccess<ItemResponse>, ApiError> {
    let (item_type, uid) = parse_path(item_type, uid)?;
    let request = request.map(|Json(request)| request).unwrap_or_default();

    let item = state
        .service()
        .reactivate(&item_type, &uid, request.change_description, author)
        .await?;

    Ok(ApiSuccess::new(StatusCode::OK, (&item).into()))
}

fn parse_item_type(item_type: String) -> Result<ItemTypeId, ApiError> {
    ItemTypeId::try_new(item_type).map_err(|err| ApiError::UnprocessableEntity(err.to_string()))
}

fn parse_path(item_type: String, uid: String) -> Result<(ItemTypeId, ItemUid), ApiError> {
    let uid = ItemUid::try_new(uid).map_err(|err| ApiError::UnprocessableEntity(err.to_string()))?;
    Ok((parse_item_type(item_type)?, uid))
}

fn parse<T>(value: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|err| ApiError::BadRequest(err.to_string()))
}

fn parse_instant(value: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| ApiError::BadRequest(format!("invalid instant '{}': {}", value, err)))
}
