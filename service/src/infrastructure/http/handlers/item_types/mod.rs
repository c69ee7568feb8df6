use crate::domain::AppState;
use crate::infrastructure::http::api::{ApiError, ApiSuccess};
use crate::infrastructure::http::handlers::item_types::dto::{
    DetailedItemTypeResponse, ItemTypeResponse, RefreshResponse,
};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use cmdr_common::ItemTypeId;

mod dto;

pub async fn list_item_types<S: AppState>(
    State(state): State<S>,
) -> Result<ApiSuccess<Vec<ItemTypeResponse>>, ApiError> {
    let result = state
        .service()
        .item_types()
        .iterate()
        .iter()
        .map(|item_type| ItemTypeResponse::from(item_type.as_ref()))
        .collect::<Vec<_>>();

    Ok(ApiSuccess::new(StatusCode::OK, result))
}

pub async fn one_item_type<S: AppState>(
    Path(id): Path<String>,
    State(state): State<S>,
) -> Result<ApiSuccess<DetailedItemTypeResponse>, ApiError> {
    let item_type_id =
        ItemTypeId::try_new(id).map_err(|err| ApiError::UnprocessableEntity(err.to_string()))?;

    let item_type = state.service().item_type(&item_type_id)?;

    Ok(ApiSuccess::new(
        StatusCode::OK,
        DetailedItemTypeResponse::from(item_type.as_ref()),
    ))
}

/// Re-read the item type configuration; a broken file leaves the loaded set untouched
pub async fn refresh_item_types<S: AppState>(
    State(state): State<S>,
) -> Result<ApiSuccess<RefreshResponse>, ApiError> {
    let loaded = state
        .service()
        .item_types()
        .refresh()
        .map_err(|err| ApiError::UnprocessableEntity(format!("{:#}", err)))?;

    Ok(ApiSuccess::new(StatusCode::OK, RefreshResponse { loaded }))
}
