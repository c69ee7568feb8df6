use axum::http::StatusCode;

pub mod item_types;
pub mod items;

// health check handler
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}
