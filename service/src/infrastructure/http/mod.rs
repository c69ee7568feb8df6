use anyhow::Context;
use axum::Router;
use axum::routing::get;
use axum_prometheus::PrometheusMetricLayer;

use crate::domain::AppState;
use crate::infrastructure::http::handlers::health_check;
use crate::infrastructure::http::handlers::item_types::{
    list_item_types, one_item_type, refresh_item_types,
};
use crate::infrastructure::http::handlers::items::{
    approve_item, create_item, delete_item, edit_item, get_item, inactivate_item, item_versions,
    list_items, new_item_version, possible_actions, reactivate_item,
};
use tokio::net;

mod api;
mod handlers;
mod querystring;

/// Configuration for the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpServerConfig<'a> {
    pub port: &'a str,
}

/// The application's HTTP server. The underlying HTTP package is opaque to module consumers.
pub struct HttpServer {
    router: axum::Router,
    listener: net::TcpListener,
}

impl HttpServer {
    /// Returns a new HTTP server bound to the port specified in `config`.
    pub async fn new(state: impl AppState, config: HttpServerConfig<'_>) -> anyhow::Result<Self> {
        // see: https://github.com/Ptrskay3/axum-prometheus
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

        let router = router(state)
            .route("/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);

        let listener = net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
            .await
            .with_context(|| format!("failed to listen on {}", config.port))?;

        Ok(Self { router, listener })
    }

    /// Runs the HTTP server.
    pub async fn run(self) -> anyhow::Result<()> {
        let address = self
            .listener
            .local_addr()
            .context("failed to read listener address")?;
        tracing::info!("listening on {}", address);
        axum::serve(self.listener, self.router)
            .await
            .context("received error from running server")?;
        Ok(())
    }
}

/// Application routes with request tracing, without the metrics endpoint
pub fn router<S: AppState>(state: S) -> Router {
    let trace_layer = tower_http::trace::TraceLayer::new_for_http().make_span_with(
        |request: &axum::extract::Request<_>| {
            let uri = request.uri().to_string();
            tracing::info_span!("http_request", method = ?request.method(), uri)
        },
    );

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .layer(trace_layer)
        .with_state(state)
}

fn api_routes<S: AppState>() -> Router<S> {
    Router::new()
        .route("/item-types", get(list_item_types::<S>))
        .route("/item-types/{item_type}", get(one_item_type::<S>))
        .route(
            "/item-types/refresh",
            axum::routing::post(refresh_item_types::<S>),
        )
        .route(
            "/items/{item_type}",
            get(list_items::<S>).post(create_item::<S>),
        )
        .route(
            "/items/{item_type}/{uid}",
            get(get_item::<S>)
                .patch(edit_item::<S>)
                .delete(delete_item::<S>),
        )
        .route(
            "/items/{item_type}/{uid}/versions",
            get(item_versions::<S>).post(new_item_version::<S>),
        )
        .route("/items/{item_type}/{uid}/actions", get(possible_actions::<S>))
        .route(
            "/items/{item_type}/{uid}/approvals",
            axum::routing::post(approve_item::<S>),
        )
        .route(
            "/items/{item_type}/{uid}/activations",
            axum::routing::post(reactivate_item::<S>).delete(inactivate_item::<S>),
        )
}

#[cfg(test)]
mod tests;
