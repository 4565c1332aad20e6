//! Axum http server factory. Axum provides routing capability on top of Hyper HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::RawQuery;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::ACCEPT;
use axum::response::Html;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::configuration::Configuration;
use crate::graphql;
use crate::service::GraphQLService;

/// Builds the router serving GraphQL requests and the health check.
pub fn make_router(configuration: &Configuration, service: Arc<GraphQLService>) -> Router {
    let display_landing_page = configuration.server.landing_page;
    Router::new()
        .route(
            &configuration.server.path,
            get(
                move |State(service): State<Arc<GraphQLService>>,
                      headers: HeaderMap,
                      RawQuery(query): RawQuery| {
                    handle_get(service, headers, query, display_landing_page)
                },
            )
            .post(handle_post),
        )
        .layer(TraceLayer::new_for_http())
        .route(&configuration.server.health_check_path, get(health_check))
        .layer(configuration.cors.clone().into_layer())
        .with_state(service)
}

/// Serves `service` on the configured address until Ctrl-C is received.
pub async fn serve(
    configuration: &Configuration,
    service: Arc<GraphQLService>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(configuration.server.listen).await?;
    let address = listener.local_addr()?;
    tracing::info!(
        "GraphQL endpoint exposed at {}",
        endpoint(address, &configuration.server.path)
    );

    axum::serve(listener, make_router(configuration, service))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("stopped");
    Ok(())
}

fn endpoint(address: SocketAddr, path: &str) -> String {
    format!("http://{address}{path}")
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl-C, shutting down"),
        Err(error) => tracing::error!("cannot listen for Ctrl-C: {error}"),
    }
}

async fn handle_get(
    service: Arc<GraphQLService>,
    headers: HeaderMap,
    query: Option<String>,
    display_landing_page: bool,
) -> Response {
    if display_landing_page && headers.get(ACCEPT).map(prefers_html).unwrap_or_default() {
        return display_home_page().into_response();
    }

    if let Some(request) = query
        .and_then(|query| graphql::Request::from_urlencoded_query(query).ok())
        .filter(|request| request.query.is_some())
    {
        return Json(service.execute_get(&request)).into_response();
    }

    (StatusCode::BAD_REQUEST, "Invalid GraphQL request").into_response()
}

async fn handle_post(
    State(service): State<Arc<GraphQLService>>,
    Json(request): Json<graphql::Request>,
) -> impl IntoResponse {
    Json(service.execute(&request))
}

fn display_home_page() -> Html<&'static str> {
    Html(include_str!("../../resources/graphiql.html"))
}

async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "pass" }))
}

fn prefers_html(accept_header: &HeaderValue) -> bool {
    accept_header
        .to_str()
        .map(|accept_str| {
            accept_str
                .split(',')
                .map(|a| a.trim())
                .any(|a| a == "text/html")
        })
        .unwrap_or_default()
}
