pub mod payments;
pub mod webhook;

use axum::{
    Router,
    http::{HeaderName, Method, header::CONTENT_TYPE},
};
use tower_http::cors::CorsLayer;

use crate::{adapters::http::app_state::AppState, infra::webhook_signature::SIGNATURE_HEADERS};

pub fn router(app_state: AppState) -> Router<AppState> {
    let origin = app_state.config.cors_origin.clone();

    let webhook_cors = CorsLayer::new()
        .allow_origin(origin.clone())
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static(SIGNATURE_HEADERS[0]),
            HeaderName::from_static(SIGNATURE_HEADERS[1]),
        ]);

    let payments_cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .nest("/webhooks", webhook::router(app_state.clone()).layer(webhook_cors))
        .nest(
            "/payments",
            payments::router(app_state).layer(payments_cors),
        )
}
