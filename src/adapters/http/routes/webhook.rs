//! ToyyibPay callback endpoint.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{RawQuery, State},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    middleware,
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::json;
use tracing::{info, warn};

use crate::{
    adapters::http::{app_state::AppState, middleware::rate_limit_middleware},
    app_error::AppResult,
    application::{
        helpers::callback_parsing::parse_callback,
        use_cases::reconcile::{CompletionSummary, ReconcileOutcome},
    },
    infra::webhook_signature::SIGNATURE_HEADERS,
};

pub fn router(app_state: AppState) -> Router<AppState> {
    let mut route = post(handle_post);
    if app_state.config.webhook_accept_get {
        route = route.get(handle_get);
    }

    Router::new()
        .route("/toyyibpay", route)
        .route_layer(middleware::from_fn_with_state(
            app_state,
            rate_limit_middleware,
        ))
}

/// POST /api/webhooks/toyyibpay
async fn handle_post(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    let signature = SIGNATURE_HEADERS
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|v| v.to_str().ok());

    if let Err(e) = app_state.signature_verifier.verify_body(&body, signature) {
        warn!(has_signature = signature.is_some(), "Rejected callback with bad signature");
        return Err(e);
    }

    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let callback = parse_callback(content_type, "POST", &body, None)?;

    let outcome = app_state.reconciler.handle_callback(&callback).await?;
    Ok(outcome_response(outcome))
}

/// GET /api/webhooks/toyyibpay
///
/// Legacy transport. Only routed when enabled, and only with a signed query.
async fn handle_get(
    State(app_state): State<AppState>,
    RawQuery(query): RawQuery,
) -> AppResult<Response> {
    let query = query.unwrap_or_default();

    if let Err(e) = app_state.signature_verifier.verify_query(&query) {
        warn!("Rejected GET callback without a valid query signature");
        return Err(e);
    }

    let callback = parse_callback(None, "GET", &[], Some(&query))?;

    let outcome = app_state.reconciler.handle_callback(&callback).await?;
    Ok(outcome_response(outcome))
}

fn outcome_response(outcome: ReconcileOutcome) -> Response {
    info!(outcome = outcome.as_str(), "Callback handled");

    match outcome {
        ReconcileOutcome::Completed(summary) => completed_response(summary),
        ReconcileOutcome::NoPendingRecord => (
            StatusCode::OK,
            "Payment processed but no pending record found",
        )
            .into_response(),
        ReconcileOutcome::Failed { .. } => (StatusCode::OK, "Payment failed").into_response(),
        ReconcileOutcome::Pending => (StatusCode::OK, "Payment pending").into_response(),
    }
}

fn completed_response(summary: CompletionSummary) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Payment processed and status updated to completed",
            "billCode": summary.bill_code,
            "userId": summary.user_id,
            "planId": summary.plan_id,
            "amount": summary.amount_cents as f64 / 100.0,
        })),
    )
        .into_response()
}
