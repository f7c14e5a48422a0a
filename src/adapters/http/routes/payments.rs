use axum::{
    Json, Router,
    extract::{Path, State},
    middleware,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

use crate::{
    adapters::http::{app_state::AppState, middleware::rate_limit_middleware},
    app_error::{AppError, AppResult},
    application::use_cases::{
        payment_status::BillPaymentStatus,
        reconcile::ReconcileOutcome,
    },
    domain::entities::gateway_status::GatewayOutcome,
};

pub fn router(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/{bill_id}/status", get(get_status))
        .route("/recover", post(recover))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            rate_limit_middleware,
        ))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    #[serde(flatten)]
    status: BillPaymentStatus,
    outcome: GatewayOutcome,
}

/// GET /api/payments/{bill_id}/status
async fn get_status(
    State(app_state): State<AppState>,
    Path(bill_id): Path<String>,
) -> AppResult<Json<StatusResponse>> {
    let status = app_state
        .payment_status
        .check_payment_status(bill_id.trim())
        .await?;

    Ok(Json(StatusResponse {
        outcome: status.outcome(),
        status,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecoverPayload {
    bill_id: Option<String>,
    /// Keep polling in the background when the gateway still reports pending.
    #[serde(default)]
    watch: bool,
}

/// POST /api/payments/recover
async fn recover(
    State(app_state): State<AppState>,
    Json(payload): Json<RecoverPayload>,
) -> AppResult<Json<JsonValue>> {
    let bill_id = payload
        .bill_id
        .ok_or_else(|| AppError::InvalidInput("Missing bill code".into()))?;

    let report = app_state.recovery.recover(&bill_id).await?;

    // A bill already under watch keeps its existing poller.
    let watching = payload.watch
        && report.outcome == ReconcileOutcome::Pending
        && (app_state.recovery.watch(
            &bill_id,
            app_state.config.status_poll_interval,
            app_state.config.status_poll_max_attempts,
        ) || app_state.recovery.is_watching(&bill_id));

    let mut body = json!({
        "billId": report.gateway_status.bill_id,
        "gatewayStatus": report.gateway_status.status,
        "outcome": report.outcome.as_str(),
        "watching": watching,
    });
    if let ReconcileOutcome::Completed(summary) = &report.outcome {
        body["userId"] = json!(summary.user_id);
        body["planId"] = json!(summary.plan_id);
        body["amount"] = json!(summary.amount_cents as f64 / 100.0);
        body["subscriptionId"] = json!(
            summary
                .subscription
                .as_ref()
                .and_then(|s| s.new_subscription_id.clone())
        );
    }

    Ok(Json(body))
}
