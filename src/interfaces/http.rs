use crate::application::driver::SessionDriver;
use crate::application::reconciler::CallbackReconciler;
use crate::domain::payment::CallbackPayload;
use crate::domain::ussd::UssdRequest;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Shared handles for the request handlers.
#[derive(Clone)]
pub struct AppState {
    pub driver: Arc<SessionDriver>,
    pub reconciler: Arc<CallbackReconciler>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/ussd", post(ussd_handler))
        .route("/api/payment/callback", post(callback_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn ussd_handler(
    State(state): State<AppState>,
    Json(payload): Json<UssdRequest>,
) -> Response {
    debug!(?payload, "ussd request");
    let request = match payload.validate() {
        Ok(request) => request,
        Err(e) => {
            warn!("rejected ussd request: {e}");
            return (StatusCode::BAD_REQUEST, "Missing required fields").into_response();
        }
    };

    let response = state.driver.handle(request).await;
    info!(
        msisdn = %response.msisdn,
        more = response.msg_type,
        "ussd response"
    );
    (StatusCode::OK, Json(response)).into_response()
}

/// The gateway only needs to know we received the callback; failures stay in
/// the logs.
pub async fn callback_handler(State(state): State<AppState>, body: Bytes) -> Response {
    match serde_json::from_slice::<CallbackPayload>(&body) {
        Ok(payload) => {
            debug!(?payload, "payment callback");
            match state.reconciler.reconcile(&payload).await {
                Ok(outcome) => info!(?outcome, "payment callback handled"),
                Err(e) => warn!("payment callback not applied: {e}"),
            }
        }
        Err(e) => warn!("unreadable payment callback: {e}"),
    }

    (
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "message": "Callback processed successfully"
        })),
    )
        .into_response()
}

pub async fn health_handler() -> &'static str {
    "ok"
}
