use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

use crate::AppState;

/// Report whether the service and its credential store are up. 503 if the store does not answer.
pub async fn healthz(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.sessions.store().ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({"status": "healthy"}))),
        Err(e) => {
            tracing::warn!("Health check failed: {e}");
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"status": "unhealthy"})))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::create_test_server;
    use serde_json::json;

    #[tokio::test]
    async fn test_healthz() {
        let server = create_test_server().await;
        let response = server.get("/healthz").await;
        response.assert_status_ok();
        response.assert_json(&json!({"status": "healthy"}));
    }
}
