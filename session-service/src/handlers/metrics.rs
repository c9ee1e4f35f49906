use axum::extract::State;

use crate::AppState;

/// Prometheus exposition endpoint. Renders nothing when no recorder was
/// installed (e.g. under test).
pub async fn metrics(State(state): State<AppState>) -> String {
    state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}
