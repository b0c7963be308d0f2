use crate::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub version: String,
    pub uptime_secs: u64,
}

pub async fn health_liveness(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    let status = HealthStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
    };
    (StatusCode::OK, Json(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::services::client::testing::MockUpstream;
    use std::sync::Arc;

    #[test]
    fn test_health_status_serialization() {
        let status = HealthStatus {
            version: "0.1.0".to_string(),
            uptime_secs: 7200,
        };

        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"version\":\"0.1.0\""));
        assert!(json.contains("\"uptime_secs\":7200"));
    }

    #[tokio::test]
    async fn test_health_liveness_reports_version() {
        let state = AppState::new(Settings::default(), Arc::new(MockUpstream::default()));
        let (code, Json(status)) = health_liveness(State(state)).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(status.version, env!("CARGO_PKG_VERSION"));
    }
}
