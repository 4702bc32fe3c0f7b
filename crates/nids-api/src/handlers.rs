//! Read-only query handlers.

use crate::state::ApiState;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use nids_store::HostBaselineRow;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(50).clamp(1, 500)
}

#[derive(Serialize)]
pub struct VerdictSummary {
    pub timestamp: f64,
    pub src_ip: String,
    pub combined_score: f64,
    pub severity: String,
    pub confidence: String,
}

pub async fn recent_verdicts(
    Extension(state): Extension<Arc<ApiState>>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<VerdictSummary>>, ApiError> {
    let rows = state.store.recent_verdicts(clamp_limit(params.limit))?;
    Ok(Json(
        rows.into_iter()
            .map(|(timestamp, src_ip, combined_score, severity, confidence)| VerdictSummary {
                timestamp,
                src_ip,
                combined_score,
                severity: format!("{severity:?}").to_lowercase(),
                confidence,
            })
            .collect(),
    ))
}

pub async fn recent_ml_alerts(
    Extension(state): Extension<Arc<ApiState>>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<nids_store::MlAlertRow>>, ApiError> {
    Ok(Json(state.store.recent_ml_alerts(clamp_limit(params.limit))?))
}

#[derive(Serialize)]
pub struct TrainingRun {
    pub trained_at: f64,
    pub n_samples: u64,
    pub notes: String,
}

pub async fn training_history(
    Extension(state): Extension<Arc<ApiState>>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<TrainingRun>>, ApiError> {
    let rows = state.store.training_history(clamp_limit(params.limit))?;
    Ok(Json(
        rows.into_iter()
            .map(|(trained_at, n_samples, notes)| TrainingRun {
                trained_at,
                n_samples,
                notes,
            })
            .collect(),
    ))
}

#[derive(Serialize)]
pub struct ModelStatus {
    pub is_trained: bool,
}

pub async fn model_status(Extension(state): Extension<Arc<ApiState>>) -> Json<ModelStatus> {
    Json(ModelStatus {
        is_trained: state.ml.read().is_trained(),
    })
}

#[derive(Deserialize)]
pub struct RecentHostsParams {
    pub since_secs: Option<f64>,
}

pub async fn recent_hosts(
    Extension(state): Extension<Arc<ApiState>>,
    Query(params): Query<RecentHostsParams>,
) -> Result<Json<Vec<String>>, ApiError> {
    let since_secs = params.since_secs.unwrap_or(86_400.0);
    Ok(Json(
        state.store.hosts_with_recent_window(nids_common::now_secs(), since_secs)?,
    ))
}

#[derive(Serialize)]
pub struct SignatureAlertSummary {
    pub timestamp: f64,
    pub severity: String,
}

pub async fn host_signature_alerts(
    Extension(state): Extension<Arc<ApiState>>,
    Path(src_ip): Path<String>,
    Query(params): Query<RecentHostsParams>,
) -> Result<Json<Vec<SignatureAlertSummary>>, ApiError> {
    let since_secs = params.since_secs.unwrap_or(3600.0);
    let rows = state
        .store
        .recent_signature_alerts(&src_ip, nids_common::now_secs(), since_secs)?;
    Ok(Json(
        rows.into_iter()
            .map(|(timestamp, severity)| SignatureAlertSummary {
                timestamp,
                severity: format!("{severity:?}").to_lowercase(),
            })
            .collect(),
    ))
}

pub async fn host_baseline(
    Extension(state): Extension<Arc<ApiState>>,
    Path(src_ip): Path<String>,
) -> Result<Json<Vec<HostBaselineRow>>, ApiError> {
    let mut rows = Vec::new();
    for metric in nids_common::FEATURE_NAMES {
        if let Some(row) = state.store.get_baseline(&src_ip, metric)? {
            rows.push(row);
        }
    }
    Ok(Json(rows))
}

/// Wraps a [`nids_common::NidsError`] so handlers can use `?` and still
/// respond with a proper HTTP status.
pub struct ApiError(nids_common::NidsError);

impl From<nids_common::NidsError> for ApiError {
    fn from(e: nids_common::NidsError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        tracing::warn!(error = %self.0, "query api request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nids_ml::MlDetector;
    use nids_store::Store;
    use parking_lot::RwLock;

    fn state() -> Arc<ApiState> {
        Arc::new(ApiState::new(
            Arc::new(Store::open_in_memory().unwrap()),
            Arc::new(RwLock::new(MlDetector::new())),
        ))
    }

    #[tokio::test]
    async fn recent_verdicts_on_empty_store_is_empty() {
        let response = recent_verdicts(Extension(state()), Query(LimitParams { limit: None }))
            .await
            .unwrap();
        assert!(response.0.is_empty());
    }

    #[tokio::test]
    async fn model_status_untrained_by_default() {
        let response = model_status(Extension(state())).await;
        assert!(!response.0.is_trained);
    }

    #[tokio::test]
    async fn recent_hosts_on_empty_store_is_empty() {
        let response = recent_hosts(Extension(state()), Query(RecentHostsParams { since_secs: None }))
            .await
            .unwrap();
        assert!(response.0.is_empty());
    }

    #[tokio::test]
    async fn host_baseline_for_unknown_host_is_empty() {
        let response = host_baseline(Extension(state()), Path("10.0.0.9".to_string()))
            .await
            .unwrap();
        assert!(response.0.is_empty());
    }
}
