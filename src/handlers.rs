use crate::classifier::ClassifierHandle;
use crate::errors::{AppError, ResultExt};
use crate::models::{BatchRequest, BatchStats, HealthResponse, ResultBundle};
use crate::scorer::score_batch;
use crate::services::PredictionService;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Latest-results façade with its TTL cache.
    pub predictions: Arc<PredictionService>,
    /// Classifier loaded at startup; `None` means rule-based scoring.
    pub classifier: ClassifierHandle,
}

/// Prediction routes, without state or middleware.
///
/// `/health` is mounted separately so it can bypass rate limiting.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/predict-batch", post(predict_batch))
        .route("/predictions/latest", get(get_latest))
        .route("/predictions/summary", get(get_summary))
        .route("/dashboard", get(dashboard))
}

/// Health check endpoint.
///
/// Reports whether a classifier is loaded and whether the results cache
/// currently holds a live entry.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            model_loaded: state.classifier.is_some(),
            cache_valid: state.predictions.cache_valid().await,
            timestamp: Utc::now().to_rfc3339(),
        }),
    )
}

/// POST /predict-batch
///
/// Scores the submitted records directly, bypassing the results cache.
///
/// # Returns
///
/// * `Result<Json<ResultBundle>, AppError>` - Predictions, stats and the method tag,
///   or 400 when no records were provided.
#[utoipa::path(
    post,
    path = "/predict-batch",
    request_body = BatchRequest,
    responses(
        (status = 200, description = "Batch scored", body = ResultBundle),
        (status = 400, description = "No records provided, or a malformed body"),
        (status = 500, description = "Unexpected scoring failure")
    )
)]
pub async fn predict_batch(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<ResultBundle>, AppError> {
    let Json(request) = payload?;
    let count = request.records.as_ref().map_or(0, Vec::len);
    tracing::info!("POST /predict-batch - {} applications received", count);

    let classifier = state.classifier.clone();
    let bundle = tokio::task::spawn_blocking(move || {
        score_batch(request.records, classifier.as_deref())
    })
    .await
    .context("Batch prediction error")??;

    Ok(Json(bundle))
}

/// GET /predictions/latest
///
/// Most recent persisted bundle, capped per decision. Returns an empty
/// bundle when nothing has been persisted recently.
#[utoipa::path(
    get,
    path = "/predictions/latest",
    responses((status = 200, description = "Latest predictions", body = ResultBundle))
)]
pub async fn get_latest(State(state): State<Arc<AppState>>) -> Json<ResultBundle> {
    let bundle = state.predictions.get_latest().await;
    Json(ResultBundle::clone(&bundle))
}

/// GET /predictions/summary
#[utoipa::path(
    get,
    path = "/predictions/summary",
    responses((status = 200, description = "Aggregate stats of the latest bundle", body = BatchStats))
)]
pub async fn get_summary(State(state): State<Arc<AppState>>) -> Json<BatchStats> {
    Json(state.predictions.get_summary().await)
}

/// Serves the analytics dashboard, which renders `/predictions/latest` client-side.
pub async fn dashboard() -> impl IntoResponse {
    Html(DASHBOARD_HTML)
}

const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Loan Approval Analytics Dashboard</title>
    <style>
        body { font-family: -apple-system, 'Segoe UI', sans-serif; background: #0a0a0a; color: #e5e5e5; padding: 20px; }
        .kpis { display: grid; grid-template-columns: repeat(4, 1fr); gap: 16px; margin: 20px 0; }
        .kpi { background: #1a1a1a; border: 1px solid #2a2a2a; border-radius: 10px; padding: 20px; }
        .kpi .value { font-size: 32px; font-weight: 700; }
        .approved { color: #22c55e; } .rejected { color: #ef4444; } .rate { color: #3b82f6; }
        table { width: 100%; border-collapse: collapse; background: #1a1a1a; }
        th, td { padding: 10px 14px; text-align: left; border-bottom: 1px solid #2a2a2a; }
        th { font-size: 11px; text-transform: uppercase; color: #a3a3a3; }
    </style>
</head>
<body>
    <h1>Loan Approval Analytics</h1>
    <p id="meta">Loading...</p>
    <div class="kpis">
        <div class="kpi"><div>Total</div><div class="value" id="total">-</div></div>
        <div class="kpi"><div>Approved</div><div class="value approved" id="approved">-</div></div>
        <div class="kpi"><div>Rejected</div><div class="value rejected" id="rejected">-</div></div>
        <div class="kpi"><div>Approval Rate</div><div class="value rate" id="rate">-</div></div>
    </div>
    <table>
        <thead><tr><th>Application</th><th>Decision</th><th>Confidence</th><th>Loan Amount</th><th>Income</th></tr></thead>
        <tbody id="rows"></tbody>
    </table>
    <script>
        async function load() {
            const res = await fetch('/predictions/latest');
            const data = await res.json();
            const s = data.stats || {};
            document.getElementById('total').textContent = s.total_applications ?? 0;
            document.getElementById('approved').textContent = s.approved_count ?? 0;
            document.getElementById('rejected').textContent = s.rejected_count ?? 0;
            document.getElementById('rate').textContent = (s.approval_rate ?? 0) + '%';
            document.getElementById('meta').textContent =
                'Partition: ' + (data.source_partition || 'none') + ' | Updated: ' + data.timestamp;
            const rows = document.getElementById('rows');
            rows.innerHTML = '';
            for (const p of data.predictions || []) {
                const tr = document.createElement('tr');
                const cells = [p.application_id, p.decision, (p.confidence * 100).toFixed(1) + '%',
                               p.loan_amnt, p.person_income];
                for (const c of cells) {
                    const td = document.createElement('td');
                    td.textContent = c;
                    tr.appendChild(td);
                }
                tr.children[1].className = p.decision === 'APPROVED' ? 'approved' : 'rejected';
                rows.appendChild(tr);
            }
        }
        load();
        setInterval(load, 60000);
    </script>
</body>
</html>
"#;
