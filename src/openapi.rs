use crate::handlers;
use crate::models::{
    BatchRequest, BatchStats, Decision, HealthResponse, Prediction, ResultBundle, ScoringMethod,
    SkippedRecord,
};
use utoipa::OpenApi;

/// OpenAPI document for the request surface, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(title = "Loan Approval API", description = "Batch loan scoring and latest-results serving"),
    paths(
        handlers::health,
        handlers::predict_batch,
        handlers::get_latest,
        handlers::get_summary
    ),
    components(schemas(
        BatchRequest,
        BatchStats,
        Decision,
        HealthResponse,
        Prediction,
        ResultBundle,
        ScoringMethod,
        SkippedRecord
    ))
)]
pub struct ApiDoc;
