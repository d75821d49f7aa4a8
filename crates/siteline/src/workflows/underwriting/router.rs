use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;

use super::domain::{RecordId, UnderwritingRequest};
use super::jurisdiction::CardStore;
use super::service::UnderwritingService;
use super::vault::DecisionVault;
use crate::workflows::market::RentBenchmarkProvider;

/// Router builder exposing HTTP endpoints for underwriting runs and stored
/// decision records.
pub fn underwriting_router<C, M, V>(service: Arc<UnderwritingService<C, M, V>>) -> Router
where
    C: CardStore + 'static,
    M: RentBenchmarkProvider + 'static,
    V: DecisionVault + 'static,
{
    Router::new()
        .route(
            "/api/v1/underwriting/evaluations",
            post(evaluate_handler::<C, M, V>),
        )
        .route(
            "/api/v1/underwriting/evaluations/:record_id",
            get(record_handler::<C, M, V>),
        )
        .with_state(service)
}

pub(crate) async fn evaluate_handler<C, M, V>(
    State(service): State<Arc<UnderwritingService<C, M, V>>>,
    axum::Json(request): axum::Json<UnderwritingRequest>,
) -> Response
where
    C: CardStore + 'static,
    M: RentBenchmarkProvider + 'static,
    V: DecisionVault + 'static,
{
    let report = service.underwrite(request);
    (StatusCode::OK, axum::Json(report)).into_response()
}

pub(crate) async fn record_handler<C, M, V>(
    State(service): State<Arc<UnderwritingService<C, M, V>>>,
    Path(record_id): Path<String>,
) -> Response
where
    C: CardStore + 'static,
    M: RentBenchmarkProvider + 'static,
    V: DecisionVault + 'static,
{
    let id = RecordId(record_id);
    match service.fetch_record(&id) {
        Ok(Some(report)) => (StatusCode::OK, axum::Json(report)).into_response(),
        Ok(None) => {
            let payload = json!({
                "error": "no decision record with that id",
                "record_id": id.0,
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(source) => {
            let payload = json!({
                "error": source.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}
