use crate::infra::{ApiContext, AppState};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use showops::error::AppError;
use showops::integrations::WebhookError;
use showops::workflows::production::domain::{PermissionGrant, WorkflowStatus};
use showops::workflows::production::{ProductionReport, StateId, StateView};
use std::sync::Arc;

const SIGNATURE_HEADER: &str = "x-showops-signature";

#[derive(Debug, Deserialize)]
pub(crate) struct CreateProductionRequest {
    #[serde(default)]
    pub(crate) grants: Vec<PermissionGrant>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActorRequest {
    pub(crate) actor: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AdvanceRequest {
    pub(crate) actor: String,
    pub(crate) to_step: String,
    #[serde(default)]
    pub(crate) data: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusRequest {
    pub(crate) actor: String,
    pub(crate) status: WorkflowStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompleteRequest {
    pub(crate) actor: String,
    #[serde(default)]
    pub(crate) data: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChainRunRequest {
    #[serde(default)]
    pub(crate) seed: Value,
}

#[derive(Debug, Serialize)]
pub(crate) struct ProductionDetailResponse {
    pub(crate) state: StateView,
    pub(crate) report: ProductionReport,
}

#[derive(Debug, Serialize)]
pub(crate) struct AdvanceResponse {
    pub(crate) state: StateView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) auto_applied: Option<&'static str>,
}

pub(crate) fn with_routes(context: Arc<ApiContext>) -> axum::Router {
    axum::Router::new()
        .route(
            "/api/v1/productions",
            axum::routing::post(create_production_endpoint)
                .get(list_productions_endpoint),
        )
        .route(
            "/api/v1/productions/:id",
            axum::routing::get(get_production_endpoint),
        )
        .route(
            "/api/v1/productions/:id/activate",
            axum::routing::post(activate_endpoint),
        )
        .route(
            "/api/v1/productions/:id/transitions",
            axum::routing::post(advance_endpoint),
        )
        .route(
            "/api/v1/productions/:id/status",
            axum::routing::post(set_status_endpoint),
        )
        .route(
            "/api/v1/productions/:id/complete",
            axum::routing::post(complete_endpoint),
        )
        .route(
            "/api/v1/chains/:name/run",
            axum::routing::post(run_chain_endpoint),
        )
        .route(
            "/api/v1/webhooks/:provider",
            axum::routing::post(ingest_webhook_endpoint),
        )
        .with_state(context)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn create_production_endpoint(
    State(context): State<Arc<ApiContext>>,
    Json(request): Json<CreateProductionRequest>,
) -> Result<(StatusCode, Json<StateView>), AppError> {
    let state = context.service.create(request.grants)?;
    Ok((StatusCode::CREATED, Json(state.view())))
}

pub(crate) async fn list_productions_endpoint(
    State(context): State<Arc<ApiContext>>,
) -> Result<Json<Vec<StateView>>, AppError> {
    let states = context.service.list_active()?;
    Ok(Json(states.iter().map(|state| state.view()).collect()))
}

pub(crate) async fn get_production_endpoint(
    State(context): State<Arc<ApiContext>>,
    Path(id): Path<String>,
) -> Result<Json<ProductionDetailResponse>, AppError> {
    let id = StateId(id);
    let state = context.service.get(&id)?;
    let report = context.service.report(&id)?;
    Ok(Json(ProductionDetailResponse {
        state: state.view(),
        report,
    }))
}

pub(crate) async fn activate_endpoint(
    State(context): State<Arc<ApiContext>>,
    Path(id): Path<String>,
    Json(request): Json<ActorRequest>,
) -> Result<Json<StateView>, AppError> {
    let state = context.service.activate(&StateId(id), &request.actor)?;
    Ok(Json(state.view()))
}

pub(crate) async fn advance_endpoint(
    State(context): State<Arc<ApiContext>>,
    Path(id): Path<String>,
    Json(request): Json<AdvanceRequest>,
) -> Result<Json<AdvanceResponse>, AppError> {
    let outcome = context.service.advance(
        &StateId(id),
        &request.actor,
        &request.to_step,
        request.data,
    )?;
    Ok(Json(AdvanceResponse {
        state: outcome.state.view(),
        auto_applied: outcome.auto_applied,
    }))
}

pub(crate) async fn set_status_endpoint(
    State(context): State<Arc<ApiContext>>,
    Path(id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<StateView>, AppError> {
    let state = context
        .service
        .set_status(&StateId(id), &request.actor, request.status)?;
    Ok(Json(state.view()))
}

pub(crate) async fn complete_endpoint(
    State(context): State<Arc<ApiContext>>,
    Path(id): Path<String>,
    Json(request): Json<CompleteRequest>,
) -> Result<Json<StateView>, AppError> {
    let state = context
        .service
        .complete(&StateId(id), &request.actor, request.data)?;
    Ok(Json(state.view()))
}

pub(crate) async fn run_chain_endpoint(
    State(context): State<Arc<ApiContext>>,
    Path(name): Path<String>,
    Json(request): Json<ChainRunRequest>,
) -> Response {
    let Some(chain) = context.chains.get(&name) else {
        let payload = json!({ "error": format!("unknown chain {name}") });
        return (StatusCode::NOT_FOUND, Json(payload)).into_response();
    };

    let run = context.engine.run(chain, request.seed).await;
    (StatusCode::OK, Json(run)).into_response()
}

pub(crate) async fn ingest_webhook_endpoint(
    State(context): State<Arc<ApiContext>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match context.processor.process(&provider, signature, &body) {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => {
            let status = match &err {
                WebhookError::MissingSignature | WebhookError::BadSignature => {
                    StatusCode::UNAUTHORIZED
                }
                WebhookError::UnknownProvider(_) => StatusCode::NOT_FOUND,
                WebhookError::ProviderMismatch { .. } | WebhookError::Malformed(_) => {
                    StatusCode::BAD_REQUEST
                }
                WebhookError::Handler(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            let payload = json!({ "error": err.to_string() });
            (status, Json(payload)).into_response()
        }
    }
}
