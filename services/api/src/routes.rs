use crate::infra::AppState;
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum::Json;
use member_intake::workflows::intake::{intake_router, FlowBlueprint, FlowKind, IntakeHost};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub(crate) struct SectionSummary {
    pub(crate) id: &'static str,
    pub(crate) title: &'static str,
}

/// Public description of a flow, for clients that render the form before mounting a session.
#[derive(Debug, Serialize)]
pub(crate) struct BlueprintResponse {
    pub(crate) flow: FlowKind,
    pub(crate) sections: Vec<SectionSummary>,
    pub(crate) required_uploads: Vec<&'static str>,
    pub(crate) motivation_min_words: usize,
    pub(crate) motivation_prompt: String,
    pub(crate) specialization_options: Vec<&'static str>,
}

impl BlueprintResponse {
    fn from_blueprint(blueprint: &FlowBlueprint) -> Self {
        Self {
            flow: blueprint.kind(),
            sections: blueprint
                .sections()
                .iter()
                .map(|section| SectionSummary {
                    id: section.id.label(),
                    title: section.title,
                })
                .collect(),
            required_uploads: blueprint
                .required_slots()
                .iter()
                .map(|slot| slot.label())
                .collect(),
            motivation_min_words: blueprint.motivation_min_words(),
            motivation_prompt: blueprint.motivation_prompt(),
            specialization_options: blueprint.specialization_options().to_vec(),
        }
    }
}

pub(crate) fn with_intake_routes(host: Arc<IntakeHost>) -> axum::Router {
    intake_router(host)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/intake/blueprints/:flow",
            axum::routing::get(blueprint_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
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

pub(crate) async fn blueprint_endpoint(Path(flow): Path<FlowKind>) -> Response {
    let blueprint = FlowBlueprint::for_kind(flow);
    Json(BlueprintResponse::from_blueprint(&blueprint)).into_response()
}
