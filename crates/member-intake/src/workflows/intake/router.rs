use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::consent::ScrollGeometry;
use super::coordinator::SubmissionError;
use super::domain::{RecordEdit, SectionId, UploadSlot};
use super::host::{HostError, IntakeHost, OpenSession, SessionId};
use super::sections::ContinueOutcome;
use super::session::{BackOutcome, IntakeError};
use super::uploads::FileBlob;
use super::view::SessionView;

/// Header carrying the original file name of a raw upload body.
pub const FILE_NAME_HEADER: &str = "x-file-name";

/// Room above the upload cap, so a slightly oversized file still reaches the upload policy
/// and fails its slot with a reason instead of a bare 413.
const UPLOAD_BODY_SLACK: u64 = 1024 * 1024;

fn upload_body_limit(max_upload_bytes: u64) -> usize {
    usize::try_from(max_upload_bytes.saturating_add(UPLOAD_BODY_SLACK)).unwrap_or(usize::MAX)
}

/// Router exposing intake sessions over HTTP.
pub fn intake_router(host: Arc<IntakeHost>) -> Router {
    let upload_limit = upload_body_limit(host.settings().max_upload_bytes);
    Router::new()
        .route("/api/v1/intake/sessions", post(open_handler))
        .route(
            "/api/v1/intake/sessions/:session_id",
            get(view_handler).delete(close_handler),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/terms",
            post(terms_handler),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/consent",
            post(consent_handler),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/record",
            patch(edit_handler),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/next",
            post(next_handler),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/back",
            post(back_handler),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/sections/:section",
            post(go_to_handler),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/uploads/:slot",
            put(upload_handler)
                .delete(clear_upload_handler)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/submit",
            post(submit_handler),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/discard",
            post(discard_handler),
        )
        .with_state(host)
}

#[derive(Debug, Serialize)]
struct SessionEnvelope {
    session_id: SessionId,
    #[serde(flatten)]
    view: SessionView,
}

fn envelope(status: StatusCode, session_id: String, view: SessionView) -> Response {
    let body = SessionEnvelope {
        session_id: SessionId(session_id),
        view,
    };
    (status, Json(body)).into_response()
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConsentRequest {
    accepted: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DiscardRequest {
    #[serde(default)]
    confirmed: bool,
}

impl HostError {
    /// HTTP status for the error, shared by the intake routes and the service-level error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            HostError::UnknownSession(_) => StatusCode::NOT_FOUND,
            HostError::Intake(intake) => match intake {
                IntakeError::Disposed => StatusCode::GONE,
                IntakeError::Navigation(_) => StatusCode::BAD_REQUEST,
                IntakeError::Submission(SubmissionError::Blocked(_)) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                IntakeError::Submission(SubmissionError::Remote(_)) => StatusCode::BAD_GATEWAY,
                IntakeError::ConfirmationRequired
                | IntakeError::Locked { .. }
                | IntakeError::Transition(_)
                | IntakeError::Submission(_) => StatusCode::CONFLICT,
            },
        }
    }
}

pub(crate) fn error_response(error: HostError) -> Response {
    let mut payload = json!({ "error": error.to_string() });
    match &error {
        HostError::Intake(IntakeError::ConfirmationRequired) => {
            payload["decision"] = json!("confirm_discard");
        }
        HostError::Intake(IntakeError::Submission(SubmissionError::Blocked(blocked))) => {
            payload["failures"] = json!(blocked.failures);
            payload["field_errors"] = json!(blocked.field_errors());
        }
        _ => {}
    }
    (error.status_code(), Json(payload)).into_response()
}

pub(crate) async fn open_handler(
    State(host): State<Arc<IntakeHost>>,
    Json(request): Json<OpenSession>,
) -> Response {
    match host.open(request).await {
        Ok((id, view)) => envelope(StatusCode::CREATED, id.0, view),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn view_handler(
    State(host): State<Arc<IntakeHost>>,
    Path(session_id): Path<String>,
) -> Response {
    match host.view(&SessionId(session_id.clone())).await {
        Ok(view) => envelope(StatusCode::OK, session_id, view),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn terms_handler(
    State(host): State<Arc<IntakeHost>>,
    Path(session_id): Path<String>,
    Json(geometry): Json<ScrollGeometry>,
) -> Response {
    let entry = match host.entry(&SessionId(session_id)).await {
        Ok(entry) => entry,
        Err(error) => return error_response(error),
    };
    let consent = entry.session.lock().await.observe_terms(geometry);
    (StatusCode::OK, Json(consent)).into_response()
}

pub(crate) async fn consent_handler(
    State(host): State<Arc<IntakeHost>>,
    Path(session_id): Path<String>,
    Json(request): Json<ConsentRequest>,
) -> Response {
    let entry = match host.entry(&SessionId(session_id)).await {
        Ok(entry) => entry,
        Err(error) => return error_response(error),
    };
    let consent = entry.session.lock().await.set_consent(request.accepted);
    (StatusCode::OK, Json(consent)).into_response()
}

pub(crate) async fn edit_handler(
    State(host): State<Arc<IntakeHost>>,
    Path(session_id): Path<String>,
    Json(edit): Json<RecordEdit>,
) -> Response {
    let entry = match host.entry(&SessionId(session_id.clone())).await {
        Ok(entry) => entry,
        Err(error) => return error_response(error),
    };
    let mut session = entry.session.lock().await;
    match session.edit(edit) {
        Ok(_) => envelope(StatusCode::OK, session_id, session.view()),
        Err(error) => error_response(error.into()),
    }
}

pub(crate) async fn next_handler(
    State(host): State<Arc<IntakeHost>>,
    Path(session_id): Path<String>,
) -> Response {
    let entry = match host.entry(&SessionId(session_id.clone())).await {
        Ok(entry) => entry,
        Err(error) => return error_response(error),
    };
    let outcome = entry.session.lock().await.advance();
    match outcome {
        ContinueOutcome::Advanced(_) => {
            let view = entry.session.lock().await.view();
            envelope(StatusCode::OK, session_id, view)
        }
        ContinueOutcome::SubmitRequested => submit_handler(State(host), Path(session_id)).await,
    }
}

pub(crate) async fn back_handler(
    State(host): State<Arc<IntakeHost>>,
    Path(session_id): Path<String>,
) -> Response {
    let entry = match host.entry(&SessionId(session_id.clone())).await {
        Ok(entry) => entry,
        Err(error) => return error_response(error),
    };
    let mut session = entry.session.lock().await;
    match session.back() {
        BackOutcome::Moved(_) => envelope(StatusCode::OK, session_id, session.view()),
        BackOutcome::Leave(decision) => {
            let payload = json!({ "session_id": session_id, "leave": decision });
            (StatusCode::OK, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn go_to_handler(
    State(host): State<Arc<IntakeHost>>,
    Path((session_id, section)): Path<(String, SectionId)>,
) -> Response {
    let entry = match host.entry(&SessionId(session_id.clone())).await {
        Ok(entry) => entry,
        Err(error) => return error_response(error),
    };
    let mut session = entry.session.lock().await;
    match session.go_to(section) {
        Ok(_) => envelope(StatusCode::OK, session_id, session.view()),
        Err(error) => error_response(error.into()),
    }
}

pub(crate) async fn upload_handler(
    State(host): State<Arc<IntakeHost>>,
    Path((session_id, slot)): Path<(String, UploadSlot)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/octet-stream");
    let file_name = headers
        .get(FILE_NAME_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(slot.label());
    let file = FileBlob::new(file_name, content_type, body.to_vec());

    match host
        .start_upload(&SessionId(session_id.clone()), slot, file)
        .await
    {
        Ok(view) => envelope(StatusCode::ACCEPTED, session_id, view),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn clear_upload_handler(
    State(host): State<Arc<IntakeHost>>,
    Path((session_id, slot)): Path<(String, UploadSlot)>,
) -> Response {
    let entry = match host.entry(&SessionId(session_id.clone())).await {
        Ok(entry) => entry,
        Err(error) => return error_response(error),
    };
    let mut session = entry.session.lock().await;
    match session.clear_upload(slot) {
        Ok(()) => envelope(StatusCode::OK, session_id, session.view()),
        Err(error) => error_response(error.into()),
    }
}

pub(crate) async fn submit_handler(
    State(host): State<Arc<IntakeHost>>,
    Path(session_id): Path<String>,
) -> Response {
    match host.submit(&SessionId(session_id.clone())).await {
        Ok(receipt) => {
            let payload = json!({
                "session_id": session_id,
                "confirmation": receipt.confirmation,
                "submitted_at": receipt.submitted_at,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn discard_handler(
    State(host): State<Arc<IntakeHost>>,
    Path(session_id): Path<String>,
    request: Option<Json<DiscardRequest>>,
) -> Response {
    let confirmed = request.map(|Json(request)| request.confirmed).unwrap_or(false);
    match host.discard(&SessionId(session_id.clone()), confirmed).await {
        Ok(draft) => {
            let payload = json!({ "session_id": session_id, "draft": draft });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn close_handler(
    State(host): State<Arc<IntakeHost>>,
    Path(session_id): Path<String>,
) -> Response {
    match host.close(&SessionId(session_id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}
