use crate::cli::ServeArgs;
use crate::infra::{collaborators, AppState, InMemorySubmissionInbox, InMemoryUploadStore};
use crate::routes::with_intake_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use member_intake::config::AppConfig;
use member_intake::error::AppError;
use member_intake::telemetry;
use member_intake::workflows::intake::IntakeHost;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let host = Arc::new(IntakeHost::new(
        collaborators(
            InMemoryUploadStore::default(),
            InMemorySubmissionInbox::default(),
        ),
        config.intake,
    ));

    let app = with_intake_routes(host)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        environment = config.environment.label(),
        %addr,
        consent_threshold = config.intake.consent_threshold,
        max_upload_bytes = config.intake.max_upload_bytes,
        "member intake service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
