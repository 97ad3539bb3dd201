use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_enrollment_routes;
use admissions::config::AppConfig;
use admissions::error::AppError;
use admissions::telemetry;
use admissions::workflows::enrollment::{
    AllocationEngine, CsvReportRenderer, CsvSnapshotSource, EnrollmentJobService,
    InMemoryJobStore,
};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
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
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let enrollment = &config.enrollment;
    let source = CsvSnapshotSource::new(&enrollment.programs_csv, &enrollment.applications_csv);
    let enrollment_service = Arc::new(EnrollmentJobService::new(
        Arc::new(source),
        Arc::new(InMemoryJobStore::default()),
        Arc::new(CsvReportRenderer),
        AllocationEngine::new(enrollment.allocation_options()),
        enrollment.report_settings(),
    ));

    info!(
        programs = %enrollment.programs_csv.display(),
        applications = %enrollment.applications_csv.display(),
        report_dir = %enrollment.report_dir.display(),
        tie_break = %enrollment.tie_break,
        "enrollment snapshot configured"
    );

    let app = with_enrollment_routes(enrollment_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "admissions enrollment service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
