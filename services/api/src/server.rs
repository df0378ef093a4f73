use crate::cli::ServeArgs;
use crate::infra::{demo_couples, load_couples, seeded_store, AppState, LogTransport};
use crate::jobs::{spawn_dispatch_loop, spawn_sweep_loop};
use crate::routes::with_operational_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Local;
use marriage_compliance::compliance::{compliance_router, ComplianceService};
use marriage_compliance::config::AppConfig;
use marriage_compliance::error::AppError;
use marriage_compliance::telemetry;
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

    let today = Local::now().date_naive();
    let couples = match args.couples.take() {
        Some(path) => load_couples(&path)?,
        None if args.seed_demo => demo_couples(today),
        None => Vec::new(),
    };
    let store = seeded_store(couples, today)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        store: store.clone(),
    };

    let service = Arc::new(ComplianceService::new(store.clone()));
    let app = with_operational_routes(compliance_router(service))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let compliance = &config.compliance;
    spawn_sweep_loop(store.clone(), compliance.sweep_interval);
    spawn_dispatch_loop(
        store,
        Arc::new(LogTransport::new(compliance.sender.clone())),
        compliance.dispatch_interval,
        compliance.notification_timeout,
    );

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        sweep_interval_secs = compliance.sweep_interval.as_secs(),
        dispatch_interval_secs = compliance.dispatch_interval.as_secs(),
        "marriage compliance service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
