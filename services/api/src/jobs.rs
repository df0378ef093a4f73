use crate::infra::{demo_couples, load_couples, seeded_store, LogTransport};
use chrono::{Duration, Local, NaiveDate};
use clap::Args;
use marriage_compliance::compliance::report::export_csv;
use marriage_compliance::compliance::{
    AlertRepository, ComplianceService, ComplianceSweep, CoupleDirectory, FormSubmissionRepository,
    InMemoryComplianceStore, NotificationTransport, OrganizationId, ReminderDispatcher,
    ReminderLogRepository,
};
use marriage_compliance::config::AppConfig;
use marriage_compliance::error::AppError;
use marriage_compliance::telemetry;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::error;

#[derive(Args, Debug, Default)]
pub(crate) struct BatchArgs {
    /// JSON couple directory export. Defaults to the built-in demo couples.
    #[arg(long)]
    pub(crate) couples: Option<PathBuf>,
    /// Evaluation date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Date the form records are treated as created. Defaults to 30 days before --today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) seeded_on: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub(crate) struct DashboardArgs {
    #[command(flatten)]
    pub(crate) batch: BatchArgs,
    /// Restrict output to a single organization.
    #[arg(long)]
    pub(crate) organization: Option<String>,
    /// Print per-couple form status as CSV instead of the JSON dashboard.
    #[arg(long)]
    pub(crate) csv: bool,
}

struct Batch {
    store: Arc<InMemoryComplianceStore>,
    today: NaiveDate,
}

fn prepare(args: BatchArgs) -> Result<Batch, AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let seeded_on = args.seeded_on.unwrap_or(today - Duration::days(30));
    let couples = match args.couples {
        Some(path) => load_couples(&path)?,
        None => demo_couples(seeded_on),
    };
    Ok(Batch {
        store: seeded_store(couples, seeded_on)?,
        today,
    })
}

pub(crate) fn run_sweep(args: BatchArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let batch = prepare(args)?;
    let summary = ComplianceSweep::new(batch.store).run(batch.today)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

pub(crate) async fn run_dispatch(args: BatchArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let batch = prepare(args)?;
    let transport = Arc::new(LogTransport::new(config.compliance.sender.clone()));
    let summary = ReminderDispatcher::with_timeout(
        batch.store,
        transport,
        config.compliance.notification_timeout,
    )
    .run(batch.today)
    .await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

pub(crate) fn run_dashboard(args: DashboardArgs) -> Result<(), AppError> {
    let DashboardArgs {
        batch,
        organization,
        csv,
    } = args;
    let batch = prepare(batch)?;
    ComplianceSweep::new(batch.store.clone()).run(batch.today)?;

    let service = ComplianceService::new(batch.store.clone());
    let couples = batch
        .store
        .couples()
        .map_err(|err| AppError::Compliance(err.into()))?;
    let organizations: BTreeSet<OrganizationId> = match organization {
        Some(raw) => BTreeSet::from([OrganizationId(raw)]),
        None => couples
            .iter()
            .map(|couple| couple.organization_id.clone())
            .collect(),
    };

    if csv {
        let mut rows = Vec::new();
        for couple in couples
            .iter()
            .filter(|couple| organizations.contains(&couple.organization_id))
        {
            rows.extend(service.couple_forms_status(&couple.id, batch.today)?);
        }
        print!("{}", export_csv(&rows)?);
        return Ok(());
    }

    for organization_id in &organizations {
        let dashboard = service.dashboard(organization_id, batch.today)?;
        println!("{}", serde_json::to_string_pretty(&dashboard)?);
    }
    Ok(())
}

/// Re-run the compliance sweep on a fixed cadence until the runtime shuts down.
pub(crate) fn spawn_sweep_loop<S>(store: Arc<S>, every: std::time::Duration) -> JoinHandle<()>
where
    S: FormSubmissionRepository + AlertRepository + 'static,
{
    tokio::spawn(async move {
        let sweep = ComplianceSweep::new(store);
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            if let Err(err) = sweep.run(Local::now().date_naive()) {
                error!(error = %err, "scheduled compliance sweep failed");
            }
        }
    })
}

pub(crate) fn spawn_dispatch_loop<S, N>(
    store: Arc<S>,
    transport: Arc<N>,
    every: std::time::Duration,
    timeout: std::time::Duration,
) -> JoinHandle<()>
where
    S: FormSubmissionRepository + ReminderLogRepository + CoupleDirectory + 'static,
    N: NotificationTransport + 'static,
{
    tokio::spawn(async move {
        let dispatcher = ReminderDispatcher::with_timeout(store, transport, timeout);
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            if let Err(err) = dispatcher.run(Local::now().date_naive()).await {
                error!(error = %err, "scheduled reminder dispatch failed");
            }
        }
    })
}
