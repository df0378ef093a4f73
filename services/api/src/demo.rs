use crate::infra::{demo_couples, demo_organization, seeded_store, LogTransport};
use chrono::{Duration, Local, NaiveDate};
use clap::Args;
use marriage_compliance::compliance::report::export_csv;
use marriage_compliance::compliance::{
    ComplianceService, ComplianceSweep, CoupleId, FormFilter, FormSubmission,
    FormSubmissionRepository, FormType, InMemoryComplianceStore, ReminderDispatcher,
    RepositoryError, UserId,
};
use marriage_compliance::error::AppError;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// First simulated day (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Number of days to simulate.
    #[arg(long, default_value_t = 14)]
    pub(crate) days: u32,
    /// Print the closing status report as CSV.
    #[arg(long)]
    pub(crate) csv: bool,
}

const LODGING_COUPLE: &str = "couple-mia-leo";
const RESCHEDULING_COUPLE: &str = "couple-zoe-eli";

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { today, days, csv } = args;
    let start = today.unwrap_or_else(|| Local::now().date_naive());

    println!("Marriage compliance demo starting {start}");
    let store = seeded_store(demo_couples(start), start)?;
    let service = ComplianceService::new(store.clone());
    print_couple_forms(&service, &store, start)?;

    let sweep = ComplianceSweep::new(store.clone());
    let dispatcher =
        ReminderDispatcher::new(store.clone(), Arc::new(LogTransport::new("demo@localhost")));
    let celebrant = UserId::from("celebrant-demo");

    println!("\nSimulating {days} days");
    for offset in 0..days {
        let day = start + Duration::days(i64::from(offset));
        apply_scripted_events(&service, offset, day, &celebrant)?;

        let swept = sweep.run(day)?;
        let dispatched = dispatcher.run(day).await?;
        println!(
            "- {day}: {} open forms swept | {} marked overdue | {} alerts raised | {} reminders sent | {} failed",
            swept.examined,
            swept.marked_overdue,
            swept.alerts_raised,
            dispatched.sent,
            dispatched.failed
        );
    }

    let end = start + Duration::days(i64::from(days));
    let dashboard = service.dashboard(&demo_organization(), end)?;
    println!("\nDashboard for {} on {end}", dashboard.organization_id);
    println!(
        "- {} forms | {} completed | {} overdue | {} due within 30 days | {:.1}% compliant",
        dashboard.total_forms,
        dashboard.completed_forms,
        dashboard.overdue_forms,
        dashboard.upcoming_forms,
        dashboard.compliance_rate
    );
    for row in &dashboard.by_form_type {
        println!(
            "  - {}: {} total | {} completed | {} overdue",
            row.form_label, row.total, row.completed, row.overdue
        );
    }

    println!("\nOpen alerts");
    for alert in service.open_alerts(&demo_organization())? {
        println!(
            "- [{}] {} ({}): {}",
            alert.severity.label(),
            alert.title,
            alert.couple_id,
            alert.message
        );
    }

    if csv {
        let mut rows = Vec::new();
        for couple in store
            .couples()
            .map_err(|err| AppError::Compliance(err.into()))?
        {
            rows.extend(service.couple_forms_status(&couple.id, end)?);
        }
        println!("\n{}", export_csv(&rows)?);
    }

    Ok(())
}

fn apply_scripted_events(
    service: &ComplianceService<InMemoryComplianceStore>,
    offset: u32,
    day: NaiveDate,
    celebrant: &UserId,
) -> Result<(), AppError> {
    let lodging = CoupleId::from(LODGING_COUPLE);
    match offset {
        1 => {
            let noim = find_form(service, &lodging, FormType::Noim)?;
            service.start_form(&noim.id)?;
            println!("  {LODGING_COUPLE} started their notice of intended marriage");
        }
        2 => {
            let noim = find_form(service, &lodging, FormType::Noim)?;
            service.submit_form(&noim.id, "uploads/mia-leo/noim.pdf", &UserId::from("mia"))?;
            println!("  {LODGING_COUPLE} lodged their notice");
        }
        3 => {
            let noim = find_form(service, &lodging, FormType::Noim)?;
            service.validate_form(
                &noim.id,
                celebrant,
                false,
                Some("Second witness signature missing".to_string()),
            )?;
            println!("  celebrant rejected the notice for {LODGING_COUPLE}");
        }
        4 => {
            let noim = find_form(service, &lodging, FormType::Noim)?;
            service.submit_form(&noim.id, "uploads/mia-leo/noim-v2.pdf", &UserId::from("leo"))?;
            service.validate_form(&noim.id, celebrant, true, None)?;
            println!("  {LODGING_COUPLE} resubmitted and the notice was approved");
        }
        6 => {
            let couple = CoupleId::from(RESCHEDULING_COUPLE);
            let new_date = day + Duration::days(60);
            let replaced = service.reschedule_ceremony(&couple, new_date, day)?;
            println!(
                "  {RESCHEDULING_COUPLE} moved their ceremony to {new_date}; {} form records superseded",
                replaced.len()
            );
        }
        _ => {}
    }
    Ok(())
}

fn find_form(
    service: &ComplianceService<InMemoryComplianceStore>,
    couple_id: &CoupleId,
    form_type: FormType,
) -> Result<FormSubmission, AppError> {
    let forms = service
        .store()
        .list_forms(&FormFilter::for_couple(couple_id))
        .map_err(|err| AppError::Compliance(err.into()))?;
    forms
        .into_iter()
        .find(|form| form.form_type == form_type)
        .ok_or_else(|| AppError::Compliance(RepositoryError::NotFound.into()))
}

fn print_couple_forms(
    service: &ComplianceService<InMemoryComplianceStore>,
    store: &InMemoryComplianceStore,
    today: NaiveDate,
) -> Result<(), AppError> {
    for couple in store
        .couples()
        .map_err(|err| AppError::Compliance(err.into()))?
    {
        let ceremony = couple
            .ceremony_date
            .map(|date| date.to_string())
            .unwrap_or_else(|| "unscheduled".to_string());
        println!("- {} (ceremony {ceremony})", couple.display_names());
        for view in service.couple_forms_status(&couple.id, today)? {
            println!(
                "    {}: due {} ({} days) | {}",
                view.form_label, view.legal_deadline, view.days_remaining, view.status_label
            );
        }
    }
    Ok(())
}
