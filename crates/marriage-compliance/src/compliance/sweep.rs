use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::alerts::AlertManager;
use super::domain::{
    AlertSeverity, AlertType, FormStatus, FormSubmission, FormSubmissionId, OrganizationId,
};
use super::repository::{AlertRepository, FormFilter, FormSubmissionRepository, RepositoryError};

/// Window, in days before the deadline, in which an approaching alert is raised.
pub const APPROACHING_WINDOW_DAYS: i64 = 7;
/// At or below this many days remaining the approaching alert is critical.
pub const CRITICAL_WINDOW_DAYS: i64 = 3;

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Per-record failure captured without aborting the sweep.
#[derive(Debug, Clone, Serialize)]
pub struct RecordFailure {
    pub form_id: FormSubmissionId,
    pub organization_id: OrganizationId,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepSummary {
    pub examined: usize,
    pub marked_overdue: usize,
    pub alerts_raised: usize,
    pub failures: Vec<RecordFailure>,
}

#[derive(Debug, Default)]
struct RecordOutcome {
    marked_overdue: bool,
    alerts_raised: usize,
}

/// Periodic re-evaluation of open records: status transitions plus deadline alerts.
pub struct ComplianceSweep<S> {
    forms: Arc<S>,
    alerts: AlertManager<S>,
}

impl<S> ComplianceSweep<S>
where
    S: FormSubmissionRepository + AlertRepository + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            alerts: AlertManager::new(store.clone()),
            forms: store,
        }
    }

    /// Sweep every open record across all organizations.
    pub fn run(&self, today: NaiveDate) -> Result<SweepSummary, SweepError> {
        self.sweep(FormFilter::open(), today)
    }

    pub fn run_for_organization(
        &self,
        organization_id: &OrganizationId,
        today: NaiveDate,
    ) -> Result<SweepSummary, SweepError> {
        self.sweep(FormFilter::open().in_organization(organization_id), today)
    }

    fn sweep(&self, filter: FormFilter, today: NaiveDate) -> Result<SweepSummary, SweepError> {
        let forms = self.forms.list_forms(&filter)?;
        let mut summary = SweepSummary::default();

        for form in forms {
            summary.examined += 1;
            let form_id = form.id.clone();
            let organization_id = form.organization_id.clone();

            match self.evaluate(form, today) {
                Ok(outcome) => {
                    if outcome.marked_overdue {
                        summary.marked_overdue += 1;
                    }
                    summary.alerts_raised += outcome.alerts_raised;
                }
                Err(err) => {
                    warn!(
                        organization_id = %organization_id,
                        form_id = %form_id,
                        error = %err,
                        "compliance sweep failed for record"
                    );
                    summary.failures.push(RecordFailure {
                        form_id,
                        organization_id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            %today,
            examined = summary.examined,
            marked_overdue = summary.marked_overdue,
            alerts_raised = summary.alerts_raised,
            failures = summary.failures.len(),
            "compliance sweep finished"
        );
        Ok(summary)
    }

    fn evaluate(&self, form: FormSubmission, today: NaiveDate) -> Result<RecordOutcome, SweepError> {
        let mut outcome = RecordOutcome::default();
        if !form.is_open() {
            return Ok(outcome);
        }

        let days_left = form.days_until_deadline(today);

        if (0..=APPROACHING_WINDOW_DAYS).contains(&days_left) {
            let severity = if days_left <= CRITICAL_WINDOW_DAYS {
                AlertSeverity::Critical
            } else {
                AlertSeverity::High
            };
            let raised = self.alerts.raise_alert(
                &form,
                AlertType::DeadlineApproaching,
                severity,
                format!("{} due in {} day(s)", form.form_type.label(), days_left),
                format!(
                    "The {} must be lodged by {}.",
                    form.form_type.label(),
                    form.legal_deadline
                ),
            )?;
            if raised.is_some() {
                outcome.alerts_raised += 1;
            }
        }

        if form.legal_deadline < today {
            // Re-read under the store lock so a concurrent submission is never overwritten.
            let stored = self.forms.mark_overdue(&form.id, today, Utc::now())?;
            if stored.status == FormStatus::Overdue && form.status != FormStatus::Overdue {
                outcome.marked_overdue = true;
                info!(
                    organization_id = %stored.organization_id,
                    form_id = %stored.id,
                    deadline = %stored.legal_deadline,
                    "form marked overdue"
                );
            }

            if stored.is_open() && stored.status == FormStatus::Overdue {
                let raised = self.alerts.raise_alert(
                    &stored,
                    AlertType::FormOverdue,
                    AlertSeverity::Critical,
                    format!("{} is overdue", stored.form_type.label()),
                    format!(
                        "The lodgement deadline of {} passed {} day(s) ago.",
                        stored.legal_deadline, -days_left
                    ),
                )?;
                if raised.is_some() {
                    outcome.alerts_raised += 1;
                }
            }
        }

        Ok(outcome)
    }
}
