use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::domain::{
    AlertSeverity, ComplianceAlert, FormStatus, FormSubmission, FormSubmissionId, FormType,
    OrganizationId,
};

/// Forms with a deadline this many days ahead or fewer count as upcoming.
pub const UPCOMING_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ComplianceDashboard {
    pub organization_id: OrganizationId,
    pub generated_on: NaiveDate,
    pub total_forms: usize,
    pub completed_forms: usize,
    pub overdue_forms: usize,
    pub upcoming_forms: usize,
    pub compliance_rate: f64,
    pub by_form_type: Vec<FormTypeBreakdown>,
    pub open_alerts: AlertCounts,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FormTypeBreakdown {
    pub form_type: FormType,
    pub form_label: &'static str,
    pub total: usize,
    pub completed: usize,
    pub overdue: usize,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct AlertCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

impl AlertCounts {
    pub fn total(&self) -> usize {
        self.low + self.medium + self.high + self.critical
    }
}

impl ComplianceDashboard {
    /// Roll up live records and unresolved alerts. Superseded records are ignored.
    pub fn build(
        organization_id: &OrganizationId,
        forms: &[FormSubmission],
        alerts: &[ComplianceAlert],
        today: NaiveDate,
    ) -> Self {
        let mut by_type: BTreeMap<FormType, FormTypeBreakdown> = BTreeMap::new();
        let mut total_forms = 0;
        let mut completed_forms = 0;
        let mut overdue_forms = 0;
        let mut upcoming_forms = 0;

        for form in forms.iter().filter(|form| !form.is_superseded()) {
            total_forms += 1;
            let entry = by_type
                .entry(form.form_type)
                .or_insert_with(|| FormTypeBreakdown {
                    form_type: form.form_type,
                    form_label: form.form_type.label(),
                    total: 0,
                    completed: 0,
                    overdue: 0,
                });
            entry.total += 1;

            match form.status {
                FormStatus::Completed => {
                    completed_forms += 1;
                    entry.completed += 1;
                }
                FormStatus::Overdue => {
                    overdue_forms += 1;
                    entry.overdue += 1;
                }
                FormStatus::NotStarted | FormStatus::InProgress => {
                    if (0..=UPCOMING_WINDOW_DAYS).contains(&form.days_until_deadline(today)) {
                        upcoming_forms += 1;
                    }
                }
            }
        }

        let mut open_alerts = AlertCounts::default();
        for alert in alerts.iter().filter(|alert| !alert.is_resolved) {
            match alert.severity {
                AlertSeverity::Low => open_alerts.low += 1,
                AlertSeverity::Medium => open_alerts.medium += 1,
                AlertSeverity::High => open_alerts.high += 1,
                AlertSeverity::Critical => open_alerts.critical += 1,
            }
        }

        Self {
            organization_id: organization_id.clone(),
            generated_on: today,
            total_forms,
            completed_forms,
            overdue_forms,
            upcoming_forms,
            compliance_rate: compliance_rate(completed_forms, total_forms),
            by_form_type: by_type.into_values().collect(),
            open_alerts,
        }
    }
}

pub fn compliance_rate(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    completed as f64 / total as f64 * 100.0
}

/// Per-record status row exposed to couples and celebrants.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FormStatusView {
    pub form_id: FormSubmissionId,
    pub form_type: FormType,
    pub form_label: &'static str,
    pub status: FormStatus,
    pub status_label: &'static str,
    pub legal_deadline: NaiveDate,
    pub days_remaining: i64,
    pub is_validated: bool,
    pub submitted_at: Option<DateTime<Utc>>,
    pub next_reminder: Option<NaiveDate>,
}

impl FormStatusView {
    pub fn from_form(form: &FormSubmission, today: NaiveDate) -> Self {
        Self {
            form_id: form.id.clone(),
            form_type: form.form_type,
            form_label: form.form_type.label(),
            status: form.status,
            status_label: form.status.label(),
            legal_deadline: form.legal_deadline,
            days_remaining: form.days_until_deadline(today),
            is_validated: form.is_validated,
            submitted_at: form.submitted_at,
            next_reminder: form
                .reminder_schedule
                .next_unsent(today)
                .map(|checkpoint| checkpoint.date),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to write csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush csv buffer: {0}")]
    Flush(String),
    #[error("csv output was not valid utf-8")]
    Encoding(#[from] std::string::FromUtf8Error),
}

#[derive(Serialize)]
struct CsvRow<'a> {
    form_id: &'a str,
    form: &'static str,
    status: &'static str,
    legal_deadline: NaiveDate,
    days_remaining: i64,
    validated: bool,
    next_reminder: Option<NaiveDate>,
}

/// Render status rows as CSV for weekly compliance reports.
pub fn export_csv(rows: &[FormStatusView]) -> Result<String, ReportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(CsvRow {
            form_id: &row.form_id.0,
            form: row.form_label,
            status: row.status_label,
            legal_deadline: row.legal_deadline,
            days_remaining: row.days_remaining,
            validated: row.is_validated,
            next_reminder: row.next_reminder,
        })?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| ReportError::Flush(err.to_string()))?;
    Ok(String::from_utf8(bytes)?)
}
