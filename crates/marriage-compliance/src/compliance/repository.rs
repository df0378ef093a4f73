use chrono::{DateTime, NaiveDate, Utc};

use super::domain::{
    AlertId, AlertType, ComplianceAlert, Couple, CoupleId, FormStatus, FormSubmission,
    FormSubmissionId, OrganizationId, ReminderLog,
};

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Query over form records. Empty `statuses` matches every status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFilter {
    pub organization_id: Option<OrganizationId>,
    pub couple_id: Option<CoupleId>,
    pub statuses: Vec<FormStatus>,
    pub deadline_on_or_before: Option<NaiveDate>,
    pub include_superseded: bool,
}

impl FormFilter {
    /// Live records that are not yet completed.
    pub fn open() -> Self {
        Self {
            statuses: vec![
                FormStatus::NotStarted,
                FormStatus::InProgress,
                FormStatus::Overdue,
            ],
            ..Self::default()
        }
    }

    pub fn for_organization(organization_id: &OrganizationId) -> Self {
        Self {
            organization_id: Some(organization_id.clone()),
            ..Self::default()
        }
    }

    pub fn for_couple(couple_id: &CoupleId) -> Self {
        Self {
            couple_id: Some(couple_id.clone()),
            ..Self::default()
        }
    }

    pub fn in_organization(mut self, organization_id: &OrganizationId) -> Self {
        self.organization_id = Some(organization_id.clone());
        self
    }

    pub fn in_couple(mut self, couple_id: &CoupleId) -> Self {
        self.couple_id = Some(couple_id.clone());
        self
    }

    pub fn matches(&self, form: &FormSubmission) -> bool {
        if !self.include_superseded && form.is_superseded() {
            return false;
        }
        if let Some(organization_id) = &self.organization_id {
            if &form.organization_id != organization_id {
                return false;
            }
        }
        if let Some(couple_id) = &self.couple_id {
            if &form.couple_id != couple_id {
                return false;
            }
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&form.status) {
            return false;
        }
        match self.deadline_on_or_before {
            Some(limit) => form.legal_deadline <= limit,
            None => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertFilter {
    pub organization_id: Option<OrganizationId>,
    pub form_submission_id: Option<FormSubmissionId>,
    pub unresolved_only: bool,
}

impl AlertFilter {
    pub fn unresolved() -> Self {
        Self {
            unresolved_only: true,
            ..Self::default()
        }
    }

    pub fn matches(&self, alert: &ComplianceAlert) -> bool {
        if self.unresolved_only && alert.is_resolved {
            return false;
        }
        if let Some(organization_id) = &self.organization_id {
            if &alert.organization_id != organization_id {
                return false;
            }
        }
        match &self.form_submission_id {
            Some(form_id) => alert.form_submission_id.as_ref() == Some(form_id),
            None => true,
        }
    }
}

/// Keyed storage for form records. Records are superseded, never deleted.
///
/// Batch jobs only use the narrow `mark_*` operations, which re-read the stored record and
/// change a single field atomically, so they never overwrite a concurrent submission.
pub trait FormSubmissionRepository: Send + Sync {
    fn insert_form(&self, form: FormSubmission) -> Result<FormSubmission, RepositoryError>;
    fn update_form(&self, form: FormSubmission) -> Result<(), RepositoryError>;
    fn fetch_form(&self, id: &FormSubmissionId) -> Result<Option<FormSubmission>, RepositoryError>;
    fn list_forms(&self, filter: &FormFilter) -> Result<Vec<FormSubmission>, RepositoryError>;

    /// Record delivery of one reminder checkpoint. Returns `false` when the stored record no
    /// longer carries that checkpoint.
    fn mark_checkpoint_sent(
        &self,
        id: &FormSubmissionId,
        days_before_deadline: u32,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// Flag the stored record overdue if it is still open past its deadline, returning the
    /// record as stored afterwards.
    fn mark_overdue(
        &self,
        id: &FormSubmissionId,
        today: NaiveDate,
        at: DateTime<Utc>,
    ) -> Result<FormSubmission, RepositoryError>;

    /// Insert `replacement` and supersede `previous` in one write.
    ///
    /// Fails with [`RepositoryError::Conflict`] when `previous` is already superseded.
    fn replace_form(
        &self,
        previous: &FormSubmissionId,
        replacement: FormSubmission,
        at: DateTime<Utc>,
    ) -> Result<FormSubmission, RepositoryError>;
}

/// Alert storage.
///
/// `insert_alert` must reject with [`RepositoryError::Conflict`] when an unresolved alert
/// already exists for the same form and alert type, so concurrent sweeps cannot both win.
pub trait AlertRepository: Send + Sync {
    fn insert_alert(&self, alert: ComplianceAlert) -> Result<ComplianceAlert, RepositoryError>;
    fn update_alert(&self, alert: ComplianceAlert) -> Result<(), RepositoryError>;
    fn fetch_alert(&self, id: &AlertId) -> Result<Option<ComplianceAlert>, RepositoryError>;
    fn find_unresolved_alert(
        &self,
        form_id: &FormSubmissionId,
        alert_type: AlertType,
    ) -> Result<Option<ComplianceAlert>, RepositoryError>;
    fn list_alerts(&self, filter: &AlertFilter) -> Result<Vec<ComplianceAlert>, RepositoryError>;
}

/// Reminder audit trail. Rows are never removed; a pending row is written before each
/// delivery attempt and its outcome recorded once the transport answers.
pub trait ReminderLogRepository: Send + Sync {
    fn append_log(&self, log: ReminderLog) -> Result<ReminderLog, RepositoryError>;
    fn record_outcome(&self, log: ReminderLog) -> Result<(), RepositoryError>;
    fn list_logs(&self, form_id: &FormSubmissionId) -> Result<Vec<ReminderLog>, RepositoryError>;
}

/// Read access to couple details owned by the wider application.
pub trait CoupleDirectory: Send + Sync {
    fn fetch_couple(&self, id: &CoupleId) -> Result<Option<Couple>, RepositoryError>;
}

/// Everything the compliance service needs from storage.
pub trait ComplianceStore:
    FormSubmissionRepository + AlertRepository + ReminderLogRepository + CoupleDirectory
{
}

impl<T> ComplianceStore for T where
    T: FormSubmissionRepository + AlertRepository + ReminderLogRepository + CoupleDirectory
{
}
