use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use super::alerts::AlertManager;
use super::deadline::{calculate_deadline, DeadlineError};
use super::domain::{
    AlertId, AlertSeverity, AlertType, ComplianceAlert, Couple, CoupleId, FormSubmission,
    FormSubmissionId, OrganizationId, ReminderLog, UserId,
};
use super::record::{FormTransitionError, ValidationOutcome};
use super::report::{ComplianceDashboard, FormStatusView};
use super::repository::{AlertFilter, ComplianceStore, FormFilter, RepositoryError};

/// Facade over the compliance store exposing the lifecycle operations used by staff and couples.
pub struct ComplianceService<S> {
    store: Arc<S>,
    alerts: AlertManager<S>,
}

impl<S> ComplianceService<S>
where
    S: ComplianceStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            alerts: AlertManager::new(store.clone()),
            store,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Create one record per required form type that has no live record yet.
    pub fn initialize_forms_for_couple(
        &self,
        couple_id: &CoupleId,
        today: NaiveDate,
    ) -> Result<Vec<FormSubmission>, ComplianceServiceError> {
        let couple = self.couple(couple_id)?;
        couple
            .ceremony_date
            .ok_or(DeadlineError::MissingCeremonyDate)?;

        let existing = self.store.list_forms(&FormFilter::for_couple(couple_id))?;
        let now = Utc::now();
        let mut created = Vec::new();

        for form_type in couple.required_forms() {
            if existing.iter().any(|form| form.form_type == form_type) {
                continue;
            }
            let form = FormSubmission::for_couple(&couple, form_type, today, now)?;
            let stored = self.store.insert_form(form)?;
            info!(
                organization_id = %stored.organization_id,
                couple_id = %couple_id,
                form_id = %stored.id,
                form_type = ?form_type,
                deadline = %stored.legal_deadline,
                "form record initialized"
            );
            created.push(stored);
        }

        Ok(created)
    }

    pub fn start_form(
        &self,
        form_id: &FormSubmissionId,
    ) -> Result<FormSubmission, ComplianceServiceError> {
        let mut form = self.form(form_id)?;
        if form.start(Utc::now())? {
            self.store.update_form(form.clone())?;
        }
        Ok(form)
    }

    /// Record a lodged file, completing the form and queueing it for validation.
    pub fn submit_form(
        &self,
        form_id: &FormSubmissionId,
        file_ref: &str,
        submitted_by: &UserId,
    ) -> Result<FormSubmission, ComplianceServiceError> {
        let mut form = self.form(form_id)?;
        form.submit(file_ref, submitted_by, Utc::now())?;
        self.store.update_form(form.clone())?;
        info!(
            organization_id = %form.organization_id,
            form_id = %form.id,
            submitted_by = %submitted_by,
            "form submitted"
        );

        self.follow_up(&form, |alerts| {
            alerts.resolve_for_form(
                &form,
                &[
                    AlertType::DeadlineApproaching,
                    AlertType::FormOverdue,
                    AlertType::ResubmissionRequired,
                ],
                &UserId::system(),
            )?;
            alerts.raise_alert(
                &form,
                AlertType::ValidationRequired,
                AlertSeverity::Medium,
                format!("{} awaiting validation", form.form_type.label()),
                format!("A file was lodged by {submitted_by} and needs review."),
            )?;
            Ok(())
        });

        Ok(form)
    }

    /// Apply a reviewer decision. Rejection reverts to `InProgress` and requests resubmission.
    pub fn validate_form(
        &self,
        form_id: &FormSubmissionId,
        validator: &UserId,
        is_valid: bool,
        notes: Option<String>,
    ) -> Result<FormSubmission, ComplianceServiceError> {
        let mut form = self.form(form_id)?;
        let outcome = form.validate(validator, is_valid, notes, Utc::now())?;
        self.store.update_form(form.clone())?;
        info!(
            organization_id = %form.organization_id,
            form_id = %form.id,
            validator = %validator,
            outcome = ?outcome,
            "form validation recorded"
        );

        self.follow_up(&form, |alerts| {
            alerts.resolve_for_form(&form, &[AlertType::ValidationRequired], validator)?;
            if outcome == ValidationOutcome::Rejected {
                alerts.raise_alert(
                    &form,
                    AlertType::ResubmissionRequired,
                    AlertSeverity::High,
                    format!("{} must be resubmitted", form.form_type.label()),
                    form.validation_notes
                        .clone()
                        .unwrap_or_else(|| "The lodged file was rejected on review.".to_string()),
                )?;
            }
            Ok(())
        });

        Ok(form)
    }

    pub fn resolve_alert(
        &self,
        alert_id: &AlertId,
        resolved_by: &UserId,
    ) -> Result<(), ComplianceServiceError> {
        self.alerts.resolve_alert(alert_id, resolved_by)?;
        Ok(())
    }

    pub fn open_alerts(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<ComplianceAlert>, ComplianceServiceError> {
        Ok(self.alerts.unresolved(AlertFilter {
            organization_id: Some(organization_id.clone()),
            ..AlertFilter::default()
        })?)
    }

    pub fn dashboard(
        &self,
        organization_id: &OrganizationId,
        today: NaiveDate,
    ) -> Result<ComplianceDashboard, ComplianceServiceError> {
        let forms = self
            .store
            .list_forms(&FormFilter::for_organization(organization_id))?;
        let alerts = self.store.list_alerts(&AlertFilter {
            organization_id: Some(organization_id.clone()),
            ..AlertFilter::unresolved()
        })?;
        Ok(ComplianceDashboard::build(
            organization_id,
            &forms,
            &alerts,
            today,
        ))
    }

    pub fn couple_forms_status(
        &self,
        couple_id: &CoupleId,
        today: NaiveDate,
    ) -> Result<Vec<FormStatusView>, ComplianceServiceError> {
        let forms = self.store.list_forms(&FormFilter::for_couple(couple_id))?;
        Ok(forms
            .iter()
            .map(|form| FormStatusView::from_form(form, today))
            .collect())
    }

    /// Supersede open records after a ceremony date change.
    ///
    /// Completed records are kept; every other live record is replaced by a fresh record with
    /// a deadline computed from `ceremony_date`. Records whose deadline would not change are
    /// left untouched.
    pub fn reschedule_ceremony(
        &self,
        couple_id: &CoupleId,
        ceremony_date: NaiveDate,
        today: NaiveDate,
    ) -> Result<Vec<FormSubmission>, ComplianceServiceError> {
        let mut couple = self.couple(couple_id)?;
        couple.ceremony_date = Some(ceremony_date);

        let open = self
            .store
            .list_forms(&FormFilter::open().in_couple(couple_id))?;
        let now = Utc::now();
        let mut replacements = Vec::new();

        for mut previous in open {
            if calculate_deadline(Some(ceremony_date), previous.form_type)?
                == previous.legal_deadline
            {
                continue;
            }

            let replacement = FormSubmission::for_couple(&couple, previous.form_type, today, now)?;
            let replacement = self.store.replace_form(&previous.id, replacement, now)?;
            previous.supersede(&replacement.id, now);

            self.follow_up(&previous, |alerts| {
                alerts.resolve_for_form(
                    &previous,
                    &[
                        AlertType::DeadlineApproaching,
                        AlertType::FormOverdue,
                        AlertType::ValidationRequired,
                        AlertType::ResubmissionRequired,
                    ],
                    &UserId::system(),
                )?;
                Ok(())
            });

            info!(
                organization_id = %replacement.organization_id,
                couple_id = %couple_id,
                superseded = %previous.id,
                replacement = %replacement.id,
                deadline = %replacement.legal_deadline,
                "form record superseded after reschedule"
            );
            replacements.push(replacement);
        }

        Ok(replacements)
    }

    /// Regenerate the reminder schedule of a record, keeping checkpoints already sent.
    pub fn refresh_schedule(
        &self,
        form_id: &FormSubmissionId,
        today: NaiveDate,
    ) -> Result<FormSubmission, ComplianceServiceError> {
        let mut form = self.form(form_id)?;
        if form.is_superseded() {
            return Err(FormTransitionError::Superseded(form.id).into());
        }
        form.refresh_schedule(today, Utc::now());
        self.store.update_form(form.clone())?;
        Ok(form)
    }

    pub fn reminder_history(
        &self,
        form_id: &FormSubmissionId,
    ) -> Result<Vec<ReminderLog>, ComplianceServiceError> {
        Ok(self.store.list_logs(form_id)?)
    }

    pub fn form(&self, form_id: &FormSubmissionId) -> Result<FormSubmission, ComplianceServiceError> {
        Ok(self
            .store
            .fetch_form(form_id)?
            .ok_or(RepositoryError::NotFound)?)
    }

    fn couple(&self, couple_id: &CoupleId) -> Result<Couple, ComplianceServiceError> {
        Ok(self
            .store
            .fetch_couple(couple_id)?
            .ok_or(RepositoryError::NotFound)?)
    }

    // Alert bookkeeping runs after the record commit; failures are logged, not returned.
    fn follow_up<F>(&self, form: &FormSubmission, action: F)
    where
        F: FnOnce(&AlertManager<S>) -> Result<(), RepositoryError>,
    {
        if let Err(err) = action(&self.alerts) {
            warn!(
                organization_id = %form.organization_id,
                form_id = %form.id,
                error = %err,
                "alert follow-up failed"
            );
        }
    }
}

/// Error raised by the compliance service.
#[derive(Debug, thiserror::Error)]
pub enum ComplianceServiceError {
    #[error(transparent)]
    Deadline(#[from] DeadlineError),
    #[error(transparent)]
    Transition(#[from] FormTransitionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
