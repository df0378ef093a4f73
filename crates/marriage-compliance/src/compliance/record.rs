use chrono::{DateTime, NaiveDate, Utc};

use super::deadline::{calculate_deadline, generate_schedule, DeadlineError};
use super::domain::{
    next_form_id, Couple, FormStatus, FormSubmission, FormSubmissionId, FormType, UserId,
};

/// Rejected state machine transitions.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FormTransitionError {
    #[error("a non-empty file reference is required to submit {0}")]
    EmptyFileReference(FormSubmissionId),
    #[error("{0} has been superseded and no longer accepts changes")]
    Superseded(FormSubmissionId),
    #[error("{id} cannot be validated while {status:?}")]
    NotCompleted {
        id: FormSubmissionId,
        status: FormStatus,
    },
    #[error("{0} is already validated")]
    AlreadyValidated(FormSubmissionId),
    #[error("{id} cannot start work while {status:?}")]
    CannotStart {
        id: FormSubmissionId,
        status: FormStatus,
    },
}

/// Outcome of a validation decision, used to drive follow-up alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    Approved,
    Rejected,
}

impl FormSubmission {
    /// Create a fresh record for a couple, anchoring the deadline to the ceremony date.
    pub fn for_couple(
        couple: &Couple,
        form_type: FormType,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Self, DeadlineError> {
        let ceremony_date = couple
            .ceremony_date
            .ok_or(DeadlineError::MissingCeremonyDate)?;
        let legal_deadline = calculate_deadline(Some(ceremony_date), form_type)?;
        Ok(Self {
            id: next_form_id(),
            organization_id: couple.organization_id.clone(),
            couple_id: couple.id.clone(),
            form_type,
            status: FormStatus::NotStarted,
            ceremony_date,
            legal_deadline,
            reminder_schedule: generate_schedule(legal_deadline, today),
            submitted_at: None,
            submitted_by: None,
            file_ref: None,
            is_validated: false,
            validated_by: None,
            validated_at: None,
            validation_notes: None,
            superseded_at: None,
            superseded_by: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_superseded(&self) -> bool {
        self.superseded_at.is_some()
    }

    /// Live and still awaiting a completed submission.
    pub fn is_open(&self) -> bool {
        !self.is_superseded() && self.status != FormStatus::Completed
    }

    pub fn days_until_deadline(&self, today: NaiveDate) -> i64 {
        (self.legal_deadline - today).num_days()
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<bool, FormTransitionError> {
        self.ensure_live()?;
        match self.status {
            FormStatus::NotStarted => {
                self.status = FormStatus::InProgress;
                self.updated_at = now;
                Ok(true)
            }
            FormStatus::InProgress => Ok(false),
            status => Err(FormTransitionError::CannotStart {
                id: self.id.clone(),
                status,
            }),
        }
    }

    /// Record a lodged file. Accepted from any non-validated state, including `Overdue`.
    pub fn submit(
        &mut self,
        file_ref: &str,
        submitted_by: &UserId,
        now: DateTime<Utc>,
    ) -> Result<(), FormTransitionError> {
        self.ensure_live()?;
        let file_ref = file_ref.trim();
        if file_ref.is_empty() {
            return Err(FormTransitionError::EmptyFileReference(self.id.clone()));
        }
        if self.status == FormStatus::Completed && self.is_validated {
            return Err(FormTransitionError::AlreadyValidated(self.id.clone()));
        }

        self.status = FormStatus::Completed;
        self.file_ref = Some(file_ref.to_string());
        self.submitted_at = Some(now);
        self.submitted_by = Some(submitted_by.clone());
        self.is_validated = false;
        self.validated_by = None;
        self.validated_at = None;
        self.updated_at = now;
        Ok(())
    }

    /// Apply a reviewer decision. Rejection reverts the record to `InProgress`.
    pub fn validate(
        &mut self,
        validator: &UserId,
        is_valid: bool,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ValidationOutcome, FormTransitionError> {
        self.ensure_live()?;
        if self.status != FormStatus::Completed {
            return Err(FormTransitionError::NotCompleted {
                id: self.id.clone(),
                status: self.status,
            });
        }
        if self.is_validated {
            return Err(FormTransitionError::AlreadyValidated(self.id.clone()));
        }

        self.validated_by = Some(validator.clone());
        self.validated_at = Some(now);
        self.validation_notes = notes;
        self.updated_at = now;

        if is_valid {
            self.is_validated = true;
            Ok(ValidationOutcome::Approved)
        } else {
            self.is_validated = false;
            self.status = FormStatus::InProgress;
            Ok(ValidationOutcome::Rejected)
        }
    }

    /// Flag the record overdue when the deadline has passed without a completed submission.
    ///
    /// Returns `true` only when the status actually changed.
    pub fn mark_overdue_if_due(&mut self, today: NaiveDate, now: DateTime<Utc>) -> bool {
        if !self.is_open() || self.legal_deadline >= today || self.status == FormStatus::Overdue {
            return false;
        }
        self.status = FormStatus::Overdue;
        self.updated_at = now;
        true
    }

    pub fn supersede(&mut self, replacement: &FormSubmissionId, now: DateTime<Utc>) {
        self.superseded_at = Some(now);
        self.superseded_by = Some(replacement.clone());
        self.updated_at = now;
    }

    /// Regenerate reminders from the immutable deadline, preserving sent checkpoints.
    pub fn refresh_schedule(&mut self, today: NaiveDate, now: DateTime<Utc>) {
        self.reminder_schedule
            .merge(generate_schedule(self.legal_deadline, today));
        self.updated_at = now;
    }

    fn ensure_live(&self) -> Result<(), FormTransitionError> {
        if self.is_superseded() {
            return Err(FormTransitionError::Superseded(self.id.clone()));
        }
        Ok(())
    }
}
