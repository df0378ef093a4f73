use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};

use super::domain::{
    AlertId, AlertType, ComplianceAlert, Couple, CoupleId, FormSubmission, FormSubmissionId,
    ReminderLog,
};
use super::repository::{
    AlertFilter, AlertRepository, CoupleDirectory, FormFilter, FormSubmissionRepository,
    ReminderLogRepository, RepositoryError,
};

/// Process-local store used by the CLI demo and tests.
///
/// Enforces the same unresolved-alert uniqueness a relational backend would carry as a
/// partial unique index on `(form_submission_id, alert_type) WHERE NOT is_resolved`.
#[derive(Debug, Default)]
pub struct InMemoryComplianceStore {
    forms: Mutex<BTreeMap<FormSubmissionId, FormSubmission>>,
    alerts: Mutex<BTreeMap<AlertId, ComplianceAlert>>,
    logs: Mutex<Vec<ReminderLog>>,
    couples: Mutex<BTreeMap<CoupleId, Couple>>,
}

fn lock<'a, T>(
    mutex: &'a Mutex<T>,
    name: &'static str,
) -> Result<MutexGuard<'a, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable(format!("{name} store lock poisoned")))
}

impl InMemoryComplianceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_couple(&self, couple: Couple) -> Result<(), RepositoryError> {
        lock(&self.couples, "couple")?.insert(couple.id.clone(), couple);
        Ok(())
    }

    pub fn couples(&self) -> Result<Vec<Couple>, RepositoryError> {
        Ok(lock(&self.couples, "couple")?.values().cloned().collect())
    }
}

impl FormSubmissionRepository for InMemoryComplianceStore {
    fn insert_form(&self, form: FormSubmission) -> Result<FormSubmission, RepositoryError> {
        let mut guard = lock(&self.forms, "form")?;
        if guard.contains_key(&form.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(form.id.clone(), form.clone());
        Ok(form)
    }

    fn update_form(&self, form: FormSubmission) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.forms, "form")?;
        match guard.get_mut(&form.id) {
            Some(existing) => {
                *existing = form;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch_form(&self, id: &FormSubmissionId) -> Result<Option<FormSubmission>, RepositoryError> {
        Ok(lock(&self.forms, "form")?.get(id).cloned())
    }

    fn list_forms(&self, filter: &FormFilter) -> Result<Vec<FormSubmission>, RepositoryError> {
        let guard = lock(&self.forms, "form")?;
        let mut forms: Vec<FormSubmission> = guard
            .values()
            .filter(|form| filter.matches(form))
            .cloned()
            .collect();
        forms.sort_by(|a, b| {
            a.legal_deadline
                .cmp(&b.legal_deadline)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(forms)
    }

    fn mark_checkpoint_sent(
        &self,
        id: &FormSubmissionId,
        days_before_deadline: u32,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut guard = lock(&self.forms, "form")?;
        let form = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        let marked = form.reminder_schedule.record_delivery(days_before_deadline);
        if marked {
            form.updated_at = at;
        }
        Ok(marked)
    }

    fn mark_overdue(
        &self,
        id: &FormSubmissionId,
        today: NaiveDate,
        at: DateTime<Utc>,
    ) -> Result<FormSubmission, RepositoryError> {
        let mut guard = lock(&self.forms, "form")?;
        let form = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        form.mark_overdue_if_due(today, at);
        Ok(form.clone())
    }

    fn replace_form(
        &self,
        previous: &FormSubmissionId,
        replacement: FormSubmission,
        at: DateTime<Utc>,
    ) -> Result<FormSubmission, RepositoryError> {
        let mut guard = lock(&self.forms, "form")?;
        if guard.contains_key(&replacement.id) {
            return Err(RepositoryError::Conflict);
        }
        let previous = guard.get_mut(previous).ok_or(RepositoryError::NotFound)?;
        if previous.is_superseded() {
            return Err(RepositoryError::Conflict);
        }
        previous.supersede(&replacement.id, at);
        guard.insert(replacement.id.clone(), replacement.clone());
        Ok(replacement)
    }
}

impl AlertRepository for InMemoryComplianceStore {
    fn insert_alert(&self, alert: ComplianceAlert) -> Result<ComplianceAlert, RepositoryError> {
        let mut guard = lock(&self.alerts, "alert")?;
        if guard.contains_key(&alert.id) {
            return Err(RepositoryError::Conflict);
        }
        if let Some(form_id) = &alert.form_submission_id {
            let duplicate = guard.values().any(|existing| {
                !existing.is_resolved
                    && existing.alert_type == alert.alert_type
                    && existing.form_submission_id.as_ref() == Some(form_id)
            });
            if duplicate {
                return Err(RepositoryError::Conflict);
            }
        }
        guard.insert(alert.id.clone(), alert.clone());
        Ok(alert)
    }

    fn update_alert(&self, alert: ComplianceAlert) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.alerts, "alert")?;
        match guard.get_mut(&alert.id) {
            Some(existing) => {
                *existing = alert;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch_alert(&self, id: &AlertId) -> Result<Option<ComplianceAlert>, RepositoryError> {
        Ok(lock(&self.alerts, "alert")?.get(id).cloned())
    }

    fn find_unresolved_alert(
        &self,
        form_id: &FormSubmissionId,
        alert_type: AlertType,
    ) -> Result<Option<ComplianceAlert>, RepositoryError> {
        let guard = lock(&self.alerts, "alert")?;
        Ok(guard
            .values()
            .find(|alert| {
                !alert.is_resolved
                    && alert.alert_type == alert_type
                    && alert.form_submission_id.as_ref() == Some(form_id)
            })
            .cloned())
    }

    fn list_alerts(&self, filter: &AlertFilter) -> Result<Vec<ComplianceAlert>, RepositoryError> {
        let guard = lock(&self.alerts, "alert")?;
        Ok(guard
            .values()
            .filter(|alert| filter.matches(alert))
            .cloned()
            .collect())
    }
}

impl ReminderLogRepository for InMemoryComplianceStore {
    fn append_log(&self, log: ReminderLog) -> Result<ReminderLog, RepositoryError> {
        lock(&self.logs, "reminder log")?.push(log.clone());
        Ok(log)
    }

    fn record_outcome(&self, log: ReminderLog) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.logs, "reminder log")?;
        match guard.iter_mut().find(|existing| existing.id == log.id) {
            Some(existing) => {
                *existing = log;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn list_logs(&self, form_id: &FormSubmissionId) -> Result<Vec<ReminderLog>, RepositoryError> {
        let guard = lock(&self.logs, "reminder log")?;
        Ok(guard
            .iter()
            .filter(|log| &log.form_submission_id == form_id)
            .cloned()
            .collect())
    }
}

impl CoupleDirectory for InMemoryComplianceStore {
    fn fetch_couple(&self, id: &CoupleId) -> Result<Option<Couple>, RepositoryError> {
        Ok(lock(&self.couples, "couple")?.get(id).cloned())
    }
}
