use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::domain::{
    next_alert_id, AlertId, AlertSeverity, AlertType, ComplianceAlert, FormSubmission, UserId,
};
use super::repository::{AlertFilter, AlertRepository, RepositoryError};

/// Creates, deduplicates and resolves compliance alerts keyed by (record, alert type).
pub struct AlertManager<A> {
    alerts: Arc<A>,
}

impl<A> Clone for AlertManager<A> {
    fn clone(&self) -> Self {
        Self {
            alerts: self.alerts.clone(),
        }
    }
}

impl<A> AlertManager<A>
where
    A: AlertRepository,
{
    pub fn new(alerts: Arc<A>) -> Self {
        Self { alerts }
    }

    /// Raise an alert unless an unresolved one of the same type already exists for the record.
    ///
    /// A storage-level conflict from a concurrent writer is treated the same as the pre-check
    /// finding a duplicate: `Ok(None)`.
    pub fn raise_alert(
        &self,
        form: &FormSubmission,
        alert_type: AlertType,
        severity: AlertSeverity,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<Option<ComplianceAlert>, RepositoryError> {
        if self
            .alerts
            .find_unresolved_alert(&form.id, alert_type)?
            .is_some()
        {
            return Ok(None);
        }

        let alert = ComplianceAlert {
            id: next_alert_id(),
            organization_id: form.organization_id.clone(),
            couple_id: form.couple_id.clone(),
            form_submission_id: Some(form.id.clone()),
            alert_type,
            severity,
            title: title.into(),
            message: message.into(),
            is_resolved: false,
            resolved_at: None,
            resolved_by: None,
            created_at: Utc::now(),
        };

        match self.alerts.insert_alert(alert) {
            Ok(stored) => {
                info!(
                    organization_id = %stored.organization_id,
                    form_id = %form.id,
                    alert_id = %stored.id,
                    alert_type = ?alert_type,
                    severity = ?severity,
                    "compliance alert raised"
                );
                Ok(Some(stored))
            }
            Err(RepositoryError::Conflict) => {
                debug!(form_id = %form.id, alert_type = ?alert_type, "alert insert lost dedupe race");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Resolve an alert. Returns `false` when it was already resolved.
    pub fn resolve_alert(
        &self,
        alert_id: &AlertId,
        resolved_by: &UserId,
    ) -> Result<bool, RepositoryError> {
        let mut alert = self
            .alerts
            .fetch_alert(alert_id)?
            .ok_or(RepositoryError::NotFound)?;
        if alert.is_resolved {
            return Ok(false);
        }

        alert.is_resolved = true;
        alert.resolved_at = Some(Utc::now());
        alert.resolved_by = Some(resolved_by.clone());
        self.alerts.update_alert(alert)?;
        info!(alert_id = %alert_id, resolved_by = %resolved_by, "compliance alert resolved");
        Ok(true)
    }

    /// Resolve every unresolved alert of the given types for a record.
    pub fn resolve_for_form(
        &self,
        form: &FormSubmission,
        alert_types: &[AlertType],
        resolved_by: &UserId,
    ) -> Result<usize, RepositoryError> {
        let mut resolved = 0;
        for alert_type in alert_types {
            if let Some(alert) = self.alerts.find_unresolved_alert(&form.id, *alert_type)? {
                if self.resolve_alert(&alert.id, resolved_by)? {
                    resolved += 1;
                }
            }
        }
        Ok(resolved)
    }

    pub fn unresolved(&self, filter: AlertFilter) -> Result<Vec<ComplianceAlert>, RepositoryError> {
        let filter = AlertFilter {
            unresolved_only: true,
            ..filter
        };
        let mut alerts = self.alerts.list_alerts(&filter)?;
        alerts.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(alerts)
    }
}
