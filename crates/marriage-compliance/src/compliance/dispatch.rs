use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{
    next_reminder_log_id, CoupleId, DeliveryStatus, FormSubmissionId, ReminderLog,
};
use super::notify::{DeliveryReceipt, NotificationTransport, TransportError};
use super::reminder::{render_reminder, ReminderContext};
use super::repository::{
    CoupleDirectory, FormFilter, FormSubmissionRepository, ReminderLogRepository,
    RepositoryError,
};
use super::sweep::RecordFailure;

pub const DEFAULT_NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("couple {0} has no partner email on file")]
    MissingRecipient(CoupleId),
    #[error("couple {0} not found in directory")]
    CoupleNotFound(CoupleId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchSummary {
    pub examined: usize,
    pub sent: usize,
    pub failed: usize,
    pub missing_recipient: usize,
    /// Records left unreminded because the transport throttled this run.
    pub deferred: usize,
    pub failures: Vec<RecordFailure>,
}

#[derive(Debug)]
enum FormDispatch {
    Sent { audit_failure: Option<RepositoryError> },
    Failed,
    Throttled,
    /// Completed or superseded between listing and delivery.
    Closed,
}

/// Sends the latest due reminder checkpoint of each open record and audits every attempt.
///
/// A checkpoint is only marked sent after the transport confirms delivery; failures,
/// timeouts and throttling leave it pending so the next run retries it. Only the checkpoint
/// flag is written back, never the whole record.
pub struct ReminderDispatcher<S, N> {
    store: Arc<S>,
    transport: Arc<N>,
    timeout: Duration,
}

impl<S, N> ReminderDispatcher<S, N>
where
    S: FormSubmissionRepository + ReminderLogRepository + CoupleDirectory + 'static,
    N: NotificationTransport + 'static,
{
    pub fn new(store: Arc<S>, transport: Arc<N>) -> Self {
        Self::with_timeout(store, transport, DEFAULT_NOTIFICATION_TIMEOUT)
    }

    pub fn with_timeout(store: Arc<S>, transport: Arc<N>, timeout: Duration) -> Self {
        Self {
            store,
            transport,
            timeout,
        }
    }

    pub async fn run(&self, today: NaiveDate) -> Result<DispatchSummary, DispatchError> {
        let forms = self.store.list_forms(&FormFilter::open())?;
        let mut summary = DispatchSummary::default();
        let mut throttled = false;

        for form in forms {
            let Some(days) = form.reminder_schedule.due_on(today, form.legal_deadline) else {
                continue;
            };

            summary.examined += 1;
            if throttled {
                summary.deferred += 1;
                continue;
            }

            let form_id = form.id.clone();
            let organization_id = form.organization_id.clone();
            match self.dispatch_form(&form_id, days, today).await {
                Ok(FormDispatch::Sent { audit_failure }) => {
                    summary.sent += 1;
                    if let Some(err) = audit_failure {
                        summary.failures.push(RecordFailure {
                            form_id,
                            organization_id,
                            reason: format!("reminder delivered but audit not updated: {err}"),
                        });
                    }
                }
                Ok(FormDispatch::Failed) => summary.failed += 1,
                Ok(FormDispatch::Throttled) => {
                    summary.failed += 1;
                    throttled = true;
                }
                Ok(FormDispatch::Closed) => {}
                Err(err) => {
                    if matches!(err, DispatchError::MissingRecipient(_)) {
                        summary.missing_recipient += 1;
                    }
                    warn!(
                        organization_id = %organization_id,
                        form_id = %form_id,
                        error = %err,
                        "reminder dispatch skipped record"
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
            sent = summary.sent,
            failed = summary.failed,
            missing_recipient = summary.missing_recipient,
            deferred = summary.deferred,
            "reminder dispatch finished"
        );
        Ok(summary)
    }

    async fn dispatch_form(
        &self,
        form_id: &FormSubmissionId,
        days: u32,
        today: NaiveDate,
    ) -> Result<FormDispatch, DispatchError> {
        let form = match self.store.fetch_form(form_id)? {
            Some(form) if form.is_open() => form,
            _ => return Ok(FormDispatch::Closed),
        };
        let couple = self
            .store
            .fetch_couple(&form.couple_id)?
            .ok_or_else(|| DispatchError::CoupleNotFound(form.couple_id.clone()))?;
        let recipient = couple
            .primary_email()
            .ok_or_else(|| DispatchError::MissingRecipient(form.couple_id.clone()))?
            .to_string();

        // A retried checkpoint reports the days actually left, not the original offset.
        let days_left = u32::try_from(form.days_until_deadline(today)).unwrap_or(0);
        let message = render_reminder(&ReminderContext {
            form_type: form.form_type,
            days_before_deadline: days_left,
            partner1_name: &couple.partner1_name,
            partner2_name: &couple.partner2_name,
            ceremony_date: Some(form.ceremony_date),
            ceremony_location: couple.ceremony_location.as_deref(),
            deadline: form.legal_deadline,
        });

        let pending = self.store.append_log(ReminderLog {
            id: next_reminder_log_id(),
            organization_id: form.organization_id.clone(),
            couple_id: form.couple_id.clone(),
            form_submission_id: form.id.clone(),
            recipient: recipient.clone(),
            subject: message.subject.clone(),
            content: message.body.clone(),
            days_before_deadline: days,
            delivery_status: DeliveryStatus::Pending,
            failure_reason: None,
            sent_at: None,
            created_at: Utc::now(),
        })?;

        let result = self.deliver(&recipient, &message.subject, &message.body).await;
        let now = Utc::now();
        let outcome = ReminderLog {
            delivery_status: match result {
                Ok(_) => DeliveryStatus::Sent,
                Err(_) => DeliveryStatus::Failed,
            },
            failure_reason: result.as_ref().err().map(ToString::to_string),
            sent_at: result.as_ref().ok().map(|_| now),
            ..pending
        };
        let audit = self.store.record_outcome(outcome);

        match result {
            Ok(_) => {
                self.store.mark_checkpoint_sent(&form.id, days, now)?;
                info!(
                    organization_id = %form.organization_id,
                    form_id = %form.id,
                    days_before_deadline = days,
                    "reminder sent"
                );
                if let Err(err) = &audit {
                    warn!(form_id = %form.id, error = %err, "failed to record reminder outcome");
                }
                Ok(FormDispatch::Sent {
                    audit_failure: audit.err(),
                })
            }
            Err(err) => {
                audit?;
                if matches!(err, TransportError::Throttled) {
                    warn!(form_id = %form.id, "notification transport throttled, deferring remaining reminders");
                    return Ok(FormDispatch::Throttled);
                }
                warn!(
                    organization_id = %form.organization_id,
                    form_id = %form.id,
                    days_before_deadline = days,
                    error = %err,
                    "reminder delivery failed, will retry next run"
                );
                Ok(FormDispatch::Failed)
            }
        }
    }

    async fn deliver(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<DeliveryReceipt, TransportError> {
        match tokio::time::timeout(self.timeout, self.transport.send(to, subject, body)).await {
            Err(_) => Err(TransportError::Timeout(self.timeout.as_millis() as u64)),
            Ok(Ok(receipt)) if receipt.success => Ok(receipt),
            Ok(Ok(_)) => Err(TransportError::Rejected(
                "transport reported unsuccessful delivery".to_string(),
            )),
            Ok(Err(err)) => Err(err),
        }
    }
}
