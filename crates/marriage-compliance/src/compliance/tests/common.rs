use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::compliance::domain::{
    AlertId, AlertType, ComplianceAlert, Couple, CoupleId, FormSubmission, FormSubmissionId,
    FormType, OrganizationId, PriorMarriageEnd, ReminderLog, UserId,
};
use crate::compliance::memory::InMemoryComplianceStore;
use crate::compliance::notify::{DeliveryReceipt, NotificationTransport, TransportError};
use crate::compliance::repository::{
    AlertFilter, AlertRepository, CoupleDirectory, FormFilter, FormSubmissionRepository,
    ReminderLogRepository, RepositoryError,
};
use crate::compliance::ComplianceService;

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn organization() -> OrganizationId {
    OrganizationId("org-harbour".to_string())
}

pub(super) fn couple(id: &str, ceremony_date: Option<NaiveDate>) -> Couple {
    Couple {
        id: CoupleId(id.to_string()),
        organization_id: organization(),
        partner1_name: "Amelia".to_string(),
        partner2_name: "Jordan".to_string(),
        partner1_email: Some(format!("amelia+{id}@example.com")),
        partner2_email: Some(format!("jordan+{id}@example.com")),
        ceremony_date,
        ceremony_location: Some("Botanic Gardens".to_string()),
        prior_marriages: Vec::new(),
    }
}

pub(super) fn divorced_couple(id: &str, ceremony_date: NaiveDate) -> Couple {
    Couple {
        prior_marriages: vec![PriorMarriageEnd::Divorce],
        ..couple(id, Some(ceremony_date))
    }
}

pub(super) fn store_with(couples: Vec<Couple>) -> Arc<InMemoryComplianceStore> {
    let store = Arc::new(InMemoryComplianceStore::new());
    for couple in couples {
        store.upsert_couple(couple).expect("couple stored");
    }
    store
}

/// Insert a single record for `couple`, created on `created_on`.
pub(super) fn seed_form(
    store: &InMemoryComplianceStore,
    couple: &Couple,
    form_type: FormType,
    created_on: NaiveDate,
) -> FormSubmission {
    let form = FormSubmission::for_couple(couple, form_type, created_on, chrono::Utc::now())
        .expect("ceremony date present");
    store.insert_form(form).expect("form inserted")
}

pub(super) fn reload(store: &InMemoryComplianceStore, id: &FormSubmissionId) -> FormSubmission {
    store
        .fetch_form(id)
        .expect("fetch succeeds")
        .expect("form present")
}

pub(super) fn unresolved_alerts(
    store: &InMemoryComplianceStore,
    id: &FormSubmissionId,
) -> Vec<ComplianceAlert> {
    store
        .list_alerts(&AlertFilter {
            form_submission_id: Some(id.clone()),
            ..AlertFilter::unresolved()
        })
        .expect("list alerts")
}

pub(super) fn unresolved_of_type(
    store: &InMemoryComplianceStore,
    id: &FormSubmissionId,
    alert_type: AlertType,
) -> Vec<ComplianceAlert> {
    unresolved_alerts(store, id)
        .into_iter()
        .filter(|alert| alert.alert_type == alert_type)
        .collect()
}

pub(super) fn service(
    store: Arc<InMemoryComplianceStore>,
) -> ComplianceService<InMemoryComplianceStore> {
    ComplianceService::new(store)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Attempt {
    pub(super) to: String,
    pub(super) subject: String,
    pub(super) body: String,
}

/// Transport that records every attempt and replays scripted results, succeeding by default.
#[derive(Default)]
pub(super) struct RecordingTransport {
    attempts: Mutex<Vec<Attempt>>,
    script: Mutex<VecDeque<Result<DeliveryReceipt, TransportError>>>,
}

impl RecordingTransport {
    pub(super) fn scripted(results: Vec<Result<DeliveryReceipt, TransportError>>) -> Self {
        Self {
            attempts: Mutex::new(Vec::new()),
            script: Mutex::new(results.into()),
        }
    }

    pub(super) fn attempts(&self) -> Vec<Attempt> {
        self.attempts.lock().expect("attempt mutex poisoned").clone()
    }
}

#[async_trait]
impl NotificationTransport for RecordingTransport {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<DeliveryReceipt, TransportError> {
        self.attempts
            .lock()
            .expect("attempt mutex poisoned")
            .push(Attempt {
                to: to.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
        self.script
            .lock()
            .expect("script mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| Ok(DeliveryReceipt::delivered("msg-ok")))
    }
}

/// Transport that never answers within a short timeout.
pub(super) struct StalledTransport {
    pub(super) delay: Duration,
}

#[async_trait]
impl NotificationTransport for StalledTransport {
    async fn send(
        &self,
        _to: &str,
        _subject: &str,
        _body: &str,
    ) -> Result<DeliveryReceipt, TransportError> {
        tokio::time::sleep(self.delay).await;
        Ok(DeliveryReceipt::delivered("late"))
    }
}

/// Store wrapper whose writes fail for selected records, or for the reminder audit trail.
pub(super) struct FlakyStore {
    pub(super) inner: Arc<InMemoryComplianceStore>,
    pub(super) failing_forms: BTreeSet<FormSubmissionId>,
    pub(super) failing_audit: bool,
    /// Lodged by another writer right after the next listing.
    pub(super) lodge_after_list: Mutex<Option<FormSubmissionId>>,
}

impl FlakyStore {
    pub(super) fn failing(
        inner: Arc<InMemoryComplianceStore>,
        failing: &[&FormSubmissionId],
    ) -> Self {
        Self {
            inner,
            failing_forms: failing.iter().map(|id| (*id).clone()).collect(),
            failing_audit: false,
            lodge_after_list: Mutex::new(None),
        }
    }

    pub(super) fn lodging_after_list(
        inner: Arc<InMemoryComplianceStore>,
        form_id: &FormSubmissionId,
    ) -> Self {
        Self {
            lodge_after_list: Mutex::new(Some(form_id.clone())),
            ..Self::failing(inner, &[])
        }
    }

    pub(super) fn failing_audit(inner: Arc<InMemoryComplianceStore>) -> Self {
        Self {
            inner,
            failing_forms: BTreeSet::new(),
            failing_audit: true,
            lodge_after_list: Mutex::new(None),
        }
    }

    fn check(&self, id: &FormSubmissionId) -> Result<(), RepositoryError> {
        if self.failing_forms.contains(id) {
            return Err(RepositoryError::Unavailable("disk full".to_string()));
        }
        Ok(())
    }

    fn check_audit(&self) -> Result<(), RepositoryError> {
        if self.failing_audit {
            return Err(RepositoryError::Unavailable("audit table locked".to_string()));
        }
        Ok(())
    }
}

impl FormSubmissionRepository for FlakyStore {
    fn insert_form(&self, form: FormSubmission) -> Result<FormSubmission, RepositoryError> {
        self.inner.insert_form(form)
    }

    fn update_form(&self, form: FormSubmission) -> Result<(), RepositoryError> {
        self.check(&form.id)?;
        self.inner.update_form(form)
    }

    fn fetch_form(&self, id: &FormSubmissionId) -> Result<Option<FormSubmission>, RepositoryError> {
        self.inner.fetch_form(id)
    }

    fn list_forms(&self, filter: &FormFilter) -> Result<Vec<FormSubmission>, RepositoryError> {
        let forms = self.inner.list_forms(filter)?;
        let lodged = self
            .lodge_after_list
            .lock()
            .expect("lodge mutex poisoned")
            .take();
        if let Some(id) = lodged {
            let mut form = self.inner.fetch_form(&id)?.ok_or(RepositoryError::NotFound)?;
            form.submit("files/lodged.pdf", &UserId::from("amelia"), Utc::now())
                .expect("lodged");
            self.inner.update_form(form)?;
        }
        Ok(forms)
    }

    fn mark_checkpoint_sent(
        &self,
        id: &FormSubmissionId,
        days_before_deadline: u32,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        self.check(id)?;
        self.inner.mark_checkpoint_sent(id, days_before_deadline, at)
    }

    fn mark_overdue(
        &self,
        id: &FormSubmissionId,
        today: NaiveDate,
        at: DateTime<Utc>,
    ) -> Result<FormSubmission, RepositoryError> {
        self.check(id)?;
        self.inner.mark_overdue(id, today, at)
    }

    fn replace_form(
        &self,
        previous: &FormSubmissionId,
        replacement: FormSubmission,
        at: DateTime<Utc>,
    ) -> Result<FormSubmission, RepositoryError> {
        self.check(previous)?;
        self.inner.replace_form(previous, replacement, at)
    }
}

impl AlertRepository for FlakyStore {
    fn insert_alert(&self, alert: ComplianceAlert) -> Result<ComplianceAlert, RepositoryError> {
        if let Some(form_id) = &alert.form_submission_id {
            self.check(form_id)?;
        }
        self.inner.insert_alert(alert)
    }

    fn update_alert(&self, alert: ComplianceAlert) -> Result<(), RepositoryError> {
        self.inner.update_alert(alert)
    }

    fn fetch_alert(&self, id: &AlertId) -> Result<Option<ComplianceAlert>, RepositoryError> {
        self.inner.fetch_alert(id)
    }

    fn find_unresolved_alert(
        &self,
        form_id: &FormSubmissionId,
        alert_type: AlertType,
    ) -> Result<Option<ComplianceAlert>, RepositoryError> {
        self.inner.find_unresolved_alert(form_id, alert_type)
    }

    fn list_alerts(&self, filter: &AlertFilter) -> Result<Vec<ComplianceAlert>, RepositoryError> {
        self.inner.list_alerts(filter)
    }
}

impl ReminderLogRepository for FlakyStore {
    fn append_log(&self, log: ReminderLog) -> Result<ReminderLog, RepositoryError> {
        self.check_audit()?;
        self.inner.append_log(log)
    }

    fn record_outcome(&self, log: ReminderLog) -> Result<(), RepositoryError> {
        self.check_audit()?;
        self.inner.record_outcome(log)
    }

    fn list_logs(&self, form_id: &FormSubmissionId) -> Result<Vec<ReminderLog>, RepositoryError> {
        self.inner.list_logs(form_id)
    }
}

impl CoupleDirectory for FlakyStore {
    fn fetch_couple(&self, id: &CoupleId) -> Result<Option<Couple>, RepositoryError> {
        self.inner.fetch_couple(id)
    }
}
