use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use marriage_compliance::compliance::report::export_csv;
use marriage_compliance::compliance::{
    calculate_deadline, AlertType, ComplianceService, ComplianceSweep, Couple,
    CoupleId, DeliveryReceipt, DeliveryStatus, FormStatus, FormType, InMemoryComplianceStore,
    NotificationTransport, OrganizationId, PriorMarriageEnd, ReminderDispatcher, TransportError,
    UserId,
};

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

fn organization() -> OrganizationId {
    OrganizationId::from("org-coastal-celebrants")
}

fn couple(id: &str) -> Couple {
    Couple {
        id: CoupleId::from(id),
        organization_id: organization(),
        partner1_name: "Priya".to_string(),
        partner2_name: "Sam".to_string(),
        partner1_email: Some(format!("priya+{id}@example.com")),
        partner2_email: None,
        ceremony_date: Some(date(2025, 8, 1)),
        ceremony_location: Some("Cottesloe Beach".to_string()),
        prior_marriages: vec![PriorMarriageEnd::Divorce],
    }
}

fn seeded(couples: &[Couple]) -> Arc<InMemoryComplianceStore> {
    let store = Arc::new(InMemoryComplianceStore::new());
    for couple in couples {
        store.upsert_couple(couple.clone()).expect("couple stored");
    }
    store
}

/// Outbound transport that fails the first `failures` sends and records subjects.
struct OutboxTransport {
    failures: Mutex<usize>,
    subjects: Mutex<Vec<String>>,
}

impl OutboxTransport {
    fn failing_first(failures: usize) -> Self {
        Self {
            failures: Mutex::new(failures),
            subjects: Mutex::new(Vec::new()),
        }
    }

    fn subjects(&self) -> Vec<String> {
        self.subjects.lock().expect("subjects mutex poisoned").clone()
    }
}

#[async_trait]
impl NotificationTransport for OutboxTransport {
    async fn send(
        &self,
        _to: &str,
        subject: &str,
        _body: &str,
    ) -> Result<DeliveryReceipt, TransportError> {
        self.subjects
            .lock()
            .expect("subjects mutex poisoned")
            .push(subject.to_string());
        let mut failures = self.failures.lock().expect("failures mutex poisoned");
        if *failures > 0 {
            *failures -= 1;
            return Err(TransportError::Unavailable("provider outage".to_string()));
        }
        Ok(DeliveryReceipt::delivered("outbox-1"))
    }
}

#[test]
fn noim_deadline_and_schedule_follow_ceremony_date() {
    let store = seeded(&[couple("c-a")]);
    let service = ComplianceService::new(store);

    let created = service
        .initialize_forms_for_couple(&CoupleId::from("c-a"), date(2025, 6, 1))
        .expect("forms initialized");

    let noim = created
        .iter()
        .find(|form| form.form_type == FormType::Noim)
        .expect("noim created");
    assert_eq!(
        noim.legal_deadline,
        calculate_deadline(Some(date(2025, 8, 1)), FormType::Noim).expect("deadline")
    );
    let schedule: Vec<_> = noim
        .reminder_schedule
        .checkpoints()
        .iter()
        .map(|checkpoint| (checkpoint.date, checkpoint.days_before_deadline))
        .collect();
    assert_eq!(
        schedule,
        vec![
            (date(2025, 6, 17), 14),
            (date(2025, 6, 24), 7),
            (date(2025, 6, 28), 3),
            (date(2025, 6, 30), 1),
        ]
    );
    assert!(created
        .iter()
        .any(|form| form.form_type == FormType::DivorceCertificate));
}

#[test]
fn sweeps_escalate_then_lodgement_closes_out() {
    let store = seeded(&[couple("c-b")]);
    let service = ComplianceService::new(store.clone());
    let sweep = ComplianceSweep::new(store.clone());
    let created = service
        .initialize_forms_for_couple(&CoupleId::from("c-b"), date(2025, 6, 1))
        .expect("forms initialized");
    let noim = created
        .iter()
        .find(|form| form.form_type == FormType::Noim)
        .expect("noim created")
        .clone();
    service.start_form(&noim.id).expect("started");

    for _ in 0..3 {
        sweep
            .run(noim.legal_deadline - Duration::days(2))
            .expect("sweep runs");
    }
    let alerts = service.open_alerts(&organization()).expect("alerts");
    let approaching: Vec<_> = alerts
        .iter()
        .filter(|alert| alert.form_submission_id.as_ref() == Some(&noim.id))
        .collect();
    assert_eq!(approaching.len(), 1);
    assert_eq!(approaching[0].alert_type, AlertType::DeadlineApproaching);
    assert_eq!(service.form(&noim.id).expect("form").status, FormStatus::InProgress);

    sweep
        .run(noim.legal_deadline + Duration::days(5))
        .expect("sweep runs");
    assert_eq!(service.form(&noim.id).expect("form").status, FormStatus::Overdue);

    service
        .submit_form(&noim.id, "vault/noim-c-b.pdf", &UserId::from("priya"))
        .expect("late lodgement accepted");
    sweep
        .run(noim.legal_deadline + Duration::days(6))
        .expect("sweep runs");
    assert_eq!(service.form(&noim.id).expect("form").status, FormStatus::Completed);

    let noim_alerts: Vec<_> = service
        .open_alerts(&organization())
        .expect("alerts")
        .into_iter()
        .filter(|alert| alert.form_submission_id.as_ref() == Some(&noim.id))
        .map(|alert| alert.alert_type)
        .collect();
    assert_eq!(noim_alerts, vec![AlertType::ValidationRequired]);

    let views = service
        .couple_forms_status(&CoupleId::from("c-b"), noim.legal_deadline + Duration::days(6))
        .expect("status");
    let csv = export_csv(&views).expect("csv renders");
    assert_eq!(csv.lines().count(), views.len() + 1);
}

#[tokio::test]
async fn failed_reminder_is_logged_and_retried() {
    let store = seeded(&[couple("c-e")]);
    let service = ComplianceService::new(store.clone());
    let created = service
        .initialize_forms_for_couple(&CoupleId::from("c-e"), date(2025, 6, 1))
        .expect("forms initialized");
    let noim = created
        .iter()
        .find(|form| form.form_type == FormType::Noim)
        .expect("noim created")
        .clone();
    let transport = Arc::new(OutboxTransport::failing_first(1));
    let dispatcher = ReminderDispatcher::new(store.clone(), transport.clone());

    dispatcher.run(date(2025, 6, 17)).await.expect("dispatch runs");
    let history = service.reminder_history(&noim.id).expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].delivery_status, DeliveryStatus::Failed);
    assert!(service
        .form(&noim.id)
        .expect("form")
        .reminder_schedule
        .get(14)
        .is_some_and(|checkpoint| !checkpoint.sent));

    dispatcher.run(date(2025, 6, 18)).await.expect("dispatch runs");
    let history = service.reminder_history(&noim.id).expect("history");
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].delivery_status, DeliveryStatus::Sent);
    assert!(service
        .form(&noim.id)
        .expect("form")
        .reminder_schedule
        .get(14)
        .is_some_and(|checkpoint| checkpoint.sent));

    let noim_subjects: Vec<_> = transport
        .subjects()
        .into_iter()
        .filter(|subject| subject.contains("Notice of Intended Marriage"))
        .collect();
    assert_eq!(noim_subjects.len(), 2);
}
