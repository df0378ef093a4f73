use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use marriage_compliance::compliance::{
    ComplianceService, Couple, CoupleId, DeliveryReceipt, InMemoryComplianceStore,
    NotificationTransport, OrganizationId, PriorMarriageEnd, TransportError,
};
use marriage_compliance::error::AppError;
use metrics_exporter_prometheus::PrometheusHandle;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) store: Arc<InMemoryComplianceStore>,
}

/// Transport that writes reminders to the tracing log instead of a mail provider.
pub(crate) struct LogTransport {
    sender: String,
    sequence: AtomicU64,
}

impl LogTransport {
    pub(crate) fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            sequence: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl NotificationTransport for LogTransport {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<DeliveryReceipt, TransportError> {
        let reference = format!("log-{:06}", self.sequence.fetch_add(1, Ordering::Relaxed));
        info!(
            from = %self.sender,
            %to,
            %subject,
            body_len = body.len(),
            %reference,
            "reminder delivered to log transport"
        );
        Ok(DeliveryReceipt::delivered(reference))
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// Read a JSON array of couples exported from the couple directory.
pub(crate) fn load_couples(path: &Path) -> Result<Vec<Couple>, AppError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Build an in-memory store holding `couples` with their required forms initialized.
///
/// Couples without a ceremony date are stored but get no form records.
pub(crate) fn seeded_store(
    couples: Vec<Couple>,
    today: NaiveDate,
) -> Result<Arc<InMemoryComplianceStore>, AppError> {
    let store = Arc::new(InMemoryComplianceStore::new());
    let service = ComplianceService::new(store.clone());

    for couple in couples {
        let couple_id = couple.id.clone();
        store
            .upsert_couple(couple)
            .map_err(|err| AppError::Compliance(err.into()))?;
        if let Err(err) = service.initialize_forms_for_couple(&couple_id, today) {
            warn!(couple_id = %couple_id, error = %err, "skipping form initialization");
        }
    }

    Ok(store)
}

pub(crate) fn demo_organization() -> OrganizationId {
    OrganizationId::from("org-demo-celebrants")
}

fn demo_couple(
    today: NaiveDate,
    id: &str,
    partners: (&str, &str),
    ceremony_in_days: i64,
    prior_marriages: Vec<PriorMarriageEnd>,
) -> Couple {
    Couple {
        id: CoupleId::from(id),
        organization_id: demo_organization(),
        partner1_name: partners.0.to_string(),
        partner2_name: partners.1.to_string(),
        partner1_email: Some(format!("{}@example.com", partners.0.to_ascii_lowercase())),
        partner2_email: Some(format!("{}@example.com", partners.1.to_ascii_lowercase())),
        ceremony_date: Some(today + Duration::days(ceremony_in_days)),
        ceremony_location: Some("Kings Park".to_string()),
        prior_marriages,
    }
}

/// Synthetic couples spread across the reminder and sweep windows relative to `today`.
pub(crate) fn demo_couples(today: NaiveDate) -> Vec<Couple> {
    vec![
        demo_couple(today, "couple-ava-noah", ("Ava", "Noah"), 90, Vec::new()),
        demo_couple(today, "couple-mia-leo", ("Mia", "Leo"), 45, Vec::new()),
        demo_couple(
            today,
            "couple-zoe-eli",
            ("Zoe", "Eli"),
            33,
            vec![PriorMarriageEnd::Divorce],
        ),
        demo_couple(
            today,
            "couple-ivy-max",
            ("Ivy", "Max"),
            20,
            vec![PriorMarriageEnd::Death],
        ),
    ]
}
