use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

identifier!(
    /// Celebrant practice or registry office that owns a set of couples.
    OrganizationId
);
identifier!(CoupleId);
identifier!(
    /// Identifier wrapper for a single tracked form record.
    FormSubmissionId
);
identifier!(AlertId);
identifier!(ReminderLogId);
identifier!(
    /// Staff member or automated actor recorded against audit fields.
    UserId
);

impl UserId {
    pub fn system() -> Self {
        Self("system".to_string())
    }
}

static FORM_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static ALERT_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static REMINDER_LOG_SEQUENCE: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_form_id() -> FormSubmissionId {
    let id = FORM_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    FormSubmissionId(format!("form-{id:06}"))
}

pub(crate) fn next_alert_id() -> AlertId {
    let id = ALERT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    AlertId(format!("alert-{id:06}"))
}

pub(crate) fn next_reminder_log_id() -> ReminderLogId {
    let id = REMINDER_LOG_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ReminderLogId(format!("reminder-{id:06}"))
}

/// Legal forms tracked against a ceremony date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormType {
    Noim,
    Declaration,
    DivorceCertificate,
    DeathCertificate,
    BirthCertificate,
}

impl FormType {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::Noim,
            Self::Declaration,
            Self::DivorceCertificate,
            Self::DeathCertificate,
            Self::BirthCertificate,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Noim => "Notice of Intended Marriage",
            Self::Declaration => "Declaration of No Legal Impediment",
            Self::DivorceCertificate => "Divorce Certificate",
            Self::DeathCertificate => "Death Certificate of Former Spouse",
            Self::BirthCertificate => "Birth Certificate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormStatus {
    NotStarted,
    InProgress,
    Completed,
    Overdue,
}

impl FormStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::NotStarted => "Not Started",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::Overdue => "Overdue",
        }
    }
}

/// A single reminder point, keyed within its record by `days_before_deadline`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderCheckpoint {
    pub date: NaiveDate,
    pub days_before_deadline: u32,
    pub sent: bool,
    /// Elapsed unsent and passed over once a later checkpoint was delivered.
    #[serde(default)]
    pub skipped: bool,
}

impl ReminderCheckpoint {
    pub fn is_pending(&self) -> bool {
        !self.sent && !self.skipped
    }
}

/// Ordered reminder checkpoints embedded in a form record.
///
/// Serialized as a plain array of checkpoints sorted ascending by date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReminderSchedule(Vec<ReminderCheckpoint>);

impl ReminderSchedule {
    pub fn new(mut checkpoints: Vec<ReminderCheckpoint>) -> Self {
        checkpoints.sort_by(|a, b| a.date.cmp(&b.date));
        checkpoints.dedup_by_key(|checkpoint| checkpoint.days_before_deadline);
        Self(checkpoints)
    }

    pub fn checkpoints(&self) -> &[ReminderCheckpoint] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, days_before_deadline: u32) -> Option<&ReminderCheckpoint> {
        self.0
            .iter()
            .find(|checkpoint| checkpoint.days_before_deadline == days_before_deadline)
    }

    /// Merge a regenerated schedule into this one by `days_before_deadline`.
    ///
    /// Checkpoints already sent or skipped keep their flags and date. Existing checkpoints
    /// absent from the regenerated set are kept so a pending retry is never dropped.
    pub fn merge(&mut self, regenerated: ReminderSchedule) {
        let mut merged: Vec<ReminderCheckpoint> = regenerated
            .0
            .into_iter()
            .map(|fresh| match self.get(fresh.days_before_deadline) {
                Some(existing) if !existing.is_pending() => existing.clone(),
                _ => fresh,
            })
            .collect();

        for existing in &self.0 {
            if !merged
                .iter()
                .any(|checkpoint| checkpoint.days_before_deadline == existing.days_before_deadline)
            {
                merged.push(existing.clone());
            }
        }

        *self = Self::new(merged);
    }

    /// The latest pending checkpoint whose date has arrived, never past the deadline itself.
    ///
    /// A checkpoint whose delivery failed stays due until a later one arrives, so at most
    /// one reminder per record is in flight on any day.
    pub fn due_on(&self, today: NaiveDate, deadline: NaiveDate) -> Option<u32> {
        if today > deadline {
            return None;
        }
        self.0
            .iter()
            .filter(|checkpoint| checkpoint.is_pending() && checkpoint.date <= today)
            .max_by_key(|checkpoint| checkpoint.date)
            .map(|checkpoint| checkpoint.days_before_deadline)
    }

    /// Mark a delivered checkpoint sent and skip any earlier checkpoint still pending.
    pub fn record_delivery(&mut self, days_before_deadline: u32) -> bool {
        let Some(delivered_on) = self.get(days_before_deadline).map(|checkpoint| checkpoint.date)
        else {
            return false;
        };
        for checkpoint in &mut self.0 {
            if checkpoint.days_before_deadline == days_before_deadline {
                checkpoint.sent = true;
            } else if checkpoint.is_pending() && checkpoint.date < delivered_on {
                checkpoint.skipped = true;
            }
        }
        true
    }

    pub fn mark_sent(&mut self, days_before_deadline: u32) -> bool {
        match self
            .0
            .iter_mut()
            .find(|checkpoint| checkpoint.days_before_deadline == days_before_deadline)
        {
            Some(checkpoint) => {
                checkpoint.sent = true;
                true
            }
            None => false,
        }
    }

    pub fn next_unsent(&self, today: NaiveDate) -> Option<&ReminderCheckpoint> {
        self.0
            .iter()
            .find(|checkpoint| checkpoint.is_pending() && checkpoint.date >= today)
    }
}

/// Persisted compliance record for one form of one couple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSubmission {
    pub id: FormSubmissionId,
    pub organization_id: OrganizationId,
    pub couple_id: CoupleId,
    pub form_type: FormType,
    pub status: FormStatus,
    /// Ceremony date the deadline was computed from.
    pub ceremony_date: NaiveDate,
    pub legal_deadline: NaiveDate,
    pub reminder_schedule: ReminderSchedule,
    pub submitted_at: Option<DateTime<Utc>>,
    pub submitted_by: Option<UserId>,
    pub file_ref: Option<String>,
    pub is_validated: bool,
    pub validated_by: Option<UserId>,
    pub validated_at: Option<DateTime<Utc>>,
    pub validation_notes: Option<String>,
    pub superseded_at: Option<DateTime<Utc>>,
    pub superseded_by: Option<FormSubmissionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    DeadlineApproaching,
    FormOverdue,
    ValidationRequired,
    ResubmissionRequired,
}

impl AlertType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::DeadlineApproaching => "Deadline Approaching",
            Self::FormOverdue => "Form Overdue",
            Self::ValidationRequired => "Validation Required",
            Self::ResubmissionRequired => "Resubmission Required",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceAlert {
    pub id: AlertId,
    pub organization_id: OrganizationId,
    pub couple_id: CoupleId,
    pub form_submission_id: Option<FormSubmissionId>,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub is_resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

/// Append-only audit row for every reminder delivery attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderLog {
    pub id: ReminderLogId,
    pub organization_id: OrganizationId,
    pub couple_id: CoupleId,
    pub form_submission_id: FormSubmissionId,
    pub recipient: String,
    pub subject: String,
    pub content: String,
    pub days_before_deadline: u32,
    pub delivery_status: DeliveryStatus,
    pub failure_reason: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// How a partner's previous marriage ended, which drives supporting evidence requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorMarriageEnd {
    Divorce,
    Death,
}

/// Couple snapshot read from the external directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Couple {
    pub id: CoupleId,
    pub organization_id: OrganizationId,
    pub partner1_name: String,
    pub partner2_name: String,
    pub partner1_email: Option<String>,
    pub partner2_email: Option<String>,
    pub ceremony_date: Option<NaiveDate>,
    pub ceremony_location: Option<String>,
    #[serde(default)]
    pub prior_marriages: Vec<PriorMarriageEnd>,
}

impl Couple {
    /// First usable partner email, in partner order.
    pub fn primary_email(&self) -> Option<&str> {
        [&self.partner1_email, &self.partner2_email]
            .into_iter()
            .filter_map(|email| email.as_deref())
            .map(str::trim)
            .find(|email| !email.is_empty())
    }

    pub fn display_names(&self) -> String {
        format!("{} & {}", self.partner1_name, self.partner2_name)
    }

    /// Forms the couple must lodge before the ceremony.
    pub fn required_forms(&self) -> Vec<FormType> {
        let mut forms = vec![FormType::Noim, FormType::Declaration];
        if self.prior_marriages.contains(&PriorMarriageEnd::Divorce) {
            forms.push(FormType::DivorceCertificate);
        }
        if self.prior_marriages.contains(&PriorMarriageEnd::Death) {
            forms.push(FormType::DeathCertificate);
        }
        forms
    }
}
