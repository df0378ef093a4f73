//! Deadline tracking, reminder dispatch and compliance alerting for marriage forms.
//!
//! Form records are created from a couple's ceremony date, swept periodically to keep status
//! and alerts current, and reminded on a fixed checkpoint schedule. Storage and outbound
//! notification are injected through the traits in [`repository`] and [`notify`].

pub mod alerts;
pub mod deadline;
pub mod dispatch;
pub mod domain;
pub mod memory;
pub mod notify;
mod record;
pub mod reminder;
pub mod report;
pub mod repository;
pub mod router;
pub mod service;
pub mod sweep;

#[cfg(test)]
mod tests;

pub use alerts::AlertManager;
pub use deadline::{calculate_deadline, generate_schedule, DeadlineError, REMINDER_CHECKPOINTS};
pub use dispatch::{DispatchError, DispatchSummary, ReminderDispatcher};
pub use domain::{
    AlertId, AlertSeverity, AlertType, ComplianceAlert, Couple, CoupleId, DeliveryStatus,
    FormStatus, FormSubmission, FormSubmissionId, FormType, OrganizationId, PriorMarriageEnd,
    ReminderCheckpoint, ReminderLog, ReminderSchedule, UserId,
};
pub use memory::InMemoryComplianceStore;
pub use notify::{DeliveryReceipt, NotificationTransport, TransportError};
pub use record::{FormTransitionError, ValidationOutcome};
pub use report::{ComplianceDashboard, FormStatusView, ReportError};
pub use repository::{
    AlertFilter, AlertRepository, ComplianceStore, CoupleDirectory, FormFilter,
    FormSubmissionRepository, ReminderLogRepository, RepositoryError,
};
pub use router::compliance_router;
pub use service::{ComplianceService, ComplianceServiceError};
pub use sweep::{ComplianceSweep, SweepError, SweepSummary};
