use chrono::{Duration, NaiveDate};

use super::domain::{FormType, ReminderCheckpoint, ReminderSchedule};

/// Days before the deadline at which a reminder is scheduled.
pub const REMINDER_CHECKPOINTS: [u32; 5] = [30, 14, 7, 3, 1];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DeadlineError {
    #[error("ceremony date is required to calculate a legal deadline")]
    MissingCeremonyDate,
}

/// Lodgement rule for a form, expressed relative to the ceremony date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineRule {
    DaysBeforeCeremony(u32),
}

impl DeadlineRule {
    pub const fn for_form(form_type: FormType) -> Self {
        match form_type {
            FormType::Noim => Self::DaysBeforeCeremony(31),
            FormType::Declaration => Self::DaysBeforeCeremony(7),
            _ => Self::DaysBeforeCeremony(14),
        }
    }

    pub(crate) fn resolve(&self, ceremony_date: NaiveDate) -> NaiveDate {
        match self {
            Self::DaysBeforeCeremony(days) => ceremony_date - Duration::days(*days as i64),
        }
    }
}

/// Legal lodgement deadline for `form_type` given the ceremony date.
pub fn calculate_deadline(
    ceremony_date: Option<NaiveDate>,
    form_type: FormType,
) -> Result<NaiveDate, DeadlineError> {
    let ceremony_date = ceremony_date.ok_or(DeadlineError::MissingCeremonyDate)?;
    Ok(DeadlineRule::for_form(form_type).resolve(ceremony_date))
}

/// Reminder checkpoints for `deadline` that fall strictly after `today`, sorted by date.
pub fn generate_schedule(deadline: NaiveDate, today: NaiveDate) -> ReminderSchedule {
    let checkpoints = REMINDER_CHECKPOINTS
        .iter()
        .map(|days| ReminderCheckpoint {
            date: deadline - Duration::days(*days as i64),
            days_before_deadline: *days,
            sent: false,
            skipped: false,
        })
        .filter(|checkpoint| checkpoint.date > today)
        .collect();

    ReminderSchedule::new(checkpoints)
}
