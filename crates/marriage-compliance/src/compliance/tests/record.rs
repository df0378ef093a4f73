use chrono::Utc;

use super::common::*;
use crate::compliance::domain::{FormStatus, FormSubmissionId, FormType, UserId};
use crate::compliance::record::{FormTransitionError, ValidationOutcome};
use crate::compliance::DeadlineError;
use crate::compliance::FormSubmission;

fn noim() -> FormSubmission {
    let couple = couple("c-record", Some(date(2025, 8, 1)));
    FormSubmission::for_couple(&couple, FormType::Noim, date(2025, 6, 1), Utc::now())
        .expect("ceremony date present")
}

#[test]
fn new_record_starts_not_started_with_schedule() {
    let form = noim();
    assert_eq!(form.status, FormStatus::NotStarted);
    assert_eq!(form.legal_deadline, date(2025, 7, 1));
    assert_eq!(form.reminder_schedule.checkpoints().len(), 4);
    assert!(form.is_open());
}

#[test]
fn record_requires_ceremony_date() {
    let couple = couple("c-undated", None);
    match FormSubmission::for_couple(&couple, FormType::Noim, date(2025, 6, 1), Utc::now()) {
        Err(DeadlineError::MissingCeremonyDate) => {}
        other => panic!("expected missing ceremony date, got {other:?}"),
    }
}

#[test]
fn submission_with_file_completes_and_stamps_submitter() {
    let mut form = noim();
    form.submit("  docs/noim.pdf ", &UserId::from("amelia"), Utc::now())
        .expect("submission accepted");

    assert_eq!(form.status, FormStatus::Completed);
    assert_eq!(form.file_ref.as_deref(), Some("docs/noim.pdf"));
    assert!(form.submitted_at.is_some());
    assert_eq!(form.submitted_by, Some(UserId::from("amelia")));
    assert!(!form.is_open());
}

#[test]
fn empty_file_reference_is_rejected() {
    let mut form = noim();
    let err = form
        .submit("   ", &UserId::from("amelia"), Utc::now())
        .expect_err("blank file rejected");
    assert!(matches!(err, FormTransitionError::EmptyFileReference(_)));
    assert_eq!(form.status, FormStatus::NotStarted);
    assert!(form.submitted_at.is_none());
}

#[test]
fn overdue_record_can_still_be_submitted() {
    let mut form = noim();
    assert!(form.mark_overdue_if_due(date(2025, 7, 6), Utc::now()));
    assert_eq!(form.status, FormStatus::Overdue);

    form.submit("docs/noim.pdf", &UserId::from("jordan"), Utc::now())
        .expect("late submission accepted");
    assert_eq!(form.status, FormStatus::Completed);
    assert!(!form.mark_overdue_if_due(date(2025, 7, 10), Utc::now()));
}

#[test]
fn overdue_only_after_deadline_passes() {
    let mut form = noim();
    assert!(!form.mark_overdue_if_due(date(2025, 7, 1), Utc::now()));
    assert!(form.mark_overdue_if_due(date(2025, 7, 2), Utc::now()));
    assert!(!form.mark_overdue_if_due(date(2025, 7, 3), Utc::now()));
}

#[test]
fn rejected_validation_reverts_to_in_progress() {
    let mut form = noim();
    form.submit("docs/noim.pdf", &UserId::from("amelia"), Utc::now())
        .expect("submitted");

    let outcome = form
        .validate(
            &UserId::from("celebrant"),
            false,
            Some("Witness signature missing".to_string()),
            Utc::now(),
        )
        .expect("validation recorded");

    assert_eq!(outcome, ValidationOutcome::Rejected);
    assert_eq!(form.status, FormStatus::InProgress);
    assert!(!form.is_validated);
    assert_eq!(
        form.validation_notes.as_deref(),
        Some("Witness signature missing")
    );
}

#[test]
fn approval_marks_validated_and_blocks_resubmission() {
    let mut form = noim();
    form.submit("docs/noim.pdf", &UserId::from("amelia"), Utc::now())
        .expect("submitted");
    form.validate(&UserId::from("celebrant"), true, None, Utc::now())
        .expect("approved");

    assert!(form.is_validated);
    assert_eq!(form.validated_by, Some(UserId::from("celebrant")));
    assert!(matches!(
        form.submit("docs/other.pdf", &UserId::from("amelia"), Utc::now()),
        Err(FormTransitionError::AlreadyValidated(_))
    ));
}

#[test]
fn validation_requires_completed_record() {
    let mut form = noim();
    match form.validate(&UserId::from("celebrant"), true, None, Utc::now()) {
        Err(FormTransitionError::NotCompleted { status, .. }) => {
            assert_eq!(status, FormStatus::NotStarted)
        }
        other => panic!("expected not completed error, got {other:?}"),
    }
}

#[test]
fn start_moves_not_started_to_in_progress_once() {
    let mut form = noim();
    assert_eq!(form.start(Utc::now()), Ok(true));
    assert_eq!(form.status, FormStatus::InProgress);
    assert_eq!(form.start(Utc::now()), Ok(false));

    form.mark_overdue_if_due(date(2025, 7, 2), Utc::now());
    assert!(matches!(
        form.start(Utc::now()),
        Err(FormTransitionError::CannotStart { .. })
    ));
}

#[test]
fn superseded_record_refuses_changes() {
    let mut form = noim();
    form.supersede(&FormSubmissionId::from("form-replacement"), Utc::now());
    assert!(!form.is_open());
    assert!(matches!(
        form.submit("docs/noim.pdf", &UserId::from("amelia"), Utc::now()),
        Err(FormTransitionError::Superseded(_))
    ));
    assert!(!form.mark_overdue_if_due(date(2025, 9, 1), Utc::now()));
}

#[test]
fn refreshing_schedule_keeps_sent_flags_and_deadline() {
    let mut form = noim();
    form.reminder_schedule.mark_sent(14);
    form.refresh_schedule(date(2025, 6, 1), Utc::now());

    assert_eq!(form.legal_deadline, date(2025, 7, 1));
    assert!(form.reminder_schedule.get(14).is_some_and(|c| c.sent));
}
