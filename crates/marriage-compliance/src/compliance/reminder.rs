use chrono::NaiveDate;

use super::domain::FormType;

/// Inputs needed to render one reminder.
#[derive(Debug, Clone)]
pub struct ReminderContext<'a> {
    pub form_type: FormType,
    /// Days left until the deadline on the day the reminder goes out.
    pub days_before_deadline: u32,
    pub partner1_name: &'a str,
    pub partner2_name: &'a str,
    pub ceremony_date: Option<NaiveDate>,
    pub ceremony_location: Option<&'a str>,
    pub deadline: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderMessage {
    pub subject: String,
    pub body: String,
}

pub fn urgency_label(days_before_deadline: u32) -> &'static str {
    match days_before_deadline {
        d if d >= 30 => "Friendly Reminder",
        d if d >= 14 => "Reminder",
        d if d >= 7 => "Important",
        d if d >= 3 => "URGENT",
        _ => "URGENT — FINAL NOTICE",
    }
}

pub fn render_reminder(context: &ReminderContext<'_>) -> ReminderMessage {
    let label = urgency_label(context.days_before_deadline);
    let form = context.form_type.label();
    let due = match context.days_before_deadline {
        0 => "due today".to_string(),
        1 => "due in 1 day".to_string(),
        n => format!("due in {n} days"),
    };

    let subject = format!("{label}: {form} {due}");

    let mut body = format!(
        "Dear {} and {},\n\n\
         {}: your {} must be lodged by {}.\n",
        context.partner1_name,
        context.partner2_name,
        label,
        form,
        context.deadline.format("%A %-d %B %Y"),
    );

    if let Some(ceremony_date) = context.ceremony_date {
        let venue = context
            .ceremony_location
            .map(|location| format!(" at {location}"))
            .unwrap_or_default();
        body.push_str(&format!(
            "\nYour ceremony is booked for {}{}. The marriage cannot proceed unless this form is \
             lodged on time.\n",
            ceremony_date.format("%A %-d %B %Y"),
            venue,
        ));
    }

    body.push_str("\nPlease upload the completed form or contact your celebrant if you need help.\n");

    ReminderMessage { subject, body }
}
