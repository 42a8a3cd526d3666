use chrono::{Duration, NaiveDateTime};

use crate::models::{
    ConfirmationRecord, NextAction, ReminderEntry, ReminderKind, ReminderReply, ReminderSet,
    ReminderStatus,
};
use crate::services::booking;
use crate::services::messaging::NotificationSender;
use crate::services::slots::describe_slot;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub email_sent: bool,
    pub sms_sent: bool,
}

impl DeliveryOutcome {
    pub fn delivered(&self) -> bool {
        self.email_sent || self.sms_sent
    }
}

/// Three reminders at 24h, 2h and 1h before the appointment.
pub fn schedule(appointment_id: &str, appointment_at: NaiveDateTime) -> ReminderSet {
    let entries = ReminderKind::ORDER.map(|kind| {
        let number = match kind {
            ReminderKind::Regular => 1,
            ReminderKind::FormCheck => 2,
            ReminderKind::Confirmation => 3,
        };
        ReminderEntry {
            number,
            kind,
            scheduled_time: appointment_at - Duration::hours(kind.hours_before()),
            sent: false,
            response_received: false,
            action_required: kind.action_required().to_string(),
            sent_at: None,
            patient_response: None,
        }
    });
    ReminderSet::new(appointment_id.to_string(), entries)
}

/// Subject and body for one reminder. The body lists the reply keywords
/// that [`process_response`] understands for this reminder type.
pub fn compose(entry: &ReminderEntry, record: &ConfirmationRecord) -> (String, String) {
    let when = describe_slot(&record.slot, record.duration_minutes);
    let first = record.patient.first_name();

    match entry.kind {
        ReminderKind::Regular => (
            format!("Appointment Reminder - {}", record.slot.date),
            format!(
                "Hi {first}, this is a reminder of your appointment with {} at our {} clinic on {when}.\n\n\
                 Reply CONFIRM to confirm, CANCEL to cancel, or FORMS to receive the intake forms again.\n\
                 Appointment ID: {}",
                record.slot.doctor, record.slot.location, record.appointment_id
            ),
        ),
        ReminderKind::FormCheck => (
            "Have you completed your intake forms?".to_string(),
            format!(
                "Hi {first}, your appointment with {} is in about 2 hours ({when}).\n\n\
                 Have you completed your patient intake forms? Reply COMPLETED if they're done, \
                 FORMS to receive them again, or CANCEL to cancel.",
                record.slot.doctor
            ),
        ),
        ReminderKind::Confirmation => (
            "Your appointment starts in 1 hour".to_string(),
            format!(
                "Hi {first}, your appointment with {} at {} starts in 1 hour ({when}).\n\n\
                 Reply CONFIRMED if you're still coming, CANCEL to cancel, or CALL to speak with our staff. \
                 Please arrive 15 minutes early.",
                record.slot.doctor, record.slot.location
            ),
        ),
    }
}

/// Sends one reminder by email and SMS. The caller flips `sent` when
/// [`DeliveryOutcome::delivered`] is true.
pub async fn send(
    notifier: &dyn NotificationSender,
    entry: &ReminderEntry,
    record: &ConfirmationRecord,
) -> DeliveryOutcome {
    let (subject, body) = compose(entry, record);
    let mut outcome = DeliveryOutcome::default();

    match notifier
        .send_email(&record.patient.email, &subject, &body, None)
        .await
    {
        Ok(()) => outcome.email_sent = true,
        Err(e) => tracing::warn!(
            appointment_id = %record.appointment_id,
            reminder = entry.number,
            error = %e,
            "reminder email failed"
        ),
    }

    match notifier.send_sms(&record.patient.phone, &body).await {
        Ok(()) => outcome.sms_sent = true,
        Err(e) => tracing::warn!(
            appointment_id = %record.appointment_id,
            reminder = entry.number,
            error = %e,
            "reminder sms failed"
        ),
    }

    outcome
}

/// Lexical keyword match on the lower-cased reply. Only a matched reply is
/// recorded on the entry; an unclear one leaves it waiting.
pub fn process_response(text: &str, entry: &mut ReminderEntry) -> ReminderReply {
    let lower = text.trim().to_lowercase();
    let matched = keywords(entry.kind)
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, outcome)| *outcome);

    let Some((status, next_action, message)) = matched else {
        return ReminderReply {
            message: format!(
                "I didn't understand your response. Please reply with one of: {}.",
                keywords(entry.kind)
                    .iter()
                    .map(|(k, _)| k.to_uppercase())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            status: ReminderStatus::Unclear,
            next_action: NextAction::ResendReminder,
        };
    };

    entry.mark_responded(text.trim());
    ReminderReply {
        message: message.to_string(),
        status,
        next_action,
    }
}

/// Sends every reminder whose time has passed. Returns how many went out.
pub async fn dispatch_due(state: &AppState, now: NaiveDateTime) -> usize {
    let due: Vec<(ReminderEntry, ConfirmationRecord)> = {
        let ledger = state.ledger();
        ledger
            .due_reminders(now)
            .into_iter()
            .filter_map(|(id, number)| {
                let entry = ledger.reminders(&id)?.get(number)?.clone();
                let record = ledger.record(&id)?.clone();
                Some((entry, record))
            })
            .collect()
    };

    let mut sent = 0;
    for (entry, record) in due {
        let outcome = send(state.notifier.as_ref(), &entry, &record).await;
        if !outcome.delivered() {
            continue;
        }

        let mut ledger = state.ledger();
        if let Some(stored) = ledger
            .reminders_mut(&record.appointment_id)
            .and_then(|set| set.get_mut(entry.number))
        {
            stored.mark_sent(now);
        }
        if let Some(stored) = ledger.record_mut(&record.appointment_id) {
            stored.reminders_sent = stored.reminders_sent.saturating_add(1).min(3);
        }
        sent += 1;
        tracing::info!(
            appointment_id = %record.appointment_id,
            reminder = entry.number,
            kind = entry.kind.as_str(),
            "reminder sent"
        );
    }
    sent
}

/// Applies a patient's reply to the latest sent reminder still waiting for
/// one, carrying out the follow-up that can happen right away.
pub async fn handle_reply(state: &AppState, appointment_id: &str, text: &str) -> String {
    let outcome = {
        let mut ledger = state.ledger();
        let reply = ledger.reminders_mut(appointment_id).and_then(|set| {
            let number = set.awaiting_response()?;
            set.get_mut(number).map(|entry| process_response(text, entry))
        });
        reply.map(|r| (r, ledger.record(appointment_id).cloned()))
    };

    let Some((reply, record)) = outcome else {
        return format!(
            "Your appointment {appointment_id} is confirmed. You'll receive reminders before your visit. \
             Reply 'restart' to book another appointment."
        );
    };

    tracing::info!(
        appointment_id = %appointment_id,
        status = ?reply.status,
        next_action = ?reply.next_action,
        "reminder reply processed"
    );

    match (reply.next_action, record) {
        (NextAction::SendIntakeForms, Some(record)) => {
            let sent = booking::send_intake_form(state, &record).await;
            if sent {
                if let Some(stored) = state.ledger().record_mut(appointment_id) {
                    stored.form_sent = true;
                }
                reply.message
            } else {
                "Sorry, I couldn't send the intake forms right now. Our staff will follow up with you."
                    .to_string()
            }
        }
        _ => reply.message,
    }
}

type KeywordOutcome = (ReminderStatus, NextAction, &'static str);

const CANCELLED: KeywordOutcome = (
    ReminderStatus::Cancelled,
    NextAction::UpdateCalendar,
    "Your cancellation request has been received. Our staff will contact you if you'd like to reschedule.",
);

fn keywords(kind: ReminderKind) -> &'static [(&'static str, KeywordOutcome)] {
    match kind {
        ReminderKind::Regular => &[
            (
                "confirm",
                (
                    ReminderStatus::Confirmed,
                    NextAction::ScheduleFormReminder,
                    "Thank you for confirming your appointment! Please remember to complete your intake forms before your visit.",
                ),
            ),
            ("cancel", CANCELLED),
            (
                "forms",
                (
                    ReminderStatus::FormsSent,
                    NextAction::SendIntakeForms,
                    "I'll send the intake forms to your email right away.",
                ),
            ),
        ],
        ReminderKind::FormCheck => &[
            (
                "completed",
                (
                    ReminderStatus::FormsCompleted,
                    NextAction::ScheduleFinalReminder,
                    "Great, thank you for completing your intake forms! We'll see you soon.",
                ),
            ),
            (
                "forms",
                (
                    ReminderStatus::FormsResent,
                    NextAction::SendIntakeForms,
                    "No problem, I'm sending the intake forms to your email again.",
                ),
            ),
            ("cancel", CANCELLED),
        ],
        ReminderKind::Confirmation => &[
            (
                "confirmed",
                (
                    ReminderStatus::Confirmed,
                    NextAction::PrepareForAppointment,
                    "Perfect! We look forward to seeing you. Please arrive 15 minutes early.",
                ),
            ),
            ("cancel", CANCELLED),
            (
                "call",
                (
                    ReminderStatus::CallRequested,
                    NextAction::InitiateCall,
                    "A member of our staff will call you shortly.",
                ),
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 1, 7)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_schedule_offsets() {
        let set = schedule("APT_1", at(10, 0));
        let entries = set.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].kind, ReminderKind::Regular);
        assert_eq!(entries[0].scheduled_time, at(10, 0) - Duration::hours(24));
        assert_eq!(entries[1].kind, ReminderKind::FormCheck);
        assert_eq!(entries[1].scheduled_time, at(8, 0));
        assert_eq!(entries[2].kind, ReminderKind::Confirmation);
        assert_eq!(entries[2].scheduled_time, at(9, 0));
        assert!(entries.iter().all(|e| !e.sent && !e.response_received));
        assert_eq!(
            entries.iter().map(|e| e.number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_confirm_on_regular_schedules_form_reminder() {
        let mut set = schedule("APT_1", at(10, 0));
        let entry = set.get_mut(1).unwrap();
        let reply = process_response("CONFIRM", entry);
        assert_eq!(reply.status, ReminderStatus::Confirmed);
        assert_eq!(reply.next_action, NextAction::ScheduleFormReminder);
        assert!(entry.response_received);
        assert_eq!(entry.patient_response.as_deref(), Some("CONFIRM"));
    }

    #[test]
    fn test_keywords_per_reminder_type() {
        let mut set = schedule("APT_1", at(10, 0));

        let reply = process_response("forms please", set.get_mut(1).unwrap());
        assert_eq!(reply.next_action, NextAction::SendIntakeForms);

        let reply = process_response("Completed!", set.get_mut(2).unwrap());
        assert_eq!(reply.next_action, NextAction::ScheduleFinalReminder);

        let reply = process_response("please call me", set.get_mut(3).unwrap());
        assert_eq!(reply.status, ReminderStatus::CallRequested);
        assert_eq!(reply.next_action, NextAction::InitiateCall);
    }

    #[test]
    fn test_cancel_on_final_reminder() {
        let mut set = schedule("APT_1", at(10, 0));
        let reply = process_response("cancel", set.get_mut(3).unwrap());
        assert_eq!(reply.status, ReminderStatus::Cancelled);
        assert_eq!(reply.next_action, NextAction::UpdateCalendar);
    }

    #[test]
    fn test_unclear_reply_leaves_entry_open() {
        let mut set = schedule("APT_1", at(10, 0));
        let entry = set.get_mut(2).unwrap();
        let reply = process_response("maybe?", entry);
        assert_eq!(reply.status, ReminderStatus::Unclear);
        assert_eq!(reply.next_action, NextAction::ResendReminder);
        assert!(reply.message.contains("COMPLETED"));
        assert!(!entry.response_received);
    }

    #[test]
    fn test_first_response_is_kept() {
        let mut set = schedule("APT_1", at(10, 0));
        let entry = set.get_mut(1).unwrap();
        process_response("confirm", entry);
        process_response("cancel", entry);
        assert_eq!(entry.patient_response.as_deref(), Some("confirm"));
    }
}
