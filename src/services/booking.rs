use std::collections::HashMap;
use std::path::Path;

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::errors::BookingError;
use crate::models::{
    AdminReport, AppointmentStatus, ConfirmationRecord, InsuranceInfo, LookupResult,
    PatientIdentity, PatientType, ReminderSet, ScheduleSlot,
};
use crate::services::reminders;
use crate::services::slots::describe_slot;
use crate::state::AppState;

/// Proof that the schedule rows for an appointment were marked unavailable.
/// [`confirm`] only accepts a booking that holds one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub slot: ScheduleSlot,
    pub rows: Vec<ScheduleSlot>,
    pub patient_type: PatientType,
    pub duration_minutes: u32,
}

/// Confirmations made by this process plus their reminder sets. The
/// appointment sequence restarts at 1 with every process.
#[derive(Default)]
pub struct BookingLedger {
    seq: u32,
    confirmations: Vec<ConfirmationRecord>,
    reminders: HashMap<String, ReminderSet>,
}

impl BookingLedger {
    pub fn next_appointment_id(&mut self, now: NaiveDateTime) -> String {
        self.seq += 1;
        format!("APT_{}_{:03}", now.format("%Y%m%d_%H%M%S"), self.seq)
    }

    pub fn confirmations(&self) -> &[ConfirmationRecord] {
        &self.confirmations
    }

    pub fn record(&self, appointment_id: &str) -> Option<&ConfirmationRecord> {
        self.confirmations
            .iter()
            .find(|r| r.appointment_id == appointment_id)
    }

    pub fn record_mut(&mut self, appointment_id: &str) -> Option<&mut ConfirmationRecord> {
        self.confirmations
            .iter_mut()
            .find(|r| r.appointment_id == appointment_id)
    }

    pub fn reminders(&self, appointment_id: &str) -> Option<&ReminderSet> {
        self.reminders.get(appointment_id)
    }

    pub fn reminders_mut(&mut self, appointment_id: &str) -> Option<&mut ReminderSet> {
        self.reminders.get_mut(appointment_id)
    }

    pub fn push(&mut self, record: ConfirmationRecord) {
        self.confirmations.push(record);
    }

    pub fn set_reminders(&mut self, set: ReminderSet) {
        self.reminders.insert(set.appointment_id.clone(), set);
    }

    /// Latest appointment booked for `phone` that has a sent reminder still
    /// waiting for a reply. Numbers compare on their last ten digits, so
    /// `+15552223333` matches `(555) 222-3333`.
    pub fn awaiting_reply_for_phone(&self, phone: &str) -> Option<String> {
        let wanted = phone_key(phone)?;
        self.confirmations
            .iter()
            .rev()
            .filter(|r| phone_key(&r.patient.phone).as_deref() == Some(wanted.as_str()))
            .find(|r| {
                self.reminders
                    .get(&r.appointment_id)
                    .is_some_and(|set| set.awaiting_response().is_some())
            })
            .map(|r| r.appointment_id.clone())
    }

    /// `(appointment_id, reminder number)` for every unsent reminder whose
    /// time has come.
    pub fn due_reminders(&self, now: NaiveDateTime) -> Vec<(String, u8)> {
        let mut due: Vec<(String, u8)> = self
            .reminders
            .values()
            .flat_map(|set| {
                set.due(now)
                    .into_iter()
                    .map(|n| (set.appointment_id.clone(), n))
            })
            .collect();
        due.sort();
        due
    }
}

fn phone_key(phone: &str) -> Option<String> {
    let digits: Vec<char> = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < 10 {
        return None;
    }
    Some(digits[digits.len() - 10..].iter().collect())
}

/// Marks the chosen slot (two rows for a new patient) unavailable.
pub fn reserve(
    state: &AppState,
    slot: &ScheduleSlot,
    lookup: &LookupResult,
) -> Result<Reservation, BookingError> {
    let rows = state.schedule().book(slot, lookup.patient_type)?;
    Ok(Reservation {
        slot: slot.clone(),
        rows,
        patient_type: lookup.patient_type,
        duration_minutes: lookup.appointment_duration(),
    })
}

/// Gives reserved rows back to the schedule when a conversation is abandoned
/// before confirmation.
pub fn release(state: &AppState, reservation: &Reservation) {
    if let Err(e) = state.schedule().release(&reservation.rows) {
        tracing::warn!(
            date = %reservation.slot.date,
            time = %reservation.slot.time,
            error = %e,
            "failed to release reservation"
        );
    }
}

pub struct ConfirmationOutcome {
    pub message: String,
    pub record: ConfirmationRecord,
}

/// Writes the confirmation and runs its side effects in order. Every side
/// effect may fail on its own; the failure is logged and its flag stays
/// `false`.
pub async fn confirm(
    state: &AppState,
    reservation: &Reservation,
    lookup: &LookupResult,
    patient: &PatientIdentity,
    insurance: &InsuranceInfo,
    now: NaiveDateTime,
) -> anyhow::Result<ConfirmationOutcome> {
    let now = now.with_nanosecond(0).unwrap_or(now);
    let appointment_id = state.ledger().next_appointment_id(now);

    let slot = reservation
        .rows
        .first()
        .cloned()
        .unwrap_or_else(|| reservation.slot.clone());

    let mut record = ConfirmationRecord {
        appointment_id: appointment_id.clone(),
        patient_id: lookup.patient_id.clone(),
        patient_type: lookup.patient_type,
        patient: patient.clone(),
        insurance: insurance.clone(),
        slot,
        duration_minutes: reservation.duration_minutes,
        status: AppointmentStatus::Confirmed,
        confirmed_at: now,
        email_sent: false,
        sms_sent: false,
        exported: false,
        form_sent: false,
        reminders_scheduled: false,
        reminders_sent: 0,
    };

    tracing::info!(
        appointment_id = %appointment_id,
        patient_id = %record.patient_id,
        doctor = %record.slot.doctor,
        "confirming appointment"
    );

    let (subject, body) = confirmation_email(&record);
    record.email_sent = log_failure(
        state
            .notifier
            .send_email(&patient.email, &subject, &body, None)
            .await,
        &appointment_id,
        "confirmation email",
    );

    record.sms_sent = log_failure(
        state
            .notifier
            .send_sms(&patient.phone, &confirmation_sms(&record))
            .await,
        &appointment_id,
        "confirmation sms",
    );

    record.exported = log_failure(
        state.store.append_appointment(&record.export_row()),
        &appointment_id,
        "appointment export",
    );

    let report = {
        let mut ledger = state.ledger();
        ledger.push(record.clone());
        AdminReport::from_records(ledger.confirmations(), now)
    };
    log_failure(
        state.store.save_admin_report(&report),
        &appointment_id,
        "admin report",
    );

    record.form_sent = send_intake_form(state, &record).await;

    if lookup.patient_type == PatientType::New {
        let marked = state.directory().mark_returning(&lookup.patient_id, now.date());
        if let Err(e) = marked {
            tracing::warn!(appointment_id = %appointment_id, error = %e, "failed to mark patient returning");
        }
    }

    let reminder_set = record
        .appointment_at()
        .map(|at| reminders::schedule(&appointment_id, at));
    record.reminders_scheduled = reminder_set.is_some();

    {
        let mut ledger = state.ledger();
        if let Some(set) = reminder_set {
            ledger.set_reminders(set);
        }
        if let Some(stored) = ledger.record_mut(&appointment_id) {
            stored.form_sent = record.form_sent;
            stored.reminders_scheduled = record.reminders_scheduled;
        }
    }

    Ok(ConfirmationOutcome {
        message: confirmation_message(&record),
        record,
    })
}

/// Emails the intake form, attaching the PDF when the configured file exists.
pub async fn send_intake_form(state: &AppState, record: &ConfirmationRecord) -> bool {
    let path = Path::new(&state.config.intake_form_path);
    let attachment = path.exists().then_some(path);
    if attachment.is_none() {
        tracing::warn!(path = %path.display(), "intake form file not found, sending without attachment");
    }

    let subject = "Patient Intake Form - Please complete before your visit";
    let body = format!(
        "Dear {},\n\n\
         Thank you for scheduling your appointment with {} on {}.\n\n\
         Please complete the attached patient intake form and bring it with you, \
         or reply to this email with the completed form at least 24 hours before your visit.\n\n\
         Appointment ID: {}",
        record.patient.name,
        record.slot.doctor,
        describe_slot(&record.slot, record.duration_minutes),
        record.appointment_id,
    );

    log_failure(
        state
            .notifier
            .send_email(&record.patient.email, subject, &body, attachment)
            .await,
        &record.appointment_id,
        "intake form email",
    )
}

fn log_failure<T>(result: anyhow::Result<T>, appointment_id: &str, what: &str) -> bool {
    match result {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(appointment_id = %appointment_id, error = %e, "{what} failed");
            false
        }
    }
}

fn confirmation_email(record: &ConfirmationRecord) -> (String, String) {
    let subject = format!("Appointment Confirmed - {}", record.appointment_id);
    let body = format!(
        "Dear {},\n\n\
         Your appointment has been confirmed.\n\n\
         Appointment ID: {}\n\
         Patient ID: {}\n\
         Doctor: {}\n\
         Location: {}\n\
         Date & time: {}\n\
         Duration: {} minutes\n\n\
         Insurance: {} (member ID {}, group {})\n\n\
         Please arrive 15 minutes early. You will receive reminders before your visit.",
        record.patient.name,
        record.appointment_id,
        record.patient_id,
        record.slot.doctor,
        record.slot.location,
        describe_slot(&record.slot, record.duration_minutes),
        record.duration_minutes,
        record.insurance.primary_carrier,
        record.insurance.member_id,
        record.insurance.group_number,
    );
    (subject, body)
}

fn confirmation_sms(record: &ConfirmationRecord) -> String {
    format!(
        "Appointment confirmed: {} at {}, {}. ID: {}",
        record.slot.doctor,
        record.slot.location,
        describe_slot(&record.slot, record.duration_minutes),
        record.appointment_id,
    )
}

fn confirmation_message(record: &ConfirmationRecord) -> String {
    let status = |ok: bool, yes: &str, no: &str| if ok { yes.to_string() } else { no.to_string() };
    format!(
        "Your appointment is confirmed!\n\n\
         Appointment ID: {}\n\
         Patient: {} ({}, {} patient)\n\
         Doctor: {}\n\
         Location: {}\n\
         When: {} ({} minutes)\n\
         Insurance: {}, member ID {}, group {}\n\n\
         Confirmation email: {}\n\
         Confirmation SMS: {}\n\
         Intake forms: {}\n\
         Reminders: {}",
        record.appointment_id,
        record.patient.name,
        record.patient_id,
        record.patient_type.as_str(),
        record.slot.doctor,
        record.slot.location,
        describe_slot(&record.slot, record.duration_minutes),
        record.duration_minutes,
        record.insurance.primary_carrier,
        record.insurance.member_id,
        record.insurance.group_number,
        status(record.email_sent, "sent", "could not be sent"),
        status(record.sms_sent, "sent", "could not be sent"),
        status(
            record.form_sent,
            &format!("sent to {}", record.patient.email),
            "could not be sent, our staff will follow up"
        ),
        status(
            record.reminders_scheduled,
            "3 scheduled (24 hours, 2 hours and 1 hour before your visit)",
            "not scheduled"
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 9, 3)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_appointment_ids_carry_timestamp_and_sequence() {
        let mut ledger = BookingLedger::default();
        assert_eq!(ledger.next_appointment_id(at(14, 30, 5)), "APT_20250903_143005_001");
        assert_eq!(ledger.next_appointment_id(at(14, 30, 5)), "APT_20250903_143005_002");
    }

    #[test]
    fn test_due_reminders_sorted_and_unsent_only() {
        let mut ledger = BookingLedger::default();
        let appointment = NaiveDate::from_ymd_opt(2025, 9, 4)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let mut set = reminders::schedule("APT_A", appointment);
        set.get_mut(1).unwrap().mark_sent(at(10, 0, 0));
        ledger.set_reminders(set);

        // 09:30 on the appointment day: reminder 2 (08:00) is due, 3 (09:00) too
        let now = appointment - chrono::Duration::minutes(30);
        assert_eq!(
            ledger.due_reminders(now),
            vec![("APT_A".to_string(), 2), ("APT_A".to_string(), 3)]
        );
        // nothing goes out once the visit has started
        assert!(ledger.due_reminders(appointment).is_empty());
    }
}
