use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    Regular,
    FormCheck,
    Confirmation,
}

impl ReminderKind {
    pub const ORDER: [ReminderKind; 3] = [
        ReminderKind::Regular,
        ReminderKind::FormCheck,
        ReminderKind::Confirmation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderKind::Regular => "regular",
            ReminderKind::FormCheck => "form_check",
            ReminderKind::Confirmation => "confirmation",
        }
    }

    pub fn hours_before(&self) -> i64 {
        match self {
            ReminderKind::Regular => 24,
            ReminderKind::FormCheck => 2,
            ReminderKind::Confirmation => 1,
        }
    }

    pub fn action_required(&self) -> &'static str {
        match self {
            ReminderKind::Regular => "Confirm your appointment",
            ReminderKind::FormCheck => "Fill out your patient intake forms",
            ReminderKind::Confirmation => "Confirm you're still coming or cancel if needed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReminderEntry {
    pub number: u8,
    pub kind: ReminderKind,
    pub scheduled_time: NaiveDateTime,
    pub sent: bool,
    pub response_received: bool,
    pub action_required: String,
    pub sent_at: Option<NaiveDateTime>,
    pub patient_response: Option<String>,
}

impl ReminderEntry {
    /// One-way: once sent, stays sent.
    pub fn mark_sent(&mut self, at: NaiveDateTime) {
        if !self.sent {
            self.sent = true;
            self.sent_at = Some(at);
        }
    }

    /// One-way: once a response is recorded, later ones do not overwrite it.
    pub fn mark_responded(&mut self, response: &str) {
        if !self.response_received {
            self.response_received = true;
            self.patient_response = Some(response.to_string());
        }
    }

    pub fn appointment_at(&self) -> NaiveDateTime {
        self.scheduled_time + Duration::hours(self.kind.hours_before())
    }

    /// Unsent, its time has come, and the appointment has not started yet.
    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        !self.sent && self.scheduled_time <= now && self.appointment_at() > now
    }
}

/// Exactly three reminders, numbered 1..=3.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReminderSet {
    pub appointment_id: String,
    entries: [ReminderEntry; 3],
}

impl ReminderSet {
    pub fn new(appointment_id: String, entries: [ReminderEntry; 3]) -> Self {
        Self {
            appointment_id,
            entries,
        }
    }

    pub fn entries(&self) -> &[ReminderEntry; 3] {
        &self.entries
    }

    pub fn get(&self, number: u8) -> Option<&ReminderEntry> {
        self.entries.iter().find(|e| e.number == number)
    }

    pub fn get_mut(&mut self, number: u8) -> Option<&mut ReminderEntry> {
        self.entries.iter_mut().find(|e| e.number == number)
    }

    /// Most recently sent reminder still waiting for a reply.
    pub fn awaiting_response(&self) -> Option<u8> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.sent && !e.response_received)
            .map(|e| e.number)
    }

    pub fn due(&self, now: NaiveDateTime) -> Vec<u8> {
        self.entries
            .iter()
            .filter(|e| e.is_due(now))
            .map(|e| e.number)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    Confirmed,
    Cancelled,
    FormsSent,
    FormsCompleted,
    FormsResent,
    CallRequested,
    Unclear,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    ScheduleFormReminder,
    UpdateCalendar,
    SendIntakeForms,
    ScheduleFinalReminder,
    PrepareForAppointment,
    InitiateCall,
    ResendReminder,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReminderReply {
    pub message: String,
    pub status: ReminderStatus,
    pub next_action: NextAction,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn entry(kind: ReminderKind, appointment_at: NaiveDateTime) -> ReminderEntry {
        ReminderEntry {
            number: 1,
            kind,
            scheduled_time: appointment_at - Duration::hours(kind.hours_before()),
            sent: false,
            response_received: false,
            action_required: kind.action_required().to_string(),
            sent_at: None,
            patient_response: None,
        }
    }

    #[test]
    fn test_not_due_once_appointment_started() {
        let appointment = NaiveDate::from_ymd_opt(2030, 1, 7)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let e = entry(ReminderKind::Regular, appointment);
        assert_eq!(e.appointment_at(), appointment);

        assert!(!e.is_due(appointment - Duration::hours(25)));
        assert!(e.is_due(appointment - Duration::hours(24)));
        assert!(e.is_due(appointment - Duration::minutes(1)));
        assert!(!e.is_due(appointment));
        assert!(!e.is_due(appointment + Duration::days(2)));
    }
}
