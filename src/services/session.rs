use std::collections::HashMap;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::models::{LookupResult, PatientIdentity, ScheduleSlot};
use crate::services::booking::Reservation;
use crate::services::collector::StepCollector;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStep {
    PatientIntake,
    PatientLookup,
    SlotSelection,
    InsuranceIntake,
    Completed,
}

impl SessionStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStep::PatientIntake => "patient_intake",
            SessionStep::PatientLookup => "patient_lookup",
            SessionStep::SlotSelection => "slot_selection",
            SessionStep::InsuranceIntake => "insurance_intake",
            SessionStep::Completed => "completed",
        }
    }
}

/// Everything one conversation has collected so far.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub step: SessionStep,
    pub intake: StepCollector,
    pub insurance: StepCollector,
    pub patient: Option<PatientIdentity>,
    pub lookup: Option<LookupResult>,
    pub offered_slots: Vec<ScheduleSlot>,
    pub reservation: Option<Reservation>,
    pub appointment_id: Option<String>,
    pub last_activity: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

impl Session {
    pub fn new(id: String, now: NaiveDateTime, ttl: Duration) -> Self {
        Self {
            id,
            step: SessionStep::PatientIntake,
            intake: StepCollector::patient_intake(),
            insurance: StepCollector::insurance_intake(),
            patient: None,
            lookup: None,
            offered_slots: Vec::new(),
            reservation: None,
            appointment_id: None,
            last_activity: now,
            expires_at: now + ttl,
        }
    }

    pub fn touch(&mut self, now: NaiveDateTime, ttl: Duration) {
        self.last_activity = now;
        self.expires_at = now + ttl;
    }

    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        self.expires_at <= now
    }
}

#[derive(Default)]
pub struct SessionStore {
    sessions: HashMap<String, Session>,
}

impl SessionStore {
    /// A copy of the live session. The turn works on the copy and commits it
    /// with [`SessionStore::save`] only when it succeeds.
    pub fn get(&self, id: &str, now: NaiveDateTime) -> Option<Session> {
        self.sessions
            .get(id)
            .filter(|s| !s.is_expired(now))
            .cloned()
    }

    pub fn save(&mut self, session: Session) {
        self.sessions.insert(session.id.clone(), session);
    }

    /// Drops expired sessions and hands them back so their reservations can
    /// be released.
    pub fn purge_expired(&mut self, now: NaiveDateTime) -> Vec<Session> {
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.is_expired(now))
            .map(|(id, _)| id.clone())
            .collect();
        expired
            .iter()
            .filter_map(|id| self.sessions.remove(id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 1, 7)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_expired_sessions_are_invisible_and_purged() {
        let mut store = SessionStore::default();
        store.save(Session::new("a".into(), now(), Duration::minutes(30)));
        store.save(Session::new("b".into(), now() + Duration::minutes(20), Duration::minutes(30)));

        let later = now() + Duration::minutes(31);
        assert!(store.get("a", later).is_none());
        assert!(store.get("b", later).is_some());

        let purged = store.purge_expired(later);
        assert_eq!(purged.len(), 1);
        assert_eq!(purged[0].id, "a");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_touch_extends_expiry() {
        let mut session = Session::new("a".into(), now(), Duration::minutes(30));
        session.touch(now() + Duration::minutes(25), Duration::minutes(30));
        assert!(!session.is_expired(now() + Duration::minutes(40)));
    }
}
