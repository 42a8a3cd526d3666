use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

use crate::db::RecordStore;
use crate::errors::BookingError;
use crate::models::{Doctor, Location, PatientType, ScheduleSlot, ScheduleSummary, SLOT_MINUTES};

const MAX_OFFERED: usize = 7;
const DAY_START_HOUR: u32 = 9;
const DAY_END_HOUR: u32 = 17;

pub const STATUS_BOOKED_NEW: &str = "Fully Booked (New Patient)";
pub const STATUS_BOOKED_RETURNING: &str = "Fully Booked (Returning Patient)";

/// Doctor schedule held in memory and written back to the store as a whole
/// table after every booking.
pub struct SlotMatcher {
    store: Arc<dyn RecordStore>,
    rows: Option<Vec<ScheduleSlot>>,
}

impl SlotMatcher {
    pub fn load(store: Arc<dyn RecordStore>) -> Self {
        let rows = match store.load_schedule() {
            Ok(rows) => {
                tracing::info!(slots = rows.len(), "doctor schedule loaded");
                Some(rows)
            }
            Err(e) => {
                tracing::error!(error = %e, "doctor schedule failed to load");
                None
            }
        };
        Self { store, rows }
    }

    pub fn rows(&self) -> &[ScheduleSlot] {
        self.rows.as_deref().unwrap_or(&[])
    }

    pub fn summary(&self) -> Option<ScheduleSummary> {
        self.rows.as_deref().map(ScheduleSummary::from_rows)
    }

    /// Fills an empty schedule with open slots for every doctor and location
    /// on the weekdays starting at `start`. Returns the number of rows added.
    pub fn seed_if_empty(&mut self, start: NaiveDate, days: u32) -> anyhow::Result<usize> {
        let Some(rows) = self.rows.as_mut() else {
            anyhow::bail!("doctor schedule is not available");
        };
        if !rows.is_empty() {
            return Ok(0);
        }

        let generated = generate_schedule(start, days);
        self.store.save_schedule(&generated)?;
        let count = generated.len();
        *rows = generated;
        tracing::info!(slots = count, days, "seeded doctor schedule");
        Ok(count)
    }

    /// Candidate start slots for `minutes`, earliest first, at most seven.
    /// Sixty minutes needs two back-to-back open rows; only the first one is
    /// returned. Slots starting at or before `now` are skipped.
    pub fn find(
        &self,
        doctor: Doctor,
        location: Location,
        minutes: u32,
        now: NaiveDateTime,
    ) -> (String, Vec<ScheduleSlot>) {
        let Some(rows) = self.rows.as_deref() else {
            return (
                "Sorry, the doctor schedule is not available right now. Please try again later."
                    .to_string(),
                Vec::new(),
            );
        };

        let mut open: Vec<(NaiveDateTime, &ScheduleSlot)> = rows
            .iter()
            .filter(|s| s.is_for(doctor.as_str(), location.as_str()) && s.has_capacity(SLOT_MINUTES))
            .filter_map(|s| s.starts_at().map(|at| (at, s)))
            .filter(|(at, _)| *at > now)
            .collect();
        open.sort_by_key(|(at, _)| *at);

        let slots_needed = minutes.div_ceil(SLOT_MINUTES).max(1);
        let candidates: Vec<ScheduleSlot> = if slots_needed == 1 {
            open.iter().take(MAX_OFFERED).map(|(_, s)| (*s).clone()).collect()
        } else {
            open.windows(2)
                .filter(|pair| pair[1].0 - pair[0].0 == Duration::minutes(SLOT_MINUTES as i64))
                .take(MAX_OFFERED)
                .map(|pair| pair[0].1.clone())
                .collect()
        };

        let message = if candidates.is_empty() {
            no_slots_message(doctor, location, minutes)
        } else {
            slot_list_message(doctor, location, minutes, &candidates)
        };
        (message, candidates)
    }

    /// Marks the chosen row (and for new patients the row thirty minutes
    /// later) unavailable, then persists the table. Either every row changes
    /// or none does.
    pub fn book(
        &mut self,
        slot: &ScheduleSlot,
        patient_type: PatientType,
    ) -> Result<Vec<ScheduleSlot>, BookingError> {
        let rows = self.rows.as_mut().ok_or(BookingError::ScheduleUnavailable)?;

        let first = rows
            .iter()
            .position(|r| {
                r.same_position(&slot.doctor, &slot.location, &slot.date, &slot.time)
                    && r.has_capacity(SLOT_MINUTES)
            })
            .ok_or_else(|| BookingError::SlotNotFound {
                date: slot.date.clone(),
                time: slot.time.clone(),
            })?;

        let mut indices = vec![first];
        let status = match patient_type {
            PatientType::Returning => STATUS_BOOKED_RETURNING,
            PatientType::New => {
                let follow_on = slot
                    .starts_at()
                    .map(|at| at + Duration::minutes(SLOT_MINUTES as i64))
                    .ok_or_else(|| BookingError::SlotNotFound {
                        date: slot.date.clone(),
                        time: slot.time.clone(),
                    })?;
                let date = follow_on.format("%Y-%m-%d").to_string();
                let time = follow_on.format("%H:%M").to_string();

                let second = rows
                    .iter()
                    .position(|r| {
                        r.same_position(&slot.doctor, &slot.location, &date, &time)
                            && r.has_capacity(SLOT_MINUTES)
                    })
                    .ok_or(BookingError::ConsecutiveSlotTaken { date, time })?;
                indices.push(second);
                STATUS_BOOKED_NEW
            }
        };

        let mut updated = rows.clone();
        for &i in &indices {
            updated[i].mark_booked(status);
        }
        self.store
            .save_schedule(&updated)
            .map_err(BookingError::Persist)?;

        let booked = indices.iter().map(|&i| updated[i].clone()).collect();
        *rows = updated;
        tracing::info!(
            doctor = %slot.doctor,
            date = %slot.date,
            time = %slot.time,
            rows = indices.len(),
            "slot booked"
        );
        Ok(booked)
    }

    /// Re-opens rows taken by a reservation that was never confirmed.
    pub fn release(&mut self, booked: &[ScheduleSlot]) -> anyhow::Result<()> {
        let Some(rows) = self.rows.as_mut() else {
            anyhow::bail!("doctor schedule is not available");
        };

        let mut updated = rows.clone();
        for b in booked {
            if let Some(row) = updated.iter_mut().find(|r| {
                r.same_position(&b.doctor, &b.location, &b.date, &b.time) && !r.available
            }) {
                *row = ScheduleSlot::open(&b.doctor, &b.location, &b.date, &b.time);
            }
        }
        self.store.save_schedule(&updated)?;
        *rows = updated;
        tracing::info!(rows = booked.len(), "reservation released");
        Ok(())
    }
}

pub fn generate_schedule(start: NaiveDate, days: u32) -> Vec<ScheduleSlot> {
    let mut slots = Vec::new();
    for offset in 0..days {
        let date = start + Duration::days(offset as i64);
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            continue;
        }
        let date_str = date.format("%Y-%m-%d").to_string();
        for doctor in Doctor::ALL {
            for location in Location::ALL {
                let mut minute = DAY_START_HOUR * 60;
                while minute < DAY_END_HOUR * 60 {
                    let time = format!("{:02}:{:02}", minute / 60, minute % 60);
                    slots.push(ScheduleSlot::open(
                        doctor.as_str(),
                        location.as_str(),
                        &date_str,
                        &time,
                    ));
                    minute += SLOT_MINUTES;
                }
            }
        }
    }
    slots
}

/// `Monday, January 07, 2030 at 09:00 AM - 10:00 AM`
pub fn describe_slot(slot: &ScheduleSlot, minutes: u32) -> String {
    match slot.starts_at() {
        Some(start) => {
            let end = start + Duration::minutes(minutes as i64);
            format!(
                "{} at {} - {}",
                start.format("%A, %B %d, %Y"),
                start.format("%I:%M %p"),
                end.format("%I:%M %p")
            )
        }
        None => format!("{} at {}", slot.date, slot.time),
    }
}

fn slot_list_message(
    doctor: Doctor,
    location: Location,
    minutes: u32,
    slots: &[ScheduleSlot],
) -> String {
    let mut msg = format!(
        "Here are the available {minutes}-minute appointments with {} at {}:\n",
        doctor.as_str(),
        location.as_str()
    );
    for (i, slot) in slots.iter().enumerate() {
        msg.push_str(&format!("\n{}. {}", i + 1, describe_slot(slot, minutes)));
    }
    msg.push_str("\n\nReply with the number of the slot you'd like to book.");
    msg
}

fn no_slots_message(doctor: Doctor, location: Location, minutes: u32) -> String {
    let other_doctors: Vec<&str> = Doctor::ALL
        .iter()
        .filter(|d| **d != doctor)
        .map(|d| d.as_str())
        .collect();
    let other_locations: Vec<&str> = Location::ALL
        .iter()
        .filter(|l| **l != location)
        .map(|l| l.as_str())
        .collect();

    format!(
        "Sorry, there are no available {minutes}-minute appointments with {} at {} right now.\n\n\
         You can reply with another doctor ({}) or another location ({}), \
         or reply 'restart' to start over.",
        doctor.as_str(),
        location.as_str(),
        other_doctors.join(", "),
        other_locations.join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryRecordStore;

    fn before_everything() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn slot(date: &str, time: &str) -> ScheduleSlot {
        ScheduleSlot::open("Dr. Naveen", "Gachibowli", date, time)
    }

    fn matcher(rows: Vec<ScheduleSlot>) -> (Arc<MemoryRecordStore>, SlotMatcher) {
        let store = Arc::new(MemoryRecordStore::with_data(vec![], rows));
        let m = SlotMatcher::load(store.clone());
        (store, m)
    }

    fn times(slots: &[ScheduleSlot]) -> Vec<String> {
        slots.iter().map(|s| format!("{} {}", s.date, s.time)).collect()
    }

    #[test]
    fn test_thirty_minutes_sorted_and_capped() {
        let mut rows: Vec<ScheduleSlot> = (0..10)
            .rev()
            .map(|i| slot("2030-01-07", &format!("{:02}:00", 9 + i)))
            .collect();
        rows.push(ScheduleSlot::open("Dr. Aish", "Gachibowli", "2030-01-07", "08:00"));
        let (_, m) = matcher(rows);

        let (msg, found) = m.find(Doctor::Naveen, Location::Gachibowli, 30, before_everything());
        assert_eq!(found.len(), 7);
        assert_eq!(found[0].time, "09:00");
        assert_eq!(found[6].time, "15:00");
        assert!(msg.starts_with("Here are the available 30-minute"));
    }

    #[test]
    fn test_sixty_minutes_requires_true_back_to_back_pairs() {
        let mut taken = slot("2030-01-07", "10:30");
        taken.mark_booked(STATUS_BOOKED_RETURNING);
        let rows = vec![
            slot("2030-01-07", "11:00"),
            slot("2030-01-07", "09:00"),
            slot("2030-01-07", "10:00"),
            taken,
            slot("2030-01-07", "09:30"),
            slot("2030-01-07", "16:30"),
            slot("2030-01-08", "09:00"),
        ];
        let (_, m) = matcher(rows);

        let (_, found) = m.find(Doctor::Naveen, Location::Gachibowli, 60, before_everything());
        // 10:00 is followed by a booked row, 16:30 is followed by the next day
        assert_eq!(times(&found), vec!["2030-01-07 09:00", "2030-01-07 09:30"]);
    }

    #[test]
    fn test_find_is_idempotent_without_booking() {
        let rows = generate_schedule(NaiveDate::from_ymd_opt(2030, 1, 7).unwrap(), 3);
        let (_, m) = matcher(rows);
        let a = m.find(Doctor::Aish, Location::BanjaraHills, 60, before_everything());
        let b = m.find(Doctor::Aish, Location::BanjaraHills, 60, before_everything());
        assert_eq!(a, b);
    }

    #[test]
    fn test_past_slots_are_not_offered() {
        let (_, m) = matcher(vec![slot("2030-01-07", "09:00"), slot("2030-01-07", "09:30")]);
        let now = NaiveDate::from_ymd_opt(2030, 1, 7)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let (_, found) = m.find(Doctor::Naveen, Location::Gachibowli, 30, now);
        assert_eq!(times(&found), vec!["2030-01-07 09:30"]);
    }

    #[test]
    fn test_no_slots_suggests_alternatives() {
        let (_, m) = matcher(vec![]);
        let (msg, found) = m.find(Doctor::Naresh, Location::JubileeHills, 30, before_everything());
        assert!(found.is_empty());
        assert!(msg.contains("Dr. Naveen"));
        assert!(msg.contains("Banjara Hills"));
        assert!(!msg.contains("(Dr. Naresh"));
    }

    #[test]
    fn test_new_patient_books_both_rows_and_persists() {
        let rows = vec![
            slot("2030-01-07", "09:00"),
            slot("2030-01-07", "09:30"),
            slot("2030-01-07", "10:00"),
        ];
        let (store, mut m) = matcher(rows);

        let booked = m.book(&slot("2030-01-07", "09:00"), PatientType::New).unwrap();
        assert_eq!(times(&booked), vec!["2030-01-07 09:00", "2030-01-07 09:30"]);

        let persisted = store.load_schedule().unwrap();
        let unavailable: Vec<_> = persisted.iter().filter(|s| !s.available).collect();
        assert_eq!(unavailable.len(), 2);
        assert!(unavailable.iter().all(|s| s.duration_available == 0));
        assert!(unavailable.iter().all(|s| s.status == STATUS_BOOKED_NEW));
        assert!(persisted[2].available);
    }

    #[test]
    fn test_new_patient_booking_fails_atomically_when_follow_on_taken() {
        let mut second = slot("2030-01-07", "09:30");
        second.mark_booked(STATUS_BOOKED_RETURNING);
        let (store, mut m) = matcher(vec![slot("2030-01-07", "09:00"), second]);
        let before = store.load_schedule().unwrap();

        let err = m.book(&slot("2030-01-07", "09:00"), PatientType::New).unwrap_err();
        assert!(matches!(err, BookingError::ConsecutiveSlotTaken { ref time, .. } if time == "09:30"));
        assert_eq!(store.load_schedule().unwrap(), before);
        assert!(m.rows()[0].available);
    }

    #[test]
    fn test_returning_patient_books_single_row() {
        let rows = vec![
            slot("2030-01-07", "09:00"),
            slot("2030-01-07", "09:30"),
            ScheduleSlot::open("Dr. Aish", "Gachibowli", "2030-01-07", "09:00"),
        ];
        let (store, mut m) = matcher(rows);

        let booked = m.book(&slot("2030-01-07", "09:30"), PatientType::Returning).unwrap();
        assert_eq!(booked.len(), 1);

        let persisted = store.load_schedule().unwrap();
        assert!(persisted[0].available);
        assert!(!persisted[1].available);
        assert_eq!(persisted[1].status, STATUS_BOOKED_RETURNING);
        assert!(persisted[2].available);
    }

    #[test]
    fn test_release_reopens_booked_rows() {
        let (store, mut m) = matcher(vec![slot("2030-01-07", "09:00"), slot("2030-01-07", "09:30")]);
        let booked = m.book(&slot("2030-01-07", "09:00"), PatientType::New).unwrap();
        m.release(&booked).unwrap();

        let persisted = store.load_schedule().unwrap();
        assert!(persisted.iter().all(|s| s.available && s.duration_available == 30));
    }

    #[test]
    fn test_booking_same_slot_twice_fails() {
        let (_, mut m) = matcher(vec![slot("2030-01-07", "09:00")]);
        m.book(&slot("2030-01-07", "09:00"), PatientType::Returning).unwrap();
        let err = m.book(&slot("2030-01-07", "09:00"), PatientType::Returning).unwrap_err();
        assert!(matches!(err, BookingError::SlotNotFound { .. }));
    }

    #[test]
    fn test_seed_generates_weekday_slots_once() {
        let (store, mut m) = matcher(vec![]);
        // 2030-01-05 is a Saturday
        let added = m
            .seed_if_empty(NaiveDate::from_ymd_opt(2030, 1, 5).unwrap(), 3)
            .unwrap();
        // one weekday, 4 doctors x 3 locations x 16 half hours
        assert_eq!(added, 4 * 3 * 16);
        assert_eq!(store.load_schedule().unwrap().len(), added);
        assert!(m.rows().iter().all(|s| s.date == "2030-01-07"));
        assert_eq!(m.rows().last().unwrap().time, "16:30");

        let again = m
            .seed_if_empty(NaiveDate::from_ymd_opt(2030, 1, 5).unwrap(), 3)
            .unwrap();
        assert_eq!(again, 0);
    }

    #[test]
    fn test_describe_slot_shows_end_time() {
        let text = describe_slot(&slot("2030-01-07", "09:00"), 60);
        assert_eq!(text, "Monday, January 07, 2030 at 09:00 AM - 10:00 AM");
    }
}
