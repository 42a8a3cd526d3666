use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Length of one schedule row.
pub const SLOT_MINUTES: u32 = 30;

/// One row of the doctor schedule table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleSlot {
    pub doctor: String,
    pub location: String,
    pub date: String,
    pub time: String,
    pub available: bool,
    pub duration_available: u32,
    #[serde(default)]
    pub status: String,
}

impl ScheduleSlot {
    pub fn open(doctor: &str, location: &str, date: &str, time: &str) -> Self {
        Self {
            doctor: doctor.to_string(),
            location: location.to_string(),
            date: date.to_string(),
            time: time.to_string(),
            available: true,
            duration_available: SLOT_MINUTES,
            status: "Available".to_string(),
        }
    }

    pub fn starts_at(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&format!("{} {}", self.date, self.time), "%Y-%m-%d %H:%M")
            .ok()
    }

    pub fn is_for(&self, doctor: &str, location: &str) -> bool {
        self.doctor == doctor && self.location == location
    }

    pub fn has_capacity(&self, minutes: u32) -> bool {
        self.available && self.duration_available >= minutes
    }

    /// Same doctor, location, date and start time.
    pub fn same_position(&self, doctor: &str, location: &str, date: &str, time: &str) -> bool {
        self.doctor == doctor && self.location == location && self.date == date && self.time == time
    }

    /// Flip to unavailable. Both columns change together.
    pub fn mark_booked(&mut self, status: &str) {
        self.available = false;
        self.duration_available = 0;
        self.status = status.to_string();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleSummary {
    pub total_slots: usize,
    pub available_slots: usize,
    pub unavailable_slots: usize,
    pub available_by_doctor: BTreeMap<String, usize>,
}

impl ScheduleSummary {
    pub fn from_rows(rows: &[ScheduleSlot]) -> Self {
        let available_slots = rows.iter().filter(|s| s.available).count();
        let mut available_by_doctor = BTreeMap::new();
        for slot in rows.iter().filter(|s| s.available) {
            *available_by_doctor.entry(slot.doctor.clone()).or_insert(0) += 1;
        }
        Self {
            total_slots: rows.len(),
            available_slots,
            unavailable_slots: rows.len() - available_slots,
            available_by_doctor,
        }
    }
}
