use std::collections::BTreeMap;

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use super::insurance::InsuranceInfo;
use super::patient::{PatientIdentity, PatientType};
use super::schedule::ScheduleSlot;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Confirmed,
    Pending,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "confirmed" => AppointmentStatus::Confirmed,
            "cancelled" => AppointmentStatus::Cancelled,
            _ => AppointmentStatus::Pending,
        }
    }
}

/// Snapshot written once per successful booking. Only the delivery flags
/// change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfirmationRecord {
    pub appointment_id: String,
    pub patient_id: String,
    pub patient_type: PatientType,
    pub patient: PatientIdentity,
    pub insurance: InsuranceInfo,
    pub slot: ScheduleSlot,
    pub duration_minutes: u32,
    pub status: AppointmentStatus,
    pub confirmed_at: NaiveDateTime,
    pub email_sent: bool,
    pub sms_sent: bool,
    pub exported: bool,
    pub form_sent: bool,
    pub reminders_scheduled: bool,
    pub reminders_sent: u8,
}

impl ConfirmationRecord {
    pub fn appointment_at(&self) -> Option<NaiveDateTime> {
        self.slot.starts_at()
    }

    pub fn export_row(&self) -> AppointmentRow {
        AppointmentRow {
            appointment_id: self.appointment_id.clone(),
            patient_id: self.patient_id.clone(),
            patient_name: self.patient.name.clone(),
            patient_email: self.patient.email.clone(),
            patient_phone: self.patient.phone.clone(),
            date_of_birth: self.patient.date_of_birth.clone(),
            patient_type: self.patient_type.as_str().to_string(),
            doctor: self.slot.doctor.clone(),
            location: self.slot.location.clone(),
            appointment_date: self.slot.date.clone(),
            appointment_time: self.slot.time.clone(),
            duration_minutes: self.duration_minutes,
            insurance_carrier: self.insurance.primary_carrier.clone(),
            member_id: self.insurance.member_id.clone(),
            group_number: self.insurance.group_number.clone(),
            status: self.status.as_str().to_string(),
            confirmed_at: self
                .confirmed_at
                .with_nanosecond(0)
                .unwrap_or(self.confirmed_at)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            email_sent: self.email_sent,
            sms_sent: self.sms_sent,
            form_sent: self.form_sent,
            reminders_sent: self.reminders_sent,
        }
    }
}

/// Flat row of the persisted appointment table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentRow {
    pub appointment_id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub patient_email: String,
    pub patient_phone: String,
    pub date_of_birth: String,
    pub patient_type: String,
    pub doctor: String,
    pub location: String,
    pub appointment_date: String,
    pub appointment_time: String,
    pub duration_minutes: u32,
    pub insurance_carrier: String,
    pub member_id: String,
    pub group_number: String,
    pub status: String,
    pub confirmed_at: String,
    pub email_sent: bool,
    pub sms_sent: bool,
    pub form_sent: bool,
    pub reminders_sent: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdminReport {
    pub generated_at: String,
    pub total_appointments: usize,
    pub new_patients: usize,
    pub returning_patients: usize,
    pub forms_sent: usize,
    pub by_doctor: BTreeMap<String, usize>,
    pub by_location: BTreeMap<String, usize>,
    pub rows: Vec<AppointmentRow>,
}

impl AdminReport {
    pub fn from_records(records: &[ConfirmationRecord], generated_at: NaiveDateTime) -> Self {
        let mut by_doctor = BTreeMap::new();
        let mut by_location = BTreeMap::new();
        for record in records {
            *by_doctor.entry(record.slot.doctor.clone()).or_insert(0) += 1;
            *by_location.entry(record.slot.location.clone()).or_insert(0) += 1;
        }

        Self {
            generated_at: generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            total_appointments: records.len(),
            new_patients: records
                .iter()
                .filter(|r| r.patient_type == PatientType::New)
                .count(),
            returning_patients: records
                .iter()
                .filter(|r| r.patient_type == PatientType::Returning)
                .count(),
            forms_sent: records.iter().filter(|r| r.form_sent).count(),
            by_doctor,
            by_location,
            rows: records.iter().map(|r| r.export_row()).collect(),
        }
    }
}
