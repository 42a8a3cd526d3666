pub mod appointment;
pub mod field;
pub mod insurance;
pub mod patient;
pub mod reminder;
pub mod schedule;

pub use appointment::{AdminReport, AppointmentRow, AppointmentStatus, ConfirmationRecord};
pub use field::Field;
pub use insurance::InsuranceInfo;
pub use patient::{
    Doctor, InsuranceSnapshot, Location, LookupResult, PatientIdentity, PatientRecord, PatientType,
};
pub use reminder::{
    NextAction, ReminderEntry, ReminderKind, ReminderReply, ReminderSet, ReminderStatus,
};
pub use schedule::{ScheduleSlot, ScheduleSummary, SLOT_MINUTES};
