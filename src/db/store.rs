use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use rusqlite::Connection;

use super::queries;
use crate::models::{AdminReport, AppointmentRow, PatientRecord, ScheduleSlot};

/// Table-level persistence for the directory, the schedule and the booking
/// outputs. Saves replace the whole table; there is no row versioning, so two
/// writers racing on the same table resolve as last-write-wins.
pub trait RecordStore: Send + Sync {
    fn load_patients(&self) -> anyhow::Result<Vec<PatientRecord>>;
    fn save_patients(&self, rows: &[PatientRecord]) -> anyhow::Result<()>;

    fn load_schedule(&self) -> anyhow::Result<Vec<ScheduleSlot>>;
    fn save_schedule(&self, rows: &[ScheduleSlot]) -> anyhow::Result<()>;

    fn append_appointment(&self, row: &AppointmentRow) -> anyhow::Result<()>;
    fn load_appointments(&self) -> anyhow::Result<Vec<AppointmentRow>>;

    fn save_admin_report(&self, report: &AdminReport) -> anyhow::Result<()>;
    fn load_admin_report(&self) -> anyhow::Result<Option<AdminReport>>;
}

pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn open(path: &str) -> anyhow::Result<Self> {
        Ok(Self::new(super::init_db(path)?))
    }

    fn conn(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database connection lock poisoned"))
    }
}

impl RecordStore for SqliteRecordStore {
    fn load_patients(&self) -> anyhow::Result<Vec<PatientRecord>> {
        queries::get_patients(&*self.conn()?).context("failed to load patients")
    }

    fn save_patients(&self, rows: &[PatientRecord]) -> anyhow::Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        queries::replace_patients(&tx, rows).context("failed to save patients")?;
        tx.commit()?;
        Ok(())
    }

    fn load_schedule(&self) -> anyhow::Result<Vec<ScheduleSlot>> {
        queries::get_schedule(&*self.conn()?).context("failed to load schedule")
    }

    fn save_schedule(&self, rows: &[ScheduleSlot]) -> anyhow::Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        queries::replace_schedule(&tx, rows).context("failed to save schedule")?;
        tx.commit()?;
        Ok(())
    }

    fn append_appointment(&self, row: &AppointmentRow) -> anyhow::Result<()> {
        queries::insert_appointment(&*self.conn()?, row).context("failed to export appointment")
    }

    fn load_appointments(&self) -> anyhow::Result<Vec<AppointmentRow>> {
        queries::get_appointments(&*self.conn()?).context("failed to load appointments")
    }

    fn save_admin_report(&self, report: &AdminReport) -> anyhow::Result<()> {
        queries::insert_admin_report(&*self.conn()?, report).context("failed to save admin report")
    }

    fn load_admin_report(&self) -> anyhow::Result<Option<AdminReport>> {
        queries::get_latest_admin_report(&*self.conn()?).context("failed to load admin report")
    }
}

/// In-process store used by the tests and by `DATABASE_URL=memory`.
#[derive(Default)]
pub struct MemoryRecordStore {
    patients: Mutex<Vec<PatientRecord>>,
    schedule: Mutex<Vec<ScheduleSlot>>,
    appointments: Mutex<Vec<AppointmentRow>>,
    report: Mutex<Option<AdminReport>>,
    fail_loads: bool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(patients: Vec<PatientRecord>, schedule: Vec<ScheduleSlot>) -> Self {
        Self {
            patients: Mutex::new(patients),
            schedule: Mutex::new(schedule),
            ..Self::default()
        }
    }

    /// Every load fails, as if the backing files were missing.
    pub fn failing() -> Self {
        Self {
            fail_loads: true,
            ..Self::default()
        }
    }

    fn guard<'a, T>(&self, m: &'a Mutex<T>) -> anyhow::Result<MutexGuard<'a, T>> {
        if self.fail_loads {
            anyhow::bail!("record store is not available");
        }
        m.lock()
            .map_err(|_| anyhow::anyhow!("record store lock poisoned"))
    }
}

impl RecordStore for MemoryRecordStore {
    fn load_patients(&self) -> anyhow::Result<Vec<PatientRecord>> {
        Ok(self.guard(&self.patients)?.clone())
    }

    fn save_patients(&self, rows: &[PatientRecord]) -> anyhow::Result<()> {
        *self.guard(&self.patients)? = rows.to_vec();
        Ok(())
    }

    fn load_schedule(&self) -> anyhow::Result<Vec<ScheduleSlot>> {
        Ok(self.guard(&self.schedule)?.clone())
    }

    fn save_schedule(&self, rows: &[ScheduleSlot]) -> anyhow::Result<()> {
        *self.guard(&self.schedule)? = rows.to_vec();
        Ok(())
    }

    fn append_appointment(&self, row: &AppointmentRow) -> anyhow::Result<()> {
        self.guard(&self.appointments)?.push(row.clone());
        Ok(())
    }

    fn load_appointments(&self) -> anyhow::Result<Vec<AppointmentRow>> {
        Ok(self.guard(&self.appointments)?.clone())
    }

    fn save_admin_report(&self, report: &AdminReport) -> anyhow::Result<()> {
        *self.guard(&self.report)? = Some(report.clone());
        Ok(())
    }

    fn load_admin_report(&self) -> anyhow::Result<Option<AdminReport>> {
        Ok(self.guard(&self.report)?.clone())
    }
}
