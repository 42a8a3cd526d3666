use rusqlite::{params, Connection, Transaction};

use crate::models::{AdminReport, AppointmentRow, PatientRecord, PatientType, ScheduleSlot};

// ── Patients ──

pub fn get_patients(conn: &Connection) -> anyhow::Result<Vec<PatientRecord>> {
    let mut stmt = conn.prepare(
        "SELECT patient_id, first_name, last_name, dob, phone, email, last_visit, patient_type,
                insurance_carrier, member_id, group_number, notes
         FROM patients ORDER BY rowid ASC",
    )?;

    let rows = stmt.query_map([], |row| {
        let patient_type: String = row.get(7)?;
        Ok(PatientRecord {
            patient_id: row.get(0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            dob: row.get(3)?,
            phone: row.get(4)?,
            email: row.get(5)?,
            last_visit: row.get(6)?,
            patient_type: PatientType::parse(&patient_type),
            insurance_carrier: row.get(8)?,
            member_id: row.get(9)?,
            group_number: row.get(10)?,
            notes: row.get(11)?,
        })
    })?;

    let mut patients = vec![];
    for row in rows {
        patients.push(row?);
    }
    Ok(patients)
}

pub fn replace_patients(tx: &Transaction, rows: &[PatientRecord]) -> anyhow::Result<()> {
    tx.execute("DELETE FROM patients", [])?;
    let mut stmt = tx.prepare(
        "INSERT INTO patients (patient_id, first_name, last_name, dob, phone, email, last_visit,
                               patient_type, insurance_carrier, member_id, group_number, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    )?;
    for p in rows {
        stmt.execute(params![
            p.patient_id,
            p.first_name,
            p.last_name,
            p.dob,
            p.phone,
            p.email,
            p.last_visit,
            p.patient_type.as_str(),
            p.insurance_carrier,
            p.member_id,
            p.group_number,
            p.notes,
        ])?;
    }
    Ok(())
}

// ── Schedule ──

pub fn get_schedule(conn: &Connection) -> anyhow::Result<Vec<ScheduleSlot>> {
    let mut stmt = conn.prepare(
        "SELECT doctor, location, date, time, available, duration_available, status
         FROM schedule ORDER BY date ASC, time ASC, doctor ASC, location ASC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(ScheduleSlot {
            doctor: row.get(0)?,
            location: row.get(1)?,
            date: row.get(2)?,
            time: row.get(3)?,
            available: row.get(4)?,
            duration_available: row.get(5)?,
            status: row.get(6)?,
        })
    })?;

    let mut slots = vec![];
    for row in rows {
        slots.push(row?);
    }
    Ok(slots)
}

pub fn replace_schedule(tx: &Transaction, rows: &[ScheduleSlot]) -> anyhow::Result<()> {
    tx.execute("DELETE FROM schedule", [])?;
    let mut stmt = tx.prepare(
        "INSERT INTO schedule (doctor, location, date, time, available, duration_available, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for s in rows {
        stmt.execute(params![
            s.doctor,
            s.location,
            s.date,
            s.time,
            s.available,
            s.duration_available,
            s.status,
        ])?;
    }
    Ok(())
}

// ── Appointments ──

pub fn insert_appointment(conn: &Connection, row: &AppointmentRow) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO appointments (appointment_id, patient_id, patient_name, patient_email,
             patient_phone, date_of_birth, patient_type, doctor, location, appointment_date,
             appointment_time, duration_minutes, insurance_carrier, member_id, group_number,
             status, confirmed_at, email_sent, sms_sent, form_sent, reminders_sent)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
        params![
            row.appointment_id,
            row.patient_id,
            row.patient_name,
            row.patient_email,
            row.patient_phone,
            row.date_of_birth,
            row.patient_type,
            row.doctor,
            row.location,
            row.appointment_date,
            row.appointment_time,
            row.duration_minutes,
            row.insurance_carrier,
            row.member_id,
            row.group_number,
            row.status,
            row.confirmed_at,
            row.email_sent,
            row.sms_sent,
            row.form_sent,
            row.reminders_sent,
        ],
    )?;
    Ok(())
}

pub fn get_appointments(conn: &Connection) -> anyhow::Result<Vec<AppointmentRow>> {
    let mut stmt = conn.prepare(
        "SELECT appointment_id, patient_id, patient_name, patient_email, patient_phone,
                date_of_birth, patient_type, doctor, location, appointment_date, appointment_time,
                duration_minutes, insurance_carrier, member_id, group_number, status, confirmed_at,
                email_sent, sms_sent, form_sent, reminders_sent
         FROM appointments ORDER BY id ASC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(AppointmentRow {
            appointment_id: row.get(0)?,
            patient_id: row.get(1)?,
            patient_name: row.get(2)?,
            patient_email: row.get(3)?,
            patient_phone: row.get(4)?,
            date_of_birth: row.get(5)?,
            patient_type: row.get(6)?,
            doctor: row.get(7)?,
            location: row.get(8)?,
            appointment_date: row.get(9)?,
            appointment_time: row.get(10)?,
            duration_minutes: row.get(11)?,
            insurance_carrier: row.get(12)?,
            member_id: row.get(13)?,
            group_number: row.get(14)?,
            status: row.get(15)?,
            confirmed_at: row.get(16)?,
            email_sent: row.get(17)?,
            sms_sent: row.get(18)?,
            form_sent: row.get(19)?,
            reminders_sent: row.get(20)?,
        })
    })?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row?);
    }
    Ok(appointments)
}

// ── Admin reports ──

pub fn insert_admin_report(conn: &Connection, report: &AdminReport) -> anyhow::Result<()> {
    let body = serde_json::to_string(report)?;
    conn.execute(
        "INSERT INTO admin_reports (generated_at, body) VALUES (?1, ?2)",
        params![report.generated_at, body],
    )?;
    Ok(())
}

pub fn get_latest_admin_report(conn: &Connection) -> anyhow::Result<Option<AdminReport>> {
    let result = conn.query_row(
        "SELECT body FROM admin_reports ORDER BY id DESC LIMIT 1",
        [],
        |row| row.get::<_, String>(0),
    );

    match result {
        Ok(body) => Ok(Some(serde_json::from_str(&body)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
