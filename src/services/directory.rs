use std::sync::Arc;

use chrono::NaiveDate;

use crate::db::RecordStore;
use crate::errors::AppError;
use crate::models::{InsuranceInfo, LookupResult, PatientIdentity, PatientRecord, PatientType};

pub const DATABASE_UNAVAILABLE: &str =
    "Sorry, the patient database is not available right now. Please try again in a moment.";

/// Patient directory backed by a [`RecordStore`]. When the initial load
/// failed every operation answers [`AppError::LookupUnavailable`].
pub struct PatientDirectory {
    store: Arc<dyn RecordStore>,
    rows: Option<Vec<PatientRecord>>,
}

impl PatientDirectory {
    pub fn load(store: Arc<dyn RecordStore>) -> Self {
        let rows = match store.load_patients() {
            Ok(rows) => {
                tracing::info!(patients = rows.len(), "patient directory loaded");
                Some(rows)
            }
            Err(e) => {
                tracing::error!(error = %e, "patient directory failed to load");
                None
            }
        };
        Self { store, rows }
    }

    pub fn is_available(&self) -> bool {
        self.rows.is_some()
    }

    /// Retries the initial load if it had failed.
    pub fn ensure_loaded(&mut self) -> bool {
        if self.rows.is_none() {
            if let Ok(rows) = self.store.load_patients() {
                tracing::info!(patients = rows.len(), "patient directory recovered");
                self.rows = Some(rows);
            }
        }
        self.is_available()
    }

    pub fn records(&self) -> &[PatientRecord] {
        self.rows.as_deref().unwrap_or(&[])
    }

    /// First record whose full name contains `name` (case-insensitive) and
    /// whose date of birth normalizes to the same calendar day wins. A miss
    /// registers the patient immediately.
    pub fn lookup(
        &mut self,
        identity: &PatientIdentity,
        today: NaiveDate,
    ) -> Result<(String, LookupResult), AppError> {
        let rows = self.rows.as_ref().ok_or(AppError::LookupUnavailable)?;

        if let Some(record) = find_match(rows, &identity.name, &identity.date_of_birth) {
            let result = LookupResult::returning(record);
            tracing::info!(patient_id = %result.patient_id, "returning patient matched");
            return Ok((returning_message(identity, &result), result));
        }

        let patient_id = self.register(identity, today)?;
        let result = LookupResult::new_patient(patient_id);
        tracing::info!(patient_id = %result.patient_id, "new patient registered");
        Ok((new_patient_message(identity, &result), result))
    }

    /// Overwrites the insurance columns of the row with exactly this id.
    pub fn update_insurance(
        &mut self,
        patient_id: &str,
        insurance: &InsuranceInfo,
    ) -> Result<bool, AppError> {
        self.update(patient_id, |record| {
            record.insurance_carrier = insurance.primary_carrier.clone();
            record.member_id = insurance.member_id.clone();
            record.group_number = insurance.group_number.clone();
        })
    }

    pub fn mark_returning(&mut self, patient_id: &str, today: NaiveDate) -> Result<bool, AppError> {
        let last_visit = today.format("%Y-%m-%d").to_string();
        self.update(patient_id, |record| {
            record.patient_type = PatientType::Returning;
            record.last_visit = Some(last_visit.clone());
        })
    }

    fn register(&mut self, identity: &PatientIdentity, today: NaiveDate) -> Result<String, AppError> {
        // Re-read so rows appended by another writer since startup are kept.
        let mut rows = match self.store.load_patients() {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "re-reading patient directory failed, using cached rows");
                self.rows.clone().unwrap_or_default()
            }
        };

        let patient_id = next_id(&rows);
        rows.push(PatientRecord {
            patient_id: patient_id.clone(),
            first_name: identity.first_name().to_string(),
            last_name: identity.last_name(),
            dob: identity.date_of_birth.clone(),
            phone: identity.phone.clone(),
            email: identity.email.clone(),
            last_visit: None,
            patient_type: PatientType::New,
            insurance_carrier: String::new(),
            member_id: String::new(),
            group_number: String::new(),
            notes: format!("Registered {}", today.format("%Y-%m-%d")),
        });

        self.store.save_patients(&rows)?;
        self.rows = Some(rows);
        Ok(patient_id)
    }

    fn update<F>(&mut self, patient_id: &str, apply: F) -> Result<bool, AppError>
    where
        F: FnOnce(&mut PatientRecord),
    {
        let rows = self.rows.as_mut().ok_or(AppError::LookupUnavailable)?;
        let Some(record) = rows.iter_mut().find(|r| r.patient_id == patient_id) else {
            tracing::warn!(%patient_id, "patient not found for update");
            return Ok(false);
        };
        apply(record);
        self.store.save_patients(rows)?;
        Ok(true)
    }
}

fn find_match<'a>(rows: &'a [PatientRecord], name: &str, dob: &str) -> Option<&'a PatientRecord> {
    let name = name.trim().to_lowercase();
    let wanted = normalize_dob(dob)?;
    rows.iter().find(|r| {
        r.full_name().to_lowercase().contains(&name)
            && normalize_dob(&r.dob).as_deref() == Some(wanted.as_str())
    })
}

/// `max(numeric suffix) + 1` over ids shaped `PAT_<n>` or `PAT_<date>_<n>`,
/// falling back to the row count when no id carries a number or the largest
/// one has no successor.
pub fn next_id(rows: &[PatientRecord]) -> String {
    let max = rows
        .iter()
        .filter_map(|r| id_number(&r.patient_id))
        .max();
    let fallback = rows.len() as u64 + 1;
    let next = max.and_then(|n| n.checked_add(1)).unwrap_or(fallback);
    format!("PAT_{next:03}")
}

fn id_number(id: &str) -> Option<u64> {
    let rest = id.strip_prefix("PAT_")?;
    rest.rsplit('_').next()?.parse().ok()
}

/// Reduces a date of birth to `YYYYMMDD`. Accepts `MM/DD/YYYY`, `DD/MM/YYYY`
/// (first part above 12), the same with `-`, ISO `YYYY-MM-DD` and bare
/// `YYYYMMDD`.
pub fn normalize_dob(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.len() == 8 && s.chars().all(|c| c.is_ascii_digit()) {
        return Some(s.to_string());
    }

    let parts: Vec<&str> = s.split(['/', '-']).collect();
    if parts.len() != 3 {
        return None;
    }
    let nums: Vec<u32> = parts
        .iter()
        .map(|p| p.parse().ok())
        .collect::<Option<_>>()?;

    let (year, month, day) = if parts[0].len() == 4 {
        (nums[0], nums[1], nums[2])
    } else if nums[0] > 12 {
        (nums[2], nums[1], nums[0])
    } else {
        (nums[2], nums[0], nums[1])
    };
    NaiveDate::from_ymd_opt(year as i32, month, day)?;
    Some(format!("{year:04}{month:02}{day:02}"))
}

fn returning_message(identity: &PatientIdentity, result: &LookupResult) -> String {
    format!(
        "Welcome back, {}! I found your record in our system.\n\n\
         Patient ID: {}\n\
         Last visit: {}\n\
         Appointment duration: {} minutes (returning patient)",
        identity.first_name(),
        result.patient_id,
        result.last_visit.as_deref().unwrap_or("not recorded"),
        result.appointment_duration(),
    )
}

fn new_patient_message(identity: &PatientIdentity, result: &LookupResult) -> String {
    format!(
        "Welcome, {}! I couldn't find an existing record, so I've registered you as a new patient.\n\n\
         Patient ID: {}\n\
         Appointment duration: {} minutes (new patient consultation)",
        identity.first_name(),
        result.patient_id,
        result.appointment_duration(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryRecordStore;
    use crate::models::{Doctor, Location};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 3).unwrap()
    }

    fn record(id: &str, first: &str, last: &str, dob: &str) -> PatientRecord {
        PatientRecord {
            patient_id: id.to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            dob: dob.to_string(),
            phone: "(555) 000-0000".to_string(),
            email: format!("{}@example.com", first.to_lowercase()),
            last_visit: Some("2025-01-10".to_string()),
            patient_type: PatientType::Returning,
            insurance_carrier: "Aetna".to_string(),
            member_id: "AET12345".to_string(),
            group_number: "GRP9".to_string(),
            notes: String::new(),
        }
    }

    fn identity(name: &str, dob: &str) -> PatientIdentity {
        PatientIdentity {
            name: name.to_string(),
            date_of_birth: dob.to_string(),
            phone: "(555) 123-4567".to_string(),
            email: "jane@test.com".to_string(),
            doctor: Doctor::Naveen,
            location: Location::Gachibowli,
        }
    }

    fn directory(rows: Vec<PatientRecord>) -> (Arc<MemoryRecordStore>, PatientDirectory) {
        let store = Arc::new(MemoryRecordStore::with_data(rows, vec![]));
        let dir = PatientDirectory::load(store.clone());
        (store, dir)
    }

    #[test]
    fn test_returning_patient_matched_across_dob_formats() {
        let (_, mut dir) = directory(vec![record("PAT_007", "Aviral", "Gupta", "2004-07-07")]);
        let (msg, result) = dir.lookup(&identity("aviral gupta", "07/07/2004"), today()).unwrap();

        assert_eq!(result.patient_type, PatientType::Returning);
        assert_eq!(result.appointment_duration(), 30);
        assert_eq!(result.patient_id, "PAT_007");
        assert_eq!(result.last_visit.as_deref(), Some("2025-01-10"));
        assert_eq!(result.existing_insurance.unwrap().carrier, "Aetna");
        assert!(msg.contains("Welcome back"));
    }

    #[test]
    fn test_miss_registers_new_patient_with_next_id() {
        let (store, mut dir) = directory(vec![
            record("PAT_003", "Ann", "Lee", "1980-01-01"),
            record("PAT_20240101_041", "Bob", "Ray", "1970-02-02"),
        ]);
        let (msg, result) = dir.lookup(&identity("Jane Doe", "05/15/1995"), today()).unwrap();

        assert_eq!(result.patient_type, PatientType::New);
        assert_eq!(result.appointment_duration(), 60);
        assert_eq!(result.patient_id, "PAT_042");
        assert!(msg.contains("new patient"));

        let persisted = store.load_patients().unwrap();
        assert_eq!(persisted.len(), 3);
        assert_eq!(persisted[2].first_name, "Jane");
        assert_eq!(persisted[2].patient_type, PatientType::New);
    }

    #[test]
    fn test_registration_keeps_rows_written_by_other_writers() {
        let (store, mut dir) = directory(vec![record("PAT_001", "Ann", "Lee", "1980-01-01")]);
        let mut rows = store.load_patients().unwrap();
        rows.push(record("PAT_002", "Other", "Writer", "1990-03-03"));
        store.save_patients(&rows).unwrap();

        let (_, result) = dir.lookup(&identity("Jane Doe", "05/15/1995"), today()).unwrap();
        assert_eq!(result.patient_id, "PAT_003");
        assert_eq!(store.load_patients().unwrap().len(), 3);
    }

    #[test]
    fn test_name_must_match_with_dob() {
        let (_, mut dir) = directory(vec![record("PAT_001", "Jane", "Doe", "1995-05-15")]);
        let (_, result) = dir.lookup(&identity("Jane Doe", "05/16/1995"), today()).unwrap();
        assert_eq!(result.patient_type, PatientType::New);
        assert_eq!(result.patient_id, "PAT_002");
    }

    #[test]
    fn test_unavailable_directory_reports_instead_of_panicking() {
        let mut dir = PatientDirectory::load(Arc::new(MemoryRecordStore::failing()));
        assert!(!dir.is_available());
        assert!(matches!(
            dir.lookup(&identity("Jane Doe", "05/15/1995"), today()),
            Err(AppError::LookupUnavailable)
        ));
        assert!(matches!(
            dir.mark_returning("PAT_001", today()),
            Err(AppError::LookupUnavailable)
        ));
    }

    #[test]
    fn test_mark_returning_and_update_insurance_persist() {
        let (store, mut dir) = directory(vec![]);
        let (_, result) = dir.lookup(&identity("Jane Doe", "05/15/1995"), today()).unwrap();
        assert_eq!(result.patient_id, "PAT_001");

        let insurance = InsuranceInfo {
            primary_carrier: "Cigna".to_string(),
            member_id: "CIG12345".to_string(),
            group_number: "G100".to_string(),
        };
        assert!(dir.update_insurance("PAT_001", &insurance).unwrap());
        assert!(dir.mark_returning("PAT_001", today()).unwrap());
        assert!(!dir.mark_returning("PAT_999", today()).unwrap());

        let row = &store.load_patients().unwrap()[0];
        assert_eq!(row.patient_type, PatientType::Returning);
        assert_eq!(row.last_visit.as_deref(), Some("2025-09-03"));
        assert_eq!(row.insurance_carrier, "Cigna");

        let (_, again) = dir.lookup(&identity("Jane Doe", "05/15/1995"), today()).unwrap();
        assert_eq!(again.patient_type, PatientType::Returning);
    }

    #[test]
    fn test_normalize_dob_formats() {
        assert_eq!(normalize_dob("12/25/1990").as_deref(), Some("19901225"));
        assert_eq!(normalize_dob("25-12-1990").as_deref(), Some("19901225"));
        assert_eq!(normalize_dob("1990-12-25").as_deref(), Some("19901225"));
        assert_eq!(normalize_dob("19901225").as_deref(), Some("19901225"));
        assert_eq!(normalize_dob("not a date"), None);
        assert_eq!(normalize_dob("02/30/1990"), None);
    }

    #[test]
    fn test_next_id_fallback_uses_row_count() {
        let rows = vec![
            record("legacy-a", "A", "B", "1990-01-01"),
            record("legacy-b", "C", "D", "1990-01-01"),
        ];
        assert_eq!(next_id(&rows), "PAT_003");
        assert_eq!(next_id(&[]), "PAT_001");
    }

    #[test]
    fn test_next_id_at_u64_max_falls_back_to_row_count() {
        let rows = vec![
            record("PAT_18446744073709551615", "A", "B", "1990-01-01"),
            record("PAT_002", "C", "D", "1990-01-01"),
        ];
        assert_eq!(next_id(&rows), "PAT_003");
    }
}
