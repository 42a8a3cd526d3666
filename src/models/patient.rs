use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::field::Field;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Doctor {
    #[serde(rename = "Dr. Naveen")]
    Naveen,
    #[serde(rename = "Dr. Naresh")]
    Naresh,
    #[serde(rename = "Dr. Aish")]
    Aish,
    #[serde(rename = "Dr. Shreyansh")]
    Shreyansh,
}

impl Doctor {
    pub const ALL: [Doctor; 4] = [Doctor::Naveen, Doctor::Naresh, Doctor::Aish, Doctor::Shreyansh];

    pub fn as_str(&self) -> &'static str {
        match self {
            Doctor::Naveen => "Dr. Naveen",
            Doctor::Naresh => "Dr. Naresh",
            Doctor::Aish => "Dr. Aish",
            Doctor::Shreyansh => "Dr. Shreyansh",
        }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Doctor::Naveen => &["naveen"],
            Doctor::Naresh => &["naresh"],
            Doctor::Aish => &["aish"],
            Doctor::Shreyansh => &["shreyansh"],
        }
    }

    /// Case-insensitive substring match, first doctor in `ALL` order wins.
    pub fn find_in(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|d| d.keywords().iter().any(|k| lower.contains(k)))
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == s)
    }

    pub fn listing() -> String {
        Self::ALL
            .iter()
            .map(|d| d.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Location {
    Gachibowli,
    #[serde(rename = "Jubilee Hills")]
    JubileeHills,
    #[serde(rename = "Banjara Hills")]
    BanjaraHills,
}

impl Location {
    pub const ALL: [Location; 3] = [
        Location::Gachibowli,
        Location::JubileeHills,
        Location::BanjaraHills,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Gachibowli => "Gachibowli",
            Location::JubileeHills => "Jubilee Hills",
            Location::BanjaraHills => "Banjara Hills",
        }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Location::Gachibowli => &["gachibowli"],
            // common misspelling seen in older schedule exports
            Location::JubileeHills => &["jubilee", "jubliee"],
            Location::BanjaraHills => &["banjara"],
        }
    }

    pub fn find_in(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|l| l.keywords().iter().any(|k| lower.contains(k)))
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.as_str() == s)
    }

    pub fn listing() -> String {
        Self::ALL
            .iter()
            .map(|l| l.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Validated patient identity. Built only once every intake field passed its
/// validator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientIdentity {
    pub name: String,
    pub date_of_birth: String,
    pub phone: String,
    pub email: String,
    pub doctor: Doctor,
    pub location: Location,
}

impl PatientIdentity {
    /// `None` unless all six intake fields are present and the doctor and
    /// location values are canonical names.
    pub fn from_fields(values: &BTreeMap<Field, String>) -> Option<Self> {
        let get = |f: Field| values.get(&f).cloned();
        Some(Self {
            name: get(Field::PatientName)?,
            date_of_birth: get(Field::DateOfBirth)?,
            phone: get(Field::Phone)?,
            email: get(Field::Email)?,
            doctor: Doctor::parse(values.get(&Field::PreferredDoctor)?)?,
            location: Location::parse(values.get(&Field::Location)?)?,
        })
    }

    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or("")
    }

    pub fn last_name(&self) -> String {
        self.name.split_whitespace().skip(1).collect::<Vec<_>>().join(" ")
    }

    pub fn with_preferences(&self, doctor: Doctor, location: Location) -> Self {
        Self {
            doctor,
            location,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PatientType {
    New,
    Returning,
}

impl PatientType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatientType::New => "new",
            PatientType::Returning => "returning",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "returning" => PatientType::Returning,
            _ => PatientType::New,
        }
    }

    pub fn appointment_minutes(&self) -> u32 {
        match self {
            PatientType::New => 60,
            PatientType::Returning => 30,
        }
    }
}

/// Insurance values as found on the directory row. Not validated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct InsuranceSnapshot {
    pub carrier: String,
    pub member_id: String,
    pub group_number: String,
}

impl InsuranceSnapshot {
    pub fn is_empty(&self) -> bool {
        self.carrier.is_empty() && self.member_id.is_empty() && self.group_number.is_empty()
    }
}

/// One row of the patient directory table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientRecord {
    pub patient_id: String,
    pub first_name: String,
    pub last_name: String,
    pub dob: String,
    pub phone: String,
    pub email: String,
    pub last_visit: Option<String>,
    pub patient_type: PatientType,
    pub insurance_carrier: String,
    pub member_id: String,
    pub group_number: String,
    pub notes: String,
}

impl PatientRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn insurance(&self) -> InsuranceSnapshot {
        InsuranceSnapshot {
            carrier: self.insurance_carrier.clone(),
            member_id: self.member_id.clone(),
            group_number: self.group_number.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LookupResult {
    pub patient_id: String,
    pub patient_type: PatientType,
    pub last_visit: Option<String>,
    pub existing_insurance: Option<InsuranceSnapshot>,
}

impl LookupResult {
    pub fn new_patient(patient_id: String) -> Self {
        Self {
            patient_id,
            patient_type: PatientType::New,
            last_visit: None,
            existing_insurance: None,
        }
    }

    pub fn returning(record: &PatientRecord) -> Self {
        let insurance = record.insurance();
        Self {
            patient_id: record.patient_id.clone(),
            patient_type: PatientType::Returning,
            last_visit: record.last_visit.clone(),
            existing_insurance: (!insurance.is_empty()).then_some(insurance),
        }
    }

    /// Always derived from the patient type.
    pub fn appointment_duration(&self) -> u32 {
        self.patient_type.appointment_minutes()
    }
}
