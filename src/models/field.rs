use serde::{Deserialize, Serialize};

use super::patient::{Doctor, Location};

/// One collectable input of the intake conversations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    PatientName,
    DateOfBirth,
    Phone,
    Email,
    PreferredDoctor,
    Location,
    PrimaryCarrier,
    MemberId,
    GroupNumber,
}

impl Field {
    pub const PATIENT_INTAKE: [Field; 6] = [
        Field::PatientName,
        Field::DateOfBirth,
        Field::Phone,
        Field::Email,
        Field::PreferredDoctor,
        Field::Location,
    ];

    pub const INSURANCE_INTAKE: [Field; 3] =
        [Field::PrimaryCarrier, Field::MemberId, Field::GroupNumber];

    pub fn key(&self) -> &'static str {
        match self {
            Field::PatientName => "patient_name",
            Field::DateOfBirth => "date_of_birth",
            Field::Phone => "phone",
            Field::Email => "email",
            Field::PreferredDoctor => "preferred_doctor",
            Field::Location => "location",
            Field::PrimaryCarrier => "primary_carrier",
            Field::MemberId => "member_id",
            Field::GroupNumber => "group_number",
        }
    }

    pub fn from_key(s: &str) -> Option<Self> {
        match s {
            "patient_name" => Some(Field::PatientName),
            "date_of_birth" => Some(Field::DateOfBirth),
            "phone" => Some(Field::Phone),
            "email" => Some(Field::Email),
            "preferred_doctor" => Some(Field::PreferredDoctor),
            "location" => Some(Field::Location),
            "primary_carrier" => Some(Field::PrimaryCarrier),
            "member_id" => Some(Field::MemberId),
            "group_number" => Some(Field::GroupNumber),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Field::PatientName => "name",
            Field::DateOfBirth => "date of birth",
            Field::Phone => "phone number",
            Field::Email => "email",
            Field::PreferredDoctor => "doctor",
            Field::Location => "location",
            Field::PrimaryCarrier => "primary carrier",
            Field::MemberId => "member ID",
            Field::GroupNumber => "group number",
        }
    }

    pub fn prompt(&self) -> String {
        match self {
            Field::PatientName => {
                "Could you please tell me your full name (first and last name)?".to_string()
            }
            Field::DateOfBirth => {
                "What's your date of birth? Please use MM/DD/YYYY (e.g. 12/25/1990).".to_string()
            }
            Field::Phone => "What's your phone number?".to_string(),
            Field::Email => "What's your email address?".to_string(),
            Field::PreferredDoctor => format!(
                "Which doctor would you like to see? Available doctors: {}.",
                Doctor::listing()
            ),
            Field::Location => format!(
                "Which location would you prefer? Available locations: {}.",
                Location::listing()
            ),
            Field::PrimaryCarrier => {
                "Please provide your primary insurance carrier (e.g. Blue Cross Blue Shield, Aetna, Cigna).".to_string()
            }
            Field::MemberId => {
                "What is your member ID? (This is usually found on your insurance card)".to_string()
            }
            Field::GroupNumber => {
                "Finally, what is your group number? (Also found on your insurance card)".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_round_trip_through_serde_names() {
        for field in Field::PATIENT_INTAKE.iter().chain(Field::INSURANCE_INTAKE.iter()) {
            let json = serde_json::to_string(field).unwrap();
            assert_eq!(json, format!("\"{}\"", field.key()));
            assert_eq!(Field::from_key(field.key()), Some(*field));
        }
    }

    #[test]
    fn test_doctor_prompt_lists_all_doctors() {
        let prompt = Field::PreferredDoctor.prompt();
        for doctor in Doctor::ALL {
            assert!(prompt.contains(doctor.as_str()));
        }
    }
}
