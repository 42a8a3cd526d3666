//! Field validators for the intake conversations.
//!
//! Each validator takes the raw user text and returns either the normalized
//! value or a [`ValidationFailure`] whose message is the re-prompt shown to the
//! user. None of them panic or return errors for bad input.

use chrono::{Datelike, NaiveDate};

use crate::errors::ValidationFailure;
use crate::models::{Doctor, Field, Location};

pub type Validation<T = String> = Result<T, ValidationFailure>;

const MAX_AGE_YEARS: i32 = 120;
const MIN_MEMBER_ID_LEN: usize = 5;
const MIN_GROUP_NUMBER_LEN: usize = 3;

pub fn validate_field(field: Field, raw: &str, today: NaiveDate) -> Validation {
    match field {
        Field::PatientName => validate_name(raw),
        Field::DateOfBirth => validate_date_of_birth(raw, today),
        Field::Phone => validate_phone(raw),
        Field::Email => validate_email(raw),
        Field::PreferredDoctor => validate_doctor(raw).map(|d| d.as_str().to_string()),
        Field::Location => validate_location(raw).map(|l| l.as_str().to_string()),
        Field::PrimaryCarrier => validate_carrier(raw),
        Field::MemberId => validate_member_id(raw),
        Field::GroupNumber => validate_group_number(raw),
    }
}

/// Short acknowledgement for an accepted value.
pub fn acknowledgement(field: Field, value: &str, today: NaiveDate) -> String {
    match field {
        Field::DateOfBirth => match parse_canonical_dob(value) {
            Some(dob) => format!(
                "Got it! Your date of birth is {value} (you're {} years old).",
                age_on(dob, today)
            ),
            None => format!("Got it! Your date of birth is {value}."),
        },
        Field::PreferredDoctor => format!("Great choice! You've selected {value}."),
        Field::Location => format!("Perfect! You've selected the {value} location."),
        other => format!("Got it! Your {} is {value}.", other.label()),
    }
}

pub fn validate_name(raw: &str) -> Validation {
    let parts: Vec<&str> = raw.split_whitespace().collect();
    if parts.len() < 2 {
        return Err(ValidationFailure::new(
            "Please provide both your first and last name.",
        ));
    }
    Ok(parts
        .iter()
        .map(|p| title_case(p))
        .collect::<Vec<_>>()
        .join(" "))
}

/// Accepts `/` or `-` separated dates. A first component above 12 can only be
/// a day, otherwise month-first is tried before day-first.
pub fn validate_date_of_birth(raw: &str, today: NaiveDate) -> Validation {
    let input = raw.trim();
    let Some((first, second, year)) = split_date(input) else {
        return Err(dob_format_help());
    };

    let (primary, alternate) = if first > 12 {
        ((second, first), (first, second))
    } else {
        ((first, second), (second, first))
    };

    let dob = NaiveDate::from_ymd_opt(year, primary.0, primary.1)
        .or_else(|| NaiveDate::from_ymd_opt(year, alternate.0, alternate.1))
        .ok_or_else(dob_format_help)?;

    if dob > today {
        return Err(ValidationFailure::new(
            "Date of birth cannot be in the future. Please check your input.",
        ));
    }
    if age_on(dob, today) > MAX_AGE_YEARS {
        return Err(ValidationFailure::new(
            "Please verify the date of birth. The age seems too high.",
        ));
    }

    Ok(dob.format("%m/%d/%Y").to_string())
}

pub fn validate_phone(raw: &str) -> Validation {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.len() < 10 {
        return Err(ValidationFailure::new(
            "Please provide a valid phone number with at least 10 digits.",
        ));
    }

    let formatted = match digits.len() {
        10 => format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..]),
        11 if digits.starts_with('1') => {
            format!("+1 ({}) {}-{}", &digits[1..4], &digits[4..7], &digits[7..])
        }
        _ => trimmed.to_string(),
    };
    Ok(formatted)
}

pub fn validate_email(raw: &str) -> Validation {
    let email = raw.trim().to_lowercase();
    if email.contains('@') && email.contains('.') {
        Ok(email)
    } else {
        Err(ValidationFailure::new(
            "Please provide a valid email address (e.g. john@example.com).",
        ))
    }
}

pub fn validate_doctor(raw: &str) -> Validation<Doctor> {
    Doctor::find_in(raw).ok_or_else(|| {
        ValidationFailure::new(format!(
            "Please choose from our available doctors: {}.",
            Doctor::listing()
        ))
    })
}

pub fn validate_location(raw: &str) -> Validation<Location> {
    Location::find_in(raw).ok_or_else(|| {
        ValidationFailure::new(format!(
            "Please choose from our available locations: {}.",
            Location::listing()
        ))
    })
}

pub fn validate_carrier(raw: &str) -> Validation {
    let carrier = raw.trim();
    if carrier.chars().count() < 2 {
        return Err(ValidationFailure::new(
            "Please provide a valid insurance carrier name.",
        ));
    }
    Ok(carrier.to_string())
}

pub fn validate_member_id(raw: &str) -> Validation {
    let clean = strip_separators(raw);
    if clean.chars().count() < MIN_MEMBER_ID_LEN {
        return Err(ValidationFailure::new(
            "Member ID must be at least 5 characters long.",
        ));
    }
    if !clean.chars().all(char::is_alphanumeric) {
        return Err(ValidationFailure::new(
            "Member ID must contain only letters and numbers.",
        ));
    }
    Ok(clean)
}

pub fn validate_group_number(raw: &str) -> Validation {
    let clean = strip_separators(raw);
    if clean.chars().count() < MIN_GROUP_NUMBER_LEN {
        return Err(ValidationFailure::new(
            "Group number must be at least 3 characters long.",
        ));
    }
    if !clean.chars().all(char::is_alphanumeric) {
        return Err(ValidationFailure::new(
            "Group number must contain only letters and numbers.",
        ));
    }
    Ok(clean)
}

pub fn age_on(dob: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    age
}

fn parse_canonical_dob(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%m/%d/%Y").ok()
}

fn split_date(input: &str) -> Option<(u32, u32, i32)> {
    let sep = if input.contains('/') {
        '/'
    } else if input.contains('-') {
        '-'
    } else {
        return None;
    };

    let parts: Vec<&str> = input.split(sep).collect();
    if parts.len() != 3 {
        return None;
    }
    let (a, b, y) = (parts[0], parts[1], parts[2]);
    let all_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(a) || !all_digits(b) || !all_digits(y) {
        return None;
    }
    if a.len() > 2 || b.len() > 2 || y.len() != 4 {
        return None;
    }

    Some((a.parse().ok()?, b.parse().ok()?, y.parse().ok()?))
}

fn dob_format_help() -> ValidationFailure {
    ValidationFailure::new(
        "I couldn't understand that date. Please use MM/DD/YYYY (e.g. 06/20/2004), \
         DD/MM/YYYY (e.g. 20/06/2004), MM-DD-YYYY or DD-MM-YYYY.",
    )
}

fn strip_separators(raw: &str) -> String {
    raw.trim().chars().filter(|c| *c != ' ' && *c != '-').collect()
}

fn title_case(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut prev_alpha = false;
    for c in word.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}
