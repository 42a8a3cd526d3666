use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::Field;
use crate::services::validators::{acknowledgement, validate_field};

pub type CollectedFields = BTreeMap<Field, String>;

const NOT_HEARD: &str = "I didn't catch that. Could you please repeat?";

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Empty input. Nothing was consumed.
    NotHeard(String),
    /// The current field's validator refused the input.
    Rejected(String),
    /// At least one value was stored and collection continues.
    Accepted(String),
    Complete {
        message: String,
        values: CollectedFields,
    },
}

/// Walks an ordered field list one field at a time. Only the current field is
/// validated on `submit`; earlier fields are never asked again unless the
/// collector is reset.
#[derive(Debug, Clone, PartialEq)]
pub struct StepCollector {
    fields: Vec<Field>,
    current: usize,
    collected: CollectedFields,
}

impl StepCollector {
    pub fn new(fields: &[Field]) -> Self {
        Self {
            fields: fields.to_vec(),
            current: 0,
            collected: BTreeMap::new(),
        }
    }

    pub fn patient_intake() -> Self {
        Self::new(&Field::PATIENT_INTAKE)
    }

    pub fn insurance_intake() -> Self {
        Self::new(&Field::INSURANCE_INTAKE)
    }

    pub fn current_field(&self) -> Option<Field> {
        self.fields.get(self.current).copied()
    }

    pub fn is_complete(&self) -> bool {
        self.current >= self.fields.len()
    }

    pub fn collected(&self) -> &CollectedFields {
        &self.collected
    }

    pub fn pending_fields(&self) -> Vec<Field> {
        self.fields
            .iter()
            .filter(|f| !self.collected.contains_key(f))
            .copied()
            .collect()
    }

    pub fn current_prompt(&self) -> String {
        self.current_field()
            .map(|f| f.prompt())
            .unwrap_or_default()
    }

    pub fn reset(&mut self) {
        self.current = 0;
        self.collected.clear();
    }

    pub fn submit(&mut self, input: Option<&str>, today: NaiveDate) -> StepOutcome {
        let Some(text) = input.map(str::trim).filter(|t| !t.is_empty()) else {
            return StepOutcome::NotHeard(self.not_heard());
        };

        let Some(field) = self.current_field() else {
            return self.completion(Vec::new());
        };

        match validate_field(field, text, today) {
            Ok(value) => {
                let ack = acknowledgement(field, &value, today);
                self.collected.insert(field, value);
                self.advance();
                self.finish_turn(vec![ack])
            }
            Err(failure) => StepOutcome::Rejected(failure.message),
        }
    }

    /// Stores a value for a pending field that arrived out of order (e.g. from
    /// extraction). The value still has to pass the field's validator. Returns
    /// the acknowledgement when accepted.
    pub fn prefill(&mut self, field: Field, raw: &str, today: NaiveDate) -> Option<String> {
        if !self.fields.contains(&field) || self.collected.contains_key(&field) {
            return None;
        }
        let value = validate_field(field, raw, today).ok()?;
        let ack = acknowledgement(field, &value, today);
        self.collected.insert(field, value);
        Some(ack)
    }

    /// Moves past any fields filled by `prefill` and reports them.
    pub fn resume(&mut self, acknowledgements: Vec<String>) -> StepOutcome {
        if self
            .current_field()
            .is_some_and(|f| self.collected.contains_key(&f))
        {
            self.advance();
        }
        self.finish_turn(acknowledgements)
    }

    fn advance(&mut self) {
        self.current += 1;
        while self
            .current_field()
            .is_some_and(|f| self.collected.contains_key(&f))
        {
            self.current += 1;
        }
    }

    fn finish_turn(&self, acknowledgements: Vec<String>) -> StepOutcome {
        if self.is_complete() {
            return self.completion(acknowledgements);
        }
        let mut message = acknowledgements.join("\n");
        if !message.is_empty() {
            message.push_str("\n\n");
        }
        message.push_str(&self.current_prompt());
        StepOutcome::Accepted(message)
    }

    fn completion(&self, acknowledgements: Vec<String>) -> StepOutcome {
        let mut message = acknowledgements.join("\n");
        if !message.is_empty() {
            message.push_str("\n\n");
        }
        message.push_str("Perfect! I have all your information:\n");
        for field in &self.fields {
            if let Some(value) = self.collected.get(field) {
                message.push_str(&format!("\n{}: {}", capitalize(field.label()), value));
            }
        }
        StepOutcome::Complete {
            message,
            values: self.collected.clone(),
        }
    }

    fn not_heard(&self) -> String {
        format!("{NOT_HEARD}\n\n{}", self.current_prompt())
    }
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().to_string() + c.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 3).unwrap()
    }

    #[test]
    fn test_walks_patient_fields_in_order() {
        let mut c = StepCollector::patient_intake();
        assert_eq!(c.current_field(), Some(Field::PatientName));

        let out = c.submit(Some("john smith"), today());
        assert!(matches!(out, StepOutcome::Accepted(ref m) if m.contains("John Smith") && m.contains("date of birth")));
        assert_eq!(c.current_field(), Some(Field::DateOfBirth));

        for input in ["12/25/1990", "5551234567", "john@test.com", "dr naveen"] {
            assert!(matches!(c.submit(Some(input), today()), StepOutcome::Accepted(_)));
        }

        match c.submit(Some("Gachibowli"), today()) {
            StepOutcome::Complete { values, message } => {
                assert_eq!(values[&Field::PatientName], "John Smith");
                assert_eq!(values[&Field::Phone], "(555) 123-4567");
                assert_eq!(values[&Field::PreferredDoctor], "Dr. Naveen");
                assert_eq!(values[&Field::Location], "Gachibowli");
                assert!(message.contains("I have all your information"));
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert!(c.is_complete());
    }

    #[test]
    fn test_rejection_does_not_advance() {
        let mut c = StepCollector::patient_intake();
        c.submit(Some("Jane Doe"), today());
        let out = c.submit(Some("not a date"), today());
        assert!(matches!(out, StepOutcome::Rejected(_)));
        assert_eq!(c.current_field(), Some(Field::DateOfBirth));
        assert_eq!(c.collected().len(), 1);
    }

    #[test]
    fn test_empty_and_missing_input_reprompt_same_field() {
        let mut c = StepCollector::insurance_intake();
        let out = c.submit(None, today());
        assert!(matches!(out, StepOutcome::NotHeard(ref m) if m.contains("primary insurance carrier")));
        let out = c.submit(Some("   "), today());
        assert!(matches!(out, StepOutcome::NotHeard(_)));
        assert_eq!(c.current_field(), Some(Field::PrimaryCarrier));
        assert!(c.collected().is_empty());
    }

    #[test]
    fn test_prefilled_fields_are_skipped() {
        let mut c = StepCollector::patient_intake();
        let acks: Vec<String> = [
            (Field::PatientName, "aviral gupta"),
            (Field::PreferredDoctor, "DR naveen"),
            (Field::Email, "not-an-email"),
        ]
        .iter()
        .filter_map(|(f, v)| c.prefill(*f, v, today()))
        .collect();
        assert_eq!(acks.len(), 2);

        let out = c.resume(acks);
        assert!(matches!(out, StepOutcome::Accepted(_)));
        assert_eq!(c.current_field(), Some(Field::DateOfBirth));

        c.submit(Some("07/07/2004"), today());
        c.submit(Some("5551234567"), today());
        c.submit(Some("a@b.co"), today());
        // doctor was prefilled, so location is next
        assert_eq!(c.current_field(), Some(Field::Location));
    }

    #[test]
    fn test_prefill_ignores_foreign_and_collected_fields() {
        let mut c = StepCollector::insurance_intake();
        assert!(c.prefill(Field::Email, "a@b.co", today()).is_none());
        assert!(c.prefill(Field::MemberId, "BC12345", today()).is_some());
        assert!(c.prefill(Field::MemberId, "ZZ99999", today()).is_none());
        assert_eq!(c.collected()[&Field::MemberId], "BC12345");
    }

    #[test]
    fn test_reset_starts_over() {
        let mut c = StepCollector::insurance_intake();
        c.submit(Some("Aetna"), today());
        c.reset();
        assert_eq!(c.current_field(), Some(Field::PrimaryCarrier));
        assert!(c.collected().is_empty());
    }
}
