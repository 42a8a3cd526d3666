use async_trait::async_trait;

use crate::models::{Doctor, Field, Location};
use crate::services::ai::{LlmProvider, Message};

/// Pulls field values out of free text. Output is untrusted: callers run every
/// value through the field's validator, and an empty result is a normal
/// answer.
#[async_trait]
pub trait NaturalLanguageFieldExtractor: Send + Sync {
    async fn extract(&self, text: &str, field: Field) -> anyhow::Result<Option<String>>;

    async fn extract_many(
        &self,
        text: &str,
        fields: &[Field],
    ) -> anyhow::Result<Vec<(Field, String)>> {
        let mut found = Vec::new();
        for &field in fields {
            if let Some(value) = self.extract(text, field).await? {
                found.push((field, value));
            }
        }
        Ok(found)
    }
}

const SYSTEM_PROMPT: &str = r#"You extract patient intake details from one message sent to a medical clinic's appointment assistant.

Return ONLY a JSON object (no markdown, no explanation). Its keys are exactly the requested field names. Use null for any field the message does not state. Never guess or invent values.

Field meanings:
- patient_name: the patient's full name, first and last
- date_of_birth: date of birth exactly as written (e.g. 06/20/2004)
- phone: phone number as written
- email: email address
- preferred_doctor: the doctor the patient asks for
- location: the clinic location the patient asks for
- primary_carrier: insurance company name
- member_id: insurance member ID
- group_number: insurance group number
"#;

pub struct LlmFieldExtractor {
    llm: Box<dyn LlmProvider>,
}

impl LlmFieldExtractor {
    pub fn new(llm: Box<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl NaturalLanguageFieldExtractor for LlmFieldExtractor {
    async fn extract(&self, text: &str, field: Field) -> anyhow::Result<Option<String>> {
        let found = self.extract_many(text, &[field]).await?;
        Ok(found.into_iter().next().map(|(_, v)| v))
    }

    async fn extract_many(
        &self,
        text: &str,
        fields: &[Field],
    ) -> anyhow::Result<Vec<(Field, String)>> {
        if fields.is_empty() || text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<&str> = fields.iter().map(|f| f.key()).collect();
        let system = format!(
            "{SYSTEM_PROMPT}\nKnown doctors: {}\nKnown locations: {}",
            Doctor::listing(),
            Location::listing()
        );
        let request = format!("Requested fields: {}\n\nMessage: {}", keys.join(", "), text);

        let response = self.llm.chat(&system, &[Message::user(request)]).await?;
        Ok(parse_extraction(&response, fields))
    }
}

/// Lenient: accepts code fences and prose around the object. Anything that
/// does not parse yields no fields.
pub fn parse_extraction(response: &str, fields: &[Field]) -> Vec<(Field, String)> {
    let Some(object) = find_json_object(response) else {
        tracing::warn!("failed to parse extractor response as JSON, ignoring");
        return Vec::new();
    };

    fields
        .iter()
        .filter_map(|&field| {
            let value = match object.get(field.key())? {
                serde_json::Value::String(s) => s.trim().to_string(),
                serde_json::Value::Number(n) => n.to_string(),
                _ => return None,
            };
            let empty = value.is_empty()
                || matches!(
                    value.to_lowercase().as_str(),
                    "null" | "none" | "unknown" | "n/a"
                );
            (!empty).then_some((field, value))
        })
        .collect()
}

fn find_json_object(response: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
    let trimmed = response.trim();
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return Some(map);
    }

    let cleaned = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned).trim();

    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(cleaned) {
        return Some(map);
    }

    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(&cleaned[start..=end]) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        _ => None,
    }
}
