use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::field::Field;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct InsuranceInfo {
    pub primary_carrier: String,
    pub member_id: String,
    pub group_number: String,
}

impl InsuranceInfo {
    pub fn from_fields(values: &BTreeMap<Field, String>) -> Option<Self> {
        Some(Self {
            primary_carrier: values.get(&Field::PrimaryCarrier)?.clone(),
            member_id: values.get(&Field::MemberId)?.clone(),
            group_number: values.get(&Field::GroupNumber)?.clone(),
        })
    }
}
