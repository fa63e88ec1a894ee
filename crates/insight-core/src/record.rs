// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One raw entity record as delivered by the upstream pipeline.
///
/// Fields are a free-form JSON document; extractors read the fields they
/// know about and ignore the rest. A missing field routes the record through
/// the missing-value handling path rather than failing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style field insertion, mainly for tests and fixtures.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Numeric accessor; accepts integers and floats, rejects NaN.
    pub fn f64_field(&self, key: &str) -> Option<f64> {
        self.fields
            .get(key)
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
    }

    pub fn bool_field(&self, key: &str) -> Option<bool> {
        self.fields.get(key).and_then(Value::as_bool)
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::Record;
    use serde_json::json;

    #[test]
    fn typed_accessors_read_expected_fields() {
        let record = Record::new("lead-1")
            .with("email", "ana@example.com")
            .with("open_rate", 0.42)
            .with("employee_count", 250)
            .with("verified", true);

        assert_eq!(record.str_field("email"), Some("ana@example.com"));
        assert_eq!(record.f64_field("open_rate"), Some(0.42));
        assert_eq!(record.f64_field("employee_count"), Some(250.0));
        assert_eq!(record.bool_field("verified"), Some(true));
    }

    #[test]
    fn missing_and_mistyped_fields_return_none() {
        let record = Record::new("lead-2").with("email", "x@example.com");
        assert_eq!(record.f64_field("open_rate"), None);
        assert_eq!(record.str_field("absent"), None);
        assert_eq!(record.bool_field("email"), None);
    }

    #[test]
    fn non_finite_numbers_are_treated_as_missing() {
        let mut record = Record::new("lead-3");
        record.fields.insert("ratio".to_string(), json!(f64::NAN));
        assert_eq!(record.f64_field("ratio"), None);
    }
}
