use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PayloadError {
    #[error("step payload must be a JSON object")]
    NotAnObject,
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Free-form answers recorded against a step.
///
/// Payloads are JSON objects. Patches are merged shallowly: each top-level
/// field in the patch replaces the field of the same name, and fields the
/// patch does not mention are kept.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepPayload(Map<String, Value>);

impl StepPayload {
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wrap an arbitrary JSON value.
    ///
    /// # Errors
    ///
    /// Returns `PayloadError::NotAnObject` for anything but a JSON object.
    pub fn from_value(value: Value) -> Result<Self, PayloadError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(PayloadError::NotAnObject),
        }
    }

    /// Serialize a typed step payload into its JSON form.
    ///
    /// # Errors
    ///
    /// Returns `PayloadError` if serialization fails or does not produce an object.
    pub fn from_typed<T: Serialize>(value: &T) -> Result<Self, PayloadError> {
        Self::from_value(serde_json::to_value(value)?)
    }

    /// Decode this payload into a typed step payload.
    ///
    /// # Errors
    ///
    /// Returns `PayloadError::Json` if the fields do not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, PayloadError> {
        Ok(serde_json::from_value(Value::Object(self.0.clone()))?)
    }

    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Shallow merge: last write wins per top-level field.
    pub fn merge(&mut self, patch: &StepPayload) {
        for (field, value) in &patch.0 {
            self.0.insert(field.clone(), value.clone());
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for StepPayload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_keeps_fields_from_both_patches() {
        let mut payload = StepPayload::new();
        payload.merge(&StepPayload::new().with("a", 1));
        payload.merge(&StepPayload::new().with("b", 2));

        assert_eq!(payload.get("a"), Some(&json!(1)));
        assert_eq!(payload.get("b"), Some(&json!(2)));
    }

    #[test]
    fn merge_is_shallow_and_last_write_wins() {
        let mut payload = StepPayload::from_value(json!({"answers": {"q1": "x"}, "n": 1})).unwrap();
        payload.merge(&StepPayload::from_value(json!({"answers": {"q2": "y"}})).unwrap());

        assert_eq!(payload.get("answers"), Some(&json!({"q2": "y"})));
        assert_eq!(payload.get("n"), Some(&json!(1)));
    }

    #[test]
    fn non_object_values_are_rejected() {
        assert!(matches!(
            StepPayload::from_value(json!([1, 2])),
            Err(PayloadError::NotAnObject)
        ));
    }

    #[test]
    fn typed_payload_decodes_with_defaults() {
        #[derive(Debug, Default, Deserialize, PartialEq)]
        #[serde(default)]
        struct Slice {
            slides_viewed: u32,
            note: Option<String>,
        }

        let decoded: Slice = StepPayload::new().decode().unwrap();
        assert_eq!(decoded, Slice::default());

        let decoded: Slice = StepPayload::new().with("slides_viewed", 4).decode().unwrap();
        assert_eq!(decoded.slides_viewed, 4);
    }
}
