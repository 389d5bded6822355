use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;

/// Outcome published to observers of a state holder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    pub reason: String,
    pub data: Option<Map<String, Value>>,
}

impl OperationResult {
    pub fn ok(reason: impl Into<String>) -> Self {
        Self {
            success: true,
            reason: reason.into(),
            data: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: reason.into(),
            data: None,
        }
    }

    pub fn from_error(context: &str, err: &AppError) -> Self {
        Self::failed(format!("{context}: {err}"))
    }

    pub fn with_data(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value.into());
        self
    }

    pub fn data_value(&self, key: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|data| data.get(key))
    }

    pub fn trip_id(&self) -> Option<i64> {
        self.data_value("tripId").and_then(Value::as_i64)
    }
}
