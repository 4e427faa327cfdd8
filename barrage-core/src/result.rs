use crate::CALL_TIMEOUT_ERROR;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DurationNanoSeconds};
use std::time::Duration;
use time::OffsetDateTime;

/// Outcome of one unit of work performed by a gun or an instance.
///
/// The bucket a result lands in is decided solely by `error`: an empty string is a success,
/// anything else is a failure. `duration` is always stamped by the generator when the result
/// is accounted, so implementations may leave it at zero. A result without a payload carries
/// `Value::Null`, which is left out of the encoded form.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallResult {
    #[serde(default, skip_serializing_if = "is_false")]
    pub failed: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub timeout: bool,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    #[serde(default)]
    pub duration: Duration,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub started_at: Option<OffsetDateTime>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub finished_at: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl CallResult {
    pub fn ok(data: impl Into<Value>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            failed: true,
            error: error.into(),
            ..Default::default()
        }
    }

    /// The result the generator records when a call does not return within `call_timeout`.
    pub fn timed_out() -> Self {
        Self {
            timeout: true,
            error: CALL_TIMEOUT_ERROR.to_string(),
            ..Default::default()
        }
    }

    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = data.into();
        self
    }

    pub fn started_now(mut self) -> Self {
        self.started_at = Some(OffsetDateTime::now_utc());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_empty()
    }
}

fn is_false(v: &bool) -> bool {
    !*v
}
