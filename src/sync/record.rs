// src/sync/record.rs

//! Answer records and their device-local encoding.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version written into every locally cached answer.
pub const CACHE_RECORD_VERSION: u64 = 1;

/// One copy of an answer: its text and when it was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampedValue {
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

impl StampedValue {
    pub fn new(value: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            updated_at,
        }
    }
}

/// Who is answering and in which lesson/test. A missing subject means
/// nobody is signed in and answers stay on this device only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnswerScope {
    pub content_id: String,
    pub subject_id: Option<String>,
}

impl AnswerScope {
    pub fn new(content_id: impl Into<String>, subject_id: Option<String>) -> Self {
        Self {
            content_id: content_id.into(),
            subject_id,
        }
    }

    pub fn cache_key(&self, question_id: &str) -> String {
        format!(
            "answers:v{}:{}:{}:{}",
            CACHE_RECORD_VERSION,
            self.subject_id.as_deref().unwrap_or("anon"),
            self.content_id,
            question_id
        )
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct CachedAnswerV1 {
    v: u64,
    value: String,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheDecodeError {
    Malformed(String),
    UnsupportedVersion(u64),
}

impl fmt::Display for CacheDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheDecodeError::Malformed(msg) => write!(f, "malformed cached answer: {}", msg),
            CacheDecodeError::UnsupportedVersion(v) => {
                write!(f, "cached answer has unsupported version {}", v)
            }
        }
    }
}

impl std::error::Error for CacheDecodeError {}

pub fn encode(answer: &StampedValue) -> Result<String, serde_json::Error> {
    let record = CachedAnswerV1 {
        v: CACHE_RECORD_VERSION,
        value: answer.value.clone(),
        updated_at: answer.updated_at,
    };
    serde_json::to_string(&record)
}

pub fn decode(raw: &str) -> Result<StampedValue, CacheDecodeError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| CacheDecodeError::Malformed(e.to_string()))?;

    let version = value
        .get("v")
        .and_then(Value::as_u64)
        .ok_or_else(|| CacheDecodeError::Malformed("missing version".to_string()))?;
    if version != CACHE_RECORD_VERSION {
        return Err(CacheDecodeError::UnsupportedVersion(version));
    }

    let record: CachedAnswerV1 =
        serde_json::from_value(value).map_err(|e| CacheDecodeError::Malformed(e.to_string()))?;
    Ok(StampedValue {
        value: record.value,
        updated_at: record.updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn decode_reads_what_encode_writes() {
        let answer = StampedValue::new("42", ts(1_700_000_000));
        assert_eq!(decode(&encode(&answer).unwrap()).unwrap(), answer);
    }

    #[test]
    fn decode_rejects_unversioned_blobs() {
        // Shape written by older builds: no version, different field names.
        let err = decode(r#"{"value":"x","updated_at":"2024-01-01T00:00:00Z"}"#).unwrap_err();
        assert!(matches!(err, CacheDecodeError::Malformed(_)));
    }

    #[test]
    fn decode_rejects_future_versions_and_unknown_fields() {
        let future = r#"{"v":2,"value":"x","updated_at":"2024-01-01T00:00:00Z"}"#;
        assert_eq!(decode(future), Err(CacheDecodeError::UnsupportedVersion(2)));

        let extra = r#"{"v":1,"value":"x","updated_at":"2024-01-01T00:00:00Z","mood":"ok"}"#;
        assert!(matches!(decode(extra), Err(CacheDecodeError::Malformed(_))));
    }

    #[test]
    fn cache_key_separates_subjects() {
        let kid = AnswerScope::new("lesson-69", Some("kid-1".to_string()));
        let anon = AnswerScope::new("lesson-69", None);

        assert_eq!(kid.cache_key("q1"), "answers:v1:kid-1:lesson-69:q1");
        assert_eq!(anon.cache_key("q1"), "answers:v1:anon:lesson-69:q1");
    }
}
