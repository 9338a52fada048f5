//! Remote analysis request and the validated result payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RemoteAnalysisError;

/// Body sent to the remote analysis backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl AnalysisRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Accepted analysis payload.
///
/// Required: `matchScore` (0–100), `findings` and `sources` arrays.
/// Any other `*Score` field and `confidence` must also lie within 0–100.
/// Unknown fields are preserved in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub match_score: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub findings: Vec<Value>,
    pub sources: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AnalysisResult {
    /// Validate an untrusted payload from the remote backend.
    pub fn from_payload(payload: Value) -> Result<Self, RemoteAnalysisError> {
        let Value::Object(object) = payload else {
            return Err(malformed("payload is not a JSON object"));
        };

        for (key, value) in &object {
            if key.ends_with("Score") || key == "confidence" {
                if value.is_null() && key == "confidence" {
                    continue;
                }
                score(key, value)?;
            }
        }

        if !object.contains_key("matchScore") {
            return Err(malformed("missing field `matchScore`"));
        }
        for key in ["findings", "sources"] {
            match object.get(key) {
                Some(Value::Array(_)) => {}
                Some(_) => return Err(malformed(format!("field `{key}` is not an array"))),
                None => return Err(malformed(format!("missing field `{key}`"))),
            }
        }
        if let Some(summary) = object.get("summary") {
            if !summary.is_null() && !summary.is_string() {
                return Err(malformed("field `summary` is not a string"));
            }
        }

        let mut object = object;
        for key in ["matchScore", "confidence"] {
            if let Some(value) = object.get_mut(key) {
                if let Some(n) = value.as_f64() {
                    *value = Value::from(n.round() as u64);
                }
            }
        }

        serde_json::from_value(Value::Object(object)).map_err(|e| malformed(e.to_string()))
    }
}

fn score(key: &str, value: &Value) -> Result<f64, RemoteAnalysisError> {
    let n = value
        .as_f64()
        .ok_or_else(|| malformed(format!("field `{key}` is not a number")))?;
    if !n.is_finite() || !(0.0..=100.0).contains(&n) {
        return Err(malformed(format!("field `{key}` out of range 0-100: {n}")));
    }
    Ok(n)
}

fn malformed(reason: impl Into<String>) -> RemoteAnalysisError {
    RemoteAnalysisError::MalformedResponse(reason.into())
}

/// A persisted successful result, keyed by content fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResult {
    pub fingerprint: String,
    pub result: AnalysisResult,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_well_formed_payload() {
        let result = AnalysisResult::from_payload(json!({
            "matchScore": 72,
            "confidence": 88.4,
            "skillsScore": 64,
            "summary": "Strong match",
            "findings": ["rust", {"gap": "kubernetes"}],
            "sources": ["cv.pdf"],
        }))
        .unwrap();

        assert_eq!(result.match_score, 72);
        assert_eq!(result.confidence, Some(88));
        assert_eq!(result.findings.len(), 2);
        assert_eq!(result.extra.get("skillsScore"), Some(&json!(64)));
    }

    #[test]
    fn rejects_out_of_range_scores() {
        let err = AnalysisResult::from_payload(json!({
            "matchScore": 140,
            "findings": [],
            "sources": [],
        }))
        .unwrap_err();
        assert!(matches!(err, RemoteAnalysisError::MalformedResponse(_)));

        let err = AnalysisResult::from_payload(json!({
            "matchScore": 50,
            "experienceScore": -1,
            "findings": [],
            "sources": [],
        }))
        .unwrap_err();
        assert!(err.to_string().contains("experienceScore"));
    }

    #[test]
    fn rejects_missing_or_mistyped_arrays() {
        let missing = AnalysisResult::from_payload(json!({"matchScore": 10, "findings": []}));
        assert!(missing.unwrap_err().to_string().contains("sources"));

        let mistyped = AnalysisResult::from_payload(json!({
            "matchScore": 10,
            "findings": "none",
            "sources": [],
        }));
        assert!(mistyped.unwrap_err().to_string().contains("findings"));
    }

    #[test]
    fn rejects_non_object_and_string_scores() {
        assert!(AnalysisResult::from_payload(json!([1, 2])).is_err());
        assert!(AnalysisResult::from_payload(json!({
            "matchScore": "72",
            "findings": [],
            "sources": [],
        }))
        .is_err());
    }
}
