use serde::{Deserialize, Serialize};

use super::{Classification, MatchResult};

pub const STATUS_OK: &str = "ok";
pub const STATUS_ERROR: &str = "error";

/// One query embedding sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequest {
    pub vector: Vec<f32>,
    /// Overrides the backend's configured result count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireMatch {
    pub rank: u32,
    pub label: String,
    pub similarity: f64,
    pub path: String,
}

impl From<MatchResult> for WireMatch {
    fn from(result: MatchResult) -> Self {
        Self {
            rank: result.rank,
            label: result.label,
            similarity: result.similarity_score,
            path: result.source_path,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchResponse {
    pub status: String,
    pub result: Vec<WireMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MatchResponse {
    pub fn ok(results: Vec<MatchResult>, classification: Option<Classification>) -> Self {
        Self {
            status: STATUS_OK.into(),
            result: results.into_iter().map(WireMatch::from).collect(),
            classification,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_ERROR.into(),
            result: Vec::new(),
            classification: None,
            error: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_uses_short_field_names() {
        let response = MatchResponse::ok(
            vec![MatchResult {
                rank: 1,
                label: "library".into(),
                similarity_score: 0.5,
                source_path: "refs/library/1.jpg".into(),
            }],
            None,
        );

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "status": "ok",
                "result": [
                    {"rank": 1, "label": "library", "similarity": 0.5, "path": "refs/library/1.jpg"}
                ]
            })
        );
    }

    #[test]
    fn error_response_has_empty_result() {
        let value = serde_json::to_value(MatchResponse::error("bad vector")).unwrap();
        assert_eq!(
            value,
            json!({"status": "error", "result": [], "error": "bad vector"})
        );
    }

    #[test]
    fn request_top_k_is_optional() {
        let request: MatchRequest = serde_json::from_str(r#"{"vector": [0.5, 1.0]}"#).unwrap();
        assert_eq!(request.vector, vec![0.5, 1.0]);
        assert_eq!(request.top_k, None);

        let request: MatchRequest =
            serde_json::from_str(r#"{"vector": [], "topK": 3}"#).unwrap();
        assert_eq!(request.top_k, Some(3));
    }
}
