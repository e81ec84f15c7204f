use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status reported by the image-prediction service. `canceled` counts as
/// failed; anything else (`starting`, `processing`, ...) is still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum PredictionStatus {
    Pending,
    Succeeded,
    Failed,
}

impl From<String> for PredictionStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "succeeded" => PredictionStatus::Succeeded,
            "failed" | "canceled" => PredictionStatus::Failed,
            _ => PredictionStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionJob {
    pub id: String,
    pub status: PredictionStatus,
    pub output: Vec<String>,
    pub error: Option<String>,
}

impl PredictionJob {
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: PredictionStatus::Pending,
            output: Vec::new(),
            error: None,
        }
    }

    pub fn succeeded(id: impl Into<String>, output: Vec<String>) -> Self {
        Self {
            id: id.into(),
            status: PredictionStatus::Succeeded,
            output,
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: PredictionStatus::Failed,
            output: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Wire shape of a prediction as returned by both the submit and the status
/// calls.
#[derive(Debug, Deserialize)]
pub struct PredictionResponse {
    #[serde(default)]
    pub id: String,
    pub status: PredictionStatus,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl From<PredictionResponse> for PredictionJob {
    fn from(response: PredictionResponse) -> Self {
        // Some models return a single URL rather than a list.
        let output = match response.output {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(url)) => vec![url],
            _ => Vec::new(),
        };

        let error = match response.error {
            Some(Value::Null) | None => None,
            Some(Value::String(detail)) => Some(detail),
            Some(other) => Some(other.to_string()),
        };

        PredictionJob {
            id: response.id,
            status: response.status,
            output,
            error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PredictionInput {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatePredictionRequest {
    pub version: String,
    pub input: PredictionInput,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_status_is_pending() {
        let response: PredictionResponse =
            serde_json::from_value(json!({"id": "p1", "status": "processing"})).unwrap();
        let job = PredictionJob::from(response);

        assert_eq!(job.status, PredictionStatus::Pending);
    }

    #[test]
    fn test_canceled_is_a_failure() {
        let response: PredictionResponse = serde_json::from_value(json!({
            "id": "p1",
            "status": "canceled",
            "error": null
        }))
        .unwrap();
        let job = PredictionJob::from(response);

        assert_eq!(job.status, PredictionStatus::Failed);
    }

    #[test]
    fn test_output_as_list_or_single_url() {
        let list: PredictionResponse = serde_json::from_value(json!({
            "id": "p1",
            "status": "succeeded",
            "output": ["http://img/1.png", "http://img/2.png"]
        }))
        .unwrap();
        assert_eq!(PredictionJob::from(list).output[0], "http://img/1.png");

        let single: PredictionResponse = serde_json::from_value(json!({
            "id": "p2",
            "status": "succeeded",
            "output": "http://img/only.png"
        }))
        .unwrap();
        assert_eq!(PredictionJob::from(single).output, vec!["http://img/only.png"]);
    }

    #[test]
    fn test_failed_error_detail() {
        let response: PredictionResponse = serde_json::from_value(json!({
            "id": "p3",
            "status": "failed",
            "error": "NSFW content detected"
        }))
        .unwrap();
        let job = PredictionJob::from(response);

        assert_eq!(job.status, PredictionStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("NSFW content detected"));
    }
}
