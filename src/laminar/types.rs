use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::evaluation::EvaluationResultDatapoint;
use crate::trace::TraceRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunHandle {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl RunHandle {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: None,
            project_id: None,
            created_at: None,
            metadata: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdatedRun {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateRunBody<'a> {
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PostResultsBody<'a> {
    pub evaluation_id: &'a str,
    pub points: &'a [EvaluationResultDatapoint],
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateStatusBody<'a> {
    pub status: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct TracesBody<'a> {
    pub traces: &'a [TraceRecord],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunRequest {
    pub pipeline: String,
    pub inputs: HashMap<String, Value>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub parent_span_id: Option<Uuid>,
    #[serde(default)]
    pub trace_id: Option<Uuid>,
}

impl PipelineRunRequest {
    pub fn new(pipeline: impl Into<String>) -> Self {
        Self {
            pipeline: pipeline.into(),
            inputs: HashMap::new(),
            env: HashMap::new(),
            metadata: HashMap::new(),
            parent_span_id: None,
            trace_id: None,
        }
    }

    pub fn with_input(mut self, node: impl Into<String>, value: Value) -> Self {
        self.inputs.insert(node.into(), value);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_parent(mut self, trace_id: Uuid, parent_span_id: Uuid) -> Self {
        self.trace_id = Some(trace_id);
        self.parent_span_id = Some(parent_span_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunResponse {
    pub outputs: HashMap<String, NodeOutput>,
    #[serde(alias = "run_id")]
    pub run_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_run_handle_deserialize_minimal_and_full() {
        let minimal: RunHandle =
            serde_json::from_value(json!({ "id": "e-1", "name": "nightly" })).unwrap();
        assert_eq!(minimal, RunHandle::new("e-1", "nightly"));

        let full: RunHandle = serde_json::from_value(json!({
            "id": "0c8d1f7e-5a2b-4a3e-9b6e-2f1c3d4e5f60",
            "name": "nightly",
            "status": "Started",
            "projectId": "p-9",
            "createdAt": "2024-09-01T12:00:00Z",
            "metadata": null
        }))
        .unwrap();
        assert_eq!(full.status.as_deref(), Some("Started"));
        assert_eq!(full.project_id.as_deref(), Some("p-9"));
        assert!(full.created_at.is_some());
    }

    #[test]
    fn test_updated_run_keeps_extra_fields() {
        let updated: UpdatedRun = serde_json::from_value(json!({
            "id": "e-1",
            "status": "Finished",
            "stats": { "averageScores": { "exact": 0.5 } }
        }))
        .unwrap();
        assert_eq!(updated.status.as_deref(), Some("Finished"));
        assert!(updated.extra.contains_key("stats"));
    }

    #[test]
    fn test_pipeline_request_camel_case() {
        let trace = Uuid::new_v4();
        let parent = Uuid::new_v4();
        let req = PipelineRunRequest::new("summarizer")
            .with_input("text", json!("hello"))
            .with_metadata("user", "u-1")
            .with_parent(trace, parent);
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["pipeline"], "summarizer");
        assert_eq!(value["inputs"]["text"], "hello");
        assert_eq!(value["traceId"], json!(trace.to_string()));
        assert_eq!(value["parentSpanId"], json!(parent.to_string()));
    }

    #[test]
    fn test_pipeline_response_accepts_both_key_styles() {
        let camel: PipelineRunResponse = serde_json::from_value(json!({
            "outputs": { "output": { "value": "done" } },
            "runId": "r-1"
        }))
        .unwrap();
        let snake: PipelineRunResponse = serde_json::from_value(json!({
            "outputs": {},
            "run_id": "r-2"
        }))
        .unwrap();
        assert_eq!(camel.run_id, "r-1");
        assert_eq!(camel.outputs["output"].value, json!("done"));
        assert_eq!(snake.run_id, "r-2");
    }
}
