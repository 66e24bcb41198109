use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use super::types::{
    CreateRunBody, PipelineRunRequest, PipelineRunResponse, PostResultsBody, RunHandle,
    TracesBody, UpdateStatusBody, UpdatedRun,
};
use crate::config::Config;
use crate::error::{truncate, Error, Result};
use crate::evaluation::{EvaluationResultDatapoint, ReportingSink};
use crate::trace::TraceRecord;

#[derive(Clone)]
pub struct LaminarClient {
    client: reqwest::Client,
    base_http_url: String,
    project_api_key: String,
    env: HashMap<String, String>,
}

impl LaminarClient {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_http_url: config.http_url(),
            project_api_key: config.project_api_key.clone(),
            env: config.env.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_http_url
    }

    fn build_request<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<reqwest::Request> {
        let url = format!("{}{}", self.base_http_url, path);
        let request = self
            .client
            .post(&url)
            .bearer_auth(&self.project_api_key)
            .json(body)
            .build()?;
        Ok(request)
    }

    async fn send(&self, request: reqwest::Request) -> Result<reqwest::Response> {
        debug!("Requesting Laminar API: {} {}", request.method(), request.url());
        let resp = self.client.execute(request).await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            debug!("Laminar API returned HTTP {}: {}", status.as_u16(), truncate(&body));
            return Err(Error::api(status, &body));
        }
        Ok(resp)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.build_request(path, body)?;
        let resp = self.send(request).await?;
        let text = resp.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn create_evaluation(&self, name: &str) -> Result<RunHandle> {
        let run: RunHandle = self
            .post_json("/v1/evaluations", &CreateRunBody { name })
            .await?;
        info!(run_id = %run.id, run_name = %run.name, "Evaluation created");
        Ok(run)
    }

    pub async fn post_evaluation_results(
        &self,
        evaluation_id: &str,
        points: &[EvaluationResultDatapoint],
    ) -> Result<()> {
        let body = PostResultsBody {
            evaluation_id,
            points,
        };
        let request = self.build_request("/v1/evaluation-datapoints", &body)?;
        self.send(request).await?;
        debug!(
            run_id = %evaluation_id,
            points = points.len(),
            "Evaluation results uploaded"
        );
        Ok(())
    }

    pub async fn update_evaluation_status(
        &self,
        evaluation_id: &str,
        status: &str,
    ) -> Result<UpdatedRun> {
        let path = format!("/v1/evaluations/{}", evaluation_id);
        self.post_json(&path, &UpdateStatusBody { status }).await
    }

    pub async fn run_pipeline(&self, request: PipelineRunRequest) -> Result<PipelineRunResponse> {
        let http = self.pipeline_request(request)?;
        let resp = self.client.execute(http).await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if status != reqwest::StatusCode::OK {
            return Err(Error::PipelineRun {
                status: status.as_u16(),
                message: truncate(&body),
            });
        }
        serde_json::from_str(&body).map_err(|e| Error::PipelineRun {
            status: status.as_u16(),
            message: format!("unexpected response body: {}", e),
        })
    }

    fn pipeline_request(&self, mut request: PipelineRunRequest) -> Result<reqwest::Request> {
        if request.env.is_empty() {
            request.env = self.env.clone();
        }
        self.build_request("/v1/pipeline/run", &request)
    }

    pub async fn post_traces(&self, batch: &[TraceRecord]) -> Result<()> {
        let request = self.build_request("/v2/traces", &TracesBody { traces: batch })?;
        self.send(request).await?;
        debug!(records = batch.len(), "Trace data uploaded");
        Ok(())
    }
}

#[async_trait]
impl ReportingSink for LaminarClient {
    async fn create_run(&self, name: &str) -> Result<RunHandle> {
        self.create_evaluation(name).await
    }

    async fn post_batch_results(
        &self,
        run_id: &str,
        records: &[EvaluationResultDatapoint],
    ) -> Result<()> {
        self.post_evaluation_results(run_id, records).await
    }

    async fn update_run_status(&self, run_id: &str, status: &str) -> Result<UpdatedRun> {
        self.update_evaluation_status(run_id, status).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::Scores;
    use crate::trace::Trace;
    use serde_json::{json, Value};

    fn client() -> LaminarClient {
        let config = Config::new("test-key")
            .unwrap()
            .with_base_url("http://localhost")
            .with_http_port(8000);
        LaminarClient::new(&config).unwrap()
    }

    fn body_json(request: &reqwest::Request) -> Value {
        let bytes = request.body().and_then(|b| b.as_bytes()).unwrap();
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn test_client_rejects_invalid_config() {
        let config = Config::new("k").unwrap().with_batch_size(0);
        assert!(matches!(
            LaminarClient::new(&config),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_request_carries_auth_and_json() {
        let req = client()
            .build_request("/v1/evaluations", &CreateRunBody { name: "nightly" })
            .unwrap();
        assert_eq!(req.url().as_str(), "http://localhost:8000/v1/evaluations");
        assert_eq!(req.method(), reqwest::Method::POST);
        assert_eq!(req.headers()["authorization"], "Bearer test-key");
        assert_eq!(req.headers()["content-type"], "application/json");
        assert_eq!(body_json(&req), json!({ "name": "nightly" }));
    }

    #[test]
    fn test_results_body_shape() {
        let points = vec![EvaluationResultDatapoint {
            executor_output: json!(1),
            data: json!({ "x": 1 }),
            target: json!(1),
            scores: Scores::from([("exact_match".to_string(), 1.0)]),
        }];
        let body = PostResultsBody {
            evaluation_id: "e-1",
            points: &points,
        };
        let req = client()
            .build_request("/v1/evaluation-datapoints", &body)
            .unwrap();
        assert_eq!(
            body_json(&req),
            json!({
                "evaluationId": "e-1",
                "points": [{
                    "executorOutput": 1,
                    "data": { "x": 1 },
                    "target": 1,
                    "scores": { "exact_match": 1.0 }
                }]
            })
        );
    }

    #[test]
    fn test_traces_body_shape() {
        let trace = Trace::new();
        let batch: Vec<TraceRecord> = vec![trace.clone().into()];
        let req = client()
            .build_request("/v2/traces", &TracesBody { traces: &batch })
            .unwrap();
        assert_eq!(req.url().path(), "/v2/traces");
        assert_eq!(body_json(&req)["traces"][0]["id"], json!(trace.id.to_string()));
    }

    #[test]
    fn test_pipeline_request_uses_default_env() {
        let config = Config::new("test-key")
            .unwrap()
            .with_base_url("http://localhost")
            .with_http_port(8000)
            .with_env(HashMap::from([("OPENAI_API_KEY".to_string(), "sk-1".to_string())]));
        let client = LaminarClient::new(&config).unwrap();

        let req = client
            .pipeline_request(PipelineRunRequest::new("summarize").with_input("doc", json!("text")))
            .unwrap();
        assert_eq!(req.url().path(), "/v1/pipeline/run");
        let body = body_json(&req);
        assert_eq!(body["pipeline"], json!("summarize"));
        assert_eq!(body["inputs"]["doc"], json!("text"));
        assert_eq!(body["env"], json!({ "OPENAI_API_KEY": "sk-1" }));
        assert_eq!(body["parentSpanId"], Value::Null);

        let req = client
            .pipeline_request(PipelineRunRequest::new("summarize").with_env("OTHER", "x"))
            .unwrap();
        assert_eq!(body_json(&req)["env"], json!({ "OTHER": "x" }));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_http_error() {
        let config = Config::new("k")
            .unwrap()
            .with_base_url("http://127.0.0.1")
            .with_http_port(9)
            .with_timeout(2);
        let client = LaminarClient::new(&config).unwrap();
        let err = client.create_evaluation("x").await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }
}
