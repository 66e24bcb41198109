use anyhow::{anyhow, Context};
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info};

use super::callable::{Evaluator, Executor};
use super::registry::EvaluatorRegistry;
use super::score::{EvaluationResultDatapoint, Scores};
use super::sink::{ReportingSink, RUN_STATUS_FINISHED};
use crate::config::{Config, DEFAULT_BATCH_SIZE};
use crate::dataset::{datapoints_from_records, EvaluationDatapoint, EvaluationDataset};
use crate::error::{Error, Result};
use crate::laminar::{LaminarClient, RunHandle};
use crate::metrics::EvalMetrics;

enum DataSource {
    Dataset(Arc<dyn EvaluationDataset>),
    Records(Vec<Value>),
}

pub struct EvaluationBuilder {
    name: String,
    executor: Arc<dyn Executor>,
    data: Option<DataSource>,
    evaluators: Vec<Arc<dyn Evaluator>>,
    batch_size: Option<usize>,
    sink: Option<Arc<dyn ReportingSink>>,
    config: Option<Config>,
    metrics: Option<Arc<EvalMetrics>>,
}

impl EvaluationBuilder {
    pub fn with_dataset(mut self, dataset: impl EvaluationDataset + 'static) -> Self {
        self.data = Some(DataSource::Dataset(Arc::new(dataset)));
        self
    }

    pub fn with_shared_dataset(mut self, dataset: Arc<dyn EvaluationDataset>) -> Self {
        self.data = Some(DataSource::Dataset(dataset));
        self
    }

    pub fn with_records(mut self, records: Vec<Value>) -> Self {
        self.data = Some(DataSource::Records(records));
        self
    }

    pub fn with_evaluator(mut self, evaluator: impl Evaluator + 'static) -> Self {
        self.evaluators.push(Arc::new(evaluator));
        self
    }

    pub fn with_evaluators(mut self, evaluators: impl IntoIterator<Item = Arc<dyn Evaluator>>) -> Self {
        self.evaluators.extend(evaluators);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ReportingSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<EvalMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    // Sink is resolved before the records are coerced.
    pub fn build(self) -> Result<Evaluation> {
        let batch_size = self
            .batch_size
            .or_else(|| self.config.as_ref().map(|c| c.batch_size))
            .unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            return Err(Error::Configuration("batch size must be at least 1".into()));
        }

        let sink: Arc<dyn ReportingSink> = match (self.sink, self.config) {
            (Some(sink), _) => sink,
            (None, Some(config)) => Arc::new(LaminarClient::new(&config)?),
            (None, None) => Arc::new(LaminarClient::new(&Config::from_env()?)?),
        };

        let dataset: Arc<dyn EvaluationDataset> = match self.data {
            Some(DataSource::Dataset(dataset)) => dataset,
            Some(DataSource::Records(records)) => Arc::new(datapoints_from_records(records)?),
            None => {
                return Err(Error::Configuration(format!(
                    "evaluation '{}' has no dataset",
                    self.name
                )))
            }
        };

        Ok(Evaluation {
            name: self.name,
            dataset,
            executor: self.executor,
            evaluators: Arc::new(self.evaluators.into_iter().collect()),
            batch_size,
            sink,
            metrics: self.metrics.unwrap_or_else(EvalMetrics::new),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run: RunHandle,
    pub batches_total: usize,
    pub batches_submitted: usize,
    pub batches_failed: usize,
    pub datapoints_submitted: usize,
    pub status_updated: bool,
    pub duration_ms: u64,
}

impl RunSummary {
    fn new(run: RunHandle) -> Self {
        Self {
            run,
            batches_total: 0,
            batches_submitted: 0,
            batches_failed: 0,
            datapoints_submitted: 0,
            status_updated: false,
            duration_ms: 0,
        }
    }

    pub fn all_batches_submitted(&self) -> bool {
        self.batches_failed == 0
    }
}

pub struct Evaluation {
    name: String,
    dataset: Arc<dyn EvaluationDataset>,
    executor: Arc<dyn Executor>,
    evaluators: Arc<EvaluatorRegistry>,
    batch_size: usize,
    sink: Arc<dyn ReportingSink>,
    metrics: Arc<EvalMetrics>,
}

impl Evaluation {
    pub fn builder(name: impl Into<String>, executor: impl Executor + 'static) -> EvaluationBuilder {
        EvaluationBuilder {
            name: name.into(),
            executor: Arc::new(executor),
            data: None,
            evaluators: Vec::new(),
            batch_size: None,
            sink: None,
            config: None,
            metrics: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn evaluator_names(&self) -> Vec<&str> {
        self.evaluators.names()
    }

    pub fn metrics(&self) -> &Arc<EvalMetrics> {
        &self.metrics
    }

    /// Only a failure to create the run is returned as an error; failed
    /// batches and a failed status update are logged.
    pub async fn run(&self) -> Result<RunSummary> {
        let run = self.sink.create_run(&self.name).await?;
        let total = self.dataset.len();
        let started = Instant::now();
        self.metrics.start_run();

        info!(
            run_id = %run.id,
            run_name = %run.name,
            datapoints = total,
            batch_size = self.batch_size,
            evaluators = ?self.evaluators.names(),
            "Starting evaluation"
        );

        let mut summary = RunSummary::new(run.clone());

        for (index, start) in (0..total).step_by(self.batch_size).enumerate() {
            let end = start.saturating_add(self.batch_size).min(total);
            let batch_started = Instant::now();
            summary.batches_total += 1;
            self.metrics.start_batch();

            let result = self.evaluate_batch(&run, start, end).await;
            let duration_ms = batch_started.elapsed().as_millis() as u64;

            match result {
                Ok(submitted) => {
                    debug!(
                        run_id = %run.id,
                        batch = index,
                        records = submitted,
                        duration_ms = duration_ms,
                        "Batch submitted"
                    );
                    summary.batches_submitted += 1;
                    summary.datapoints_submitted += submitted;
                    self.metrics.finish_batch(true, submitted, duration_ms);
                }
                Err(source) => {
                    let err = Error::Batch { index, source };
                    error!(
                        run_id = %run.id,
                        batch = index,
                        start = start,
                        end = end,
                        "Error evaluating batch: {}",
                        err
                    );
                    summary.batches_failed += 1;
                    self.metrics.finish_batch(false, end - start, duration_ms);
                }
            }
        }

        match self.sink.update_run_status(&run.id, RUN_STATUS_FINISHED).await {
            Ok(_) => {
                summary.status_updated = true;
                info!(
                    run_id = %run.id,
                    submitted = summary.batches_submitted,
                    failed = summary.batches_failed,
                    "Evaluation {} complete",
                    run.id
                );
            }
            Err(e) => {
                let err = Error::StatusUpdate {
                    run_id: run.id.clone(),
                    source: Box::new(e),
                };
                error!(run_id = %run.id, "Error updating evaluation status: {}", err);
            }
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        Ok(summary)
    }

    pub async fn evaluate_datapoint(
        &self,
        datapoint: EvaluationDatapoint,
    ) -> anyhow::Result<EvaluationResultDatapoint> {
        evaluate_datapoint(self.executor.as_ref(), &self.evaluators, datapoint).await
    }

    // First failing datapoint fails the batch; dropping the set aborts the rest.
    async fn evaluate_batch(&self, run: &RunHandle, start: usize, end: usize) -> anyhow::Result<usize> {
        let batch = self
            .dataset
            .slice(to_i64(start), to_i64(end))
            .context("failed to read batch from dataset")?;
        let count = batch.len();

        let mut tasks = JoinSet::new();
        let mut offsets = HashMap::with_capacity(count);
        for (offset, datapoint) in batch.into_iter().enumerate() {
            let executor = Arc::clone(&self.executor);
            let evaluators = Arc::clone(&self.evaluators);
            let handle = tasks.spawn(async move {
                let result = evaluate_datapoint(executor.as_ref(), &evaluators, datapoint).await;
                (offset, result)
            });
            offsets.insert(handle.id(), offset);
        }

        let mut records: Vec<Option<EvaluationResultDatapoint>> = vec![None; count];
        while let Some(joined) = tasks.join_next().await {
            let (offset, result) = joined.map_err(|e| {
                let index = offsets.get(&e.id()).map(|offset| start + offset);
                join_failure(e, index)
            })?;
            let record = result.with_context(|| format!("datapoint {} failed", start + offset))?;
            records[offset] = Some(record);
        }
        let records: Vec<EvaluationResultDatapoint> = records.into_iter().flatten().collect();

        self.sink
            .post_batch_results(&run.id, &records)
            .await
            .context("failed to submit batch results")?;
        Ok(records.len())
    }
}

async fn evaluate_datapoint(
    executor: &dyn Executor,
    evaluators: &EvaluatorRegistry,
    datapoint: EvaluationDatapoint,
) -> anyhow::Result<EvaluationResultDatapoint> {
    let output = executor
        .execute(&datapoint.data)
        .await
        .context("executor failed")?;

    let mut scores = Scores::new();
    for entry in evaluators.iter() {
        let score = entry
            .evaluator
            .evaluate(&output, &datapoint.target)
            .await
            .with_context(|| format!("evaluator '{}' failed", entry.name))?;
        score.merge_into(&entry.name, &mut scores);
    }

    Ok(EvaluationResultDatapoint {
        executor_output: output,
        data: datapoint.data,
        target: datapoint.target,
        scores,
    })
}

fn join_failure(err: JoinError, index: Option<usize>) -> anyhow::Error {
    let task = match index {
        Some(i) => format!("datapoint {}", i),
        None => "datapoint task".to_string(),
    };
    if err.is_panic() {
        let payload = err.into_panic();
        anyhow!("{} panicked: {}", task, panic_message(&*payload))
    } else {
        anyhow!("{} cancelled", task)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "non-string panic payload"
    }
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
