pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod laminar;
pub mod metrics;
pub mod trace;

pub use config::Config;
pub use dataset::{
    datapoints_from_records, load_datapoints, DatasetError, EvaluationDatapoint, EvaluationDataset,
};
pub use error::{Error, Result};
pub use evaluation::{
    blocking_evaluator, blocking_executor, evaluator_fn, executor_fn, Evaluation,
    EvaluationResultDatapoint, Evaluator, ExactMatch, Executor, ReportingSink, RunSummary, Score,
    Scores,
};
pub use laminar::{LaminarClient, RunHandle};
pub use metrics::EvalMetrics;
