pub mod callable;
pub mod registry;
pub mod runner;
pub mod score;
pub mod sink;

pub use callable::{
    blocking_evaluator, blocking_executor, evaluator_fn, executor_fn, Evaluator, ExactMatch,
    Executor,
};
pub use registry::{EvaluatorRegistry, NamedEvaluator};
pub use runner::{Evaluation, EvaluationBuilder, RunSummary};
pub use score::{EvaluationResultDatapoint, Score, Scores};
pub use sink::{ReportingSink, RUN_STATUS_FINISHED};
