use async_trait::async_trait;

use super::score::EvaluationResultDatapoint;
use crate::error::Result;
use crate::laminar::types::{RunHandle, UpdatedRun};

pub const RUN_STATUS_FINISHED: &str = "Finished";

#[async_trait]
pub trait ReportingSink: Send + Sync {
    /// Creating a run whose name already exists appends to it server-side.
    async fn create_run(&self, name: &str) -> Result<RunHandle>;

    async fn post_batch_results(
        &self,
        run_id: &str,
        records: &[EvaluationResultDatapoint],
    ) -> Result<()>;

    async fn update_run_status(&self, run_id: &str, status: &str) -> Result<UpdatedRun>;
}
