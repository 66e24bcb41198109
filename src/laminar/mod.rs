pub mod client;
pub mod types;

pub use client::LaminarClient;
pub use types::{NodeOutput, PipelineRunRequest, PipelineRunResponse, RunHandle, UpdatedRun};
