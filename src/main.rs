use anyhow::{Context, Result};
use lmnr_eval::{executor_fn, load_datapoints, Config, Evaluation, ExactMatch};
use std::path::PathBuf;
use tracing::info;

const DEFAULT_EVAL_NAME: &str = "default";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lmnr_eval=info".parse()?),
        )
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    config.print_banner();

    let name = std::env::var("LMNR_EVAL_NAME").unwrap_or_else(|_| DEFAULT_EVAL_NAME.into());
    let dataset_path = std::env::var("LMNR_EVAL_DATASET")
        .map(PathBuf::from)
        .context("LMNR_EVAL_DATASET must point to a JSON or JSON-lines dataset file")?;

    let datapoints = load_datapoints(&dataset_path)
        .with_context(|| format!("Failed to load dataset {}", dataset_path.display()))?;
    info!(
        "Loaded {} datapoints from {}",
        datapoints.len(),
        dataset_path.display()
    );

    // Echo executor: scores how well `data` already matches `target`.
    let echo = executor_fn(|data| async move { anyhow::Ok(data) });
    let evaluation = Evaluation::builder(name, echo)
        .with_dataset(datapoints)
        .with_evaluator(ExactMatch)
        .with_config(config)
        .build()?;

    let summary = evaluation.run().await?;
    info!(
        run_id = %summary.run.id,
        batches = summary.batches_total,
        submitted = summary.batches_submitted,
        failed = summary.batches_failed,
        records = summary.datapoints_submitted,
        duration_ms = summary.duration_ms,
        "Run summary"
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    print!("{}", evaluation.metrics().render_prometheus());

    Ok(())
}
