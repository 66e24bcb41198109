use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct EvalMetrics {
    pub runs_total: AtomicU64,
    pub batches_total: AtomicU64,
    pub batches_active: AtomicU64,
    pub batches_submitted: AtomicU64,
    pub batches_failed: AtomicU64,
    pub datapoints_submitted: AtomicU64,
    pub datapoints_failed: AtomicU64,
    pub duration_sum_ms: AtomicU64,
}

impl EvalMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn start_run(&self) {
        self.runs_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn start_batch(&self) {
        self.batches_total.fetch_add(1, Ordering::Relaxed);
        self.batches_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn finish_batch(&self, submitted: bool, datapoints: usize, duration_ms: u64) {
        self.batches_active.fetch_sub(1, Ordering::Relaxed);
        self.duration_sum_ms.fetch_add(duration_ms, Ordering::Relaxed);
        if submitted {
            self.batches_submitted.fetch_add(1, Ordering::Relaxed);
            self.datapoints_submitted
                .fetch_add(datapoints as u64, Ordering::Relaxed);
        } else {
            self.batches_failed.fetch_add(1, Ordering::Relaxed);
            self.datapoints_failed
                .fetch_add(datapoints as u64, Ordering::Relaxed);
        }
    }

    pub fn render_prometheus(&self) -> String {
        let runs_total = self.runs_total.load(Ordering::Relaxed);
        let batches_total = self.batches_total.load(Ordering::Relaxed);
        let batches_active = self.batches_active.load(Ordering::Relaxed);
        let batches_submitted = self.batches_submitted.load(Ordering::Relaxed);
        let batches_failed = self.batches_failed.load(Ordering::Relaxed);
        let datapoints_submitted = self.datapoints_submitted.load(Ordering::Relaxed);
        let datapoints_failed = self.datapoints_failed.load(Ordering::Relaxed);
        let dur_sum = self.duration_sum_ms.load(Ordering::Relaxed);

        format!(
            "# HELP lmnr_eval_runs_total Evaluation runs started.\n\
             # TYPE lmnr_eval_runs_total counter\n\
             lmnr_eval_runs_total {}\n\
             # HELP lmnr_eval_batches_total Batches attempted.\n\
             # TYPE lmnr_eval_batches_total counter\n\
             lmnr_eval_batches_total {}\n\
             # HELP lmnr_eval_batches_active Batches currently being evaluated.\n\
             # TYPE lmnr_eval_batches_active gauge\n\
             lmnr_eval_batches_active {}\n\
             # HELP lmnr_eval_batches_submitted Batches whose results reached the server.\n\
             # TYPE lmnr_eval_batches_submitted counter\n\
             lmnr_eval_batches_submitted {}\n\
             # HELP lmnr_eval_batches_failed Batches dropped after an error.\n\
             # TYPE lmnr_eval_batches_failed counter\n\
             lmnr_eval_batches_failed {}\n\
             # HELP lmnr_eval_datapoints_submitted Result records submitted.\n\
             # TYPE lmnr_eval_datapoints_submitted counter\n\
             lmnr_eval_datapoints_submitted {}\n\
             # HELP lmnr_eval_datapoints_failed Datapoints lost with a failed batch.\n\
             # TYPE lmnr_eval_datapoints_failed counter\n\
             lmnr_eval_datapoints_failed {}\n\
             # HELP lmnr_eval_batch_duration_ms_sum Sum of batch durations in ms.\n\
             # TYPE lmnr_eval_batch_duration_ms_sum counter\n\
             lmnr_eval_batch_duration_ms_sum {}\n",
            runs_total,
            batches_total,
            batches_active,
            batches_submitted,
            batches_failed,
            datapoints_submitted,
            datapoints_failed,
            dur_sum
        )
    }
}
