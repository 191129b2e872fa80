use tracing::info;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Ledger API usage counters for one process
#[derive(Debug, Default)]
pub struct LedgerApiMetrics {
    pub submissions: AtomicU64,
    pub receipts: AtomicU64,
    pub queries: AtomicU64,
    pub failures: AtomicU64,
}

impl LedgerApiMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submission(&self) {
        self.submissions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_receipt(&self) {
        self.receipts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    /// Rejected submissions, failed receipt fetches and non-success receipts.
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> LedgerApiStats {
        LedgerApiStats {
            submissions: self.submissions.load(Ordering::Relaxed),
            receipts: self.receipts.load(Ordering::Relaxed),
            queries: self.queries.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            submissions = stats.submissions,
            receipts = stats.receipts,
            queries = stats.queries,
            failures = stats.failures,
            "Ledger API metrics"
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerApiStats {
    pub submissions: u64,
    pub receipts: u64,
    pub queries: u64,
    pub failures: u64,
}

/// Global metrics instance
static LEDGER_METRICS: std::sync::LazyLock<LedgerApiMetrics> =
    std::sync::LazyLock::new(LedgerApiMetrics::new);

pub fn ledger_metrics() -> &'static LedgerApiMetrics {
    &LEDGER_METRICS
}

/// Span wrapping one workflow run; every step event carries the correlation id
pub fn create_workflow_span(workflow: &str, correlation_id: &str) -> tracing::Span {
    tracing::info_span!(
        "workflow",
        workflow.name = workflow,
        correlation.id = correlation_id,
        otel.kind = "internal"
    )
}

/// Time an operation and log its duration when finished
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        info!(
            operation = %self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_counters() {
        let metrics = LedgerApiMetrics::new();
        metrics.record_submission();
        metrics.record_submission();
        metrics.record_receipt();
        metrics.record_query();
        metrics.record_failure();

        assert_eq!(
            metrics.get_stats(),
            LedgerApiStats {
                submissions: 2,
                receipts: 1,
                queries: 1,
                failures: 1,
            }
        );
    }
}
