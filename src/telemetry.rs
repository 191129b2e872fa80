use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Initialize structured logging.
///
/// Logs go to stderr so the step-by-step progress printed on stdout stays
/// readable. `RUST_LOG` overrides `log_level` when set.
pub fn init_telemetry(log_level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(log_level))?;

    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()?;

    tracing::debug!(log_level, json, "Provisioner telemetry initialized");
    Ok(())
}

/// Generate a correlation ID for linking the events of one workflow run
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Create a span for one workflow step
pub fn create_step_span(step: &str, number: usize, correlation_id: &str) -> tracing::Span {
    tracing::info_span!(
        "step",
        step.name = step,
        step.number = number,
        correlation.id = correlation_id,
        otel.kind = "internal"
    )
}

/// Shutdown telemetry gracefully
pub fn shutdown_telemetry() {
    // fmt layers flush on every event
    tracing::debug!("Provisioner telemetry shutdown complete");
}
