use std::sync::Mutex;

use super::context::WorkflowStep;

/// Human-readable progress output. Not a machine-readable contract; the
/// structured record of a run is the `tracing` output.
pub trait ProgressReporter: Send + Sync {
    fn step_started(&self, step: WorkflowStep);

    /// One `- label: value` line for the current step.
    fn detail(&self, line: &str);

    fn step_finished(&self, _step: WorkflowStep) {}

    /// A resumed run passes over steps a checkpoint marked as done.
    fn step_skipped(&self, _step: WorkflowStep) {}
}

/// Prints `STEP n ====` banners and detail lines to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn step_started(&self, step: WorkflowStep) {
        println!("STEP {} ===================================", step.number());
    }

    fn detail(&self, line: &str) {
        println!("- {line}");
    }

    fn step_finished(&self, _step: WorkflowStep) {
        println!();
    }

    fn step_skipped(&self, step: WorkflowStep) {
        println!("STEP {} (already completed: {})", step.number(), step.description());
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn step_started(&self, _step: WorkflowStep) {}

    fn detail(&self, _line: &str) {}
}

/// Keeps every line it is given; used to assert on progress output.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    lines: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|lines| lines.clone()).unwrap_or_default()
    }

    fn push(&self, line: String) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }
}

impl ProgressReporter for RecordingReporter {
    fn step_started(&self, step: WorkflowStep) {
        self.push(format!("STEP {}", step.number()));
    }

    fn detail(&self, line: &str) {
        self.push(format!("- {line}"));
    }

    fn step_skipped(&self, step: WorkflowStep) {
        self.push(format!("SKIP {}", step.number()));
    }
}
