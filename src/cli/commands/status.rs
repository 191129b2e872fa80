use anyhow::Result;

use super::checkpoint_path;
use crate::config::ProvisionerConfig;
use crate::workflow::{Checkpoint, CheckpointStore, WorkflowStep};

pub struct StatusCommand {
    pub checkpoint: Option<String>,
    config: ProvisionerConfig,
}

impl StatusCommand {
    pub fn new(config: ProvisionerConfig) -> Self {
        Self {
            checkpoint: None,
            config,
        }
    }

    pub fn with_checkpoint(mut self, checkpoint: Option<String>) -> Self {
        self.checkpoint = checkpoint;
        self
    }

    pub async fn execute(&self) -> Result<()> {
        let path = checkpoint_path(self.checkpoint.as_deref(), &self.config)?;
        let checkpoint = CheckpointStore::new(&path).load().await?;

        for line in render(&checkpoint) {
            println!("{line}");
        }
        Ok(())
    }
}

fn render(checkpoint: &Checkpoint) -> Vec<String> {
    let metadata = &checkpoint.metadata;
    let context = &checkpoint.context;
    let mut lines = vec![
        "📋 PROVISIONING CHECKPOINT".to_string(),
        "==========================".to_string(),
        format!("   Checkpoint: {}", metadata.checkpoint_id),
        format!("   Network:    {}", metadata.network),
        format!("   Saved at:   {} on {}", metadata.saved_at.to_rfc3339(), metadata.hostname),
        format!("   Run:        {}", metadata.correlation_id),
        String::new(),
        "🔧 STEPS:".to_string(),
    ];

    for step in WorkflowStep::ALL {
        let marker = if context.is_completed(step) { "✅" } else { "⏳" };
        lines.push(format!("   {marker} {}. {}", step.number(), step.description()));
    }

    lines.push(String::new());
    lines.push("📦 OUTPUTS:".to_string());
    let outputs = [
        ("Token", context.token_id.map(|id| id.to_string())),
        ("Bytecode file", context.bytecode_file_id.map(|id| id.to_string())),
        ("Contract", context.contract_id.map(|id| id.to_string())),
        ("Supply key", context.supply_key_after.as_ref().map(|key| key.to_string())),
        ("Total supply", context.total_supply.map(|supply| supply.to_string())),
    ];
    for (label, value) in outputs {
        if let Some(value) = value {
            lines.push(format!("   {label}: {value}"));
        }
    }
    lines.push(format!("   Transactions: {}", context.transactions.len()));

    match context.next_step() {
        Some(step) => lines.push(format!("\n👉 Next: {} ({})", step, step.description())),
        None => lines.push("\n🎉 All steps completed".to_string()),
    }
    lines
}
