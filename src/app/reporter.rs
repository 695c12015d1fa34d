use crate::domain::model::{StatusEvent, StepStatus};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// Renders one status event, `None` when the event has no visible output.
pub fn format_event(event: &StatusEvent, format: ReportFormat) -> Option<String> {
    match format {
        ReportFormat::Json => match serde_json::to_string(event) {
            Ok(line) => Some(line),
            Err(e) => {
                tracing::warn!("Failed to serialize status event: {}", e);
                None
            }
        },
        ReportFormat::Text => format_text(event),
    }
}

fn format_text(event: &StatusEvent) -> Option<String> {
    match event {
        StatusEvent::Step(update) => match update.status {
            StepStatus::Pending if update.step == 1 => {
                Some(format!("🔁 Service {}", update.service))
            }
            StepStatus::Pending => None,
            StepStatus::Success => Some(format!("  └─ {} {} ✅", update.method, update.path)),
            StepStatus::Failed => {
                let mut line = format!("  └─ {} {} ❌", update.method, update.path);
                if let Some(error) = &update.error {
                    line.push_str(&format!("\n     {}", error));
                }
                Some(line)
            }
        },
        StatusEvent::Completed { port, errors: 0 } => Some(format!("✅ Port {} synchronized", port)),
        StatusEvent::Completed { port, errors } => {
            Some(format!("❌ Port {}: {} service(s) failed", port, errors))
        }
    }
}

/// Prints status events to stdout until every sender is dropped.
pub fn spawn_reporter(mut rx: mpsc::Receiver<StatusEvent>, format: ReportFormat) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Some(line) = format_event(&event, format) {
                println!("{}", line);
            }
        }
    })
}
