use crate::logstore::{LogRecord, Target};
use console::{style, Color};
use std::collections::HashMap;

const LABEL_COLORS: [Color; 6] = [
    Color::Green,
    Color::Blue,
    Color::Magenta,
    Color::Cyan,
    Color::Yellow,
    Color::White,
];

/// Formats records as console lines, one label column per target
#[derive(Debug)]
pub struct ConsoleRenderer {
    labels: HashMap<String, (String, Color)>,
    width: usize,
}

impl ConsoleRenderer {
    pub fn new(targets: &[Target]) -> Self {
        let labels: HashMap<String, (String, Color)> = targets
            .iter()
            .enumerate()
            .map(|(i, target)| {
                let color = LABEL_COLORS[i % LABEL_COLORS.len()];
                (target.as_str().to_string(), (target.label(), color))
            })
            .collect();
        let width = labels.values().map(|(label, _)| label.chars().count()).max().unwrap_or(0);

        Self { labels, width }
    }

    /// Render one record. Styling is dropped by `console` when stdout is not
    /// a terminal.
    pub fn render(&self, record: &LogRecord) -> String {
        let (label, color) = self
            .labels
            .get(&record.app_target_uri)
            .cloned()
            .unwrap_or_else(|| (record.app_target_uri.clone(), Color::White));

        let level = record.log_level.as_deref().unwrap_or("");
        let level = match level {
            "ERROR" => style(level).red().bold(),
            "WARNING" | "WARN" => style(level).yellow(),
            "INFO" => style(level).cyan(),
            _ => style(level),
        };

        let mut line = format!(
            "{} | {}",
            style(format!("{:<width$}", label, width = self.width)).fg(color),
            record.event_time.format("%Y-%m-%d %H:%M:%S%.3f"),
        );

        if let Some(record_type) = &record.record_type {
            line.push(' ');
            line.push_str(record_type.as_str());
        }
        if let Some(thread) = &record.thread_name {
            line.push_str(&format!(" [{}]", thread));
        }
        line.push_str(&format!(" {}", level));
        if let Some(logger) = &record.logger {
            line.push_str(&format!(" {}", logger));
        }
        line.push_str(" - ");
        line.push_str(&record.message);

        if let Some(stack_trace) = &record.stack_trace {
            line.push('\n');
            line.push_str(stack_trace);
        }

        line
    }
}
