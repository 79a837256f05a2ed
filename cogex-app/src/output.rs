use anyhow::{Context, Result};
use cogex_core::{FrameAction, OutputSink, Renderer, TrialReport};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

/// Writes the report as pretty JSON to a file, or stdout when no path is set.
pub struct JsonReport {
    path: Option<PathBuf>,
}

impl JsonReport {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    fn write(&self, report: &TrialReport) -> Result<()> {
        let json = serde_json::to_string_pretty(report).context("failed to serialize report")?;
        match &self.path {
            Some(path) => std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?,
            None => println!("{json}"),
        }
        Ok(())
    }
}

impl OutputSink for JsonReport {
    fn report(&mut self, report: TrialReport) {
        log::info!(
            "trial done: {:?} at {}, {} log entries, {} captured events",
            report.end_reason,
            report.ended_at,
            report.log.len(),
            report.log.captured().len()
        );
        if let Err(err) = self.write(&report) {
            log::error!("{err:#}");
        }
    }
}

/// Text description of what is on screen, shared with the window.
#[derive(Debug, Clone, Default)]
pub struct Caption {
    text: Arc<Mutex<String>>,
}

impl Caption {
    pub fn text(&self) -> String {
        self.text.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set(&self, text: String) {
        *self.text.lock().unwrap_or_else(PoisonError::into_inner) = text;
    }
}

pub fn describe(action: &FrameAction) -> String {
    match action {
        FrameAction::ShowFrame { images, text, .. } => {
            let mut parts = images.clone();
            parts.extend(text.clone());
            parts.join(" | ")
        }
        FrameAction::ShowLayout { slots } => slots
            .iter()
            .map(|(slot, image)| format!("{slot}: {image}"))
            .collect::<Vec<_>>()
            .join("  "),
        FrameAction::RevealQuestion { prompt, .. } => prompt.clone(),
        FrameAction::Prompt { text } => text.clone(),
        FrameAction::Clear => String::new(),
    }
}

impl Renderer<FrameAction> for Caption {
    fn render(&mut self, action: &FrameAction) {
        let text = describe(action);
        log::info!("show: {text}");
        self.set(text);
    }

    fn clear(&mut self) {
        self.set(String::new());
    }
}
