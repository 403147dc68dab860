use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

pub struct ProgressReporter {
    multi_progress: Arc<MultiProgress>,
    load_spinner: Option<ProgressBar>,
    probe_progress: Option<ProgressBar>,
    enabled: bool,
}

impl ProgressReporter {
    pub fn new(enabled: bool) -> Self {
        Self {
            multi_progress: Arc::new(MultiProgress::new()),
            load_spinner: None,
            probe_progress: None,
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn start_loading(&mut self, origin: &str) {
        self.load_spinner = self.create_spinner(&format!("Loading units from {origin}"));
    }

    pub fn finish_loading(&self, unit_count: usize) {
        if let Some(ref pb) = self.load_spinner {
            pb.finish_with_message(format!("✓ Loaded {unit_count} units"));
        }
    }

    pub fn start_probe(&mut self, total_units: usize) {
        if !self.enabled {
            return;
        }

        let pb = self
            .multi_progress
            .add(ProgressBar::new(total_units as u64));
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.yellow/red}] {pos}/{len} units probed ({eta})",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message("Probing log servers");
        pb.enable_steady_tick(Duration::from_millis(120));
        self.probe_progress = Some(pb);
    }

    pub fn update_probe_progress(&self, checked: usize) {
        if let Some(ref pb) = self.probe_progress {
            pb.set_position(checked as u64);
        }
    }

    pub fn finish_probe(&self, failing: usize, total: usize) {
        if let Some(ref pb) = self.probe_progress {
            let message = if failing == 0 {
                "✓ No failures found".to_string()
            } else {
                format!("✓ Probe complete ({failing}/{total} units with failures)")
            };
            pb.finish_with_message(message);
        }
    }

    pub fn finish_and_clear(&self) {
        if self.enabled {
            self.multi_progress.clear().unwrap_or(());
        }
    }

    pub fn log_warning(&self, message: &str) {
        if self.enabled {
            self.multi_progress
                .println(format!("⚠ {message}"))
                .unwrap_or(());
        }
    }

    /// Create a simple spinner for indeterminate progress
    pub fn create_spinner(&self, message: &str) -> Option<ProgressBar> {
        if !self.enabled {
            return None;
        }

        let pb = self.multi_progress.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    }
}
