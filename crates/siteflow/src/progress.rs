use indicatif::{ProgressBar, ProgressStyle};

/// Spinner shown while a pipeline step runs. Hidden when stderr is not a
/// terminal.
pub struct StepProgress {
    progress_bar: ProgressBar,
}

impl StepProgress {
    pub fn new(label: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        pb.set_message(format!("{label}..."));

        Self { progress_bar: pb }
    }

    pub fn finish_success(&self, label: &str) {
        self.progress_bar.finish_with_message(format!("{label} ✓"));
    }

    pub fn finish_error(&self, label: &str, error: &str) {
        self.progress_bar
            .finish_with_message(format!("{label} failed: {error}"));
    }
}
