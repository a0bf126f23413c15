use crate::ui::{theme, Icons};
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::time::Duration;

/// Progress bar for bulk store imports; hidden when stdout is not a terminal
pub struct ImportProgress {
    pb: ProgressBar,
}

impl ImportProgress {
    pub fn new(total: usize) -> Self {
        let pb = if console::Term::stdout().is_term() {
            let pb = ProgressBar::new(total as u64);
            if let Ok(style) = ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}") {
                pb.set_style(style.progress_chars("=> "));
            }
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        } else {
            ProgressBar::hidden()
        };
        Self { pb }
    }

    pub fn imported(&self, name: &str) {
        self.pb.set_message(format!("Imported: {}", name));
        self.pb.inc(1);
    }

    pub fn skipped(&self, name: &str, reason: &str) {
        self.pb.println(format!("{} {}: {}", Icons::WARN, name, reason.style(theme().warn.clone())));
        self.pb.inc(1);
    }

    pub fn finish_with_summary(&self, duration: Duration, imported: usize, skipped: usize) {
        self.pb.finish_and_clear();
        println!(
            "{} {}",
            Icons::CHECK.style(theme().success.clone()),
            format!("Import complete in {}", HumanDuration(duration)).style(theme().success.clone())
        );
        println!(
            "  {} {} imported  {} {} skipped",
            Icons::STORE.style(theme().info.clone()),
            imported,
            Icons::WARN.style(theme().info.clone()),
            skipped
        );
    }
}
