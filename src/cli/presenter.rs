//! CLI presenter for output formatting

use std::io::{self, IsTerminal, Write};
use std::path::Path;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::domain::recording::{CaptureParameters, Duration};

/// Presenter for CLI output formatting
pub struct Presenter {
    spinner: Option<ProgressBar>,
    download: Option<ProgressBar>,
}

impl Presenter {
    /// Create a new presenter
    pub fn new() -> Self {
        Self {
            spinner: None,
            download: None,
        }
    }

    /// Start a spinner with message
    pub fn start_spinner(&mut self, message: &str) {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.red} {msg}")
        {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        self.spinner = Some(spinner);
    }

    /// Update spinner message
    pub fn update_spinner(&self, message: &str) {
        if let Some(ref spinner) = self.spinner {
            spinner.set_message(message.to_string());
        }
    }

    /// Mark spinner as success and finish
    pub fn spinner_success(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✓".green(), message));
        }
    }

    /// Mark spinner as failed and finish
    pub fn spinner_fail(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✗".red(), message));
        }
    }

    /// Stop spinner without status
    pub fn stop_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    /// Show a byte progress bar for a download
    pub fn start_download(&mut self, total_bytes: Option<u64>) {
        let bar = match total_bytes {
            Some(total) => ProgressBar::new(total),
            None => ProgressBar::new_spinner(),
        };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")
        {
            bar.set_style(style.progress_chars("█▓░"));
        }
        self.download = Some(bar);
    }

    /// Download progress handle that can be moved into a callback
    pub fn download_bar(&self) -> Option<ProgressBar> {
        self.download.clone()
    }

    pub fn finish_download(&mut self) {
        if let Some(bar) = self.download.take() {
            bar.finish_and_clear();
        }
    }

    /// Print info message to stderr
    pub fn info(&self, message: &str) {
        eprintln!("{} {}", "ℹ".cyan(), message);
    }

    /// Print success message to stderr
    pub fn success(&self, message: &str) {
        eprintln!("{} {}", "✓".green(), message);
    }

    /// Print warning message to stderr
    pub fn warn(&self, message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Print error message to stderr
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Output text to stdout
    pub fn output(&self, text: &str) {
        println!("{}", text);
    }

    /// Print a menu title and its numbered options
    pub fn menu(&self, title: &str, options: &[&str]) {
        println!();
        println!("{}", title.bold());
        for (i, option) in options.iter().enumerate() {
            println!("  {} {}", format!("{}.", i + 1).cyan(), option);
        }
    }

    /// Print a prompt without newline
    pub fn prompt(&self, text: &str) {
        print!("{} ", text.bold());
        let _ = io::stdout().flush();
    }

    /// Clear the terminal, only when stdout is one
    pub fn clear_screen(&self) {
        if io::stdout().is_terminal() {
            print!("\x1B[2J\x1B[1;1H");
            let _ = io::stdout().flush();
        }
    }

    /// Spinner text while recording
    pub fn format_recording(&self, elapsed: Duration, output: &Path) -> String {
        format!(
            "Recording {} → {}  {}",
            elapsed.format_clock().red().bold(),
            output.display(),
            "(Ctrl+C or Enter to stop)".dimmed()
        )
    }

    /// Print the current capture settings
    pub fn capture_settings(&self, parameters: &CaptureParameters) {
        let resolution = parameters
            .resolution
            .map(|r| r.to_string())
            .unwrap_or_else(|| "full screen".to_string());
        let quality = parameters
            .quality
            .map(|q| q.to_string())
            .unwrap_or_else(|| "encoder default".to_string());
        self.key_value("Resolution", &resolution);
        self.key_value("FPS", &parameters.framerate.to_string());
        self.key_value("Bitrate", parameters.bitrate.as_str());
        self.key_value("Quality", &quality);
    }

    /// Print a key-value pair (for config list)
    pub fn key_value(&self, key: &str, value: &str) {
        println!("{}: {}", key.cyan(), value);
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new()
    }
}
