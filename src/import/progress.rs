//! Progress display for dump extraction

use super::source::ProgressReporter;
use crate::util::truncate_str;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Byte-based progress bar fed by the extractor and the page writer
pub struct ExtractProgress {
    /// Progress bar (None if running in quiet mode)
    progress_bar: Option<ProgressBar>,
    /// Start time
    start_time: Instant,
    /// Pages written so far
    pages_written: AtomicU64,
    /// Bytes read so far
    bytes_read: AtomicU64,
    /// Title of the last written page
    last_title: Mutex<String>,
}

impl ExtractProgress {
    /// Create a progress display; a spinner is used when the input size is unknown
    pub fn new(total_bytes: Option<u64>, quiet: bool) -> Self {
        let progress_bar = if !quiet {
            let pb = match total_bytes {
                Some(total) => {
                    let pb = ProgressBar::new(total);
                    pb.set_style(
                        ProgressStyle::default_bar()
                            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {msg}")
                            .unwrap_or_else(|_| ProgressStyle::default_bar())
                            .progress_chars("#>-"),
                    );
                    pb
                }
                None => {
                    let pb = ProgressBar::new_spinner();
                    pb.set_style(
                        ProgressStyle::default_spinner()
                            .template("{spinner:.green} [{elapsed_precise}] {bytes} read {msg}")
                            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                    );
                    pb
                }
            };
            Some(pb)
        } else {
            None
        };

        Self {
            progress_bar,
            start_time: Instant::now(),
            pages_written: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            last_title: Mutex::new(String::new()),
        }
    }

    /// Record a page that reached the output
    pub fn page_written(&self, title: &str) {
        self.pages_written.fetch_add(1, Ordering::Relaxed);
        if self.progress_bar.is_some() {
            let mut last = self.last_title.lock().unwrap_or_else(|e| e.into_inner());
            last.clear();
            last.push_str(title);
        }
    }

    /// Record the cumulative number of bytes read
    pub fn bytes_read(&self, bytes: u64) {
        self.bytes_read.store(bytes, Ordering::Relaxed);

        if let Some(ref pb) = self.progress_bar {
            pb.set_position(bytes);

            let last = self.last_title.lock().unwrap_or_else(|e| e.into_inner());
            pb.set_message(format!(
                "{:.1} pages/s | {}",
                self.pages_per_second(),
                truncate_str(&last, 30)
            ));
        }
    }

    /// Pages written so far
    pub fn pages(&self) -> u64 {
        self.pages_written.load(Ordering::Relaxed)
    }

    /// Bytes read so far
    pub fn bytes(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    /// Seconds since the display was created
    pub fn elapsed_seconds(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    fn pages_per_second(&self) -> f64 {
        let elapsed = self.elapsed_seconds();
        if elapsed > 0.0 {
            self.pages() as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Finish the progress bar after a complete run
    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_with_message(format!(
                "Done! {} pages written, {:.1} pages/s",
                self.pages(),
                self.pages_per_second()
            ));
        }
    }

    /// Leave the progress bar in place with a reason for stopping
    pub fn abandon(&self, reason: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.abandon_with_message(format!("{} after {} pages", reason, self.pages()));
        }
    }
}

impl ProgressReporter for &ExtractProgress {
    fn report(&mut self, bytes_consumed: u64, _bytes_total: Option<u64>) {
        self.bytes_read(bytes_consumed);
    }
}
