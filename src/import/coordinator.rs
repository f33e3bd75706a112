//! Corpus coordinator that drives extraction, conversion and output

use super::progress::ExtractProgress;
use super::source::{ExtractSummary, ImportError, Interrupt, Page};
use super::wikimedia::WikimediaExtractor;
use super::wikitext::WikiTextConverter;
use crate::config::{ConvertConfig, ExtractConfig, MarkupErrorPolicy};
use crate::output::PageWriter;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Read;
use tracing::{info, warn};

/// Statistics of one corpus run
#[derive(Debug, Clone, Serialize)]
pub struct CorpusStats {
    /// Extraction counters
    #[serde(flatten)]
    pub extract: ExtractSummary,
    /// Pages that reached the writer
    pub pages_written: usize,
    /// Pages dropped because their markup could not be converted
    pub markup_errors: usize,
    /// Elapsed time in seconds
    pub elapsed_seconds: f64,
    /// Pages written per second
    pub pages_per_second: f64,
    /// When the run ended
    pub finished_at: DateTime<Utc>,
}

impl CorpusStats {
    fn new(extract: ExtractSummary, pages_written: usize, markup_errors: usize, elapsed_seconds: f64) -> Self {
        let mut stats = Self {
            extract,
            pages_written,
            markup_errors,
            elapsed_seconds,
            pages_per_second: 0.0,
            finished_at: Utc::now(),
        };
        stats.update_rate();
        stats
    }

    /// Recompute the processing rate
    pub fn update_rate(&mut self) {
        if self.elapsed_seconds > 0.0 {
            self.pages_per_second = self.pages_written as f64 / self.elapsed_seconds;
        }
    }
}

/// Runs a dump through the extractor, the converter and a page writer
#[derive(Debug)]
pub struct CorpusCoordinator {
    extract: ExtractConfig,
    convert: ConvertConfig,
    converter: WikiTextConverter,
    interrupt: Option<Interrupt>,
    quiet: bool,
}

impl CorpusCoordinator {
    /// Process `source` to completion, writing every accepted page to `writer`.
    ///
    /// `bytes_total` sizes the progress bar when known.
    pub fn run<R, W>(
        &self,
        source: R,
        bytes_total: Option<u64>,
        writer: &mut W,
    ) -> Result<CorpusStats, ImportError>
    where
        R: Read,
        W: PageWriter + ?Sized,
    {
        let mut extractor = WikimediaExtractor::new(&self.extract);
        if let Some(ref interrupt) = self.interrupt {
            extractor = extractor.with_interrupt(interrupt.clone());
        }

        let progress = ExtractProgress::new(bytes_total, self.quiet);
        let mut pages_written = 0usize;
        let mut markup_errors = 0usize;

        let mut sink = |mut page: Page| -> Result<(), ImportError> {
            if self.convert.convert_markup {
                match self.converter.convert(&page.markup) {
                    Ok(text) => page.markup = text,
                    Err(source) => match self.convert.on_markup_error {
                        MarkupErrorPolicy::Skip => {
                            warn!("Skipping '{}': {}", page.title, source);
                            markup_errors += 1;
                            return Ok(());
                        }
                        MarkupErrorPolicy::Abort => {
                            return Err(ImportError::Markup {
                                title: page.title,
                                source,
                            })
                        }
                    },
                }
            }

            writer
                .write_page(&page)
                .map_err(|e| ImportError::Sink(format!("failed to write '{}': {}", page.title, e)))?;
            pages_written += 1;
            progress.page_written(&page.title);
            Ok(())
        };

        let result = extractor.extract(source, bytes_total, &mut sink, &mut &progress);
        let summary = match result {
            Ok(summary) => summary,
            Err(e) => {
                progress.abandon("Failed");
                return Err(e);
            }
        };

        writer
            .finish()
            .map_err(|e| ImportError::Sink(format!("failed to finish output: {}", e)))?;

        if summary.interrupted {
            progress.abandon("Interrupted");
        } else {
            progress.finish();
        }

        let stats = CorpusStats::new(
            summary,
            pages_written,
            markup_errors,
            progress.elapsed_seconds(),
        );
        info!(
            "Wrote {} of {} pages ({} markup errors, {:.1} pages/s)",
            stats.pages_written, stats.extract.pages_seen, stats.markup_errors, stats.pages_per_second
        );
        Ok(stats)
    }

    pub fn extract_config(&self) -> &ExtractConfig {
        &self.extract
    }

    pub fn convert_config(&self) -> &ConvertConfig {
        &self.convert
    }
}

/// Builder for [`CorpusCoordinator`]
#[derive(Debug, Default)]
pub struct CorpusCoordinatorBuilder {
    extract: ExtractConfig,
    convert: ConvertConfig,
    interrupt: Option<Interrupt>,
    quiet: bool,
}

impl CorpusCoordinatorBuilder {
    /// Create a builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the extraction configuration
    pub fn with_extract_config(mut self, config: ExtractConfig) -> Self {
        self.extract = config;
        self
    }

    /// Set the conversion configuration
    pub fn with_convert_config(mut self, config: ConvertConfig) -> Self {
        self.convert = config;
        self
    }

    /// Enable or disable markup conversion
    pub fn with_convert(mut self, convert_markup: bool) -> Self {
        self.convert.convert_markup = convert_markup;
        self
    }

    /// Set the markup error policy
    pub fn with_policy(mut self, policy: MarkupErrorPolicy) -> Self {
        self.convert.on_markup_error = policy;
        self
    }

    /// Stop at the next block boundary once `interrupt` fires
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    /// Set quiet mode (no progress output)
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Build the coordinator
    pub fn build(self) -> Result<CorpusCoordinator, ImportError> {
        if self.extract.block_size == 0 {
            return Err(ImportError::Config("block_size must be positive".to_string()));
        }

        Ok(CorpusCoordinator {
            extract: self.extract,
            convert: self.convert,
            converter: WikiTextConverter::new(),
            interrupt: self.interrupt,
            quiet: self.quiet,
        })
    }
}
