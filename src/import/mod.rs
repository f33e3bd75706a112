//! Streaming import of MediaWiki XML dumps
//!
//! A dump is read block by block, pages are assembled from the XML event
//! stream, filtered, converted from wiki markup to plain text and handed to
//! a page writer. Memory use is bounded by the largest single page.
//!
//! # Example Usage
//!
//! ```no_run
//! use wikicorpus::import::CorpusCoordinatorBuilder;
//! use wikicorpus::output::DirectoryWriter;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dump = std::fs::File::open("enwiki-latest-pages-articles.xml")?;
//! let total = dump.metadata()?.len();
//!
//! let coordinator = CorpusCoordinatorBuilder::new().with_quiet(true).build()?;
//! let mut writer = DirectoryWriter::create("articles")?;
//!
//! let stats = coordinator.run(dump, Some(total), &mut writer)?;
//! println!("Wrote {} pages", stats.pages_written);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Corpus Coordinator                          │
//! │              (conversion policy, progress, statistics)              │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        Wikimedia Extractor                          │
//! │     BlockReader → quick-xml events → PageAssembler → PageFilter     │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │ Page
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        WikiText Converter                           │
//! │         nowiki, links, tags, templates, headings, emphasis          │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │ plain text
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                            PageWriter                               │
//! │             DirectoryWriter (file per page) / StreamWriter          │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

pub mod coordinator;
pub mod progress;
pub mod source;
pub mod wikimedia;
pub mod wikitext;

// Re-export main types
pub use coordinator::{CorpusCoordinator, CorpusCoordinatorBuilder, CorpusStats};
pub use progress::ExtractProgress;
pub use source::{
    ExtractSummary, ImportError, IncompletePage, Interrupt, NoProgress, Page, PageSink,
    ProgressReporter, TagKind,
};
pub use wikimedia::{extract, PageFilter, Verdict, WikimediaExtractor};
pub use wikitext::{convert, MarkupError, MarkupErrorKind, WikiTextConverter};
