//! Core types and traits for dump extraction

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use super::wikitext::MarkupError;

/// A finished page taken from the dump
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Page title, exactly as it appears in the dump
    pub title: String,
    /// Raw wiki markup, or its plain-text rendering once converted
    pub markup: String,
    /// Whether the page carried a `<redirect>` marker
    pub is_redirect: bool,
}

impl Page {
    /// Create a new page
    pub fn new(title: impl Into<String>, markup: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            markup: markup.into(),
            is_redirect: false,
        }
    }

    /// Mark the page as a redirect
    pub fn with_redirect(mut self, is_redirect: bool) -> Self {
        self.is_redirect = is_redirect;
        self
    }

    /// Lower-cased namespace prefix of the title (`"Category:Foo"` -> `"category"`)
    pub fn namespace(&self) -> Option<String> {
        self.title
            .split_once(':')
            .map(|(prefix, _)| prefix.to_lowercase())
    }
}

/// Page under construction while its child elements are being read
#[derive(Debug, Default)]
pub(crate) struct PartialPage {
    pub title: Option<String>,
    pub markup: Option<String>,
    pub is_redirect: bool,
}

impl PartialPage {
    /// Assign the title unless an earlier `<title>` already did
    pub fn set_title(&mut self, title: String) {
        if self.title.is_none() {
            self.title = Some(title);
        }
    }

    /// Assign the markup unless an earlier `<text>` already did
    pub fn set_markup(&mut self, markup: String) {
        if self.markup.is_none() {
            self.markup = Some(markup);
        }
    }

    /// Freeze into a [`Page`], or hand back which fields are missing
    pub fn finish(self) -> Result<Page, IncompletePage> {
        match (self.title, self.markup) {
            (Some(title), Some(markup)) => Ok(Page {
                title,
                markup,
                is_redirect: self.is_redirect,
            }),
            (title, markup) => Err(IncompletePage {
                missing_title: title.is_none(),
                missing_markup: markup.is_none(),
                title,
            }),
        }
    }
}

/// A page that closed without both a title and a body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompletePage {
    /// Title, if one was read
    pub title: Option<String>,
    pub missing_title: bool,
    pub missing_markup: bool,
}

impl IncompletePage {
    /// Human-readable description for the diagnostic channel
    pub fn describe(&self) -> String {
        let missing = match (self.missing_title, self.missing_markup) {
            (true, true) => "title and text",
            (true, false) => "title",
            _ => "text",
        };
        match self.title {
            Some(ref t) => format!("page '{}' has no {}", t, missing),
            None => format!("page has no {}", missing),
        }
    }
}

/// Closed classification of the element names the extractor cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Page,
    Title,
    Redirect,
    Text,
    Other,
}

impl TagKind {
    /// Classify an already lower-cased local element name
    pub fn classify(name: &str) -> Self {
        match name {
            "page" => TagKind::Page,
            "title" => TagKind::Title,
            "redirect" => TagKind::Redirect,
            "text" => TagKind::Text,
            _ => TagKind::Other,
        }
    }
}

/// Receives every page accepted by the extractor, in document order
pub trait PageSink {
    fn accept(&mut self, page: Page) -> Result<(), ImportError>;
}

impl<F> PageSink for F
where
    F: FnMut(Page) -> Result<(), ImportError>,
{
    fn accept(&mut self, page: Page) -> Result<(), ImportError> {
        self(page)
    }
}

/// Observer for read progress. Must not block and cannot influence parsing.
pub trait ProgressReporter {
    /// Called after each block with cumulative bytes read and the total, if known
    fn report(&mut self, bytes_consumed: u64, bytes_total: Option<u64>);
}

/// Reporter that ignores every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&mut self, _bytes_consumed: u64, _bytes_total: Option<u64>) {}
}

/// Shared flag set by a signal handler and polled once per block
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a clean stop
    pub fn trigger(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Outcome counters of one extraction run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractSummary {
    /// Pages closed in the dump, accepted or not
    pub pages_seen: usize,
    /// Pages handed to the sink
    pub pages_accepted: usize,
    /// Pages dropped for an ignored namespace prefix
    pub skipped_namespace: usize,
    /// Pages dropped for being redirects
    pub skipped_redirect: usize,
    /// Pages dropped for lacking a title or text
    pub incomplete: usize,
    /// Closing tags that did not match the innermost open element
    pub tag_mismatches: usize,
    /// Bytes pulled from the input stream
    pub bytes_read: u64,
    /// Whether the run stopped early on an interrupt
    pub interrupted: bool,
}

/// Errors that can occur while extracting a dump
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parse error at byte {position}: {message}")]
    XmlParse { position: usize, message: String },

    #[error("Malformed dump: {0}")]
    Structural(String),

    #[error("Markup error in '{title}': {source}")]
    Markup {
        title: String,
        #[source]
        source: MarkupError,
    },

    #[error("Output error: {0}")]
    Sink(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_namespace() {
        assert_eq!(Page::new("Category:Foo", "").namespace(), Some("category".to_string()));
        assert_eq!(Page::new("WikiPedia:About:x", "").namespace(), Some("wikipedia".to_string()));
        assert_eq!(Page::new("Paris", "").namespace(), None);
    }

    #[test]
    fn test_partial_page_first_assignment_wins() {
        let mut partial = PartialPage::default();
        partial.set_title("First".to_string());
        partial.set_title("Second".to_string());
        partial.set_markup("body".to_string());
        partial.set_markup("other".to_string());

        let page = partial.finish().unwrap();
        assert_eq!(page.title, "First");
        assert_eq!(page.markup, "body");
        assert!(!page.is_redirect);
    }

    #[test]
    fn test_partial_page_incomplete() {
        let mut partial = PartialPage::default();
        partial.set_title("Lonely".to_string());

        let err = partial.finish().unwrap_err();
        assert!(!err.missing_title);
        assert!(err.missing_markup);
        assert_eq!(err.describe(), "page 'Lonely' has no text");

        let err = PartialPage::default().finish().unwrap_err();
        assert!(err.missing_title && err.missing_markup);
        assert_eq!(err.describe(), "page has no title and text");
    }

    #[test]
    fn test_tag_classification() {
        assert_eq!(TagKind::classify("page"), TagKind::Page);
        assert_eq!(TagKind::classify("title"), TagKind::Title);
        assert_eq!(TagKind::classify("redirect"), TagKind::Redirect);
        assert_eq!(TagKind::classify("text"), TagKind::Text);
        assert_eq!(TagKind::classify("revision"), TagKind::Other);
    }

    #[test]
    fn test_closure_sink() {
        let mut titles = Vec::new();
        {
            let mut sink = |page: Page| -> Result<(), ImportError> {
                titles.push(page.title);
                Ok(())
            };
            sink.accept(Page::new("A", "a")).unwrap();
            sink.accept(Page::new("B", "b")).unwrap();
        }
        assert_eq!(titles, vec!["A", "B"]);
    }

    #[test]
    fn test_interrupt_shared_between_clones() {
        let interrupt = Interrupt::new();
        let handle = interrupt.clone();
        assert!(!interrupt.is_triggered());
        handle.trigger();
        assert!(interrupt.is_triggered());
    }
}
