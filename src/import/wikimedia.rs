//! Wikimedia XML dump extractor
//!
//! Streams a dump through an incremental XML reader, rebuilds one page at a
//! time and hands accepted pages to a [`PageSink`]. Memory use is bounded by
//! the read block, the longest single run of character data and the page in
//! flight, never by the size of the dump.

use super::source::{
    ExtractSummary, ImportError, IncompletePage, Interrupt, NoProgress, Page, PageSink,
    PartialPage, ProgressReporter, TagKind,
};
use crate::config::ExtractConfig;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::collections::HashSet;
use std::io::{BufReader, Read};
use tracing::{debug, info, warn};

/// Byte-counting wrapper around the raw input
pub struct BlockReader<R> {
    inner: R,
    consumed: u64,
}

impl<R: Read> BlockReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, consumed: 0 }
    }

    /// Bytes pulled from the inner reader so far
    pub fn consumed(&self) -> u64 {
        self.consumed
    }
}

impl<R: Read> Read for BlockReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.consumed += n as u64;
        Ok(n)
    }
}

/// Tag-driven state machine that turns element events into pages
#[derive(Debug, Default)]
pub(crate) struct PageAssembler {
    /// Open element names, innermost last
    tag_stack: Vec<String>,
    /// Character data since the last element boundary, joined on close
    pending: Vec<String>,
    /// Page currently being read
    current: Option<PartialPage>,
    /// Closing tags that did not match the innermost open element
    mismatches: usize,
}

impl PageAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_start(&mut self, name: String) {
        if TagKind::classify(&name) == TagKind::Page {
            self.current = Some(PartialPage::default());
        }
        self.tag_stack.push(name);
        self.pending.clear();
    }

    pub fn on_text(&mut self, text: String) {
        if !text.is_empty() {
            self.pending.push(text);
        }
    }

    /// Handle a closing tag; returns the page when `</page>` closes one
    pub fn on_end(&mut self, name: String) -> Option<Result<Page, IncompletePage>> {
        let contents = self.pending.concat();
        self.pending.clear();

        let kind = TagKind::classify(&name);
        let mut finished = None;
        if kind == TagKind::Page {
            finished = self.current.take().map(PartialPage::finish);
        } else if let Some(page) = self.current.as_mut() {
            match kind {
                TagKind::Title => page.set_title(contents),
                TagKind::Text => page.set_markup(contents),
                TagKind::Redirect => page.is_redirect = true,
                TagKind::Page | TagKind::Other => {}
            }
        }

        self.pop_tag(&name);
        finished
    }

    fn pop_tag(&mut self, name: &str) {
        match self.tag_stack.last() {
            Some(top) if top == name => {
                self.tag_stack.pop();
            }
            top => {
                self.mismatches += 1;
                warn!(
                    "Mismatched closing tag </{}> (innermost open element: {})",
                    name,
                    top.map(String::as_str).unwrap_or("none")
                );
                // Unwind to the matching element if it is open further out,
                // otherwise drop the innermost one.
                match self.tag_stack.iter().rposition(|open| open == name) {
                    Some(idx) => self.tag_stack.truncate(idx),
                    None => {
                        self.tag_stack.pop();
                    }
                }
            }
        }
    }

    /// Innermost element still open, if any
    pub fn innermost(&self) -> Option<&str> {
        self.tag_stack.last().map(String::as_str)
    }

    pub fn mismatches(&self) -> usize {
        self.mismatches
    }
}

/// Why a finished page was or was not accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    IgnoredNamespace(String),
    Redirect,
}

/// Namespace and redirect filter applied to every finished page
#[derive(Debug, Clone)]
pub struct PageFilter {
    ignored_namespaces: HashSet<String>,
    skip_redirects: bool,
}

impl PageFilter {
    pub fn new(ignored_namespaces: &[String], skip_redirects: bool) -> Self {
        Self {
            ignored_namespaces: ignored_namespaces.iter().map(|ns| ns.to_lowercase()).collect(),
            skip_redirects,
        }
    }

    pub fn verdict(&self, page: &Page) -> Verdict {
        if let Some(namespace) = page.namespace() {
            if self.ignored_namespaces.contains(&namespace) {
                return Verdict::IgnoredNamespace(namespace);
            }
        }
        if self.skip_redirects && page.is_redirect {
            return Verdict::Redirect;
        }
        Verdict::Accept
    }
}

impl From<&ExtractConfig> for PageFilter {
    fn from(config: &ExtractConfig) -> Self {
        Self::new(&config.ignored_namespaces, config.skip_redirects)
    }
}

/// Streaming page extractor for Wikimedia XML dumps
pub struct WikimediaExtractor {
    block_size: usize,
    filter: PageFilter,
    interrupt: Option<Interrupt>,
}

impl WikimediaExtractor {
    /// Create an extractor from configuration
    pub fn new(config: &ExtractConfig) -> Self {
        Self {
            block_size: config.block_size.max(1),
            filter: PageFilter::from(config),
            interrupt: None,
        }
    }

    /// Stop cleanly at the next block boundary once `interrupt` is triggered
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    /// Read the whole dump, dispatching every accepted page to `sink` in
    /// document order. `bytes_total` is only passed through to `progress`.
    pub fn extract<R, S, P>(
        &self,
        source: R,
        bytes_total: Option<u64>,
        sink: &mut S,
        progress: &mut P,
    ) -> Result<ExtractSummary, ImportError>
    where
        R: Read,
        S: PageSink + ?Sized,
        P: ProgressReporter + ?Sized,
    {
        let buffered = BufReader::with_capacity(self.block_size, BlockReader::new(source));
        let mut reader = Reader::from_reader(buffered);
        reader
            .trim_text(false)
            .expand_empty_elements(true)
            .check_end_names(false);

        let mut buf = Vec::with_capacity(8192);
        let mut assembler = PageAssembler::new();
        let mut summary = ExtractSummary::default();
        let mut reported = 0u64;

        progress.report(0, bytes_total);

        loop {
            buf.clear();
            let event = match reader.read_event_into(&mut buf) {
                Ok(event) => event,
                Err(e) => {
                    return Err(ImportError::XmlParse {
                        position: reader.buffer_position(),
                        message: e.to_string(),
                    })
                }
            };

            match event {
                Event::Start(ref e) => assembler.on_start(element_name(e.local_name().as_ref())),
                Event::End(ref e) => {
                    let name = element_name(e.local_name().as_ref());
                    if let Some(finished) = assembler.on_end(name) {
                        self.dispatch(finished, &mut summary, sink)?;
                    }
                }
                Event::Text(ref e) => {
                    let text = e.unescape().map_err(|err| ImportError::XmlParse {
                        position: reader.buffer_position(),
                        message: err.to_string(),
                    })?;
                    assembler.on_text(text.into_owned());
                }
                Event::CData(e) => {
                    assembler.on_text(String::from_utf8_lossy(&e.into_inner()).into_owned());
                }
                Event::Eof => {
                    if let Some(open) = assembler.innermost() {
                        return Err(ImportError::Structural(format!(
                            "unexpected end of input inside <{}>",
                            open
                        )));
                    }
                    break;
                }
                _ => {}
            }

            let consumed = reader.get_ref().get_ref().consumed();
            if consumed != reported {
                reported = consumed;
                progress.report(consumed, bytes_total);

                if self.interrupt.as_ref().is_some_and(Interrupt::is_triggered) {
                    info!("Extraction interrupted after {} pages", summary.pages_accepted);
                    summary.interrupted = true;
                    break;
                }
            }
        }

        summary.bytes_read = reader.get_ref().get_ref().consumed();
        summary.tag_mismatches = assembler.mismatches();
        Ok(summary)
    }

    fn dispatch<S: PageSink + ?Sized>(
        &self,
        finished: Result<Page, IncompletePage>,
        summary: &mut ExtractSummary,
        sink: &mut S,
    ) -> Result<(), ImportError> {
        summary.pages_seen += 1;

        let page = match finished {
            Ok(page) => page,
            Err(incomplete) => {
                summary.incomplete += 1;
                warn!("Dropping incomplete page: {}", incomplete.describe());
                return Ok(());
            }
        };

        match self.filter.verdict(&page) {
            Verdict::Accept => {
                sink.accept(page)?;
                summary.pages_accepted += 1;
            }
            Verdict::IgnoredNamespace(namespace) => {
                debug!("Skipping '{}' (namespace '{}')", page.title, namespace);
                summary.skipped_namespace += 1;
            }
            Verdict::Redirect => {
                debug!("Skipping redirect '{}'", page.title);
                summary.skipped_redirect += 1;
            }
        }
        Ok(())
    }
}

fn element_name(local_name: &[u8]) -> String {
    String::from_utf8_lossy(local_name).to_lowercase()
}

/// Extract `source` with default settings, calling `on_page` for every accepted page
pub fn extract<R, F>(source: R, on_page: F) -> Result<ExtractSummary, ImportError>
where
    R: Read,
    F: FnMut(Page) -> Result<(), ImportError>,
{
    let mut sink = on_page;
    WikimediaExtractor::new(&ExtractConfig::default()).extract(source, None, &mut sink, &mut NoProgress)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<mediawiki xmlns="http://www.mediawiki.org/xml/export-0.10/">
  <siteinfo>
    <sitename>Wikipedia</sitename>
  </siteinfo>
  <page>
    <title>Paris</title>
    <ns>0</ns>
    <id>1</id>
    <revision>
      <id>100</id>
      <text xml:space="preserve">'''Paris''' is the capital of [[France]] &amp; its largest city.</text>
    </revision>
  </page>
  <page>
    <title>Category:Capitals</title>
    <ns>14</ns>
    <revision>
      <text>Capital cities.</text>
    </revision>
  </page>
  <page>
    <title>City of Light</title>
    <ns>0</ns>
    <redirect title="Paris" />
    <revision>
      <text>#REDIRECT [[Paris]]</text>
    </revision>
  </page>
  <page>
    <title>Template:Infobox</title>
    <revision>
      <text>{{{name}}}</text>
    </revision>
  </page>
  <page>
    <title>Lyon</title>
    <ns>0</ns>
    <revision>
      <text>Lyon lies on the [[Rhône|Rhone]].</text>
    </revision>
  </page>
</mediawiki>
"#;

    fn collect(xml: &str, config: &ExtractConfig) -> (Vec<Page>, ExtractSummary) {
        let mut pages = Vec::new();
        let mut sink = |page: Page| -> Result<(), ImportError> {
            pages.push(page);
            Ok(())
        };
        let summary = WikimediaExtractor::new(config)
            .extract(xml.as_bytes(), None, &mut sink, &mut NoProgress)
            .unwrap();
        (pages, summary)
    }

    #[test]
    fn test_parse_sample_xml() {
        let (pages, summary) = collect(SAMPLE_XML, &ExtractConfig::default());

        let titles: Vec<_> = pages.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Paris", "Lyon"]);
        assert_eq!(
            pages[0].markup,
            "'''Paris''' is the capital of [[France]] & its largest city."
        );
        assert_eq!(summary.pages_seen, 5);
        assert_eq!(summary.pages_accepted, 2);
        assert_eq!(summary.skipped_namespace, 2);
        assert_eq!(summary.skipped_redirect, 1);
        assert_eq!(summary.tag_mismatches, 0);
        assert_eq!(summary.bytes_read, SAMPLE_XML.len() as u64);
        assert!(!summary.interrupted);
    }

    #[test]
    fn test_redirects_kept_when_filter_disabled() {
        let config = ExtractConfig {
            skip_redirects: false,
            ..ExtractConfig::default()
        };
        let (pages, summary) = collect(SAMPLE_XML, &config);

        let redirect = pages.iter().find(|p| p.title == "City of Light").unwrap();
        assert!(redirect.is_redirect);
        assert_eq!(summary.skipped_redirect, 0);
        assert_eq!(pages.len(), 3);
    }

    #[test]
    fn test_namespace_filter_is_configurable() {
        let config = ExtractConfig {
            ignored_namespaces: vec!["CATEGORY".to_string()],
            ..ExtractConfig::default()
        };
        let (pages, _) = collect(SAMPLE_XML, &config);

        let titles: Vec<_> = pages.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Paris", "Template:Infobox", "Lyon"]);
    }

    #[test]
    fn test_block_size_is_not_observable() {
        let tiny = ExtractConfig {
            block_size: 1,
            ..ExtractConfig::default()
        };
        let odd = ExtractConfig {
            block_size: 7,
            ..ExtractConfig::default()
        };
        let (expected, _) = collect(SAMPLE_XML, &ExtractConfig::default());
        let (one_byte, _) = collect(SAMPLE_XML, &tiny);
        let (seven_bytes, _) = collect(SAMPLE_XML, &odd);

        assert_eq!(one_byte, expected);
        assert_eq!(seven_bytes, expected);
    }

    #[test]
    fn test_tag_names_are_case_insensitive() {
        let xml = "<MediaWiki><PAGE><Title>Oslo</Title><Text>Capital of Norway.</TEXT></page></mediawiki>";
        let (pages, summary) = collect(xml, &ExtractConfig::default());

        assert_eq!(pages, vec![Page::new("Oslo", "Capital of Norway.")]);
        assert_eq!(summary.tag_mismatches, 0);
    }

    #[test]
    fn test_mismatched_closing_tag_is_recovered() {
        let xml = "<mediawiki><page><title>Bern</title><revision><text>Swiss city.</text></page>\
                   <page><title>Basel</title><text>On the Rhine.</text></page></mediawiki>";
        let (pages, summary) = collect(xml, &ExtractConfig::default());

        let titles: Vec<_> = pages.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Bern", "Basel"]);
        assert_eq!(summary.tag_mismatches, 1);
    }

    #[test]
    fn test_incomplete_page_is_dropped() {
        let xml = "<mediawiki><page><title>Empty</title></page>\
                   <page><title>Full</title><text>body</text></page></mediawiki>";
        let (pages, summary) = collect(xml, &ExtractConfig::default());

        assert_eq!(pages, vec![Page::new("Full", "body")]);
        assert_eq!(summary.incomplete, 1);
        assert_eq!(summary.pages_seen, 2);
    }

    #[test]
    fn test_first_title_wins() {
        let xml = "<page><title>One</title><title>Two</title><text>a</text><text>b</text></page>";
        let (pages, _) = collect(xml, &ExtractConfig::default());
        assert_eq!(pages, vec![Page::new("One", "a")]);
    }

    #[test]
    fn test_cdata_text_is_kept_raw() {
        let xml = "<page><title>Raw</title><text><![CDATA[a < b & c]]></text></page>";
        let (pages, _) = collect(xml, &ExtractConfig::default());
        assert_eq!(pages[0].markup, "a < b & c");
    }

    #[test]
    fn test_truncated_input_is_fatal_but_keeps_earlier_pages() {
        let xml = "<mediawiki><page><title>Kept</title><text>ok</text></page><page><title>Cut";
        let mut pages = Vec::new();
        let result = extract(xml.as_bytes(), |page| {
            pages.push(page.title);
            Ok(())
        });

        assert!(result.is_err());
        assert_eq!(pages, vec!["Kept"]);
    }

    #[test]
    fn test_unclosed_root_is_structural_error() {
        let xml = "<mediawiki><page><title>A</title><text>b</text></page>";
        let err = extract(xml.as_bytes(), |_| Ok(())).unwrap_err();
        match err {
            ImportError::Structural(msg) => assert!(msg.contains("<mediawiki>")),
            other => panic!("expected structural error, got {other:?}"),
        }
    }

    #[test]
    fn test_sink_error_aborts_run() {
        let xml = "<m><page><title>A</title><text>a</text></page><page><title>B</title><text>b</text></page></m>";
        let mut calls = 0;
        let err = extract(xml.as_bytes(), |_| {
            calls += 1;
            Err(ImportError::Sink("disk full".to_string()))
        })
        .unwrap_err();

        assert!(matches!(err, ImportError::Sink(_)));
        assert_eq!(calls, 1);
    }

    struct Recorder(Vec<(u64, Option<u64>)>);

    impl ProgressReporter for Recorder {
        fn report(&mut self, bytes_consumed: u64, bytes_total: Option<u64>) {
            self.0.push((bytes_consumed, bytes_total));
        }
    }

    #[test]
    fn test_progress_reported_per_block() {
        let config = ExtractConfig {
            block_size: 64,
            ..ExtractConfig::default()
        };
        let total = SAMPLE_XML.len() as u64;
        let mut recorder = Recorder(Vec::new());
        let mut sink = |_: Page| -> Result<(), ImportError> { Ok(()) };

        WikimediaExtractor::new(&config)
            .extract(SAMPLE_XML.as_bytes(), Some(total), &mut sink, &mut recorder)
            .unwrap();

        assert_eq!(recorder.0.first(), Some(&(0, Some(total))));
        assert_eq!(recorder.0.last(), Some(&(total, Some(total))));
        assert!(recorder.0.windows(2).all(|w| w[0].0 < w[1].0));
        assert!(recorder.0.len() > 2);
    }

    #[test]
    fn test_interrupt_stops_at_block_boundary() {
        let config = ExtractConfig {
            block_size: 16,
            ..ExtractConfig::default()
        };
        let interrupt = Interrupt::new();
        interrupt.trigger();

        let mut pages = Vec::new();
        let mut sink = |page: Page| -> Result<(), ImportError> {
            pages.push(page);
            Ok(())
        };
        let summary = WikimediaExtractor::new(&config)
            .with_interrupt(interrupt)
            .extract(SAMPLE_XML.as_bytes(), None, &mut sink, &mut NoProgress)
            .unwrap();

        assert!(summary.interrupted);
        assert!(pages.is_empty());
        assert!(summary.bytes_read < SAMPLE_XML.len() as u64);
    }

    #[test]
    fn test_assembler_ignores_fields_outside_pages() {
        let mut assembler = PageAssembler::new();
        assembler.on_start("siteinfo".to_string());
        assembler.on_start("title".to_string());
        assembler.on_text("Not a page".to_string());
        assert!(assembler.on_end("title".to_string()).is_none());
        assert!(assembler.on_end("siteinfo".to_string()).is_none());
        assert_eq!(assembler.innermost(), None);
        assert_eq!(assembler.mismatches(), 0);
    }

    #[test]
    fn test_assembler_joins_text_chunks() {
        let mut assembler = PageAssembler::new();
        assembler.on_start("page".to_string());
        assembler.on_start("title".to_string());
        assembler.on_text("Rio de ".to_string());
        assembler.on_text("Janeiro".to_string());
        assembler.on_end("title".to_string());
        assembler.on_start("text".to_string());
        assembler.on_text("Beaches.".to_string());
        assembler.on_end("text".to_string());

        let page = assembler.on_end("page".to_string()).unwrap().unwrap();
        assert_eq!(page, Page::new("Rio de Janeiro", "Beaches."));
    }

    #[test]
    fn test_stray_closing_tag_pops_innermost() {
        let mut assembler = PageAssembler::new();
        assembler.on_start("a".to_string());
        assembler.on_start("b".to_string());
        assembler.on_end("zzz".to_string());
        assert_eq!(assembler.innermost(), Some("a"));
        assert_eq!(assembler.mismatches(), 1);
    }

    #[test]
    fn test_filter_verdicts() {
        let filter = PageFilter::new(&["Category".to_string()], true);
        assert_eq!(filter.verdict(&Page::new("Paris", "")), Verdict::Accept);
        assert_eq!(
            filter.verdict(&Page::new("category:Foo", "")),
            Verdict::IgnoredNamespace("category".to_string())
        );
        assert_eq!(
            filter.verdict(&Page::new("Paris", "").with_redirect(true)),
            Verdict::Redirect
        );
        assert_eq!(filter.verdict(&Page::new("Talk:Paris", "")), Verdict::Accept);
    }
}
