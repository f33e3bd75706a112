//! WikiText to plaintext converter
//!
//! A single left-to-right pass over the markup. At every position the
//! scanner checks, in priority order, for a `<nowiki>` block, a link, a tag,
//! a template or table, a heading (only when the line so far is blank) and
//! an emphasis run. Anything else accumulates into the current plain run.
//! Link text and emphasized text are converted recursively over a sub-range
//! of the same source.

use crate::util::truncate_str;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

const NOWIKI_OPEN: &[u8] = b"<nowiki>";
const NOWIKI_CLOSE: &[u8] = b"</nowiki>";
const COMMENT_OPEN: &[u8] = b"<!--";
const COMMENT_CLOSE: &[u8] = b"-->";

/// Default limit on nested link/emphasis recursion
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Kinds of markup the converter refuses to guess about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupErrorKind {
    /// `<nowiki>` without `</nowiki>`
    UnterminatedNowiki,
    /// Heading with no closing `=` run on its line
    UnterminatedHeading,
    /// Emphasis with no closing quote run on its line
    UnterminatedEmphasis,
    /// Links or emphasis nested deeper than the converter allows
    NestingTooDeep,
}

impl fmt::Display for MarkupErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::UnterminatedNowiki => "unterminated <nowiki> block",
            Self::UnterminatedHeading => "heading without a closing '=' run",
            Self::UnterminatedEmphasis => "emphasis without a closing quote run",
            Self::NestingTooDeep => "markup nested too deeply",
        };
        f.write_str(msg)
    }
}

/// Conversion failure, located in the source markup
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at line {line}, column {column} near '{snippet}'")]
pub struct MarkupError {
    pub kind: MarkupErrorKind,
    /// Byte offset of the offending marker
    pub offset: usize,
    /// 1-based line number
    pub line: usize,
    /// 1-based column, in characters
    pub column: usize,
    /// Source text starting at the marker, shortened
    pub snippet: String,
}

impl MarkupError {
    fn at(kind: MarkupErrorKind, src: &str, offset: usize) -> Self {
        let before = &src[..offset];
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        Self {
            kind,
            offset,
            line: before.matches('\n').count() + 1,
            column: before[line_start..].chars().count() + 1,
            snippet: truncate_str(&src[offset..], 29),
        }
    }
}

/// Converts MediaWiki markup to plain text
#[derive(Debug, Clone)]
pub struct WikiTextConverter {
    max_depth: usize,
}

impl Default for WikiTextConverter {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl WikiTextConverter {
    /// Create a converter with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit how deeply link and emphasis bodies may nest
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Convert `markup` to plain text
    pub fn convert(&self, markup: &str) -> Result<String, MarkupError> {
        Cursor::new(markup, 0, markup.len(), 0, self.max_depth).run()
    }
}

/// Convert `markup` to plain text with default settings
pub fn convert(markup: &str) -> Result<String, MarkupError> {
    WikiTextConverter::new().convert(markup)
}

#[derive(Debug, Clone, Copy)]
enum Rule {
    Nowiki,
    Link,
    Tag,
    Meta,
    Heading,
    Emphasis,
}

/// Scanner state for one (sub-)conversion over `src[start..end]`
struct Cursor<'a> {
    src: &'a str,
    start: usize,
    end: usize,
    pos: usize,
    depth: usize,
    max_depth: usize,
    snippets: Vec<Cow<'a, str>>,
    /// Matching `]` for each `[` on lines already paired
    closes: HashMap<usize, usize>,
    paired_until: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str, start: usize, end: usize, depth: usize, max_depth: usize) -> Self {
        Self {
            src,
            start,
            end,
            pos: start,
            depth,
            max_depth,
            snippets: Vec::new(),
            closes: HashMap::new(),
            paired_until: start,
        }
    }

    fn bytes(&self) -> &'a [u8] {
        self.src.as_bytes()
    }

    fn rest(&self) -> &'a [u8] {
        &self.bytes()[self.pos..self.end]
    }

    fn run(mut self) -> Result<String, MarkupError> {
        if self.depth > self.max_depth {
            return Err(MarkupError::at(MarkupErrorKind::NestingTooDeep, self.src, self.start));
        }

        let mut run_start = self.pos;
        while self.pos < self.end {
            match self.rule_at() {
                Some(rule) => {
                    self.push_plain(run_start, self.pos);
                    self.apply(rule)?;
                    run_start = self.pos;
                }
                // Markers are ASCII, so stepping bytewise never splits a match
                None => self.pos += 1,
            }
        }
        self.push_plain(run_start, self.end);

        Ok(self.snippets.concat())
    }

    fn rule_at(&self) -> Option<Rule> {
        let rest = self.rest();
        if rest.starts_with(NOWIKI_OPEN) {
            Some(Rule::Nowiki)
        } else if rest.starts_with(b"[") {
            Some(Rule::Link)
        } else if rest.starts_with(b"<") {
            Some(Rule::Tag)
        } else if rest.starts_with(b"{{") || rest.starts_with(b"{|") {
            Some(Rule::Meta)
        } else if rest.starts_with(b"=") && self.line_is_blank() {
            Some(Rule::Heading)
        } else if rest.starts_with(b"''") {
            Some(Rule::Emphasis)
        } else {
            None
        }
    }

    fn apply(&mut self, rule: Rule) -> Result<(), MarkupError> {
        match rule {
            Rule::Nowiki => self.nowiki(),
            Rule::Link => self.link(),
            Rule::Tag => {
                self.tag();
                Ok(())
            }
            Rule::Meta => {
                self.skip_balanced(b'{', b'}');
                Ok(())
            }
            Rule::Heading => self.heading(),
            Rule::Emphasis => self.emphasis(),
        }
    }

    /// Whether everything between the last line break and `pos` is whitespace
    fn line_is_blank(&self) -> bool {
        self.bytes()[self.start..self.pos]
            .iter()
            .rev()
            .take_while(|&&b| b != b'\n')
            .all(u8::is_ascii_whitespace)
    }

    /// Index of the next line break at or after `from`, or `end`
    fn line_end(&self, from: usize) -> usize {
        self.bytes()[from..self.end]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(self.end, |i| from + i)
    }

    fn push_plain(&mut self, from: usize, to: usize) {
        if from >= to {
            return;
        }
        let snippet = &self.src[from..to];
        // Keep at most one lone line break in a row
        if snippet == "\n" && self.snippets.last().is_some_and(|prev| prev == "\n") {
            return;
        }
        self.snippets.push(Cow::Borrowed(snippet));
    }

    fn push(&mut self, text: Cow<'a, str>) {
        if !text.is_empty() {
            self.snippets.push(text);
        }
    }

    fn sub_convert(&self, from: usize, to: usize) -> Result<String, MarkupError> {
        Cursor::new(self.src, from, to, self.depth + 1, self.max_depth).run()
    }

    fn nowiki(&mut self) -> Result<(), MarkupError> {
        let body = self.pos + NOWIKI_OPEN.len();
        match find(&self.bytes()[body..self.end], NOWIKI_CLOSE) {
            Some(i) => {
                self.pos = body + i + NOWIKI_CLOSE.len();
                Ok(())
            }
            None => Err(MarkupError::at(
                MarkupErrorKind::UnterminatedNowiki,
                self.src,
                self.pos,
            )),
        }
    }

    fn link(&mut self) -> Result<(), MarkupError> {
        let Some(span) = self.link_span() else {
            // A stray bracket is plain text
            self.push(Cow::Borrowed("["));
            self.pos += 1;
            return Ok(());
        };

        let inner = &self.bytes()[span.inner_start..span.inner_end];
        let mut depth = 0usize;
        let mut first_pipe = None;
        let mut last_pipe = None;
        for (i, &b) in inner.iter().enumerate() {
            match b {
                b'[' => depth += 1,
                b']' => depth = depth.saturating_sub(1),
                b'|' if depth == 0 => {
                    if first_pipe.is_none() {
                        first_pipe = Some(i);
                    }
                    last_pipe = Some(i);
                }
                _ => {}
            }
        }

        let target_end = span.inner_start + first_pipe.unwrap_or(inner.len());
        let target = &self.src[span.inner_start..target_end];
        if !target.contains(':') {
            let display_start = last_pipe.map_or(span.inner_start, |i| span.inner_start + i + 1);
            let text = self.sub_convert(display_start, span.inner_end)?;
            self.push(Cow::Owned(text));
        }

        self.pos = span.next;
        Ok(())
    }

    /// Bracket-balanced extent of the link at `pos`, confined to one line
    fn link_span(&mut self) -> Option<LinkSpan> {
        if self.pos >= self.paired_until {
            self.pair_brackets(self.pos);
        }
        let close = *self.closes.get(&self.pos)?;

        let bytes = self.bytes();
        let opening = bytes[self.pos..close].iter().take_while(|&&b| b == b'[').count();
        let inner_start = self.pos + opening;

        // The innermost opening bracket closes at the last `]` seen at full depth
        let mut depth = opening;
        let mut inner_end = close;
        for (i, &b) in bytes.iter().enumerate().take(close).skip(inner_start) {
            match b {
                b'[' => depth += 1,
                b']' => {
                    if depth == opening {
                        inner_end = i;
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }

        Some(LinkSpan {
            inner_start,
            inner_end,
            next: close + 1,
        })
    }

    /// Pair every bracket from `from` to the end of its line in one pass
    fn pair_brackets(&mut self, from: usize) {
        let line_end = self.line_end(from);
        let mut open = Vec::new();
        for (i, &b) in self.bytes().iter().enumerate().take(line_end).skip(from) {
            match b {
                b'[' => open.push(i),
                b']' => {
                    if let Some(o) = open.pop() {
                        self.closes.insert(o, i);
                    }
                }
                _ => {}
            }
        }
        self.paired_until = line_end;
    }

    fn tag(&mut self) {
        let rest = self.rest();
        if rest.starts_with(COMMENT_OPEN) {
            self.pos = find(rest, COMMENT_CLOSE)
                .map_or(self.end, |i| self.pos + i + COMMENT_CLOSE.len());
            return;
        }
        self.skip_balanced(b'<', b'>');
    }

    /// Skip from the opening delimiter at `pos` past its matching close, or to the end
    fn skip_balanced(&mut self, open: u8, close: u8) {
        let mut depth = 0usize;
        for (i, &b) in self.rest().iter().enumerate() {
            if b == open {
                depth += 1;
            } else if b == close {
                depth -= 1;
                if depth == 0 {
                    self.pos += i + 1;
                    return;
                }
            }
        }
        self.pos = self.end;
    }

    fn heading(&mut self) -> Result<(), MarkupError> {
        let bytes = self.bytes();
        let run = self.rest().iter().take_while(|&&b| b == b'=').count();
        let line_end = self.line_end(self.pos + run);

        // Prefer closing the full run; fall back to shorter ones
        for level in (1..=run).rev() {
            let title_start = self.pos + level;
            let mut j = title_start;
            while j + level <= line_end {
                if bytes[j..j + level].iter().all(|&b| b == b'=') {
                    let title = self.src[title_start..j].trim();
                    if !title.is_empty() {
                        self.push(Cow::Borrowed(title));
                        self.pos = j + level;
                        return Ok(());
                    }
                }
                j += 1;
            }
        }

        Err(MarkupError::at(
            MarkupErrorKind::UnterminatedHeading,
            self.src,
            self.pos,
        ))
    }

    fn emphasis(&mut self) -> Result<(), MarkupError> {
        let bytes = self.bytes();
        let run = self.rest().iter().take_while(|&&b| b == b'\'').count();
        let line_end = self.line_end(self.pos);

        // Prefer closing the full run; fall back to shorter ones
        for len in (2..=run).rev() {
            let body_start = self.pos + len;
            let close = (body_start..line_end.saturating_sub(len - 1))
                .find(|&j| bytes[j..j + len].iter().all(|&b| b == b'\''));
            if let Some(close) = close {
                let text = self.sub_convert(body_start, close)?;
                self.push(Cow::Owned(text));
                self.pos = close + len;
                return Ok(());
            }
        }

        Err(MarkupError::at(
            MarkupErrorKind::UnterminatedEmphasis,
            self.src,
            self.pos,
        ))
    }
}

struct LinkSpan {
    inner_start: usize,
    inner_end: usize,
    next: usize,
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
