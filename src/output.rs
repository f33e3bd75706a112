//! Destinations for extracted pages
//!
//! Two layouts are supported: one text file per page in a directory, or a
//! single stream of records separated by a form-feed line.

use crate::import::Page;
use std::fs;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Record separator of the stream format: blank line, form feed line
pub const RECORD_SEPARATOR: &str = "\n\n\x0c\n";

/// A sink for finished pages
pub trait PageWriter {
    /// Write one page
    fn write_page(&mut self, page: &Page) -> io::Result<()>;

    /// Flush anything still buffered
    fn finish(&mut self) -> io::Result<()>;
}

/// File name for a page title: lower-cased, whitespace runs and `/` replaced by `_`
pub fn file_name_for(title: &str) -> String {
    let mut name = String::with_capacity(title.len() + 4);
    let mut in_gap = false;
    for c in title.chars() {
        if c.is_whitespace() {
            if !in_gap {
                name.push('_');
            }
            in_gap = true;
            continue;
        }
        in_gap = false;
        if c == '/' {
            name.push('_');
        } else {
            name.extend(c.to_lowercase());
        }
    }
    name.push_str(".txt");
    name
}

/// Writes each page to `<dir>/<file_name_for(title)>`
#[derive(Debug)]
pub struct DirectoryWriter {
    dir: PathBuf,
}

impl DirectoryWriter {
    /// Create the directory if needed
    pub fn create(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl PageWriter for DirectoryWriter {
    fn write_page(&mut self, page: &Page) -> io::Result<()> {
        let path = self.dir.join(file_name_for(&page.title));
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(page.markup.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()
    }

    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes all pages to one stream, each followed by [`RECORD_SEPARATOR`]
pub struct StreamWriter<W: Write> {
    out: BufWriter<W>,
}

impl<W: Write> StreamWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: BufWriter::new(out),
        }
    }

    /// Flush and return the underlying writer
    pub fn into_inner(self) -> io::Result<W> {
        self.out.into_inner().map_err(|e| e.into_error())
    }
}

impl<W: Write> PageWriter for StreamWriter<W> {
    fn write_page(&mut self, page: &Page) -> io::Result<()> {
        self.write_record(&page.markup)
    }

    fn finish(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl<W: Write> StreamWriter<W> {
    /// Write a bare text record
    pub fn write_record(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes())?;
        self.out.write_all(RECORD_SEPARATOR.as_bytes())
    }
}

/// Reads back the records of the stream format
pub struct RecordReader<R> {
    input: R,
    line: String,
    done: bool,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            line: String::new(),
            done: false,
        }
    }
}

fn is_separator(line: &str) -> bool {
    line.trim_end_matches(&['\n', '\r'][..]) == "\x0c"
}

fn strip_record_end(mut record: String) -> String {
    if record.ends_with("\n\n") {
        record.truncate(record.len() - 2);
    } else if record.ends_with('\n') {
        record.truncate(record.len() - 1);
    }
    record
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut record = String::new();
        loop {
            self.line.clear();
            match self.input.read_line(&mut self.line) {
                Ok(0) => {
                    self.done = true;
                    return if record.is_empty() {
                        None
                    } else {
                        Some(Ok(strip_record_end(record)))
                    };
                }
                Ok(_) if is_separator(&self.line) => return Some(Ok(strip_record_end(record))),
                Ok(_) => record.push_str(&self.line),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_file_names() {
        assert_eq!(file_name_for("Paris"), "paris.txt");
        assert_eq!(file_name_for("New  York City"), "new_york_city.txt");
        assert_eq!(file_name_for("AC/DC"), "ac_dc.txt");
        assert_eq!(file_name_for("Tab\tand\nline"), "tab_and_line.txt");
        assert_eq!(file_name_for("Ÿ Über"), "ÿ_über.txt");
    }

    #[test]
    fn test_directory_writer() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("pages");
        let mut writer = DirectoryWriter::create(&out).unwrap();

        writer.write_page(&Page::new("Eiffel Tower", "A tower.")).unwrap();
        writer.finish().unwrap();

        let content = fs::read_to_string(out.join("eiffel_tower.txt")).unwrap();
        assert_eq!(content, "A tower.\n");
    }

    #[test]
    fn test_stream_writer_separates_records() {
        let mut writer = StreamWriter::new(Vec::new());
        writer.write_page(&Page::new("A", "first")).unwrap();
        writer.write_page(&Page::new("B", "second\nline")).unwrap();
        writer.finish().unwrap();

        let bytes = writer.into_inner().unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "first\n\n\x0c\nsecond\nline\n\n\x0c\n"
        );
    }

    #[test]
    fn test_record_reader_reads_stream_format() {
        let input = "first\n\n\x0c\nsecond\nline\n\n\x0c\n";
        let records: Vec<String> = RecordReader::new(Cursor::new(input))
            .collect::<io::Result<_>>()
            .unwrap();
        assert_eq!(records, vec!["first", "second\nline"]);
    }

    #[test]
    fn test_record_reader_trailing_record() {
        let input = "one\n\x0c\r\ntwo";
        let records: Vec<String> = RecordReader::new(Cursor::new(input))
            .collect::<io::Result<_>>()
            .unwrap();
        assert_eq!(records, vec!["one", "two"]);
    }

    #[test]
    fn test_record_reader_empty_input() {
        assert_eq!(RecordReader::new(Cursor::new("")).count(), 0);
    }
}
