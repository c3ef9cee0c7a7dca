//! Streaming reader for encyclopedia XML dumps.
//!
//! Yields one [`RawPage`] per `<page>` element without materializing the
//! document tree. Stream-level problems (bad XML, truncation) are errors;
//! a page whose fields do not parse is reported by [`RawPage::into_page`]
//! so the caller can skip it and carry on.

use crate::error::{DumpError, Error, Result};
use crate::types::Page;
use bzip2::read::MultiBzDecoder;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

/// Read buffer size for the dump file (1 MB).
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Page fields as they appear in the stream, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPage {
    pub title: Option<String>,
    pub id: Option<String>,
    pub ns: Option<String>,
    pub text: Option<String>,
    /// First character-data error seen inside the page.
    pub invalid: Option<String>,
}

impl RawPage {
    /// Validate and convert into a [`Page`].
    ///
    /// `id` and `ns` are required; a missing title or revision text reads
    /// as empty.
    pub fn into_page(self) -> std::result::Result<Page, DumpError> {
        if let Some(reason) = self.invalid {
            return Err(DumpError::InvalidText(reason));
        }
        Ok(Page {
            id: parse_number("id", self.id)?,
            ns: parse_number("ns", self.ns)?,
            title: self.title.unwrap_or_default(),
            text: self.text.unwrap_or_default(),
        })
    }

    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Title => &mut self.title,
            Field::Id => &mut self.id,
            Field::Ns => &mut self.ns,
            Field::Text => &mut self.text,
        }
    }

    fn append(&mut self, field: Field, chunk: &str) {
        self.slot(field).get_or_insert_with(String::new).push_str(chunk);
    }
}

fn parse_number<T: FromStr>(
    field: &'static str,
    value: Option<String>,
) -> std::result::Result<T, DumpError> {
    let value = value.ok_or(DumpError::MissingField(field))?;
    value
        .trim()
        .parse()
        .map_err(|_| DumpError::InvalidNumber { field, value })
}

/// Page children we keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Id,
    Ns,
    Text,
}

/// Which field, if any, the element path below `<page>` designates.
fn field_at(path: &[Vec<u8>]) -> Option<Field> {
    match path {
        [name] if name == b"title" => Some(Field::Title),
        [name] if name == b"id" => Some(Field::Id),
        [name] if name == b"ns" => Some(Field::Ns),
        [rev, text] if rev == b"revision" && text == b"text" => Some(Field::Text),
        _ => None,
    }
}

/// Pull-based `<page>` reader over any buffered source.
pub struct PageReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
}

impl<R: BufRead> PageReader<R> {
    pub fn new(inner: R) -> Self {
        let mut reader = Reader::from_reader(inner);
        reader.config_mut().trim_text(false);
        Self {
            reader,
            buf: Vec::new(),
        }
    }

    /// Read up to the end of the next `<page>` element.
    ///
    /// Returns `Ok(None)` once the stream is exhausted.
    pub fn next_page(&mut self) -> Result<Option<RawPage>> {
        let mut page: Option<RawPage> = None;
        let mut path: Vec<Vec<u8>> = Vec::new();
        let mut field: Option<Field> = None;

        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => {
                    let name = e.local_name().as_ref().to_vec();
                    match page {
                        None => {
                            if name == b"page" {
                                page = Some(RawPage::default());
                            }
                        }
                        Some(ref mut p) => {
                            path.push(name);
                            field = field_at(&path);
                            if let Some(f) = field {
                                p.slot(f).get_or_insert_with(String::new);
                            }
                        }
                    }
                }
                Event::End(_) => {
                    if page.is_some() {
                        if path.pop().is_none() {
                            return Ok(page);
                        }
                        field = None;
                    }
                }
                Event::Empty(e) => {
                    if let Some(p) = page.as_mut() {
                        path.push(e.local_name().as_ref().to_vec());
                        if let Some(f) = field_at(&path) {
                            p.slot(f).get_or_insert_with(String::new);
                        }
                        path.pop();
                    }
                }
                Event::Text(t) => {
                    if let (Some(p), Some(f)) = (page.as_mut(), field) {
                        match t.unescape() {
                            Ok(chunk) => p.append(f, &chunk),
                            Err(e) => {
                                p.invalid.get_or_insert_with(|| e.to_string());
                            }
                        }
                    }
                }
                Event::CData(c) => {
                    if let (Some(p), Some(f)) = (page.as_mut(), field) {
                        match std::str::from_utf8(&c) {
                            Ok(chunk) => p.append(f, chunk),
                            Err(e) => {
                                p.invalid.get_or_insert_with(|| e.to_string());
                            }
                        }
                    }
                }
                Event::Eof => {
                    return match page {
                        Some(_) => Err(Error::TruncatedDump),
                        None => Ok(None),
                    };
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for PageReader<R> {
    type Item = Result<RawPage>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_page().transpose()
    }
}

/// Whether `path` names a bzip2-compressed dump.
pub fn is_bzip2(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("bz2"))
}

/// Open a dump file, decompressing `.bz2` (multi-stream) on the fly.
pub fn open_dump(path: &Path) -> Result<PageReader<Box<dyn BufRead>>> {
    let file = File::open(path).map_err(|source| Error::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let inner: Box<dyn BufRead> = if is_bzip2(path) {
        let decoder = MultiBzDecoder::new(BufReader::new(file));
        Box::new(BufReader::with_capacity(READ_BUFFER_SIZE, decoder))
    } else {
        Box::new(BufReader::with_capacity(READ_BUFFER_SIZE, file))
    };

    Ok(PageReader::new(inner))
}
