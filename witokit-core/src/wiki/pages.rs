//! Streaming reader for MediaWiki XML export files.

use bzip2::read::MultiBzDecoder;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::markup::to_plain_text;
use crate::contract::{Article, ArticleExtractor, Articles};
use crate::error::ExtractError;

const READ_BUFFER: usize = 1024 * 1024;

/// Pulls articles out of a `pages-articles` dump shard, plain or `.bz2`.
///
/// Only pages in the configured namespaces (main namespace by default) that
/// are not redirects are yielded. Pages are parsed one at a time, so memory
/// does not grow with the shard.
#[derive(Debug, Clone)]
pub struct WikiXmlExtractor {
    namespaces: Vec<i64>,
}

impl Default for WikiXmlExtractor {
    fn default() -> Self {
        Self {
            namespaces: vec![0],
        }
    }
}

impl WikiXmlExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespaces(mut self, namespaces: Vec<i64>) -> Self {
        self.namespaces = namespaces;
        self
    }
}

impl ArticleExtractor for WikiXmlExtractor {
    fn articles(&self, path: &Path) -> Result<Articles, ExtractError> {
        let file = File::open(path).map_err(|source| ExtractError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let source: Box<dyn BufRead + Send> = if is_bz2(path) {
            Box::new(BufReader::with_capacity(READ_BUFFER, MultiBzDecoder::new(file)))
        } else {
            Box::new(BufReader::with_capacity(READ_BUFFER, file))
        };
        debug!(path = %path.display(), "Opened dump shard");
        Ok(Box::new(Pages {
            path: path.to_path_buf(),
            reader: Reader::from_reader(source),
            buf: Vec::with_capacity(8192),
            namespaces: self.namespaces.clone(),
            done: false,
        }))
    }
}

fn is_bz2(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "bz2")
}

#[derive(Debug, Default)]
struct PartialPage {
    id: Option<String>,
    title: String,
    ns: Option<i64>,
    text: String,
    redirect: bool,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Ns,
    Id,
    Text,
}

struct Pages {
    path: PathBuf,
    reader: Reader<Box<dyn BufRead + Send>>,
    buf: Vec<u8>,
    namespaces: Vec<i64>,
    done: bool,
}

fn parse_error(path: &Path, err: quick_xml::Error) -> ExtractError {
    match err {
        quick_xml::Error::Io(e) => ExtractError::Io {
            path: path.to_path_buf(),
            source: io::Error::new(e.kind(), e.to_string()),
        },
        other => ExtractError::Xml {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

impl Pages {
    /// Next complete `<page>`, or `None` at the end of the document.
    fn next_page(&mut self) -> Result<Option<PartialPage>, ExtractError> {
        let mut page: Option<PartialPage> = None;
        let mut field: Option<Field> = None;
        let mut value = String::new();
        let mut in_revision = false;

        loop {
            self.buf.clear();
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .map_err(|e| parse_error(&self.path, e))?;

            match event {
                Event::Start(e) => match e.name().as_ref() {
                    b"page" => page = Some(PartialPage::default()),
                    b"revision" => in_revision = true,
                    b"redirect" => mark_redirect(&mut page),
                    b"title" => field = Some(Field::Title),
                    b"ns" => field = Some(Field::Ns),
                    b"id" => field = Some(Field::Id),
                    b"text" => field = Some(Field::Text),
                    _ => {}
                },
                Event::Empty(e) => {
                    if e.name().as_ref() == b"redirect" {
                        mark_redirect(&mut page);
                    }
                }
                Event::Text(e) if field.is_some() => match e.unescape() {
                    Ok(text) => value.push_str(&text),
                    // unknown entity: keep the raw text
                    Err(_) => value.push_str(&String::from_utf8_lossy(&e)),
                },
                Event::CData(e) if field.is_some() => {
                    value.push_str(&String::from_utf8_lossy(&e));
                }
                Event::End(e) => match e.name().as_ref() {
                    b"page" => {
                        if let Some(done) = page.take() {
                            return Ok(Some(done));
                        }
                    }
                    b"revision" => in_revision = false,
                    _ => {
                        let text = std::mem::take(&mut value);
                        if let (Some(f), Some(p)) = (field.take(), page.as_mut()) {
                            match f {
                                Field::Title => p.title = text,
                                Field::Ns => p.ns = text.trim().parse().ok(),
                                Field::Id if !in_revision && p.id.is_none() => p.id = Some(text),
                                Field::Id => {}
                                Field::Text => p.text = text,
                            }
                        }
                    }
                },
                Event::Eof => {
                    return match page {
                        Some(p) => Err(ExtractError::Xml {
                            path: self.path.clone(),
                            reason: format!("unexpected end of file inside page {:?}", p.title),
                        }),
                        None => Ok(None),
                    };
                }
                _ => {}
            }
        }
    }

    fn keep(&self, page: PartialPage) -> Option<Article> {
        if page.redirect || !self.namespaces.contains(&page.ns.unwrap_or(0)) {
            return None;
        }
        let text = to_plain_text(&page.text);
        if text.is_empty() {
            return None;
        }
        Some(Article {
            id: page.id.unwrap_or_default(),
            title: page.title,
            text,
        })
    }
}

fn mark_redirect(page: &mut Option<PartialPage>) {
    if let Some(p) = page {
        p.redirect = true;
    }
}

impl Iterator for Pages {
    type Item = Result<Article, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.next_page() {
                Ok(Some(page)) => {
                    if let Some(article) = self.keep(page) {
                        return Some(Ok(article));
                    }
                }
                Ok(None) => self.done = true,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}
