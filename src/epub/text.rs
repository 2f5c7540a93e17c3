//! XHTML content documents to text blocks, and blocks to sentences.
//!
//! Block-level elements end the current block. `<pre>` content is kept
//! verbatim as a single block and is never split into sentences, so code
//! listings stay in one piece.

use std::borrow::Cow;

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;
use unicode_segmentation::UnicodeSegmentation;

/// A run of text between block boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub text: String,
    pub preformatted: bool,
}

/// Text extracted from one XHTML document.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Document {
    /// Contents of `<head><title>`.
    pub title: Option<String>,
    /// First `<h1>`..`<h3>` in the body.
    pub heading: Option<String>,
    pub blocks: Vec<Block>,
}

const BLOCK_ELEMENTS: &[&[u8]] = &[
    b"p", b"div", b"section", b"article", b"aside", b"header", b"footer", b"nav",
    b"h1", b"h2", b"h3", b"h4", b"h5", b"h6", b"li", b"ul", b"ol", b"dl", b"dt", b"dd",
    b"blockquote", b"table", b"tr", b"td", b"th", b"figure", b"figcaption", b"body",
    b"br", b"hr",
];

const HEADINGS: &[&[u8]] = &[b"h1", b"h2", b"h3"];

#[derive(Default)]
struct Parser {
    doc: Document,
    current: String,
    in_head: bool,
    skip_depth: usize,
    pre_depth: usize,
    title: Option<String>,
    heading: Option<(Vec<u8>, String)>,
}

impl Parser {
    fn start(&mut self, e: &BytesStart<'_>) {
        let name = e.local_name().as_ref().to_ascii_lowercase();
        match name.as_slice() {
            b"head" => self.in_head = true,
            b"script" | b"style" => self.skip_depth += 1,
            b"title" if self.in_head => self.title = Some(String::new()),
            b"pre" => {
                if self.pre_depth == 0 {
                    self.flush();
                }
                self.pre_depth += 1;
            }
            n if self.pre_depth == 0 && BLOCK_ELEMENTS.contains(&n) => {
                self.flush();
                if self.doc.heading.is_none() && self.heading.is_none() && HEADINGS.contains(&n) {
                    self.heading = Some((name.clone(), String::new()));
                }
            }
            _ => {}
        }
    }

    fn end(&mut self, name: &[u8]) {
        let name = name.to_ascii_lowercase();
        match name.as_slice() {
            b"head" => self.in_head = false,
            b"script" | b"style" => self.skip_depth = self.skip_depth.saturating_sub(1),
            b"title" if self.in_head => {
                if let Some(title) = self.title.take() {
                    self.doc.title = non_empty(&title);
                }
            }
            b"pre" => {
                self.pre_depth = self.pre_depth.saturating_sub(1);
                if self.pre_depth == 0 {
                    self.flush_pre();
                }
            }
            n if self.pre_depth == 0 && BLOCK_ELEMENTS.contains(&n) => {
                if let Some((tag, text)) = self.heading.take() {
                    if tag == name {
                        self.doc.heading = non_empty(&text);
                    } else {
                        self.heading = Some((tag, text));
                    }
                }
                self.flush();
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.skip_depth > 0 {
            return;
        }
        if self.in_head {
            if let Some(title) = self.title.as_mut() {
                title.push_str(text);
            }
            return;
        }
        if let Some((_, heading)) = self.heading.as_mut() {
            heading.push_str(text);
        }
        self.current.push_str(text);
    }

    fn flush(&mut self) {
        let text = normalize_whitespace(&self.current);
        self.current.clear();
        if !text.is_empty() {
            self.doc.blocks.push(Block {
                text,
                preformatted: false,
            });
        }
    }

    fn flush_pre(&mut self) {
        let text = self.current.trim_matches('\n').trim_end().to_string();
        self.current.clear();
        if !text.trim().is_empty() {
            self.doc.blocks.push(Block {
                text,
                preformatted: true,
            });
        }
    }

    fn finish(mut self) -> Document {
        if self.pre_depth > 0 {
            self.flush_pre();
        } else {
            self.flush();
        }
        self.doc
    }
}

/// Extract the title, first heading and text blocks of an XHTML document.
pub fn parse_xhtml(xhtml: &str) -> Result<Document, quick_xml::Error> {
    let mut reader = Reader::from_str(xhtml);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut parser = Parser::default();
    loop {
        match reader.read_event()? {
            Event::Start(e) => parser.start(&e),
            Event::Empty(e) => {
                parser.start(&e);
                parser.end(e.local_name().as_ref());
            }
            Event::End(e) => parser.end(e.local_name().as_ref()),
            Event::Text(t) => parser.text(&decode_text(&t)),
            Event::CData(c) => parser.text(&String::from_utf8_lossy(&c)),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(parser.finish())
}

/// Split blocks into sentences. Preformatted blocks become one sentence each.
pub fn split_sentences(blocks: &[Block]) -> Vec<String> {
    let mut sentences = Vec::new();
    for block in blocks {
        if block.preformatted {
            sentences.push(block.text.clone());
            continue;
        }
        sentences.extend(
            block
                .text
                .unicode_sentences()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
    }
    sentences
}

fn decode_text<'a>(t: &'a BytesText<'a>) -> Cow<'a, str> {
    t.unescape_with(html_entity)
        .unwrap_or_else(|_| String::from_utf8_lossy(t))
}

/// The HTML entities that show up in ebook XHTML without a DTD.
fn html_entity(name: &str) -> Option<&'static str> {
    Some(match name {
        "nbsp" => "\u{a0}",
        "mdash" => "\u{2014}",
        "ndash" => "\u{2013}",
        "hellip" => "\u{2026}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "copy" => "\u{a9}",
        "shy" => "",
        _ => return None,
    })
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(s: &str) -> Option<String> {
    let s = normalize_whitespace(s);
    (!s.is_empty()).then_some(s)
}
