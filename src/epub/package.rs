//! `META-INF/container.xml` and OPF package parsing.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::EpubError;

/// A manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    /// Archive path, already resolved against the package directory.
    pub path: String,
    pub media_type: String,
}

/// The parts of the OPF package needed to read a book in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Package {
    pub title: Option<String>,
    pub manifest: HashMap<String, ManifestItem>,
    /// Manifest ids in reading order, `linear="no"` entries excluded.
    pub spine: Vec<String>,
}

impl Package {
    /// Spine entries that are XHTML content documents, in reading order.
    pub fn content_documents(&self) -> impl Iterator<Item = &ManifestItem> {
        self.spine
            .iter()
            .filter_map(|id| self.manifest.get(id))
            .filter(|item| is_xhtml(&item.media_type))
    }
}

fn is_xhtml(media_type: &str) -> bool {
    matches!(media_type, "application/xhtml+xml" | "text/html")
}

/// Find the OPF path in `META-INF/container.xml`.
pub fn parse_container(xml: &[u8]) -> Result<String, EpubError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"rootfile" => {
                if let Some(path) = attribute(&e, b"full-path", "META-INF/container.xml")? {
                    return Ok(path);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error("META-INF/container.xml", e)),
            _ => {}
        }
        buf.clear();
    }
    Err(EpubError::Package("container.xml has no rootfile".to_string()))
}

/// Parse the OPF package document at archive path `opf_path`.
pub fn parse_package(xml: &[u8], opf_path: &str) -> Result<Package, EpubError> {
    let base_dir = opf_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut package = Package::default();
    let mut in_title = false;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"title" => {
                in_title = package.title.is_none();
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"title" => in_title = false,
            Ok(Event::Text(t)) if in_title => {
                let text = t.unescape().map_err(|e| xml_error(opf_path, e))?;
                let text = text.trim();
                if !text.is_empty() {
                    package.title = Some(text.to_string());
                }
            }
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"item" => {
                    let id = attribute(&e, b"id", opf_path)?;
                    let href = attribute(&e, b"href", opf_path)?;
                    let media_type = attribute(&e, b"media-type", opf_path)?;
                    if let (Some(id), Some(href), Some(media_type)) = (id, href, media_type) {
                        let path = resolve_href(base_dir, &href);
                        package.manifest.insert(id, ManifestItem { path, media_type });
                    }
                }
                b"itemref" => {
                    let linear = attribute(&e, b"linear", opf_path)?;
                    let idref = attribute(&e, b"idref", opf_path)?;
                    if let (Some(idref), false) = (idref, linear.as_deref() == Some("no")) {
                        package.spine.push(idref);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(opf_path, e)),
            _ => {}
        }
        buf.clear();
    }

    if package.spine.is_empty() {
        return Err(EpubError::Package(format!("{opf_path} has an empty spine")));
    }
    Ok(package)
}

fn attribute(e: &BytesStart<'_>, name: &[u8], entry: &str) -> Result<Option<String>, EpubError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| xml_error(entry, err))?;
        if attr.key.local_name().as_ref() == name {
            let value = attr.unescape_value().map_err(|err| xml_error(entry, err))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn xml_error(entry: &str, err: impl std::fmt::Display) -> EpubError {
    EpubError::Xml {
        entry: entry.to_string(),
        message: err.to_string(),
    }
}

/// Resolve a manifest `href` against the package directory: strips any
/// fragment, percent-decodes, and folds `.` / `..` segments.
pub fn resolve_href(base_dir: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or_default();
    let href = percent_decode(href);

    let mut parts: Vec<&str> = base_dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in href.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(v) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(v);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
