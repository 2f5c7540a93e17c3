//! EPUB reading: container, package, and spine documents to an [`Ebook`].

pub mod package;
pub mod text;

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use thiserror::Error;
use zip::ZipArchive;

use crate::library::types::{Chapter, Ebook};

/// Decompressed size limit for any single archive entry.
const MAX_ENTRY_BYTES: u64 = 64 * 1024 * 1024;

const CONTAINER_PATH: &str = "META-INF/container.xml";

#[derive(Debug, Error)]
pub enum EpubError {
    #[error("cannot open EPUB: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid EPUB archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("malformed XML in {entry}: {message}")]
    Xml { entry: String, message: String },

    #[error("invalid EPUB package: {0}")]
    Package(String),
}

/// Read the EPUB at `path` into chapters of sentences, in spine order.
///
/// Spine documents that contain no text are skipped. A chapter's title is
/// its first heading, then its `<title>`, then its archive path.
pub fn read_epub(path: &Path) -> Result<Ebook, EpubError> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)?;

    let container = read_entry(&mut archive, CONTAINER_PATH)?;
    let opf_path = package::parse_container(&container)?;
    let opf = read_entry(&mut archive, &opf_path)?;
    let package = package::parse_package(&opf, &opf_path)?;

    let mut chapters = Vec::new();
    for item in package.content_documents() {
        let bytes = match read_entry(&mut archive, &item.path) {
            Ok(bytes) => bytes,
            Err(EpubError::Archive(zip::result::ZipError::FileNotFound)) => {
                tracing::warn!(entry = %item.path, "spine entry missing from archive, skipping");
                continue;
            }
            Err(e) => return Err(e),
        };
        let xhtml = String::from_utf8_lossy(&bytes);
        let doc = text::parse_xhtml(&xhtml).map_err(|e| EpubError::Xml {
            entry: item.path.clone(),
            message: e.to_string(),
        })?;

        let sentences = text::split_sentences(&doc.blocks);
        if sentences.is_empty() {
            tracing::debug!(entry = %item.path, "no text, skipping");
            continue;
        }
        let title = doc
            .heading
            .or(doc.title)
            .unwrap_or_else(|| item.path.clone());
        chapters.push(Chapter {
            title,
            raw_content: xhtml.into_owned(),
            sentences,
        });
    }

    let title = package.title.unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Untitled".to_string())
    });
    tracing::debug!(%title, chapters = chapters.len(), "read EPUB");
    Ok(Ebook { title, chapters })
}

fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Vec<u8>, EpubError> {
    let entry = archive.by_name(name)?;
    let mut out = Vec::new();
    entry.take(MAX_ENTRY_BYTES).read_to_end(&mut out)?;
    if out.len() as u64 >= MAX_ENTRY_BYTES {
        return Err(EpubError::Package(format!(
            "{name} exceeds {MAX_ENTRY_BYTES} bytes"
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_epub(path: &Path, files: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        for (name, body) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    const CONTAINER: &str = r#"<container><rootfiles><rootfile full-path="content.opf"/></rootfiles></container>"#;

    #[test]
    fn reads_spine_in_order_and_skips_empty_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.epub");
        write_epub(
            &path,
            &[
                ("mimetype", "application/epub+zip"),
                (CONTAINER_PATH, CONTAINER),
                (
                    "content.opf",
                    r#"<package><metadata><title>Tiny</title></metadata>
                    <manifest>
                      <item id="a" href="a.xhtml" media-type="application/xhtml+xml"/>
                      <item id="cover" href="cover.xhtml" media-type="application/xhtml+xml"/>
                      <item id="b" href="b.xhtml" media-type="application/xhtml+xml"/>
                    </manifest>
                    <spine><itemref idref="cover"/><itemref idref="b"/><itemref idref="a"/></spine>
                    </package>"#,
                ),
                ("cover.xhtml", "<html><body><img src=\"c.png\"/></body></html>"),
                ("a.xhtml", "<html><head><title>A</title></head><body><p>One. Two.</p></body></html>"),
                ("b.xhtml", "<html><body><h2>Bee</h2><p>Three.</p></body></html>"),
            ],
        );

        let book = read_epub(&path).unwrap();
        assert_eq!(book.title, "Tiny");
        let titles: Vec<&str> = book.chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Bee", "A"]);
        assert_eq!(book.chapters[0].sentences, vec!["Bee", "Three."]);
        assert_eq!(book.chapters[1].sentences, vec!["One.", "Two."]);
    }

    #[test]
    fn missing_container_is_an_archive_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.epub");
        write_epub(&path, &[("mimetype", "application/epub+zip")]);
        assert!(matches!(read_epub(&path), Err(EpubError::Archive(_))));
    }

    #[test]
    fn not_a_zip_is_an_archive_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.epub");
        std::fs::write(&path, "hello").unwrap();
        assert!(matches!(read_epub(&path), Err(EpubError::Archive(_))));
    }
}
