//! Text extraction for topic document directories.
//!
//! Dispatches on file extension (case-insensitive): `.pdf`, `.docx`,
//! `.txt`, `.md`. Extraction never aborts a scan — unsupported extensions
//! and malformed files both yield `None`, logged at the appropriate level,
//! and the caller counts the file as skipped.

use std::io::Read;
use std::path::Path;

use tracing::{error, warn};

/// Extensions the scanner enumerates. Kept in one place so the glob set
/// and the dispatch table cannot drift apart.
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["pdf", "docx", "txt", "md"];

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extract plain text from a document file, or `None` if it cannot be read.
///
/// PDF pages and DOCX paragraphs are joined with newline separators.
/// Text and markdown files are read with lossy UTF-8 decoding, so
/// undecodable bytes degrade to replacement characters instead of errors.
pub fn extract(path: &Path) -> Option<String> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let result = match ext.as_str() {
        "pdf" => extract_pdf(path),
        "docx" => extract_docx(path),
        "txt" | "md" => extract_text_file(path),
        _ => {
            warn!(path = %path.display(), "unsupported file format");
            return None;
        }
    };

    match result {
        Ok(text) => Some(text),
        Err(e) => {
            error!(path = %path.display(), error = %e, "text extraction failed");
            None
        }
    }
}

fn extract_pdf(path: &Path) -> anyhow::Result<String> {
    let bytes = std::fs::read(path)?;
    // pdf-extract joins pages with newlines itself.
    let text = pdf_extract::extract_text_from_mem(&bytes)?;
    Ok(text)
}

fn extract_text_file(path: &Path) -> anyhow::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn extract_docx(path: &Path) -> anyhow::Result<String> {
    let bytes = std::fs::read(path)?;
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.as_slice()))?;
    let entry = archive.by_name("word/document.xml")?;
    let mut doc_xml = Vec::new();
    entry.take(MAX_XML_ENTRY_BYTES).read_to_end(&mut doc_xml)?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        anyhow::bail!("word/document.xml exceeds size limit");
    }
    extract_paragraph_text(&doc_xml)
}

/// Pull the `<w:t>` runs out of a DOCX body, one output line per `<w:p>`.
fn extract_paragraph_text(xml: &[u8]) -> anyhow::Result<String> {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        current.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"p" {
                    paragraphs.push(std::mem::take(&mut current));
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => anyhow::bail!("DOCX parse error: {}", e),
            _ => {}
        }
        buf.clear();
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }
    Ok(paragraphs.join("\n"))
}
