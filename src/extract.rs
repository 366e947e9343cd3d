//! Multi-format text extraction for uploaded documents.
//!
//! Dispatch is by file extension: plain-text and subtitle formats pass
//! through as UTF-8, PDF goes through pdf-extract, and docx is unzipped and
//! its `w:t` runs collected. Anything else is rejected up front.

use std::io::Read;

use crate::error::ExtractError;
use crate::storage::file_extension;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extensions accepted for upload.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "srt", "vtt", "pdf", "docx"];

pub fn is_supported(filename: &str) -> bool {
    SUPPORTED_EXTENSIONS.contains(&file_extension(filename).as_str())
}

/// Extracts plain text from an uploaded file's bytes.
pub fn extract_text(bytes: &[u8], original_filename: &str) -> Result<String, ExtractError> {
    match file_extension(original_filename).as_str() {
        "txt" | "srt" | "vtt" => Ok(String::from_utf8_lossy(bytes).into_owned()),
        "pdf" => extract_pdf(bytes),
        "docx" => extract_docx(bytes),
        other => Err(ExtractError::UnsupportedFormat(other.to_string())),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Extraction(e.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Extraction(e.to_string()))?;
    let mut doc_xml = Vec::new();
    let mut found = false;
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| ExtractError::Extraction(e.to_string()))?;
        if entry.name() == "word/document.xml" {
            entry
                .take(MAX_XML_ENTRY_BYTES)
                .read_to_end(&mut doc_xml)
                .map_err(|e| ExtractError::Extraction(e.to_string()))?;
            if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
                return Err(ExtractError::Extraction(
                    "word/document.xml exceeds size limit".to_string(),
                ));
            }
            found = true;
            break;
        }
    }
    if !found {
        return Err(ExtractError::Extraction(
            "word/document.xml not found".to_string(),
        ));
    }
    extract_w_t_elements(&doc_xml)
}

/// Collect the text runs (`w:t` elements) of a docx body, separating
/// paragraphs with spaces.
fn extract_w_t_elements(xml: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"p" && !out.ends_with(' ') && !out.is_empty() {
                    out.push(' ');
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Extraction(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through_verbatim() {
        let body = "Apply early. Visit campuses. Write honest essays.";
        let out = extract_text(body.as_bytes(), "advice.txt").unwrap();
        assert_eq!(out, body);
    }

    #[test]
    fn subtitle_formats_treated_as_text() {
        let srt = "1\n00:00:01,000 --> 00:00:04,000\nWelcome to the info session.\n";
        let out = extract_text(srt.as_bytes(), "session.srt").unwrap();
        assert!(out.contains("Welcome to the info session."));
        assert!(extract_text(b"WEBVTT\n", "session.vtt").is_ok());
    }

    #[test]
    fn unsupported_extension_rejected() {
        let err = extract_text(b"GIF89a", "logo.gif").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat(ref ext) if ext == "gif"));
        assert!(!is_supported("logo.gif"));
        assert!(is_supported("handbook.PDF"));
    }

    #[test]
    fn corrupt_pdf_is_extraction_error() {
        let err = extract_text(b"not a pdf", "broken.pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Extraction(_)));
    }

    #[test]
    fn corrupt_docx_is_extraction_error() {
        let err = extract_text(b"not a zip", "broken.docx").unwrap_err();
        assert!(matches!(err, ExtractError::Extraction(_)));
    }

    #[test]
    fn docx_text_runs_collected() {
        // Minimal docx: a zip with just word/document.xml.
        let mut buf = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            let options = zip::write::SimpleFileOptions::default();
            use std::io::Write;
            writer.start_file("word/document.xml", options).unwrap();
            writer
                .write_all(
                    br#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Financial aid deadlines matter.</w:t></w:r></w:p>
    <w:p><w:r><w:t>File the FAFSA in October.</w:t></w:r></w:p>
  </w:body>
</w:document>"#,
                )
                .unwrap();
            writer.finish().unwrap();
        }

        let out = extract_text(&buf, "aid.docx").unwrap();
        assert!(out.contains("Financial aid deadlines matter."));
        assert!(out.contains("File the FAFSA in October."));
    }
}
