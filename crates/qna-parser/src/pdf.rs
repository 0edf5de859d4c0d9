//! PDF document parser using pdf-extract
//!
//! Extracts the text layer of a PDF and splits it into pages at the
//! form-feed characters pdf-extract emits between pages.

use std::path::Path;

use crate::{DocumentParser, FileType, PageText, ParsedDocument, ParserError, Result};

/// PDF document parser
#[derive(Debug, Default)]
pub struct PdfParser;

impl PdfParser {
    pub fn new() -> Self {
        Self
    }

    /// Extract the raw text layer of a PDF file
    fn extract_text(&self, path: &Path) -> Result<String> {
        let bytes = std::fs::read(path).map_err(|e| ParserError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        if !bytes.starts_with(b"%PDF") {
            return Err(ParserError::CorruptedFile(format!(
                "{} is not a PDF file",
                path.display()
            )));
        }

        pdf_extract::extract_text_from_mem(&bytes).map_err(|e| ParserError::PdfError(e.to_string()))
    }
}

/// Split extracted text into 1-based pages on form feeds
pub(crate) fn split_pages(text: &str) -> Vec<PageText> {
    text.split('\x0C')
        .enumerate()
        .map(|(i, page)| PageText {
            number: Some(i as u32 + 1),
            text: page.to_string(),
        })
        .collect()
}

impl DocumentParser for PdfParser {
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let text = self.extract_text(path)?;
        let pages = split_pages(&text);

        tracing::debug!(
            path = %path.display(),
            pages = pages.len(),
            chars = text.len(),
            "Extracted PDF text"
        );

        Ok(ParsedDocument {
            file_path: path.display().to_string(),
            file_type: FileType::Pdf,
            pages,
        })
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::Pdf]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_split_pages() {
        let pages = split_pages("first page\x0Csecond page\x0C");
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].number, Some(1));
        assert_eq!(pages[1].text, "second page");
        assert_eq!(pages[2].number, Some(3));
        assert!(pages[2].text.is_empty());
    }

    #[test]
    fn test_rejects_non_pdf_bytes() {
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        file.write_all(b"definitely not a pdf").unwrap();

        let err = PdfParser::new().parse(file.path()).unwrap_err();
        assert!(matches!(err, ParserError::CorruptedFile(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = PdfParser::new()
            .parse(Path::new("/nonexistent/report.pdf"))
            .unwrap_err();
        assert!(matches!(err, ParserError::IoError { .. }));
    }

    #[test]
    fn test_supported_types() {
        let parser = PdfParser::new();
        assert!(parser.can_parse(FileType::Pdf));
        assert!(!parser.can_parse(FileType::PlainText));
    }
}
