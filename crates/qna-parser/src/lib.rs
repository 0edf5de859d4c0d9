//! QnA Parser - Document loading and chunking
//!
//! Supports loading of:
//! - PDF documents
//! - Markdown and plain text files
//!
//! Each parser implements the `DocumentParser` trait and produces a
//! `ParsedDocument` made of pages. `DocumentChunker` ties a parser registry
//! to a `TextSplitter` and turns a file into ordered `DocumentChunk`s.

use std::path::Path;

use qna_core::{DocumentChunk, QnaError};
use thiserror::Error;

pub mod pdf;
pub mod splitter;

pub use pdf::PdfParser;
pub use splitter::{CharCounter, TextSplitter, TiktokenCounter, TokenCounter};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during document loading and splitting
#[derive(Error, Debug)]
pub enum ParserError {
    /// File format is not supported
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// IO error while reading the file
    #[error("IO error reading file: {path}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// PDF parsing error
    #[error("PDF parsing error: {0}")]
    PdfError(String),

    /// File is corrupted or malformed
    #[error("File is corrupted or malformed: {0}")]
    CorruptedFile(String),

    /// Encoding error
    #[error("Text encoding error: {0}")]
    EncodingError(String),

    /// Tokenizer could not be loaded
    #[error("Tokenizer error: {0}")]
    TokenizerError(String),

    /// Chunk size / overlap combination is unusable
    #[error("Invalid chunk configuration: size {chunk_size}, overlap {chunk_overlap}")]
    InvalidChunkConfig {
        chunk_size: usize,
        chunk_overlap: usize,
    },
}

impl From<ParserError> for QnaError {
    fn from(err: ParserError) -> Self {
        match err {
            ParserError::TokenizerError(_) | ParserError::InvalidChunkConfig { .. } => {
                QnaError::Config(err.to_string())
            }
            other => QnaError::DocumentLoad(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ParserError>;

// ============================================================================
// Parsed Document Types
// ============================================================================

/// Supported file types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Pdf,
    Markdown,
    PlainText,
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "md" | "markdown" => Self::Markdown,
            "txt" | "text" => Self::PlainText,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from path
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pdf => write!(f, "pdf"),
            Self::Markdown => write!(f, "markdown"),
            Self::PlainText => write!(f, "text"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Text of one page (or of the whole file for page-less formats)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-based page number, `None` for page-less formats
    pub number: Option<u32>,
    pub text: String,
}

/// A parsed document with extracted content
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Original file path
    pub file_path: String,

    /// Detected file type
    pub file_type: FileType,

    /// Extracted text, page by page
    pub pages: Vec<PageText>,
}

impl ParsedDocument {
    /// Whether any page carries non-whitespace text
    pub fn has_text(&self) -> bool {
        self.pages.iter().any(|p| !p.text.trim().is_empty())
    }
}

// ============================================================================
// Parser Trait
// ============================================================================

/// Trait for document parsers
pub trait DocumentParser: Send + Sync {
    /// Parse a document from a file path
    fn parse(&self, path: &Path) -> Result<ParsedDocument>;

    /// Get supported file types
    fn supported_types(&self) -> &[FileType];

    /// Check if this parser can handle a file type
    fn can_parse(&self, file_type: FileType) -> bool {
        self.supported_types().contains(&file_type)
    }
}

/// Plain text and markdown parser
pub struct PlainTextParser;

impl DocumentParser for PlainTextParser {
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let bytes = std::fs::read(path).map_err(|e| ParserError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;
        let text = String::from_utf8(bytes).map_err(|e| ParserError::EncodingError(e.to_string()))?;

        Ok(ParsedDocument {
            file_path: path.display().to_string(),
            file_type: FileType::from_path(path),
            pages: vec![PageText { number: None, text }],
        })
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::PlainText, FileType::Markdown]
    }
}

// ============================================================================
// Parser Registry
// ============================================================================

/// Registry of available parsers
pub struct ParserRegistry {
    parsers: Vec<Box<dyn DocumentParser>>,
}

impl ParserRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    /// Registry with the PDF and plain text parsers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(PdfParser::new());
        registry.register(PlainTextParser);
        registry
    }

    /// Register a parser
    pub fn register<P: DocumentParser + 'static>(&mut self, parser: P) {
        self.parsers.push(Box::new(parser));
    }

    /// Find a parser for a file type
    pub fn find_parser(&self, file_type: FileType) -> Option<&dyn DocumentParser> {
        self.parsers
            .iter()
            .find(|p| p.can_parse(file_type))
            .map(|p| p.as_ref())
    }

    /// Parse a file using the appropriate parser
    pub fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let file_type = FileType::from_path(path);

        if file_type == FileType::Unknown {
            return Err(ParserError::UnsupportedFormat(
                path.extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("none")
                    .to_string(),
            ));
        }

        let parser = self
            .find_parser(file_type)
            .ok_or_else(|| ParserError::UnsupportedFormat(file_type.to_string()))?;

        parser.parse(path)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ============================================================================
// Chunking
// ============================================================================

/// Split every page of a parsed document into chunks, in document order
pub fn chunk_document(doc: &ParsedDocument, splitter: &TextSplitter) -> Vec<DocumentChunk> {
    let mut chunks = Vec::new();
    let mut index = 0u32;

    for page in &doc.pages {
        let mut search_from = 0usize;

        for content in splitter.split_text(&page.text) {
            // Chunks are substrings of the page, each starting after the previous one
            let start_index = page.text[search_from..]
                .find(content.as_str())
                .map(|pos| search_from + pos)
                .unwrap_or(search_from);
            search_from = start_index
                + page.text[start_index..]
                    .chars()
                    .next()
                    .map(char::len_utf8)
                    .unwrap_or(0);

            let mut chunk = DocumentChunk::new(content, index, doc.file_path.clone())
                .with_start_index(start_index);
            if let Some(number) = page.number {
                chunk = chunk.with_page(number);
            }

            chunks.push(chunk);
            index += 1;
        }
    }

    chunks
}

/// Loads documents and splits them into chunks
pub struct DocumentChunker {
    registry: ParserRegistry,
    splitter: TextSplitter,
}

impl DocumentChunker {
    pub fn new(splitter: TextSplitter) -> Self {
        Self {
            registry: ParserRegistry::with_defaults(),
            splitter,
        }
    }

    /// Chunker measuring `chunk_size`/`chunk_overlap` in `cl100k_base` tokens
    pub fn with_tiktoken(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        let counter = TiktokenCounter::cl100k()?;
        let splitter = TextSplitter::new(Box::new(counter), chunk_size, chunk_overlap)?;
        Ok(Self::new(splitter))
    }

    pub fn splitter(&self) -> &TextSplitter {
        &self.splitter
    }

    /// Load `path` and split it into ordered chunks
    pub fn extract_chunks(&self, path: &Path) -> Result<Vec<DocumentChunk>> {
        let doc = self.registry.parse(path)?;
        let chunks = chunk_document(&doc, &self.splitter);

        tracing::debug!(
            path = %path.display(),
            file_type = %doc.file_type,
            chunks = chunks.len(),
            "Document split into chunks"
        );

        Ok(chunks)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn text_file(content: &str, suffix: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn char_chunker(size: usize, overlap: usize) -> DocumentChunker {
        DocumentChunker::new(TextSplitter::new(Box::new(CharCounter), size, overlap).unwrap())
    }

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_extension("pdf"), FileType::Pdf);
        assert_eq!(FileType::from_extension("PDF"), FileType::Pdf);
        assert_eq!(FileType::from_extension("md"), FileType::Markdown);
        assert_eq!(FileType::from_extension("txt"), FileType::PlainText);
        assert_eq!(FileType::from_extension("docx"), FileType::Unknown);
        assert_eq!(FileType::from_path(Path::new("a/b/report.Pdf")), FileType::Pdf);
        assert_eq!(FileType::from_path(Path::new("no_extension")), FileType::Unknown);
    }

    #[test]
    fn test_registry_rejects_unknown_format() {
        let registry = ParserRegistry::with_defaults();
        let err = registry.parse(Path::new("slides.pptx")).unwrap_err();
        assert!(matches!(err, ParserError::UnsupportedFormat(ref ext) if ext == "pptx"));

        let qna: QnaError = err.into();
        assert!(matches!(qna, QnaError::DocumentLoad(_)));
    }

    #[test]
    fn test_plain_text_rejects_invalid_utf8() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(&[0xff, 0xfe, 0x00, 0x41]).unwrap();

        let err = PlainTextParser.parse(file.path()).unwrap_err();
        assert!(matches!(err, ParserError::EncodingError(_)));
    }

    #[test]
    fn test_extract_chunks_in_document_order() {
        let content = "Alpha section talks about apples.\n\n\
                       Beta section talks about bananas.\n\n\
                       Gamma section talks about grapes.";
        let file = text_file(content, ".txt");

        let chunks = char_chunker(40, 0).extract_chunks(file.path()).unwrap();

        assert_eq!(chunks.len(), 3);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i as u32);
            assert_eq!(chunk.metadata.page, None);
            assert_eq!(chunk.metadata.source, file.path().display().to_string());
            assert_eq!(
                &content[chunk.metadata.start_index..chunk.metadata.start_index + chunk.content.len()],
                chunk.content
            );
        }
        assert!(chunks[0].content.starts_with("Alpha"));
        assert!(chunks[2].content.starts_with("Gamma"));
    }

    #[test]
    fn test_pages_numbered_and_blank_pages_skipped() {
        let doc = ParsedDocument {
            file_path: "report.pdf".to_string(),
            file_type: FileType::Pdf,
            pages: pdf::split_pages("Page one text.\x0C   \x0CPage three text."),
        };
        let splitter = TextSplitter::new(Box::new(CharCounter), 100, 0).unwrap();

        let chunks = chunk_document(&doc, &splitter);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata.page, Some(1));
        assert_eq!(chunks[1].metadata.page, Some(3));
        assert_eq!(chunks[1].index, 1);
    }

    #[test]
    fn test_repeated_text_gets_increasing_offsets() {
        let doc = ParsedDocument {
            file_path: "notes.txt".to_string(),
            file_type: FileType::PlainText,
            pages: vec![PageText {
                number: None,
                text: "same words\n\nsame words\n\nsame words".to_string(),
            }],
        };
        let splitter = TextSplitter::new(Box::new(CharCounter), 12, 0).unwrap();

        let chunks = chunk_document(&doc, &splitter);
        let offsets: Vec<usize> = chunks.iter().map(|c| c.metadata.start_index).collect();

        assert_eq!(offsets, vec![0, 12, 24]);
    }

    #[test]
    fn test_empty_document_has_no_text() {
        let file = text_file("  \n ", ".md");
        let doc = ParserRegistry::with_defaults().parse(file.path()).unwrap();
        assert_eq!(doc.file_type, FileType::Markdown);
        assert!(!doc.has_text());
        assert!(char_chunker(10, 1).extract_chunks(file.path()).unwrap().is_empty());
    }
}
