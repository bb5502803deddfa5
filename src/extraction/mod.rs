//! Text extraction from source PDFs with page-level OCR fallback.
//!
//! The text layer is read page by page; pages without any text are rendered and recognised
//! individually so mixed digital/scanned documents keep their digital pages intact. When the
//! whole document still yields almost nothing a secondary whole-document extractor is tried.

mod backends;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use backends::{LopdfTextLayer, PdfExtractSecondary, TesseractOcr};

/// Unrecoverable extraction failures for one document.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The document could not be opened or parsed.
    #[error("Failed to open {path}: {message}")]
    Open {
        /// Source artifact.
        path: PathBuf,
        /// Backend error text.
        message: String,
    },
    /// The file type is not handled.
    #[error("Unsupported file type: {0}")]
    Unsupported(PathBuf),
    /// Every backend returned empty text.
    #[error("No text could be extracted from {0}")]
    Empty(PathBuf),
}

/// Reads the embedded text layer of a PDF.
pub trait TextLayer: Send + Sync {
    /// Text of every page in page order; unreadable pages yield empty strings.
    fn pages(&self, pdf: &Path) -> Result<Vec<String>, ExtractionError>;
}

/// Renders one page and recognises its text.
pub trait OcrEngine: Send + Sync {
    /// Recognised text of the 1-based `page`, or an empty string on failure.
    fn recognize_page(&self, pdf: &Path, page: u32) -> String;
}

/// Whole-document extractor used when the text layer and OCR yield too little.
pub trait SecondaryExtractor: Send + Sync {
    /// Full document text.
    fn extract(&self, pdf: &Path) -> Result<String, ExtractionError>;
}

/// Extracted text and how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Page texts joined by blank lines.
    pub text: String,
    /// Whether at least one page was recognised by OCR.
    pub ocr_used: bool,
    /// Number of pages in the document.
    pub page_count: usize,
}

impl Extraction {
    /// Label recorded in `extraction_info.method`.
    pub fn method(&self) -> &'static str {
        if self.ocr_used { "OCR + Text" } else { "Text Only" }
    }

    /// Whitespace-delimited word count.
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Combines the text layer, OCR, and the secondary extractor.
pub struct Extractor {
    text_layer: Box<dyn TextLayer>,
    ocr: Box<dyn OcrEngine>,
    secondary: Box<dyn SecondaryExtractor>,
    min_chars: usize,
}

impl Extractor {
    /// Assemble an extractor from its backends.
    pub fn new(
        text_layer: Box<dyn TextLayer>,
        ocr: Box<dyn OcrEngine>,
        secondary: Box<dyn SecondaryExtractor>,
        min_chars: usize,
    ) -> Self {
        Self {
            text_layer,
            ocr,
            secondary,
            min_chars,
        }
    }

    /// Production backends: lopdf text layer, pdftoppm + tesseract OCR, pdf-extract fallback.
    pub fn with_system_backends(ocr_languages: &str, ocr_dpi: u32, min_chars: usize) -> Self {
        Self::new(
            Box::new(LopdfTextLayer),
            Box::new(TesseractOcr::new(ocr_languages, ocr_dpi)),
            Box::new(PdfExtractSecondary),
            min_chars,
        )
    }

    /// Extract the text of the PDF at `path`. Never returns empty text.
    pub fn extract(&self, path: &Path) -> Result<Extraction, ExtractionError> {
        let is_pdf = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            return Err(ExtractionError::Unsupported(path.to_path_buf()));
        }

        let pages = self.text_layer.pages(path)?;
        let page_count = pages.len();
        let mut parts = Vec::with_capacity(page_count);
        let mut ocr_used = false;

        for (index, page_text) in pages.into_iter().enumerate() {
            if !page_text.trim().is_empty() {
                parts.push(page_text);
                continue;
            }
            let page = u32::try_from(index + 1).unwrap_or(u32::MAX);
            let recognized = self.ocr.recognize_page(path, page);
            if !recognized.trim().is_empty() {
                tracing::debug!(path = %path.display(), page, "Page recognised with OCR");
                parts.push(recognized);
                ocr_used = true;
            }
        }

        let aggregate: usize = parts.iter().map(|part| part.trim().chars().count()).sum();
        if parts.is_empty() || aggregate < self.min_chars {
            tracing::info!(
                path = %path.display(),
                chars = aggregate,
                "Text layer too thin; trying secondary extractor"
            );
            match self.secondary.extract(path) {
                Ok(text) if text.trim().chars().count() > self.min_chars => {
                    parts = vec![text];
                    ocr_used = false;
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "Secondary extractor failed");
                }
            }
        }

        let text = parts.join("\n\n");
        if text.trim().is_empty() {
            return Err(ExtractionError::Empty(path.to_path_buf()));
        }
        Ok(Extraction {
            text,
            ocr_used,
            page_count,
        })
    }
}
