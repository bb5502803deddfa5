use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{ExtractionError, OcrEngine, SecondaryExtractor, TextLayer};

/// Text layer read with `lopdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfTextLayer;

impl TextLayer for LopdfTextLayer {
    fn pages(&self, pdf: &Path) -> Result<Vec<String>, ExtractionError> {
        let document = lopdf::Document::load(pdf).map_err(|err| ExtractionError::Open {
            path: pdf.to_path_buf(),
            message: err.to_string(),
        })?;
        let pages = document
            .get_pages()
            .into_keys()
            .map(|number| match document.extract_text(&[number]) {
                Ok(text) => text,
                Err(err) => {
                    tracing::debug!(path = %pdf.display(), page = number, error = %err, "No text layer on page");
                    String::new()
                }
            })
            .collect();
        Ok(pages)
    }
}

/// Page OCR: `pdftoppm` renders the page, `tesseract` recognises it.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    languages: String,
    dpi: u32,
}

impl TesseractOcr {
    /// OCR with the given tesseract language set (`eng+urd`) and render resolution.
    pub fn new(languages: &str, dpi: u32) -> Self {
        Self {
            languages: languages.to_string(),
            dpi,
        }
    }

    fn render_and_recognize(&self, pdf: &Path, page: u32, workdir: &Path) -> Result<String, String> {
        let prefix = workdir.join("page");
        let page_arg = page.to_string();
        let dpi_arg = self.dpi.to_string();
        let render = Command::new("pdftoppm")
            .args(["-f", page_arg.as_str(), "-l", page_arg.as_str()])
            .args(["-r", dpi_arg.as_str()])
            .args(["-png", "-singlefile"])
            .arg(pdf)
            .arg(&prefix)
            .output()
            .map_err(|err| format!("pdftoppm failed to start: {err}"))?;
        if !render.status.success() {
            return Err(format!(
                "pdftoppm error: {}",
                String::from_utf8_lossy(&render.stderr).trim()
            ));
        }

        let image = prefix.with_extension("png");
        let recognize = Command::new("tesseract")
            .arg(&image)
            .arg("stdout")
            .args(["-l", self.languages.as_str(), "--oem", "3", "--psm", "6"])
            .output()
            .map_err(|err| format!("tesseract failed to start: {err}"))?;
        if !recognize.status.success() {
            return Err(format!(
                "tesseract error: {}",
                String::from_utf8_lossy(&recognize.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&recognize.stdout).into_owned())
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize_page(&self, pdf: &Path, page: u32) -> String {
        let workdir = scratch_dir();
        if let Err(err) = fs::create_dir_all(&workdir) {
            tracing::warn!(error = %err, "Failed to create OCR scratch directory");
            return String::new();
        }
        let text = match self.render_and_recognize(pdf, page, &workdir) {
            Ok(text) => text,
            Err(message) => {
                tracing::warn!(path = %pdf.display(), page, error = %message, "OCR failed");
                String::new()
            }
        };
        fs::remove_dir_all(&workdir).ok();
        text
    }
}

fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("lawpipe-ocr-{}", uuid::Uuid::new_v4()))
}

/// Whole-document extraction with `pdf-extract`.
///
/// The crate panics on some malformed fonts, so extraction runs on its own thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractSecondary;

impl SecondaryExtractor for PdfExtractSecondary {
    fn extract(&self, pdf: &Path) -> Result<String, ExtractionError> {
        let path = pdf.to_path_buf();
        let handle = std::thread::spawn(move || pdf_extract::extract_text(&path));
        match handle.join() {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(err)) => Err(ExtractionError::Open {
                path: pdf.to_path_buf(),
                message: err.to_string(),
            }),
            Err(_) => Err(ExtractionError::Open {
                path: pdf.to_path_buf(),
                message: "pdf-extract panicked".to_string(),
            }),
        }
    }
}
