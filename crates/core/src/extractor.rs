use crate::error::IngestError;
use crate::models::Page;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::warn;

pub trait PageExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<Page>, IngestError>;
}

/// Extracts per-page text with `lopdf`. A page whose text cannot be
/// decoded contributes an empty string instead of failing the document;
/// only a document that cannot be loaded at all is an error.
#[derive(Default)]
pub struct LopdfExtractor;

impl PageExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<Page>, IngestError> {
        let document = lopdf::Document::load(path)
            .map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_number, _page_id) in document.get_pages() {
            let text = document.extract_text(&[page_number]).unwrap_or_default();
            pages.push(Page {
                page_number,
                text,
            });
        }

        Ok(pages)
    }
}

/// Run `ocrmypdf` over the source to produce a searchable sibling copy
/// (`<stem>_converted.pdf`). OCR failure is not fatal: the original file is
/// copied to the destination instead. Returns whether OCR was applied and
/// the path to extract from.
pub async fn ocr_to_searchable(source: &Path) -> Result<(bool, PathBuf), IngestError> {
    let stem = source
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| {
            IngestError::MissingFileName(format!("path missing filename: {}", source.display()))
        })?;

    let mut converted = source.to_path_buf();
    converted.set_file_name(format!("{stem}_converted.pdf"));

    let ocr_result = Command::new("ocrmypdf")
        .arg("--deskew")
        .arg("--clean")
        .arg("--force-ocr")
        .arg("--invalidate-digital-signatures")
        .arg(source)
        .arg(&converted)
        .output()
        .await;

    match ocr_result {
        Ok(output) if output.status.success() => Ok((true, converted)),
        Ok(output) => {
            warn!(
                source = %source.display(),
                status = %output.status,
                "ocrmypdf failed, extracting from the original file"
            );
            tokio::fs::copy(source, &converted).await?;
            Ok((false, converted))
        }
        Err(error) => {
            warn!(
                source = %source.display(),
                error = %error,
                "ocrmypdf unavailable, extracting from the original file"
            );
            tokio::fs::copy(source, &converted).await?;
            Ok((false, converted))
        }
    }
}

/// OCR pre-pass followed by page extraction: the full text-extraction
/// front of the ingestion pipeline.
pub async fn extract_document_pages(source: &Path) -> Result<Vec<Page>, IngestError> {
    let (_ocr_applied, searchable) = ocr_to_searchable(source).await?;
    LopdfExtractor.extract_pages(&searchable)
}
