//! PDF text extraction via pdfium.
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and blocks, so every call here runs inside
//! `tokio::task::spawn_blocking`.
//!
//! The pdfium shared library is located through `PDFIUM_LIB_PATH` (a file or
//! the directory containing it) and otherwise through the system loader.

use crate::error::TakeoffError;
use crate::output::{DocumentMetadata, DocumentText};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming the pdfium library file or its directory.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Separator placed between the text of consecutive pages.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Extract the text layer of every page, joined with [`PAGE_SEPARATOR`].
///
/// `file_name` and `file_size` are carried into the returned
/// [`DocumentText`] unchanged.
pub async fn extract_text(
    pdf_path: &Path,
    password: Option<&str>,
    file_name: &str,
    file_size: u64,
) -> Result<DocumentText, TakeoffError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(str::to_string);

    let (text, page_count) =
        tokio::task::spawn_blocking(move || extract_text_blocking(&path, pwd.as_deref()))
            .await
            .map_err(|e| TakeoffError::Internal(format!("Text task panicked: {}", e)))??;

    info!(
        "Extracted {} chars from {} pages of {}",
        text.chars().count(),
        page_count,
        file_name
    );

    Ok(DocumentText {
        text,
        file_name: file_name.to_string(),
        file_size,
        page_count,
    })
}

fn extract_text_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<(String, usize), TakeoffError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, pdf_path, password)?;

    let pages = document.pages();
    let page_count = pages.len() as usize;
    let mut page_texts = Vec::with_capacity(page_count);

    for (idx, page) in pages.iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| TakeoffError::TextExtractionFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?
            .all();
        debug!("Page {}: {} chars", idx + 1, text.len());
        if text.trim().is_empty() {
            warn!("Page {} has no text layer", idx + 1);
        }
        page_texts.push(text);
    }

    Ok((page_texts.join(PAGE_SEPARATOR), page_count))
}

/// Read document metadata without touching page content.
pub async fn extract_metadata(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, TakeoffError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(str::to_string);

    tokio::task::spawn_blocking(move || extract_metadata_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| TakeoffError::Internal(format!("Metadata task panicked: {}", e)))?
}

fn extract_metadata_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, TakeoffError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, pdf_path, password)?;

    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata
            .get(tag)
            .map(|t| t.value().to_string())
            .filter(|v| !v.is_empty())
    };

    Ok(DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
    })
}

/// Bind to pdfium: `PDFIUM_LIB_PATH` first, then the system library.
fn bind_pdfium() -> Result<Pdfium, TakeoffError> {
    let bindings = match std::env::var_os(PDFIUM_LIB_PATH_ENV) {
        Some(p) => {
            let lib = library_file(PathBuf::from(p));
            debug!("Binding pdfium from {}", lib.display());
            Pdfium::bind_to_library(lib.to_string_lossy().as_ref()).map_err(|e| {
                TakeoffError::PdfiumBindingFailed(format!("{}: {:?}", lib.display(), e))
            })?
        }
        None => Pdfium::bind_to_system_library()
            .map_err(|e| TakeoffError::PdfiumBindingFailed(format!("{:?}", e)))?,
    };
    Ok(Pdfium::new(bindings))
}

/// A directory is expanded to the platform library name inside it.
fn library_file(path: PathBuf) -> PathBuf {
    if path.is_dir() {
        PathBuf::from(Pdfium::pdfium_platform_library_name_at_path(
            path.to_string_lossy().as_ref(),
        ))
    } else {
        path
    }
}

fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, TakeoffError> {
    pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| map_load_error(pdf_path, password.is_some(), format!("{:?}", e)))
}

fn map_load_error(pdf_path: &Path, had_password: bool, detail: String) -> TakeoffError {
    let path = pdf_path.to_path_buf();
    let lower = detail.to_lowercase();
    if lower.contains("password") || lower.contains("encrypt") {
        if had_password {
            TakeoffError::WrongPassword { path }
        } else {
            TakeoffError::PasswordRequired { path }
        }
    } else {
        TakeoffError::CorruptPdf { path, detail }
    }
}
