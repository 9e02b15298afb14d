// src/extractors/pdf_text.rs
use crate::utils::error::ExtractError;
use std::path::{Path, PathBuf};

/// Produces layout-preserving text for a PDF, pages separated by form feeds.
#[allow(async_fn_in_trait)]
pub trait PdfTextSource {
    /// Name of this backend (for diagnostics).
    fn backend_name(&self) -> &str;

    async fn layout_text(&self, path: &Path) -> Result<String, ExtractError>;
}

/// Runs Poppler's `pdftotext -layout`.
#[derive(Debug, Clone)]
pub struct Pdftotext {
    binary: PathBuf,
}

impl Pdftotext {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }
}

impl Default for Pdftotext {
    fn default() -> Self {
        Self::new("pdftotext")
    }
}

impl PdfTextSource for Pdftotext {
    fn backend_name(&self) -> &str {
        "pdftotext"
    }

    async fn layout_text(&self, path: &Path) -> Result<String, ExtractError> {
        // Surface a missing input as an I/O error rather than a tool failure
        tokio::fs::metadata(path).await?;

        let output = tokio::process::Command::new(&self.binary)
            .arg("-layout")
            .args(["-enc", "UTF-8"])
            .arg(path)
            .arg("-")
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    ExtractError::ToolMissing(self.binary.display().to_string(), e.to_string())
                }
                _ => ExtractError::Io(e),
            })?;

        if !output.status.success() {
            return Err(ExtractError::TextConversion {
                path: path.display().to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        tracing::debug!("{} produced {} bytes for {}", self.backend_name(), output.stdout.len(), path.display());
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
