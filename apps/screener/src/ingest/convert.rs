use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("failed to launch converter '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("converter exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("conversion timed out after {0:?}")]
    TimedOut(Duration),

    #[error("converter reported success but produced no file at {0}")]
    MissingOutput(String),
}

/// Converts a non-PDF document into a PDF inside `out_dir`.
/// Returns the path of the produced PDF.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn to_pdf(&self, input: &Path, out_dir: &Path) -> Result<PathBuf, ConversionError>;
}

/// Headless LibreOffice conversion. The child process is killed if the
/// conversion future is dropped or times out.
#[derive(Debug, Clone)]
pub struct SofficeConverter {
    binary: String,
    timeout: Duration,
}

impl SofficeConverter {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

#[async_trait]
impl DocumentConverter for SofficeConverter {
    async fn to_pdf(&self, input: &Path, out_dir: &Path) -> Result<PathBuf, ConversionError> {
        let mut command = Command::new(&self.binary);
        command
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(out_dir)
            .arg(input)
            .kill_on_drop(true);

        let child = command.output();
        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| ConversionError::TimedOut(self.timeout))?
            .map_err(|source| ConversionError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ConversionError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let produced = converted_path(input, out_dir);
        if !produced.exists() {
            return Err(ConversionError::MissingOutput(produced.display().to_string()));
        }

        debug!(input = %input.display(), output = %produced.display(), "Converted document to PDF");
        Ok(produced)
    }
}

/// Where a converter that keeps the input stem writes its PDF.
pub fn converted_path(input: &Path, out_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    out_dir.join(format!("{stem}.pdf"))
}
