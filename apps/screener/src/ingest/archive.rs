//! Archive unpacking and DOCX→PDF preparation.
//!
//! Everything is written beneath a caller-owned scratch directory; this module
//! never decides when that directory goes away.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::ScreenError;
use crate::ingest::convert::DocumentConverter;
use crate::models::ranking::SkippedDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
}

impl DocumentKind {
    /// Classifies a member by extension. `None` means the member is skipped.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_string_lossy().to_lowercase();
        match ext.as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "docx" => Some(DocumentKind::Docx),
            _ => None,
        }
    }
}

/// A document member written out to scratch storage.
#[derive(Debug, Clone)]
pub struct ArchiveMember {
    pub file_name: String,
    pub path: PathBuf,
    pub kind: DocumentKind,
}

/// A PDF ready for text extraction.
#[derive(Debug, Clone)]
pub struct EligibleDocument {
    pub file_name: String,
    pub path: PathBuf,
}

/// Writes every PDF/DOCX member of `archive` into `dest`, in archive order.
///
/// Directory entries, other file types and names that would escape `dest`
/// are skipped. Each member gets its own numbered subdirectory so equal base
/// names from different folders cannot clobber each other.
pub fn unpack_archive(archive: &Path, dest: &Path) -> Result<Vec<ArchiveMember>, ScreenError> {
    let file = fs::File::open(archive).map_err(|e| {
        ScreenError::InvalidArchive(format!("cannot open {}: {e}", archive.display()))
    })?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| ScreenError::InvalidArchive(format!("{}: {e}", archive.display())))?;

    let mut members = Vec::new();

    for index in 0..zip.len() {
        let mut entry = match zip.by_index(index) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(index, error = %e, "Skipping unreadable archive entry");
                continue;
            }
        };

        if entry.is_dir() {
            continue;
        }

        let Some(relative) = entry.enclosed_name() else {
            warn!(name = entry.name(), "Skipping archive entry with unsafe path");
            continue;
        };
        let Some(file_name) = relative
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
        else {
            continue;
        };

        let Some(kind) = DocumentKind::from_file_name(&file_name) else {
            debug!(name = %file_name, "Skipping non-document archive member");
            continue;
        };

        let member_dir = dest.join(index.to_string());
        fs::create_dir_all(&member_dir).map_err(|e| scratch_error(&member_dir, e))?;
        let path = member_dir.join(&file_name);

        let mut out = fs::File::create(&path).map_err(|e| scratch_error(&path, e))?;
        if let Err(e) = io::copy(&mut entry, &mut out) {
            warn!(name = %file_name, error = %e, "Skipping archive member that failed to decompress");
            continue;
        }

        members.push(ArchiveMember {
            file_name,
            path,
            kind,
        });
    }

    Ok(members)
}

fn scratch_error(path: &Path, e: io::Error) -> ScreenError {
    ScreenError::Internal(anyhow::anyhow!(
        "failed to write scratch file {}: {e}",
        path.display()
    ))
}

/// Turns unpacked members into extraction-ready PDFs.
///
/// PDFs pass straight through. DOCX members are converted next to their
/// source; a failed conversion drops only that member and is reported in the
/// returned skip list.
pub async fn prepare_documents(
    members: Vec<ArchiveMember>,
    converter: &dyn DocumentConverter,
) -> (Vec<EligibleDocument>, Vec<SkippedDocument>) {
    let mut eligible = Vec::with_capacity(members.len());
    let mut skipped = Vec::new();

    for member in members {
        match member.kind {
            DocumentKind::Pdf => eligible.push(EligibleDocument {
                file_name: member.file_name,
                path: member.path,
            }),
            DocumentKind::Docx => {
                let out_dir = member
                    .path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default();
                match converter.to_pdf(&member.path, &out_dir).await {
                    Ok(pdf) => {
                        let file_name = pdf
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_else(|| member.file_name.clone());
                        eligible.push(EligibleDocument {
                            file_name,
                            path: pdf,
                        });
                    }
                    Err(e) => {
                        warn!(file = %member.file_name, error = %e, "Dropping document that failed conversion");
                        skipped.push(SkippedDocument {
                            file_name: member.file_name,
                            reason: format!("CONVERSION_ERROR: {e}"),
                        });
                    }
                }
            }
        }
    }

    (eligible, skipped)
}
