//! Upload gating: file-type check and in-batch duplicate detection.
//!
//! Both checks run before any request is made. A rejected or duplicate file
//! never affects the other files of the batch.

use std::collections::HashSet;

use sha2::{Digest, Sha256};

use crate::config::UploadConfig;
use crate::error::{Error, Result};
use crate::types::UploadFile;

/// Content hash of a file, 32 hex chars (the width the backend stores).
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();
    hex::encode(&result[..16])
}

/// A batch split into what to upload and what was held back.
#[derive(Debug, Default)]
pub struct UploadPlan {
    pub accepted: Vec<UploadFile>,
    /// Filenames rejected by the type gate
    pub rejected: Vec<String>,
    /// Filenames whose content repeats an earlier file in the batch
    pub duplicates: Vec<String>,
}

/// Client-side checks applied to a batch before uploading.
#[derive(Debug, Clone)]
pub struct UploadGate {
    allowed_extensions: Vec<String>,
}

impl UploadGate {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn is_allowed(&self, filename: &str) -> bool {
        let Some((_, ext)) = filename.rsplit_once('.') else {
            return false;
        };
        let ext = ext.to_ascii_lowercase();
        self.allowed_extensions.iter().any(|allowed| *allowed == ext)
    }

    /// Reject a file whose extension is not allowed.
    pub fn check(&self, file: &UploadFile) -> Result<()> {
        if self.is_allowed(&file.filename) {
            Ok(())
        } else {
            Err(Error::UnsupportedFile {
                filename: file.filename.clone(),
            })
        }
    }

    /// Split a batch. Order of accepted files is preserved.
    pub fn plan(&self, files: Vec<UploadFile>) -> UploadPlan {
        let mut plan = UploadPlan::default();
        let mut seen = HashSet::new();

        for file in files {
            if let Err(err) = self.check(&file) {
                tracing::info!(error = %err, "Upload rejected");
                plan.rejected.push(file.filename);
                continue;
            }
            if !seen.insert(content_hash(&file.bytes)) {
                tracing::info!(filename = %file.filename, "Duplicate upload skipped");
                plan.duplicates.push(file.filename);
                continue;
            }
            plan.accepted.push(file);
        }

        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> UploadGate {
        UploadGate::new(&UploadConfig::default())
    }

    #[test]
    fn test_extension_gate() {
        let gate = gate();
        assert!(gate.is_allowed("report.pdf"));
        assert!(gate.is_allowed("REPORT.PDF"));
        assert!(!gate.is_allowed("notes.txt"));
        assert!(!gate.is_allowed("pdf"));

        let err = gate
            .check(&UploadFile::new("image.png", vec![1, 2, 3]))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFile { ref filename } if filename == "image.png"));
    }

    #[test]
    fn test_configured_extensions() {
        let gate = UploadGate::new(&UploadConfig {
            allowed_extensions: vec![".PDF".to_string(), "md".to_string()],
        });
        assert!(gate.is_allowed("a.pdf"));
        assert!(gate.is_allowed("b.md"));
    }

    #[test]
    fn test_plan_keeps_good_files_when_others_fail() {
        let plan = gate().plan(vec![
            UploadFile::new("a.pdf", b"%PDF-1.4 a".to_vec()),
            UploadFile::new("b.docx", b"docx".to_vec()),
            UploadFile::new("copy-of-a.pdf", b"%PDF-1.4 a".to_vec()),
            UploadFile::new("c.pdf", b"%PDF-1.4 c".to_vec()),
        ]);

        let accepted: Vec<_> = plan.accepted.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(accepted, vec!["a.pdf", "c.pdf"]);
        assert_eq!(plan.rejected, vec!["b.docx".to_string()]);
        assert_eq!(plan.duplicates, vec!["copy-of-a.pdf".to_string()]);
    }

    #[test]
    fn test_content_hash_width() {
        let hash = content_hash(b"hello");
        assert_eq!(hash.len(), 32);
        assert_eq!(hash, content_hash(b"hello"));
        assert_ne!(hash, content_hash(b"hello!"));
    }
}
