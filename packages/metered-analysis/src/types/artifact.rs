//! Uploaded artifacts and the policy they are validated against.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Raw binary artifact delivered by the upload surface.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl Artifact {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Convenience constructor for PDF uploads.
    pub fn pdf(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self::new(file_name, "application/pdf", bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Accepted content types and size ceiling for uploads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactPolicy {
    pub allowed_content_types: Vec<String>,
    pub max_bytes: usize,
}

impl Default for ArtifactPolicy {
    fn default() -> Self {
        Self {
            allowed_content_types: vec!["application/pdf".to_string()],
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

impl ArtifactPolicy {
    /// Check an artifact against the policy, returning the rejection reason.
    pub fn check(&self, artifact: &Artifact) -> std::result::Result<(), String> {
        if artifact.is_empty() {
            return Err("file is empty".to_string());
        }

        let content_type = artifact
            .content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if !self
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&content_type))
        {
            return Err(format!("unsupported content type: {}", artifact.content_type));
        }

        if artifact.len() > self.max_bytes {
            return Err(format!(
                "file is {} bytes, limit is {} bytes",
                artifact.len(),
                self.max_bytes
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_pdf_within_limit() {
        let policy = ArtifactPolicy::default();
        let artifact = Artifact::pdf("cv.pdf", b"%PDF-1.7 body".to_vec());
        assert!(policy.check(&artifact).is_ok());
    }

    #[test]
    fn content_type_parameters_are_ignored() {
        let policy = ArtifactPolicy::default();
        let artifact = Artifact::new("cv.pdf", "Application/PDF; charset=binary", b"%PDF".to_vec());
        assert!(policy.check(&artifact).is_ok());
    }

    #[test]
    fn rejects_wrong_type_oversize_and_empty() {
        let policy = ArtifactPolicy {
            max_bytes: 4,
            ..Default::default()
        };

        let docx = Artifact::new("cv.docx", "application/msword", b"abc".to_vec());
        assert!(policy.check(&docx).unwrap_err().contains("unsupported"));

        let big = Artifact::pdf("big.pdf", vec![0u8; 5]);
        assert!(policy.check(&big).unwrap_err().contains("limit"));

        let empty = Artifact::pdf("empty.pdf", Vec::new());
        assert_eq!(policy.check(&empty).unwrap_err(), "file is empty");
    }
}
