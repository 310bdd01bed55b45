use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Unsupported document type: '{0}' (supported: image/jpeg, image/png, application/pdf)")]
    UnsupportedMime(String),
}

/// The document encodings accepted by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Jpeg,
    Png,
    Pdf,
}

impl DocumentFormat {
    /// Resolve a declared MIME type. Anything outside the three supported
    /// types is rejected before reaching the core.
    pub fn from_mime(mime: &str) -> Result<Self, DocumentError> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" => Ok(DocumentFormat::Jpeg),
            "image/png" => Ok(DocumentFormat::Png),
            "application/pdf" => Ok(DocumentFormat::Pdf),
            _ => Err(DocumentError::UnsupportedMime(mime.to_string())),
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(DocumentFormat::Jpeg),
            "png" => Some(DocumentFormat::Png),
            "pdf" => Some(DocumentFormat::Pdf),
            _ => None,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            DocumentFormat::Jpeg => "image/jpeg",
            DocumentFormat::Png => "image/png",
            DocumentFormat::Pdf => "application/pdf",
        }
    }

    pub fn is_image(self) -> bool {
        !matches!(self, DocumentFormat::Pdf)
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_supported_mime_types() {
        assert_eq!(DocumentFormat::from_mime("image/jpeg"), Ok(DocumentFormat::Jpeg));
        assert_eq!(DocumentFormat::from_mime("image/jpg"), Ok(DocumentFormat::Jpeg));
        assert_eq!(DocumentFormat::from_mime("IMAGE/PNG"), Ok(DocumentFormat::Png));
        assert_eq!(
            DocumentFormat::from_mime("application/pdf; charset=binary"),
            Ok(DocumentFormat::Pdf)
        );
    }

    #[test]
    fn rejects_everything_else() {
        for mime in ["image/gif", "image/webp", "text/plain", ""] {
            assert_eq!(
                DocumentFormat::from_mime(mime),
                Err(DocumentError::UnsupportedMime(mime.to_string()))
            );
        }
    }

    #[test]
    fn extension_lookup() {
        assert_eq!(DocumentFormat::from_extension("JPG"), Some(DocumentFormat::Jpeg));
        assert_eq!(DocumentFormat::from_extension("pdf"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_extension("tiff"), None);
        assert!(DocumentFormat::Png.is_image());
        assert!(!DocumentFormat::Pdf.is_image());
    }
}
