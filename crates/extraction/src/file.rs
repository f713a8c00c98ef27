use crate::{ExtractionError, ExtractionResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;

/// An order file as submitted for extraction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Only PDFs and images can be read by the vision model.
pub fn is_supported_mime(mime_type: &str) -> bool {
    let mime = mime_type.trim().to_ascii_lowercase();
    mime == "application/pdf" || (mime.starts_with("image/") && mime.len() > "image/".len())
}

impl OrderFile {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Parses a `data:<mime>;base64,<payload>` URI as produced by browser file readers.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::InvalidDataUri`] if the prefix, the base64 marker or the
    /// payload encoding is wrong.
    pub fn from_data_uri(file_name: impl Into<String>, uri: &str) -> ExtractionResult<Self> {
        let rest = uri
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| ExtractionError::InvalidDataUri("missing 'data:' prefix".into()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| ExtractionError::InvalidDataUri("missing ',' separator".into()))?;

        let mut params = header.split(';');
        let mime_type = params.next().unwrap_or_default().trim();
        if mime_type.is_empty() {
            return Err(ExtractionError::InvalidDataUri("missing MIME type".into()));
        }
        if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
            return Err(ExtractionError::InvalidDataUri(
                "only base64 payloads are supported".into(),
            ));
        }

        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| ExtractionError::InvalidDataUri(e.to_string()))?;

        Ok(Self::new(file_name, mime_type.to_ascii_lowercase(), bytes))
    }

    /// Reads a file from disk, sniffing its MIME type from the content and falling back to
    /// the extension.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::FileRead`] if the file cannot be read.
    pub fn from_path(path: &Path) -> ExtractionResult<Self> {
        let bytes = std::fs::read(path).map_err(|source| ExtractionError::FileRead {
            path: path.display().to_string(),
            source,
        })?;

        let mime_type = infer::get(&bytes)
            .map(|kind| kind.mime_type().to_string())
            .unwrap_or_else(|| mime_from_extension(path).to_string());

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self::new(file_name, mime_type, bytes))
    }

    /// Base64 encoding of the file content.
    pub fn base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// Rejects files that must never reach the model.
    pub(crate) fn check(&self, max_bytes: usize) -> ExtractionResult<()> {
        if !is_supported_mime(&self.mime_type) {
            return Err(ExtractionError::UnsupportedMediaType(self.mime_type.clone()));
        }
        if self.bytes.is_empty() {
            return Err(ExtractionError::EmptyFile);
        }
        if self.bytes.len() > max_bytes {
            return Err(ExtractionError::FileTooLarge {
                size: self.bytes.len(),
                limit: max_bytes,
            });
        }
        Ok(())
    }
}

fn mime_from_extension(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "tif" | "tiff" => "image/tiff",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_data_uri() {
        let file = OrderFile::from_data_uri("orden.pdf", "data:application/pdf;base64,JVBERi0=")
            .unwrap();
        assert_eq!(file.mime_type, "application/pdf");
        assert_eq!(file.bytes, b"%PDF-");
        assert_eq!(file.base64(), "JVBERi0=");
    }

    #[test]
    fn data_uri_may_carry_extra_parameters() {
        let file =
            OrderFile::from_data_uri("x.png", "data:image/PNG;name=x.png;base64,iVBORw==").unwrap();
        assert_eq!(file.mime_type, "image/png");
    }

    #[test]
    fn rejects_malformed_data_uris() {
        for bad in [
            "application/pdf;base64,JVBERi0=",
            "data:application/pdf;base64",
            "data:;base64,JVBERi0=",
            "data:application/pdf,plain-text",
            "data:application/pdf;base64,***",
        ] {
            assert!(
                matches!(
                    OrderFile::from_data_uri("f", bad),
                    Err(ExtractionError::InvalidDataUri(_))
                ),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn supported_mime_types() {
        assert!(is_supported_mime("application/pdf"));
        assert!(is_supported_mime("image/jpeg"));
        assert!(is_supported_mime("IMAGE/PNG"));
        assert!(!is_supported_mime("image/"));
        assert!(!is_supported_mime("text/plain"));
        assert!(!is_supported_mime("application/msword"));
    }

    #[test]
    fn check_rejects_before_any_remote_call() {
        let text = OrderFile::new("notas.txt", "text/plain", b"hola".to_vec());
        assert!(matches!(
            text.check(1024),
            Err(ExtractionError::UnsupportedMediaType(_))
        ));

        let empty = OrderFile::new("vacio.pdf", "application/pdf", Vec::new());
        assert!(matches!(empty.check(1024), Err(ExtractionError::EmptyFile)));

        let big = OrderFile::new("grande.pdf", "application/pdf", vec![0u8; 2048]);
        assert!(matches!(
            big.check(1024),
            Err(ExtractionError::FileTooLarge {
                size: 2048,
                limit: 1024
            })
        ));
    }

    #[test]
    fn from_path_sniffs_content_then_extension() {
        let dir = TempDir::new().unwrap();

        let pdf = dir.path().join("orden.bin");
        std::fs::write(&pdf, b"%PDF-1.4\n%%EOF").unwrap();
        let file = OrderFile::from_path(&pdf).unwrap();
        assert_eq!(file.mime_type, "application/pdf");
        assert_eq!(file.file_name, "orden.bin");

        let unknown = dir.path().join("scan.jpeg");
        std::fs::write(&unknown, b"not really a jpeg").unwrap();
        assert_eq!(OrderFile::from_path(&unknown).unwrap().mime_type, "image/jpeg");

        let err = OrderFile::from_path(&dir.path().join("missing.pdf")).unwrap_err();
        assert!(err.is_input_rejection());
    }
}
