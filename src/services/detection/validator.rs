// Input Validator
// Checks declared media type and size before any engine is invoked

use thiserror::Error;

/// Upload ceiling: 10 MiB
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Declared media types accepted for analysis (matched as declared, never re-sniffed here)
pub const ALLOWED_MEDIA_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "image/bmp",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No image file provided")]
    MissingFile,
    #[error("Invalid file type. Please upload JPEG, PNG, WebP, GIF, or BMP.")]
    UnsupportedType(String),
    #[error("File too large. Maximum size is {}MB.", .limit / (1024 * 1024))]
    TooLarge { size: usize, limit: usize },
    #[error("Uploaded image is empty")]
    Empty,
}

/// Validate an upload against the allow-list and the configured size ceiling.
pub fn validate_upload(media_type: &str, size: usize, limit: usize) -> Result<(), ValidationError> {
    if !ALLOWED_MEDIA_TYPES.contains(&media_type) {
        return Err(ValidationError::UnsupportedType(media_type.to_string()));
    }
    if size > limit {
        return Err(ValidationError::TooLarge { size, limit });
    }
    if size == 0 {
        return Err(ValidationError::Empty);
    }
    Ok(())
}

/// Media type for a file path, by extension. Used where no declared type exists (CLI input).
pub fn media_type_for_extension(ext: &str) -> Option<&'static str> {
    match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" | "jfif" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_allowed_types() {
        for media_type in ALLOWED_MEDIA_TYPES {
            assert!(validate_upload(media_type, 1024, MAX_UPLOAD_BYTES).is_ok());
        }
    }

    #[test]
    fn test_rejects_unlisted_type() {
        let err = validate_upload("image/tiff", 1024, MAX_UPLOAD_BYTES).unwrap_err();
        assert_eq!(err, ValidationError::UnsupportedType("image/tiff".to_string()));
        assert!(err.to_string().starts_with("Invalid file type"));
    }

    #[test]
    fn test_type_match_is_exact() {
        assert!(validate_upload("IMAGE/JPEG", 10, MAX_UPLOAD_BYTES).is_err());
        assert!(validate_upload("image/jpg", 10, MAX_UPLOAD_BYTES).is_err());
    }

    #[test]
    fn test_size_boundary() {
        assert!(validate_upload("image/png", MAX_UPLOAD_BYTES, MAX_UPLOAD_BYTES).is_ok());
        let err = validate_upload("image/png", MAX_UPLOAD_BYTES + 1, MAX_UPLOAD_BYTES).unwrap_err();
        assert_eq!(err.to_string(), "File too large. Maximum size is 10MB.");
    }

    #[test]
    fn test_rejects_empty_upload() {
        assert_eq!(
            validate_upload("image/gif", 0, MAX_UPLOAD_BYTES),
            Err(ValidationError::Empty)
        );
    }

    #[test]
    fn test_media_type_for_extension() {
        assert_eq!(media_type_for_extension("JPG"), Some("image/jpeg"));
        assert_eq!(media_type_for_extension(".webp"), Some("image/webp"));
        assert_eq!(media_type_for_extension("tiff"), None);
    }
}
