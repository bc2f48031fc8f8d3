use tubely_core::AppError;

/// Validation errors for uploaded media
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing content type")]
    MissingContentType,

    #[error("Invalid content type: {content_type} (allowed: {allowed:?})")]
    InvalidContentType {
        content_type: String,
        allowed: Vec<String>,
    },

    #[error("Empty file")]
    EmptyFile,
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidContentType { .. } => {
                AppError::UnsupportedMediaType(err.to_string())
            }
            other => AppError::InvalidInput(other.to_string()),
        }
    }
}

/// Strip MIME parameters and lowercase, e.g. `Video/MP4; codecs="avc1"` -> `video/mp4`.
pub fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

/// File extension used for stored objects of a given (normalized) content type.
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    match content_type {
        "video/mp4" => Some("mp4"),
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        _ => None,
    }
}

/// Checks declared content types against an allow-list.
#[derive(Debug, Clone)]
pub struct ContentTypeValidator {
    allowed_content_types: Vec<String>,
}

impl ContentTypeValidator {
    pub fn new(allowed_content_types: Vec<String>) -> Self {
        Self {
            allowed_content_types: allowed_content_types
                .iter()
                .map(|ct| normalize_content_type(ct))
                .collect(),
        }
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed_content_types
    }

    /// Validate a declared content type and return its normalized form.
    pub fn validate(&self, content_type: &str) -> Result<String, ValidationError> {
        let normalized = normalize_content_type(content_type);
        if normalized.is_empty() {
            return Err(ValidationError::MissingContentType);
        }

        if !self.allowed_content_types.iter().any(|ct| ct == &normalized) {
            return Err(ValidationError::InvalidContentType {
                content_type: content_type.to_string(),
                allowed: self.allowed_content_types.clone(),
            });
        }

        Ok(normalized)
    }
}
