//! Result classification of a single processing request
//!
//! Every request ends in exactly one [`ProcessingOutcome`], and every
//! outcome maps to exactly one user-visible message.

use crate::messages::RETRY_HINT;

/// Longest excerpt of a diagnostic body shown to users or logged
pub const EXCERPT_MAX_CHARS: usize = 200;

/// Terminal result of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingOutcome {
    /// The API returned image bytes
    Success { bytes: Vec<u8>, content_type: String },
    /// The API answered with a non-2xx status
    ApiError {
        status_code: u16,
        title: String,
        detail: String,
    },
    /// The call exceeded its time budget
    Timeout,
    /// Connection or transfer failure (processing API or chat download)
    TransportError { cause: String },
    /// A 2xx response that is not an image
    UnexpectedContent { raw_prefix: String },
    /// Anything else, including panics inside the request
    InternalError { cause: String },
}

/// Discriminant of [`ProcessingOutcome`], for logging and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Success,
    ApiError,
    Timeout,
    TransportError,
    UnexpectedContent,
    InternalError,
}

impl OutcomeKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::ApiError => "api_error",
            Self::Timeout => "timeout",
            Self::TransportError => "transport_error",
            Self::UnexpectedContent => "unexpected_content",
            Self::InternalError => "internal_error",
        }
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProcessingOutcome {
    #[must_use]
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Success { .. } => OutcomeKind::Success,
            Self::ApiError { .. } => OutcomeKind::ApiError,
            Self::Timeout => OutcomeKind::Timeout,
            Self::TransportError { .. } => OutcomeKind::TransportError,
            Self::UnexpectedContent { .. } => OutcomeKind::UnexpectedContent,
            Self::InternalError { .. } => OutcomeKind::InternalError,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Message shown to the requester for a failed request
    ///
    /// Returns `None` for `Success`, which is delivered as a document.
    #[must_use]
    pub fn failure_message(&self) -> Option<String> {
        let body = match self {
            Self::Success { .. } => return None,
            Self::ApiError {
                status_code,
                title,
                detail,
            } => {
                let reason = if detail.is_empty() || detail == title {
                    title.clone()
                } else {
                    format!("{}: {}", title, detail)
                };
                format!(
                    "❌ The background removal service rejected the image (HTTP {}).\n{}",
                    status_code, reason
                )
            },
            Self::Timeout => {
                "⌛ The background removal service took too long to answer.".to_string()
            },
            Self::TransportError { .. } => {
                "📡 I couldn't reach the servers needed to process your photo.".to_string()
            },
            Self::UnexpectedContent { .. } => {
                "❌ The background removal service returned something that isn't an image."
                    .to_string()
            },
            Self::InternalError { .. } => "⚠️ Something went wrong on my side.".to_string(),
        };
        Some(format!("{}\n\n{}", body, RETRY_HINT))
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut with "…"
#[must_use]
pub fn truncate_excerpt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((byte_index, _)) => {
            let mut cut = trimmed.get(..byte_index).unwrap_or_default().to_string();
            cut.push('…');
            cut
        },
        None => trimmed.to_string(),
    }
}

/// Media type without parameters, lowercased ("Image/PNG; q=1" -> "image/png")
#[must_use]
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Whether a declared content type is an image type
#[must_use]
pub fn is_image_content_type(content_type: &str) -> bool {
    let essence = essence(content_type);
    essence
        .strip_prefix("image/")
        .is_some_and(|subtype| !subtype.is_empty())
}

/// Image file extensions and the content type each one is uploaded as
const IMAGE_EXTENSIONS: [(&str, &str); 9] = [
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("webp", "image/webp"),
    ("gif", "image/gif"),
    ("bmp", "image/bmp"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("heic", "image/heic"),
];

/// Image content type implied by a file name's extension
#[must_use]
pub fn image_content_type_for_name(file_name: &str) -> Option<&'static str> {
    let (_, extension) = file_name.rsplit_once('.')?;
    IMAGE_EXTENSIONS
        .iter()
        .find(|(known, _)| extension.eq_ignore_ascii_case(known))
        .map(|&(_, content_type)| content_type)
}

/// File extension for an image content type
#[must_use]
pub fn extension_for_content_type(content_type: &str) -> String {
    let essence = essence(content_type);
    let subtype = essence.strip_prefix("image/").unwrap_or("png");
    match subtype {
        "jpeg" | "pjpeg" | "jpg" => "jpg".to_string(),
        "svg+xml" => "svg".to_string(),
        "x-icon" | "vnd.microsoft.icon" => "ico".to_string(),
        "" => "png".to_string(),
        other => other
            .trim_start_matches("x-")
            .split('+')
            .next()
            .unwrap_or("png")
            .to_string(),
    }
}

/// Name of the returned document: `<input stem>_no_bg.<ext>`
#[must_use]
pub fn output_file_name(input_name: &str, content_type: &str) -> String {
    let base = input_name.rsplit(['/', '\\']).next().unwrap_or(input_name);
    let stem = match base.rfind('.') {
        Some(dot) if dot > 0 => base.get(..dot).unwrap_or(base),
        _ => base,
    };
    let stem = if stem.trim().is_empty() { "image" } else { stem };
    format!("{}_no_bg.{}", stem, extension_for_content_type(content_type))
}
