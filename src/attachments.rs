//! Validation of files attached to an inquiry.
//!
//! The client sends a JSON array of `{filename, contentType, base64, size}`
//! descriptors. [`AttachmentSet::from_json`] is the one place that array is
//! parsed, decoded and bounded; everything downstream takes the resulting set
//! as-is.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::spam_guard::Rejection;

pub const MAX_FILE_BYTES: usize = 5 * 1024 * 1024;
pub const MAX_TOTAL_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_FILES: usize = 5;

pub const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

/// Attachment descriptor as declared by the client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentDescriptor {
    pub filename: String,
    pub content_type: String,
    pub base64: String,
    #[serde(default)]
    pub size: u64,
}

/// A file that passed every bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    /// Payload exactly as received, already known to decode.
    pub content_base64: String,
    /// Decoded length in bytes.
    pub size: usize,
}

/// Validated attachments of one inquiry. Only constructible through
/// [`AttachmentSet::from_json`] or [`AttachmentSet::empty`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentSet {
    files: Vec<Attachment>,
    total_bytes: usize,
}

impl AttachmentSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses and validates the raw `attachments` form field.
    ///
    /// An empty field yields an empty set. Undecodable input (bad JSON or bad
    /// base64) is logged and also yields an empty set so the inquiry itself
    /// still goes through. Any bound violation rejects the whole submission.
    pub fn from_json(raw: &str, fallback_contact: &str) -> Result<Self, Rejection> {
        if raw.trim().is_empty() {
            return Ok(Self::empty());
        }

        let descriptors: Vec<AttachmentDescriptor> = match serde_json::from_str(raw) {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!("Attachment list is not valid JSON, continuing without files: {}", e);
                return Ok(Self::empty());
            }
        };

        Self::from_descriptors(descriptors, fallback_contact)
    }

    pub fn from_descriptors(
        descriptors: Vec<AttachmentDescriptor>,
        fallback_contact: &str,
    ) -> Result<Self, Rejection> {
        if descriptors.len() > MAX_FILES {
            return Err(Rejection::validation(
                format!(
                    "You can attach up to {} files. Please remove some or email them directly to {}.",
                    MAX_FILES, fallback_contact
                ),
                format!("{} attachments", descriptors.len()),
            ));
        }

        let mut files = Vec::with_capacity(descriptors.len());
        let mut total_bytes = 0usize;

        for descriptor in descriptors {
            let content_type = descriptor.content_type.trim().to_ascii_lowercase();
            if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
                return Err(Rejection::validation(
                    format!(
                        "\"{}\" is not a supported file type. Please attach images, PDF, Word or Excel files.",
                        descriptor.filename
                    ),
                    format!("unsupported content type '{}'", descriptor.content_type),
                ));
            }

            let declared = usize::try_from(descriptor.size).unwrap_or(usize::MAX);
            if declared > MAX_FILE_BYTES {
                return Err(oversized_file(&descriptor.filename, declared, fallback_contact));
            }

            let decoded_len = match STANDARD.decode(descriptor.base64.trim()) {
                Ok(bytes) => bytes.len(),
                Err(e) => {
                    tracing::warn!(
                        "Attachment '{}' has malformed base64, continuing without files: {}",
                        descriptor.filename,
                        e
                    );
                    return Ok(Self::empty());
                }
            };

            let size = declared.max(decoded_len);
            if size > MAX_FILE_BYTES {
                return Err(oversized_file(&descriptor.filename, size, fallback_contact));
            }

            total_bytes += size;
            files.push(Attachment {
                filename: descriptor.filename,
                content_type,
                content_base64: descriptor.base64.trim().to_string(),
                size,
            });
        }

        if total_bytes > MAX_TOTAL_BYTES {
            return Err(Rejection::validation(
                aggregate_limit_message(fallback_contact),
                format!("{} bytes across {} files", total_bytes, files.len()),
            ));
        }

        Ok(Self { files, total_bytes })
    }

    pub fn files(&self) -> &[Attachment] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }
}

/// Shown when the combined attachments are too large, whether caught here
/// or by the HTTP body limit.
pub fn aggregate_limit_message(fallback_contact: &str) -> String {
    format!(
        "Attachments exceed the 10MB total limit. Please send fewer files or email them directly to {}.",
        fallback_contact
    )
}

fn oversized_file(filename: &str, size: usize, fallback_contact: &str) -> Rejection {
    Rejection::validation(
        format!(
            "\"{}\" exceeds the 5MB per-file limit. Please email large files directly to {}.",
            filename, fallback_contact
        ),
        format!("file '{}' is {} bytes", filename, size),
    )
}
