//! Boundary normalisation for the public inquiry form.
//!
//! Turns the raw key/value payload into an [`InquiryDraft`] of trimmed
//! strings. Nothing is validated here; absent fields simply become empty.

use std::collections::HashMap;

/// Form field names recognised on the inquiry endpoint.
pub mod fields {
    pub const NAME: &str = "name";
    pub const EMAIL: &str = "email";
    pub const COMPANY: &str = "company";
    pub const PRODUCT_TYPE: &str = "productType";
    pub const MATERIAL: &str = "material";
    pub const GAUGE: &str = "gauge";
    pub const QUANTITY: &str = "quantity";
    pub const MESSAGE: &str = "message";
    pub const ATTACHMENTS: &str = "attachments";
    pub const PAGE_URL: &str = "pageUrl";
    /// Hidden from humans by CSS; bots tend to fill it.
    pub const HONEYPOT: &str = "_website";
    /// Epoch milliseconds at which the form was rendered.
    pub const TIMESTAMP: &str = "_timestamp";
}

/// Trimmed, shape-normalised inquiry fields straight off the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InquiryDraft {
    pub name: String,
    pub email: String,
    pub company: String,
    pub product_type: String,
    pub material: String,
    pub gauge: String,
    pub quantity: String,
    pub message: String,
    /// Raw JSON array of attachment descriptors.
    pub attachments: String,
    pub page_url: String,
    pub honeypot: String,
    pub timestamp: String,
}

impl InquiryDraft {
    /// Reads every recognised field from a decoded form body.
    pub fn from_form(form: &HashMap<String, String>) -> Self {
        let read = |key: &str| {
            form.get(key)
                .map(|value| value.trim().to_string())
                .unwrap_or_default()
        };

        Self {
            name: read(fields::NAME),
            email: read(fields::EMAIL),
            company: read(fields::COMPANY),
            product_type: read(fields::PRODUCT_TYPE),
            material: read(fields::MATERIAL),
            gauge: read(fields::GAUGE),
            quantity: read(fields::QUANTITY),
            message: read(fields::MESSAGE),
            attachments: read(fields::ATTACHMENTS),
            page_url: read(fields::PAGE_URL),
            honeypot: read(fields::HONEYPOT),
            timestamp: read(fields::TIMESTAMP),
        }
    }

    /// Text scanned by the content checks: name, email, company, product type
    /// and message joined by single spaces.
    pub fn searchable_text(&self) -> String {
        [
            self.name.as_str(),
            self.email.as_str(),
            self.company.as_str(),
            self.product_type.as_str(),
            self.message.as_str(),
        ]
        .join(" ")
    }

    /// The `_timestamp` field as epoch milliseconds, if it parses.
    pub fn started_at_ms(&self) -> Option<i64> {
        if self.timestamp.is_empty() {
            return None;
        }
        self.timestamp.parse::<i64>().ok()
    }
}
