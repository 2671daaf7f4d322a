use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

use crate::attachments::AttachmentSet;
use crate::errors::AppError;
use crate::spam_guard::is_valid_email;

// ============ Intake Models ============

/// A public inquiry that passed the gate and attachment validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inquiry {
    pub name: String,
    pub email: String,
    pub company: String,
    pub product_type: String,
    pub material: String,
    pub gauge: String,
    pub quantity: String,
    pub message: String,
    pub attachments: AttachmentSet,
    /// Supplied by the caller; the composer never reads a clock.
    pub submitted_at: Option<String>,
    pub page_url: Option<String>,
}

/// Result shape returned to the public form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionState {
    pub ok: bool,
    pub message: String,
}

impl ActionState {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

// ============ CRM Enums ============

/// Position of a lead in the sales funnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "lead_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    SampleSent,
    Negotiation,
    Won,
    Lost,
}

impl LeadStatus {
    /// Canonical funnel order.
    pub const FUNNEL: [LeadStatus; 7] = [
        LeadStatus::New,
        LeadStatus::Contacted,
        LeadStatus::Qualified,
        LeadStatus::SampleSent,
        LeadStatus::Negotiation,
        LeadStatus::Won,
        LeadStatus::Lost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "NEW",
            LeadStatus::Contacted => "CONTACTED",
            LeadStatus::Qualified => "QUALIFIED",
            LeadStatus::SampleSent => "SAMPLE_SENT",
            LeadStatus::Negotiation => "NEGOTIATION",
            LeadStatus::Won => "WON",
            LeadStatus::Lost => "LOST",
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, LeadStatus::Won | LeadStatus::Lost)
    }
}

impl Default for LeadStatus {
    fn default() -> Self {
        LeadStatus::New
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "lead_priority", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadPriority {
    Low,
    Medium,
    High,
}

impl Default for LeadPriority {
    fn default() -> Self {
        LeadPriority::Medium
    }
}

/// Physical progress of a sample shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "sample_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SampleStatus {
    Requested,
    Shipped,
    Delivered,
}

impl SampleStatus {
    pub fn requires_tracking(&self) -> bool {
        matches!(self, SampleStatus::Shipped | SampleStatus::Delivered)
    }
}

impl Default for SampleStatus {
    fn default() -> Self {
        SampleStatus::Requested
    }
}

// ============ Database Models ============

/// A tracked sales prospect.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,
    pub company_name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    /// Where the lead came from (trade show, website inquiry, referral...).
    pub source: Option<String>,
    pub status: LeadStatus,
    pub priority: LeadPriority,
    /// Staff member responsible for the lead.
    pub owner: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Logged outreach. Never modified once written.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub id: Uuid,
    pub lead_id: Uuid,
    #[serde(rename = "type")]
    pub interaction_type: String,
    pub channel: Option<String>,
    pub notes: Option<String>,
    pub date: DateTime<Utc>,
}

/// Scheduled or recorded touchpoint. Never modified once written.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUp {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub stage: String,
    pub note: Option<String>,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub tracking_number: Option<String>,
    pub status: SampleStatus,
    pub is_paid: bool,
    pub cost: Option<BigDecimal>,
    /// Estimated likelihood (0-100) that the sample converts into an order.
    pub probability: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A lead with everything it owns, each list newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadDetail {
    #[serde(flatten)]
    pub lead: Lead,
    pub interactions: Vec<Interaction>,
    pub follow_ups: Vec<FollowUp>,
    pub samples: Vec<Sample>,
}

// ============ API Request Models ============

/// Request payload for creating a lead from the dashboard.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadRequest {
    pub company_name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    pub source: Option<String>,
    pub status: Option<LeadStatus>,
    pub priority: Option<LeadPriority>,
    pub owner: Option<String>,
    pub notes: Option<String>,
}

/// Validated input for a new lead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLead {
    pub company_name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    pub source: Option<String>,
    pub status: LeadStatus,
    pub priority: LeadPriority,
    pub owner: Option<String>,
    pub notes: Option<String>,
}

impl CreateLeadRequest {
    pub fn validate(self) -> Result<NewLead, AppError> {
        let company_name = self.company_name.trim().to_string();
        if company_name.is_empty() {
            return Err(AppError::BadRequest("Company name is required".to_string()));
        }

        let email = non_blank(self.email);
        if let Some(ref e) = email {
            if !is_valid_email(e) {
                return Err(AppError::BadRequest(format!("Invalid email: {}", e)));
            }
        }

        Ok(NewLead {
            company_name,
            contact_name: non_blank(self.contact_name),
            email,
            country: non_blank(self.country),
            source: non_blank(self.source),
            status: self.status.unwrap_or_default(),
            priority: self.priority.unwrap_or_default(),
            owner: non_blank(self.owner),
            notes: non_blank(self.notes),
        })
    }
}

impl NewLead {
    /// Maps a delivered website inquiry onto a fresh lead.
    pub fn from_inquiry(inquiry: &Inquiry) -> Self {
        let company_name = [&inquiry.company, &inquiry.name, &inquiry.email]
            .into_iter()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or("Website inquiry")
            .to_string();

        let mut notes = Vec::new();
        for (label, value) in [
            ("Product type", &inquiry.product_type),
            ("Material", &inquiry.material),
            ("Gauge", &inquiry.gauge),
            ("Quantity", &inquiry.quantity),
            ("Message", &inquiry.message),
        ] {
            if !value.trim().is_empty() {
                notes.push(format!("{}: {}", label, value.trim()));
            }
        }

        Self {
            company_name,
            contact_name: non_blank(Some(inquiry.name.clone())),
            email: non_blank(Some(inquiry.email.clone())),
            country: None,
            source: Some("website_inquiry".to_string()),
            status: LeadStatus::New,
            priority: LeadPriority::Medium,
            owner: None,
            notes: if notes.is_empty() {
                None
            } else {
                Some(notes.join("\n"))
            },
        }
    }
}

/// Partial update of a lead. `None` leaves a field unchanged; for the text
/// fields an empty string clears the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeadRequest {
    pub status: Option<LeadStatus>,
    pub priority: Option<LeadPriority>,
    pub owner: Option<String>,
    pub notes: Option<String>,
}

impl UpdateLeadRequest {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.priority.is_none()
            && self.owner.is_none()
            && self.notes.is_none()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInteraction {
    #[serde(rename = "type")]
    pub interaction_type: String,
    pub channel: Option<String>,
    pub notes: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

impl NewInteraction {
    pub fn validate(self) -> Result<Self, AppError> {
        let interaction_type = self.interaction_type.trim().to_string();
        if interaction_type.is_empty() {
            return Err(AppError::BadRequest(
                "Interaction type is required".to_string(),
            ));
        }
        Ok(Self {
            interaction_type,
            channel: non_blank(self.channel),
            notes: non_blank(self.notes),
            date: self.date,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFollowUp {
    pub stage: String,
    pub note: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

impl NewFollowUp {
    pub fn validate(self) -> Result<Self, AppError> {
        let stage = self.stage.trim().to_string();
        if stage.is_empty() {
            return Err(AppError::BadRequest(
                "Follow-up stage is required".to_string(),
            ));
        }
        Ok(Self {
            stage,
            note: non_blank(self.note),
            date: self.date,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSample {
    pub tracking_number: Option<String>,
    pub status: Option<SampleStatus>,
    pub is_paid: Option<bool>,
    pub cost: Option<BigDecimal>,
    pub probability: Option<i16>,
}

/// Progress update for a sample. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleUpdate {
    pub tracking_number: Option<String>,
    pub status: Option<SampleStatus>,
    pub is_paid: Option<bool>,
    pub cost: Option<BigDecimal>,
    pub probability: Option<i16>,
}

/// Trims and turns blank strings into `None`.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
