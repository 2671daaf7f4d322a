//! The public inquiry pipeline.
//!
//! draft → gate → attachments → compose → deliver. Everything before delivery
//! is synchronous and side-effect free; delivery is one transport call with no
//! retry.

use crate::attachments::AttachmentSet;
use crate::config::{DeliveryConfig, MissingSetting};
use crate::inquiry_email::compose;
use crate::mailer::{DeliveryError, MailTransport, OutboundAttachment, OutboundEmail};
use crate::models::{ActionState, Inquiry};
use crate::sanitizer::InquiryDraft;
use crate::spam_guard::{RejectionKind, SpamGuard};

pub const SUCCESS_MESSAGE: &str = "Sent! We'll reply in 12–24 hours.";

/// What happened to a submission, for logs and analytics. Never shown to the
/// submitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    Accepted {
        attachments: usize,
        message_id: String,
    },
    Rejected {
        kind: RejectionKind,
        reason: String,
    },
    ConfigMissing {
        setting: &'static str,
    },
    DeliveryFailed {
        status: Option<u16>,
        size_related: bool,
        detail: String,
    },
}

impl IntakeOutcome {
    /// Short label for structured log fields.
    pub fn label(&self) -> &'static str {
        match self {
            IntakeOutcome::Accepted { .. } => "accepted",
            IntakeOutcome::Rejected {
                kind: RejectionKind::Abuse,
                ..
            } => "rejected_abuse",
            IntakeOutcome::Rejected {
                kind: RejectionKind::Validation,
                ..
            } => "rejected_validation",
            IntakeOutcome::ConfigMissing { .. } => "config_missing",
            IntakeOutcome::DeliveryFailed { .. } => "delivery_failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntakeReport {
    pub state: ActionState,
    pub outcome: IntakeOutcome,
    /// The delivered inquiry, present only when accepted.
    pub inquiry: Option<Inquiry>,
}

impl IntakeReport {
    fn failed(state: ActionState, outcome: IntakeOutcome) -> Self {
        Self {
            state,
            outcome,
            inquiry: None,
        }
    }
}

/// Per-submission inputs the pipeline does not read from a clock or the
/// environment itself.
#[derive(Debug, Clone)]
pub struct IntakeContext<'a> {
    /// Server time in epoch milliseconds.
    pub now_ms: i64,
    /// Rendered verbatim into the notification.
    pub submitted_at: String,
    pub fallback_contact: &'a str,
}

/// Runs one submission through the pipeline.
///
/// `connect` builds the transport once delivery settings are known; it is
/// never called when they are missing.
pub async fn submit_inquiry<T, F>(
    guard: &SpamGuard,
    draft: InquiryDraft,
    ctx: &IntakeContext<'_>,
    delivery: Result<DeliveryConfig, MissingSetting>,
    connect: F,
) -> IntakeReport
where
    T: MailTransport,
    F: FnOnce(&DeliveryConfig) -> Result<T, DeliveryError>,
{
    if let Err(rejection) = guard.evaluate(&draft, ctx.now_ms) {
        if rejection.kind == RejectionKind::Abuse {
            tracing::warn!("Inquiry blocked: {}", rejection.internal_reason);
        } else {
            tracing::info!("Inquiry rejected: {}", rejection.internal_reason);
        }
        return IntakeReport::failed(
            ActionState::failure(rejection.user_message),
            IntakeOutcome::Rejected {
                kind: rejection.kind,
                reason: rejection.internal_reason,
            },
        );
    }

    let attachments = match AttachmentSet::from_json(&draft.attachments, ctx.fallback_contact) {
        Ok(set) => set,
        Err(rejection) => {
            tracing::info!("Inquiry attachments rejected: {}", rejection.internal_reason);
            return IntakeReport::failed(
                ActionState::failure(rejection.user_message),
                IntakeOutcome::Rejected {
                    kind: rejection.kind,
                    reason: rejection.internal_reason,
                },
            );
        }
    };

    let inquiry = Inquiry {
        name: draft.name,
        email: draft.email,
        company: draft.company,
        product_type: draft.product_type,
        material: draft.material,
        gauge: draft.gauge,
        quantity: draft.quantity,
        message: draft.message,
        attachments,
        submitted_at: Some(ctx.submitted_at.clone()),
        page_url: Some(draft.page_url).filter(|p| !p.is_empty()),
    };

    let config = match delivery {
        Ok(config) => config,
        Err(missing) => {
            tracing::error!(
                "Inquiry delivery is not configured ({}); submitter was sent to {}",
                missing,
                ctx.fallback_contact
            );
            return IntakeReport::failed(
                ActionState::failure(format!(
                    "Our inquiry form is temporarily unavailable. Please email us directly at {}.",
                    ctx.fallback_contact
                )),
                IntakeOutcome::ConfigMissing { setting: missing.0 },
            );
        }
    };

    let document = compose(&inquiry);
    let email = OutboundEmail {
        from: config.from.clone(),
        to: vec![config.to.clone()],
        subject: document.subject,
        html: document.html,
        reply_to: Some(inquiry.email.clone()),
        attachments: if inquiry.attachments.is_empty() {
            None
        } else {
            Some(
                inquiry
                    .attachments
                    .files()
                    .iter()
                    .map(|file| OutboundAttachment {
                        filename: file.filename.clone(),
                        content: file.content_base64.clone(),
                    })
                    .collect(),
            )
        },
    };

    let sent = match connect(&config) {
        Ok(transport) => transport.send(&email).await,
        Err(e) => Err(e),
    };

    match sent {
        Ok(receipt) => {
            let count = inquiry.attachments.len();
            tracing::info!(
                "✓ Inquiry delivered: id={}, attachments={}",
                receipt.id,
                count
            );
            let message = if count == 0 {
                SUCCESS_MESSAGE.to_string()
            } else {
                format!(
                    "Sent with {} attachment(s)! We'll reply in 12–24 hours.",
                    count
                )
            };
            IntakeReport {
                state: ActionState::success(message),
                outcome: IntakeOutcome::Accepted {
                    attachments: count,
                    message_id: receipt.id,
                },
                inquiry: Some(inquiry),
            }
        }
        Err(error) => {
            let size_related = error.is_size_related();
            tracing::error!("Inquiry delivery failed: {}", error);
            let message = if size_related {
                format!(
                    "Your attachments were too large to send. Please resend with smaller files or email them directly to {}.",
                    ctx.fallback_contact
                )
            } else {
                format!(
                    "We couldn't send your inquiry right now. Please try again or email us at {}.",
                    ctx.fallback_contact
                )
            };
            IntakeReport::failed(
                ActionState::failure(message),
                IntakeOutcome::DeliveryFailed {
                    status: error.status,
                    size_related,
                    detail: error.message,
                },
            )
        }
    }
}
