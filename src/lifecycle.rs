//! Status rules for leads and samples.
//!
//! Every status change in either store goes through [`check_transition`]; a
//! stricter funnel only needs a change there.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{
    non_blank, Lead, LeadStatus, NewSample, Sample, SampleUpdate, UpdateLeadRequest,
};

/// Which lead status changes are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionPolicy {
    /// Whether a WON or LOST lead may move to any other status.
    pub allow_reopen_closed: bool,
}

impl Default for TransitionPolicy {
    fn default() -> Self {
        Self {
            allow_reopen_closed: true,
        }
    }
}

/// Decides whether a lead may move from `from` to `to`.
///
/// Any open status may jump to any other status. Leaving WON or LOST is only
/// allowed when the policy permits re-opening. Setting the current status
/// again is always a no-op.
pub fn check_transition(
    policy: &TransitionPolicy,
    from: LeadStatus,
    to: LeadStatus,
) -> Result<(), AppError> {
    if from == to {
        return Ok(());
    }
    if from.is_closed() && !policy.allow_reopen_closed {
        return Err(AppError::InvalidTransition(format!(
            "lead is {} and cannot move to {}",
            from, to
        )));
    }
    Ok(())
}

/// Applies a staff update to a lead in place.
pub fn apply_lead_update(
    lead: &mut Lead,
    update: UpdateLeadRequest,
    policy: &TransitionPolicy,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if update.is_empty() {
        return Err(AppError::BadRequest("Nothing to update".to_string()));
    }

    if let Some(status) = update.status {
        check_transition(policy, lead.status, status)?;
        if lead.status != status {
            tracing::info!("Lead {} status {} -> {}", lead.id, lead.status, status);
        }
        lead.status = status;
    }
    if let Some(priority) = update.priority {
        lead.priority = priority;
    }
    if let Some(owner) = update.owner {
        lead.owner = non_blank(Some(owner));
    }
    if let Some(notes) = update.notes {
        lead.notes = non_blank(Some(notes));
    }
    lead.updated_at = now;
    Ok(())
}

pub fn validate_probability(probability: i16) -> Result<(), AppError> {
    if !(0..=100).contains(&probability) {
        return Err(AppError::BadRequest(format!(
            "Probability must be between 0 and 100, got {}",
            probability
        )));
    }
    Ok(())
}

fn validate_cost(cost: &BigDecimal) -> Result<(), AppError> {
    if cost < &BigDecimal::from(0) {
        return Err(AppError::BadRequest("Cost cannot be negative".to_string()));
    }
    Ok(())
}

/// Builds the record for a newly requested sample.
pub fn new_sample(lead_id: Uuid, input: NewSample, now: DateTime<Utc>) -> Result<Sample, AppError> {
    let probability = input.probability.unwrap_or(0);
    validate_probability(probability)?;
    if let Some(ref cost) = input.cost {
        validate_cost(cost)?;
    }

    let tracking_number = non_blank(input.tracking_number);
    let status = input.status.unwrap_or_default();
    if status.requires_tracking() && tracking_number.is_none() {
        return Err(AppError::BadRequest(
            "A tracking number is required before a sample is shipped".to_string(),
        ));
    }

    Ok(Sample {
        id: Uuid::new_v4(),
        lead_id,
        tracking_number,
        status,
        is_paid: input.is_paid.unwrap_or(false),
        cost: input.cost,
        probability,
        created_at: now,
        updated_at: now,
    })
}

/// Applies a progress update to a sample in place.
///
/// A sample can only be shipped or delivered once it has a tracking number.
pub fn apply_sample_update(
    sample: &mut Sample,
    update: SampleUpdate,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if let Some(probability) = update.probability {
        validate_probability(probability)?;
    }
    if let Some(ref cost) = update.cost {
        validate_cost(cost)?;
    }

    let tracking_number = match update.tracking_number {
        Some(t) => non_blank(Some(t)),
        None => sample.tracking_number.clone(),
    };
    let status = update.status.unwrap_or(sample.status);
    if status.requires_tracking() && tracking_number.is_none() {
        return Err(AppError::BadRequest(
            "A tracking number is required before a sample is shipped".to_string(),
        ));
    }

    sample.tracking_number = tracking_number;
    sample.status = status;
    if let Some(is_paid) = update.is_paid {
        sample.is_paid = is_paid;
    }
    if let Some(cost) = update.cost {
        sample.cost = Some(cost);
    }
    if let Some(probability) = update.probability {
        sample.probability = probability;
    }
    sample.updated_at = now;
    Ok(())
}
