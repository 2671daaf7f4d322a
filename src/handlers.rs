use crate::attachments;
use crate::config::{Config, DeliveryConfig, MissingSetting};
use crate::errors::AppError;
use crate::intake::{self, IntakeContext, IntakeOutcome};
use crate::lead_store::LeadRepository;
use crate::lifecycle::TransitionPolicy;
use crate::mailer::ResendClient;
use crate::models::*;
use crate::sanitizer::InquiryDraft;
use crate::spam_guard::SpamGuard;
use axum::{
    extract::{rejection::FormRejection, DefaultBodyLimit, Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Form, Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::limit::RequestBodyLimitLayer;
use uuid::Uuid;

/// Intake bodies carry up to 10MB of attachments, base64-inflated.
pub const INTAKE_BODY_LIMIT: usize = 15 * 1024 * 1024;
pub const CRM_BODY_LIMIT: usize = 1024 * 1024;

/// Resolves provider settings for one submission.
pub type DeliveryLookup = Arc<dyn Fn() -> Result<DeliveryConfig, MissingSetting> + Send + Sync>;

/// Shared application state injected into handlers.
pub struct AppState<S> {
    /// Lead persistence.
    pub store: S,
    pub config: Config,
    /// Lead status rules, derived from `config` at startup.
    pub policy: TransitionPolicy,
    /// Anti-abuse chain applied to every public submission.
    pub guard: SpamGuard,
    /// Read on every submission; the environment by default.
    pub delivery: DeliveryLookup,
}

impl<S: LeadRepository> AppState<S> {
    pub fn new(store: S, config: Config) -> Self {
        let policy = config.transition_policy();
        Self {
            store,
            config,
            policy,
            guard: SpamGuard::default(),
            delivery: Arc::new(DeliveryConfig::from_env),
        }
    }

    /// Replaces the environment lookup for delivery settings.
    pub fn with_delivery<F>(mut self, lookup: F) -> Self
    where
        F: Fn() -> Result<DeliveryConfig, MissingSetting> + Send + Sync + 'static,
    {
        self.delivery = Arc::new(lookup);
        self
    }
}

/// Builds the HTTP surface. `rate_limited` adds per-IP throttling to the
/// public intake route.
pub fn router<S: LeadRepository>(
    state: Arc<AppState<S>>,
    rate_limited: bool,
) -> anyhow::Result<Router> {
    let mut intake_routes: Router<Arc<AppState<S>>> = Router::new()
        .route("/api/v1/inquiries", post(submit_inquiry::<S>))
        // Enforced by the extractor so the handler can answer in JSON.
        .layer(DefaultBodyLimit::max(INTAKE_BODY_LIMIT));

    if rate_limited {
        // 2 req/sec per IP, burst of 5
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_second(2)
                .burst_size(5)
                .key_extractor(SmartIpKeyExtractor)
                .finish()
                .ok_or_else(|| anyhow::anyhow!("invalid rate limiter configuration"))?,
        );
        intake_routes = intake_routes.layer(GovernorLayer {
            config: governor_conf,
        });
    }

    let crm_routes: Router<Arc<AppState<S>>> = Router::new()
        .route("/api/v1/leads", post(create_lead::<S>).get(list_leads::<S>))
        .route(
            "/api/v1/leads/:id",
            get(get_lead::<S>).patch(update_lead::<S>),
        )
        .route(
            "/api/v1/leads/:id/interactions",
            post(add_interaction::<S>),
        )
        .route("/api/v1/leads/:id/follow-ups", post(add_follow_up::<S>))
        .route("/api/v1/leads/:id/samples", post(add_sample::<S>))
        .route("/api/v1/samples/:id", patch(update_sample::<S>))
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(CRM_BODY_LIMIT)),
        );

    Ok(Router::new()
        .route("/health", get(health))
        .merge(intake_routes)
        .merge(crm_routes)
        .with_state(state))
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "inquiry-crm-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

fn intake_status(outcome: &IntakeOutcome) -> StatusCode {
    match outcome {
        IntakeOutcome::Accepted { .. } => StatusCode::OK,
        IntakeOutcome::Rejected { .. } => StatusCode::BAD_REQUEST,
        IntakeOutcome::ConfigMissing { .. } => StatusCode::SERVICE_UNAVAILABLE,
        IntakeOutcome::DeliveryFailed { .. } => StatusCode::BAD_GATEWAY,
    }
}

/// POST /api/v1/inquiries
///
/// Public inquiry form. Always answers with `{ ok, message }`; the status
/// code tells rejections, configuration problems and delivery failures apart.
pub async fn submit_inquiry<S: LeadRepository>(
    State(state): State<Arc<AppState<S>>>,
    form: Result<Form<HashMap<String, String>>, FormRejection>,
) -> (StatusCode, Json<ActionState>) {
    let fallback = &state.config.fallback_contact;
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            tracing::warn!(
                outcome = "rejected",
                "POST /inquiries - unreadable body: {}",
                rejection.body_text()
            );
            return unreadable_submission(rejection.status(), fallback);
        }
    };

    let draft = InquiryDraft::from_form(&form);
    let now = Utc::now();
    let ctx = IntakeContext {
        now_ms: now.timestamp_millis(),
        submitted_at: now.to_rfc3339_opts(SecondsFormat::Secs, true),
        fallback_contact: fallback,
    };

    let report = intake::submit_inquiry(
        &state.guard,
        draft,
        &ctx,
        (state.delivery)(),
        ResendClient::new,
    )
    .await;

    tracing::info!(
        outcome = report.outcome.label(),
        "POST /inquiries - {}",
        report.state.message
    );

    if state.config.promote_inquiries {
        if let Some(ref inquiry) = report.inquiry {
            match state.store.create_lead(NewLead::from_inquiry(inquiry)).await {
                Ok(lead) => tracing::info!("Inquiry promoted to lead {}", lead.id),
                Err(e) => tracing::warn!("Failed to promote inquiry to lead: {}", e),
            }
        }
    }

    (intake_status(&report.outcome), Json(report.state))
}

fn unreadable_submission(status: StatusCode, fallback: &str) -> (StatusCode, Json<ActionState>) {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        return (
            status,
            Json(ActionState::failure(attachments::aggregate_limit_message(
                fallback,
            ))),
        );
    }
    (
        StatusCode::BAD_REQUEST,
        Json(ActionState::failure(format!(
            "We couldn't read your submission. Please try again or email us at {}.",
            fallback
        ))),
    )
}

/// POST /api/v1/leads
pub async fn create_lead<S: LeadRepository>(
    State(state): State<Arc<AppState<S>>>,
    Json(payload): Json<CreateLeadRequest>,
) -> Result<(StatusCode, Json<Lead>), AppError> {
    tracing::info!("POST /leads - company: {}", payload.company_name);

    let new_lead = payload.validate()?;
    let lead = state.store.create_lead(new_lead).await?;

    Ok((StatusCode::CREATED, Json(lead)))
}

/// GET /api/v1/leads
pub async fn list_leads<S: LeadRepository>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Lead>>, AppError> {
    let leads = state.store.list_leads().await?;
    tracing::debug!("GET /leads - {} leads", leads.len());
    Ok(Json(leads))
}

/// GET /api/v1/leads/:id
///
/// The lead with its interactions, follow-ups and samples, newest first.
pub async fn get_lead<S: LeadRepository>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<LeadDetail>, AppError> {
    tracing::info!("GET /leads/{}", id);

    let detail = state
        .store
        .get_lead_detail(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lead with id {} not found", id)))?;

    Ok(Json(detail))
}

/// PATCH /api/v1/leads/:id
pub async fn update_lead<S: LeadRepository>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLeadRequest>,
) -> Result<Json<Lead>, AppError> {
    tracing::info!("PATCH /leads/{}", id);

    let lead = state.store.update_lead(id, payload, state.policy).await?;
    Ok(Json(lead))
}

/// POST /api/v1/leads/:id/interactions
pub async fn add_interaction<S: LeadRepository>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewInteraction>,
) -> Result<(StatusCode, Json<Interaction>), AppError> {
    let input = payload.validate()?;
    let interaction = state.store.add_interaction(id, input).await?;
    tracing::info!(
        "Interaction '{}' logged for lead {}",
        interaction.interaction_type,
        id
    );
    Ok((StatusCode::CREATED, Json(interaction)))
}

/// POST /api/v1/leads/:id/follow-ups
pub async fn add_follow_up<S: LeadRepository>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewFollowUp>,
) -> Result<(StatusCode, Json<FollowUp>), AppError> {
    let input = payload.validate()?;
    let follow_up = state.store.add_follow_up(id, input).await?;
    Ok((StatusCode::CREATED, Json(follow_up)))
}

/// POST /api/v1/leads/:id/samples
pub async fn add_sample<S: LeadRepository>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewSample>,
) -> Result<(StatusCode, Json<Sample>), AppError> {
    let sample = state.store.add_sample(id, payload).await?;
    tracing::info!("Sample {} requested for lead {}", sample.id, id);
    Ok((StatusCode::CREATED, Json(sample)))
}

/// PATCH /api/v1/samples/:id
pub async fn update_sample<S: LeadRepository>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SampleUpdate>,
) -> Result<Json<Sample>, AppError> {
    let sample = state.store.update_sample(id, payload).await?;
    tracing::info!("Sample {} now {:?}", sample.id, sample.status);
    Ok(Json(sample))
}
