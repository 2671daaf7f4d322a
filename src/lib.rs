//! Inquiry intake and lead CRM service.
//!
//! Public inquiries pass through sanitizing, an anti-abuse gate and
//! attachment validation before being rendered into a notification e-mail
//! and handed to a Resend-compatible provider. Leads and their interactions,
//! follow-ups and samples live in Postgres.
//!
//! # Modules
//!
//! - `api`: HTTP handlers.
//! - `core`: Intake pipeline, lead rules and shared models/errors.
//! - `data`: Persistence.
//! - `integrations`: Outbound e-mail.
//! - `attachments`: Attachment bounds and decoding.
//! - `config`: Configuration management.
//! - `db`: Database connection, pool and migrations.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers and router.
//! - `inquiry_email`: Notification rendering.
//! - `intake`: The inquiry pipeline.
//! - `lead_store`: Lead repository implementations.
//! - `lifecycle`: Lead and sample status rules.
//! - `mailer`: Mail transport and Resend client.
//! - `models`: Core data models.
//! - `sanitizer`: Form field extraction.
//! - `spam_guard`: Anti-abuse checks.

pub mod api;
pub mod core;
pub mod data;
pub mod integrations;

pub mod attachments;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod inquiry_email;
pub mod intake;
pub mod lead_store;
pub mod lifecycle;
pub mod mailer;
pub mod models;
pub mod sanitizer;
pub mod spam_guard;
