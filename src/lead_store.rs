//! Persistence for leads and the records they own.
//!
//! [`LeadRepository`] is the seam the HTTP layer talks to. [`PgLeadStore`]
//! backs it with Postgres; [`InMemoryLeadStore`] keeps everything in process
//! for tests and local runs. Interactions and follow-ups are insert-only on
//! both.

use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::{AppError, ResultExt};
use crate::lifecycle::{self, TransitionPolicy};
use crate::models::{
    FollowUp, Interaction, Lead, LeadDetail, NewFollowUp, NewInteraction, NewLead, NewSample,
    Sample, SampleUpdate, UpdateLeadRequest,
};

/// CRM read/write surface.
pub trait LeadRepository: Send + Sync + 'static {
    fn create_lead(&self, new_lead: NewLead) -> impl Future<Output = Result<Lead, AppError>> + Send;

    /// All leads, newest created first.
    fn list_leads(&self) -> impl Future<Output = Result<Vec<Lead>, AppError>> + Send;

    fn get_lead(&self, id: Uuid) -> impl Future<Output = Result<Option<Lead>, AppError>> + Send;

    /// The lead plus interactions, follow-ups and samples, each newest first.
    fn get_lead_detail(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<LeadDetail>, AppError>> + Send;

    fn update_lead(
        &self,
        id: Uuid,
        update: UpdateLeadRequest,
        policy: TransitionPolicy,
    ) -> impl Future<Output = Result<Lead, AppError>> + Send;

    fn add_interaction(
        &self,
        lead_id: Uuid,
        input: NewInteraction,
    ) -> impl Future<Output = Result<Interaction, AppError>> + Send;

    fn add_follow_up(
        &self,
        lead_id: Uuid,
        input: NewFollowUp,
    ) -> impl Future<Output = Result<FollowUp, AppError>> + Send;

    fn add_sample(
        &self,
        lead_id: Uuid,
        input: NewSample,
    ) -> impl Future<Output = Result<Sample, AppError>> + Send;

    fn update_sample(
        &self,
        sample_id: Uuid,
        update: SampleUpdate,
    ) -> impl Future<Output = Result<Sample, AppError>> + Send;
}

fn lead_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Lead with id {} not found", id))
}

fn sample_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Sample with id {} not found", id))
}

// ============ Postgres ============

/// Postgres-backed store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgLeadStore {
    pool: PgPool,
}

impl PgLeadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_lead_exists(&self, id: Uuid) -> Result<(), AppError> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM leads WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .context("checking lead exists")?;

        if exists {
            Ok(())
        } else {
            Err(lead_not_found(id))
        }
    }
}

impl LeadRepository for PgLeadStore {
    async fn create_lead(&self, new_lead: NewLead) -> Result<Lead, AppError> {
        let lead = sqlx::query_as::<_, Lead>(
            r#"
            INSERT INTO leads (
                id, company_name, contact_name, email, country, source,
                status, priority, owner, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new_lead.company_name)
        .bind(&new_lead.contact_name)
        .bind(&new_lead.email)
        .bind(&new_lead.country)
        .bind(&new_lead.source)
        .bind(new_lead.status)
        .bind(new_lead.priority)
        .bind(&new_lead.owner)
        .bind(&new_lead.notes)
        .fetch_one(&self.pool)
        .await
        .context("inserting lead")?;

        tracing::info!("✓ Lead created: {} ({})", lead.id, lead.company_name);
        Ok(lead)
    }

    async fn list_leads(&self) -> Result<Vec<Lead>, AppError> {
        sqlx::query_as::<_, Lead>("SELECT * FROM leads ORDER BY created_at DESC, seq DESC")
            .fetch_all(&self.pool)
            .await
            .context("listing leads")
    }

    async fn get_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError> {
        sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("fetching lead")
    }

    async fn get_lead_detail(&self, id: Uuid) -> Result<Option<LeadDetail>, AppError> {
        let Some(lead) = self.get_lead(id).await? else {
            return Ok(None);
        };

        let interactions = sqlx::query_as::<_, Interaction>(
            "SELECT * FROM interactions WHERE lead_id = $1 ORDER BY date DESC, seq DESC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .context("fetching interactions")?;

        let follow_ups = sqlx::query_as::<_, FollowUp>(
            "SELECT * FROM follow_ups WHERE lead_id = $1 ORDER BY date DESC, seq DESC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .context("fetching follow-ups")?;

        let samples = sqlx::query_as::<_, Sample>(
            "SELECT * FROM samples WHERE lead_id = $1 ORDER BY created_at DESC, seq DESC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .context("fetching samples")?;

        Ok(Some(LeadDetail {
            lead,
            interactions,
            follow_ups,
            samples,
        }))
    }

    async fn update_lead(
        &self,
        id: Uuid,
        update: UpdateLeadRequest,
        policy: TransitionPolicy,
    ) -> Result<Lead, AppError> {
        let mut tx = self.pool.begin().await.context("starting lead update")?;

        let mut lead =
            sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .context("locking lead")?
                .ok_or_else(|| lead_not_found(id))?;

        lifecycle::apply_lead_update(&mut lead, update, &policy, Utc::now())?;

        let lead = sqlx::query_as::<_, Lead>(
            r#"
            UPDATE leads
            SET status = $2, priority = $3, owner = $4, notes = $5, updated_at = $6
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(lead.status)
        .bind(lead.priority)
        .bind(&lead.owner)
        .bind(&lead.notes)
        .bind(lead.updated_at)
        .fetch_one(&mut *tx)
        .await
        .context("updating lead")?;

        tx.commit().await.context("committing lead update")?;
        Ok(lead)
    }

    async fn add_interaction(
        &self,
        lead_id: Uuid,
        input: NewInteraction,
    ) -> Result<Interaction, AppError> {
        self.ensure_lead_exists(lead_id).await?;

        sqlx::query_as::<_, Interaction>(
            r#"
            INSERT INTO interactions (id, lead_id, interaction_type, channel, notes, date)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, lead_id, interaction_type, channel, notes, date
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(lead_id)
        .bind(&input.interaction_type)
        .bind(&input.channel)
        .bind(&input.notes)
        .bind(input.date.unwrap_or_else(Utc::now))
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("logging interaction for lead {}", lead_id))
    }

    async fn add_follow_up(&self, lead_id: Uuid, input: NewFollowUp) -> Result<FollowUp, AppError> {
        self.ensure_lead_exists(lead_id).await?;

        sqlx::query_as::<_, FollowUp>(
            r#"
            INSERT INTO follow_ups (id, lead_id, stage, note, date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, lead_id, stage, note, date
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(lead_id)
        .bind(&input.stage)
        .bind(&input.note)
        .bind(input.date.unwrap_or_else(Utc::now))
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("adding follow-up for lead {}", lead_id))
    }

    async fn add_sample(&self, lead_id: Uuid, input: NewSample) -> Result<Sample, AppError> {
        let sample = lifecycle::new_sample(lead_id, input, Utc::now())?;
        self.ensure_lead_exists(lead_id).await?;

        sqlx::query_as::<_, Sample>(
            r#"
            INSERT INTO samples (
                id, lead_id, tracking_number, status, is_paid, cost, probability,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, lead_id, tracking_number, status, is_paid, cost, probability,
                      created_at, updated_at
            "#,
        )
        .bind(sample.id)
        .bind(sample.lead_id)
        .bind(&sample.tracking_number)
        .bind(sample.status)
        .bind(sample.is_paid)
        .bind(&sample.cost)
        .bind(sample.probability)
        .bind(sample.created_at)
        .bind(sample.updated_at)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("recording sample for lead {}", lead_id))
    }

    async fn update_sample(&self, sample_id: Uuid, update: SampleUpdate) -> Result<Sample, AppError> {
        let mut tx = self.pool.begin().await.context("starting sample update")?;

        let mut sample = sqlx::query_as::<_, Sample>(
            r#"
            SELECT id, lead_id, tracking_number, status, is_paid, cost, probability,
                   created_at, updated_at
            FROM samples WHERE id = $1 FOR UPDATE
            "#,
        )
        .bind(sample_id)
        .fetch_optional(&mut *tx)
        .await
        .context("locking sample")?
        .ok_or_else(|| sample_not_found(sample_id))?;

        lifecycle::apply_sample_update(&mut sample, update, Utc::now())?;

        let sample = sqlx::query_as::<_, Sample>(
            r#"
            UPDATE samples
            SET tracking_number = $2, status = $3, is_paid = $4, cost = $5,
                probability = $6, updated_at = $7
            WHERE id = $1
            RETURNING id, lead_id, tracking_number, status, is_paid, cost, probability,
                      created_at, updated_at
            "#,
        )
        .bind(sample_id)
        .bind(&sample.tracking_number)
        .bind(sample.status)
        .bind(sample.is_paid)
        .bind(&sample.cost)
        .bind(sample.probability)
        .bind(sample.updated_at)
        .fetch_one(&mut *tx)
        .await
        .context("updating sample")?;

        tx.commit().await.context("committing sample update")?;
        Ok(sample)
    }
}

// ============ In-memory ============

#[derive(Default)]
struct Tables {
    /// Insertion order, used to break `created_at` ties.
    leads: Vec<Lead>,
    interactions: Vec<Interaction>,
    follow_ups: Vec<FollowUp>,
    samples: Vec<Sample>,
    lead_index: HashMap<Uuid, usize>,
}

impl Tables {
    fn lead_mut(&mut self, id: Uuid) -> Result<&mut Lead, AppError> {
        let idx = *self.lead_index.get(&id).ok_or_else(|| lead_not_found(id))?;
        Ok(&mut self.leads[idx])
    }

    fn has_lead(&self, id: Uuid) -> bool {
        self.lead_index.contains_key(&id)
    }
}

/// Newest first, later inserts winning ties.
fn newest_first<T: Clone, K: Ord>(rows: &[T], key: impl Fn(&T) -> K) -> Vec<T> {
    let mut indexed: Vec<(usize, &T)> = rows.iter().enumerate().collect();
    indexed.sort_by(|(ia, a), (ib, b)| key(b).cmp(&key(a)).then(ib.cmp(ia)));
    indexed.into_iter().map(|(_, row)| row.clone()).collect()
}

/// Process-local store guarded by a read/write lock.
#[derive(Default)]
pub struct InMemoryLeadStore {
    tables: RwLock<Tables>,
}

impl InMemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LeadRepository for InMemoryLeadStore {
    async fn create_lead(&self, new_lead: NewLead) -> Result<Lead, AppError> {
        let now = Utc::now();
        let lead = Lead {
            id: Uuid::new_v4(),
            company_name: new_lead.company_name,
            contact_name: new_lead.contact_name,
            email: new_lead.email,
            country: new_lead.country,
            source: new_lead.source,
            status: new_lead.status,
            priority: new_lead.priority,
            owner: new_lead.owner,
            notes: new_lead.notes,
            created_at: now,
            updated_at: now,
        };

        let mut tables = self.tables.write().await;
        let idx = tables.leads.len();
        tables.lead_index.insert(lead.id, idx);
        tables.leads.push(lead.clone());
        Ok(lead)
    }

    async fn list_leads(&self) -> Result<Vec<Lead>, AppError> {
        let tables = self.tables.read().await;
        Ok(newest_first(&tables.leads, |l| l.created_at))
    }

    async fn get_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .lead_index
            .get(&id)
            .map(|&idx| tables.leads[idx].clone()))
    }

    async fn get_lead_detail(&self, id: Uuid) -> Result<Option<LeadDetail>, AppError> {
        let tables = self.tables.read().await;
        let Some(&idx) = tables.lead_index.get(&id) else {
            return Ok(None);
        };

        let interactions: Vec<Interaction> = tables
            .interactions
            .iter()
            .filter(|i| i.lead_id == id)
            .cloned()
            .collect();
        let follow_ups: Vec<FollowUp> = tables
            .follow_ups
            .iter()
            .filter(|f| f.lead_id == id)
            .cloned()
            .collect();
        let samples: Vec<Sample> = tables
            .samples
            .iter()
            .filter(|s| s.lead_id == id)
            .cloned()
            .collect();

        Ok(Some(LeadDetail {
            lead: tables.leads[idx].clone(),
            interactions: newest_first(&interactions, |i| i.date),
            follow_ups: newest_first(&follow_ups, |f| f.date),
            samples: newest_first(&samples, |s| s.created_at),
        }))
    }

    async fn update_lead(
        &self,
        id: Uuid,
        update: UpdateLeadRequest,
        policy: TransitionPolicy,
    ) -> Result<Lead, AppError> {
        let mut tables = self.tables.write().await;
        let lead = tables.lead_mut(id)?;

        // Work on a copy so a rejected update leaves the stored row untouched.
        let mut updated = lead.clone();
        lifecycle::apply_lead_update(&mut updated, update, &policy, Utc::now())?;
        *lead = updated.clone();
        Ok(updated)
    }

    async fn add_interaction(
        &self,
        lead_id: Uuid,
        input: NewInteraction,
    ) -> Result<Interaction, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.has_lead(lead_id) {
            return Err(lead_not_found(lead_id));
        }

        let interaction = Interaction {
            id: Uuid::new_v4(),
            lead_id,
            interaction_type: input.interaction_type,
            channel: input.channel,
            notes: input.notes,
            date: input.date.unwrap_or_else(Utc::now),
        };
        tables.interactions.push(interaction.clone());
        Ok(interaction)
    }

    async fn add_follow_up(&self, lead_id: Uuid, input: NewFollowUp) -> Result<FollowUp, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.has_lead(lead_id) {
            return Err(lead_not_found(lead_id));
        }

        let follow_up = FollowUp {
            id: Uuid::new_v4(),
            lead_id,
            stage: input.stage,
            note: input.note,
            date: input.date.unwrap_or_else(Utc::now),
        };
        tables.follow_ups.push(follow_up.clone());
        Ok(follow_up)
    }

    async fn add_sample(&self, lead_id: Uuid, input: NewSample) -> Result<Sample, AppError> {
        let sample = lifecycle::new_sample(lead_id, input, Utc::now())?;

        let mut tables = self.tables.write().await;
        if !tables.has_lead(lead_id) {
            return Err(lead_not_found(lead_id));
        }
        tables.samples.push(sample.clone());
        Ok(sample)
    }

    async fn update_sample(&self, sample_id: Uuid, update: SampleUpdate) -> Result<Sample, AppError> {
        let mut tables = self.tables.write().await;
        let sample = tables
            .samples
            .iter_mut()
            .find(|s| s.id == sample_id)
            .ok_or_else(|| sample_not_found(sample_id))?;

        let mut updated = sample.clone();
        lifecycle::apply_sample_update(&mut updated, update, Utc::now())?;
        *sample = updated.clone();
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateLeadRequest, LeadPriority, LeadStatus, SampleStatus};
    use chrono::Duration;

    fn new_lead(company: &str) -> NewLead {
        CreateLeadRequest {
            company_name: company.to_string(),
            ..Default::default()
        }
        .validate()
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_read_back_defaults() {
        let store = InMemoryLeadStore::new();
        let lead = store.create_lead(new_lead("Acme Knits")).await.unwrap();

        let fetched = store.get_lead(lead.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, LeadStatus::New);
        assert_eq!(fetched.priority, LeadPriority::Medium);
        assert_eq!(fetched.contact_name, None);
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = InMemoryLeadStore::new();
        store.create_lead(new_lead("First")).await.unwrap();
        store.create_lead(new_lead("Second")).await.unwrap();
        store.create_lead(new_lead("Third")).await.unwrap();

        let names: Vec<String> = store
            .list_leads()
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.company_name)
            .collect();
        assert_eq!(names, vec!["Third", "Second", "First"]);
    }

    #[tokio::test]
    async fn test_detail_orders_children_by_date() {
        let store = InMemoryLeadStore::new();
        let lead = store.create_lead(new_lead("Acme")).await.unwrap();
        let now = Utc::now();

        for (days_ago, kind) in [(3, "Call"), (1, "Email"), (2, "Meeting")] {
            store
                .add_interaction(
                    lead.id,
                    NewInteraction {
                        interaction_type: kind.to_string(),
                        date: Some(now - Duration::days(days_ago)),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }
        store
            .add_follow_up(
                lead.id,
                NewFollowUp {
                    stage: "Quote sent".into(),
                    date: Some(now - Duration::days(5)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store
            .add_follow_up(
                lead.id,
                NewFollowUp {
                    stage: "Check-in".into(),
                    date: Some(now + Duration::days(2)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let detail = store.get_lead_detail(lead.id).await.unwrap().unwrap();
        let kinds: Vec<&str> = detail
            .interactions
            .iter()
            .map(|i| i.interaction_type.as_str())
            .collect();
        assert_eq!(kinds, vec!["Email", "Meeting", "Call"]);
        assert_eq!(detail.follow_ups[0].stage, "Check-in");
    }

    #[tokio::test]
    async fn test_children_require_existing_lead() {
        let store = InMemoryLeadStore::new();
        let missing = Uuid::new_v4();

        let err = store
            .add_interaction(
                missing,
                NewInteraction {
                    interaction_type: "Call".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(store.add_sample(missing, NewSample::default()).await.is_err());
        assert!(store.get_lead_detail(missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejected_update_keeps_stored_lead() {
        let store = InMemoryLeadStore::new();
        let lead = store.create_lead(new_lead("Acme")).await.unwrap();
        let strict = TransitionPolicy {
            allow_reopen_closed: false,
        };

        store
            .update_lead(
                lead.id,
                UpdateLeadRequest {
                    status: Some(LeadStatus::Won),
                    ..Default::default()
                },
                strict,
            )
            .await
            .unwrap();

        let err = store
            .update_lead(
                lead.id,
                UpdateLeadRequest {
                    status: Some(LeadStatus::Negotiation),
                    owner: Some("bob".into()),
                    ..Default::default()
                },
                strict,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));

        let stored = store.get_lead(lead.id).await.unwrap().unwrap();
        assert_eq!(stored.status, LeadStatus::Won);
        assert_eq!(stored.owner, None);
    }

    #[tokio::test]
    async fn test_sample_progression() {
        let store = InMemoryLeadStore::new();
        let lead = store.create_lead(new_lead("Acme")).await.unwrap();
        let sample = store
            .add_sample(
                lead.id,
                NewSample {
                    probability: Some(40),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let shipped = store
            .update_sample(
                sample.id,
                SampleUpdate {
                    status: Some(SampleStatus::Shipped),
                    tracking_number: Some("DHL-123".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(shipped.status, SampleStatus::Shipped);

        let delivered = store
            .update_sample(
                sample.id,
                SampleUpdate {
                    status: Some(SampleStatus::Delivered),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(delivered.tracking_number.as_deref(), Some("DHL-123"));
        assert_eq!(delivered.probability, 40);
    }

    #[tokio::test]
    async fn test_concurrent_appends() {
        let store = std::sync::Arc::new(InMemoryLeadStore::new());
        let lead_id = store.create_lead(new_lead("Acme")).await.unwrap().id;

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .add_interaction(
                        lead_id,
                        NewInteraction {
                            interaction_type: format!("Call {}", i),
                            ..Default::default()
                        },
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let detail = store.get_lead_detail(lead_id).await.unwrap().unwrap();
        assert_eq!(detail.interactions.len(), 20);
    }
}
