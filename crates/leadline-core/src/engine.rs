//! Timeline assembly for one lead.
//!
//! The feed is rebuilt on every request: authorize the lead, derive
//! correlation keys, fan out to the collectors, then filter, sort, summarize
//! and paginate the merged items.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::collect::{collect_all, user_directory, CollectContext};
use crate::config::TimelineConfig;
use crate::correlate::correlate;
use crate::cursor::decode_cursor;
use crate::error::{Error, Result};
use crate::item::TimelineItem;
use crate::models::{Actor, Lead};
use crate::normalize::UserDirectory;
use crate::pipeline::{filter_items, paginate, parse_types, sort_items, TimeWindow};
use crate::summary::{summarize, Summary};
use crate::traits::TimelineStore;

/// Raw query parameters. Every field is optional and leniently parsed.
#[derive(Debug, Clone, Default)]
pub struct TimelineRequest {
    pub from: Option<String>,
    pub to: Option<String>,
    /// Comma-separated item types.
    pub types: Option<String>,
    pub limit: Option<String>,
    pub cursor: Option<String>,
}

/// The lead as rendered alongside its timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadView {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub company_name: Option<String>,
    pub source: Option<String>,
    pub status: Option<String>,
    pub follow_up_at: Option<DateTime<Utc>>,
    pub owner_id: Option<Uuid>,
    pub owner_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LeadView {
    pub fn render(lead: &Lead, users: &UserDirectory) -> Self {
        Self {
            id: lead.id,
            full_name: lead.full_name(),
            first_name: lead.first_name.clone(),
            last_name: lead.last_name.clone(),
            phone: lead.phone.clone(),
            email: lead.email.clone(),
            company_name: lead.company_name.clone(),
            source: lead.source.clone(),
            status: lead.status.clone(),
            follow_up_at: lead.follow_up_at,
            owner_id: lead.owner_id,
            owner_name: users.label(lead.owner_id),
            created_at: lead.created_at,
            updated_at: lead.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineResponse {
    pub lead: LeadView,
    pub summary: Summary,
    pub items: Vec<TimelineItem>,
    pub next_cursor: Option<String>,
}

/// Builds lead timelines against a store.
#[derive(Clone)]
pub struct TimelineEngine {
    store: Arc<dyn TimelineStore>,
    config: TimelineConfig,
}

impl TimelineEngine {
    pub fn new(store: Arc<dyn TimelineStore>, config: TimelineConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    /// Load a lead the actor may read.
    ///
    /// A lead that does not exist and one the actor may not see produce the
    /// same error.
    pub async fn authorized_lead(&self, actor: &Actor, lead_id: Uuid) -> Result<Lead> {
        self.store
            .fetch_lead(actor.tenant_id, lead_id)
            .await?
            .filter(|lead| actor.can_read_lead(lead))
            .ok_or(Error::LeadNotFound(lead_id))
    }

    /// Assemble one page of a lead's timeline as of `now`.
    pub async fn timeline(
        &self,
        actor: &Actor,
        lead_id: Uuid,
        request: &TimelineRequest,
        now: DateTime<Utc>,
    ) -> Result<TimelineResponse> {
        let start = Instant::now();
        let store = self.store.as_ref();

        let lead = self.authorized_lead(actor, lead_id).await?;
        let keys = correlate(store, &lead, &self.config).await?;
        let lead_users = user_directory(store, lead.tenant_id, lead.owner_id).await?;

        let cx = CollectContext {
            store,
            actor,
            lead: &lead,
            keys: &keys,
            lead_users: &lead_users,
            config: &self.config,
            now,
        };
        let collected = collect_all(cx).await?;
        let collected_count = collected.len();

        let types = parse_types(request.types.as_deref());
        let window = TimeWindow::parse(request.from.as_deref(), request.to.as_deref());
        let mut items = filter_items(collected, &types, &window);
        sort_items(&mut items);

        let summary = summarize(&items, now, self.config.waiting_quote_after);

        let limit = self.config.clamp_limit(request.limit.as_deref());
        let cursor = request.cursor.as_deref().and_then(decode_cursor);
        let page = paginate(items, cursor.as_ref(), limit)?;

        debug!(
            subsystem = "timeline",
            component = "engine",
            op = "timeline",
            lead_id = %lead.id,
            collected = collected_count,
            filtered = summary.total_items,
            returned = page.items.len(),
            has_cursor = cursor.is_some(),
            has_more = page.next_cursor.is_some(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Timeline assembled"
        );

        Ok(TimelineResponse {
            lead: LeadView::render(&lead, &lead_users),
            summary,
            items: page.items,
            next_cursor: page.next_cursor,
        })
    }
}
