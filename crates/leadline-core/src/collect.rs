//! Source collectors.
//!
//! One collector per source. Each applies the actor's ownership scope for its
//! source, runs one bounded query, resolves display names for the rows it
//! found, and normalizes them into timeline items. A store that is not
//! provisioned yields no items; any other failure fails the request.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use futures::try_join;
use tracing::warn;
use uuid::Uuid;

use crate::config::TimelineConfig;
use crate::correlate::{settled_deal_predicates, CorrelationKeys};
use crate::error::Result;
use crate::item::TimelineItem;
use crate::models::{capability, Actor, Lead};
use crate::normalize::{
    normalize_activity, normalize_call, normalize_deal, normalize_lead, normalize_sms,
    normalize_task, NormalizeContext, UserDirectory,
};
use crate::traits::{
    ActivityMatch, CallMatch, SmsMatch, StoreQuery, TaskMatch, TimelineStore,
};

/// Turn a not-provisioned store into an empty result, logging the skip.
pub(crate) fn or_empty<T>(source: &str, result: Result<Vec<T>>) -> Result<Vec<T>> {
    match result {
        Err(e) if e.is_not_provisioned() => {
            warn!(
                subsystem = "timeline",
                component = "collector",
                source,
                error = %e,
                "Store not provisioned, skipping source"
            );
            Ok(Vec::new())
        }
        other => other,
    }
}

/// Resolve display names for the given user ids in one batch.
pub async fn user_directory(
    store: &dyn TimelineStore,
    tenant_id: Uuid,
    ids: impl IntoIterator<Item = Uuid>,
) -> Result<UserDirectory> {
    let ids: Vec<Uuid> = ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
    if ids.is_empty() {
        return Ok(UserDirectory::default());
    }
    let users = or_empty("users", store.resolve_users(tenant_id, &ids).await)?;
    Ok(UserDirectory::new(
        users.into_iter().map(|u| (u.id, u)).collect::<HashMap<_, _>>(),
    ))
}

/// Everything a collector needs for one request.
#[derive(Clone, Copy)]
pub struct CollectContext<'a> {
    pub store: &'a dyn TimelineStore,
    pub actor: &'a Actor,
    pub lead: &'a Lead,
    pub keys: &'a CorrelationKeys,
    /// Users referenced by the lead row itself.
    pub lead_users: &'a UserDirectory,
    pub config: &'a TimelineConfig,
    pub now: DateTime<Utc>,
}

impl CollectContext<'_> {
    fn tenant(&self) -> Uuid {
        self.lead.tenant_id
    }

    fn normalize_with<'u>(&self, users: &'u UserDirectory) -> NormalizeContext<'u> {
        NormalizeContext {
            lead_id: self.lead.id,
            now: self.now,
            users,
            preview_chars: self.config.preview_chars,
        }
    }

    /// Free-text needles taken from the lead: full name and company name.
    fn text_needles(&self) -> impl Iterator<Item = String> + '_ {
        self.keys
            .full_name
            .iter()
            .chain(self.keys.company_name.iter())
            .cloned()
    }
}

// =============================================================================
// LEAD
// =============================================================================

pub async fn collect_lead(cx: CollectContext<'_>) -> Result<Vec<TimelineItem>> {
    Ok(normalize_lead(cx.lead, &cx.normalize_with(cx.lead_users)))
}

// =============================================================================
// TASKS
// =============================================================================

pub fn task_predicates(keys: &CorrelationKeys) -> Vec<TaskMatch> {
    let mut any_of = Vec::new();
    if !keys.contact_ids.is_empty() {
        any_of.push(TaskMatch::ContactIn(keys.contact_ids.clone()));
    }
    if !keys.company_ids.is_empty() {
        any_of.push(TaskMatch::CompanyIn(keys.company_ids.clone()));
    }
    if !keys.deal_ids.is_empty() {
        any_of.push(TaskMatch::DealIn(keys.deal_ids.clone()));
    }
    any_of.extend(
        keys.full_name
            .iter()
            .chain(keys.company_name.iter())
            .cloned()
            .map(TaskMatch::TextContains),
    );
    any_of
}

/// Tasks correlated to the lead. When nothing correlates and the lead has an
/// owner, the owner's assigned tasks are used instead.
pub async fn collect_tasks(cx: CollectContext<'_>) -> Result<Vec<TimelineItem>> {
    let scope = cx.actor.scope_for(capability::TASKS_READ_TEAM);
    let cap = cx.config.caps.tasks;

    let structural = task_predicates(cx.keys);
    let mut tasks = if structural.is_empty() {
        Vec::new()
    } else {
        let query = StoreQuery::new(structural, cap).scoped(scope);
        or_empty("tasks", cx.store.find_tasks(cx.tenant(), &query).await)?
    };
    if tasks.is_empty() {
        if let Some(owner) = cx.lead.owner_id {
            let query = StoreQuery::new(vec![TaskMatch::AssignedTo(owner)], cap).scoped(scope);
            tasks = or_empty("tasks", cx.store.find_tasks(cx.tenant(), &query).await)?;
        }
    }

    let users = user_directory(cx.store, cx.tenant(), tasks.iter().filter_map(|t| t.assignee_id))
        .await?;
    let ncx = cx.normalize_with(&users);
    Ok(tasks.iter().map(|t| normalize_task(t, &ncx)).collect())
}

// =============================================================================
// ACTIVITIES
// =============================================================================

pub async fn collect_activities(cx: CollectContext<'_>) -> Result<Vec<TimelineItem>> {
    let mut any_of = Vec::new();
    if !cx.keys.contact_ids.is_empty() {
        any_of.push(ActivityMatch::ContactIn(cx.keys.contact_ids.clone()));
    }
    if !cx.keys.deal_ids.is_empty() {
        any_of.push(ActivityMatch::DealIn(cx.keys.deal_ids.clone()));
    }
    any_of.extend(cx.text_needles().map(ActivityMatch::BodyContains));
    if any_of.is_empty() {
        return Ok(Vec::new());
    }

    let query = StoreQuery::new(any_of, cx.config.caps.activities);
    let activities = or_empty(
        "activities",
        cx.store.find_activities(cx.tenant(), &query).await,
    )?;

    let users = user_directory(
        cx.store,
        cx.tenant(),
        activities.iter().filter_map(|a| a.created_by_id),
    )
    .await?;
    let ncx = cx.normalize_with(&users);
    Ok(activities
        .iter()
        .map(|a| normalize_activity(a, &ncx))
        .collect())
}

// =============================================================================
// DEALS / QUOTES
// =============================================================================

pub async fn collect_quotes(cx: CollectContext<'_>) -> Result<Vec<TimelineItem>> {
    let any_of = settled_deal_predicates(cx.lead, cx.keys);
    if any_of.is_empty() {
        return Ok(Vec::new());
    }
    let query = StoreQuery::new(any_of, cx.config.caps.deals)
        .scoped(cx.actor.scope_for(capability::DEALS_READ_TEAM));
    let deals = or_empty("deals", cx.store.find_deals(cx.tenant(), &query).await)?;

    let users = UserDirectory::default();
    let ncx = cx.normalize_with(&users);
    Ok(deals.iter().flat_map(|d| normalize_deal(d, &ncx)).collect())
}

// =============================================================================
// CALLS AND SMS
// =============================================================================

pub async fn collect_calls(cx: CollectContext<'_>) -> Result<Vec<TimelineItem>> {
    let Some(tail) = cx.keys.phone_tail.clone() else {
        return Ok(Vec::new());
    };
    let query = StoreQuery::new(vec![CallMatch::PhoneTail(tail)], cx.config.caps.calls)
        .scoped(cx.actor.scope_for(capability::CALLS_READ_TEAM));
    let calls = or_empty("calls", cx.store.find_calls(cx.tenant(), &query).await)?;

    let users =
        user_directory(cx.store, cx.tenant(), calls.iter().filter_map(|c| c.agent_id)).await?;
    let ncx = cx.normalize_with(&users);
    Ok(calls.iter().map(|c| normalize_call(c, &ncx)).collect())
}

pub async fn collect_sms(cx: CollectContext<'_>) -> Result<Vec<TimelineItem>> {
    let Some(tail) = cx.keys.phone_tail.clone() else {
        return Ok(Vec::new());
    };
    let query = StoreQuery::new(vec![SmsMatch::RecipientTail(tail)], cx.config.caps.sms)
        .scoped(cx.actor.scope_for(capability::SMS_READ_TEAM));
    let messages = or_empty("sms", cx.store.find_sms(cx.tenant(), &query).await)?;

    let users = user_directory(
        cx.store,
        cx.tenant(),
        messages.iter().filter_map(|s| s.created_by_id),
    )
    .await?;
    let ncx = cx.normalize_with(&users);
    Ok(messages.iter().map(|s| normalize_sms(s, &ncx)).collect())
}

/// Run every collector concurrently and merge their items.
///
/// The first genuine failure aborts the whole collection.
pub async fn collect_all(cx: CollectContext<'_>) -> Result<Vec<TimelineItem>> {
    let (lead, tasks, activities, quotes, calls, sms) = try_join!(
        collect_lead(cx),
        collect_tasks(cx),
        collect_activities(cx),
        collect_quotes(cx),
        collect_calls(cx),
        collect_sms(cx),
    )?;

    let mut items = Vec::with_capacity(
        lead.len() + tasks.len() + activities.len() + quotes.len() + calls.len() + sms.len(),
    );
    items.extend(lead);
    items.extend(tasks);
    items.extend(activities);
    items.extend(quotes);
    items.extend(calls);
    items.extend(sms);
    Ok(items)
}
