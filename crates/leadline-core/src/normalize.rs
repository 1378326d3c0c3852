//! Per-source normalizers turning store rows into timeline items.
//!
//! Each function is pure: the same row, users and `now` always produce the
//! same items.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::defaults::UNKNOWN_USER;
use crate::item::{ItemDetail, QuoteEvent, SmsLifecycle, TimelineItem};
use crate::models::{Activity, CallDirection, CallLog, Deal, Lead, SmsLog, Task, UserRef};
use crate::stage::{classify_stage, StageFamily};

/// Status vocabulary meaning a task is finished.
pub const DONE_STATUSES: &[&str] = &[
    "done",
    "completed",
    "complete",
    "closed",
    "finished",
    "انجام شد",
    "انجام شده",
];

pub const FOLLOW_UP_OVERDUE: &str = "OVERDUE";
pub const FOLLOW_UP_SCHEDULED: &str = "SCHEDULED";

/// Resolved users keyed by id.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: HashMap<Uuid, UserRef>,
}

impl UserDirectory {
    pub fn new(users: HashMap<Uuid, UserRef>) -> Self {
        Self { users }
    }

    /// Display label for an optional user reference.
    ///
    /// A missing reference yields None; a reference to an unknown user yields
    /// the "unknown" placeholder.
    pub fn label(&self, id: Option<Uuid>) -> Option<String> {
        id.map(|id| {
            self.users
                .get(&id)
                .map(UserRef::label)
                .unwrap_or_else(|| UNKNOWN_USER.to_string())
        })
    }
}

/// Shared inputs for one normalization pass.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    pub lead_id: Uuid,
    pub now: DateTime<Utc>,
    pub users: &'a UserDirectory,
    pub preview_chars: usize,
}

impl NormalizeContext<'_> {
    fn refs(&self, pairs: &[(&str, Option<Uuid>)]) -> BTreeMap<String, String> {
        let mut refs = BTreeMap::new();
        refs.insert("leadId".to_string(), self.lead_id.to_string());
        for (key, id) in pairs {
            if let Some(id) = id {
                refs.insert((*key).to_string(), id.to_string());
            }
        }
        refs
    }

    fn preview(&self, text: Option<&str>) -> Option<String> {
        truncate_preview(text?, self.preview_chars)
    }
}

/// Trim and cut text to `max` characters, marking the cut with an ellipsis.
pub fn truncate_preview(text: &str, max: usize) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if text.chars().count() <= max {
        return Some(text.to_string());
    }
    let cut: String = text.chars().take(max).collect();
    Some(format!("{}…", cut.trim_end()))
}

/// Whether a task status means the task is finished.
pub fn is_done_status(status: &str) -> bool {
    let status = status.trim().to_lowercase();
    DONE_STATUSES.iter().any(|s| *s == status)
}

/// Human phrase for a due date relative to `now`, by calendar day.
pub fn due_phrase(due: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(due) = due else {
        return "no due date".to_string();
    };
    let days = (due.date_naive() - now.date_naive()).num_days();
    match days {
        0 => "due today".to_string(),
        1 => "due tomorrow".to_string(),
        -1 => "overdue by 1 day".to_string(),
        d if d > 1 => format!("due in {} days", d),
        d => format!("overdue by {} days", -d),
    }
}

fn format_duration(secs: i32) -> String {
    let secs = secs.max(0);
    format!("{}:{:02}", secs / 60, secs % 60)
}

fn join_parts(parts: Vec<String>) -> Option<String> {
    let parts: Vec<String> = parts.into_iter().filter(|p| !p.is_empty()).collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" · "))
    }
}

// =============================================================================
// LEAD
// =============================================================================

/// The lead's own events: created, assigned, and follow-up.
pub fn normalize_lead(lead: &Lead, ctx: &NormalizeContext<'_>) -> Vec<TimelineItem> {
    let mut items = Vec::with_capacity(3);

    items.push(TimelineItem {
        id: format!("lead_created:{}", lead.id),
        ts: lead.created_at,
        title: "Lead created".to_string(),
        subtitle: lead.source.as_ref().map(|s| format!("Source: {}", s)),
        status: lead.status.clone(),
        preview: ctx.preview(lead.notes.as_deref()),
        refs: ctx.refs(&[]),
        detail: ItemDetail::LeadCreated {
            source: lead.source.clone(),
            lead_status: lead.status.clone(),
        },
    });

    if let Some(owner_id) = lead.owner_id {
        let owner_name = ctx
            .users
            .label(Some(owner_id))
            .unwrap_or_else(|| UNKNOWN_USER.to_string());
        items.push(TimelineItem {
            id: format!("owner_assigned:{}", lead.id),
            ts: lead.created_at,
            title: format!("Assigned to {}", owner_name),
            subtitle: None,
            status: None,
            preview: None,
            refs: ctx.refs(&[("ownerId", Some(owner_id))]),
            detail: ItemDetail::OwnerAssigned {
                owner_id,
                owner_name,
            },
        });
    }

    if let Some(due_at) = lead.follow_up_at {
        let overdue = due_at < ctx.now;
        items.push(TimelineItem {
            id: format!("follow_up:{}", lead.id),
            ts: due_at,
            title: "Follow-up".to_string(),
            subtitle: Some(due_phrase(Some(due_at), ctx.now)),
            status: Some(
                if overdue {
                    FOLLOW_UP_OVERDUE
                } else {
                    FOLLOW_UP_SCHEDULED
                }
                .to_string(),
            ),
            preview: None,
            refs: ctx.refs(&[]),
            detail: ItemDetail::FollowUp { due_at, overdue },
        });
    }

    items
}

// =============================================================================
// TASKS AND ACTIVITIES
// =============================================================================

/// A task, ordered by its due date (creation time when undated).
pub fn normalize_task(task: &Task, ctx: &NormalizeContext<'_>) -> TimelineItem {
    let assignee_name = ctx.users.label(task.assignee_id);
    let subtitle = join_parts(vec![
        assignee_name.clone().unwrap_or_default(),
        due_phrase(task.due_at, ctx.now),
    ]);

    TimelineItem {
        id: format!("task:{}", task.id),
        ts: task.due_at.unwrap_or(task.created_at),
        title: task.title.clone(),
        subtitle,
        status: Some(task.status.clone()),
        preview: ctx.preview(task.description.as_deref()),
        refs: ctx.refs(&[
            ("taskId", Some(task.id)),
            ("contactId", task.contact_id),
            ("companyId", task.company_id),
            ("dealId", task.deal_id),
        ]),
        detail: ItemDetail::Task {
            due_at: task.due_at,
            assignee_id: task.assignee_id,
            assignee_name,
            done: is_done_status(&task.status),
        },
    }
}

pub fn normalize_activity(activity: &Activity, ctx: &NormalizeContext<'_>) -> TimelineItem {
    TimelineItem {
        id: format!("activity:{}", activity.id),
        ts: activity.happened_at.unwrap_or(activity.created_at),
        title: format!("Activity: {}", activity.activity_type),
        subtitle: ctx.users.label(activity.created_by_id),
        status: Some(activity.activity_type.clone()),
        preview: ctx.preview(activity.body.as_deref()),
        refs: ctx.refs(&[
            ("activityId", Some(activity.id)),
            ("contactId", activity.contact_id),
            ("dealId", activity.deal_id),
        ]),
        detail: ItemDetail::Activity {
            activity_type: activity.activity_type.clone(),
        },
    }
}

// =============================================================================
// DEALS / QUOTES
// =============================================================================

/// Quote lifecycle items for one deal.
///
/// Emits "sent" when the deal has a send timestamp, then at most one of
/// "signed", "negotiation", or "open" by stage classification. "open" only
/// models a quote drafted but never sent.
pub fn normalize_deal(deal: &Deal, ctx: &NormalizeContext<'_>) -> Vec<TimelineItem> {
    let family = classify_stage(&deal.stage);
    let amount = deal.amount.map(|a| match deal.currency.as_deref() {
        Some(c) => format!("{} {}", a, c),
        None => a.to_string(),
    });
    let subtitle = join_parts(vec![
        format!("Stage: {}", deal.stage),
        amount.unwrap_or_default(),
    ]);

    let item = |event: QuoteEvent, ts: DateTime<Utc>, title: String| TimelineItem {
        id: format!("quote:{}:{}", deal.id, event.as_str()),
        ts,
        title,
        subtitle: subtitle.clone(),
        status: Some(event.as_str().to_string()),
        preview: None,
        refs: ctx.refs(&[
            ("dealId", Some(deal.id)),
            ("contactId", deal.contact_id),
            ("companyId", deal.company_id),
        ]),
        detail: ItemDetail::Quote {
            deal_id: deal.id,
            event,
            stage: deal.stage.clone(),
            stage_family: family,
            sent_at: deal.sent_at,
            amount: deal.amount,
            currency: deal.currency.clone(),
        },
    };

    let mut items = Vec::with_capacity(2);
    if let Some(sent_at) = deal.sent_at {
        items.push(item(
            QuoteEvent::Sent,
            sent_at,
            format!("Quote sent: {}", deal.title),
        ));
    }
    match family {
        Some(StageFamily::Signed) => items.push(item(
            QuoteEvent::Signed,
            deal.updated_at,
            format!("Quote signed: {}", deal.title),
        )),
        Some(StageFamily::Negotiation) => items.push(item(
            QuoteEvent::Negotiation,
            deal.updated_at,
            format!("Negotiation: {}", deal.title),
        )),
        Some(StageFamily::QuoteSent) if deal.sent_at.is_none() => items.push(item(
            QuoteEvent::Open,
            deal.created_at,
            format!("Quote drafted: {}", deal.title),
        )),
        _ => {}
    }
    items
}

// =============================================================================
// CALLS AND SMS
// =============================================================================

pub fn normalize_call(call: &CallLog, ctx: &NormalizeContext<'_>) -> TimelineItem {
    let agent_name = ctx.users.label(call.agent_id);
    let title = match call.direction {
        CallDirection::Inbound => "Inbound call",
        CallDirection::Outbound => "Outbound call",
    };
    let mut parts = vec![agent_name.clone().unwrap_or_default(), call.status.clone()];
    if call.duration_sec > 0 {
        parts.push(format_duration(call.duration_sec));
    }

    TimelineItem {
        id: format!("call:{}", call.id),
        ts: call.started_at,
        title: title.to_string(),
        subtitle: join_parts(parts),
        status: Some(call.status.clone()),
        preview: None,
        refs: ctx.refs(&[("callId", Some(call.id)), ("agentId", call.agent_id)]),
        detail: ItemDetail::Call {
            direction: call.direction,
            from_number: call.from_number.clone(),
            to_number: call.to_number.clone(),
            duration_sec: call.duration_sec,
            agent_name,
            recording_url: call.recording_url.clone(),
        },
    }
}

/// Most advanced lifecycle state reached and when: delivered, failed, sent,
/// queued. Falls back to the creation time as queued.
pub fn sms_lifecycle(sms: &SmsLog) -> (SmsLifecycle, DateTime<Utc>) {
    [
        (SmsLifecycle::Delivered, sms.delivered_at),
        (SmsLifecycle::Failed, sms.failed_at),
        (SmsLifecycle::Sent, sms.sent_at),
        (SmsLifecycle::Queued, sms.queued_at),
    ]
    .into_iter()
    .find_map(|(state, at)| at.map(|at| (state, at)))
    .unwrap_or((SmsLifecycle::Queued, sms.created_at))
}

pub fn normalize_sms(sms: &SmsLog, ctx: &NormalizeContext<'_>) -> TimelineItem {
    let (lifecycle, ts) = sms_lifecycle(sms);
    TimelineItem {
        id: format!("sms:{}", sms.id),
        ts,
        title: format!("SMS to {}", sms.recipient),
        subtitle: ctx.users.label(sms.created_by_id),
        status: Some(lifecycle.as_str().to_string()),
        preview: ctx.preview(Some(&sms.body)),
        refs: ctx.refs(&[("smsId", Some(sms.id))]),
        detail: ItemDetail::Sms {
            recipient: sms.recipient.clone(),
            lifecycle,
            error: sms.error.clone(),
        },
    }
}
