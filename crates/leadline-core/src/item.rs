//! Canonical timeline item.
//!
//! Every source record is normalized into a [`TimelineItem`]: shared
//! canonical fields plus an [`ItemDetail`] variant carrying what is specific
//! to its source. The item type is derived from the detail variant, so the
//! two can never disagree.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::models::CallDirection;
use crate::stage::StageFamily;

/// Feed item type, also the vocabulary of the `type` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    LeadCreated,
    OwnerAssigned,
    FollowUp,
    Task,
    Activity,
    Quote,
    Call,
    Sms,
}

impl ItemType {
    pub const ALL: [ItemType; 8] = [
        ItemType::LeadCreated,
        ItemType::OwnerAssigned,
        ItemType::FollowUp,
        ItemType::Task,
        ItemType::Activity,
        ItemType::Quote,
        ItemType::Call,
        ItemType::Sms,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::LeadCreated => "lead_created",
            ItemType::OwnerAssigned => "owner_assigned",
            ItemType::FollowUp => "follow_up",
            ItemType::Task => "task",
            ItemType::Activity => "activity",
            ItemType::Quote => "quote",
            ItemType::Call => "call",
            ItemType::Sms => "sms",
        }
    }

    /// Parse a filter token, accepting common aliases. Unknown tokens are None.
    pub fn parse_token(token: &str) -> Option<Self> {
        let token = token.trim().to_lowercase().replace('-', "_");
        match token.as_str() {
            "lead_created" | "created" | "lead" => Some(ItemType::LeadCreated),
            "owner_assigned" | "assigned" => Some(ItemType::OwnerAssigned),
            "follow_up" | "followup" => Some(ItemType::FollowUp),
            "task" | "tasks" => Some(ItemType::Task),
            "activity" | "activities" | "note" | "notes" => Some(ItemType::Activity),
            "quote" | "quotes" | "deal" | "deals" => Some(ItemType::Quote),
            "call" | "calls" => Some(ItemType::Call),
            "sms" => Some(ItemType::Sms),
            _ => None,
        }
    }
}

/// Lifecycle event a deal emits into the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteEvent {
    Sent,
    Signed,
    Negotiation,
    Open,
}

impl QuoteEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteEvent::Sent => "sent",
            QuoteEvent::Signed => "signed",
            QuoteEvent::Negotiation => "negotiation",
            QuoteEvent::Open => "open",
        }
    }
}

/// Most advanced state an SMS reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmsLifecycle {
    Queued,
    Sent,
    Failed,
    Delivered,
}

impl SmsLifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmsLifecycle::Queued => "queued",
            SmsLifecycle::Sent => "sent",
            SmsLifecycle::Failed => "failed",
            SmsLifecycle::Delivered => "delivered",
        }
    }
}

/// Source-specific payload. Serialized as the item's `meta` object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum ItemDetail {
    LeadCreated {
        source: Option<String>,
        lead_status: Option<String>,
    },
    OwnerAssigned {
        owner_id: Uuid,
        owner_name: String,
    },
    FollowUp {
        due_at: DateTime<Utc>,
        overdue: bool,
    },
    Task {
        due_at: Option<DateTime<Utc>>,
        assignee_id: Option<Uuid>,
        assignee_name: Option<String>,
        done: bool,
    },
    Activity {
        activity_type: String,
    },
    Quote {
        deal_id: Uuid,
        event: QuoteEvent,
        stage: String,
        stage_family: Option<StageFamily>,
        sent_at: Option<DateTime<Utc>>,
        amount: Option<f64>,
        currency: Option<String>,
    },
    Call {
        direction: CallDirection,
        from_number: String,
        to_number: String,
        duration_sec: i32,
        agent_name: Option<String>,
        recording_url: Option<String>,
    },
    Sms {
        recipient: String,
        lifecycle: SmsLifecycle,
        error: Option<String>,
    },
}

impl ItemDetail {
    pub fn item_type(&self) -> ItemType {
        match self {
            ItemDetail::LeadCreated { .. } => ItemType::LeadCreated,
            ItemDetail::OwnerAssigned { .. } => ItemType::OwnerAssigned,
            ItemDetail::FollowUp { .. } => ItemType::FollowUp,
            ItemDetail::Task { .. } => ItemType::Task,
            ItemDetail::Activity { .. } => ItemType::Activity,
            ItemDetail::Quote { .. } => ItemType::Quote,
            ItemDetail::Call { .. } => ItemType::Call,
            ItemDetail::Sms { .. } => ItemType::Sms,
        }
    }
}

/// One normalized, typed, timestamped feed entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineItem {
    /// `{type}:{source id}[:{event}]`, unique across the feed.
    pub id: String,
    /// The single ordering timestamp.
    pub ts: DateTime<Utc>,
    pub title: String,
    pub subtitle: Option<String>,
    pub status: Option<String>,
    pub preview: Option<String>,
    /// Opaque ids back to source records.
    pub refs: BTreeMap<String, String>,
    pub detail: ItemDetail,
}

impl TimelineItem {
    pub fn item_type(&self) -> ItemType {
        self.detail.item_type()
    }
}

#[derive(Serialize)]
struct ItemView<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    item_type: ItemType,
    ts: &'a DateTime<Utc>,
    title: &'a str,
    subtitle: Option<&'a str>,
    status: Option<&'a str>,
    preview: Option<&'a str>,
    refs: &'a BTreeMap<String, String>,
    meta: &'a ItemDetail,
}

impl Serialize for TimelineItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ItemView {
            id: &self.id,
            item_type: self.item_type(),
            ts: &self.ts,
            title: &self.title,
            subtitle: self.subtitle.as_deref(),
            status: self.status.as_deref(),
            preview: self.preview.as_deref(),
            refs: &self.refs,
            meta: &self.detail,
        }
        .serialize(serializer)
    }
}
