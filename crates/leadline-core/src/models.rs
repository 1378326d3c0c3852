//! Record types read by the timeline engine.
//!
//! These mirror rows owned by the CRM stores. The engine never writes them.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults::UNKNOWN_USER;

// =============================================================================
// LEAD
// =============================================================================

/// An unqualified prospect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Free text, not a foreign key.
    pub company_name: Option<String>,
    pub source: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub follow_up_at: Option<DateTime<Utc>>,
    pub owner_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// First and last name joined by a space, or None when both are blank.
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

// =============================================================================
// CORRELATED RECORDS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub company_id: Option<Uuid>,
    /// Company name as typed on the contact.
    pub company_name: Option<String>,
    pub owner_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A deal, which doubles as a quote once it has been sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deal {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    /// Free-text stage label; tenants name stages arbitrarily.
    pub stage: String,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub contact_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub company_name: Option<String>,
    pub owner_id: Option<Uuid>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Last stage change.
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub due_at: Option<DateTime<Utc>>,
    pub assignee_id: Option<Uuid>,
    pub created_by_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub deal_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A free-text activity (note, logged call, meeting) recorded elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub activity_type: String,
    pub body: Option<String>,
    pub contact_id: Option<Uuid>,
    pub deal_id: Option<Uuid>,
    pub created_by_id: Option<Uuid>,
    pub happened_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Inbound,
    Outbound,
}

impl CallDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallDirection::Inbound => "inbound",
            CallDirection::Outbound => "outbound",
        }
    }

    /// Parse a stored direction; anything other than "inbound" is outbound.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("inbound") {
            CallDirection::Inbound
        } else {
            CallDirection::Outbound
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallLog {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub direction: CallDirection,
    pub from_number: String,
    pub to_number: String,
    pub agent_id: Option<Uuid>,
    pub status: String,
    pub duration_sec: i32,
    pub recording_url: Option<String>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsLog {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub recipient: String,
    pub body: String,
    pub status: String,
    pub created_by_id: Option<Uuid>,
    pub queued_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// USERS AND ACTORS
// =============================================================================

/// Minimal user record for display-name rendering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserRef {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

impl UserRef {
    /// Render the user: first+last, display name, email, phone, "unknown".
    pub fn label(&self) -> String {
        let name: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .filter_map(non_blank)
            .collect();
        if !name.is_empty() {
            return name.join(" ");
        }
        non_blank(self.display_name.as_deref())
            .or_else(|| non_blank(self.email.as_deref()))
            .or_else(|| non_blank(self.phone.as_deref()))
            .unwrap_or(UNKNOWN_USER)
            .to_string()
    }
}

/// Capability keys consulted by the timeline.
pub mod capability {
    /// Read any lead in the tenant.
    pub const MANAGE_LEADS: &str = "leads.manage";
    /// See other users' tasks.
    pub const TASKS_READ_TEAM: &str = "tasks.read_team";
    /// See other users' deals and quotes.
    pub const DEALS_READ_TEAM: &str = "deals.read_team";
    /// See other agents' calls.
    pub const CALLS_READ_TEAM: &str = "calls.read_team";
    /// See SMS sent by other users.
    pub const SMS_READ_TEAM: &str = "sms.read_team";
    /// Grants every capability.
    pub const ALL: &str = "*";
}

/// The authenticated caller, already resolved to a tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub capabilities: HashSet<String>,
}

impl Actor {
    pub fn new<I, S>(user_id: Uuid, tenant_id: Uuid, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user_id,
            tenant_id,
            capabilities: capabilities.into_iter().map(Into::into).collect(),
        }
    }

    /// Check whether the actor holds a capability key.
    pub fn has_capability(&self, key: &str) -> bool {
        self.capabilities.contains(capability::ALL) || self.capabilities.contains(key)
    }

    /// Whether the actor may read this lead at all.
    pub fn can_read_lead(&self, lead: &Lead) -> bool {
        lead.tenant_id == self.tenant_id
            && (lead.owner_id == Some(self.user_id)
                || self.has_capability(capability::MANAGE_LEADS))
    }

    /// `None` when the actor has team access, else the actor's own id.
    pub fn scope_for(&self, team_capability: &str) -> Option<Uuid> {
        if self.has_capability(team_capability) {
            None
        } else {
            Some(self.user_id)
        }
    }
}
