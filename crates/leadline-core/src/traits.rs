//! Store abstraction consumed by the timeline engine.
//!
//! Every lookup takes a tenant, a list of predicates combined with OR, an
//! optional ownership scope, and a row cap. An empty predicate list matches
//! nothing. Implementations return rows newest first.
//!
//! The `matches` methods define predicate semantics over in-memory records;
//! SQL implementations must agree with them.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;
use crate::phone::{number_matches_tail, phone_tail};

// =============================================================================
// QUERY SHAPE
// =============================================================================

/// OR'd predicates with an optional ownership scope and a row cap.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreQuery<M> {
    pub any_of: Vec<M>,
    /// Restrict to rows owned by this user. Which column that means is
    /// store-specific; stores without ownership ignore it.
    pub scope: Option<Uuid>,
    pub limit: usize,
}

impl<M> StoreQuery<M> {
    pub fn new(any_of: Vec<M>, limit: usize) -> Self {
        Self {
            any_of,
            scope: None,
            limit,
        }
    }

    pub fn scoped(mut self, scope: Option<Uuid>) -> Self {
        self.scope = scope;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.any_of.is_empty()
    }
}

/// Case-insensitive substring test; a blank needle never matches.
pub fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() {
        return false;
    }
    haystack
        .map(|h| h.to_lowercase().contains(&needle.to_lowercase()))
        .unwrap_or(false)
}

fn in_set(id: Option<Uuid>, set: &[Uuid]) -> bool {
    id.map(|id| set.contains(&id)).unwrap_or(false)
}

// =============================================================================
// PREDICATES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactMatch {
    /// Same phone, compared on the normalized ten-digit tail.
    Phone(String),
    /// Same email, case-insensitive.
    Email(String),
    /// Contact's company name contains the text.
    CompanyNameContains(String),
    /// First name contains `first` and last name contains `last`.
    NameContains { first: String, last: String },
}

impl ContactMatch {
    pub fn matches(&self, contact: &Contact) -> bool {
        match self {
            ContactMatch::Phone(phone) => match (phone_tail(phone), contact.phone.as_deref()) {
                (Some(tail), Some(other)) => phone_tail(other).as_deref() == Some(tail.as_str()),
                _ => false,
            },
            ContactMatch::Email(email) => contact
                .email
                .as_deref()
                .map(|e| e.trim().eq_ignore_ascii_case(email.trim()))
                .unwrap_or(false),
            ContactMatch::CompanyNameContains(name) => {
                contains_ci(contact.company_name.as_deref(), name)
            }
            ContactMatch::NameContains { first, last } => {
                contains_ci(contact.first_name.as_deref(), first)
                    && contains_ci(contact.last_name.as_deref(), last)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompanyMatch {
    NameContains(String),
}

impl CompanyMatch {
    pub fn matches(&self, company: &Company) -> bool {
        match self {
            CompanyMatch::NameContains(name) => contains_ci(Some(&company.name), name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DealMatch {
    ContactIn(Vec<Uuid>),
    CompanyIn(Vec<Uuid>),
    CompanyNameContains(String),
    TitleContains(String),
    OwnedBy(Uuid),
}

impl DealMatch {
    pub fn matches(&self, deal: &Deal) -> bool {
        match self {
            DealMatch::ContactIn(ids) => in_set(deal.contact_id, ids),
            DealMatch::CompanyIn(ids) => in_set(deal.company_id, ids),
            DealMatch::CompanyNameContains(name) => contains_ci(deal.company_name.as_deref(), name),
            DealMatch::TitleContains(text) => contains_ci(Some(&deal.title), text),
            DealMatch::OwnedBy(owner) => deal.owner_id == Some(*owner),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskMatch {
    ContactIn(Vec<Uuid>),
    CompanyIn(Vec<Uuid>),
    DealIn(Vec<Uuid>),
    /// Title or description contains the text.
    TextContains(String),
    AssignedTo(Uuid),
}

impl TaskMatch {
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            TaskMatch::ContactIn(ids) => in_set(task.contact_id, ids),
            TaskMatch::CompanyIn(ids) => in_set(task.company_id, ids),
            TaskMatch::DealIn(ids) => in_set(task.deal_id, ids),
            TaskMatch::TextContains(text) => {
                contains_ci(Some(&task.title), text)
                    || contains_ci(task.description.as_deref(), text)
            }
            TaskMatch::AssignedTo(user) => task.assignee_id == Some(*user),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityMatch {
    ContactIn(Vec<Uuid>),
    DealIn(Vec<Uuid>),
    BodyContains(String),
}

impl ActivityMatch {
    pub fn matches(&self, activity: &Activity) -> bool {
        match self {
            ActivityMatch::ContactIn(ids) => in_set(activity.contact_id, ids),
            ActivityMatch::DealIn(ids) => in_set(activity.deal_id, ids),
            ActivityMatch::BodyContains(text) => contains_ci(activity.body.as_deref(), text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallMatch {
    /// Either leg contains the digit tail.
    PhoneTail(String),
}

impl CallMatch {
    pub fn matches(&self, call: &CallLog) -> bool {
        match self {
            CallMatch::PhoneTail(tail) => {
                number_matches_tail(&call.from_number, tail)
                    || number_matches_tail(&call.to_number, tail)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmsMatch {
    /// Recipient contains the digit tail.
    RecipientTail(String),
}

impl SmsMatch {
    pub fn matches(&self, sms: &SmsLog) -> bool {
        match self {
            SmsMatch::RecipientTail(tail) => number_matches_tail(&sms.recipient, tail),
        }
    }
}

// =============================================================================
// STORE TRAIT
// =============================================================================

/// Read access to the CRM stores the timeline correlates against.
///
/// A store whose backing table is absent returns `Error::NotProvisioned`.
#[async_trait]
pub trait TimelineStore: Send + Sync {
    /// Fetch a lead by id within a tenant.
    async fn fetch_lead(&self, tenant_id: Uuid, lead_id: Uuid) -> Result<Option<Lead>>;

    /// Contacts, newest first. Scope is ignored.
    async fn find_contacts(
        &self,
        tenant_id: Uuid,
        query: &StoreQuery<ContactMatch>,
    ) -> Result<Vec<Contact>>;

    /// Companies, newest first. Scope is ignored.
    async fn find_companies(
        &self,
        tenant_id: Uuid,
        query: &StoreQuery<CompanyMatch>,
    ) -> Result<Vec<Company>>;

    /// Deals by most recent stage change. Scope restricts to `owner_id`.
    async fn find_deals(&self, tenant_id: Uuid, query: &StoreQuery<DealMatch>)
        -> Result<Vec<Deal>>;

    /// Tasks, newest first. Scope restricts to assignee or creator.
    async fn find_tasks(&self, tenant_id: Uuid, query: &StoreQuery<TaskMatch>)
        -> Result<Vec<Task>>;

    /// Activities, most recent first. Scope is ignored.
    async fn find_activities(
        &self,
        tenant_id: Uuid,
        query: &StoreQuery<ActivityMatch>,
    ) -> Result<Vec<Activity>>;

    /// Call logs, most recent first. Scope restricts to the agent.
    async fn find_calls(&self, tenant_id: Uuid, query: &StoreQuery<CallMatch>)
        -> Result<Vec<CallLog>>;

    /// SMS logs, newest first. Scope restricts to the creator.
    async fn find_sms(&self, tenant_id: Uuid, query: &StoreQuery<SmsMatch>)
        -> Result<Vec<SmsLog>>;

    /// Batch-resolve users for display. Unknown ids are omitted.
    async fn resolve_users(&self, tenant_id: Uuid, ids: &[Uuid]) -> Result<Vec<UserRef>>;
}
