//! In-memory [`TimelineStore`] for tests and local runs.
//!
//! Predicate semantics come from the `matches` methods in [`crate::traits`],
//! so this store is the reference the SQL implementation is checked against.
//! Individual stores can be marked missing (not provisioned) or failing.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::*;
use crate::traits::*;

/// Identifies one backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    Leads,
    Contacts,
    Companies,
    Deals,
    Tasks,
    Activities,
    Calls,
    Sms,
    Users,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Leads => "leads",
            StoreKind::Contacts => "contacts",
            StoreKind::Companies => "companies",
            StoreKind::Deals => "deals",
            StoreKind::Tasks => "tasks",
            StoreKind::Activities => "activities",
            StoreKind::Calls => "calls",
            StoreKind::Sms => "sms",
            StoreKind::Users => "users",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    leads: Vec<Lead>,
    contacts: Vec<Contact>,
    companies: Vec<Company>,
    deals: Vec<Deal>,
    tasks: Vec<Task>,
    activities: Vec<Activity>,
    calls: Vec<CallLog>,
    sms: Vec<SmsLog>,
    /// Users are not tenant-partitioned here.
    users: Vec<UserRef>,
    missing: HashSet<StoreKind>,
    failing: HashSet<StoreKind>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lead(mut self, lead: Lead) -> Self {
        self.leads.push(lead);
        self
    }

    pub fn with_contact(mut self, contact: Contact) -> Self {
        self.contacts.push(contact);
        self
    }

    pub fn with_company(mut self, company: Company) -> Self {
        self.companies.push(company);
        self
    }

    pub fn with_deal(mut self, deal: Deal) -> Self {
        self.deals.push(deal);
        self
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn with_activity(mut self, activity: Activity) -> Self {
        self.activities.push(activity);
        self
    }

    pub fn with_call(mut self, call: CallLog) -> Self {
        self.calls.push(call);
        self
    }

    pub fn with_sms(mut self, sms: SmsLog) -> Self {
        self.sms.push(sms);
        self
    }

    pub fn with_user(mut self, user: UserRef) -> Self {
        self.users.push(user);
        self
    }

    /// Treat a store as not provisioned.
    pub fn without(mut self, kind: StoreKind) -> Self {
        self.missing.insert(kind);
        self
    }

    /// Make every query against a store fail.
    pub fn failing(mut self, kind: StoreKind) -> Self {
        self.failing.insert(kind);
        self
    }

    fn check(&self, kind: StoreKind) -> Result<()> {
        if self.failing.contains(&kind) {
            return Err(Error::Internal(format!(
                "simulated failure in {} store",
                kind.as_str()
            )));
        }
        if self.missing.contains(&kind) {
            return Err(Error::NotProvisioned(kind.as_str().to_string()));
        }
        Ok(())
    }
}

/// Tenant filter, OR over predicates, optional scope, newest first, capped.
fn select<T, M>(
    rows: &[T],
    tenant_id: Uuid,
    query: &StoreQuery<M>,
    tenant_of: impl Fn(&T) -> Uuid,
    matches: impl Fn(&M, &T) -> bool,
    in_scope: impl Fn(&T, Uuid) -> bool,
    recency: impl Fn(&T) -> DateTime<Utc>,
) -> Vec<T>
where
    T: Clone,
{
    let mut selected: Vec<T> = rows
        .iter()
        .filter(|row| tenant_of(row) == tenant_id)
        .filter(|row| query.any_of.iter().any(|m| matches(m, row)))
        .filter(|row| query.scope.map_or(true, |user| in_scope(row, user)))
        .cloned()
        .collect();
    selected.sort_by_key(|row| std::cmp::Reverse(recency(row)));
    selected.truncate(query.limit);
    selected
}

#[async_trait]
impl TimelineStore for MemoryStore {
    async fn fetch_lead(&self, tenant_id: Uuid, lead_id: Uuid) -> Result<Option<Lead>> {
        self.check(StoreKind::Leads)?;
        Ok(self
            .leads
            .iter()
            .find(|l| l.id == lead_id && l.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_contacts(
        &self,
        tenant_id: Uuid,
        query: &StoreQuery<ContactMatch>,
    ) -> Result<Vec<Contact>> {
        self.check(StoreKind::Contacts)?;
        Ok(select(
            &self.contacts,
            tenant_id,
            query,
            |c| c.tenant_id,
            |m, c| m.matches(c),
            |_, _| true,
            |c| c.created_at,
        ))
    }

    async fn find_companies(
        &self,
        tenant_id: Uuid,
        query: &StoreQuery<CompanyMatch>,
    ) -> Result<Vec<Company>> {
        self.check(StoreKind::Companies)?;
        Ok(select(
            &self.companies,
            tenant_id,
            query,
            |c| c.tenant_id,
            |m, c| m.matches(c),
            |_, _| true,
            |c| c.created_at,
        ))
    }

    async fn find_deals(&self, tenant_id: Uuid, query: &StoreQuery<DealMatch>) -> Result<Vec<Deal>> {
        self.check(StoreKind::Deals)?;
        Ok(select(
            &self.deals,
            tenant_id,
            query,
            |d| d.tenant_id,
            |m, d| m.matches(d),
            |d, user| d.owner_id == Some(user),
            |d| d.updated_at,
        ))
    }

    async fn find_tasks(&self, tenant_id: Uuid, query: &StoreQuery<TaskMatch>) -> Result<Vec<Task>> {
        self.check(StoreKind::Tasks)?;
        Ok(select(
            &self.tasks,
            tenant_id,
            query,
            |t| t.tenant_id,
            |m, t| m.matches(t),
            |t, user| t.assignee_id == Some(user) || t.created_by_id == Some(user),
            |t| t.created_at,
        ))
    }

    async fn find_activities(
        &self,
        tenant_id: Uuid,
        query: &StoreQuery<ActivityMatch>,
    ) -> Result<Vec<Activity>> {
        self.check(StoreKind::Activities)?;
        Ok(select(
            &self.activities,
            tenant_id,
            query,
            |a| a.tenant_id,
            |m, a| m.matches(a),
            |_, _| true,
            |a| a.happened_at.unwrap_or(a.created_at),
        ))
    }

    async fn find_calls(&self, tenant_id: Uuid, query: &StoreQuery<CallMatch>) -> Result<Vec<CallLog>> {
        self.check(StoreKind::Calls)?;
        Ok(select(
            &self.calls,
            tenant_id,
            query,
            |c| c.tenant_id,
            |m, c| m.matches(c),
            |c, user| c.agent_id == Some(user),
            |c| c.started_at,
        ))
    }

    async fn find_sms(&self, tenant_id: Uuid, query: &StoreQuery<SmsMatch>) -> Result<Vec<SmsLog>> {
        self.check(StoreKind::Sms)?;
        Ok(select(
            &self.sms,
            tenant_id,
            query,
            |s| s.tenant_id,
            |m, s| m.matches(s),
            |s, user| s.created_by_id == Some(user),
            |s| s.created_at,
        ))
    }

    async fn resolve_users(&self, _tenant_id: Uuid, ids: &[Uuid]) -> Result<Vec<UserRef>> {
        self.check(StoreKind::Users)?;
        Ok(self
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }
}
