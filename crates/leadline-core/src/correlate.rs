//! Heuristic correlation of a lead against stores with no foreign key to it.
//!
//! Each rule is an ordered list of independent matchers. A matcher inspects
//! the lead (and keys derived so far) and yields a predicate, or `None` when
//! the input it needs is absent. The yielded predicates are OR'd together in
//! one store query. Adding a heuristic means adding a list entry.

use std::collections::BTreeSet;

use futures::try_join;
use tracing::debug;
use uuid::Uuid;

use crate::collect::or_empty;
use crate::config::TimelineConfig;
use crate::error::Result;
use crate::models::Lead;
use crate::phone::phone_tail;
use crate::traits::{
    CompanyMatch, ContactMatch, DealMatch, StoreQuery, TimelineStore,
};

/// Keys derived from a lead for correlating other stores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationKeys {
    /// Last ten digits of the lead's phone.
    pub phone_tail: Option<String>,
    pub full_name: Option<String>,
    pub company_name: Option<String>,
    pub contact_ids: Vec<Uuid>,
    pub company_ids: Vec<Uuid>,
    pub deal_ids: Vec<Uuid>,
    /// True when no deal matched structurally and the lead owner's deals
    /// were used instead.
    pub owner_fallback: bool,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl CorrelationKeys {
    /// Keys computable from the lead alone, before any store lookup.
    pub fn from_lead(lead: &Lead) -> Self {
        Self {
            phone_tail: lead.phone.as_deref().and_then(phone_tail),
            full_name: lead.full_name(),
            company_name: non_blank(lead.company_name.as_deref()),
            ..Self::default()
        }
    }
}

// =============================================================================
// MATCHER LISTS
// =============================================================================

pub type ContactMatcher = fn(&Lead) -> Option<ContactMatch>;
pub type DealMatcher = fn(&Lead, &CorrelationKeys) -> Option<DealMatch>;

pub const CONTACT_MATCHERS: &[ContactMatcher] = &[
    |lead| non_blank(lead.phone.as_deref()).map(ContactMatch::Phone),
    |lead| non_blank(lead.email.as_deref()).map(ContactMatch::Email),
    |lead| non_blank(lead.company_name.as_deref()).map(ContactMatch::CompanyNameContains),
    |lead| {
        let first = non_blank(lead.first_name.as_deref())?;
        let last = non_blank(lead.last_name.as_deref())?;
        Some(ContactMatch::NameContains { first, last })
    },
];

pub const DEAL_MATCHERS: &[DealMatcher] = &[
    |_, keys| (!keys.contact_ids.is_empty()).then(|| DealMatch::ContactIn(keys.contact_ids.clone())),
    |_, keys| (!keys.company_ids.is_empty()).then(|| DealMatch::CompanyIn(keys.company_ids.clone())),
    |_, keys| keys.company_name.clone().map(DealMatch::CompanyNameContains),
    |_, keys| keys.full_name.clone().map(DealMatch::TitleContains),
];

pub fn contact_predicates(lead: &Lead) -> Vec<ContactMatch> {
    CONTACT_MATCHERS.iter().filter_map(|m| m(lead)).collect()
}

pub fn company_predicates(keys: &CorrelationKeys) -> Vec<CompanyMatch> {
    keys.company_name
        .clone()
        .map(CompanyMatch::NameContains)
        .into_iter()
        .collect()
}

/// Structural deal predicates, without the owner fallback.
pub fn deal_predicates(lead: &Lead, keys: &CorrelationKeys) -> Vec<DealMatch> {
    DEAL_MATCHERS.iter().filter_map(|m| m(lead, keys)).collect()
}

/// Deal predicates once correlation is settled: the structural ones, or the
/// owner's deals when correlation fell back to them.
pub fn settled_deal_predicates(lead: &Lead, keys: &CorrelationKeys) -> Vec<DealMatch> {
    match (keys.owner_fallback, lead.owner_id) {
        (true, Some(owner)) => vec![DealMatch::OwnedBy(owner)],
        _ => deal_predicates(lead, keys),
    }
}

fn sorted_unique(ids: impl IntoIterator<Item = Uuid>) -> Vec<Uuid> {
    ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

// =============================================================================
// CORRELATOR
// =============================================================================

/// Derive the full correlation key set for a lead.
///
/// Contacts and companies are looked up concurrently; deals depend on both.
/// Stores that are not provisioned contribute nothing.
pub async fn correlate(
    store: &dyn TimelineStore,
    lead: &Lead,
    config: &TimelineConfig,
) -> Result<CorrelationKeys> {
    let tenant = lead.tenant_id;
    let mut keys = CorrelationKeys::from_lead(lead);

    let contact_query = StoreQuery::new(contact_predicates(lead), config.caps.contacts);
    let company_query = StoreQuery::new(company_predicates(&keys), config.caps.companies);

    let contacts_fut = async {
        if contact_query.is_empty() {
            return Ok(Vec::new());
        }
        or_empty("contacts", store.find_contacts(tenant, &contact_query).await)
    };
    let companies_fut = async {
        if company_query.is_empty() {
            return Ok(Vec::new());
        }
        or_empty("companies", store.find_companies(tenant, &company_query).await)
    };
    let (contacts, companies) = try_join!(contacts_fut, companies_fut)?;

    keys.contact_ids = sorted_unique(contacts.iter().map(|c| c.id));
    keys.company_ids = sorted_unique(
        companies
            .iter()
            .map(|c| c.id)
            .chain(contacts.iter().filter_map(|c| c.company_id)),
    );

    let structural = deal_predicates(lead, &keys);
    let mut deals = if structural.is_empty() {
        Vec::new()
    } else {
        let query = StoreQuery::new(structural, config.caps.deals);
        or_empty("deals", store.find_deals(tenant, &query).await)?
    };
    if deals.is_empty() {
        if let Some(owner) = lead.owner_id {
            let query = StoreQuery::new(vec![DealMatch::OwnedBy(owner)], config.caps.deals);
            deals = or_empty("deals", store.find_deals(tenant, &query).await)?;
            keys.owner_fallback = true;
        }
    }
    keys.deal_ids = sorted_unique(deals.iter().map(|d| d.id));

    debug!(
        subsystem = "timeline",
        component = "correlator",
        lead_id = %lead.id,
        contacts = keys.contact_ids.len(),
        companies = keys.company_ids.len(),
        deals = keys.deal_ids.len(),
        owner_fallback = keys.owner_fallback,
        "Correlation keys derived"
    );

    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::{MemoryStore, StoreKind};
    use crate::models::{Company, Contact, Deal};
    use chrono::Utc;

    fn lead(tenant: Uuid) -> Lead {
        let now = Utc::now();
        Lead {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            first_name: Some("Sara".into()),
            last_name: Some("Ahmadi".into()),
            phone: Some("09123456789".into()),
            email: None,
            company_name: Some("Parsian".into()),
            source: None,
            status: None,
            notes: None,
            follow_up_at: None,
            owner_id: Some(Uuid::new_v4()),
            created_at: now,
            updated_at: now,
        }
    }

    fn contact(tenant: Uuid, phone: &str, company_id: Option<Uuid>) -> Contact {
        Contact {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            first_name: None,
            last_name: None,
            phone: Some(phone.into()),
            email: None,
            company_id,
            company_name: None,
            owner_id: None,
            created_at: Utc::now(),
        }
    }

    fn deal(tenant: Uuid, title: &str) -> Deal {
        let now = Utc::now();
        Deal {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            title: title.into(),
            stage: "Discovery".into(),
            amount: None,
            currency: None,
            contact_id: None,
            company_id: None,
            company_name: None,
            owner_id: None,
            sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_absent_inputs_skip_matchers() {
        let mut l = lead(Uuid::new_v4());
        assert_eq!(contact_predicates(&l).len(), 3);

        l.phone = Some("  ".into());
        l.company_name = None;
        l.last_name = None;
        assert!(contact_predicates(&l).is_empty());
        assert!(company_predicates(&CorrelationKeys::from_lead(&l)).is_empty());
    }

    #[test]
    fn test_deal_predicates_follow_keys() {
        let l = lead(Uuid::new_v4());
        let mut keys = CorrelationKeys::from_lead(&l);
        assert_eq!(
            deal_predicates(&l, &keys),
            vec![
                DealMatch::CompanyNameContains("Parsian".into()),
                DealMatch::TitleContains("Sara Ahmadi".into()),
            ]
        );
        keys.owner_fallback = true;
        assert_eq!(
            settled_deal_predicates(&l, &keys),
            vec![DealMatch::OwnedBy(l.owner_id.unwrap())]
        );
    }

    #[tokio::test]
    async fn test_correlate_unions_companies_of_contacts() {
        let tenant = Uuid::new_v4();
        let l = lead(tenant);
        let direct = Company {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            name: "Parsian Holding".into(),
            created_at: Utc::now(),
        };
        let via_contact = Uuid::new_v4();
        let c = contact(tenant, "+98 912 345 6789", Some(via_contact));
        let mut d = deal(tenant, "Renewal");
        d.contact_id = Some(c.id);

        let store = MemoryStore::new()
            .with_company(direct.clone())
            .with_contact(c.clone())
            .with_deal(d.clone());
        let keys = correlate(&store, &l, &TimelineConfig::default())
            .await
            .unwrap();

        assert_eq!(keys.contact_ids, vec![c.id]);
        assert!(keys.company_ids.contains(&direct.id));
        assert!(keys.company_ids.contains(&via_contact));
        assert_eq!(keys.deal_ids, vec![d.id]);
        assert!(!keys.owner_fallback);
        assert_eq!(keys.phone_tail.as_deref(), Some("9123456789"));
    }

    #[tokio::test]
    async fn test_correlate_falls_back_to_owner_deals() {
        let tenant = Uuid::new_v4();
        let l = lead(tenant);
        let mut owned = deal(tenant, "Unrelated");
        owned.owner_id = l.owner_id;
        let store = MemoryStore::new().with_deal(owned.clone());

        let keys = correlate(&store, &l, &TimelineConfig::default())
            .await
            .unwrap();
        assert!(keys.owner_fallback);
        assert_eq!(keys.deal_ids, vec![owned.id]);
    }

    #[tokio::test]
    async fn test_correlate_degrades_when_stores_missing() {
        let tenant = Uuid::new_v4();
        let store = MemoryStore::new()
            .without(StoreKind::Contacts)
            .without(StoreKind::Companies)
            .without(StoreKind::Deals);
        let keys = correlate(&store, &lead(tenant), &TimelineConfig::default())
            .await
            .unwrap();
        assert!(keys.contact_ids.is_empty());
        assert!(keys.deal_ids.is_empty());
    }

    #[tokio::test]
    async fn test_correlate_propagates_genuine_failure() {
        let store = MemoryStore::new().failing(StoreKind::Contacts);
        let result = correlate(&store, &lead(Uuid::new_v4()), &TimelineConfig::default()).await;
        assert!(result.is_err());
    }
}
