//! PostgreSQL implementation of the timeline store.

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use leadline_core::{
    ActivityMatch, Activity, CallDirection, CallLog, CallMatch, Company, CompanyMatch, Contact,
    ContactMatch, Deal, DealMatch, Error, Lead, Result, SmsLog, SmsMatch, StoreQuery, Task,
    TaskMatch, TimelineStore, UserRef,
};

use crate::predicates::{build_filter, QueryParam, ScopeColumns, SqlPredicate};

/// SQLSTATE for a missing table.
const UNDEFINED_TABLE: &str = "42P01";
/// SQLSTATE for a missing column.
const UNDEFINED_COLUMN: &str = "42703";

/// Map a query error, turning schema-absence into `NotProvisioned`.
fn map_store_error(store: &str, e: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db) = &e {
        if matches!(db.code().as_deref(), Some(UNDEFINED_TABLE | UNDEFINED_COLUMN)) {
            return Error::NotProvisioned(format!("{}: {}", store, db.message()));
        }
    }
    Error::Database(e)
}

fn bind_params<'q>(
    mut q: Query<'q, Postgres, PgArguments>,
    params: &'q [QueryParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        q = match param {
            QueryParam::Uuid(id) => q.bind(id),
            QueryParam::UuidArray(ids) => q.bind(ids),
            QueryParam::String(s) => q.bind(s),
            QueryParam::Int(n) => q.bind(n),
        };
    }
    q
}

/// PostgreSQL-backed [`TimelineStore`] over the CRM tables.
#[derive(Clone)]
pub struct PgTimelineStore {
    pool: Pool<Postgres>,
}

impl PgTimelineStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Run a filtered, capped select against one table aliased `t`.
    async fn select<M: SqlPredicate>(
        &self,
        spec: &TableSpec,
        tenant_id: Uuid,
        query: &StoreQuery<M>,
    ) -> Result<Vec<PgRow>> {
        let mut filter = build_filter(tenant_id, query, spec.scope);
        filter.params.push(QueryParam::Int(query.limit as i64));
        let sql = format!(
            "SELECT {} FROM {} t WHERE {} ORDER BY {} DESC, t.id DESC LIMIT ${}",
            spec.columns,
            spec.table,
            filter.where_clause,
            spec.order_by,
            filter.params.len()
        );

        let rows = bind_params(sqlx::query(&sql), &filter.params)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_store_error(spec.store, e))?;

        debug!(
            subsystem = "database",
            component = "timeline_store",
            op = "select",
            db_table = spec.table,
            predicates = query.any_of.len(),
            scoped = query.scope.is_some(),
            result_count = rows.len(),
            "Store query complete"
        );
        Ok(rows)
    }
}

/// Where one correlated store lives and how it is ordered and scoped.
struct TableSpec {
    store: &'static str,
    table: &'static str,
    columns: &'static str,
    order_by: &'static str,
    scope: ScopeColumns,
}

// =============================================================================
// ROW MAPPING
// =============================================================================

const LEAD_COLUMNS: &str = "t.id, t.tenant_id, t.first_name, t.last_name, t.phone, t.email, \
     t.company_name, t.source, t.status, t.notes, t.follow_up_at, t.owner_id, t.created_at, t.updated_at";

fn lead_from_row(row: &PgRow) -> Lead {
    Lead {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        phone: row.get("phone"),
        email: row.get("email"),
        company_name: row.get("company_name"),
        source: row.get("source"),
        status: row.get("status"),
        notes: row.get("notes"),
        follow_up_at: row.get("follow_up_at"),
        owner_id: row.get("owner_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const CONTACT_COLUMNS: &str = "t.id, t.tenant_id, t.first_name, t.last_name, t.phone, t.email, \
     t.company_id, t.company_name, t.owner_id, t.created_at";

const CONTACTS: TableSpec = TableSpec {
    store: "contacts",
    table: "contact",
    columns: CONTACT_COLUMNS,
    order_by: "t.created_at",
    scope: ScopeColumns::None,
};

fn contact_from_row(row: &PgRow) -> Contact {
    Contact {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        phone: row.get("phone"),
        email: row.get("email"),
        company_id: row.get("company_id"),
        company_name: row.get("company_name"),
        owner_id: row.get("owner_id"),
        created_at: row.get("created_at"),
    }
}

const COMPANY_COLUMNS: &str = "t.id, t.tenant_id, t.name, t.created_at";

const COMPANIES: TableSpec = TableSpec {
    store: "companies",
    table: "company",
    columns: COMPANY_COLUMNS,
    order_by: "t.created_at",
    scope: ScopeColumns::None,
};

fn company_from_row(row: &PgRow) -> Company {
    Company {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        name: row.get("name"),
        created_at: row.get("created_at"),
    }
}

const DEAL_COLUMNS: &str = "t.id, t.tenant_id, t.title, t.stage, t.amount::float8 AS amount, \
     t.currency, t.contact_id, t.company_id, t.company_name, t.owner_id, t.sent_at, \
     t.created_at, t.updated_at";

const DEALS: TableSpec = TableSpec {
    store: "deals",
    table: "deal",
    columns: DEAL_COLUMNS,
    order_by: "t.updated_at",
    scope: ScopeColumns::One("owner_id"),
};

fn deal_from_row(row: &PgRow) -> Deal {
    Deal {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        title: row.get("title"),
        stage: row.get("stage"),
        amount: row.get("amount"),
        currency: row.get("currency"),
        contact_id: row.get("contact_id"),
        company_id: row.get("company_id"),
        company_name: row.get("company_name"),
        owner_id: row.get("owner_id"),
        sent_at: row.get("sent_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const TASK_COLUMNS: &str = "t.id, t.tenant_id, t.title, t.description, t.status, t.due_at, \
     t.assignee_id, t.created_by_id, t.contact_id, t.company_id, t.deal_id, t.created_at";

const TASKS: TableSpec = TableSpec {
    store: "tasks",
    table: "task",
    columns: TASK_COLUMNS,
    order_by: "t.created_at",
    scope: ScopeColumns::Either("assignee_id", "created_by_id"),
};

fn task_from_row(row: &PgRow) -> Task {
    Task {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        title: row.get("title"),
        description: row.get("description"),
        status: row.get("status"),
        due_at: row.get("due_at"),
        assignee_id: row.get("assignee_id"),
        created_by_id: row.get("created_by_id"),
        contact_id: row.get("contact_id"),
        company_id: row.get("company_id"),
        deal_id: row.get("deal_id"),
        created_at: row.get("created_at"),
    }
}

const ACTIVITY_COLUMNS: &str = "t.id, t.tenant_id, t.activity_type, t.body, t.contact_id, \
     t.deal_id, t.created_by_id, t.happened_at, t.created_at";

const ACTIVITIES: TableSpec = TableSpec {
    store: "activities",
    table: "activity",
    columns: ACTIVITY_COLUMNS,
    order_by: "COALESCE(t.happened_at, t.created_at)",
    scope: ScopeColumns::None,
};

fn activity_from_row(row: &PgRow) -> Activity {
    Activity {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        activity_type: row.get("activity_type"),
        body: row.get("body"),
        contact_id: row.get("contact_id"),
        deal_id: row.get("deal_id"),
        created_by_id: row.get("created_by_id"),
        happened_at: row.get("happened_at"),
        created_at: row.get("created_at"),
    }
}

const CALL_COLUMNS: &str = "t.id, t.tenant_id, t.direction, t.from_number, t.to_number, \
     t.agent_id, t.status, t.duration_sec, t.recording_url, t.started_at";

const CALL_LOGS: TableSpec = TableSpec {
    store: "calls",
    table: "call_log",
    columns: CALL_COLUMNS,
    order_by: "t.started_at",
    scope: ScopeColumns::One("agent_id"),
};

fn call_from_row(row: &PgRow) -> CallLog {
    let direction: String = row.get("direction");
    CallLog {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        direction: CallDirection::parse(&direction),
        from_number: row.get("from_number"),
        to_number: row.get("to_number"),
        agent_id: row.get("agent_id"),
        status: row.get("status"),
        duration_sec: row.get("duration_sec"),
        recording_url: row.get("recording_url"),
        started_at: row.get("started_at"),
    }
}

const SMS_COLUMNS: &str = "t.id, t.tenant_id, t.recipient, t.body, t.status, t.created_by_id, \
     t.queued_at, t.sent_at, t.delivered_at, t.failed_at, t.error, t.created_at";

const SMS_LOGS: TableSpec = TableSpec {
    store: "sms",
    table: "sms_log",
    columns: SMS_COLUMNS,
    order_by: "t.created_at",
    scope: ScopeColumns::One("created_by_id"),
};

fn sms_from_row(row: &PgRow) -> SmsLog {
    SmsLog {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        recipient: row.get("recipient"),
        body: row.get("body"),
        status: row.get("status"),
        created_by_id: row.get("created_by_id"),
        queued_at: row.get("queued_at"),
        sent_at: row.get("sent_at"),
        delivered_at: row.get("delivered_at"),
        failed_at: row.get("failed_at"),
        error: row.get("error"),
        created_at: row.get("created_at"),
    }
}

fn user_from_row(row: &PgRow) -> UserRef {
    UserRef {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        display_name: row.get("display_name"),
        email: row.get("email"),
        phone: row.get("phone"),
    }
}

// =============================================================================
// TRAIT IMPLEMENTATION
// =============================================================================

#[async_trait]
impl TimelineStore for PgTimelineStore {
    async fn fetch_lead(&self, tenant_id: Uuid, lead_id: Uuid) -> Result<Option<Lead>> {
        let sql = format!(
            "SELECT {} FROM lead t WHERE t.id = $1 AND t.tenant_id = $2",
            LEAD_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(lead_id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_store_error("leads", e))?;
        Ok(row.as_ref().map(lead_from_row))
    }

    async fn find_contacts(
        &self,
        tenant_id: Uuid,
        query: &StoreQuery<ContactMatch>,
    ) -> Result<Vec<Contact>> {
        let rows = self.select(&CONTACTS, tenant_id, query).await?;
        Ok(rows.iter().map(contact_from_row).collect())
    }

    async fn find_companies(
        &self,
        tenant_id: Uuid,
        query: &StoreQuery<CompanyMatch>,
    ) -> Result<Vec<Company>> {
        let rows = self.select(&COMPANIES, tenant_id, query).await?;
        Ok(rows.iter().map(company_from_row).collect())
    }

    async fn find_deals(&self, tenant_id: Uuid, query: &StoreQuery<DealMatch>) -> Result<Vec<Deal>> {
        let rows = self.select(&DEALS, tenant_id, query).await?;
        Ok(rows.iter().map(deal_from_row).collect())
    }

    async fn find_tasks(&self, tenant_id: Uuid, query: &StoreQuery<TaskMatch>) -> Result<Vec<Task>> {
        let rows = self.select(&TASKS, tenant_id, query).await?;
        Ok(rows.iter().map(task_from_row).collect())
    }

    async fn find_activities(
        &self,
        tenant_id: Uuid,
        query: &StoreQuery<ActivityMatch>,
    ) -> Result<Vec<Activity>> {
        let rows = self.select(&ACTIVITIES, tenant_id, query).await?;
        Ok(rows.iter().map(activity_from_row).collect())
    }

    async fn find_calls(&self, tenant_id: Uuid, query: &StoreQuery<CallMatch>) -> Result<Vec<CallLog>> {
        let rows = self.select(&CALL_LOGS, tenant_id, query).await?;
        Ok(rows.iter().map(call_from_row).collect())
    }

    async fn find_sms(&self, tenant_id: Uuid, query: &StoreQuery<SmsMatch>) -> Result<Vec<SmsLog>> {
        let rows = self.select(&SMS_LOGS, tenant_id, query).await?;
        Ok(rows.iter().map(sms_from_row).collect())
    }

    async fn resolve_users(&self, tenant_id: Uuid, ids: &[Uuid]) -> Result<Vec<UserRef>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT id, first_name, last_name, display_name, email, phone \
             FROM app_user WHERE tenant_id = $1 AND id = ANY($2)",
        )
        .bind(tenant_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_store_error("users", e))?;
        Ok(rows.iter().map(user_from_row).collect())
    }
}
