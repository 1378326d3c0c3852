//! SQL rendering of OR'd store predicates.
//!
//! Each predicate enum renders itself into a parameterized SQL fragment. The
//! fragments of one [`StoreQuery`] are joined with OR, then combined with the
//! tenant filter and the optional ownership scope:
//!
//! ```text
//! t.tenant_id = $1 AND (<p1> OR <p2> ...) [AND (<scope>)]
//! ```
//!
//! Semantics match the in-memory `matches` implementations in leadline-core.

use uuid::Uuid;

use leadline_core::defaults::PHONE_TAIL_DIGITS;
use leadline_core::phone::phone_tail;
use leadline_core::{
    ActivityMatch, CallMatch, CompanyMatch, ContactMatch, DealMatch, SmsMatch, StoreQuery,
    TaskMatch,
};

use crate::escape_like;

/// Query parameter types for dynamic SQL binding.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    /// Single UUID parameter.
    Uuid(Uuid),
    /// Array of UUIDs (for ANY operations).
    UuidArray(Vec<Uuid>),
    /// String parameter.
    String(String),
    /// Row limit.
    Int(i64),
}

/// Rendered WHERE clause and its parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterResult {
    pub where_clause: String,
    pub params: Vec<QueryParam>,
}

/// Collects parameters and hands out `$n` placeholders.
#[derive(Debug, Default)]
pub struct ParamSink {
    params: Vec<QueryParam>,
}

impl ParamSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parameter and return its placeholder.
    pub fn push(&mut self, param: QueryParam) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }

    /// Register a LIKE needle, escaped, for `ILIKE '%' || $n || '%'`.
    fn contains(&mut self, column: &str, needle: &str) -> String {
        let p = self.push(QueryParam::String(escape_like(needle.trim())));
        format!("{} ILIKE '%' || {} || '%' ESCAPE '\\'", column, p)
    }

    fn any_uuid(&mut self, column: &str, ids: &[Uuid]) -> String {
        let p = self.push(QueryParam::UuidArray(ids.to_vec()));
        format!("{} = ANY({})", column, p)
    }

    pub fn into_params(self) -> Vec<QueryParam> {
        self.params
    }
}

/// SQL expression folding Persian and Arabic-Indic digits to ASCII and
/// stripping everything that is not a digit.
pub fn digits_sql(column: &str) -> String {
    format!(
        "regexp_replace(translate(COALESCE({}, ''), '۰۱۲۳۴۵۶۷۸۹٠١٢٣٤٥٦٧٨٩', '01234567890123456789'), '\\D', '', 'g')",
        column
    )
}

/// A predicate that can render itself against a table alias `t`.
pub trait SqlPredicate {
    fn to_sql(&self, sink: &mut ParamSink) -> String;
}

impl SqlPredicate for ContactMatch {
    fn to_sql(&self, sink: &mut ParamSink) -> String {
        match self {
            ContactMatch::Phone(phone) => match phone_tail(phone) {
                Some(tail) => {
                    let p = sink.push(QueryParam::String(tail));
                    format!("RIGHT({}, {}) = {}", digits_sql("t.phone"), PHONE_TAIL_DIGITS, p)
                }
                None => "FALSE".to_string(),
            },
            ContactMatch::Email(email) => {
                let p = sink.push(QueryParam::String(email.trim().to_lowercase()));
                format!("LOWER(TRIM(t.email)) = {}", p)
            }
            ContactMatch::CompanyNameContains(name) => sink.contains("t.company_name", name),
            ContactMatch::NameContains { first, last } => format!(
                "({} AND {})",
                sink.contains("t.first_name", first),
                sink.contains("t.last_name", last)
            ),
        }
    }
}

impl SqlPredicate for CompanyMatch {
    fn to_sql(&self, sink: &mut ParamSink) -> String {
        match self {
            CompanyMatch::NameContains(name) => sink.contains("t.name", name),
        }
    }
}

impl SqlPredicate for DealMatch {
    fn to_sql(&self, sink: &mut ParamSink) -> String {
        match self {
            DealMatch::ContactIn(ids) => sink.any_uuid("t.contact_id", ids),
            DealMatch::CompanyIn(ids) => sink.any_uuid("t.company_id", ids),
            DealMatch::CompanyNameContains(name) => sink.contains("t.company_name", name),
            DealMatch::TitleContains(text) => sink.contains("t.title", text),
            DealMatch::OwnedBy(owner) => {
                format!("t.owner_id = {}", sink.push(QueryParam::Uuid(*owner)))
            }
        }
    }
}

impl SqlPredicate for TaskMatch {
    fn to_sql(&self, sink: &mut ParamSink) -> String {
        match self {
            TaskMatch::ContactIn(ids) => sink.any_uuid("t.contact_id", ids),
            TaskMatch::CompanyIn(ids) => sink.any_uuid("t.company_id", ids),
            TaskMatch::DealIn(ids) => sink.any_uuid("t.deal_id", ids),
            TaskMatch::TextContains(text) => {
                let p = sink.push(QueryParam::String(escape_like(text.trim())));
                format!(
                    "(t.title ILIKE '%' || {p} || '%' ESCAPE '\\' OR t.description ILIKE '%' || {p} || '%' ESCAPE '\\')"
                )
            }
            TaskMatch::AssignedTo(user) => {
                format!("t.assignee_id = {}", sink.push(QueryParam::Uuid(*user)))
            }
        }
    }
}

impl SqlPredicate for ActivityMatch {
    fn to_sql(&self, sink: &mut ParamSink) -> String {
        match self {
            ActivityMatch::ContactIn(ids) => sink.any_uuid("t.contact_id", ids),
            ActivityMatch::DealIn(ids) => sink.any_uuid("t.deal_id", ids),
            ActivityMatch::BodyContains(text) => sink.contains("t.body", text),
        }
    }
}

impl SqlPredicate for CallMatch {
    fn to_sql(&self, sink: &mut ParamSink) -> String {
        match self {
            CallMatch::PhoneTail(tail) => {
                let p = sink.push(QueryParam::String(escape_like(tail)));
                format!(
                    "({} LIKE '%' || {p} || '%' OR {} LIKE '%' || {p} || '%')",
                    digits_sql("t.from_number"),
                    digits_sql("t.to_number")
                )
            }
        }
    }
}

impl SqlPredicate for SmsMatch {
    fn to_sql(&self, sink: &mut ParamSink) -> String {
        match self {
            SmsMatch::RecipientTail(tail) => {
                let p = sink.push(QueryParam::String(escape_like(tail)));
                format!("{} LIKE '%' || {} || '%'", digits_sql("t.recipient"), p)
            }
        }
    }
}

/// Ownership scope: which columns must equal the scoped user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeColumns {
    /// The store has no ownership; scope is ignored.
    None,
    One(&'static str),
    Either(&'static str, &'static str),
}

/// Build the WHERE clause for a tenant-scoped OR'd predicate query.
///
/// An empty predicate list renders `FALSE` so it can never match everything.
pub fn build_filter<M: SqlPredicate>(
    tenant_id: Uuid,
    query: &StoreQuery<M>,
    scope: ScopeColumns,
) -> FilterResult {
    let mut sink = ParamSink::new();
    let tenant = sink.push(QueryParam::Uuid(tenant_id));

    let any_of = if query.any_of.is_empty() {
        "FALSE".to_string()
    } else {
        query
            .any_of
            .iter()
            .map(|m| m.to_sql(&mut sink))
            .collect::<Vec<_>>()
            .join(" OR ")
    };

    let mut where_clause = format!("t.tenant_id = {} AND ({})", tenant, any_of);

    if let Some(user) = query.scope {
        match scope {
            ScopeColumns::None => {}
            ScopeColumns::One(column) => {
                let p = sink.push(QueryParam::Uuid(user));
                where_clause.push_str(&format!(" AND t.{} = {}", column, p));
            }
            ScopeColumns::Either(a, b) => {
                let p = sink.push(QueryParam::Uuid(user));
                where_clause.push_str(&format!(" AND (t.{a} = {p} OR t.{b} = {p})"));
            }
        }
    }

    FilterResult {
        where_clause,
        params: sink.into_params(),
    }
}
