//! HTTP integration tests for the timeline route.
//!
//! Each test spawns the router on an ephemeral port over an in-memory store
//! and calls it with reqwest.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use uuid::Uuid;

use axum::http::HeaderValue;
use axum::Router;
use leadline_api::{cors_layer, router, AppState};
use leadline_core::{
    CallDirection, CallLog, Deal, Lead, MemoryStore, SmsLog, StoreKind, Task, TimelineConfig,
    TimelineEngine, UserRef,
};

fn app(store: MemoryStore) -> Router {
    let engine = TimelineEngine::new(Arc::new(store), TimelineConfig::default());
    router(AppState::new(engine))
}

async fn spawn_test_server(store: MemoryStore) -> String {
    serve(app(store)).await
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

struct World {
    tenant: Uuid,
    owner: Uuid,
    lead: Lead,
}

fn world() -> World {
    let tenant = Uuid::new_v4();
    let owner = Uuid::new_v4();
    let now = Utc::now();
    World {
        tenant,
        owner,
        lead: Lead {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            first_name: Some("Sara".into()),
            last_name: Some("Ahmadi".into()),
            phone: Some("09123456789".into()),
            email: None,
            company_name: None,
            source: Some("website".into()),
            status: Some("new".into()),
            notes: None,
            follow_up_at: None,
            owner_id: Some(owner),
            created_at: now - Duration::days(30),
            updated_at: now,
        },
    }
}

fn deal(w: &World, stage: &str, sent_at: DateTime<Utc>) -> Deal {
    Deal {
        id: Uuid::new_v4(),
        tenant_id: w.tenant,
        title: "Annual plan for Sara Ahmadi".into(),
        stage: stage.into(),
        amount: Some(1200.0),
        currency: Some("USD".into()),
        contact_id: None,
        company_id: None,
        company_name: None,
        owner_id: Some(w.owner),
        sent_at: Some(sent_at),
        created_at: sent_at - Duration::days(1),
        updated_at: sent_at,
    }
}

fn task(w: &World, due_at: DateTime<Utc>) -> Task {
    Task {
        id: Uuid::new_v4(),
        tenant_id: w.tenant,
        title: "Call back Sara Ahmadi".into(),
        description: None,
        status: "open".into(),
        due_at: Some(due_at),
        assignee_id: Some(w.owner),
        created_by_id: Some(w.owner),
        contact_id: None,
        company_id: None,
        deal_id: None,
        created_at: due_at - Duration::days(1),
    }
}

fn call(w: &World, agent: Uuid, started_at: DateTime<Utc>) -> CallLog {
    CallLog {
        id: Uuid::new_v4(),
        tenant_id: w.tenant,
        direction: CallDirection::Outbound,
        from_number: "02100000000".into(),
        to_number: "+98 912 345 6789".into(),
        agent_id: Some(agent),
        status: "answered".into(),
        duration_sec: 95,
        recording_url: None,
        started_at,
    }
}

fn sms(w: &World, sender: Uuid, sent_at: DateTime<Utc>) -> SmsLog {
    SmsLog {
        id: Uuid::new_v4(),
        tenant_id: w.tenant,
        recipient: "0912 345 6789".into(),
        body: "Your pre-invoice is attached".into(),
        status: "delivered".into(),
        created_by_id: Some(sender),
        queued_at: Some(sent_at - Duration::minutes(1)),
        sent_at: Some(sent_at),
        delivered_at: Some(sent_at + Duration::minutes(1)),
        failed_at: None,
        error: None,
        created_at: sent_at - Duration::minutes(1),
    }
}

async fn get_timeline(
    base_url: &str,
    lead_id: Uuid,
    query: &str,
    tenant: Uuid,
    user: Uuid,
    capabilities: &str,
) -> reqwest::Response {
    reqwest::Client::new()
        .get(format!("{}/lead/{}/timeline{}", base_url, lead_id, query))
        .header("x-tenant-id", tenant.to_string())
        .header("x-user-id", user.to_string())
        .header("x-capabilities", capabilities)
        .send()
        .await
        .unwrap()
}

fn items_of_type<'a>(body: &'a Value, item_type: &str) -> Vec<&'a Value> {
    body["items"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|i| i["type"] == item_type)
        .collect()
}

fn ids(body: &Value) -> Vec<String> {
    body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["id"].as_str().unwrap().to_string())
        .collect()
}

// -- Surface --

#[tokio::test]
async fn test_health() {
    let base_url = spawn_test_server(MemoryStore::new()).await;
    let resp = reqwest::get(format!("{}/health", base_url)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_preflight_allows_actor_headers() {
    let origin = "http://localhost:3000";
    let app = app(MemoryStore::new()).layer(cors_layer(vec![HeaderValue::from_static(origin)]));
    let base_url = serve(app).await;

    let resp = reqwest::Client::new()
        .request(
            reqwest::Method::OPTIONS,
            format!("{}/lead/{}/timeline", base_url, Uuid::new_v4()),
        )
        .header("origin", origin)
        .header("access-control-request-method", "GET")
        .header(
            "access-control-request-headers",
            "x-tenant-id,x-user-id,x-capabilities",
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["access-control-allow-origin"], origin);

    let allowed = resp.headers()["access-control-allow-headers"]
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    for header in ["x-tenant-id", "x-user-id", "x-capabilities"] {
        assert!(allowed.contains(header), "{} not allowed: {}", header, allowed);
    }
}

#[tokio::test]
async fn test_missing_actor_is_unauthorized() {
    let w = world();
    let base_url = spawn_test_server(MemoryStore::new().with_lead(w.lead.clone())).await;

    let resp = reqwest::get(format!("{}/lead/{}/timeline", base_url, w.lead.id))
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_hidden_and_missing_leads_are_indistinguishable() {
    let w = world();
    let base_url = spawn_test_server(MemoryStore::new().with_lead(w.lead.clone())).await;
    let stranger = Uuid::new_v4();

    let hidden = get_timeline(&base_url, w.lead.id, "", w.tenant, stranger, "").await;
    let missing = get_timeline(&base_url, Uuid::new_v4(), "", w.tenant, w.owner, "").await;
    let other_tenant =
        get_timeline(&base_url, w.lead.id, "", Uuid::new_v4(), w.owner, "*").await;

    assert_eq!(hidden.status(), 404);
    assert_eq!(missing.status(), 404);
    assert_eq!(other_tenant.status(), 404);

    let hidden: Value = hidden.json().await.unwrap();
    let missing: Value = missing.json().await.unwrap();
    let other_tenant: Value = other_tenant.json().await.unwrap();
    assert_eq!(hidden, missing);
    assert_eq!(hidden, other_tenant);
}

#[tokio::test]
async fn test_malformed_lead_id_is_not_found() {
    let base_url = spawn_test_server(MemoryStore::new()).await;
    let resp = reqwest::Client::new()
        .get(format!("{}/lead/not-a-uuid/timeline", base_url))
        .header("x-tenant-id", Uuid::new_v4().to_string())
        .header("x-user-id", Uuid::new_v4().to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_manager_reads_any_lead() {
    let w = world();
    let base_url = spawn_test_server(MemoryStore::new().with_lead(w.lead.clone())).await;

    let resp = get_timeline(
        &base_url,
        w.lead.id,
        "",
        w.tenant,
        Uuid::new_v4(),
        "leads.manage",
    )
    .await;
    assert_eq!(resp.status(), 200);
}

// -- Response shape and quotes --

#[tokio::test]
async fn test_signed_quote_scenario() {
    let w = world();
    let sent_at = Utc::now() - Duration::days(5);
    let store = MemoryStore::new()
        .with_lead(w.lead.clone())
        .with_deal(deal(&w, "بسته شده", sent_at))
        .with_user(UserRef {
            id: w.owner,
            first_name: Some("Reza".into()),
            last_name: Some("Karimi".into()),
            ..Default::default()
        });
    let base_url = spawn_test_server(store).await;

    let resp = get_timeline(&base_url, w.lead.id, "", w.tenant, w.owner, "").await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();

    assert_eq!(body["lead"]["fullName"], "Sara Ahmadi");
    assert_eq!(body["lead"]["ownerName"], "Reza Karimi");
    assert_eq!(body["summary"]["waitingQuotes"], 0);
    assert!(body["nextCursor"].is_null());

    let quotes = items_of_type(&body, "quote");
    assert_eq!(quotes.len(), 2);
    assert!(quotes.iter().any(|q| q["status"] == "signed"));

    let sent = quotes
        .iter()
        .find(|q| q["id"].as_str().unwrap().ends_with(":sent"))
        .unwrap();
    let ts: DateTime<Utc> = serde_json::from_value(sent["ts"].clone()).unwrap();
    assert_eq!(ts, sent_at);
}

#[tokio::test]
async fn test_waiting_quote_scenario() {
    let w = world();
    let store = MemoryStore::new()
        .with_lead(w.lead.clone())
        .with_deal(deal(
            &w,
            "ارسال پیش\u{200c}فاکتور",
            Utc::now() - Duration::days(3),
        ));
    let base_url = spawn_test_server(store).await;

    let body: Value = get_timeline(&base_url, w.lead.id, "", w.tenant, w.owner, "")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["summary"]["waitingQuotes"], 1);
    assert_eq!(body["summary"]["lastTouchType"], "quote");
}

// -- Pagination --

#[tokio::test]
async fn test_cursor_walk_covers_every_item_once() {
    let w = world();
    let now = Utc::now();
    let mut store = MemoryStore::new().with_lead(w.lead.clone());
    for day in 1..=5 {
        store = store.with_task(task(&w, now - Duration::days(day)));
    }
    let base_url = spawn_test_server(store).await;

    let first: Value = get_timeline(&base_url, w.lead.id, "?type=task&limit=1", w.tenant, w.owner, "")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(first["items"].as_array().unwrap().len(), 1);
    assert_eq!(first["summary"]["totalItems"], 5);
    let cursor = first["nextCursor"].as_str().unwrap().to_string();

    let query = format!("?type=task&limit=10&cursor={}", cursor);
    let rest: Value = get_timeline(&base_url, w.lead.id, &query, w.tenant, w.owner, "")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(rest["items"].as_array().unwrap().len(), 4);
    assert!(rest["nextCursor"].is_null());

    let mut all = ids(&first);
    all.extend(ids(&rest));
    let unique: HashSet<_> = all.iter().collect();
    assert_eq!(unique.len(), 5);

    let timestamps: Vec<DateTime<Utc>> = first["items"]
        .as_array()
        .unwrap()
        .iter()
        .chain(rest["items"].as_array().unwrap())
        .map(|i| serde_json::from_value(i["ts"].clone()).unwrap())
        .collect();
    assert!(timestamps.windows(2).all(|pair| pair[0] > pair[1]));
}

#[tokio::test]
async fn test_invalid_cursor_returns_first_page() {
    let w = world();
    let now = Utc::now();
    let store = MemoryStore::new()
        .with_lead(w.lead.clone())
        .with_task(task(&w, now - Duration::days(1)))
        .with_task(task(&w, now - Duration::days(2)));
    let base_url = spawn_test_server(store).await;

    let plain: Value = get_timeline(&base_url, w.lead.id, "", w.tenant, w.owner, "")
        .await
        .json()
        .await
        .unwrap();
    let garbage: Value = get_timeline(
        &base_url,
        w.lead.id,
        "?cursor=not-a-cursor!",
        w.tenant,
        w.owner,
        "",
    )
    .await
    .json()
    .await
    .unwrap();
    assert_eq!(ids(&plain), ids(&garbage));
}

#[tokio::test]
async fn test_garbage_params_fall_back_to_defaults() {
    let w = world();
    let base_url = spawn_test_server(MemoryStore::new().with_lead(w.lead.clone())).await;

    let resp = get_timeline(
        &base_url,
        w.lead.id,
        "?limit=lots&type=bogus&from=yesterday",
        w.tenant,
        w.owner,
        "",
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    // Lead creation and owner assignment survive an unknown type filter.
    assert_eq!(body["summary"]["totalItems"], 2);
}

#[tokio::test]
async fn test_repeated_query_keys_are_folded() {
    let w = world();
    let now = Utc::now();
    let store = MemoryStore::new()
        .with_lead(w.lead.clone())
        .with_task(task(&w, now - Duration::days(1)))
        .with_call(call(&w, w.owner, now - Duration::hours(5)));
    let base_url = spawn_test_server(store).await;

    let resp = get_timeline(
        &base_url,
        w.lead.id,
        "?type=task&type=call",
        w.tenant,
        w.owner,
        "",
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["summary"]["totalItems"], 2);
    assert_eq!(items_of_type(&body, "task").len(), 1);
    assert_eq!(items_of_type(&body, "call").len(), 1);

    let resp = get_timeline(
        &base_url,
        w.lead.id,
        "?limit=1&limit=2",
        w.tenant,
        w.owner,
        "",
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert!(body["nextCursor"].is_string());
}

// -- Time window --

#[tokio::test]
async fn test_date_only_to_is_inclusive_of_whole_day() {
    let w = world();
    let last_moment = Utc.with_ymd_and_hms(2026, 3, 10, 23, 59, 59).unwrap();
    let next_day = Utc.with_ymd_and_hms(2026, 3, 11, 0, 0, 0).unwrap() + Duration::milliseconds(1);
    let inside = task(&w, last_moment);
    let outside = task(&w, next_day);
    let store = MemoryStore::new()
        .with_lead(w.lead.clone())
        .with_task(inside.clone())
        .with_task(outside);
    let base_url = spawn_test_server(store).await;

    let body: Value = get_timeline(
        &base_url,
        w.lead.id,
        "?type=task&to=2026-03-10",
        w.tenant,
        w.owner,
        "",
    )
    .await
    .json()
    .await
    .unwrap();
    assert_eq!(ids(&body), vec![format!("task:{}", inside.id)]);
}

// -- Permissions and degradation --

#[tokio::test]
async fn test_calls_scoped_without_team_capability() {
    let w = world();
    let now = Utc::now();
    let mine = call(&w, w.owner, now - Duration::hours(1));
    let theirs = call(&w, Uuid::new_v4(), now - Duration::hours(2));
    let store = MemoryStore::new()
        .with_lead(w.lead.clone())
        .with_call(mine.clone())
        .with_call(theirs);
    let base_url = spawn_test_server(store).await;

    let own: Value = get_timeline(&base_url, w.lead.id, "?type=call", w.tenant, w.owner, "")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(ids(&own), vec![format!("call:{}", mine.id)]);

    let team: Value = get_timeline(
        &base_url,
        w.lead.id,
        "?type=call",
        w.tenant,
        w.owner,
        "calls.read_team",
    )
    .await
    .json()
    .await
    .unwrap();
    assert_eq!(team["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_colleague_records_need_team_capabilities() {
    let w = world();
    let colleague = Uuid::new_v4();
    let now = Utc::now();

    let mut their_task = task(&w, now + Duration::days(1));
    their_task.assignee_id = Some(colleague);
    their_task.created_by_id = Some(colleague);
    let mut their_deal = deal(&w, "Quote sent", now - Duration::days(4));
    their_deal.owner_id = Some(colleague);
    let store = MemoryStore::new()
        .with_lead(w.lead.clone())
        .with_task(their_task)
        .with_deal(their_deal)
        .with_sms(sms(&w, colleague, now - Duration::hours(3)));
    let base_url = spawn_test_server(store).await;

    let own: Value = get_timeline(&base_url, w.lead.id, "", w.tenant, w.owner, "")
        .await
        .json()
        .await
        .unwrap();
    for item_type in ["task", "quote", "sms"] {
        assert!(
            items_of_type(&own, item_type).is_empty(),
            "colleague's {} visible without team access",
            item_type
        );
    }
    assert_eq!(own["summary"]["waitingQuotes"], 0);

    let team: Value = get_timeline(
        &base_url,
        w.lead.id,
        "",
        w.tenant,
        w.owner,
        "tasks.read_team deals.read_team sms.read_team",
    )
    .await
    .json()
    .await
    .unwrap();
    assert_eq!(items_of_type(&team, "task").len(), 1);
    assert!(!items_of_type(&team, "quote").is_empty());
    assert_eq!(items_of_type(&team, "sms").len(), 1);
    assert_eq!(team["summary"]["waitingQuotes"], 1);

    let everything: Value = get_timeline(&base_url, w.lead.id, "", w.tenant, w.owner, "*")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(ids(&everything), ids(&team));
}

#[tokio::test]
async fn test_unprovisioned_store_degrades_to_empty() {
    let w = world();
    let store = MemoryStore::new()
        .with_lead(w.lead.clone())
        .with_call(call(&w, w.owner, Utc::now()))
        .without(StoreKind::Calls)
        .without(StoreKind::Sms);
    let base_url = spawn_test_server(store).await;

    let resp = get_timeline(&base_url, w.lead.id, "", w.tenant, w.owner, "").await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(items_of_type(&body, "call").is_empty());
}

#[tokio::test]
async fn test_failing_store_fails_request() {
    let w = world();
    let store = MemoryStore::new()
        .with_lead(w.lead.clone())
        .failing(StoreKind::Tasks);
    let base_url = spawn_test_server(store).await;

    let resp = get_timeline(&base_url, w.lead.id, "", w.tenant, w.owner, "").await;
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
}
