// tests/api_http.rs
//
// HTTP-level tests for the Router without opening sockets, via
// tower::ServiceExt::oneshot.

use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Value as Json};
use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt as _; // for `oneshot`

use lab_autowatch::notify::inbox::InboxSink;
use lab_autowatch::store::{MemoryStore, ModuleStore};
use lab_autowatch::{
    create_router, AppState, Article, AutoWatchConfig, AutoWatchService, LiteratureSource,
};

const BODY_LIMIT: usize = 1024 * 1024;

struct Canned;

#[async_trait::async_trait]
impl LiteratureSource for Canned {
    async fn fetch(&self, query: &str, _limit: usize) -> Result<Vec<Article>> {
        Ok(vec![Article {
            title: format!("About {query}"),
            doi: "10.9/canned".into(),
            source: "PubMed".into(),
            url: "https://pubmed.test/1".into(),
            ..Default::default()
        }])
    }

    fn name(&self) -> &'static str {
        "PubMed"
    }
}

fn test_router() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let mut cfg = AutoWatchConfig::default();
    cfg.archive.write_delay_ms = 0;
    let sink = Arc::new(InboxSink::new(store.clone(), "Auto-Watch"));
    let sources: Vec<Arc<dyn LiteratureSource>> = vec![Arc::new(Canned)];
    let service = AutoWatchService::new(&cfg, store.clone(), sink).with_sources(sources.clone(), sources);
    let router = create_router(AppState::new(Arc::new(service), "lab-admin"));
    (router, store)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Json>) -> (StatusCode, Vec<u8>) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app
        .clone()
        .oneshot(req.body(body).expect("build request"))
        .await
        .expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

fn json_of(bytes: &[u8]) -> Json {
    serde_json::from_slice(bytes).expect("json body")
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _) = test_router();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).unwrap().trim(), "OK");
}

#[tokio::test]
async fn watch_crud() {
    let (app, _) = test_router();

    let (status, body) = send(
        &app,
        "POST",
        "/watches",
        Some(json!({"type": "author", "value": "M. Curie"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let created = json_of(&body);
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["type"], "author");
    assert_eq!(created["active"], true);

    // duplicate returns the existing record
    let (status, body) = send(
        &app,
        "POST",
        "/watches",
        Some(json!({"type": "author", "value": "M. Curie"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&body)["id"], id.as_str());

    let (status, _) = send(&app, "POST", "/watches", Some(json!({"type": "keyword", "value": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/watches/{id}"),
        Some(json!({"active": false})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = send(&app, "GET", "/watches", None).await;
    assert_eq!(json_of(&body)[0]["active"], false);

    let (status, _) = send(&app, "PATCH", "/watches/nope", Some(json!({"active": true}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", &format!("/watches/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = send(&app, "GET", "/watches", None).await;
    assert_eq!(json_of(&body).as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn forced_run_returns_report_and_fills_archive_and_inbox() {
    let (app, store) = test_router();
    send(
        &app,
        "POST",
        "/watches",
        Some(json!({"type": "keyword", "value": "radium"})),
    )
    .await;

    let (status, body) = send(&app, "POST", "/watch/run", Some(json!({"recipient": "curie"}))).await;
    assert_eq!(status, StatusCode::OK);
    let report = json_of(&body);
    assert_eq!(report["recipient"], "curie");
    assert_eq!(report["totalFound"], 1);
    assert_eq!(report["totalNew"], 1);
    assert_eq!(report["notification"], "new_articles");
    assert_eq!(report["results"][0]["watchItem"]["value"], "radium");
    assert_eq!(report["results"][0]["newArticles"][0]["title"], "About radium");

    let (_, body) = send(&app, "GET", "/archive", None).await;
    assert_eq!(json_of(&body).as_array().unwrap().len(), 1);

    let (_, body) = send(&app, "GET", "/messages?recipient=curie", None).await;
    let msgs = json_of(&body);
    assert_eq!(msgs.as_array().unwrap().len(), 1);
    assert_eq!(msgs[0]["folder"], "inbox");
    assert_eq!(msgs[0]["read"], false);

    let (_, body) = send(&app, "GET", "/messages?recipient=someone-else", None).await;
    assert!(json_of(&body).as_array().unwrap().is_empty());
    assert_eq!(store.fetch("messages").await.unwrap().len(), 1);
}

#[tokio::test]
async fn forced_run_without_body_uses_default_recipient() {
    let (app, _) = test_router();
    let (status, body) = send(&app, "POST", "/watch/run", None).await;
    assert_eq!(status, StatusCode::OK);
    let report = json_of(&body);
    assert_eq!(report["recipient"], "lab-admin");
    assert!(report["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn search_requires_query() {
    let (app, _) = test_router();
    let (status, _) = send(&app, "GET", "/search", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "GET", "/search?q=graphene&limit=3", None).await;
    assert_eq!(status, StatusCode::OK);
    let v = json_of(&body);
    assert_eq!(v[0]["title"], "About graphene");
    assert_eq!(v[0]["doi"], "10.9/canned");
}
