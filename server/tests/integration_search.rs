use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use reelsearch_core::persist::{save_text, IndexPaths};
use reelsearch_core::tokenizer::preprocess;
use reelsearch_core::{Corpus, Engine, IndexConfig, InvertedIndex};
use serde_json::Value;
use tempfile::tempdir;
use tower::ServiceExt;

const MOVIES: &str = r#"[
    {"id": "tt001", "title": "Break Out", "stars": ["Ann Lee"], "genres": ["Drama"],
     "summaries": ["A banker is sent to prison and plans a prison escape."]},
    {"id": "tt002", "title": "The Guard", "stars": ["Bo Park"], "genres": ["Drama"],
     "summaries": ["A prison guard befriends an inmate."]},
    {"id": "tt003", "title": "Family", "stars": "No stars", "genres": ["Crime"],
     "summaries": ["A mob family saga."]}
]"#;

fn build_tiny_index(dir: &std::path::Path) {
    let corpus = Corpus::from_json_str(MOVIES).unwrap();
    let config = IndexConfig::default();
    let docs = corpus.to_documents(&config.fields, preprocess);
    let paths = IndexPaths::new(dir);
    for movie in corpus.movies() {
        for field in &config.fields {
            save_text(&paths, field, &movie.id, &movie.text(field)).unwrap();
        }
    }
    let engine = Engine::new(InvertedIndex::build(config, docs).unwrap()).unwrap();
    engine.store(dir).unwrap();
}

fn app(dir: &std::path::Path) -> Router {
    server::build_app_with_token(dir.to_string_lossy().to_string(), IndexConfig::default(), Some("secret".into())).unwrap()
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Bytes) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Bytes) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

fn admin(method: &str, uri: &str, token: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("X-ADMIN-TOKEN", token)
        .header("content-type", "application/json")
        .body(body)
        .unwrap()
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = app(dir.path());

    let (status, body) = get(app.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"ok");

    let (status, body) = get(app, "/search?q=prison&k=5").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_hits"], 2);
    assert_eq!(json["method"], "bm25");
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["doc_id"], "tt001");
    assert_eq!(arr[1]["doc_id"], "tt002");
    assert_eq!(arr[0]["title"], "Break Out");
    assert!(arr[0]["snippet"].as_str().unwrap().contains("***prison***"));
}

#[tokio::test]
async fn snippets_come_from_the_searched_field() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, body) = get(app(dir.path()), "/search?q=crime&field=genres").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["results"][0]["doc_id"], "tt003");
    assert_eq!(json["results"][0]["snippet"], "***Crime***");
}

#[tokio::test]
async fn vector_space_codes_and_k_are_honoured() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, body) = get(app(dir.path()), "/search?q=prison&k=1&method=lnc.ltc").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_hits"], 2);
    assert_eq!(json["results"].as_array().unwrap().len(), 1);
    assert_eq!(json["method"], "lnc.ltc");
}

#[tokio::test]
async fn bad_requests_are_rejected() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = app(dir.path());

    let (status, _) = get(app.clone(), "/search?q=prison&method=xyz.abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = get(app.clone(), "/search?q=prison&field=directors").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = get(app, "/doc/tt999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn doc_includes_stored_text() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, body) = get(app(dir.path()), "/doc/tt002").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["id"], "tt002");
    assert_eq!(json["title"], "The Guard");
    assert_eq!(json["texts"]["summaries"], "A prison guard befriends an inmate.");
    assert_eq!(json["texts"]["stars"], "Bo Park");
}

#[tokio::test]
async fn admin_endpoints_update_and_commit_the_index() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = app(dir.path());
    let batch = r#"[{"id": "tt004", "title": "Vault", "genres": ["Crime"], "summaries": ["A heist crew cracks a vault."]}]"#;

    let (status, _) = send(app.clone(), admin("POST", "/index/batch", "wrong", Body::from(batch))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(app.clone(), admin("POST", "/index/batch", "secret", Body::from(batch))).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["added"], 1);
    assert_eq!(json["num_docs"], 4);

    let (_, body) = get(app.clone(), "/search?q=heist").await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["results"][0]["doc_id"], "tt004");
    assert!(json["results"][0]["snippet"].as_str().unwrap().contains("***heist***"));

    let (status, body) = send(app.clone(), admin("DELETE", "/doc/tt001", "secret", Body::empty())).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["removed"], true);

    let (status, _) = send(app, admin("POST", "/index/commit", "secret", Body::empty())).await;
    assert_eq!(status, StatusCode::OK);

    let reopened = Engine::open(dir.path(), IndexConfig::default()).unwrap();
    assert_eq!(reopened.index().document_count(), 3);
    assert!(reopened.index().document("tt004").is_some());
    assert!(reopened.index().document("tt001").is_none());
    assert!(reopened.index().posting_list("prison", "summaries") == vec!["tt002"]);
}
