//! Optimistic concurrency over HTTP.

use reqwest::StatusCode;
use serde_json::{json, Value};

use hunt_api::auth::PermCode;
use hunt_api::config::Environment;

mod common;

use common::{client, spawn_server, test_config, user_with_token, TestServer};

const COMPANY_CODES: [PermCode; 2] = [PermCode::CompaniesRead, PermCode::CompaniesWrite];

async fn create_company(server: &TestServer, token: &str, name: &str) -> Value {
    let res = client()
        .post(server.url("/v1/companies"))
        .bearer_auth(token)
        .json(&json!({ "name": name, "url": "https://acme.example", "tech_stack": ["rust", "sql"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    body["company"].clone()
}

#[tokio::test]
async fn test_stale_full_update_is_edit_conflict() {
    let server = spawn_server(test_config(Environment::Development)).await;
    let (_, token) = user_with_token(&server.stores, "ed@hunt.local", &COMPANY_CODES).await;
    let http = client();
    let company = create_company(&server, &token, "Acme").await;
    assert_eq!(company["version"], 1);

    let res = http
        .put(server.url("/v1/companies/1"))
        .bearer_auth(&token)
        .json(&json!({ "name": "Acme Corp", "tech_stack": ["rust"], "version": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["company"]["version"], 2);
    assert_eq!(body["company"]["name"], "Acme Corp");
    assert!(body["company"].get("url").is_none());

    // Same observed version again: somebody else already wrote.
    let res = http
        .put(server.url("/v1/companies/1"))
        .bearer_auth(&token)
        .json(&json!({ "name": "Acme Ltd", "tech_stack": ["go"], "version": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body["error"]["message"],
        "Unable to update the record due to an edit conflict. Please try again"
    );

    let res = http
        .get(server.url("/v1/companies/1"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["company"]["name"], "Acme Corp");
    assert_eq!(body["company"]["version"], 2);

    server.stop().await;
}

#[tokio::test]
async fn test_partial_update_keeps_other_fields() {
    let server = spawn_server(test_config(Environment::Development)).await;
    let (_, token) = user_with_token(&server.stores, "pat@hunt.local", &COMPANY_CODES).await;
    create_company(&server, &token, "Acme").await;

    let res = client()
        .patch(server.url("/v1/companies/1"))
        .bearer_auth(&token)
        .json(&json!({ "tech_stack": ["rust", "kafka"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["company"]["name"], "Acme");
    assert_eq!(body["company"]["url"], "https://acme.example");
    assert_eq!(body["company"]["tech_stack"], json!(["rust", "kafka"]));
    assert_eq!(body["company"]["version"], 2);

    server.stop().await;
}

#[tokio::test]
async fn test_concurrent_patches_never_lose_a_write() {
    let server = spawn_server(test_config(Environment::Development)).await;
    let (_, token) = user_with_token(&server.stores, "race@hunt.local", &COMPANY_CODES).await;
    create_company(&server, &token, "Acme").await;
    let http = client();

    let mut tasks = Vec::new();
    for i in 0..8 {
        let request = http
            .patch(server.url("/v1/companies/1"))
            .bearer_auth(&token)
            .json(&json!({ "name": format!("Acme {i}") }));
        tasks.push(tokio::spawn(async move { request.send().await.unwrap().status() }));
    }

    let mut written = 0;
    for task in tasks {
        match task.await.unwrap() {
            StatusCode::OK => written += 1,
            StatusCode::CONFLICT => {}
            other => panic!("unexpected status {other}"),
        }
    }
    assert!(written >= 1);

    // Every successful write bumped the version exactly once.
    let res = http
        .get(server.url("/v1/companies/1"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["company"]["version"], 1 + written);

    server.stop().await;
}

#[tokio::test]
async fn test_duplicate_name_is_rejected() {
    let server = spawn_server(test_config(Environment::Development)).await;
    let (_, token) = user_with_token(&server.stores, "dup@hunt.local", &COMPANY_CODES).await;
    let http = client();
    create_company(&server, &token, "Acme").await;
    create_company(&server, &token, "Globex").await;

    let res = http
        .post(server.url("/v1/companies"))
        .bearer_auth(&token)
        .json(&json!({ "name": "Acme", "tech_stack": ["rust"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["message"], "Duplicate key provided");

    // Renaming onto a taken name is the same error, and the row is untouched.
    let res = http
        .patch(server.url("/v1/companies/2"))
        .bearer_auth(&token)
        .json(&json!({ "name": "Acme" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = http
        .get(server.url("/v1/companies/2"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["company"]["name"], "Globex");
    assert_eq!(body["company"]["version"], 1);

    server.stop().await;
}

#[tokio::test]
async fn test_invalid_payloads() {
    let server = spawn_server(test_config(Environment::Development)).await;
    let (_, token) = user_with_token(&server.stores, "val@hunt.local", &COMPANY_CODES).await;
    let http = client();

    let res = http
        .post(server.url("/v1/companies"))
        .bearer_auth(&token)
        .json(&json!({ "name": "", "url": "not a url", "tech_stack": ["a", "a"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = res.json().await.unwrap();
    let details = &body["error"]["details"];
    assert_eq!(details["name"], "must be provided");
    assert_eq!(details["url"], "must be a valid URL");
    assert_eq!(details["tech_stack"], "must not contain duplicate items");

    let res = http
        .post(server.url("/v1/companies"))
        .bearer_auth(&token)
        .json(&json!({ "name": "Acme", "tech_stack": ["rust"], "founded": 1999 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = http
        .post(server.url("/v1/companies"))
        .bearer_auth(&token)
        .header("content-type", "application/json")
        .body("{\"name\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["details"], "Body contains badly-formed JSON");

    server.stop().await;
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let mut config = test_config(Environment::Development);
    config.security.max_body_size = 64;
    let server = spawn_server(config).await;
    let (_, token) = user_with_token(&server.stores, "big@hunt.local", &COMPANY_CODES).await;

    let res = client()
        .post(server.url("/v1/companies"))
        .bearer_auth(&token)
        .json(&json!({ "name": "x".repeat(200), "tech_stack": ["rust"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);

    // The limit applies before identity resolution.
    let res = client()
        .post(server.url("/v1/companies"))
        .json(&json!({ "name": "x".repeat(200), "tech_stack": ["rust"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);

    // Small bodies still go through the whole gatekeeper chain.
    let res = client()
        .post(server.url("/v1/companies"))
        .bearer_auth(&token)
        .json(&json!({ "name": "Acme", "tech_stack": ["rust"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    assert!(res.headers().get("x-request-id").is_some());

    server.stop().await;
}

#[tokio::test]
async fn test_delete_then_read_is_not_found() {
    let server = spawn_server(test_config(Environment::Production)).await;
    let (_, token) = user_with_token(&server.stores, "del@hunt.local", &COMPANY_CODES).await;
    let http = client();
    create_company(&server, &token, "Acme").await;

    let res = http
        .delete(server.url("/v1/companies/1"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = http
        .delete(server.url("/v1/companies/1"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    server.stop().await;
}
