//! Registration, activation and login flows.

use reqwest::StatusCode;
use serde_json::{json, Value};

use hunt_api::auth::PermCode;
use hunt_api::config::Environment;

mod common;

use common::{client, seed_user, spawn_server, test_config, TestServer};

async fn admin_login(server: &TestServer) -> String {
    let res = client()
        .post(server.url("/v1/login"))
        .json(&json!({ "email": "admin@hunt.local", "password": "CHANGE_ME_IN_DEVELOPMENT" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    body["auth"]["token"].as_str().unwrap().to_string()
}

async fn login(server: &TestServer, email: &str, password: &str) -> reqwest::Response {
    client()
        .post(server.url("/v1/login"))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_register_activate_login_flow() {
    let server = spawn_server(test_config(Environment::Development)).await;
    let http = client();
    let admin = admin_login(&server).await;

    let res = http
        .post(server.url("/v1/users"))
        .bearer_auth(&admin)
        .json(&json!({ "name": "Ada", "email": "ada@hunt.local", "password": "analytical" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    assert_eq!(res.headers()["location"], "/v1/users/1");
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["user"]["activated"], false);
    assert_eq!(body["user"]["version"], 1);
    assert!(body["user"].get("password_hash").is_none());
    let activation = body["activation"]["token"].as_str().unwrap().to_string();

    // Correct password, but not activated yet.
    let res = login(&server, "ada@hunt.local", "analytical").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body["error"]["message"],
        "User is not activated yet. Please check your email for the activation link"
    );

    let res = http
        .post(server.url("/v1/users/activate"))
        .json(&json!({ "token": activation }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["user"]["activated"], true);
    assert_eq!(body["user"]["version"], 2);

    // Activation tokens are single use.
    let res = http
        .post(server.url("/v1/users/activate"))
        .json(&json!({ "token": activation }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body["error"]["message"],
        "Invalid token; please request new activation token"
    );

    let res = login(&server, "ada@hunt.local", "analytical").await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    let token = body["auth"]["token"].as_str().unwrap().to_string();
    assert!(body["auth"]["expires_at"].is_string());

    // New users can work with companies but not with other users.
    let res = http
        .post(server.url("/v1/companies"))
        .bearer_auth(&token)
        .json(&json!({ "name": "Difference Engines", "tech_stack": ["brass"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = http
        .get(server.url("/v1/users/1"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    server.stop().await;
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let server = spawn_server(test_config(Environment::Development)).await;
    seed_user(&server.stores, "bob@hunt.local", "right-password", true, &[]).await;

    let res = login(&server, "bob@hunt.local", "wrong-password").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = login(&server, "nobody@hunt.local", "right-password").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = login(&server, "admin@hunt.local", "not-the-admin-password").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    server.stop().await;
}

#[tokio::test]
async fn test_admin_login_only_in_dev_environments() {
    let server = spawn_server(test_config(Environment::Production)).await;

    let res = login(&server, "admin@hunt.local", "CHANGE_ME_IN_DEVELOPMENT").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    server.stop().await;
}

#[tokio::test]
async fn test_activation_token_hidden_outside_dev() {
    let server = spawn_server(test_config(Environment::Production)).await;
    let admin = common::seed_token(&server.stores, 0, true).await;

    let res = client()
        .post(server.url("/v1/users"))
        .bearer_auth(&admin)
        .json(&json!({ "name": "Eve", "email": "eve@hunt.local", "password": "longenough" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    let body: Value = res.json().await.unwrap();
    assert!(body.get("activation").is_none());
    assert_eq!(body["user"]["email"], "eve@hunt.local");

    server.stop().await;
}

#[tokio::test]
async fn test_login_payload_is_validated() {
    let server = spawn_server(test_config(Environment::Development)).await;

    let res = login(&server, "not-an-email", "").await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["message"], "Invalid request payload");
    assert_eq!(body["error"]["details"]["email"], "must be a valid email address");
    assert_eq!(body["error"]["details"]["password"], "must be provided");

    server.stop().await;
}

#[tokio::test]
async fn test_deleting_user_revokes_tokens() {
    let server = spawn_server(test_config(Environment::Development)).await;
    let http = client();
    let admin = admin_login(&server).await;
    let user = seed_user(
        &server.stores,
        "carol@hunt.local",
        "passphrase",
        true,
        &[PermCode::CompaniesRead],
    )
    .await;
    let res = login(&server, "carol@hunt.local", "passphrase").await;
    let body: Value = res.json().await.unwrap();
    let token = body["auth"]["token"].as_str().unwrap().to_string();

    let res = http
        .delete(server.url(&format!("/v1/users/{}", user.id)))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = http
        .get(server.url("/health"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(server
        .stores
        .permissions
        .permissions_for(user.id)
        .await
        .unwrap()
        .is_empty());

    server.stop().await;
}
