//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::time::Duration;

use chrono::Utc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use hunt_api::auth::{issue, password, PermCode, TokenScope};
use hunt_api::config::{ApiConfig, Environment};
use hunt_api::resources::{User, UserPatch};
use hunt_api::store::Stores;
use hunt_api::{HttpServer, Shutdown};

/// bcrypt's minimum cost keeps password tests fast.
pub const TEST_BCRYPT_COST: u32 = 4;

/// A running server bound to an ephemeral port.
pub struct TestServer {
    pub base: String,
    pub stores: Stores,
    pub shutdown: Shutdown,
    handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// Trigger shutdown and wait for the server to drain.
    pub async fn stop(self) {
        self.shutdown.trigger();
        let result = tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop in time")
            .expect("server task panicked");
        assert!(result.is_ok(), "server returned {result:?}");
    }
}

/// Defaults tuned for tests.
pub fn test_config(environment: Environment) -> ApiConfig {
    let mut config = ApiConfig::default();
    config.environment = environment;
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.security.bcrypt_cost = TEST_BCRYPT_COST;
    config
}

pub async fn spawn_server(config: ApiConfig) -> TestServer {
    let stores = Stores::in_memory();
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let shutdown = Shutdown::new();
    let server = HttpServer::with_stores(config, stores.clone());
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestServer {
        base,
        stores,
        shutdown,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Insert a user with `codes` granted. Activated users get version 2.
pub async fn seed_user(
    stores: &Stores,
    email: &str,
    plain_password: &str,
    activated: bool,
    codes: &[PermCode],
) -> User {
    let hashed = password::hash(plain_password.to_string(), TEST_BCRYPT_COST)
        .await
        .unwrap();
    let mut user = stores
        .users
        .insert(User::new("Test User", email, hashed))
        .await
        .unwrap();
    if activated {
        user = stores
            .users
            .update_where(user.id, user.version, &UserPatch::activate())
            .await
            .unwrap()
            .unwrap();
    }
    stores.permissions.grant(user.id, codes).await.unwrap();
    user
}

/// Store a live authentication token for `owner_id` and return its plaintext.
pub async fn seed_token(stores: &Stores, owner_id: i64, is_admin: bool) -> String {
    let (issued, record) = issue(
        owner_id,
        Duration::from_secs(3600),
        TokenScope::Authentication,
        is_admin,
        Utc::now(),
    );
    stores.tokens.insert(record).await.unwrap();
    issued.token.as_str().to_string()
}

/// A user holding `codes` plus a bearer token for them.
pub async fn user_with_token(stores: &Stores, email: &str, codes: &[PermCode]) -> (User, String) {
    let user = seed_user(stores, email, "correct horse battery", true, codes).await;
    let token = seed_token(stores, user.id, false).await;
    (user, token)
}
