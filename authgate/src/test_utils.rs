//! Test utilities shared by unit and HTTP tests.

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    auth::password::{self, Argon2Params},
    config::{AuthConfig, Config, PasswordConfig},
    db::{
        handlers::{CredentialStore, MemoryStore},
        models::users::{UserCreateDBRequest, UserDBResponse},
    },
};

/// Argon2 parameters small enough to keep tests fast.
pub fn cheap_argon2() -> Argon2Params {
    Argon2Params {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    }
}

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        auth: AuthConfig {
            password: PasswordConfig {
                argon2: cheap_argon2(),
                ..Default::default()
            },
            ..Default::default()
        },
        ..Default::default()
    }
}

pub async fn create_test_server() -> TestServer {
    create_test_server_with_config(create_test_config()).await
}

/// Full application over a fresh in-memory store.
pub async fn create_test_server_with_config(config: Config) -> TestServer {
    let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::new());
    crate::Application::with_store(config, store)
        .await
        .expect("Failed to create application")
        .into_test_server()
}

/// Register through the API and return the new user's id.
pub async fn register(server: &TestServer, username: &str, password: &str) -> Uuid {
    let response = server
        .post("/v1/users/create")
        .json(&json!({"username": username, "password": password}))
        .await;
    response.assert_status(StatusCode::CREATED);

    let body: Value = response.json();
    body["user"]["id"]
        .as_str()
        .and_then(|id| id.parse().ok())
        .expect("created user should have a UUID id")
}

/// Log in through the API and return the session token.
pub async fn login_token(server: &TestServer, username: &str, password: &str) -> String {
    let response = server
        .post("/v1/auth/login")
        .json(&json!({"username": username, "password": password}))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    body["token"].as_str().expect("login should return a token").to_string()
}

/// Insert a user with the `user` role directly into `store`.
pub async fn seed_user(store: &Arc<dyn CredentialStore>, username: &str, password: &str) -> UserDBResponse {
    let password_hash = password::hash_password(password, cheap_argon2()).expect("Failed to hash password");
    store
        .create(&UserCreateDBRequest {
            username: username.to_string(),
            password_hash,
            roles: vec!["user".to_string()],
        })
        .await
        .expect("Failed to create test user")
}
