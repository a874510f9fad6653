#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use campdesk::auth::USER_HEADER;
use campdesk::config::default_roles;
use campdesk::policy::AccessPolicy;
use campdesk::server::{AppState, create_router};
use campdesk::store::{SqliteStore, Store};

/// In-process app over a fresh in-memory database seeded with the default roles.
pub struct TestApp {
    pub state: Arc<AppState>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_camp_cache_ttl(Duration::from_secs(3600))
    }

    pub fn with_camp_cache_ttl(ttl: Duration) -> Self {
        let store = SqliteStore::open_in_memory().expect("open store");
        store.initialize().expect("initialize schema");
        store.seed_roles(&default_roles()).expect("seed roles");

        let policy = AccessPolicy::load(&store).expect("load policy");
        let state = Arc::new(AppState::new(Arc::new(store), policy, ttl));
        let router = create_router(state.clone());

        Self { state, router }
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(user) = user {
            builder = builder.header(USER_HEADER, user);
        }
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("build request"))
            .await
            .expect("send request");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    pub async fn get(&self, path: &str, user: &str) -> (StatusCode, Value) {
        self.request(Method::GET, path, Some(user), None).await
    }

    pub async fn post(&self, path: &str, user: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, path, Some(user), Some(body)).await
    }

    pub async fn patch(&self, path: &str, user: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, path, Some(user), Some(body)).await
    }

    pub async fn put(&self, path: &str, user: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, path, Some(user), Some(body)).await
    }

    pub async fn delete(&self, path: &str, user: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, path, Some(user), None).await
    }

    /// Signs a user in the way the OAuth proxy would and returns the user JSON.
    pub async fn sign_in(&self, id: &str) -> Value {
        let identity = json!({
            "id": id,
            "given_name": id,
            "family_name": "Tester",
            "full_name": format!("{id} Tester"),
            "email": format!("{id}@example.com"),
        });
        let (status, body) = self
            .request(Method::POST, "/api/v1/sign-in", None, Some(identity))
            .await;
        assert_eq!(status, StatusCode::OK, "sign-in failed: {body}");
        body["data"].clone()
    }

    /// Signs a user in and makes them an instructor.
    pub async fn instructor(&self, admin: &str, id: &str) -> Value {
        self.sign_in(id).await;
        let (status, body) = self
            .put(
                &format!("/api/v1/users/{id}/roles"),
                admin,
                json!({ "roles": ["GUARDIAN", "INSTRUCTOR"] }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "set roles failed: {body}");
        body["data"].clone()
    }

    pub async fn create_program(&self, owner: &str, title: &str) -> i64 {
        let (status, body) = self
            .post(
                "/api/v1/programs",
                owner,
                json!({
                    "title": title,
                    "grade_range": { "from": "K", "to": "5" },
                    "duration": "half",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create program failed: {body}");
        body["data"]["id"].as_i64().expect("program id")
    }
}
