#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::OnceCell;
use tower::ServiceExt;
use uuid::Uuid;

use agora::config::AppConfig;
use agora::{infra, AppState};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

// "0123456789abcdef0123456789abcdef" (32 bytes), test-only
const TEST_PASETO_ACCESS_KEY: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";
pub const TEST_ADMIN_TOKEN: &str = "test-admin-token-12345";

// ---------------------------------------------------------------------------
// TestApp
// ---------------------------------------------------------------------------

pub struct TestApp {
    router: Router,
    pub state: AppState,
}

pub struct TestResponse {
    pub status: StatusCode,
    body_bytes: bytes::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }

    pub fn is_empty(&self) -> bool {
        self.body_bytes.is_empty()
    }

    /// `id` of a created record.
    pub fn id(&self) -> Uuid {
        let id = self.json()["id"].as_str().unwrap_or("").to_string();
        Uuid::parse_str(&id).unwrap_or_else(|_| panic!("no id in response: {:?}", self.json()))
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub handle: String,
    pub access_token: String,
}

static TEST_APP: OnceCell<TestApp> = OnceCell::const_new();
static DATABASE_READY: OnceCell<()> = OnceCell::const_new();

/// Get (or lazily create) the TestApp for this test.
///
/// On the memory backend one instance is shared by the whole binary. A
/// PostgreSQL pool stays bound to the runtime that opened it and every test
/// runs its own runtime, so on PostgreSQL each test gets a fresh pool over
/// the database prepared once per binary.
pub async fn app() -> &'static TestApp {
    if let Ok(database_url) = std::env::var("DATABASE_URL") {
        database_ready(&database_url).await;
        return Box::leak(Box::new(TestApp::setup().await));
    }

    TEST_APP
        .get_or_init(|| async { TestApp::setup().await })
        .await
}

/// Prepares the test database once per binary.
pub async fn database_ready(database_url: &str) {
    DATABASE_READY
        .get_or_init(|| async { prepare_database(database_url).await })
        .await;
}

/// Environment-driven config for the backend this run targets.
pub fn test_config() -> AppConfig {
    assert_eq!(STANDARD.decode(TEST_PASETO_ACCESS_KEY).unwrap().len(), 32);

    // PostgreSQL when DATABASE_URL is set, otherwise the in-memory backend.
    if std::env::var("DATABASE_URL").is_ok() {
        std::env::set_var("STORE_BACKEND", "postgres");
        std::env::set_var("DB_MAX_CONNECTIONS", "2");
    } else {
        std::env::set_var("STORE_BACKEND", "memory");
    }
    std::env::set_var("PASETO_ACCESS_KEY", TEST_PASETO_ACCESS_KEY);
    std::env::set_var("ADMIN_TOKEN", TEST_ADMIN_TOKEN);
    std::env::set_var("APP_MODE", "api");
    std::env::set_var("RECONCILE_STRATEGY", "recount");

    AppConfig::from_env().expect("failed to build AppConfig")
}

/// Applies the schema and empties every table so each test binary starts
/// from a clean database.
async fn prepare_database(database_url: &str) {
    let db_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url)
        .await
        .expect("cannot connect to test database");

    let sql = std::fs::read_to_string("migrations/0001_init.sql")
        .expect("cannot read migrations/0001_init.sql");
    sqlx::raw_sql(&sql)
        .execute(&db_pool)
        .await
        .unwrap_or_else(|e| panic!("migration failed: {}", e));

    sqlx::raw_sql(
        "DO $$ DECLARE r RECORD; BEGIN \
         FOR r IN (SELECT tablename FROM pg_tables WHERE schemaname = 'public') LOOP \
         EXECUTE 'TRUNCATE TABLE ' || quote_ident(r.tablename) || ' CASCADE'; \
         END LOOP; END $$;",
    )
    .execute(&db_pool)
    .await
    .expect("failed to truncate tables");

    db_pool.close().await;
}

impl TestApp {
    // ------------------------------------------------------------------
    // Setup
    // ------------------------------------------------------------------
    async fn setup() -> Self {
        let config = test_config();
        let store = infra::open_store(&config)
            .await
            .expect("failed to open store");
        let state = AppState::new(store, &config);
        let router = agora::http::router(state.clone());

        TestApp { router, state }
    }

    // ------------------------------------------------------------------
    // Low-level request helper
    // ------------------------------------------------------------------
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");

        for &(key, value) in headers {
            builder = builder.header(key, value);
        }

        let request = if let Some(body) = body {
            builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap()
        } else {
            builder.body(Body::empty()).unwrap()
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse { status, body_bytes }
    }

    // ------------------------------------------------------------------
    // Convenience HTTP helpers
    // ------------------------------------------------------------------
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(Method::GET, path, None, &[]).await
    }

    pub async fn post_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::POST, path, Some(body), &headers).await
    }

    pub async fn patch_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::PATCH, path, Some(body), &headers)
            .await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::DELETE, path, None, &headers).await
    }

    /// POST with an admin token in the x-admin-token header.
    pub async fn post_admin(
        &self,
        path: &str,
        body: Value,
        admin_token: Option<&str>,
    ) -> TestResponse {
        let mut headers = vec![];
        if let Some(t) = admin_token {
            headers.push(("x-admin-token", t));
        }
        self.request(Method::POST, path, Some(body), &headers).await
    }

    // ------------------------------------------------------------------
    // Test data helpers
    // ------------------------------------------------------------------

    /// Registers a user through the admin endpoint. Handles are made unique
    /// per call since the store is shared by every test in the binary.
    pub async fn create_user(&self, suffix: &str) -> TestUser {
        let unique = Uuid::new_v4().simple().to_string();
        let handle = format!("{}_{}", suffix, &unique[..8]);
        let email = format!("{}@example.com", handle);

        let resp = self
            .post_admin(
                "/admin/users",
                json!({ "handle": handle, "email": email }),
                Some(TEST_ADMIN_TOKEN),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "create_user failed: {:?}", resp.json());

        let body = resp.json();
        TestUser {
            id: Uuid::parse_str(body["user"]["id"].as_str().unwrap()).unwrap(),
            handle,
            access_token: body["access_token"].as_str().unwrap().to_string(),
        }
    }

    pub async fn create_post(&self, user: &TestUser) -> Uuid {
        let resp = self
            .post_json(
                "/posts",
                json!({ "title": "hello", "text": "first post", "email": "p@example.com" }),
                Some(&user.access_token),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "create_post failed: {:?}", resp.json());
        resp.id()
    }

    pub async fn create_comment(&self, user: &TestUser, post_id: Uuid) -> Uuid {
        let resp = self
            .post_json(
                "/comments",
                json!({ "post_id": post_id, "text": "nice", "email": "c@example.com" }),
                Some(&user.access_token),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "create_comment failed: {:?}", resp.json());
        resp.id()
    }

    pub async fn post_amount(&self, post_id: Uuid) -> i64 {
        let resp = self.get(&format!("/posts/{}", post_id)).await;
        assert_eq!(resp.status, StatusCode::OK);
        resp.json()["amount"].as_i64().unwrap()
    }
}
