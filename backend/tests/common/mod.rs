#![allow(dead_code)]
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHasher,
};
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use quillsign_backend::{
    api,
    mail::{MailMessage, Mailer},
    roles::OrganisationMemberRole,
    AppState,
};

const JWT_SECRET: &str = "test-secret-that-is-at-least-32-chars-long!!";
const JWT_EXPIRY_HOURS: u64 = 12;

/// Captures outgoing mail instead of sending it, so tests can assert on
/// recipients and invite links.
pub struct RecordingMailer {
    pub outbox: Mutex<Vec<MailMessage>>,
}

#[async_trait::async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &MailMessage) -> anyhow::Result<()> {
        self.outbox.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub addr: SocketAddr,
    pub pool: PgPool,
    pub mailer: Arc<RecordingMailer>,
}

impl TestApp {
    pub fn sent_mail(&self) -> Vec<MailMessage> {
        self.mailer.outbox.lock().unwrap().clone()
    }
}

/// Spin up a real Axum server on a random port. All tests share the same dev
/// database; test isolation comes from creating unique orgs/users per test
/// and cleaning up afterwards.
///
/// Returns `None` (skipping the test) when `TEST_DATABASE_URL` is not set —
/// these tests write and delete data and must not run against a shared
/// database by accident.
pub async fn setup_test_app() -> Option<TestApp> {
    let Ok(database_url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set; skipping integration test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    // Run migrations to ensure schema is up-to-date
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let mailer = Arc::new(RecordingMailer {
        outbox: Mutex::new(Vec::new()),
    });

    let state = AppState {
        pool: pool.clone(),
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expiry_hours: JWT_EXPIRY_HOURS,
        mailer: mailer.clone(),
        base_url: "http://localhost:5173".to_string(),
        billing_enabled: true,
    };

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Some(TestApp { addr, pool, mailer })
}

pub fn unique_email(prefix: &str) -> String {
    format!("{}+{}@test.local", prefix, &Uuid::new_v4().to_string()[..8])
}

/// Create a test user with an Argon2-hashed password. Returns (user_id, plaintext_password).
pub async fn create_test_user(pool: &PgPool, name: &str, email: &str) -> (Uuid, String) {
    let user_id = Uuid::new_v4();
    let password = "testpass123";
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .expect("Failed to hash password")
        .to_string();

    sqlx::query("INSERT INTO users (id, name, email, password_hash) VALUES ($1, $2, $3, $4)")
        .bind(user_id)
        .bind(name)
        .bind(email)
        .bind(&hash)
        .execute(pool)
        .await
        .expect("Failed to create test user");

    (user_id, password.to_string())
}

/// Create a test organisation owned by `owner_id` (who becomes an admin
/// member). Returns the org ID.
pub async fn create_test_org(pool: &PgPool, owner_id: Uuid, suffix: &str) -> Uuid {
    let id = Uuid::new_v4();
    let url = format!("test-org-{}-{}", suffix, &id.to_string()[..8]);
    let name = format!("Test Org {}", suffix);

    sqlx::query("INSERT INTO organisations (id, name, url, owner_user_id) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(&name)
        .bind(&url)
        .bind(owner_id)
        .execute(pool)
        .await
        .expect("Failed to create test org");

    add_member(pool, id, owner_id, OrganisationMemberRole::Admin).await;

    id
}

pub async fn add_member(
    pool: &PgPool,
    org_id: Uuid,
    user_id: Uuid,
    role: OrganisationMemberRole,
) -> Uuid {
    let member_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO organisation_members (id, organisation_id, user_id, role, status)
         VALUES ($1, $2, $3, $4, 'active')",
    )
    .bind(member_id)
    .bind(org_id)
    .bind(user_id)
    .bind(role)
    .execute(pool)
    .await
    .expect("Failed to add member");

    member_id
}

pub async fn add_invite(
    pool: &PgPool,
    org_id: Uuid,
    email: &str,
    role: OrganisationMemberRole,
    token: &str,
) -> Uuid {
    let invite_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO organisation_member_invites (id, organisation_id, email, role, status, token)
         VALUES ($1, $2, $3, $4, 'pending', $5)",
    )
    .bind(invite_id)
    .bind(org_id)
    .bind(email)
    .bind(role)
    .bind(token)
    .execute(pool)
    .await
    .expect("Failed to add invite");

    invite_id
}

pub async fn get_auth_token(addr: SocketAddr, email: &str, password: &str) -> String {
    let client = http_client();
    let resp = client
        .post(format!("http://{}/api/auth/login", addr))
        .json(&serde_json::json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Login request failed");

    assert_eq!(resp.status(), 200, "Login should succeed");

    let body: serde_json::Value = resp.json().await.unwrap();
    body["token"].as_str().unwrap().to_string()
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::new()
}

/// Delete a test org; members, invites and teams cascade.
pub async fn cleanup_test_org(pool: &PgPool, org_id: Uuid) {
    sqlx::query("DELETE FROM organisations WHERE id = $1")
        .bind(org_id)
        .execute(pool)
        .await
        .expect("Failed to clean up test org");
}

pub async fn cleanup_test_user(pool: &PgPool, user_id: Uuid) {
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await
        .expect("Failed to clean up test user");
}
