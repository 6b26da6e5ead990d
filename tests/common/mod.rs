#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ucms_auth::auth::{derive_password_hash, CookiePolicy, ManualClock, Role, TokenService};
use ucms_auth::configuration::JwtSettings;
use ucms_auth::error::{AppError, DatabaseError, ValidationError};
use ucms_auth::startup::run;
use ucms_auth::state::AuthContext;
use ucms_auth::store::{CredentialStore, Invitation, NewUser, UserRecord};

pub const START: i64 = 1_700_000_000;
pub const PASSWORD: &str = "correct horse battery";

#[derive(Default)]
struct Tables {
    users: Vec<UserRecord>,
    invitations: Vec<(String, Invitation, bool)>,
}

/// Credential store backed by vectors, with an optional artificial delay on
/// email lookups
#[derive(Default)]
pub struct InMemoryCredentialStore {
    tables: Mutex<Tables>,
    lookup_delay: Mutex<Option<Duration>>,
    consume_on_lookup: Mutex<bool>,
}

impl InMemoryCredentialStore {
    pub fn insert_user(&self, email: &str, password: &str, role: Role) -> UserRecord {
        let password_hash = derive_password_hash(password, None).unwrap();
        self.insert_user_with_hash(email, &password_hash, role)
    }

    pub fn insert_user_with_hash(&self, email: &str, password_hash: &str, role: Role) -> UserRecord {
        let mut tables = self.tables.lock().unwrap();
        let record = UserRecord {
            id: tables.users.len() as i64 + 1,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role,
            full_name: format!("Test {}", role),
        };
        tables.users.push(record.clone());
        record
    }

    pub fn insert_invitation(&self, token: &str, email: &str, role: Role) {
        let mut tables = self.tables.lock().unwrap();
        let invitation = Invitation {
            id: tables.invitations.len() as i64 + 1,
            email: email.to_string(),
            role,
        };
        tables.invitations.push((token.to_string(), invitation, false));
    }

    pub fn stored_hash(&self, email: &str) -> Option<String> {
        let tables = self.tables.lock().unwrap();
        tables
            .users
            .iter()
            .find(|u| u.email == email)
            .map(|u| u.password_hash.clone())
    }

    pub fn delay_lookups(&self, delay: Duration) {
        *self.lookup_delay.lock().unwrap() = Some(delay);
    }

    /// Mark an invitation used right after it is read, as a concurrent
    /// registration with the same token would
    pub fn consume_invitations_on_lookup(&self) {
        *self.consume_on_lookup.lock().unwrap() = true;
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        let delay = *self.lookup_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, AppError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<UserRecord, AppError> {
        let mut tables = self.tables.lock().unwrap();
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(DatabaseError::UniqueConstraintViolation(user.email).into());
        }
        if let Some(invitation_id) = user.invitation_id {
            let entry = tables
                .invitations
                .iter_mut()
                .find(|(_, invitation, used)| invitation.id == invitation_id && !*used)
                .ok_or_else(|| ValidationError::InvalidFormat("invitation token".to_string()))?;
            entry.2 = true;
        }

        let record = UserRecord {
            id: tables.users.len() as i64 + 1,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            full_name: user.full_name,
        };
        tables.users.push(record.clone());
        Ok(record)
    }

    async fn update_password_hash(&self, id: i64, password_hash: &str) -> Result<(), AppError> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == id) {
            user.password_hash = password_hash.to_string();
        }
        Ok(())
    }

    async fn find_invitation(&self, token: &str) -> Result<Option<Invitation>, AppError> {
        let consume = *self.consume_on_lookup.lock().unwrap();
        let mut tables = self.tables.lock().unwrap();
        Ok(tables
            .invitations
            .iter_mut()
            .find(|(t, _, used)| t == token && !*used)
            .map(|(_, invitation, used)| {
                *used = consume;
                invitation.clone()
            }))
    }
}

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryCredentialStore>,
    pub clock: Arc<ManualClock>,
    pub tokens: TokenService,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}

pub fn jwt_settings() -> JwtSettings {
    JwtSettings {
        secret: "integration-test-secret-at-least-32-bytes".to_string(),
        access_token_expiry: 900,
        refresh_token_expiry: 604_800,
    }
}

pub fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let settings = jwt_settings();
    let clock = Arc::new(ManualClock::new(START));
    let tokens = TokenService::new(&settings, clock.clone());
    let context = AuthContext {
        tokens: tokens.clone(),
        cookies: CookiePolicy::new(false, settings.access_token_expiry, settings.refresh_token_expiry),
        lookup_timeout: Duration::from_millis(200),
    };

    let store = Arc::new(InMemoryCredentialStore::default());
    let server = run(listener, store.clone(), context).expect("Failed to create server");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        store,
        clock,
        tokens,
    }
}

/// Client that keeps cookies and never follows redirects
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
