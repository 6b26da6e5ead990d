/// HTTP client with the session guard.
///
/// Every call made through `ApiClient::execute` walks this state machine:
///
/// ```text
/// Issue --401--> Unauthorized --> Refreshing --ok--> RetryOnce --401--> LoggedOut
///                      |               |
///                      |               +--fail--> LoggedOut
///                      +--(request was the refresh call)--> LoggedOut
/// ```
///
/// A request is replayed at most once, so a refresh endpoint that keeps
/// answering 401 cannot cause a loop.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::auth::Role;
use crate::client::{ClientError, SessionStore, SessionUser};

pub const LOGIN_ENDPOINT: &str = "/api/auth/login";
pub const REFRESH_ENDPOINT: &str = "/api/auth/refresh";
pub const LOGOUT_ENDPOINT: &str = "/api/auth/logout";
pub const ME_ENDPOINT: &str = "/api/auth/me";

/// Where the user is sent once the session cannot be recovered
pub const LOGIN_PATH: &str = "/login";

/// Moves the user interface to the login page
pub trait LoginNavigator: Send + Sync {
    fn navigate_to_login(&self, login_path: &str);
}

/// Navigator for headless callers; it only records the event
pub struct LogNavigator;

impl LoginNavigator for LogNavigator {
    fn navigate_to_login(&self, login_path: &str) {
        tracing::info!(login_path = login_path, "Session ended, login required");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Issue,
    Unauthorized,
    Refreshing,
    RetryOnce,
    LoggedOut,
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            body,
        }
    }

    fn is_refresh(&self) -> bool {
        self.path.starts_with(REFRESH_ENDPOINT)
    }
}

#[derive(Deserialize)]
struct LoginBody {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "userId")]
    user_id: i64,
    email: String,
    role: Role,
    full_name: String,
}

#[derive(Deserialize)]
struct RefreshBody {
    #[serde(rename = "accessToken")]
    access_token: Option<String>,
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
    navigator: Arc<dyn LoginNavigator>,
}

impl ApiClient {
    /// The underlying client keeps a cookie jar so the HTTP-only token
    /// cookies travel with every request, including the refresh call.
    pub fn new(
        base_url: impl Into<String>,
        session: Arc<SessionStore>,
        navigator: Arc<dyn LoginNavigator>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
            navigator,
        })
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub async fn get(&self, path: &str) -> Result<Value, ClientError> {
        self.execute(&ApiRequest::new(Method::GET, path, None)).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<Value, ClientError> {
        self.execute(&ApiRequest::new(Method::POST, path, Some(body)))
            .await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<Value, ClientError> {
        self.execute(&ApiRequest::new(Method::PUT, path, Some(body)))
            .await
    }

    pub async fn patch(&self, path: &str, body: Value) -> Result<Value, ClientError> {
        self.execute(&ApiRequest::new(Method::PATCH, path, Some(body)))
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, ClientError> {
        self.execute(&ApiRequest::new(Method::DELETE, path, None))
            .await
    }

    /// Sign in and populate the session. Not routed through the guard.
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionUser, ClientError> {
        let response = self
            .http
            .post(self.url(LOGIN_ENDPOINT))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        let body: LoginBody = serde_json::from_value(read_body(response).await?)
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        let user = SessionUser {
            id: body.user_id,
            email: body.email,
            role: body.role,
            full_name: body.full_name,
        };
        self.session.set_auth(user.clone(), body.access_token);

        tracing::info!(user_id = user.id, "Signed in");
        Ok(user)
    }

    /// Ask the server to clear the cookies, then clear local state whatever
    /// the outcome
    pub async fn logout(&self) -> Result<(), ClientError> {
        let result = match self.http.post(self.url(LOGOUT_ENDPOINT)).send().await {
            Ok(response) => read_body(response).await.map(|_| ()),
            Err(e) => Err(ClientError::from(e)),
        };

        self.session.logout();
        result
    }

    /// Send `request`, recovering from one expired access token
    pub async fn execute(&self, request: &ApiRequest) -> Result<Value, ClientError> {
        let mut state = GuardState::Issue;

        loop {
            tracing::debug!(state = ?state, path = %request.path, "Session guard step");

            state = match state {
                GuardState::Issue => {
                    let response = self.dispatch(request).await?;
                    if response.status() != StatusCode::UNAUTHORIZED {
                        return read_body(response).await;
                    }
                    GuardState::Unauthorized
                }
                GuardState::Unauthorized if request.is_refresh() => GuardState::LoggedOut,
                GuardState::Unauthorized => GuardState::Refreshing,
                GuardState::Refreshing => match self.refresh_access_token().await {
                    Ok(()) => GuardState::RetryOnce,
                    Err(e) => {
                        tracing::warn!(error = %e, "Token refresh failed");
                        GuardState::LoggedOut
                    }
                },
                GuardState::RetryOnce => {
                    let response = self.dispatch(request).await?;
                    if response.status() != StatusCode::UNAUTHORIZED {
                        return read_body(response).await;
                    }
                    GuardState::LoggedOut
                }
                GuardState::LoggedOut => {
                    self.session.logout();
                    self.navigator.navigate_to_login(LOGIN_PATH);
                    return Err(ClientError::SessionExpired);
                }
            };
        }
    }

    async fn dispatch(&self, request: &ApiRequest) -> Result<reqwest::Response, ClientError> {
        let mut builder = self
            .http
            .request(request.method.clone(), self.url(&request.path));

        if let Some(token) = self.session.access_token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        Ok(builder.send().await?)
    }

    /// Uses the refresh cookie only; no bearer header is sent
    async fn refresh_access_token(&self) -> Result<(), ClientError> {
        let response = self.http.post(self.url(REFRESH_ENDPOINT)).send().await?;
        let body: RefreshBody = serde_json::from_value(read_body(response).await?)
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        if let Some(token) = body.access_token {
            self.session.set_access_token(token);
        }
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// JSON body of a successful response, or the server's `error` message
async fn read_body(response: reqwest::Response) -> Result<Value, ClientError> {
    let status = response.status();
    let bytes = response.bytes().await?;
    let parsed: Option<Value> = serde_json::from_slice(&bytes).ok();

    if status.is_success() {
        return match parsed {
            Some(value) => Ok(value),
            None if bytes.is_empty() => Ok(Value::Null),
            None => Err(ClientError::Decode(format!(
                "non-JSON body with status {}",
                status.as_u16()
            ))),
        };
    }

    let message = parsed
        .as_ref()
        .and_then(|body| body.get("error"))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));

    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}
