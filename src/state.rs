/// Shared, read-only authentication state handed to every worker.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{Clock, CookiePolicy, TokenService};
use crate::configuration::Settings;

/// Everything handlers and extractors need to issue and check tokens
#[derive(Clone)]
pub struct AuthContext {
    pub tokens: TokenService,
    pub cookies: CookiePolicy,
    /// Bound on a single credential-store lookup during login
    pub lookup_timeout: Duration,
}

impl AuthContext {
    pub fn from_settings(settings: &Settings, clock: Arc<dyn Clock>) -> Self {
        let tokens = TokenService::new(&settings.jwt, clock);
        let cookies = CookiePolicy::new(
            settings.application.secure_cookies(),
            settings.jwt.access_token_expiry,
            settings.jwt.refresh_token_expiry,
        );

        Self {
            tokens,
            cookies,
            lookup_timeout: settings.database.lookup_timeout(),
        }
    }
}
