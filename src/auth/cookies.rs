/// Auth cookie contract
///
/// Both tokens travel as HTTP-only, `SameSite=Lax`, `Path=/` cookies.
/// `accessToken` lives 900s and `refreshToken` 604800s. `Secure` is set in
/// production only.

use actix_web::cookie::{time::Duration, Cookie, SameSite};
use actix_web::HttpResponseBuilder;

use crate::auth::jwt::TokenPair;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    pub secure: bool,
    pub access_max_age: i64,
    pub refresh_max_age: i64,
}

impl CookiePolicy {
    pub fn new(secure: bool, access_max_age: i64, refresh_max_age: i64) -> Self {
        Self {
            secure,
            access_max_age,
            refresh_max_age,
        }
    }

    pub fn access_cookie(&self, token: &str) -> Cookie<'static> {
        self.cookie(ACCESS_TOKEN_COOKIE, token.to_owned(), self.access_max_age)
    }

    pub fn refresh_cookie(&self, token: &str) -> Cookie<'static> {
        self.cookie(REFRESH_TOKEN_COOKIE, token.to_owned(), self.refresh_max_age)
    }

    /// Set both token cookies on a response
    pub fn set_tokens(&self, response: &mut HttpResponseBuilder, tokens: &TokenPair) {
        response.cookie(self.access_cookie(&tokens.access_token));
        response.cookie(self.refresh_cookie(&tokens.refresh_token));
    }

    /// Delete both token cookies on a response
    pub fn clear_tokens(&self, response: &mut HttpResponseBuilder) {
        response.cookie(self.removal(ACCESS_TOKEN_COOKIE));
        response.cookie(self.removal(REFRESH_TOKEN_COOKIE));
    }

    fn cookie(&self, name: &'static str, value: String, max_age: i64) -> Cookie<'static> {
        Cookie::build(name, value)
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(Duration::seconds(max_age))
            .finish()
    }

    fn removal(&self, name: &'static str) -> Cookie<'static> {
        let mut cookie = Cookie::build(name, "")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .finish();
        cookie.make_removal();
        cookie
    }
}
