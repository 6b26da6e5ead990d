/// Authenticated-request plumbing
///
/// `AuthenticatedUser` is the extractor every protected endpoint takes: no
/// resolvable identity means 401, and `require_role` turns a wrong role into
/// 403. `ProtectedPages` guards browser page prefixes with the
/// `accessToken` cookie and redirects to the login page.

use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::LOCATION,
    web, Error, FromRequest, HttpMessage, HttpRequest, HttpResponse,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;

use crate::auth::{bearer_token, cookie_token, resolve_identity, Claims, Role, TokenService};
use crate::error::{AppError, AuthError};
use crate::state::AuthContext;

pub const LOGIN_PAGE: &str = "/login";
pub const PROTECTED_PAGE_PREFIXES: [&str; 3] = ["/student", "/counselor", "/admin"];

/// Identity of the caller, resolved from the bearer header or the cookie
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub claims: Claims,
}

impl AuthenticatedUser {
    /// Fail with 403 unless the token's role is one of `allowed`
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), AppError> {
        if self.claims.has_role(allowed) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = self.claims.subject_id,
                role = %self.claims.role,
                "Role not permitted for this endpoint"
            );
            Err(AppError::Auth(AuthError::Forbidden))
        }
    }

    fn from_http_request(req: &HttpRequest) -> Result<Self, AppError> {
        let context = req
            .app_data::<web::Data<AuthContext>>()
            .ok_or_else(|| AppError::Internal("AuthContext is not registered".to_string()))?;

        match resolve_identity(req, &context.tokens) {
            Some(claims) => Ok(Self { claims }),
            None if bearer_token(req).is_none() && cookie_token(req).is_none() => {
                Err(AppError::Auth(AuthError::MissingToken))
            }
            None => Err(AppError::Auth(AuthError::TokenInvalid)),
        }
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Self::from_http_request(req))
    }
}

/// Redirects unauthenticated browser navigations under the protected page
/// prefixes to the login page
pub struct ProtectedPages {
    tokens: TokenService,
}

impl ProtectedPages {
    pub fn new(tokens: TokenService) -> Self {
        Self { tokens }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ProtectedPages
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = ProtectedPagesService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ProtectedPagesService {
            service: Rc::new(service),
            tokens: self.tokens.clone(),
        }))
    }
}

pub struct ProtectedPagesService<S> {
    service: Rc<S>,
    tokens: TokenService,
}

fn is_protected_page(path: &str) -> bool {
    PROTECTED_PAGE_PREFIXES.iter().any(|prefix| {
        path.strip_prefix(prefix)
            .map(|rest| rest.is_empty() || rest.starts_with('/'))
            .unwrap_or(false)
    })
}

impl<S, B> Service<ServiceRequest> for ProtectedPagesService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();

        if !is_protected_page(req.path()) {
            return Box::pin(async move { service.call(req).await });
        }

        let claims = cookie_token(req.request()).and_then(|token| self.tokens.verify(&token));

        match claims {
            Some(claims) => {
                tracing::debug!(
                    user_id = claims.subject_id,
                    role = %claims.role,
                    path = %req.path(),
                    "Page access granted"
                );
                req.extensions_mut().insert(claims);
                Box::pin(async move { service.call(req).await })
            }
            None => {
                tracing::debug!(path = %req.path(), "Redirecting to login");
                let response = HttpResponse::Found()
                    .insert_header((LOCATION, LOGIN_PAGE))
                    .finish();
                Box::pin(async move {
                    Err(actix_web::error::InternalError::from_response("Login required", response)
                        .into())
                })
            }
        }
    }
}
