/// Authentication Routes
///
/// Login, registration, token refresh, logout and current-user lookup.
/// Tokens are always delivered as HTTP-only cookies; the access token is
/// also returned in the JSON body for clients that send a bearer header.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{
    derive_password_hash, needs_rehash, verify_password, verify_without_account, Identity, Role,
    REFRESH_TOKEN_COOKIE,
};
use crate::error::{AppError, AuthError, DatabaseError, ValidationError};
use crate::middleware::AuthenticatedUser;
use crate::state::AuthContext;
use crate::store::{CredentialStore, NewUser, UserRecord};
use crate::validators::{is_valid_email, is_valid_name, is_valid_password, required_field};

/// User login request
///
/// Fields are optional so that a missing field is reported as a validation
/// error instead of a payload parse failure.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// User registration request
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    /// Staff invitation token; without one the account is a student account
    pub token: Option<String>,
}

/// Body returned by login and registration
#[derive(Serialize)]
pub struct AuthResponse {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub email: String,
    pub role: Role,
    pub full_name: String,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    #[serde(rename = "accessToken")]
    pub access_token: String,
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub success: bool,
    pub message: String,
}

/// Current user information
#[derive(Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub role: Role,
    pub full_name: String,
}

fn required_password(password: Option<&str>) -> Result<String, ValidationError> {
    match password {
        Some(password) if !password.is_empty() => Ok(password.to_string()),
        _ => Err(ValidationError::EmptyField("password".to_string())),
    }
}

fn identity_of(user: &UserRecord) -> Identity {
    Identity {
        subject_id: user.id,
        email: user.email.clone(),
        role: user.role,
    }
}

/// Issue a token pair for `user` and build a response carrying both cookies
fn authenticated_response(
    mut response: actix_web::HttpResponseBuilder,
    user: &UserRecord,
    context: &AuthContext,
) -> Result<HttpResponse, AppError> {
    let tokens = context.tokens.issue(&identity_of(user))?;
    context.cookies.set_tokens(&mut response, &tokens);

    Ok(response.json(AuthResponse {
        access_token: tokens.access_token,
        user_id: user.id,
        email: user.email.clone(),
        role: user.role,
        full_name: user.full_name.clone(),
    }))
}

/// Re-derive a stored hash with the current parameters. Failures are logged
/// and otherwise ignored; the login already succeeded.
async fn upgrade_password_hash(store: &dyn CredentialStore, user_id: i64, password: String) {
    let derived = match web::block(move || derive_password_hash(&password, None)).await {
        Ok(Ok(hash)) => hash,
        Ok(Err(e)) => {
            tracing::warn!(user_id = user_id, error = %e, "Password rehash failed");
            return;
        }
        Err(e) => {
            tracing::warn!(user_id = user_id, error = %e, "Password rehash task failed");
            return;
        }
    };

    match store.update_password_hash(user_id, &derived).await {
        Ok(()) => tracing::info!(user_id = user_id, "Password hash upgraded"),
        Err(e) => tracing::warn!(user_id = user_id, error = %e, "Storing upgraded hash failed"),
    }
}

/// POST /api/auth/login
///
/// # Errors
/// - 400: Missing email or password
/// - 401: Unknown email, wrong password, or the credential lookup timed out.
///   All three produce the same body.
/// - 5xx: Credential store unavailable
pub async fn login(
    form: web::Json<LoginRequest>,
    store: web::Data<dyn CredentialStore>,
    context: web::Data<AuthContext>,
) -> Result<HttpResponse, AppError> {
    let email = required_field(form.email.as_deref(), "email")?;
    let password = required_password(form.password.as_deref())?;

    let lookup = tokio::time::timeout(context.lookup_timeout, store.find_by_email(&email)).await;
    let user = match lookup {
        Ok(result) => result?,
        Err(_) => {
            tracing::warn!("Credential lookup timed out");
            return Err(AuthError::InvalidCredentials.into());
        }
    };
    let user = match user {
        Some(user) => user,
        None => {
            web::block(move || verify_without_account(&password)).await?;
            return Err(AuthError::InvalidCredentials.into());
        }
    };

    let stored_hash = user.password_hash.clone();
    let candidate = password.clone();
    let valid = web::block(move || verify_password(&candidate, &stored_hash)).await?;
    if !valid {
        return Err(AuthError::InvalidCredentials.into());
    }

    if needs_rehash(&user.password_hash) {
        upgrade_password_hash(store.get_ref(), user.id, password).await;
    }

    tracing::info!(user_id = user.id, role = %user.role, "User logged in");

    authenticated_response(HttpResponse::Ok(), &user, context.get_ref())
}

/// POST /api/auth/register
///
/// Without an invitation token the account is always a student account.
/// With one, the invitation decides the role and must match the email.
///
/// # Errors
/// - 400: Validation errors, unknown/expired invitation, email mismatch
/// - 409: Email already registered
/// - 5xx: Credential store unavailable
pub async fn register(
    form: web::Json<RegisterRequest>,
    store: web::Data<dyn CredentialStore>,
    context: web::Data<AuthContext>,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();

    let email = is_valid_email(&required_field(form.email.as_deref(), "email")?)?;
    let password = required_password(form.password.as_deref())?;
    is_valid_password(&password)?;
    let full_name = is_valid_name(&required_field(form.full_name.as_deref(), "full_name")?)?;

    let invitation_token = form.token.filter(|token| !token.trim().is_empty());
    let (role, invitation_id) = match invitation_token {
        None => (Role::Student, None),
        Some(token) => {
            let invitation = store
                .find_invitation(token.trim())
                .await?
                .ok_or_else(|| ValidationError::InvalidFormat("invitation token".to_string()))?;

            if !invitation.email.eq_ignore_ascii_case(&email) {
                return Err(ValidationError::InvalidFormat("invitation email".to_string()).into());
            }

            (invitation.role, Some(invitation.id))
        }
    };

    if store.find_by_email(&email).await?.is_some() {
        return Err(DatabaseError::UniqueConstraintViolation(
            "Email already registered".to_string(),
        )
        .into());
    }

    let password_hash = web::block(move || derive_password_hash(&password, None)).await??;

    let user = store
        .create_user(NewUser {
            email,
            password_hash,
            role,
            full_name,
            invitation_id,
        })
        .await?;

    tracing::info!(user_id = user.id, role = %user.role, "User registered");

    authenticated_response(HttpResponse::Created(), &user, context.get_ref())
}

fn refresh_rejected(context: &AuthContext) -> HttpResponse {
    let request_id = uuid::Uuid::new_v4().to_string();
    let body = AppError::Auth(AuthError::TokenInvalid).to_error_response(&request_id);

    let mut response = HttpResponse::Unauthorized();
    context.cookies.clear_tokens(&mut response);
    response.json(body)
}

/// POST /api/auth/refresh
///
/// Reads the `refreshToken` cookie only. On success both cookies are
/// reissued and the new access token is returned in the body. A missing,
/// invalid or expired refresh token clears both cookies and yields 401.
pub async fn refresh(req: HttpRequest, context: web::Data<AuthContext>) -> HttpResponse {
    let claims = req
        .cookie(REFRESH_TOKEN_COOKIE)
        .and_then(|cookie| context.tokens.verify(cookie.value()));

    let claims = match claims {
        Some(claims) => claims,
        None => {
            tracing::info!("Refresh rejected");
            return refresh_rejected(context.get_ref());
        }
    };

    let tokens = match context.tokens.issue(&claims.identity()) {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::error!(error = %e, "Token refresh failed");
            return refresh_rejected(context.get_ref());
        }
    };

    tracing::info!(user_id = claims.subject_id, "Tokens refreshed");

    let mut response = HttpResponse::Ok();
    context.cookies.set_tokens(&mut response, &tokens);
    response.json(RefreshResponse {
        success: true,
        access_token: tokens.access_token,
    })
}

/// POST /api/auth/logout
pub async fn logout(context: web::Data<AuthContext>) -> HttpResponse {
    let mut response = HttpResponse::Ok();
    context.cookies.clear_tokens(&mut response);
    response.json(LogoutResponse {
        success: true,
        message: "Logged out successfully".to_string(),
    })
}

/// GET /api/auth/me
///
/// The role in the response comes from the token, not the stored row.
///
/// # Errors
/// - 401: No resolvable identity
/// - 404: The account no longer exists
pub async fn get_current_user(
    user: AuthenticatedUser,
    store: web::Data<dyn CredentialStore>,
) -> Result<HttpResponse, AppError> {
    let claims = user.claims;

    let record = store
        .find_by_id(claims.subject_id)
        .await?
        .ok_or_else(|| DatabaseError::NotFound("User not found".to_string()))?;

    Ok(HttpResponse::Ok().json(UserResponse {
        id: record.id,
        email: record.email,
        role: claims.role,
        full_name: record.full_name,
    }))
}
