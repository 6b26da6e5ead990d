/// Credential store collaborator
///
/// The auth core only needs a handful of lookups against the user table.
/// `PgCredentialStore` backs them with Postgres; tests plug in their own
/// implementation.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::auth::Role;
use crate::error::{AppError, DatabaseError, ValidationError};

/// A user row as seen by the auth core
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub full_name: String,
}

/// Input for `create_user`. `invitation_id` is consumed atomically with the insert.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub full_name: String,
    pub invitation_id: Option<i64>,
}

/// An unused, unexpired staff invitation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invitation {
    pub id: i64,
    pub email: String,
    pub role: Role,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, AppError>;

    /// # Errors
    /// `DatabaseError::UniqueConstraintViolation` when the email is taken
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, AppError>;

    async fn update_password_hash(&self, id: i64, password_hash: &str) -> Result<(), AppError>;

    /// Only returns invitations that are unused and not yet expired
    async fn find_invitation(&self, token: &str) -> Result<Option<Invitation>, AppError>;
}

pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type UserRow = (i64, String, String, String, String);

fn into_record((id, email, password_hash, role, full_name): UserRow) -> Result<UserRecord, AppError> {
    let role = role
        .parse::<Role>()
        .map_err(|e| AppError::Database(DatabaseError::UnexpectedError(e)))?;

    Ok(UserRecord {
        id,
        email,
        password_hash,
        role,
        full_name,
    })
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        sqlx::query_as::<_, UserRow>(
            "SELECT id, email, password_hash, role, full_name FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(into_record)
        .transpose()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, AppError> {
        sqlx::query_as::<_, UserRow>(
            "SELECT id, email, password_hash, role, full_name FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(into_record)
        .transpose()
    }

    async fn create_user(&self, user: NewUser) -> Result<UserRecord, AppError> {
        let mut transaction = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (email, password_hash, role, full_name)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, password_hash, role, full_name
            "#,
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.full_name)
        .fetch_one(&mut transaction)
        .await?;

        if let Some(invitation_id) = user.invitation_id {
            let consumed = sqlx::query(
                r#"
                UPDATE admin_invitations
                SET used = true, used_at = NOW()
                WHERE id = $1 AND used = false
                "#,
            )
            .bind(invitation_id)
            .execute(&mut transaction)
            .await?;

            if consumed.rows_affected() != 1 {
                transaction.rollback().await?;
                // Consumed by a concurrent registration since it was read
                return Err(ValidationError::InvalidFormat("invitation token".to_string()).into());
            }
        }

        transaction.commit().await?;
        into_record(row)
    }

    async fn update_password_hash(&self, id: i64, password_hash: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_invitation(&self, token: &str) -> Result<Option<Invitation>, AppError> {
        let row = sqlx::query_as::<_, (i64, String, String)>(
            r#"
            SELECT id, email, role
            FROM admin_invitations
            WHERE token = $1 AND used = false AND expires_at > NOW()
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(id, email, role)| {
            let role = role
                .parse::<Role>()
                .map_err(|e| AppError::Database(DatabaseError::UnexpectedError(e)))?;
            Ok(Invitation { id, email, role })
        })
        .transpose()
    }
}
