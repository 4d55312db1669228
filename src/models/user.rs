use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::{Field, FieldKind, Resource};
use crate::auth::{
    hash_password, hash_password_blocking, password_violations, validate_new_password,
    verify_password, ResetToken,
};
use crate::error::{AppError, Violations};
use crate::validators::{is_valid_email, is_valid_name};

pub const DEFAULT_PHOTO: &str = "default.jpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    User,
    Guide,
    LeadGuide,
    Admin,
}

impl Role {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Role::User),
            "guide" => Some(Role::Guide),
            "lead-guide" => Some(Role::LeadGuide),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Guide => "guide",
            Role::LeadGuide => "lead-guide",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: String,
    pub role: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub password_changed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_expires: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub active: bool,
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
}

/// Signup body. Only these fields are ever honored, so a role cannot be
/// self-assigned.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

/// Profile update; never touches the password
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub photo: Option<String>,
    pub role: Option<String>,
}

impl User {
    pub fn role(&self) -> Role {
        Role::parse(&self.role).unwrap_or(Role::User)
    }

    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }

    pub fn correct_password(&self, candidate: &str) -> Result<bool, AppError> {
        verify_password(candidate, &self.password_hash)
    }

    /// True when the password changed after a token issued at `jwt_iat`
    pub fn changed_password_after(&self, jwt_iat: i64) -> bool {
        match self.password_changed_at {
            Some(changed_at) => jwt_iat < changed_at.timestamp(),
            None => false,
        }
    }

    /// Mint a reset token, storing its hash on the user. Returns the
    /// plaintext token to send by email.
    pub fn create_password_reset_token(&mut self) -> String {
        let token = ResetToken::generate();
        self.password_reset_token = Some(token.hash);
        self.password_reset_expires = Some(token.expires_at);
        token.plain
    }

    pub fn clear_password_reset_token(&mut self) {
        self.password_reset_token = None;
        self.password_reset_expires = None;
    }

    /// Replace the password of an existing user
    ///
    /// The change timestamp is backdated one second so that a token issued
    /// right after the change is still accepted.
    pub fn set_password(&mut self, password: &str, confirm: &str) -> Result<(), AppError> {
        validate_new_password(password, confirm)?;

        self.password_hash = hash_password(password)?;
        self.password_changed_at = Some(Utc::now() - Duration::seconds(1));
        self.clear_password_reset_token();
        Ok(())
    }

    fn profile_violations(&self, violations: &mut Violations) {
        if let Err(e) = is_valid_name(&self.name) {
            violations.push(e.to_string());
        }
        if let Err(e) = is_valid_email(&self.email) {
            violations.push(e.to_string());
        }
        violations.check(
            Role::parse(&self.role).is_some(),
            "Role must be user, guide, lead-guide or admin",
        );
    }

    fn validate(&self) -> Result<(), AppError> {
        let mut violations = Violations::new();
        self.profile_violations(&mut violations);
        violations.into_result()
    }

    /// Validate, hash the password and insert. Signup always passes
    /// `Role::User`; other roles only come from seeding.
    pub async fn create(
        pool: &PgPool,
        id: Uuid,
        input: SignupInput,
        role: Role,
        photo: Option<String>,
    ) -> Result<User, AppError> {
        let password = input.password.unwrap_or_default();
        let confirm = input.password_confirm.unwrap_or_default();

        let mut user = User {
            id,
            name: input.name.unwrap_or_default().trim().to_string(),
            email: input.email.unwrap_or_default().trim().to_lowercase(),
            photo: photo.unwrap_or_else(|| DEFAULT_PHOTO.to_string()),
            role: role.as_str().to_string(),
            password_hash: String::new(),
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            active: true,
            created_at: Utc::now(),
        };

        let mut violations = Violations::new();
        user.profile_violations(&mut violations);
        password_violations(&mut violations, &password, &confirm);
        violations.into_result()?;

        user.password_hash = hash_password_blocking(password).await?;

        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, photo, role, password_hash, active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.photo)
        .bind(&user.role)
        .bind(&user.password_hash)
        .bind(user.active)
        .bind(user.created_at)
        .fetch_one(pool)
        .await?;

        tracing::info!(user_id = %created.id, role = %created.role, "User created");
        Ok(created)
    }

    /// Active user by email
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT users.* FROM users WHERE users.active = true AND users.email = $1",
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await?;
        Ok(user)
    }

    /// Active user holding an unexpired reset token with this hash
    pub async fn find_by_reset_token(
        pool: &PgPool,
        token_hash: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT users.* FROM users
            WHERE users.active = true
              AND users.password_reset_token = $1
              AND users.password_reset_expires > $2
            "#,
        )
        .bind(token_hash)
        .bind(Utc::now())
        .fetch_optional(pool)
        .await?;
        Ok(user)
    }

    /// Soft delete: the user disappears from every query
    pub async fn deactivate(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET active = false WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Resource for User {
    type Create = SignupInput;
    type Patch = UserPatch;

    const TABLE: &'static str = "users";
    const SELECT: &'static str = "SELECT users.* FROM users";
    const BASE_FILTER: Option<&'static str> = Some("users.active = true");
    const FIELDS: &'static [Field] = &[
        Field::new("id", "users.id", FieldKind::Uuid),
        Field::new("name", "users.name", FieldKind::Text),
        Field::new("email", "users.email", FieldKind::Text),
        Field::new("role", "users.role", FieldKind::Text),
        Field::new("createdAt", "users.created_at", FieldKind::Timestamp),
    ];
    const SINGULAR: &'static str = "user";
    const PLURAL: &'static str = "users";

    fn id(&self) -> Uuid {
        self.id
    }

    async fn insert(pool: &PgPool, input: SignupInput) -> Result<Self, AppError> {
        User::create(pool, Uuid::new_v4(), input, Role::User, None).await
    }

    fn apply(&mut self, patch: UserPatch) -> Result<(), AppError> {
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(email) = patch.email {
            self.email = email.trim().to_lowercase();
        }
        if let Some(photo) = patch.photo {
            self.photo = photo;
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        self.validate()
    }

    async fn save(&self, pool: &PgPool) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE users
            SET name = $2, email = $3, photo = $4, role = $5, password_hash = $6,
                password_changed_at = $7, password_reset_token = $8,
                password_reset_expires = $9, active = $10
            WHERE id = $1
            "#,
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.email)
        .bind(&self.photo)
        .bind(&self.role)
        .bind(&self.password_hash)
        .bind(self.password_changed_at)
        .bind(&self.password_reset_token)
        .bind(self.password_reset_expires)
        .bind(self.active)
        .execute(pool)
        .await?;
        Ok(())
    }
}
