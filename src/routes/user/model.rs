use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{FieldErrors, NON_FIELD_ERRORS};
use crate::utils::{hash_password, verify_password};

const USERNAME_MAX_LEN: usize = 150;
const REAL_NAME_MAX_LEN: usize = 30;
const PASSWORD_MIN_LEN: usize = 8;

pub const USERNAME_TAKEN: &str = "해당 사용자 이름은 이미 존재합니다.";

// Rejected outright regardless of length.
const COMMON_PASSWORDS: &[&str] = &[
    "password", "password1", "password123", "12345678", "123456789", "1234567890",
    "qwerty123", "qwertyuiop", "iloveyou", "sunshine", "princess", "football",
    "baseball", "welcome1", "abc12345", "11111111", "00000000", "letmein1",
    "passw0rd", "admin123", "trustno1", "superman", "asdfghjkl",
];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub real_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// The authenticated caller, resolved from the session cookie by the auth
/// middleware and handed to handlers as a request extension.
#[derive(Debug, Clone, FromRow)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub real_name: String,
    pub session_id: Uuid,
}

#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub real_name: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterFormView {
    pub fields: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct LoginFormView {
    pub fields: Vec<&'static str>,
    pub next: Option<String>,
}

/// Register input that passed every check that needs no database access.
#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub real_name: String,
    pub password: String,
}

fn validate_username(username: &str, errors: &mut FieldErrors) {
    if username.is_empty() {
        errors.add("username", "이 필드는 필수 항목입니다.");
        return;
    }
    if username.chars().count() > USERNAME_MAX_LEN {
        errors.add("username", format!("사용자 이름은 {}자 이하여야 합니다.", USERNAME_MAX_LEN));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        errors.add(
            "username",
            "사용자 이름은 문자, 숫자, @/./+/-/_ 만 사용할 수 있습니다.",
        );
    }
}

/// Strength rules applied to a new password.
pub fn password_policy_errors(password: &str, username: &str) -> Vec<&'static str> {
    let mut problems = Vec::new();
    if password.chars().count() < PASSWORD_MIN_LEN {
        problems.push("비밀번호가 너무 짧습니다. 최소 8 문자를 포함해야 합니다.");
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("비밀번호가 전부 숫자로 되어 있습니다.");
    }
    if COMMON_PASSWORDS.contains(&password.to_lowercase().as_str()) {
        problems.push("비밀번호가 너무 일상적인 단어입니다.");
    }
    let lowered_password = password.to_lowercase();
    let lowered_username = username.to_lowercase();
    if lowered_username.chars().count() >= 3
        && (lowered_password.contains(&lowered_username)
            || (!lowered_password.is_empty() && lowered_username.contains(&lowered_password)))
    {
        problems.push("비밀번호가 사용자 이름과 너무 유사합니다.");
    }
    problems
}

impl RegisterForm {
    pub fn trimmed_username(&self) -> &str {
        self.username.trim()
    }

    /// Check every field in one pass. `username_taken` comes from the user
    /// store and is reported alongside any other field errors.
    pub fn validate(self, username_taken: bool) -> Result<NewUser, FieldErrors> {
        let mut errors = FieldErrors::new();
        let username = self.username.trim().to_string();
        let real_name = self.real_name.trim().to_string();

        validate_username(&username, &mut errors);
        if username_taken && !errors.contains("username") {
            errors.add("username", USERNAME_TAKEN);
        }

        if real_name.is_empty() {
            errors.add("real_name", "이 필드는 필수 항목입니다.");
        } else if real_name.chars().count() > REAL_NAME_MAX_LEN {
            errors.add("real_name", format!("실명은 {}자 이하여야 합니다.", REAL_NAME_MAX_LEN));
        }

        if self.password1.is_empty() {
            errors.add("password1", "이 필드는 필수 항목입니다.");
        }
        if self.password2.is_empty() {
            errors.add("password2", "이 필드는 필수 항목입니다.");
        } else if self.password1 != self.password2 {
            errors.add("password2", "비밀번호가 일치하지 않습니다.");
        } else {
            for problem in password_policy_errors(&self.password1, &username) {
                errors.add("password2", problem);
            }
        }

        errors.into_result(NewUser {
            username,
            real_name,
            password: self.password1,
        })
    }
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.username.trim().is_empty() {
            errors.add("username", "이 필드는 필수 항목입니다.");
        }
        if self.password.is_empty() {
            errors.add("password", "이 필드는 필수 항목입니다.");
        }
        errors.into_result(())
    }
}

pub fn invalid_credentials() -> FieldErrors {
    FieldErrors::single(
        NON_FIELD_ERRORS,
        "올바른 사용자 이름과 비밀번호를 입력하십시오. 두 필드 모두 대문자와 소문자를 구별합니다.",
    )
}

/// Only same-site absolute paths are honored as post-login targets.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(char::is_control) =>
        {
            path
        }
        _ => "/",
    }
}

const USER_COLUMNS: &str = "id, username, real_name, password_hash, created_at";

impl User {
    pub async fn create(pool: &PgPool, new_user: &NewUser, cost: u32) -> Result<Self, sqlx::Error> {
        let password_hash = hash_password(&new_user.password, cost)
            .map_err(|e| sqlx::Error::Protocol(format!("Failed to hash password: {}", e)))?;

        let query = format!(
            "INSERT INTO users (username, real_name, password_hash)
             VALUES ($1, $2, $3)
             RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(&new_user.username)
            .bind(&new_user.real_name)
            .bind(&password_hash)
            .fetch_one(pool)
            .await?;

        tracing::info!(user_id = user.id, username = %user.username, "Registered user");
        Ok(user)
    }

    pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    pub async fn username_taken(pool: &PgPool, username: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
            .bind(username)
            .fetch_one(pool)
            .await
    }

    pub fn verify_login(&self, password: &str) -> Result<bool, bcrypt::BcryptError> {
        verify_password(password, &self.password_hash)
    }

    /// Remove a user and everything hanging off it, children first, in one
    /// transaction. Returns false when no such user exists.
    pub async fn delete(pool: &PgPool, user_id: i64) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        // likes and comments, both the user's own and those on the user's records
        sqlx::query(
            "DELETE FROM likes
             WHERE user_id = $1
                OR record_id IN (SELECT id FROM worship_records WHERE user_id = $1)",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "DELETE FROM comments
             WHERE user_id = $1
                OR record_id IN (SELECT id FROM worship_records WHERE user_id = $1)",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM worship_records WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        if deleted > 0 {
            tracing::info!(user_id, "Deleted user with all records, comments and likes");
        }
        Ok(deleted > 0)
    }
}

impl Session {
    pub async fn create(
        pool: &PgPool,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Session>(
            "INSERT INTO sessions (id, user_id, expires_at)
             VALUES ($1, $2, $3)
             RETURNING id, user_id, created_at, expires_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(pool)
        .await
    }

    /// The user behind a live session, if the session exists, belongs to
    /// `user_id` and has not expired.
    pub async fn find_active_user(
        pool: &PgPool,
        session_id: Uuid,
        user_id: i64,
    ) -> Result<Option<CurrentUser>, sqlx::Error> {
        sqlx::query_as::<_, CurrentUser>(
            "SELECT u.id, u.username, u.real_name, s.id AS session_id
             FROM sessions s
             JOIN users u ON u.id = s.user_id
             WHERE s.id = $1 AND s.user_id = $2 AND s.expires_at > NOW()",
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, session_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(session_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
