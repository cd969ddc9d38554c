//! Email + password accounts and cookie sessions.
use crate::error::{AppError, AppResult};
use crate::models::profile::Profile;
use crate::orm::{Db, Model};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "adopta_session";
pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// The authenticated user attached to a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, FromRow)]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
}

#[derive(Clone, Debug, FromRow)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Model for Account {
    fn table_name() -> &'static str {
        "accounts"
    }

    fn create_table_sql() -> String {
        "CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        )"
        .to_string()
    }

    fn columns() -> Vec<(String, String)> {
        vec![
            ("id".into(), "TEXT".into()),
            ("email".into(), "TEXT".into()),
            ("password_hash".into(), "TEXT".into()),
            ("created_at".into(), "TEXT".into()),
        ]
    }
}

crate::register_model!(Account);

pub struct Session;

impl Model for Session {
    fn table_name() -> &'static str {
        "sessions"
    }

    fn create_table_sql() -> String {
        "CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL
        )"
        .to_string()
    }

    fn columns() -> Vec<(String, String)> {
        vec![
            ("token".into(), "TEXT".into()),
            ("account_id".into(), "TEXT".into()),
            ("created_at".into(), "TEXT".into()),
        ]
    }
}

crate::register_model!(Session);

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())?;
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::error!("Stored password hash is malformed: {}", e);
            false
        }
    }
}

/// Create an account and its contact profile. Returns the new account id.
pub async fn register(db: &Db, email: &str, password: &str, full_name: &str) -> AppResult<String> {
    let email = normalize_email(email);
    if !EMAIL_RE.is_match(&email) {
        return Err(AppError::Validation("Ingresa un email válido.".into()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "La contraseña debe tener al menos {} caracteres.",
            MIN_PASSWORD_LEN
        )));
    }

    let taken: Option<(String,)> = sqlx::query_as("SELECT id FROM accounts WHERE email = ?")
        .bind(&email)
        .fetch_optional(db.pool())
        .await?;
    if taken.is_some() {
        return Err(AppError::Validation("Ya existe una cuenta con ese email.".into()));
    }

    let id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO accounts (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(&email)
        .bind(hash_password(password)?)
        .bind(Utc::now())
        .execute(db.pool())
        .await?;

    // The account exists even if the profile write fails; the profile can be filled in later.
    let full_name = full_name.trim();
    let name = (!full_name.is_empty()).then_some(full_name);
    if let Err(e) = Profile::upsert(db, &id, name, Some(&email)).await {
        log::error!("Error creating profile for {}: {}", id, e);
    }

    log::info!("Registered account {}", id);
    Ok(id)
}

/// Exchange credentials for a new session token. Sessions older than `ttl` are pruned first.
pub async fn login(db: &Db, email: &str, password: &str, ttl: Duration) -> AppResult<String> {
    let email = normalize_email(email);
    let account: Option<Account> = sqlx::query_as("SELECT * FROM accounts WHERE email = ?")
        .bind(&email)
        .fetch_optional(db.pool())
        .await?;

    let invalid = || AppError::Unauthorized("Email o contraseña incorrectos.".into());
    let account = account.ok_or_else(invalid)?;
    if !verify_password(password, &account.password_hash) {
        return Err(invalid());
    }

    let pruned = sqlx::query("DELETE FROM sessions WHERE julianday(created_at) <= julianday(?)")
        .bind(Utc::now() - ttl)
        .execute(db.pool())
        .await?
        .rows_affected();
    if pruned > 0 {
        log::debug!("Pruned {} expired sessions", pruned);
    }

    let token = Uuid::new_v4().simple().to_string();
    sqlx::query("INSERT INTO sessions (token, account_id, created_at) VALUES (?, ?, ?)")
        .bind(&token)
        .bind(&account.id)
        .bind(Utc::now())
        .execute(db.pool())
        .await?;
    log::info!("Account {} signed in", account.id);
    Ok(token)
}

pub async fn logout(db: &Db, token: &str) -> AppResult<()> {
    sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(db.pool())
        .await?;
    Ok(())
}

/// Resolve a session token. Unknown tokens and sessions older than `ttl` resolve to `None`.
pub async fn current_user(db: &Db, token: &str, ttl: Duration) -> AppResult<Option<CurrentUser>> {
    if token.is_empty() {
        return Ok(None);
    }
    let user = sqlx::query_as::<_, CurrentUser>(
        "SELECT a.id, a.email FROM sessions s JOIN accounts a ON a.id = s.account_id \
         WHERE s.token = ? AND julianday(s.created_at) > julianday(?)",
    )
    .bind(token)
    .bind(Utc::now() - ttl)
    .fetch_optional(db.pool())
    .await?;
    Ok(user)
}

pub fn session_cookie(token: &str, ttl: Duration) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        ttl.num_seconds()
    )
}

pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}
