use crate::error::AppResult;
use crate::orm::{Db, Model};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Contact details shown on a user's listings.
#[derive(Clone, Debug, Default, Serialize, FromRow)]
pub struct Profile {
    pub id: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Model for Profile {
    fn table_name() -> &'static str {
        "profiles"
    }

    fn create_table_sql() -> String {
        "CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY REFERENCES accounts(id) ON DELETE CASCADE,
            full_name TEXT,
            phone TEXT,
            email TEXT,
            created_at TEXT
        )"
        .to_string()
    }

    fn columns() -> Vec<(String, String)> {
        vec![
            ("id".into(), "TEXT".into()),
            ("full_name".into(), "TEXT".into()),
            ("phone".into(), "TEXT".into()),
            ("email".into(), "TEXT".into()),
            ("created_at".into(), "TEXT".into()),
        ]
    }
}

crate::register_model!(Profile);

/// Keep only the digits of a phone number.
pub fn sanitize_phone(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

impl Profile {
    pub async fn find(db: &Db, id: &str) -> AppResult<Option<Profile>> {
        Ok(sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = ?")
            .bind(id)
            .fetch_optional(db.pool())
            .await?)
    }

    /// Insert the profile, or fill in the given fields on an existing one.
    pub async fn upsert(
        db: &Db,
        id: &str,
        full_name: Option<&str>,
        email: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO profiles (id, full_name, email, created_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
             full_name = COALESCE(excluded.full_name, profiles.full_name), \
             email = COALESCE(excluded.email, profiles.email)",
        )
        .bind(id)
        .bind(full_name)
        .bind(email)
        .bind(Utc::now())
        .execute(db.pool())
        .await?;
        Ok(())
    }

    /// Update name and phone from the settings tab. The stored phone is digits only.
    pub async fn update_contact(db: &Db, id: &str, full_name: &str, phone: &str) -> AppResult<Profile> {
        let phone = sanitize_phone(phone);
        Self::upsert(db, id, None, None).await?;
        sqlx::query("UPDATE profiles SET full_name = ?, phone = ? WHERE id = ?")
            .bind(full_name.trim())
            .bind(&phone)
            .bind(id)
            .execute(db.pool())
            .await?;
        log::info!("Updated profile {}", id);
        Ok(Self::find(db, id).await?.unwrap_or_default())
    }

    pub fn display_name(&self) -> Option<&str> {
        self.full_name.as_deref().filter(|n| !n.trim().is_empty())
    }
}
