use crate::error::AppResult;
use crate::orm::{Db, Model};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// A rescue organization. Shelters are seeded by SQL migration files.
#[derive(Clone, Debug, Serialize, FromRow)]
pub struct Shelter {
    pub id: String,
    pub name: String,
    pub description: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl Model for Shelter {
    fn table_name() -> &'static str {
        "shelters"
    }

    fn create_table_sql() -> String {
        "CREATE TABLE IF NOT EXISTS shelters (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            phone TEXT,
            website TEXT,
            address TEXT,
            is_verified BOOLEAN NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )"
        .to_string()
    }

    fn columns() -> Vec<(String, String)> {
        [
            ("id", "TEXT"),
            ("name", "TEXT"),
            ("description", "TEXT"),
            ("phone", "TEXT"),
            ("website", "TEXT"),
            ("address", "TEXT"),
            ("is_verified", "BOOLEAN"),
            ("created_at", "TEXT"),
        ]
        .into_iter()
        .map(|(n, t)| (n.to_string(), t.to_string()))
        .collect()
    }
}

crate::register_model!(Shelter);

impl Shelter {
    /// Verified shelters first, then newest.
    pub async fn list(db: &Db) -> AppResult<Vec<Shelter>> {
        Ok(sqlx::query_as::<_, Shelter>(
            "SELECT * FROM shelters ORDER BY is_verified DESC, created_at DESC, rowid DESC",
        )
        .fetch_all(db.pool())
        .await?)
    }

    pub async fn find(db: &Db, id: &str) -> AppResult<Option<Shelter>> {
        Ok(sqlx::query_as::<_, Shelter>("SELECT * FROM shelters WHERE id = ?")
            .bind(id)
            .fetch_optional(db.pool())
            .await?)
    }
}
