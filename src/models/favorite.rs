use crate::error::AppResult;
use crate::models::animal::{AnimalCard, CARD_SELECT};
use crate::orm::{Db, Model};
use chrono::Utc;
use uuid::Uuid;

/// A user-to-animal bookmark.
pub struct Favorite;

impl Model for Favorite {
    fn table_name() -> &'static str {
        "favorites"
    }

    fn create_table_sql() -> String {
        "CREATE TABLE IF NOT EXISTS favorites (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
            animal_id TEXT NOT NULL REFERENCES animals(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            UNIQUE(user_id, animal_id)
        )"
        .to_string()
    }

    fn columns() -> Vec<(String, String)> {
        vec![
            ("id".into(), "TEXT".into()),
            ("user_id".into(), "TEXT".into()),
            ("animal_id".into(), "TEXT".into()),
            ("created_at".into(), "TEXT".into()),
        ]
    }
}

crate::register_model!(Favorite);

impl Favorite {
    pub async fn is_favorite(db: &Db, user_id: &str, animal_id: &str) -> AppResult<bool> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT id FROM favorites WHERE user_id = ? AND animal_id = ?")
                .bind(user_id)
                .bind(animal_id)
                .fetch_optional(db.pool())
                .await?;
        Ok(row.is_some())
    }

    pub async fn add(db: &Db, user_id: &str, animal_id: &str) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO favorites (id, user_id, animal_id, created_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(user_id, animal_id) DO NOTHING",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(animal_id)
        .bind(Utc::now())
        .execute(db.pool())
        .await?;
        Ok(())
    }

    pub async fn remove(db: &Db, user_id: &str, animal_id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM favorites WHERE user_id = ? AND animal_id = ?")
            .bind(user_id)
            .bind(animal_id)
            .execute(db.pool())
            .await?;
        Ok(())
    }

    /// Flip the bookmark and return whether the animal is now a favorite.
    pub async fn toggle(db: &Db, user_id: &str, animal_id: &str) -> AppResult<bool> {
        if Self::is_favorite(db, user_id, animal_id).await? {
            Self::remove(db, user_id, animal_id).await?;
            Ok(false)
        } else {
            Self::add(db, user_id, animal_id).await?;
            Ok(true)
        }
    }

    pub async fn list_animals_for_user(db: &Db, user_id: &str) -> AppResult<Vec<AnimalCard>> {
        Ok(sqlx::query_as::<_, AnimalCard>(&format!(
            "{} JOIN favorites f ON f.animal_id = a.id WHERE f.user_id = ? \
             ORDER BY f.created_at DESC, f.rowid DESC",
            CARD_SELECT
        ))
        .bind(user_id)
        .fetch_all(db.pool())
        .await?)
    }
}
