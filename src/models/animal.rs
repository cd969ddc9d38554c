use crate::error::{AppError, AppResult};
use crate::geo::MapPin;
use crate::orm::{Db, Model};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use std::fmt;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Species {
    Dog,
    Cat,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Size {
    Small,
    Medium,
    Large,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AnimalStatus {
    Adoptable,
    Adopted,
    Reserved,
    Lost,
    Found,
}

impl Species {
    pub const ALL: [Species; 3] = [Species::Dog, Species::Cat, Species::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            Species::Dog => "dog",
            Species::Cat => "cat",
            Species::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s.trim())
    }

    pub fn label(&self) -> &'static str {
        match self {
            Species::Dog => "Perro",
            Species::Cat => "Gato",
            Species::Other => "Otro",
        }
    }
}

impl Sex {
    pub const ALL: [Sex; 3] = [Sex::Male, Sex::Female, Sex::Unknown];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
            Sex::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s.trim())
    }

    pub fn label(&self) -> &'static str {
        match self {
            Sex::Male => "Macho",
            Sex::Female => "Hembra",
            Sex::Unknown => "Desconocido",
        }
    }
}

impl Size {
    pub const ALL: [Size; 3] = [Size::Small, Size::Medium, Size::Large];

    pub fn as_str(&self) -> &'static str {
        match self {
            Size::Small => "small",
            Size::Medium => "medium",
            Size::Large => "large",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s.trim())
    }

    pub fn label(&self) -> &'static str {
        match self {
            Size::Small => "Pequeño",
            Size::Medium => "Mediano",
            Size::Large => "Grande",
        }
    }
}

impl AnimalStatus {
    pub const ALL: [AnimalStatus; 5] = [
        AnimalStatus::Adoptable,
        AnimalStatus::Adopted,
        AnimalStatus::Reserved,
        AnimalStatus::Lost,
        AnimalStatus::Found,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnimalStatus::Adoptable => "adoptable",
            AnimalStatus::Adopted => "adopted",
            AnimalStatus::Reserved => "reserved",
            AnimalStatus::Lost => "lost",
            AnimalStatus::Found => "found",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s.trim())
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnimalStatus::Adoptable => "En Adopción",
            AnimalStatus::Adopted => "Adoptado",
            AnimalStatus::Reserved => "Reservado",
            AnimalStatus::Lost => "Perdido",
            AnimalStatus::Found => "Encontrado",
        }
    }

    /// The one-click follow-up offered on the owner's dashboard.
    pub fn next_resolution(&self) -> Option<AnimalStatus> {
        match self {
            AnimalStatus::Adoptable => Some(AnimalStatus::Adopted),
            AnimalStatus::Lost => Some(AnimalStatus::Found),
            _ => None,
        }
    }
}

impl fmt::Display for AnimalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Photo URLs, stored as a JSON array in a TEXT column.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Photos(pub Vec<String>);

impl Photos {
    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_string())
    }
}

impl TryFrom<String> for Photos {
    type Error = serde_json::Error;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        if raw.trim().is_empty() {
            return Ok(Photos::default());
        }
        serde_json::from_str(&raw).map(Photos)
    }
}

#[derive(Clone, Debug, Serialize, FromRow)]
pub struct Animal {
    pub id: String,
    pub name: String,
    pub species: Species,
    pub breed: String,
    pub sex: Sex,
    pub age_approx: String,
    pub size: Option<Size>,
    pub description: String,
    pub medical_notes: String,
    #[sqlx(try_from = "String")]
    pub photos: Photos,
    pub status: AnimalStatus,
    pub last_seen_lat: Option<f64>,
    pub last_seen_long: Option<f64>,
    pub owner_id: Option<String>,
    pub shelter_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Grid card: the columns listing pages show, plus the shelter's name.
#[derive(Clone, Debug, Serialize, FromRow)]
pub struct AnimalCard {
    pub id: String,
    pub name: String,
    pub breed: String,
    pub species: Species,
    pub sex: Sex,
    pub size: Option<Size>,
    pub age_approx: String,
    pub status: AnimalStatus,
    #[sqlx(try_from = "String")]
    pub photos: Photos,
    pub shelter_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Detail page row: the animal and its shelter contact fields.
#[derive(Clone, Debug, Serialize, FromRow)]
pub struct AnimalDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub animal: Animal,
    pub shelter_name: Option<String>,
    pub shelter_phone: Option<String>,
    pub shelter_website: Option<String>,
    pub shelter_address: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewAnimal {
    pub name: String,
    pub species: Species,
    pub breed: String,
    pub sex: Sex,
    pub age_approx: String,
    pub size: Option<Size>,
    pub description: String,
    pub medical_notes: String,
    pub photos: Photos,
    pub status: AnimalStatus,
    pub last_seen: Option<(f64, f64)>,
    pub owner_id: Option<String>,
    pub shelter_id: Option<String>,
}

/// A partial update. `None` leaves the stored value untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnimalUpdate {
    pub name: Option<String>,
    pub species: Option<Species>,
    pub breed: Option<String>,
    pub sex: Option<Sex>,
    pub age_approx: Option<String>,
    pub size: Option<Size>,
    pub description: Option<String>,
    pub medical_notes: Option<String>,
    pub photos: Option<Photos>,
    pub status: Option<AnimalStatus>,
    pub last_seen: Option<(f64, f64)>,
}

impl AnimalUpdate {
    pub fn is_empty(&self) -> bool {
        *self == AnimalUpdate::default()
    }
}

impl Model for Animal {
    fn table_name() -> &'static str {
        "animals"
    }

    fn create_table_sql() -> String {
        "CREATE TABLE IF NOT EXISTS animals (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            species TEXT NOT NULL DEFAULT 'dog',
            breed TEXT NOT NULL DEFAULT '',
            sex TEXT NOT NULL DEFAULT 'unknown',
            age_approx TEXT NOT NULL DEFAULT '',
            size TEXT,
            description TEXT NOT NULL DEFAULT '',
            medical_notes TEXT NOT NULL DEFAULT '',
            photos TEXT NOT NULL DEFAULT '[]',
            status TEXT NOT NULL DEFAULT 'adoptable',
            last_seen_lat REAL,
            last_seen_long REAL,
            owner_id TEXT REFERENCES accounts(id) ON DELETE SET NULL,
            shelter_id TEXT REFERENCES shelters(id) ON DELETE SET NULL,
            created_at TEXT NOT NULL
        )"
        .to_string()
    }

    fn columns() -> Vec<(String, String)> {
        [
            ("id", "TEXT"),
            ("name", "TEXT"),
            ("species", "TEXT"),
            ("breed", "TEXT"),
            ("sex", "TEXT"),
            ("age_approx", "TEXT"),
            ("size", "TEXT"),
            ("description", "TEXT"),
            ("medical_notes", "TEXT"),
            ("photos", "TEXT"),
            ("status", "TEXT"),
            ("last_seen_lat", "REAL"),
            ("last_seen_long", "REAL"),
            ("owner_id", "TEXT"),
            ("shelter_id", "TEXT"),
            ("created_at", "TEXT"),
        ]
        .into_iter()
        .map(|(n, t)| (n.to_string(), t.to_string()))
        .collect()
    }
}

crate::register_model!(Animal);

pub(crate) const CARD_SELECT: &str = "SELECT a.id, a.name, a.breed, a.species, a.sex, a.size, \
     a.age_approx, a.status, a.photos, a.created_at, s.name AS shelter_name \
     FROM animals a LEFT JOIN shelters s ON s.id = a.shelter_id";

pub(crate) const NEWEST_FIRST: &str = " ORDER BY a.created_at DESC, a.rowid DESC";

impl Animal {
    pub async fn create(db: &Db, new: &NewAnimal) -> AppResult<Animal> {
        let id = Uuid::new_v4().to_string();
        let (lat, lng) = new.last_seen.unzip();
        sqlx::query(
            "INSERT INTO animals (id, name, species, breed, sex, age_approx, size, description, \
             medical_notes, photos, status, last_seen_lat, last_seen_long, owner_id, shelter_id, \
             created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&new.name)
        .bind(new.species)
        .bind(&new.breed)
        .bind(new.sex)
        .bind(&new.age_approx)
        .bind(new.size)
        .bind(&new.description)
        .bind(&new.medical_notes)
        .bind(new.photos.to_json())
        .bind(new.status)
        .bind(lat)
        .bind(lng)
        .bind(&new.owner_id)
        .bind(&new.shelter_id)
        .bind(Utc::now())
        .execute(db.pool())
        .await?;
        log::info!("Created {} listing {} ({})", new.status, id, new.name);
        Self::get(db, &id).await
    }

    pub async fn find(db: &Db, id: &str) -> AppResult<Option<Animal>> {
        Ok(sqlx::query_as::<_, Animal>("SELECT * FROM animals WHERE id = ?")
            .bind(id)
            .fetch_optional(db.pool())
            .await?)
    }

    pub async fn get(db: &Db, id: &str) -> AppResult<Animal> {
        Self::find(db, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("animal {}", id)))
    }

    pub async fn find_detail(db: &Db, id: &str) -> AppResult<Option<AnimalDetail>> {
        Ok(sqlx::query_as::<_, AnimalDetail>(
            "SELECT a.*, s.name AS shelter_name, s.phone AS shelter_phone, \
             s.website AS shelter_website, s.address AS shelter_address \
             FROM animals a LEFT JOIN shelters s ON s.id = a.shelter_id WHERE a.id = ?",
        )
        .bind(id)
        .fetch_optional(db.pool())
        .await?)
    }

    /// Load a listing and check that `user_id` owns it.
    pub async fn get_owned(db: &Db, id: &str, user_id: &str) -> AppResult<Animal> {
        let animal = Self::get(db, id).await?;
        if animal.owner_id.as_deref() != Some(user_id) {
            log::warn!("User {} tried to modify listing {} they do not own", user_id, id);
            return Err(AppError::Forbidden(
                "No tienes permiso para editar esta publicación.".into(),
            ));
        }
        Ok(animal)
    }

    /// Apply a partial update on behalf of the owner.
    pub async fn update(
        db: &Db,
        id: &str,
        user_id: &str,
        changes: &AnimalUpdate,
    ) -> AppResult<Animal> {
        let current = Self::get_owned(db, id, user_id).await?;
        if changes.is_empty() {
            return Ok(current);
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE animals SET ");
        {
            let mut set = qb.separated(", ");
            if let Some(v) = &changes.name {
                set.push("name = ").push_bind_unseparated(v.clone());
            }
            if let Some(v) = changes.species {
                set.push("species = ").push_bind_unseparated(v);
            }
            if let Some(v) = &changes.breed {
                set.push("breed = ").push_bind_unseparated(v.clone());
            }
            if let Some(v) = changes.sex {
                set.push("sex = ").push_bind_unseparated(v);
            }
            if let Some(v) = &changes.age_approx {
                set.push("age_approx = ").push_bind_unseparated(v.clone());
            }
            if let Some(v) = changes.size {
                set.push("size = ").push_bind_unseparated(v);
            }
            if let Some(v) = &changes.description {
                set.push("description = ").push_bind_unseparated(v.clone());
            }
            if let Some(v) = &changes.medical_notes {
                set.push("medical_notes = ").push_bind_unseparated(v.clone());
            }
            if let Some(v) = &changes.photos {
                set.push("photos = ").push_bind_unseparated(v.to_json());
            }
            if let Some(v) = changes.status {
                set.push("status = ").push_bind_unseparated(v);
            }
            if let Some((lat, lng)) = changes.last_seen {
                set.push("last_seen_lat = ").push_bind_unseparated(lat);
                set.push("last_seen_long = ").push_bind_unseparated(lng);
            }
        }
        qb.push(" WHERE id = ").push_bind(id.to_string());
        qb.build().execute(db.pool()).await?;

        log::info!("Updated listing {}", id);
        Self::get(db, id).await
    }

    pub async fn set_status(
        db: &Db,
        id: &str,
        user_id: &str,
        status: AnimalStatus,
    ) -> AppResult<Animal> {
        let changes = AnimalUpdate {
            status: Some(status),
            ..Default::default()
        };
        Self::update(db, id, user_id, &changes).await
    }

    pub async fn delete(db: &Db, id: &str, user_id: &str) -> AppResult<()> {
        Self::get_owned(db, id, user_id).await?;
        sqlx::query("DELETE FROM animals WHERE id = ?")
            .bind(id)
            .execute(db.pool())
            .await?;
        log::info!("Deleted listing {}", id);
        Ok(())
    }

    pub async fn list_by_owner(db: &Db, owner_id: &str) -> AppResult<Vec<AnimalCard>> {
        Ok(sqlx::query_as::<_, AnimalCard>(&format!(
            "{} WHERE a.owner_id = ?{}",
            CARD_SELECT, NEWEST_FIRST
        ))
        .bind(owner_id)
        .fetch_all(db.pool())
        .await?)
    }

    pub async fn list_by_status(db: &Db, status: AnimalStatus) -> AppResult<Vec<AnimalCard>> {
        Ok(sqlx::query_as::<_, AnimalCard>(&format!(
            "{} WHERE a.status = ?{}",
            CARD_SELECT, NEWEST_FIRST
        ))
        .bind(status)
        .fetch_all(db.pool())
        .await?)
    }

    /// Adoptable animals listed by a shelter.
    pub async fn list_for_shelter(db: &Db, shelter_id: &str) -> AppResult<Vec<AnimalCard>> {
        Ok(sqlx::query_as::<_, AnimalCard>(&format!(
            "{} WHERE a.shelter_id = ? AND a.status = ?{}",
            CARD_SELECT, NEWEST_FIRST
        ))
        .bind(shelter_id)
        .bind(AnimalStatus::Adoptable)
        .fetch_all(db.pool())
        .await?)
    }

    /// The newest adoptable animals, for the landing page.
    pub async fn featured(db: &Db, limit: u32) -> AppResult<Vec<AnimalCard>> {
        Ok(sqlx::query_as::<_, AnimalCard>(&format!(
            "{} WHERE a.status = ?{} LIMIT ?",
            CARD_SELECT, NEWEST_FIRST
        ))
        .bind(AnimalStatus::Adoptable)
        .bind(i64::from(limit))
        .fetch_all(db.pool())
        .await?)
    }

    /// Lost and found animals that have both coordinates.
    pub async fn map_pins(db: &Db) -> AppResult<Vec<MapPin>> {
        let rows = sqlx::query_as::<_, Animal>(
            "SELECT * FROM animals WHERE status IN (?, ?) \
             AND last_seen_lat IS NOT NULL AND last_seen_long IS NOT NULL \
             ORDER BY created_at DESC, rowid DESC",
        )
        .bind(AnimalStatus::Lost)
        .bind(AnimalStatus::Found)
        .fetch_all(db.pool())
        .await?;
        Ok(rows.iter().filter_map(MapPin::from_animal).collect())
    }
}

static YEARS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*año").unwrap());
static MONTHS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*mes").unwrap());

pub const UNKNOWN_AGE: &str = "Desconocida";

/// Human age text, e.g. `2 años, 1 mes`. Empty when both parts are zero.
pub fn format_age(years: u32, months: u32) -> String {
    let mut parts = Vec::new();
    if years > 0 {
        parts.push(format!("{} año{}", years, if years > 1 { "s" } else { "" }));
    }
    if months > 0 {
        parts.push(format!("{} mes{}", months, if months > 1 { "es" } else { "" }));
    }
    parts.join(", ")
}

/// Recover `(years, months)` from age text written by `format_age`.
pub fn parse_age(text: &str) -> (u32, u32) {
    let grab = |re: &Regex| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    (grab(&YEARS_RE), grab(&MONTHS_RE))
}
