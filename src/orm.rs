//! Async store layer for Adopta (sqlite + sqlx)
//!
//! Usage:
//! let db = Db::connect("sqlite::memory:").await?;
//! auto_migrate(Arc::new(db.clone())).await?;
//! sqlx::query_as::<_, Animal>("SELECT ...").fetch_all(db.pool()).await?
pub use futures::future::BoxFuture;
use log::{debug, info};
use sha2::{Digest, Sha256};
pub use sqlx::FromRow;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Executor, SqlitePool};
use std::fs;
use std::str::FromStr;
use std::sync::Arc;
use walkdir::WalkDir;

const META_TABLE: &str = "__adopta_migrations";

/// An async database pool wrapper.
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

/// A registered schema migration for one model.
pub struct Migration(pub MigrationFn);

impl std::ops::Deref for Migration {
    type Target = MigrationFn;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Migration function pointer for a model.
pub type MigrationFn = fn(Arc<Db>) -> BoxFuture<'static, Result<(), sqlx::Error>>;

inventory::collect!(Migration);

/// Registers a `Model` implementation with `auto_migrate`.
#[macro_export]
macro_rules! register_model {
    ($model:ty) => {
        inventory::submit! {
            $crate::orm::Migration(|db| Box::pin(<$model as $crate::orm::Model>::migrate(db)))
        }
    };
}

#[async_trait::async_trait]
pub trait Model: Send + Sync {
    fn table_name() -> &'static str;
    fn create_table_sql() -> String;
    fn columns() -> Vec<(String, String)>;

    async fn migrate(db: Arc<Db>) -> Result<(), sqlx::Error> {
        let table_name = Self::table_name();
        let create_sql = Self::create_table_sql();
        let schema_hash = hash(&create_sql);

        ensure_meta_table(&db).await?;

        let row: Option<(String,)> =
            sqlx::query_as(&format!("SELECT hash FROM {} WHERE table_name = ?", META_TABLE))
                .bind(table_name)
                .fetch_optional(db.pool())
                .await?;

        let Some((applied_hash,)) = row else {
            db.execute(&create_sql).await?;
            sqlx::query(&format!(
                "INSERT INTO {} (table_name, schema_sql, hash) VALUES (?, ?, ?)",
                META_TABLE
            ))
            .bind(table_name)
            .bind(&create_sql)
            .bind(&schema_hash)
            .execute(db.pool())
            .await?;
            info!("Migrated `{}` (table created, initial schema applied).", table_name);
            return Ok(());
        };

        if applied_hash == schema_hash {
            debug!("Schema for `{}` is up to date.", table_name);
            return Ok(());
        }

        // Get existing cols from DB
        let pragma_sql = format!("PRAGMA table_info({})", table_name);
        let cols: Vec<String> = sqlx::query(&pragma_sql)
            .fetch_all(db.pool())
            .await?
            .into_iter()
            .map(|row: SqliteRow| row.get::<String, _>("name"))
            .collect();

        let mut added = Vec::new();
        for (name, sqltype) in Self::columns() {
            if !cols.contains(&name) {
                db.execute(&format!(
                    "ALTER TABLE {} ADD COLUMN {} {};",
                    table_name, name, sqltype
                ))
                .await?;
                added.push((name, sqltype));
            }
        }

        if added.is_empty() {
            info!("No column changes detected for `{}`.", table_name);
        } else {
            info!("Columns added to `{}`:", table_name);
            for (name, sqltype) in &added {
                info!("  - {} {}", name, sqltype);
            }
        }
        sqlx::query(&format!(
            "UPDATE {} SET schema_sql = ?, hash = ?, applied_at = CURRENT_TIMESTAMP \
             WHERE table_name = ?",
            META_TABLE
        ))
        .bind(&create_sql)
        .bind(&schema_hash)
        .bind(table_name)
        .execute(db.pool())
        .await?;
        Ok(())
    }
}

// One bookkeeping table for both model migrations and SQL files.
async fn ensure_meta_table(db: &Db) -> Result<(), sqlx::Error> {
    db.execute(&format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            filename TEXT UNIQUE,
            table_name TEXT UNIQUE,
            schema_sql TEXT,
            hash TEXT,
            applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        META_TABLE
    ))
    .await
}

fn hash(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl Db {
    /// Connect (or create) a SQLite database at the given URI
    pub async fn connect(uri: &str) -> Result<Self, sqlx::Error> {
        info!("Connecting to SQLite database at URI: {}", uri);
        let in_memory = uri.contains(":memory:") || uri.contains("mode=memory");
        let uri = if uri == ":memory:" { "sqlite::memory:" } else { uri };
        let options = SqliteConnectOptions::from_str(uri)?
            .create_if_missing(true)
            .foreign_keys(true);
        // Every pooled connection would otherwise open its own empty database.
        let mut pool_options = SqlitePoolOptions::new().max_connections(8);
        if in_memory {
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;
        info!("Connected to SQLite database: {}", uri);
        Ok(Db { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Execute an arbitrary SQL statement, e.g. DDL, INSERT, UPDATE.
    pub async fn execute(&self, sql: &str) -> Result<(), sqlx::Error> {
        debug!("Executing SQL: {}", sql);
        let result = self.pool.execute(sql).await;
        if let Err(e) = &result {
            log::error!("SQL execution failed: {}", e);
        }
        result.map(|_| ())
    }

    /// Fetch all rows and map to a type implementing `FromRow`.
    pub async fn fetch_all<T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin>(
        &self,
        sql: &str,
    ) -> Result<Vec<T>, sqlx::Error> {
        debug!("Fetching rows with SQL: {}", sql);
        let result = sqlx::query_as(sql).fetch_all(&self.pool).await;
        match &result {
            Ok(rows) => debug!("Fetched {} rows", rows.len()),
            Err(e) => log::error!("Row fetch failed: {}", e),
        }
        result
    }
}

/// Migrate all registered models using the inventory pattern.
pub async fn auto_migrate(db: Arc<Db>) -> Result<(), sqlx::Error> {
    info!("Starting auto migration of all registered models...");
    let mut total = 0;
    for m in inventory::iter::<Migration> {
        total += 1;
        if let Err(e) = m(db.clone()).await {
            log::error!("Auto-migration failed for a model: {}", e);
            return Err(e);
        }
    }
    info!("Auto migration completed for {} models.", total);
    Ok(())
}

/// Applies `*.sql` files found directly in `migrations_dir`, in filename order.
/// Files already recorded in the meta table are skipped. A missing directory is not an error.
pub async fn apply_migration_files(db: Arc<Db>, migrations_dir: &str) -> Result<(), sqlx::Error> {
    ensure_meta_table(&db).await?;

    let mut files: Vec<_> = WalkDir::new(migrations_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|f| f.file_type().is_file())
        .filter(|f| f.path().extension().map(|e| e == "sql").unwrap_or(false))
        .collect();
    files.sort_by_key(|f| f.file_name().to_os_string());

    for entry in files {
        let filename = entry.file_name().to_string_lossy().to_string();
        let applied: Option<(i64,)> =
            sqlx::query_as(&format!("SELECT id FROM {} WHERE filename = ?", META_TABLE))
                .bind(&filename)
                .fetch_optional(db.pool())
                .await?;
        if applied.is_some() {
            debug!("Migration `{}` already applied.", filename);
            continue;
        }

        let sql = fs::read_to_string(entry.path()).map_err(sqlx::Error::Io)?;
        info!("Applying migration file: {}", filename);
        db.execute(&sql).await?;
        sqlx::query(&format!("INSERT INTO {} (filename) VALUES (?)", META_TABLE))
            .bind(&filename)
            .execute(db.pool())
            .await?;
        info!("Migration `{}` applied.", filename);
    }

    Ok(())
}
