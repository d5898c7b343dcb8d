//! The record store.
//!
//! Owns the SQLite pool and every query against the durable tables:
//! 1.  `modules` and `module_metadata` (uploaded module revisions, install overrides).
//! 2.  `licenses` (static allow-list with soft revocation).
//! 3.  `applications` (released binaries for update checks).
//!
//! Rows are updated last-writer-wins; there is no cross-row locking.

use crate::domain::error::Result;
use crate::domain::model::{
    Application, License, Module, ModuleUpdate, NewApplication, NewModule,
};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

const MODULE_COLUMNS: &str = "id, name, filename, type, COALESCE(price, 'free') AS price, \
     description, version, install_command, created_at, updated_at";

const APPLICATION_COLUMNS: &str = "id, name, platform, version, filename, changelog, \
     release_notes, created_at, updated_at";

const LICENSE_COLUMNS: &str = "id, license_key, active, created_at";

/// Handle to the record store. Cheap to share behind an `Arc`; the pool does its own locking.
pub struct DatabaseService {
    pool: SqlitePool,
}

impl DatabaseService {
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Connects to `database_url` and creates any missing tables.
    ///
    /// In-memory URLs get a single long-lived connection, since every SQLite connection
    /// would otherwise see its own empty database.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

        let mut options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        let service = Self { pool };
        service.init_schema().await?;
        Ok(service)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS modules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                filename TEXT NOT NULL,
                type TEXT NOT NULL,
                price TEXT NOT NULL DEFAULT 'free',
                description TEXT,
                version TEXT,
                install_command TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (type, filename)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS licenses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                license_key TEXT UNIQUE NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS module_metadata (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT UNIQUE NOT NULL,
                install_command TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS applications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                platform TEXT NOT NULL,
                version TEXT NOT NULL,
                filename TEXT NOT NULL,
                changelog TEXT,
                release_notes TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_applications_platform ON applications(platform)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // --- Modules ---

    pub async fn get_module(&self, id: i64) -> Result<Option<Module>> {
        let sql = format!("SELECT {} FROM modules WHERE id = ?", MODULE_COLUMNS);
        Ok(sqlx::query_as::<_, Module>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Module registered for `filename` inside the `kind` directory.
    pub async fn find_module(&self, filename: &str, kind: &str) -> Result<Option<Module>> {
        let sql = format!(
            "SELECT {} FROM modules WHERE filename = ? AND type = ?",
            MODULE_COLUMNS
        );
        Ok(sqlx::query_as::<_, Module>(&sql)
            .bind(filename)
            .bind(kind)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Module registered for `filename` in any directory; the newest row wins when the same
    /// filename exists under several types.
    pub async fn find_module_by_filename(&self, filename: &str) -> Result<Option<Module>> {
        let sql = format!(
            "SELECT {} FROM modules WHERE filename = ? ORDER BY created_at DESC, id DESC LIMIT 1",
            MODULE_COLUMNS
        );
        Ok(sqlx::query_as::<_, Module>(&sql)
            .bind(filename)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Every module revision, newest upload first.
    pub async fn list_modules(&self) -> Result<Vec<Module>> {
        let sql = format!(
            "SELECT {} FROM modules ORDER BY created_at DESC, id DESC",
            MODULE_COLUMNS
        );
        Ok(sqlx::query_as::<_, Module>(&sql).fetch_all(&self.pool).await?)
    }

    /// Every module revision ordered for the marketplace (by type, then name).
    pub async fn list_modules_by_type(&self) -> Result<Vec<Module>> {
        let sql = format!("SELECT {} FROM modules ORDER BY type, name, id", MODULE_COLUMNS);
        Ok(sqlx::query_as::<_, Module>(&sql).fetch_all(&self.pool).await?)
    }

    pub async fn insert_module(&self, new: &NewModule) -> Result<Module> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO modules (name, filename, type, price, description, version, install_command, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {}",
            MODULE_COLUMNS
        );
        let module = sqlx::query_as::<_, Module>(&sql)
            .bind(&new.name)
            .bind(&new.filename)
            .bind(&new.kind)
            .bind(new.price.as_str())
            .bind(&new.description)
            .bind(&new.version)
            .bind(&new.install_command)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;
        debug!(id = module.id, filename = %module.filename, "module row inserted");
        Ok(module)
    }

    /// Replaces the editable fields of module `id`. `None` when no such row exists.
    pub async fn update_module(&self, id: i64, update: &ModuleUpdate) -> Result<Option<Module>> {
        let sql = format!(
            "UPDATE modules
             SET name = ?, type = ?, version = ?, price = ?, description = ?, install_command = ?, updated_at = ?
             WHERE id = ?
             RETURNING {}",
            MODULE_COLUMNS
        );
        Ok(sqlx::query_as::<_, Module>(&sql)
            .bind(&update.name)
            .bind(&update.kind)
            .bind(&update.version)
            .bind(update.price.as_str())
            .bind(&update.description)
            .bind(&update.install_command)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Deletes module `id` and returns the removed row.
    pub async fn delete_module(&self, id: i64) -> Result<Option<Module>> {
        let sql = format!("DELETE FROM modules WHERE id = ? RETURNING {}", MODULE_COLUMNS);
        Ok(sqlx::query_as::<_, Module>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    // --- Module metadata ---

    pub async fn install_override(&self, filename: &str) -> Result<Option<String>> {
        let value: Option<Option<String>> =
            sqlx::query_scalar("SELECT install_command FROM module_metadata WHERE filename = ?")
                .bind(filename)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value.flatten())
    }

    /// Inserts or replaces the install-command override for `filename`.
    /// Returns `true` when a new row was created.
    pub async fn upsert_install_override(
        &self,
        filename: &str,
        install_command: Option<&str>,
    ) -> Result<bool> {
        let existed: Option<i64> =
            sqlx::query_scalar("SELECT id FROM module_metadata WHERE filename = ?")
                .bind(filename)
                .fetch_optional(&self.pool)
                .await?;

        sqlx::query(
            "INSERT INTO module_metadata (filename, install_command, created_at) VALUES (?, ?, ?)
             ON CONFLICT(filename) DO UPDATE SET install_command = excluded.install_command",
        )
        .bind(filename)
        .bind(install_command)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(existed.is_none())
    }

    // --- Licenses ---

    /// Inserts the allow-list keys that are not present yet. Existing rows (including
    /// revoked ones) are left untouched.
    pub async fn seed_licenses<S: AsRef<str>>(&self, keys: &[S]) -> Result<u64> {
        let mut inserted = 0;
        for key in keys {
            let key = key.as_ref().trim();
            if key.is_empty() {
                continue;
            }
            inserted += sqlx::query(
                "INSERT OR IGNORE INTO licenses (license_key, active, created_at) VALUES (?, 1, ?)",
            )
            .bind(key)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?
            .rows_affected();
        }
        if inserted > 0 {
            info!(inserted, "seeded license keys");
        }
        Ok(inserted)
    }

    pub async fn find_active_license(&self, license_key: &str) -> Result<Option<License>> {
        let sql = format!(
            "SELECT {} FROM licenses WHERE license_key = ? AND active = 1",
            LICENSE_COLUMNS
        );
        Ok(sqlx::query_as::<_, License>(&sql)
            .bind(license_key)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn list_licenses(&self) -> Result<Vec<License>> {
        let sql = format!(
            "SELECT {} FROM licenses ORDER BY created_at DESC, id DESC",
            LICENSE_COLUMNS
        );
        Ok(sqlx::query_as::<_, License>(&sql).fetch_all(&self.pool).await?)
    }

    pub async fn set_license_active(&self, id: i64, active: bool) -> Result<Option<License>> {
        let sql = format!(
            "UPDATE licenses SET active = ? WHERE id = ? RETURNING {}",
            LICENSE_COLUMNS
        );
        Ok(sqlx::query_as::<_, License>(&sql)
            .bind(active)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    // --- Applications ---

    /// Applications ordered by platform then name, optionally restricted to one platform.
    pub async fn list_applications(&self, platform: Option<&str>) -> Result<Vec<Application>> {
        let rows = match platform {
            Some(p) => {
                let sql = format!(
                    "SELECT {} FROM applications WHERE platform = ? ORDER BY name, id",
                    APPLICATION_COLUMNS
                );
                sqlx::query_as::<_, Application>(&sql)
                    .bind(p)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM applications ORDER BY platform, name, id",
                    APPLICATION_COLUMNS
                );
                sqlx::query_as::<_, Application>(&sql)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows)
    }

    pub async fn get_application(&self, id: i64) -> Result<Option<Application>> {
        let sql = format!("SELECT {} FROM applications WHERE id = ?", APPLICATION_COLUMNS);
        Ok(sqlx::query_as::<_, Application>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Most recently released row for (`platform`, `name`).
    pub async fn latest_application(
        &self,
        platform: &str,
        name: &str,
    ) -> Result<Option<Application>> {
        let sql = format!(
            "SELECT {} FROM applications WHERE platform = ? AND name = ?
             ORDER BY created_at DESC, id DESC LIMIT 1",
            APPLICATION_COLUMNS
        );
        Ok(sqlx::query_as::<_, Application>(&sql)
            .bind(platform)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn insert_application(&self, new: &NewApplication) -> Result<Application> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO applications (name, platform, version, filename, changelog, release_notes, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {}",
            APPLICATION_COLUMNS
        );
        Ok(sqlx::query_as::<_, Application>(&sql)
            .bind(&new.name)
            .bind(&new.platform)
            .bind(&new.version)
            .bind(&new.filename)
            .bind(&new.changelog)
            .bind(&new.release_notes)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn delete_application(&self, id: i64) -> Result<Option<Application>> {
        let sql = format!(
            "DELETE FROM applications WHERE id = ? RETURNING {}",
            APPLICATION_COLUMNS
        );
        Ok(sqlx::query_as::<_, Application>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }
}
