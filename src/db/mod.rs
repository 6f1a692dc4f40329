//! Database module - SQLite schema for characters and combat encounters

#[cfg(test)]
pub mod test_utils;

use std::str::FromStr;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

/// Database handle wrapping SQLite connection pool
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    /// If path is None, uses in-memory database (for testing)
    pub async fn new(path: Option<&str>) -> Result<Self> {
        let pool = match path {
            Some(p) => {
                let options = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", p))?
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .foreign_keys(true);

                SqlitePoolOptions::new()
                    .max_connections(10)
                    .connect_with(options)
                    .await?
            }
            None => {
                // Every in-memory connection is its own database, so keep
                // exactly one alive for the lifetime of the pool
                let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

                SqlitePoolOptions::new()
                    .max_connections(1)
                    .min_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .connect_with(options)
                    .await?
            }
        };

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");

        // Characters, owned by the character store; combat only reads them
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS characters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                player_name TEXT,
                character_class TEXT NOT NULL DEFAULT 'Fighter',
                level INTEGER NOT NULL DEFAULT 1,
                is_npc INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                max_hit_points INTEGER NOT NULL CHECK (max_hit_points >= 1),
                armor_class INTEGER NOT NULL DEFAULT 10,
                strength INTEGER NOT NULL DEFAULT 10,
                dexterity INTEGER NOT NULL DEFAULT 10,
                constitution INTEGER NOT NULL DEFAULT 10,
                intelligence INTEGER NOT NULL DEFAULT 10,
                wisdom INTEGER NOT NULL DEFAULT 10,
                charisma INTEGER NOT NULL DEFAULT 10,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS combat_encounters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT,
                active INTEGER NOT NULL DEFAULT 0,
                current_turn INTEGER NOT NULL DEFAULT 0 CHECK (current_turn >= 0),
                round_number INTEGER NOT NULL DEFAULT 1 CHECK (round_number >= 1),
                current_participant_id INTEGER,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS combat_participants (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                encounter_id INTEGER NOT NULL REFERENCES combat_encounters(id) ON DELETE CASCADE,
                combatant_id INTEGER NOT NULL REFERENCES characters(id),
                initiative INTEGER NOT NULL,
                turn_order INTEGER NOT NULL,
                current_hp INTEGER NOT NULL CHECK (current_hp >= 0 AND current_hp <= max_hp),
                max_hp INTEGER NOT NULL,
                conditions TEXT NOT NULL DEFAULT '[]',
                active INTEGER NOT NULL DEFAULT 1,
                notes TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(encounter_id, combatant_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Single-row table naming the one active encounter
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS active_encounter (
                slot INTEGER PRIMARY KEY CHECK (slot = 1),
                encounter_id INTEGER REFERENCES combat_encounters(id) ON DELETE SET NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("INSERT OR IGNORE INTO active_encounter (slot, encounter_id) VALUES (1, NULL)")
            .execute(&self.pool)
            .await?;

        // Action log, discarded with the participants when combat ends
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS combat_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                encounter_id INTEGER NOT NULL REFERENCES combat_encounters(id) ON DELETE CASCADE,
                round_number INTEGER NOT NULL,
                actor_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                target_id INTEGER,
                detail TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_participants_encounter ON combat_participants(encounter_id)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_log_encounter ON combat_log(encounter_id)")
            .execute(&self.pool)
            .await?;

        info!("Database migrations complete");
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Check if database is healthy
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_db_creation() {
        let db = Database::new(None).await.unwrap();
        db.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_migrations_run() {
        let db = Database::new(None).await.unwrap();

        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM combat_encounters")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(result.0, 0);

        let slot: (Option<i64>,) = sqlx::query_as("SELECT encounter_id FROM active_encounter")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(slot.0, None);
    }

    #[tokio::test]
    async fn test_file_database_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("encounters.db");
        let path = path.to_str().unwrap();

        {
            let db = Database::new(Some(path)).await.unwrap();
            sqlx::query("INSERT INTO combat_encounters (name) VALUES ('Ambush')")
                .execute(db.pool())
                .await
                .unwrap();
            db.pool().close().await;
        }

        let db = Database::new(Some(path)).await.unwrap();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM combat_encounters")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
