//! Shared test utilities for database operations
//!
//! Provides a common test_pool() function that creates an in-memory
//! database with the full schema, plus a helper for seeding characters.

use sqlx::SqlitePool;

use super::Database;

/// Create an in-memory test database pool with full schema
pub async fn test_pool() -> SqlitePool {
    let db = Database::new(None)
        .await
        .expect("Failed to create test database");
    db.pool().clone()
}

/// Insert a character and return its id
pub async fn insert_character(pool: &SqlitePool, name: &str, max_hp: i64, dexterity: i64) -> i64 {
    let result = sqlx::query(
        "INSERT INTO characters (name, max_hit_points, dexterity) VALUES (?, ?, ?)",
    )
    .bind(name)
    .bind(max_hp)
    .bind(dexterity)
    .execute(pool)
    .await
    .expect("Failed to insert character");
    result.last_insert_rowid()
}
