//! Combatant registry
//!
//! Read side of the character store: combat pulls max HP and ability scores
//! from here when a combatant enters an encounter. A minimal `create` exists
//! so the server can be fed characters without a separate service.

use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};

use super::encounter::Combatant;
use super::error::{CombatError, CombatResult};

const SELECT_COMBATANT: &str = r#"
    SELECT id, name, player_name, character_class, level, is_npc, is_active,
           max_hit_points, armor_class, strength, dexterity, constitution,
           intelligence, wisdom, charisma
    FROM characters
"#;

/// New character as accepted by the registry
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCombatant {
    pub name: String,
    #[serde(default)]
    pub player_name: Option<String>,
    #[serde(default = "default_class")]
    pub character_class: String,
    #[serde(default = "default_level")]
    pub level: i64,
    #[serde(default)]
    pub is_npc: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub max_hit_points: i64,
    #[serde(default = "default_ac")]
    pub armor_class: i64,
    #[serde(default = "default_score")]
    pub strength: i64,
    #[serde(default = "default_score")]
    pub dexterity: i64,
    #[serde(default = "default_score")]
    pub constitution: i64,
    #[serde(default = "default_score")]
    pub intelligence: i64,
    #[serde(default = "default_score")]
    pub wisdom: i64,
    #[serde(default = "default_score")]
    pub charisma: i64,
}

fn default_class() -> String {
    "Fighter".to_string()
}
fn default_level() -> i64 {
    1
}
fn default_true() -> bool {
    true
}
fn default_ac() -> i64 {
    10
}
fn default_score() -> i64 {
    10
}

impl NewCombatant {
    pub fn new(name: &str, max_hit_points: i64, dexterity: i64) -> Self {
        Self {
            name: name.to_string(),
            player_name: None,
            character_class: default_class(),
            level: default_level(),
            is_npc: false,
            is_active: true,
            max_hit_points,
            armor_class: default_ac(),
            strength: default_score(),
            dexterity,
            constitution: default_score(),
            intelligence: default_score(),
            wisdom: default_score(),
            charisma: default_score(),
        }
    }

    fn validate(&self) -> CombatResult<()> {
        if self.name.trim().is_empty() {
            return Err(CombatError::Validation("name must not be empty".to_string()));
        }
        if self.max_hit_points < 1 {
            return Err(CombatError::Validation(
                "max hit points must be at least 1".to_string(),
            ));
        }
        if !(1..=20).contains(&self.level) {
            return Err(CombatError::Validation("level must be 1-20".to_string()));
        }
        let scores = [
            self.strength,
            self.dexterity,
            self.constitution,
            self.intelligence,
            self.wisdom,
            self.charisma,
        ];
        if scores.iter().any(|s| !(1..=30).contains(s)) {
            return Err(CombatError::Validation(
                "ability scores must be 1-30".to_string(),
            ));
        }
        Ok(())
    }
}

/// Character store access for the combat core
#[derive(Debug, Clone)]
pub struct CombatantRegistry {
    pool: SqlitePool,
}

impl CombatantRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Every character that takes part when an encounter starts
    pub async fn list_active(&self) -> CombatResult<Vec<Combatant>> {
        let mut conn = self.pool.acquire().await?;
        list_active(&mut conn).await
    }

    pub async fn list(&self) -> CombatResult<Vec<Combatant>> {
        let rows = sqlx::query_as::<_, Combatant>(&format!("{} ORDER BY name, id", SELECT_COMBATANT))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn get(&self, id: i64) -> CombatResult<Combatant> {
        let mut conn = self.pool.acquire().await?;
        get(&mut conn, id).await
    }

    pub async fn create(&self, new: &NewCombatant) -> CombatResult<Combatant> {
        new.validate()?;

        let result = sqlx::query(
            r#"
            INSERT INTO characters (
                name, player_name, character_class, level, is_npc, is_active,
                max_hit_points, armor_class, strength, dexterity, constitution,
                intelligence, wisdom, charisma
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.name.trim())
        .bind(&new.player_name)
        .bind(&new.character_class)
        .bind(new.level)
        .bind(new.is_npc)
        .bind(new.is_active)
        .bind(new.max_hit_points)
        .bind(new.armor_class)
        .bind(new.strength)
        .bind(new.dexterity)
        .bind(new.constitution)
        .bind(new.intelligence)
        .bind(new.wisdom)
        .bind(new.charisma)
        .execute(&self.pool)
        .await?;

        self.get(result.last_insert_rowid()).await
    }
}

/// Active characters in registry order (by id)
pub(crate) async fn list_active(conn: &mut SqliteConnection) -> CombatResult<Vec<Combatant>> {
    let rows = sqlx::query_as::<_, Combatant>(&format!(
        "{} WHERE is_active = 1 ORDER BY id",
        SELECT_COMBATANT
    ))
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

pub(crate) async fn get(conn: &mut SqliteConnection, id: i64) -> CombatResult<Combatant> {
    sqlx::query_as::<_, Combatant>(&format!("{} WHERE id = ?", SELECT_COMBATANT))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| CombatError::combatant_not_found(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_pool;

    #[tokio::test]
    async fn test_create_and_get() {
        let registry = CombatantRegistry::new(test_pool().await);

        let mut new = NewCombatant::new("Thorin", 24, 12);
        new.is_npc = true;
        let created = registry.create(&new).await.unwrap();

        let loaded = registry.get(created.id).await.unwrap();
        assert_eq!(loaded.name, "Thorin");
        assert_eq!(loaded.max_hit_points, 24);
        assert!(loaded.is_npc);
        assert_eq!(loaded.dexterity_modifier(), 1);
    }

    #[tokio::test]
    async fn test_list_active_skips_retired() {
        let registry = CombatantRegistry::new(test_pool().await);

        registry.create(&NewCombatant::new("Ayla", 10, 10)).await.unwrap();
        let mut retired = NewCombatant::new("Bram", 10, 10);
        retired.is_active = false;
        registry.create(&retired).await.unwrap();

        let active = registry.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Ayla");
        assert_eq!(registry.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let registry = CombatantRegistry::new(test_pool().await);
        assert!(matches!(
            registry.get(404).await,
            Err(CombatError::NotFound { entity: "combatant", id: 404 })
        ));
    }

    #[tokio::test]
    async fn test_validation() {
        let registry = CombatantRegistry::new(test_pool().await);
        assert!(matches!(
            registry.create(&NewCombatant::new("", 10, 10)).await,
            Err(CombatError::Validation(_))
        ));
        assert!(matches!(
            registry.create(&NewCombatant::new("Zed", 0, 10)).await,
            Err(CombatError::Validation(_))
        ));
        assert!(matches!(
            registry.create(&NewCombatant::new("Zed", 5, 40)).await,
            Err(CombatError::Validation(_))
        ));
    }
}
