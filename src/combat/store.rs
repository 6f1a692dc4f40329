//! Encounter persistence
//!
//! Row mapping between SQLite and the encounter aggregate. Every function
//! takes a connection so the manager can run a whole operation inside one
//! transaction.

use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};

use super::actions::ActionOutcome;
use super::conditions::ConditionSet;
use super::encounter::{Encounter, Participant, Roster};
use super::error::{CombatError, CombatResult};

const SELECT_ENCOUNTER: &str = r#"
    SELECT id, name, description, active, current_turn, round_number,
           current_participant_id, created_at, updated_at
    FROM combat_encounters
"#;

const SELECT_PARTICIPANT: &str = r#"
    SELECT id, encounter_id, combatant_id, initiative, turn_order, current_hp,
           max_hp, conditions, active, notes
    FROM combat_participants
"#;

#[derive(Debug, sqlx::FromRow)]
struct ParticipantRow {
    id: i64,
    encounter_id: i64,
    combatant_id: i64,
    initiative: i64,
    turn_order: i64,
    current_hp: i64,
    max_hp: i64,
    conditions: String,
    active: bool,
    notes: String,
}

impl TryFrom<ParticipantRow> for Participant {
    type Error = CombatError;

    fn try_from(row: ParticipantRow) -> Result<Self, Self::Error> {
        let conditions = ConditionSet::from_json(&row.conditions)
            .map_err(|e| CombatError::Database(sqlx::Error::Decode(Box::new(e))))?;

        Ok(Participant {
            id: row.id,
            encounter_id: row.encounter_id,
            combatant_id: row.combatant_id,
            initiative: row.initiative,
            turn_order: row.turn_order,
            current_hp: row.current_hp,
            max_hp: row.max_hp,
            conditions,
            active: row.active,
            notes: row.notes,
        })
    }
}

/// One entry of an encounter's action log
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: i64,
    pub encounter_id: i64,
    pub round_number: i64,
    pub actor_id: i64,
    pub kind: String,
    pub target_id: Option<i64>,
    pub detail: serde_json::Value,
    pub created_at: String,
}

#[derive(Debug, sqlx::FromRow)]
struct LogRow {
    id: i64,
    encounter_id: i64,
    round_number: i64,
    actor_id: i64,
    kind: String,
    target_id: Option<i64>,
    detail: String,
    created_at: String,
}

impl From<LogRow> for LogEntry {
    fn from(row: LogRow) -> Self {
        LogEntry {
            id: row.id,
            encounter_id: row.encounter_id,
            round_number: row.round_number,
            actor_id: row.actor_id,
            kind: row.kind,
            target_id: row.target_id,
            detail: serde_json::from_str(&row.detail).unwrap_or(serde_json::Value::Null),
            created_at: row.created_at,
        }
    }
}

pub async fn insert_encounter(
    conn: &mut SqliteConnection,
    name: &str,
    description: Option<&str>,
) -> CombatResult<Encounter> {
    let result = sqlx::query("INSERT INTO combat_encounters (name, description) VALUES (?, ?)")
        .bind(name)
        .bind(description)
        .execute(&mut *conn)
        .await?;

    fetch_encounter(conn, result.last_insert_rowid()).await
}

pub async fn fetch_encounter(conn: &mut SqliteConnection, id: i64) -> CombatResult<Encounter> {
    let row = sqlx::query_as::<_, Encounter>(&format!("{} WHERE id = ?", SELECT_ENCOUNTER))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    row.ok_or_else(|| CombatError::encounter_not_found(id))
}

pub async fn list_encounters(pool: &SqlitePool) -> CombatResult<Vec<Encounter>> {
    let rows = sqlx::query_as::<_, Encounter>(&format!(
        "{} ORDER BY created_at DESC, id DESC",
        SELECT_ENCOUNTER
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// All participants of an encounter, including deactivated ones
pub async fn fetch_participants(
    conn: &mut SqliteConnection,
    encounter_id: i64,
) -> CombatResult<Vec<Participant>> {
    let rows = sqlx::query_as::<_, ParticipantRow>(&format!(
        "{} WHERE encounter_id = ? ORDER BY id",
        SELECT_PARTICIPANT
    ))
    .bind(encounter_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(Participant::try_from).collect()
}

pub async fn load_roster(conn: &mut SqliteConnection, encounter_id: i64) -> CombatResult<Roster> {
    let encounter = fetch_encounter(conn, encounter_id).await?;
    let participants = fetch_participants(conn, encounter_id).await?;
    Ok(Roster::new(encounter, participants))
}

/// Which encounter a participant belongs to
pub async fn participant_encounter(pool: &SqlitePool, participant_id: i64) -> CombatResult<i64> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT encounter_id FROM combat_participants WHERE id = ?")
            .bind(participant_id)
            .fetch_optional(pool)
            .await?;

    row.map(|(id,)| id)
        .ok_or_else(|| CombatError::participant_not_found(participant_id))
}

/// Write the encounter's flags and turn state
pub async fn save_encounter(conn: &mut SqliteConnection, encounter: &Encounter) -> CombatResult<()> {
    sqlx::query(
        r#"
        UPDATE combat_encounters
        SET active = ?, current_turn = ?, round_number = ?, current_participant_id = ?,
            updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(encounter.active)
    .bind(encounter.current_turn)
    .bind(encounter.round_number)
    .bind(encounter.current_participant_id)
    .bind(encounter.id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Write a participant's mutable fields
pub async fn save_participant(
    conn: &mut SqliteConnection,
    participant: &Participant,
) -> CombatResult<()> {
    sqlx::query(
        r#"
        UPDATE combat_participants
        SET current_hp = ?, conditions = ?, active = ?, notes = ?, updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(participant.current_hp)
    .bind(participant.conditions.to_json())
    .bind(participant.active)
    .bind(&participant.notes)
    .bind(participant.id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Write the whole roster back
pub async fn save_roster(conn: &mut SqliteConnection, roster: &Roster) -> CombatResult<()> {
    for participant in &roster.participants {
        save_participant(conn, participant).await?;
    }
    save_encounter(conn, &roster.encounter).await
}

pub async fn insert_participant(
    conn: &mut SqliteConnection,
    encounter_id: i64,
    combatant_id: i64,
    initiative: i64,
    turn_order: i64,
    max_hp: i64,
) -> CombatResult<Participant> {
    let result = sqlx::query(
        r#"
        INSERT INTO combat_participants
            (encounter_id, combatant_id, initiative, turn_order, current_hp, max_hp)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(encounter_id)
    .bind(combatant_id)
    .bind(initiative)
    .bind(turn_order)
    .bind(max_hp)
    .bind(max_hp)
    .execute(&mut *conn)
    .await?;

    Ok(Participant {
        id: result.last_insert_rowid(),
        encounter_id,
        combatant_id,
        initiative,
        turn_order,
        current_hp: max_hp,
        max_hp,
        conditions: ConditionSet::new(),
        active: true,
        notes: String::new(),
    })
}

/// Drop an encounter's participants and its action log
pub async fn clear_combat(conn: &mut SqliteConnection, encounter_id: i64) -> CombatResult<()> {
    sqlx::query("DELETE FROM combat_participants WHERE encounter_id = ?")
        .bind(encounter_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM combat_log WHERE encounter_id = ?")
        .bind(encounter_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn active_encounter_id(conn: &mut SqliteConnection) -> CombatResult<Option<i64>> {
    let row: Option<(Option<i64>,)> =
        sqlx::query_as("SELECT encounter_id FROM active_encounter WHERE slot = 1")
            .fetch_optional(&mut *conn)
            .await?;
    Ok(row.and_then(|(id,)| id))
}

pub async fn set_active_encounter(
    conn: &mut SqliteConnection,
    encounter_id: Option<i64>,
) -> CombatResult<()> {
    sqlx::query(
        r#"
        INSERT INTO active_encounter (slot, encounter_id) VALUES (1, ?)
        ON CONFLICT(slot) DO UPDATE SET encounter_id = excluded.encounter_id
        "#,
    )
    .bind(encounter_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn insert_log(conn: &mut SqliteConnection, outcome: &ActionOutcome) -> CombatResult<()> {
    let detail = serde_json::json!({
        "rolled": outcome.rolled,
        "hpBefore": outcome.hp_before,
        "hpAfter": outcome.hp_after,
        "description": outcome.description,
    });

    sqlx::query(
        r#"
        INSERT INTO combat_log (encounter_id, round_number, actor_id, kind, target_id, detail)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(outcome.encounter_id)
    .bind(outcome.round_number)
    .bind(outcome.actor_id)
    .bind(outcome.kind.as_str())
    .bind(outcome.target_id)
    .bind(detail.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn list_log(pool: &SqlitePool, encounter_id: i64) -> CombatResult<Vec<LogEntry>> {
    let rows = sqlx::query_as::<_, LogRow>(
        r#"
        SELECT id, encounter_id, round_number, actor_id, kind, target_id, detail, created_at
        FROM combat_log WHERE encounter_id = ? ORDER BY id
        "#,
    )
    .bind(encounter_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(LogEntry::from).collect())
}
