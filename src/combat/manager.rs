//! Encounter manager
//!
//! Owns every state transition of an encounter: start, end, joins, turn
//! advancement and actions. Each operation is a short read-modify-write run
//! inside one SQLite transaction while holding that encounter's async lock,
//! so concurrent callers on the same encounter are serialized and different
//! encounters proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use super::actions::{apply_action, Action, ActionOutcome};
use super::conditions::ConditionSet;
use super::dice::Dice;
use super::encounter::{Combatant, Encounter, Participant, Roster, TurnTracking};
use super::error::{CombatError, CombatResult};
use super::initiative::roll_initiative;
use super::registry::{self, CombatantRegistry};
use super::store::{self, LogEntry};

/// A participant joined with the combatant it was snapshotted from
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    #[serde(flatten)]
    pub participant: Participant,
    pub combatant: Combatant,
    /// Whether it is this participant's turn
    pub is_current: bool,
}

type LockMap = parking_lot::Mutex<HashMap<i64, Arc<Mutex<()>>>>;

/// Holds one encounter's write lock; unused entries leave the map on drop
struct EncounterGuard<'a> {
    locks: &'a LockMap,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for EncounterGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Clones are only made under the map lock, so a count of 1 means
        // nobody holds or waits on that mutex
        self.locks.lock().retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

/// Combat encounter state machine
pub struct EncounterManager {
    pool: SqlitePool,
    registry: CombatantRegistry,
    dice: Dice,
    tracking: TurnTracking,
    /// Per-encounter write locks, present only while held or awaited
    locks: LockMap,
    /// Held by `start` while it swaps the active encounter
    start_lock: Mutex<()>,
}

impl EncounterManager {
    pub fn new(pool: SqlitePool, dice: Dice, tracking: TurnTracking) -> Self {
        Self {
            registry: CombatantRegistry::new(pool.clone()),
            pool,
            dice,
            tracking,
            locks: parking_lot::Mutex::new(HashMap::new()),
            start_lock: Mutex::new(()),
        }
    }

    /// Create a shared instance
    pub fn shared(pool: SqlitePool, dice: Dice, tracking: TurnTracking) -> Arc<Self> {
        Arc::new(Self::new(pool, dice, tracking))
    }

    pub fn registry(&self) -> &CombatantRegistry {
        &self.registry
    }

    async fn lock(&self, encounter_id: i64) -> EncounterGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock();
            locks.entry(encounter_id).or_default().clone()
        };
        EncounterGuard {
            locks: &self.locks,
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Create an inactive encounter with no participants
    pub async fn create_encounter(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> CombatResult<Encounter> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CombatError::Validation(
                "encounter name must not be empty".to_string(),
            ));
        }

        let mut conn = self.pool.acquire().await?;
        let encounter = store::insert_encounter(&mut conn, name, description).await?;
        info!("Created encounter {} ({})", encounter.id, encounter.name);
        Ok(encounter)
    }

    pub async fn list_encounters(&self) -> CombatResult<Vec<Encounter>> {
        store::list_encounters(&self.pool).await
    }

    pub async fn get_encounter(&self, encounter_id: i64) -> CombatResult<Encounter> {
        let mut conn = self.pool.acquire().await?;
        store::fetch_encounter(&mut conn, encounter_id).await
    }

    /// The one encounter currently in progress, if any
    pub async fn active_encounter(&self) -> CombatResult<Option<Encounter>> {
        let mut conn = self.pool.acquire().await?;
        match store::active_encounter_id(&mut conn).await? {
            Some(id) => Ok(Some(store::fetch_encounter(&mut conn, id).await?)),
            None => Ok(None),
        }
    }

    /// Start (or restart) an encounter.
    ///
    /// Any other active encounter is ended, every active combatant joins with
    /// a fresh initiative roll, and the turn pointer goes to the top of round 1.
    pub async fn start(&self, encounter_id: i64) -> CombatResult<Encounter> {
        let _start = self.start_lock.lock().await;

        // Only `start` activates encounters, so this set can't grow while we
        // hold the start lock
        let previous: Vec<i64> = {
            let mut conn = self.pool.acquire().await?;
            let mut ids: Vec<i64> =
                sqlx::query_as::<_, (i64,)>("SELECT id FROM combat_encounters WHERE active = 1")
                    .fetch_all(&mut *conn)
                    .await?
                    .into_iter()
                    .map(|(id,)| id)
                    .collect();
            ids.extend(store::active_encounter_id(&mut conn).await?);
            ids.retain(|&id| id != encounter_id);
            ids.sort_unstable();
            ids.dedup();
            ids
        };

        let mut lock_ids = previous.clone();
        lock_ids.push(encounter_id);
        lock_ids.sort_unstable();
        let mut _guards = Vec::with_capacity(lock_ids.len());
        for id in &lock_ids {
            _guards.push(self.lock(*id).await);
        }

        let mut tx = self.pool.begin().await?;
        let encounter = store::fetch_encounter(&mut tx, encounter_id).await?;

        for id in &previous {
            let mut other = store::fetch_encounter(&mut tx, *id).await?;
            store::clear_combat(&mut tx, other.id).await?;
            deactivate(&mut other);
            store::save_encounter(&mut tx, &other).await?;
            info!("Encounter {} ended because {} started", other.id, encounter_id);
        }

        store::clear_combat(&mut tx, encounter_id).await?;

        let combatants = registry::list_active(&mut tx).await?;
        let mut participants = Vec::with_capacity(combatants.len());
        for (turn_order, combatant) in combatants.iter().enumerate() {
            let initiative = roll_initiative(&self.dice, combatant.dexterity as i32);
            let participant = store::insert_participant(
                &mut tx,
                encounter_id,
                combatant.id,
                i64::from(initiative),
                turn_order as i64,
                combatant.max_hit_points,
            )
            .await?;
            debug!(
                "{} rolled initiative {} in encounter {}",
                combatant.name, initiative, encounter_id
            );
            participants.push(participant);
        }

        let mut roster = Roster::new(encounter, participants);
        roster.encounter.active = true;
        roster.reset_turn();
        store::save_encounter(&mut tx, &roster.encounter).await?;
        store::set_active_encounter(&mut tx, Some(encounter_id)).await?;

        tx.commit().await?;

        info!(
            "Encounter {} started with {} participants",
            encounter_id,
            roster.participants.len()
        );
        self.get_encounter(encounter_id).await
    }

    /// End an encounter and discard its participants and action log
    pub async fn end(&self, encounter_id: i64) -> CombatResult<Encounter> {
        let _guard = self.lock(encounter_id).await;
        let mut tx = self.pool.begin().await?;

        let mut encounter = store::fetch_encounter(&mut tx, encounter_id).await?;
        store::clear_combat(&mut tx, encounter_id).await?;
        deactivate(&mut encounter);
        store::save_encounter(&mut tx, &encounter).await?;

        if store::active_encounter_id(&mut tx).await? == Some(encounter_id) {
            store::set_active_encounter(&mut tx, None).await?;
        }

        tx.commit().await?;

        info!("Encounter {} ended", encounter_id);
        self.get_encounter(encounter_id).await
    }

    /// Bring combatants into a running encounter.
    ///
    /// A combatant already fighting is skipped; one that was deactivated comes
    /// back with its original roll. Newcomers roll initiative and continue the
    /// turn-order counter. Returns the participants that joined or returned.
    pub async fn add_participants(
        &self,
        encounter_id: i64,
        combatant_ids: &[i64],
    ) -> CombatResult<Vec<Participant>> {
        let _guard = self.lock(encounter_id).await;
        let mut tx = self.pool.begin().await?;

        let mut roster = store::load_roster(&mut tx, encounter_id).await?;
        roster.require_active()?;

        let mut ids: Vec<i64> = Vec::with_capacity(combatant_ids.len());
        for id in combatant_ids {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }

        let mut combatants = Vec::with_capacity(ids.len());
        for id in &ids {
            combatants.push(registry::get(&mut tx, *id).await?);
        }

        let mut next_order = roster
            .participants
            .iter()
            .map(|p| p.turn_order + 1)
            .max()
            .unwrap_or(0);
        let mut joined = Vec::new();

        for combatant in combatants {
            let existing = roster
                .participants
                .iter_mut()
                .find(|p| p.combatant_id == combatant.id);

            match existing {
                Some(p) if p.active => {
                    debug!("{} already in encounter {}", combatant.name, encounter_id);
                }
                Some(p) => {
                    p.active = true;
                    joined.push(p.clone());
                    info!("{} rejoined encounter {}", combatant.name, encounter_id);
                }
                None => {
                    let initiative = roll_initiative(&self.dice, combatant.dexterity as i32);
                    let participant = store::insert_participant(
                        &mut tx,
                        encounter_id,
                        combatant.id,
                        i64::from(initiative),
                        next_order,
                        combatant.max_hit_points,
                    )
                    .await?;
                    next_order += 1;
                    info!(
                        "{} joined encounter {} with initiative {}",
                        combatant.name, encounter_id, initiative
                    );
                    joined.push(participant.clone());
                    roster.participants.push(participant);
                }
            }
        }

        roster.normalize_turn(self.tracking);
        store::save_roster(&mut tx, &roster).await?;
        tx.commit().await?;

        Ok(joined)
    }

    /// Advance to the next turn, wrapping into a new round
    pub async fn advance(&self, encounter_id: i64) -> CombatResult<Encounter> {
        let _guard = self.lock(encounter_id).await;
        let mut tx = self.pool.begin().await?;

        let mut roster = store::load_roster(&mut tx, encounter_id).await?;
        roster.require_active()?;
        roster.advance(self.tracking)?;
        store::save_encounter(&mut tx, &roster.encounter).await?;

        tx.commit().await?;

        debug!(
            "Encounter {} now round {} turn {}",
            encounter_id, roster.encounter.round_number, roster.encounter.current_turn
        );
        self.get_encounter(encounter_id).await
    }

    /// Apply an action. Never advances the turn.
    pub async fn apply(
        &self,
        encounter_id: i64,
        actor_id: i64,
        kind: &str,
        target_id: Option<i64>,
        payload: &Value,
    ) -> CombatResult<ActionOutcome> {
        let _guard = self.lock(encounter_id).await;
        let mut tx = self.pool.begin().await?;

        let mut roster = store::load_roster(&mut tx, encounter_id).await?;
        let action = Action::parse(kind, target_id, payload)?;
        let outcome = apply_action(&mut roster, actor_id, &action, &self.dice)?;

        if let Some(target) = outcome.target_id.and_then(|id| roster.participant(id)) {
            store::save_participant(&mut tx, target).await?;
        }
        store::insert_log(&mut tx, &outcome).await?;

        tx.commit().await?;

        info!(
            "Encounter {}: participant {} used {} on {:?} (hp {:?} -> {:?})",
            encounter_id, actor_id, outcome.kind, outcome.target_id, outcome.hp_before, outcome.hp_after
        );
        Ok(outcome)
    }

    /// Administrative HP override, clamped to `[0, max_hp]`
    pub async fn set_hp(&self, participant_id: i64, hp: i64) -> CombatResult<Participant> {
        self.update_participant(participant_id, |roster| {
            if let Some(p) = roster.participant_mut(participant_id) {
                p.set_hp(hp);
            }
        })
        .await
    }

    /// Replace a participant's conditions wholesale
    pub async fn set_conditions(
        &self,
        participant_id: i64,
        labels: &[String],
    ) -> CombatResult<Participant> {
        let conditions = ConditionSet::from_labels(labels);
        self.update_participant(participant_id, move |roster| {
            if let Some(p) = roster.participant_mut(participant_id) {
                p.conditions = conditions;
            }
        })
        .await
    }

    /// Remove one condition; a label that isn't there is a no-op
    pub async fn remove_condition(
        &self,
        participant_id: i64,
        label: &str,
    ) -> CombatResult<Participant> {
        self.update_participant(participant_id, |roster| {
            if let Some(p) = roster.participant_mut(participant_id) {
                p.conditions.remove(label);
            }
        })
        .await
    }

    /// Take a participant out of (or back into) the turn order without
    /// deleting it
    pub async fn set_participant_active(
        &self,
        participant_id: i64,
        active: bool,
    ) -> CombatResult<Participant> {
        let tracking = self.tracking;
        self.update_participant(participant_id, move |roster| {
            if let Some(p) = roster.participant_mut(participant_id) {
                p.active = active;
            }
            roster.normalize_turn(tracking);
        })
        .await
    }

    async fn update_participant<F>(&self, participant_id: i64, f: F) -> CombatResult<Participant>
    where
        F: FnOnce(&mut Roster),
    {
        let encounter_id = store::participant_encounter(&self.pool, participant_id).await?;

        let _guard = self.lock(encounter_id).await;
        let mut tx = self.pool.begin().await?;

        let mut roster = store::load_roster(&mut tx, encounter_id).await?;
        if roster.participant(participant_id).is_none() {
            // Removed between lookup and lock
            return Err(CombatError::participant_not_found(participant_id));
        }

        f(&mut roster);
        store::save_roster(&mut tx, &roster).await?;
        tx.commit().await?;

        roster
            .participant(participant_id)
            .cloned()
            .ok_or_else(|| CombatError::participant_not_found(participant_id))
    }

    /// Active participants in turn order
    pub async fn participants(&self, encounter_id: i64) -> CombatResult<Vec<ParticipantView>> {
        let mut tx = self.pool.begin().await?;
        let roster = store::load_roster(&mut tx, encounter_id).await?;
        let current = roster.current_actor(self.tracking).map(|p| p.id);

        let mut views = Vec::new();
        for p in roster.sorted_active() {
            let combatant = registry::get(&mut tx, p.combatant_id).await?;
            views.push(ParticipantView {
                participant: p.clone(),
                combatant,
                is_current: Some(p.id) == current,
            });
        }
        tx.commit().await?;

        Ok(views)
    }

    /// Whose turn it is, if anyone's
    pub async fn current_actor(&self, encounter_id: i64) -> CombatResult<Option<ParticipantView>> {
        Ok(self
            .participants(encounter_id)
            .await?
            .into_iter()
            .find(|v| v.is_current))
    }

    pub async fn log(&self, encounter_id: i64) -> CombatResult<Vec<LogEntry>> {
        self.get_encounter(encounter_id).await?;
        store::list_log(&self.pool, encounter_id).await
    }
}

fn deactivate(encounter: &mut Encounter) {
    encounter.active = false;
    encounter.current_turn = 0;
    encounter.current_participant_id = None;
}
