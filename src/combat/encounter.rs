//! Encounter aggregate
//!
//! An encounter owns an ordered roster of participants, a turn pointer and a
//! round counter. Everything in here is pure state manipulation; persistence
//! and locking live in the manager.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::conditions::ConditionSet;
use super::error::{CombatError, CombatResult};
use super::initiative::ability_modifier;

/// Read-only projection of a character as the combat core sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Combatant {
    pub id: i64,
    pub name: String,
    pub player_name: Option<String>,
    pub character_class: String,
    pub level: i64,
    pub is_npc: bool,
    pub is_active: bool,
    pub max_hit_points: i64,
    pub armor_class: i64,
    pub strength: i64,
    pub dexterity: i64,
    pub constitution: i64,
    pub intelligence: i64,
    pub wisdom: i64,
    pub charisma: i64,
}

impl Combatant {
    pub fn dexterity_modifier(&self) -> i32 {
        ability_modifier(self.dexterity as i32)
    }
}

/// A combatant's in-combat record, scoped to one encounter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: i64,
    pub encounter_id: i64,
    pub combatant_id: i64,
    /// Fixed once rolled
    pub initiative: i64,
    /// Tie-break among equal initiative; higher acts first
    pub turn_order: i64,
    pub current_hp: i64,
    /// Combatant's max HP, snapshotted at join time
    pub max_hp: i64,
    pub conditions: ConditionSet,
    pub active: bool,
    pub notes: String,
}

impl Participant {
    /// Subtract damage, flooring at zero. Returns the HP actually lost.
    pub fn take_damage(&mut self, amount: i64) -> i64 {
        let before = self.current_hp;
        self.current_hp = self.current_hp.saturating_sub(amount).max(0);
        before - self.current_hp
    }

    /// Restore HP, capped at max. Returns the HP actually restored.
    pub fn heal(&mut self, amount: i64) -> i64 {
        let before = self.current_hp;
        self.current_hp = self.current_hp.saturating_add(amount).min(self.max_hp);
        self.current_hp - before
    }

    /// Administrative override, clamped to `[0, max_hp]`
    pub fn set_hp(&mut self, hp: i64) {
        self.current_hp = hp.clamp(0, self.max_hp.max(0));
    }

    pub fn is_down(&self) -> bool {
        self.current_hp == 0
    }
}

/// Persistent encounter row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Encounter {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub current_turn: i64,
    pub round_number: i64,
    /// Participant whose turn it is, when tracking by participant
    pub current_participant_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// How the turn pointer survives roster changes between advances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnTracking {
    /// Remember who is acting and find them again in the re-sorted roster;
    /// fall back to index wrapping when they are gone
    #[default]
    Participant,
    /// Treat `current_turn` as a plain index into whatever the sorted roster
    /// looks like at read time
    Index,
}

/// Initiative order: descending initiative, ties by descending turn order
pub fn initiative_order(a: &Participant, b: &Participant) -> Ordering {
    b.initiative
        .cmp(&a.initiative)
        .then_with(|| b.turn_order.cmp(&a.turn_order))
        .then_with(|| a.id.cmp(&b.id))
}

/// An encounter together with every participant row it owns, active or not
#[derive(Debug, Clone)]
pub struct Roster {
    pub encounter: Encounter,
    pub participants: Vec<Participant>,
}

impl Roster {
    pub fn new(encounter: Encounter, participants: Vec<Participant>) -> Self {
        Self {
            encounter,
            participants,
        }
    }

    /// Active participants in turn order
    pub fn sorted_active(&self) -> Vec<&Participant> {
        let mut active: Vec<&Participant> = self.participants.iter().filter(|p| p.active).collect();
        active.sort_by(|a, b| initiative_order(a, b));
        active
    }

    pub fn active_count(&self) -> usize {
        self.participants.iter().filter(|p| p.active).count()
    }

    /// Index into `sorted_active()` of whoever is acting now
    pub fn resolve_turn(&self, tracking: TurnTracking) -> Option<usize> {
        let sorted = self.sorted_active();
        if sorted.is_empty() {
            return None;
        }

        if tracking == TurnTracking::Participant {
            if let Some(marker) = self.encounter.current_participant_id {
                if let Some(pos) = sorted.iter().position(|p| p.id == marker) {
                    return Some(pos);
                }
            }
        }

        let turn = self.encounter.current_turn.max(0) as usize;
        Some(turn % sorted.len())
    }

    /// The participant whose turn it is
    pub fn current_actor(&self, tracking: TurnTracking) -> Option<&Participant> {
        let idx = self.resolve_turn(tracking)?;
        self.sorted_active().get(idx).copied()
    }

    /// Move to the next participant, wrapping into a new round
    pub fn advance(&mut self, tracking: TurnTracking) -> CombatResult<()> {
        let count = self.active_count();
        if count == 0 {
            return Err(CombatError::NoParticipants);
        }

        let current = self.resolve_turn(tracking).unwrap_or(0);
        let next = (current + 1) % count;
        if next == 0 {
            self.encounter.round_number += 1;
        }
        self.set_turn(next);
        Ok(())
    }

    /// Bring the turn pointer back in range after the roster changed
    pub fn normalize_turn(&mut self, tracking: TurnTracking) {
        match self.resolve_turn(tracking) {
            Some(idx) => self.set_turn(idx),
            None => {
                self.encounter.current_turn = 0;
                self.encounter.current_participant_id = None;
            }
        }
    }

    /// Point at the top of the order, as at the start of combat
    pub fn reset_turn(&mut self) {
        self.encounter.round_number = 1;
        if self.active_count() == 0 {
            self.encounter.current_turn = 0;
            self.encounter.current_participant_id = None;
        } else {
            self.set_turn(0);
        }
    }

    fn set_turn(&mut self, idx: usize) {
        let marker = self.sorted_active().get(idx).map(|p| p.id);
        self.encounter.current_turn = idx as i64;
        self.encounter.current_participant_id = marker;
    }

    pub fn participant(&self, id: i64) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn participant_mut(&mut self, id: i64) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.id == id)
    }

    /// An active participant of this encounter, or NotFound
    pub fn active_participant(&self, id: i64) -> CombatResult<&Participant> {
        self.participant(id)
            .filter(|p| p.active)
            .ok_or_else(|| CombatError::participant_not_found(id))
    }

    pub fn require_active(&self) -> CombatResult<()> {
        if self.encounter.active {
            Ok(())
        } else {
            Err(CombatError::InvalidState(format!(
                "encounter {} is not active",
                self.encounter.id
            )))
        }
    }
}
