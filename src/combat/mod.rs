//! Combat encounter module
//!
//! Implements turn-based tabletop combat with:
//! - Dice rolling (e.g., "2d6+3") from one seedable source
//! - Initiative ordering with a fixed tie-break
//! - Turn and round tracking
//! - Damage, healing and status conditions with clamped HP
//! - A single active encounter at a time

mod actions;
mod conditions;
mod dice;
mod encounter;
mod error;
mod initiative;
mod manager;
mod registry;
mod store;

pub use actions::{apply_action, Action, ActionKind, ActionOutcome};
pub use conditions::ConditionSet;
pub use dice::{parse_dice, Dice, DiceRoll, DEFAULT_ATTACK_DICE};
pub use encounter::{initiative_order, Combatant, Encounter, Participant, Roster, TurnTracking};
pub use error::{CombatError, CombatResult};
pub use initiative::{ability_modifier, roll_initiative};
pub use manager::{EncounterManager, ParticipantView};
pub use registry::{CombatantRegistry, NewCombatant};
pub use store::LogEntry;
