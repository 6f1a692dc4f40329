//! Combat actions
//!
//! Typed actions applied by one participant to another: attacks, raw damage,
//! healing, conditions and a handful of narrative actions that only leave an
//! entry in the encounter log. Applying an action never advances the turn.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::conditions::ConditionSet;
use super::dice::{parse_dice, Dice, DiceRoll, DEFAULT_ATTACK_DICE};
use super::encounter::Roster;
use super::error::{CombatError, CombatResult};

/// Kinds of action a participant can take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Roll damage against a target
    Attack,
    /// Apply a fixed amount of damage
    Damage,
    /// Restore hit points
    Heal,
    /// Put a status condition on a target
    Condition,
    /// Take the defensive stance; bookkeeping only
    Defend,
    /// Cast a spell; bookkeeping only
    Spell,
    /// Use an item; bookkeeping only
    Item,
    /// Anything else, described in free text
    Other,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Attack => "attack",
            ActionKind::Damage => "damage",
            ActionKind::Heal => "heal",
            ActionKind::Condition => "condition",
            ActionKind::Defend => "defend",
            ActionKind::Spell => "spell",
            ActionKind::Item => "item",
            ActionKind::Other => "other",
        }
    }

    /// Actions after which a table usually moves on to the next turn
    pub fn ends_turn(&self) -> bool {
        matches!(
            self,
            ActionKind::Attack
                | ActionKind::Defend
                | ActionKind::Spell
                | ActionKind::Item
                | ActionKind::Other
        )
    }
}

impl FromStr for ActionKind {
    type Err = CombatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "attack" => Ok(ActionKind::Attack),
            "damage" => Ok(ActionKind::Damage),
            "heal" => Ok(ActionKind::Heal),
            "condition" => Ok(ActionKind::Condition),
            "defend" => Ok(ActionKind::Defend),
            "spell" => Ok(ActionKind::Spell),
            "item" => Ok(ActionKind::Item),
            "other" | "custom" => Ok(ActionKind::Other),
            _ => Err(CombatError::UnsupportedAction(s.to_string())),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated action, ready to apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Attack { target: i64, dice: DiceRoll },
    Damage { target: i64, amount: i64 },
    Heal { target: i64, amount: i64 },
    Condition { target: i64, label: String },
    Defend,
    /// Spell, item and free-form actions
    Narrative {
        kind: ActionKind,
        target: Option<i64>,
        description: Option<String>,
    },
}

#[derive(Debug, Default, Deserialize)]
struct AttackPayload {
    dice: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AmountPayload {
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct ConditionPayload {
    label: String,
}

#[derive(Debug, Default, Deserialize)]
struct NarrativePayload {
    description: Option<String>,
}

fn payload<T: for<'de> Deserialize<'de>>(kind: ActionKind, value: &Value) -> CombatResult<T> {
    let value = if value.is_null() {
        Value::Object(Default::default())
    } else {
        value.clone()
    };
    serde_json::from_value(value)
        .map_err(|e| CombatError::Validation(format!("invalid {} payload: {}", kind, e)))
}

fn positive(kind: ActionKind, amount: i64) -> CombatResult<i64> {
    if amount > 0 {
        Ok(amount)
    } else {
        Err(CombatError::Validation(format!(
            "{} amount must be positive, got {}",
            kind, amount
        )))
    }
}

impl Action {
    /// Validate a raw action request
    pub fn parse(kind: &str, target: Option<i64>, body: &Value) -> CombatResult<Self> {
        let kind: ActionKind = kind.parse()?;

        let target_id = || {
            target.ok_or_else(|| CombatError::Validation(format!("{} requires a target", kind)))
        };

        let action = match kind {
            ActionKind::Attack => {
                let p: AttackPayload = payload(kind, body)?;
                let dice = match p.dice {
                    Some(notation) => parse_dice(&notation).map_err(CombatError::Validation)?,
                    None => DEFAULT_ATTACK_DICE,
                };
                Action::Attack {
                    target: target_id()?,
                    dice,
                }
            }
            ActionKind::Damage => {
                let p: AmountPayload = payload(kind, body)?;
                Action::Damage {
                    target: target_id()?,
                    amount: positive(kind, p.amount)?,
                }
            }
            ActionKind::Heal => {
                let p: AmountPayload = payload(kind, body)?;
                Action::Heal {
                    target: target_id()?,
                    amount: positive(kind, p.amount)?,
                }
            }
            ActionKind::Condition => {
                let p: ConditionPayload = payload(kind, body)?;
                let label = p.label.trim().to_string();
                if label.is_empty() {
                    return Err(CombatError::Validation(
                        "condition label must not be empty".to_string(),
                    ));
                }
                Action::Condition {
                    target: target_id()?,
                    label,
                }
            }
            ActionKind::Defend => Action::Defend,
            ActionKind::Spell | ActionKind::Item | ActionKind::Other => {
                let p: NarrativePayload = payload(kind, body)?;
                Action::Narrative {
                    kind,
                    target,
                    description: p.description.filter(|d| !d.trim().is_empty()),
                }
            }
        };

        Ok(action)
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Attack { .. } => ActionKind::Attack,
            Action::Damage { .. } => ActionKind::Damage,
            Action::Heal { .. } => ActionKind::Heal,
            Action::Condition { .. } => ActionKind::Condition,
            Action::Defend => ActionKind::Defend,
            Action::Narrative { kind, .. } => *kind,
        }
    }

    pub fn target(&self) -> Option<i64> {
        match self {
            Action::Attack { target, .. }
            | Action::Damage { target, .. }
            | Action::Heal { target, .. }
            | Action::Condition { target, .. } => Some(*target),
            Action::Defend => None,
            Action::Narrative { target, .. } => *target,
        }
    }
}

/// What an applied action did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub encounter_id: i64,
    pub round_number: i64,
    pub actor_id: i64,
    pub kind: ActionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<i64>,
    /// Damage rolled by an attack
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rolled: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hp_before: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hp_after: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<ConditionSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Apply an action to the roster in place
pub fn apply_action(
    roster: &mut Roster,
    actor_id: i64,
    action: &Action,
    dice: &Dice,
) -> CombatResult<ActionOutcome> {
    roster.require_active()?;
    roster.active_participant(actor_id)?;
    if let Some(target) = action.target() {
        roster.active_participant(target)?;
    }

    let mut outcome = ActionOutcome {
        encounter_id: roster.encounter.id,
        round_number: roster.encounter.round_number,
        actor_id,
        kind: action.kind(),
        target_id: action.target(),
        rolled: None,
        hp_before: None,
        hp_after: None,
        conditions: None,
        description: None,
    };

    match action {
        Action::Attack { target, dice: roll } => {
            // A negative modifier can't turn an attack into healing
            let damage = i64::from(dice.roll(roll)).max(0);
            let p = target_mut(roster, *target)?;
            outcome.hp_before = Some(p.current_hp);
            p.take_damage(damage);
            outcome.hp_after = Some(p.current_hp);
            outcome.rolled = Some(damage);
        }
        Action::Damage { target, amount } => {
            let p = target_mut(roster, *target)?;
            outcome.hp_before = Some(p.current_hp);
            p.take_damage(*amount);
            outcome.hp_after = Some(p.current_hp);
        }
        Action::Heal { target, amount } => {
            let p = target_mut(roster, *target)?;
            outcome.hp_before = Some(p.current_hp);
            p.heal(*amount);
            outcome.hp_after = Some(p.current_hp);
        }
        Action::Condition { target, label } => {
            let p = target_mut(roster, *target)?;
            p.conditions.insert(label);
            outcome.conditions = Some(p.conditions.clone());
            outcome.description = Some(label.clone());
        }
        Action::Defend => {}
        Action::Narrative { description, .. } => {
            outcome.description = description.clone();
        }
    }

    Ok(outcome)
}

fn target_mut(roster: &mut Roster, id: i64) -> CombatResult<&mut super::encounter::Participant> {
    roster
        .participant_mut(id)
        .filter(|p| p.active)
        .ok_or_else(|| CombatError::participant_not_found(id))
}
