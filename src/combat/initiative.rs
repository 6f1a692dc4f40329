//! Initiative rolls

use super::dice::Dice;

/// Ability modifier for a score, rounding toward negative infinity (9 -> -1)
pub fn ability_modifier(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}

/// Roll initiative: d20 plus the dexterity modifier.
///
/// Used both when an encounter starts and when a combatant joins later.
pub fn roll_initiative(dice: &Dice, dexterity: i32) -> i32 {
    dice.d20() as i32 + ability_modifier(dexterity)
}
