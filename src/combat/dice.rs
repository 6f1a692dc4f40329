//! Dice rolling
//!
//! Parses dice notation like "2d6+3", "1d20", "4d6-2" and rolls it against a
//! shared, seedable random source so that initiative and attack damage can be
//! made deterministic in tests.

use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Default damage for an `attack` action that doesn't specify its own dice
pub const DEFAULT_ATTACK_DICE: DiceRoll = DiceRoll {
    count: 1,
    sides: 8,
    modifier: 0,
};

/// A parsed dice roll specification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceRoll {
    /// Number of dice to roll
    pub count: u32,
    /// Number of sides per die
    pub sides: u32,
    /// Modifier to add/subtract
    pub modifier: i32,
}

impl DiceRoll {
    /// Create a new dice roll
    pub fn new(count: u32, sides: u32, modifier: i32) -> Self {
        Self {
            count,
            sides,
            modifier,
        }
    }

    /// Get the minimum possible result
    pub fn min(&self) -> i32 {
        self.count as i32 + self.modifier
    }

    /// Get the maximum possible result
    pub fn max(&self) -> i32 {
        (self.count * self.sides) as i32 + self.modifier
    }
}

impl FromStr for DiceRoll {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_dice(s)
    }
}

impl std::fmt::Display for DiceRoll {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.modifier > 0 {
            write!(f, "{}d{}+{}", self.count, self.sides, self.modifier)
        } else if self.modifier < 0 {
            write!(f, "{}d{}{}", self.count, self.sides, self.modifier)
        } else {
            write!(f, "{}d{}", self.count, self.sides)
        }
    }
}

/// Largest pool we accept from user input; keeps any roll well inside i32
const MAX_DICE: u32 = 100;
const MAX_SIDES: u32 = 1000;
const MAX_MODIFIER: i32 = 1000;

/// Parse a dice notation string like "2d6+3"
pub fn parse_dice(notation: &str) -> Result<DiceRoll, String> {
    let notation = notation.trim().to_lowercase();

    let d_pos = notation.find('d').ok_or("Missing 'd' in dice notation")?;

    let count_str = &notation[..d_pos];
    let count: u32 = if count_str.is_empty() {
        1 // "d6" means "1d6"
    } else {
        count_str
            .parse()
            .map_err(|_| format!("Invalid dice count: {}", count_str))?
    };

    if count == 0 {
        return Err("Dice count must be at least 1".to_string());
    }
    if count > MAX_DICE {
        return Err(format!("Dice count must be at most {}", MAX_DICE));
    }

    let rest = &notation[d_pos + 1..];

    let (sides_str, modifier) = if let Some(plus_pos) = rest.find('+') {
        let mod_str = &rest[plus_pos + 1..];
        let modifier: i32 = mod_str
            .parse()
            .map_err(|_| format!("Invalid modifier: {}", mod_str))?;
        (&rest[..plus_pos], modifier)
    } else if let Some(minus_pos) = rest.rfind('-') {
        if minus_pos == 0 {
            (rest, 0)
        } else {
            let mod_str = &rest[minus_pos..]; // keeps the sign
            let modifier: i32 = mod_str
                .parse()
                .map_err(|_| format!("Invalid modifier: {}", mod_str))?;
            (&rest[..minus_pos], modifier)
        }
    } else {
        (rest, 0)
    };

    let sides: u32 = sides_str
        .parse()
        .map_err(|_| format!("Invalid die sides: {}", sides_str))?;

    if sides == 0 {
        return Err("Die sides must be at least 1".to_string());
    }
    if sides > MAX_SIDES {
        return Err(format!("Die sides must be at most {}", MAX_SIDES));
    }
    if modifier.unsigned_abs() > MAX_MODIFIER.unsigned_abs() {
        return Err(format!("Modifier must be between -{0} and {0}", MAX_MODIFIER));
    }

    Ok(DiceRoll {
        count,
        sides,
        modifier,
    })
}

/// Shared random source for every roll the server makes.
///
/// Cloning is cheap and clones share the same generator, so a seeded `Dice`
/// produces one reproducible stream no matter which component draws from it.
#[derive(Debug, Clone)]
pub struct Dice {
    rng: Arc<Mutex<StdRng>>,
}

impl Dice {
    /// Dice seeded from the operating system
    pub fn from_entropy() -> Self {
        Self::from_rng(StdRng::from_os_rng())
    }

    /// Deterministic dice for tests and replays
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng: Arc::new(Mutex::new(rng)),
        }
    }

    /// Roll a single die with the given number of sides
    pub fn die(&self, sides: u32) -> u32 {
        self.rng.lock().random_range(1..=sides)
    }

    /// Roll a single d20
    pub fn d20(&self) -> u32 {
        self.die(20)
    }

    /// Roll a full dice expression and return the total
    pub fn roll(&self, roll: &DiceRoll) -> i32 {
        let mut rng = self.rng.lock();
        let mut total: i32 = 0;

        for _ in 0..roll.count {
            total = total.saturating_add(rng.random_range(1..=roll.sides) as i32);
        }

        total.saturating_add(roll.modifier)
    }
}

impl Default for Dice {
    fn default() -> Self {
        Self::from_entropy()
    }
}
