use serde::{Deserialize, Serialize};

use crate::{RandomiserError, Result};

/// A concrete item owned by a player.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub player: u32,
}

impl std::fmt::Display for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (Player {})", self.name, self.player)
    }
}

/// Every item name the world input may use.
pub(crate) const ITEM_TABLE: &[&str] = &[
    // Progression
    "Progressive Sword",
    "Progressive Glove",
    "Bow",
    "Hookshot",
    "Lamp",
    "Hammer",
    "Fire Rod",
    "Ice Rod",
    "Flippers",
    "Moon Pearl",
    "Pegasus Boots",
    "Magic Mirror",
    "Bottle",
    "Small Key",
    "Big Key",
    "Small Key (Universal)",
    // Useful
    "Blue Shield",
    "Red Shield",
    "Boss Heart Container",
    "Sanctuary Heart Container",
    "Piece of Heart",
    "Bomb Upgrade (+5)",
    "Bomb Upgrade (+10)",
    "Arrow Upgrade (+5)",
    "Arrow Upgrade (+10)",
    "Compass",
    "Map",
    // Filler
    "Nothing",
    "Rupee (1)",
    "Rupees (5)",
    "Rupees (20)",
    "Rupees (50)",
    "Rupees (100)",
    "Rupees (300)",
    "Single Bomb",
    "Bombs (3)",
    "Bombs (10)",
    "Single Arrow",
    "Arrows (10)",
    "Small Heart",
    "Apple",
    "Magic Jar",
    "Bee",
    "Good Bee",
    "Faerie",
    "Red Potion",
    "Green Potion",
    "Blue Potion",
    "Red Clock",
    "Blue Clock",
    "Green Clock",
];

/// Items that break inside the upgrade shop because of its VRAM flags.
pub const POTIONS: &[&str] = &["Red Potion", "Green Potion", "Blue Potion"];

/// Filler that the capacity-upgrade shuffle may overwrite in the item pool.
pub const TRAP_REPLACEABLE: &[&str] = &[
    "Rupees (300)",
    "Rupees (100)",
    "Rupees (50)",
    "Rupees (20)",
    "Rupees (5)",
    "Rupee (1)",
    "Bombs (10)",
    "Bombs (3)",
    "Arrows (10)",
    "Nothing",
];

const SWAP_BLACKLIST_WORDS: &[&str] = &["Rupee"];
const SWAP_BLACKLIST_NAMES: &[&str] = &["Bee"];

pub(crate) fn lookup_item(name: &str) -> Option<&'static str> {
    ITEM_TABLE.iter().copied().find(|&known| known == name)
}

pub fn make_item(name: &str, player: u32) -> Result<Item> {
    let known = lookup_item(name)
        .ok_or_else(|| RandomiserError::Config(format!("unknown item '{}'", name)))?;
    Ok(Item {
        name: known.to_string(),
        player,
    })
}

pub fn is_potion(name: &str) -> bool {
    POTIONS.contains(&name)
}

pub fn is_trap_replaceable(name: &str) -> bool {
    TRAP_REPLACEABLE.contains(&name)
}

/// Items that must never be pulled out of the world and into a shop slot.
pub fn is_swap_blacklisted(name: &str) -> bool {
    if SWAP_BLACKLIST_NAMES.contains(&name) {
        return true;
    }
    lookup_item(name).is_some()
        && SWAP_BLACKLIST_WORDS.iter().any(|word| name.contains(word))
}
