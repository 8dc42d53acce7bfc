use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::KeyShuffle;

const TAG_BIT: u16 = 0x8000;

/// The unit a shop price is paid in.
///
/// Anything other than `Rupees` is written with the tag bit set and the unit
/// index in bits 8..15, leaving the low byte for the amount.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum PriceUnit {
    Rupees,
    Hearts,
    Magic,
    Bombs,
    Arrows,
    HeartContainers,
    BombCapacity,
    ArrowCapacity,
    Keys,
    Potion,
}

impl PriceUnit {
    fn tag(self) -> Option<u16> {
        match self {
            PriceUnit::Rupees => None,
            PriceUnit::Hearts => Some(0),
            PriceUnit::Magic => Some(1),
            PriceUnit::Bombs => Some(2),
            PriceUnit::Arrows => Some(3),
            PriceUnit::HeartContainers => Some(4),
            PriceUnit::BombCapacity => Some(5),
            PriceUnit::ArrowCapacity => Some(6),
            PriceUnit::Keys => Some(7),
            PriceUnit::Potion => Some(8),
        }
    }

    fn from_tag(tag: u16) -> Option<PriceUnit> {
        match tag {
            0 => Some(PriceUnit::Hearts),
            1 => Some(PriceUnit::Magic),
            2 => Some(PriceUnit::Bombs),
            3 => Some(PriceUnit::Arrows),
            4 => Some(PriceUnit::HeartContainers),
            5 => Some(PriceUnit::BombCapacity),
            6 => Some(PriceUnit::ArrowCapacity),
            7 => Some(PriceUnit::Keys),
            8 => Some(PriceUnit::Potion),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Price {
    pub amount: u16,
    pub unit: PriceUnit,
}

impl Price {
    pub const FREE: Price = Price::rupees(0);

    pub const fn rupees(amount: u16) -> Price {
        Price {
            amount,
            unit: PriceUnit::Rupees,
        }
    }

    pub const fn new(amount: u16, unit: PriceUnit) -> Price {
        Price { amount, unit }
    }

    pub fn is_free(&self) -> bool {
        self.amount == 0
    }

    /// 16-bit value as the patcher reads it. Amounts saturate at the
    /// largest value their encoding can hold.
    pub fn to_raw(self) -> u16 {
        match self.unit.tag() {
            None => self.amount.min(!TAG_BIT),
            Some(tag) => TAG_BIT | (tag << 8) | self.amount.min(0xFF),
        }
    }

    pub fn from_raw(raw: u16) -> Option<Price> {
        if raw & TAG_BIT == 0 {
            return Some(Price::rupees(raw));
        }
        let unit = PriceUnit::from_tag((raw >> 8) & 0x7F)?;
        Some(Price::new(raw & 0xFF, unit))
    }
}

impl Default for Price {
    fn default() -> Self {
        Price::FREE
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.unit {
            PriceUnit::Rupees => write!(f, "{} rupees", self.amount),
            unit => write!(f, "{} {:?}", self.amount, unit),
        }
    }
}

/// Price categories in the order that defines their tag index.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PriceCategory {
    Rupee,
    Heart,
    Magic,
    Bomb,
    Arrow,
    HeartContainer,
    BombCapacity,
    ArrowCapacity,
    Key,
    Potion,
}

impl PriceCategory {
    pub const ALL: [PriceCategory; 10] = [
        PriceCategory::Rupee,
        PriceCategory::Heart,
        PriceCategory::Magic,
        PriceCategory::Bomb,
        PriceCategory::Arrow,
        PriceCategory::HeartContainer,
        PriceCategory::BombCapacity,
        PriceCategory::ArrowCapacity,
        PriceCategory::Key,
        PriceCategory::Potion,
    ];

    /// Item name fragments that may not be bought with this category.
    fn exclusions(self) -> &'static [&'static str] {
        match self {
            PriceCategory::Rupee => &["Rupees"],
            PriceCategory::Heart => &["Small Heart", "Apple"],
            PriceCategory::Magic => &["Magic Jar"],
            PriceCategory::Bomb => &["Bombs", "Single Bomb"],
            PriceCategory::Arrow => &["Arrows", "Single Arrow"],
            _ => &[],
        }
    }

    fn excludes(self, item_name: &str) -> bool {
        self.exclusions()
            .iter()
            .any(|fragment| item_name.contains(fragment))
    }

    fn remap<R: Rng + ?Sized>(self, units: u16, key_shuffle: KeyShuffle, rng: &mut R) -> Price {
        match self {
            PriceCategory::Rupee | PriceCategory::BombCapacity | PriceCategory::ArrowCapacity => {
                Price::rupees(units.saturating_mul(5))
            }
            PriceCategory::Key if key_shuffle != KeyShuffle::Universal => {
                Price::rupees(units.saturating_mul(5))
            }
            PriceCategory::Key => Price::new((units / 8).clamp(1, 3), PriceUnit::Keys),
            PriceCategory::Heart => Price::new(units.min(0x10) * 4, PriceUnit::Hearts),
            PriceCategory::Magic => Price::new(units.min(0x20) * 4, PriceUnit::Magic),
            PriceCategory::Bomb => Price::new((units / 4).min(10), PriceUnit::Bombs),
            PriceCategory::Arrow => Price::new((units / 2).min(30), PriceUnit::Arrows),
            PriceCategory::HeartContainer => {
                Price::new((units / 8).clamp(1, 3) * 8, PriceUnit::HeartContainers)
            }
            PriceCategory::Potion => Price::new(rng.gen_range(0..6), PriceUnit::Potion),
        }
    }
}

/// Randomize a rupee price while keeping its order of magnitude.
///
/// A price of 0 stays 0.
pub fn price_adjust<R: Rng + ?Sized>(price: u16, rng: &mut R) -> u16 {
    let adjust: u32 = if price < 100 { 2 } else { 5 };
    let factor = 0.5 + rng.gen::<f64>() * 1.5;
    let scaled = ((price as f64 / adjust as f64) * factor) as u32 * adjust;
    scaled.min(u16::MAX as u32) as u16
}

/// Re-express a rupee price in a randomly chosen unit the item may be
/// bought with.
///
/// `None` for the item means an empty replacement and returns the price
/// untouched without drawing.
pub fn funny_price<R: Rng + ?Sized>(
    price: u16,
    item_name: Option<&str>,
    key_shuffle: KeyShuffle,
    rng: &mut R,
) -> Price {
    let Some(item_name) = item_name else {
        return Price::rupees(price);
    };

    let units = (price / 5).max(1);
    let mut order = PriceCategory::ALL;
    order.shuffle(rng);

    let encoded = match order.iter().find(|category| !category.excludes(item_name)) {
        Some(category) => category.remap(units, key_shuffle, rng),
        None => Price::rupees(units),
    };

    // Draws above still happen for free items so the stream stays aligned.
    if price == 0 {
        return Price::FREE;
    }
    encoded
}

/// `price_adjust` followed by `funny_price`.
pub fn encode_price<R: Rng + ?Sized>(
    price: u16,
    item_name: Option<&str>,
    key_shuffle: KeyShuffle,
    rng: &mut R,
) -> Price {
    let adjusted = price_adjust(price, rng);
    funny_price(adjusted, item_name, key_shuffle, rng)
}

/// Base rupee price for an item freshly moved into a shop slot.
pub fn draw_slot_price<R: Rng + ?Sized>(item_name: &str, rng: &mut R) -> u16 {
    let matches = |fragments: &[&str]| fragments.iter().any(|f| item_name.contains(f));

    let base: u16 = if matches(&["Single Bomb", "Single Arrow", "Piece of Heart"]) {
        rng.gen_range(1..7)
    } else if matches(&["Arrow", "Bomb", "Clock"]) {
        rng.gen_range(2..14)
    } else if matches(&["Compass", "Map", "Small Key", "Clock", "Heart"]) {
        rng.gen_range(4..28)
    } else {
        rng.gen_range(8..56)
    };

    base * 5
}
