use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::items;
use crate::price::Price;
use crate::{RandomiserError, Result};

/// Slot count is fixed by the patcher; inventories may still hold holes.
pub const SHOP_SLOTS: usize = 3;

pub const SHOP_ID_START: u32 = 0x400000;

const CONFIG_DOOR_IGNORED: u8 = 0x40;
const CONFIG_TAKE_ANY: u8 = 0x80;
const CONFIG_ALT_VRAM: u8 = 0x10;
const CONFIG_COUNT_MASK: u8 = 0x0F;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ShopKind {
    Standard,
    TakeAny,
    UpgradeShop,
}

impl ShopKind {
    /// Bits this kind contributes to the config byte.
    pub fn config_bits(self) -> u8 {
        match self {
            ShopKind::Standard => 0,
            ShopKind::TakeAny => CONFIG_TAKE_ANY,
            ShopKind::UpgradeShop => CONFIG_ALT_VRAM,
        }
    }

    /// Items that cannot be sold by this kind of shop.
    pub fn blacklists(self, item_name: &str) -> bool {
        match self {
            ShopKind::Standard | ShopKind::TakeAny => false,
            ShopKind::UpgradeShop => items::is_potion(item_name),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotEntry {
    pub item: String,
    pub price: Price,
    /// 0 means unlimited.
    pub max: u8,
    pub replacement: Option<String>,
    pub replacement_price: Price,
    pub create_location: bool,
    pub player: u32,
}

impl SlotEntry {
    pub fn new(item: impl Into<String>, price: Price) -> Self {
        SlotEntry {
            item: item.into(),
            price,
            max: 0,
            replacement: None,
            replacement_price: Price::FREE,
            create_location: false,
            player: 0,
        }
    }

    pub fn with_max(mut self, max: u8) -> Self {
        self.max = max;
        self
    }

    pub fn with_replacement(mut self, item: impl Into<String>, price: Price) -> Self {
        self.replacement = Some(item.into());
        self.replacement_price = price;
        self
    }

    pub fn with_player(mut self, player: u32) -> Self {
        self.player = player;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shop {
    pub region: usize,
    pub room_id: u16,
    pub kind: ShopKind,
    pub shopkeeper_config: u8,
    pub custom: bool,
    pub locked: bool,
    pub sram_offset: u8,
    pub inventory: [Option<SlotEntry>; SHOP_SLOTS],
}

impl Shop {
    pub fn from_template(region: usize, template: &ShopTemplate) -> Self {
        Shop {
            region,
            room_id: template.room_id,
            kind: template.kind,
            shopkeeper_config: template.shopkeeper,
            custom: template.custom,
            locked: template.locked,
            sram_offset: template.sram_offset,
            inventory: Default::default(),
        }
    }

    /// Highest occupied slot + 1; holes before it still count.
    pub fn item_count(&self) -> usize {
        self.inventory
            .iter()
            .rposition(|slot| slot.is_some())
            .map_or(0, |idx| idx + 1)
    }

    pub fn has(&self, item: &str) -> bool {
        self.inventory.iter().flatten().any(|entry| {
            entry.item == item || entry.replacement.as_deref() == Some(item)
        })
    }

    pub fn has_unlimited(&self, item: &str) -> bool {
        self.inventory.iter().flatten().any(|entry| {
            if entry.max != 0 {
                entry.replacement.as_deref() == Some(item)
            } else {
                entry.item == item
            }
        })
    }

    pub fn clear_inventory(&mut self) {
        self.inventory = Default::default();
    }

    fn check_slot(&self, slot: usize) -> Result<()> {
        if slot >= SHOP_SLOTS {
            return Err(RandomiserError::SlotOutOfRange {
                room_id: self.room_id,
                slot,
            });
        }
        Ok(())
    }

    /// Overwrite a slot unconditionally.
    pub fn add_inventory(&mut self, slot: usize, entry: SlotEntry) -> Result<()> {
        self.check_slot(slot)?;
        self.inventory[slot] = Some(entry);
        Ok(())
    }

    /// Sell `item` in `slot`, demoting the current offering to the
    /// replacement sold once the new one runs out.
    pub fn push_inventory(
        &mut self,
        slot: usize,
        item: &str,
        price: Price,
        max: u8,
        player: u32,
    ) -> Result<()> {
        self.check_slot(slot)?;
        let Some(previous) = self.inventory[slot].take() else {
            return Err(RandomiserError::InvalidState {
                room_id: self.room_id,
                slot,
            });
        };

        if previous.replacement.is_some() {
            warn!(
                "Shop room 0x{:04X} slot {} already has an item pushed into it",
                self.room_id, slot
            );
        }

        self.inventory[slot] = Some(SlotEntry {
            item: item.to_string(),
            price,
            max,
            replacement: Some(previous.item),
            replacement_price: previous.price,
            create_location: previous.create_location,
            player,
        });
        Ok(())
    }

    pub fn can_push_inventory(&self, slot: usize) -> bool {
        matches!(self.inventory.get(slot), Some(Some(entry)) if entry.replacement.is_none())
    }

    /// Fixed 8-byte patcher record:
    /// `[0][room lo][room hi][door][0][config][shopkeeper][0]`.
    pub fn to_bytes(
        &self,
        entrances: &[String],
        door_addresses: &HashMap<String, u8>,
    ) -> Result<[u8; 8]> {
        let mut config = self.item_count() as u8;

        let door_id = match entrances {
            [entrance] if door_addresses.contains_key(entrance) => {
                let address = door_addresses[entrance];
                address.checked_add(1).ok_or_else(|| {
                    RandomiserError::Config(format!(
                        "door address 0x{:02X} for '{}' does not fit a door id",
                        address, entrance
                    ))
                })?
            }
            _ => {
                config |= CONFIG_DOOR_IGNORED;
                0
            }
        };

        config |= self.kind.config_bits();

        let [room_lo, room_hi] = self.room_id.to_le_bytes();
        Ok([
            0x00,
            room_lo,
            room_hi,
            door_id,
            0x00,
            config,
            self.shopkeeper_config,
            0x00,
        ])
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ShopConfig {
    pub item_count: usize,
    pub door_ignored: bool,
    pub take_any: bool,
    pub alt_vram: bool,
}

pub fn decode_config_byte(config: u8) -> ShopConfig {
    ShopConfig {
        item_count: (config & CONFIG_COUNT_MASK) as usize,
        door_ignored: config & CONFIG_DOOR_IGNORED != 0,
        take_any: config & CONFIG_TAKE_ANY != 0,
        alt_vram: config & CONFIG_ALT_VRAM != 0,
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TemplateItem {
    pub item: &'static str,
    pub price: u16,
    pub max: u8,
}

const fn ti(item: &'static str, price: u16) -> TemplateItem {
    TemplateItem { item, price, max: 0 }
}

const fn ti_max(item: &'static str, price: u16, max: u8) -> TemplateItem {
    TemplateItem { item, price, max }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ShopTemplate {
    pub region: &'static str,
    pub room_id: u16,
    pub kind: ShopKind,
    pub shopkeeper: u8,
    pub custom: bool,
    pub locked: bool,
    pub items: Vec<TemplateItem>,
    pub sram_offset: u8,
}

pub const BASIC_SHOP_DEFAULTS: &[TemplateItem] =
    &[ti("Red Potion", 150), ti("Small Heart", 10), ti("Bombs (10)", 50)];
pub const DARK_WORLD_SHOP_DEFAULTS: &[TemplateItem] =
    &[ti("Red Potion", 150), ti("Blue Shield", 50), ti("Bombs (10)", 50)];
pub const INVERTED_HYLIA_SHOP_DEFAULTS: &[TemplateItem] =
    &[ti("Blue Potion", 160), ti("Blue Shield", 50), ti("Bombs (10)", 50)];

fn template(
    region: &'static str,
    room_id: u16,
    kind: ShopKind,
    shopkeeper: u8,
    locked: bool,
    items: &[TemplateItem],
    sram_offset: u8,
) -> ShopTemplate {
    ShopTemplate {
        region,
        room_id,
        kind,
        shopkeeper,
        custom: true,
        locked,
        items: items.to_vec(),
        sram_offset,
    }
}

pub fn shop_table() -> Vec<ShopTemplate> {
    use ShopKind::{Standard, UpgradeShop};

    vec![
        template("Cave Shop (Dark Death Mountain)", 0x0112, Standard, 0xC1, false, BASIC_SHOP_DEFAULTS, 0),
        template(
            "Red Shield Shop",
            0x0110,
            Standard,
            0xC1,
            false,
            &[ti("Red Shield", 500), ti("Bee", 10), ti("Arrows (10)", 30)],
            3,
        ),
        template("Dark Lake Hylia Shop", 0x010F, Standard, 0xC1, false, DARK_WORLD_SHOP_DEFAULTS, 6),
        template("Dark World Lumberjack Shop", 0x010F, Standard, 0xC1, false, DARK_WORLD_SHOP_DEFAULTS, 9),
        template("Village of Outcasts Shop", 0x010F, Standard, 0xC1, false, DARK_WORLD_SHOP_DEFAULTS, 12),
        template("Dark World Potion Shop", 0x010F, Standard, 0xC1, false, DARK_WORLD_SHOP_DEFAULTS, 15),
        template("Light World Death Mountain Shop", 0x00FF, Standard, 0xA0, false, BASIC_SHOP_DEFAULTS, 18),
        template("Kakariko Shop", 0x011F, Standard, 0xA0, false, BASIC_SHOP_DEFAULTS, 21),
        template("Cave Shop (Lake Hylia)", 0x0112, Standard, 0xA0, false, BASIC_SHOP_DEFAULTS, 24),
        template(
            "Potion Shop",
            0x0109,
            Standard,
            0xA0,
            true,
            &[ti("Red Potion", 120), ti("Green Potion", 60), ti("Blue Potion", 160)],
            27,
        ),
        template(
            "Capacity Upgrade",
            0x0115,
            UpgradeShop,
            0x04,
            true,
            &[ti_max("Bomb Upgrade (+5)", 100, 7), ti_max("Arrow Upgrade (+5)", 100, 7)],
            30,
        ),
    ]
}

const GEN_ARROWS: &[TemplateItem] = &[ti("Arrows (10)", 50), ti("Arrows (10)", 50)];
const GEN_BOMBS: &[TemplateItem] = &[ti("Single Bomb", 10), ti("Bombs (3)", 30), ti("Bombs (10)", 50)];
const GEN_SHIELDS: &[TemplateItem] = &[ti("Red Shield", 500), ti("Blue Shield", 50)];
const GEN_POTIONS: &[TemplateItem] =
    &[ti("Red Potion", 150), ti("Green Potion", 90), ti("Blue Potion", 190)];
const GEN_DISCOUNT_POTIONS: &[TemplateItem] =
    &[ti("Red Potion", 120), ti("Green Potion", 60), ti("Blue Potion", 160)];
const GEN_BOTTLE: &[TemplateItem] = &[
    ti("Small Heart", 10),
    ti("Apple", 50),
    ti("Bee", 10),
    ti("Good Bee", 100),
    ti("Faerie", 100),
    ti("Magic Jar", 100),
];
const GEN_TIME: &[TemplateItem] = &[ti("Red Clock", 100), ti("Blue Clock", 200), ti("Green Clock", 300)];

/// Named groups the `g`/`f` options draw new default inventories from.
pub fn shop_generation_group(name: &str) -> &'static [TemplateItem] {
    match name {
        "arrows" => GEN_ARROWS,
        "bombs" => GEN_BOMBS,
        "shields" => GEN_SHIELDS,
        "potions" => GEN_POTIONS,
        "discount_potions" => GEN_DISCOUNT_POTIONS,
        "bottle" => GEN_BOTTLE,
        "time" => GEN_TIME,
        _ => &[],
    }
}

pub fn slot_location_name(region: &str, slot: usize) -> String {
    format!("{} Slot {}", region, slot + 1)
}

/// Stable numeric ids for every purchasable slot, plus the extra
/// take-any style locations that share the id range.
#[derive(Clone, Debug, Default)]
pub struct ShopLocationTable {
    pub by_id: BTreeMap<u32, String>,
    pub by_name: HashMap<String, u32>,
}

impl ShopLocationTable {
    pub fn from_table(table: &[ShopTemplate]) -> Self {
        let mut ordered: Vec<&ShopTemplate> = table.iter().collect();
        ordered.sort_by_key(|shop| shop.sram_offset);

        let mut by_id = BTreeMap::new();
        let mut next_id = SHOP_ID_START;
        for shop in ordered {
            for slot in 0..SHOP_SLOTS {
                by_id.insert(next_id, slot_location_name(shop.region, slot));
                next_id += 1;
            }
        }

        let extras = [
            "Old Man Sword Cave",
            "Take-Any #1",
            "Take-Any #2",
            "Take-Any #3",
            "Take-Any #4",
        ];
        for name in extras {
            by_id.insert(next_id, name.to_string());
            next_id += 1;
        }

        let by_name = by_id.iter().map(|(id, name)| (name.clone(), *id)).collect();
        ShopLocationTable { by_id, by_name }
    }

    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, id: u32) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }
}
