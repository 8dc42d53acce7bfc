use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub mod fill;
pub mod items;
pub mod price;
pub mod setup;
pub mod shops;
pub mod world;

use fill::{fill_disabled_shop_slots, shop_slot_fill, FillReport};
use setup::{create_shops, set_up_shops, shuffle_shops};
use world::{World, WorldDescription};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomiserSettings {
    pub seed: u64,
    pub options: ShopOptions,
    pub debug: bool,
    /// World description JSON.
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShopOptions {
    pub shop_shuffle: String,
    pub shop_shuffle_slots: u32,
    pub retro: bool,
    pub key_shuffle: KeyShuffle,
    pub goal: Goal,
    pub mode: WorldMode,
    pub progressive: Progressive,
}

impl Default for ShopOptions {
    fn default() -> Self {
        ShopOptions {
            shop_shuffle: String::new(),
            shop_shuffle_slots: 0,
            retro: false,
            key_shuffle: KeyShuffle::Original,
            goal: Goal::Ganon,
            mode: WorldMode::Open,
            progressive: Progressive::On,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyShuffle {
    Original,
    Universal,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Goal {
    Ganon,
    IceRodHunt,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorldMode {
    Open,
    Standard,
    Inverted,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Progressive {
    On,
    Off,
    Random,
}

fn unknown_option(kind: &str, value: &str) -> RandomiserError {
    RandomiserError::Config(format!("unknown {} '{}'", kind, value))
}

impl FromStr for KeyShuffle {
    type Err = RandomiserError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "original" => Ok(KeyShuffle::Original),
            "universal" => Ok(KeyShuffle::Universal),
            _ => Err(unknown_option("key shuffle mode", s)),
        }
    }
}

impl FromStr for Goal {
    type Err = RandomiserError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ganon" => Ok(Goal::Ganon),
            "icerodhunt" => Ok(Goal::IceRodHunt),
            _ => Err(unknown_option("goal", s)),
        }
    }
}

impl FromStr for WorldMode {
    type Err = RandomiserError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(WorldMode::Open),
            "standard" => Ok(WorldMode::Standard),
            "inverted" => Ok(WorldMode::Inverted),
            _ => Err(unknown_option("world mode", s)),
        }
    }
}

impl FromStr for Progressive {
    type Err = RandomiserError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "on" => Ok(Progressive::On),
            "off" => Ok(Progressive::Off),
            "random" => Ok(Progressive::Random),
            _ => Err(unknown_option("progressive mode", s)),
        }
    }
}

/// Single-character toggles of the shop shuffle option string.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ShopShuffleFlags {
    /// `g`: new default inventories shared by same-default shops.
    pub generate_inventories: bool,
    /// `f`: new default inventories for every shop.
    pub full_inventories: bool,
    /// `i`: shuffle inventories between shops.
    pub inventories: bool,
    /// `p`: randomize prices.
    pub prices: bool,
    /// `u`: capacity upgrades.
    pub upgrades: bool,
    /// `w`: the Potion Shop takes part.
    pub include_potion_shop: bool,
}

impl ShopShuffleFlags {
    pub fn parse(option: &str) -> Result<Self> {
        let mut flags = ShopShuffleFlags::default();
        for c in option.chars() {
            match c {
                'g' => flags.generate_inventories = true,
                'f' => flags.full_inventories = true,
                'i' => flags.inventories = true,
                'p' => flags.prices = true,
                'u' => flags.upgrades = true,
                'w' => flags.include_potion_shop = true,
                _ => {
                    return Err(RandomiserError::Config(format!(
                        "unknown shop shuffle flag '{}' in '{}'",
                        c, option
                    )))
                }
            }
        }
        Ok(flags)
    }
}

#[derive(Debug, Error)]
pub enum RandomiserError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("shop 0x{room_id:04X} slot {slot} is empty and cannot be pushed")]
    InvalidState { room_id: u16, slot: usize },
    #[error("shop 0x{room_id:04X} has no slot {slot}")]
    SlotOutOfRange { room_id: u16, slot: usize },
}

pub type Result<T> = std::result::Result<T, RandomiserError>;

#[derive(Serialize)]
struct SlotExport<'a> {
    location_id: Option<u32>,
    name: String,
    entry: &'a Option<shops::SlotEntry>,
    raw_price: Option<u16>,
}

#[derive(Serialize)]
struct ShopExport<'a> {
    region: &'a str,
    kind: shops::ShopKind,
    locked: bool,
    record: [u8; 8],
    slots: Vec<SlotExport<'a>>,
}

/// Drop sphere entries naming shop slots that were never created for this
/// world, such as slots of a locked shop. Other names pass through untouched.
fn created_sphere_names(
    world: &World,
    table: &shops::ShopLocationTable,
    spheres: &[Vec<String>],
) -> Vec<Vec<String>> {
    spheres
        .iter()
        .map(|sphere| {
            sphere
                .iter()
                .filter(|name| {
                    let skip = table.id_of(name).is_some() && world.location_id(name).is_err();
                    if skip {
                        debug!("Skipping sphere entry {} with no shop slot location", name);
                    }
                    !skip
                })
                .cloned()
                .collect()
        })
        .collect()
}

pub fn run(settings: RandomiserSettings) -> Result<()> {
    if !settings.input_path.exists() {
        return Err(RandomiserError::Config(format!(
            "Input path does not exist: {}",
            settings.input_path.display()
        )));
    }

    let desc: WorldDescription = serde_json::from_str(&fs::read_to_string(&settings.input_path)?)?;
    let mut world = World::from_description(&desc, settings.options.clone(), settings.seed)?;

    let mut item_pool = desc
        .item_pool
        .iter()
        .map(|name| items::make_item(name, desc.player))
        .collect::<Result<Vec<_>>>()?;

    let location_table = create_shops(&mut world)?;
    set_up_shops(&mut world)?;
    shuffle_shops(&mut world, &mut item_pool)?;

    let report = if world.shop_slot_locations().is_empty() {
        FillReport::default()
    } else {
        let names = created_sphere_names(&world, &location_table, &desc.spheres);
        let spheres = world.resolve_spheres(&names)?;
        shop_slot_fill(&mut world, &spheres)?
    };
    fill_disabled_shop_slots(&mut world)?;

    if !settings.output_path.exists() {
        fs::create_dir_all(&settings.output_path)?;
    }

    // All outputs for a given run go into a per-seed subfolder.
    let out_root = settings
        .output_path
        .join(format!("ShopShuffle_{}", settings.seed));
    if !out_root.exists() {
        fs::create_dir_all(&out_root)?;
    }

    let mut records = Vec::with_capacity(world.shops.len() * 8);
    let mut exports = Vec::with_capacity(world.shops.len());
    for (id, shop) in world.shops.iter().enumerate() {
        let record = world.shop_record(id)?;
        records.extend_from_slice(&record);

        let region = world.regions[shop.region].name.as_str();
        let slots = shop
            .inventory
            .iter()
            .enumerate()
            .map(|(slot, entry)| {
                let name = shops::slot_location_name(region, slot);
                SlotExport {
                    location_id: location_table.id_of(&name),
                    name,
                    entry,
                    raw_price: entry.as_ref().map(|e| e.price.to_raw()),
                }
            })
            .collect();
        exports.push(ShopExport {
            region,
            kind: shop.kind,
            locked: shop.locked,
            record,
            slots,
        });
    }

    fs::write(out_root.join("shops.bin"), &records)?;
    fs::write(
        out_root.join("shop_locations.json"),
        serde_json::to_string_pretty(&location_table.by_id)?,
    )?;
    fs::write(
        out_root.join("shop_inventories.json"),
        serde_json::to_string_pretty(&exports)?,
    )?;

    info!(
        "Wrote {} shop records to {}",
        world.shops.len(),
        out_root.display()
    );

    let mut log = format!("Shop shuffle seed: {}\n", settings.seed);
    log.push_str(&format!(
        "options: shop_shuffle='{}' slots={} retro={} keys={:?} goal={:?} mode={:?}\n",
        settings.options.shop_shuffle,
        settings.options.shop_shuffle_slots,
        settings.options.retro,
        settings.options.key_shuffle,
        settings.options.goal,
        settings.options.mode,
    ));
    log.push_str(&format!(
        "shop slot fill: {} swapped, {} exhausted\n",
        report.swaps.len(),
        report.exhausted.len()
    ));
    for &(slot, candidate) in &report.swaps {
        let slot_loc = &world.locations[slot];
        let item = slot_loc
            .item
            .as_ref()
            .map_or_else(|| "n/a".to_string(), |item| item.to_string());
        log.push_str(&format!(
            "  {} <- {} ({})\n",
            slot_loc.name, world.locations[candidate].name, item
        ));
    }
    for &slot in &report.exhausted {
        log.push_str(&format!("  {} disabled (no candidates)\n", world.locations[slot].name));
    }

    log.push_str("shops:\n");
    for shop in &world.shops {
        log.push_str(&format!(
            "  {} [{:?}{}]\n",
            world.regions[shop.region].name,
            shop.kind,
            if shop.locked { ", locked" } else { "" }
        ));
        for (slot, entry) in shop.inventory.iter().enumerate() {
            let Some(entry) = entry else {
                log.push_str(&format!("    {}: empty\n", slot + 1));
                continue;
            };
            if entry.price.is_free() {
                log.push_str(&format!("    {}: {} (free)", slot + 1, entry.item));
            } else {
                log.push_str(&format!("    {}: {} for {}", slot + 1, entry.item, entry.price));
            }
            if entry.max != 0 {
                log.push_str(&format!(" (max {})", entry.max));
            }
            if let Some(replacement) = &entry.replacement {
                log.push_str(&format!(
                    ", then {} for {}",
                    replacement, entry.replacement_price
                ));
            }
            log.push('\n');
        }
    }
    if !world.precollected.is_empty() {
        log.push_str("precollected:\n");
        for item in &world.precollected {
            log.push_str(&format!("  {}\n", item));
        }
    }

    if settings.debug {
        let log_path = out_root.join("spoiler_log.txt");
        fs::write(log_path, log)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_string_parses_known_toggles() {
        let flags = ShopShuffleFlags::parse("gpuw").unwrap();
        assert!(flags.generate_inventories && flags.prices && flags.upgrades);
        assert!(flags.include_potion_shop);
        assert!(!flags.full_inventories && !flags.inventories);
        assert_eq!(ShopShuffleFlags::parse("").unwrap(), ShopShuffleFlags::default());
        assert!(matches!(
            ShopShuffleFlags::parse("gz"),
            Err(RandomiserError::Config(_))
        ));
    }

    #[test]
    fn option_enums_parse_case_insensitively() {
        assert_eq!("Universal".parse::<KeyShuffle>().unwrap(), KeyShuffle::Universal);
        assert_eq!("icerodhunt".parse::<Goal>().unwrap(), Goal::IceRodHunt);
        assert_eq!("INVERTED".parse::<WorldMode>().unwrap(), WorldMode::Inverted);
        assert_eq!("random".parse::<Progressive>().unwrap(), Progressive::Random);
        assert!("sometimes".parse::<Progressive>().is_err());
    }

    fn demo_settings(seed: u64, options: ShopOptions) -> RandomiserSettings {
        let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("..");
        RandomiserSettings {
            seed,
            options,
            debug: true,
            input_path: root.join("demos").join("world.json"),
            output_path: std::env::temp_dir().join(format!("shopshuffle-test-{}", seed)),
        }
    }

    #[test]
    fn run_writes_one_record_per_shop() {
        let options = ShopOptions {
            shop_shuffle: "pu".to_string(),
            shop_shuffle_slots: 12,
            ..ShopOptions::default()
        };
        let settings = demo_settings(4242, options);
        let out_root = settings.output_path.join("ShopShuffle_4242");
        run(settings).unwrap();

        let records = fs::read(out_root.join("shops.bin")).unwrap();
        assert_eq!(records.len(), 11 * 8);
        for record in records.chunks(8) {
            assert_eq!(record[0], 0);
            assert_eq!(record[4], 0);
            assert_eq!(record[7], 0);
            assert!(shops::decode_config_byte(record[5]).item_count <= shops::SHOP_SLOTS);
        }
        assert!(out_root.join("spoiler_log.txt").exists());
        assert!(out_root.join("shop_locations.json").exists());
    }

    #[test]
    fn run_without_slots_skips_allocation() {
        let settings = demo_settings(17, ShopOptions::default());
        let out_root = settings.output_path.join("ShopShuffle_17");
        run(settings).unwrap();
        assert_eq!(fs::read(out_root.join("shops.bin")).unwrap().len(), 11 * 8);
    }

    #[test]
    fn run_skips_slots_of_shops_without_locations() {
        let options = ShopOptions {
            shop_shuffle_slots: 12,
            mode: WorldMode::Inverted,
            ..ShopOptions::default()
        };
        let settings = demo_settings(4343, options);
        let out_root = settings.output_path.join("ShopShuffle_4343");
        run(settings).unwrap();
        assert_eq!(fs::read(out_root.join("shops.bin")).unwrap().len(), 11 * 8);
    }

    #[test]
    fn sphere_filter_keeps_unknown_non_slot_names() {
        let desc: WorldDescription = serde_json::from_str(
            r#"{"regions": [{"name": "Kakariko Shop"}, {"name": "Field"}],
                "locations": [{"name": "Chest", "region": "Field", "item": "Bow"}]}"#,
        )
        .unwrap();
        let world = World::from_description(&desc, ShopOptions::default(), 0).unwrap();
        let table = shops::ShopLocationTable::from_table(&shops::shop_table());
        let spheres = vec![vec![
            "Chest".to_string(),
            "Kakariko Shop Slot 1".to_string(),
            "Nowhere".to_string(),
        ]];

        let kept = created_sphere_names(&world, &table, &spheres);
        assert_eq!(kept, vec![vec!["Chest".to_string(), "Nowhere".to_string()]]);
        assert!(world.resolve_spheres(&kept).is_err());
    }

    #[test]
    fn run_rejects_missing_input() {
        let mut settings = demo_settings(1, ShopOptions::default());
        settings.input_path = settings.input_path.with_file_name("missing.json");
        assert!(matches!(run(settings), Err(RandomiserError::Config(_))));
    }

    #[test]
    fn options_fill_missing_fields_from_defaults() {
        let options: ShopOptions =
            serde_json::from_str(r#"{"shop_shuffle": "p", "key_shuffle": "universal"}"#).unwrap();
        assert_eq!(options.shop_shuffle, "p");
        assert_eq!(options.key_shuffle, KeyShuffle::Universal);
        assert_eq!(options.goal, Goal::Ganon);
        assert_eq!(options.shop_shuffle_slots, 0);
    }
}
