use rand::seq::SliceRandom;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::items::{self, Item};
use crate::shops::Shop;
use crate::{RandomiserError, Result, ShopOptions};

pub type RegionId = usize;
pub type LocationId = usize;
pub type ShopId = usize;

/// Which items a location will hold.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemRule {
    #[default]
    Any,
    Only { name: String, player: u32 },
    Forbid(Vec<String>),
}

impl ItemRule {
    pub fn accepts(&self, item: &Item) -> bool {
        match self {
            ItemRule::Any => true,
            ItemRule::Only { name, player } => item.name == *name && item.player == *player,
            ItemRule::Forbid(names) => !names.iter().any(|name| *name == item.name),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub name: String,
    pub entrances: Vec<String>,
    pub locations: Vec<LocationId>,
    pub shop: Option<ShopId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub name: String,
    pub player: u32,
    pub region: RegionId,
    pub address: Option<u32>,
    pub item: Option<Item>,
    pub rule: ItemRule,
    pub locked: bool,
    /// Index of the shop slot this location mirrors, if any.
    pub shop_slot: Option<usize>,
    pub shop_slot_disabled: bool,
}

impl Location {
    pub fn new(name: impl Into<String>, player: u32, region: RegionId) -> Self {
        Location {
            name: name.into(),
            player,
            region,
            address: None,
            item: None,
            rule: ItemRule::Any,
            locked: false,
            shop_slot: None,
            shop_slot_disabled: false,
        }
    }

    pub fn can_hold(&self, item: &Item) -> bool {
        self.rule.accepts(item)
    }
}

/// Everything one generation pass reads and mutates.
pub struct World {
    pub player: u32,
    pub options: ShopOptions,
    pub rng: StdRng,
    pub regions: Vec<Region>,
    pub locations: Vec<Location>,
    pub shops: Vec<Shop>,
    pub precollected: Vec<Item>,
    pub door_addresses: HashMap<String, u8>,
}

impl World {
    pub fn new(player: u32, options: ShopOptions, seed: u64) -> Self {
        World {
            player,
            options,
            rng: StdRng::seed_from_u64(seed),
            regions: Vec::new(),
            locations: Vec::new(),
            shops: Vec::new(),
            precollected: Vec::new(),
            door_addresses: HashMap::new(),
        }
    }

    pub fn from_description(desc: &WorldDescription, options: ShopOptions, seed: u64) -> Result<Self> {
        let mut world = World::new(desc.player, options, seed);
        world.door_addresses = desc.door_addresses.clone();

        for region in &desc.regions {
            world.add_region(&region.name, region.entrances.clone());
        }

        for loc in &desc.locations {
            let region = world.region_id(&loc.region)?;
            let mut location = Location::new(&loc.name, desc.player, region);
            location.locked = loc.locked;
            location.rule = loc.rule.clone();
            if let Some(name) = &loc.item {
                let owner = loc.item_player.unwrap_or(desc.player);
                location.item = Some(items::make_item(name, owner)?);
            }
            world.add_location(location);
        }

        Ok(world)
    }

    pub fn add_region(&mut self, name: &str, entrances: Vec<String>) -> RegionId {
        self.regions.push(Region {
            name: name.to_string(),
            entrances,
            locations: Vec::new(),
            shop: None,
        });
        self.regions.len() - 1
    }

    pub fn add_location(&mut self, location: Location) -> LocationId {
        let id = self.locations.len();
        let region = location.region;
        self.locations.push(location);
        self.regions[region].locations.push(id);
        id
    }

    pub fn region_id(&self, name: &str) -> Result<RegionId> {
        self.regions
            .iter()
            .position(|region| region.name == name)
            .ok_or_else(|| RandomiserError::Config(format!("unknown region '{}'", name)))
    }

    pub fn location_id(&self, name: &str) -> Result<LocationId> {
        self.locations
            .iter()
            .position(|location| location.name == name)
            .ok_or_else(|| RandomiserError::Config(format!("unknown location '{}'", name)))
    }

    pub fn shop_by_region(&self, name: &str) -> Option<ShopId> {
        let region = self.region_id(name).ok()?;
        self.regions[region].shop
    }

    /// Shop and slot index a shop-bound location mirrors.
    pub fn shop_slot_of(&self, location: LocationId) -> Option<(ShopId, usize)> {
        let loc = &self.locations[location];
        let slot = loc.shop_slot?;
        let shop = self.regions[loc.region].shop?;
        Some((shop, slot))
    }

    /// Every shop-bound location, in shop then slot order.
    pub fn shop_slot_locations(&self) -> Vec<LocationId> {
        self.shops
            .iter()
            .flat_map(|shop| self.regions[shop.region].locations.iter().copied())
            .filter(|&id| self.locations[id].shop_slot.is_some())
            .collect()
    }

    pub fn swap_location_item(&mut self, a: LocationId, b: LocationId) {
        let a_item = self.locations[a].item.take();
        let b_item = std::mem::replace(&mut self.locations[b].item, a_item);
        self.locations[a].item = b_item;
    }

    pub fn shop_record(&self, shop: ShopId) -> Result<[u8; 8]> {
        let shop = &self.shops[shop];
        let region = &self.regions[shop.region];
        shop.to_bytes(&region.entrances, &self.door_addresses)
    }

    pub fn resolve_spheres(&self, spheres: &[Vec<String>]) -> Result<Vec<Vec<LocationId>>> {
        spheres
            .iter()
            .map(|sphere| {
                sphere
                    .iter()
                    .map(|name| self.location_id(name))
                    .collect::<Result<Vec<_>>>()
            })
            .collect()
    }
}

/// Uniform sample of `k` elements without replacement, in draw order.
pub fn sample<T: Clone, R: Rng + ?Sized>(rng: &mut R, items: &[T], k: usize) -> Vec<T> {
    let mut pool = items.to_vec();
    let k = k.min(pool.len());
    let (chosen, _) = pool.partial_shuffle(rng, k);
    chosen.to_vec()
}

/// Pick an index with the given cumulative weights.
///
/// Weights need not start at zero; the first entry carries its whole value.
pub fn choose_cumulative<R: Rng + ?Sized>(rng: &mut R, cum_weights: &[usize]) -> Option<usize> {
    let total = *cum_weights.last()?;
    if total == 0 {
        return None;
    }
    let roll = rng.gen_range(0..total);
    Some(cum_weights.partition_point(|&w| w <= roll))
}

#[derive(Clone, Debug, Deserialize)]
pub struct RegionDescription {
    pub name: String,
    #[serde(default)]
    pub entrances: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LocationDescription {
    pub name: String,
    pub region: String,
    #[serde(default)]
    pub item: Option<String>,
    #[serde(default)]
    pub item_player: Option<u32>,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub rule: ItemRule,
}

fn default_player() -> u32 {
    1
}

/// World produced by the reachability stage, as read from JSON.
#[derive(Clone, Debug, Deserialize)]
pub struct WorldDescription {
    #[serde(default = "default_player")]
    pub player: u32,
    pub regions: Vec<RegionDescription>,
    #[serde(default)]
    pub locations: Vec<LocationDescription>,
    #[serde(default)]
    pub item_pool: Vec<String>,
    /// Location names per sphere, earliest first.
    #[serde(default)]
    pub spheres: Vec<Vec<String>>,
    #[serde(default)]
    pub door_addresses: HashMap<String, u8>,
}
