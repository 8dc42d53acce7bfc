use log::{info, warn};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::items::{self, Item};
use crate::price::{encode_price, Price};
use crate::shops::{
    self, Shop, ShopKind, ShopLocationTable, ShopTemplate, SlotEntry, TemplateItem, SHOP_SLOTS,
};
use crate::world::{sample, Location, ShopId, World};
use crate::{Goal, KeyShuffle, Progressive, Result, ShopShuffleFlags, WorldMode};

const POTION_SHOP: &str = "Potion Shop";
const RED_SHIELD_SHOP: &str = "Red Shield Shop";
const DARK_LAKE_HYLIA_SHOP: &str = "Dark Lake Hylia Shop";
const CAPACITY_UPGRADE: &str = "Capacity Upgrade";

const SHOPKEEPER_CHOICES: [u8; 3] = [0xA0, 0xC1, 0xFF];
const UNIVERSAL_KEY: &str = "Small Key (Universal)";

fn slot_entry(item: &TemplateItem) -> SlotEntry {
    SlotEntry::new(item.item, Price::rupees(item.price)).with_max(item.max)
}

/// Create shops from the built-in template table.
pub fn create_shops(world: &mut World) -> Result<ShopLocationTable> {
    create_shops_from_table(world, shops::shop_table())
}

/// Create one shop per template, fill default inventories and add a
/// shop-bound location for every slot of an unlocked shop.
pub fn create_shops_from_table(
    world: &mut World,
    mut table: Vec<ShopTemplate>,
) -> Result<ShopLocationTable> {
    let flags = ShopShuffleFlags::parse(&world.options.shop_shuffle)?;
    let locations = ShopLocationTable::from_table(&table);

    for item in table.iter().flat_map(|shop| shop.items.iter()) {
        items::make_item(item.item, world.player)?;
    }

    let base_dynamic_slots = table.iter().filter(|shop| !shop.locked).count() * SHOP_SLOTS;
    let dynamic_slots = if flags.include_potion_shop {
        if let Some(potion_shop) = table.iter_mut().find(|shop| shop.region == POTION_SHOP) {
            potion_shop.locked = false;
        }
        base_dynamic_slots + SHOP_SLOTS
    } else {
        base_dynamic_slots
    };

    let num_slots = (world.options.shop_shuffle_slots as usize).min(dynamic_slots);
    let mut single_purchase_slots: Vec<bool> = (0..dynamic_slots).map(|i| i < num_slots).collect();
    single_purchase_slots.shuffle(&mut world.rng);

    if flags.generate_inventories || flags.full_inventories {
        regenerate_inventories(world, &mut table, flags);
    }

    if world.options.mode == WorldMode::Inverted {
        if let Some(hylia) = table.iter_mut().find(|shop| shop.region == DARK_LAKE_HYLIA_SHOP) {
            hylia.locked = true;
            hylia.items = shops::INVERTED_HYLIA_SHOP_DEFAULTS.to_vec();
        }
    }

    let bonus_item = if world.options.goal == Goal::IceRodHunt {
        "Nothing"
    } else {
        "Rupees (50)"
    };

    for template in &table {
        let region = world.region_id(template.region)?;
        let mut shop = Shop::from_template(region, template);
        for (index, item) in template.items.iter().enumerate() {
            shop.add_inventory(index, slot_entry(item))?;
        }
        world.shops.push(shop);
        world.regions[region].shop = Some(world.shops.len() - 1);

        if template.locked || num_slots == 0 {
            continue;
        }

        for index in 0..template.items.len() {
            let slot_name = shops::slot_location_name(template.region, index);
            let mut loc = Location::new(&slot_name, world.player, region);
            loc.address = locations.id_of(&slot_name);
            loc.shop_slot = Some(index);
            loc.locked = true;
            if single_purchase_slots.pop().unwrap_or(false) {
                loc.item = Some(items::make_item(bonus_item, world.player)?);
            } else {
                loc.item = Some(items::make_item("Nothing", world.player)?);
                loc.shop_slot_disabled = true;
            }
            world.add_location(loc);
        }
    }

    info!(
        "Created {} shops with {} single purchase slots",
        world.shops.len(),
        num_slots
    );
    Ok(locations)
}

fn regenerate_inventories(world: &mut World, table: &mut [ShopTemplate], flags: ShopShuffleFlags) {
    let default_shop_table: Vec<TemplateItem> = ["arrows", "bombs", "potions", "shields", "bottle"]
        .into_iter()
        .filter(|group| !world.options.retro || *group != "arrows")
        .flat_map(|group| shops::shop_generation_group(group).iter().copied())
        .collect();

    let new_basic_shop = sample(&mut world.rng, &default_shop_table, 3);
    let new_dark_shop = sample(&mut world.rng, &default_shop_table, 3);

    for shop in table.iter_mut().filter(|shop| !shop.locked) {
        let mut new_items = sample(&mut world.rng, &default_shop_table, 3);
        if !flags.full_inventories {
            if shop.items == shops::BASIC_SHOP_DEFAULTS {
                new_items = new_basic_shop.clone();
            } else if shop.items == shops::DARK_WORLD_SHOP_DEFAULTS {
                new_items = new_dark_shop.clone();
            }
        }
        shop.shopkeeper = *SHOPKEEPER_CHOICES
            .choose(&mut world.rng)
            .unwrap_or(&SHOPKEEPER_CHOICES[0]);
        shop.items = new_items;
    }
}

/// Retro and universal-key adjustments applied after shop creation.
pub fn set_up_shops(world: &mut World) -> Result<()> {
    let universal_keys = world.options.key_shuffle == KeyShuffle::Universal;
    let retro = world.options.retro;

    if retro {
        if let Some(rss) = world.shop_by_region(RED_SHIELD_SHOP) {
            let mut replacement_items: Vec<(&str, u16)> = vec![
                ("Red Potion", 150),
                ("Green Potion", 75),
                ("Blue Potion", 200),
                ("Bombs (10)", 50),
                ("Blue Shield", 50),
                ("Small Heart", 10),
            ];
            if universal_keys {
                replacement_items.push((UNIVERSAL_KEY, 100));
            }
            let (name, price) = replacement_items[world.rng.gen_range(0..replacement_items.len())];
            let shop = &mut world.shops[rss];
            shop.add_inventory(
                2,
                SlotEntry::new("Single Arrow", Price::rupees(80))
                    .with_max(1)
                    .with_replacement(name, Price::rupees(price)),
            )?;
            shop.locked = true;
        }
    }

    if universal_keys || retro {
        let eligible: Vec<ShopId> = world
            .shops
            .iter()
            .enumerate()
            .filter(|(_, shop)| shop.custom && !shop.locked && shop.kind == ShopKind::Standard)
            .map(|(id, _)| id)
            .collect();

        for shop_id in sample(&mut world.rng, &eligible, 5) {
            let mut slots = [0usize, 1, 2];
            slots.shuffle(&mut world.rng);
            let mut slots = slots.into_iter();

            let shop = &mut world.shops[shop_id];
            shop.locked = true;
            if universal_keys {
                if let Some(slot) = slots.next() {
                    shop.add_inventory(slot, SlotEntry::new(UNIVERSAL_KEY, Price::rupees(100)))?;
                }
            }
            if retro {
                if let Some(slot) = slots.next() {
                    shop.push_inventory(slot, "Single Arrow", Price::rupees(80), 1, 0)?;
                }
            }
        }
    }

    Ok(())
}

/// Capacity-upgrade shuffle, price randomization and inventory shuffle.
pub fn shuffle_shops(world: &mut World, item_pool: &mut [Item]) -> Result<()> {
    let flags = ShopShuffleFlags::parse(&world.options.shop_shuffle)?;

    if flags.upgrades {
        shuffle_capacity_upgrades(world, item_pool)?;
    }

    if flags.prices || flags.inventories {
        let mut standard_shops: Vec<ShopId> = Vec::new();
        let mut upgrade_shops: Vec<ShopId> = Vec::new();
        for (id, shop) in world.shops.iter().enumerate() {
            match shop.kind {
                ShopKind::UpgradeShop => upgrade_shops.push(id),
                ShopKind::Standard => {
                    let is_potion_shop = world.regions[shop.region].name == POTION_SHOP;
                    if !is_potion_shop || flags.include_potion_shop {
                        standard_shops.push(id);
                    }
                }
                ShopKind::TakeAny => {}
            }
        }

        if flags.prices {
            let key_shuffle = world.options.key_shuffle;
            for &shop_id in standard_shops.iter().chain(upgrade_shops.iter()) {
                for entry in world.shops[shop_id].inventory.iter_mut().flatten() {
                    entry.price = encode_price(
                        entry.price.amount,
                        Some(&entry.item),
                        key_shuffle,
                        &mut world.rng,
                    );
                    entry.replacement_price = encode_price(
                        entry.replacement_price.amount,
                        entry.replacement.as_deref(),
                        key_shuffle,
                        &mut world.rng,
                    );
                }
            }
        }

        if flags.inventories {
            let mut total_inventory: Vec<Option<SlotEntry>> = standard_shops
                .iter()
                .flat_map(|&id| world.shops[id].inventory.clone())
                .collect();
            total_inventory.shuffle(&mut world.rng);

            for (&shop_id, chunk) in standard_shops.iter().zip(total_inventory.chunks(SHOP_SLOTS)) {
                let shop = &mut world.shops[shop_id];
                shop.clear_inventory();
                for (slot, entry) in chunk.iter().enumerate() {
                    shop.inventory[slot] = entry.clone();
                }
            }
        }
    }

    Ok(())
}

fn shuffle_capacity_upgrades(world: &mut World, item_pool: &mut [Item]) -> Result<()> {
    let player = world.player;
    let progressive = match world.options.progressive {
        Progressive::Random => world.rng.gen_bool(0.5),
        Progressive::On => true,
        Progressive::Off => false,
    } && world.options.goal == Goal::IceRodHunt;

    let last_bomb = if progressive { "Bomb Upgrade (+5)" } else { "Bomb Upgrade (+10)" };
    let last_arrow = if progressive { "Arrow Upgrade (+5)" } else { "Arrow Upgrade (+10)" };

    let mut new_items: Vec<&str> = vec!["Bomb Upgrade (+5)"; 6];
    new_items.push(last_bomb);
    if !world.options.retro {
        new_items.extend(std::iter::repeat("Arrow Upgrade (+5)").take(6));
        new_items.push(last_arrow);
    }
    // Decides what gets left out if the pool has too little filler.
    new_items.shuffle(&mut world.rng);

    let capacity_shop = world.shop_by_region(CAPACITY_UPGRADE);
    if let Some(id) = capacity_shop {
        world.shops[id].clear_inventory();
    }

    if world.options.goal == Goal::IceRodHunt {
        for name in new_items {
            world.precollected.push(items::make_item(name, player)?);
        }
        return Ok(());
    }

    for slot in item_pool.iter_mut() {
        if new_items.is_empty() {
            break;
        }
        if items::is_trap_replaceable(&slot.name) {
            if let Some(name) = new_items.pop() {
                *slot = items::make_item(name, player)?;
            }
        }
    }

    if new_items.is_empty() {
        return Ok(());
    }

    warn!(
        "Not all upgrades put into Player {}'s item pool. Putting remaining items in Capacity Upgrade shop instead.",
        player
    );
    let bomb_upgrades = new_items.iter().filter(|name| name.contains("Bomb Upgrade")).count();
    let arrow_upgrades = new_items.iter().filter(|name| name.contains("Arrow Upgrade")).count();
    if let Some(id) = capacity_shop {
        let shop = &mut world.shops[id];
        if bomb_upgrades > 0 {
            shop.add_inventory(
                0,
                SlotEntry::new("Bomb Upgrade (+5)", Price::rupees(100)).with_max(bomb_upgrades as u8),
            )?;
        }
        if arrow_upgrades > 0 {
            shop.add_inventory(
                1,
                SlotEntry::new("Arrow Upgrade (+5)", Price::rupees(100)).with_max(arrow_upgrades as u8),
            )?;
        }
    }
    Ok(())
}
