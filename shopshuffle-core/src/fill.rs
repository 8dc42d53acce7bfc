use log::{debug, info, warn};
use rand::seq::SliceRandom;
use std::collections::HashSet;

use crate::items::{self, Item};
use crate::price::{draw_slot_price, funny_price, Price};
use crate::world::{choose_cumulative, ItemRule, LocationId, World};
use crate::{RandomiserError, Result, ShopShuffleFlags};

/// Outcome of one allocation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FillReport {
    /// (shop slot location, location it took its item from)
    pub swaps: Vec<(LocationId, LocationId)>,
    /// Shop slots that ran out of candidates, or sat in no sphere, and were disabled.
    pub exhausted: Vec<LocationId>,
}

fn is_active_shop_slot(world: &World, id: LocationId) -> bool {
    let loc = &world.locations[id];
    loc.shop_slot.is_some() && !loc.shop_slot_disabled
}

/// First location in `pool` whose item can move into the shop slot while the
/// slot's own item moves out to it.
fn find_swap_candidate(world: &World, pool: &[LocationId], slot_id: LocationId) -> Option<LocationId> {
    let slot = &world.locations[slot_id];
    let slot_item = slot.item.as_ref()?;
    let kind = world
        .shop_slot_of(slot_id)
        .map(|(shop, _)| world.shops[shop].kind)?;

    pool.iter().copied().find(|&candidate_id| {
        let candidate = &world.locations[candidate_id];
        let Some(candidate_item) = candidate.item.as_ref() else {
            return false;
        };
        !candidate.locked
            && candidate.shop_slot.is_none()
            && !items::is_swap_blacklisted(&candidate_item.name)
            && !kind.blacklists(&candidate_item.name)
            && candidate.can_hold(slot_item)
            && slot.can_hold(candidate_item)
    })
}

/// Move items from across the sphere partition into every eligible shop slot.
///
/// Spheres are visited earliest first. Each active shop slot draws a swap
/// pool from its own sphere or a later one, weighted by cumulative sphere
/// size, and takes the first acceptable candidate in that pool. A slot with
/// no candidate, or one missing from every sphere, is disabled and keeps its
/// default stock.
pub fn shop_slot_fill(world: &mut World, spheres: &[Vec<LocationId>]) -> Result<FillReport> {
    let flags = ShopShuffleFlags::parse(&world.options.shop_shuffle)?;
    let mut report = FillReport::default();

    let placed: HashSet<LocationId> = spheres.iter().flatten().copied().collect();
    let mut remaining = 0usize;
    for id in world.shop_slot_locations() {
        let pushable = world
            .shop_slot_of(id)
            .map_or(false, |(shop, slot)| world.shops[shop].can_push_inventory(slot));
        let loc = &mut world.locations[id];
        if !pushable || loc.shop_slot_disabled {
            loc.shop_slot_disabled = true;
        } else if !placed.contains(&id) {
            warn!("Shop slot {} is not in any sphere", loc.name);
            loc.shop_slot_disabled = true;
            report.exhausted.push(id);
        } else {
            remaining += 1;
        }
    }

    if remaining == 0 {
        return Ok(report);
    }

    let mut candidates_per_sphere: Vec<Vec<LocationId>> = spheres.to_vec();
    let mut cum_weights: Vec<usize> = Vec::with_capacity(candidates_per_sphere.len());
    for sphere in candidates_per_sphere.iter_mut() {
        let base = cum_weights.last().copied().unwrap_or(0);
        cum_weights.push(base + sphere.len());
        sphere.shuffle(&mut world.rng);
    }

    for i in 0..candidates_per_sphere.len() {
        let current_shop_slots: Vec<LocationId> = candidates_per_sphere[i]
            .iter()
            .copied()
            .filter(|&id| is_active_shop_slot(world, id))
            .collect();

        for slot_id in current_shop_slots {
            // No retry across other spheres: a small pool can exhaust.
            let pool = choose_cumulative(&mut world.rng, &cum_weights[i..])
                .map(|offset| i + offset)
                .unwrap_or(i);

            let Some(candidate_id) = find_swap_candidate(world, &candidates_per_sphere[pool], slot_id)
            else {
                warn!(
                    "Ran out of shop shuffle item candidate locations for {}",
                    world.locations[slot_id].name
                );
                world.locations[slot_id].shop_slot_disabled = true;
                report.exhausted.push(slot_id);
                continue;
            };

            world.swap_location_item(candidate_id, slot_id);
            report.swaps.push((slot_id, candidate_id));

            let location = &world.locations[slot_id];
            let Some(item) = location.item.clone() else {
                continue;
            };
            debug!(
                "Swapping {} into {}:: {}",
                world.locations[candidate_id].name, location.name, item
            );

            let owner = if item.player != location.player { item.player } else { 0 };
            let Some((shop_id, slot)) = world.shop_slot_of(slot_id) else {
                continue;
            };

            let mut price = Price::rupees(draw_slot_price(&item.name, &mut world.rng));
            if flags.prices {
                price = funny_price(
                    price.amount,
                    Some(&item.name),
                    world.options.key_shuffle,
                    &mut world.rng,
                );
            }

            world.shops[shop_id].push_inventory(slot, &item.name, price, 1, owner)?;
        }
    }

    info!(
        "Shop slot fill: {} swapped, {} exhausted",
        report.swaps.len(),
        report.exhausted.len()
    );
    Ok(report)
}

/// Give every disabled shop slot its shop's own stock as a fixed item.
pub fn fill_disabled_shop_slots(world: &mut World) -> Result<()> {
    for id in world.shop_slot_locations() {
        if !world.locations[id].shop_slot_disabled {
            continue;
        }
        let Some((shop_id, slot)) = world.shop_slot_of(id) else {
            continue;
        };
        let player = world.locations[id].player;
        let entry = world.shops[shop_id].inventory[slot].as_ref().ok_or_else(|| {
            RandomiserError::InvalidState {
                room_id: world.shops[shop_id].room_id,
                slot,
            }
        })?;
        let item: Item = items::make_item(&entry.item, player)?;

        let loc = &mut world.locations[id];
        loc.rule = ItemRule::Only {
            name: item.name.clone(),
            player: item.player,
        };
        loc.item = Some(item);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::{create_shops, create_shops_from_table, tests::world_with_shop_regions};
    use crate::shops::{self, SlotEntry};
    use crate::world::Location;
    use crate::ShopOptions;

    const FIELD_ITEMS: &[&str] = &[
        "Hookshot",
        "Lamp",
        "Bow",
        "Hammer",
        "Fire Rod",
        "Ice Rod",
        "Flippers",
        "Moon Pearl",
        "Pegasus Boots",
        "Piece of Heart",
        "Bombs (3)",
        "Arrows (10)",
        "Rupees (20)",
        "Bee",
        "Red Potion",
        "Compass",
    ];

    fn options(flags: &str, slots: u32) -> ShopOptions {
        ShopOptions {
            shop_shuffle: flags.to_string(),
            shop_shuffle_slots: slots,
            ..ShopOptions::default()
        }
    }

    /// Every shop plus a field of items, split over three spheres.
    fn populated_world(flags: &str, slots: u32, seed: u64) -> (World, Vec<Vec<LocationId>>) {
        let mut world = world_with_shop_regions(options(flags, slots), seed);
        let field = world.add_region("Field", Vec::new());
        create_shops(&mut world).unwrap();

        let mut field_locations = Vec::new();
        for round in 0..3 {
            for (i, name) in FIELD_ITEMS.iter().enumerate() {
                let mut loc = Location::new(format!("Field {} {}", round, i), 1, field);
                loc.item = Some(items::make_item(name, 1).unwrap());
                loc.locked = i % 7 == 6;
                field_locations.push(world.add_location(loc));
            }
        }

        let shop_slots = world.shop_slot_locations();
        let mut spheres: Vec<Vec<LocationId>> = vec![Vec::new(), Vec::new(), Vec::new()];
        for (n, id) in shop_slots.iter().enumerate() {
            spheres[n % 3].push(*id);
        }
        for (n, id) in field_locations.iter().enumerate() {
            spheres[(n * 3 / field_locations.len()).min(2)].push(*id);
        }
        (world, spheres)
    }

    fn snapshot(world: &World) -> (Vec<shops::Shop>, Vec<Option<Item>>, Vec<bool>) {
        (
            world.shops.clone(),
            world.locations.iter().map(|loc| loc.item.clone()).collect(),
            world.locations.iter().map(|loc| loc.shop_slot_disabled).collect(),
        )
    }

    #[test]
    fn allocation_is_deterministic_for_a_seed() {
        let (mut a, spheres_a) = populated_world("p", 10, 77);
        let (mut b, spheres_b) = populated_world("p", 10, 77);
        let report_a = shop_slot_fill(&mut a, &spheres_a).unwrap();
        let report_b = shop_slot_fill(&mut b, &spheres_b).unwrap();

        assert_eq!(report_a, report_b);
        assert_eq!(snapshot(&a), snapshot(&b));
        assert!(!report_a.swaps.is_empty());
    }

    #[test]
    fn swaps_respect_blacklist_and_rules() {
        for seed in 0..20 {
            let (mut world, spheres) = populated_world("", 27, seed);
            let report = shop_slot_fill(&mut world, &spheres).unwrap();

            for &(slot_id, candidate_id) in &report.swaps {
                let slot = &world.locations[slot_id];
                let candidate = &world.locations[candidate_id];
                let moved_in = slot.item.as_ref().unwrap();
                let moved_out = candidate.item.as_ref().unwrap();

                assert!(!items::is_swap_blacklisted(&moved_in.name));
                assert!(!candidate.locked);
                assert!(candidate.shop_slot.is_none());
                assert!(slot.can_hold(moved_in) && candidate.can_hold(moved_out));
                assert_eq!(moved_out.name, "Rupees (50)");

                let (shop_id, index) = world.shop_slot_of(slot_id).unwrap();
                let entry = world.shops[shop_id].inventory[index].as_ref().unwrap();
                assert_eq!(entry.item, moved_in.name);
                assert_eq!(entry.max, 1);
                assert!(entry.replacement.is_some());
                assert!(!world.shops[shop_id].kind.blacklists(&entry.item));
            }

            let mut taken: Vec<LocationId> = report.swaps.iter().map(|&(_, c)| c).collect();
            taken.sort_unstable();
            taken.dedup();
            assert_eq!(taken.len(), report.swaps.len());
        }
    }

    #[test]
    fn every_enabled_slot_ends_swapped_or_disabled() {
        let (mut world, spheres) = populated_world("", 27, 5);
        let report = shop_slot_fill(&mut world, &spheres).unwrap();
        let swapped: Vec<LocationId> = report.swaps.iter().map(|&(s, _)| s).collect();

        for id in world.shop_slot_locations() {
            let loc = &world.locations[id];
            assert!(swapped.contains(&id) ^ loc.shop_slot_disabled, "{}", loc.name);
        }
    }

    #[test]
    fn single_sphere_of_unusable_candidates_disables_slots() {
        let template = shops::shop_table()
            .into_iter()
            .find(|shop| shop.region == "Kakariko Shop")
            .unwrap();
        let mut world = World::new(1, options("", 3), 1);
        world.add_region("Kakariko Shop", Vec::new());
        let field = world.add_region("Field", Vec::new());
        create_shops_from_table(&mut world, vec![template]).unwrap();

        let mut sphere = world.shop_slot_locations();
        for (i, name) in ["Rupees (300)", "Bee", "Hookshot"].iter().enumerate() {
            let mut loc = Location::new(format!("Chest {}", i), 1, field);
            loc.item = Some(items::make_item(name, 1).unwrap());
            loc.locked = *name == "Hookshot";
            sphere.push(world.add_location(loc));
        }

        let report = shop_slot_fill(&mut world, &[sphere]).unwrap();
        assert!(report.swaps.is_empty());
        assert_eq!(report.exhausted.len(), 3);
        for id in world.shop_slot_locations() {
            assert!(world.locations[id].shop_slot_disabled);
        }
        assert!(world.shops[0].inventory.iter().flatten().all(|e| e.replacement.is_none()));
    }

    #[test]
    fn slots_with_a_pushed_replacement_are_excluded() {
        let (mut world, spheres) = populated_world("", 27, 3);
        let kakariko = world.shop_by_region("Kakariko Shop").unwrap();
        world.shops[kakariko]
            .push_inventory(0, "Single Arrow", Price::rupees(80), 1, 0)
            .unwrap();

        let report = shop_slot_fill(&mut world, &spheres).unwrap();
        let slot_id = world.location_id("Kakariko Shop Slot 1").unwrap();
        assert!(world.locations[slot_id].shop_slot_disabled);
        assert!(!report.swaps.iter().any(|&(s, _)| s == slot_id));
        assert_eq!(world.shops[kakariko].inventory[0].as_ref().unwrap().item, "Single Arrow");
    }

    #[test]
    fn upgrade_shop_never_receives_potions() {
        let template = shops::ShopTemplate {
            locked: false,
            ..shops::shop_table().pop().unwrap()
        };
        let mut world = World::new(1, options("", 2), 2);
        world.add_region("Capacity Upgrade", Vec::new());
        let field = world.add_region("Field", Vec::new());
        create_shops_from_table(&mut world, vec![template]).unwrap();

        let mut sphere = world.shop_slot_locations();
        let mut loc = Location::new("Chest", 1, field);
        loc.item = Some(items::make_item("Blue Potion", 1).unwrap());
        sphere.push(world.add_location(loc));

        let report = shop_slot_fill(&mut world, &[sphere]).unwrap();
        assert!(report.swaps.is_empty());
        assert_eq!(
            world.locations[world.location_id("Chest").unwrap()].item.as_ref().unwrap().name,
            "Blue Potion"
        );
    }

    #[test]
    fn cross_player_items_record_their_owner() {
        let template = shops::shop_table()
            .into_iter()
            .find(|shop| shop.region == "Kakariko Shop")
            .unwrap();
        let mut world = World::new(1, options("", 3), 9);
        world.add_region("Kakariko Shop", Vec::new());
        let field = world.add_region("Field", Vec::new());
        create_shops_from_table(&mut world, vec![template]).unwrap();

        let mut sphere = world.shop_slot_locations();
        for i in 0..3 {
            let mut loc = Location::new(format!("Chest {}", i), 1, field);
            loc.item = Some(items::make_item("Hookshot", 2).unwrap());
            sphere.push(world.add_location(loc));
        }

        let report = shop_slot_fill(&mut world, &[sphere]).unwrap();
        assert_eq!(report.swaps.len(), 3);
        for entry in world.shops[0].inventory.iter().flatten() {
            assert_eq!(entry.item, "Hookshot");
            assert_eq!(entry.player, 2);
        }
    }

    #[test]
    fn disabled_slots_get_their_default_stock() {
        let (mut world, spheres) = populated_world("", 4, 21);
        shop_slot_fill(&mut world, &spheres).unwrap();
        fill_disabled_shop_slots(&mut world).unwrap();

        for id in world.shop_slot_locations() {
            let loc = &world.locations[id];
            if !loc.shop_slot_disabled {
                continue;
            }
            let (shop_id, slot) = world.shop_slot_of(id).unwrap();
            let stock = &world.shops[shop_id].inventory[slot].as_ref().unwrap().item;
            let item = loc.item.as_ref().unwrap();
            assert_eq!(&item.name, stock);
            assert!(loc.can_hold(item));
        }
    }

    #[test]
    fn empty_disabled_slot_is_invalid_state() {
        let (mut world, _) = populated_world("", 0, 1);
        let kakariko = world.shop_by_region("Kakariko Shop").unwrap();
        let region = world.shops[kakariko].region;
        let mut loc = Location::new("Kakariko Shop Slot 1", 1, region);
        loc.shop_slot = Some(0);
        loc.shop_slot_disabled = true;
        world.add_location(loc);
        world.shops[kakariko].clear_inventory();
        world.shops[kakariko]
            .add_inventory(1, SlotEntry::new("Bee", Price::rupees(10)))
            .unwrap();

        assert!(matches!(
            fill_disabled_shop_slots(&mut world),
            Err(RandomiserError::InvalidState { slot: 0, .. })
        ));
    }

    fn kakariko_world(seed: u64) -> (World, LocationId) {
        let template = shops::shop_table()
            .into_iter()
            .find(|shop| shop.region == "Kakariko Shop")
            .unwrap();
        let mut world = World::new(1, options("", 3), seed);
        world.add_region("Kakariko Shop", Vec::new());
        let field = world.add_region("Field", Vec::new());
        create_shops_from_table(&mut world, vec![template]).unwrap();
        (world, field)
    }

    #[test]
    fn candidate_rule_must_accept_the_outgoing_item() {
        let (mut world, field) = kakariko_world(4);
        let mut sphere = world.shop_slot_locations();
        for i in 0..3 {
            let mut loc = Location::new(format!("Chest {}", i), 1, field);
            loc.item = Some(items::make_item("Hookshot", 1).unwrap());
            loc.rule = ItemRule::Forbid(vec!["Rupees (50)".to_string()]);
            sphere.push(world.add_location(loc));
        }

        let report = shop_slot_fill(&mut world, &[sphere]).unwrap();
        assert!(report.swaps.is_empty());
        assert_eq!(report.exhausted.len(), 3);
        for id in world.shop_slot_locations() {
            assert!(world.locations[id].shop_slot_disabled);
            assert_eq!(world.locations[id].item.as_ref().unwrap().name, "Rupees (50)");
        }
    }

    #[test]
    fn slot_rule_must_accept_the_incoming_item() {
        let (mut world, field) = kakariko_world(6);
        let first = world.location_id("Kakariko Shop Slot 1").unwrap();
        world.locations[first].rule = ItemRule::Only {
            name: "Lamp".to_string(),
            player: 1,
        };
        let mut sphere = world.shop_slot_locations();
        for i in 0..3 {
            let mut loc = Location::new(format!("Chest {}", i), 1, field);
            loc.item = Some(items::make_item("Hookshot", 1).unwrap());
            sphere.push(world.add_location(loc));
        }

        let report = shop_slot_fill(&mut world, &[sphere]).unwrap();
        assert_eq!(report.exhausted, vec![first]);
        assert_eq!(report.swaps.len(), 2);
        assert!(report.swaps.iter().all(|&(slot, _)| slot != first));
        assert!(world.locations[first].shop_slot_disabled);
    }

    #[test]
    fn slots_missing_from_every_sphere_are_disabled() {
        let (mut world, field) = kakariko_world(8);
        let slots = world.shop_slot_locations();
        let mut sphere = vec![slots[0]];
        for i in 0..3 {
            let mut loc = Location::new(format!("Chest {}", i), 1, field);
            loc.item = Some(items::make_item("Hookshot", 1).unwrap());
            sphere.push(world.add_location(loc));
        }

        let report = shop_slot_fill(&mut world, &[sphere]).unwrap();
        assert_eq!(report.swaps.len(), 1);
        assert_eq!(report.swaps[0].0, slots[0]);
        assert_eq!(report.exhausted, vec![slots[1], slots[2]]);
        for &id in &slots[1..] {
            assert!(world.locations[id].shop_slot_disabled);
        }

        fill_disabled_shop_slots(&mut world).unwrap();
        let stock = world.shops[0].inventory[1].as_ref().unwrap().item.clone();
        assert_eq!(world.locations[slots[1]].item.as_ref().unwrap().name, stock);
    }
}
