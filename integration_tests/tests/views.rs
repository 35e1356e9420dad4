mod common;

use std::time::Instant;

use realm_proto::{
    Building, CellObject, ClientCommand, EnhancementBuilding, ItemKind, StorageKind,
};
use realm_sync::{DispatchError, Intent, ItemPath, ViewAction, ViewKind};

#[test]
fn storage_view_closes_when_site_disappears() -> anyhow::Result<()> {
    let now = Instant::now();
    let mut context = common::joined_context(now);
    let storage = context
        .ledger()
        .id_at(0)
        .ok_or_else(|| anyhow::anyhow!("storage should be tracked"))?;
    context.dispatch(Intent::OpenBuilding(storage), now)?;
    assert!(context.views().is_open(ViewKind::Storage));

    let mut next = common::base_snapshot();
    next.cell
        .objects
        .retain(|object| !matches!(object, CellObject::ConstructionSite(_)));
    let update = context.handle_message(common::frame(next), now);

    assert_eq!(update.views.get(&ViewKind::Storage), Some(&ViewAction::Close));
    assert!(context.views().binding(ViewKind::Storage).is_none());
    assert!(context.views().is_empty());
    Ok(())
}

#[test]
fn stored_item_change_rerenders_storage() -> anyhow::Result<()> {
    let now = Instant::now();
    let mut context = common::joined_context(now);
    let storage = context
        .ledger()
        .id_at(0)
        .ok_or_else(|| anyhow::anyhow!("storage should be tracked"))?;
    context.dispatch(Intent::OpenBuilding(storage), now)?;

    let unchanged = context.handle_message(common::frame(common::base_snapshot()), now);
    assert!(unchanged.views.is_empty());

    let mut next = common::base_snapshot();
    let Some(CellObject::ConstructionSite(site)) = next.cell.objects.get_mut(1) else {
        panic!("fixture should carry the castle second");
    };
    let Building::Storage(vault) = &mut site.buildings[0] else {
        panic!("first building should be storage");
    };
    vault.inventory[0].quantity = Some(2);
    let update = context.handle_message(common::frame(next), now);
    assert_eq!(update.views.get(&ViewKind::Storage), Some(&ViewAction::Render));
    Ok(())
}

/// Base snapshot with a forge constructed ahead of the existing buildings.
fn snapshot_with_forge_first() -> realm_proto::Snapshot {
    let mut next = common::base_snapshot();
    let Some(CellObject::ConstructionSite(site)) = next.cell.objects.get_mut(1) else {
        panic!("fixture should carry the castle second");
    };
    site.buildings.insert(
        0,
        Building::Enhancement(EnhancementBuilding {
            id: None,
            name: "Forge".into(),
            level: 1,
        }),
    );
    next
}

#[test]
fn building_inserted_ahead_keeps_binding_and_shifts_wire_index() -> anyhow::Result<()> {
    let now = Instant::now();
    let mut context = common::joined_context(now);
    let storage = context
        .ledger()
        .id_at(0)
        .ok_or_else(|| anyhow::anyhow!("storage should be tracked"))?;
    context.dispatch(Intent::OpenBuilding(storage), now)?;

    let update = context.handle_message(common::frame(snapshot_with_forge_first()), now);
    assert_ne!(update.views.get(&ViewKind::Storage), Some(&ViewAction::Close));
    assert!(context.views().is_open(ViewKind::Storage));
    assert_eq!(context.ledger().slot(storage), Some(1));

    let dispatch = context.dispatch(
        Intent::Withdraw {
            building: storage,
            item_index: 0,
        },
        now,
    )?;
    assert_eq!(
        dispatch.command,
        Some(ClientCommand::WithdrawStorage {
            building_index: 1,
            item_index: 0,
            storage_type: StorageKind::Storage,
        })
    );
    Ok(())
}

#[test]
fn enchanting_uses_selected_item_and_closes_forge() -> anyhow::Result<()> {
    let now = Instant::now();
    let mut context = common::joined_context(now);
    context.handle_message(common::frame(snapshot_with_forge_first()), now);
    let forge = context
        .ledger()
        .id_at(0)
        .ok_or_else(|| anyhow::anyhow!("forge should be tracked"))?;

    assert_eq!(
        context.dispatch(Intent::Enchant { rune_index: 0 }, now),
        Err(DispatchError::NoEnhancementView)
    );
    context.dispatch(Intent::OpenBuilding(forge), now)?;
    assert!(context.views().is_open(ViewKind::Enhancement));
    assert_eq!(
        context.dispatch(Intent::Enchant { rune_index: 0 }, now),
        Err(DispatchError::NoEnchantSelection)
    );
    assert_eq!(
        context.dispatch(Intent::SelectEnchantItem(0), now),
        Err(DispatchError::NotEnchantable(0))
    );

    let sword = context
        .state()
        .and_then(|state| {
            state
                .player
                .inventory
                .iter()
                .position(|item| item.kind == ItemKind::Equipment)
        })
        .ok_or_else(|| anyhow::anyhow!("fixture should carry a sword"))?;
    context.dispatch(Intent::SelectEnchantItem(sword), now)?;
    let dispatch = context.dispatch(Intent::Enchant { rune_index: 0 }, now)?;
    assert_eq!(
        dispatch.command,
        Some(ClientCommand::EnchantItem {
            building_index: 0,
            item_index: sword,
            rune_index: 0,
        })
    );
    assert_eq!(
        dispatch.update.views.get(&ViewKind::Enhancement),
        Some(&ViewAction::Close)
    );
    assert!(!context.views().is_open(ViewKind::Enhancement));
    Ok(())
}

#[test]
fn item_popup_closes_when_item_leaves_inventory() -> anyhow::Result<()> {
    let now = Instant::now();
    let mut context = common::joined_context(now);
    context.dispatch(Intent::ShowItem(ItemPath::Inventory(1)), now)?;
    assert!(context.views().is_open(ViewKind::ItemPopup));

    let mut next = common::base_snapshot();
    next.player.inventory.truncate(1);
    let update = context.handle_message(common::frame(next), now);
    assert_eq!(update.views.get(&ViewKind::ItemPopup), Some(&ViewAction::Close));
    Ok(())
}

#[test]
fn opening_an_absent_target_is_rejected() {
    let now = Instant::now();
    let mut context = common::joined_context(now);
    let result = context.dispatch(
        Intent::ShowEnemyInfo(realm_proto::EntityId::new("ghost")),
        now,
    );
    assert_eq!(result, Err(DispatchError::Unresolvable(ViewKind::EnemyInfo)));
    assert!(context.views().is_empty());
}
