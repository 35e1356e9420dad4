//! Decides how much of the scene and character panel a new snapshot dirties.

use std::collections::BTreeSet;

use bitflags::bitflags;
use realm_proto::{CellObject, EntityId, PlayerState};

use crate::store::GameState;

bitflags! {
    /// Character panel groups that can be re-rendered independently.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DirtySubtrees: u8 {
        const STATS = 1 << 0;
        const EQUIPMENT = 1 << 1;
        const INVENTORY = 1 << 2;
        const SKILLS = 1 << 3;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshPlan {
    pub full_scene_rebuild: bool,
    pub panel_rebuild: bool,
    pub dirty_subtrees: DirtySubtrees,
    /// Entities whose stats bars need patching in place.
    pub per_entity_stats_changed: BTreeSet<EntityId>,
    /// Entities whose card content other than stats changed.
    pub cards_changed: BTreeSet<EntityId>,
}

impl RefreshPlan {
    pub fn rebuild_everything() -> Self {
        Self {
            full_scene_rebuild: true,
            panel_rebuild: true,
            dirty_subtrees: DirtySubtrees::all(),
            ..Self::default()
        }
    }

    pub fn is_noop(&self) -> bool {
        !self.full_scene_rebuild
            && !self.panel_rebuild
            && self.dirty_subtrees.is_empty()
            && self.per_entity_stats_changed.is_empty()
            && self.cards_changed.is_empty()
    }
}

pub fn plan_refresh(previous: Option<&GameState>, current: &GameState) -> RefreshPlan {
    let Some(previous) = previous else {
        return RefreshPlan::rebuild_everything();
    };
    if previous.player.is_dead != current.player.is_dead {
        return RefreshPlan::rebuild_everything();
    }

    let mut plan = RefreshPlan {
        dirty_subtrees: panel_diff(&previous.player, &current.player),
        ..RefreshPlan::default()
    };

    if scene_frame_changed(previous, current) {
        plan.full_scene_rebuild = true;
        return plan;
    }

    for player in &current.cell.players {
        let Some(before) = previous.cell.player(&player.id) else {
            plan.full_scene_rebuild = true;
            break;
        };
        if before.stats != player.stats {
            plan.per_entity_stats_changed.insert(player.id.clone());
        }
        if !same_player_card(before, player) {
            plan.cards_changed.insert(player.id.clone());
        }
    }
    if plan.full_scene_rebuild {
        return clear_patches(plan);
    }

    for object in &current.cell.objects {
        let Some(before) = previous.cell.object(object.id()) else {
            plan.full_scene_rebuild = true;
            break;
        };
        if before.kind() != object.kind() {
            plan.full_scene_rebuild = true;
            break;
        }
        if before.stats() != object.stats() {
            plan.per_entity_stats_changed.insert(object.id().clone());
        }
        if !same_object_card(before, object) {
            plan.cards_changed.insert(object.id().clone());
        }
    }
    if plan.full_scene_rebuild {
        return clear_patches(plan);
    }
    plan
}

/// Changes that invalidate the scene layout rather than a single card.
fn scene_frame_changed(previous: &GameState, current: &GameState) -> bool {
    previous.cell.players.len() != current.cell.players.len()
        || previous.cell.objects.len() != current.cell.objects.len()
        || previous.cell.x != current.cell.x
        || previous.cell.y != current.cell.y
        || previous.player.is_inside_castle != current.player.is_inside_castle
        || previous.player.team != current.player.team
}

fn clear_patches(mut plan: RefreshPlan) -> RefreshPlan {
    plan.per_entity_stats_changed.clear();
    plan.cards_changed.clear();
    plan
}

fn panel_diff(previous: &PlayerState, current: &PlayerState) -> DirtySubtrees {
    let mut dirty = DirtySubtrees::empty();
    dirty.set(DirtySubtrees::STATS, previous.stats != current.stats);
    dirty.set(
        DirtySubtrees::EQUIPMENT,
        previous.equipment != current.equipment,
    );
    dirty.set(
        DirtySubtrees::INVENTORY,
        previous.inventory != current.inventory,
    );
    dirty.set(DirtySubtrees::SKILLS, previous.skills != current.skills);
    dirty
}

fn same_player_card(a: &PlayerState, b: &PlayerState) -> bool {
    a.name == b.name
        && a.level == b.level
        && a.team == b.team
        && a.is_dead == b.is_dead
        && a.is_inside_castle == b.is_inside_castle
        && a.attacking_player == b.attacking_player
        && a.attacking_mob == b.attacking_mob
}

fn same_object_card(a: &CellObject, b: &CellObject) -> bool {
    match (a, b) {
        (CellObject::Mob(a), CellObject::Mob(b)) => {
            a.name == b.name
                && a.level == b.level
                && a.is_boss == b.is_boss
                && a.description == b.description
                && a.attackers == b.attackers
                && a.loot == b.loot
        }
        (CellObject::ConstructionSite(a), CellObject::ConstructionSite(b)) => {
            a.team == b.team
                && a.level == b.level
                && a.materials == b.materials
                && a.required_materials == b.required_materials
                && a.buildings == b.buildings
                && a.construction_complete_until == b.construction_complete_until
                && a.attackers == b.attackers
        }
        (CellObject::Siege(a), CellObject::Siege(b)) => a.team == b.team,
        _ => false,
    }
}
