//! Open modals and the entities they are bound to.
//!
//! Every snapshot re-resolves each binding's path. A path that no longer
//! resolves closes the view; a resolution whose projected bytes changed
//! re-renders it; anything else is left alone.

use std::collections::BTreeMap;

use realm_proto::{
    canonical_bytes, fingerprint, Building, BuildingTemplate, CellObject, EntityId, Item, PlayerState, TeamRoster,
};

use crate::ledger::{BuildingId, BuildingLedger};
use crate::store::GameState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ViewKind {
    Storage,
    Crafting,
    Enhancement,
    Teams,
    EnemyInfo,
    PlayerProfile,
    BuildMenu,
    ItemPopup,
}

impl ViewKind {
    pub const ALL: [ViewKind; 8] = [
        ViewKind::Storage,
        ViewKind::Crafting,
        ViewKind::Enhancement,
        ViewKind::Teams,
        ViewKind::EnemyInfo,
        ViewKind::PlayerProfile,
        ViewKind::BuildMenu,
        ViewKind::ItemPopup,
    ];

    pub fn title(self) -> &'static str {
        match self {
            ViewKind::Storage => "Storage",
            ViewKind::Crafting => "Crafting",
            ViewKind::Enhancement => "Enhancement",
            ViewKind::Teams => "Teams",
            ViewKind::EnemyInfo => "Enemy",
            ViewKind::PlayerProfile => "Player",
            ViewKind::BuildMenu => "Build",
            ViewKind::ItemPopup => "Item",
        }
    }

    /// Kind of modal a building opens.
    pub fn for_building(building: &Building) -> Self {
        match building {
            Building::Storage(_) | Building::PersonalStorage(_) => ViewKind::Storage,
            Building::Crafting(_) => ViewKind::Crafting,
            Building::Enhancement(_) => ViewKind::Enhancement,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemPath {
    Inventory(usize),
    Equipment(String),
    Stored { building: BuildingId, index: usize },
}

/// Where in a merged snapshot a view's entity lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityPath {
    OwnSiteBuilding(BuildingId),
    CellObject(EntityId),
    Player(EntityId),
    TeamRoster,
    BuildTemplates,
    Item(ItemPath),
}

#[derive(Debug, Clone, Copy)]
pub enum Resolved<'a> {
    Building { index: usize, building: &'a Building },
    Object(&'a CellObject),
    Player(&'a PlayerState),
    Roster(&'a TeamRoster),
    Templates(&'a BTreeMap<String, BuildingTemplate>),
    Item(&'a Item),
}

pub fn resolve<'a>(
    path: &EntityPath,
    state: &'a GameState,
    ledger: &BuildingLedger,
) -> Option<Resolved<'a>> {
    match path {
        EntityPath::OwnSiteBuilding(id) => {
            let (index, building) = ledger.resolve(*id, state.own_site()?)?;
            Some(Resolved::Building { index, building })
        }
        EntityPath::CellObject(id) => state.cell.object(id).map(Resolved::Object),
        EntityPath::Player(id) if *id == state.player.id => Some(Resolved::Player(&state.player)),
        EntityPath::Player(id) => state.cell.player(id).map(Resolved::Player),
        EntityPath::TeamRoster => Some(Resolved::Roster(&state.teams)),
        EntityPath::BuildTemplates => Some(Resolved::Templates(&state.statics.building_templates)),
        EntityPath::Item(item) => resolve_item(item, state, ledger).map(Resolved::Item),
    }
}

fn resolve_item<'a>(path: &ItemPath, state: &'a GameState, ledger: &BuildingLedger) -> Option<&'a Item> {
    match path {
        ItemPath::Inventory(index) => state.player.inventory.get(*index),
        ItemPath::Equipment(slot) => state.player.equipped(slot),
        ItemPath::Stored { building, index } => {
            let (_, building) = ledger.resolve(*building, state.own_site()?)?;
            building.stored_items(&state.player.id).get(*index)
        }
    }
}

/// A resolution only counts when it is the shape the view renders.
fn accepts(kind: ViewKind, resolved: &Resolved<'_>) -> bool {
    match (kind, resolved) {
        (ViewKind::Storage, Resolved::Building { building, .. }) => {
            building.storage_kind().is_some()
        }
        (ViewKind::Crafting, Resolved::Building { building, .. }) => {
            matches!(building, Building::Crafting(_))
        }
        (ViewKind::Enhancement, Resolved::Building { building, .. }) => {
            matches!(building, Building::Enhancement(_))
        }
        (ViewKind::Teams, Resolved::Roster(_)) => true,
        (ViewKind::EnemyInfo, Resolved::Object(object)) => matches!(object, CellObject::Mob(_)),
        (ViewKind::PlayerProfile, Resolved::Player(_)) => true,
        (ViewKind::BuildMenu, Resolved::Templates(_)) => true,
        (ViewKind::ItemPopup, Resolved::Item(_)) => true,
        _ => false,
    }
}

/// Canonical encoding of the slice of state a view kind displays.
pub type Projection = fn(&Resolved<'_>, &GameState) -> Vec<u8>;

fn project_storage(resolved: &Resolved<'_>, state: &GameState) -> Vec<u8> {
    match resolved {
        Resolved::Building { building, .. } => canonical_bytes(&(
            building.name(),
            building.level(),
            building.stored_items(&state.player.id),
            &state.player.inventory,
        )),
        _ => Vec::new(),
    }
}

fn project_crafting(resolved: &Resolved<'_>, state: &GameState) -> Vec<u8> {
    match resolved {
        Resolved::Building {
            building: Building::Crafting(crafting),
            ..
        } => canonical_bytes(&(
            crafting.level,
            crafting.slots,
            &crafting.crafting_queue,
            &crafting.recipe_ids,
            &state.player.inventory,
        )),
        _ => Vec::new(),
    }
}

fn project_enhancement(resolved: &Resolved<'_>, state: &GameState) -> Vec<u8> {
    match resolved {
        Resolved::Building { building, .. } => {
            canonical_bytes(&(building.level(), &state.player.inventory))
        }
        _ => Vec::new(),
    }
}

fn project_teams(_: &Resolved<'_>, state: &GameState) -> Vec<u8> {
    canonical_bytes(&(&state.teams, &state.player.team, &state.default_team))
}

fn project_object(resolved: &Resolved<'_>, _: &GameState) -> Vec<u8> {
    match resolved {
        Resolved::Object(object) => canonical_bytes(*object),
        _ => Vec::new(),
    }
}

fn project_player(resolved: &Resolved<'_>, state: &GameState) -> Vec<u8> {
    match resolved {
        Resolved::Player(player) => {
            canonical_bytes(&(*player, state.team_of(player.team.as_ref())))
        }
        _ => Vec::new(),
    }
}

fn project_templates(resolved: &Resolved<'_>, _: &GameState) -> Vec<u8> {
    match resolved {
        Resolved::Templates(templates) => canonical_bytes(*templates),
        _ => Vec::new(),
    }
}

fn project_item(resolved: &Resolved<'_>, _: &GameState) -> Vec<u8> {
    match resolved {
        Resolved::Item(item) => canonical_bytes(*item),
        _ => Vec::new(),
    }
}

pub fn default_projection(kind: ViewKind) -> Projection {
    match kind {
        ViewKind::Storage => project_storage,
        ViewKind::Crafting => project_crafting,
        ViewKind::Enhancement => project_enhancement,
        ViewKind::Teams => project_teams,
        ViewKind::EnemyInfo => project_object,
        ViewKind::PlayerProfile => project_player,
        ViewKind::BuildMenu => project_templates,
        ViewKind::ItemPopup => project_item,
    }
}

/// State a view keeps for itself that the authority never sees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewLocal {
    pub selected_item: Option<usize>,
}

impl ViewLocal {
    fn revalidate(&mut self, kind: ViewKind, state: &GameState) {
        if kind != ViewKind::Enhancement {
            return;
        }
        let still_valid = self
            .selected_item
            .and_then(|index| state.player.inventory.get(index))
            .is_some_and(Item::can_take_enchantment);
        if !still_valid {
            self.selected_item = None;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewBinding {
    pub kind: ViewKind,
    pub path: EntityPath,
    pub local: ViewLocal,
    projected: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewAction {
    Render,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewUpdate {
    pub kind: ViewKind,
    pub action: ViewAction,
}

impl ViewUpdate {
    pub fn render(kind: ViewKind) -> Self {
        Self {
            kind,
            action: ViewAction::Render,
        }
    }

    pub fn close(kind: ViewKind) -> Self {
        Self {
            kind,
            action: ViewAction::Close,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewScopeRegistry {
    /// Open views in opening order; the last one is on top.
    bindings: Vec<ViewBinding>,
    projections: BTreeMap<ViewKind, Projection>,
}

impl Default for ViewScopeRegistry {
    fn default() -> Self {
        Self {
            bindings: Vec::new(),
            projections: ViewKind::ALL
                .into_iter()
                .map(|kind| (kind, default_projection(kind)))
                .collect(),
        }
    }
}

impl ViewScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the dirty projection for one view kind.
    pub fn set_projection(&mut self, kind: ViewKind, projection: Projection) {
        self.projections.insert(kind, projection);
    }

    fn projection(&self, kind: ViewKind) -> Projection {
        self.projections
            .get(&kind)
            .copied()
            .unwrap_or_else(|| default_projection(kind))
    }

    /// Open (or re-point) the view of `kind`. Returns `None` when the path
    /// does not resolve, in which case nothing is opened.
    pub fn open(
        &mut self,
        kind: ViewKind,
        path: EntityPath,
        state: &GameState,
        ledger: &BuildingLedger,
    ) -> Option<ViewUpdate> {
        let resolved = resolve(&path, state, ledger).filter(|resolved| accepts(kind, resolved))?;
        let projected = self.projection(kind)(&resolved, state);
        self.bindings.retain(|binding| binding.kind != kind);
        self.bindings.push(ViewBinding {
            kind,
            path,
            local: ViewLocal::default(),
            projected,
        });
        tracing::debug!(target: "realm::views", ?kind, "view.opened");
        Some(ViewUpdate::render(kind))
    }

    pub fn close(&mut self, kind: ViewKind) -> Option<ViewUpdate> {
        let before = self.bindings.len();
        self.bindings.retain(|binding| binding.kind != kind);
        (self.bindings.len() != before).then(|| ViewUpdate::close(kind))
    }

    pub fn close_all(&mut self) -> Vec<ViewUpdate> {
        self.bindings
            .drain(..)
            .map(|binding| ViewUpdate::close(binding.kind))
            .collect()
    }

    /// Re-resolve every binding against a fresh merged snapshot.
    pub fn reconcile(&mut self, state: &GameState, ledger: &BuildingLedger) -> Vec<ViewUpdate> {
        let projections = &self.projections;
        let mut updates = Vec::new();
        self.bindings.retain_mut(|binding| {
            let resolved = resolve(&binding.path, state, ledger)
                .filter(|resolved| accepts(binding.kind, resolved));
            let Some(resolved) = resolved else {
                tracing::info!(
                    target: "realm::views",
                    kind = ?binding.kind,
                    path = ?binding.path,
                    "view.closed=unresolved"
                );
                updates.push(ViewUpdate::close(binding.kind));
                return false;
            };
            let projection = projections
                .get(&binding.kind)
                .copied()
                .unwrap_or_else(|| default_projection(binding.kind));
            let projected = projection(&resolved, state);
            if projected != binding.projected {
                tracing::trace!(
                    target: "realm::views",
                    kind = ?binding.kind,
                    digest = fingerprint(&projected),
                    "view.rerendered"
                );
                binding.projected = projected;
                binding.local.revalidate(binding.kind, state);
                updates.push(ViewUpdate::render(binding.kind));
            }
            true
        });
        updates
    }

    pub fn binding(&self, kind: ViewKind) -> Option<&ViewBinding> {
        self.bindings.iter().find(|binding| binding.kind == kind)
    }

    pub fn local_mut(&mut self, kind: ViewKind) -> Option<&mut ViewLocal> {
        self.bindings
            .iter_mut()
            .find(|binding| binding.kind == kind)
            .map(|binding| &mut binding.local)
    }

    pub fn is_open(&self, kind: ViewKind) -> bool {
        self.binding(kind).is_some()
    }

    pub fn top(&self) -> Option<&ViewBinding> {
        self.bindings.last()
    }

    pub fn open_views(&self) -> impl Iterator<Item = &ViewBinding> {
        self.bindings.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Resolve an open view for rendering.
    pub fn resolve_open<'a>(
        &self,
        kind: ViewKind,
        state: &'a GameState,
        ledger: &BuildingLedger,
    ) -> Option<Resolved<'a>> {
        let binding = self.binding(kind)?;
        resolve(&binding.path, state, ledger).filter(|resolved| accepts(kind, resolved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use realm_proto::{
        CellState, ItemKind, MobState, SiteState, StorageBuilding, Team, TeamId,
    };

    fn storage(items: Vec<Item>) -> Building {
        Building::Storage(StorageBuilding {
            name: "Storage".into(),
            level: 1,
            inventory: items,
            ..StorageBuilding::default()
        })
    }

    fn state_with_site(buildings: Vec<Building>) -> GameState {
        let team = TeamId::new("t1");
        GameState {
            player: PlayerState {
                id: EntityId::new("p1"),
                team: Some(team.clone()),
                ..PlayerState::default()
            },
            cell: CellState {
                objects: vec![CellObject::ConstructionSite(SiteState {
                    id: EntityId::new("s1"),
                    team: Some(team),
                    buildings,
                    ..SiteState::default()
                })],
                ..CellState::default()
            },
            ..GameState::default()
        }
    }

    fn apple() -> Item {
        Item {
            name: "Apple".into(),
            ..Item::default()
        }
    }

    #[test]
    fn unchanged_projection_is_a_noop() {
        let state = state_with_site(vec![storage(vec![])]);
        let mut ledger = BuildingLedger::new();
        ledger.sync(state.own_site());
        let mut registry = ViewScopeRegistry::new();
        let id = ledger.id_at(0).unwrap();
        assert!(registry
            .open(ViewKind::Storage, EntityPath::OwnSiteBuilding(id), &state, &ledger)
            .is_some());
        assert!(registry.reconcile(&state, &ledger).is_empty());
    }

    #[test]
    fn storage_contents_change_renders() {
        let state = state_with_site(vec![storage(vec![])]);
        let mut ledger = BuildingLedger::new();
        ledger.sync(state.own_site());
        let mut registry = ViewScopeRegistry::new();
        let id = ledger.id_at(0).unwrap();
        registry.open(ViewKind::Storage, EntityPath::OwnSiteBuilding(id), &state, &ledger);

        let next = state_with_site(vec![storage(vec![apple()])]);
        ledger.sync(next.own_site());
        assert_eq!(
            registry.reconcile(&next, &ledger),
            vec![ViewUpdate::render(ViewKind::Storage)]
        );
    }

    #[test]
    fn vanished_site_closes_the_view() {
        let state = state_with_site(vec![storage(vec![])]);
        let mut ledger = BuildingLedger::new();
        ledger.sync(state.own_site());
        let mut registry = ViewScopeRegistry::new();
        let id = ledger.id_at(0).unwrap();
        registry.open(ViewKind::Storage, EntityPath::OwnSiteBuilding(id), &state, &ledger);

        let mut next = state.clone();
        next.cell.objects.clear();
        ledger.sync(next.own_site());
        assert_eq!(
            registry.reconcile(&next, &ledger),
            vec![ViewUpdate::close(ViewKind::Storage)]
        );
        assert!(!registry.is_open(ViewKind::Storage));
    }

    #[test]
    fn enemy_info_only_opens_on_mobs() {
        let mut state = state_with_site(vec![]);
        state.cell.objects.push(CellObject::Mob(MobState {
            id: EntityId::new("m1"),
            ..MobState::default()
        }));
        let ledger = BuildingLedger::new();
        let mut registry = ViewScopeRegistry::new();
        assert!(registry
            .open(
                ViewKind::EnemyInfo,
                EntityPath::CellObject(EntityId::new("s1")),
                &state,
                &ledger
            )
            .is_none());
        assert!(registry
            .open(
                ViewKind::EnemyInfo,
                EntityPath::CellObject(EntityId::new("m1")),
                &state,
                &ledger
            )
            .is_some());
    }

    #[test]
    fn team_view_follows_roster_and_pointer() {
        let mut state = state_with_site(vec![]);
        let ledger = BuildingLedger::new();
        let mut registry = ViewScopeRegistry::new();
        registry.open(ViewKind::Teams, EntityPath::TeamRoster, &state, &ledger);

        state.teams.insert(
            TeamId::new("t2"),
            Team {
                id: TeamId::new("t2"),
                name: "Bravo".into(),
                ..Team::default()
            },
        );
        assert_eq!(
            registry.reconcile(&state, &ledger),
            vec![ViewUpdate::render(ViewKind::Teams)]
        );
        state.player.team = Some(TeamId::new("t2"));
        assert_eq!(registry.reconcile(&state, &ledger).len(), 1);
        assert!(registry.reconcile(&state, &ledger).is_empty());
    }

    #[test]
    fn selection_cleared_when_item_stops_qualifying() {
        let mut state = state_with_site(vec![Building::Enhancement(
            realm_proto::EnhancementBuilding {
                name: "Forge".into(),
                level: 1,
                ..Default::default()
            },
        )]);
        state.player.inventory.push(Item {
            name: "Sword".into(),
            kind: ItemKind::Equipment,
            enhancement_slots: 1,
            ..Item::default()
        });
        let mut ledger = BuildingLedger::new();
        ledger.sync(state.own_site());
        let mut registry = ViewScopeRegistry::new();
        let id = ledger.id_at(0).unwrap();
        registry.open(ViewKind::Enhancement, EntityPath::OwnSiteBuilding(id), &state, &ledger);
        registry.local_mut(ViewKind::Enhancement).unwrap().selected_item = Some(0);

        state.player.inventory[0]
            .enchantments
            .push(realm_proto::Enchantment {
                name: "Fire".into(),
            });
        registry.reconcile(&state, &ledger);
        assert_eq!(
            registry.binding(ViewKind::Enhancement).unwrap().local.selected_item,
            None
        );
    }

    #[test]
    fn custom_projection_replaces_default() {
        fn never_dirty(_: &Resolved<'_>, _: &GameState) -> Vec<u8> {
            vec![7]
        }
        let mut state = state_with_site(vec![]);
        let ledger = BuildingLedger::new();
        let mut registry = ViewScopeRegistry::new();
        registry.set_projection(ViewKind::PlayerProfile, never_dirty);
        registry.open(
            ViewKind::PlayerProfile,
            EntityPath::Player(EntityId::new("p1")),
            &state,
            &ledger,
        );
        state.player.level = Some(9);
        assert!(registry.reconcile(&state, &ledger).is_empty());
    }

    #[test]
    fn any_byte_difference_renders() {
        fn level_byte(resolved: &Resolved<'_>, _: &GameState) -> Vec<u8> {
            match resolved {
                Resolved::Player(player) => vec![1, 2, player.level.unwrap_or(0) as u8],
                _ => Vec::new(),
            }
        }
        let mut state = state_with_site(vec![]);
        let ledger = BuildingLedger::new();
        let mut registry = ViewScopeRegistry::new();
        registry.set_projection(ViewKind::PlayerProfile, level_byte);
        registry.open(
            ViewKind::PlayerProfile,
            EntityPath::Player(EntityId::new("p1")),
            &state,
            &ledger,
        );
        state.player.level = Some(1);
        assert_eq!(
            registry.reconcile(&state, &ledger),
            vec![ViewUpdate::render(ViewKind::PlayerProfile)]
        );
        assert!(registry.reconcile(&state, &ledger).is_empty());
    }
}
