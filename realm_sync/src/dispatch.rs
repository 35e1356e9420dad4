//! User intents in, wire commands and local view changes out.

use std::time::Instant;

use realm_proto::{Building, ClientCommand, EntityId, JoinDecision, JoinPolicy, TeamId};
use thiserror::Error;

use crate::context::{ClientContext, FrameUpdate, SceneRefresh};
use crate::ledger::BuildingId;
use crate::scene::SceneMode;
use crate::store::GameState;
use crate::views::{EntityPath, ItemPath, ViewKind, ViewUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    UpLeft,
    UpRight,
    DownLeft,
    DownRight,
}

impl Direction {
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
            Direction::UpLeft => (-1, -1),
            Direction::UpRight => (1, -1),
            Direction::DownLeft => (-1, 1),
            Direction::DownRight => (1, 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Login { name: String, password: String },
    MoveTo { x: i32, y: i32 },
    MoveDirection(Direction),
    Attack(EntityId),
    Build,
    Donate,
    DeploySiege,
    GoOutside,
    GoInside,
    Respawn,
    SummonBoss,
    EquipItem(usize),
    UnequipItem(String),
    UseItem(usize),
    CreateTeam(String),
    JoinTeam(TeamId),
    LeaveTeam,
    RequestToJoin(TeamId),
    UpdateTeamSettings {
        team_id: TeamId,
        description: String,
        join_policy: JoinPolicy,
        color: Option<String>,
    },
    ResolveJoinRequest {
        team_id: TeamId,
        requester_id: EntityId,
        decision: JoinDecision,
    },
    BuildBuilding(String),
    Deposit {
        building: BuildingId,
        item_index: usize,
        quantity: u32,
    },
    Withdraw {
        building: BuildingId,
        item_index: usize,
    },
    Craft {
        building: BuildingId,
        recipe_id: u32,
    },
    SelectEnchantItem(usize),
    Enchant {
        rune_index: usize,
    },
    OpenBuilding(BuildingId),
    OpenTeams,
    OpenBuildMenu,
    ShowEnemyInfo(EntityId),
    ShowPlayerProfile(EntityId),
    ShowItem(ItemPath),
    CloseView(ViewKind),
    CloseAllViews,
    ToggleMapView,
    ToggleCharacterPanel,
    CyclePanelTab,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("no snapshot has been received yet")]
    NoSnapshot,
    #[error("login name must not be empty")]
    EmptyLoginName,
    #[error("team name must not be empty")]
    EmptyTeamName,
    #[error("building {0} is not part of the viewer's site")]
    UnknownBuilding(BuildingId),
    #[error("building {0} has no storage")]
    NotStorage(BuildingId),
    #[error("no enhancement view is open")]
    NoEnhancementView,
    #[error("select an item to enchant first")]
    NoEnchantSelection,
    #[error("inventory slot {0} cannot take an enchantment")]
    NotEnchantable(usize),
    #[error("{0:?} view has nothing to show")]
    Unresolvable(ViewKind),
}

/// Result of one intent: at most one outbound command plus local redraws.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dispatch {
    pub command: Option<ClientCommand>,
    pub update: FrameUpdate,
}

impl Dispatch {
    fn send(command: ClientCommand) -> Self {
        Self {
            command: Some(command),
            update: FrameUpdate::default(),
        }
    }

    fn local(update: FrameUpdate) -> Self {
        Self {
            command: None,
            update,
        }
    }

    fn with_views(mut self, updates: impl IntoIterator<Item = ViewUpdate>) -> Self {
        self.update.push_views(updates);
        self
    }
}

impl ClientContext {
    pub fn dispatch(&mut self, intent: Intent, now: Instant) -> Result<Dispatch, DispatchError> {
        let dispatch = match intent {
            Intent::Login { name, password } => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err(DispatchError::EmptyLoginName);
                }
                Dispatch::send(ClientCommand::Login { name, password })
            }
            Intent::MoveTo { x, y } => {
                let (x, y) = self.config.world.clamp(x, y);
                Dispatch::send(ClientCommand::Move { x, y })
            }
            Intent::MoveDirection(direction) => {
                let player = &self.current()?.player;
                let (dx, dy) = direction.delta();
                let (x, y) = self.config.world.clamp(player.x + dx, player.y + dy);
                Dispatch::send(ClientCommand::Move { x, y })
            }
            Intent::Attack(target_id) => Dispatch::send(ClientCommand::Attack { target_id }),
            Intent::Build => Dispatch::send(ClientCommand::Build),
            Intent::Donate => Dispatch::send(ClientCommand::Donate),
            Intent::DeploySiege => Dispatch::send(ClientCommand::DeploySiege),
            Intent::GoOutside => Dispatch::send(ClientCommand::GoOutside),
            Intent::GoInside => Dispatch::send(ClientCommand::GoInside),
            Intent::Respawn => Dispatch::send(ClientCommand::Respawn),
            Intent::SummonBoss => Dispatch::send(ClientCommand::SummonBoss),
            Intent::EquipItem(item_index) => Dispatch::send(ClientCommand::EquipItem { item_index }),
            Intent::UnequipItem(slot) => Dispatch::send(ClientCommand::UnequipItem { slot }),
            Intent::UseItem(item_index) => Dispatch::send(ClientCommand::UseItem { item_index }),
            Intent::CreateTeam(name) => self.create_team(name.trim(), now)?,
            Intent::JoinTeam(team_id) => Dispatch::send(ClientCommand::JoinTeam { team_id }),
            Intent::LeaveTeam => Dispatch::send(ClientCommand::LeaveTeam),
            Intent::RequestToJoin(team_id) => {
                Dispatch::send(ClientCommand::RequestToJoin { team_id })
            }
            Intent::UpdateTeamSettings {
                team_id,
                description,
                join_policy,
                color,
            } => {
                let state = self.store.current_mut().ok_or(DispatchError::NoSnapshot)?;
                let command = self.bridge.update_team_settings(
                    state,
                    &mut self.cache,
                    &team_id,
                    &description,
                    join_policy,
                    color.as_deref(),
                );
                let views = self.reconcile_views();
                Dispatch::send(command).with_views(views)
            }
            Intent::ResolveJoinRequest {
                team_id,
                requester_id,
                decision,
            } => Dispatch::send(ClientCommand::ResolveJoinRequest {
                team_id,
                requester_id,
                decision,
            }),
            Intent::BuildBuilding(building_name) => {
                Dispatch::send(ClientCommand::BuildBuilding { building_name })
                    .with_views(self.views.close(ViewKind::BuildMenu))
            }
            Intent::Deposit {
                building,
                item_index,
                quantity,
            } => {
                let (building_index, storage_type) = self.storage_slot(building)?;
                Dispatch::send(ClientCommand::DepositStorage {
                    building_index,
                    item_index,
                    storage_type,
                    quantity: quantity.max(1),
                })
            }
            Intent::Withdraw {
                building,
                item_index,
            } => {
                let (building_index, storage_type) = self.storage_slot(building)?;
                Dispatch::send(ClientCommand::WithdrawStorage {
                    building_index,
                    item_index,
                    storage_type,
                })
            }
            Intent::Craft {
                building,
                recipe_id,
            } => {
                let (building_index, _) = self.building_slot(building)?;
                Dispatch::send(ClientCommand::CraftItem {
                    building_index,
                    recipe_id,
                })
            }
            Intent::SelectEnchantItem(index) => self.select_enchant_item(index)?,
            Intent::Enchant { rune_index } => self.enchant(rune_index)?,
            Intent::OpenBuilding(id) => {
                let (_, building) = self.building_slot(id)?;
                let kind = ViewKind::for_building(building);
                self.open_view(kind, EntityPath::OwnSiteBuilding(id))?
            }
            Intent::OpenTeams => self.open_view(ViewKind::Teams, EntityPath::TeamRoster)?,
            Intent::OpenBuildMenu => {
                self.open_view(ViewKind::BuildMenu, EntityPath::BuildTemplates)?
            }
            Intent::ShowEnemyInfo(id) => {
                self.open_view(ViewKind::EnemyInfo, EntityPath::CellObject(id))?
            }
            Intent::ShowPlayerProfile(id) => {
                self.open_view(ViewKind::PlayerProfile, EntityPath::Player(id))?
            }
            Intent::ShowItem(path) => self.open_view(ViewKind::ItemPopup, EntityPath::Item(path))?,
            Intent::CloseView(kind) => {
                let mut update = FrameUpdate::default();
                update.push_views(self.views.close(kind));
                Dispatch::local(update)
            }
            Intent::CloseAllViews => {
                let mut update = FrameUpdate::default();
                update.push_views(self.views.close_all());
                Dispatch::local(update)
            }
            Intent::ToggleMapView => {
                let mode = self.scene.toggle();
                tracing::debug!(target: "realm::scene", ?mode, "scene.mode_changed");
                Dispatch::local(FrameUpdate {
                    scene: SceneRefresh::Rebuild,
                    panel_rebuild: mode == SceneMode::AreaView,
                    ..FrameUpdate::default()
                })
            }
            Intent::ToggleCharacterPanel => {
                self.scene.toggle_panel();
                Dispatch::local(FrameUpdate {
                    panel_rebuild: true,
                    ..FrameUpdate::default()
                })
            }
            Intent::CyclePanelTab => {
                self.scene.cycle_tab();
                Dispatch::local(FrameUpdate {
                    panel_rebuild: true,
                    ..FrameUpdate::default()
                })
            }
        };
        if let Some(command) = dispatch.command.as_ref() {
            tracing::debug!(target: "realm::dispatch", action = command.action(), "command.queued");
        }
        Ok(dispatch)
    }

    fn current(&self) -> Result<&GameState, DispatchError> {
        self.store.current().ok_or(DispatchError::NoSnapshot)
    }

    fn reconcile_views(&mut self) -> Vec<ViewUpdate> {
        match self.store.current() {
            Some(current) => {
                self.ledger.sync(current.own_site());
                self.views.reconcile(current, &self.ledger)
            }
            None => Vec::new(),
        }
    }

    fn create_team(&mut self, name: &str, now: Instant) -> Result<Dispatch, DispatchError> {
        if name.is_empty() {
            return Err(DispatchError::EmptyTeamName);
        }
        let state = self.store.current_mut().ok_or(DispatchError::NoSnapshot)?;
        let command = self.bridge.create_team(state, name, now);
        let views = self.reconcile_views();
        let mut dispatch = Dispatch::send(command).with_views(views);
        dispatch.update.scene = SceneRefresh::Rebuild;
        Ok(dispatch)
    }

    /// Wire index of a building on the viewer's site, resolved at send time.
    fn building_slot(&self, id: BuildingId) -> Result<(usize, &Building), DispatchError> {
        let site = self
            .current()?
            .own_site()
            .ok_or(DispatchError::UnknownBuilding(id))?;
        self.ledger
            .resolve(id, site)
            .ok_or(DispatchError::UnknownBuilding(id))
    }

    fn storage_slot(
        &self,
        id: BuildingId,
    ) -> Result<(usize, realm_proto::StorageKind), DispatchError> {
        let (index, building) = self.building_slot(id)?;
        let kind = building
            .storage_kind()
            .ok_or(DispatchError::NotStorage(id))?;
        Ok((index, kind))
    }

    fn open_view(&mut self, kind: ViewKind, path: EntityPath) -> Result<Dispatch, DispatchError> {
        let state = self.store.current().ok_or(DispatchError::NoSnapshot)?;
        let update = self
            .views
            .open(kind, path, state, &self.ledger)
            .ok_or(DispatchError::Unresolvable(kind))?;
        Ok(Dispatch::local(FrameUpdate::default()).with_views([update]))
    }

    fn select_enchant_item(&mut self, index: usize) -> Result<Dispatch, DispatchError> {
        let enchantable = self
            .current()?
            .player
            .inventory
            .get(index)
            .is_some_and(realm_proto::Item::can_take_enchantment);
        if !enchantable {
            return Err(DispatchError::NotEnchantable(index));
        }
        let local = self
            .views
            .local_mut(ViewKind::Enhancement)
            .ok_or(DispatchError::NoEnhancementView)?;
        local.selected_item = match local.selected_item {
            Some(selected) if selected == index => None,
            _ => Some(index),
        };
        Ok(Dispatch::local(FrameUpdate::default())
            .with_views([ViewUpdate::render(ViewKind::Enhancement)]))
    }

    fn enchant(&mut self, rune_index: usize) -> Result<Dispatch, DispatchError> {
        let binding = self
            .views
            .binding(ViewKind::Enhancement)
            .ok_or(DispatchError::NoEnhancementView)?;
        let EntityPath::OwnSiteBuilding(building) = &binding.path else {
            return Err(DispatchError::NoEnhancementView);
        };
        let building = *building;
        let item_index = binding
            .local
            .selected_item
            .ok_or(DispatchError::NoEnchantSelection)?;
        let (building_index, _) = self.building_slot(building)?;
        let command = ClientCommand::EnchantItem {
            building_index,
            item_index,
            rune_index,
        };
        Ok(Dispatch::send(command).with_views(self.views.close(ViewKind::Enhancement)))
    }
}
