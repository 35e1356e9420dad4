//! The single owner of client-side state and the entry point for inbound traffic.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use realm_proto::{EntityId, LoginPlayer, LootEntry, ServerMessage, Snapshot, StaticDataPayload};

use crate::cache::StaticDataCache;
use crate::config::ClientConfig;
use crate::ledger::BuildingLedger;
use crate::optimistic::{is_provisional, OptimisticBridge};
use crate::refresh::{plan_refresh, DirtySubtrees, RefreshPlan};
use crate::scene::{SceneMode, SceneState};
use crate::store::{fill_missing_loot, GameState, SnapshotStore};
use crate::views::{ViewAction, ViewKind, ViewScopeRegistry, ViewUpdate};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Connectivity {
    #[default]
    Disconnected,
    Connected,
    LoggedIn,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SceneRefresh {
    #[default]
    Unchanged,
    Patch {
        stats: BTreeSet<EntityId>,
        cards: BTreeSet<EntityId>,
    },
    Rebuild,
}

impl SceneRefresh {
    fn absorb(&mut self, other: SceneRefresh) {
        match other {
            SceneRefresh::Unchanged => {}
            SceneRefresh::Rebuild => *self = SceneRefresh::Rebuild,
            SceneRefresh::Patch {
                stats: more_stats,
                cards: more_cards,
            } => match self {
                SceneRefresh::Rebuild => {}
                SceneRefresh::Unchanged => {
                    *self = SceneRefresh::Patch {
                        stats: more_stats,
                        cards: more_cards,
                    }
                }
                SceneRefresh::Patch { stats, cards } => {
                    stats.extend(more_stats);
                    cards.extend(more_cards);
                }
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Welcome(String),
    Log(String),
    Combat(String),
    Error(String),
    Connection(String),
}

impl Notice {
    pub fn text(&self) -> &str {
        match self {
            Notice::Welcome(text)
            | Notice::Log(text)
            | Notice::Combat(text)
            | Notice::Error(text)
            | Notice::Connection(text) => text,
        }
    }
}

/// Everything a frontend has to redraw after one or more inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameUpdate {
    pub scene: SceneRefresh,
    pub panel_rebuild: bool,
    pub dirty_subtrees: DirtySubtrees,
    pub views: BTreeMap<ViewKind, ViewAction>,
    pub notices: Vec<Notice>,
    pub connectivity_changed: bool,
}

impl FrameUpdate {
    pub fn scene_rebuild() -> Self {
        Self {
            scene: SceneRefresh::Rebuild,
            ..Self::default()
        }
    }

    pub fn notice(notice: Notice) -> Self {
        Self {
            notices: vec![notice],
            ..Self::default()
        }
    }

    fn from_plan(plan: RefreshPlan, mode: SceneMode) -> Self {
        let scene = match (mode, plan.full_scene_rebuild) {
            (_, true) => SceneRefresh::Rebuild,
            (SceneMode::MapView, false) => SceneRefresh::Unchanged,
            (SceneMode::AreaView, false)
                if plan.per_entity_stats_changed.is_empty() && plan.cards_changed.is_empty() =>
            {
                SceneRefresh::Unchanged
            }
            (SceneMode::AreaView, false) => SceneRefresh::Patch {
                stats: plan.per_entity_stats_changed,
                cards: plan.cards_changed,
            },
        };
        Self {
            scene,
            panel_rebuild: plan.panel_rebuild,
            dirty_subtrees: plan.dirty_subtrees,
            ..Self::default()
        }
    }

    pub fn push_views(&mut self, updates: impl IntoIterator<Item = ViewUpdate>) {
        for update in updates {
            self.views.insert(update.kind, update.action);
        }
    }

    /// Fold a later update into this one.
    pub fn merge(&mut self, later: FrameUpdate) {
        self.scene.absorb(later.scene);
        self.panel_rebuild |= later.panel_rebuild;
        self.dirty_subtrees |= later.dirty_subtrees;
        self.views.extend(later.views);
        self.notices.extend(later.notices);
        self.connectivity_changed |= later.connectivity_changed;
    }

    pub fn is_empty(&self) -> bool {
        *self == FrameUpdate::default()
    }
}

/// Keep only the newest snapshot in a drained batch; other frames keep their order.
///
/// Loot tables carried by the dropped snapshots are folded into the kept one,
/// since the authority sends each table only once per mob.
pub fn coalesce_snapshots(messages: Vec<ServerMessage>) -> Vec<ServerMessage> {
    let Some(newest) = messages.iter().rposition(ServerMessage::is_snapshot) else {
        return messages;
    };
    let before = messages.len();
    let mut loot: BTreeMap<EntityId, Vec<LootEntry>> = BTreeMap::new();
    let mut kept = Vec::with_capacity(before);
    let mut kept_snapshot = None;
    for (index, message) in messages.into_iter().enumerate() {
        match message {
            ServerMessage::GameState { state } if index != newest => {
                for mob in state.cell.mobs() {
                    if let Some(table) = mob.loot.as_ref() {
                        loot.entry(mob.id.clone()).or_insert_with(|| table.clone());
                    }
                }
            }
            message if index == newest => {
                kept_snapshot = Some(kept.len());
                kept.push(message);
            }
            message => kept.push(message),
        }
    }
    if !loot.is_empty() {
        if let Some(ServerMessage::GameState { state }) =
            kept_snapshot.and_then(|slot| kept.get_mut(slot))
        {
            fill_missing_loot(&mut state.cell, |id| loot.get(id));
        }
    }
    if kept.len() != before {
        tracing::trace!(
            target: "realm::inbound",
            dropped = before - kept.len(),
            carried_loot = loot.len(),
            "snapshots.coalesced"
        );
    }
    kept
}

/// Amount of damage dealt to `viewer` if the combat line reports it.
pub fn parse_damage_taken(line: &str, viewer: &str) -> Option<f64> {
    if viewer.is_empty() || !line.contains(&format!("damage to {viewer}")) {
        return None;
    }
    let (_, rest) = line.split_once("deals ")?;
    let (amount, _) = rest.split_once(" damage")?;
    amount.trim().parse().ok()
}

pub struct ClientContext {
    pub(crate) config: ClientConfig,
    pub(crate) cache: StaticDataCache,
    pub(crate) store: SnapshotStore,
    pub(crate) ledger: BuildingLedger,
    pub(crate) views: ViewScopeRegistry,
    pub(crate) bridge: OptimisticBridge,
    pub(crate) scene: SceneState,
    connectivity: Connectivity,
    session: Option<LoginPlayer>,
    last_damage_taken: Option<f64>,
}

impl ClientContext {
    pub fn new(config: ClientConfig) -> Self {
        let bridge =
            OptimisticBridge::new(config.provisional_ttl(), config.provisional_team.clone());
        let scene = SceneState::new(config.resize_quiescence());
        Self {
            config,
            cache: StaticDataCache::new(),
            store: SnapshotStore::new(),
            ledger: BuildingLedger::new(),
            views: ViewScopeRegistry::new(),
            bridge,
            scene,
            connectivity: Connectivity::Disconnected,
            session: None,
            last_damage_taken: None,
        }
    }

    /// Apply a drained batch of inbound frames in order.
    pub fn handle_batch(&mut self, messages: Vec<ServerMessage>, now: Instant) -> FrameUpdate {
        let messages = if self.config.coalesce_snapshots {
            coalesce_snapshots(messages)
        } else {
            messages
        };
        let mut update = FrameUpdate::default();
        for message in messages {
            update.merge(self.handle_message(message, now));
        }
        update
    }

    pub fn handle_message(&mut self, message: ServerMessage, now: Instant) -> FrameUpdate {
        match message {
            ServerMessage::GameState { state } => self.apply_snapshot(state, now),
            ServerMessage::StaticData { data } => self.apply_static(data, now),
            ServerMessage::ConstructionUpdate { sites } => {
                self.cache.update_markers(&sites);
                tracing::debug!(
                    target: "realm::inbound",
                    sites = sites.len(),
                    "construction.updated"
                );
                FrameUpdate::scene_rebuild()
            }
            ServerMessage::LoginSuccess { player } => {
                tracing::info!(target: "realm::session", player = %player.id, "session.logged_in");
                let text = format!("Welcome, {}!", player.name);
                self.session = Some(player);
                let mut update = self.set_connectivity(Connectivity::LoggedIn);
                update.notices.push(Notice::Welcome(text));
                update
            }
            ServerMessage::Log { message } => FrameUpdate::notice(Notice::Log(message)),
            ServerMessage::CombatLog { message } => {
                let mut update = FrameUpdate::default();
                if let Some(amount) = parse_damage_taken(&message, self.viewer_name()) {
                    self.last_damage_taken = Some(amount);
                    update.dirty_subtrees |= DirtySubtrees::STATS;
                }
                update.notices.push(Notice::Combat(message));
                update
            }
            ServerMessage::Error { message } => {
                tracing::warn!(target: "realm::inbound", %message, "authority.error");
                FrameUpdate::notice(Notice::Error(message))
            }
            ServerMessage::Unrecognized { tag } => {
                tracing::warn!(target: "realm::inbound", %tag, "message.unrecognized");
                FrameUpdate::default()
            }
        }
    }

    fn apply_snapshot(&mut self, snapshot: Snapshot, now: Instant) -> FrameUpdate {
        self.store.apply_snapshot(snapshot, &self.cache);
        if let Some(current) = self.store.current_mut() {
            self.bridge.reconcile(current, now);
        }
        let Some((current, previous)) = self.store.pair() else {
            return FrameUpdate::default();
        };
        self.ledger.sync(current.own_site());
        let plan = plan_refresh(previous, current);
        let views = self.views.reconcile(current, &self.ledger);
        tracing::debug!(
            target: "realm::snapshot",
            full = plan.full_scene_rebuild,
            patched = plan.per_entity_stats_changed.len(),
            dirty = ?plan.dirty_subtrees,
            views = views.len(),
            "snapshot.applied"
        );

        let mut update = FrameUpdate::from_plan(plan, self.scene.mode());
        update.push_views(views);
        if self.connectivity != Connectivity::LoggedIn {
            update.merge(self.set_connectivity(Connectivity::LoggedIn));
        }
        update
    }

    fn apply_static(&mut self, payload: StaticDataPayload, now: Instant) -> FrameUpdate {
        let change = self.cache.absorb(payload);
        tracing::info!(
            target: "realm::inbound",
            templates = change.templates,
            roster = change.roster,
            teams = self.cache.teams().len(),
            "static_data.absorbed"
        );
        if !change.templates && !change.roster {
            return FrameUpdate::default();
        }
        if let Some(current) = self.store.current_mut() {
            if change.templates {
                current.statics = Arc::clone(self.cache.statics());
            }
            if change.roster {
                current.teams = self.cache.teams().clone();
                current.default_team = self.cache.default_team().cloned();
                self.bridge.reconcile(current, now);
                adopt_administered_team(current);
            }
        }

        let mut update = FrameUpdate::scene_rebuild();
        if let Some(current) = self.store.current() {
            self.ledger.sync(current.own_site());
            update.push_views(self.views.reconcile(current, &self.ledger));
        }
        update
    }

    pub fn on_connected(&mut self) -> FrameUpdate {
        let mut update = self.set_connectivity(Connectivity::Connected);
        update
            .notices
            .push(Notice::Connection(format!("Connected to {}", self.config.endpoint)));
        update
    }

    /// Drop everything tied to the old session. Static data survives until
    /// the authority sends a replacement.
    pub fn on_disconnected(&mut self) -> FrameUpdate {
        self.bridge.clear();
        self.store.reset();
        self.ledger.clear();
        self.scene.teardown();
        self.session = None;
        self.last_damage_taken = None;
        let mut update = self.set_connectivity(Connectivity::Disconnected);
        update.push_views(self.views.close_all());
        update.scene = SceneRefresh::Rebuild;
        update.panel_rebuild = true;
        update.notices.push(Notice::Connection("Disconnected".into()));
        update
    }

    pub fn on_resize(&mut self, now: Instant) -> bool {
        self.scene.on_resize(now)
    }

    /// Fire due timers.
    pub fn poll_timers(&mut self, now: Instant) -> FrameUpdate {
        if self.scene.poll(now) {
            tracing::trace!(target: "realm::scene", "resize_rebuild.fired");
            return FrameUpdate::scene_rebuild();
        }
        FrameUpdate::default()
    }

    fn set_connectivity(&mut self, connectivity: Connectivity) -> FrameUpdate {
        if self.connectivity == connectivity {
            return FrameUpdate::default();
        }
        tracing::info!(
            target: "realm::session",
            from = ?self.connectivity,
            to = ?connectivity,
            "connectivity.changed"
        );
        self.connectivity = connectivity;
        FrameUpdate {
            connectivity_changed: true,
            ..FrameUpdate::default()
        }
    }

    fn viewer_name(&self) -> &str {
        match (self.store.current(), self.session.as_ref()) {
            (Some(current), _) => &current.player.name,
            (None, Some(session)) => &session.name,
            (None, None) => "",
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> Option<&GameState> {
        self.store.current()
    }

    pub fn previous_state(&self) -> Option<&GameState> {
        self.store.previous()
    }

    pub fn cache(&self) -> &StaticDataCache {
        &self.cache
    }

    pub fn ledger(&self) -> &BuildingLedger {
        &self.ledger
    }

    pub fn views(&self) -> &ViewScopeRegistry {
        &self.views
    }

    pub fn views_mut(&mut self) -> &mut ViewScopeRegistry {
        &mut self.views
    }

    pub fn bridge(&self) -> &OptimisticBridge {
        &self.bridge
    }

    pub fn scene(&self) -> &SceneState {
        &self.scene
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    pub fn session(&self) -> Option<&LoginPlayer> {
        self.session.as_ref()
    }

    pub fn last_damage_taken(&self) -> Option<f64> {
        self.last_damage_taken
    }
}

/// When the roster shows the viewer administering a team while the viewer's
/// pointer is unset, dangling, provisional or the default team, adopt it.
fn adopt_administered_team(state: &mut GameState) {
    let adrift = match state.player.team.as_ref() {
        None => true,
        Some(team) => {
            is_provisional(team)
                || !state.teams.contains_key(team)
                || state.default_team.as_ref() == Some(team)
        }
    };
    if !adrift {
        return;
    }
    let administered = state
        .teams
        .values()
        .find(|team| team.admin_id == state.player.id && !is_provisional(&team.id))
        .map(|team| team.id.clone());
    if let Some(team) = administered {
        state.player.team = Some(team);
    }
}
