use std::sync::mpsc::{Receiver, Sender};
use std::time::{Duration, Instant};

use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::backend::CrosstermBackend;
use ratatui::prelude::*;
use realm_proto::{
    Building, CellObject, ClientCommand, ItemKind, JoinDecision, JoinPolicy, ServerMessage,
    EQUIPMENT_SLOTS,
};
use realm_sync::{
    BuildingId, ClientContext, Direction, DirtySubtrees, Dispatch, EntityPath, FrameUpdate,
    Intent, ItemPath, PanelTab, Resolved, ViewKind,
};
use tokio::sync::mpsc::{self as tokio_mpsc, UnboundedSender};
use tracing::{debug, info, trace, warn};

use crate::ui::{
    draw_ui, enchantable_indices, modal_len, rune_indices, team_order, template_order,
    InputPurpose, TextInput, UiState,
};

const CRAFTING_REFRESH: Duration = Duration::from_secs(1);

/// What the network task reports to the UI thread.
#[derive(Debug)]
pub enum NetEvent {
    Connected,
    Message(ServerMessage),
    Disconnected(String),
}

pub fn channel(capacity: usize) -> (tokio_mpsc::Sender<NetEvent>, tokio_mpsc::Receiver<NetEvent>) {
    tokio_mpsc::channel(capacity.max(1))
}

/// Credentials supplied on the command line, used on every (re)connect.
#[derive(Debug, Clone)]
pub struct AutoLogin {
    pub name: String,
    pub password: String,
}

enum Flow {
    Continue,
    Quit,
}

pub struct RealmApp {
    terminal: Terminal<CrosstermBackend<std::io::Stdout>>,
    ui_state: UiState,
    context: ClientContext,
    receiver: tokio_mpsc::Receiver<NetEvent>,
    command_sender: UnboundedSender<ClientCommand>,
    shutdown_sender: Sender<()>,
    log_receiver: Receiver<String>,
    auto_login: Option<AutoLogin>,
    last_crafting_refresh: Instant,
}

impl RealmApp {
    pub fn new(
        context: ClientContext,
        receiver: tokio_mpsc::Receiver<NetEvent>,
        command_sender: UnboundedSender<ClientCommand>,
        shutdown_sender: Sender<()>,
        log_receiver: Receiver<String>,
        auto_login: Option<AutoLogin>,
    ) -> Result<Self> {
        let stdout = std::io::stdout();
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        crossterm::terminal::enable_raw_mode()?;
        terminal.clear()?;
        terminal.hide_cursor()?;
        let ui_state = UiState::new(context.config().max_log_lines);
        Ok(Self {
            terminal,
            ui_state,
            context,
            receiver,
            command_sender,
            shutdown_sender,
            log_receiver,
            auto_login,
            last_crafting_refresh: Instant::now(),
        })
    }

    pub fn run(mut self) -> Result<()> {
        let mut last_draw = Instant::now();

        loop {
            self.drain_network();

            while let Ok(line) = self.log_receiver.try_recv() {
                self.ui_state.push_log(line);
            }

            let update = self.context.poll_timers(Instant::now());
            self.apply(update);

            if self.context.views().top().map(|binding| binding.kind) == Some(ViewKind::Crafting)
                && self.last_crafting_refresh.elapsed() >= CRAFTING_REFRESH
            {
                self.ui_state.render_view(ViewKind::Crafting, &self.context);
                self.last_crafting_refresh = Instant::now();
            }

            if last_draw.elapsed() >= Duration::from_millis(100) {
                self.terminal
                    .draw(|frame| draw_ui(frame, &self.ui_state, &self.context))?;
                last_draw = Instant::now();
            }

            if event::poll(Duration::from_millis(50))? {
                match event::read()? {
                    Event::Key(key) if key.kind != KeyEventKind::Release => {
                        if let Flow::Quit = self.handle_key(key) {
                            break;
                        }
                    }
                    Event::Resize(width, height) => {
                        if self.context.on_resize(Instant::now()) {
                            trace!(width, height, "resize.debounced");
                        }
                    }
                    _ => {}
                }
            }
        }

        self.terminal.show_cursor()?;
        crossterm::terminal::disable_raw_mode()?;
        let _ = self.shutdown_sender.send(());
        Ok(())
    }

    /// Drain pending network events, handing consecutive messages to the
    /// context as one batch.
    fn drain_network(&mut self) {
        let mut batch = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            match event {
                NetEvent::Message(message) => batch.push(message),
                NetEvent::Connected => {
                    self.flush_batch(&mut batch);
                    let update = self.context.on_connected();
                    self.apply(update);
                    self.begin_login();
                }
                NetEvent::Disconnected(reason) => {
                    self.flush_batch(&mut batch);
                    warn!(%reason, "connection.lost");
                    let update = self.context.on_disconnected();
                    self.apply(update);
                    self.ui_state.input = None;
                }
            }
        }
        self.flush_batch(&mut batch);
    }

    fn flush_batch(&mut self, batch: &mut Vec<ServerMessage>) {
        if batch.is_empty() {
            return;
        }
        let update = self
            .context
            .handle_batch(std::mem::take(batch), Instant::now());
        self.apply(update);
    }

    fn apply(&mut self, update: FrameUpdate) {
        if update.is_empty() {
            return;
        }
        self.ui_state.apply(update, &self.context);
    }

    fn begin_login(&mut self) {
        match self.auto_login.clone() {
            Some(AutoLogin { name, password }) => {
                self.dispatch(Intent::Login { name, password });
            }
            None if self.context.session().is_none() => {
                self.ui_state.input = Some(TextInput::new(InputPurpose::LoginName));
            }
            None => {}
        }
    }

    fn dispatch(&mut self, intent: Intent) {
        match self.context.dispatch(intent, Instant::now()) {
            Ok(Dispatch { command, update }) => {
                if let Some(command) = command {
                    debug!(action = command.action(), "command.queued");
                    if self.command_sender.send(command).is_err() {
                        warn!("command.dropped");
                    }
                }
                self.apply(update);
            }
            Err(err) => {
                debug!(%err, "intent.rejected");
                self.ui_state.push_log(format!("[error] {err}"));
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Flow {
        if self.ui_state.input.is_some() {
            self.handle_input_key(key.code);
            return Flow::Continue;
        }
        if let Some(kind) = self.context.views().top().map(|binding| binding.kind) {
            self.handle_view_key(kind, key.code);
            return Flow::Continue;
        }
        self.handle_scene_key(key.code)
    }

    fn handle_input_key(&mut self, code: KeyCode) {
        let Some(input) = self.ui_state.input.as_mut() else {
            return;
        };
        match code {
            KeyCode::Char(c) => input.buffer.push(c),
            KeyCode::Backspace => {
                input.buffer.pop();
            }
            KeyCode::Esc => self.ui_state.input = None,
            KeyCode::Enter => {
                let Some(TextInput { purpose, buffer }) = self.ui_state.input.take() else {
                    return;
                };
                match purpose {
                    InputPurpose::LoginName => {
                        self.ui_state.input = Some(TextInput::new(InputPurpose::LoginPassword {
                            name: buffer,
                        }));
                    }
                    InputPurpose::LoginPassword { name } => {
                        self.dispatch(Intent::Login {
                            name,
                            password: buffer,
                        });
                    }
                    InputPurpose::TeamName => self.dispatch(Intent::CreateTeam(buffer)),
                    InputPurpose::TeamDescription { team } => {
                        let join_policy = self
                            .context
                            .state()
                            .and_then(|state| state.teams.get(&team))
                            .map(|existing| existing.join_policy)
                            .unwrap_or_default();
                        self.dispatch(Intent::UpdateTeamSettings {
                            team_id: team,
                            description: buffer,
                            join_policy,
                            color: None,
                        });
                    }
                }
            }
            _ => {}
        }
    }

    fn move_modal_cursor(&mut self, kind: ViewKind, step: isize) {
        let len = modal_len(kind, &self.context);
        if len == 0 {
            return;
        }
        let next = (self.ui_state.cursor.modal as isize + step).rem_euclid(len as isize);
        self.ui_state.cursor.modal = next as usize;
        self.ui_state.render_view(kind, &self.context);
    }

    fn open_building(&self) -> Option<BuildingId> {
        match self.context.views().top().map(|binding| &binding.path) {
            Some(EntityPath::OwnSiteBuilding(id)) => Some(*id),
            _ => None,
        }
    }

    fn handle_view_key(&mut self, kind: ViewKind, code: KeyCode) {
        match code {
            KeyCode::Esc => return self.dispatch(Intent::CloseView(kind)),
            KeyCode::Up => return self.move_modal_cursor(kind, -1),
            KeyCode::Down => return self.move_modal_cursor(kind, 1),
            _ => {}
        }
        let cursor = self.ui_state.cursor.modal;
        match kind {
            ViewKind::Storage => {
                let Some(building) = self.open_building() else {
                    return;
                };
                match code {
                    KeyCode::Enter => self.dispatch(Intent::Withdraw {
                        building,
                        item_index: cursor,
                    }),
                    KeyCode::Char('d') => self.dispatch(Intent::Deposit {
                        building,
                        item_index: self.ui_state.cursor.panel,
                        quantity: 1,
                    }),
                    _ => {}
                }
            }
            ViewKind::Crafting => {
                let Some(building) = self.open_building() else {
                    return;
                };
                if code != KeyCode::Enter {
                    return;
                }
                let recipe_id = self.context.state().and_then(|state| {
                    match self.context.views().resolve_open(kind, state, self.context.ledger()) {
                        Some(Resolved::Building {
                            building: Building::Crafting(crafting),
                            ..
                        }) => crafting.recipe_ids.get(cursor).copied(),
                        _ => None,
                    }
                });
                if let Some(recipe_id) = recipe_id {
                    self.dispatch(Intent::Craft {
                        building,
                        recipe_id,
                    });
                }
            }
            ViewKind::Enhancement => {
                let Some(player) = self.context.state().map(|state| &state.player) else {
                    return;
                };
                match code {
                    KeyCode::Enter => {
                        if let Some(index) = enchantable_indices(player).get(cursor).copied() {
                            self.dispatch(Intent::SelectEnchantItem(index));
                            self.ui_state.render_view(kind, &self.context);
                        }
                    }
                    KeyCode::Left | KeyCode::Right => {
                        let runes = rune_indices(player).len();
                        if runes > 0 {
                            let step = if code == KeyCode::Left { -1 } else { 1 };
                            let next = (self.ui_state.cursor.rune as isize + step)
                                .rem_euclid(runes as isize);
                            self.ui_state.cursor.rune = next as usize;
                            self.ui_state.render_view(kind, &self.context);
                        }
                    }
                    KeyCode::Char('e') => {
                        match rune_indices(player).get(self.ui_state.cursor.rune).copied() {
                            Some(rune_index) => self.dispatch(Intent::Enchant { rune_index }),
                            None => self.ui_state.push_log("[error] no rune selected"),
                        }
                    }
                    _ => {}
                }
            }
            ViewKind::Teams => self.handle_teams_key(code, cursor),
            ViewKind::BuildMenu => {
                if code != KeyCode::Enter {
                    return;
                }
                let template = self
                    .context
                    .state()
                    .and_then(|state| template_order(state).get(cursor).cloned());
                if let Some(template) = template {
                    self.dispatch(Intent::BuildBuilding(template));
                }
            }
            ViewKind::EnemyInfo | ViewKind::PlayerProfile | ViewKind::ItemPopup => {}
        }
    }

    fn handle_teams_key(&mut self, code: KeyCode, cursor: usize) {
        let Some(state) = self.context.state() else {
            return;
        };
        let own = state
            .player_team()
            .filter(|_| state.has_own_team())
            .cloned();
        let viewer = state.player.id.clone();
        let highlighted = team_order(state)
            .get(cursor)
            .and_then(|id| state.teams.get(id))
            .cloned();
        match code {
            KeyCode::Enter => {
                let Some(team) = highlighted else {
                    return;
                };
                match team.join_policy {
                    JoinPolicy::Open => self.dispatch(Intent::JoinTeam(team.id)),
                    JoinPolicy::Request => self.dispatch(Intent::RequestToJoin(team.id)),
                    JoinPolicy::Closed => self
                        .ui_state
                        .push_log(format!("{} is not accepting members", team.name)),
                }
            }
            KeyCode::Char('c') => {
                self.ui_state.input = Some(TextInput::new(InputPurpose::TeamName));
            }
            KeyCode::Char('L') => self.dispatch(Intent::LeaveTeam),
            KeyCode::Char('x') => {
                if let Some(team) = own.filter(|team| team.admin_id == viewer) {
                    self.dispatch(Intent::UpdateTeamSettings {
                        team_id: team.id,
                        description: team.description,
                        join_policy: team.join_policy.next(),
                        color: None,
                    });
                }
            }
            KeyCode::Char('E') => {
                if let Some(team) = own.filter(|team| team.admin_id == viewer) {
                    let mut input = TextInput::new(InputPurpose::TeamDescription { team: team.id });
                    input.buffer = team.description;
                    self.ui_state.input = Some(input);
                }
            }
            KeyCode::Char(key @ ('a' | 'r')) => {
                let Some(team) = own.filter(|team| team.admin_id == viewer) else {
                    return;
                };
                let Some(request) = team.requests.first() else {
                    return;
                };
                let decision = if key == 'a' {
                    JoinDecision::Accept
                } else {
                    JoinDecision::Reject
                };
                self.dispatch(Intent::ResolveJoinRequest {
                    team_id: team.id.clone(),
                    requester_id: request.requester_id.clone(),
                    decision,
                });
            }
            _ => {}
        }
    }

    fn move_panel_cursor(&mut self, step: isize) {
        let Some(state) = self.context.state() else {
            return;
        };
        let len = match self.context.scene().active_tab() {
            PanelTab::Equipment => EQUIPMENT_SLOTS.len(),
            PanelTab::Inventory => state.player.inventory.len(),
            PanelTab::Stats | PanelTab::Skills => 0,
        };
        if len == 0 {
            return;
        }
        let next = (self.ui_state.cursor.panel as isize + step).rem_euclid(len as isize);
        self.ui_state.cursor.panel = next as usize;
        self.ui_state.rebuild_panel(
            &self.context,
            DirtySubtrees::EQUIPMENT | DirtySubtrees::INVENTORY,
        );
    }

    fn panel_item(&self) -> Option<ItemPath> {
        let cursor = self.ui_state.cursor.panel;
        match self.context.scene().active_tab() {
            PanelTab::Inventory => Some(ItemPath::Inventory(cursor)),
            PanelTab::Equipment => EQUIPMENT_SLOTS
                .get(cursor)
                .map(|slot| ItemPath::Equipment(slot.to_string())),
            PanelTab::Stats | PanelTab::Skills => None,
        }
    }

    fn activate_panel_item(&mut self) {
        let Some(state) = self.context.state() else {
            return;
        };
        let intent = match self.panel_item() {
            Some(ItemPath::Inventory(index)) => match state.player.inventory.get(index) {
                Some(item) if item.kind == ItemKind::Equipment => Intent::EquipItem(index),
                Some(item) if matches!(item.kind, ItemKind::Consumable | ItemKind::Scroll) => {
                    Intent::UseItem(index)
                }
                _ => return,
            },
            Some(ItemPath::Equipment(slot)) if state.player.equipped(&slot).is_some() => {
                Intent::UnequipItem(slot)
            }
            _ => return,
        };
        self.dispatch(intent);
    }

    fn inspect_target(&mut self) {
        let Some(target) = self.ui_state.selected_target().cloned() else {
            return;
        };
        let Some(state) = self.context.state() else {
            return;
        };
        let intent = match state.cell.object(&target) {
            Some(CellObject::Mob(_)) => Intent::ShowEnemyInfo(target),
            Some(_) => return,
            None => Intent::ShowPlayerProfile(target),
        };
        self.dispatch(intent);
    }

    fn handle_scene_key(&mut self, code: KeyCode) -> Flow {
        match code {
            KeyCode::Char('q') => return Flow::Quit,
            KeyCode::Up => self.dispatch(Intent::MoveDirection(Direction::Up)),
            KeyCode::Down => self.dispatch(Intent::MoveDirection(Direction::Down)),
            KeyCode::Left => self.dispatch(Intent::MoveDirection(Direction::Left)),
            KeyCode::Right => self.dispatch(Intent::MoveDirection(Direction::Right)),
            KeyCode::Tab => self.ui_state.move_target(&self.context, 1),
            KeyCode::BackTab => self.ui_state.move_target(&self.context, -1),
            KeyCode::Char('a') => {
                if let Some(target) = self.ui_state.selected_target().cloned() {
                    self.dispatch(Intent::Attack(target));
                }
            }
            KeyCode::Char('i') => self.inspect_target(),
            KeyCode::Char('b') => self.dispatch(Intent::Build),
            KeyCode::Char('d') => self.dispatch(Intent::Donate),
            KeyCode::Char('s') => self.dispatch(Intent::DeploySiege),
            KeyCode::Char('g') => {
                let inside = self
                    .context
                    .state()
                    .is_some_and(|state| state.player.is_inside_castle);
                self.dispatch(if inside {
                    Intent::GoOutside
                } else {
                    Intent::GoInside
                });
            }
            KeyCode::Char('r') => self.dispatch(Intent::Respawn),
            KeyCode::Char('B') => self.dispatch(Intent::SummonBoss),
            KeyCode::Char('m') => self.dispatch(Intent::ToggleMapView),
            KeyCode::Char('t') => self.dispatch(Intent::OpenTeams),
            KeyCode::Char('n') => self.dispatch(Intent::OpenBuildMenu),
            KeyCode::Char('c') => self.dispatch(Intent::ToggleCharacterPanel),
            KeyCode::Char('p') => {
                self.ui_state.cursor.panel = 0;
                self.dispatch(Intent::CyclePanelTab);
            }
            KeyCode::Char('j') => self.move_panel_cursor(1),
            KeyCode::Char('k') => self.move_panel_cursor(-1),
            KeyCode::Enter => self.activate_panel_item(),
            KeyCode::Char('v') => {
                if let Some(path) = self.panel_item() {
                    self.dispatch(Intent::ShowItem(path));
                }
            }
            KeyCode::Char('l') => {
                self.ui_state.input = Some(TextInput::new(InputPurpose::LoginName));
            }
            KeyCode::Char(digit @ '1'..='9') => {
                let slot = digit as usize - '1' as usize;
                match self.context.ledger().id_at(slot) {
                    Some(building) => self.dispatch(Intent::OpenBuilding(building)),
                    None => info!(slot = slot + 1, "building.slot_empty"),
                }
            }
            _ => {}
        }
        Flow::Continue
    }
}
