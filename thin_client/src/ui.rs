use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use ratatui::layout::{Constraint, Direction, Layout, Margin};
use ratatui::prelude::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use realm_proto::{
    Building, CellObject, Coord, EntityId, Item, ItemKind, JoinPolicy, MobState, PlayerState,
    SiegeState, SiteState, Stats, TeamId, EQUIPMENT_SLOTS,
};
use realm_sync::{
    ClientContext, Connectivity, DirtySubtrees, FrameUpdate, GameState, Notice, PanelTab,
    Resolved, SceneMode, SceneRefresh, ViewAction, ViewKind,
};

type Lines = Vec<Line<'static>>;

const BAR_WIDTH: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputPurpose {
    LoginName,
    LoginPassword { name: String },
    TeamName,
    TeamDescription { team: TeamId },
}

impl InputPurpose {
    fn prompt(&self) -> &'static str {
        match self {
            InputPurpose::LoginName => "Name",
            InputPurpose::LoginPassword { .. } => "Password",
            InputPurpose::TeamName => "New team name",
            InputPurpose::TeamDescription { .. } => "Team description",
        }
    }

    fn masked(&self) -> bool {
        matches!(self, InputPurpose::LoginPassword { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextInput {
    pub purpose: InputPurpose,
    pub buffer: String,
}

impl TextInput {
    pub fn new(purpose: InputPurpose) -> Self {
        Self {
            purpose,
            buffer: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Cursor {
    pub target: usize,
    pub panel: usize,
    pub modal: usize,
    pub rune: usize,
}

#[derive(Default)]
struct PanelCache {
    header: Lines,
    stats: Lines,
    equipment: Lines,
    inventory: Lines,
    skills: Lines,
}

/// Rendered blocks, rebuilt piecewise as frame updates arrive.
pub struct UiState {
    logs: VecDeque<String>,
    max_logs: usize,
    scene_header: Lines,
    card_order: Vec<EntityId>,
    cards: BTreeMap<EntityId, Lines>,
    map: Lines,
    panel: PanelCache,
    modals: BTreeMap<ViewKind, Lines>,
    pub cursor: Cursor,
    pub input: Option<TextInput>,
}

impl UiState {
    pub fn new(max_logs: usize) -> Self {
        Self {
            logs: VecDeque::new(),
            max_logs: max_logs.max(1),
            scene_header: vec![Line::from("Waiting for world state")],
            card_order: Vec::new(),
            cards: BTreeMap::new(),
            map: Vec::new(),
            panel: PanelCache::default(),
            modals: BTreeMap::new(),
            cursor: Cursor::default(),
            input: None,
        }
    }

    pub fn push_log<S: Into<String>>(&mut self, line: S) {
        let mut text: String = line.into();
        while text.ends_with('\n') || text.ends_with('\r') {
            text.pop();
        }
        if text.is_empty() {
            return;
        }
        self.logs.push_front(text);
        while self.logs.len() > self.max_logs {
            self.logs.pop_back();
        }
    }

    /// Redraw only what the update names.
    pub fn apply(&mut self, update: FrameUpdate, context: &ClientContext) {
        for notice in &update.notices {
            self.push_log(notice_line(notice));
        }
        match update.scene {
            SceneRefresh::Unchanged if update.connectivity_changed && context.state().is_none() => {
                self.rebuild_scene(context)
            }
            SceneRefresh::Unchanged => {}
            SceneRefresh::Rebuild => self.rebuild_scene(context),
            SceneRefresh::Patch { stats, cards } => {
                let touched: BTreeSet<&EntityId> = stats.iter().chain(cards.iter()).collect();
                for id in touched {
                    self.refresh_card(context, id);
                }
            }
        }
        if update.panel_rebuild {
            self.rebuild_panel(context, DirtySubtrees::all());
        } else if !update.dirty_subtrees.is_empty() {
            self.rebuild_panel(context, update.dirty_subtrees);
        }
        for (kind, action) in update.views {
            match action {
                ViewAction::Render => self.render_view(kind, context),
                ViewAction::Close => {
                    self.modals.remove(&kind);
                    self.cursor.modal = 0;
                    self.cursor.rune = 0;
                }
            }
        }
    }

    pub fn rebuild_scene(&mut self, context: &ClientContext) {
        self.cards.clear();
        self.card_order.clear();
        self.map.clear();
        let Some(state) = context.state() else {
            self.scene_header = vec![Line::from(match context.connectivity() {
                Connectivity::Disconnected => "Disconnected. Reconnecting...",
                _ => "Waiting for world state",
            })];
            return;
        };
        match context.scene().mode() {
            SceneMode::MapView => self.map = map_lines(context, state),
            SceneMode::AreaView => {
                self.scene_header = scene_header(context, state);
                self.card_order = scene_targets(state);
                self.cursor.target = self
                    .cursor
                    .target
                    .min(self.card_order.len().saturating_sub(1));
                let selected = self.card_order.get(self.cursor.target).cloned();
                for id in &self.card_order {
                    let lines = entity_card(state, id, selected.as_ref() == Some(id));
                    self.cards.insert(id.clone(), lines);
                }
            }
        }
    }

    pub fn refresh_card(&mut self, context: &ClientContext, id: &EntityId) {
        let Some(state) = context.state() else {
            return;
        };
        if !self.cards.contains_key(id) {
            return;
        }
        let selected = self.card_order.get(self.cursor.target) == Some(id);
        self.cards.insert(id.clone(), entity_card(state, id, selected));
    }

    pub fn selected_target(&self) -> Option<&EntityId> {
        self.card_order.get(self.cursor.target)
    }

    pub fn move_target(&mut self, context: &ClientContext, step: isize) {
        if self.card_order.is_empty() {
            return;
        }
        let previous = self.selected_target().cloned();
        let len = self.card_order.len() as isize;
        self.cursor.target = (self.cursor.target as isize + step).rem_euclid(len) as usize;
        let next = self.selected_target().cloned();
        for id in previous.iter().chain(next.iter()) {
            self.refresh_card(context, id);
        }
    }

    pub fn rebuild_panel(&mut self, context: &ClientContext, groups: DirtySubtrees) {
        let Some(state) = context.state() else {
            self.panel = PanelCache::default();
            return;
        };
        let player = &state.player;
        self.panel.header = panel_header(state);
        if groups.contains(DirtySubtrees::STATS) {
            self.panel.stats = stats_lines(&player.stats, context.last_damage_taken());
        }
        if groups.contains(DirtySubtrees::EQUIPMENT) {
            self.panel.equipment = equipment_lines(player, self.panel_cursor(PanelTab::Equipment, context));
        }
        if groups.contains(DirtySubtrees::INVENTORY) {
            self.panel.inventory = inventory_lines(player, self.panel_cursor(PanelTab::Inventory, context));
        }
        if groups.contains(DirtySubtrees::SKILLS) {
            self.panel.skills = skill_lines(player);
        }
    }

    fn panel_cursor(&self, tab: PanelTab, context: &ClientContext) -> Option<usize> {
        (context.scene().active_tab() == tab).then_some(self.cursor.panel)
    }

    pub fn render_view(&mut self, kind: ViewKind, context: &ClientContext) {
        let Some(state) = context.state() else {
            return;
        };
        let Some(resolved) = context.views().resolve_open(kind, state, context.ledger()) else {
            self.modals.remove(&kind);
            return;
        };
        let selected_item = context
            .views()
            .binding(kind)
            .and_then(|binding| binding.local.selected_item);
        let lines = match resolved {
            Resolved::Building { building, .. } => match building {
                Building::Storage(_) | Building::PersonalStorage(_) => {
                    storage_lines(state, building, self.cursor.modal)
                }
                Building::Crafting(_) => crafting_lines(state, building, self.cursor.modal),
                Building::Enhancement(_) => enhancement_lines(
                    state,
                    building,
                    self.cursor.modal,
                    self.cursor.rune,
                    selected_item,
                ),
            },
            Resolved::Roster(_) => team_lines(state, self.cursor.modal),
            Resolved::Object(CellObject::Mob(mob)) => enemy_lines(mob),
            Resolved::Object(_) => Vec::new(),
            Resolved::Player(player) => profile_lines(state, player),
            Resolved::Templates(_) => build_menu_lines(state, self.cursor.modal),
            Resolved::Item(item) => item_lines(item),
        };
        self.modals.insert(kind, lines);
    }
}

fn notice_line(notice: &Notice) -> String {
    match notice {
        Notice::Welcome(text) | Notice::Log(text) | Notice::Connection(text) => text.clone(),
        Notice::Combat(text) => format!("[combat] {text}"),
        Notice::Error(text) => format!("[error] {text}"),
    }
}

/// Everything in the cell besides the viewer, in display order.
pub fn scene_targets(state: &GameState) -> Vec<EntityId> {
    state
        .cell
        .players
        .iter()
        .filter(|player| player.id != state.player.id)
        .map(|player| player.id.clone())
        .chain(state.cell.objects.iter().map(|object| object.id().clone()))
        .collect()
}

pub fn enchantable_indices(player: &PlayerState) -> Vec<usize> {
    player
        .inventory
        .iter()
        .enumerate()
        .filter(|(_, item)| item.can_take_enchantment())
        .map(|(index, _)| index)
        .collect()
}

pub fn rune_indices(player: &PlayerState) -> Vec<usize> {
    player
        .inventory
        .iter()
        .enumerate()
        .filter(|(_, item)| item.kind == ItemKind::Rune)
        .map(|(index, _)| index)
        .collect()
}

pub fn team_order(state: &GameState) -> Vec<TeamId> {
    state.teams.keys().cloned().collect()
}

pub fn template_order(state: &GameState) -> Vec<String> {
    state.statics.building_templates.keys().cloned().collect()
}

/// Number of selectable rows in an open view.
pub fn modal_len(kind: ViewKind, context: &ClientContext) -> usize {
    let Some(state) = context.state() else {
        return 0;
    };
    match context.views().resolve_open(kind, state, context.ledger()) {
        Some(Resolved::Building { building, .. }) => match building {
            Building::Crafting(crafting) => crafting.recipe_ids.len(),
            Building::Enhancement(_) => enchantable_indices(&state.player).len(),
            _ => building.stored_items(&state.player.id).len(),
        },
        Some(Resolved::Roster(roster)) => roster.len(),
        Some(Resolved::Templates(templates)) => templates.len(),
        _ => 0,
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

fn team_color(color: &str) -> Color {
    let hue = color.trim_start_matches("bg-").split('-').next().unwrap_or("");
    match hue {
        "red" | "rose" => Color::Red,
        "green" | "emerald" | "lime" => Color::Green,
        "blue" | "sky" | "indigo" => Color::Blue,
        "yellow" | "amber" | "orange" => Color::Yellow,
        "purple" | "violet" | "fuchsia" | "pink" => Color::Magenta,
        "cyan" | "teal" => Color::Cyan,
        _ => Color::Gray,
    }
}

fn team_span(state: &GameState, team: Option<&TeamId>) -> Span<'static> {
    match state.team_of(team) {
        Some(team) => Span::styled(team.name.clone(), Style::default().fg(team_color(&team.color))),
        None => Span::styled("no team", Style::default().fg(Color::DarkGray)),
    }
}

fn bar(label: &str, current: f64, max: f64, fraction: f64, color: Color) -> Line<'static> {
    let filled = (fraction * BAR_WIDTH as f64).round() as usize;
    Line::from(vec![
        Span::raw(format!("{label:<4}")),
        Span::styled("█".repeat(filled), Style::default().fg(color)),
        Span::styled(
            "░".repeat(BAR_WIDTH - filled.min(BAR_WIDTH)),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw(format!(" {:.0}/{:.0}", current.max(0.0), max)),
    ])
}

fn hp_bar(stats: &Stats) -> Line<'static> {
    bar(
        "HP",
        stats.hp,
        stats.display_max_hp(),
        stats.hp_fraction(),
        Color::Red,
    )
}

fn cursor_mark(active: bool) -> Span<'static> {
    if active {
        Span::styled("> ", Style::default().fg(Color::Yellow))
    } else {
        Span::raw("  ")
    }
}

fn level_text(level: Option<u32>) -> String {
    level.map(|level| format!(" Lv{level}")).unwrap_or_default()
}

fn scene_header(context: &ClientContext, state: &GameState) -> Lines {
    let coord = Coord::new(state.cell.x, state.cell.y);
    let biome = state.statics.biome_at(coord).unwrap_or("unknown");
    let mut lines = vec![Line::from(vec![
        Span::styled(
            format!("Area ({}, {})", coord.x, coord.y),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(" · {biome}")),
    ])];
    let player = &state.player;
    let hint = if player.is_dead {
        "You are dead. r respawn".to_string()
    } else {
        match (state.cell.site(), state.own_site()) {
            (_, Some(_)) if player.is_inside_castle => {
                "Inside your castle. d donate · g go outside · 1-9 open building · n construct"
                    .to_string()
            }
            (_, Some(_)) => "Your castle is here. d donate · g go inside".to_string(),
            (Some(_), None) => "Enemy castle. a attack · s deploy siege".to_string(),
            (None, _) if state.has_own_team() => "b build a construction site".to_string(),
            (None, _) => "Tab select · a attack · i info".to_string(),
        }
    };
    lines.push(Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))));
    if context.scene().panel_collapsed() {
        lines.push(Line::from(Span::styled(
            "character panel collapsed (c)",
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines
}

fn entity_card(state: &GameState, id: &EntityId, selected: bool) -> Lines {
    let mut lines = if let Some(player) = state.cell.player(id) {
        player_card(state, player)
    } else {
        match state.cell.object(id) {
            Some(CellObject::Mob(mob)) => mob_card(mob),
            Some(CellObject::ConstructionSite(site)) => site_card(state, site),
            Some(CellObject::Siege(siege)) => siege_card(state, siege),
            None => Vec::new(),
        }
    };
    if let Some(first) = lines.first_mut() {
        first.spans.insert(0, cursor_mark(selected));
    }
    lines
}

fn player_card(state: &GameState, player: &PlayerState) -> Lines {
    let mut title = vec![
        Span::styled(player.name.clone(), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(level_text(player.level)),
        Span::raw(" · "),
        team_span(state, player.team.as_ref()),
    ];
    if player.is_dead {
        title.push(Span::styled(" (dead)", Style::default().fg(Color::DarkGray)));
    }
    if player.is_inside_castle {
        title.push(Span::raw(" (inside)"));
    }
    vec![Line::from(title), hp_bar(&player.stats)]
}

fn mob_card(mob: &MobState) -> Lines {
    let mut title = vec![
        Span::styled(mob.name.clone(), Style::default().fg(Color::LightRed)),
        Span::raw(level_text(mob.level)),
    ];
    if mob.is_boss {
        title.push(Span::styled(" BOSS", Style::default().fg(Color::Magenta)));
    }
    if !mob.attackers.is_empty() {
        title.push(Span::raw(format!(" · {} fighting", mob.attackers.len())));
    }
    vec![Line::from(title), hp_bar(&mob.stats)]
}

fn site_card(state: &GameState, site: &SiteState) -> Lines {
    let (bricks, required) = site.bricks();
    let mut lines = vec![
        Line::from(vec![
            Span::raw("Castle of "),
            team_span(state, site.team.as_ref()),
            Span::raw(format!(" Lv{}", site.level)),
        ]),
        hp_bar(&site.stats),
        Line::from(format!("bricks {bricks:.0}/{required:.0}")),
    ];
    let own = state.player.team.is_some() && site.team == state.player.team;
    if own {
        for (index, building) in site.buildings.iter().enumerate() {
            lines.push(Line::from(format!(
                "  {}. {} (Lv{})",
                index + 1,
                building.name(),
                building.level()
            )));
        }
    }
    lines
}

fn siege_card(state: &GameState, siege: &SiegeState) -> Lines {
    vec![
        Line::from(vec![
            Span::raw("Siege engine · "),
            team_span(state, siege.team.as_ref()),
        ]),
        hp_bar(&siege.stats),
    ]
}

fn biome_style(biome: &str) -> (char, Color) {
    match biome {
        "forest" => ('♣', Color::Green),
        "plains" | "grassland" => ('"', Color::LightGreen),
        "desert" => ('~', Color::Yellow),
        "mountain" | "mountains" => ('^', Color::Gray),
        "water" | "lake" | "ocean" => ('≈', Color::Blue),
        "swamp" => ('%', Color::Magenta),
        "snow" | "tundra" => ('*', Color::White),
        _ => ('.', Color::DarkGray),
    }
}

fn map_lines(context: &ClientContext, state: &GameState) -> Lines {
    let bounds = context.config().world;
    let markers = context.cache().site_markers();
    (bounds.min_y..=bounds.max_y)
        .map(|y| {
            let spans: Vec<Span<'static>> = (bounds.min_x..=bounds.max_x)
                .map(|x| {
                    let coord = Coord::new(x, y);
                    if state.player.x == x && state.player.y == y {
                        return Span::styled(
                            "@ ",
                            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                        );
                    }
                    if let Some(team) = markers.get(&coord) {
                        let color = state
                            .team_of(team.as_ref())
                            .map(|team| team_color(&team.color))
                            .unwrap_or(Color::Gray);
                        return Span::styled("# ", Style::default().fg(color));
                    }
                    let (glyph, color) = biome_style(state.statics.biome_at(coord).unwrap_or(""));
                    Span::styled(format!("{glyph} "), Style::default().fg(color))
                })
                .collect();
            Line::from(spans)
        })
        .collect()
}

fn panel_header(state: &GameState) -> Lines {
    let player = &state.player;
    let mut spans = vec![
        Span::styled(player.name.clone(), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(level_text(player.level)),
        Span::raw(" · "),
        team_span(state, player.team.as_ref()),
    ];
    if player.is_dead {
        spans.push(Span::styled(" · DEAD", Style::default().fg(Color::Red)));
    }
    vec![Line::from(spans)]
}

fn stats_lines(stats: &Stats, last_damage: Option<f64>) -> Lines {
    let mut lines = vec![
        hp_bar(stats),
        bar("MP", stats.mp, stats.max_mp, stats.mp_fraction(), Color::Blue),
        bar(
            "STA",
            stats.stamina,
            stats.max_stamina,
            stats.stamina_fraction(),
            Color::Green,
        ),
        Line::from(format!(
            "dmg {:.0} · def {:.0} · speed {:.0} · crit {:.0} · dodge {:.0} · acc {:.0}",
            stats.dmg, stats.def, stats.speed, stats.critical, stats.dodge, stats.accuracy
        )),
    ];
    if let Some(damage) = last_damage {
        lines.push(Line::from(Span::styled(
            format!("last hit taken: {damage:.1}"),
            Style::default().fg(Color::LightRed),
        )));
    }
    lines
}

fn item_label(item: &Item) -> String {
    let mut label = item.name.clone();
    if item.count() > 1 {
        label.push_str(&format!(" x{}", item.count()));
    }
    if !item.enchantments.is_empty() {
        label.push_str(&format!(" +{}", item.enchantments.len()));
    }
    label
}

fn equipment_lines(player: &PlayerState, cursor: Option<usize>) -> Lines {
    EQUIPMENT_SLOTS
        .iter()
        .enumerate()
        .map(|(index, slot)| {
            let item = player
                .equipped(slot)
                .map(item_label)
                .unwrap_or_else(|| "-".to_string());
            Line::from(vec![
                cursor_mark(cursor == Some(index)),
                Span::styled(format!("{slot:<7}"), Style::default().fg(Color::DarkGray)),
                Span::raw(item),
            ])
        })
        .collect()
}

fn inventory_lines(player: &PlayerState, cursor: Option<usize>) -> Lines {
    if player.inventory.is_empty() {
        return vec![Line::from("(empty)")];
    }
    player
        .inventory
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let hint = match item.kind {
                ItemKind::Equipment => " [Enter equip]",
                ItemKind::Consumable | ItemKind::Scroll => " [Enter use]",
                _ => "",
            };
            Line::from(vec![
                cursor_mark(cursor == Some(index)),
                Span::raw(item_label(item)),
                Span::styled(hint, Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect()
}

fn skill_lines(player: &PlayerState) -> Lines {
    if player.skills.is_empty() {
        return vec![Line::from("(no skills)")];
    }
    player
        .skills
        .iter()
        .map(|(name, skill)| Line::from(format!("{name:<12} Lv{} ({:.0} xp)", skill.level, skill.exp)))
        .collect()
}

fn hint(text: &str) -> Line<'static> {
    Line::from(Span::styled(text.to_string(), Style::default().fg(Color::DarkGray)))
}

fn storage_lines(state: &GameState, building: &Building, cursor: usize) -> Lines {
    let scope = match building {
        Building::PersonalStorage(_) => "personal",
        _ => "team",
    };
    let mut lines = vec![Line::from(format!(
        "{} (Lv{}) · {scope} storage",
        building.name(),
        building.level()
    ))];
    let stored = building.stored_items(&state.player.id);
    if stored.is_empty() {
        lines.push(Line::from("  nothing stored"));
    }
    for (index, item) in stored.iter().enumerate() {
        lines.push(Line::from(vec![
            cursor_mark(index == cursor),
            Span::raw(item_label(item)),
        ]));
    }
    lines.push(Line::from(format!(
        "your inventory: {} stacks",
        state.player.inventory.len()
    )));
    lines.push(hint("Enter withdraw · d deposit selected inventory item · Esc close"));
    lines
}

fn crafting_lines(state: &GameState, building: &Building, cursor: usize) -> Lines {
    let Building::Crafting(crafting) = building else {
        return Vec::new();
    };
    let now = now_ms();
    let active = crafting.crafting_queue.iter().filter(|task| !task.completed).count();
    let mut lines = vec![Line::from(format!(
        "{} (Lv{}) · slots {active}/{}",
        crafting.name, crafting.level, crafting.slots
    ))];
    for task in &crafting.crafting_queue {
        let status = if task.completed {
            "done".to_string()
        } else {
            format!(
                "{:>3.0}% {}s",
                task.progress(now) * 100.0,
                task.remaining_ms(now) / 1000
            )
        };
        lines.push(Line::from(format!(
            "  {} for {} · {status}",
            task.recipe_name, task.player_name
        )));
    }
    lines.push(Line::from("Recipes:"));
    for (index, recipe_id) in crafting.recipe_ids.iter().enumerate() {
        let text = match state.statics.recipe(*recipe_id) {
            Some(recipe) => {
                let materials: Vec<String> = recipe
                    .materials
                    .iter()
                    .map(|cost| {
                        format!(
                            "{} {}/{}",
                            cost.name,
                            state.player.quantity_of(&cost.name),
                            cost.quantity
                        )
                    })
                    .collect();
                format!(
                    "{} ({}s) · {}",
                    recipe.name,
                    recipe.crafting_time / 1000,
                    materials.join(", ")
                )
            }
            None => format!("recipe #{recipe_id}"),
        };
        lines.push(Line::from(vec![cursor_mark(index == cursor), Span::raw(text)]));
    }
    lines.push(hint("Enter craft · Esc close"));
    lines
}

fn enhancement_lines(
    state: &GameState,
    building: &Building,
    cursor: usize,
    rune_cursor: usize,
    selected: Option<usize>,
) -> Lines {
    let player = &state.player;
    let mut lines = vec![Line::from(format!(
        "{} (Lv{})",
        building.name(),
        building.level()
    ))];
    let items = enchantable_indices(player);
    if items.is_empty() {
        lines.push(Line::from("  no equipment with free enchantment slots"));
    }
    for (row, index) in items.iter().enumerate() {
        let item = &player.inventory[*index];
        let mark = if selected == Some(*index) { "[*] " } else { "[ ] " };
        lines.push(Line::from(vec![
            cursor_mark(row == cursor),
            Span::raw(format!(
                "{mark}{} ({}/{} enchantments)",
                item.name,
                item.enchantments.len(),
                item.enhancement_slots
            )),
        ]));
    }
    lines.push(Line::from("Runes:"));
    let runes = rune_indices(player);
    if runes.is_empty() {
        lines.push(Line::from("  no runes"));
    }
    for (row, index) in runes.iter().enumerate() {
        lines.push(Line::from(vec![
            cursor_mark(row == rune_cursor),
            Span::raw(item_label(&player.inventory[*index])),
        ]));
    }
    lines.push(hint("Enter select item · ←/→ choose rune · e enchant · Esc close"));
    lines
}

fn team_lines(state: &GameState, cursor: usize) -> Lines {
    let viewer = &state.player.id;
    let mut lines = Vec::new();
    match state.player_team() {
        Some(team) if state.has_own_team() => {
            lines.push(Line::from(vec![
                Span::raw("Your team: "),
                team_span(state, Some(&team.id)),
                Span::raw(format!(
                    " · {} · {}",
                    team.join_policy.as_str(),
                    if &team.admin_id == viewer { "admin" } else { "member" }
                )),
            ]));
            if !team.description.is_empty() {
                lines.push(Line::from(format!("  \"{}\"", team.description)));
            }
            let members: Vec<String> = team
                .members
                .iter()
                .map(|member| state.player_label(member))
                .collect();
            lines.push(Line::from(format!("  members: {}", members.join(", "))));
            if &team.admin_id == viewer {
                for request in &team.requests {
                    lines.push(Line::from(format!(
                        "  request from {}",
                        state.player_label(&request.requester_id)
                    )));
                }
            }
        }
        _ => lines.push(Line::from("You are not on a team. c create")),
    }
    lines.push(Line::from("Teams:"));
    for (row, team) in state.teams.values().enumerate() {
        let mut spans = vec![
            cursor_mark(row == cursor),
            team_span(state, Some(&team.id)),
            Span::raw(format!(
                " · {} member{} · {}",
                team.members.len(),
                if team.members.len() == 1 { "" } else { "s" },
                team.join_policy.as_str()
            )),
        ];
        if state.player.team.as_ref() == Some(&team.id) {
            spans.push(Span::styled(" (yours)", Style::default().fg(Color::Yellow)));
        } else if team.has_requested(viewer) {
            spans.push(Span::styled(" (requested)", Style::default().fg(Color::DarkGray)));
        } else if team.join_policy == JoinPolicy::Closed {
            spans.push(Span::styled(" (closed)", Style::default().fg(Color::DarkGray)));
        }
        lines.push(Line::from(spans));
    }
    lines.push(hint(
        "Enter join/request · c create · L leave · x cycle policy · E describe · a/r resolve request",
    ));
    lines
}

fn enemy_lines(mob: &MobState) -> Lines {
    let mut lines = mob_card(mob);
    lines.push(Line::from(format!(
        "dmg {:.0} · def {:.0} · speed {:.0}",
        mob.stats.dmg, mob.stats.def, mob.stats.speed
    )));
    if let Some(description) = &mob.description {
        lines.push(Line::from(description.clone()));
    }
    match &mob.loot {
        Some(loot) if !loot.is_empty() => {
            lines.push(Line::from("Loot:"));
            for entry in loot {
                let chance = entry
                    .chance
                    .map(|chance| format!(" ({:.0}%)", chance * 100.0))
                    .unwrap_or_default();
                lines.push(Line::from(format!("  {}{chance}", entry.name)));
            }
        }
        _ => lines.push(Line::from("Loot: unknown")),
    }
    lines.push(hint("Esc close"));
    lines
}

fn profile_lines(state: &GameState, player: &PlayerState) -> Lines {
    let mut lines = player_card(state, player);
    lines.push(Line::from(format!(
        "dmg {:.0} · def {:.0} · speed {:.0}",
        player.stats.dmg, player.stats.def, player.stats.speed
    )));
    for slot in EQUIPMENT_SLOTS {
        if let Some(item) = player.equipped(slot) {
            lines.push(Line::from(format!("  {slot:<7}{}", item_label(item))));
        }
    }
    lines.push(hint("Esc close"));
    lines
}

fn build_menu_lines(state: &GameState, cursor: usize) -> Lines {
    let mut lines = Vec::new();
    if state.statics.building_templates.is_empty() {
        lines.push(Line::from("No building templates received"));
    }
    for (row, template) in state.statics.building_templates.values().enumerate() {
        let materials: Vec<String> = template
            .materials
            .iter()
            .map(|cost| {
                format!(
                    "{} {}/{}",
                    cost.name,
                    state.player.quantity_of(&cost.name),
                    cost.quantity
                )
            })
            .collect();
        lines.push(Line::from(vec![
            cursor_mark(row == cursor),
            Span::styled(template.name.clone(), Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!(" · {}", materials.join(", "))),
        ]));
        if !template.description.is_empty() {
            lines.push(Line::from(format!("    {}", template.description)));
        }
    }
    lines.push(hint("Enter construct · Esc close"));
    lines
}

fn item_lines(item: &Item) -> Lines {
    let mut lines = vec![Line::from(Span::styled(
        item_label(item),
        Style::default().add_modifier(Modifier::BOLD),
    ))];
    let mut facts = Vec::new();
    if let Some(quality) = &item.quality {
        facts.push(quality.clone());
    }
    if let Some(level) = item.level {
        facts.push(format!("Lv{level}"));
    }
    if let Some(slot) = &item.slot {
        facts.push(slot.clone());
    }
    if !facts.is_empty() {
        lines.push(Line::from(facts.join(" · ")));
    }
    if let Some(description) = &item.description {
        lines.push(Line::from(description.clone()));
    }
    if let Some(stats) = &item.stats {
        lines.push(Line::from(format!(
            "hp {:+.0} · dmg {:+.0} · def {:+.0}",
            stats.max_hp, stats.dmg, stats.def
        )));
    }
    for enchantment in &item.enchantments {
        lines.push(Line::from(format!("  ✦ {}", enchantment.name)));
    }
    lines.push(hint("Esc close"));
    lines
}

pub fn draw_ui(frame: &mut Frame, state: &UiState, context: &ClientContext) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(state.max_logs as u16 + 2),
        ])
        .split(frame.size());

    draw_header(frame, chunks[0], context);
    match context.scene().mode() {
        SceneMode::MapView => draw_map(frame, chunks[1], state),
        SceneMode::AreaView => {
            let panel_height = if context.scene().panel_collapsed() {
                Constraint::Length(3)
            } else {
                Constraint::Percentage(50)
            };
            let main = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(4), panel_height])
                .split(chunks[1]);
            draw_area(frame, main[0], state);
            draw_panel(frame, main[1], state, context);
        }
    }
    draw_logs(frame, chunks[2], state);

    if let Some(top) = context.views().top() {
        if let Some(lines) = state.modals.get(&top.kind) {
            draw_modal(frame, top.kind.title(), lines.clone());
        }
    }
    if let Some(input) = &state.input {
        draw_input(frame, input);
    }
}

fn bordered(frame: &mut Frame, area: Rect, title: &str, lines: Lines) {
    let block = Block::default().borders(Borders::ALL).title(title.to_string());
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    frame.render_widget(block, area);
    frame.render_widget(
        paragraph,
        area.inner(&Margin {
            vertical: 1,
            horizontal: 1,
        }),
    );
}

fn draw_header(frame: &mut Frame, area: Rect, context: &ClientContext) {
    let status = match context.connectivity() {
        Connectivity::Disconnected => Span::styled("Disconnected", Style::default().fg(Color::Red)),
        Connectivity::Connected => Span::styled("Connected", Style::default().fg(Color::Yellow)),
        Connectivity::LoggedIn => Span::styled("Online", Style::default().fg(Color::Green)),
    };
    let mode = match context.scene().mode() {
        SceneMode::AreaView => "area",
        SceneMode::MapView => "map",
    };
    let line = Line::from(vec![
        status,
        Span::raw(format!(
            " | {mode} view | m map · t teams · c panel · p tab · arrows move · q quit"
        )),
    ]);
    bordered(frame, area, "Realm", vec![line]);
}

fn draw_area(frame: &mut Frame, area: Rect, state: &UiState) {
    let mut lines = state.scene_header.clone();
    for id in &state.card_order {
        if let Some(card) = state.cards.get(id) {
            lines.extend(card.iter().cloned());
        }
    }
    bordered(frame, area, "Area", lines);
}

fn draw_map(frame: &mut Frame, area: Rect, state: &UiState) {
    bordered(frame, area, "World map", state.map.clone());
}

fn draw_panel(frame: &mut Frame, area: Rect, state: &UiState, context: &ClientContext) {
    let mut lines = state.panel.header.clone();
    if !context.scene().panel_collapsed() {
        let active = context.scene().active_tab();
        let tabs: Vec<Span<'static>> = PanelTab::ALL
            .iter()
            .map(|tab| {
                let style = if *tab == active {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                Span::styled(format!(" {} ", tab.label()), style)
            })
            .collect();
        lines.push(Line::from(tabs));
        let group = match active {
            PanelTab::Stats => &state.panel.stats,
            PanelTab::Equipment => &state.panel.equipment,
            PanelTab::Inventory => &state.panel.inventory,
            PanelTab::Skills => &state.panel.skills,
        };
        lines.extend(group.iter().cloned());
    }
    bordered(frame, area, "Character", lines);
}

fn draw_logs(frame: &mut Frame, area: Rect, state: &UiState) {
    let lines: Lines = state
        .logs
        .iter()
        .map(|entry| Line::from(Span::raw(entry.clone())))
        .collect();
    bordered(frame, area, "Log", lines);
}

fn centered(area: Rect, width_percent: u16, height_percent: u16) -> Rect {
    let width = (u32::from(area.width) * u32::from(width_percent) / 100) as u16;
    let height = (u32::from(area.height) * u32::from(height_percent) / 100) as u16;
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

fn draw_modal(frame: &mut Frame, title: &str, lines: Lines) {
    let area = centered(frame.size(), 70, 70);
    frame.render_widget(Clear, area);
    bordered(frame, area, title, lines);
}

fn draw_input(frame: &mut Frame, input: &TextInput) {
    let full = frame.size();
    let area = centered(full, 50, 20).intersection(full);
    let shown = if input.purpose.masked() {
        "*".repeat(input.buffer.chars().count())
    } else {
        input.buffer.clone()
    };
    frame.render_widget(Clear, area);
    bordered(
        frame,
        area,
        input.purpose.prompt(),
        vec![
            Line::from(format!("{shown}_")),
            hint("Enter confirm · Esc cancel"),
        ],
    );
}
