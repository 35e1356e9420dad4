use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Decode `null` the same way as a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Opaque identity of a player, mob, site or siege engine. Stable across snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Trailing four characters, used when a member is not visible in the cell.
    pub fn short(&self) -> &str {
        let start = self
            .0
            .char_indices()
            .rev()
            .nth(3)
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        &self.0[start..]
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(pub String);

impl TeamId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TeamId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Stats {
    #[serde(deserialize_with = "null_as_default")]
    pub hp: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub max_hp: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub mp: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub max_mp: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub stamina: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub max_stamina: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub dmg: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub speed: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub critical: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub dodge: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub accuracy: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub def: f64,
}

fn ratio(current: f64, max: f64) -> f64 {
    let max = if max > 0.0 { max } else { 1.0 };
    (current / max).clamp(0.0, 1.0)
}

impl Stats {
    pub fn hp_fraction(&self) -> f64 {
        ratio(self.hp, self.max_hp)
    }

    pub fn mp_fraction(&self) -> f64 {
        ratio(self.mp, self.max_mp)
    }

    pub fn stamina_fraction(&self) -> f64 {
        ratio(self.stamina, self.max_stamina)
    }

    /// Max HP for display, never zero.
    pub fn display_max_hp(&self) -> f64 {
        if self.max_hp > 0.0 {
            self.max_hp
        } else {
            1.0
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Equipment,
    Consumable,
    Scroll,
    Rune,
    Material,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Enchantment {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Item {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: ItemKind,
    pub description: Option<String>,
    pub quality: Option<String>,
    pub level: Option<u32>,
    pub quantity: Option<u32>,
    pub slot: Option<String>,
    pub stats: Option<Stats>,
    #[serde(deserialize_with = "null_as_default")]
    pub enhancement_slots: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub enchantments: Vec<Enchantment>,
    pub effects: Option<serde_json::Value>,
}

impl Item {
    /// Stack size, counting a missing quantity as one.
    pub fn count(&self) -> u32 {
        self.quantity.unwrap_or(1)
    }

    pub fn can_take_enchantment(&self) -> bool {
        self.kind == ItemKind::Equipment
            && self.enhancement_slots > 0
            && (self.enchantments.len() as u32) < self.enhancement_slots
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Skill {
    #[serde(deserialize_with = "null_as_default")]
    pub level: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub exp: f64,
}

pub const EQUIPMENT_SLOTS: [&str; 10] = [
    "weapon", "helmet", "armor", "legs", "gloves", "boots", "cape", "ring1", "ring2", "ring3",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerState {
    #[serde(deserialize_with = "null_as_default")]
    pub id: EntityId,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    pub level: Option<u32>,
    #[serde(deserialize_with = "null_as_default")]
    pub x: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub y: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub is_dead: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub is_inside_castle: bool,
    pub team: Option<TeamId>,
    #[serde(deserialize_with = "null_as_default")]
    pub stats: Stats,
    #[serde(deserialize_with = "null_as_default")]
    pub equipment: BTreeMap<String, Option<Item>>,
    #[serde(deserialize_with = "null_as_default")]
    pub inventory: Vec<Item>,
    #[serde(deserialize_with = "null_as_default")]
    pub skills: BTreeMap<String, Skill>,
    pub attacking_player: Option<EntityId>,
    pub attacking_mob: Option<EntityId>,
}

impl PlayerState {
    pub fn equipped(&self, slot: &str) -> Option<&Item> {
        self.equipment.get(slot).and_then(Option::as_ref)
    }

    /// Quantity of a named item across inventory stacks.
    pub fn quantity_of(&self, name: &str) -> u32 {
        self.inventory
            .iter()
            .filter(|item| item.name == name)
            .map(Item::count)
            .sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LootEntry {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    pub chance: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MobState {
    #[serde(deserialize_with = "null_as_default")]
    pub id: EntityId,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    pub level: Option<u32>,
    #[serde(deserialize_with = "null_as_default")]
    pub stats: Stats,
    /// Sent once per mob lifetime; later snapshots omit it.
    pub loot: Option<Vec<LootEntry>>,
    pub description: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub is_boss: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub attackers: Vec<EntityId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SiteState {
    #[serde(deserialize_with = "null_as_default")]
    pub id: EntityId,
    pub team: Option<TeamId>,
    #[serde(deserialize_with = "null_as_default")]
    pub level: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub stats: Stats,
    #[serde(deserialize_with = "null_as_default")]
    pub materials: BTreeMap<String, f64>,
    #[serde(deserialize_with = "null_as_default")]
    pub required_materials: BTreeMap<String, f64>,
    #[serde(deserialize_with = "null_as_default")]
    pub buildings: Vec<Building>,
    pub construction_complete_until: Option<u64>,
    #[serde(deserialize_with = "null_as_default")]
    pub attackers: Vec<EntityId>,
}

impl SiteState {
    pub fn bricks(&self) -> (f64, f64) {
        (
            self.materials.get("bricks").copied().unwrap_or(0.0),
            self.required_materials.get("bricks").copied().unwrap_or(0.0),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiegeState {
    #[serde(deserialize_with = "null_as_default")]
    pub id: EntityId,
    pub team: Option<TeamId>,
    #[serde(deserialize_with = "null_as_default")]
    pub stats: Stats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Player,
    Mob,
    ConstructionSite,
    Siege,
}

/// Non-player occupant of a cell, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CellObject {
    Mob(MobState),
    ConstructionSite(SiteState),
    Siege(SiegeState),
}

impl CellObject {
    pub fn id(&self) -> &EntityId {
        match self {
            CellObject::Mob(mob) => &mob.id,
            CellObject::ConstructionSite(site) => &site.id,
            CellObject::Siege(siege) => &siege.id,
        }
    }

    pub fn stats(&self) -> &Stats {
        match self {
            CellObject::Mob(mob) => &mob.stats,
            CellObject::ConstructionSite(site) => &site.stats,
            CellObject::Siege(siege) => &siege.stats,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            CellObject::Mob(_) => EntityKind::Mob,
            CellObject::ConstructionSite(_) => EntityKind::ConstructionSite,
            CellObject::Siege(_) => EntityKind::Siege,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageBuilding {
    pub id: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub level: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub inventory: Vec<Item>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PersonalStorageBuilding {
    pub id: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub level: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub player_inventories: BTreeMap<EntityId, Vec<Item>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CraftingTask {
    #[serde(deserialize_with = "null_as_default")]
    pub recipe_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub player_name: String,
    pub start_time: Option<u64>,
    pub completion_time: Option<u64>,
    #[serde(deserialize_with = "null_as_default")]
    pub completed: bool,
}

impl CraftingTask {
    /// Completion fraction at `now_ms` (unix millis).
    pub fn progress(&self, now_ms: u64) -> f64 {
        match (self.start_time, self.completion_time) {
            (Some(start), Some(end)) if end > start => {
                (now_ms.saturating_sub(start) as f64 / (end - start) as f64).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }

    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.completion_time
            .map(|end| end.saturating_sub(now_ms))
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CraftingBuilding {
    pub id: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub level: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub recipe_ids: Vec<u32>,
    #[serde(deserialize_with = "null_as_default")]
    pub crafting_queue: Vec<CraftingTask>,
    #[serde(deserialize_with = "null_as_default")]
    pub slots: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EnhancementBuilding {
    pub id: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub level: u32,
}

/// Building inside a construction site, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Building {
    Storage(StorageBuilding),
    PersonalStorage(PersonalStorageBuilding),
    Crafting(CraftingBuilding),
    Enhancement(EnhancementBuilding),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    Storage,
    PersonalStorage,
}

impl StorageKind {
    pub fn wire_name(self) -> &'static str {
        match self {
            StorageKind::Storage => "storage",
            StorageKind::PersonalStorage => "personal_storage",
        }
    }
}

impl Building {
    pub fn name(&self) -> &str {
        match self {
            Building::Storage(b) => &b.name,
            Building::PersonalStorage(b) => &b.name,
            Building::Crafting(b) => &b.name,
            Building::Enhancement(b) => &b.name,
        }
    }

    pub fn level(&self) -> u32 {
        match self {
            Building::Storage(b) => b.level,
            Building::PersonalStorage(b) => b.level,
            Building::Crafting(b) => b.level,
            Building::Enhancement(b) => b.level,
        }
    }

    /// Authority-assigned id, when the authority sends one.
    pub fn wire_id(&self) -> Option<&str> {
        match self {
            Building::Storage(b) => b.id.as_deref(),
            Building::PersonalStorage(b) => b.id.as_deref(),
            Building::Crafting(b) => b.id.as_deref(),
            Building::Enhancement(b) => b.id.as_deref(),
        }
    }

    pub fn storage_kind(&self) -> Option<StorageKind> {
        match self {
            Building::Storage(_) => Some(StorageKind::Storage),
            Building::PersonalStorage(_) => Some(StorageKind::PersonalStorage),
            Building::Crafting(_) | Building::Enhancement(_) => None,
        }
    }

    /// Items a given viewer sees in this building's storage.
    pub fn stored_items(&self, viewer: &EntityId) -> &[Item] {
        match self {
            Building::Storage(b) => &b.inventory,
            Building::PersonalStorage(b) => b
                .player_inventories
                .get(viewer)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
            Building::Crafting(_) | Building::Enhancement(_) => &[],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellState {
    #[serde(deserialize_with = "null_as_default")]
    pub x: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub y: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub players: Vec<PlayerState>,
    #[serde(deserialize_with = "null_as_default")]
    pub objects: Vec<CellObject>,
}

impl CellState {
    pub fn mobs(&self) -> impl Iterator<Item = &MobState> {
        self.objects.iter().filter_map(|object| match object {
            CellObject::Mob(mob) => Some(mob),
            _ => None,
        })
    }

    pub fn sieges(&self) -> impl Iterator<Item = &SiegeState> {
        self.objects.iter().filter_map(|object| match object {
            CellObject::Siege(siege) => Some(siege),
            _ => None,
        })
    }

    /// First construction site in the cell.
    pub fn site(&self) -> Option<&SiteState> {
        self.objects.iter().find_map(|object| match object {
            CellObject::ConstructionSite(site) => Some(site),
            _ => None,
        })
    }

    pub fn site_of_team(&self, team: &TeamId) -> Option<&SiteState> {
        self.objects.iter().find_map(|object| match object {
            CellObject::ConstructionSite(site) if site.team.as_ref() == Some(team) => Some(site),
            _ => None,
        })
    }

    pub fn object(&self, id: &EntityId) -> Option<&CellObject> {
        self.objects.iter().find(|object| object.id() == id)
    }

    pub fn player(&self, id: &EntityId) -> Option<&PlayerState> {
        self.players.iter().find(|player| &player.id == id)
    }

    pub fn entity_count(&self) -> usize {
        self.players.len() + self.objects.len()
    }
}

/// One complete emission of world state as seen by one viewer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    #[serde(deserialize_with = "null_as_default")]
    pub player: PlayerState,
    #[serde(deserialize_with = "null_as_default")]
    pub cell: CellState,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinPolicy {
    Open,
    #[default]
    Request,
    Closed,
}

impl JoinPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            JoinPolicy::Open => "open",
            JoinPolicy::Request => "request",
            JoinPolicy::Closed => "closed",
        }
    }

    pub fn next(self) -> Self {
        match self {
            JoinPolicy::Open => JoinPolicy::Request,
            JoinPolicy::Request => JoinPolicy::Closed,
            JoinPolicy::Closed => JoinPolicy::Open,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JoinRequest {
    #[serde(deserialize_with = "null_as_default")]
    pub requester_id: EntityId,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Team {
    #[serde(deserialize_with = "null_as_default")]
    pub id: TeamId,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub admin_id: EntityId,
    #[serde(deserialize_with = "null_as_default")]
    pub members: Vec<EntityId>,
    #[serde(deserialize_with = "null_as_default")]
    pub requests: Vec<JoinRequest>,
    #[serde(deserialize_with = "null_as_default")]
    pub join_policy: JoinPolicy,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub color: String,
}

impl Team {
    pub fn has_requested(&self, player: &EntityId) -> bool {
        self.requests
            .iter()
            .any(|request| &request.requester_id == player)
    }
}

pub type TeamRoster = BTreeMap<TeamId, Team>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialCost {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub quantity: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildingTemplate {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub materials: Vec<MaterialCost>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CraftingRecipe {
    #[serde(deserialize_with = "null_as_default")]
    pub id: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub materials: Vec<MaterialCost>,
    #[serde(deserialize_with = "null_as_default")]
    pub crafting_time: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Key format used by the authority's biome layout.
    pub fn key(self) -> String {
        format!("{},{}", self.x, self.y)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteMarker {
    #[serde(deserialize_with = "null_as_default")]
    pub x: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub y: i32,
    pub team: Option<TeamId>,
}

impl SiteMarker {
    pub fn coord(&self) -> Coord {
        Coord::new(self.x, self.y)
    }
}

/// Bundle sent once at login. A bundle with only `teams` is a roster refresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StaticDataPayload {
    pub biome_map: Option<BTreeMap<String, String>>,
    pub building_templates: Option<BTreeMap<String, BuildingTemplate>>,
    pub enemy_templates: Option<BTreeMap<String, serde_json::Value>>,
    pub crafting_recipes: Option<Vec<CraftingRecipe>>,
    pub teams: Option<TeamRoster>,
    pub noobs_team_id: Option<TeamId>,
    pub construction_sites: Option<Vec<SiteMarker>>,
}

impl StaticDataPayload {
    pub fn carries_templates(&self) -> bool {
        self.building_templates.is_some()
    }
}
