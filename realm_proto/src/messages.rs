use serde::{Deserialize, Serialize};

use crate::model::{
    null_as_default, EntityId, JoinPolicy, SiteMarker, Snapshot, StaticDataPayload, StorageKind,
    TeamId,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginPlayer {
    #[serde(deserialize_with = "null_as_default")]
    pub id: EntityId,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
}

/// Authority → client frames, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    GameState {
        state: Snapshot,
    },
    StaticData {
        data: StaticDataPayload,
    },
    ConstructionUpdate {
        #[serde(default, deserialize_with = "null_as_default")]
        sites: Vec<SiteMarker>,
    },
    LoginSuccess {
        #[serde(default)]
        player: LoginPlayer,
    },
    Log {
        #[serde(default)]
        message: String,
    },
    CombatLog {
        #[serde(default)]
        message: String,
    },
    Error {
        #[serde(default)]
        message: String,
    },
    /// Frame whose tag this client does not understand. Never on the wire.
    #[serde(skip)]
    Unrecognized { tag: String },
}

impl ServerMessage {
    pub const KNOWN_TAGS: [&'static str; 7] = [
        "gameState",
        "staticData",
        "constructionUpdate",
        "loginSuccess",
        "log",
        "combatLog",
        "error",
    ];

    pub fn tag(&self) -> &str {
        match self {
            ServerMessage::GameState { .. } => "gameState",
            ServerMessage::StaticData { .. } => "staticData",
            ServerMessage::ConstructionUpdate { .. } => "constructionUpdate",
            ServerMessage::LoginSuccess { .. } => "loginSuccess",
            ServerMessage::Log { .. } => "log",
            ServerMessage::CombatLog { .. } => "combatLog",
            ServerMessage::Error { .. } => "error",
            ServerMessage::Unrecognized { tag } => tag,
        }
    }

    pub fn is_snapshot(&self) -> bool {
        matches!(self, ServerMessage::GameState { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinDecision {
    Accept,
    Reject,
}

/// Client → authority commands, discriminated by `action`. Fire-and-forget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ClientCommand {
    #[serde(rename = "login")]
    Login { name: String, password: String },
    #[serde(rename = "move")]
    Move { x: i32, y: i32 },
    #[serde(rename = "attack", rename_all = "camelCase")]
    Attack { target_id: EntityId },
    #[serde(rename = "build")]
    Build,
    #[serde(rename = "donate")]
    Donate,
    #[serde(rename = "deploySiege")]
    DeploySiege,
    #[serde(rename = "go-outside")]
    GoOutside,
    #[serde(rename = "go-inside")]
    GoInside,
    #[serde(rename = "respawn")]
    Respawn,
    #[serde(rename = "summon-boss")]
    SummonBoss,
    #[serde(rename = "equip-item", rename_all = "camelCase")]
    EquipItem { item_index: usize },
    #[serde(rename = "unequip-item")]
    UnequipItem { slot: String },
    #[serde(rename = "use-item", rename_all = "camelCase")]
    UseItem { item_index: usize },
    #[serde(rename = "create-team", rename_all = "camelCase")]
    CreateTeam { team_name: String },
    #[serde(rename = "join-team", rename_all = "camelCase")]
    JoinTeam { team_id: TeamId },
    #[serde(rename = "leave-team")]
    LeaveTeam,
    #[serde(rename = "request-to-join", rename_all = "camelCase")]
    RequestToJoin { team_id: TeamId },
    #[serde(rename = "update-team-settings", rename_all = "camelCase")]
    UpdateTeamSettings {
        team_id: TeamId,
        description: String,
        join_policy: JoinPolicy,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<String>,
    },
    #[serde(rename = "resolve-join-request", rename_all = "camelCase")]
    ResolveJoinRequest {
        team_id: TeamId,
        requester_id: EntityId,
        decision: JoinDecision,
    },
    #[serde(rename = "build-building", rename_all = "camelCase")]
    BuildBuilding { building_name: String },
    #[serde(rename = "enchant-item", rename_all = "camelCase")]
    EnchantItem {
        building_index: usize,
        item_index: usize,
        rune_index: usize,
    },
    #[serde(rename = "deposit-storage", rename_all = "camelCase")]
    DepositStorage {
        building_index: usize,
        item_index: usize,
        storage_type: StorageKind,
        quantity: u32,
    },
    #[serde(rename = "withdraw-storage", rename_all = "camelCase")]
    WithdrawStorage {
        building_index: usize,
        item_index: usize,
        storage_type: StorageKind,
    },
    #[serde(rename = "craft-item", rename_all = "camelCase")]
    CraftItem { building_index: usize, recipe_id: u32 },
}

impl ClientCommand {
    /// Wire `action` tag.
    pub fn action(&self) -> &'static str {
        match self {
            ClientCommand::Login { .. } => "login",
            ClientCommand::Move { .. } => "move",
            ClientCommand::Attack { .. } => "attack",
            ClientCommand::Build => "build",
            ClientCommand::Donate => "donate",
            ClientCommand::DeploySiege => "deploySiege",
            ClientCommand::GoOutside => "go-outside",
            ClientCommand::GoInside => "go-inside",
            ClientCommand::Respawn => "respawn",
            ClientCommand::SummonBoss => "summon-boss",
            ClientCommand::EquipItem { .. } => "equip-item",
            ClientCommand::UnequipItem { .. } => "unequip-item",
            ClientCommand::UseItem { .. } => "use-item",
            ClientCommand::CreateTeam { .. } => "create-team",
            ClientCommand::JoinTeam { .. } => "join-team",
            ClientCommand::LeaveTeam => "leave-team",
            ClientCommand::RequestToJoin { .. } => "request-to-join",
            ClientCommand::UpdateTeamSettings { .. } => "update-team-settings",
            ClientCommand::ResolveJoinRequest { .. } => "resolve-join-request",
            ClientCommand::BuildBuilding { .. } => "build-building",
            ClientCommand::EnchantItem { .. } => "enchant-item",
            ClientCommand::DepositStorage { .. } => "deposit-storage",
            ClientCommand::WithdrawStorage { .. } => "withdraw-storage",
            ClientCommand::CraftItem { .. } => "craft-item",
        }
    }
}
