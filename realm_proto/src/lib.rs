//! Wire model for the realm authority protocol.
//!
//! Inbound frames are JSON objects tagged by `type`, outbound commands are
//! JSON objects tagged by `action`. Everything the authority may omit decodes
//! to a zero or empty default.

use ahash::RandomState;
use serde::Serialize;
use std::hash::{BuildHasher, Hasher};
use thiserror::Error;

mod messages;
mod model;

pub use messages::{ClientCommand, JoinDecision, LoginPlayer, ServerMessage};
pub use model::{
    Building, BuildingTemplate, CellObject, CellState, Coord, CraftingBuilding, CraftingRecipe,
    CraftingTask, Enchantment, EnhancementBuilding, EntityId, EntityKind, Item, ItemKind,
    JoinPolicy, JoinRequest, LootEntry, MaterialCost, MobState, PersonalStorageBuilding,
    PlayerState, SiegeState, SiteMarker, SiteState, Skill, Snapshot, StaticDataPayload, Stats,
    StorageBuilding, StorageKind, Team, TeamId, TeamRoster, EQUIPMENT_SLOTS,
};

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame has no string `type` tag")]
    MissingTag,
    #[error("malformed `{tag}` payload: {source}")]
    Payload {
        tag: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Decode one inbound text frame.
///
/// Unknown tags decode to [`ServerMessage::Unrecognized`] rather than failing,
/// so the caller can log and move on.
pub fn decode_server_message(text: &str) -> Result<ServerMessage, ProtoError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let tag = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or(ProtoError::MissingTag)?
        .to_string();
    if !ServerMessage::KNOWN_TAGS.contains(&tag.as_str()) {
        return Ok(ServerMessage::Unrecognized { tag });
    }
    serde_json::from_value(value).map_err(|source| ProtoError::Payload { tag, source })
}

pub fn encode_command(command: &ClientCommand) -> serde_json::Result<String> {
    serde_json::to_string(command)
}

pub fn encode_server_message(message: &ServerMessage) -> serde_json::Result<String> {
    serde_json::to_string(message)
}

/// Stable binary encoding of any wire value.
///
/// All maps in the model are ordered, so equal values encode to equal bytes.
/// Open views keep these bytes and compare them to skip redundant re-renders.
pub fn canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Vec<u8> {
    match bincode::serialize(value) {
        Ok(encoded) => encoded,
        // Only unsized sequences fail under bincode; fall back to JSON text.
        Err(_) => serde_json::to_vec(value).unwrap_or_default(),
    }
}

/// Deterministic content hash of [`canonical_bytes`].
pub fn fingerprint<T: Serialize + ?Sized>(value: &T) -> u64 {
    let mut hasher = RandomState::with_seeds(0, 0, 0, 0).build_hasher();
    hasher.write(&canonical_bytes(value));
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tag_is_not_an_error() {
        let message = decode_server_message(r#"{"type":"weather","rain":true}"#).unwrap();
        assert_eq!(
            message,
            ServerMessage::Unrecognized {
                tag: "weather".into()
            }
        );
    }

    #[test]
    fn missing_tag_is_rejected() {
        assert!(matches!(
            decode_server_message(r#"{"state":{}}"#),
            Err(ProtoError::MissingTag)
        ));
    }

    #[test]
    fn snapshot_defaults_missing_and_null_fields() {
        let frame = r#"{
            "type": "gameState",
            "state": {
                "player": {"id": "p1", "name": "Ada", "stats": null, "inventory": null,
                           "isDead": null, "isInsideCastle": null, "x": null},
                "cell": {"x": 3, "y": null, "players": [], "objects": [
                    {"type": "mob", "id": "m1", "name": "Wolf", "isBoss": null,
                     "stats": {"hp": null, "maxHp": 10}},
                    {"type": "construction_site", "id": "s1", "team": "t1", "level": null, "buildings": [
                        {"type": "storage", "name": "Storage", "level": null}
                    ]}
                ]}
            }
        }"#;
        let ServerMessage::GameState { state } = decode_server_message(frame).unwrap() else {
            panic!("expected a snapshot");
        };
        assert_eq!(state.player.stats, Stats::default());
        assert!(state.player.inventory.is_empty());
        assert!(!state.player.is_dead);
        assert!(!state.player.is_inside_castle);
        assert_eq!((state.cell.x, state.cell.y), (3, 0));
        let mob = state.cell.mobs().next().unwrap();
        assert!(!mob.is_boss);
        assert_eq!(mob.stats.hp, 0.0);
        assert_eq!(mob.stats.max_hp, 10.0);
        let site = state.cell.site().unwrap();
        assert_eq!(site.level, 0);
        assert_eq!(site.buildings.len(), 1);
        assert_eq!(site.buildings[0].level(), 0);
        assert!(site.buildings[0].stored_items(&state.player.id).is_empty());
    }

    #[test]
    fn commands_use_wire_action_names() {
        let json = encode_command(&ClientCommand::DepositStorage {
            building_index: 2,
            item_index: 0,
            storage_type: StorageKind::PersonalStorage,
            quantity: 3,
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["action"], "deposit-storage");
        assert_eq!(value["buildingIndex"], 2);
        assert_eq!(value["storageType"], "personal_storage");

        let json = encode_command(&ClientCommand::CreateTeam {
            team_name: "Foo".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"action":"create-team","teamName":"Foo"}"#);

        let json = encode_command(&ClientCommand::DeploySiege).unwrap();
        assert_eq!(json, r#"{"action":"deploySiege"}"#);
    }

    #[test]
    fn settings_update_omits_absent_color() {
        let json = encode_command(&ClientCommand::UpdateTeamSettings {
            team_id: TeamId::new("t1"),
            description: "hi".into(),
            join_policy: JoinPolicy::Open,
            color: None,
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["joinPolicy"], "open");
        assert!(value.get("color").is_none());
    }

    #[test]
    fn fingerprint_tracks_content() {
        let mut stats = Stats {
            hp: 5.0,
            max_hp: 10.0,
            ..Stats::default()
        };
        let before = fingerprint(&stats);
        assert_eq!(before, fingerprint(&stats.clone()));
        stats.hp = 4.0;
        assert_ne!(before, fingerprint(&stats));
        assert_eq!(canonical_bytes(&stats), canonical_bytes(&stats.clone()));
    }

    #[test]
    fn short_id_takes_trailing_characters() {
        assert_eq!(EntityId::new("player-12345").short(), "2345");
        assert_eq!(EntityId::new("ab").short(), "ab");
    }
}
