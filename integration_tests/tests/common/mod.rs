#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Instant;

use realm_proto::{decode_server_message, ServerMessage, Snapshot};
use realm_sync::{ClientConfig, ClientContext};

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn message(name: &str) -> ServerMessage {
    let path = fixture_path(name);
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|err| panic!("missing fixture {}: {err}", path.display()));
    decode_server_message(&text).unwrap_or_else(|err| panic!("bad fixture {name}: {err}"))
}

/// The base snapshot: Ada on team Alpha standing at her castle with Bob and a wolf.
pub fn base_snapshot() -> Snapshot {
    match message("game_state.json") {
        ServerMessage::GameState { state } => state,
        other => panic!("expected gameState fixture, got {}", other.tag()),
    }
}

pub fn frame(state: Snapshot) -> ServerMessage {
    ServerMessage::GameState { state }
}

pub fn test_config() -> ClientConfig {
    ClientConfig::from_file(&fixture_path("test_client_config.json"))
        .expect("test client config should load")
}

pub fn fresh_context() -> ClientContext {
    ClientContext::new(test_config())
}

/// A context that has received static data and the base snapshot.
pub fn joined_context(now: Instant) -> ClientContext {
    let mut context = fresh_context();
    context.on_connected();
    context.handle_message(message("static_data.json"), now);
    context.handle_message(frame(base_snapshot()), now);
    context
}
