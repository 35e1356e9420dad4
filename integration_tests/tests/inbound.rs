mod common;

use std::time::{Duration, Instant};

use realm_proto::{decode_server_message, CellObject, ProtoError, ServerMessage};
use realm_sync::{Connectivity, DirtySubtrees, Intent, Notice, SceneRefresh};

#[test]
fn loot_is_carried_forward_when_omitted() {
    let now = Instant::now();
    let mut context = common::joined_context(now);
    let mut next = common::base_snapshot();
    let CellObject::Mob(wolf) = &mut next.cell.objects[0] else {
        panic!("fixture should lead with the wolf");
    };
    wolf.loot = None;

    let update = context.handle_message(common::frame(next), now);
    assert_eq!(update.scene, SceneRefresh::Unchanged);
    let state = context.state().expect("snapshot present");
    let wolf = state.cell.mobs().next().expect("wolf present");
    let loot = wolf.loot.as_ref().expect("loot carried forward");
    assert_eq!(loot[0].name, "Pelt");
}

#[test]
fn batch_applies_only_newest_snapshot() {
    let now = Instant::now();
    let mut context = common::joined_context(now);
    let with_wolf_hp = |hp: f64| {
        let mut snapshot = common::base_snapshot();
        if let CellObject::Mob(wolf) = &mut snapshot.cell.objects[0] {
            wolf.stats.hp = hp;
        }
        common::frame(snapshot)
    };
    let batch = vec![
        with_wolf_hp(20.0),
        ServerMessage::Log {
            message: "The wolf howls".into(),
        },
        with_wolf_hp(10.0),
    ];

    let update = context.handle_batch(batch, now);
    assert_eq!(update.notices, vec![Notice::Log("The wolf howls".into())]);
    let hp_of = |state: Option<&realm_sync::GameState>| {
        state
            .and_then(|state| state.cell.mobs().next())
            .map(|wolf| wolf.stats.hp)
    };
    assert_eq!(hp_of(context.state()), Some(10.0));
    assert_eq!(hp_of(context.previous_state()), Some(30.0));
}

#[test]
fn coalesced_batch_keeps_loot_from_dropped_snapshot() {
    let now = Instant::now();
    let mut context = common::fresh_context();
    context.on_connected();
    context.handle_message(common::message("static_data.json"), now);
    let mut later = common::base_snapshot();
    let CellObject::Mob(wolf) = &mut later.cell.objects[0] else {
        panic!("fixture should lead with the wolf");
    };
    wolf.loot = None;

    context.handle_batch(
        vec![common::frame(common::base_snapshot()), common::frame(later)],
        now,
    );
    let state = context.state().expect("snapshot present");
    assert!(context.previous_state().is_none());
    let wolf = state.cell.mobs().next().expect("wolf present");
    let loot = wolf.loot.as_ref().expect("loot folded into the kept snapshot");
    assert_eq!(loot[0].name, "Pelt");
}

#[test]
fn resize_burst_rebuilds_map_once_after_quiet_period() {
    let start = Instant::now();
    let mut context = common::joined_context(start);
    assert!(!context.on_resize(start), "area view ignores resizes");

    context
        .dispatch(Intent::ToggleMapView, start)
        .expect("map toggle is local");
    let quiet = context.config().resize_quiescence();
    assert!(context.on_resize(start));
    let last = start + quiet / 2;
    assert!(context.on_resize(last));

    assert!(context.poll_timers(start + quiet).is_empty());
    let fired = context.poll_timers(last + quiet);
    assert_eq!(fired.scene, SceneRefresh::Rebuild);
    assert!(context.poll_timers(last + quiet * 2).is_empty());
}

#[test]
fn leaving_map_cancels_pending_rebuild() {
    let start = Instant::now();
    let mut context = common::joined_context(start);
    context
        .dispatch(Intent::ToggleMapView, start)
        .expect("map toggle is local");
    assert!(context.on_resize(start));
    context
        .dispatch(Intent::ToggleMapView, start)
        .expect("map toggle is local");

    assert!(!context.scene().rebuild_pending());
    assert!(context
        .poll_timers(start + Duration::from_secs(5))
        .is_empty());
}

#[test]
fn unknown_and_malformed_frames_are_contained() {
    let now = Instant::now();
    let mut context = common::joined_context(now);

    let unknown = decode_server_message(r#"{"type":"weather","rain":true}"#)
        .expect("unknown tags decode");
    assert!(context.handle_message(unknown, now).is_empty());

    let malformed = decode_server_message(r#"{"type":"gameState","state":5}"#);
    assert!(matches!(malformed, Err(ProtoError::Payload { .. })));
    assert!(context.state().is_some());
}

#[test]
fn login_and_combat_lines_surface_as_notices() {
    let now = Instant::now();
    let mut context = common::fresh_context();
    context.on_connected();
    assert_eq!(context.connectivity(), Connectivity::Connected);

    let login = decode_server_message(
        r#"{"type":"loginSuccess","player":{"id":"p1","name":"Ada"}}"#,
    )
    .expect("login frame decodes");
    let update = context.handle_message(login, now);
    assert_eq!(context.connectivity(), Connectivity::LoggedIn);
    assert_eq!(update.notices, vec![Notice::Welcome("Welcome, Ada!".into())]);

    let update = context.handle_message(
        ServerMessage::CombatLog {
            message: "Wolf deals 7 damage to Ada".into(),
        },
        now,
    );
    assert_eq!(update.dirty_subtrees, DirtySubtrees::STATS);
    assert_eq!(context.last_damage_taken(), Some(7.0));
}

#[test]
fn reconnect_treats_next_snapshot_as_first() {
    let now = Instant::now();
    let mut context = common::joined_context(now);
    let update = context.on_disconnected();
    assert!(update.connectivity_changed);
    assert_eq!(context.connectivity(), Connectivity::Disconnected);
    assert!(context.cache().is_loaded());

    context.on_connected();
    let update = context.handle_message(common::frame(common::base_snapshot()), now);
    assert_eq!(update.scene, SceneRefresh::Rebuild);
    assert!(update.panel_rebuild);
    let state = context.state().expect("snapshot present");
    assert!(!state.statics.building_templates.is_empty());
}
