mod common;

use std::time::{Duration, Instant};

use realm_proto::{
    ClientCommand, EntityId, JoinPolicy, ServerMessage, StaticDataPayload, Team, TeamId,
};
use realm_sync::{is_provisional, ClientContext, Intent, ViewAction, ViewKind};

fn teams_named<'a>(context: &'a ClientContext, name: &str) -> Vec<&'a Team> {
    context
        .state()
        .map(|state| {
            state
                .teams
                .values()
                .filter(|team| team.name == name)
                .collect()
        })
        .unwrap_or_default()
}

fn roster_with(context: &ClientContext, team: Team) -> ServerMessage {
    let mut teams = context.cache().teams().clone();
    teams.insert(team.id.clone(), team);
    ServerMessage::StaticData {
        data: StaticDataPayload {
            teams: Some(teams),
            ..StaticDataPayload::default()
        },
    }
}

fn confirmed_foo() -> Team {
    Team {
        id: TeamId::new("t9"),
        name: "Foo".into(),
        admin_id: EntityId::new("p1"),
        members: vec![EntityId::new("p1")],
        ..Team::default()
    }
}

#[test]
fn created_team_appears_once_and_is_confirmed_without_duplicate() -> anyhow::Result<()> {
    let now = Instant::now();
    let mut context = common::joined_context(now);

    let dispatch = context.dispatch(Intent::CreateTeam("Foo".into()), now)?;
    assert_eq!(
        dispatch.command,
        Some(ClientCommand::CreateTeam {
            team_name: "Foo".into()
        })
    );
    let provisional = teams_named(&context, "Foo");
    assert_eq!(provisional.len(), 1);
    assert!(is_provisional(&provisional[0].id));
    assert_eq!(provisional[0].admin_id, EntityId::new("p1"));
    assert_eq!(provisional[0].members, vec![EntityId::new("p1")]);

    let refresh = roster_with(&context, confirmed_foo());
    context.handle_message(refresh, now + Duration::from_secs(1));
    let confirmed = teams_named(&context, "Foo");
    assert_eq!(confirmed.len(), 1);
    assert_eq!(confirmed[0].id, TeamId::new("t9"));
    assert!(context.bridge().pending().is_empty());
    let state = context.state().expect("snapshot present");
    assert_eq!(state.player.team, Some(TeamId::new("t9")));

    let mut next = common::base_snapshot();
    next.player.team = Some(TeamId::new("t9"));
    context.handle_message(common::frame(next), now + Duration::from_secs(2));
    assert_eq!(teams_named(&context, "Foo").len(), 1);
    Ok(())
}

#[test]
fn stale_snapshot_keeps_the_provisional_overlay() -> anyhow::Result<()> {
    let now = Instant::now();
    let mut context = common::joined_context(now);
    context.dispatch(Intent::CreateTeam("Foo".into()), now)?;

    context.handle_message(
        common::frame(common::base_snapshot()),
        now + Duration::from_secs(1),
    );
    let overlaid = teams_named(&context, "Foo");
    assert_eq!(overlaid.len(), 1);
    assert!(is_provisional(&overlaid[0].id));
    assert_eq!(context.bridge().pending().len(), 1);
    Ok(())
}

#[test]
fn authoritative_team_pointer_beats_the_placeholder() -> anyhow::Result<()> {
    let now = Instant::now();
    let mut context = common::joined_context(now);
    let mut parked = common::base_snapshot();
    parked.player.team = Some(TeamId::new("noobs"));
    context.handle_message(common::frame(parked), now);
    context.dispatch(Intent::CreateTeam("Foo".into()), now)?;

    // The authority moves the viewer onto the new team before the roster refresh.
    let mut moved = common::base_snapshot();
    moved.player.team = Some(TeamId::new("t9"));
    context.handle_message(common::frame(moved), now + Duration::from_secs(1));
    let state = context.state().expect("snapshot present");
    assert_eq!(state.player.team, Some(TeamId::new("t9")));
    assert_eq!(context.bridge().pending().len(), 1);

    let refresh = roster_with(&context, confirmed_foo());
    context.handle_message(refresh, now + Duration::from_secs(2));
    let confirmed = teams_named(&context, "Foo");
    assert_eq!(confirmed.len(), 1);
    assert_eq!(confirmed[0].id, TeamId::new("t9"));
    let state = context.state().expect("snapshot present");
    assert_eq!(state.player.team, Some(TeamId::new("t9")));
    Ok(())
}

#[test]
fn unconfirmed_team_expires_after_ttl() -> anyhow::Result<()> {
    let now = Instant::now();
    let mut context = common::joined_context(now);
    context.dispatch(Intent::CreateTeam("Foo".into()), now)?;

    let ttl = context.config().provisional_ttl();
    let mut next = common::base_snapshot();
    next.player.team = None;
    context.handle_message(common::frame(next), now + ttl + Duration::from_millis(1));

    assert!(teams_named(&context, "Foo").is_empty());
    assert!(context.bridge().pending().is_empty());
    let state = context.state().expect("snapshot present");
    assert!(state
        .player
        .team
        .as_ref()
        .map_or(true, |team| !is_provisional(team)));
    Ok(())
}

#[test]
fn blank_team_name_is_rejected_locally() {
    let now = Instant::now();
    let mut context = common::joined_context(now);
    assert!(context.dispatch(Intent::CreateTeam("   ".into()), now).is_err());
    assert!(context.bridge().pending().is_empty());
}

#[test]
fn settings_update_is_applied_before_authority_echo() -> anyhow::Result<()> {
    let now = Instant::now();
    let mut context = common::joined_context(now);
    context.dispatch(Intent::OpenTeams, now)?;

    let dispatch = context.dispatch(
        Intent::UpdateTeamSettings {
            team_id: TeamId::new("t1"),
            description: "We dig".into(),
            join_policy: JoinPolicy::Open,
            color: None,
        },
        now,
    )?;
    assert_eq!(
        dispatch.update.views.get(&ViewKind::Teams),
        Some(&ViewAction::Render)
    );
    let team = &context.state().expect("snapshot present").teams[&TeamId::new("t1")];
    assert_eq!(team.description, "We dig");
    assert_eq!(team.join_policy, JoinPolicy::Open);
    assert_eq!(team.color, "bg-red-500");
    assert_eq!(
        context.cache().teams()[&TeamId::new("t1")].join_policy,
        JoinPolicy::Open
    );
    Ok(())
}

#[test]
fn disconnect_drops_provisional_teams() -> anyhow::Result<()> {
    let now = Instant::now();
    let mut context = common::joined_context(now);
    context.dispatch(Intent::CreateTeam("Foo".into()), now)?;
    assert_eq!(context.bridge().pending().len(), 1);

    context.on_disconnected();
    assert!(context.bridge().pending().is_empty());
    assert!(context.state().is_none());
    assert!(!context.cache().teams().is_empty());

    context.on_connected();
    context.handle_message(common::frame(common::base_snapshot()), now);
    assert!(teams_named(&context, "Foo").is_empty());
    Ok(())
}
