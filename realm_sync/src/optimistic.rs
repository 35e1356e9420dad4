//! Local effects of outbound commands, shown before the authority confirms them.

use std::time::{Duration, Instant};

use realm_proto::{ClientCommand, EntityId, JoinPolicy, Team, TeamId};

use crate::cache::StaticDataCache;
use crate::config::ProvisionalTeamDefaults;
use crate::store::GameState;

pub const PROVISIONAL_PREFIX: &str = "provisional-team-";

/// Identifies the authoritative team a provisional one stands in for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationKey {
    pub name: String,
    pub admin: EntityId,
}

impl CorrelationKey {
    fn matches(&self, team: &Team) -> bool {
        team.name == self.name && team.admin_id == self.admin
    }
}

#[derive(Debug, Clone)]
pub struct ProvisionalTeam {
    pub key: CorrelationKey,
    pub team: Team,
    pub created_at: Instant,
}

impl ProvisionalTeam {
    pub fn placeholder(&self) -> &TeamId {
        &self.team.id
    }
}

/// Outcome of folding provisional records into a fresh snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// (placeholder, authoritative id) pairs that were confirmed.
    pub confirmed: Vec<(TeamId, TeamId)>,
    pub expired: Vec<TeamId>,
    pub overlaid: usize,
}

impl Reconciliation {
    pub fn changed_anything(&self) -> bool {
        !self.confirmed.is_empty() || !self.expired.is_empty()
    }
}

pub fn is_provisional(id: &TeamId) -> bool {
    id.as_str().starts_with(PROVISIONAL_PREFIX)
}

#[derive(Debug)]
pub struct OptimisticBridge {
    pending: Vec<ProvisionalTeam>,
    next_seq: u64,
    ttl: Duration,
    defaults: ProvisionalTeamDefaults,
}

impl OptimisticBridge {
    pub fn new(ttl: Duration, defaults: ProvisionalTeamDefaults) -> Self {
        Self {
            pending: Vec::new(),
            next_seq: 0,
            ttl,
            defaults,
        }
    }

    /// Insert a provisional team led by the viewer and point the viewer at it.
    pub fn create_team(&mut self, state: &mut GameState, name: &str, now: Instant) -> ClientCommand {
        self.next_seq += 1;
        let placeholder = TeamId::new(format!("{PROVISIONAL_PREFIX}{}", self.next_seq));
        let viewer = state.player.id.clone();
        let team = Team {
            id: placeholder.clone(),
            name: name.to_string(),
            admin_id: viewer.clone(),
            members: vec![viewer.clone()],
            requests: Vec::new(),
            join_policy: self.defaults.join_policy,
            description: String::new(),
            color: self.defaults.color.clone(),
        };
        state.teams.insert(placeholder.clone(), team.clone());
        state.player.team = Some(placeholder.clone());
        self.pending.push(ProvisionalTeam {
            key: CorrelationKey {
                name: name.to_string(),
                admin: viewer,
            },
            team,
            created_at: now,
        });
        tracing::debug!(
            target: "realm::optimistic",
            team = %placeholder,
            name,
            "provisional.created"
        );
        ClientCommand::CreateTeam {
            team_name: name.to_string(),
        }
    }

    /// Patch a team's settings in both the merged snapshot and the cache.
    pub fn update_team_settings(
        &mut self,
        state: &mut GameState,
        cache: &mut StaticDataCache,
        team_id: &TeamId,
        description: &str,
        join_policy: JoinPolicy,
        color: Option<&str>,
    ) -> ClientCommand {
        let patch = |team: &mut Team| {
            team.description = description.to_string();
            team.join_policy = join_policy;
            if let Some(color) = color {
                team.color = color.to_string();
            }
        };
        if let Some(team) = state.teams.get_mut(team_id) {
            patch(team);
        }
        if let Some(team) = cache.teams_mut().get_mut(team_id) {
            patch(team);
        }
        if let Some(pending) = self
            .pending
            .iter_mut()
            .find(|pending| pending.placeholder() == team_id)
        {
            patch(&mut pending.team);
        }
        ClientCommand::UpdateTeamSettings {
            team_id: team_id.clone(),
            description: description.to_string(),
            join_policy,
            color: color.map(str::to_string),
        }
    }

    /// Confirm, expire or re-overlay each provisional team on `state`.
    pub fn reconcile(&mut self, state: &mut GameState, now: Instant) -> Reconciliation {
        let mut report = Reconciliation::default();
        let ttl = self.ttl;
        self.pending.retain(|pending| {
            let placeholder = pending.placeholder().clone();
            let confirmed = state
                .teams
                .values()
                .find(|team| !is_provisional(&team.id) && pending.key.matches(team))
                .map(|team| team.id.clone());
            if let Some(real) = confirmed {
                state.teams.remove(&placeholder);
                if state.player.team.as_ref() == Some(&placeholder) {
                    state.player.team = Some(real.clone());
                }
                tracing::info!(
                    target: "realm::optimistic",
                    placeholder = %placeholder,
                    team = %real,
                    "provisional.confirmed"
                );
                report.confirmed.push((placeholder, real));
                return false;
            }
            if now.saturating_duration_since(pending.created_at) > ttl {
                state.teams.remove(&placeholder);
                if state.player.team.as_ref() == Some(&placeholder) {
                    state.player.team = None;
                }
                tracing::warn!(
                    target: "realm::optimistic",
                    placeholder = %placeholder,
                    name = %pending.key.name,
                    "provisional.expired"
                );
                report.expired.push(placeholder);
                return false;
            }
            state
                .teams
                .entry(placeholder.clone())
                .or_insert_with(|| pending.team.clone());
            // A real team id from the authority wins, even one the roster
            // does not list yet.
            let unaffiliated = match state.player.team.as_ref() {
                None => true,
                Some(team) => team == &placeholder || state.default_team.as_ref() == Some(team),
            };
            if unaffiliated {
                state.player.team = Some(placeholder);
            }
            report.overlaid += 1;
            true
        });
        report
    }

    /// Forget everything provisional; used when the connection drops.
    pub fn clear(&mut self) {
        if !self.pending.is_empty() {
            tracing::debug!(
                target: "realm::optimistic",
                dropped = self.pending.len(),
                "provisional.cleared"
            );
        }
        self.pending.clear();
    }

    pub fn pending(&self) -> &[ProvisionalTeam] {
        &self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use realm_proto::PlayerState;

    fn bridge() -> OptimisticBridge {
        OptimisticBridge::new(Duration::from_secs(10), ProvisionalTeamDefaults::default())
    }

    fn viewer_state() -> GameState {
        GameState {
            player: PlayerState {
                id: EntityId::new("p1"),
                ..PlayerState::default()
            },
            ..GameState::default()
        }
    }

    fn authoritative(id: &str, name: &str, admin: &str) -> Team {
        Team {
            id: TeamId::new(id),
            name: name.into(),
            admin_id: EntityId::new(admin),
            members: vec![EntityId::new(admin)],
            ..Team::default()
        }
    }

    #[test]
    fn create_team_inserts_one_provisional_record() {
        let mut bridge = bridge();
        let mut state = viewer_state();
        let command = bridge.create_team(&mut state, "Foo", Instant::now());
        assert_eq!(
            command,
            ClientCommand::CreateTeam {
                team_name: "Foo".into()
            }
        );
        let foos: Vec<&Team> = state.teams.values().filter(|t| t.name == "Foo").collect();
        assert_eq!(foos.len(), 1);
        assert_eq!(foos[0].admin_id, EntityId::new("p1"));
        assert_eq!(foos[0].members, vec![EntityId::new("p1")]);
        assert_eq!(foos[0].join_policy, JoinPolicy::Request);
        assert_eq!(state.player.team.as_ref(), Some(&foos[0].id));
    }

    #[test]
    fn authoritative_team_replaces_placeholder() {
        let mut bridge = bridge();
        let now = Instant::now();
        let mut state = viewer_state();
        bridge.create_team(&mut state, "Foo", now);

        let mut fresh = viewer_state();
        fresh
            .teams
            .insert(TeamId::new("team_42"), authoritative("team_42", "Foo", "p1"));
        let report = bridge.reconcile(&mut fresh, now);
        assert_eq!(report.confirmed.len(), 1);
        assert_eq!(fresh.teams.values().filter(|t| t.name == "Foo").count(), 1);
        assert!(bridge.pending().is_empty());
    }

    #[test]
    fn pointer_to_placeholder_is_rewritten() {
        let mut bridge = bridge();
        let now = Instant::now();
        let mut state = viewer_state();
        bridge.create_team(&mut state, "Foo", now);
        state
            .teams
            .insert(TeamId::new("team_42"), authoritative("team_42", "Foo", "p1"));
        bridge.reconcile(&mut state, now);
        assert_eq!(state.player.team, Some(TeamId::new("team_42")));
    }

    #[test]
    fn pending_team_is_overlaid_on_fresh_snapshots() {
        let mut bridge = bridge();
        let now = Instant::now();
        let mut state = viewer_state();
        bridge.create_team(&mut state, "Foo", now);

        let mut fresh = viewer_state();
        let report = bridge.reconcile(&mut fresh, now + Duration::from_secs(1));
        assert_eq!(report.overlaid, 1);
        assert_eq!(fresh.teams.len(), 1);
        assert!(fresh.player.team.as_ref().is_some_and(is_provisional));
    }

    #[test]
    fn authoritative_pointer_is_not_overwritten() {
        let mut bridge = bridge();
        let now = Instant::now();
        let mut state = GameState {
            default_team: Some(TeamId::new("noobs")),
            ..viewer_state()
        };
        state.player.team = Some(TeamId::new("noobs"));
        bridge.create_team(&mut state, "Foo", now);

        let mut fresh = GameState {
            default_team: Some(TeamId::new("noobs")),
            ..viewer_state()
        };
        fresh.player.team = Some(TeamId::new("t9"));
        let report = bridge.reconcile(&mut fresh, now + Duration::from_secs(1));
        assert_eq!(report.overlaid, 1);
        assert_eq!(fresh.player.team, Some(TeamId::new("t9")));

        let mut parked = GameState {
            default_team: Some(TeamId::new("noobs")),
            ..viewer_state()
        };
        parked.player.team = Some(TeamId::new("noobs"));
        bridge.reconcile(&mut parked, now + Duration::from_secs(2));
        assert!(parked.player.team.as_ref().is_some_and(is_provisional));
    }

    #[test]
    fn stale_provisional_records_expire() {
        let mut bridge = bridge();
        let now = Instant::now();
        let mut state = viewer_state();
        bridge.create_team(&mut state, "Foo", now);

        let mut fresh = viewer_state();
        let report = bridge.reconcile(&mut fresh, now + Duration::from_secs(11));
        assert_eq!(report.expired.len(), 1);
        assert!(fresh.teams.is_empty());
        assert_eq!(fresh.player.team, None);
    }

    #[test]
    fn settings_patch_reaches_cache_and_snapshot() {
        let mut bridge = bridge();
        let mut cache = StaticDataCache::new();
        cache.absorb(realm_proto::StaticDataPayload {
            teams: Some(
                [(TeamId::new("t1"), authoritative("t1", "Alpha", "p1"))]
                    .into_iter()
                    .collect(),
            ),
            ..Default::default()
        });
        let mut state = GameState {
            teams: cache.teams().clone(),
            ..viewer_state()
        };
        let command = bridge.update_team_settings(
            &mut state,
            &mut cache,
            &TeamId::new("t1"),
            "we build",
            JoinPolicy::Open,
            Some("bg-red-500"),
        );
        assert_eq!(command.action(), "update-team-settings");
        for roster in [&state.teams, cache.teams()] {
            let team = &roster[&TeamId::new("t1")];
            assert_eq!(team.description, "we build");
            assert_eq!(team.join_policy, JoinPolicy::Open);
            assert_eq!(team.color, "bg-red-500");
        }
    }
}
