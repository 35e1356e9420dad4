//! Current and previous merged snapshots.

use std::collections::BTreeMap;
use std::sync::Arc;

use realm_proto::{
    CellObject, CellState, EntityId, LootEntry, PlayerState, SiteState, Snapshot, Team, TeamId,
    TeamRoster,
};

use crate::cache::{StaticData, StaticDataCache};

/// A snapshot with the static cache folded in. Renderers only ever see this.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameState {
    pub player: PlayerState,
    pub cell: CellState,
    pub statics: Arc<StaticData>,
    pub teams: TeamRoster,
    pub default_team: Option<TeamId>,
}

impl GameState {
    pub fn merge(cache: &StaticDataCache, snapshot: Snapshot) -> Self {
        Self {
            player: snapshot.player,
            cell: snapshot.cell,
            statics: Arc::clone(cache.statics()),
            teams: cache.teams().clone(),
            default_team: cache.default_team().cloned(),
        }
    }

    /// The viewer's team's construction site in this cell.
    pub fn own_site(&self) -> Option<&SiteState> {
        let team = self.player.team.as_ref()?;
        self.cell.site_of_team(team)
    }

    pub fn player_team(&self) -> Option<&Team> {
        self.player.team.as_ref().and_then(|id| self.teams.get(id))
    }

    pub fn team_of(&self, id: Option<&TeamId>) -> Option<&Team> {
        id.and_then(|id| self.teams.get(id))
    }

    /// The viewer is on a real team, not unaffiliated or parked on the default team.
    pub fn has_own_team(&self) -> bool {
        match self.player.team.as_ref() {
            Some(team) => self.default_team.as_ref() != Some(team),
            None => false,
        }
    }

    /// Display name for a player id, falling back to the short id when the
    /// player is not visible in the cell.
    pub fn player_label(&self, id: &EntityId) -> String {
        if id == &self.player.id {
            return self.player.name.clone();
        }
        match self.cell.player(id) {
            Some(player) => player.name.clone(),
            None => format!("Player {}", id.short()),
        }
    }
}

/// Pair returned by [`SnapshotStore::apply_snapshot`].
pub type SnapshotPair<'a> = (&'a GameState, Option<&'a GameState>);

#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: Option<GameState>,
    previous: Option<GameState>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `next` with the cache and rotate it in as current.
    pub fn apply_snapshot(&mut self, next: Snapshot, cache: &StaticDataCache) -> SnapshotPair<'_> {
        let mut merged = GameState::merge(cache, next);
        if let Some(current) = self.current.as_ref() {
            carry_forward_loot(&mut merged.cell, &current.cell);
        }
        self.previous = self.current.take();
        let current = self.current.insert(merged);
        (current, self.previous.as_ref())
    }

    /// Forget both snapshots; the next one is treated as the first.
    pub fn reset(&mut self) {
        self.current = None;
        self.previous = None;
    }

    pub fn current(&self) -> Option<&GameState> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut GameState> {
        self.current.as_mut()
    }

    pub fn previous(&self) -> Option<&GameState> {
        self.previous.as_ref()
    }

    pub fn pair(&self) -> Option<SnapshotPair<'_>> {
        self.current
            .as_ref()
            .map(|current| (current, self.previous.as_ref()))
    }
}

/// Loot tables arrive once per mob lifetime; keep them on later snapshots.
fn carry_forward_loot(next: &mut CellState, previous: &CellState) {
    let known: BTreeMap<&EntityId, &Vec<LootEntry>> = previous
        .mobs()
        .filter_map(|mob| mob.loot.as_ref().map(|loot| (&mob.id, loot)))
        .collect();
    if known.is_empty() {
        return;
    }
    fill_missing_loot(next, |id| known.get(id).copied());
}

/// Give every mob in `cell` that omits its loot table the one `lookup` knows.
pub(crate) fn fill_missing_loot<'a>(
    cell: &mut CellState,
    lookup: impl Fn(&EntityId) -> Option<&'a Vec<LootEntry>>,
) {
    for object in &mut cell.objects {
        if let CellObject::Mob(mob) = object {
            if mob.loot.is_none() {
                if let Some(loot) = lookup(&mob.id) {
                    mob.loot = Some(loot.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use realm_proto::{MobState, StaticDataPayload};

    fn mob(id: &str, loot: Option<Vec<LootEntry>>) -> CellObject {
        CellObject::Mob(MobState {
            id: EntityId::new(id),
            name: "Wolf".into(),
            loot,
            ..MobState::default()
        })
    }

    fn snapshot(objects: Vec<CellObject>) -> Snapshot {
        Snapshot {
            player: PlayerState {
                id: EntityId::new("p1"),
                name: "Ada".into(),
                ..PlayerState::default()
            },
            cell: CellState {
                objects,
                ..CellState::default()
            },
        }
    }

    #[test]
    fn rotation_keeps_previous() {
        let cache = StaticDataCache::new();
        let mut store = SnapshotStore::new();
        let (_, previous) = store.apply_snapshot(snapshot(vec![]), &cache);
        assert!(previous.is_none());
        let (current, previous) = store.apply_snapshot(snapshot(vec![mob("m1", None)]), &cache);
        assert_eq!(current.cell.objects.len(), 1);
        assert_eq!(previous.unwrap().cell.objects.len(), 0);

        store.reset();
        assert!(store.current().is_none());
        assert!(store.previous().is_none());
    }

    #[test]
    fn loot_survives_snapshots_that_omit_it() {
        let cache = StaticDataCache::new();
        let mut store = SnapshotStore::new();
        let loot = vec![LootEntry {
            name: "Pelt".into(),
            chance: Some(0.5),
        }];
        store.apply_snapshot(snapshot(vec![mob("m1", Some(loot.clone()))]), &cache);
        store.apply_snapshot(snapshot(vec![mob("m1", None), mob("m2", None)]), &cache);
        let (current, _) = store.apply_snapshot(snapshot(vec![mob("m1", None)]), &cache);
        let carried = current.cell.mobs().next().unwrap();
        assert_eq!(carried.loot.as_ref(), Some(&loot));
    }

    #[test]
    fn merge_copies_roster_and_default_team() {
        let mut cache = StaticDataCache::new();
        cache.absorb(StaticDataPayload {
            teams: Some(TeamRoster::from([(
                TeamId::new("t1"),
                Team {
                    id: TeamId::new("t1"),
                    name: "Alpha".into(),
                    ..Team::default()
                },
            )])),
            noobs_team_id: Some(TeamId::new("noobs")),
            ..StaticDataPayload::default()
        });
        let mut store = SnapshotStore::new();
        let (current, _) = store.apply_snapshot(snapshot(vec![]), &cache);
        assert_eq!(current.teams.len(), 1);
        assert_eq!(current.default_team, Some(TeamId::new("noobs")));
        assert!(!current.has_own_team());
    }
}
