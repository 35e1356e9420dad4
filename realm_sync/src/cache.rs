//! Long-lived data the authority sends once and omits from snapshots.

use std::collections::BTreeMap;
use std::sync::Arc;

use realm_proto::{
    BuildingTemplate, Coord, CraftingRecipe, SiteMarker, StaticDataPayload, TeamId, TeamRoster,
};
use serde_json::Value;

/// Templates and layout shared by every merged snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticData {
    pub biome_map: BTreeMap<String, String>,
    pub building_templates: BTreeMap<String, BuildingTemplate>,
    pub enemy_templates: BTreeMap<String, Value>,
    pub crafting_recipes: Vec<CraftingRecipe>,
}

impl StaticData {
    pub fn biome_at(&self, coord: Coord) -> Option<&str> {
        self.biome_map.get(&coord.key()).map(String::as_str)
    }

    pub fn recipe(&self, id: u32) -> Option<&CraftingRecipe> {
        self.crafting_recipes.iter().find(|recipe| recipe.id == id)
    }
}

/// What a static-data payload touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticChange {
    pub templates: bool,
    pub roster: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StaticDataCache {
    statics: Arc<StaticData>,
    teams: TeamRoster,
    default_team: Option<TeamId>,
    site_markers: BTreeMap<Coord, Option<TeamId>>,
    loaded: bool,
}

impl StaticDataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a payload into the cache. A payload without templates is a
    /// roster refresh and leaves templates and markers alone.
    pub fn absorb(&mut self, payload: StaticDataPayload) -> StaticChange {
        let mut change = StaticChange::default();
        if payload.carries_templates() {
            self.statics = Arc::new(StaticData {
                biome_map: payload.biome_map.unwrap_or_default(),
                building_templates: payload.building_templates.unwrap_or_default(),
                enemy_templates: payload.enemy_templates.unwrap_or_default(),
                crafting_recipes: payload.crafting_recipes.unwrap_or_default(),
            });
            if let Some(sites) = payload.construction_sites {
                self.replace_markers(&sites);
            }
            self.loaded = true;
            change.templates = true;
        }
        if let Some(teams) = payload.teams {
            self.teams = teams;
            change.roster = true;
        }
        if let Some(default_team) = payload.noobs_team_id {
            change.roster |= self.default_team.as_ref() != Some(&default_team);
            self.default_team = Some(default_team);
        }
        change
    }

    pub fn replace_markers(&mut self, sites: &[SiteMarker]) {
        self.site_markers = sites
            .iter()
            .map(|site| (site.coord(), site.team.clone()))
            .collect();
    }

    /// Merge incremental marker updates over the known set.
    pub fn update_markers(&mut self, sites: &[SiteMarker]) {
        for site in sites {
            self.site_markers.insert(site.coord(), site.team.clone());
        }
    }

    pub fn statics(&self) -> &Arc<StaticData> {
        &self.statics
    }

    pub fn teams(&self) -> &TeamRoster {
        &self.teams
    }

    pub fn teams_mut(&mut self) -> &mut TeamRoster {
        &mut self.teams
    }

    pub fn default_team(&self) -> Option<&TeamId> {
        self.default_team.as_ref()
    }

    pub fn site_markers(&self) -> &BTreeMap<Coord, Option<TeamId>> {
        &self.site_markers
    }

    pub fn marker_at(&self, coord: Coord) -> Option<Option<&TeamId>> {
        self.site_markers.get(&coord).map(Option::as_ref)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use realm_proto::Team;

    fn roster(ids: &[&str]) -> TeamRoster {
        ids.iter()
            .map(|id| {
                (
                    TeamId::new(*id),
                    Team {
                        id: TeamId::new(*id),
                        name: id.to_uppercase(),
                        ..Team::default()
                    },
                )
            })
            .collect()
    }

    #[test]
    fn full_payload_loads_templates_and_markers() {
        let mut cache = StaticDataCache::new();
        let change = cache.absorb(StaticDataPayload {
            biome_map: Some(BTreeMap::from([("1,2".to_string(), "forest".to_string())])),
            building_templates: Some(BTreeMap::new()),
            construction_sites: Some(vec![SiteMarker {
                x: 1,
                y: 2,
                team: Some(TeamId::new("t1")),
            }]),
            teams: Some(roster(&["t1"])),
            noobs_team_id: Some(TeamId::new("noobs")),
            ..StaticDataPayload::default()
        });
        assert_eq!(
            change,
            StaticChange {
                templates: true,
                roster: true
            }
        );
        assert!(cache.is_loaded());
        assert_eq!(cache.statics().biome_at(Coord::new(1, 2)), Some("forest"));
        assert_eq!(
            cache.marker_at(Coord::new(1, 2)),
            Some(Some(&TeamId::new("t1")))
        );
        assert_eq!(cache.default_team(), Some(&TeamId::new("noobs")));
    }

    #[test]
    fn roster_refresh_keeps_templates() {
        let mut cache = StaticDataCache::new();
        cache.absorb(StaticDataPayload {
            biome_map: Some(BTreeMap::from([("0,0".to_string(), "plains".to_string())])),
            building_templates: Some(BTreeMap::new()),
            ..StaticDataPayload::default()
        });
        let change = cache.absorb(StaticDataPayload {
            teams: Some(roster(&["a", "b"])),
            ..StaticDataPayload::default()
        });
        assert!(!change.templates);
        assert!(change.roster);
        assert_eq!(cache.teams().len(), 2);
        assert_eq!(cache.statics().biome_at(Coord::new(0, 0)), Some("plains"));
    }

    #[test]
    fn marker_updates_merge_over_known_sites() {
        let mut cache = StaticDataCache::new();
        let marker = |x, team: &str| SiteMarker {
            x,
            y: 0,
            team: Some(TeamId::new(team)),
        };
        cache.replace_markers(&[marker(1, "a"), marker(2, "b")]);
        cache.update_markers(&[marker(2, "c")]);
        assert_eq!(cache.site_markers().len(), 2);
        assert_eq!(
            cache.marker_at(Coord::new(2, 0)),
            Some(Some(&TeamId::new("c")))
        );
    }
}
