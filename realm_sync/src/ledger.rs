//! Persistent client-side ids for the buildings of the viewer's site.
//!
//! The authority addresses buildings by array index, which shifts whenever a
//! building is inserted ahead of another. Views bind to a [`BuildingId`]; the
//! index is looked up again only when a command goes out.

use std::collections::BTreeMap;
use std::fmt;

use realm_proto::{Building, EntityId, SiteState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BuildingId(u64);

impl BuildingId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BuildingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum BuildingKey {
    Wire(String),
    Named { name: String, occurrence: usize },
}

#[derive(Debug, Default)]
pub struct BuildingLedger {
    site: Option<EntityId>,
    next_id: u64,
    ids: BTreeMap<BuildingKey, BuildingId>,
    slots: Vec<BuildingId>,
}

impl BuildingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-key against the site's current building list. Passing `None`, or a
    /// different site, drops every id.
    pub fn sync(&mut self, site: Option<&SiteState>) {
        let Some(site) = site else {
            if self.site.is_some() {
                tracing::debug!(target: "realm::ledger", "ledger.cleared");
            }
            self.clear();
            return;
        };
        if self.site.as_ref() != Some(&site.id) {
            self.clear();
            self.site = Some(site.id.clone());
        }

        let mut occurrences: BTreeMap<&str, usize> = BTreeMap::new();
        let mut ids = BTreeMap::new();
        let mut slots = Vec::with_capacity(site.buildings.len());
        for building in &site.buildings {
            let key = key_for(building, &mut occurrences);
            let id = match self.ids.get(&key) {
                Some(id) => *id,
                None => {
                    self.next_id += 1;
                    BuildingId(self.next_id)
                }
            };
            slots.push(id);
            ids.insert(key, id);
        }
        self.ids = ids;
        self.slots = slots;
    }

    pub fn clear(&mut self) {
        self.site = None;
        self.ids.clear();
        self.slots.clear();
    }

    /// Current wire index of a building.
    pub fn slot(&self, id: BuildingId) -> Option<usize> {
        self.slots.iter().position(|candidate| *candidate == id)
    }

    pub fn id_at(&self, index: usize) -> Option<BuildingId> {
        self.slots.get(index).copied()
    }

    /// Ids in wire order.
    pub fn ids(&self) -> impl Iterator<Item = BuildingId> + '_ {
        self.slots.iter().copied()
    }

    pub fn resolve<'a>(&self, id: BuildingId, site: &'a SiteState) -> Option<(usize, &'a Building)> {
        let index = self.slot(id)?;
        site.buildings.get(index).map(|building| (index, building))
    }
}

fn key_for<'a>(building: &'a Building, occurrences: &mut BTreeMap<&'a str, usize>) -> BuildingKey {
    if let Some(id) = building.wire_id() {
        return BuildingKey::Wire(id.to_string());
    }
    let occurrence = occurrences.entry(building.name()).or_insert(0);
    let key = BuildingKey::Named {
        name: building.name().to_string(),
        occurrence: *occurrence,
    };
    *occurrence += 1;
    key
}
