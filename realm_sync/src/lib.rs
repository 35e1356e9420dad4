//! Snapshot synchronization engine for the realm thin client.
//!
//! A [`ClientContext`] owns the static-data cache, the snapshot store, the
//! building ledger, open view bindings, provisional team records and the
//! scene mode. Feed it decoded [`realm_proto::ServerMessage`]s through
//! [`ClientContext::handle_batch`] and user [`Intent`]s through
//! [`ClientContext::dispatch`]; each returns a [`FrameUpdate`] naming exactly
//! what a frontend has to redraw.

pub mod cache;
pub mod config;
mod context;
mod dispatch;
pub mod ledger;
pub mod optimistic;
pub mod refresh;
pub mod scene;
pub mod store;
pub mod views;

pub use cache::{StaticChange, StaticData, StaticDataCache};
pub use config::{
    load_client_config, ClientConfig, ConfigError, ConfigSource, ProvisionalTeamDefaults,
    WorldBounds,
};
pub use context::{
    coalesce_snapshots, parse_damage_taken, ClientContext, Connectivity, FrameUpdate, Notice,
    SceneRefresh,
};
pub use dispatch::{Direction, Dispatch, DispatchError, Intent};
pub use ledger::{BuildingId, BuildingLedger};
pub use optimistic::{is_provisional, OptimisticBridge, Reconciliation};
pub use refresh::{plan_refresh, DirtySubtrees, RefreshPlan};
pub use scene::{PanelTab, SceneMode, SceneState, ScheduledTask};
pub use store::{GameState, SnapshotStore};
pub use views::{
    EntityPath, ItemPath, Resolved, ViewAction, ViewBinding, ViewKind, ViewScopeRegistry,
    ViewUpdate,
};
