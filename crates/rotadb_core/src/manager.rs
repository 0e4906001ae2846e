//! Connection manager: one live connection per team, lazily opened.
//!
//! The manager owns the active team id, the connection handle, and the
//! initialization state machine:
//!
//! ```text
//! Uninitialized ──init──▶ Opening ──success──▶ Ready
//!        ▲                   │
//!        └──────failure──────┘        (Ready ──switch/reinit──▶ Uninitialized)
//! ```
//!
//! `Opening` is a single-slot in-flight guard: the first caller drives the
//! physical open while every concurrent caller parks on the same waiter and
//! receives the same settled result. Exactly one physical open happens per
//! attempt, no matter how many callers race into `init`.

use crate::config::ManagerConfig;
use crate::error::CoreResult;
use crate::migration;
use crate::notify::{ChangeAction, ChangeEvent, NotificationBus, Subscription};
use crate::types::TeamId;
use parking_lot::{Condvar, Mutex};
use rotadb_storage::{Database, LegacyKv, StoreEngine};
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// Result of one open attempt, shared with every coalesced caller.
struct OpenWaiter {
    result: Mutex<Option<CoreResult<Arc<Database>>>>,
    settled: Condvar,
}

impl OpenWaiter {
    fn new() -> Self {
        Self {
            result: Mutex::new(None),
            settled: Condvar::new(),
        }
    }

    /// Blocks until the attempt settles and returns its result.
    fn wait(&self) -> CoreResult<Arc<Database>> {
        let mut result = self.result.lock();
        loop {
            if let Some(settled) = result.as_ref() {
                return settled.clone();
            }
            self.settled.wait(&mut result);
        }
    }

    fn publish(&self, result: &CoreResult<Arc<Database>>) {
        *self.result.lock() = Some(result.clone());
        self.settled.notify_all();
    }
}

enum ConnState {
    /// No connection; the next `init` drives an open.
    Uninitialized,
    /// An open is in flight; callers park on the waiter.
    Opening(Arc<OpenWaiter>),
    /// The connection is live.
    Ready(Arc<Database>),
}

struct ManagerState {
    team: TeamId,
    conn: ConnState,
}

/// Per-team database manager.
///
/// The manager keeps at most one live connection, to the active team's
/// physical database, and lazily opens it on first use. Construct one at
/// the composition root and share it; [`shared`] exists only as a
/// convenience wrapper around a default-configured instance.
///
/// # Example
///
/// ```rust
/// use rotadb_core::{DatabaseManager, ManagerConfig, TeamId};
/// use serde_json::json;
///
/// let manager = DatabaseManager::new(ManagerConfig::default()).unwrap();
/// manager.save("roles", json!({"name": "Operator"})).unwrap();
/// assert_eq!(manager.current_team_id(), TeamId::new(0));
/// ```
pub struct DatabaseManager {
    config: ManagerConfig,
    engine: StoreEngine,
    legacy: LegacyKv,
    bus: NotificationBus,
    state: Mutex<ManagerState>,
}

impl DatabaseManager {
    /// Creates a manager over the configured backend. Team 0 is active
    /// until the first switch; no connection is opened yet.
    pub fn new(config: ManagerConfig) -> CoreResult<Self> {
        let engine = StoreEngine::new(Arc::clone(&config.backend));
        let legacy = LegacyKv::open(Arc::clone(&config.backend))?;
        Ok(Self {
            config,
            engine,
            legacy,
            bus: NotificationBus::new(),
            state: Mutex::new(ManagerState {
                team: TeamId::default(),
                conn: ConnState::Uninitialized,
            }),
        })
    }

    /// Returns the manager's configuration.
    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Returns the currently active team.
    #[must_use]
    pub fn current_team_id(&self) -> TeamId {
        self.state.lock().team
    }

    /// Returns the ready connection for the requested (or current) team.
    ///
    /// Requesting a team other than the active one delegates to
    /// [`Self::switch_team`]. When already initialized for the requested
    /// team this returns immediately without reopening. Concurrent callers
    /// during an in-flight open all receive the same result; a failed
    /// attempt clears the in-flight slot so the next call may retry.
    pub fn init(&self, team: Option<TeamId>) -> CoreResult<Arc<Database>> {
        if let Some(team) = team {
            if team != self.current_team_id() {
                return self.switch_team(team);
            }
        }

        enum Role {
            Wait(Arc<OpenWaiter>),
            Drive(Arc<OpenWaiter>, TeamId),
        }

        let role = {
            let mut state = self.state.lock();
            match &state.conn {
                ConnState::Ready(db) => return Ok(Arc::clone(db)),
                ConnState::Opening(waiter) => Role::Wait(Arc::clone(waiter)),
                ConnState::Uninitialized => {
                    let waiter = Arc::new(OpenWaiter::new());
                    state.conn = ConnState::Opening(Arc::clone(&waiter));
                    Role::Drive(waiter, state.team)
                }
            }
        };

        match role {
            Role::Wait(waiter) => waiter.wait(),
            Role::Drive(waiter, team) => {
                let result = self.open_team_database(team);
                {
                    let mut state = self.state.lock();
                    // Settle the slot only if it is still ours; a concurrent
                    // switch may have reset it out from under this attempt.
                    let ours = matches!(
                        &state.conn,
                        ConnState::Opening(current) if Arc::ptr_eq(current, &waiter)
                    );
                    if ours {
                        state.conn = match &result {
                            Ok(db) => ConnState::Ready(Arc::clone(db)),
                            Err(_) => ConnState::Uninitialized,
                        };
                    }
                }
                waiter.publish(&result);
                result
            }
        }
    }

    /// Opens the team's physical database at the expected schema version,
    /// running structural migration during the upgrade and the best-effort
    /// data backfill right after.
    fn open_team_database(&self, team: TeamId) -> CoreResult<Arc<Database>> {
        let name = self.config.database_name(team);
        info!(%team, db = %name, "initializing team database");

        let mut upgraded_from = None;
        let db = self
            .engine
            .open(&name, self.config.schema_version, |ctx, old, new| {
                upgraded_from = Some(old);
                migration::create_missing_structures(ctx, old, new)
            })?;
        let db = Arc::new(db);

        if let Some(from_version) = upgraded_from {
            if let Err(e) = migration::backfill_data(self, &db, team, from_version) {
                warn!(%team, error = %e, "migration data step failed, continuing");
            }
        }

        Ok(db)
    }

    /// Returns the ready connection for the current team, initializing it
    /// if needed. The façade entry point.
    pub(crate) fn connection(&self) -> CoreResult<Arc<Database>> {
        self.init(None)
    }

    /// If the manager is Ready on `team`, returns the live connection.
    pub(crate) fn ready_connection(&self, team: TeamId) -> Option<Arc<Database>> {
        let state = self.state.lock();
        if state.team == team {
            if let ConnState::Ready(db) = &state.conn {
                return Some(Arc::clone(db));
            }
        }
        None
    }

    /// Resets connection state for a switch to `team`; returns the previous
    /// team and, if one was live, its connection for the caller to close.
    pub(crate) fn reset_for_switch(&self, team: TeamId) -> (TeamId, Option<Arc<Database>>) {
        let mut state = self.state.lock();
        let old_team = state.team;
        state.team = team;
        let old = match std::mem::replace(&mut state.conn, ConnState::Uninitialized) {
            ConnState::Ready(db) => Some(db),
            _ => None,
        };
        (old_team, old)
    }

    /// Drops the connection state back to Uninitialized; returns the live
    /// connection, if any, for the caller to close.
    pub(crate) fn take_connection(&self) -> Option<Arc<Database>> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut state.conn, ConnState::Uninitialized) {
            ConnState::Ready(db) => Some(db),
            _ => None,
        }
    }

    pub(crate) fn engine(&self) -> &StoreEngine {
        &self.engine
    }

    pub(crate) fn legacy(&self) -> &LegacyKv {
        &self.legacy
    }

    pub(crate) fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    /// Registers a listener for one store's events.
    pub fn subscribe<F>(&self, store: &str, callback: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(store, callback)
    }

    /// Delivers an event to the store's listeners, stamped with the active
    /// team. Mutating operations call this on success; it is public so
    /// collaborators can push synthetic refreshes.
    pub fn notify(&self, store: &str, action: ChangeAction, data: Option<Value>) {
        let event = ChangeEvent {
            store_name: store.to_string(),
            action,
            data,
            team_id: self.current_team_id(),
        };
        debug!(store, action = %event.action, "notifying listeners");
        self.bus.emit(&event);
    }
}

impl std::fmt::Debug for DatabaseManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseManager")
            .field("team", &self.current_team_id())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Returns the process-wide default manager.
///
/// This is a convenience wrapper over `DatabaseManager::new(ManagerConfig::default())`
/// for sketches and tools; real applications should construct and inject
/// their own instance (with a persistent backend) at the composition root.
pub fn shared() -> &'static DatabaseManager {
    static SHARED: OnceLock<DatabaseManager> = OnceLock::new();
    SHARED.get_or_init(|| {
        DatabaseManager::new(ManagerConfig::default())
            .expect("constructing the in-memory default manager cannot fail")
    })
}
