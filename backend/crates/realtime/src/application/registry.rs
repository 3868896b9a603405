//! Connection Registry
//!
//! Principal id -> live connection, plus role groups derived from it.
//! One `RwLock` guards both maps so a connection and its group membership
//! always change together. Enumeration returns snapshots taken under the
//! read lock; callers never iterate live state.

use std::collections::{BTreeMap, HashMap, HashSet};

use kernel::clock::SharedClock;
use kernel::id::ConnectionId;
use kernel::principal::{Principal, UserRole};
use parking_lot::RwLock;

use crate::domain::connection::{Connection, ConnectionHandle};

#[derive(Debug, Default)]
struct Inner {
    connections: HashMap<String, Connection>,
    rooms: HashMap<UserRole, HashSet<String>>,
}

impl Inner {
    fn leave_room(&mut self, role: UserRole, principal_id: &str) {
        if let Some(members) = self.rooms.get_mut(&role) {
            members.remove(principal_id);
            if members.is_empty() {
                self.rooms.remove(&role);
            }
        }
    }
}

pub struct ConnectionRegistry {
    inner: RwLock<Inner>,
    clock: SharedClock,
}

impl ConnectionRegistry {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            clock,
        }
    }

    /// Track `handle` for `principal`, replacing any previous connection.
    /// The replaced connection is returned; closing it is the caller's call.
    pub fn register(&self, principal: &Principal, handle: ConnectionHandle) -> Option<Connection> {
        let now = self.clock.now_ms();
        let connection = Connection {
            principal_id: principal.id.clone(),
            role: principal.role,
            handle,
            connected_at: now,
            last_activity: now,
        };

        let mut inner = self.inner.write();
        let previous = inner.connections.insert(principal.id.clone(), connection);
        if let Some(prev) = &previous {
            if prev.role != principal.role {
                inner.leave_room(prev.role, &principal.id);
            }
        }
        inner
            .rooms
            .entry(principal.role)
            .or_default()
            .insert(principal.id.clone());
        previous
    }

    /// Remove whatever connection `principal_id` has; idempotent
    pub fn unregister(&self, principal_id: &str) -> Option<Connection> {
        let mut inner = self.inner.write();
        let removed = inner.connections.remove(principal_id)?;
        inner.leave_room(removed.role, principal_id);
        Some(removed)
    }

    /// Remove the entry only if it still belongs to `conn_id`.
    /// A stale connection closing after a reconnect leaves the new one alone.
    pub fn unregister_connection(&self, principal_id: &str, conn_id: ConnectionId) -> bool {
        let mut inner = self.inner.write();
        let owned = inner
            .connections
            .get(principal_id)
            .is_some_and(|c| c.handle.id() == conn_id);
        if !owned {
            return false;
        }
        if let Some(removed) = inner.connections.remove(principal_id) {
            inner.leave_room(removed.role, principal_id);
        }
        true
    }

    pub fn get(&self, principal_id: &str) -> Option<Connection> {
        self.inner.read().connections.get(principal_id).cloned()
    }

    pub fn members_of(&self, role: UserRole) -> HashSet<String> {
        self.inner
            .read()
            .rooms
            .get(&role)
            .cloned()
            .unwrap_or_default()
    }

    /// Update last activity; false if the principal is not connected
    pub fn touch(&self, principal_id: &str) -> bool {
        let now = self.clock.now_ms();
        match self.inner.write().connections.get_mut(principal_id) {
            Some(connection) => {
                connection.last_activity = now;
                true
            }
            None => false,
        }
    }

    /// Snapshot of `(principal_id, handle)` for one role group
    pub fn handles_in(&self, role: UserRole) -> Vec<(String, ConnectionHandle)> {
        let inner = self.inner.read();
        inner
            .rooms
            .get(&role)
            .into_iter()
            .flatten()
            .filter_map(|id| {
                inner
                    .connections
                    .get(id)
                    .map(|c| (id.clone(), c.handle.clone()))
            })
            .collect()
    }

    /// Snapshot of every registered handle
    pub fn all_handles(&self) -> Vec<(String, ConnectionHandle)> {
        self.inner
            .read()
            .connections
            .iter()
            .map(|(id, c)| (id.clone(), c.handle.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().connections.is_empty()
    }

    /// Connection count per role code
    pub fn counts_by_role(&self) -> BTreeMap<&'static str, usize> {
        self.inner
            .read()
            .rooms
            .iter()
            .map(|(role, members)| (role.code(), members.len()))
            .collect()
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connections", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::clock::ManualClock;
    use std::sync::Arc;
    use std::time::Duration;

    fn registry() -> (ConnectionRegistry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(5_000));
        (ConnectionRegistry::new(clock.clone()), clock)
    }

    fn handle() -> ConnectionHandle {
        ConnectionHandle::channel(8).0
    }

    #[test]
    fn test_register_then_get_returns_same_handle() {
        let (registry, _) = registry();
        let p = Principal::new("u1", UserRole::User);
        let h = handle();
        registry.register(&p, h.clone());

        let conn = registry.get("u1").unwrap();
        assert_eq!(conn.handle, h);
        assert_eq!(conn.role, UserRole::User);
        assert_eq!(conn.connected_at, 5_000);
    }

    #[test]
    fn test_unregister_removes_from_room() {
        let (registry, _) = registry();
        let p = Principal::new("a1", UserRole::Admin);
        registry.register(&p, handle());

        assert!(registry.unregister("a1").is_some());
        assert!(registry.get("a1").is_none());
        assert!(!registry.members_of(UserRole::Admin).contains("a1"));
        assert!(registry.unregister("a1").is_none());
    }

    #[test]
    fn test_reconnect_replaces_without_duplicates() {
        let (registry, _) = registry();
        let p = Principal::new("a1", UserRole::Admin);
        let first = handle();
        registry.register(&p, first.clone());
        let second = handle();
        let replaced = registry.register(&p, second.clone());

        assert_eq!(replaced.map(|c| c.handle), Some(first));
        assert_eq!(registry.get("a1").unwrap().handle, second);
        assert_eq!(registry.members_of(UserRole::Admin).len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reconnect_with_new_role_moves_room() {
        let (registry, _) = registry();
        registry.register(&Principal::new("p", UserRole::User), handle());
        registry.register(&Principal::new("p", UserRole::Admin), handle());
        assert!(registry.members_of(UserRole::User).is_empty());
        assert!(registry.members_of(UserRole::Admin).contains("p"));
    }

    #[test]
    fn test_stale_teardown_keeps_newer_connection() {
        let (registry, _) = registry();
        let p = Principal::new("u1", UserRole::User);
        let old = handle();
        registry.register(&p, old.clone());
        let new = handle();
        registry.register(&p, new.clone());

        assert!(!registry.unregister_connection("u1", old.id()));
        assert_eq!(registry.get("u1").unwrap().handle, new);
        assert!(registry.unregister_connection("u1", new.id()));
        assert!(registry.get("u1").is_none());
    }

    #[test]
    fn test_touch_updates_last_activity() {
        let (registry, clock) = registry();
        registry.register(&Principal::new("u1", UserRole::User), handle());
        clock.advance(Duration::from_secs(3));
        assert!(registry.touch("u1"));
        assert_eq!(registry.get("u1").unwrap().last_activity, 8_000);
        assert!(!registry.touch("ghost"));
    }

    #[test]
    fn test_counts_by_role() {
        let (registry, _) = registry();
        registry.register(&Principal::new("a", UserRole::Admin), handle());
        registry.register(&Principal::new("b", UserRole::User), handle());
        registry.register(&Principal::new("c", UserRole::User), handle());
        let counts = registry.counts_by_role();
        assert_eq!(counts.get("admin"), Some(&1));
        assert_eq!(counts.get("user"), Some(&2));
    }

    #[test]
    fn test_concurrent_register_unregister() {
        let (registry, _) = registry();
        std::thread::scope(|s| {
            for t in 0..8 {
                let registry = &registry;
                s.spawn(move || {
                    for i in 0..200 {
                        let p = Principal::new(format!("p{t}-{i}"), UserRole::User);
                        registry.register(&p, handle());
                        if i % 2 == 0 {
                            registry.unregister(&p.id);
                        }
                    }
                });
            }
        });
        assert_eq!(registry.len(), 8 * 100);
        assert_eq!(registry.members_of(UserRole::User).len(), 8 * 100);
    }
}
