//! Connection registry: participant id -> live connection handle

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{RwLock, RwLockWriteGuard};
use tracing::warn;

use super::connection::Connection;
use super::PlayerId;

/// Registry of connections bound to a participant.
///
/// Iteration works on a copy of the handle list, so callbacks (and the
/// sends inside them) run with the lock released.
#[derive(Default)]
pub struct ConnectionRegistry {
    conns: RwLock<HashMap<PlayerId, Arc<Connection>>>,
}

/// Exclusive access for compound updates spanning several stores
pub struct ConnectionsMut<'a> {
    conns: RwLockWriteGuard<'a, HashMap<PlayerId, Arc<Connection>>>,
}

impl ConnectionsMut<'_> {
    pub fn add(&mut self, id: PlayerId, conn: Arc<Connection>) {
        self.conns.insert(id, conn);
    }

    pub fn remove(&mut self, id: PlayerId) -> Option<Arc<Connection>> {
        self.conns.remove(&id)
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.conns.contains_key(&id)
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&self) -> ConnectionsMut<'_> {
        ConnectionsMut {
            conns: self.conns.write(),
        }
    }

    pub fn add(&self, id: PlayerId, conn: Arc<Connection>) {
        self.write().add(id, conn);
    }

    /// Idempotent; removing an absent id is a no-op
    pub fn remove(&self, id: PlayerId) -> Option<Arc<Connection>> {
        self.write().remove(id)
    }

    pub fn get(&self, id: PlayerId) -> Option<Arc<Connection>> {
        self.conns.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.conns.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.read().is_empty()
    }

    fn handles(&self) -> Vec<(PlayerId, Arc<Connection>)> {
        self.conns
            .read()
            .iter()
            .map(|(id, conn)| (*id, conn.clone()))
            .collect()
    }

    pub fn for_each(&self, mut f: impl FnMut(PlayerId, &Connection)) {
        for (id, conn) in self.handles() {
            f(id, &conn);
        }
    }

    pub fn for_each_except(&self, except: PlayerId, mut f: impl FnMut(PlayerId, &Connection)) {
        self.for_each(|id, conn| {
            if id != except {
                f(id, conn);
            }
        });
    }

    /// Send `frame` to every connection. Returns how many accepted it.
    pub fn broadcast(&self, frame: &Bytes) -> usize {
        let mut delivered = 0;
        self.for_each(|id, conn| delivered += deliver(id, conn, frame));
        delivered
    }

    /// Send `frame` to every connection but `except`'s
    pub fn broadcast_except(&self, except: PlayerId, frame: &Bytes) -> usize {
        let mut delivered = 0;
        self.for_each_except(except, |id, conn| delivered += deliver(id, conn, frame));
        delivered
    }

    /// Build a frame and queue it for every connection without letting a
    /// registration or removal land in between. `build` must not touch the
    /// registry. Queueing never blocks, so holding the read lock is cheap.
    pub fn broadcast_built(&self, build: impl FnOnce() -> Option<Bytes>) -> usize {
        let conns = self.conns.read();
        if conns.is_empty() {
            return 0;
        }
        let Some(frame) = build() else {
            return 0;
        };
        conns
            .iter()
            .map(|(id, conn)| deliver(*id, conn, &frame))
            .sum()
    }

    /// Close every registered connection
    pub fn close_all(&self) {
        self.for_each(|_, conn| conn.close());
    }
}

fn deliver(id: PlayerId, conn: &Connection, frame: &Bytes) -> usize {
    match conn.send(frame.clone()) {
        Ok(()) => 1,
        Err(e) => {
            warn!(player_id = id, conn_id = %conn.id(), error = %e, "Dropping frame for peer");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_get_remove() {
        let registry = ConnectionRegistry::new();
        let (conn, _outbox) = Connection::channel(4);
        registry.add(1, conn.clone());
        assert_eq!(registry.get(1).map(|c| c.id()), Some(conn.id()));
        assert!(registry.remove(1).is_some());
        assert!(registry.remove(1).is_none());
        assert!(registry.get(1).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn broken_peer_does_not_stop_fan_out() {
        let registry = ConnectionRegistry::new();
        let (dead, dead_outbox) = Connection::channel(4);
        let (live_a, mut outbox_a) = Connection::channel(4);
        let (live_b, mut outbox_b) = Connection::channel(4);
        drop(dead_outbox);
        registry.add(1, dead);
        registry.add(2, live_a);
        registry.add(3, live_b);

        let frame = Bytes::from_static(b"\x03tick");
        assert_eq!(registry.broadcast(&frame), 2);
        assert_eq!(outbox_a.try_recv(), Some(frame.clone()));
        assert_eq!(outbox_b.try_recv(), Some(frame));
    }

    #[test]
    fn broadcast_except_skips_one() {
        let registry = ConnectionRegistry::new();
        let (a, mut outbox_a) = Connection::channel(4);
        let (b, mut outbox_b) = Connection::channel(4);
        registry.add(1, a);
        registry.add(2, b);

        assert_eq!(registry.broadcast_except(1, &Bytes::from_static(b"x")), 1);
        assert!(outbox_a.try_recv().is_none());
        assert!(outbox_b.try_recv().is_some());
    }

    #[test]
    fn built_frame_is_skipped_when_nobody_listens() {
        let registry = ConnectionRegistry::new();
        let mut built = false;
        assert_eq!(
            registry.broadcast_built(|| {
                built = true;
                Some(Bytes::new())
            }),
            0
        );
        assert!(!built);
    }

    #[test]
    fn callbacks_may_touch_the_registry() {
        let registry = ConnectionRegistry::new();
        let (a, _outbox) = Connection::channel(4);
        registry.add(1, a);
        registry.for_each(|id, _| {
            registry.remove(id);
        });
        assert!(registry.is_empty());
    }
}
