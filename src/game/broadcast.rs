//! Fixed-rate position broadcast

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, trace, warn};

use super::arena::Arena;
use crate::util::time::tick_duration;
use crate::ws::protocol::{encode, MessageKind, PlayerList};

/// Pushes every participant's state to every connection on a fixed cadence
pub struct BroadcastScheduler {
    arena: Arc<Arena>,
    period: Duration,
}

impl BroadcastScheduler {
    pub fn new(arena: Arc<Arena>, hz: u32) -> Self {
        Self {
            arena,
            period: tick_duration(hz),
        }
    }

    /// Run until `shutdown` resolves
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        info!(period_us = self.period.as_micros() as u64, "Broadcast scheduler started");

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.tick();
                }
            }
        }

        info!("Broadcast scheduler stopped");
    }

    /// One broadcast: snapshot, encode once, send to everyone.
    /// Returns how many connections accepted the frame.
    pub fn tick(&self) -> usize {
        let mut players = 0;
        let delivered = self.arena.connections().broadcast_built(|| {
            // Participant lock is released before encoding
            let snapshot = self.arena.snapshot();
            players = snapshot.len();
            match encode(MessageKind::PollLocations, &PlayerList::from_snapshot(&snapshot)) {
                Ok(frame) => Some(frame),
                Err(e) => {
                    warn!(error = %e, "Failed to encode position snapshot");
                    None
                }
            }
        });
        trace!(players, delivered, "Position broadcast");
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::connection::{Connection, Outgoing};
    use crate::ws::protocol::{decode, split_frame};

    /// Clients read snapshots bigger than the inbound limit
    fn decode_unbounded<T: serde::de::DeserializeOwned>(payload: &[u8]) -> T {
        use bincode::Options;
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .deserialize(payload)
            .unwrap()
    }

    fn arena() -> Arc<Arena> {
        Arc::new(Arena::new(GameConfig {
            seed: Some(3),
            ..GameConfig::default()
        }))
    }

    #[test]
    fn tick_sends_identical_snapshot_to_all() {
        let arena = arena();
        let (a, mut outbox_a) = Connection::channel(8);
        let (b, mut outbox_b) = Connection::channel(8);
        arena.register(&a, "Alice", "red").unwrap();
        arena.register(&b, "Bob", "blue").unwrap();
        while outbox_a.try_recv().is_some() {}
        while outbox_b.try_recv().is_some() {}

        let scheduler = BroadcastScheduler::new(arena, 60);
        assert_eq!(scheduler.tick(), 2);

        let fa = outbox_a.try_recv().unwrap();
        let fb = outbox_b.try_recv().unwrap();
        assert_eq!(fa, fb);
        let (kind, payload) = split_frame(&fa).unwrap();
        assert_eq!(kind, MessageKind::PollLocations);
        assert_eq!(decode::<PlayerList>(payload).unwrap().players.len(), 2);
    }

    #[test]
    fn departed_participant_leaves_the_snapshot() {
        let arena = arena();
        let (a, _outbox_a) = Connection::channel(8);
        let (b, mut outbox_b) = Connection::channel(8);
        let alice = arena.register(&a, "Alice", "red").unwrap();
        arena.register(&b, "Bob", "blue").unwrap();
        arena.disconnect(&a);

        let scheduler = BroadcastScheduler::new(arena, 60);
        assert_eq!(scheduler.tick(), 1);
        let frame = outbox_b.try_recv().unwrap();
        let list: PlayerList = decode(split_frame(&frame).unwrap().1).unwrap();
        assert!(list.players.iter().all(|p| p.id != alice.id));
    }

    #[test]
    fn slow_peer_is_skipped_not_awaited() {
        let arena = arena();
        let (slow, _slow_outbox) = Connection::channel(1);
        let (fast, mut fast_outbox) = Connection::channel(8);
        arena.register(&slow, "Slow", "grey").unwrap();
        arena.register(&fast, "Fast", "gold").unwrap();

        let scheduler = BroadcastScheduler::new(arena, 60);
        scheduler.tick();
        scheduler.tick();
        assert!(fast_outbox.try_recv().is_some());
        assert!(fast_outbox.try_recv().is_some());
    }

    #[test]
    fn large_roster_still_reaches_everyone() {
        let arena = arena();
        let (watcher, mut watcher_box) = Connection::channel(8);
        arena.register(&watcher, "Watcher", "white").unwrap();
        let mut outboxes = Vec::new();
        for i in 0..1_100 {
            let (conn, outbox) = Connection::channel(1);
            arena
                .register(&conn, &format!("participant-{i}"), "teal")
                .unwrap();
            outboxes.push(outbox);
        }
        while watcher_box.try_recv().is_some() {}
        for outbox in &mut outboxes {
            while outbox.try_recv().is_some() {}
        }

        let scheduler = BroadcastScheduler::new(arena, 60);
        assert_eq!(scheduler.tick(), 1_101);

        let frame = watcher_box.try_recv().expect("snapshot for the watcher");
        let list: PlayerList = decode_unbounded(split_frame(&frame).unwrap().1);
        assert_eq!(list.players.len(), 1_101);
    }

    #[test]
    fn nobody_connected_sends_nothing() {
        let scheduler = BroadcastScheduler::new(arena(), 60);
        assert_eq!(scheduler.tick(), 0);
    }

    #[tokio::test]
    async fn absurd_rate_keeps_running() {
        let task = tokio::spawn(BroadcastScheduler::new(arena(), 2_000_000).run(std::future::pending()));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!task.is_finished());
        task.abort();
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let arena = arena();
        let (conn, mut outbox) = Connection::channel(64);
        arena.register(&conn, "Alice", "red").unwrap();

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(BroadcastScheduler::new(arena, 200).run(async {
            let _ = stop_rx.await;
        }));

        let first = tokio::time::timeout(Duration::from_secs(2), outbox.next())
            .await
            .expect("a tick within two seconds");
        assert!(matches!(first, Some(Outgoing::Frame(_))));

        stop_tx.send(()).unwrap();
        tokio_test::assert_ok!(tokio::time::timeout(Duration::from_secs(2), task).await);
    }
}
