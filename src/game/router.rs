//! Message router: decodes the kind byte of each inbound frame, runs the
//! matching handler and fans the resulting frames out.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::arena::Arena;
use super::connection::Connection;
use super::handlers::{self, Audience, Dispatch, HandlerError, HandlerResult};
use crate::ws::protocol::{split_frame, MessageKind};

/// Entry points the transport calls for every connection event
pub struct MessageRouter {
    arena: Arc<Arena>,
}

impl MessageRouter {
    pub fn new(arena: Arc<Arena>) -> Self {
        Self { arena }
    }

    pub fn arena(&self) -> &Arc<Arena> {
        &self.arena
    }

    pub fn on_open(&self, conn: &Connection) {
        debug!(conn_id = %conn.id(), "Connection opened, awaiting registration");
    }

    /// Handle one inbound frame. Never fails; bad frames are logged and dropped.
    pub fn on_message(&self, conn: &Arc<Connection>, frame: &[u8]) {
        let (kind, payload) = match split_frame(frame) {
            Ok(split) => split,
            Err(e) => {
                warn!(conn_id = %conn.id(), error = %e, "Dropping frame");
                return;
            }
        };

        match self.dispatch(conn, kind, payload) {
            Ok(out) => self.deliver(conn, out),
            Err(e) => {
                warn!(
                    conn_id = %conn.id(),
                    player_id = ?conn.session().player_id(),
                    ?kind,
                    error = %e,
                    "Dropping frame"
                );
            }
        }
    }

    pub fn on_close(&self, conn: &Connection, reason: &str) {
        info!(
            conn_id = %conn.id(),
            player_id = ?conn.session().player_id(),
            reason,
            "Connection closed"
        );
        match handlers::disconnect(&self.arena, conn) {
            Ok(out) => self.deliver(conn, out),
            Err(e) => warn!(conn_id = %conn.id(), error = %e, "Failed to announce departure"),
        }
    }

    fn dispatch(&self, conn: &Arc<Connection>, kind: MessageKind, payload: &[u8]) -> HandlerResult {
        let arena = &self.arena;
        match kind {
            MessageKind::RequestPlayers => handlers::request_players(arena),
            MessageKind::Register => handlers::register(arena, conn, payload),
            MessageKind::UpdateLocation => handlers::update_location(arena, payload),
            MessageKind::PollLocations => handlers::poll_locations(arena),
            MessageKind::DamagePlayer => handlers::damage_player(arena, payload),
            MessageKind::InitCast => handlers::init_cast(conn, payload),
            MessageKind::RequestScoreboard => handlers::request_scoreboard(arena),
            MessageKind::RespawnPlayer | MessageKind::PlayerDisconnect => {
                Err(HandlerError::ServerOnly(kind))
            }
        }
    }

    fn deliver(&self, sender: &Connection, out: Vec<Dispatch>) {
        let registry = self.arena.connections();
        for dispatch in out {
            match dispatch.audience {
                Audience::Sender => {
                    if let Err(e) = sender.send(dispatch.frame) {
                        warn!(conn_id = %sender.id(), error = %e, "Failed to reply");
                    }
                }
                Audience::All => {
                    registry.broadcast(&dispatch.frame);
                }
                Audience::AllExcept(id) => {
                    registry.broadcast_except(id, &dispatch.frame);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::connection::Outbox;
    use crate::game::PlayerId;
    use crate::ws::protocol::{
        decode, encode, DamageRecord, LocationUpdate, PlayerList, PlayerRecord, RegisterRequest,
        Scoreboard,
    };
    use bytes::Bytes;

    fn router() -> MessageRouter {
        MessageRouter::new(Arc::new(Arena::new(GameConfig {
            seed: Some(99),
            ..GameConfig::default()
        })))
    }

    fn drain(outbox: &mut Outbox) -> Vec<Bytes> {
        std::iter::from_fn(|| outbox.try_recv()).collect()
    }

    fn kind_of(frame: &Bytes) -> MessageKind {
        split_frame(frame).unwrap().0
    }

    fn body<T: serde::de::DeserializeOwned>(frame: &Bytes) -> T {
        decode(split_frame(frame).unwrap().1).unwrap()
    }

    fn join(router: &MessageRouter, name: &str, color: &str) -> (Arc<Connection>, Outbox, PlayerId) {
        let (conn, outbox) = Connection::channel(32);
        router.on_open(&conn);
        let frame = encode(
            MessageKind::Register,
            &RegisterRequest {
                name: name.into(),
                color: color.into(),
            },
        )
        .unwrap();
        router.on_message(&conn, &frame);
        let id = conn.session().player_id().expect("registered");
        (conn, outbox, id)
    }

    #[test]
    fn alice_then_bob_registration_flow() {
        let router = router();
        let (_a, mut alice_box, alice) = join(&router, "Alice", "red");

        let frames = drain(&mut alice_box);
        assert_eq!(kind_of(&frames[0]), MessageKind::Register);
        let own: PlayerRecord = body(&frames[0]);
        assert_eq!(own.id, alice);
        assert_eq!(own.health, 100.0);
        assert!(router.arena().spawns().contains(&own.position[0]));
        assert_eq!(kind_of(&frames[1]), MessageKind::RequestScoreboard);
        let board: Scoreboard = body(&frames[1]);
        assert_eq!(board.entries.len(), 1);
        assert_eq!(board.entries[0].score, 0);

        let (_b, mut bob_box, bob) = join(&router, "Bob", "blue");

        let alice_frames = drain(&mut alice_box);
        let roster = alice_frames
            .iter()
            .find(|f| kind_of(f) == MessageKind::RequestPlayers)
            .expect("roster broadcast to Alice");
        let roster: PlayerList = body(roster);
        let mut ids: Vec<_> = roster.players.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        let mut expected = vec![alice, bob];
        expected.sort_unstable();
        assert_eq!(ids, expected);

        let bob_frames = drain(&mut bob_box);
        let own: PlayerRecord = body(&bob_frames[0]);
        assert_eq!(own.id, bob);
        assert_eq!(own.name, "Bob");
        assert!(bob_frames
            .iter()
            .all(|f| kind_of(f) != MessageKind::RequestPlayers));
    }

    #[test]
    fn kill_broadcasts_respawn_and_scoreboard_to_everyone() {
        let router = router();
        let (_a, mut alice_box, alice) = join(&router, "Alice", "red");
        let (b, mut bob_box, bob) = join(&router, "Bob", "blue");
        drain(&mut alice_box);
        drain(&mut bob_box);

        let frame = encode(
            MessageKind::DamagePlayer,
            &DamageRecord {
                caster_id: bob,
                target_id: alice,
                damage: 150.0,
            },
        )
        .unwrap();
        router.on_message(&b, &frame);

        for outbox in [&mut alice_box, &mut bob_box] {
            let frames = drain(outbox);
            let kinds: Vec<_> = frames.iter().map(kind_of).collect();
            assert_eq!(
                kinds,
                vec![
                    MessageKind::DamagePlayer,
                    MessageKind::RespawnPlayer,
                    MessageKind::RequestScoreboard
                ]
            );
            let respawned: PlayerRecord = body(&frames[1]);
            assert_eq!(respawned.id, alice);
            assert_eq!(respawned.health, 100.0);
            let board: Scoreboard = body(&frames[2]);
            let bob_row = board.entries.iter().find(|e| e.player_id == bob).unwrap();
            assert_eq!(bob_row.score, 1);
        }
    }

    #[test]
    fn bad_frames_keep_the_connection_usable() {
        let router = router();
        let (a, mut alice_box, _) = join(&router, "Alice", "red");
        drain(&mut alice_box);

        router.on_message(&a, &[]);
        router.on_message(&a, &[200, 1, 2, 3]);
        router.on_message(&a, &[MessageKind::DamagePlayer as u8, 9]);
        router.on_message(&a, &[MessageKind::RespawnPlayer as u8]);
        assert!(drain(&mut alice_box).is_empty());

        router.on_message(&a, &[MessageKind::PollLocations as u8]);
        let frames = drain(&mut alice_box);
        assert_eq!(frames.len(), 1);
        assert_eq!(kind_of(&frames[0]), MessageKind::PollLocations);
    }

    #[test]
    fn cast_reaches_everyone_but_the_caster() {
        let router = router();
        let (a, mut alice_box, alice) = join(&router, "Alice", "red");
        let (_b, mut bob_box, _) = join(&router, "Bob", "blue");
        drain(&mut alice_box);
        drain(&mut bob_box);

        let frame = encode(
            MessageKind::InitCast,
            &crate::ws::protocol::CastNotice {
                caster_id: alice,
                spell_id: 2,
            },
        )
        .unwrap();
        router.on_message(&a, &frame);

        assert!(drain(&mut alice_box).is_empty());
        let frames = drain(&mut bob_box);
        assert_eq!(frames.len(), 1);
        assert_eq!(kind_of(&frames[0]), MessageKind::InitCast);
    }

    #[test]
    fn update_for_departed_participant_is_silent() {
        let router = router();
        let (a, _alice_box, alice) = join(&router, "Alice", "red");
        let (_b, mut bob_box, _) = join(&router, "Bob", "blue");
        router.on_close(&a, "client closed");
        drain(&mut bob_box);

        let frame = encode(
            MessageKind::UpdateLocation,
            &LocationUpdate {
                id: alice,
                position: vec![],
                rotation_x: 1.0,
                rotation_y: 1.0,
            },
        )
        .unwrap();
        router.on_message(&a, &frame);
        assert!(drain(&mut bob_box).is_empty());
        assert!(router.arena().participants().get(alice).is_none());
    }

    #[test]
    fn close_notifies_the_rest_and_is_idempotent() {
        let router = router();
        let (a, _alice_box, alice) = join(&router, "Alice", "red");
        let (b, mut bob_box, _) = join(&router, "Bob", "blue");
        drain(&mut bob_box);

        router.on_close(&a, "client closed");
        router.on_close(&a, "duplicate close");

        let frames = drain(&mut bob_box);
        let kinds: Vec<_> = frames.iter().map(kind_of).collect();
        assert_eq!(
            kinds,
            vec![MessageKind::PlayerDisconnect, MessageKind::RequestScoreboard]
        );
        let departed: PlayerRecord = body(&frames[0]);
        assert_eq!(departed.id, alice);

        router.on_message(&b, &[MessageKind::RequestPlayers as u8]);
        let roster: PlayerList = body(&drain(&mut bob_box)[0]);
        assert!(roster.players.iter().all(|p| p.id != alice));
    }

    #[test]
    fn unregistered_close_is_quiet() {
        let router = router();
        let (_a, mut alice_box, _) = join(&router, "Alice", "red");
        drain(&mut alice_box);
        let (stranger, _outbox) = Connection::channel(4);
        router.on_close(&stranger, "never registered");
        assert!(drain(&mut alice_box).is_empty());
    }
}
