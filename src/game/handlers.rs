//! Event handlers: one per inbound message kind.
//!
//! Each handler reads or mutates the arena and returns the frames to send.
//! Encoding happens after every store lock has been released.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use super::arena::{Arena, Movement, RegisterError};
use super::combat::{CombatSystem, DamageError};
use super::connection::Connection;
use super::PlayerId;
use crate::ws::protocol::{
    decode, encode, CastNotice, CodecError, DamageRecord, LocationUpdate, MessageKind, PlayerList,
    PlayerRecord, RegisterRequest, Scoreboard,
};

/// Who a frame goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// The connection the request came in on
    Sender,
    All,
    AllExcept(PlayerId),
}

/// One outbound frame and its recipients
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub audience: Audience,
    pub frame: Bytes,
}

impl Dispatch {
    fn new(audience: Audience, frame: Bytes) -> Self {
        Self { audience, frame }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Register(#[from] RegisterError),

    #[error(transparent)]
    Damage(#[from] DamageError),

    #[error("{0:?} is server-to-client only")]
    ServerOnly(MessageKind),
}

pub type HandlerResult = Result<Vec<Dispatch>, HandlerError>;

fn roster(arena: &Arena) -> Result<Bytes, CodecError> {
    let snapshot = arena.snapshot();
    encode(MessageKind::RequestPlayers, &PlayerList::from_snapshot(&snapshot))
}

fn scoreboard(arena: &Arena) -> Result<Bytes, CodecError> {
    let entries = arena.scoreboard();
    encode(MessageKind::RequestScoreboard, &Scoreboard { entries })
}

pub fn request_players(arena: &Arena) -> HandlerResult {
    Ok(vec![Dispatch::new(Audience::Sender, roster(arena)?)])
}

pub fn register(arena: &Arena, conn: &Arc<Connection>, payload: &[u8]) -> HandlerResult {
    let request: RegisterRequest = decode(payload)?;
    let participant = arena.register(conn, &request.name, &request.color)?;

    let own = encode(MessageKind::Register, &PlayerRecord::from(&participant))?;
    Ok(vec![
        Dispatch::new(Audience::Sender, own),
        Dispatch::new(Audience::AllExcept(participant.id), roster(arena)?),
        Dispatch::new(Audience::All, scoreboard(arena)?),
    ])
}

/// Folded into the next periodic broadcast; never answers directly
pub fn update_location(arena: &Arena, payload: &[u8]) -> HandlerResult {
    let update: LocationUpdate = decode(payload)?;
    arena.update_location(
        update.id,
        Movement {
            position: update.position.last().copied(),
            rotation_x: update.rotation_x,
            rotation_y: update.rotation_y,
        },
    );
    Ok(Vec::new())
}

pub fn poll_locations(arena: &Arena) -> HandlerResult {
    let snapshot = arena.snapshot();
    let frame = encode(MessageKind::PollLocations, &PlayerList::from_snapshot(&snapshot))?;
    Ok(vec![Dispatch::new(Audience::Sender, frame)])
}

pub fn damage_player(arena: &Arena, payload: &[u8]) -> HandlerResult {
    let record: DamageRecord = decode(payload)?;
    let damage = CombatSystem::validate_damage(record.damage)?;

    let Some(hit) = arena.damage(record.caster_id, record.target_id, damage) else {
        return Ok(Vec::new());
    };

    let target = PlayerRecord::from(&hit.target);
    let mut out = vec![Dispatch::new(
        Audience::All,
        encode(MessageKind::DamagePlayer, &target)?,
    )];
    if hit.killed {
        out.push(Dispatch::new(
            Audience::All,
            encode(MessageKind::RespawnPlayer, &target)?,
        ));
        out.push(Dispatch::new(Audience::All, scoreboard(arena)?));
    }
    Ok(out)
}

/// Relay a cast to everyone but the caster. The caster is whoever the
/// connection is registered as, whatever the payload claims.
pub fn init_cast(conn: &Connection, payload: &[u8]) -> HandlerResult {
    let notice: CastNotice = decode(payload)?;
    let Some(caster_id) = conn.session().player_id() else {
        return Ok(Vec::new());
    };
    if notice.caster_id != caster_id {
        debug!(caster_id, claimed = notice.caster_id, "Cast notice names another caster");
    }

    let notice = CastNotice {
        caster_id,
        ..notice
    };
    let frame = encode(MessageKind::InitCast, &notice)?;
    Ok(vec![Dispatch::new(Audience::AllExcept(caster_id), frame)])
}

pub fn request_scoreboard(arena: &Arena) -> HandlerResult {
    Ok(vec![Dispatch::new(Audience::Sender, scoreboard(arena)?)])
}

/// Remove the connection's participant and tell everyone left
pub fn disconnect(arena: &Arena, conn: &Connection) -> HandlerResult {
    let Some(departed) = arena.disconnect(conn) else {
        return Ok(Vec::new());
    };

    let notice = encode(MessageKind::PlayerDisconnect, &PlayerRecord::from(&departed))?;
    Ok(vec![
        Dispatch::new(Audience::All, notice),
        Dispatch::new(Audience::All, scoreboard(arena)?),
    ])
}
