//! Wire protocol: frame kinds, payload records and the binary codec.
//!
//! A frame is one kind byte followed by a bincode-encoded record.

use bincode::Options;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::game::player::{Participant, PlayerState, Position};
use crate::game::scores::ScoreEntry;
use crate::game::PlayerId;

/// Largest inbound payload the decoder will allocate for
pub const MAX_PAYLOAD_BYTES: u64 = 64 * 1024;

/// Frame kind byte. Ordinals are part of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    RequestPlayers = 0,
    Register = 1,
    UpdateLocation = 2,
    PollLocations = 3,
    DamagePlayer = 4,
    InitCast = 5,
    RespawnPlayer = 6,
    RequestScoreboard = 7,
    PlayerDisconnect = 8,
}

impl TryFrom<u8> for MessageKind {
    type Error = CodecError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Ok(match byte {
            0 => Self::RequestPlayers,
            1 => Self::Register,
            2 => Self::UpdateLocation,
            3 => Self::PollLocations,
            4 => Self::DamagePlayer,
            5 => Self::InitCast,
            6 => Self::RespawnPlayer,
            7 => Self::RequestScoreboard,
            8 => Self::PlayerDisconnect,
            other => return Err(CodecError::UnknownKind(other)),
        })
    }
}

/// Codec failures
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("empty frame")]
    Empty,

    #[error("unknown message kind {0}")]
    UnknownKind(u8),

    #[error("malformed payload: {0}")]
    Payload(#[from] bincode::Error),
}

/// Registration request from a fresh connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub color: String,
}

/// Full participant state as sent to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    /// Only the last element is meaningful
    pub position: Vec<Position>,
    pub rotation_x: f32,
    pub rotation_y: f32,
    pub health: f32,
    pub casting_spell_id: u32,
    pub is_casting: bool,
    pub state: PlayerState,
}

impl From<&Participant> for PlayerRecord {
    fn from(p: &Participant) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            color: p.color.clone(),
            position: vec![p.position],
            rotation_x: p.rotation_x,
            rotation_y: p.rotation_y,
            health: p.health,
            casting_spell_id: p.casting_spell_id,
            is_casting: p.is_casting,
            state: p.state,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerList {
    pub players: Vec<PlayerRecord>,
}

impl PlayerList {
    pub fn from_snapshot(snapshot: &[Participant]) -> Self {
        Self {
            players: snapshot.iter().map(PlayerRecord::from).collect(),
        }
    }
}

/// Movement report from a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdate {
    pub id: PlayerId,
    pub position: Vec<Position>,
    pub rotation_x: f32,
    pub rotation_y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DamageRecord {
    pub caster_id: PlayerId,
    pub target_id: PlayerId,
    pub damage: f32,
}

/// A participant started casting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastNotice {
    pub caster_id: PlayerId,
    pub spell_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scoreboard {
    pub entries: Vec<ScoreEntry>,
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new().with_fixint_encoding()
}

/// Inbound payloads are untrusted, so only the decoder is size-limited.
/// Outbound snapshots grow with the roster and must always encode.
fn inbound_codec() -> impl Options {
    codec().with_limit(MAX_PAYLOAD_BYTES)
}

/// Serialize `record` into a `[kind][payload]` frame
pub fn encode<T: Serialize>(kind: MessageKind, record: &T) -> Result<Bytes, CodecError> {
    let payload = codec().serialize(record)?;
    let mut frame = BytesMut::with_capacity(1 + payload.len());
    frame.put_u8(kind as u8);
    frame.put_slice(&payload);
    Ok(frame.freeze())
}

/// Split a frame into its kind and payload bytes
pub fn split_frame(frame: &[u8]) -> Result<(MessageKind, &[u8]), CodecError> {
    let (&kind, payload) = frame.split_first().ok_or(CodecError::Empty)?;
    Ok((MessageKind::try_from(kind)?, payload))
}

/// Decode a kind-specific payload
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, CodecError> {
    Ok(inbound_codec().deserialize(payload)?)
}
