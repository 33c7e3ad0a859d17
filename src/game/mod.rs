//! Authoritative arena state and the protocol state machine around it

pub mod arena;
pub mod broadcast;
pub mod combat;
pub mod connection;
pub mod handlers;
pub mod player;
pub mod registry;
pub mod router;
pub mod scores;
pub mod store;

pub use arena::{Arena, RegisterError};
pub use broadcast::BroadcastScheduler;
pub use connection::{Connection, ConnectionId, Outbox, Outgoing, SendError};
pub use player::{Participant, PlayerId, PlayerState, Position};
pub use router::MessageRouter;
