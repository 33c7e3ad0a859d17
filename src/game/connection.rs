//! Send-capable connection handle handed to the core by the transport

use std::fmt;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

use super::PlayerId;

/// Transport-level identity of a connection, for logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Why a frame could not be queued for a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("outbound queue full")]
    Full,

    #[error("connection closed")]
    Closed,
}

/// Per-connection session slot. The participant id is bound at most once.
#[derive(Debug, Default)]
pub struct Session {
    player_id: OnceLock<PlayerId>,
}

impl Session {
    /// Bind `id` to this connection. Fails with the existing id if already bound.
    pub fn bind(&self, id: PlayerId) -> Result<(), PlayerId> {
        match self.player_id.set(id) {
            Ok(()) => Ok(()),
            Err(rejected) => Err(self.player_id().unwrap_or(rejected)),
        }
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        self.player_id.get().copied()
    }
}

/// Write side of a connection.
///
/// Frames go into a bounded queue drained by the transport's writer task,
/// so `send` never waits on a slow peer.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    frames: mpsc::Sender<Bytes>,
    close: Arc<Notify>,
    session: Session,
}

/// Read side of a connection, owned by the transport's writer task
#[derive(Debug)]
pub struct Outbox {
    frames: mpsc::Receiver<Bytes>,
    close: Arc<Notify>,
}

impl Connection {
    /// New handle plus the outbox the transport drains. `capacity` must be nonzero.
    pub fn channel(capacity: usize) -> (Arc<Self>, Outbox) {
        let (frames_tx, frames_rx) = mpsc::channel(capacity.max(1));
        let close = Arc::new(Notify::new());
        let conn = Arc::new(Self {
            id: ConnectionId::new(),
            frames: frames_tx,
            close: close.clone(),
            session: Session::default(),
        });
        (
            conn,
            Outbox {
                frames: frames_rx,
                close,
            },
        )
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Queue a frame for this peer
    pub fn send(&self, frame: Bytes) -> Result<(), SendError> {
        self.frames.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }

    /// Ask the writer to close the socket
    pub fn close(&self) {
        self.close.notify_one();
    }
}

/// What the writer task should do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Frame(Bytes),
    Close,
}

impl Outbox {
    /// Next queued frame or a close request; `None` once every handle is dropped.
    /// A pending close wins over queued frames.
    pub async fn next(&mut self) -> Option<Outgoing> {
        tokio::select! {
            biased;
            _ = self.close.notified() => Some(Outgoing::Close),
            frame = self.frames.recv() => frame.map(Outgoing::Frame),
        }
    }

    /// Queued frame if one is ready right now
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.frames.try_recv().ok()
    }
}
