//! Application state shared across routes

use std::sync::Arc;

use tokio::sync::watch;

use crate::config::Config;
use crate::game::{Arena, MessageRouter};

use super::Shutdown;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub router: Arc<MessageRouter>,
    pub shutdown: Shutdown,
    open_sockets: Arc<watch::Sender<usize>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // One arena per process
        let arena = Arc::new(Arena::new(config.game.clone()));
        let router = Arc::new(MessageRouter::new(arena));

        Self {
            config,
            router,
            shutdown: Shutdown::new(),
            open_sockets: Arc::new(watch::Sender::new(0)),
        }
    }

    pub fn arena(&self) -> &Arc<Arena> {
        self.router.arena()
    }

    /// WebSocket tasks currently running, registered or not
    pub fn open_sockets(&self) -> usize {
        *self.open_sockets.borrow()
    }

    /// Follow the open-socket count as it changes
    pub fn watch_open_sockets(&self) -> watch::Receiver<usize> {
        self.open_sockets.subscribe()
    }

    /// Count a socket task for as long as the guard lives
    pub fn track_socket(&self) -> SocketGuard {
        self.open_sockets.send_modify(|count| *count += 1);
        SocketGuard {
            open_sockets: self.open_sockets.clone(),
        }
    }
}

pub struct SocketGuard {
    open_sockets: Arc<watch::Sender<usize>>,
}

impl Drop for SocketGuard {
    fn drop(&mut self) {
        self.open_sockets.send_modify(|count| *count -= 1);
    }
}
