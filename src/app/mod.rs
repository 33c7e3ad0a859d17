//! Application wiring: shared state, shutdown and the serve loop

pub mod shutdown;
pub mod state;

pub use shutdown::Shutdown;
pub use state::AppState;

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::game::BroadcastScheduler;
use crate::http::build_router;

/// Serve HTTP/WebSocket traffic and run the broadcast scheduler until
/// `state.shutdown` fires.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    let scheduler = BroadcastScheduler::new(state.arena().clone(), state.config.broadcast_hz);
    let scheduler_shutdown = state.shutdown.clone();
    let scheduler_task =
        tokio::spawn(scheduler.run(async move { scheduler_shutdown.wait().await }));

    let router = build_router(state.clone());
    let shutdown = state.shutdown.clone();
    let result = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.wait().await })
    .await;

    // Stop the scheduler even when serving failed on its own
    state.shutdown.trigger();
    join_scheduler(scheduler_task).await;

    info!("Listener stopped");
    result
}

/// Wait for the scheduler task, reporting a panic or abort. Returns whether it stopped cleanly.
async fn join_scheduler(task: JoinHandle<()>) -> bool {
    match task.await {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "Broadcast scheduler task failed");
            false
        }
    }
}

/// Wait up to `grace` for every socket task to finish. Returns whether they all did.
pub async fn drain(state: &AppState, grace: Duration) -> bool {
    let mut open = state.watch_open_sockets();
    let drained = tokio::time::timeout(grace, open.wait_for(|count| *count == 0))
        .await
        .is_ok();
    drained
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scheduler_panic_is_reported() {
        let task = tokio::spawn(async {
            panic!("tick blew up");
        });
        assert!(!join_scheduler(task).await);
    }

    #[tokio::test]
    async fn clean_scheduler_exit() {
        assert!(join_scheduler(tokio::spawn(async {})).await);
    }
}
