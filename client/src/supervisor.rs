//! Process shutdown coordination
//!
//! Two things can end a player process: an operator interrupt or the session
//! ending on its own (match over, server gone). Both are awaited in a single
//! `select!`; whichever is first decides the shutdown path, and only the
//! interrupt path has to stop the session explicitly.

use crate::connection::{DoneSignal, Session};
use log::{error, info, warn};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPath {
    /// Interrupt arrived first; the session was stopped by us
    Interrupted,
    /// Session ended on its own; no stop was issued
    SessionEnded,
}

/// Blocks until `interrupt` fires or the session ends, then shuts down along
/// the matching path. Cleanup is bounded by `shutdown_timeout`.
pub async fn supervise<I>(
    mut session: Session,
    mut done: DoneSignal,
    interrupt: I,
    shutdown_timeout: Duration,
) -> ShutdownPath
where
    I: Future<Output = ()>,
{
    let path = tokio::select! {
        biased;
        _ = done.done() => {
            info!("Player client stopped");
            ShutdownPath::SessionEnded
        }
        _ = interrupt => {
            warn!("Got interruption signal");
            if let Err(e) = session.stop().await {
                error!("Error stopping the player client: {}", e);
            }
            ShutdownPath::Interrupted
        }
    };

    if timeout(shutdown_timeout, session.join()).await.is_err() {
        warn!(
            "Session cleanup did not finish within {:?}, exiting anyway",
            shutdown_timeout
        );
    }

    info!("Process finished");
    path
}

/// Resolves on the first Ctrl+C. If the handler cannot be installed the
/// future never resolves and only the session can end the process.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Could not listen for the interrupt signal: {}", e);
        std::future::pending::<()>().await;
    }
}
