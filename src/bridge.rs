// ABOUTME: Command bridge between concurrent HTTP handlers and the single session context.
// ABOUTME: Jobs cross via an mpsc queue; outcomes return on per-submission oneshot channels.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::LocalBoxFuture;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::gateway::{ChatGateway, CommandError};

/// Uniform deadline for every bridged operation.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Queue depth between HTTP handlers and the session context.
pub const COMMAND_QUEUE_DEPTH: usize = 32;

/// A unit of work marshalled onto the session context. The closure
/// crosses threads; the future it builds is created and polled only on
/// the session context.
type Job = Box<dyn FnOnce(Arc<dyn ChatGateway>) -> LocalBoxFuture<'static, ()> + Send>;

/// Why a bridged submission did not yield a value.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The session has not completed its handshake (or has gone away).
    /// Checked before any work is enqueued.
    #[error("session is not ready")]
    NotReady,
    /// The session context terminated; no operation can be served.
    #[error("session is closed")]
    SessionClosed,
    /// The deadline elapsed. The underlying work is NOT cancelled; it
    /// runs to completion on the session context and its result is
    /// discarded.
    #[error("command timed out")]
    Timeout,
    /// The work itself raised a domain or platform failure.
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Shared readiness flag, set by the session's ready callback and
/// cleared when the session exits.
#[derive(Debug, Clone, Default)]
pub struct SessionReadiness(Arc<AtomicBool>);

impl SessionReadiness {
    pub fn set(&self, ready: bool) {
        self.0.store(ready, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Create a connected bridge/receiver pair.
///
/// The `CommandBridge` half lives with the HTTP handlers; the
/// `CommandReceiver` half is consumed by the session context's job pump.
/// `timeout` is injectable for tests; production uses [`COMMAND_TIMEOUT`].
pub fn channel(capacity: usize, timeout: Duration) -> (CommandBridge, CommandReceiver) {
    let (tx, rx) = mpsc::channel::<Job>(capacity);
    let bridge = CommandBridge {
        tx,
        readiness: SessionReadiness::default(),
        timeout,
    };
    (bridge, CommandReceiver { rx })
}

/// Caller-side handle: submit work to the session context and await the
/// outcome with a bounded deadline.
#[derive(Clone)]
pub struct CommandBridge {
    tx: mpsc::Sender<Job>,
    readiness: SessionReadiness,
    timeout: Duration,
}

impl CommandBridge {
    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    /// Handle to the shared readiness flag, for the session runtime (and
    /// tests) to flip.
    pub fn readiness(&self) -> SessionReadiness {
        self.readiness.clone()
    }

    /// Submit a unit of work and wait for its terminal state.
    ///
    /// Work begins executing only on the session context, in submission
    /// order relative to other queued work. A timed-out caller stops
    /// waiting but the work keeps running; its eventual result is
    /// discarded.
    pub async fn submit<T, F, Fut>(&self, op: &'static str, work: F) -> Result<T, BridgeError>
    where
        F: FnOnce(Arc<dyn ChatGateway>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, CommandError>> + 'static,
        T: Send + 'static,
    {
        if !self.readiness.is_ready() {
            return Err(BridgeError::NotReady);
        }

        let (done_tx, done_rx) = oneshot::channel::<Result<T, CommandError>>();
        let job: Job = Box::new(move |gateway| {
            Box::pin(async move {
                let result = work(gateway).await;
                if done_tx.send(result).is_err() {
                    tracing::debug!(op, "caller stopped waiting; discarding command result");
                }
            })
        });

        if self.tx.send(job).await.is_err() {
            tracing::error!(op, "session job queue closed; session context is gone");
            return Err(BridgeError::SessionClosed);
        }

        match tokio::time::timeout(self.timeout, done_rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(err))) => Err(BridgeError::Command(err)),
            Ok(Err(_)) => {
                tracing::error!(op, "session dropped the completion channel");
                Err(BridgeError::SessionClosed)
            }
            Err(_) => {
                tracing::warn!(
                    op,
                    timeout_secs = self.timeout.as_secs(),
                    "command deadline elapsed; work continues on the session context"
                );
                Err(BridgeError::Timeout)
            }
        }
    }
}

impl std::fmt::Debug for CommandBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBridge")
            .field("ready", &self.readiness.is_ready())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Session-side half: pumps queued jobs onto the session context.
pub struct CommandReceiver {
    rx: mpsc::Receiver<Job>,
}

impl CommandReceiver {
    /// Run the job pump until every bridge handle is dropped.
    ///
    /// Jobs are started in FIFO arrival order. Each is spawned as a
    /// local task so work items interleave only at their own await
    /// points; must be called from within a `tokio::task::LocalSet`.
    pub async fn drive(mut self, gateway: Arc<dyn ChatGateway>) {
        while let Some(job) = self.rx.recv().await {
            tokio::task::spawn_local(job(Arc::clone(&gateway)));
        }
        tracing::debug!("command queue closed; job pump exiting");
    }
}
