//! Lifecycle state and graceful shutdown for the consumer loop

use crate::error::{ConsumerError, ConsumerResult};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Where a handle is in its one-shot lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LifecycleState {
    Idle,
    Running,
    Stopped,
}

struct Inner {
    state: LifecycleState,
    token: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

/// One-shot lifecycle controller
///
/// A handle goes idle -> running -> stopped and never back. Shutdown is
/// idempotent and safe to call from any task, including on a handle that
/// was never started.
pub(crate) struct Lifecycle {
    inner: Mutex<Inner>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: LifecycleState::Idle,
                token: None,
                handle: None,
            }),
        }
    }

    /// Launch the loop task exactly once
    ///
    /// `spawn` receives the loop's own token, a child of `parent` so that
    /// either the caller's signal or [`Lifecycle::shutdown`] stops the
    /// loop without cancelling anything else the caller owns.
    pub(crate) fn start<F>(&self, parent: &CancellationToken, spawn: F) -> ConsumerResult<()>
    where
        F: FnOnce(CancellationToken) -> JoinHandle<()>,
    {
        let mut inner = self.inner.lock();
        match inner.state {
            LifecycleState::Running => return Err(ConsumerError::AlreadyRunning),
            LifecycleState::Stopped => return Err(ConsumerError::Stopped),
            LifecycleState::Idle => {}
        }

        let token = parent.child_token();
        let handle = spawn(token.clone());
        inner.state = LifecycleState::Running;
        inner.token = Some(token);
        inner.handle = Some(handle);
        Ok(())
    }

    /// Trigger cancellation without waiting for the loop to finish
    pub(crate) fn cancel(&self) {
        let inner = self.inner.lock();
        if let Some(token) = &inner.token {
            token.cancel();
        }
    }

    /// Stop the loop and wait for its task to finish
    pub(crate) async fn shutdown(&self) -> ConsumerResult<()> {
        let (token, handle) = {
            let mut inner = self.inner.lock();
            if inner.state != LifecycleState::Running {
                inner.state = LifecycleState::Stopped;
                return Ok(());
            }
            inner.state = LifecycleState::Stopped;
            (inner.token.take(), inner.handle.take())
        };

        if let Some(token) = token {
            token.cancel();
        }
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| ConsumerError::Shutdown(e.to_string()))?;
        }

        info!("consumer shutdown complete");
        Ok(())
    }

    pub(crate) fn is_running(&self) -> bool {
        self.inner.lock().state == LifecycleState::Running
    }
}
