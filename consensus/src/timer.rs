//! The per-round deadline after which the engine stops waiting for agreement.

use tokio::task::JoinHandle;
use tracing::debug;

use crate::{
    service::{Event, WeakYacHandle},
    types::{Round, TimeDiff},
};

/// A single-shot timer.
///
/// At most one expiry is pending at any time: `start` replaces a pending expiry, `deny` cancels
/// it. When it fires, the engine's `on_timeout` must be called with the round it was started for.
pub trait Timer {
    /// Arms the timer to expire for `round` after `timeout`.
    fn start(&mut self, round: Round, timeout: TimeDiff);

    /// Cancels the pending expiry, if any.
    fn deny(&mut self);
}

/// A `Timer` posting `Event::Timeout` to a service mailbox from a sleeping tokio task.
///
/// Must be used from within a tokio runtime. The timer holds a weak handle, so it does not keep
/// the service it belongs to running.
#[derive(Debug)]
pub struct TokioTimer {
    handle: WeakYacHandle,
    pending: Option<JoinHandle<()>>,
}

impl TokioTimer {
    pub fn new(handle: WeakYacHandle) -> Self {
        TokioTimer {
            handle,
            pending: None,
        }
    }
}

impl Timer for TokioTimer {
    fn start(&mut self, round: Round, timeout: TimeDiff) {
        self.deny();
        let handle = self.handle.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout.into()).await;
            debug!(%round, "round timer expired");
            handle.send(Event::Timeout(round));
        }));
    }

    fn deny(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        self.deny();
    }
}
