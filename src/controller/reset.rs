use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::session::SessionHandle;
use crate::observability::Metrics;

/// One-shot delayed return to idle after the user retrieved the artifact
///
/// The timer is bound to the generation it was armed for: if the session was
/// reset by hand and a newer job started before it fires, it does nothing.
pub struct ResetScheduler {
    delay: Duration,
    session: SessionHandle,
    metrics: Arc<Metrics>,
    armed: Mutex<Option<(u64, JoinHandle<()>)>>,
}

impl ResetScheduler {
    pub fn new(delay: Duration, session: SessionHandle, metrics: Arc<Metrics>) -> Self {
        Self {
            delay,
            session,
            metrics,
            armed: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm the timer for `generation`
    ///
    /// Returns `false` if a timer for the same generation is already pending.
    /// A pending timer for an older generation is cancelled and replaced.
    pub async fn arm(&self, generation: u64) -> bool {
        let mut armed = self.armed.lock().await;
        if let Some((pending, handle)) = armed.take() {
            if pending == generation && !handle.is_finished() {
                debug!(generation, "Reset already armed, ignoring");
                *armed = Some((pending, handle));
                return false;
            }
            handle.abort();
        }

        let delay = self.delay;
        let session = self.session.clone();
        let metrics = self.metrics.clone();
        info!(generation, ?delay, "Reset armed");

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if session.reset_if_current(generation) {
                metrics.reset_performed();
                info!(generation, "Session reset to idle");
            } else {
                debug!(generation, "Reset skipped, session moved on");
            }
        });
        *armed = Some((generation, handle));
        true
    }

    pub async fn is_armed(&self) -> bool {
        self.armed
            .lock()
            .await
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished())
    }
}

impl Drop for ResetScheduler {
    fn drop(&mut self) {
        if let Some((_, handle)) = self.armed.get_mut().take() {
            handle.abort();
        }
    }
}
