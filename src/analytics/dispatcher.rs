//! Off-request-path visit recording
//!
//! Each successful resolution spawns one tracked task. Work is never dropped
//! on backpressure, so every resolution gets at least one write attempt.
//! Failed writes are retried with exponential backoff under the same visit
//! id; when all attempts fail the visit is reported on the
//! `tracelink::recorder` log target and counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

use crate::analytics::models::RequestMetadata;
use crate::analytics::recorder::VisitRecorder;

#[derive(Clone)]
pub struct VisitDispatcher {
    recorder: Arc<VisitRecorder>,
    tracker: TaskTracker,
    failures: Arc<AtomicU64>,
}

impl VisitDispatcher {
    pub fn new(recorder: Arc<VisitRecorder>) -> Self {
        Self {
            recorder,
            tracker: TaskTracker::new(),
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Schedule recording of a visit to a link that was just resolved
    ///
    /// Returns immediately; the caller never waits on geolocation or storage.
    pub fn dispatch(&self, code: String, metadata: RequestMetadata) {
        let recorder = Arc::clone(&self.recorder);
        let failures = Arc::clone(&self.failures);

        self.tracker.spawn(async move {
            let config = recorder.config();
            let max_attempts = config.max_attempts.max(1);
            let mut backoff = config.retry_backoff();

            let visit = recorder.build_visit(&code, &metadata).await;

            for attempt in 1..=max_attempts {
                match recorder.persist(&visit).await {
                    Ok(()) => {
                        debug!(code = %visit.code, visit_id = %visit.id, attempt, "recorded visit");
                        return;
                    }
                    Err(err) if attempt < max_attempts => {
                        warn!(
                            code = %visit.code,
                            visit_id = %visit.id,
                            attempt,
                            error = %err,
                            "visit write failed, retrying"
                        );
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                    Err(err) => {
                        failures.fetch_add(1, Ordering::Relaxed);
                        error!(
                            target: "tracelink::recorder",
                            code = %visit.code,
                            visit_id = %visit.id,
                            attempts = max_attempts,
                            error = ?err,
                            "dropping visit after exhausting retries"
                        );
                    }
                }
            }
        });
    }

    /// Wait for every visit dispatched so far to be written or given up on
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Visits dropped after exhausting their retries
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Recordings currently in flight
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }
}
