//! Per-session subscription registry

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_stream::stream;
use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::session::SessionId;

use super::format::{estimate_eta, percent_of};
use super::types::{EventKind, ProgressEvent, PublishOutcome};

/// Default per-subscriber buffer
pub const DEFAULT_BUFFER: usize = 64;

/// Subscription ends if nothing arrives for this long: 10 minutes
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Live event sequence for one session
pub type ProgressStream = Pin<Box<dyn Stream<Item = ProgressEvent> + Send>>;

// ============================================================================
// Progress Hub
// ============================================================================

/// Keyed registry of progress subscribers, at most one per session
///
/// Publishing never blocks: events go through a bounded buffer with
/// `try_send`, and a full buffer drops the update.
#[derive(Clone)]
pub struct ProgressHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    subscriptions: Mutex<HashMap<SessionId, Subscription>>,
    buffer: usize,
    idle_timeout: Duration,
    next_token: AtomicU64,
}

struct Subscription {
    /// Distinguishes this registration from a later replacement
    token: u64,
    sender: mpsc::Sender<ProgressEvent>,
    started: Instant,
    last_processed: u64,
    last_total: u64,
}

impl Default for ProgressHub {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER, DEFAULT_IDLE_TIMEOUT)
    }
}

impl ProgressHub {
    pub fn new(buffer: usize, idle_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(HubInner {
                subscriptions: Mutex::new(HashMap::new()),
                buffer: buffer.max(1),
                idle_timeout,
                next_token: AtomicU64::new(1),
            }),
        }
    }

    /// Whether a subscriber is currently registered for `session`
    pub fn is_subscribed(&self, session: SessionId) -> bool {
        self.inner.subscriptions.lock().contains_key(&session)
    }

    /// Number of live subscriptions
    pub fn active(&self) -> usize {
        self.inner.subscriptions.lock().len()
    }

    // ========================================================================
    // Subscribe
    // ========================================================================

    /// Register the subscriber for `session` and return its event stream
    ///
    /// A second subscribe replaces the first; the earlier stream ends. The
    /// returned stream finishes after a complete or error event, when the
    /// idle timeout elapses, or when the hub drops the registration.
    pub fn subscribe(&self, session: SessionId) -> ProgressStream {
        let (sender, mut receiver) = mpsc::channel(self.inner.buffer);
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);

        let replaced = self.inner.subscriptions.lock().insert(
            session,
            Subscription {
                token,
                sender,
                started: Instant::now(),
                last_processed: 0,
                last_total: 0,
            },
        );

        if replaced.is_some() {
            tracing::debug!(session_id = %session, "Replaced progress subscriber");
        } else {
            tracing::debug!(session_id = %session, "Progress subscriber attached");
        }

        let guard = SubscriptionGuard {
            hub: Arc::clone(&self.inner),
            session,
            token,
        };
        let idle_timeout = self.inner.idle_timeout;

        Box::pin(stream! {
            let _guard = guard;
            loop {
                match tokio::time::timeout(idle_timeout, receiver.recv()).await {
                    Ok(Some(event)) => {
                        let terminal = event.kind.is_terminal();
                        yield event;
                        if terminal {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(_) => {
                        tracing::debug!(session_id = %session, "Progress subscription idle, closing");
                        break;
                    }
                }
            }
        })
    }

    // ========================================================================
    // Publish
    // ========================================================================

    /// Report `processed` of `total` bytes for the current stage
    pub fn publish(
        &self,
        session: SessionId,
        processed: u64,
        total: u64,
        status: &str,
        current_file: &str,
    ) -> PublishOutcome {
        let mut subscriptions = self.inner.subscriptions.lock();
        let Some(subscription) = subscriptions.get_mut(&session) else {
            return PublishOutcome::NoSubscriber;
        };

        subscription.last_processed = processed;
        subscription.last_total = total;

        let event = ProgressEvent {
            session_id: session,
            percent: percent_of(processed, total),
            bytes_processed: processed,
            total_bytes: total,
            eta: estimate_eta(subscription.started.elapsed(), processed, total),
            status: status.to_string(),
            current_file: current_file.to_string(),
            kind: EventKind::Progress,
        };

        match subscription.sender.try_send(event) {
            Ok(()) => PublishOutcome::Delivered,
            Err(TrySendError::Full(_)) => PublishOutcome::Dropped,
            Err(TrySendError::Closed(_)) => {
                subscriptions.remove(&session);
                tracing::debug!(session_id = %session, "Progress subscriber disconnected");
                PublishOutcome::Disconnected
            }
        }
    }

    /// Send the terminal complete event and drop the registration
    pub fn complete(&self, session: SessionId) -> PublishOutcome {
        let Some(subscription) = self.inner.subscriptions.lock().remove(&session) else {
            return PublishOutcome::NoSubscriber;
        };

        let event = ProgressEvent::complete(
            session,
            subscription.last_processed,
            subscription.last_total,
        );
        deliver_terminal(subscription.sender, event)
    }

    /// Send the terminal error event and drop the registration
    pub fn fail(&self, session: SessionId, message: &str) -> PublishOutcome {
        let Some(subscription) = self.inner.subscriptions.lock().remove(&session) else {
            return PublishOutcome::NoSubscriber;
        };

        deliver_terminal(subscription.sender, ProgressEvent::error(session, message))
    }
}

/// Terminal events are not dropped on a full buffer; they are queued from a
/// detached task instead so the producer still never waits.
fn deliver_terminal(sender: mpsc::Sender<ProgressEvent>, event: ProgressEvent) -> PublishOutcome {
    match sender.try_send(event) {
        Ok(()) => PublishOutcome::Delivered,
        Err(TrySendError::Closed(_)) => PublishOutcome::Disconnected,
        Err(TrySendError::Full(event)) => match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let _ = sender.send(event).await;
                });
                PublishOutcome::Delivered
            }
            Err(_) => PublishOutcome::Dropped,
        },
    }
}

/// Releases a registration when its stream is dropped
struct SubscriptionGuard {
    hub: Arc<HubInner>,
    session: SessionId,
    token: u64,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let mut subscriptions = self.hub.subscriptions.lock();
        if subscriptions
            .get(&self.session)
            .is_some_and(|s| s.token == self.token)
        {
            subscriptions.remove(&self.session);
            tracing::debug!(session_id = %self.session, "Progress subscription released");
        }
    }
}
