use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use loc_policy::ActivationPlan;
use loc_schemas::{LocationError, Reading};
use loc_source::{CancelHandle, SourceEvent, SourcePayload};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Merged readings of one subscription, in arrival order.
///
/// Ends when the subscription is cancelled, or after yielding the error of the
/// last adapter still running. Dropping the stream cancels the subscription.
pub struct LocationStream {
    id: Uuid,
    plan: ActivationPlan,
    /// Per slot: still contributing.
    live: Vec<bool>,
    active: usize,
    events: UnboundedReceiverStream<SourceEvent>,
    handle: CancelHandle,
    cancelled: Pin<Box<dyn Future<Output = ()> + Send>>,
    done: bool,
}

impl LocationStream {
    pub(crate) fn new(
        id: Uuid,
        plan: ActivationPlan,
        rx: mpsc::UnboundedReceiver<SourceEvent>,
        handle: CancelHandle,
    ) -> Self {
        let live = vec![true; plan.len()];
        Self {
            id,
            active: live.len(),
            live,
            plan,
            events: UnboundedReceiverStream::new(rx),
            cancelled: Box::pin(handle.cancelled_owned()),
            handle,
            done: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn plan(&self) -> &ActivationPlan {
        &self.plan
    }

    /// Adapters that have not failed yet.
    pub fn active_sources(&self) -> usize {
        self.active
    }

    fn finish(&mut self) {
        self.done = true;
        self.events.close();
        self.handle.cancel();
    }

    /// `Some` when the event should reach the caller.
    fn admit(&mut self, ev: SourceEvent) -> Option<Result<Reading, LocationError>> {
        let live = self.live.get(ev.slot).copied().unwrap_or(false);
        if !live {
            trace!(subscription = %self.id, slot = ev.slot, "event from retired slot dropped");
            return None;
        }
        match ev.payload {
            SourcePayload::Reading(reading) => {
                let accepted = self
                    .plan
                    .entries
                    .get(ev.slot)
                    .map_or(true, |entry| entry.accepts(&reading));
                if !accepted {
                    trace!(
                        subscription = %self.id,
                        kind = %ev.kind,
                        accuracy_m = ?reading.accuracy_m,
                        "reading above accuracy ceiling rejected"
                    );
                    return None;
                }
                Some(Ok(reading))
            }
            SourcePayload::Failed(err) => {
                self.live[ev.slot] = false;
                self.active -= 1;
                warn!(
                    subscription = %self.id,
                    kind = %ev.kind,
                    remaining = self.active,
                    error = %err,
                    "source failed"
                );
                if self.active == 0 {
                    self.finish();
                    Some(Err(err))
                } else {
                    None
                }
            }
        }
    }
}

impl Stream for LocationStream {
    type Item = Result<Reading, LocationError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        // cancellation wins over anything still queued
        if this.cancelled.as_mut().poll(cx).is_ready() {
            debug!(subscription = %this.id, "stream closed by cancel");
            this.finish();
            return Poll::Ready(None);
        }
        loop {
            match Pin::new(&mut this.events).poll_next(cx) {
                Poll::Ready(Some(ev)) => {
                    if let Some(item) = this.admit(ev) {
                        return Poll::Ready(Some(item));
                    }
                }
                Poll::Ready(None) => {
                    this.finish();
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl Drop for LocationStream {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}
