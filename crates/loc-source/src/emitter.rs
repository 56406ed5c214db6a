//! Sink side of a subscription.
//!
//! An [`Emitter`] is what an adapter pushes into. It tags every event with the
//! activation slot it belongs to, and it goes quiet as soon as its
//! [`CancelHandle`] is cancelled: cancellation is cooperative, the producer
//! checks it on every push.

use loc_schemas::{LocationError, Reading, SourceKind};
use tokio::sync::mpsc;
use tracing::trace;

use crate::cancel::CancelHandle;

#[derive(Debug, Clone, PartialEq)]
pub enum SourcePayload {
    Reading(Reading),
    /// Terminal for the emitting adapter; nothing follows it from that slot.
    Failed(LocationError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceEvent {
    /// Index of the activation that produced the event.
    pub slot: usize,
    pub kind: SourceKind,
    pub payload: SourcePayload,
}

#[derive(Clone)]
pub struct Emitter {
    slot: usize,
    kind: SourceKind,
    tx: mpsc::UnboundedSender<SourceEvent>,
    handle: CancelHandle,
}

impl Emitter {
    pub fn new(slot: usize, kind: SourceKind, tx: mpsc::UnboundedSender<SourceEvent>) -> Self {
        Self {
            slot,
            kind,
            tx,
            handle: CancelHandle::new(format!("{kind}#{slot}")),
        }
    }

    /// Single-slot emitter plus its receiving end.
    pub fn channel(kind: SourceKind) -> (Self, mpsc::UnboundedReceiver<SourceEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(0, kind, tx), rx)
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// The handle that silences this emitter. Adapters hang their teardown on
    /// it and hand it back from `subscribe`.
    pub fn handle(&self) -> CancelHandle {
        self.handle.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_cancelled() || self.tx.is_closed()
    }

    /// Forward a reading. Returns `false` if it was dropped because the
    /// subscription is gone.
    pub fn emit(&self, reading: Reading) -> bool {
        if self.is_closed() {
            trace!(kind = %self.kind, slot = self.slot, "reading after cancel dropped");
            return false;
        }
        self.send(SourcePayload::Reading(reading))
    }

    /// Report a terminal adapter failure, then tear the adapter down.
    pub fn fail(&self, err: LocationError) {
        if !self.is_closed() {
            self.send(SourcePayload::Failed(err));
        }
        self.handle.cancel();
    }

    fn send(&self, payload: SourcePayload) -> bool {
        self.tx
            .send(SourceEvent {
                slot: self.slot,
                kind: self.kind,
                payload,
            })
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn reading() -> Reading {
        Reading::new(SourceKind::Passive, 10.0, 20.0, Duration::from_secs(1))
    }

    #[test]
    fn emits_until_cancelled() {
        let (em, mut rx) = Emitter::channel(SourceKind::Passive);
        assert!(em.emit(reading()));
        em.handle().cancel();
        assert!(!em.emit(reading()));

        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.kind, SourceKind::Passive);
        assert!(matches!(ev.payload, SourcePayload::Reading(_)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn fail_reports_once_and_cancels() {
        let (em, mut rx) = Emitter::channel(SourceKind::Network);
        em.fail(LocationError::unavailable(SourceKind::Network, "disabled"));
        em.fail(LocationError::unavailable(SourceKind::Network, "disabled"));

        assert!(em.handle().is_cancelled());
        let ev = rx.try_recv().unwrap();
        assert!(matches!(ev.payload, SourcePayload::Failed(_)));
        assert!(rx.try_recv().is_err());
    }
}
