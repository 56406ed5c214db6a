use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use loc_schemas::{Reading, SourceKind, UpdateParameters};
use loc_source::{ListenerToken, LocationPlatform, ReadingCallback};
use tokio::sync::watch;

struct Listener {
    kind: SourceKind,
    params: UpdateParameters,
    callback: ReadingCallback,
}

#[derive(Default)]
struct State {
    available: BTreeSet<SourceKind>,
    last_known: BTreeMap<SourceKind, Result<Option<Reading>, String>>,
    failing_registration: BTreeMap<SourceKind, String>,
    listeners: BTreeMap<ListenerToken, Listener>,
    next_token: u64,
    registrations: usize,
    unregistrations: usize,
    /// register_listener calls parked on the gate.
    waiting: usize,
}

/// In-memory [`LocationPlatform`].
///
/// Registration can be held pending with [`FakePlatform::hold_registrations`]
/// to script a cancel that lands before the platform accepts the listener.
pub struct FakePlatform {
    state: Mutex<State>,
    gate: watch::Sender<bool>,
}

impl FakePlatform {
    /// Precise, Network and Passive present, nothing cached.
    pub fn new() -> Arc<Self> {
        Self::with_kinds(&[SourceKind::Precise, SourceKind::Network, SourceKind::Passive])
    }

    pub fn with_kinds(kinds: &[SourceKind]) -> Arc<Self> {
        let (gate, _) = watch::channel(false);
        Arc::new(Self {
            state: Mutex::new(State {
                available: kinds.iter().copied().collect(),
                ..State::default()
            }),
            gate,
        })
    }

    pub fn set_last_known(&self, kind: SourceKind, reading: Option<Reading>) {
        self.lock().last_known.insert(kind, Ok(reading));
    }

    pub fn fail_last_known(&self, kind: SourceKind, reason: &str) {
        self.lock().last_known.insert(kind, Err(reason.to_string()));
    }

    pub fn set_available(&self, kind: SourceKind, available: bool) {
        let mut st = self.lock();
        if available {
            st.available.insert(kind);
        } else {
            st.available.remove(&kind);
        }
    }

    pub fn fail_registration(&self, kind: SourceKind, reason: &str) {
        self.lock()
            .failing_registration
            .insert(kind, reason.to_string());
    }

    pub fn hold_registrations(&self) {
        self.gate.send_replace(true);
    }

    pub fn release_registrations(&self) {
        self.gate.send_replace(false);
    }

    /// Deliver `reading` to every listener of `kind`. Returns how many got it.
    pub fn emit(&self, kind: SourceKind, reading: Reading) -> usize {
        let callbacks: Vec<ReadingCallback> = self
            .lock()
            .listeners
            .values()
            .filter(|l| l.kind == kind)
            .map(|l| Arc::clone(&l.callback))
            .collect();
        // outside the lock: callbacks may re-enter the platform
        for cb in &callbacks {
            cb(reading.clone());
        }
        callbacks.len()
    }

    pub fn listener_count(&self, kind: SourceKind) -> usize {
        self.lock()
            .listeners
            .values()
            .filter(|l| l.kind == kind)
            .count()
    }

    pub fn active_listeners(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Parameters of the most recent live registration for `kind`.
    pub fn params_for(&self, kind: SourceKind) -> Option<UpdateParameters> {
        self.lock()
            .listeners
            .values()
            .filter(|l| l.kind == kind)
            .last()
            .map(|l| l.params)
    }

    pub fn registrations(&self) -> usize {
        self.lock().registrations
    }

    pub fn unregistrations(&self) -> usize {
        self.lock().unregistrations
    }

    pub fn waiting_registrations(&self) -> usize {
        self.lock().waiting
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn pass_gate(&self) {
        let mut rx = self.gate.subscribe();
        loop {
            let held = *rx.borrow_and_update();
            if !held {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[async_trait::async_trait]
impl LocationPlatform for FakePlatform {
    fn available_kinds(&self) -> BTreeSet<SourceKind> {
        self.lock().available.clone()
    }

    fn last_known(&self, kind: SourceKind) -> Result<Option<Reading>> {
        match self.lock().last_known.get(&kind) {
            None => Ok(None),
            Some(Ok(r)) => Ok(r.clone()),
            Some(Err(reason)) => Err(anyhow!("last_known({kind}): {reason}")),
        }
    }

    async fn register_listener(
        &self,
        kind: SourceKind,
        params: UpdateParameters,
        on_reading: ReadingCallback,
    ) -> Result<ListenerToken> {
        self.lock().waiting += 1;
        self.pass_gate().await;

        let mut st = self.lock();
        st.waiting -= 1;
        if let Some(reason) = st.failing_registration.get(&kind) {
            return Err(anyhow!("register_listener({kind}): {reason}"));
        }
        st.next_token += 1;
        let token = ListenerToken(st.next_token);
        st.registrations += 1;
        st.listeners.insert(
            token,
            Listener {
                kind,
                params,
                callback: on_reading,
            },
        );
        Ok(token)
    }

    fn unregister_listener(&self, token: ListenerToken) {
        let mut st = self.lock();
        if st.listeners.remove(&token).is_some() {
            st.unregistrations += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn registers_emits_and_unregisters() {
        let p = FakePlatform::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let token = p
            .register_listener(
                SourceKind::Network,
                UpdateParameters::new().interval_ms(500),
                Arc::new(move |_: Reading| {
                    h.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await
            .unwrap();

        assert_eq!(p.emit(SourceKind::Network, crate::reading(SourceKind::Network, 1)), 1);
        assert_eq!(p.emit(SourceKind::Passive, crate::reading(SourceKind::Passive, 1)), 0);
        assert_eq!(p.params_for(SourceKind::Network).unwrap().min_interval_ms, 500);

        p.unregister_listener(token);
        p.unregister_listener(token);
        assert_eq!(p.unregistrations(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn held_registration_waits_for_release() {
        let p = FakePlatform::new();
        p.hold_registrations();
        let p2 = p.clone();
        let task = tokio::spawn(async move {
            p2.register_listener(SourceKind::Precise, UpdateParameters::new(), Arc::new(|_: Reading| {}))
                .await
        });

        crate::eventually(std::time::Duration::from_secs(1), || p.waiting_registrations() == 1)
            .await
            .unwrap();
        assert_eq!(p.registrations(), 0);

        p.release_registrations();
        task.await.unwrap().unwrap();
        assert_eq!(p.registrations(), 1);
    }
}
