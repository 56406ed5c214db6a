use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use loc_schemas::{Reading, UpdateParameters};
use loc_source::{ListenerToken, ReadingCallback, SessionCallbacks, SessionClient, SessionConnector};

/// How a fresh session answers `connect`.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedOutcome {
    /// `on_connected` fires inside `connect`.
    Connect,
    /// `on_failed(reason)` fires inside `connect`.
    Fail(String),
    /// `on_suspended(cause)` fires inside `connect`, before connection.
    Suspend(i32),
    /// Nothing fires until the test drives the client.
    Hold,
}

#[derive(Default)]
struct ClientState {
    connected: bool,
    connecting: bool,
    callbacks: Option<Arc<SessionCallbacks>>,
    listeners: BTreeMap<ListenerToken, ReadingCallback>,
    next_token: u64,
    connects: usize,
    disconnects: usize,
    removals: usize,
}

/// One scripted session.
pub struct FakeSessionClient {
    outcome: ScriptedOutcome,
    last_location: Result<Option<Reading>, String>,
    fail_requests: Option<String>,
    state: Mutex<ClientState>,
}

impl FakeSessionClient {
    fn lock(&self) -> MutexGuard<'_, ClientState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn callbacks(&self) -> Option<Arc<SessionCallbacks>> {
        self.lock().callbacks.clone()
    }

    /// Drive a held session to connected.
    pub fn complete_connect(&self) {
        {
            let mut st = self.lock();
            st.connecting = false;
            st.connected = true;
        }
        if let Some(cbs) = self.callbacks() {
            (cbs.on_connected)();
        }
    }

    pub fn fail(&self, reason: &str) {
        {
            let mut st = self.lock();
            st.connecting = false;
            st.connected = false;
        }
        if let Some(cbs) = self.callbacks() {
            (cbs.on_failed)(reason.to_string());
        }
    }

    pub fn suspend(&self, cause: i32) {
        self.lock().connected = false;
        if let Some(cbs) = self.callbacks() {
            (cbs.on_suspended)(cause);
        }
    }

    /// Push a reading to every registered listener. Returns how many got it.
    pub fn emit(&self, reading: Reading) -> usize {
        let listeners: Vec<ReadingCallback> = self.lock().listeners.values().cloned().collect();
        for cb in &listeners {
            cb(reading.clone());
        }
        listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    pub fn disconnects(&self) -> usize {
        self.lock().disconnects
    }

    pub fn removals(&self) -> usize {
        self.lock().removals
    }
}

impl SessionClient for FakeSessionClient {
    fn connect(&self, callbacks: SessionCallbacks) {
        let cbs = Arc::new(callbacks);
        {
            let mut st = self.lock();
            st.connects += 1;
            st.connecting = true;
            st.callbacks = Some(Arc::clone(&cbs));
        }
        match &self.outcome {
            ScriptedOutcome::Connect => self.complete_connect(),
            ScriptedOutcome::Fail(reason) => self.fail(reason),
            ScriptedOutcome::Suspend(cause) => {
                self.lock().connecting = false;
                (cbs.on_suspended)(*cause);
            }
            ScriptedOutcome::Hold => {}
        }
    }

    fn disconnect(&self) {
        let mut st = self.lock();
        st.connected = false;
        st.connecting = false;
        st.disconnects += 1;
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    fn is_connecting(&self) -> bool {
        self.lock().connecting
    }

    fn last_location(&self) -> Result<Option<Reading>> {
        if !self.is_connected() {
            return Err(anyhow!("last_location on a session that is not connected"));
        }
        self.last_location.clone().map_err(|reason| anyhow!(reason))
    }

    fn request_updates(
        &self,
        _params: &UpdateParameters,
        on_reading: ReadingCallback,
    ) -> Result<ListenerToken> {
        if let Some(reason) = &self.fail_requests {
            return Err(anyhow!("request_updates: {reason}"));
        }
        let mut st = self.lock();
        if !st.connected {
            return Err(anyhow!("request_updates on a session that is not connected"));
        }
        st.next_token += 1;
        let token = ListenerToken(st.next_token);
        st.listeners.insert(token, on_reading);
        Ok(token)
    }

    fn remove_updates(&self, token: ListenerToken) {
        let mut st = self.lock();
        if st.listeners.remove(&token).is_some() {
            st.removals += 1;
        }
    }
}

#[derive(Default)]
struct ConnectorState {
    script: VecDeque<ScriptedOutcome>,
    last_location: Option<Result<Option<Reading>, String>>,
    fail_requests: Option<String>,
    opened: Vec<Arc<FakeSessionClient>>,
}

/// Hands out [`FakeSessionClient`]s following a script. Once the script runs
/// out every session gets the fallback outcome.
pub struct FakeSessionConnector {
    fallback: ScriptedOutcome,
    state: Mutex<ConnectorState>,
}

impl FakeSessionConnector {
    pub fn new(fallback: ScriptedOutcome) -> Arc<Self> {
        Arc::new(Self {
            fallback,
            state: Mutex::new(ConnectorState::default()),
        })
    }

    /// Outcomes for the next sessions, in order.
    pub fn script(&self, outcomes: impl IntoIterator<Item = ScriptedOutcome>) {
        self.lock().script.extend(outcomes);
    }

    pub fn set_last_location(&self, reading: Option<Reading>) {
        self.lock().last_location = Some(Ok(reading));
    }

    pub fn fail_last_location(&self, reason: &str) {
        self.lock().last_location = Some(Err(reason.to_string()));
    }

    pub fn fail_requests(&self, reason: &str) {
        self.lock().fail_requests = Some(reason.to_string());
    }

    pub fn sessions(&self) -> Vec<Arc<FakeSessionClient>> {
        self.lock().opened.clone()
    }

    pub fn session(&self, index: usize) -> Option<Arc<FakeSessionClient>> {
        self.lock().opened.get(index).cloned()
    }

    pub fn opened(&self) -> usize {
        self.lock().opened.len()
    }

    pub fn disconnects(&self) -> usize {
        self.sessions().iter().map(|s| s.disconnects()).sum()
    }

    pub fn live_sessions(&self) -> usize {
        self.sessions()
            .iter()
            .filter(|s| s.is_connected() || s.is_connecting())
            .count()
    }

    pub fn active_listeners(&self) -> usize {
        self.sessions().iter().map(|s| s.listener_count()).sum()
    }

    fn lock(&self) -> MutexGuard<'_, ConnectorState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionConnector for FakeSessionConnector {
    fn open(&self) -> Arc<dyn SessionClient> {
        let mut st = self.lock();
        let outcome = st.script.pop_front().unwrap_or_else(|| self.fallback.clone());
        let client = Arc::new(FakeSessionClient {
            outcome,
            last_location: st.last_location.clone().unwrap_or(Ok(None)),
            fail_requests: st.fail_requests.clone(),
            state: Mutex::new(ClientState::default()),
        });
        st.opened.push(Arc::clone(&client));
        client
    }
}
