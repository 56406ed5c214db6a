//! Session state machine.
//!
//! | from                  | event                      | to         |
//! |-----------------------|----------------------------|------------|
//! | Idle                  | Connect                    | Connecting |
//! | Connecting            | Connected                  | Connected  |
//! | Connecting, Connected | ConnectFailed, Suspended   | Failed     |
//! | Connecting, Connected | Disconnect                 | Idle       |
//! | Idle, Failed          | Disconnect                 | unchanged  |
//!
//! `Disconnect` from `Idle` or `Failed` is a legal no-op: teardown must be
//! safe whatever the connection got to. A session makes at most one connect
//! attempt; `Connect` from any state but `Idle` is illegal.

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    /// Connect failed or the live connection was suspended.
    Failed,
}

impl SessionState {
    /// `true` when a disconnect is owed to the service.
    pub fn is_live(&self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::Connected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Connect,
    Connected,
    ConnectFailed,
    Suspended,
    Disconnect,
}

/// Returned when an event cannot legally be applied in the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: SessionState,
    pub event: SessionEvent,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "illegal session transition: {:?} + {:?}", self.from, self.event)
    }
}

impl std::error::Error for TransitionError {}

impl SessionState {
    pub fn apply(self, event: SessionEvent) -> Result<SessionState, TransitionError> {
        use SessionEvent as E;
        use SessionState as S;

        let next = match (self, event) {
            (S::Idle, E::Connect) => S::Connecting,
            (S::Connecting, E::Connected) => S::Connected,
            (S::Connecting | S::Connected, E::ConnectFailed | E::Suspended) => S::Failed,
            (S::Connecting | S::Connected, E::Disconnect) => S::Idle,
            (S::Idle | S::Failed, E::Disconnect) => self,
            (from, event) => return Err(TransitionError { from, event }),
        };
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionEvent as E;
    use SessionState as S;

    #[test]
    fn happy_path() {
        let s = S::Idle.apply(E::Connect).unwrap();
        assert_eq!(s, S::Connecting);
        let s = s.apply(E::Connected).unwrap();
        assert_eq!(s, S::Connected);
        assert!(s.is_live());
        assert_eq!(s.apply(E::Disconnect).unwrap(), S::Idle);
    }

    #[test]
    fn failure_and_suspension_end_in_failed() {
        assert_eq!(S::Connecting.apply(E::ConnectFailed).unwrap(), S::Failed);
        assert_eq!(S::Connected.apply(E::Suspended).unwrap(), S::Failed);
        assert!(!S::Failed.is_live());
    }

    #[test]
    fn disconnect_from_idle_or_failed_is_noop() {
        assert_eq!(S::Idle.apply(E::Disconnect).unwrap(), S::Idle);
        assert_eq!(S::Failed.apply(E::Disconnect).unwrap(), S::Failed);
    }

    #[test]
    fn cancel_during_connecting_then_late_connect_is_rejected() {
        let s = S::Connecting.apply(E::Disconnect).unwrap();
        assert_eq!(s, S::Idle);
        let err = s.apply(E::Connected).unwrap_err();
        assert_eq!(
            err,
            TransitionError {
                from: S::Idle,
                event: E::Connected
            }
        );
    }

    #[test]
    fn single_connect_attempt() {
        assert!(S::Connecting.apply(E::Connect).is_err());
        assert!(S::Failed.apply(E::Connect).is_err());
        assert!(S::Connected.apply(E::Connect).is_err());
    }

    #[test]
    fn transition_error_display() {
        let err = S::Idle.apply(E::Suspended).unwrap_err();
        assert_eq!(err.to_string(), "illegal session transition: Idle + Suspended");
    }
}
