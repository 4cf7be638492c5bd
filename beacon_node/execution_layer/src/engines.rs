use crate::engine_api::{PayloadStatusV1Status, TransportError};
use slog::{debug, warn, Logger};

/// The connection state of the execution engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// The engine is reachable but has not yet demonstrated sync status.
    Online,
    /// The engine is reachable and keeping up with the head of its chain.
    Synced,
    /// The engine is reachable but still syncing its own chain.
    Syncing,
    /// The engine could not be reached.
    Offline,
    /// The engine tore the connection down mid-exchange, which is how failed JWT
    /// authentication manifests.
    AuthFailed,
}

/// Tracks the engine connection state across API exchanges.
///
/// Most transitions are implied by payload statuses and transport errors. The exception is
/// leaving `Offline`: an offline engine is only promoted back by an explicit
/// `set_online`, which callers invoke after observing a successful exchange. A payload status
/// received while `Offline` (e.g. from a late in-flight request) does not promote.
pub struct EngineStateMachine {
    state: EngineState,
    log: Logger,
}

impl EngineStateMachine {
    pub fn new(log: Logger) -> Self {
        Self {
            state: EngineState::Online,
            log,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Digest the status field of a successful `newPayload`/`forkchoiceUpdated` exchange.
    pub fn on_payload_status(&mut self, status: PayloadStatusV1Status) {
        let target = match status {
            // Any definitive verdict demonstrates the engine is keeping up.
            PayloadStatusV1Status::Valid
            | PayloadStatusV1Status::Invalid
            | PayloadStatusV1Status::InvalidBlockHash => EngineState::Synced,
            PayloadStatusV1Status::Syncing | PayloadStatusV1Status::Accepted => {
                EngineState::Syncing
            }
        };
        self.transition(target);
    }

    /// Digest a failed exchange.
    pub fn on_transport_error(&mut self, error: &TransportError) {
        let target = match error {
            TransportError::ConnectionRefused | TransportError::HostNotFound => {
                EngineState::Offline
            }
            TransportError::ConnectionReset | TransportError::ConnectionAborted => {
                EngineState::AuthFailed
            }
            // Timeouts and unclassified errors are not conclusive; hold the current state and
            // let the retry decide.
            TransportError::Timeout | TransportError::Other(_) => return,
        };
        self.transition(target);
    }

    /// Explicitly promote an offline engine after a successful exchange was observed.
    pub fn set_online(&mut self) {
        let old_state = self.state;
        self.state = EngineState::Online;
        if old_state != EngineState::Online {
            debug!(
                self.log,
                "Execution engine online";
                "previous_state" => ?old_state,
            );
        }
    }

    fn transition(&mut self, target: EngineState) {
        // An offline engine must be explicitly promoted via `set_online` before any implied
        // transition is honoured.
        if self.state == EngineState::Offline && target != EngineState::Offline {
            debug!(
                self.log,
                "Ignoring engine state transition while offline";
                "target_state" => ?target,
            );
            return;
        }

        if self.state != target {
            if matches!(target, EngineState::Offline | EngineState::AuthFailed) {
                warn!(
                    self.log,
                    "Execution engine connection degraded";
                    "previous_state" => ?self.state,
                    "new_state" => ?target,
                );
            }
            self.state = target;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> EngineStateMachine {
        EngineStateMachine::new(Logger::root(slog::Discard, slog::o!()))
    }

    #[test]
    fn syncing_status_moves_online_engine_to_syncing() {
        let mut sm = machine();
        assert_eq!(sm.state(), EngineState::Online);

        sm.on_payload_status(PayloadStatusV1Status::Syncing);
        assert_eq!(sm.state(), EngineState::Syncing);
    }

    #[test]
    fn connection_refused_takes_engine_offline() {
        let mut sm = machine();
        sm.on_payload_status(PayloadStatusV1Status::Syncing);

        sm.on_transport_error(&TransportError::ConnectionRefused);
        assert_eq!(sm.state(), EngineState::Offline);
    }

    #[test]
    fn offline_engine_is_not_promoted_implicitly() {
        let mut sm = machine();
        sm.on_transport_error(&TransportError::ConnectionRefused);
        assert_eq!(sm.state(), EngineState::Offline);

        // A payload status on its own must not bring the engine back.
        sm.on_payload_status(PayloadStatusV1Status::Valid);
        assert_eq!(sm.state(), EngineState::Offline);

        // An explicit promotion does.
        sm.set_online();
        assert_eq!(sm.state(), EngineState::Online);

        sm.on_payload_status(PayloadStatusV1Status::Valid);
        assert_eq!(sm.state(), EngineState::Synced);
    }

    #[test]
    fn connection_reset_is_classified_as_auth_failure() {
        let mut sm = machine();
        sm.on_transport_error(&TransportError::ConnectionReset);
        assert_eq!(sm.state(), EngineState::AuthFailed);
    }

    #[test]
    fn timeouts_are_inconclusive() {
        let mut sm = machine();
        sm.on_payload_status(PayloadStatusV1Status::Valid);
        assert_eq!(sm.state(), EngineState::Synced);

        sm.on_transport_error(&TransportError::Timeout);
        assert_eq!(sm.state(), EngineState::Synced);
    }
}
