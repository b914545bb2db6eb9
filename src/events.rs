use tokio::sync::mpsc;

use crate::types::{ErrorKind, MoveResult, Role};

/// Who produced a move or status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mover {
    Human,
    Opponent(Role),
}

impl std::fmt::Display for Mover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mover::Human => write!(f, "human"),
            Mover::Opponent(role) => write!(f, "{role}"),
        }
    }
}

/// Notifications the orchestration core pushes to the UI collaborator.
///
/// Implementations must not block: they are invoked from the turn loop.
pub trait EventSink: Send + Sync {
    /// A participant started computing (or pondering over) its move
    fn on_thinking(&self, _mover: Mover) {}

    /// A move was committed to the game
    fn on_move_applied(&self, _result: &MoveResult, _mover: Mover) {}

    /// A session failed; automatic play for that side has halted
    fn on_session_error(&self, _role: Role, _kind: ErrorKind, _message: &str) {}
}

/// Sink that drops every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {}

/// Sink that forwards notifications over an unbounded channel, for UIs that
/// consume them from their own event loop
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<OrchestratorEvent>,
}

/// Owned form of the sink callbacks, for channel transport
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    Thinking {
        mover: Mover,
    },
    MoveApplied {
        result: MoveResult,
        mover: Mover,
    },
    SessionError {
        role: Role,
        kind: ErrorKind,
        message: String,
    },
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OrchestratorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn on_thinking(&self, mover: Mover) {
        let _ = self.tx.send(OrchestratorEvent::Thinking { mover });
    }

    fn on_move_applied(&self, result: &MoveResult, mover: Mover) {
        let _ = self.tx.send(OrchestratorEvent::MoveApplied {
            result: result.clone(),
            mover,
        });
    }

    fn on_session_error(&self, role: Role, kind: ErrorKind, message: &str) {
        let _ = self.tx.send(OrchestratorEvent::SessionError {
            role,
            kind,
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_forwards_events() {
        let (sink, mut rx) = ChannelSink::new();
        sink.on_thinking(Mover::Opponent(Role::PrimaryOpponent));
        sink.on_session_error(Role::Analysis, ErrorKind::EngineCrashed, "gone");

        assert!(matches!(
            rx.try_recv().unwrap(),
            OrchestratorEvent::Thinking {
                mover: Mover::Opponent(Role::PrimaryOpponent)
            }
        ));
        match rx.try_recv().unwrap() {
            OrchestratorEvent::SessionError { role, kind, message } => {
                assert_eq!(role, Role::Analysis);
                assert_eq!(kind, ErrorKind::EngineCrashed);
                assert_eq!(message, "gone");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn mover_formats_for_status_lines() {
        assert_eq!(Mover::Human.to_string(), "human");
        assert_eq!(
            Mover::Opponent(Role::SecondaryOpponent).to_string(),
            "secondary opponent"
        );
    }
}
