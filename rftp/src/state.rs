//! Session finite-state machine types.
//!
//! Transitions are driven by [`crate::client`] and [`crate::server`]; these
//! enums exist so each session can expose and log where it is.

use std::fmt;

/// Client session states.
///
/// ```text
///  Init ──ack──▶ SendingData ──EOF──▶ Terminating ──ack──▶ Done
///    │               │ (error)             │
///    ▼               └────────────────────▶│
///  Failed ◀────────────────────────────────┘ (error)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientState {
    #[default]
    Init,
    SendingData,
    Terminating,
    Done,
    Failed,
}

/// Server session states.
///
/// ```text
///  AwaitingInit ──INIT──▶ Receiving ──TERM──▶ TimeWait ──quiet──▶ Done
///                             │                   │
///                             └──── error ────────┴──▶ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerState {
    #[default]
    AwaitingInit,
    Receiving,
    TimeWait,
    Done,
    Failed,
}

impl ClientState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl ServerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Init => "INIT",
            Self::SendingData => "SENDING_DATA",
            Self::Terminating => "TERMINATING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        })
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AwaitingInit => "AWAITING_INIT",
            Self::Receiving => "RECEIVING",
            Self::TimeWait => "TIME_WAIT",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_start_in_their_first_phase() {
        assert_eq!(ClientState::default(), ClientState::Init);
        assert_eq!(ServerState::default(), ServerState::AwaitingInit);
        assert!(!ClientState::default().is_terminal());
        assert!(!ServerState::TimeWait.is_terminal());
        assert!(ServerState::Failed.is_terminal());
    }

    #[test]
    fn display_names() {
        assert_eq!(ClientState::SendingData.to_string(), "SENDING_DATA");
        assert_eq!(ServerState::TimeWait.to_string(), "TIME_WAIT");
    }
}
