use std::{error::Error, fmt};

use crate::fsm::event::EventKind;

/// Domain error raised by a transition handler. Routed by the engine to the
/// protocol's from-any error transition, never propagated as a panic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtocolError {
    pub message: String,
}

impl ProtocolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for ProtocolError {}

// Lets handlers use `?` on collaborator calls; an infrastructure failure
// inside a handler fails the trade like any other handler error.
impl From<MuswapError> for ProtocolError {
    fn from(e: MuswapError) -> ProtocolError {
        ProtocolError::new(e.to_string())
    }
}

#[derive(Debug)]
pub enum MuswapError {
    StrumParsing(strum::ParseError),
    SerdesJson(serde_json::Error),
    Io(std::io::Error),
    MpscSend(String),
    OneshotRecv(tokio::sync::oneshot::error::RecvError),
    MissingErrorTransition(EventKind),
    ErrorHandlerFailed(ProtocolError),
}

impl Error for MuswapError {}

impl fmt::Display for MuswapError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let error_string = match self {
            MuswapError::StrumParsing(err) => {
                format!("Muswap-Error | StrumParseError - {}", err)
            }
            MuswapError::SerdesJson(err) => {
                format!("Muswap-Error | SerdesJsonError - {}", err)
            }
            MuswapError::Io(err) => {
                format!("Muswap-Error | IoError - {}", err)
            }
            MuswapError::MpscSend(msg) => {
                format!("Muswap-Error | MpscSendError - {}", msg)
            }
            MuswapError::OneshotRecv(err) => {
                format!("Muswap-Error | OneshotRecvError - {}", err)
            }
            MuswapError::MissingErrorTransition(kind) => {
                format!(
                    "Muswap-Error | MissingErrorTransition - Protocol defines no from-any transition for {}",
                    kind
                )
            }
            MuswapError::ErrorHandlerFailed(err) => {
                format!("Muswap-Error | ErrorHandlerFailed - {}", err)
            }
        };
        write!(f, "{}", error_string)
    }
}

impl From<strum::ParseError> for MuswapError {
    fn from(e: strum::ParseError) -> MuswapError {
        MuswapError::StrumParsing(e)
    }
}

impl From<serde_json::Error> for MuswapError {
    fn from(e: serde_json::Error) -> MuswapError {
        MuswapError::SerdesJson(e)
    }
}

impl From<std::io::Error> for MuswapError {
    fn from(e: std::io::Error) -> MuswapError {
        MuswapError::Io(e)
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for MuswapError {
    fn from(e: tokio::sync::mpsc::error::SendError<T>) -> MuswapError {
        MuswapError::MpscSend(e.to_string())
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for MuswapError {
    fn from(e: tokio::sync::oneshot::error::RecvError) -> MuswapError {
        MuswapError::OneshotRecv(e)
    }
}
