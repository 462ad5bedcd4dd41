use serde::{Deserialize, Serialize};
use strum_macros::{Display, IntoStaticStr};
use uuid::Uuid;

use crate::message::TradeMessage;
use crate::trade::{PeerId, TradeContract};

/// Locally raised trigger from the application layer when the user takes an
/// offer. Creates the trade on the taker side.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TakeOfferEvent {
    pub contract: TradeContract,
}

/// Inbound protocol message together with the transport-level sender.
#[derive(Clone, Debug)]
pub struct MessageEnvelope {
    pub from: PeerId,
    pub message: TradeMessage,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum CloseTimeoutKind {
    BuyersCooperativeClose,
    SellersCooperativeClose,
}

/// Everything that can drive a trade's state machine: network messages,
/// local user triggers, blockchain-watcher and timer events, and the error
/// event the engine synthesizes when a handler fails.
#[derive(Clone, Debug)]
pub enum TradeEvent {
    TakeOffer(TakeOfferEvent),
    Message(MessageEnvelope),
    DepositTxConfirmed { trade_uuid: Uuid, txid: String },
    PaymentInitiated {
        trade_uuid: Uuid,
        payment_reference: Option<String>,
    },
    PaymentReceiptConfirmed { trade_uuid: Uuid },
    CloseTimeout {
        trade_uuid: Uuid,
        kind: CloseTimeoutKind,
    },
    ProtocolError { trade_uuid: Uuid, message: String },
}

impl TradeEvent {
    pub fn trade_uuid(&self) -> Uuid {
        match self {
            TradeEvent::TakeOffer(event) => event.contract.trade_uuid,
            TradeEvent::Message(envelope) => envelope.message.trade_uuid(),
            TradeEvent::DepositTxConfirmed { trade_uuid, .. } => *trade_uuid,
            TradeEvent::PaymentInitiated { trade_uuid, .. } => *trade_uuid,
            TradeEvent::PaymentReceiptConfirmed { trade_uuid } => *trade_uuid,
            TradeEvent::CloseTimeout { trade_uuid, .. } => *trade_uuid,
            TradeEvent::ProtocolError { trade_uuid, .. } => *trade_uuid,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            TradeEvent::TakeOffer(_) => EventKind::TakeOffer,
            TradeEvent::Message(envelope) => match envelope.message {
                TradeMessage::SetupTradeA(_) => EventKind::SetupTradeMessageA,
                TradeMessage::SetupTradeB(_) => EventKind::SetupTradeMessageB,
                TradeMessage::SetupTradeC(_) => EventKind::SetupTradeMessageC,
                TradeMessage::SetupTradeD(_) => EventKind::SetupTradeMessageD,
                TradeMessage::PaymentInitiatedE(_) => EventKind::PaymentInitiatedMessageE,
                TradeMessage::PaymentReceivedF(_) => EventKind::PaymentReceivedMessageF,
                TradeMessage::CooperativeCloseG(_) => EventKind::CooperativeCloseMessageG,
                TradeMessage::PeerReportedError(_) => EventKind::PeerReportedError,
            },
            TradeEvent::DepositTxConfirmed { .. } => EventKind::DepositTxConfirmed,
            TradeEvent::PaymentInitiated { .. } => EventKind::PaymentInitiated,
            TradeEvent::PaymentReceiptConfirmed { .. } => EventKind::PaymentReceiptConfirmed,
            TradeEvent::CloseTimeout { kind, .. } => match kind {
                CloseTimeoutKind::BuyersCooperativeClose => EventKind::BuyersCloseTimeout,
                CloseTimeoutKind::SellersCooperativeClose => EventKind::SellersCloseTimeout,
            },
            TradeEvent::ProtocolError { .. } => EventKind::ProtocolError,
        }
    }
}

/// Flat discriminant of `TradeEvent`, used as the transition table key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum EventKind {
    TakeOffer,
    SetupTradeMessageA,
    SetupTradeMessageB,
    SetupTradeMessageC,
    SetupTradeMessageD,
    DepositTxConfirmed,
    PaymentInitiated,
    PaymentInitiatedMessageE,
    PaymentReceiptConfirmed,
    PaymentReceivedMessageF,
    CooperativeCloseMessageG,
    BuyersCloseTimeout,
    SellersCloseTimeout,
    ProtocolError,
    PeerReportedError,
}

impl EventKind {
    /// Error-kind events resolve through the from-any transitions and take
    /// precedence over the ordinary table regardless of current state.
    pub fn is_error_kind(&self) -> bool {
        matches!(self, EventKind::ProtocolError | EventKind::PeerReportedError)
    }
}
