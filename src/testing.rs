use std::sync::atomic::{AtomicUsize, Ordering};

use iso_currency::Currency;
use uuid::Uuid;

use crate::common::error::MuswapError;
use crate::common::persist::TradePersister;
use crate::fsm::event::{CloseTimeoutKind, MessageEnvelope, TakeOfferEvent, TradeEvent};
use crate::message::{
    CooperativeCloseMessageG, NonceShares, PartialSignatures, PaymentInitiatedMessageE,
    PaymentReceivedMessageF, PeerReportedErrorMessage, SetupTradeMessageA, SetupTradeMessageB,
    SetupTradeMessageC, SetupTradeMessageD, TradeMessage,
};
use crate::trade::{Direction, PeerId, TradeContract};

/// Canned trade parameters shared across tests. The maker sells, so the
/// taker side of this contract is the buyer.
pub struct SomeTestTradeParams {}

impl SomeTestTradeParams {
    pub fn trade_uuid() -> Uuid {
        Uuid::from_u128(0x1ec0_ffee_dead_beef_cafe_babe_f00d_face)
    }

    pub fn maker_peer_id() -> PeerId {
        PeerId::new("maker-peer-1")
    }

    pub fn taker_peer_id() -> PeerId {
        PeerId::new("taker-peer-1")
    }

    pub fn contract() -> TradeContract {
        TradeContract {
            trade_uuid: Self::trade_uuid(),
            offer_id: "some-offer-id".to_string(),
            maker_peer_id: Self::maker_peer_id(),
            taker_peer_id: Self::taker_peer_id(),
            maker_direction: Direction::Sell,
            amount_sats: 1_000_000,
            fiat_amount: 460,
            fiat_currency: Currency::USD,
            payment_method: "SEPA".to_string(),
        }
    }

    pub fn take_offer_event() -> TradeEvent {
        TradeEvent::TakeOffer(TakeOfferEvent {
            contract: Self::contract(),
        })
    }

    pub fn setup_trade_a_event() -> TradeEvent {
        TradeEvent::Message(MessageEnvelope {
            from: Self::taker_peer_id(),
            message: TradeMessage::SetupTradeA(SetupTradeMessageA {
                trade_uuid: Self::trade_uuid(),
                contract: Self::contract(),
                takers_nonce_shares: NonceShares::generate(),
            }),
        })
    }

    pub fn setup_trade_b_event() -> TradeEvent {
        TradeEvent::Message(MessageEnvelope {
            from: Self::maker_peer_id(),
            message: TradeMessage::SetupTradeB(SetupTradeMessageB {
                trade_uuid: Self::trade_uuid(),
                makers_nonce_shares: NonceShares::generate(),
                makers_partial_signatures: PartialSignatures::generate(),
            }),
        })
    }

    pub fn setup_trade_c_event() -> TradeEvent {
        TradeEvent::Message(MessageEnvelope {
            from: Self::taker_peer_id(),
            message: TradeMessage::SetupTradeC(SetupTradeMessageC {
                trade_uuid: Self::trade_uuid(),
                takers_partial_signatures: PartialSignatures::generate(),
            }),
        })
    }

    pub fn setup_trade_d_event() -> TradeEvent {
        TradeEvent::Message(MessageEnvelope {
            from: Self::maker_peer_id(),
            message: TradeMessage::SetupTradeD(SetupTradeMessageD {
                trade_uuid: Self::trade_uuid(),
                deposit_txid: "some-deposit-txid".to_string(),
            }),
        })
    }

    pub fn deposit_confirmed_event() -> TradeEvent {
        TradeEvent::DepositTxConfirmed {
            trade_uuid: Self::trade_uuid(),
            txid: "some-deposit-txid".to_string(),
        }
    }

    pub fn payment_initiated_event() -> TradeEvent {
        TradeEvent::PaymentInitiated {
            trade_uuid: Self::trade_uuid(),
            payment_reference: Some("wire-ref-42".to_string()),
        }
    }

    pub fn payment_initiated_message_event() -> TradeEvent {
        TradeEvent::Message(MessageEnvelope {
            from: Self::taker_peer_id(),
            message: TradeMessage::PaymentInitiatedE(PaymentInitiatedMessageE {
                trade_uuid: Self::trade_uuid(),
                payment_reference: Some("wire-ref-42".to_string()),
            }),
        })
    }

    pub fn payment_received_event() -> TradeEvent {
        TradeEvent::Message(MessageEnvelope {
            from: Self::maker_peer_id(),
            message: TradeMessage::PaymentReceivedF(PaymentReceivedMessageF {
                trade_uuid: Self::trade_uuid(),
                sellers_close_signature: PartialSignatures::generate(),
            }),
        })
    }

    pub fn payment_receipt_confirmed_event() -> TradeEvent {
        TradeEvent::PaymentReceiptConfirmed {
            trade_uuid: Self::trade_uuid(),
        }
    }

    pub fn cooperative_close_event() -> TradeEvent {
        TradeEvent::Message(MessageEnvelope {
            from: Self::taker_peer_id(),
            message: TradeMessage::CooperativeCloseG(CooperativeCloseMessageG {
                trade_uuid: Self::trade_uuid(),
                buyers_close_signature: PartialSignatures::generate(),
            }),
        })
    }

    pub fn close_timeout_event(kind: CloseTimeoutKind) -> TradeEvent {
        TradeEvent::CloseTimeout {
            trade_uuid: Self::trade_uuid(),
            kind,
        }
    }

    pub fn peer_error_event() -> TradeEvent {
        TradeEvent::Message(MessageEnvelope {
            from: Self::maker_peer_id(),
            message: TradeMessage::PeerReportedError(PeerReportedErrorMessage {
                trade_uuid: Self::trade_uuid(),
                error_message: "peer gave up".to_string(),
            }),
        })
    }
}

/// Persister that only counts calls. Lets tests assert that every committed
/// transition, and nothing else, was persisted.
#[derive(Default)]
pub struct CountingPersister {
    count: AtomicUsize,
}

impl CountingPersister {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl TradePersister for CountingPersister {
    fn persist(&self, _trade: &crate::trade::TradeModel) -> Result<(), MuswapError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
