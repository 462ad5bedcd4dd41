use tracing::{info, warn};
use uuid::Uuid;

use crate::comms::ServiceHandles;
use crate::common::error::ProtocolError;
use crate::fsm::event::{CloseTimeoutKind, TradeEvent};
use crate::fsm::transition::HandlerResult;
use crate::message::{
    CooperativeCloseMessageG, NonceShares, PartialSignatures, PaymentInitiatedMessageE,
    PaymentReceivedMessageF, PeerReportedErrorMessage, SetupTradeMessageA, SetupTradeMessageB,
    SetupTradeMessageC, SetupTradeMessageD, TradeMessage,
};
use crate::trade::TradeModel;

fn unexpected(event: &TradeEvent) -> ProtocolError {
    ProtocolError::new(format!(
        "Unexpected payload for event {} on trade {}",
        event.kind(),
        event.trade_uuid()
    ))
}

// Stand-in for the wallet collaborator broadcasting a transaction.
fn fresh_txid() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Taker takes the offer: contribute nonce shares and open the setup
/// handshake with `SetupTradeMessage_A`.
pub fn take_offer<'a>(
    trade: &'a mut TradeModel,
    event: &'a TradeEvent,
    services: &'a ServiceHandles,
) -> HandlerResult<'a> {
    Box::pin(async move {
        let TradeEvent::TakeOffer(take_offer) = event else {
            return Err(unexpected(event));
        };
        let nonce_shares = NonceShares::generate();
        trade.my_party_mut().nonce_shares = Some(nonce_shares.clone());
        services
            .comms
            .send_message(
                trade.peer_id(),
                TradeMessage::SetupTradeA(SetupTradeMessageA {
                    trade_uuid: take_offer.contract.trade_uuid,
                    contract: take_offer.contract.clone(),
                    takers_nonce_shares: nonce_shares,
                }),
            )
            .await?;
        info!(
            "Trade {} taken as {} against offer {}",
            trade.trade_uuid(),
            trade.role(),
            take_offer.contract.offer_id
        );
        Ok(())
    })
}

/// Maker receives `A`: adopt the taker's nonce shares, contribute its own
/// shares and partial signatures, answer with `B`.
pub fn setup_trade_a<'a>(
    trade: &'a mut TradeModel,
    event: &'a TradeEvent,
    services: &'a ServiceHandles,
) -> HandlerResult<'a> {
    Box::pin(async move {
        let TradeEvent::Message(envelope) = event else {
            return Err(unexpected(event));
        };
        let TradeMessage::SetupTradeA(message) = &envelope.message else {
            return Err(unexpected(event));
        };
        trade.peer_party_mut().nonce_shares = Some(message.takers_nonce_shares.clone());

        let nonce_shares = NonceShares::generate();
        let partial_signatures = PartialSignatures::generate();
        let my_party = trade.my_party_mut();
        my_party.nonce_shares = Some(nonce_shares.clone());
        my_party.partial_signatures = Some(partial_signatures.clone());

        services
            .comms
            .send_message(
                trade.peer_id(),
                TradeMessage::SetupTradeB(SetupTradeMessageB {
                    trade_uuid: message.trade_uuid,
                    makers_nonce_shares: nonce_shares,
                    makers_partial_signatures: partial_signatures,
                }),
            )
            .await?;
        Ok(())
    })
}

/// Taker receives `B`: adopt the maker's material, sign the deposit tx and
/// answer with `C`.
pub fn setup_trade_b<'a>(
    trade: &'a mut TradeModel,
    event: &'a TradeEvent,
    services: &'a ServiceHandles,
) -> HandlerResult<'a> {
    Box::pin(async move {
        let TradeEvent::Message(envelope) = event else {
            return Err(unexpected(event));
        };
        let TradeMessage::SetupTradeB(message) = &envelope.message else {
            return Err(unexpected(event));
        };
        let peer_party = trade.peer_party_mut();
        peer_party.nonce_shares = Some(message.makers_nonce_shares.clone());
        peer_party.partial_signatures = Some(message.makers_partial_signatures.clone());

        let partial_signatures = PartialSignatures::generate();
        trade.my_party_mut().partial_signatures = Some(partial_signatures.clone());

        services
            .comms
            .send_message(
                trade.peer_id(),
                TradeMessage::SetupTradeC(SetupTradeMessageC {
                    trade_uuid: message.trade_uuid,
                    takers_partial_signatures: partial_signatures,
                }),
            )
            .await?;
        Ok(())
    })
}

/// Maker receives `C`: with both sides' signatures the deposit tx is
/// complete. Broadcast it and tell the taker with `D`.
pub fn setup_trade_c<'a>(
    trade: &'a mut TradeModel,
    event: &'a TradeEvent,
    services: &'a ServiceHandles,
) -> HandlerResult<'a> {
    Box::pin(async move {
        let TradeEvent::Message(envelope) = event else {
            return Err(unexpected(event));
        };
        let TradeMessage::SetupTradeC(message) = &envelope.message else {
            return Err(unexpected(event));
        };
        trade.peer_party_mut().partial_signatures =
            Some(message.takers_partial_signatures.clone());

        let deposit_txid = fresh_txid();
        trade.set_deposit_txid(deposit_txid.clone());
        info!(
            "Trade {} deposit tx {} broadcast",
            trade.trade_uuid(),
            deposit_txid
        );

        services
            .comms
            .send_message(
                trade.peer_id(),
                TradeMessage::SetupTradeD(SetupTradeMessageD {
                    trade_uuid: message.trade_uuid,
                    deposit_txid,
                }),
            )
            .await?;
        Ok(())
    })
}

/// Taker receives `D`: record the broadcast deposit tx.
pub fn setup_trade_d<'a>(
    trade: &'a mut TradeModel,
    event: &'a TradeEvent,
    _services: &'a ServiceHandles,
) -> HandlerResult<'a> {
    Box::pin(async move {
        let TradeEvent::Message(envelope) = event else {
            return Err(unexpected(event));
        };
        let TradeMessage::SetupTradeD(message) = &envelope.message else {
            return Err(unexpected(event));
        };
        trade.set_deposit_txid(message.deposit_txid.clone());
        Ok(())
    })
}

pub fn deposit_confirmed<'a>(
    trade: &'a mut TradeModel,
    event: &'a TradeEvent,
    _services: &'a ServiceHandles,
) -> HandlerResult<'a> {
    Box::pin(async move {
        let TradeEvent::DepositTxConfirmed { txid, .. } = event else {
            return Err(unexpected(event));
        };
        trade.set_deposit_txid(txid.clone());
        info!("Trade {} deposit tx {} confirmed", trade.trade_uuid(), txid);
        Ok(())
    })
}

/// Buyer started the fiat payment: tell the seller with `E` and arm the
/// cooperative-close timeout awaiting `F`.
pub fn payment_initiated<'a>(
    trade: &'a mut TradeModel,
    event: &'a TradeEvent,
    services: &'a ServiceHandles,
) -> HandlerResult<'a> {
    Box::pin(async move {
        let TradeEvent::PaymentInitiated {
            payment_reference, ..
        } = event
        else {
            return Err(unexpected(event));
        };
        if let Some(reference) = payment_reference {
            trade.set_payment_reference(reference.clone());
        }
        services
            .comms
            .send_message(
                trade.peer_id(),
                TradeMessage::PaymentInitiatedE(PaymentInitiatedMessageE {
                    trade_uuid: trade.trade_uuid(),
                    payment_reference: payment_reference.clone(),
                }),
            )
            .await?;
        services
            .timers
            .start_close_timeout(trade.trade_uuid(), CloseTimeoutKind::BuyersCooperativeClose)
            .await?;
        Ok(())
    })
}

/// Seller receives `E`: the buyer claims the fiat payment is on its way.
pub fn payment_initiated_received<'a>(
    trade: &'a mut TradeModel,
    event: &'a TradeEvent,
    _services: &'a ServiceHandles,
) -> HandlerResult<'a> {
    Box::pin(async move {
        let TradeEvent::Message(envelope) = event else {
            return Err(unexpected(event));
        };
        let TradeMessage::PaymentInitiatedE(message) = &envelope.message else {
            return Err(unexpected(event));
        };
        if let Some(reference) = &message.payment_reference {
            trade.set_payment_reference(reference.clone());
        }
        Ok(())
    })
}

/// Seller confirmed the fiat arrived: release the close signature with `F`
/// and arm the timeout awaiting the buyer's `G`.
pub fn payment_receipt_confirmed<'a>(
    trade: &'a mut TradeModel,
    event: &'a TradeEvent,
    services: &'a ServiceHandles,
) -> HandlerResult<'a> {
    Box::pin(async move {
        let TradeEvent::PaymentReceiptConfirmed { .. } = event else {
            return Err(unexpected(event));
        };
        services
            .comms
            .send_message(
                trade.peer_id(),
                TradeMessage::PaymentReceivedF(PaymentReceivedMessageF {
                    trade_uuid: trade.trade_uuid(),
                    sellers_close_signature: PartialSignatures::generate(),
                }),
            )
            .await?;
        services
            .timers
            .start_close_timeout(
                trade.trade_uuid(),
                CloseTimeoutKind::SellersCooperativeClose,
            )
            .await?;
        Ok(())
    })
}

/// Buyer receives `F`: both close signatures are now available, broadcast
/// the swap tx, hand the buyer's signature back with `G` and disarm the
/// timeout.
pub fn payment_received<'a>(
    trade: &'a mut TradeModel,
    event: &'a TradeEvent,
    services: &'a ServiceHandles,
) -> HandlerResult<'a> {
    Box::pin(async move {
        let TradeEvent::Message(envelope) = event else {
            return Err(unexpected(event));
        };
        let TradeMessage::PaymentReceivedF(message) = &envelope.message else {
            return Err(unexpected(event));
        };
        let swap_txid = fresh_txid();
        trade.set_swap_txid(swap_txid.clone());
        info!(
            "Trade {} closing cooperatively, swap tx {} broadcast",
            trade.trade_uuid(),
            swap_txid
        );
        services
            .comms
            .send_message(
                trade.peer_id(),
                TradeMessage::CooperativeCloseG(CooperativeCloseMessageG {
                    trade_uuid: message.trade_uuid,
                    buyers_close_signature: PartialSignatures::generate(),
                }),
            )
            .await?;
        services.timers.stop_close_timeout(trade.trade_uuid()).await?;
        Ok(())
    })
}

/// Seller receives `G`: the buyer closed cooperatively; record the swap tx
/// and disarm the timeout.
pub fn cooperative_close<'a>(
    trade: &'a mut TradeModel,
    event: &'a TradeEvent,
    services: &'a ServiceHandles,
) -> HandlerResult<'a> {
    Box::pin(async move {
        let TradeEvent::Message(envelope) = event else {
            return Err(unexpected(event));
        };
        let TradeMessage::CooperativeCloseG(_) = &envelope.message else {
            return Err(unexpected(event));
        };
        trade.set_swap_txid(fresh_txid());
        services.timers.stop_close_timeout(trade.trade_uuid()).await?;
        Ok(())
    })
}

/// The counterparty never delivered its close message in time; take the
/// unilateral spending path.
pub fn force_close<'a>(
    trade: &'a mut TradeModel,
    event: &'a TradeEvent,
    _services: &'a ServiceHandles,
) -> HandlerResult<'a> {
    Box::pin(async move {
        let TradeEvent::CloseTimeout { kind, .. } = event else {
            return Err(unexpected(event));
        };
        let swap_txid = fresh_txid();
        trade.set_swap_txid(swap_txid.clone());
        warn!(
            "Trade {} close timeout {} expired, force closing with swap tx {}",
            trade.trade_uuid(),
            kind,
            swap_txid
        );
        Ok(())
    })
}

/// A handler on our side failed. Record the failure and report it to the
/// peer so its trade ends up failed-at-peer rather than hanging.
pub fn local_failure<'a>(
    trade: &'a mut TradeModel,
    event: &'a TradeEvent,
    services: &'a ServiceHandles,
) -> HandlerResult<'a> {
    Box::pin(async move {
        let TradeEvent::ProtocolError { message, .. } = event else {
            return Err(unexpected(event));
        };
        trade.set_error_message(message.clone());
        services.timers.stop_close_timeout(trade.trade_uuid()).await?;
        services
            .comms
            .send_message(
                trade.peer_id(),
                TradeMessage::PeerReportedError(PeerReportedErrorMessage {
                    trade_uuid: trade.trade_uuid(),
                    error_message: message.clone(),
                }),
            )
            .await?;
        Ok(())
    })
}

/// The counterparty reported a failure on its side.
pub fn peer_failure<'a>(
    trade: &'a mut TradeModel,
    event: &'a TradeEvent,
    services: &'a ServiceHandles,
) -> HandlerResult<'a> {
    Box::pin(async move {
        let TradeEvent::Message(envelope) = event else {
            return Err(unexpected(event));
        };
        let TradeMessage::PeerReportedError(message) = &envelope.message else {
            return Err(unexpected(event));
        };
        trade.set_peer_error_message(message.error_message.clone());
        warn!(
            "Trade {} failed at peer - {}",
            trade.trade_uuid(),
            message.error_message
        );
        services.timers.stop_close_timeout(trade.trade_uuid()).await?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    use crate::comms::{CommsAccess, TimerAccess, TimerRequest};
    use crate::testing::SomeTestTradeParams;
    use crate::trade::TradeRole;

    fn services() -> (
        ServiceHandles,
        mpsc::Receiver<crate::comms::OutboundEnvelope>,
        mpsc::Receiver<TimerRequest>,
    ) {
        let (comms_tx, comms_rx) = mpsc::channel(8);
        let (timer_tx, timer_rx) = mpsc::channel(8);
        (
            ServiceHandles::new(CommsAccess::new(comms_tx), TimerAccess::new(timer_tx)),
            comms_rx,
            timer_rx,
        )
    }

    #[tokio::test]
    async fn take_offer_sends_setup_a_to_maker() {
        let (services, mut comms_rx, _timer_rx) = services();
        let mut trade =
            TradeModel::new(SomeTestTradeParams::contract(), TradeRole::BuyerAsTaker);

        take_offer(&mut trade, &SomeTestTradeParams::take_offer_event(), &services)
            .await
            .unwrap();

        assert!(trade.my_party().nonce_shares.is_some());
        let envelope = comms_rx.try_recv().unwrap();
        assert_eq!(envelope.to, SomeTestTradeParams::maker_peer_id());
        assert!(matches!(envelope.message, TradeMessage::SetupTradeA(_)));
    }

    #[tokio::test]
    async fn payment_initiated_sends_e_and_arms_buyers_timeout() {
        let (services, mut comms_rx, mut timer_rx) = services();
        let mut trade =
            TradeModel::new(SomeTestTradeParams::contract(), TradeRole::BuyerAsTaker);

        payment_initiated(
            &mut trade,
            &SomeTestTradeParams::payment_initiated_event(),
            &services,
        )
        .await
        .unwrap();

        assert_eq!(trade.payment_reference(), Some("wire-ref-42"));
        let envelope = comms_rx.try_recv().unwrap();
        assert!(matches!(envelope.message, TradeMessage::PaymentInitiatedE(_)));
        assert_eq!(
            timer_rx.try_recv().unwrap(),
            TimerRequest::StartCloseTimeout {
                trade_uuid: trade.trade_uuid(),
                kind: CloseTimeoutKind::BuyersCooperativeClose,
            }
        );
    }

    #[tokio::test]
    async fn payment_received_closes_and_disarms_timeout() {
        let (services, mut comms_rx, mut timer_rx) = services();
        let mut trade =
            TradeModel::new(SomeTestTradeParams::contract(), TradeRole::BuyerAsTaker);

        payment_received(
            &mut trade,
            &SomeTestTradeParams::payment_received_event(),
            &services,
        )
        .await
        .unwrap();

        assert!(trade.swap_txid().is_some());
        let envelope = comms_rx.try_recv().unwrap();
        assert!(matches!(envelope.message, TradeMessage::CooperativeCloseG(_)));
        assert_eq!(
            timer_rx.try_recv().unwrap(),
            TimerRequest::StopCloseTimeout {
                trade_uuid: trade.trade_uuid(),
            }
        );
    }

    #[tokio::test]
    async fn local_failure_records_and_reports_to_peer() {
        let (services, mut comms_rx, _timer_rx) = services();
        let mut trade =
            TradeModel::new(SomeTestTradeParams::contract(), TradeRole::BuyerAsTaker);
        let event = TradeEvent::ProtocolError {
            trade_uuid: trade.trade_uuid(),
            message: "deposit signing failed".to_string(),
        };

        local_failure(&mut trade, &event, &services).await.unwrap();

        assert_eq!(trade.error_message(), Some("deposit signing failed"));
        let envelope = comms_rx.try_recv().unwrap();
        assert_eq!(envelope.to, SomeTestTradeParams::maker_peer_id());
        match envelope.message {
            TradeMessage::PeerReportedError(message) => {
                assert_eq!(message.error_message, "deposit signing failed");
            }
            other => panic!("unexpected outbound message {}", other),
        }
    }

    #[tokio::test]
    async fn mismatched_payload_is_a_protocol_error() {
        let (services, _comms_rx, _timer_rx) = services();
        let mut trade =
            TradeModel::new(SomeTestTradeParams::contract(), TradeRole::BuyerAsTaker);

        let result = setup_trade_d(
            &mut trade,
            &SomeTestTradeParams::take_offer_event(),
            &services,
        )
        .await;
        assert!(result.is_err());
        assert!(trade.deposit_txid().is_none());
    }
}
