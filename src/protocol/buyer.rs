use std::sync::OnceLock;

use crate::fsm::event::EventKind;
use crate::fsm::state::TradeState;
use crate::fsm::transition::{path, ProtocolBuilder, TransitionTable};
use crate::protocol::{error_edges, handlers, maker_setup, taker_setup};

/// Buyer settlement: initiate the fiat payment once the deposit is at least
/// broadcast, then either receive the seller's close signature in time or
/// force close on timeout.
fn buyer_settlement(
    builder: ProtocolBuilder,
    closed: TradeState,
    force_closed: TradeState,
) -> ProtocolBuilder {
    builder
        .from_states(&[TradeState::DepositTxBroadcast, TradeState::DepositTxConfirmed])
        .on(EventKind::PaymentInitiated)
        .run(handlers::payment_initiated)
        .to(TradeState::BuyerInitiatedPayment)
        .branch([
            path("cooperative close")
                .from(TradeState::BuyerInitiatedPayment)
                .on(EventKind::PaymentReceivedMessageF)
                .run(handlers::payment_received)
                .to(closed),
            path("uncooperative close")
                .from(TradeState::BuyerInitiatedPayment)
                .on(EventKind::BuyersCloseTimeout)
                .run(handlers::force_close)
                .to(force_closed),
        ])
}

pub fn buyer_as_taker() -> &'static TransitionTable {
    static TABLE: OnceLock<TransitionTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let builder = taker_setup(ProtocolBuilder::new());
        let builder = buyer_settlement(
            builder,
            TradeState::BuyerAsTakerClosedTrade,
            TradeState::BuyerAsTakerForceClosedTrade,
        );
        error_edges(builder).build()
    })
}

pub fn buyer_as_maker() -> &'static TransitionTable {
    static TABLE: OnceLock<TransitionTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let builder = maker_setup(ProtocolBuilder::new());
        let builder = buyer_settlement(
            builder,
            TradeState::BuyerAsMakerClosedTrade,
            TradeState::BuyerAsMakerForceClosedTrade,
        );
        error_edges(builder).build()
    })
}
