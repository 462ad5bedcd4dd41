use std::sync::OnceLock;

use crate::fsm::event::EventKind;
use crate::fsm::state::TradeState;
use crate::fsm::transition::{path, ProtocolBuilder, TransitionTable};
use crate::protocol::{error_edges, handlers, maker_setup, taker_setup};

/// Seller settlement: learn of the buyer's payment, confirm receipt and
/// release the close signature, then either see the buyer close in time or
/// force close on timeout.
fn seller_settlement(
    builder: ProtocolBuilder,
    closed: TradeState,
    force_closed: TradeState,
) -> ProtocolBuilder {
    builder
        .from_states(&[TradeState::DepositTxBroadcast, TradeState::DepositTxConfirmed])
        .on(EventKind::PaymentInitiatedMessageE)
        .run(handlers::payment_initiated_received)
        .to(TradeState::BuyerInitiatedPayment)
        .then()
        .on(EventKind::PaymentReceiptConfirmed)
        .run(handlers::payment_receipt_confirmed)
        .to(TradeState::SellerConfirmedPaymentReceipt)
        .branch([
            path("cooperative close")
                .from(TradeState::SellerConfirmedPaymentReceipt)
                .on(EventKind::CooperativeCloseMessageG)
                .run(handlers::cooperative_close)
                .to(closed),
            path("uncooperative close")
                .from(TradeState::SellerConfirmedPaymentReceipt)
                .on(EventKind::SellersCloseTimeout)
                .run(handlers::force_close)
                .to(force_closed),
        ])
}

pub fn seller_as_taker() -> &'static TransitionTable {
    static TABLE: OnceLock<TransitionTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let builder = taker_setup(ProtocolBuilder::new());
        let builder = seller_settlement(
            builder,
            TradeState::SellerAsTakerClosedTrade,
            TradeState::SellerAsTakerForceClosedTrade,
        );
        error_edges(builder).build()
    })
}

pub fn seller_as_maker() -> &'static TransitionTable {
    static TABLE: OnceLock<TransitionTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let builder = maker_setup(ProtocolBuilder::new());
        let builder = seller_settlement(
            builder,
            TradeState::SellerAsMakerClosedTrade,
            TradeState::SellerAsMakerForceClosedTrade,
        );
        error_edges(builder).build()
    })
}
