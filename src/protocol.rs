pub mod buyer;
pub mod handlers;
pub mod seller;

use crate::fsm::event::EventKind;
use crate::fsm::state::TradeState;
use crate::fsm::transition::{ProtocolBuilder, TransitionTable};
use crate::trade::TradeRole;

/// The protocol table driving trades of the given role. Tables are built
/// once and shared read-only across every trade of that role.
pub fn table_for(role: TradeRole) -> &'static TransitionTable {
    match role {
        TradeRole::BuyerAsTaker => buyer::buyer_as_taker(),
        TradeRole::BuyerAsMaker => buyer::buyer_as_maker(),
        TradeRole::SellerAsTaker => seller::seller_as_taker(),
        TradeRole::SellerAsMaker => seller::seller_as_maker(),
    }
}

/// Setup handshake as seen by the taker, through to a confirmed deposit.
fn taker_setup(builder: ProtocolBuilder) -> ProtocolBuilder {
    builder
        .from(TradeState::Init)
        .on(EventKind::TakeOffer)
        .run(handlers::take_offer)
        .to(TradeState::TakerInitializedTrade)
        .then()
        .on(EventKind::SetupTradeMessageB)
        .run(handlers::setup_trade_b)
        .to(TradeState::TakerSignedDepositTx)
        .then()
        .on(EventKind::SetupTradeMessageD)
        .run(handlers::setup_trade_d)
        .to(TradeState::DepositTxBroadcast)
        .then()
        .on(EventKind::DepositTxConfirmed)
        .run(handlers::deposit_confirmed)
        .to(TradeState::DepositTxConfirmed)
}

/// Setup handshake as seen by the maker, through to a confirmed deposit.
fn maker_setup(builder: ProtocolBuilder) -> ProtocolBuilder {
    builder
        .from(TradeState::Init)
        .on(EventKind::SetupTradeMessageA)
        .run(handlers::setup_trade_a)
        .to(TradeState::MakerInitializedTrade)
        .then()
        .on(EventKind::SetupTradeMessageC)
        .run(handlers::setup_trade_c)
        .to(TradeState::DepositTxBroadcast)
        .then()
        .on(EventKind::DepositTxConfirmed)
        .run(handlers::deposit_confirmed)
        .to(TradeState::DepositTxConfirmed)
}

/// Error edges every role shares: a local handler failure fails the trade
/// here (and is reported to the peer), a reported peer failure fails it
/// there.
fn error_edges(builder: ProtocolBuilder) -> ProtocolBuilder {
    builder
        .from_any()
        .on(EventKind::ProtocolError)
        .run(handlers::local_failure)
        .to(TradeState::Failed)
        .from_any()
        .on(EventKind::PeerReportedError)
        .run(handlers::peer_failure)
        .to(TradeState::FailedAtPeer)
}
