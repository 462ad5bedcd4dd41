use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, IntoStaticStr};

/// States a MuSig trade can be in, across all four role combinations.
/// `Init` is the single entry state; final states have no outgoing
/// transitions in any protocol table.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
    IntoStaticStr,
)]
pub enum TradeState {
    Init,

    // Trade setup handshake
    TakerInitializedTrade,
    MakerInitializedTrade,
    TakerSignedDepositTx,
    DepositTxBroadcast,
    DepositTxConfirmed,

    // Payment settlement
    BuyerInitiatedPayment,
    SellerConfirmedPaymentReceipt,

    // Cooperative closure
    BuyerAsTakerClosedTrade,
    BuyerAsMakerClosedTrade,
    SellerAsTakerClosedTrade,
    SellerAsMakerClosedTrade,

    // Uncooperative closure after timeout
    BuyerAsTakerForceClosedTrade,
    BuyerAsMakerForceClosedTrade,
    SellerAsTakerForceClosedTrade,
    SellerAsMakerForceClosedTrade,

    // Terminal failures
    Failed,
    FailedAtPeer,
}

impl TradeState {
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            TradeState::BuyerAsTakerClosedTrade
                | TradeState::BuyerAsMakerClosedTrade
                | TradeState::SellerAsTakerClosedTrade
                | TradeState::SellerAsMakerClosedTrade
                | TradeState::BuyerAsTakerForceClosedTrade
                | TradeState::BuyerAsMakerForceClosedTrade
                | TradeState::SellerAsTakerForceClosedTrade
                | TradeState::SellerAsMakerForceClosedTrade
                | TradeState::Failed
                | TradeState::FailedAtPeer
        )
    }
}
