use serde::{Deserialize, Serialize};
use strum_macros::{Display, IntoStaticStr};
use uuid::Uuid;

use crate::trade::TradeContract;

/// Opaque aggregate of public nonce shares for the MuSig signing sessions of
/// one trade. Produced by the wallet collaborator; the engine never looks
/// inside.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceShares(String);

impl NonceShares {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

/// Opaque aggregate of partial signatures over the jointly funded deposit
/// and swap transactions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialSignatures(String);

impl PartialSignatures {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SetupTradeMessageA {
    pub trade_uuid: Uuid,
    pub contract: TradeContract,
    pub takers_nonce_shares: NonceShares,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SetupTradeMessageB {
    pub trade_uuid: Uuid,
    pub makers_nonce_shares: NonceShares,
    pub makers_partial_signatures: PartialSignatures,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SetupTradeMessageC {
    pub trade_uuid: Uuid,
    pub takers_partial_signatures: PartialSignatures,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SetupTradeMessageD {
    pub trade_uuid: Uuid,
    pub deposit_txid: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentInitiatedMessageE {
    pub trade_uuid: Uuid,
    pub payment_reference: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentReceivedMessageF {
    pub trade_uuid: Uuid,
    pub sellers_close_signature: PartialSignatures,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CooperativeCloseMessageG {
    pub trade_uuid: Uuid,
    pub buyers_close_signature: PartialSignatures,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeerReportedErrorMessage {
    pub trade_uuid: Uuid,
    pub error_message: String,
}

/// Protocol messages exchanged between the two peers of one trade.
/// Serialization and transport are the messaging collaborator's concern.
#[derive(Clone, Debug, Serialize, Deserialize, Display, IntoStaticStr)]
pub enum TradeMessage {
    SetupTradeA(SetupTradeMessageA),
    SetupTradeB(SetupTradeMessageB),
    SetupTradeC(SetupTradeMessageC),
    SetupTradeD(SetupTradeMessageD),
    PaymentInitiatedE(PaymentInitiatedMessageE),
    PaymentReceivedF(PaymentReceivedMessageF),
    CooperativeCloseG(CooperativeCloseMessageG),
    PeerReportedError(PeerReportedErrorMessage),
}

impl TradeMessage {
    pub fn trade_uuid(&self) -> Uuid {
        match self {
            TradeMessage::SetupTradeA(msg) => msg.trade_uuid,
            TradeMessage::SetupTradeB(msg) => msg.trade_uuid,
            TradeMessage::SetupTradeC(msg) => msg.trade_uuid,
            TradeMessage::SetupTradeD(msg) => msg.trade_uuid,
            TradeMessage::PaymentInitiatedE(msg) => msg.trade_uuid,
            TradeMessage::PaymentReceivedF(msg) => msg.trade_uuid,
            TradeMessage::CooperativeCloseG(msg) => msg.trade_uuid,
            TradeMessage::PeerReportedError(msg) => msg.trade_uuid,
        }
    }
}
