use iso_currency::Currency;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::fsm::state::TradeState;
use crate::message::{NonceShares, PartialSignatures};

/// Network-level identity of a peer, as handed to the messaging collaborator.
/// Opaque to the engine; the transport layer decides what it means.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, IntoStaticStr)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn is_buy(&self) -> bool {
        matches!(self, Direction::Buy)
    }

    pub fn flipped(&self) -> Direction {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
        }
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
    IntoStaticStr,
)]
pub enum TradeRole {
    BuyerAsMaker,
    BuyerAsTaker,
    SellerAsMaker,
    SellerAsTaker,
}

impl TradeRole {
    pub fn from_contract(maker_direction: Direction, is_taker: bool) -> Self {
        let is_buyer = if is_taker {
            maker_direction.flipped().is_buy()
        } else {
            maker_direction.is_buy()
        };
        match (is_buyer, is_taker) {
            (true, true) => TradeRole::BuyerAsTaker,
            (true, false) => TradeRole::BuyerAsMaker,
            (false, true) => TradeRole::SellerAsTaker,
            (false, false) => TradeRole::SellerAsMaker,
        }
    }

    pub fn is_buyer(&self) -> bool {
        matches!(self, TradeRole::BuyerAsMaker | TradeRole::BuyerAsTaker)
    }

    pub fn is_taker(&self) -> bool {
        matches!(self, TradeRole::BuyerAsTaker | TradeRole::SellerAsTaker)
    }
}

/// Negotiated terms both peers committed to when the offer was taken.
/// Immutable for the lifetime of the trade.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TradeContract {
    pub trade_uuid: Uuid,
    pub offer_id: String,
    pub maker_peer_id: PeerId,
    pub taker_peer_id: PeerId,
    pub maker_direction: Direction,
    pub amount_sats: u64,
    pub fiat_amount: u64,
    pub fiat_currency: Currency,
    pub payment_method: String,
}

/// Cryptographic material one side contributes across the setup handshake.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TradeParty {
    pub nonce_shares: Option<NonceShares>,
    pub partial_signatures: Option<PartialSignatures>,
}

/// The persisted aggregate the protocol engine drives. Owned exclusively by
/// its engine instance while processing; mutated only inside handlers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TradeModel {
    contract: TradeContract,
    role: TradeRole,
    state: TradeState,
    maker: TradeParty,
    taker: TradeParty,
    deposit_txid: Option<String>,
    swap_txid: Option<String>,
    payment_reference: Option<String>,
    error_message: Option<String>,
    peer_error_message: Option<String>,
}

impl TradeModel {
    pub fn new(contract: TradeContract, role: TradeRole) -> Self {
        Self {
            contract,
            role,
            state: TradeState::Init,
            maker: TradeParty::default(),
            taker: TradeParty::default(),
            deposit_txid: None,
            swap_txid: None,
            payment_reference: None,
            error_message: None,
            peer_error_message: None,
        }
    }

    pub fn trade_uuid(&self) -> Uuid {
        self.contract.trade_uuid
    }

    pub fn role(&self) -> TradeRole {
        self.role
    }

    pub fn contract(&self) -> &TradeContract {
        &self.contract
    }

    pub fn state(&self) -> TradeState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: TradeState) {
        self.state = state;
    }

    /// The counterparty this trade talks to.
    pub fn peer_id(&self) -> PeerId {
        if self.role.is_taker() {
            self.contract.maker_peer_id.clone()
        } else {
            self.contract.taker_peer_id.clone()
        }
    }

    pub fn my_party(&self) -> &TradeParty {
        if self.role.is_taker() {
            &self.taker
        } else {
            &self.maker
        }
    }

    pub fn my_party_mut(&mut self) -> &mut TradeParty {
        if self.role.is_taker() {
            &mut self.taker
        } else {
            &mut self.maker
        }
    }

    pub fn peer_party(&self) -> &TradeParty {
        if self.role.is_taker() {
            &self.maker
        } else {
            &self.taker
        }
    }

    pub fn peer_party_mut(&mut self) -> &mut TradeParty {
        if self.role.is_taker() {
            &mut self.maker
        } else {
            &mut self.taker
        }
    }

    pub fn deposit_txid(&self) -> Option<&str> {
        self.deposit_txid.as_deref()
    }

    pub(crate) fn set_deposit_txid(&mut self, txid: impl Into<String>) {
        self.deposit_txid = Some(txid.into());
    }

    pub fn swap_txid(&self) -> Option<&str> {
        self.swap_txid.as_deref()
    }

    pub(crate) fn set_swap_txid(&mut self, txid: impl Into<String>) {
        self.swap_txid = Some(txid.into());
    }

    pub fn payment_reference(&self) -> Option<&str> {
        self.payment_reference.as_deref()
    }

    pub(crate) fn set_payment_reference(&mut self, reference: impl Into<String>) {
        self.payment_reference = Some(reference.into());
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub(crate) fn set_error_message(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
    }

    pub fn peer_error_message(&self) -> Option<&str> {
        self.peer_error_message.as_deref()
    }

    pub(crate) fn set_peer_error_message(&mut self, message: impl Into<String>) {
        self.peer_error_message = Some(message.into());
    }
}
