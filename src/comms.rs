use tokio::sync::mpsc;
use uuid::Uuid;

use crate::common::error::MuswapError;
use crate::fsm::event::CloseTimeoutKind;
use crate::message::TradeMessage;
use crate::trade::PeerId;

/// Protocol message on its way out to the counterparty. The transport layer
/// owns serialization and delivery.
#[derive(Clone, Debug)]
pub struct OutboundEnvelope {
    pub to: PeerId,
    pub message: TradeMessage,
}

/// Handle into the messaging collaborator. Cloned into every engine.
#[derive(Clone)]
pub struct CommsAccess {
    tx: mpsc::Sender<OutboundEnvelope>,
}

impl CommsAccess {
    pub fn new(tx: mpsc::Sender<OutboundEnvelope>) -> Self {
        Self { tx }
    }

    pub async fn send_message(
        &self,
        to: PeerId,
        message: TradeMessage,
    ) -> Result<(), MuswapError> {
        self.tx.send(OutboundEnvelope { to, message }).await?;
        Ok(())
    }
}

/// Requests to the external scheduling collaborator. The scheduler delivers
/// the resulting `CloseTimeout` events back through the dispatcher like any
/// other event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimerRequest {
    StartCloseTimeout {
        trade_uuid: Uuid,
        kind: CloseTimeoutKind,
    },
    StopCloseTimeout {
        trade_uuid: Uuid,
    },
}

#[derive(Clone)]
pub struct TimerAccess {
    tx: mpsc::Sender<TimerRequest>,
}

impl TimerAccess {
    pub fn new(tx: mpsc::Sender<TimerRequest>) -> Self {
        Self { tx }
    }

    pub async fn start_close_timeout(
        &self,
        trade_uuid: Uuid,
        kind: CloseTimeoutKind,
    ) -> Result<(), MuswapError> {
        self.tx
            .send(TimerRequest::StartCloseTimeout { trade_uuid, kind })
            .await?;
        Ok(())
    }

    pub async fn stop_close_timeout(&self, trade_uuid: Uuid) -> Result<(), MuswapError> {
        self.tx
            .send(TimerRequest::StopCloseTimeout { trade_uuid })
            .await?;
        Ok(())
    }
}

/// Shared services every handler gets access to.
#[derive(Clone)]
pub struct ServiceHandles {
    pub comms: CommsAccess,
    pub timers: TimerAccess,
}

impl ServiceHandles {
    pub fn new(comms: CommsAccess, timers: TimerAccess) -> Self {
        Self { comms, timers }
    }
}
