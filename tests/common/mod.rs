#![allow(dead_code)]

use std::path::PathBuf;

use tokio::sync::mpsc;
use uuid::Uuid;

use muswap::comms::{CommsAccess, OutboundEnvelope, ServiceHandles, TimerAccess, TimerRequest};
use muswap::dispatcher::{Dispatcher, ProcessingResult};
use muswap::fsm::engine::TransitionOutcome;
use muswap::fsm::event::{MessageEnvelope, TradeEvent};
use muswap::trade::PeerId;

pub fn test_data_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("muswap-test-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Service handles wired to inspectable channels, for driving an engine
/// directly.
pub fn engine_services() -> (
    ServiceHandles,
    mpsc::Receiver<OutboundEnvelope>,
    mpsc::Receiver<TimerRequest>,
) {
    let (comms_tx, comms_rx) = mpsc::channel(64);
    let (timer_tx, timer_rx) = mpsc::channel(64);
    (
        ServiceHandles::new(CommsAccess::new(comms_tx), TimerAccess::new(timer_tx)),
        comms_rx,
        timer_rx,
    )
}

pub fn unwrap_outcome(result: ProcessingResult) -> TransitionOutcome {
    match result {
        ProcessingResult::Handled(outcome) => outcome,
        ProcessingResult::UnknownTrade(trade_uuid) => {
            panic!("trade {} unexpectedly unknown", trade_uuid)
        }
    }
}

/// One party's dispatcher with its outbound message and timer channels held
/// open for inspection and forwarding.
pub struct TestNode {
    pub dispatcher: Dispatcher,
    pub comms_rx: mpsc::Receiver<OutboundEnvelope>,
    pub timer_rx: mpsc::Receiver<TimerRequest>,
    pub peer_id: PeerId,
    pub data_dir: PathBuf,
}

impl TestNode {
    pub fn start(peer_id: PeerId) -> Self {
        Self::start_at(test_data_dir(), peer_id)
    }

    pub fn start_at(data_dir: PathBuf, peer_id: PeerId) -> Self {
        let (comms_tx, comms_rx) = mpsc::channel(64);
        let (timer_tx, timer_rx) = mpsc::channel(64);
        let services =
            ServiceHandles::new(CommsAccess::new(comms_tx), TimerAccess::new(timer_tx));
        let dispatcher = Dispatcher::new(&data_dir, services);
        Self {
            dispatcher,
            comms_rx,
            timer_rx,
            peer_id,
            data_dir,
        }
    }

    /// Forward every pending outbound message to the counterparty's
    /// dispatcher, standing in for the network. Returns the outcomes the
    /// counterparty produced.
    pub async fn deliver_outbound(&mut self, to: &mut TestNode) -> Vec<TransitionOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(envelope) = self.comms_rx.try_recv() {
            assert_eq!(envelope.to, to.peer_id, "message addressed to wrong peer");
            let event = TradeEvent::Message(MessageEnvelope {
                from: self.peer_id.clone(),
                message: envelope.message,
            });
            outcomes.push(unwrap_outcome(to.dispatcher.dispatch(event).await.unwrap()));
        }
        outcomes
    }

    pub async fn stop(mut self) {
        self.dispatcher.shutdown().await.unwrap();
        self.comms_rx.close();
        self.timer_rx.close();
        std::fs::remove_dir_all(&self.data_dir).ok();
    }
}
