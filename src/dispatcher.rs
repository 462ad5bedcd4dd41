use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::comms::ServiceHandles;
use crate::common::error::MuswapError;
use crate::common::persist::JsonFilePersister;
use crate::fsm::engine::{ProtocolEngine, TransitionOutcome};
use crate::fsm::event::TradeEvent;
use crate::message::TradeMessage;
use crate::protocol::table_for;
use crate::trade::{TradeModel, TradeRole};

const ENGINE_REQUEST_CHANNEL_SIZE: usize = 32;

/// Outcome of routing one event through the dispatcher.
#[derive(Debug)]
pub enum ProcessingResult {
    Handled(TransitionOutcome),
    /// No live trade with this id, and the event is not one that creates a
    /// trade. Logged and discarded.
    UnknownTrade(Uuid),
}

enum EngineRequest {
    Process {
        event: TradeEvent,
        rsp_tx: oneshot::Sender<Result<TransitionOutcome, MuswapError>>,
    },
    QueryTrade {
        rsp_tx: oneshot::Sender<TradeModel>,
    },
    Shutdown {
        rsp_tx: oneshot::Sender<()>,
    },
}

/// Actor task owning one `ProtocolEngine`. The mpsc request channel gives
/// each trade a FIFO of events and at most one transition in flight, while
/// separate trades progress in parallel.
struct EngineActor {
    rx: mpsc::Receiver<EngineRequest>,
    engine: ProtocolEngine,
}

impl EngineActor {
    async fn run(mut self) {
        while let Some(request) = self.rx.recv().await {
            match request {
                EngineRequest::Process { event, rsp_tx } => {
                    let result = self.engine.process(&event).await;
                    if rsp_tx.send(result).is_err() {
                        warn!(
                            "Trade {} processing result dropped, requester gone",
                            self.engine.trade().trade_uuid()
                        );
                    }
                }
                EngineRequest::QueryTrade { rsp_tx } => {
                    let _ = rsp_tx.send(self.engine.trade().clone());
                }
                EngineRequest::Shutdown { rsp_tx } => {
                    let _ = rsp_tx.send(());
                    return;
                }
            }
        }
    }
}

struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
    task_handle: tokio::task::JoinHandle<()>,
}

impl EngineHandle {
    async fn shutdown(self) -> Result<(), MuswapError> {
        let (rsp_tx, rsp_rx) = oneshot::channel();
        self.tx.send(EngineRequest::Shutdown { rsp_tx }).await?;
        rsp_rx.await?;
        let _ = self.task_handle.await;
        Ok(())
    }
}

/// Routes every event of the node to the engine of its trade, creating
/// engines for trade-opening events and retiring them once the trade reaches
/// a terminal state. The persisted record outlives the engine.
pub struct Dispatcher {
    data_dir: PathBuf,
    services: ServiceHandles,
    engines: RwLock<HashMap<Uuid, EngineHandle>>,
}

impl Dispatcher {
    pub fn new(data_dir: impl AsRef<Path>, services: ServiceHandles) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            services,
            engines: RwLock::new(HashMap::new()),
        }
    }

    /// Route one event. Creates the trade for `TakeOffer` (taker side) and
    /// `SetupTradeMessage_A` (maker side); anything else for an unknown
    /// trade id is discarded.
    pub async fn dispatch(&self, event: TradeEvent) -> Result<ProcessingResult, MuswapError> {
        let trade_uuid = event.trade_uuid();
        let tx = match self.engine_tx(trade_uuid).await {
            Some(tx) => tx,
            None => match self.trade_opening_model(&event) {
                Some(trade) => self.spawn_engine(trade).await,
                None => {
                    warn!(
                        "No trade {} known for event {}, discarding",
                        trade_uuid,
                        event.kind()
                    );
                    return Ok(ProcessingResult::UnknownTrade(trade_uuid));
                }
            },
        };

        // The engine can retire between the map lookup and the send; a
        // closed channel just means the trade is gone, not a fault.
        let (rsp_tx, rsp_rx) = oneshot::channel();
        if tx.send(EngineRequest::Process { event, rsp_tx }).await.is_err() {
            warn!(
                "Trade {} engine retired before the event reached it, discarding",
                trade_uuid
            );
            return Ok(ProcessingResult::UnknownTrade(trade_uuid));
        }
        let outcome = match rsp_rx.await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    "Trade {} engine retired before answering, discarding",
                    trade_uuid
                );
                return Ok(ProcessingResult::UnknownTrade(trade_uuid));
            }
        };

        if let TransitionOutcome::Applied { to, .. } = outcome {
            if to.is_final() {
                self.retire(trade_uuid, to).await?;
            }
        }
        Ok(ProcessingResult::Handled(outcome))
    }

    /// Snapshot of a live trade's model, if the trade is still running.
    pub async fn trade(&self, trade_uuid: Uuid) -> Result<Option<TradeModel>, MuswapError> {
        let Some(tx) = self.engine_tx(trade_uuid).await else {
            return Ok(None);
        };
        let (rsp_tx, rsp_rx) = oneshot::channel();
        tx.send(EngineRequest::QueryTrade { rsp_tx }).await?;
        Ok(Some(rsp_rx.await?))
    }

    /// Re-attach engines for every persisted trade that has not reached a
    /// terminal state. Returns the number of trades resumed.
    pub async fn restore(&self) -> Result<usize, MuswapError> {
        let mut resumed = 0;
        for entry in std::fs::read_dir(&self.data_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let trade = match JsonFilePersister::restore(&path) {
                Ok(trade) => trade,
                Err(error) => {
                    error!(
                        "Could not restore trade from {} - {}",
                        path.display(),
                        error
                    );
                    continue;
                }
            };
            if trade.state().is_final() {
                continue;
            }
            if self.engines.read().await.contains_key(&trade.trade_uuid()) {
                continue;
            }
            info!(
                "Resuming trade {} as {} in state {}",
                trade.trade_uuid(),
                trade.role(),
                trade.state()
            );
            self.spawn_engine(trade).await;
            resumed += 1;
        }
        Ok(resumed)
    }

    pub async fn shutdown(&self) -> Result<(), MuswapError> {
        let handles: Vec<EngineHandle> = {
            let mut engines = self.engines.write().await;
            engines.drain().map(|(_, handle)| handle).collect()
        };
        for handle in handles {
            handle.shutdown().await?;
        }
        Ok(())
    }

    async fn engine_tx(&self, trade_uuid: Uuid) -> Option<mpsc::Sender<EngineRequest>> {
        self.engines
            .read()
            .await
            .get(&trade_uuid)
            .map(|handle| handle.tx.clone())
    }

    fn trade_opening_model(&self, event: &TradeEvent) -> Option<TradeModel> {
        match event {
            TradeEvent::TakeOffer(take_offer) => Some(TradeModel::new(
                take_offer.contract.clone(),
                TradeRole::from_contract(take_offer.contract.maker_direction, true),
            )),
            TradeEvent::Message(envelope) => match &envelope.message {
                TradeMessage::SetupTradeA(message) => Some(TradeModel::new(
                    message.contract.clone(),
                    TradeRole::from_contract(message.contract.maker_direction, false),
                )),
                _ => None,
            },
            _ => None,
        }
    }

    /// Lookup-or-create under one write-lock critical section. A concurrent
    /// duplicate of the trade-opening event lands on the engine the first
    /// one created instead of spawning a second actor for the same trade.
    async fn spawn_engine(&self, trade: TradeModel) -> mpsc::Sender<EngineRequest> {
        let trade_uuid = trade.trade_uuid();
        let mut engines = self.engines.write().await;
        if let Some(handle) = engines.get(&trade_uuid) {
            return handle.tx.clone();
        }
        info!(
            "Starting engine for trade {} as {}",
            trade_uuid,
            trade.role()
        );
        let persister = Arc::new(JsonFilePersister::new(&self.data_dir, &trade));
        let engine = ProtocolEngine::new(
            table_for(trade.role()),
            trade,
            self.services.clone(),
            persister,
        );
        let (tx, rx) = mpsc::channel(ENGINE_REQUEST_CHANNEL_SIZE);
        let task_handle = tokio::spawn(EngineActor { rx, engine }.run());
        engines.insert(trade_uuid, EngineHandle { tx: tx.clone(), task_handle });
        tx
    }

    async fn retire(
        &self,
        trade_uuid: Uuid,
        final_state: crate::fsm::state::TradeState,
    ) -> Result<(), MuswapError> {
        let handle = self.engines.write().await.remove(&trade_uuid);
        if let Some(handle) = handle {
            info!(
                "Trade {} reached {}, retiring its engine",
                trade_uuid, final_state
            );
            handle.shutdown().await?;
        }
        Ok(())
    }
}
