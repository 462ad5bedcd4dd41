use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::comms::ServiceHandles;
use crate::common::error::MuswapError;
use crate::common::persist::TradePersister;
use crate::fsm::event::TradeEvent;
use crate::fsm::state::TradeState;
use crate::fsm::transition::{Transition, TransitionTable};
use crate::trade::TradeModel;

/// Why an event was discarded instead of transitioning the trade.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The trade already reached a final state.
    TradeAlreadyClosed,
    /// No transition matches the current state. Expected for retransmitted
    /// or out-of-order network messages.
    NoMatchingTransition,
}

/// Result of processing one event. After any event the trade is in exactly
/// one of: its unchanged state (`Ignored`), the declared target state, or a
/// failure state reached through a from-any error transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied {
        from: TradeState,
        to: TradeState,
        path: Option<&'static str>,
    },
    Ignored(IgnoreReason),
}

impl TransitionOutcome {
    pub fn reached(&self, state: TradeState) -> bool {
        matches!(self, TransitionOutcome::Applied { to, .. } if *to == state)
    }
}

/// Per-trade protocol engine. Owns the trade model and its immutable
/// protocol table; resolves and executes exactly one transition per event.
pub struct ProtocolEngine {
    table: &'static TransitionTable,
    trade: TradeModel,
    services: ServiceHandles,
    persister: Arc<dyn TradePersister>,
}

impl ProtocolEngine {
    pub fn new(
        table: &'static TransitionTable,
        trade: TradeModel,
        services: ServiceHandles,
        persister: Arc<dyn TradePersister>,
    ) -> Self {
        Self {
            table,
            trade,
            services,
            persister,
        }
    }

    pub fn trade(&self) -> &TradeModel {
        &self.trade
    }

    /// Process one event against the current trade state.
    ///
    /// Stale and duplicate events are discarded without mutating state. A
    /// handler failure is routed through the protocol's from-any error
    /// transition exactly once; a failure inside the error handling itself
    /// surfaces as `Err`. The trade is persisted after every committed
    /// transition, before the event is acknowledged.
    pub async fn process(
        &mut self,
        event: &TradeEvent,
    ) -> Result<TransitionOutcome, MuswapError> {
        let current_state = self.trade.state();
        if current_state.is_final() {
            warn!(
                "Trade {} reached final state {}, discarding further event {}",
                self.trade.trade_uuid(),
                current_state,
                event.kind()
            );
            return Ok(TransitionOutcome::Ignored(IgnoreReason::TradeAlreadyClosed));
        }

        let kind = event.kind();
        if kind.is_error_kind() {
            return self.apply_error_transition(event).await;
        }

        let Some(transition) = self.table.find(current_state, kind).copied() else {
            info!(
                "Trade {} has no transition for event {} in state {}, discarding as \
                 out-of-order or duplicate",
                self.trade.trade_uuid(),
                kind,
                current_state
            );
            return Ok(TransitionOutcome::Ignored(IgnoreReason::NoMatchingTransition));
        };

        match self.run_handler(&transition, event).await {
            Ok(()) => {
                self.commit(current_state, &transition)?;
                Ok(TransitionOutcome::Applied {
                    from: current_state,
                    to: transition.target,
                    path: transition.path,
                })
            }
            Err(protocol_error) => {
                warn!(
                    "Trade {} handler for event {} in state {} failed - {}",
                    self.trade.trade_uuid(),
                    kind,
                    current_state,
                    protocol_error
                );
                let error_event = TradeEvent::ProtocolError {
                    trade_uuid: self.trade.trade_uuid(),
                    message: protocol_error.to_string(),
                };
                self.apply_error_transition(&error_event).await
            }
        }
    }

    /// Resolve an error-kind event through the from-any transitions. Every
    /// protocol must define a catch-all; a missing one is a programming
    /// contract violation, not a recoverable condition.
    async fn apply_error_transition(
        &mut self,
        event: &TradeEvent,
    ) -> Result<TransitionOutcome, MuswapError> {
        let kind = event.kind();
        let current_state = self.trade.state();
        let Some(transition) = self.table.find_from_any(kind).copied() else {
            return Err(MuswapError::MissingErrorTransition(kind));
        };

        if let Err(nested) = self.run_handler(&transition, event).await {
            return Err(MuswapError::ErrorHandlerFailed(nested));
        }

        self.commit(current_state, &transition)?;
        Ok(TransitionOutcome::Applied {
            from: current_state,
            to: transition.target,
            path: transition.path,
        })
    }

    async fn run_handler(
        &mut self,
        transition: &Transition,
        event: &TradeEvent,
    ) -> Result<(), crate::common::error::ProtocolError> {
        let Some(handler) = transition.handler else {
            return Ok(());
        };
        let trade = &mut self.trade;
        let services = &self.services;
        handler(trade, event, services).await
    }

    fn commit(
        &mut self,
        from: TradeState,
        transition: &Transition,
    ) -> Result<(), MuswapError> {
        self.trade.set_state(transition.target);
        self.persister.persist(&self.trade)?;
        debug!(
            "Trade {} transitioned {} -> {} on {}",
            self.trade.trade_uuid(),
            from,
            transition.target,
            transition.event
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    use tokio::sync::mpsc;

    use crate::comms::{CommsAccess, ServiceHandles, TimerAccess};
    use crate::common::error::ProtocolError;
    use crate::fsm::event::EventKind;
    use crate::fsm::transition::{HandlerResult, ProtocolBuilder};
    use crate::testing::{CountingPersister, SomeTestTradeParams};
    use crate::trade::TradeRole;

    fn noop<'a>(
        _trade: &'a mut TradeModel,
        _event: &'a TradeEvent,
        _services: &'a ServiceHandles,
    ) -> HandlerResult<'a> {
        Box::pin(async { Ok(()) })
    }

    fn failing<'a>(
        _trade: &'a mut TradeModel,
        _event: &'a TradeEvent,
        _services: &'a ServiceHandles,
    ) -> HandlerResult<'a> {
        Box::pin(async { Err(ProtocolError::new("handler blew up")) })
    }

    fn test_table() -> &'static TransitionTable {
        static TABLE: OnceLock<TransitionTable> = OnceLock::new();
        TABLE.get_or_init(|| {
            ProtocolBuilder::new()
                .from(TradeState::Init)
                .on(EventKind::TakeOffer)
                .run(noop)
                .to(TradeState::TakerInitializedTrade)
                .then()
                .on(EventKind::SetupTradeMessageB)
                .run(failing)
                .to(TradeState::TakerSignedDepositTx)
                .from_any()
                .on(EventKind::ProtocolError)
                .to(TradeState::Failed)
                .from_any()
                .on(EventKind::PeerReportedError)
                .to(TradeState::FailedAtPeer)
                .build()
        })
    }

    fn test_services() -> ServiceHandles {
        let (comms_tx, _comms_rx) = mpsc::channel(8);
        let (timer_tx, _timer_rx) = mpsc::channel(8);
        ServiceHandles::new(CommsAccess::new(comms_tx), TimerAccess::new(timer_tx))
    }

    fn test_engine(persister: Arc<CountingPersister>) -> ProtocolEngine {
        let trade = TradeModel::new(SomeTestTradeParams::contract(), TradeRole::BuyerAsTaker);
        ProtocolEngine::new(test_table(), trade, test_services(), persister)
    }

    #[tokio::test]
    async fn applies_matching_transition_and_persists() {
        let persister = Arc::new(CountingPersister::default());
        let mut engine = test_engine(persister.clone());

        let outcome = engine
            .process(&SomeTestTradeParams::take_offer_event())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            TransitionOutcome::Applied {
                from: TradeState::Init,
                to: TradeState::TakerInitializedTrade,
                path: None,
            }
        );
        assert_eq!(engine.trade().state(), TradeState::TakerInitializedTrade);
        assert_eq!(persister.count(), 1);
    }

    #[tokio::test]
    async fn unmatched_event_is_discarded_without_persisting() {
        let persister = Arc::new(CountingPersister::default());
        let mut engine = test_engine(persister.clone());

        // SetupTradeMessageB has no transition from Init
        let event = SomeTestTradeParams::setup_trade_b_event();
        let outcome = engine.process(&event).await.unwrap();

        assert_eq!(
            outcome,
            TransitionOutcome::Ignored(IgnoreReason::NoMatchingTransition)
        );
        assert_eq!(engine.trade().state(), TradeState::Init);
        assert_eq!(persister.count(), 0);
    }

    #[tokio::test]
    async fn handler_failure_routes_to_failed_state() {
        let persister = Arc::new(CountingPersister::default());
        let mut engine = test_engine(persister.clone());

        engine
            .process(&SomeTestTradeParams::take_offer_event())
            .await
            .unwrap();
        let outcome = engine
            .process(&SomeTestTradeParams::setup_trade_b_event())
            .await
            .unwrap();

        assert!(outcome.reached(TradeState::Failed));
        assert_eq!(engine.trade().state(), TradeState::Failed);
        // The declared target of the failing transition is never reached.
        assert_ne!(engine.trade().state(), TradeState::TakerSignedDepositTx);
        assert_eq!(persister.count(), 2);
    }

    #[tokio::test]
    async fn events_after_final_state_are_discarded() {
        let persister = Arc::new(CountingPersister::default());
        let mut engine = test_engine(persister.clone());

        engine
            .process(&SomeTestTradeParams::peer_error_event())
            .await
            .unwrap();
        assert_eq!(engine.trade().state(), TradeState::FailedAtPeer);

        let outcome = engine
            .process(&SomeTestTradeParams::take_offer_event())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            TransitionOutcome::Ignored(IgnoreReason::TradeAlreadyClosed)
        );
        assert_eq!(persister.count(), 1);
    }

    #[tokio::test]
    async fn replayed_event_does_not_mutate_state_again() {
        let persister = Arc::new(CountingPersister::default());
        let mut engine = test_engine(persister.clone());

        let take_offer = SomeTestTradeParams::take_offer_event();
        engine.process(&take_offer).await.unwrap();
        let outcome = engine.process(&take_offer).await.unwrap();

        assert_eq!(
            outcome,
            TransitionOutcome::Ignored(IgnoreReason::NoMatchingTransition)
        );
        assert_eq!(engine.trade().state(), TradeState::TakerInitializedTrade);
        assert_eq!(persister.count(), 1);
    }
}
