mod common;

#[cfg(test)]
mod seller_flow_tests {
    use std::sync::Arc;

    use muswap::comms::TimerRequest;
    use muswap::fsm::engine::ProtocolEngine;
    use muswap::fsm::event::{CloseTimeoutKind, TradeEvent};
    use muswap::fsm::state::TradeState;
    use muswap::protocol::table_for;
    use muswap::testing::{CountingPersister, SomeTestTradeParams};
    use muswap::trade::{TradeModel, TradeRole};

    use super::common::engine_services;

    fn seller_as_maker_engine(
        persister: Arc<CountingPersister>,
    ) -> (
        ProtocolEngine,
        tokio::sync::mpsc::Receiver<muswap::comms::OutboundEnvelope>,
        tokio::sync::mpsc::Receiver<TimerRequest>,
    ) {
        let (services, comms_rx, timer_rx) = engine_services();
        let trade = TradeModel::new(SomeTestTradeParams::contract(), TradeRole::SellerAsMaker);
        let engine = ProtocolEngine::new(
            table_for(TradeRole::SellerAsMaker),
            trade,
            services,
            persister,
        );
        (engine, comms_rx, timer_rx)
    }

    fn happy_path_events() -> [TradeEvent; 6] {
        [
            SomeTestTradeParams::setup_trade_a_event(),
            SomeTestTradeParams::setup_trade_c_event(),
            SomeTestTradeParams::deposit_confirmed_event(),
            SomeTestTradeParams::payment_initiated_message_event(),
            SomeTestTradeParams::payment_receipt_confirmed_event(),
            SomeTestTradeParams::cooperative_close_event(),
        ]
    }

    const HAPPY_PATH_STATES: [TradeState; 6] = [
        TradeState::MakerInitializedTrade,
        TradeState::DepositTxBroadcast,
        TradeState::DepositTxConfirmed,
        TradeState::BuyerInitiatedPayment,
        TradeState::SellerConfirmedPaymentReceipt,
        TradeState::SellerAsMakerClosedTrade,
    ];

    #[tokio::test]
    async fn happy_path_closes_cooperatively() {
        let _trace_sub = tracing_subscriber::fmt::try_init();

        let persister = Arc::new(CountingPersister::default());
        let (mut engine, mut comms_rx, mut timer_rx) =
            seller_as_maker_engine(persister.clone());

        for (event, expected) in happy_path_events().iter().zip(HAPPY_PATH_STATES) {
            let outcome = engine.process(event).await.unwrap();
            assert!(
                outcome.reached(expected),
                "expected {} but got {:?}",
                expected,
                outcome
            );
        }

        assert_eq!(persister.count(), 6);
        assert!(engine.trade().deposit_txid().is_some());
        assert!(engine.trade().swap_txid().is_some());
        assert_eq!(engine.trade().payment_reference(), Some("wire-ref-42"));

        // Outbound: B answers A, D announces the deposit, F releases the
        // seller's close signature.
        for expected in ["SetupTradeB", "SetupTradeD", "PaymentReceivedF"] {
            let envelope = comms_rx.try_recv().unwrap();
            let name: &'static str = (&envelope.message).into();
            assert_eq!(name, expected);
            assert_eq!(envelope.to, SomeTestTradeParams::taker_peer_id());
        }
        assert!(comms_rx.try_recv().is_err());

        assert_eq!(
            timer_rx.try_recv().unwrap(),
            TimerRequest::StartCloseTimeout {
                trade_uuid: SomeTestTradeParams::trade_uuid(),
                kind: CloseTimeoutKind::SellersCooperativeClose,
            }
        );
        assert_eq!(
            timer_rx.try_recv().unwrap(),
            TimerRequest::StopCloseTimeout {
                trade_uuid: SomeTestTradeParams::trade_uuid(),
            }
        );
    }

    #[tokio::test]
    async fn missing_cooperative_close_forces_the_trade_closed() {
        let _trace_sub = tracing_subscriber::fmt::try_init();

        let persister = Arc::new(CountingPersister::default());
        let (mut engine, _comms_rx, _timer_rx) = seller_as_maker_engine(persister.clone());

        for event in &happy_path_events()[..5] {
            engine.process(event).await.unwrap();
        }
        let outcome = engine
            .process(&SomeTestTradeParams::close_timeout_event(
                CloseTimeoutKind::SellersCooperativeClose,
            ))
            .await
            .unwrap();

        assert!(outcome.reached(TradeState::SellerAsMakerForceClosedTrade));
        assert!(engine.trade().swap_txid().is_some());
        assert_eq!(persister.count(), 6);
    }

    #[tokio::test]
    async fn payment_can_arrive_before_deposit_confirmation() {
        let persister = Arc::new(CountingPersister::default());
        let (mut engine, _comms_rx, _timer_rx) = seller_as_maker_engine(persister);

        let events = happy_path_events();
        engine.process(&events[0]).await.unwrap();
        engine.process(&events[1]).await.unwrap();
        // E straight after broadcast, without a confirmation event
        let outcome = engine.process(&events[3]).await.unwrap();
        assert!(outcome.reached(TradeState::BuyerInitiatedPayment));
    }
}
