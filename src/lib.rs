pub mod comms;
pub mod common;
pub mod dispatcher;
pub mod fsm;
pub mod message;
pub mod protocol;
pub mod testing;
pub mod trade;
