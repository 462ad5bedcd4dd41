pub mod engine;
pub mod event;
pub mod state;
pub mod transition;
