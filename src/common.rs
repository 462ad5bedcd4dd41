pub mod error;
pub mod persist;
