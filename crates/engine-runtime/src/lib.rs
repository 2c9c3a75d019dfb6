pub mod error;
pub mod factory;
pub mod runner;
pub mod sink;
