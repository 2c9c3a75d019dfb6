pub mod context;
pub mod discovery;
pub mod error;
pub mod metrics;
pub mod offset;
pub mod retry;
pub mod state;
