pub mod error;
pub mod reader;
pub mod retry;
pub mod scheduler;
pub mod source;
