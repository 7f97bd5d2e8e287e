//! # Utility Modules
//!
//! Supporting utilities for logging and timing.
//!
//! ## Components
//! - **Logging**: structured logging configuration (tracing-subscriber)
//! - **Timeout**: async timeout wrappers and shared timing constants

pub mod logging;
pub mod timeout;
