//! Utility modules: cancellation and timeout.

pub mod timeout;
