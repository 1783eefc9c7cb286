//! Request handlers.

pub mod batch;
pub mod health;
