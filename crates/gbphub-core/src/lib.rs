//! # gbphub-core
//!
//! Core crate for GBP Hub. Contains configuration schemas, typed
//! identifiers, the access-token wrapper, and the unified error system.
//!
//! This crate has **no** internal dependencies on other GBP Hub crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
