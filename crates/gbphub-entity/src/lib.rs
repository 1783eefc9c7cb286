//! # gbphub-entity
//!
//! Domain entity models for GBP Hub. Every struct in this crate represents a
//! database table row or a domain value object. Table rows additionally
//! derive `sqlx::FromRow`.

pub mod batch;
pub mod credential;
pub mod item;
pub mod keyword;
pub mod post;
