//! Tenant credentials for external APIs.

pub mod model;

pub use model::{CredentialProvider, TenantCredential};
