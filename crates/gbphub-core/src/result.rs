//! Convenience result type alias for GBP Hub.

use crate::error::AppError;

/// A specialized `Result` type for GBP Hub operations.
pub type AppResult<T> = Result<T, AppError>;
