//! HTTP integration tests for the batch API.

mod batch_api_test;
mod helpers;
