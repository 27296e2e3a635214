//! Shared utilities for calls into external capabilities.

pub mod retry;

pub use retry::{with_retry, RetryPolicy, RetryResult, Retryable};
