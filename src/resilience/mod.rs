//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to the node:
//!     → timeouts.rs (every call has a deadline, elapsed → Timeout)
//!     → On failure, at the caller's choice: retries.rs (retryable errors only, jittered backoff)
//! Subscription reconnects:
//!     → backoff.rs (delay per attempt)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Retry is a caller policy, never built into the query client
//! - Node rejections and authentication failures are never retried

pub mod backoff;
pub mod retries;
pub mod timeouts;
