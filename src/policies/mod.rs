//! Retry policies.
//!
//! ## Contents
//! - [`BackoffPolicy`] how dial retry delays evolve (first / factor / max)
//!
//! ## Quick wiring
//! ```text
//! LinkSettings { backoff_max_seconds }
//!      └─► BackoffPolicy::doubling(max)
//!           └─► ConnectionSupervisor::dial uses backoff.next(attempt) between failed dials
//! ```

mod backoff;

pub use backoff::BackoffPolicy;
