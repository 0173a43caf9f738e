//! Outcome - typed success/failure values with chaining, bindings and
//! restartable async pipelines
//!
//! This library models a computation that either succeeds with a value plus
//! accumulated named intermediates ("binds") or fails with a declared error.
//!
//! ## Architecture
//!
//! - **Sync**: [`Outcome`] is an immutable enum with chaining combinators
//! - **Async**: [`OutcomeAsync`] is a deferred, restartable computation that
//!   yields an [`Outcome`] each time it is run
//!
//! Steps that can fail return their own error type; it widens into the
//! pipeline's declared error through `Into`. Async steps whose futures may
//! reject are wrapped with `chain_p` and an explicit error converter.
//!
//! ## Usage
//!
//! ```
//! use outcome::{Outcome, OutcomeAsync};
//!
//! # tokio_test_block(async {
//! let parsed = Outcome::<_, String>::success("21")
//!     .chain_r(|s, _| Outcome::from(s.parse::<u32>().map_err(|e| e.to_string())))
//!     .chain(|n, _| n * 2);
//! assert_eq!(parsed.value(), Some(&42));
//!
//! let deferred = OutcomeAsync::<_, String>::success(1).chain(|n, _| n + 1);
//! assert_eq!(deferred.await.value(), Some(&2));
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f);
//! # }
//! ```
//!
//! The `bidflow` binary drives a small auction-bid pipeline through every
//! combinator:
//! ```bash
//! cargo run --bin bidflow -- --bid alice:lot-1:7000000 --bid bob:lot-2:
//! ```

// Core types
pub mod result;
pub mod result_async;

// Tuple combinators (sync, async, reifying)
pub mod combine;

// Unbounded async loops, re-exported through result_async
mod looping;

// Demo collaborator: auction bid submission
pub mod bidflow;
pub mod config;

pub use result::Outcome;
pub use result_async::OutcomeAsync;
