//! Structured cancellation for pipeline runs.
//!
//! Every run is bound to a single [`CancellationToken`]; the optional run
//! deadline is implemented by cancelling that token when it elapses.

mod token;

pub use token::CancellationToken;
