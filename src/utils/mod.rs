//! Shared helpers.
//!
//! Process bootstrap, the retry policy used by every store call, and the
//! cooperative cancellation signal.

pub mod bootstrap;
pub mod cancel;
pub mod retry;
