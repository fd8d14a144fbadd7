//! Screen-region text capture with a single resident instance.
//!
//! A resident process owns a loopback port, a global hotkey and a bounded
//! recognition pool.  Short-lived `once` invocations delegate to it over the
//! port, or run a session standalone when no resident answers.

pub mod config;
pub mod coordinator;
pub mod feedback;
pub mod hotkey;
pub mod output;
pub mod pool;
pub mod recognize;
pub mod select;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;
