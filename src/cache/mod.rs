//! Rate-limited cache for costly fetches
//!
//! This module provides a cache that persists the last fetch result per key to a
//! JSON lockfile and only lets the fetch run again once a minimum interval has
//! elapsed. It degrades gracefully: unreadable lockfiles count as missing, and
//! failed fetches fall back to the last known payload.

mod clock;
mod manager;
mod outcome;

pub use clock::{Clock, SystemClock};
pub use manager::{CacheError, CacheRecord, CacheStatus, RateLimitedCache};
pub use outcome::FetchOutcome;
