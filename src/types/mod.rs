//! Strongly-typed values used by the market feed.
//!
//! - [`feed`]: instrument keys, modes, connection states, cached records and
//!   callback events

pub mod feed;
