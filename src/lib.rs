//! # openalgo-rs
//!
//! A Rust client for the [OpenAlgo](https://openalgo.in) trading platform:
//! a streaming market feed with live per-mode caches, plus REST market data
//! queries.
//!
//! ## Quick Start
//!
//! ```no_run
//! use openalgo_rs::OpenAlgoClient;
//! use openalgo_rs::types::feed::InstrumentKey;
//! use openalgo_rs::ws::registry::FeedHandler;
//!
//! #[tokio::main]
//! async fn main() -> openalgo_rs::Result<()> {
//!     let client = OpenAlgoClient::new("your-api-key")?;
//!     let feed = client.feed();
//!
//!     if feed.connect().await {
//!         let instruments = [InstrumentKey::new("NSE", "RELIANCE")];
//!         feed.subscribe_ltp(&instruments, Some(FeedHandler::new(|event| {
//!             println!("{} {} {}", event.exchange, event.symbol, event.data.last_traded_price());
//!         })));
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod client;
pub mod constants;
pub mod error;
pub mod openalgo;
pub mod types;
pub mod ws;

/// Re-export the main client types at crate root for convenience.
pub use client::RestClient;
pub use openalgo::{OpenAlgoClient, OpenAlgoClientBuilder};
pub use ws::feed::{FeedClient, FeedClientBuilder, FeedConfig};
/// Re-export the error type and Result alias.
pub use error::{OpenAlgoError, Result};
