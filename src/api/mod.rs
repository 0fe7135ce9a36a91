//! REST API query builders.
//!
//! Each sub-module adds `async` methods to
//! [`RestClient`](crate::client::RestClient) via `impl` blocks. Every method
//! returns the decoded JSON body; failures come back as
//! `{"status":"error","message":...}`.
//!
//! | Module | Endpoints | Description |
//! |---|---|---|
//! | [`market_data`] | 3 | Quote, multi-quote, depth |

pub mod market_data;
