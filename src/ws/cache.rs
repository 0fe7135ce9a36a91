//! Per-mode caches of the latest feed update for every subscribed instrument,
//! plus the callback dispatch boundary.
//!
//! Each mode has its own [`DashMap`], so the receive task and caller threads
//! can read and write concurrently with per-shard locking. Updates are
//! last-write-wins per (instrument, mode); a reader always sees a whole
//! record, never a partially written one.

use std::panic::{self, AssertUnwindSafe};

use dashmap::DashMap;
use serde_json::Value;

use crate::types::feed::{
    DepthRecord, FeedEvent, FeedRecord, InstrumentKey, LtpRecord, Mode, QuoteRecord, Snapshot,
};
use crate::ws::registry::FeedHandler;

#[derive(Debug, Default)]
pub(crate) struct FeedCache {
    ltp: DashMap<InstrumentKey, LtpRecord>,
    quote: DashMap<InstrumentKey, QuoteRecord>,
    depth: DashMap<InstrumentKey, DepthRecord>,
}

impl FeedCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Decode `data` for `mode` and replace the cached entry for `key`.
    ///
    /// Returns the stored record so the caller can hand it to a callback.
    pub(crate) fn store(
        &self,
        mode: Mode,
        key: &InstrumentKey,
        data: Value,
    ) -> serde_json::Result<FeedRecord> {
        let record = FeedRecord::decode(mode, data)?;
        match &record {
            FeedRecord::Ltp(r) => {
                self.ltp.insert(key.clone(), *r);
            }
            FeedRecord::Quote(r) => {
                self.quote.insert(key.clone(), *r);
            }
            FeedRecord::Depth(r) => {
                self.depth.insert(key.clone(), r.clone());
            }
        }
        Ok(record)
    }

    pub(crate) fn evict(&self, mode: Mode, key: &InstrumentKey) {
        match mode {
            Mode::Ltp => {
                self.ltp.remove(key);
            }
            Mode::Quote => {
                self.quote.remove(key);
            }
            Mode::Depth => {
                self.depth.remove(key);
            }
        }
    }

    pub(crate) fn clear(&self) {
        self.ltp.clear();
        self.quote.clear();
        self.depth.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self, mode: Mode) -> usize {
        match mode {
            Mode::Ltp => self.ltp.len(),
            Mode::Quote => self.quote.len(),
            Mode::Depth => self.depth.len(),
        }
    }

    pub(crate) fn ltp(&self, exchange: Option<&str>, symbol: Option<&str>) -> Snapshot<LtpRecord> {
        collect(&self.ltp, exchange, symbol)
    }

    pub(crate) fn quotes(&self, exchange: Option<&str>, symbol: Option<&str>) -> Snapshot<QuoteRecord> {
        collect(&self.quote, exchange, symbol)
    }

    pub(crate) fn depth(&self, exchange: Option<&str>, symbol: Option<&str>) -> Snapshot<DepthRecord> {
        collect(&self.depth, exchange, symbol)
    }

    /// Mode-agnostic snapshot, records wrapped in [`FeedRecord`].
    pub(crate) fn snapshot(
        &self,
        mode: Mode,
        exchange: Option<&str>,
        symbol: Option<&str>,
    ) -> Snapshot<FeedRecord> {
        fn wrap<R>(snapshot: Snapshot<R>, f: impl Fn(R) -> FeedRecord) -> Snapshot<FeedRecord> {
            snapshot
                .into_iter()
                .map(|(exchange, symbols)| {
                    (exchange, symbols.into_iter().map(|(s, r)| (s, f(r))).collect())
                })
                .collect()
        }

        match mode {
            Mode::Ltp => wrap(self.ltp(exchange, symbol), FeedRecord::Ltp),
            Mode::Quote => wrap(self.quotes(exchange, symbol), FeedRecord::Quote),
            Mode::Depth => wrap(self.depth(exchange, symbol), FeedRecord::Depth),
        }
    }
}

/// Copy the entries of `map` matching both filters (`None` matches all).
fn collect<R: Clone>(
    map: &DashMap<InstrumentKey, R>,
    exchange: Option<&str>,
    symbol: Option<&str>,
) -> Snapshot<R> {
    let mut out = Snapshot::new();
    for entry in map.iter() {
        let key = entry.key();
        if exchange.is_some_and(|e| e != key.exchange) || symbol.is_some_and(|s| s != key.symbol) {
            continue;
        }
        out.entry(key.exchange.clone())
            .or_default()
            .insert(key.symbol.clone(), entry.value().clone());
    }
    out
}

/// Invoke `handler` with `event`, containing any panic it raises.
pub(crate) fn dispatch(handler: &FeedHandler, event: &FeedEvent) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler.call(event))) {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_owned());
        tracing::warn!(
            exchange = %event.exchange,
            symbol = %event.symbol,
            mode = %event.mode,
            %reason,
            "Feed callback panicked; update kept, callback skipped"
        );
    }
}
