//! Binary to connect to an OpenAlgo market feed, subscribe RELIANCE and
//! INFY on NSE in all three modes, and print what arrives.
//!
//! # Usage
//!
//! ```sh
//! export OPENALGO_API_KEY="your-api-key"
//! export OPENALGO_WS_URL="ws://127.0.0.1:8765"   # optional
//! cargo run --bin feed_check --features cli
//! ```

use std::env;
use std::time::Duration;

use openalgo_rs::FeedClient;
use openalgo_rs::types::feed::{InstrumentKey, Mode};
use openalgo_rs::ws::registry::FeedHandler;
use tokio::time;

#[tokio::main]
async fn main() -> openalgo_rs::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let api_key =
        env::var("OPENALGO_API_KEY").expect("set OPENALGO_API_KEY env var before running");
    let mut builder = FeedClient::builder(api_key);
    if let Ok(url) = env::var("OPENALGO_WS_URL") {
        builder = builder.url(url);
    }
    let feed = builder.build();

    println!("Connecting to {}…", feed.config().url);
    if let Err(e) = feed.try_connect().await {
        eprintln!("Connect failed: {e}");
        return Err(e);
    }

    let instruments = vec![
        InstrumentKey::new("NSE", "RELIANCE"),
        InstrumentKey::new("NSE", "INFY"),
    ];
    for mode in Mode::ALL {
        println!("Subscribing {} instruments ({mode})…", instruments.len());
        let handler = FeedHandler::new(|event| {
            println!(
                "[{}] {}:{} ltp={}",
                event.mode,
                event.exchange,
                event.symbol,
                event.data.last_traded_price()
            );
        });
        feed.subscribe(mode, &instruments, Some(handler));
    }

    println!("Listening for 10 seconds…\n");
    time::sleep(Duration::from_secs(10)).await;

    println!("\nCached LTP: {:#?}", feed.ltp(None, None));
    println!("Cached quotes: {:#?}", feed.quotes(None, None));
    println!("Cached depth: {:#?}", feed.depth(None, None));

    for mode in Mode::ALL {
        feed.unsubscribe(mode, &instruments);
    }
    feed.disconnect();
    println!("Done.");

    Ok(())
}
