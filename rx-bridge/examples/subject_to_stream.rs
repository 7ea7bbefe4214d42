//! Observable to async-iterator example
//!
//! Shows the three ways to consume a bridged producer: explicit pulls, the
//! `for_await_each` driver, and `StreamExt`.
//!
//! Usage:
//!   RUST_LOG=rx_bridge=trace cargo run --example subject_to_stream

use futures::{StreamExt, stream};
use rx_bridge::rx::{Observable, Subject};
use rx_bridge::{
    AsyncIterator, BridgeConfig, IterStep, ObservableAsyncIterator, RxError, SubscribableExt,
    for_await_each,
};
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Example 1: explicit pulls, pushed before anyone asked
    info!("1. Subject, push first");
    let subject: Subject<&str> = Subject::new();
    let config = BridgeConfig::new().with_name("push-first");
    let iter = ObservableAsyncIterator::with_config(&subject, config);

    subject.next("one");
    subject.next("two");
    subject.complete();

    while let IterStep::Value(value) = iter.next().await? {
        info!("   pulled {}", value);
    }

    // Example 2: the consumer is already waiting when values arrive
    info!("2. Subject, pull first");
    let subject: Subject<u64> = Subject::new();
    let iter = ObservableAsyncIterator::new(&subject);

    let producer = {
        let subject = subject.clone();
        tokio::spawn(async move {
            for tick in 1..=3 {
                tokio::time::sleep(Duration::from_millis(50)).await;
                subject.next(tick);
            }
            subject.error(RxError::producer("sensor unplugged"));
        })
    };

    let result = for_await_each(&iter, |tick| info!("   tick {}", tick)).await;
    info!("   finished with {:?}", result);
    producer.await?;

    // Example 3: a stream-backed Observable, consumed as a Stream
    info!("3. Observable as Stream");
    let observable: Observable<u32> = Observable::from_stream(stream::iter(1..=10));
    let mut evens = observable
        .filter(|n| n % 2 == 0)
        .into_async_iter()
        .take(3);

    while let Some(item) = evens.next().await {
        info!("   even {}", item?);
    }

    // Example 4: cancelling early releases the producer
    info!("4. Cancellation");
    let subject: Subject<&str> = Subject::new();
    let iter = subject.clone().into_async_iter();
    subject.next("kept in buffer");
    iter.cancel().await;
    info!(
        "   observers after cancel: {}, next: {:?}",
        subject.observer_count(),
        iter.next().await?
    );

    Ok(())
}
