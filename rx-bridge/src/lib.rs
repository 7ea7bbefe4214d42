//! # rx-bridge
//!
//! Turn a push-based observable into a pull-based async iterator.
//!
//! ## Features
//!
//! - 🔁 **Bridge**: [`ObservableAsyncIterator`] buffers values nobody asked for
//!   yet and parks requests nothing answered yet, never both at once
//! - 📨 **Ordering**: values arrive in push order, requests are answered in
//!   request order, terminal events come after every value pushed before them
//! - 🛑 **Cancellation**: idempotent, resolves waiting requests with `Done` and
//!   releases the upstream subscription exactly once
//! - 🌊 **Streams**: the bridge is a [`futures::Stream`] of `Result<T, E>`
//! - 🔔 **RxJS-style producers**: [`rx::Subject`] and [`rx::Observable`]
//!
//! ## Quick Start
//!
//! ```rust
//! use rx_bridge::{AsyncIterator, IterStep, ObservableAsyncIterator};
//! use rx_bridge::rx::Subject;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let subject: Subject<&str> = Subject::new();
//!     let iter = ObservableAsyncIterator::new(&subject);
//!
//!     subject.next("one");
//!     subject.complete();
//!
//!     assert_eq!(iter.next().await?, IterStep::Value("one"));
//!     assert_eq!(iter.next().await?, IterStep::Done);
//!     Ok(())
//! }
//! ```

pub mod async_iter;
pub mod config;
pub mod error;
pub mod iterator;
pub mod rx; // RxJS-style reactive programming

pub use async_iter::{AsyncIterator, IterStep, for_await_each};
pub use config::BridgeConfig;
pub use error::{Result, RxError};
pub use iterator::{NextFuture, ObservableAsyncIterator, SubscribableExt};
