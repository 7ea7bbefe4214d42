//! RxJS-style reactive programming for Rust
//!
//! The push side of the bridge: observers, subscriptions and two ready-made
//! producers.

pub mod observable;
pub mod subject;

pub use observable::{FnObserver, Observable, Observer, Subscribable, Subscription};
pub use subject::Subject;
