//! Observable implementation (RxJS-like)

use crate::error::RxError;
use futures::{Stream, StreamExt, future};
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Observer trait - similar to RxJS Observer
///
/// A well-behaved producer calls `next` zero or more times followed by at
/// most one of `error` or `complete`.
pub trait Observer<T, E>: Send {
    fn next(&mut self, value: T);
    fn error(&mut self, error: E);
    fn complete(&mut self);
}

/// Observer assembled from next/error/complete callbacks
pub struct FnObserver<N, Er, C> {
    next: N,
    error: Er,
    complete: C,
}

impl<N, Er, C> FnObserver<N, Er, C> {
    pub fn new(next: N, error: Er, complete: C) -> Self {
        Self {
            next,
            error,
            complete,
        }
    }
}

impl<T, E, N, Er, C> Observer<T, E> for FnObserver<N, Er, C>
where
    N: FnMut(T) + Send,
    Er: FnMut(E) + Send,
    C: FnMut() + Send,
{
    fn next(&mut self, value: T) {
        (self.next)(value)
    }

    fn error(&mut self, error: E) {
        (self.error)(error)
    }

    fn complete(&mut self) {
        (self.complete)()
    }
}

type Teardown = Box<dyn FnOnce() + Send>;

/// Subscription handle - similar to RxJS Subscription
///
/// Clones share state: unsubscribing through any clone deactivates all of
/// them, and the teardown runs at most once.
#[derive(Clone)]
pub struct Subscription {
    is_active: Arc<AtomicBool>,
    teardown: Arc<Mutex<Option<Teardown>>>,
}

impl Subscription {
    pub fn new() -> Self {
        Self {
            is_active: Arc::new(AtomicBool::new(true)),
            teardown: Arc::new(Mutex::new(None)),
        }
    }

    /// Create a subscription that runs `teardown` when unsubscribed
    pub fn with_teardown<F>(teardown: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            is_active: Arc::new(AtomicBool::new(true)),
            teardown: Arc::new(Mutex::new(Some(Box::new(teardown)))),
        }
    }

    /// Create a subscription that is already inactive
    pub fn closed() -> Self {
        let subscription = Self::new();
        subscription.is_active.store(false, Ordering::SeqCst);
        subscription
    }

    /// Unsubscribe from the observable
    pub fn unsubscribe(&self) {
        if !self.is_active.swap(false, Ordering::SeqCst) {
            return;
        }
        // Released before running so the teardown may touch this handle again.
        let teardown = self.teardown.lock().take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }

    /// Check if subscription is active
    pub fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::new()
    }
}

/// A push-based source an [`Observer`] can be attached to
pub trait Subscribable<T, E> {
    /// Attach `observer` and return the handle that detaches it
    fn subscribe_observer<O>(self, observer: O) -> Subscription
    where
        O: Observer<T, E> + 'static;
}

/// Observable wrapper - similar to RxJS Observable
///
/// Backed by a stream of `Result`s: `Ok` items become `next` notifications,
/// the first `Err` becomes `error`, and the end of the stream becomes
/// `complete`.
pub struct Observable<T, E = RxError> {
    stream: Pin<Box<dyn Stream<Item = Result<T, E>> + Send + 'static>>,
}

impl<T: Send + 'static, E: Send + 'static> Observable<T, E> {
    /// Create an Observable from an infallible Stream
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
    {
        Self {
            stream: Box::pin(stream.map(Ok)),
        }
    }

    /// Create an Observable from a Stream of results
    pub fn from_try_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<T, E>> + Send + 'static,
    {
        Self {
            stream: Box::pin(stream),
        }
    }

    /// Subscribe with next/error/complete callbacks (RxJS style)
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Example
    /// ```no_run
    /// # use rx_bridge::rx::Observable;
    /// # use futures::stream;
    /// # #[tokio::main]
    /// # async fn main() {
    /// let obs: Observable<i32> = Observable::from_stream(stream::iter(vec![1, 2, 3]));
    ///
    /// obs.subscribe(
    ///     |value| println!("Next: {}", value),
    ///     |err| eprintln!("Error: {}", err),
    ///     || println!("Complete!")
    /// );
    /// # }
    /// ```
    pub fn subscribe<N, Er, C>(self, next: N, error: Er, complete: C) -> Subscription
    where
        N: FnMut(T) + Send + 'static,
        Er: FnMut(E) + Send + 'static,
        C: FnMut() + Send + 'static,
    {
        self.subscribe_observer(FnObserver::new(next, error, complete))
    }

    /// Convert back to Stream for chaining with StreamExt operators
    pub fn into_stream(self) -> Pin<Box<dyn Stream<Item = Result<T, E>> + Send + 'static>> {
        self.stream
    }

    /// Map operator - transform values
    pub fn map<F, R>(self, mut f: F) -> Observable<R, E>
    where
        F: FnMut(T) -> R + Send + 'static,
        R: Send + 'static,
    {
        Observable::from_try_stream(self.stream.map(move |item| item.map(&mut f)))
    }

    /// Filter operator - filter values, errors always pass through
    pub fn filter<F>(self, mut f: F) -> Observable<T, E>
    where
        F: FnMut(&T) -> bool + Send + 'static,
    {
        Observable::from_try_stream(self.stream.filter(move |item| {
            let keep = match item {
                Ok(value) => f(value),
                Err(_) => true,
            };
            future::ready(keep)
        }))
    }

    /// Take operator - take first N notifications
    pub fn take(self, n: usize) -> Observable<T, E> {
        Observable::from_try_stream(self.stream.take(n))
    }
}

impl<T: Send + 'static, E: Send + 'static> Subscribable<T, E> for Observable<T, E> {
    fn subscribe_observer<O>(self, mut observer: O) -> Subscription
    where
        O: Observer<T, E> + 'static,
    {
        let (cancel_tx, mut cancel_rx) = mpsc::unbounded_channel::<()>();
        let subscription = Subscription::with_teardown(move || {
            let _ = cancel_tx.send(());
        });

        let mut stream = self.stream;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    Some(()) = cancel_rx.recv() => {
                        tracing::debug!("Observable subscription cancelled");
                        break;
                    }
                    item = stream.next() => match item {
                        Some(Ok(value)) => observer.next(value),
                        Some(Err(err)) => {
                            observer.error(err);
                            break;
                        }
                        None => {
                            observer.complete();
                            break;
                        }
                    },
                }
            }
        });

        subscription
    }
}

// Implement Stream for Observable so it can be used with StreamExt
impl<T, E> Stream for Observable<T, E> {
    type Item = Result<T, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.stream.as_mut().poll_next(cx)
    }
}
