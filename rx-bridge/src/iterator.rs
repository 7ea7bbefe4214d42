//! Observable to async-iterator bridge
//!
//! [`ObservableAsyncIterator`] subscribes to a push-based producer once, at
//! construction, and lets a consumer pull the produced values at its own pace.
//! Values pushed before anyone asks are buffered; pulls made before anything
//! was pushed wait. The two situations never coexist, so the bridge tracks
//! exactly one queue at a time:
//!
//! - `AwaitingProducer`: consumers are waiting, oldest first
//! - `AwaitingConsumer`: producer outcomes are buffered, oldest first
//!
//! Every outcome reaches exactly one pull, in push order, and pulls are served
//! in request order. Completion, a producer error and cancellation are all
//! terminal; afterwards the bridge is inert and reports `Done` forever.

use crate::async_iter::{AsyncIterator, IterStep};
use crate::config::BridgeConfig;
use crate::error::RxError;
use crate::rx::{Observer, Subscribable, Subscription};
use async_trait::async_trait;
use futures::Stream;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

type Outcome<T, E> = Result<IterStep<T>, E>;
type Waiter<T, E> = oneshot::Sender<Outcome<T, E>>;

enum State<T, E> {
    Idle,
    /// Never empty
    AwaitingProducer(VecDeque<Waiter<T, E>>),
    /// Never empty
    AwaitingConsumer(VecDeque<Outcome<T, E>>),
    Closed,
}

/// State shared between the consumer handle and the producer's observer
struct Bridge<T, E> {
    state: State<T, E>,
    name: Arc<str>,
    buffer_warn_threshold: usize,
}

impl<T, E> Bridge<T, E> {
    fn new(name: Arc<str>, buffer_warn_threshold: usize) -> Self {
        Self {
            state: State::Idle,
            name,
            buffer_warn_threshold,
        }
    }

    fn is_listening(&self) -> bool {
        !matches!(self.state, State::Closed)
    }

    /// False once closed, or once a terminal outcome is buffered: nothing
    /// queued behind it could ever be delivered.
    fn accepts_events(&self) -> bool {
        match &self.state {
            State::Closed => false,
            State::AwaitingConsumer(queue) => matches!(queue.back(), Some(Ok(IterStep::Value(_)))),
            State::Idle | State::AwaitingProducer(_) => true,
        }
    }

    /// Pulls still waiting; abandoned ones are not counted
    fn waiting_len(&self) -> usize {
        match &self.state {
            State::AwaitingProducer(waiters) => waiters.iter().filter(|w| !w.is_closed()).count(),
            _ => 0,
        }
    }

    fn buffered_len(&self) -> usize {
        match &self.state {
            State::AwaitingConsumer(queue) => queue.len(),
            _ => 0,
        }
    }

    fn on_next(&mut self, value: T) {
        if !self.accepts_events() {
            trace!(bridge = %self.name, "ignoring value after termination");
            return;
        }
        if let Some(undelivered) = self.deliver_to_oldest(Ok(IterStep::Value(value))) {
            self.buffer(undelivered);
        }
    }

    fn on_error(&mut self, error: E)
    where
        E: Clone,
    {
        if !self.accepts_events() {
            trace!(bridge = %self.name, "ignoring error after termination");
            return;
        }
        self.finish(|| Err(error.clone()));
    }

    fn on_complete(&mut self) {
        if !self.accepts_events() {
            trace!(bridge = %self.name, "ignoring completion after termination");
            return;
        }
        self.finish(|| Ok(IterStep::Done));
    }

    /// Hand `outcome` to the oldest live waiter, or give it back if there is
    /// none. Waiters whose future was dropped are discarded on the way.
    fn deliver_to_oldest(&mut self, mut outcome: Outcome<T, E>) -> Option<Outcome<T, E>> {
        let State::AwaitingProducer(waiters) = &mut self.state else {
            return Some(outcome);
        };
        let undelivered = loop {
            let Some(waiter) = waiters.pop_front() else {
                break Some(outcome);
            };
            match waiter.send(outcome) {
                Ok(()) => break None,
                Err(returned) => outcome = returned,
            }
        };
        if waiters.is_empty() {
            self.state = State::Idle;
        }
        if undelivered.is_none() {
            trace!(bridge = %self.name, "delivered outcome to waiting pull");
        }
        undelivered
    }

    /// Deliver a terminal outcome to every waiting pull and close. With nobody
    /// waiting it is buffered instead, and the bridge closes when it is pulled.
    fn finish(&mut self, make: impl Fn() -> Outcome<T, E>) {
        let waiters = match std::mem::replace(&mut self.state, State::Idle) {
            State::AwaitingProducer(waiters) => waiters,
            other => {
                self.state = other;
                self.buffer(make());
                return;
            }
        };

        let mut delivered = 0usize;
        for waiter in waiters {
            if waiter.send(make()).is_ok() {
                delivered += 1;
            }
        }

        if delivered == 0 {
            self.buffer(make());
        } else {
            debug!(bridge = %self.name, waiters = delivered, "stream terminated");
            self.state = State::Closed;
        }
    }

    fn buffer(&mut self, outcome: Outcome<T, E>) {
        debug_assert!(matches!(
            self.state,
            State::Idle | State::AwaitingConsumer(_)
        ));
        let depth = match &mut self.state {
            State::AwaitingConsumer(queue) => {
                queue.push_back(outcome);
                queue.len()
            }
            _ => {
                self.state = State::AwaitingConsumer(VecDeque::from([outcome]));
                1
            }
        };
        trace!(bridge = %self.name, depth, "buffered outcome");
        if depth == self.buffer_warn_threshold {
            warn!(
                bridge = %self.name,
                depth,
                "buffered outcomes reached warning threshold, consumer is falling behind"
            );
        }
    }

    fn pull(&mut self) -> NextFuture<T, E> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Closed => {
                self.state = State::Closed;
                NextFuture::ready(Ok(IterStep::Done))
            }
            State::AwaitingConsumer(mut queue) => {
                let Some(outcome) = queue.pop_front() else {
                    return self.wait(VecDeque::new());
                };
                if matches!(outcome, Ok(IterStep::Value(_))) {
                    if !queue.is_empty() {
                        self.state = State::AwaitingConsumer(queue);
                    }
                } else {
                    debug!(bridge = %self.name, "buffered terminal outcome consumed");
                    self.state = State::Closed;
                }
                NextFuture::ready(outcome)
            }
            State::AwaitingProducer(waiters) => self.wait(waiters),
            State::Idle => self.wait(VecDeque::new()),
        }
    }

    fn wait(&mut self, mut waiters: VecDeque<Waiter<T, E>>) -> NextFuture<T, E> {
        // Pulls abandoned while the producer was silent must not pile up.
        waiters.retain(|waiter| !waiter.is_closed());
        let (tx, rx) = oneshot::channel();
        waiters.push_back(tx);
        trace!(bridge = %self.name, waiting = waiters.len(), "pull is waiting for the producer");
        self.state = State::AwaitingProducer(waiters);
        NextFuture::waiting(rx)
    }

    /// Resolve every waiting pull with `Done`, drop anything buffered, close.
    fn cancel(&mut self) {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::AwaitingProducer(waiters) => {
                for waiter in waiters {
                    let _ = waiter.send(Ok(IterStep::Done));
                }
            }
            State::AwaitingConsumer(queue) => {
                debug!(bridge = %self.name, discarded = queue.len(), "discarding buffered outcomes");
            }
            State::Idle | State::Closed => {}
        }
    }
}

/// The producer side of the bridge
struct BridgeObserver<T, E> {
    bridge: Arc<Mutex<Bridge<T, E>>>,
}

impl<T, E> Observer<T, E> for BridgeObserver<T, E>
where
    T: Send,
    E: Clone + Send,
{
    fn next(&mut self, value: T) {
        self.bridge.lock().on_next(value);
    }

    fn error(&mut self, error: E) {
        self.bridge.lock().on_error(error);
    }

    fn complete(&mut self) {
        self.bridge.lock().on_complete();
    }
}

/// Future returned by [`ObservableAsyncIterator::request_next`]
///
/// Resolves immediately when an outcome was already buffered, otherwise when
/// the producer next emits. Dropping it before it resolves gives up the place
/// in line without losing the value that would have been delivered to it.
#[must_use = "futures do nothing unless polled"]
pub struct NextFuture<T, E> {
    inner: NextInner<T, E>,
}

enum NextInner<T, E> {
    Ready(Option<Outcome<T, E>>),
    Waiting(oneshot::Receiver<Outcome<T, E>>),
}

impl<T, E> NextFuture<T, E> {
    fn ready(outcome: Outcome<T, E>) -> Self {
        Self {
            inner: NextInner::Ready(Some(outcome)),
        }
    }

    fn waiting(rx: oneshot::Receiver<Outcome<T, E>>) -> Self {
        Self {
            inner: NextInner::Waiting(rx),
        }
    }
}

// Never structurally pinned: the outcome is moved out, the receiver is Unpin.
impl<T, E> Unpin for NextFuture<T, E> {}

impl<T, E> Future for NextFuture<T, E> {
    type Output = Outcome<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.inner {
            NextInner::Ready(outcome) => Poll::Ready(outcome.take().unwrap_or(Ok(IterStep::Done))),
            NextInner::Waiting(rx) => {
                let outcome = match Pin::new(rx).poll(cx) {
                    Poll::Ready(Ok(outcome)) => outcome,
                    // The bridge went away without answering.
                    Poll::Ready(Err(_)) => Ok(IterStep::Done),
                    Poll::Pending => return Poll::Pending,
                };
                self.inner = NextInner::Ready(None);
                Poll::Ready(outcome)
            }
        }
    }
}

/// Pull-based view of a push-based producer
///
/// Subscribes eagerly in [`new`](Self::new). Consume it with
/// [`request_next`](Self::request_next), through the [`AsyncIterator`] trait,
/// or as a [`Stream`] of `Result<T, E>`.
///
/// # Example
/// ```
/// use futures::StreamExt;
/// use rx_bridge::{ObservableAsyncIterator, rx::Subject};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let subject: Subject<&str> = Subject::new();
/// let iter = ObservableAsyncIterator::new(&subject);
///
/// subject.next("one");
/// subject.next("two");
/// subject.complete();
///
/// let values: Vec<_> = iter.map(|item| item.unwrap()).collect().await;
/// assert_eq!(values, vec!["one", "two"]);
/// # }
/// ```
pub struct ObservableAsyncIterator<T, E = RxError> {
    bridge: Arc<Mutex<Bridge<T, E>>>,
    subscription: Mutex<Option<Subscription>>,
    in_flight: Mutex<Option<NextFuture<T, E>>>,
    name: Arc<str>,
}

impl<T, E> ObservableAsyncIterator<T, E>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    /// Subscribe to `observable` with the default configuration
    pub fn new<S>(observable: S) -> Self
    where
        S: Subscribable<T, E>,
    {
        Self::with_config(observable, BridgeConfig::default())
    }

    /// Subscribe to `observable` with an explicit configuration
    pub fn with_config<S>(observable: S, config: BridgeConfig) -> Self
    where
        S: Subscribable<T, E>,
    {
        let name: Arc<str> = Arc::from(config.name);
        // Ready before subscribing: a synchronous producer may emit inline.
        let bridge = Arc::new(Mutex::new(Bridge::new(
            Arc::clone(&name),
            config.buffer_warn_threshold,
        )));

        debug!(bridge = %name, "subscribing to observable");
        let subscription = observable.subscribe_observer(BridgeObserver {
            bridge: Arc::clone(&bridge),
        });

        Self {
            bridge,
            subscription: Mutex::new(Some(subscription)),
            in_flight: Mutex::new(None),
            name,
        }
    }

    /// Request the next outcome
    ///
    /// Resolves to the oldest buffered outcome if there is one, otherwise
    /// waits for the producer. Concurrent requests are answered in the order
    /// they were made. After termination this resolves to `Done` immediately.
    pub fn request_next(&self) -> NextFuture<T, E> {
        self.bridge.lock().pull()
    }
}

impl<T, E> ObservableAsyncIterator<T, E> {
    /// Cancel synchronously
    ///
    /// Resolves waiting pulls with `Done`, discards buffered outcomes and
    /// releases the subscription. Idempotent; a bridge that already
    /// terminated is left untouched.
    pub fn close(&self) -> IterStep<T> {
        let released = {
            let mut bridge = self.bridge.lock();
            if !bridge.is_listening() {
                return IterStep::Done;
            }
            debug!(bridge = %self.name, "cancelling");
            bridge.cancel();
            self.subscription.lock().take()
        };
        // Outside the lock: the producer may react to unsubscribe synchronously.
        if let Some(subscription) = released {
            subscription.unsubscribe();
        }
        IterStep::Done
    }

    /// False once the bridge has terminated
    pub fn is_listening(&self) -> bool {
        self.bridge.lock().is_listening()
    }

    /// Number of pulls waiting for the producer
    pub fn waiting_len(&self) -> usize {
        self.bridge.lock().waiting_len()
    }

    /// Number of producer outcomes waiting for a pull
    pub fn buffered_len(&self) -> usize {
        self.bridge.lock().buffered_len()
    }

    /// Label used in this bridge's log lines
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl<T, E> AsyncIterator for ObservableAsyncIterator<T, E>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    type Item = T;
    type Error = E;

    async fn next(&self) -> Result<IterStep<T>, E> {
        self.request_next().await
    }

    async fn cancel(&self) -> IterStep<T> {
        self.close()
    }
}

impl<T, E> Stream for ObservableAsyncIterator<T, E>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    type Item = Result<T, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        let mut next = match this.in_flight.get_mut().take() {
            Some(next) => next,
            None => this.request_next(),
        };
        match Pin::new(&mut next).poll(cx) {
            Poll::Pending => {
                *this.in_flight.get_mut() = Some(next);
                Poll::Pending
            }
            Poll::Ready(Ok(IterStep::Value(value))) => Poll::Ready(Some(Ok(value))),
            Poll::Ready(Ok(IterStep::Done)) => Poll::Ready(None),
            Poll::Ready(Err(err)) => Poll::Ready(Some(Err(err))),
        }
    }
}

impl<T, E> Drop for ObservableAsyncIterator<T, E> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Factory for [`ObservableAsyncIterator`] on anything subscribable
pub trait SubscribableExt<T, E>: Subscribable<T, E> + Sized {
    /// Subscribe and return the pull-based view
    fn into_async_iter(self) -> ObservableAsyncIterator<T, E>
    where
        T: Send + 'static,
        E: Clone + Send + 'static,
    {
        ObservableAsyncIterator::new(self)
    }
}

impl<T, E, S> SubscribableExt<T, E> for S where S: Subscribable<T, E> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_pending, assert_ready, task};

    type Boxed = Box<dyn Observer<&'static str, RxError>>;

    /// A producer driven by hand. Unlike `Subject` it keeps emitting after a
    /// terminal event, which lets the tests exercise late notifications.
    #[derive(Clone, Default)]
    struct Manual {
        observer: Arc<Mutex<Option<Boxed>>>,
        unsubscribed: Arc<AtomicUsize>,
    }

    impl Manual {
        fn next(&self, value: &'static str) {
            if let Some(observer) = self.observer.lock().as_mut() {
                observer.next(value);
            }
        }

        fn error(&self, err: RxError) {
            if let Some(observer) = self.observer.lock().as_mut() {
                observer.error(err);
            }
        }

        fn complete(&self) {
            if let Some(observer) = self.observer.lock().as_mut() {
                observer.complete();
            }
        }

        fn unsubscribed(&self) -> usize {
            self.unsubscribed.load(Ordering::SeqCst)
        }
    }

    impl Subscribable<&'static str, RxError> for &Manual {
        fn subscribe_observer<O>(self, observer: O) -> Subscription
        where
            O: Observer<&'static str, RxError> + 'static,
        {
            *self.observer.lock() = Some(Box::new(observer));
            let unsubscribed = Arc::clone(&self.unsubscribed);
            Subscription::with_teardown(move || {
                unsubscribed.fetch_add(1, Ordering::SeqCst);
            })
        }
    }

    fn boom() -> RxError {
        RxError::producer("boom")
    }

    fn assert_exclusive<T, E>(iter: &ObservableAsyncIterator<T, E>) {
        assert!(
            iter.waiting_len() == 0 || iter.buffered_len() == 0,
            "waiting pulls and buffered outcomes coexist"
        );
    }

    #[tokio::test]
    async fn test_push_first_value_then_done() {
        let source = Manual::default();
        let iter = ObservableAsyncIterator::new(&source);

        source.next("one");
        source.complete();
        assert_eq!(iter.buffered_len(), 2);

        assert_eq!(iter.request_next().await, Ok(IterStep::Value("one")));
        assert!(iter.is_listening());
        assert_eq!(iter.request_next().await, Ok(IterStep::Done));
        assert!(!iter.is_listening());
        assert_eq!(iter.request_next().await, Ok(IterStep::Done));
    }

    #[test]
    fn test_pull_first_waits_for_value() {
        let source = Manual::default();
        let iter = ObservableAsyncIterator::new(&source);

        let mut first = task::spawn(iter.request_next());
        assert_pending!(first.poll());
        assert_eq!(iter.waiting_len(), 1);

        source.next("one");
        assert!(first.is_woken());
        assert_eq!(assert_ready!(first.poll()), Ok(IterStep::Value("one")));
        assert_eq!(iter.waiting_len(), 0);
        assert!(iter.is_listening());
    }

    #[test]
    fn test_concurrent_pulls_served_in_request_order() {
        let source = Manual::default();
        let iter = ObservableAsyncIterator::new(&source);

        let mut first = task::spawn(iter.request_next());
        let mut second = task::spawn(iter.request_next());
        assert_pending!(first.poll());
        assert_pending!(second.poll());

        source.next("one");
        source.next("two");

        assert_eq!(assert_ready!(second.poll()), Ok(IterStep::Value("two")));
        assert_eq!(assert_ready!(first.poll()), Ok(IterStep::Value("one")));
    }

    #[tokio::test]
    async fn test_values_then_error_then_late_value() {
        let source = Manual::default();
        let iter = ObservableAsyncIterator::new(&source);

        source.next("one");
        source.next("two");
        source.error(boom());
        source.next("three");
        assert_eq!(iter.buffered_len(), 3);

        assert_eq!(iter.request_next().await, Ok(IterStep::Value("one")));
        assert_eq!(iter.request_next().await, Ok(IterStep::Value("two")));
        assert_eq!(iter.request_next().await, Err(boom()));
        assert!(!iter.is_listening());
        assert_eq!(iter.request_next().await, Ok(IterStep::Done));
        assert_eq!(iter.request_next().await, Ok(IterStep::Done));
    }

    #[test]
    fn test_error_rejects_every_waiting_pull() {
        let source = Manual::default();
        let iter = ObservableAsyncIterator::new(&source);

        let mut first = task::spawn(iter.request_next());
        let mut second = task::spawn(iter.request_next());
        assert_pending!(first.poll());
        assert_pending!(second.poll());

        source.error(boom());
        assert!(!iter.is_listening());
        assert_eq!(assert_ready!(first.poll()), Err(boom()));
        assert_eq!(assert_ready!(second.poll()), Err(boom()));

        let mut after = task::spawn(iter.request_next());
        assert_eq!(assert_ready!(after.poll()), Ok(IterStep::Done));
    }

    #[test]
    fn test_complete_resolves_every_waiting_pull() {
        let source = Manual::default();
        let iter = ObservableAsyncIterator::new(&source);

        let mut first = task::spawn(iter.request_next());
        let mut second = task::spawn(iter.request_next());
        assert_pending!(first.poll());
        assert_pending!(second.poll());

        source.complete();
        assert!(!iter.is_listening());
        assert_eq!(assert_ready!(first.poll()), Ok(IterStep::Done));
        assert_eq!(assert_ready!(second.poll()), Ok(IterStep::Done));
        assert_eq!(source.unsubscribed(), 0);
    }

    #[test]
    fn test_cancel_resolves_waiting_pull_and_unsubscribes_once() {
        let source = Manual::default();
        let iter = ObservableAsyncIterator::new(&source);

        let mut pending = task::spawn(iter.request_next());
        assert_pending!(pending.poll());

        assert_eq!(iter.close(), IterStep::Done);
        assert_eq!(assert_ready!(pending.poll()), Ok(IterStep::Done));
        assert_eq!(source.unsubscribed(), 1);

        assert_eq!(iter.close(), IterStep::Done);
        source.next("late");
        assert_eq!(iter.buffered_len(), 0);
        assert_eq!(source.unsubscribed(), 1);
    }

    #[tokio::test]
    async fn test_cancel_discards_buffered_values() {
        let source = Manual::default();
        let iter = ObservableAsyncIterator::new(&source);

        source.next("one");
        assert_eq!(iter.request_next().await, Ok(IterStep::Value("one")));

        source.next("two");
        assert_eq!(iter.cancel().await, IterStep::Done);
        source.next("three");

        assert_eq!(iter.request_next().await, Ok(IterStep::Done));
        assert_eq!(iter.buffered_len(), 0);
        assert_eq!(iter.cancel().await, IterStep::Done);
        assert_eq!(source.unsubscribed(), 1);
    }

    #[tokio::test]
    async fn test_late_events_after_termination_are_ignored() {
        let source = Manual::default();
        let iter = ObservableAsyncIterator::new(&source);

        source.complete();
        assert_eq!(iter.request_next().await, Ok(IterStep::Done));

        source.next("four");
        source.error(boom());
        source.complete();

        assert_eq!(iter.buffered_len(), 0);
        assert_eq!(iter.waiting_len(), 0);
        assert_eq!(iter.request_next().await, Ok(IterStep::Done));
    }

    #[test]
    fn test_events_behind_buffered_terminal_are_not_queued() {
        let source = Manual::default();
        let iter = ObservableAsyncIterator::new(&source);

        source.next("one");
        source.complete();
        source.next("two");
        source.error(boom());

        assert_eq!(iter.buffered_len(), 2);
        assert!(iter.is_listening());
    }

    #[test]
    fn test_dropped_pull_does_not_lose_value() {
        let source = Manual::default();
        let iter = ObservableAsyncIterator::new(&source);

        let mut abandoned = task::spawn(iter.request_next());
        assert_pending!(abandoned.poll());
        drop(abandoned);

        source.next("one");
        assert_eq!(iter.waiting_len(), 0);
        assert_eq!(iter.buffered_len(), 1);

        let mut next = task::spawn(iter.request_next());
        assert_eq!(assert_ready!(next.poll()), Ok(IterStep::Value("one")));
    }

    #[test]
    fn test_abandoned_pulls_do_not_accumulate() {
        let source = Manual::default();
        let iter = ObservableAsyncIterator::new(&source);

        for _ in 0..1000 {
            let mut abandoned = task::spawn(iter.request_next());
            assert_pending!(abandoned.poll());
        }
        assert_eq!(iter.waiting_len(), 0);
        match &iter.bridge.lock().state {
            State::AwaitingProducer(waiters) => assert_eq!(waiters.len(), 1),
            _ => panic!("expected a waiting pull"),
        }

        let mut live = task::spawn(iter.request_next());
        assert_pending!(live.poll());
        assert_eq!(iter.waiting_len(), 1);

        source.next("one");
        assert_eq!(assert_ready!(live.poll()), Ok(IterStep::Value("one")));
        assert_eq!(iter.waiting_len(), 0);
    }

    #[test]
    fn test_resolved_pull_polled_again_reports_done() {
        let source = Manual::default();
        let iter = ObservableAsyncIterator::new(&source);

        let mut waiting = task::spawn(iter.request_next());
        assert_pending!(waiting.poll());
        source.next("one");
        assert_eq!(assert_ready!(waiting.poll()), Ok(IterStep::Value("one")));
        assert_eq!(assert_ready!(waiting.poll()), Ok(IterStep::Done));

        source.next("two");
        let mut buffered = task::spawn(iter.request_next());
        assert_eq!(assert_ready!(buffered.poll()), Ok(IterStep::Value("two")));
        assert_eq!(assert_ready!(buffered.poll()), Ok(IterStep::Done));
    }

    #[test]
    fn test_completion_with_only_dropped_pulls_is_buffered() {
        let source = Manual::default();
        let iter = ObservableAsyncIterator::new(&source);

        drop(iter.request_next());
        source.complete();
        assert!(iter.is_listening());
        assert_eq!(iter.buffered_len(), 1);

        let mut next = task::spawn(iter.request_next());
        assert_eq!(assert_ready!(next.poll()), Ok(IterStep::Done));
        assert!(!iter.is_listening());
    }

    #[test]
    fn test_queues_never_coexist() {
        let source = Manual::default();
        let iter = ObservableAsyncIterator::new(&source);
        let mut pulls = Vec::new();

        for _ in 0..3 {
            let mut pull = task::spawn(iter.request_next());
            assert_pending!(pull.poll());
            pulls.push(pull);
            assert_exclusive(&iter);
        }
        for value in ["a", "b", "c", "d", "e"] {
            source.next(value);
            assert_exclusive(&iter);
        }
        assert_eq!(iter.buffered_len(), 2);

        for pull in pulls.iter_mut() {
            assert!(assert_ready!(pull.poll()).is_ok());
        }
        let mut next = task::spawn(iter.request_next());
        assert_eq!(assert_ready!(next.poll()), Ok(IterStep::Value("d")));
        assert_exclusive(&iter);
    }

    #[test]
    fn test_drop_releases_subscription() {
        let source = Manual::default();
        let iter = ObservableAsyncIterator::new(&source);
        drop(iter);
        assert_eq!(source.unsubscribed(), 1);

        let finished = Manual::default();
        let iter = ObservableAsyncIterator::new(&finished);
        iter.close();
        drop(iter);
        assert_eq!(finished.unsubscribed(), 1);
    }

    #[test]
    fn test_buffer_warning_threshold_does_not_limit() {
        let source = Manual::default();
        let config = BridgeConfig::new()
            .with_name("threshold")
            .with_buffer_warn_threshold(2);
        let iter = ObservableAsyncIterator::with_config(&source, config);

        for _ in 0..5 {
            source.next("x");
        }
        assert_eq!(iter.buffered_len(), 5);
        assert_eq!(iter.name(), "threshold");
    }
}
