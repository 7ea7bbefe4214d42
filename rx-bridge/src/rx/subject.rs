//! Subject implementation (RxJS-like)

use super::{FnObserver, Observer, Subscribable, Subscription};
use crate::error::RxError;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Subject - both Observable and Observer (RxJS-like)
///
/// A Subject is a special type of Observable that allows values to be
/// multicasted to many Observers. Notifications are dispatched inline, on the
/// caller's thread, before `next`/`error`/`complete` return. Observers must not
/// call back into the same Subject from inside a notification.
///
/// After `error` or `complete` the Subject is stopped: further notifications
/// are dropped, and late subscribers receive the recorded terminal event
/// immediately during `subscribe`.
///
/// # Example
/// ```
/// # use rx_bridge::rx::Subject;
/// let subject: Subject<i32> = Subject::new();
///
/// let _sub1 = subject.subscribe(|value| {
///     tracing::info!("Subscriber 1: {}", value);
/// });
///
/// let _sub2 = subject.subscribe(|value| {
///     tracing::info!("Subscriber 2: {}", value);
/// });
///
/// subject.next(1);
/// subject.next(2);
/// subject.complete();
/// assert!(subject.is_stopped());
/// ```
pub struct Subject<T, E = RxError> {
    inner: Arc<Mutex<SubjectInner<T, E>>>,
}

struct SubjectInner<T, E> {
    observers: Vec<(u64, Box<dyn Observer<T, E>>)>,
    next_id: u64,
    terminal: Option<Terminal<E>>,
}

#[derive(Clone)]
enum Terminal<E> {
    Errored(E),
    Completed,
}

impl<T, E> Subject<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Create a new Subject
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SubjectInner {
                observers: Vec::new(),
                next_id: 0,
                terminal: None,
            })),
        }
    }

    /// Emit a value to all subscribers
    pub fn next(&self, value: T) {
        let mut inner = self.inner.lock();
        if inner.terminal.is_some() {
            return;
        }
        for (_, observer) in inner.observers.iter_mut() {
            observer.next(value.clone());
        }
    }

    /// Emit an error to all subscribers and stop
    pub fn error(&self, error: E) {
        for mut observer in self.stop(Terminal::Errored(error.clone())) {
            observer.error(error.clone());
        }
    }

    /// Signal completion to all subscribers and stop
    pub fn complete(&self) {
        for mut observer in self.stop(Terminal::Completed) {
            observer.complete();
        }
    }

    /// Subscribe to this Subject with a value callback
    ///
    /// Returns a Subscription handle that can be used to unsubscribe.
    pub fn subscribe<F>(&self, next: F) -> Subscription
    where
        F: FnMut(T) + Send + 'static,
    {
        self.subscribe_observer(FnObserver::new(next, |_: E| {}, || {}))
    }

    /// Number of currently attached observers
    pub fn observer_count(&self) -> usize {
        self.inner.lock().observers.len()
    }

    /// Whether a terminal event has been emitted
    pub fn is_stopped(&self) -> bool {
        self.inner.lock().terminal.is_some()
    }

    fn stop(&self, terminal: Terminal<E>) -> Vec<Box<dyn Observer<T, E>>> {
        let mut inner = self.inner.lock();
        if inner.terminal.is_some() {
            return Vec::new();
        }
        inner.terminal = Some(terminal);
        inner
            .observers
            .drain(..)
            .map(|(_, observer)| observer)
            .collect()
    }

    fn attach(&self, mut observer: Box<dyn Observer<T, E>>) -> Subscription {
        let terminal = {
            let mut inner = self.inner.lock();
            match inner.terminal.clone() {
                Some(terminal) => terminal,
                None => {
                    let id = inner.next_id;
                    inner.next_id += 1;
                    inner.observers.push((id, observer));
                    return detach_on_unsubscribe(Arc::downgrade(&self.inner), id);
                }
            }
        };

        match terminal {
            Terminal::Errored(error) => observer.error(error),
            Terminal::Completed => observer.complete(),
        }
        Subscription::closed()
    }
}

fn detach_on_unsubscribe<T, E>(inner: Weak<Mutex<SubjectInner<T, E>>>, id: u64) -> Subscription
where
    T: Send + 'static,
    E: Send + 'static,
{
    Subscription::with_teardown(move || {
        if let Some(inner) = inner.upgrade() {
            inner.lock().observers.retain(|(observer_id, _)| *observer_id != id);
        }
    })
}

impl<T, E> Subscribable<T, E> for &Subject<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn subscribe_observer<O>(self, observer: O) -> Subscription
    where
        O: Observer<T, E> + 'static,
    {
        self.attach(Box::new(observer))
    }
}

impl<T, E> Subscribable<T, E> for Subject<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn subscribe_observer<O>(self, observer: O) -> Subscription
    where
        O: Observer<T, E> + 'static,
    {
        self.attach(Box::new(observer))
    }
}

impl<T, E> Default for Subject<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Clone for Subject<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
