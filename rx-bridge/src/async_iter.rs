//! Pull-based async iteration

use async_trait::async_trait;

/// Outcome of a successful pull: a value, or the end of the sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IterStep<T> {
    /// A produced value
    Value(T),
    /// The sequence is finished; every later pull also reports this
    Done,
}

impl<T> IterStep<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, IterStep::Done)
    }

    /// The carried value, if any
    pub fn into_value(self) -> Option<T> {
        match self {
            IterStep::Value(value) => Some(value),
            IterStep::Done => None,
        }
    }
}

impl<T> From<IterStep<T>> for Option<T> {
    fn from(step: IterStep<T>) -> Self {
        step.into_value()
    }
}

/// A sequence the consumer pulls from at its own pace
///
/// Failures are terminal: after a pull returns `Err`, every later pull
/// returns `Ok(IterStep::Done)`.
#[async_trait]
pub trait AsyncIterator: Send + Sync {
    type Item: Send;
    type Error: Send;

    /// Request the next outcome
    async fn next(&self) -> Result<IterStep<Self::Item>, Self::Error>;

    /// Stop iterating early
    ///
    /// Idempotent. Always reports [`IterStep::Done`].
    async fn cancel(&self) -> IterStep<Self::Item>;
}

/// Drive `iter` to the end, feeding every value to `f`
///
/// Returns the first error the sequence reports.
///
/// # Example
/// ```
/// # use rx_bridge::{for_await_each, rx::Subject, ObservableAsyncIterator};
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let subject: Subject<&str> = Subject::new();
/// let iter = ObservableAsyncIterator::new(&subject);
/// subject.next("one");
/// subject.complete();
///
/// let mut seen = Vec::new();
/// for_await_each(&iter, |value| seen.push(value)).await.unwrap();
/// assert_eq!(seen, vec!["one"]);
/// # }
/// ```
pub async fn for_await_each<I, F>(iter: &I, mut f: F) -> Result<(), I::Error>
where
    I: AsyncIterator + ?Sized,
    F: FnMut(I::Item),
{
    loop {
        match iter.next().await? {
            IterStep::Value(value) => f(value),
            IterStep::Done => return Ok(()),
        }
    }
}
