//! Single-shot outcome shared by every waiter.

use futures::{FutureExt, future::Shared};
use tokio::sync::oneshot;

/// Future resolving to the outcome of a [`Pending`]; `Err` if the pending
/// slot was dropped unresolved.
pub(crate) type Waiter<T> = Shared<oneshot::Receiver<T>>;

/// An outcome resolved exactly once and observed by any number of waiters.
pub(crate) struct Pending<T: Clone> {
    tx: oneshot::Sender<T>,
    rx: Waiter<T>,
}

impl<T: Clone> Pending<T> {
    pub(crate) fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            tx,
            rx: rx.shared(),
        }
    }

    pub(crate) fn waiter(&self) -> Waiter<T> { self.rx.clone() }

    pub(crate) fn resolve(self, value: T) {
        if self.tx.send(value).is_err() {
            log::trace!("pending outcome resolved with no waiters left");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Pending;

    #[tokio::test]
    async fn every_waiter_sees_the_same_outcome() {
        let pending = Pending::<u32>::new();
        let first = pending.waiter();
        let second = pending.waiter();
        pending.resolve(7);
        assert_eq!(first.await, Ok(7));
        assert_eq!(second.await, Ok(7));
    }

    #[tokio::test]
    async fn dropping_unresolved_wakes_waiters_with_an_error() {
        let pending = Pending::<()>::new();
        let waiter = pending.waiter();
        drop(pending);
        assert!(waiter.await.is_err());
    }
}
